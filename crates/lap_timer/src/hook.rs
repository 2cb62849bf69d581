//! Driving-policy hook invoked once per poll.

/// Per-tick driving callback.
///
/// Receives the simulation control handle; never sees timer state.
/// Any `FnMut(&mut S)` closure is a hook.
pub trait DriverHook<S: ?Sized> {
    fn step(&mut self, sim: &mut S);
}

impl<S: ?Sized, F> DriverHook<S> for F
where
    F: FnMut(&mut S),
{
    fn step(&mut self, sim: &mut S) {
        self(sim)
    }
}

/// Hook that does nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct IdleHook;

impl<S: ?Sized> DriverHook<S> for IdleHook {
    fn step(&mut self, _sim: &mut S) {}
}
