//! CollisionChannel - 单个检查点的一次性监听器
//!
//! 每个实例持有一条到事件源的 WebSocket 连接，收到第一条消息后
//! 发出一次 `Triggered` 事件并立即失效。回收由 monitor 负责。

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration;

use contracts::CheckpointId;
use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, trace, warn};

use crate::config::MonitorMetrics;
use crate::error::CollisionError;

/// 通道生命周期状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ChannelState {
    /// 正在建立连接
    Connecting = 0,
    /// 已连接，等待事件
    Listening = 1,
    /// 已收到事件
    Fired = 2,
    /// 已关闭或失败
    Closed = 3,
}

impl ChannelState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Connecting,
            1 => Self::Listening,
            2 => Self::Fired,
            _ => Self::Closed,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Listening => "listening",
            Self::Fired => "fired",
            Self::Closed => "closed",
        }
    }
}

/// 通道发往 monitor 的事件
///
/// `generation` 标识发出事件的通道实例，monitor 据此丢弃已回收通道的迟到事件。
#[derive(Debug)]
pub enum ChannelEvent {
    /// 收到一次碰撞通知
    Triggered {
        checkpoint: CheckpointId,
        generation: u64,
    },
    /// 连接失败或中途断开
    Faulted {
        checkpoint: CheckpointId,
        generation: u64,
        error: CollisionError,
    },
}

/// 单检查点碰撞监听通道
///
/// `open` 不阻塞调用方：连接和接收都在后台 tokio 任务中完成。
/// 每个实例最多发出一次 `Triggered`。
pub struct CollisionChannel {
    checkpoint: CheckpointId,
    endpoint: String,
    generation: u64,
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl CollisionChannel {
    /// 打开通道并开始后台监听
    ///
    /// 必须在 tokio runtime 内调用。
    #[instrument(
        name = "collision_channel_open",
        skip(endpoint, events, metrics),
        fields(checkpoint = %checkpoint)
    )]
    pub fn open(
        checkpoint: CheckpointId,
        endpoint: impl Into<String>,
        generation: u64,
        events: mpsc::UnboundedSender<ChannelEvent>,
        metrics: Arc<MonitorMetrics>,
    ) -> Self {
        let endpoint = endpoint.into();
        let state = Arc::new(AtomicU8::new(ChannelState::Connecting as u8));
        let cancel = CancellationToken::new();

        let listener = Listener {
            checkpoint,
            endpoint: endpoint.clone(),
            generation,
            state: state.clone(),
            cancel: cancel.clone(),
            events,
            _guard: ListenerGuard::new(metrics),
        };
        let task = tokio::spawn(listener.run());

        debug!(endpoint = %endpoint, "collision channel opened");

        Self {
            checkpoint,
            endpoint,
            generation,
            state,
            cancel,
            task: Some(task),
        }
    }

    pub fn checkpoint(&self) -> CheckpointId {
        self.checkpoint
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// 当前状态
    pub fn state(&self) -> ChannelState {
        ChannelState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// 关闭通道
    ///
    /// 任意阶段都可调用，重复调用无副作用。只发出取消信号，不等待后台任务。
    pub fn close(&self) {
        let previous = self.state.swap(ChannelState::Closed as u8, Ordering::AcqRel);
        self.cancel.cancel();
        if previous != ChannelState::Closed as u8 {
            debug!(
                checkpoint = %self.checkpoint,
                generation = self.generation,
                from = ChannelState::from_u8(previous).as_str(),
                "collision channel closed"
            );
        }
    }

    /// 关闭并在 `grace` 内等待后台任务退出
    ///
    /// 超时则放弃等待（任务已收到取消信号，会在下一个等待点退出）。
    /// 返回任务是否在期限内结束。
    pub async fn shutdown(mut self, grace: Duration) -> bool {
        self.close();
        let Some(task) = self.task.take() else {
            return true;
        };
        match tokio::time::timeout(grace, task).await {
            Ok(_) => true,
            Err(_) => {
                warn!(
                    checkpoint = %self.checkpoint,
                    grace_ms = grace.as_millis() as u64,
                    "collision listener did not stop in time, abandoning"
                );
                false
            }
        }
    }
}

impl Drop for CollisionChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for CollisionChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionChannel")
            .field("checkpoint", &self.checkpoint)
            .field("endpoint", &self.endpoint)
            .field("generation", &self.generation)
            .field("state", &self.state())
            .finish()
    }
}

/// Counts a background listener as live for as long as its future exists.
struct ListenerGuard(Arc<MonitorMetrics>);

impl ListenerGuard {
    fn new(metrics: Arc<MonitorMetrics>) -> Self {
        metrics.listener_started();
        Self(metrics)
    }
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        self.0.listener_stopped();
    }
}

/// 后台监听任务
struct Listener {
    checkpoint: CheckpointId,
    endpoint: String,
    generation: u64,
    state: Arc<AtomicU8>,
    cancel: CancellationToken,
    events: mpsc::UnboundedSender<ChannelEvent>,
    _guard: ListenerGuard,
}

impl Listener {
    async fn run(self) {
        let connected = tokio::select! {
            _ = self.cancel.cancelled() => return,
            result = connect_async(self.endpoint.as_str()) => result,
        };

        let mut stream = match connected {
            Ok((stream, _response)) => stream,
            Err(e) => {
                self.state
                    .store(ChannelState::Closed as u8, Ordering::Release);
                self.emit_fault(CollisionError::connection_failed(
                    self.checkpoint,
                    &self.endpoint,
                    e.to_string(),
                ));
                return;
            }
        };

        // close() may have raced the handshake
        if !self.advance(ChannelState::Connecting, ChannelState::Listening) {
            return;
        }
        debug!(
            checkpoint = %self.checkpoint,
            generation = self.generation,
            "collision channel listening"
        );

        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => return,
                next = stream.next() => next,
            };

            match next {
                Some(Ok(Message::Text(_) | Message::Binary(_))) => {
                    if self.advance(ChannelState::Listening, ChannelState::Fired) {
                        trace!(checkpoint = %self.checkpoint, "collision event received");
                        let _ = self.events.send(ChannelEvent::Triggered {
                            checkpoint: self.checkpoint,
                            generation: self.generation,
                        });
                    }
                    // one event per channel; the connection is dropped here
                    return;
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => continue,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    if self.advance(ChannelState::Listening, ChannelState::Closed) {
                        self.emit_fault(CollisionError::connection_closed(
                            self.checkpoint,
                            &self.endpoint,
                        ));
                    }
                    return;
                }
            }
        }
    }

    fn advance(&self, from: ChannelState, to: ChannelState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn emit_fault(&self, error: CollisionError) {
        if self.cancel.is_cancelled() {
            return;
        }
        warn!(
            checkpoint = %self.checkpoint,
            generation = self.generation,
            error = %error,
            "collision channel fault"
        );
        let _ = self.events.send(ChannelEvent::Faulted {
            checkpoint: self.checkpoint,
            generation: self.generation,
            error,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCheckpointServer;

    fn channel_for(
        url: &str,
    ) -> (
        CollisionChannel,
        mpsc::UnboundedReceiver<ChannelEvent>,
        Arc<MonitorMetrics>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(MonitorMetrics::new());
        let channel = CollisionChannel::open(CheckpointId::Mid, url, 1, tx, metrics.clone());
        (channel, rx, metrics)
    }

    #[tokio::test]
    async fn test_single_trigger_is_delivered() {
        let server = MockCheckpointServer::bind().await.unwrap();
        let (channel, mut rx, _) = channel_for(&server.url());

        assert!(server.wait_for_connections(1, Duration::from_secs(2)).await);
        assert!(server.trigger().await);

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            event,
            ChannelEvent::Triggered {
                checkpoint: CheckpointId::Mid,
                generation: 1
            }
        ));
        assert_eq!(channel.state(), ChannelState::Fired);
    }

    #[tokio::test]
    async fn test_refused_connection_faults() {
        let url = MockCheckpointServer::refused_url().await.unwrap();
        let (channel, mut rx, metrics) = channel_for(&url);

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            ChannelEvent::Faulted { error, .. } => {
                assert!(matches!(error, CollisionError::ConnectionFailed { .. }));
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(channel.shutdown(Duration::from_secs(1)).await);
        assert_eq!(metrics.live_listeners(), 0);
    }

    #[tokio::test]
    async fn test_severed_connection_faults() {
        let server = MockCheckpointServer::bind().await.unwrap();
        let (_channel, mut rx, _) = channel_for(&server.url());

        assert!(server.wait_for_connections(1, Duration::from_secs(2)).await);
        assert!(server.sever().await);

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .unwrap()
            .unwrap();
        match event {
            ChannelEvent::Faulted { error, .. } => {
                assert!(matches!(error, CollisionError::ConnectionClosed { .. }));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_silent() {
        let server = MockCheckpointServer::bind().await.unwrap();
        let (channel, mut rx, metrics) = channel_for(&server.url());

        channel.close();
        channel.close();
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(channel.shutdown(Duration::from_secs(1)).await);
        assert_eq!(metrics.live_listeners(), 0);

        // a cancelled listener never reports a fault
        assert!(rx.try_recv().is_err());
    }
}
