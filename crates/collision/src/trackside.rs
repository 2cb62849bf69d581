//! Mock 赛道边：两个检查点事件源 + 越线转发
//!
//! 仿真侧每越过一个检查点就调用一次 [`MockTrackside::crossing_callback`]
//! 返回的回调，转发任务再让对应的 [`MockCheckpointServer`] 发出事件。

use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use contracts::{CheckpointConfig, CheckpointId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::{MockCheckpointServer, MonitorConfig};

/// Serves both checkpoints and turns crossings into collision events.
pub struct MockTrackside {
    servers: Arc<[MockCheckpointServer; 2]>,
    crossings: mpsc::UnboundedSender<CheckpointId>,
    delivered: Arc<AtomicU64>,
    relay: JoinHandle<()>,
}

impl MockTrackside {
    /// 在配置的 host 和端口上启动两个事件源
    pub async fn bind(checkpoints: &CheckpointConfig) -> io::Result<Self> {
        let start_finish = bind_checkpoint(checkpoints, CheckpointId::StartFinish).await?;
        let mid = bind_checkpoint(checkpoints, CheckpointId::Mid).await?;
        Ok(Self::from_servers([start_finish, mid]))
    }

    /// 两个事件源都在 127.0.0.1 的随机端口上
    pub async fn bind_local() -> io::Result<Self> {
        let start_finish = MockCheckpointServer::bind().await?;
        let mid = MockCheckpointServer::bind().await?;
        Ok(Self::from_servers([start_finish, mid]))
    }

    /// Use already bound servers, indexed by `CheckpointId::index`
    pub fn from_servers(servers: [MockCheckpointServer; 2]) -> Self {
        let servers = Arc::new(servers);
        let delivered = Arc::new(AtomicU64::new(0));
        let (crossings, rx) = mpsc::unbounded_channel();
        let relay = tokio::spawn(relay(servers.clone(), rx, delivered.clone()));

        info!(
            start_finish = %servers[CheckpointId::StartFinish.index()].addr(),
            mid = %servers[CheckpointId::Mid.index()].addr(),
            "Mock checkpoints listening"
        );

        Self {
            servers,
            crossings,
            delivered,
            relay,
        }
    }

    /// Callback for the simulator side, one call per crossing
    pub fn crossing_callback(&self) -> impl FnMut(CheckpointId) + Send + 'static {
        let crossings = self.crossings.clone();
        move |checkpoint| {
            // Only fails once the trackside is gone
            let _ = crossings.send(checkpoint);
        }
    }

    pub fn server(&self, checkpoint: CheckpointId) -> &MockCheckpointServer {
        &self.servers[checkpoint.index()]
    }

    /// 指向这两个事件源的监听配置
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig::new(
            self.server(CheckpointId::StartFinish).url(),
            self.server(CheckpointId::Mid).url(),
        )
    }

    /// Crossings that reached a connected listener
    pub fn delivered(&self) -> u64 {
        self.delivered.load(Ordering::Acquire)
    }

    pub async fn shutdown(self) {
        self.relay.abort();
        for server in self.servers.iter() {
            server.stop().await;
        }
        debug!(delivered = self.delivered(), "Mock trackside stopped");
    }
}

async fn bind_checkpoint(
    checkpoints: &CheckpointConfig,
    checkpoint: CheckpointId,
) -> io::Result<MockCheckpointServer> {
    let addr = format!("{}:{}", checkpoints.host, checkpoints.port(checkpoint));
    MockCheckpointServer::bind_addr(&addr).await.map_err(|e| {
        io::Error::new(
            e.kind(),
            format!("mock {checkpoint} checkpoint on {addr}: {e}"),
        )
    })
}

async fn relay(
    servers: Arc<[MockCheckpointServer; 2]>,
    mut crossings: mpsc::UnboundedReceiver<CheckpointId>,
    delivered: Arc<AtomicU64>,
) {
    while let Some(checkpoint) = crossings.recv().await {
        if servers[checkpoint.index()].trigger().await {
            delivered.fetch_add(1, Ordering::AcqRel);
            debug!(%checkpoint, "Crossing delivered");
        } else {
            warn!(%checkpoint, "Crossing lost: no listener connected");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CollisionMonitor;
    use std::time::{Duration, Instant};

    const WAIT: Duration = Duration::from_secs(3);

    async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + WAIT;
        while !cond() {
            if Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        true
    }

    /// Two distinct ports that were free a moment ago
    async fn free_ports() -> (u16, u16) {
        let a = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let b = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        (a.local_addr().unwrap().port(), b.local_addr().unwrap().port())
    }

    #[tokio::test]
    async fn test_crossing_reaches_monitor() {
        let trackside = MockTrackside::bind_local().await.unwrap();
        let monitor = CollisionMonitor::start(trackside.monitor_config()).unwrap();
        assert!(
            trackside
                .server(CheckpointId::Mid)
                .wait_for_connections(1, WAIT)
                .await
        );
        // The server keeps the stream only after its handshake completes
        assert!(wait_until(|| monitor.live_listeners() == 2).await);
        tokio::time::sleep(Duration::from_millis(20)).await;

        let mut cross = trackside.crossing_callback();
        cross(CheckpointId::Mid);

        assert!(wait_until(|| monitor.is_collision(CheckpointId::Mid)).await);
        assert!(!monitor.is_collision(CheckpointId::StartFinish));
        assert!(wait_until(|| trackside.delivered() == 1).await);

        monitor.shutdown().await;
        trackside.shutdown().await;
    }

    #[tokio::test]
    async fn test_crossing_without_listener_is_lost() {
        let trackside = MockTrackside::bind_local().await.unwrap();
        let mut cross = trackside.crossing_callback();
        cross(CheckpointId::StartFinish);
        cross(CheckpointId::Mid);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(trackside.delivered(), 0);
        trackside.shutdown().await;
    }

    #[tokio::test]
    async fn test_bind_uses_configured_ports() {
        let (start_finish_port, mid_port) = free_ports().await;
        let config = CheckpointConfig {
            host: "127.0.0.1".into(),
            start_finish_port,
            mid_port,
            ..Default::default()
        };

        let trackside = MockTrackside::bind(&config).await.unwrap();
        assert_eq!(trackside.server(CheckpointId::StartFinish).addr().port(), start_finish_port);
        assert_eq!(trackside.server(CheckpointId::Mid).addr().port(), mid_port);

        let err = match MockTrackside::bind(&config).await {
            Ok(_) => panic!("ports already taken"),
            Err(e) => e,
        };
        assert!(err.to_string().contains("start_finish"), "got: {err}");
        trackside.shutdown().await;
    }
}
