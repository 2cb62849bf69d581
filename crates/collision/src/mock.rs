//! Mock 检查点事件源
//!
//! 用于无仿真器环境的测试：在本地端口上接受 WebSocket 连接，
//! 由测试代码决定何时发送碰撞事件或直接断开连接。

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::SinkExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// 事件消息内容（客户端不解析内容）
const EVENT_PAYLOAD: &str = "collision";

/// Mock 检查点事件源
///
/// 同一时刻只保留最新的一条连接，和真实事件源一样：
/// 每条连接最多收到一个事件，随后连接被关闭。
pub struct MockCheckpointServer {
    addr: SocketAddr,
    current: Arc<Mutex<Option<WebSocketStream<TcpStream>>>>,
    connections: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    task: JoinHandle<()>,
}

impl MockCheckpointServer {
    /// 在 127.0.0.1 的随机端口上启动
    pub async fn bind() -> io::Result<Self> {
        Self::bind_addr("127.0.0.1:0").await
    }

    /// 在指定地址上启动
    pub async fn bind_addr(addr: &str) -> io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let addr = listener.local_addr()?;
        let current = Arc::new(Mutex::new(None));
        let connections = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();

        let task = tokio::spawn(accept_loop(
            listener,
            current.clone(),
            connections.clone(),
            shutdown.clone(),
        ));

        debug!(%addr, "mock checkpoint server started");

        Ok(Self {
            addr,
            current,
            connections,
            shutdown,
            task,
        })
    }

    /// 一个当前无人监听的地址，用于模拟连接被拒绝
    pub async fn refused_url() -> io::Result<String> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        drop(listener);
        Ok(format!("ws://{addr}"))
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// 客户端连接用的 URL
    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// 已完成握手的连接总数
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::Acquire)
    }

    /// 当前是否有连接在等待事件
    pub async fn has_listener(&self) -> bool {
        self.current.lock().await.is_some()
    }

    /// 等待累计连接数达到 `count`
    pub async fn wait_for_connections(&self, count: usize, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if self.connection_count() >= count && self.has_listener().await {
                return true;
            }
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// 向当前连接发送一次碰撞事件并关闭它
    ///
    /// 没有连接时返回 `false`。
    pub async fn trigger(&self) -> bool {
        let Some(mut stream) = self.current.lock().await.take() else {
            return false;
        };
        let delivered = stream.send(Message::text(EVENT_PAYLOAD)).await.is_ok();
        let _ = stream.close(None).await;
        trace!(addr = %self.addr, delivered, "mock checkpoint triggered");
        delivered
    }

    /// 不发送事件直接断开当前连接
    pub async fn sever(&self) -> bool {
        let severed = self.current.lock().await.take().is_some();
        trace!(addr = %self.addr, severed, "mock checkpoint severed");
        severed
    }

    /// 停止接受新连接并断开当前连接
    pub async fn stop(&self) {
        self.shutdown.cancel();
        self.current.lock().await.take();
    }
}

impl Drop for MockCheckpointServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        self.task.abort();
    }
}

async fn accept_loop(
    listener: TcpListener,
    current: Arc<Mutex<Option<WebSocketStream<TcpStream>>>>,
    connections: Arc<AtomicUsize>,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let Ok((tcp, peer)) = accepted else {
            continue;
        };

        match accept_async(tcp).await {
            Ok(stream) => {
                // the newest listener replaces any stale one
                *current.lock().await = Some(stream);
                connections.fetch_add(1, Ordering::AcqRel);
                trace!(%peer, "mock checkpoint accepted listener");
            }
            Err(e) => debug!(%peer, error = %e, "mock checkpoint handshake failed"),
        }
    }
}
