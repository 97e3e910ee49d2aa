//! Live update channel
//!
//! Keeps one WebSocket open to the server's notification endpoint and hands
//! every inbound payload to a single handler. The connection loop runs in
//! its own task:
//!
//! ```text
//! Connecting --ok--> Open --close/error--> ClosedPendingRetry --delay--> Connecting
//!     \--fail-----------------------------------^
//! ```
//!
//! There is no retry limit and no backoff growth. Missed events are
//! harmless because the dashboard re-fetches full state on every signal.
//! The loop only ends through `ChannelHandle::shutdown` (or dropping the
//! handle).

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use rand::Rng;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Delay between a drop and the next connection attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Transport error: {0}")]
    Transport(String),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ChannelState {
    #[default]
    Connecting,
    Open,
    ClosedPendingRetry,
    /// Owner tore the channel down
    Stopped,
}

/// One physical connection to the notification endpoint
#[async_trait]
pub trait Connection: Send {
    /// Next inbound payload; `None` once the peer has closed
    async fn recv(&mut self) -> Option<Result<String, ChannelError>>;

    async fn close(&mut self);
}

/// Opens connections to the notification endpoint
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Conn: Connection + 'static;

    async fn connect(&self) -> Result<Self::Conn, ChannelError>;
}

/// Fixed-delay reconnect timing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// Upper bound of a random extra delay; zero disables it
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
            jitter: Duration::ZERO,
        }
    }
}

impl RetryPolicy {
    pub fn fixed(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    fn next_delay(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        if jitter_ms == 0 {
            return self.delay;
        }
        self.delay + Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ms))
    }
}

/// Owner's handle on a running channel
pub struct ChannelHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ChannelState>,
    task: Option<JoinHandle<()>>,
}

impl ChannelHandle {
    pub fn state(&self) -> ChannelState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.state.clone()
    }

    /// Cancel any pending retry and close any open connection
    ///
    /// Once this returns the handler is never invoked again.
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Live update task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Start the connection loop, delivering each payload to `handler`
pub fn spawn<C, H>(connector: C, policy: RetryPolicy, handler: H) -> ChannelHandle
where
    C: Connector,
    H: FnMut(String) + Send + 'static,
{
    let cancel = CancellationToken::new();
    let (state_tx, state_rx) = watch::channel(ChannelState::Connecting);

    let task = tokio::spawn(run(connector, policy, handler, cancel.clone(), state_tx));

    ChannelHandle {
        cancel,
        state: state_rx,
        task: Some(task),
    }
}

async fn run<C, H>(
    connector: C,
    policy: RetryPolicy,
    mut handler: H,
    cancel: CancellationToken,
    state: watch::Sender<ChannelState>,
) where
    C: Connector,
    H: FnMut(String) + Send,
{
    loop {
        state.send_replace(ChannelState::Connecting);

        let attempt = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            attempt = connector.connect() => attempt,
        };

        match attempt {
            Ok(mut conn) => {
                info!("Live update channel connected");
                state.send_replace(ChannelState::Open);

                let stopped = pump(&mut conn, &mut handler, &cancel).await;
                // The old connection is fully closed before any new attempt
                conn.close().await;
                if stopped {
                    break;
                }
            }
            Err(e) => warn!("Live update channel connect failed: {}", e),
        }

        state.send_replace(ChannelState::ClosedPendingRetry);
        let delay = policy.next_delay();
        info!("Live update channel reconnecting in {:?}", delay);

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(delay) => {}
        }
    }

    debug!("Live update channel stopped");
    state.send_replace(ChannelState::Stopped);
}

/// Deliver payloads until the connection drops (false) or the owner
/// cancels (true)
async fn pump<C, H>(conn: &mut C, handler: &mut H, cancel: &CancellationToken) -> bool
where
    C: Connection,
    H: FnMut(String),
{
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => return true,
            next = conn.recv() => next,
        };

        match next {
            Some(Ok(payload)) => {
                debug!("Live update received: {}", payload);
                handler(payload);
            }
            Some(Err(e)) => {
                warn!("Live update channel error: {}", e);
                return false;
            }
            None => {
                info!("Live update channel closed by server");
                return false;
            }
        }
    }
}

/// WebSocket connector for the notification endpoint
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connector for WsConnector {
    type Conn = WsConnection;

    async fn connect(&self) -> Result<WsConnection, ChannelError> {
        debug!("Connecting to {}", self.url);
        let (stream, _) = connect_async(self.url.as_str()).await?;
        Ok(WsConnection { stream })
    }
}

#[async_trait]
impl Connection for WsConnection {
    async fn recv(&mut self) -> Option<Result<String, ChannelError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                    Ok(text) => return Some(Ok(text)),
                    Err(_) => debug!("Ignoring non-UTF-8 binary frame"),
                },
                Ok(Message::Close(frame)) => {
                    debug!("Close frame: {:?}", frame);
                    return None;
                }
                // Ping/pong are answered by tungstenite
                Ok(_) => {}
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            debug!("Close handshake failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;
    use tokio::time::Instant;

    type Feed = mpsc::UnboundedSender<Result<String, ChannelError>>;

    #[derive(Default)]
    struct Stats {
        connects: Vec<Instant>,
        open: usize,
        max_open: usize,
        closes: usize,
    }

    /// Scripted connector: each queued receiver becomes one connection,
    /// `None` makes that attempt fail, an empty queue fails every attempt
    #[derive(Clone, Default)]
    struct MockConnector {
        script: Arc<Mutex<VecDeque<Option<mpsc::UnboundedReceiver<Result<String, ChannelError>>>>>>,
        stats: Arc<Mutex<Stats>>,
    }

    impl MockConnector {
        fn push_connection(&self) -> Feed {
            let (tx, rx) = mpsc::unbounded_channel();
            self.script.lock().unwrap().push_back(Some(rx));
            tx
        }

        fn push_failure(&self) {
            self.script.lock().unwrap().push_back(None);
        }

        fn connects(&self) -> Vec<Instant> {
            self.stats.lock().unwrap().connects.clone()
        }
    }

    struct MockConnection {
        rx: mpsc::UnboundedReceiver<Result<String, ChannelError>>,
        stats: Arc<Mutex<Stats>>,
        closed: bool,
    }

    #[async_trait]
    impl Connector for MockConnector {
        type Conn = MockConnection;

        async fn connect(&self) -> Result<MockConnection, ChannelError> {
            let mut stats = self.stats.lock().unwrap();
            stats.connects.push(Instant::now());

            match self.script.lock().unwrap().pop_front() {
                Some(Some(rx)) => {
                    stats.open += 1;
                    stats.max_open = stats.max_open.max(stats.open);
                    Ok(MockConnection {
                        rx,
                        stats: Arc::clone(&self.stats),
                        closed: false,
                    })
                }
                _ => Err(ChannelError::Transport("connection refused".to_string())),
            }
        }
    }

    #[async_trait]
    impl Connection for MockConnection {
        async fn recv(&mut self) -> Option<Result<String, ChannelError>> {
            self.rx.recv().await
        }

        async fn close(&mut self) {
            if !self.closed {
                self.closed = true;
                let mut stats = self.stats.lock().unwrap();
                stats.open -= 1;
                stats.closes += 1;
            }
        }
    }

    fn collecting() -> (impl FnMut(String) + Send + 'static, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            move |payload| {
                let _ = tx.send(payload);
            },
            rx,
        )
    }

    async fn wait_for(handle: &ChannelHandle, wanted: ChannelState) {
        let mut state = handle.watch_state();
        state.wait_for(|s| *s == wanted).await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_handler_sees_every_event_in_order() {
        let connector = MockConnector::default();
        let feed = connector.push_connection();
        let (handler, mut received) = collecting();

        let handle = spawn(connector.clone(), RetryPolicy::default(), handler);

        let sent = ["file_uploaded", "hello", "file_deleted", "file_uploaded"];
        for payload in sent {
            feed.send(Ok(payload.to_string())).unwrap();
        }

        for expected in sent {
            assert_eq!(received.recv().await.as_deref(), Some(expected));
        }
        assert!(received.try_recv().is_err());
        assert_eq!(handle.state(), ChannelState::Open);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_reconnect_after_fixed_delay() {
        let connector = MockConnector::default();
        let first = connector.push_connection();
        let second = connector.push_connection();
        let (handler, mut received) = collecting();

        let handle = spawn(connector.clone(), RetryPolicy::default(), handler);
        wait_for(&handle, ChannelState::Open).await;

        // Abrupt disconnect
        drop(first);
        wait_for(&handle, ChannelState::ClosedPendingRetry).await;

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert_eq!(connector.connects().len(), 1);

        tokio::time::sleep(Duration::from_millis(200)).await;
        let connects = connector.connects();
        assert_eq!(connects.len(), 2);
        assert_eq!(connects[1] - connects[0], DEFAULT_RECONNECT_DELAY);
        assert_eq!(handle.state(), ChannelState::Open);

        // The new connection delivers, nothing else reconnects
        second.send(Ok("file_deleted".to_string())).unwrap();
        assert_eq!(received.recv().await.as_deref(), Some("file_deleted"));
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(connector.connects().len(), 2);

        {
            let stats = connector.stats.lock().unwrap();
            assert_eq!(stats.max_open, 1);
            assert_eq!(stats.closes, 1);
        }

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_closes_connection_before_retry() {
        let connector = MockConnector::default();
        let first = connector.push_connection();
        let _second = connector.push_connection();
        let (handler, _received) = collecting();

        let handle = spawn(connector.clone(), RetryPolicy::default(), handler);
        wait_for(&handle, ChannelState::Open).await;

        first
            .send(Err(ChannelError::Transport("reset by peer".to_string())))
            .unwrap();
        wait_for(&handle, ChannelState::ClosedPendingRetry).await;
        {
            let stats = connector.stats.lock().unwrap();
            assert_eq!(stats.open, 0);
            assert_eq!(stats.closes, 1);
        }

        wait_for(&handle, ChannelState::Open).await;
        assert_eq!(connector.stats.lock().unwrap().max_open, 1);

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_forever_without_backoff() {
        let connector = MockConnector::default();
        for _ in 0..5 {
            connector.push_failure();
        }
        let _feed = connector.push_connection();
        let (handler, _received) = collecting();

        let policy = RetryPolicy::fixed(Duration::from_secs(3));
        let handle = spawn(connector.clone(), policy, handler);
        wait_for(&handle, ChannelState::Open).await;

        let connects = connector.connects();
        assert_eq!(connects.len(), 6);
        for pair in connects.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(3));
        }

        handle.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_cancels_pending_retry() {
        let connector = MockConnector::default();
        let (handler, mut received) = collecting();

        let handle = spawn(connector.clone(), RetryPolicy::default(), handler);
        wait_for(&handle, ChannelState::ClosedPendingRetry).await;

        let state = handle.watch_state();
        handle.shutdown().await;
        assert_eq!(*state.borrow(), ChannelState::Stopped);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(connector.connects().len(), 1);
        // The handler went away with the task
        assert_eq!(received.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_open_connection() {
        let connector = MockConnector::default();
        let feed = connector.push_connection();
        let (handler, mut received) = collecting();

        let handle = spawn(connector.clone(), RetryPolicy::default(), handler);
        wait_for(&handle, ChannelState::Open).await;
        handle.shutdown().await;

        {
            let stats = connector.stats.lock().unwrap();
            assert_eq!(stats.open, 0);
            assert_eq!(stats.closes, 1);
        }

        // Nothing sent after teardown reaches the handler
        let _ = feed.send(Ok("file_uploaded".to_string()));
        assert_eq!(received.recv().await, None);
    }

    #[test]
    fn test_jitter_bounds() {
        let policy = RetryPolicy {
            delay: Duration::from_secs(3),
            jitter: Duration::from_millis(500),
        };
        for _ in 0..100 {
            let d = policy.next_delay();
            assert!(d >= Duration::from_secs(3) && d <= Duration::from_millis(3_500));
        }
        assert_eq!(RetryPolicy::default().next_delay(), DEFAULT_RECONNECT_DELAY);
    }

    #[tokio::test]
    async fn test_websocket_loopback_reconnects() {
        use futures::SinkExt;
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            // First client connection: one event, then the server hangs up
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Text("file_uploaded".into())).await.unwrap();
            let _ = ws.close(None).await;
            drop(ws);

            // Second connection stays up
            let (tcp, _) = listener.accept().await.unwrap();
            let mut ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
            ws.send(Message::Text("file_deleted".into())).await.unwrap();
            tokio::time::sleep(Duration::from_secs(30)).await;
        });

        let (handler, mut received) = collecting();
        let handle = spawn(
            WsConnector::new(&format!("ws://{}", addr)),
            RetryPolicy::fixed(Duration::from_millis(50)),
            handler,
        );

        let timeout = Duration::from_secs(5);
        let first = tokio::time::timeout(timeout, received.recv()).await.unwrap();
        assert_eq!(first.as_deref(), Some("file_uploaded"));
        let second = tokio::time::timeout(timeout, received.recv()).await.unwrap();
        assert_eq!(second.as_deref(), Some("file_deleted"));

        handle.shutdown().await;
    }
}
