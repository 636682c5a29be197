//! Engine client over a local TCP socket.
//!
//! Frames are newline-delimited JSON:
//!
//! - request:  `{"id": 7, "method": "update_config", "params": {...}}`
//! - response: `{"id": 7, "result": ...}` or `{"id": 7, "error": "..."}`
//! - event:    `{"event": "clicker-state-changed", "payload": {...}}`
//!
//! The connection is opened lazily and re-opened on the next request after
//! it drops, so an engine that starts late (or restarts) is picked up
//! without restarting the UI. While anyone holds a state subscription, a
//! dropped connection is also re-opened in the background with backoff so
//! state events keep flowing when no requests are being made.

use super::{ClickerStateReply, EngineClient, EngineError, EngineResult, STATE_CHANGED_TOPIC};
use crate::{ClickerConfig, Coordinate, EngineState, MacroConfig};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const RELINK_INITIAL_DELAY: Duration = Duration::from_millis(250);
const RELINK_MAX_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct IpcConfig {
    pub addr: SocketAddr,
    /// Applies to every request except `capture_position`.
    pub request_timeout: Duration,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 47615)),
            request_timeout: Duration::from_millis(2000),
        }
    }
}

#[derive(Serialize)]
struct RequestFrame<'a, P> {
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum IncomingFrame {
    Response {
        id: u64,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
    Event {
        event: String,
        #[serde(default)]
        payload: Value,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MacroConfigParams<'a> {
    part1_binding: &'a str,
    part2_binding: &'a str,
    dodge_binding: &'a str,
    safe_pocket_x: i32,
    safe_pocket_y: i32,
    quick_use_x: i32,
    quick_use_y: i32,
    step_delay_ms: u32,
}

impl<'a> From<&'a MacroConfig> for MacroConfigParams<'a> {
    fn from(config: &'a MacroConfig) -> Self {
        Self {
            part1_binding: config.part1_binding.as_str(),
            part2_binding: config.part2_binding.as_str(),
            dodge_binding: config.dodge_binding.as_str(),
            safe_pocket_x: config.safe_pocket.x,
            safe_pocket_y: config.safe_pocket.y,
            quick_use_x: config.quick_use.x,
            quick_use_y: config.quick_use.y,
            step_delay_ms: config.step_delay_ms,
        }
    }
}

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, String>>>>>;

struct Connection {
    writer: OwnedWriteHalf,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    reader: JoinHandle<()>,
}

impl Connection {
    async fn open(shared: &Arc<Shared>) -> EngineResult<Self> {
        let addr = shared.config.addr;
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| EngineError::Unavailable(format!("{addr}: {e}")))?;
        let (read_half, writer) = stream.into_split();

        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let alive = Arc::new(AtomicBool::new(true));
        let reader = tokio::spawn(read_frames(
            read_half,
            pending.clone(),
            alive.clone(),
            Arc::downgrade(shared),
        ));

        info!(%addr, "Connected to engine");
        Ok(Self {
            writer,
            pending,
            alive,
            reader,
        })
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    async fn send_line(&mut self, line: &str) -> std::io::Result<()> {
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Reads frames until EOF, routing responses to their waiters and state
/// events to subscribers. Pending requests fail with `Closed` when it ends,
/// and the event link is re-established if anyone is still subscribed.
async fn read_frames(
    read_half: OwnedReadHalf,
    pending: PendingMap,
    alive: Arc<AtomicBool>,
    shared: Weak<Shared>,
) {
    let Some(events) = shared.upgrade().map(|shared| shared.events.clone()) else {
        return;
    };
    let mut lines = BufReader::new(read_half).lines();

    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                debug!("Engine closed the connection");
                break;
            }
            Err(e) => {
                warn!(error = %e, "Engine read failed");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<IncomingFrame>(&line) {
            Ok(IncomingFrame::Response { id, result, error }) => {
                let waiter = pending.lock().unwrap().remove(&id);
                match waiter {
                    Some(tx) => {
                        let outcome = match error {
                            Some(message) => Err(message),
                            None => Ok(result.unwrap_or(Value::Null)),
                        };
                        let _ = tx.send(outcome);
                    }
                    None => debug!(id, "Response for unknown or expired request"),
                }
            }
            Ok(IncomingFrame::Event { event, payload }) if event == STATE_CHANGED_TOPIC => {
                match serde_json::from_value::<EngineState>(payload) {
                    Ok(state) => {
                        debug!(?state, "Engine state event");
                        let _ = events.send(state);
                    }
                    Err(e) => warn!(error = %e, "Malformed state event"),
                }
            }
            Ok(IncomingFrame::Event { event, .. }) => debug!(%event, "Ignoring engine event"),
            Err(e) => warn!(error = %e, "Unparsable engine frame"),
        }
    }

    alive.store(false, Ordering::SeqCst);
    // Dropping the senders fails every waiter with `Closed`.
    pending.lock().unwrap().clear();
    drop(events);

    if let Some(shared) = shared.upgrade() {
        spawn_relink(&shared);
    }
}

/// State shared between the client, its connection readers and the
/// background relink task. Readers and the relink task hold it weakly.
struct Shared {
    config: IpcConfig,
    connection: tokio::sync::Mutex<Option<Connection>>,
    events: broadcast::Sender<EngineState>,
    relinking: AtomicBool,
}

/// Start the background relink loop unless nobody is subscribed or one is
/// already running.
fn spawn_relink(shared: &Arc<Shared>) {
    if shared.events.receiver_count() == 0 {
        return;
    }
    if shared.relinking.swap(true, Ordering::SeqCst) {
        return;
    }
    match tokio::runtime::Handle::try_current() {
        Ok(runtime) => {
            runtime.spawn(relink(Arc::downgrade(shared)));
        }
        Err(_) => {
            shared.relinking.store(false, Ordering::SeqCst);
            debug!("No runtime, event link will open on the next request");
        }
    }
}

async fn relink(shared: Weak<Shared>) {
    let mut delay = RELINK_INITIAL_DELAY;
    loop {
        let Some(strong) = shared.upgrade() else {
            return;
        };
        if try_relink(&strong).await {
            strong.relinking.store(false, Ordering::SeqCst);
            // A connection that died while the flag was still set
            // would otherwise be left without a relink.
            let alive = strong
                .connection
                .lock()
                .await
                .as_ref()
                .map_or(true, Connection::is_alive);
            if !alive {
                spawn_relink(&strong);
            }
            return;
        }
        drop(strong);

        tokio::time::sleep(delay).await;
        delay = (delay * 2).min(RELINK_MAX_DELAY);
    }
}

/// One relink attempt. Returns true when there is nothing left to do.
async fn try_relink(shared: &Arc<Shared>) -> bool {
    if shared.events.receiver_count() == 0 {
        debug!("No state subscribers, leaving the engine link closed");
        return true;
    }

    let mut slot = shared.connection.lock().await;
    if slot.as_ref().map_or(false, Connection::is_alive) {
        return true;
    }
    match Connection::open(shared).await {
        Ok(connection) => {
            *slot = Some(connection);
            info!("Engine event stream restored");
            true
        }
        Err(e) => {
            debug!(error = %e, "Engine still unreachable");
            false
        }
    }
}

/// [`EngineClient`] speaking the line protocol above.
pub struct IpcEngineClient {
    shared: Arc<Shared>,
    next_id: AtomicU64,
}

impl IpcEngineClient {
    /// Create a client. Nothing is connected until the first request or
    /// state subscription.
    pub fn new(config: IpcConfig) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            shared: Arc::new(Shared {
                config,
                connection: tokio::sync::Mutex::new(None),
                events,
                relinking: AtomicBool::new(false),
            }),
            next_id: AtomicU64::new(1),
        }
    }

    /// Create a client and connect right away.
    pub async fn connect(config: IpcConfig) -> EngineResult<Self> {
        let client = Self::new(config);
        let connection = Connection::open(&client.shared).await?;
        *client.shared.connection.lock().await = Some(connection);
        Ok(client)
    }

    async fn request<P, R>(
        &self,
        method: &'static str,
        params: P,
        timeout: Option<Duration>,
    ) -> EngineResult<R>
    where
        P: Serialize + Send,
        R: DeserializeOwned,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let line = serde_json::to_string(&RequestFrame { id, method, params })?;

        // Only hold the connection lock while writing; responses may take
        // arbitrarily long (capture_position waits for the user).
        let rx = {
            let mut slot = self.shared.connection.lock().await;
            let mut connection = match slot.take() {
                Some(connection) if connection.is_alive() => connection,
                _ => Connection::open(&self.shared).await?,
            };

            let (tx, rx) = oneshot::channel();
            connection.pending.lock().unwrap().insert(id, tx);

            if let Err(e) = connection.send_line(&line).await {
                connection.pending.lock().unwrap().remove(&id);
                warn!(method, error = %e, "Engine write failed, dropping connection");
                return Err(EngineError::Unavailable(e.to_string()));
            }
            *slot = Some(connection);
            rx
        };
        debug!(id, method, "Engine request sent");

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, rx).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    self.forget(id).await;
                    return Err(EngineError::Timeout(method));
                }
            },
            None => rx.await,
        };

        match outcome {
            Ok(Ok(value)) => Ok(serde_json::from_value(value)?),
            Ok(Err(message)) => Err(EngineError::Rejected { method, message }),
            Err(_) => Err(EngineError::Closed),
        }
    }

    async fn forget(&self, id: u64) {
        if let Some(connection) = self.shared.connection.lock().await.as_ref() {
            connection.pending.lock().unwrap().remove(&id);
        }
    }
}

#[async_trait]
impl EngineClient for IpcEngineClient {
    async fn update_config(&self, config: &ClickerConfig) -> EngineResult<()> {
        let timeout = Some(self.shared.config.request_timeout);
        self.request("update_config", config, timeout).await
    }

    async fn update_macro_config(&self, config: &MacroConfig) -> EngineResult<()> {
        let timeout = Some(self.shared.config.request_timeout);
        self.request("update_macro_config", MacroConfigParams::from(config), timeout)
            .await
    }

    async fn get_clicker_state(&self) -> EngineResult<ClickerStateReply> {
        let timeout = Some(self.shared.config.request_timeout);
        self.request("get_clicker_state", Value::Null, timeout).await
    }

    async fn toggle_clicker(&self) -> EngineResult<()> {
        let timeout = Some(self.shared.config.request_timeout);
        self.request("toggle_clicker", Value::Null, timeout).await
    }

    async fn capture_position(&self) -> EngineResult<Coordinate> {
        let (x, y): (i32, i32) = self.request("capture_position", Value::Null, None).await?;
        Ok(Coordinate::new(x, y))
    }

    fn subscribe_state(&self) -> broadcast::Receiver<EngineState> {
        let rx = self.shared.events.subscribe();
        spawn_relink(&self.shared);
        rx
    }
}
