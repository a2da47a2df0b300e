use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;

use super::machine::{ChannelMachine, ChannelState, CloseDecision, ReconnectPolicy};
use crate::error::ChannelError;

const EVENT_CAPACITY: usize = 256;

/// What subscribers of a [`RealtimeChannel`] observe.
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent<T> {
    Open,
    Message(T),
    Error(ChannelError),
    Close,
}

/// Opens push connections. Implemented over WebSocket by
/// [`super::WsConnector`]; tests script their own.
#[async_trait]
pub trait PushConnector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Box<dyn PushConnection>, ChannelError>;
}

#[async_trait]
pub trait PushConnection: Send {
    /// Next text frame. `None` once the peer has closed.
    async fn next_frame(&mut self) -> Option<Result<String, ChannelError>>;

    async fn send_text(&mut self, text: String) -> Result<(), ChannelError>;

    async fn close(&mut self);
}

struct Shared<T> {
    machine: ChannelMachine,
    last_message: Option<T>,
    /// Frames queued for the live connection; present only while open
    outbound: Option<mpsc::UnboundedSender<String>>,
    /// Bumped on every driver spawn; older drivers exit without side effects
    generation: u64,
    stop: Arc<Notify>,
    driver: Option<JoinHandle<()>>,
}

/// Push connection with automatic fixed-delay reconnect.
///
/// Inbound frames are parsed as `T`; frames that fail to parse are logged
/// and dropped without affecting the connection.
pub struct RealtimeChannel<T> {
    url: String,
    connector: Arc<dyn PushConnector>,
    shared: Arc<Mutex<Shared<T>>>,
    events: broadcast::Sender<ChannelEvent<T>>,
}

impl<T> RealtimeChannel<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    pub fn new(
        url: impl Into<String>,
        connector: Arc<dyn PushConnector>,
        policy: ReconnectPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            url: url.into(),
            connector,
            shared: Arc::new(Mutex::new(Shared {
                machine: ChannelMachine::new(policy),
                last_message: None,
                outbound: None,
                generation: 0,
                stop: Arc::new(Notify::new()),
                driver: None,
            })),
            events,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChannelEvent<T>> {
        self.events.subscribe()
    }

    pub fn state(&self) -> ChannelState {
        self.shared.lock().machine.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ChannelState::Open
    }

    pub fn attempts(&self) -> u32 {
        self.shared.lock().machine.attempts()
    }

    pub fn last_error(&self) -> Option<ChannelError> {
        self.shared.lock().machine.last_error().cloned()
    }

    pub fn last_message(&self) -> Option<T> {
        self.shared.lock().last_message.clone()
    }

    /// Start connecting. Does nothing while a previous driver is still
    /// running or after [`RealtimeChannel::disconnect`].
    pub fn connect(&self) {
        let mut shared = self.shared.lock();
        if shared.machine.is_disconnected() {
            tracing::debug!("Push channel {} is disconnected; use reconnect()", self.url);
            return;
        }
        if shared
            .driver
            .as_ref()
            .is_some_and(|driver| !driver.is_finished())
        {
            return;
        }
        self.spawn_driver(&mut shared);
    }

    /// Drop whatever connection or pending retry exists and start over with
    /// a fresh attempt budget.
    pub fn reconnect(&self) {
        let mut shared = self.shared.lock();
        shared.stop.notify_one();
        shared.outbound = None;
        shared.machine.rearm();
        self.spawn_driver(&mut shared);
    }

    /// Close for good: no further automatic reconnects, pending retry
    /// cancelled, live connection closed.
    pub fn disconnect(&self) {
        let mut shared = self.shared.lock();
        shared.machine.disconnect();
        shared.outbound = None;
        shared.stop.notify_one();
    }

    /// Queue `message` as a JSON text frame. Returns false unless the channel
    /// is open; never fails otherwise.
    pub fn send_message<M: Serialize + ?Sized>(&self, message: &M) -> bool {
        let shared = self.shared.lock();
        if shared.machine.state() != ChannelState::Open {
            return false;
        }
        let Some(outbound) = shared.outbound.as_ref() else {
            return false;
        };
        match serde_json::to_string(message) {
            Ok(text) => outbound.send(text).is_ok(),
            Err(err) => {
                tracing::warn!("Error serializing push message: {}", err);
                false
            }
        }
    }

    fn spawn_driver(&self, shared: &mut Shared<T>) {
        shared.generation += 1;
        shared.stop = Arc::new(Notify::new());
        let driver = Driver {
            url: self.url.clone(),
            connector: self.connector.clone(),
            shared: self.shared.clone(),
            events: self.events.clone(),
            stop: shared.stop.clone(),
            generation: shared.generation,
        };
        shared.driver = Some(tokio::spawn(driver.run()));
    }
}

impl<T> Drop for RealtimeChannel<T> {
    fn drop(&mut self) {
        let mut shared = self.shared.lock();
        shared.machine.disconnect();
        shared.outbound = None;
        shared.stop.notify_one();
    }
}

struct Driver<T> {
    url: String,
    connector: Arc<dyn PushConnector>,
    shared: Arc<Mutex<Shared<T>>>,
    events: broadcast::Sender<ChannelEvent<T>>,
    stop: Arc<Notify>,
    generation: u64,
}

impl<T> Driver<T>
where
    T: DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Run `update` on the shared state if this driver is still the current
    /// one. Returns `None` for a superseded driver.
    fn with_current<R>(&self, update: impl FnOnce(&mut Shared<T>) -> R) -> Option<R> {
        let mut shared = self.shared.lock();
        if shared.generation != self.generation {
            return None;
        }
        Some(update(&mut shared))
    }

    fn emit(&self, event: ChannelEvent<T>) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    async fn run(self) {
        loop {
            let proceed = self.with_current(|shared| {
                if shared.machine.is_disconnected() {
                    return false;
                }
                shared.machine.begin_connect();
                true
            });
            if proceed != Some(true) {
                return;
            }

            self.run_session().await;

            let Some(decision) = self.with_current(|shared| {
                shared.outbound = None;
                shared.machine.on_close()
            }) else {
                return;
            };
            self.emit(ChannelEvent::Close);

            match decision {
                CloseDecision::Stop => {
                    tracing::info!("Push channel {} closed", self.url);
                    return;
                }
                CloseDecision::Reconnect { after, attempt } => {
                    tracing::info!(
                        "Push channel {} closed, reconnecting in {:?} (attempt {})",
                        self.url,
                        after,
                        attempt
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(after) => {}
                        _ = self.stop.notified() => return,
                    }
                }
            }
        }
    }

    /// One connection from connect attempt to close.
    async fn run_session(&self) {
        let connected = tokio::select! {
            biased;
            _ = self.stop.notified() => return,
            result = self.connector.connect(&self.url) => result,
        };
        let mut connection = match connected {
            Ok(connection) => connection,
            Err(err) => {
                self.report_error(err);
                return;
            }
        };

        let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
        let opened = self.with_current(|shared| {
            if shared.machine.is_disconnected() {
                return false;
            }
            shared.machine.on_open();
            shared.outbound = Some(outbound_tx);
            true
        });
        if opened != Some(true) {
            connection.close().await;
            return;
        }
        tracing::info!("Push channel connected: {}", self.url);
        self.emit(ChannelEvent::Open);

        loop {
            tokio::select! {
                _ = self.stop.notified() => {
                    connection.close().await;
                    break;
                }
                Some(text) = outbound_rx.recv() => {
                    if let Err(err) = connection.send_text(text).await {
                        self.report_error(err);
                    }
                }
                frame = connection.next_frame() => match frame {
                    Some(Ok(text)) => self.handle_frame(&text),
                    Some(Err(err)) => self.report_error(err),
                    None => break,
                },
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        match serde_json::from_str::<T>(text) {
            Ok(message) => {
                let current = self
                    .with_current(|shared| shared.last_message = Some(message.clone()))
                    .is_some();
                if current {
                    self.emit(ChannelEvent::Message(message));
                }
            }
            Err(err) => {
                tracing::warn!("Error parsing push message: {}", err);
            }
        }
    }

    fn report_error(&self, err: ChannelError) {
        tracing::warn!("Push channel {} error: {}", self.url, err);
        if self
            .with_current(|shared| shared.machine.on_error(err.clone()))
            .is_some()
        {
            self.emit(ChannelEvent::Error(err));
        }
    }
}
