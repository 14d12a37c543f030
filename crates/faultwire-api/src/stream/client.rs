//! Persistent TCP alarm stream with watchdog and auto-reconnect.
//!
//! One background task owns the socket, the data-timeout watchdog and the
//! reconnect delay, so the three can never get out of step. Parsed alarm
//! blocks are pushed through a bounded [`tokio::sync::mpsc`] channel in
//! arrival order.
//!
//! # Example
//!
//! ```rust,ignore
//! use faultwire_api::stream::{StreamClient, StreamEvent, StreamSettings};
//! use tokio::sync::mpsc;
//!
//! let client = StreamClient::new(StreamSettings::new("10.0.0.5", 31232));
//! let (tx, mut rx) = mpsc::channel(1024);
//! client.start(tx);
//!
//! while let Some(event) = rx.recv().await {
//!     if let StreamEvent::Alarm(fields) = event {
//!         println!("{fields:?}");
//!     }
//! }
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use secrecy::SecretString;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::backoff::{Backoff, DEFAULT_BASE_DELAY, DEFAULT_MAX_DELAY};
use super::framing::{BlockBuffer, DEFAULT_BUFFER_LIMIT};
use super::login::LoginTracker;
use super::message::{BlockMessage, FieldMap, parse_block};
use crate::error::Error;

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Default watchdog window: no byte for this long forces a reconnect.
pub const DEFAULT_DATA_TIMEOUT: Duration = Duration::from_secs(120);

/// Default bound on a single TCP connect attempt.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ── Settings ─────────────────────────────────────────────────────────

/// Connection parameters for the alarm stream.
#[derive(Debug, Clone)]
pub struct StreamSettings {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<SecretString>,
    /// Base reconnect delay. Default: 15s.
    pub reconnect_delay: Duration,
    /// Reconnect delay cap. Default: 30s.
    pub max_reconnect_delay: Duration,
    /// Watchdog window. Default: 120s.
    pub data_timeout: Duration,
    pub connect_timeout: Duration,
    /// Receive buffer bound. Default: 64 KiB.
    pub buffer_limit: usize,
}

impl StreamSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            reconnect_delay: DEFAULT_BASE_DELAY,
            max_reconnect_delay: DEFAULT_MAX_DELAY,
            data_timeout: DEFAULT_DATA_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            buffer_limit: DEFAULT_BUFFER_LIMIT,
        }
    }
}

// ── State & events ───────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Disconnected,
    Connecting,
    /// Socket is up; no block received yet.
    Connected,
    /// At least one block has been received on this connection.
    Streaming,
    Reconnecting { attempt: u32 },
    Stopped,
}

impl StreamState {
    pub fn is_up(self) -> bool {
        matches!(self, Self::Connected | Self::Streaming)
    }
}

/// Everything the connection task reports to its consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Connected,
    Disconnected { reason: String },
    Handshake(String),
    Alarm(FieldMap),
}

// ── StreamClient ─────────────────────────────────────────────────────

struct Running {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owner of the single background connection task.
pub struct StreamClient {
    settings: Arc<StreamSettings>,
    state: Arc<watch::Sender<StreamState>>,
    running: Mutex<Option<Running>>,
}

impl StreamClient {
    pub fn new(settings: StreamSettings) -> Self {
        let (state, _) = watch::channel(StreamState::Disconnected);
        Self {
            settings: Arc::new(settings),
            state: Arc::new(state),
            running: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> &StreamSettings {
        &self.settings
    }

    /// Spawn the connection task, feeding `events`.
    ///
    /// Returns `false` without doing anything if a task is already alive,
    /// so a second call can never create a second socket or reconnect timer.
    pub fn start(&self, events: mpsc::Sender<StreamEvent>) -> bool {
        let mut running = self
            .running
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        if running.as_ref().is_some_and(|r| !r.handle.is_finished()) {
            debug!("stream client already running");
            return false;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            Arc::clone(&self.settings),
            Arc::clone(&self.state),
            events,
            cancel.clone(),
        ));
        *running = Some(Running { cancel, handle });
        true
    }

    /// `true` while the connection task is alive.
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .as_ref()
            .is_some_and(|r| !r.handle.is_finished())
    }

    /// Cancel timers, drop the socket and disable reconnection. Idempotent.
    pub async fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();

        if let Some(Running { cancel, handle }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "stream task ended abnormally");
            }
        }
        self.state.send_replace(StreamState::Stopped);
    }

    pub fn state(&self) -> StreamState {
        *self.state.borrow()
    }

    /// Subscribe to connection state changes.
    pub fn subscribe_state(&self) -> watch::Receiver<StreamState> {
        self.state.subscribe()
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        if let Ok(mut running) = self.running.lock() {
            if let Some(r) = running.take() {
                r.cancel.cancel();
            }
        }
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on failure, backoff → reconnect.
async fn run_loop(
    settings: Arc<StreamSettings>,
    state: Arc<watch::Sender<StreamState>>,
    events: mpsc::Sender<StreamEvent>,
    cancel: CancellationToken,
) {
    let mut backoff = Backoff::new(settings.reconnect_delay, settings.max_reconnect_delay);

    loop {
        state.send_replace(StreamState::Connecting);

        let reason = match connect_and_read(&settings, &state, &events, &cancel, &mut backoff).await
        {
            Ok(()) => break,
            Err(e) => e.to_string(),
        };

        state.send_replace(StreamState::Disconnected);
        if events
            .send(StreamEvent::Disconnected {
                reason: reason.clone(),
            })
            .await
            .is_err()
        {
            break;
        }

        let attempt = backoff.attempts();
        let delay = backoff.next_delay();
        state.send_replace(StreamState::Reconnecting { attempt });
        info!(
            error = %reason,
            attempt,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "alarm stream down, waiting before reconnect"
        );

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }
    }

    state.send_replace(StreamState::Stopped);
    debug!("stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Hold one connection until it fails.
///
/// `Ok(())` means the task should exit (cancelled, or nobody is listening
/// anymore); every `Err` leads to a reconnect.
async fn connect_and_read(
    settings: &StreamSettings,
    state: &watch::Sender<StreamState>,
    events: &mpsc::Sender<StreamEvent>,
    cancel: &CancellationToken,
    backoff: &mut Backoff,
) -> Result<(), Error> {
    info!(host = %settings.host, port = settings.port, "connecting to alarm stream");

    let connect = tokio::time::timeout(
        settings.connect_timeout,
        TcpStream::connect((settings.host.as_str(), settings.port)),
    );
    let mut socket = tokio::select! {
        biased;
        _ = cancel.cancelled() => return Ok(()),
        result = connect => result.map_err(|_| Error::Timeout {
            timeout_ms: u64::try_from(settings.connect_timeout.as_millis()).unwrap_or(u64::MAX),
        })??,
    };

    backoff.reset();
    state.send_replace(StreamState::Connected);
    info!("alarm stream connected");
    if events.send(StreamEvent::Connected).await.is_err() {
        return Ok(());
    }

    let mut buffer = BlockBuffer::new(settings.buffer_limit);
    let mut login = LoginTracker::new(settings.username.clone(), settings.password.clone());
    let mut chunk = vec![0_u8; READ_CHUNK_SIZE];

    let watchdog = tokio::time::sleep(settings.data_timeout);
    tokio::pin!(watchdog);

    loop {
        let read = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(()),
            () = &mut watchdog => {
                warn!(timeout_secs = settings.data_timeout.as_secs(), "no data from alarm stream");
                return Err(Error::DataTimeout { timeout_secs: settings.data_timeout.as_secs() });
            }
            read = socket.read(&mut chunk) => read?,
        };

        if read == 0 {
            return Err(Error::Closed);
        }
        watchdog.as_mut().reset(Instant::now() + settings.data_timeout);

        let data = &chunk[..read];
        let reply = login.observe(data);
        if !reply.is_empty() {
            socket.write_all(&reply).await?;
        }

        for content in buffer.push(data) {
            if *state.borrow() == StreamState::Connected {
                state.send_replace(StreamState::Streaming);
            }

            let event = match parse_block(&content) {
                BlockMessage::Handshake(value) => {
                    debug!(%value, "stream handshake");
                    StreamEvent::Handshake(value)
                }
                BlockMessage::NonAlarm => {
                    debug!(len = content.len(), "non-alarm block discarded");
                    continue;
                }
                BlockMessage::Alarm(fields) => StreamEvent::Alarm(fields),
            };

            if events.send(event).await.is_err() {
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_defaults() {
        let settings = StreamSettings::new("nbi.example.net", 31232);
        assert_eq!(settings.reconnect_delay, Duration::from_secs(15));
        assert_eq!(settings.max_reconnect_delay, Duration::from_secs(30));
        assert_eq!(settings.data_timeout, Duration::from_secs(120));
        assert_eq!(settings.buffer_limit, 64 * 1024);
        assert!(settings.username.is_none());
    }

    #[test]
    fn up_states() {
        assert!(StreamState::Connected.is_up());
        assert!(StreamState::Streaming.is_up());
        assert!(!StreamState::Reconnecting { attempt: 0 }.is_up());
        assert!(!StreamState::Stopped.is_up());
    }
}
