//! Transport adapter for the canvas channel.
//!
//! The transport only moves text frames. It does not reconnect, reorder or
//! interpret messages; decoding happens in the reconciler.

use thiserror::Error;

/// Transport errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("already connected")]
    AlreadyConnected,
    #[error("not connected")]
    NotConnected,
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
    #[error("invalid WebSocket URL scheme: {0}")]
    InvalidScheme(String),
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Where the canvas channel stands, as shown by the connectivity flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionState {
    /// State after observing `event`; message events leave it unchanged.
    pub fn after(self, event: &SyncEvent) -> Self {
        match event {
            SyncEvent::Connected => Self::Connected,
            SyncEvent::Disconnected => Self::Disconnected,
            SyncEvent::Error { .. } => Self::Error,
            SyncEvent::Message(_) => self,
        }
    }
}

/// Something the transport observed since the last poll.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    Connected,
    Disconnected,
    /// One inbound text frame, undecoded.
    Message(String),
    Error { message: String },
}

/// A text channel the session loop can drive without blocking.
pub trait Transport {
    /// Hand a message to the channel for sending.
    fn send(&self, msg: &str) -> Result<(), SyncError>;

    /// Events received since the previous call.
    fn poll_events(&mut self) -> Vec<SyncEvent>;

    fn state(&self) -> ConnectionState;

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

#[cfg(not(target_arch = "wasm32"))]
mod socket {
    use std::io::ErrorKind;
    use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;

    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{Message, WebSocket};
    use url::Url;

    use super::{ConnectionState, SyncError, SyncEvent, Transport};

    /// How long a socket read may block before queued sends are flushed.
    const READ_TIMEOUT: Duration = Duration::from_millis(50);
    const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    type Socket = WebSocket<MaybeTlsStream<std::net::TcpStream>>;

    enum SocketCommand {
        Send(String),
        Close,
    }

    /// Canvas channel over a blocking tungstenite socket.
    ///
    /// The socket lives on a worker thread; frames cross to and from it over
    /// channels so `poll_events` and `send` never block the caller.
    pub struct CanvasSocket {
        state: ConnectionState,
        commands: Option<Sender<SocketCommand>>,
        events: Option<Receiver<SyncEvent>>,
        worker: Option<JoinHandle<()>>,
    }

    impl CanvasSocket {
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                commands: None,
                events: None,
                worker: None,
            }
        }

        /// Open the channel to a `ws://` or `wss://` endpoint.
        ///
        /// The handshake runs on the worker; its outcome is reported as a
        /// `Connected` or `Error` event.
        pub fn connect(&mut self, endpoint: &str) -> Result<(), SyncError> {
            if self.commands.is_some() {
                return Err(SyncError::AlreadyConnected);
            }
            let url = Url::parse(endpoint).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
            if !matches!(url.scheme(), "ws" | "wss") {
                return Err(SyncError::InvalidScheme(url.scheme().to_string()));
            }

            let (command_tx, command_rx) = mpsc::channel();
            let (event_tx, event_rx) = mpsc::channel();
            let worker = thread::spawn(move || run_worker(url, command_rx, event_tx));

            self.state = ConnectionState::Connecting;
            self.commands = Some(command_tx);
            self.events = Some(event_rx);
            self.worker = Some(worker);
            Ok(())
        }

        /// Close the channel. Events not yet polled are dropped.
        pub fn disconnect(&mut self) {
            if let Some(commands) = self.commands.take() {
                let _ = commands.send(SocketCommand::Close);
            }
            self.events = None;
            self.worker = None;
            self.state = ConnectionState::Disconnected;
        }
    }

    fn run_worker(url: Url, commands: Receiver<SocketCommand>, events: Sender<SyncEvent>) {
        log::info!("Opening canvas socket to {}", url);
        let mut socket = match tungstenite::connect(url.as_str()) {
            Ok((socket, response)) => {
                log::info!("Canvas socket open ({})", response.status());
                socket
            }
            Err(e) => {
                log::error!("Canvas socket handshake failed: {}", e);
                let _ = events.send(SyncEvent::Error {
                    message: format!("connect to {} failed: {}", url, e),
                });
                return;
            }
        };
        let _ = events.send(SyncEvent::Connected);
        set_timeouts(&mut socket);

        while pump(&mut socket, &commands, &events) {}

        log::info!("Canvas socket closed");
        let _ = events.send(SyncEvent::Disconnected);
    }

    fn set_timeouts(socket: &mut Socket) {
        match socket.get_mut() {
            MaybeTlsStream::Plain(tcp) => {
                let _ = tcp.set_read_timeout(Some(READ_TIMEOUT));
                let _ = tcp.set_write_timeout(Some(WRITE_TIMEOUT));
            }
            #[allow(unreachable_patterns)]
            _ => log::debug!("Canvas socket is not plain TCP, keeping default timeouts"),
        }
    }

    /// Flush every queued command, then wait up to one read timeout for a
    /// frame. Returns `false` once the session is over.
    fn pump(socket: &mut Socket, commands: &Receiver<SocketCommand>, events: &Sender<SyncEvent>) -> bool {
        loop {
            match commands.try_recv() {
                Ok(SocketCommand::Send(text)) => {
                    log::debug!("Canvas socket sending {} bytes", text.len());
                    if let Err(e) = socket.send(Message::Text(text)) {
                        log::error!("Canvas socket write failed: {}", e);
                        return false;
                    }
                }
                Ok(SocketCommand::Close) => {
                    let _ = socket.close(None);
                    return false;
                }
                // The owning `CanvasSocket` was dropped.
                Err(TryRecvError::Disconnected) => return false,
                Err(TryRecvError::Empty) => break,
            }
        }

        match socket.read() {
            Ok(Message::Text(text)) => events.send(SyncEvent::Message(text)).is_ok(),
            Ok(Message::Close(frame)) => {
                log::info!("Canvas socket closed by server: {:?}", frame);
                false
            }
            // Pings are answered by tungstenite on the next write or read.
            Ok(_) => true,
            Err(tungstenite::Error::Io(e))
                if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                true
            }
            Err(e) => {
                log::error!("Canvas socket read failed: {}", e);
                false
            }
        }
    }

    impl Transport for CanvasSocket {
        fn send(&self, msg: &str) -> Result<(), SyncError> {
            let commands = self.commands.as_ref().ok_or(SyncError::NotConnected)?;
            commands
                .send(SocketCommand::Send(msg.to_owned()))
                .map_err(|e| SyncError::SendFailed(e.to_string()))
        }

        fn poll_events(&mut self) -> Vec<SyncEvent> {
            let Some(events) = &self.events else {
                return Vec::new();
            };
            let drained: Vec<SyncEvent> = events.try_iter().collect();
            for event in &drained {
                self.state = self.state.after(event);
            }
            drained
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    impl Default for CanvasSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for CanvasSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use socket::CanvasSocket;
