//! Keeps one connection to the unit alive and mirrors its state into a store.

pub mod machine;

use std::collections::VecDeque;
use std::future;
use std::io;
use std::pin::Pin;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Duration, Instant, Interval, MissedTickBehavior, Sleep};

use crate::command::{CommandRequest, CommandTranslator};
use crate::session::machine::{Effect, SessionEvent, SessionMachine};
use crate::state::StateUpdate;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 23;

const POLL_INTERVAL: Duration = Duration::from_millis(2000);
const RECONNECT_DELAY: Duration = Duration::from_secs(60);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const READ_BUFFER: usize = 256;

#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub poll_interval: Duration,
    pub reconnect_delay: Duration,
    pub connect_timeout: Duration,
    /// Reject commands carrying values the codec doesn't know instead of
    /// sending them with the field left unchanged.
    pub strict_values: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            poll_interval: POLL_INTERVAL,
            reconnect_delay: RECONNECT_DELAY,
            connect_timeout: CONNECT_TIMEOUT,
            strict_values: false,
        }
    }
}

/// Receives everything the session publishes.
pub trait StateStore: Send + 'static {
    fn set_state(&mut self, update: StateUpdate);
}

impl StateStore for mpsc::UnboundedSender<StateUpdate> {
    fn set_state(&mut self, update: StateUpdate) {
        if self.send(update).is_err() {
            trace!("state update sent to no receiver");
        }
    }
}

#[async_trait]
pub trait Connector: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self, host: &str, port: u16) -> io::Result<Self::Stream>;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    type Stream = TcpStream;

    async fn connect(&self, host: &str, port: u16) -> io::Result<TcpStream> {
        TcpStream::connect((host, port)).await
    }
}

#[derive(Clone, Debug)]
pub enum SessionMessage {
    Command(CommandRequest),
    Stop,
}

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Could not send message to session task")]
    Send,
    #[error("Session task failed")]
    Join(#[from] JoinError),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// Handle to a running session task.
#[derive(Debug)]
pub struct Session {
    handle: JoinHandle<()>,
    message_sender: mpsc::UnboundedSender<SessionMessage>,
}

impl Session {
    pub fn start<S: StateStore>(config: SessionConfig, store: S) -> Session {
        Self::start_with(config, TcpConnector, store)
    }

    pub fn start_with<C: Connector, S: StateStore>(
        config: SessionConfig,
        connector: C,
        store: S,
    ) -> Session {
        let (message_sender, message_receiver) = mpsc::unbounded_channel();
        let driver = Driver {
            machine: SessionMachine::new(CommandTranslator::new(config.strict_values)),
            config,
            connector,
            store,
            stream: None,
            poll: None,
            reconnect: None,
            finished: false,
        };
        let handle = tokio::spawn(driver.run(message_receiver));
        Session {
            handle,
            message_sender,
        }
    }

    pub fn command(&self, request: CommandRequest) -> Result<()> {
        self.message_sender
            .send(SessionMessage::Command(request))
            .map_err(|_| SessionError::Send)
    }

    pub async fn stop(self) -> Result<()> {
        self.message_sender
            .send(SessionMessage::Stop)
            .map_err(|_| SessionError::Send)?;
        Ok(self.handle.await?)
    }
}

struct Driver<C: Connector, S: StateStore> {
    config: SessionConfig,
    connector: C,
    store: S,
    machine: SessionMachine,
    stream: Option<C::Stream>,
    poll: Option<Interval>,
    reconnect: Option<Pin<Box<Sleep>>>,
    finished: bool,
}

impl<C: Connector, S: StateStore> Driver<C, S> {
    async fn run(mut self, mut messages: mpsc::UnboundedReceiver<SessionMessage>) {
        let mut events = VecDeque::from([SessionEvent::Start]);
        loop {
            while let Some(event) = events.pop_front() {
                for effect in self.machine.handle(event) {
                    if let Some(next) = self.apply(effect).await {
                        events.push_back(next);
                    }
                }
            }
            if self.finished {
                trace!("session task finished");
                return;
            }
            events.push_back(self.next_event(&mut messages).await);
        }
    }

    async fn next_event(
        &mut self,
        messages: &mut mpsc::UnboundedReceiver<SessionMessage>,
    ) -> SessionEvent {
        let event = tokio::select! {
            message = messages.recv() => match message {
                Some(SessionMessage::Command(request)) => SessionEvent::Command(request),
                Some(SessionMessage::Stop) => SessionEvent::Stop,
                None => {
                    info!("session handle dropped before stop signal");
                    SessionEvent::Stop
                }
            },
            read = read_chunk(self.stream.as_mut()) => match read {
                Ok(chunk) if chunk.is_empty() => SessionEvent::Closed,
                Ok(chunk) => SessionEvent::Data(chunk),
                Err(e) => SessionEvent::TransportError(e.to_string()),
            },
            _ = tick(self.poll.as_mut()) => SessionEvent::PollTick,
            _ = elapsed(self.reconnect.as_mut()) => SessionEvent::ReconnectElapsed,
        };
        if event == SessionEvent::ReconnectElapsed {
            self.reconnect = None;
        }
        event
    }

    async fn apply(&mut self, effect: Effect) -> Option<SessionEvent> {
        match effect {
            Effect::Connect => {
                let (host, port) = (self.config.host.as_str(), self.config.port);
                debug!("connecting to {}:{}", host, port);
                match time::timeout(
                    self.config.connect_timeout,
                    self.connector.connect(host, port),
                )
                .await
                {
                    Ok(Ok(stream)) => {
                        info!("connected to {}:{}", host, port);
                        self.stream = Some(stream);
                        Some(SessionEvent::Connected)
                    }
                    Ok(Err(e)) => Some(SessionEvent::ConnectFailed(e.to_string())),
                    Err(_) => Some(SessionEvent::ConnectFailed(format!(
                        "timed out after {:?}",
                        self.config.connect_timeout
                    ))),
                }
            }
            Effect::Send(frame) => match self.stream.as_mut() {
                Some(stream) => match stream.write_all(frame.as_ref()).await {
                    Ok(()) => {
                        trace!("sent {}", frame);
                        Some(SessionEvent::Sent)
                    }
                    Err(e) => Some(SessionEvent::TransportError(e.to_string())),
                },
                None => {
                    warn!("no connection to send {} on", frame);
                    None
                }
            },
            Effect::Publish(update) => {
                self.store.set_state(update);
                None
            }
            Effect::StartPolling => {
                let period = self.config.poll_interval;
                let mut poll = time::interval_at(Instant::now() + period, period);
                poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.poll = Some(poll);
                None
            }
            Effect::StopPolling => {
                self.poll = None;
                None
            }
            Effect::ScheduleReconnect => {
                info!("reconnect after {:?}", self.config.reconnect_delay);
                self.reconnect = Some(Box::pin(time::sleep(self.config.reconnect_delay)));
                None
            }
            Effect::CancelReconnect => {
                self.reconnect = None;
                None
            }
            Effect::CloseTransport => {
                if let Some(mut stream) = self.stream.take() {
                    if let Err(e) = stream.shutdown().await {
                        debug!("could not shut down connection cleanly: {}", e);
                    }
                }
                None
            }
            Effect::Shutdown => {
                self.finished = true;
                None
            }
        }
    }
}

async fn read_chunk<T: AsyncRead + Unpin>(stream: Option<&mut T>) -> io::Result<Vec<u8>> {
    match stream {
        Some(stream) => {
            let mut buf = vec![0u8; READ_BUFFER];
            let read = stream.read(&mut buf).await?;
            buf.truncate(read);
            Ok(buf)
        }
        None => future::pending().await,
    }
}

async fn tick(poll: Option<&mut Interval>) {
    match poll {
        Some(poll) => {
            poll.tick().await;
        }
        None => future::pending().await,
    }
}

async fn elapsed(sleep: Option<&mut Pin<Box<Sleep>>>) {
    match sleep {
        Some(sleep) => sleep.as_mut().await,
        None => future::pending().await,
    }
}
