use crate::command::{CommandError, CommandRequest, CommandTranslator};
use crate::protocol::codec::{self, CannedCommand, OutgoingCommand};
use crate::protocol::frame::{to_hex, CanonicalPayload, WireFrame};
use crate::state::{DeviceState, StateUpdate};

#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
    ReconnectWait,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SessionEvent {
    Start,
    Connected,
    ConnectFailed(String),
    Data(Vec<u8>),
    TransportError(String),
    Closed,
    PollTick,
    ReconnectElapsed,
    Command(CommandRequest),
    /// A frame was handed to the transport.
    Sent,
    Stop,
}

#[derive(Clone, Debug, Hash, Eq, PartialEq)]
pub enum Effect {
    Connect,
    Send(WireFrame),
    Publish(StateUpdate),
    StartPolling,
    StopPolling,
    ScheduleReconnect,
    CancelReconnect,
    CloseTransport,
    Shutdown,
}

/// Connection lifecycle of one unit, without any I/O.
///
/// Every event runs to completion and returns the effects the driver has to
/// carry out, in order. The decoded state and the last payload only live
/// here and are dropped whenever the link goes down, so the first frame after
/// a reconnect republishes every field.
#[derive(Debug)]
pub struct SessionMachine {
    state: LinkState,
    translator: CommandTranslator,
    device: DeviceState,
    last_payload: Option<CanonicalPayload>,
    suppress_poll: bool,
    reconnect_pending: bool,
}

impl SessionMachine {
    pub fn new(translator: CommandTranslator) -> SessionMachine {
        SessionMachine {
            state: LinkState::Disconnected,
            translator,
            device: DeviceState::empty(),
            last_payload: None,
            suppress_poll: false,
            reconnect_pending: false,
        }
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn device(&self) -> &DeviceState {
        &self.device
    }

    pub fn last_payload(&self) -> Option<&CanonicalPayload> {
        self.last_payload.as_ref()
    }

    pub fn is_poll_suppressed(&self) -> bool {
        self.suppress_poll
    }

    pub fn is_reconnect_pending(&self) -> bool {
        self.reconnect_pending
    }

    pub fn handle(&mut self, event: SessionEvent) -> Vec<Effect> {
        trace!("{:?} <- {:?}", self.state, event);
        match event {
            SessionEvent::Start => self.on_start(),
            SessionEvent::Connected => self.on_connected(),
            SessionEvent::ConnectFailed(reason) => {
                if self.state != LinkState::Connecting {
                    return Vec::new();
                }
                error!("could not connect: {}", reason);
                self.enter_reconnect_wait()
            }
            SessionEvent::Data(chunk) => self.on_data(&chunk),
            SessionEvent::TransportError(reason) => {
                error!("transport error: {}", reason);
                self.on_link_lost()
            }
            SessionEvent::Closed => {
                if self.state == LinkState::Connected {
                    warn!("disconnected");
                }
                self.on_link_lost()
            }
            SessionEvent::PollTick => self.on_poll_tick(),
            SessionEvent::ReconnectElapsed => self.on_reconnect_elapsed(),
            SessionEvent::Command(request) => self.on_command(request),
            SessionEvent::Sent => {
                self.suppress_poll = false;
                Vec::new()
            }
            SessionEvent::Stop => self.on_stop(),
        }
    }

    fn on_start(&mut self) -> Vec<Effect> {
        if self.state != LinkState::Disconnected {
            debug!("ignoring start while {:?}", self.state);
            return Vec::new();
        }
        self.state = LinkState::Connecting;
        vec![Effect::Connect]
    }

    fn on_connected(&mut self) -> Vec<Effect> {
        if self.state != LinkState::Connecting {
            debug!("ignoring connection while {:?}", self.state);
            return Vec::new();
        }
        self.state = LinkState::Connected;
        vec![
            Effect::Publish(StateUpdate::connection(true)),
            Effect::StartPolling,
        ]
    }

    fn on_data(&mut self, chunk: &[u8]) -> Vec<Effect> {
        if self.state != LinkState::Connected {
            trace!("dropping {} bytes received while {:?}", chunk.len(), self.state);
            return Vec::new();
        }
        trace!("received {} bytes: {}", chunk.len(), to_hex(chunk));
        let payload = match CanonicalPayload::normalize(chunk) {
            Ok(payload) => payload,
            Err(e) => {
                error!("dropping chunk: {} ({})", e, to_hex(chunk));
                return Vec::new();
            }
        };
        let decoded = codec::decode(&payload);
        debug!("decoded state: {:?}", decoded);
        let updates = decoded.diff(&self.device);
        self.device = decoded;
        self.last_payload = Some(payload);
        updates.into_iter().map(Effect::Publish).collect()
    }

    fn on_link_lost(&mut self) -> Vec<Effect> {
        match self.state {
            LinkState::Connected => {
                let mut effects = vec![Effect::StopPolling, Effect::CloseTransport];
                self.device = DeviceState::empty();
                self.last_payload = None;
                self.suppress_poll = false;
                effects.extend(self.enter_reconnect_wait());
                effects
            }
            LinkState::Connecting => self.enter_reconnect_wait(),
            LinkState::ReconnectWait | LinkState::Disconnected => Vec::new(),
        }
    }

    fn enter_reconnect_wait(&mut self) -> Vec<Effect> {
        self.state = LinkState::ReconnectWait;
        let mut effects = vec![Effect::Publish(StateUpdate::connection(false))];
        if !self.reconnect_pending {
            self.reconnect_pending = true;
            effects.push(Effect::ScheduleReconnect);
        }
        effects
    }

    fn on_poll_tick(&mut self) -> Vec<Effect> {
        if self.state != LinkState::Connected || self.suppress_poll {
            trace!("skipping poll");
            return Vec::new();
        }
        vec![Effect::Send(WireFrame::encode(CannedCommand::Query.payload()))]
    }

    fn on_reconnect_elapsed(&mut self) -> Vec<Effect> {
        if self.state != LinkState::ReconnectWait || !self.reconnect_pending {
            return Vec::new();
        }
        self.reconnect_pending = false;
        self.state = LinkState::Connecting;
        info!("reconnecting");
        vec![Effect::Connect]
    }

    fn on_command(&mut self, request: CommandRequest) -> Vec<Effect> {
        self.suppress_poll = true;
        match self.encode_command(&request) {
            Ok(frame) => {
                debug!("sending {} = {}: {}", request.field, request.value, frame);
                vec![Effect::Send(frame)]
            }
            Err(e) => {
                self.suppress_poll = false;
                error!("dropping command {} = {}: {}", request.field, request.value, e);
                Vec::new()
            }
        }
    }

    fn encode_command(&self, request: &CommandRequest) -> Result<WireFrame, CommandError> {
        if self.state != LinkState::Connected {
            return Err(CommandError::NotConnected);
        }
        let command: OutgoingCommand = self.translator.translate(request)?;
        let payload = command.payload(self.last_payload.as_ref())?;
        Ok(WireFrame::encode(payload))
    }

    fn on_stop(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        if self.state == LinkState::Connected {
            effects.push(Effect::StopPolling);
            effects.push(Effect::CloseTransport);
            effects.push(Effect::Publish(StateUpdate::connection(false)));
        }
        if self.reconnect_pending {
            self.reconnect_pending = false;
            effects.push(Effect::CancelReconnect);
        }
        self.state = LinkState::Disconnected;
        self.device = DeviceState::empty();
        self.last_payload = None;
        self.suppress_poll = false;
        info!("session stopped");
        effects.push(Effect::Shutdown);
        effects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::RequestValue;
    use crate::protocol::codec::offset;
    use crate::protocol::frame::{checksum, PAYLOAD_LENGTH};
    use crate::state::{Field, StateValue};

    fn connected() -> SessionMachine {
        let mut machine = SessionMachine::new(CommandTranslator::default());
        assert_eq!(machine.handle(SessionEvent::Start), vec![Effect::Connect]);
        machine.handle(SessionEvent::Connected);
        machine
    }

    fn chunk(mode: u8, setpoint: u8) -> Vec<u8> {
        let mut payload = [0u8; PAYLOAD_LENGTH];
        payload[0] = 34;
        payload[offset::TEMPERATURE] = 25;
        payload[offset::FRAME_TYPE] = 0x7f;
        payload[offset::MODE] = mode;
        payload[offset::STATUS] = 1;
        payload[offset::SETPOINT] = setpoint;
        let mut chunk = payload.to_vec();
        chunk.push(checksum(&payload));
        chunk
    }

    fn published(effects: &[Effect]) -> Vec<&StateUpdate> {
        effects
            .iter()
            .filter_map(|e| match e {
                Effect::Publish(update) => Some(update),
                _ => None,
            })
            .collect()
    }

    fn request(field: &str, value: RequestValue) -> SessionEvent {
        SessionEvent::Command(CommandRequest::new(field, value))
    }

    #[test]
    fn connecting_publishes_and_starts_polling() {
        let mut machine = SessionMachine::new(CommandTranslator::default());
        machine.handle(SessionEvent::Start);
        assert_eq!(machine.state(), LinkState::Connecting);
        assert_eq!(
            machine.handle(SessionEvent::Connected),
            vec![
                Effect::Publish(StateUpdate::connection(true)),
                Effect::StartPolling
            ]
        );
        assert_eq!(machine.state(), LinkState::Connected);
    }

    #[test]
    fn polls_with_query_frame() {
        let mut machine = connected();
        assert_eq!(
            machine.handle(SessionEvent::PollTick),
            vec![Effect::Send(WireFrame::encode(CannedCommand::Query.payload()))]
        );
    }

    #[test]
    fn first_frame_publishes_everything_then_only_changes() {
        let mut machine = connected();
        let effects = machine.handle(SessionEvent::Data(chunk(2, 6)));
        let updates = published(&effects);
        assert_eq!(updates.len(), 10);
        assert!(updates.contains(&&StateUpdate::reported(
            Field::Mode,
            StateValue::Text("heat".into())
        )));
        assert!(updates.contains(&&StateUpdate::reported(
            Field::Setpoint,
            StateValue::Number(22)
        )));

        assert!(machine.handle(SessionEvent::Data(chunk(2, 6))).is_empty());
        assert_eq!(
            machine.handle(SessionEvent::Data(chunk(1, 6))),
            vec![Effect::Publish(StateUpdate::reported(
                Field::Mode,
                StateValue::Text("cool".into())
            ))]
        );
    }

    #[test]
    fn bad_chunk_leaves_state_alone() {
        let mut machine = connected();
        machine.handle(SessionEvent::Data(chunk(2, 6)));
        let before = machine.device().clone();
        assert!(machine.handle(SessionEvent::Data(vec![0; 12])).is_empty());
        assert_eq!(machine.device(), &before);
        assert!(machine.last_payload().is_some());
    }

    #[test]
    fn close_schedules_a_single_reconnect() {
        let mut machine = connected();
        machine.handle(SessionEvent::Data(chunk(2, 6)));
        assert_eq!(
            machine.handle(SessionEvent::Closed),
            vec![
                Effect::StopPolling,
                Effect::CloseTransport,
                Effect::Publish(StateUpdate::connection(false)),
                Effect::ScheduleReconnect,
            ]
        );
        assert_eq!(machine.state(), LinkState::ReconnectWait);
        assert_eq!(machine.device(), &DeviceState::empty());
        assert!(machine.last_payload().is_none());
        assert!(machine.is_reconnect_pending());

        assert!(machine.handle(SessionEvent::Closed).is_empty());
        assert!(machine
            .handle(SessionEvent::TransportError("reset".into()))
            .is_empty());
        assert!(machine.handle(SessionEvent::PollTick).is_empty());
    }

    #[test]
    fn failed_connect_waits_then_retries() {
        let mut machine = SessionMachine::new(CommandTranslator::default());
        machine.handle(SessionEvent::Start);
        assert_eq!(
            machine.handle(SessionEvent::ConnectFailed("refused".into())),
            vec![
                Effect::Publish(StateUpdate::connection(false)),
                Effect::ScheduleReconnect
            ]
        );
        assert_eq!(
            machine.handle(SessionEvent::ReconnectElapsed),
            vec![Effect::Connect]
        );
        assert_eq!(machine.state(), LinkState::Connecting);
        assert!(!machine.is_reconnect_pending());
        assert_eq!(
            machine.handle(SessionEvent::Connected),
            vec![
                Effect::Publish(StateUpdate::connection(true)),
                Effect::StartPolling
            ]
        );
    }

    #[test]
    fn reconnect_republishes_unchanged_values() {
        let mut machine = connected();
        machine.handle(SessionEvent::Data(chunk(2, 6)));
        machine.handle(SessionEvent::Closed);
        machine.handle(SessionEvent::ReconnectElapsed);
        machine.handle(SessionEvent::Connected);
        let effects = machine.handle(SessionEvent::Data(chunk(2, 6)));
        assert_eq!(published(&effects).len(), 10);
    }

    #[test]
    fn command_suppresses_polling_until_sent() {
        let mut machine = connected();
        machine.handle(SessionEvent::Data(chunk(2, 6)));
        let effects = machine.handle(request("settemp", RequestValue::Number(40)));
        let frame = match effects.as_slice() {
            [Effect::Send(frame)] => frame.clone(),
            other => panic!("unexpected effects {:?}", other),
        };
        assert_eq!(frame.payload()[offset::SETPOINT], 14);
        assert_eq!(frame.payload()[offset::FRAME_TYPE], 0);
        assert!(machine.is_poll_suppressed());
        assert!(machine.handle(SessionEvent::PollTick).is_empty());

        machine.handle(SessionEvent::Sent);
        assert!(!machine.is_poll_suppressed());
        assert_eq!(machine.handle(SessionEvent::PollTick).len(), 1);
    }

    #[test]
    fn rejected_commands_send_nothing() {
        let mut machine = connected();
        // no frame received yet
        assert!(machine
            .handle(request("mode", RequestValue::Text("heat".into())))
            .is_empty());
        assert!(!machine.is_poll_suppressed());
        assert!(machine
            .handle(request("compressor", RequestValue::Bool(true)))
            .is_empty());
        assert_eq!(
            machine.handle(request("power", RequestValue::Bool(true))),
            vec![Effect::Send(WireFrame::encode(CannedCommand::PowerOn.payload()))]
        );

        let mut offline = SessionMachine::new(CommandTranslator::default());
        assert!(offline
            .handle(request("power", RequestValue::Bool(true)))
            .is_empty());
    }

    #[test]
    fn stop_tears_everything_down() {
        let mut machine = connected();
        assert_eq!(
            machine.handle(SessionEvent::Stop),
            vec![
                Effect::StopPolling,
                Effect::CloseTransport,
                Effect::Publish(StateUpdate::connection(false)),
                Effect::Shutdown,
            ]
        );
        assert_eq!(machine.state(), LinkState::Disconnected);
    }
}
