mod active_stream;
mod commands;
mod errors;
mod events;
mod result;
mod session_state;

use self::active_stream::{ActiveStream, StreamState};
use self::session_state::SessionState;
use super::status::create_status_object;
use crate::context::ServerContext;
use crate::messages::{MessagePayload, RtmpMessage, UserControlEventType};
use crate::outbound::{Outbound, OutboundSender};
use crate::relay::{RelayError, Subscriber};
use crate::time::RtmpTimestamp;
use log::{debug, info, trace, warn};
use rtmp_relay_amf0::{Amf0Object, Amf0Value};
use std::collections::HashMap;
use std::time::SystemTime;

pub use self::commands::{Command, ConnectArgs, PlayArgs, PublishArgs};
pub use self::errors::ServerSessionError;
pub use self::events::ServerSessionEvent;
pub use self::result::ServerSessionResult;

/// Message streams a single connection may have open through `createStream`
pub const MAX_STREAMS_PER_CONNECTION: usize = 64;

/// A session that represents the server side of a single RTMP connection.
///
/// The `ServerSession` is handed every message the connection's chunk deserializer
/// produces after the handshake.  It answers commands by pushing messages onto the
/// connection's outbound queue, claims stream keys and attaches players through the
/// shared stream registry, and relays the media its peer publishes.
///
/// Everything the session sends goes through the same outbound queue the stream registry
/// uses to deliver relayed media to this connection, so responses and media reach the
/// peer in the order they were produced.
///
/// Dropping the session releases any stream key it publishes and detaches it from any
/// stream it plays.
pub struct ServerSession {
    connection_id: u64,
    context: ServerContext,
    outbound: OutboundSender,
    start_time: SystemTime,
    current_state: SessionState,
    connected_app_name: Option<String>,
    active_streams: HashMap<u32, ActiveStream>,
    next_stream_id: u32,
    peer_window_ack_size: Option<u32>,
    last_acknowledged_bytes: u64,
}

impl ServerSession {
    pub fn new(connection_id: u64, context: ServerContext, outbound: OutboundSender) -> ServerSession {
        ServerSession {
            connection_id,
            context,
            outbound,
            start_time: SystemTime::now(),
            current_state: SessionState::Started,
            connected_app_name: None,
            active_streams: HashMap::new(),
            next_stream_id: 1,
            peer_window_ack_size: None,
            last_acknowledged_bytes: 0,
        }
    }

    /// Reacts to a single message read from the peer.
    pub fn handle_message(
        &mut self,
        payload: MessagePayload,
    ) -> Result<Vec<ServerSessionResult>, ServerSessionError> {
        let message = payload.to_rtmp_message()?;
        match message {
            RtmpMessage::Abort { stream_id } => {
                debug!(
                    "Connection {}: peer aborted message on chunk stream {}",
                    self.connection_id, stream_id
                );

                Ok(Vec::new())
            }

            RtmpMessage::Acknowledgement { sequence_number } => {
                let event = ServerSessionEvent::AcknowledgementReceived {
                    bytes_received: sequence_number,
                };

                Ok(vec![ServerSessionResult::RaisedEvent(event)])
            }

            RtmpMessage::Amf0Command {
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            } => self.handle_amf0_command(
                payload.message_stream_id,
                command_name,
                transaction_id,
                command_object,
                additional_arguments,
            ),

            RtmpMessage::Amf0Data { values } => {
                self.handle_amf0_data(values, payload.message_stream_id)
            }

            RtmpMessage::AudioData { .. } | RtmpMessage::VideoData { .. } => {
                self.handle_media(&payload);
                Ok(Vec::new())
            }

            RtmpMessage::SetChunkSize { size } => {
                Ok(vec![ServerSessionResult::ReadChunkSizeChanged { size }])
            }

            RtmpMessage::SetPeerBandwidth { .. } => Ok(Vec::new()),

            RtmpMessage::UserControl {
                event_type,
                timestamp,
                ..
            } => self.handle_user_control(event_type, timestamp),

            RtmpMessage::WindowAcknowledgement { size } => {
                self.peer_window_ack_size = Some(size);
                Ok(Vec::new())
            }

            RtmpMessage::Unknown { .. } => {
                Ok(vec![ServerSessionResult::UnhandleableMessageReceived(payload)])
            }
        }
    }

    /// Tells the session how many bytes have been read from the peer in total.  Once the
    /// bytes since the last acknowledgement reach the window size the peer announced, an
    /// `Acknowledgement` is sent.
    pub fn record_bytes_received(&mut self, total_bytes: u64) -> Result<(), ServerSessionError> {
        let window = match self.peer_window_ack_size {
            Some(size) if size > 0 => size as u64,
            _ => return Ok(()),
        };

        if total_bytes.saturating_sub(self.last_acknowledged_bytes) < window {
            return Ok(());
        }

        self.last_acknowledged_bytes = total_bytes;

        // The sequence number wraps along with the peer's own 32 bit counter
        let message = RtmpMessage::Acknowledgement {
            sequence_number: total_bytes as u32,
        };

        self.send(message, 0)
    }

    /// Ends every publish and playback this session is part of.  Calling it again, or
    /// dropping the session afterwards, does nothing.
    pub fn disconnect(&mut self) -> Vec<ServerSessionResult> {
        let stream_ids: Vec<u32> = self.active_streams.keys().cloned().collect();
        let results = stream_ids
            .into_iter()
            .filter_map(|id| self.end_stream(id))
            .map(ServerSessionResult::RaisedEvent)
            .collect();

        self.active_streams.clear();
        results
    }

    fn handle_amf0_command(
        &mut self,
        stream_id: u32,
        name: String,
        transaction_id: f64,
        command_object: Amf0Value,
        arguments: Vec<Amf0Value>,
    ) -> Result<Vec<ServerSessionResult>, ServerSessionError> {
        let command = Command::decode(name, command_object, arguments);
        if command.requires_connection() && self.current_state != SessionState::Connected {
            warn!(
                "Connection {}: received {:?} before connecting",
                self.connection_id, command
            );

            let status = create_status_object(
                "error",
                "NetConnection.Call.Failed",
                "Connection has not been accepted yet",
            );

            self.send_command("_error", transaction_id, stream_id, Amf0Value::Null, vec![Amf0Value::Object(status)])?;
            return Ok(Vec::new());
        }

        match command {
            Command::Connect(args) => self.handle_command_connect(transaction_id, args),
            Command::CreateStream => self.handle_command_create_stream(stream_id, transaction_id),
            Command::ReleaseStream { stream_key } | Command::FcPublish { stream_key } => {
                debug!(
                    "Connection {}: acknowledging preparation for stream key {:?}",
                    self.connection_id, stream_key
                );

                self.send_command("_result", transaction_id, stream_id, Amf0Value::Null, Vec::new())?;
                Ok(Vec::new())
            }

            Command::Publish(args) => self.handle_command_publish(stream_id, args),
            Command::Play(args) => self.handle_command_play(stream_id, args),
            Command::FcUnpublish { stream_key } => {
                self.handle_command_fc_unpublish(stream_id, transaction_id, stream_key)
            }

            Command::DeleteStream { stream_id: deleted_id } => {
                Ok(self.handle_command_delete_stream(deleted_id.unwrap_or(stream_id)))
            }

            Command::CloseStream => Ok(self
                .end_stream(stream_id)
                .map(|x| vec![ServerSessionResult::RaisedEvent(x)])
                .unwrap_or_default()),

            Command::Unknown {
                name,
                command_object,
                arguments,
            } => {
                debug!(
                    "Connection {}: ignoring unsupported command '{}'",
                    self.connection_id, name
                );

                let event = ServerSessionEvent::UnhandleableAmf0Command {
                    command_name: name,
                    transaction_id,
                    command_object,
                    additional_values: arguments,
                };

                Ok(vec![ServerSessionResult::RaisedEvent(event)])
            }
        }
    }

    fn handle_command_connect(
        &mut self,
        transaction_id: f64,
        args: ConnectArgs,
    ) -> Result<Vec<ServerSessionResult>, ServerSessionError> {
        let app_name = match args.app {
            Some(app) => app,
            None => {
                warn!(
                    "Connection {}: connect request did not contain an application name",
                    self.connection_id
                );

                let status = create_status_object(
                    "error",
                    "NetConnection.Connect.Rejected",
                    "No application name was provided",
                );

                self.send_command("_error", transaction_id, 0, Amf0Value::Null, vec![Amf0Value::Object(status)])?;
                return Ok(vec![ServerSessionResult::RaisedEvent(ServerSessionEvent::ConnectionRejected)]);
            }
        };

        let config = &self.context.config;
        self.queue(Outbound::SetChunkSize(config.write_chunk_size))?;
        self.send(RtmpMessage::WindowAcknowledgement { size: config.window_ack_size }, 0)?;

        let bandwidth_message = RtmpMessage::SetPeerBandwidth {
            size: config.peer_bandwidth,
            limit_type: config.peer_bandwidth_limit_type,
        };

        self.send(bandwidth_message, 0)?;

        let command_object = Amf0Object::new()
            .with("fmsVer", config.fms_version.as_str())
            .with("capabilities", 31.0);

        let mut status = create_status_object("status", "NetConnection.Connect.Success", "Connection succeeded.");
        status.insert("objectEncoding", Amf0Value::Number(args.object_encoding));

        self.send_command(
            "_result",
            transaction_id,
            0,
            Amf0Value::Object(command_object),
            vec![Amf0Value::Object(status)],
        )?;

        info!(
            "Connection {}: connected to app '{}' (flash version {:?}, tc url {:?})",
            self.connection_id, app_name, args.flash_version, args.tc_url
        );

        self.connected_app_name = Some(app_name.clone());
        self.current_state = SessionState::Connected;

        let event = ServerSessionEvent::ConnectionAccepted { app_name };
        Ok(vec![ServerSessionResult::RaisedEvent(event)])
    }

    fn handle_command_create_stream(
        &mut self,
        stream_id: u32,
        transaction_id: f64,
    ) -> Result<Vec<ServerSessionResult>, ServerSessionError> {
        let next_stream_id = self.next_stream_id.checked_add(1);
        let new_stream_id = match next_stream_id {
            Some(next) if self.active_streams.len() < MAX_STREAMS_PER_CONNECTION => {
                let new_stream_id = self.next_stream_id;
                self.next_stream_id = next;
                new_stream_id
            }

            _ => {
                warn!(
                    "Connection {}: refusing createStream with {} streams already open",
                    self.connection_id,
                    self.active_streams.len()
                );

                let status = create_status_object(
                    "error",
                    "NetConnection.Call.Failed",
                    "Too many streams have been created on this connection",
                );

                self.send_command("_error", transaction_id, stream_id, Amf0Value::Null, vec![Amf0Value::Object(status)])?;
                return Ok(Vec::new());
            }
        };

        self.active_streams.insert(new_stream_id, ActiveStream::new());

        self.send_command(
            "_result",
            transaction_id,
            stream_id,
            Amf0Value::Null,
            vec![Amf0Value::Number(new_stream_id as f64)],
        )?;

        Ok(Vec::new())
    }

    fn handle_command_publish(
        &mut self,
        stream_id: u32,
        args: PublishArgs,
    ) -> Result<Vec<ServerSessionResult>, ServerSessionError> {
        if args.stream_key.is_empty() {
            warn!("Connection {}: publish request without a stream key", self.connection_id);
            self.send_status(stream_id, "error", "NetStream.Publish.BadName", "No stream key was provided")?;
            return Ok(Vec::new());
        }

        // Whatever the message stream was doing before, it is publishing now
        let mut results: Vec<ServerSessionResult> = self
            .end_stream(stream_id)
            .map(ServerSessionResult::RaisedEvent)
            .into_iter()
            .collect();

        let app_name = self.app_name();
        let stream_key = args.stream_key;
        match self.context.registry.publish(&stream_key, &app_name, self.connection_id) {
            Ok(()) => (),
            Err(RelayError::StreamAlreadyPublished { .. }) => {
                let description = format!("{} is already being published.", stream_key);
                self.send_status(stream_id, "error", "NetStream.Publish.BadName", &description)?;

                let event = ServerSessionEvent::PublishStreamRejected { app_name, stream_key };
                results.push(ServerSessionResult::RaisedEvent(event));
                return Ok(results);
            }

            Err(error) => return Err(error.into()),
        }

        debug!(
            "Connection {}: publish type {:?} on stream id {}",
            self.connection_id, args.publish_type, stream_id
        );

        self.active_streams
            .entry(stream_id)
            .or_insert_with(ActiveStream::new)
            .current_state = StreamState::Publishing {
            stream_key: stream_key.clone(),
        };

        let stream_begin_message = RtmpMessage::UserControl {
            event_type: UserControlEventType::StreamBegin,
            stream_id: Some(stream_id),
            buffer_length: None,
            timestamp: None,
        };

        self.send(stream_begin_message, stream_id)?;

        let description = format!("{} is now published.", stream_key);
        self.send_status(stream_id, "status", "NetStream.Publish.Start", &description)?;
        self.context.notifier.stream_went_live(&app_name, &stream_key);

        let event = ServerSessionEvent::PublishStreamStarted {
            app_name,
            stream_key,
            stream_id,
        };

        results.push(ServerSessionResult::RaisedEvent(event));
        Ok(results)
    }

    fn handle_command_play(
        &mut self,
        stream_id: u32,
        args: PlayArgs,
    ) -> Result<Vec<ServerSessionResult>, ServerSessionError> {
        let mut results: Vec<ServerSessionResult> = self
            .end_stream(stream_id)
            .map(ServerSessionResult::RaisedEvent)
            .into_iter()
            .collect();

        let app_name = self.app_name();
        let stream_key = args.stream_key;
        let start_messages = create_play_start_messages(stream_id, &stream_key)?;
        let subscriber = Subscriber {
            connection_id: self.connection_id,
            stream_id,
            sender: self.outbound.clone(),
        };

        match self.context.registry.subscribe(&stream_key, subscriber, start_messages) {
            Ok(()) => (),
            Err(RelayError::StreamNotFound { .. }) => {
                info!(
                    "Connection {}: play requested for '{}' which is not being published",
                    self.connection_id, stream_key
                );

                let description = format!("{} is not being published.", stream_key);
                self.send_status(stream_id, "error", "NetStream.Play.StreamNotFound", &description)?;

                let event = ServerSessionEvent::PlayStreamNotFound { app_name, stream_key };
                results.push(ServerSessionResult::RaisedEvent(event));
                return Ok(results);
            }

            Err(error) => return Err(error.into()),
        }

        self.active_streams
            .entry(stream_id)
            .or_insert_with(ActiveStream::new)
            .current_state = StreamState::Playing {
            stream_key: stream_key.clone(),
        };

        let event = ServerSessionEvent::PlayStreamStarted {
            app_name,
            stream_key,
            stream_id,
        };

        results.push(ServerSessionResult::RaisedEvent(event));
        Ok(results)
    }

    fn handle_command_fc_unpublish(
        &mut self,
        stream_id: u32,
        transaction_id: f64,
        stream_key: Option<String>,
    ) -> Result<Vec<ServerSessionResult>, ServerSessionError> {
        let publishing_stream_id = self
            .active_streams
            .iter()
            .find(|(_, stream)| stream.publishing_key().is_some() && stream.publishing_key() == stream_key.as_deref())
            .map(|(id, _)| *id);

        let results = publishing_stream_id
            .and_then(|id| self.end_stream(id))
            .map(|x| vec![ServerSessionResult::RaisedEvent(x)])
            .unwrap_or_default();

        self.send_command("_result", transaction_id, stream_id, Amf0Value::Null, Vec::new())?;
        Ok(results)
    }

    fn handle_command_delete_stream(&mut self, stream_id: u32) -> Vec<ServerSessionResult> {
        let results = self
            .end_stream(stream_id)
            .map(|x| vec![ServerSessionResult::RaisedEvent(x)])
            .unwrap_or_default();

        self.active_streams.remove(&stream_id);
        results
    }

    fn handle_amf0_data(
        &mut self,
        mut values: Vec<Amf0Value>,
        stream_id: u32,
    ) -> Result<Vec<ServerSessionResult>, ServerSessionError> {
        let stream_key = match self.active_streams.get(&stream_id).and_then(|x| x.publishing_key()) {
            Some(key) => key.to_string(),
            None => return Ok(Vec::new()), // Data only matters while publishing
        };

        let is_set_data_frame = values.first().and_then(|x| x.as_str()) == Some("@setDataFrame");
        if is_set_data_frame {
            values.remove(0);
        }

        if values.first().and_then(|x| x.as_str()) != Some("onMetaData") {
            trace!(
                "Connection {}: relaying data message {:?} on '{}'",
                self.connection_id,
                values.first(),
                stream_key
            );

            self.context
                .registry
                .relay_data(&stream_key, self.connection_id, values)?;

            return Ok(Vec::new());
        }

        self.context
            .registry
            .set_metadata(&stream_key, self.connection_id, values)?;

        let event = ServerSessionEvent::StreamMetadataChanged {
            app_name: self.app_name(),
            stream_key,
        };

        Ok(vec![ServerSessionResult::RaisedEvent(event)])
    }

    fn handle_media(&self, payload: &MessagePayload) {
        let stream = self.active_streams.get(&payload.message_stream_id);
        match stream.and_then(|x| x.publishing_key()) {
            Some(stream_key) => {
                self.context
                    .registry
                    .relay_media(stream_key, self.connection_id, payload)
            }

            None => trace!(
                "Connection {}: media received on stream id {} which is not publishing",
                self.connection_id,
                payload.message_stream_id
            ),
        }
    }

    fn handle_user_control(
        &self,
        event_type: UserControlEventType,
        timestamp: Option<RtmpTimestamp>,
    ) -> Result<Vec<ServerSessionResult>, ServerSessionError> {
        match event_type {
            UserControlEventType::PingRequest => {
                let message = RtmpMessage::UserControl {
                    event_type: UserControlEventType::PingResponse,
                    stream_id: None,
                    buffer_length: None,
                    timestamp,
                };

                self.send(message, 0)?;
                Ok(Vec::new())
            }

            UserControlEventType::PingResponse => Ok(timestamp
                .map(|timestamp| {
                    let event = ServerSessionEvent::PingResponseReceived { timestamp };
                    vec![ServerSessionResult::RaisedEvent(event)]
                })
                .unwrap_or_default()),

            _ => Ok(Vec::new()),
        }
    }

    /// Returns the message stream to the created state, leaving the registry if it was
    /// publishing or playing.
    fn end_stream(&mut self, stream_id: u32) -> Option<ServerSessionEvent> {
        let stream = self.active_streams.get_mut(&stream_id)?;
        let previous_state = std::mem::replace(&mut stream.current_state, StreamState::Created);
        let app_name = self.app_name();

        match previous_state {
            StreamState::Created => None,
            StreamState::Publishing { stream_key } => {
                self.context.registry.unpublish(&stream_key, self.connection_id);
                Some(ServerSessionEvent::PublishStreamFinished { app_name, stream_key })
            }

            StreamState::Playing { stream_key } => {
                self.context.registry.unsubscribe(&stream_key, self.connection_id);
                info!(
                    "Connection {}: stopped playing '{}'",
                    self.connection_id, stream_key
                );

                Some(ServerSessionEvent::PlayStreamFinished { app_name, stream_key })
            }
        }
    }

    fn send_command(
        &self,
        command_name: &str,
        transaction_id: f64,
        stream_id: u32,
        command_object: Amf0Value,
        additional_arguments: Vec<Amf0Value>,
    ) -> Result<(), ServerSessionError> {
        let message = RtmpMessage::Amf0Command {
            command_name: command_name.to_string(),
            transaction_id,
            command_object,
            additional_arguments,
        };

        self.send(message, stream_id)
    }

    fn send_status(
        &self,
        stream_id: u32,
        level: &str,
        code: &str,
        description: &str,
    ) -> Result<(), ServerSessionError> {
        let status = create_status_object(level, code, description);
        self.send_command("onStatus", 0.0, stream_id, Amf0Value::Null, vec![Amf0Value::Object(status)])
    }

    fn send(&self, message: RtmpMessage, stream_id: u32) -> Result<(), ServerSessionError> {
        let payload = message.into_message_payload(self.get_epoch(), stream_id)?;
        self.queue(Outbound::Message(payload))
    }

    fn queue(&self, outbound: Outbound) -> Result<(), ServerSessionError> {
        self.outbound
            .send(outbound)
            .map_err(|_| ServerSessionError::OutboundQueueClosed)
    }

    fn app_name(&self) -> String {
        self.connected_app_name.clone().unwrap_or_default()
    }

    fn get_epoch(&self) -> RtmpTimestamp {
        match self.start_time.elapsed() {
            // Truncating to u32 wraps the same way RTMP timestamps do
            Ok(duration) => RtmpTimestamp::new(duration.as_millis() as u32),
            Err(_) => RtmpTimestamp::new(0), // Time went backwards, so just consider time as at epoch
        }
    }
}

impl Drop for ServerSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// Messages a player receives before any cached or live media of the stream it joins
fn create_play_start_messages(
    stream_id: u32,
    stream_key: &str,
) -> Result<Vec<MessagePayload>, ServerSessionError> {
    let description = format!("Started playing {}.", stream_key);
    let start_status = create_status_object("status", "NetStream.Play.Start", &description);

    let messages = vec![
        RtmpMessage::UserControl {
            event_type: UserControlEventType::StreamBegin,
            stream_id: Some(stream_id),
            buffer_length: None,
            timestamp: None,
        },
        RtmpMessage::Amf0Command {
            command_name: "onStatus".to_string(),
            transaction_id: 0.0,
            command_object: Amf0Value::Null,
            additional_arguments: vec![Amf0Value::Object(start_status)],
        },
        RtmpMessage::Amf0Data {
            values: vec![
                Amf0Value::Utf8String("|RtmpSampleAccess".to_string()),
                Amf0Value::Boolean(false),
                Amf0Value::Boolean(false),
            ],
        },
    ];

    let mut payloads = Vec::with_capacity(messages.len());
    for message in messages {
        payloads.push(message.into_message_payload(RtmpTimestamp::new(0), stream_id)?);
    }

    Ok(payloads)
}
