//! Runs a single accepted TCP connection from handshake to teardown.
//!
//! Each connection uses two threads.  The calling thread performs the handshake and
//! then blocks reading chunks, handing every reassembled message to the connection's
//! `ServerSession`.  A writer thread owns the chunk serializer and drains the
//! connection's outbound queue onto the socket.
//!
//! The idle timeout counts traffic in both directions.  A player that never writes is
//! kept open for as long as media keeps flowing out to it.

mod activity;
mod errors;

pub use self::errors::ConnectionError;

use self::activity::{ActivityTracker, IdleAwareReader};
use crate::chunk_io::{csid_for_message_type, ChunkDeserializationError, ChunkDeserializer, ChunkSerializer};
use crate::context::ServerContext;
use crate::handshake::Handshake;
use crate::outbound::{outbound_queue, Outbound, OutboundReceiver};
use crate::sessions::{ServerSession, ServerSessionResult};
use crate::time::RtmpTimestamp;
use log::{debug, error, info, trace};
use std::io::{self, BufReader, BufWriter, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::thread;

/// Serves an accepted socket until the peer leaves or something fails.
///
/// On return the connection no longer publishes or plays anything and its writer thread
/// has finished.  A peer closing the socket between messages counts as success.
pub fn serve_connection(
    mut socket: TcpStream,
    connection_id: u64,
    context: ServerContext,
) -> Result<(), ConnectionError> {
    socket.set_read_timeout(context.config.idle_timeout)?;
    socket.set_write_timeout(context.config.idle_timeout)?;
    socket.set_nodelay(true)?;

    let mut handshake = Handshake::new(context.config.verify_handshake_echo);
    handshake.perform(&mut socket)?;
    debug!("Connection {}: handshake completed", connection_id);

    let activity = Arc::new(ActivityTracker::new());
    activity.record();

    let (sender, receiver) = outbound_queue(context.config.subscriber_queue_size);
    let writer_socket = socket.try_clone()?;
    let writer_activity = activity.clone();
    let writer = thread::Builder::new()
        .name(format!("rtmp-writer-{}", connection_id))
        .spawn(move || write_outbound(connection_id, writer_socket, receiver, writer_activity))?;

    let mut session = ServerSession::new(connection_id, context.clone(), sender);
    let result = read_messages(connection_id, &socket, &mut session, &context, activity);

    for session_result in session.disconnect() {
        log_result(connection_id, &session_result);
    }

    // Once the session is gone nothing holds the outbound queue open, so the writer
    // flushes what is left and exits
    drop(session);
    match writer.join() {
        Ok(Ok(())) => (),
        Ok(Err(error)) => debug!("Connection {}: writer stopped: {}", connection_id, error),
        Err(_) => error!("Connection {}: writer thread panicked", connection_id),
    }

    let _ = socket.shutdown(Shutdown::Both);
    result
}

fn read_messages(
    connection_id: u64,
    socket: &TcpStream,
    session: &mut ServerSession,
    context: &ServerContext,
    activity: Arc<ActivityTracker>,
) -> Result<(), ConnectionError> {
    let reader = IdleAwareReader::new(socket, activity, context.config.idle_timeout);
    let mut deserializer = ChunkDeserializer::new(BufReader::new(reader), context.config.clock_mode);

    loop {
        let message = match deserializer.read_message() {
            Ok(message) => message,
            Err(ChunkDeserializationError::Io(ref error)) if error.kind() == io::ErrorKind::UnexpectedEof => {
                info!("Connection {}: closed by peer", connection_id);
                return Ok(());
            }

            Err(error) => return Err(error.into()),
        };

        trace!(
            "Connection {}: message type {} received on chunk stream {}",
            connection_id,
            message.payload.type_id,
            message.chunk_stream_id
        );

        for result in session.handle_message(message.payload)? {
            match result {
                ServerSessionResult::ReadChunkSizeChanged { size } => {
                    debug!("Connection {}: peer chunk size is now {}", connection_id, size);
                    deserializer.set_max_chunk_size(size as usize)?;
                }

                other => log_result(connection_id, &other),
            }
        }

        session.record_bytes_received(deserializer.bytes_read())?;
    }
}

fn write_outbound(
    connection_id: u64,
    socket: TcpStream,
    receiver: OutboundReceiver,
    activity: Arc<ActivityTracker>,
) -> Result<(), ConnectionError> {
    let result = drain_queue(&socket, receiver, &activity);
    if result.is_err() {
        // Wake the reading side so the whole connection comes down
        let _ = socket.shutdown(Shutdown::Both);
    }

    trace!("Connection {}: writer finished", connection_id);
    result
}

fn drain_queue(
    socket: &TcpStream,
    receiver: OutboundReceiver,
    activity: &ActivityTracker,
) -> Result<(), ConnectionError> {
    let mut writer = BufWriter::new(socket);
    let mut serializer = ChunkSerializer::new();

    while let Ok(outbound) = receiver.recv() {
        let packet = match outbound {
            Outbound::Message(payload) => {
                serializer.serialize(&payload, csid_for_message_type(payload.type_id))?
            }

            Outbound::SetChunkSize(size) => serializer.set_max_chunk_size(size, RtmpTimestamp::new(0))?,
        };

        writer.write_all(&packet.bytes)?;
        activity.record();

        // Bursts of queued media go out in as few writes as possible
        if receiver.is_empty() {
            writer.flush()?;
        }
    }

    writer.flush()?;
    Ok(())
}

fn log_result(connection_id: u64, result: &ServerSessionResult) {
    match result {
        ServerSessionResult::RaisedEvent(event) => {
            debug!("Connection {}: {:?}", connection_id, event)
        }

        ServerSessionResult::UnhandleableMessageReceived(payload) => debug!(
            "Connection {}: ignoring message with type id {}",
            connection_id, payload.type_id
        ),

        ServerSessionResult::ReadChunkSizeChanged { size } => {
            debug!("Connection {}: peer chunk size is now {}", connection_id, size)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk_io::ClockMode;
    use crate::config::ServerConfig;
    use crate::messages::{MessageDeserializationError, MessagePayload, RtmpMessage, UserControlEventType};
    use crate::sessions::ServerSessionError;
    use bytes::Bytes;
    use rtmp_relay_amf0::{Amf0DeserializationError, Amf0Object, Amf0Value};
    use std::io::Read;
    use std::net::{SocketAddr, TcpListener};
    use std::thread::JoinHandle;
    use std::time::Duration;

    type ClientReader = ChunkDeserializer<TcpStream>;

    #[test]
    fn loopback_client_can_handshake_and_connect() {
        let mut config = ServerConfig::new();
        config.write_chunk_size = 4096;
        config.idle_timeout = Some(Duration::from_secs(5));
        let (address, server) = start_server(config, 1);

        let mut client = TcpStream::connect(address).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        let mut c0_c1 = vec![3_u8];
        c0_c1.extend((0..1536).map(|x| (x % 251) as u8));
        client.write_all(&c0_c1).unwrap();

        let mut s0_s1 = vec![0_u8; 1537];
        client.read_exact(&mut s0_s1).unwrap();
        assert_eq!(s0_s1[0], 3, "Unexpected server version");

        // C2 echoes S1
        client.write_all(&s0_s1[1..]).unwrap();

        let mut s2 = vec![0_u8; 1536];
        client.read_exact(&mut s2).unwrap();
        assert_eq!(&s2[..], &c0_c1[1..], "S2 did not echo C1");

        let connect_object = Amf0Value::Object(Amf0Object::new().with("app", "live"));
        send_command(&mut client, "connect", 1.0, 0, connect_object, Vec::new());

        let mut deserializer = ChunkDeserializer::new(client.try_clone().unwrap(), ClockMode::Accumulate);
        let mut messages = Vec::new();
        while messages.len() < 4 {
            messages.push(read_message(&mut deserializer));
        }

        assert_eq!(messages[0], RtmpMessage::SetChunkSize { size: 4096 });
        assert_eq!(messages[1], RtmpMessage::WindowAcknowledgement { size: 5_000_000 });
        assert_eq!(status_code(&messages[3]), Some("NetConnection.Connect.Success".to_string()));

        drop(deserializer);
        drop(client);

        for result in join_all(server) {
            assert!(result.is_ok(), "Connection ended with an error: {:?}", result);
        }
    }

    #[test]
    fn bad_handshake_version_ends_connection() {
        let (address, server) = start_server(ServerConfig::new(), 1);

        let mut client = TcpStream::connect(address).unwrap();
        client.write_all(&[6_u8]).unwrap();

        match join_all(server).pop() {
            Some(Err(ConnectionError::HandshakeError(_))) => (),
            x => panic!("Expected handshake error, instead received {:?}", x),
        }
    }

    #[test]
    fn silent_player_kept_open_while_media_flows() {
        const FRAME_COUNT: usize = 30;

        let mut config = ServerConfig::new();
        config.idle_timeout = Some(Duration::from_secs(1));
        let (address, server) = start_server(config, 2);

        let (mut publisher, mut publisher_reader) = connect_client(address);
        let publish_stream_id = create_stream(&mut publisher, &mut publisher_reader);
        let key = Amf0Value::from("key");
        send_command(&mut publisher, "publish", 3.0, publish_stream_id, Amf0Value::Null, vec![key.clone()]);
        wait_for_status(&mut publisher_reader, "NetStream.Publish.Start");

        let (mut player, mut player_reader) = connect_client(address);
        let play_stream_id = create_stream(&mut player, &mut player_reader);
        send_command(&mut player, "play", 3.0, play_stream_id, Amf0Value::Null, vec![key]);
        wait_for_status(&mut player_reader, "NetStream.Play.Start");

        // From here on the player only reads, until the stream's end of file
        let player_thread = thread::spawn(move || {
            let mut video_frames = 0;
            let mut saw_unpublish = false;
            loop {
                match player_reader.read_message() {
                    Ok(message) => match message.payload.to_rtmp_message().unwrap() {
                        RtmpMessage::VideoData { .. } => video_frames += 1,
                        RtmpMessage::UserControl {
                            event_type: UserControlEventType::StreamEof,
                            ..
                        } => return (video_frames, saw_unpublish),

                        ref x if status_code(x).as_deref() == Some("NetStream.Play.UnpublishNotify") => {
                            saw_unpublish = true
                        }

                        _ => (),
                    },

                    Err(_) => return (video_frames, false),
                }
            }
        });

        // Three seconds of key frames, well past the idle timeout
        for index in 0..FRAME_COUNT {
            let frame = MessagePayload {
                timestamp: RtmpTimestamp::new(index as u32 * 100),
                type_id: 9,
                message_stream_id: publish_stream_id,
                data: Bytes::from(vec![0x17, 0x01, 0, 0, 0, index as u8]),
            };

            send_payload(&mut publisher, &frame);
            thread::sleep(Duration::from_millis(100));
        }

        drop(publisher_reader);
        drop(publisher);

        let (video_frames, saw_unpublish) = player_thread.join().unwrap();
        assert_eq!(video_frames, FRAME_COUNT, "Player did not receive every frame");
        assert!(saw_unpublish, "Player connection ended before the publisher left");

        drop(player);
        for result in join_all(server) {
            assert!(result.is_ok(), "Connection ended with an error: {:?}", result);
        }
    }

    #[test]
    fn silent_connection_closed_after_idle_timeout() {
        let mut config = ServerConfig::new();
        config.idle_timeout = Some(Duration::from_millis(300));
        let (address, server) = start_server(config, 1);

        let (_client, _reader) = connect_client(address);

        match join_all(server).pop() {
            Some(Err(ConnectionError::ChunkDeserializationError(ChunkDeserializationError::Io(ref error))))
                if error.kind() == io::ErrorKind::WouldBlock || error.kind() == io::ErrorKind::TimedOut => {}
            x => panic!("Expected idle timeout, instead received {:?}", x),
        }
    }

    #[test]
    fn deeply_nested_amf0_only_ends_its_connection() {
        let mut config = ServerConfig::new();
        config.idle_timeout = Some(Duration::from_secs(5));
        let (address, server) = start_server(config, 1);

        let (mut client, _reader) = connect_client(address);

        let header = vec![Amf0Value::from("createStream"), Amf0Value::Number(2.0)];
        let mut data = rtmp_relay_amf0::serialize(&header).unwrap();
        for _ in 0..200_000 {
            data.extend_from_slice(&[3, 0, 1, b'a']);
        }

        let payload = MessagePayload {
            timestamp: RtmpTimestamp::new(0),
            type_id: 20,
            message_stream_id: 0,
            data: Bytes::from(data),
        };

        send_payload(&mut client, &payload);

        match join_all(server).pop() {
            Some(Err(ConnectionError::ServerSessionError(ServerSessionError::MessageDeserializationError(
                MessageDeserializationError::Amf0DeserializationError(Amf0DeserializationError::NestingTooDeep { .. }),
            )))) => (),
            x => panic!("Expected nesting error, instead received {:?}", x),
        }
    }

    /// Accepts `connection_count` sockets, serving each on its own thread with the
    /// default thread stack size
    fn start_server(
        config: ServerConfig,
        connection_count: u64,
    ) -> (SocketAddr, JoinHandle<Vec<Result<(), ConnectionError>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let address = listener.local_addr().unwrap();
        let context = ServerContext::without_notifier(config);

        let server = thread::spawn(move || {
            let mut connections = Vec::new();
            for connection_id in 1..=connection_count {
                let (socket, _) = listener.accept().unwrap();
                let context = context.clone();
                connections.push(thread::spawn(move || serve_connection(socket, connection_id, context)));
            }

            connections.into_iter().map(|x| x.join().unwrap()).collect()
        });

        (address, server)
    }

    fn join_all(server: JoinHandle<Vec<Result<(), ConnectionError>>>) -> Vec<Result<(), ConnectionError>> {
        server.join().unwrap()
    }

    /// Handshakes and connects to the `live` app, returning once the connect result is in
    fn connect_client(address: SocketAddr) -> (TcpStream, ClientReader) {
        let mut client = TcpStream::connect(address).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(5))).unwrap();

        let mut c0_c1 = vec![3_u8];
        c0_c1.extend(vec![0_u8; 1536]);
        client.write_all(&c0_c1).unwrap();

        let mut s0_s1 = vec![0_u8; 1537];
        client.read_exact(&mut s0_s1).unwrap();
        client.write_all(&s0_s1[1..]).unwrap();

        let mut s2 = vec![0_u8; 1536];
        client.read_exact(&mut s2).unwrap();

        let connect_object = Amf0Value::Object(Amf0Object::new().with("app", "live"));
        send_command(&mut client, "connect", 1.0, 0, connect_object, Vec::new());

        let mut reader = ChunkDeserializer::new(client.try_clone().unwrap(), ClockMode::Accumulate);
        wait_for_status(&mut reader, "NetConnection.Connect.Success");
        (client, reader)
    }

    fn create_stream(client: &mut TcpStream, reader: &mut ClientReader) -> u32 {
        send_command(client, "createStream", 2.0, 0, Amf0Value::Null, Vec::new());
        loop {
            if let RtmpMessage::Amf0Command {
                command_name,
                additional_arguments,
                ..
            } = read_message(reader)
            {
                if command_name == "_result" {
                    match additional_arguments.first() {
                        Some(Amf0Value::Number(id)) => return *id as u32,
                        x => panic!("Unexpected createStream result: {:?}", x),
                    }
                }
            }
        }
    }

    fn send_command(
        client: &mut TcpStream,
        name: &str,
        transaction_id: f64,
        stream_id: u32,
        command_object: Amf0Value,
        additional_arguments: Vec<Amf0Value>,
    ) {
        let message = RtmpMessage::Amf0Command {
            command_name: name.to_string(),
            transaction_id,
            command_object,
            additional_arguments,
        };

        let payload = message.into_message_payload(RtmpTimestamp::new(0), stream_id).unwrap();
        send_payload(client, &payload);
    }

    fn send_payload(client: &mut TcpStream, payload: &MessagePayload) {
        let packet = ChunkSerializer::new()
            .serialize(payload, csid_for_message_type(payload.type_id))
            .unwrap();

        client.write_all(&packet.bytes).unwrap();
    }

    fn read_message(reader: &mut ClientReader) -> RtmpMessage {
        let message = reader.read_message().unwrap().payload.to_rtmp_message().unwrap();
        if let RtmpMessage::SetChunkSize { size } = message {
            reader.set_max_chunk_size(size as usize).unwrap();
        }

        message
    }

    fn wait_for_status(reader: &mut ClientReader, code: &str) {
        loop {
            if status_code(&read_message(reader)).as_deref() == Some(code) {
                return;
            }
        }
    }

    fn status_code(message: &RtmpMessage) -> Option<String> {
        match message {
            RtmpMessage::Amf0Command {
                additional_arguments, ..
            } => match additional_arguments.first() {
                Some(Amf0Value::Object(status)) => status.get("code").and_then(|x| x.as_str()).map(|x| x.to_string()),
                _ => None,
            },

            _ => None,
        }
    }
}
