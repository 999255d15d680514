//! Process wide registry of live streams and fan out of their media to players.
//!
//! A `StreamRegistry` handle is cloned into every connection.  All of its state sits
//! behind a single mutex, which is only ever held for short bookkeeping and for
//! non-blocking queue pushes, so a stalled player can never hold up a publisher.

mod errors;
mod media;
mod notifier;

pub use self::errors::RelayError;
pub use self::media::{is_audio_sequence_header, is_video_keyframe, is_video_sequence_header};
pub use self::notifier::{LiveStreamNotifier, NoopNotifier};

use crate::messages::{MessagePayload, RtmpMessage, UserControlEventType};
use crate::outbound::{Outbound, OutboundSender};
use crate::sessions::create_status_object;
use crate::time::RtmpTimestamp;
use bytes::Bytes;
use crossbeam_channel::TrySendError;
use log::{debug, info, warn};
use rtmp_relay_amf0::Amf0Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const AUDIO_TYPE_ID: u8 = 8;
const VIDEO_TYPE_ID: u8 = 9;
const DATA_TYPE_ID: u8 = 18;

/// A player asking to receive a stream
pub struct Subscriber {
    pub connection_id: u64,

    /// Message stream the player created for playback
    pub stream_id: u32,
    pub sender: OutboundSender,
}

struct SubscriberState {
    connection_id: u64,
    stream_id: u32,
    sender: OutboundSender,
    awaiting_keyframe: bool,

    /// Publisher timestamp that maps to 0 for this subscriber
    timestamp_base: Option<RtmpTimestamp>,
}

enum Delivery {
    Sent,
    Dropped,
    Disconnected,
}

impl SubscriberState {
    fn deliver(&mut self, source: &MessagePayload, timestamp: RtmpTimestamp) -> Delivery {
        let payload = MessagePayload {
            timestamp,
            type_id: source.type_id,
            message_stream_id: self.stream_id,
            data: source.data.clone(),
        };

        match self.sender.try_send(Outbound::Message(payload)) {
            Ok(()) => Delivery::Sent,
            Err(TrySendError::Full(_)) => Delivery::Dropped,
            Err(TrySendError::Disconnected(_)) => Delivery::Disconnected,
        }
    }

    fn rebase(&self, timestamp: RtmpTimestamp) -> RtmpTimestamp {
        match self.timestamp_base {
            Some(base) => {
                let relative = timestamp - base;

                // Frames stamped slightly before the base, like audio interleaved ahead
                // of the key frame a player joined on
                if relative.value > i32::MAX as u32 {
                    RtmpTimestamp::new(0)
                } else {
                    relative
                }
            }

            None => RtmpTimestamp::new(0),
        }
    }
}

/// Everything known about one stream key while it is being published
struct PublishedStream {
    publisher_id: u64,
    app_name: String,
    metadata: Option<Bytes>,
    audio_header: Option<MessagePayload>,
    video_header: Option<MessagePayload>,
    last_keyframe: Option<MessagePayload>,
    subscribers: Vec<SubscriberState>,
}

impl PublishedStream {
    fn cache_media(&mut self, payload: &MessagePayload) {
        if payload.type_id == AUDIO_TYPE_ID {
            if self.audio_header.is_none() || is_audio_sequence_header(&payload.data) {
                self.audio_header = Some(payload.clone());
            }
        } else if is_video_sequence_header(&payload.data) || self.video_header.is_none() {
            self.video_header = Some(payload.clone());
        } else if is_video_keyframe(&payload.data) {
            self.last_keyframe = Some(payload.clone());
        }
    }

    fn forward_media(&mut self, stream_key: &str, payload: &MessagePayload) {
        let is_header = match payload.type_id {
            AUDIO_TYPE_ID => is_audio_sequence_header(&payload.data),
            _ => is_video_sequence_header(&payload.data),
        };

        let is_keyframe = payload.type_id == VIDEO_TYPE_ID && is_video_keyframe(&payload.data);

        self.subscribers.retain_mut(|subscriber| {
            if subscriber.awaiting_keyframe && !is_header {
                if !is_keyframe {
                    return true;
                }

                subscriber.awaiting_keyframe = false;
                subscriber.timestamp_base.get_or_insert(payload.timestamp);
                debug!(
                    "Connection {}: key frame reached, relaying '{}'",
                    subscriber.connection_id, stream_key
                );
            }

            let timestamp = subscriber.rebase(payload.timestamp);
            match subscriber.deliver(payload, timestamp) {
                Delivery::Sent => true,
                Delivery::Dropped => {
                    warn!(
                        "Connection {}: outbound queue full, dropping media on '{}' until the next key frame",
                        subscriber.connection_id, stream_key
                    );

                    subscriber.awaiting_keyframe = true;
                    true
                }

                Delivery::Disconnected => {
                    debug!(
                        "Connection {}: subscriber to '{}' went away",
                        subscriber.connection_id, stream_key
                    );

                    false
                }
            }
        });
    }
}

/// Shared handle to every stream currently being published
#[derive(Clone, Default)]
pub struct StreamRegistry {
    streams: Arc<Mutex<HashMap<String, PublishedStream>>>,
}

impl StreamRegistry {
    pub fn new() -> StreamRegistry {
        StreamRegistry::default()
    }

    /// Claims a stream key for a publisher.  Only one publisher may hold a key at a time,
    /// later attempts are rejected and leave the current publisher untouched.
    pub fn publish(
        &self,
        stream_key: &str,
        app_name: &str,
        publisher_id: u64,
    ) -> Result<(), RelayError> {
        let mut streams = self.lock();
        if let Some(existing) = streams.get(stream_key) {
            warn!(
                "Connection {}: stream key '{}' is already published by connection {}",
                publisher_id, stream_key, existing.publisher_id
            );

            return Err(RelayError::StreamAlreadyPublished {
                stream_key: stream_key.to_string(),
            });
        }

        streams.insert(
            stream_key.to_string(),
            PublishedStream {
                publisher_id,
                app_name: app_name.to_string(),
                metadata: None,
                audio_header: None,
                video_header: None,
                last_keyframe: None,
                subscribers: Vec::new(),
            },
        );

        info!(
            "Connection {}: now publishing '{}' on app '{}'",
            publisher_id, stream_key, app_name
        );

        Ok(())
    }

    /// Releases a stream key if it is held by the given publisher.  Any players still
    /// attached are told the stream was unpublished.  Returns false when the key was not
    /// held by this publisher.
    pub fn unpublish(&self, stream_key: &str, publisher_id: u64) -> bool {
        let mut streams = self.lock();
        let is_owner = streams
            .get(stream_key)
            .map(|x| x.publisher_id == publisher_id)
            .unwrap_or(false);

        if !is_owner {
            return false;
        }

        let stream = match streams.remove(stream_key) {
            Some(stream) => stream,
            None => return false,
        };

        drop(streams);

        info!(
            "Connection {}: stopped publishing '{}' on app '{}' with {} players attached",
            publisher_id,
            stream_key,
            stream.app_name,
            stream.subscribers.len()
        );

        let description = format!("{} is now unpublished.", stream_key);
        for subscriber in stream.subscribers {
            let messages = vec![
                RtmpMessage::Amf0Command {
                    command_name: "onStatus".to_string(),
                    transaction_id: 0.0,
                    command_object: Amf0Value::Null,
                    additional_arguments: vec![Amf0Value::Object(create_status_object(
                        "status",
                        "NetStream.Play.UnpublishNotify",
                        &description,
                    ))],
                },
                RtmpMessage::UserControl {
                    event_type: UserControlEventType::StreamEof,
                    stream_id: Some(subscriber.stream_id),
                    buffer_length: None,
                    timestamp: None,
                },
            ];

            for message in messages {
                let payload = match message.into_message_payload(RtmpTimestamp::new(0), subscriber.stream_id) {
                    Ok(payload) => payload,
                    Err(error) => {
                        warn!("Connection {}: failed to build unpublish notice: {}", subscriber.connection_id, error);
                        break;
                    }
                };

                if subscriber.sender.try_send(Outbound::Message(payload)).is_err() {
                    debug!(
                        "Connection {}: could not deliver unpublish notice",
                        subscriber.connection_id
                    );

                    break;
                }
            }
        }

        true
    }

    /// Attaches a player to a published stream.
    ///
    /// `start_messages` are queued to the player first, followed by the cached metadata,
    /// audio header, video header and last key frame.  All of it happens under the
    /// registry lock, so no live frame can slip in ahead of the cached ones.  Video then
    /// resumes at the next key frame.
    pub fn subscribe(
        &self,
        stream_key: &str,
        subscriber: Subscriber,
        start_messages: Vec<MessagePayload>,
    ) -> Result<(), RelayError> {
        let mut streams = self.lock();
        let stream = match streams.get_mut(stream_key) {
            Some(stream) => stream,
            None => {
                return Err(RelayError::StreamNotFound {
                    stream_key: stream_key.to_string(),
                })
            }
        };

        let mut messages = start_messages;
        let zero = RtmpTimestamp::new(0);
        if let Some(ref metadata) = stream.metadata {
            messages.push(MessagePayload {
                timestamp: zero,
                type_id: DATA_TYPE_ID,
                message_stream_id: subscriber.stream_id,
                data: metadata.clone(),
            });
        }

        let cached = [&stream.audio_header, &stream.video_header, &stream.last_keyframe];
        for payload in cached.iter().filter_map(|x| x.as_ref()) {
            messages.push(MessagePayload {
                timestamp: zero,
                type_id: payload.type_id,
                message_stream_id: subscriber.stream_id,
                data: payload.data.clone(),
            });
        }

        for message in messages {
            if subscriber.sender.try_send(Outbound::Message(message)).is_err() {
                return Err(RelayError::SubscriberQueueUnavailable {
                    connection_id: subscriber.connection_id,
                });
            }
        }

        info!(
            "Connection {}: playing '{}' on stream id {}",
            subscriber.connection_id, stream_key, subscriber.stream_id
        );

        stream.subscribers.push(SubscriberState {
            connection_id: subscriber.connection_id,
            stream_id: subscriber.stream_id,
            sender: subscriber.sender,
            awaiting_keyframe: true,
            timestamp_base: stream.last_keyframe.as_ref().map(|x| x.timestamp),
        });

        Ok(())
    }

    pub fn unsubscribe(&self, stream_key: &str, connection_id: u64) {
        let mut streams = self.lock();
        if let Some(stream) = streams.get_mut(stream_key) {
            stream.subscribers.retain(|x| x.connection_id != connection_id);
        }
    }

    /// Stores the stream's metadata for late joining players and passes it on to the
    /// ones already watching.
    pub fn set_metadata(
        &self,
        stream_key: &str,
        publisher_id: u64,
        values: Vec<Amf0Value>,
    ) -> Result<(), RelayError> {
        self.send_data(stream_key, publisher_id, values, true)
    }

    /// Passes a data message other than metadata, like text or cue points, on to the
    /// players currently watching.  It is not replayed to players joining later.
    pub fn relay_data(
        &self,
        stream_key: &str,
        publisher_id: u64,
        values: Vec<Amf0Value>,
    ) -> Result<(), RelayError> {
        self.send_data(stream_key, publisher_id, values, false)
    }

    fn send_data(
        &self,
        stream_key: &str,
        publisher_id: u64,
        values: Vec<Amf0Value>,
        is_metadata: bool,
    ) -> Result<(), RelayError> {
        let payload = RtmpMessage::Amf0Data { values }
            .into_message_payload(RtmpTimestamp::new(0), 0)?;

        let mut streams = self.lock();
        let stream = match streams.get_mut(stream_key) {
            Some(stream) if stream.publisher_id == publisher_id => stream,
            _ => return Ok(()),
        };

        if is_metadata {
            stream.metadata = Some(payload.data.clone());
        }

        stream.subscribers.retain_mut(|subscriber| {
            match subscriber.deliver(&payload, RtmpTimestamp::new(0)) {
                Delivery::Disconnected => false,
                Delivery::Dropped => {
                    warn!(
                        "Connection {}: outbound queue full, data message dropped",
                        subscriber.connection_id
                    );

                    true
                }

                Delivery::Sent => true,
            }
        });

        Ok(())
    }

    /// Caches and fans out an audio or video message from the stream's publisher.
    /// Messages from anyone other than the current publisher are ignored.
    pub fn relay_media(&self, stream_key: &str, publisher_id: u64, payload: &MessagePayload) {
        if payload.type_id != AUDIO_TYPE_ID && payload.type_id != VIDEO_TYPE_ID {
            return;
        }

        let mut streams = self.lock();
        let stream = match streams.get_mut(stream_key) {
            Some(stream) if stream.publisher_id == publisher_id => stream,
            _ => return,
        };

        stream.cache_media(payload);
        stream.forward_media(stream_key, payload);
    }

    pub fn is_published(&self, stream_key: &str) -> bool {
        self.lock().contains_key(stream_key)
    }

    pub fn subscriber_count(&self, stream_key: &str) -> usize {
        self.lock()
            .get(stream_key)
            .map(|x| x.subscribers.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, PublishedStream>> {
        // The map stays consistent even if a holder panicked mid update
        self.streams.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
