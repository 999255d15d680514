//! Typed view of the AMF0 commands a server session understands.
//!
//! Command messages carry a name, a transaction id, a command object and a loose list of
//! further arguments.  Each known command gets its own decode step that pulls out only
//! the values it needs.  Anything else is kept as is so it can be logged or raised.

use rtmp_relay_amf0::{Amf0Object, Amf0Value};

/// Arguments of a `connect` request, taken from its command object
#[derive(PartialEq, Debug, Clone, Default)]
pub struct ConnectArgs {
    /// Application name with any trailing slash removed
    pub app: Option<String>,
    pub flash_version: Option<String>,
    pub tc_url: Option<String>,
    pub object_encoding: f64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct PublishArgs {
    pub stream_key: String,

    /// `live`, `record` or `append`.  Every mode is relayed live.
    pub publish_type: Option<String>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct PlayArgs {
    pub stream_key: String,
}

#[derive(PartialEq, Debug, Clone)]
pub enum Command {
    Connect(ConnectArgs),
    CreateStream,
    ReleaseStream { stream_key: Option<String> },
    FcPublish { stream_key: Option<String> },
    Publish(PublishArgs),
    Play(PlayArgs),
    FcUnpublish { stream_key: Option<String> },
    DeleteStream { stream_id: Option<u32> },
    CloseStream,
    Unknown {
        name: String,
        command_object: Amf0Value,
        arguments: Vec<Amf0Value>,
    },
}

impl Command {
    pub fn decode(name: String, command_object: Amf0Value, arguments: Vec<Amf0Value>) -> Command {
        match name.as_str() {
            "connect" => Command::Connect(decode_connect(command_object)),
            "createStream" => Command::CreateStream,
            "releaseStream" => Command::ReleaseStream {
                stream_key: string_argument(&arguments, 0),
            },

            "FCPublish" => Command::FcPublish {
                stream_key: string_argument(&arguments, 0),
            },

            "publish" => Command::Publish(PublishArgs {
                stream_key: string_argument(&arguments, 0).unwrap_or_default(),
                publish_type: string_argument(&arguments, 1),
            }),

            "play" => Command::Play(PlayArgs {
                stream_key: string_argument(&arguments, 0).unwrap_or_default(),
            }),

            "FCUnpublish" => Command::FcUnpublish {
                stream_key: string_argument(&arguments, 0),
            },

            "deleteStream" => Command::DeleteStream {
                stream_id: arguments
                    .first()
                    .and_then(|x| x.as_number())
                    .filter(|x| *x >= 0.0)
                    .map(|x| x as u32),
            },

            "closeStream" => Command::CloseStream,
            _ => Command::Unknown {
                name,
                command_object,
                arguments,
            },
        }
    }

    /// True for commands that only make sense on an accepted connection
    pub fn requires_connection(&self) -> bool {
        !matches!(self, Command::Connect(_) | Command::Unknown { .. })
    }
}

fn decode_connect(command_object: Amf0Value) -> ConnectArgs {
    let properties = match command_object {
        Amf0Value::Object(properties) => properties,
        _ => return ConnectArgs::default(),
    };

    let app = string_property(&properties, "app")
        .map(|app| app.trim_end_matches('/').to_string())
        .filter(|app| !app.is_empty());

    ConnectArgs {
        app,
        flash_version: string_property(&properties, "flashVer"),
        tc_url: string_property(&properties, "tcUrl"),
        object_encoding: properties
            .get("objectEncoding")
            .and_then(|x| x.as_number())
            .unwrap_or(0.0),
    }
}

fn string_property(properties: &Amf0Object, name: &str) -> Option<String> {
    properties.get(name).and_then(|x| x.as_str()).map(|x| x.to_string())
}

fn string_argument(arguments: &[Amf0Value], index: usize) -> Option<String> {
    arguments
        .get(index)
        .and_then(|x| x.as_str())
        .map(|x| x.to_string())
}
