/// This module contains the server side session abstraction.
///
/// A session reacts to the RTMP messages read off a single connection.  Responses are
/// pushed onto that connection's outbound queue, publishing and playback are coordinated
/// through the shared stream registry, and anything the connection driver needs to act
/// on or log is returned as a result.

mod server;
mod status;


pub use self::server::ServerSession;
pub use self::server::ServerSessionError;
pub use self::server::ServerSessionEvent;
pub use self::server::ServerSessionResult;
pub use self::server::MAX_STREAMS_PER_CONNECTION;
pub use self::server::{Command, ConnectArgs, PlayArgs, PublishArgs};
pub use self::status::create_status_object;
