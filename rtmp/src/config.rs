use crate::chunk_io::ClockMode;
use crate::messages::PeerBandwidthLimitType;
use std::time::Duration;

/// The configuration options that govern how the RTMP server and its sessions should operate
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Version string reported back in the `connect` result
    pub fms_version: String,

    /// Window acknowledgement size announced to every peer after `connect`
    pub window_ack_size: u32,

    pub peer_bandwidth: u32,
    pub peer_bandwidth_limit_type: PeerBandwidthLimitType,

    /// Maximum chunk size used for everything written to a peer after `connect`
    pub write_chunk_size: u32,

    /// How timestamps of inbound chunk streams are reconstructed
    pub clock_mode: ClockMode,

    /// Reject handshakes whose C2 packet does not echo S1
    pub verify_handshake_echo: bool,

    /// Capacity of each connection's outbound queue
    pub subscriber_queue_size: usize,

    /// Read and write timeout applied to every socket.  `None` waits forever.
    pub idle_timeout: Option<Duration>,
}

impl ServerConfig {
    /// Creates a new server config with overridable defaults
    pub fn new() -> ServerConfig {
        ServerConfig {
            fms_version: "FMS/3,0,1,123".to_string(),
            window_ack_size: 5_000_000,
            peer_bandwidth: 5_000_000,
            peer_bandwidth_limit_type: PeerBandwidthLimitType::Dynamic,
            write_chunk_size: 4096,
            clock_mode: ClockMode::Accumulate,
            verify_handshake_echo: false,
            subscriber_queue_size: 512,
            idle_timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig::new()
    }
}
