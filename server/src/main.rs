mod hls;

use clap::Parser;
use hls::{HlsPreview, HlsSettings};
use log::{error, info, warn, LevelFilter};
use rtmp_relay::chunk_io::ClockMode;
use rtmp_relay::{serve_connection, LiveStreamNotifier, NoopNotifier, ServerConfig, ServerContext};
use std::io;
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "rtmp-relay-server")]
#[command(about = "Relays RTMP streams from publishers to players", long_about = None)]
struct Args {
    /// Address to accept RTMP connections on
    #[arg(long, default_value = "0.0.0.0:1935")]
    address: String,

    /// Maximum chunk size used when writing to peers
    #[arg(long, default_value_t = 4096)]
    chunk_size: u32,

    /// Treat format 0 chunk timestamps as absolute instead of adding them to the clock
    #[arg(long)]
    strict_timestamps: bool,

    /// Close connections whose C2 handshake packet does not echo S1
    #[arg(long)]
    verify_handshake: bool,

    /// Capacity of each connection's outbound queue
    #[arg(long, default_value_t = 512)]
    queue_size: usize,

    /// Seconds a socket may stay silent before it is closed, 0 to wait forever
    #[arg(long, default_value_t = 30)]
    idle_timeout_secs: u64,

    /// Directory HLS previews are written under, one sub directory per stream key
    #[arg(long, default_value = "hls-preview")]
    hls_output: PathBuf,

    #[arg(long, default_value = "ffmpeg")]
    ffmpeg_path: PathBuf,

    /// Don't launch ffmpeg when a stream goes live
    #[arg(long)]
    no_hls: bool,

    /// Log level used unless RUST_LOG says otherwise
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

impl Args {
    fn server_config(&self) -> ServerConfig {
        let mut config = ServerConfig::new();
        config.write_chunk_size = self.chunk_size;
        config.verify_handshake_echo = self.verify_handshake;
        config.subscriber_queue_size = self.queue_size;
        config.clock_mode = if self.strict_timestamps {
            ClockMode::Strict
        } else {
            ClockMode::Accumulate
        };

        config.idle_timeout = match self.idle_timeout_secs {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        };

        config
    }
}

fn main() -> io::Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .parse_default_env()
        .init();

    let listener = TcpListener::bind(&args.address)?;
    let local_address = listener.local_addr()?;

    let notifier: Arc<dyn LiveStreamNotifier> = if args.no_hls {
        Arc::new(NoopNotifier)
    } else {
        let settings = HlsSettings {
            output_dir: args.hls_output.clone(),
            ffmpeg_path: args.ffmpeg_path.clone(),
            rtmp_port: local_address.port(),
        };

        Arc::new(HlsPreview::start(settings)?)
    };

    let context = ServerContext::new(args.server_config(), notifier);
    info!("Listening for connections on {}", local_address);

    let mut next_connection_id = 0_u64;
    for stream in listener.incoming() {
        let socket = match stream {
            Ok(socket) => socket,
            Err(error) => {
                warn!("Failed to accept connection: {}", error);
                continue;
            }
        };

        next_connection_id += 1;
        let connection_id = next_connection_id;
        let context = context.clone();
        match socket.peer_addr() {
            Ok(peer) => info!("Connection {}: accepted from {}", connection_id, peer),
            Err(_) => info!("Connection {}: accepted", connection_id),
        }

        let spawned = thread::Builder::new()
            .name(format!("rtmp-connection-{}", connection_id))
            .spawn(move || match serve_connection(socket, connection_id, context) {
                Ok(()) => info!("Connection {}: closed", connection_id),
                Err(error) => warn!("Connection {}: closed: {}", connection_id, error),
            });

        if let Err(error) = spawned {
            error!("Connection {}: failed to start thread: {}", connection_id, error);
        }
    }

    Ok(())
}
