//! Turns every stream that goes live into an HLS preview by pointing ffmpeg at it.
//!
//! Publishing connections only push the stream's name onto a channel.  A single worker
//! thread prepares the output directory and launches ffmpeg, so a slow disk or a missing
//! ffmpeg binary never holds up the publisher.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{debug, error, info, warn};
use rtmp_relay::LiveStreamNotifier;
use std::fs;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;

const PLAYLIST_NAME: &str = "index.m3u8";
const PENDING_STREAM_LIMIT: usize = 64;

/// Served until ffmpeg writes its first real playlist
const PLACEHOLDER_PLAYLIST: &str = "#EXTM3U\n\
#EXT-X-VERSION:3\n\
#EXT-X-TARGETDURATION:8\n\
#EXT-X-MEDIA-SEQUENCE:1\n";

#[derive(Clone, Debug)]
pub struct HlsSettings {
    pub output_dir: PathBuf,
    pub ffmpeg_path: PathBuf,

    /// Port of this server, which ffmpeg plays the live stream back from
    pub rtmp_port: u16,
}

struct LiveStream {
    app_name: String,
    stream_key: String,
}

pub struct HlsPreview {
    sender: Sender<LiveStream>,
}

impl HlsPreview {
    pub fn start(settings: HlsSettings) -> io::Result<HlsPreview> {
        fs::create_dir_all(&settings.output_dir)?;

        let (sender, receiver) = bounded(PENDING_STREAM_LIMIT);
        thread::Builder::new()
            .name("hls-preview".to_string())
            .spawn(move || run_worker(settings, receiver))?;

        Ok(HlsPreview { sender })
    }
}

impl LiveStreamNotifier for HlsPreview {
    fn stream_went_live(&self, app_name: &str, stream_key: &str) {
        let stream = LiveStream {
            app_name: app_name.to_string(),
            stream_key: stream_key.to_string(),
        };

        match self.sender.try_send(stream) {
            Ok(()) => (),
            Err(TrySendError::Full(_)) => {
                warn!("Too many pending HLS previews, skipping stream '{}'", stream_key)
            }

            Err(TrySendError::Disconnected(_)) => {
                error!("HLS preview worker is gone, skipping stream '{}'", stream_key)
            }
        }
    }
}

fn run_worker(settings: HlsSettings, receiver: Receiver<LiveStream>) {
    for stream in receiver.iter() {
        if let Err(error) = start_preview(&settings, &stream) {
            error!(
                "Failed to start HLS preview for {}/{}: {}",
                stream.app_name, stream.stream_key, error
            );
        }
    }
}

fn start_preview(settings: &HlsSettings, stream: &LiveStream) -> io::Result<()> {
    if !is_safe_directory_name(&stream.stream_key) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "stream key can't be used as a directory name",
        ));
    }

    let stream_dir = settings.output_dir.join(&stream.stream_key);
    let playlist = write_placeholder_playlist(&stream_dir)?;

    let mut child = Command::new(&settings.ffmpeg_path)
        .args(ffmpeg_arguments(settings, &stream.app_name, &stream.stream_key, &playlist))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    info!(
        "Started ffmpeg (pid {}) for HLS preview of {}/{} in {}",
        child.id(),
        stream.app_name,
        stream.stream_key,
        stream_dir.display()
    );

    if let Some(stdout) = child.stdout.take() {
        forward_output(stdout, format!("ffmpeg {} stdout", stream.stream_key))?;
    }

    if let Some(stderr) = child.stderr.take() {
        forward_output(stderr, format!("ffmpeg {} stderr", stream.stream_key))?;
    }

    let stream_key = stream.stream_key.clone();
    thread::Builder::new()
        .name(format!("ffmpeg-wait-{}", stream_key))
        .spawn(move || wait_for_exit(child, stream_key))?;

    Ok(())
}

/// Creates the stream's directory and makes sure a playlist exists before ffmpeg is up
fn write_placeholder_playlist(stream_dir: &Path) -> io::Result<PathBuf> {
    fs::create_dir_all(stream_dir)?;

    let playlist = stream_dir.join(PLAYLIST_NAME);
    fs::write(&playlist, PLACEHOLDER_PLAYLIST)?;
    Ok(playlist)
}

fn ffmpeg_arguments(settings: &HlsSettings, app_name: &str, stream_key: &str, playlist: &Path) -> Vec<String> {
    let source = format!("rtmp://127.0.0.1:{}/{}/{}", settings.rtmp_port, app_name, stream_key);

    let mut arguments: Vec<String> = vec!["-i".to_string(), source];
    arguments.extend(
        [
            "-c:v",
            "libx264",
            "-c:a",
            "aac",
            "-f",
            "hls",
            "-hls_time",
            "3",
            "-hls_list_size",
            "6",
            "-hls_flags",
            "delete_segments",
            "-start_number",
            "1",
        ]
        .iter()
        .map(|x| x.to_string()),
    );

    arguments.push(playlist.to_string_lossy().into_owned());
    arguments
}

fn is_safe_directory_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(|c: char| c == '/' || c == '\\' || c.is_control())
}

fn forward_output<R>(output: R, label: String) -> io::Result<()>
where
    R: Read + Send + 'static,
{
    thread::Builder::new().name(label.clone()).spawn(move || {
        for line in BufReader::new(output).lines() {
            match line {
                Ok(line) => debug!("{}: {}", label, line),
                Err(_) => break,
            }
        }
    })?;

    Ok(())
}

fn wait_for_exit(mut child: Child, stream_key: String) {
    match child.wait() {
        Ok(status) if status.success() => info!("ffmpeg for stream '{}' finished", stream_key),
        Ok(status) => warn!("ffmpeg for stream '{}' exited with {}", stream_key, status),
        Err(error) => error!("Failed waiting on ffmpeg for stream '{}': {}", stream_key, error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_settings(output_dir: PathBuf) -> HlsSettings {
        HlsSettings {
            output_dir,
            ffmpeg_path: PathBuf::from("ffmpeg"),
            rtmp_port: 1935,
        }
    }

    #[test]
    fn placeholder_playlist_written_to_stream_directory() {
        let root = std::env::temp_dir().join(format!("hls-placeholder-{}", std::process::id()));
        let stream_dir = root.join("key");

        let playlist = write_placeholder_playlist(&stream_dir).unwrap();
        let contents = fs::read_to_string(&playlist).unwrap();
        let _ = fs::remove_dir_all(&root);

        assert_eq!(playlist, stream_dir.join("index.m3u8"));
        assert!(contents.starts_with("#EXTM3U\n"), "Unexpected playlist: {}", contents);
        assert!(contents.contains("#EXT-X-TARGETDURATION:8"), "Unexpected playlist: {}", contents);
    }

    #[test]
    fn ffmpeg_reads_stream_back_from_local_server() {
        let settings = create_settings(PathBuf::from("/srv/hls"));
        let playlist = PathBuf::from("/srv/hls/key/index.m3u8");

        let arguments = ffmpeg_arguments(&settings, "live", "key", &playlist);

        assert_eq!(&arguments[..2], &["-i", "rtmp://127.0.0.1:1935/live/key"]);
        assert_eq!(arguments.last().map(|x| x.as_str()), Some("/srv/hls/key/index.m3u8"));

        let joined = arguments.join(" ");
        assert!(joined.contains("-f hls"), "Unexpected arguments: {}", joined);
        assert!(joined.contains("-hls_time 3"), "Unexpected arguments: {}", joined);
        assert!(joined.contains("-hls_list_size 6"), "Unexpected arguments: {}", joined);
        assert!(joined.contains("-hls_flags delete_segments"), "Unexpected arguments: {}", joined);
    }

    #[test]
    fn stream_keys_that_escape_output_directory_are_rejected() {
        assert!(is_safe_directory_name("my-stream_1"));
        assert!(!is_safe_directory_name(""));
        assert!(!is_safe_directory_name(".."));
        assert!(!is_safe_directory_name("../etc"));
        assert!(!is_safe_directory_name("a\\b"));
    }

    #[test]
    fn missing_ffmpeg_is_reported_not_fatal() {
        let root = std::env::temp_dir().join(format!("hls-missing-ffmpeg-{}", std::process::id()));
        let mut settings = create_settings(root.clone());
        settings.ffmpeg_path = root.join("does-not-exist");

        let stream = LiveStream {
            app_name: "live".to_string(),
            stream_key: "key".to_string(),
        };

        let result = start_preview(&settings, &stream);
        let placeholder_written = root.join("key").join("index.m3u8").exists();
        let _ = fs::remove_dir_all(&root);

        assert!(result.is_err(), "Expected spawn failure");
        assert!(placeholder_written, "Placeholder playlist was not written");
    }
}
