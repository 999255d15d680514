//! Idle detection that looks at traffic in both directions.
//!
//! A player that is only receiving media may not write anything for a long time, so a
//! plain socket read timeout would close it in the middle of playback.  Both halves of a
//! connection record their traffic in a shared `ActivityTracker`, and the reading half
//! only gives up once neither direction has moved for the whole idle timeout.

use std::io::{self, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time of the most recent traffic on a connection, in either direction
#[derive(Debug)]
pub struct ActivityTracker {
    started_at: Instant,
    last_activity_ms: AtomicU64,
}

impl ActivityTracker {
    pub fn new() -> ActivityTracker {
        ActivityTracker {
            started_at: Instant::now(),
            last_activity_ms: AtomicU64::new(0),
        }
    }

    pub fn record(&self) {
        self.last_activity_ms.store(self.elapsed_ms(), Ordering::Relaxed);
    }

    /// How long it has been since any traffic was recorded
    pub fn idle_time(&self) -> Duration {
        let last = self.last_activity_ms.load(Ordering::Relaxed);
        Duration::from_millis(self.elapsed_ms().saturating_sub(last))
    }

    fn elapsed_ms(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

impl Default for ActivityTracker {
    fn default() -> Self {
        ActivityTracker::new()
    }
}

/// Reader over a socket with a read timeout set to the idle timeout.
///
/// A timed out read returns no bytes, so retrying it never loses data.  Timeouts are
/// retried as long as the connection saw traffic within the idle timeout, and surface as
/// the original I/O error once it has been silent for longer than that.
pub struct IdleAwareReader<R> {
    inner: R,
    activity: Arc<ActivityTracker>,
    idle_timeout: Option<Duration>,
}

impl<R: Read> IdleAwareReader<R> {
    pub fn new(inner: R, activity: Arc<ActivityTracker>, idle_timeout: Option<Duration>) -> Self {
        IdleAwareReader {
            inner,
            activity,
            idle_timeout,
        }
    }
}

impl<R: Read> Read for IdleAwareReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.inner.read(buf) {
                Ok(bytes_read) => {
                    if bytes_read > 0 {
                        self.activity.record();
                    }

                    return Ok(bytes_read);
                }

                Err(ref error) if error.kind() == io::ErrorKind::Interrupted => continue,
                Err(error) if is_timeout(&error) => match self.idle_timeout {
                    Some(timeout) if self.activity.idle_time() < timeout => continue,
                    _ => return Err(error),
                },

                Err(error) => return Err(error),
            }
        }
    }
}

fn is_timeout(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Plays back a fixed list of read outcomes
    struct ScriptedReader {
        outcomes: VecDeque<io::Result<Vec<u8>>>,
        timeouts_seen: usize,
    }

    impl Read for ScriptedReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.outcomes.pop_front() {
                Some(Ok(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(&bytes);
                    Ok(bytes.len())
                }

                Some(Err(error)) => {
                    self.timeouts_seen += 1;
                    Err(error)
                }

                None => Ok(0),
            }
        }
    }

    fn timeout() -> io::Result<Vec<u8>> {
        Err(io::Error::from(io::ErrorKind::WouldBlock))
    }

    #[test]
    fn timeout_retried_while_connection_recently_active() {
        let activity = Arc::new(ActivityTracker::new());
        activity.record();

        let inner = ScriptedReader {
            outcomes: vec![timeout(), timeout(), Ok(vec![7, 8])].into_iter().collect(),
            timeouts_seen: 0,
        };

        let mut reader = IdleAwareReader::new(inner, activity, Some(Duration::from_secs(60)));
        let mut buffer = [0_u8; 4];

        let bytes_read = reader.read(&mut buffer).unwrap();
        assert_eq!(bytes_read, 2, "Unexpected number of bytes read");
        assert_eq!(&buffer[..2], &[7, 8]);
        assert_eq!(reader.inner.timeouts_seen, 2, "Timeouts were not retried");
    }

    #[test]
    fn timeout_returned_once_connection_is_idle() {
        let activity = Arc::new(ActivityTracker::new());
        let inner = ScriptedReader {
            outcomes: vec![timeout(), Ok(vec![1])].into_iter().collect(),
            timeouts_seen: 0,
        };

        let mut reader = IdleAwareReader::new(inner, activity, Some(Duration::from_millis(0)));
        let mut buffer = [0_u8; 4];

        match reader.read(&mut buffer) {
            Err(ref error) if error.kind() == io::ErrorKind::WouldBlock => (),
            x => panic!("Expected timeout error, instead received {:?}", x),
        }
    }

    #[test]
    fn reads_record_activity() {
        let activity = Arc::new(ActivityTracker::new());
        std::thread::sleep(Duration::from_millis(30));
        assert!(activity.idle_time() >= Duration::from_millis(30), "Tracker did not age");

        let inner = ScriptedReader {
            outcomes: vec![Ok(vec![1])].into_iter().collect(),
            timeouts_seen: 0,
        };

        let mut reader = IdleAwareReader::new(inner, activity.clone(), None);
        reader.read(&mut [0_u8; 1]).unwrap();

        assert!(activity.idle_time() < Duration::from_millis(30), "Read was not recorded");
    }
}
