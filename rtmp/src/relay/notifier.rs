/// Receives a call every time a stream key starts being published.
///
/// Implementations are called from the publishing connection's thread while it is
/// handling `publish`, so they should hand the work off rather than block.
pub trait LiveStreamNotifier: Send + Sync {
    fn stream_went_live(&self, app_name: &str, stream_key: &str);
}

/// Notifier for servers that don't care about streams going live
pub struct NoopNotifier;

impl LiveStreamNotifier for NoopNotifier {
    fn stream_went_live(&self, _app_name: &str, _stream_key: &str) {}
}
