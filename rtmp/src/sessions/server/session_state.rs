#[derive(PartialEq, Debug, Clone, Copy)]
pub enum SessionState {
    /// Handshake is done but `connect` has not been accepted yet
    Started,
    Connected,
}
