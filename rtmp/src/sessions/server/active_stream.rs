/// What a message stream created with `createStream` is currently used for
#[derive(PartialEq, Debug, Clone)]
pub enum StreamState {
    Created,
    Publishing { stream_key: String },
    Playing { stream_key: String },
}

pub struct ActiveStream {
    pub current_state: StreamState,
}

impl ActiveStream {
    pub fn new() -> ActiveStream {
        ActiveStream {
            current_state: StreamState::Created,
        }
    }

    pub fn publishing_key(&self) -> Option<&str> {
        match self.current_state {
            StreamState::Publishing { ref stream_key } => Some(stream_key),
            _ => None,
        }
    }
}
