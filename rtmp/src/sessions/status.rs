use rtmp_relay_amf0::Amf0Object;

/// Builds the info object carried by `onStatus`, `_result` and `_error` responses
pub fn create_status_object(level: &str, code: &str, description: &str) -> Amf0Object {
    Amf0Object::new()
        .with("level", level)
        .with("code", code)
        .with("description", description)
}
