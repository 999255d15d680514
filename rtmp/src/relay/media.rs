//! Inspection of FLV style audio and video tag bodies.
//!
//! Only the first two bytes are looked at.  Video tags carry the frame type in the high
//! nibble of the first byte and the codec id in the low one.  For AVC the second byte is
//! the packet type, where 0 is the decoder configuration record.  Audio tags carry the
//! sound format in the high nibble, and AAC uses the second byte the same way.

use bytes::Bytes;

const VIDEO_KEYFRAME: u8 = 1;
const VIDEO_CODEC_AVC: u8 = 7;
const AUDIO_FORMAT_AAC: u8 = 10;
const SEQUENCE_HEADER_PACKET: u8 = 0;

/// True for an AVC decoder configuration record, `0x17 0x00`
pub fn is_video_sequence_header(data: &Bytes) -> bool {
    data.len() >= 2
        && data[0] >> 4 == VIDEO_KEYFRAME
        && data[0] & 0x0f == VIDEO_CODEC_AVC
        && data[1] == SEQUENCE_HEADER_PACKET
}

/// True for an AAC audio specific config, `0xAF 0x00`
pub fn is_audio_sequence_header(data: &Bytes) -> bool {
    data.len() >= 2 && data[0] >> 4 == AUDIO_FORMAT_AAC && data[1] == SEQUENCE_HEADER_PACKET
}

/// True for a video frame a decoder can start from.  Sequence headers share the key
/// frame type but carry no picture, so they don't count.
pub fn is_video_keyframe(data: &Bytes) -> bool {
    !data.is_empty() && data[0] >> 4 == VIDEO_KEYFRAME && !is_video_sequence_header(data)
}
