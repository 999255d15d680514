//! RTMP timestamps are 32 bit millisecond values that are allowed to wrap around.
//!
//! Adding and subtracting timestamps therefore never overflows; the result wraps
//! back around through zero.  A stream running for ~50 days will see its timestamps
//! roll over, and relayed timestamps have to keep doing the same thing.

use std::num::Wrapping;
use std::ops::{Add, Sub};

/// Representation of a timestamp as stored in RTMP chunk headers
#[derive(Eq, PartialEq, Debug, Copy, Clone, Default)]
pub struct RtmpTimestamp {
    pub value: u32,
}

impl RtmpTimestamp {
    pub fn new(initial_value: u32) -> Self {
        RtmpTimestamp {
            value: initial_value,
        }
    }

    pub fn set(&mut self, new_value: u32) {
        self.value = new_value;
    }
}

impl Add for RtmpTimestamp {
    type Output = RtmpTimestamp;

    fn add(self, other: RtmpTimestamp) -> Self {
        RtmpTimestamp {
            value: add_values(self.value, other.value),
        }
    }
}

impl Add<u32> for RtmpTimestamp {
    type Output = RtmpTimestamp;

    fn add(self, other: u32) -> Self {
        RtmpTimestamp {
            value: add_values(self.value, other),
        }
    }
}

impl Sub for RtmpTimestamp {
    type Output = RtmpTimestamp;

    fn sub(self, other: RtmpTimestamp) -> Self {
        RtmpTimestamp {
            value: sub_values(self.value, other.value),
        }
    }
}

impl PartialEq<u32> for RtmpTimestamp {
    fn eq(&self, other: &u32) -> bool {
        self.value == *other
    }
}

fn add_values(value1: u32, value2: u32) -> u32 {
    (Wrapping(value1) + Wrapping(value2)).0
}

fn sub_values(value1: u32, value2: u32) -> u32 {
    (Wrapping(value1) - Wrapping(value2)).0
}

#[cfg(test)]
mod tests {
    use super::RtmpTimestamp;

    #[test]
    fn two_timestamps_can_be_added_together() {
        let time1 = RtmpTimestamp::new(50);
        let time2 = RtmpTimestamp::new(60);
        let result = time1 + time2;

        assert_eq!(result.value, 110);
    }

    #[test]
    fn can_add_number_to_timestamp_that_overflows_u32() {
        let time = RtmpTimestamp::new(u32::MAX);
        let result = time + 60;

        assert_eq!(result.value, 59);
    }

    #[test]
    fn can_subtract_timestamps_that_underflow_u32() {
        let time1 = RtmpTimestamp::new(10);
        let time2 = RtmpTimestamp::new(20);
        let result = time1 - time2;

        assert_eq!(result.value, u32::MAX - 9);
    }
}
