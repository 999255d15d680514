//! Server side of the plain RTMP handshake.
//!
//! The exchange is strictly sequential: C0, S0, C1, S1, C2, S2.  Each packet after the
//! version byte is 1536 bytes made up of a 4 byte time, a 4 byte field that is zero in
//! S1, and 1528 bytes of random data.

mod errors;

pub use self::errors::HandshakeError;

use byteorder::{BigEndian, ByteOrder};
use log::{debug, trace};
use rand::RngCore;
use std::io::{Read, Write};
use std::time::{SystemTime, UNIX_EPOCH};

pub const RTMP_VERSION: u8 = 3;
pub const PACKET_SIZE: usize = 1536;
const RANDOM_DATA_OFFSET: usize = 8;

/// How far along the handshake has progressed
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum HandshakeStage {
    Start,
    VersionReceived,
    VersionSent,
    Packet1Received,
    Packet1Sent,
    Packet2Received,
    Done,
}

/// Drives the handshake against a blocking duplex stream.
pub struct Handshake {
    stage: HandshakeStage,
    verify_echo: bool,
    my_epoch: u32,
    my_random: Vec<u8>,
    their_packet_1: Vec<u8>,
}

impl Handshake {
    /// Creates a handshake that will send the current wall clock time in S1.
    ///
    /// When `verify_echo` is set the C2 packet has to echo S1's time and random data
    /// exactly, otherwise mismatches are only logged.
    pub fn new(verify_echo: bool) -> Handshake {
        let my_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|x| x.as_millis() as u32)
            .unwrap_or(0);

        Handshake::with_epoch(my_epoch, verify_echo)
    }

    pub fn with_epoch(my_epoch: u32, verify_echo: bool) -> Handshake {
        let mut my_random = vec![0_u8; PACKET_SIZE - RANDOM_DATA_OFFSET];
        rand::thread_rng().fill_bytes(&mut my_random);

        Handshake {
            stage: HandshakeStage::Start,
            verify_echo,
            my_epoch,
            my_random,
            their_packet_1: Vec::new(),
        }
    }

    pub fn stage(&self) -> HandshakeStage {
        self.stage
    }

    pub fn is_completed(&self) -> bool {
        self.stage == HandshakeStage::Done
    }

    /// Runs the whole exchange, blocking on every read and write.  On success exactly
    /// 3073 bytes have been read from and written to the stream.
    pub fn perform<S: Read + Write>(&mut self, stream: &mut S) -> Result<(), HandshakeError> {
        while self.stage != HandshakeStage::Done {
            self.advance(stream)?;
        }

        Ok(())
    }

    fn advance<S: Read + Write>(&mut self, stream: &mut S) -> Result<(), HandshakeError> {
        trace!("Handshake at stage {:?}", self.stage);

        self.stage = match self.stage {
            HandshakeStage::Start => {
                let mut version = [0_u8; 1];
                stream.read_exact(&mut version)?;
                if version[0] != RTMP_VERSION {
                    return Err(HandshakeError::BadVersionId {
                        version: version[0],
                    });
                }

                HandshakeStage::VersionReceived
            }

            HandshakeStage::VersionReceived => {
                stream.write_all(&[RTMP_VERSION])?;
                HandshakeStage::VersionSent
            }

            HandshakeStage::VersionSent => {
                let mut packet = vec![0_u8; PACKET_SIZE];
                stream.read_exact(&mut packet)?;
                debug!(
                    "Received C1 with time {} and version field {}",
                    BigEndian::read_u32(&packet[0..4]),
                    BigEndian::read_u32(&packet[4..8])
                );

                self.their_packet_1 = packet;
                HandshakeStage::Packet1Received
            }

            HandshakeStage::Packet1Received => {
                let packet = create_packet(self.my_epoch, 0, &self.my_random);
                stream.write_all(&packet)?;
                stream.flush()?;
                HandshakeStage::Packet1Sent
            }

            HandshakeStage::Packet1Sent => {
                let mut packet = vec![0_u8; PACKET_SIZE];
                stream.read_exact(&mut packet)?;
                self.check_echo(&packet)?;
                HandshakeStage::Packet2Received
            }

            HandshakeStage::Packet2Received => {
                // S2 is C1 sent straight back
                stream.write_all(&self.their_packet_1)?;
                stream.flush()?;
                HandshakeStage::Done
            }

            HandshakeStage::Done => HandshakeStage::Done,
        };

        Ok(())
    }

    fn check_echo(&self, packet: &[u8]) -> Result<(), HandshakeError> {
        let echoed_time = BigEndian::read_u32(&packet[0..4]);
        if echoed_time != self.my_epoch {
            if self.verify_echo {
                return Err(HandshakeError::IncorrectPeerTime);
            }

            debug!("C2 echoed time {} instead of {}", echoed_time, self.my_epoch);
        }

        if packet[RANDOM_DATA_OFFSET..] != self.my_random[..] {
            if self.verify_echo {
                return Err(HandshakeError::IncorrectRandomData);
            }

            debug!("C2 did not echo the random data sent in S1");
        }

        Ok(())
    }
}

fn create_packet(time1: u32, time2: u32, random: &[u8]) -> Vec<u8> {
    let mut packet = vec![0_u8; PACKET_SIZE];
    BigEndian::write_u32(&mut packet[0..4], time1);
    BigEndian::write_u32(&mut packet[4..8], time2);
    packet[RANDOM_DATA_OFFSET..].copy_from_slice(random);

    packet
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    /// Stream whose reads come from a fixed buffer and whose writes are captured
    struct MockStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl MockStream {
        fn new(input: Vec<u8>) -> MockStream {
            MockStream {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }

        fn unread_bytes(&self) -> usize {
            self.input.get_ref().len() - self.input.position() as usize
        }
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn create_client_packet_1(epoch: u32) -> Vec<u8> {
        let mut random = vec![0_u8; 1528];
        rand::thread_rng().fill_bytes(&mut random);
        create_packet(epoch, 0, &random)
    }

    #[test]
    fn starts_in_start_stage() {
        let handshake = Handshake::with_epoch(0, false);
        assert_eq!(handshake.stage(), HandshakeStage::Start);
        assert!(!handshake.is_completed());
    }

    #[test]
    fn completes_against_well_behaved_client() {
        let epoch = 25;
        let handshake_template = Handshake::with_epoch(epoch, true);
        let c1 = create_client_packet_1(15);
        let c2 = create_packet(epoch, 15, &handshake_template.my_random);

        let mut input = vec![3_u8];
        input.extend(&c1);
        input.extend(&c2);

        let mut stream = MockStream::new(input);
        let mut handshake = handshake_template;
        handshake.perform(&mut stream).unwrap();

        assert!(handshake.is_completed(), "Handshake not completed");
        assert_eq!(stream.unread_bytes(), 0, "Unread input remained");
        assert_eq!(stream.output.len(), 1 + PACKET_SIZE * 2, "Incorrect output length");
        assert_eq!(stream.output[0], 3, "Incorrect S0");

        let s1 = &stream.output[1..1 + PACKET_SIZE];
        assert_eq!(BigEndian::read_u32(&s1[0..4]), epoch, "Incorrect S1 time");
        assert_eq!(BigEndian::read_u32(&s1[4..8]), 0, "S1 zero field was not zero");
        assert_eq!(&s1[8..], &handshake.my_random[..], "Incorrect S1 random data");

        let s2 = &stream.output[1 + PACKET_SIZE..];
        assert_eq!(s2, &c1[..], "S2 did not echo C1");
    }

    #[test]
    fn s2_echoes_c1_even_with_non_zero_version_field() {
        let mut random = vec![7_u8; 1528];
        random[0] = 1;
        let c1 = create_packet(99, 0x0a00_2d02, &random);

        let mut input = vec![3_u8];
        input.extend(&c1);
        input.extend(vec![0_u8; PACKET_SIZE]);

        let mut stream = MockStream::new(input);
        Handshake::with_epoch(0, false).perform(&mut stream).unwrap();

        assert_eq!(&stream.output[1 + PACKET_SIZE..], &c1[..]);
    }

    #[test]
    fn rejects_bad_version() {
        let mut stream = MockStream::new(vec![6_u8]);
        match Handshake::with_epoch(0, false).perform(&mut stream) {
            Err(HandshakeError::BadVersionId { version: 6 }) => (),
            x => panic!("Expected BadVersionId error, instead received {:?}", x),
        }

        assert!(stream.output.is_empty(), "Nothing should have been written");
    }

    #[test]
    fn mismatched_c2_is_accepted_when_not_verifying() {
        let mut input = vec![3_u8];
        input.extend(create_client_packet_1(15));
        input.extend(vec![0_u8; PACKET_SIZE]);

        let mut stream = MockStream::new(input);
        let mut handshake = Handshake::with_epoch(25, false);
        handshake.perform(&mut stream).unwrap();

        assert!(handshake.is_completed());
    }

    #[test]
    fn error_when_bad_time_in_c2_while_verifying() {
        let handshake_template = Handshake::with_epoch(25, true);
        let mut input = vec![3_u8];
        input.extend(create_client_packet_1(15));
        input.extend(create_packet(26, 15, &handshake_template.my_random));

        let mut stream = MockStream::new(input);
        let mut handshake = handshake_template;
        match handshake.perform(&mut stream) {
            Err(HandshakeError::IncorrectPeerTime) => (),
            x => panic!("Expected IncorrectPeerTime error, instead received {:?}", x),
        }
    }

    #[test]
    fn error_when_bad_random_data_in_c2_while_verifying() {
        let handshake_template = Handshake::with_epoch(25, true);
        let mut random = handshake_template.my_random.clone();
        random[0] = random[0].wrapping_add(1);

        let mut input = vec![3_u8];
        input.extend(create_client_packet_1(15));
        input.extend(create_packet(25, 15, &random));

        let mut stream = MockStream::new(input);
        let mut handshake = handshake_template;
        match handshake.perform(&mut stream) {
            Err(HandshakeError::IncorrectRandomData) => (),
            x => panic!("Expected IncorrectRandomData error, instead received {:?}", x),
        }
    }

    #[test]
    fn short_read_is_an_io_error() {
        let mut input = vec![3_u8];
        input.extend(vec![0_u8; 100]);

        let mut stream = MockStream::new(input);
        let mut handshake = Handshake::with_epoch(0, false);
        match handshake.perform(&mut stream) {
            Err(HandshakeError::Io(_)) => (),
            x => panic!("Expected Io error, instead received {:?}", x),
        }

        assert_eq!(handshake.stage(), HandshakeStage::VersionSent);
    }
}
