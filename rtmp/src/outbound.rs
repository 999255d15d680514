//! Queue feeding a connection's writer thread.
//!
//! Everything a connection sends after the handshake passes through one bounded queue,
//! whether it is a response produced by its own session or media relayed from another
//! connection's publisher.  The writer thread on the other end owns the chunk
//! serializer, so the order of the queue is the order on the wire.

use crate::messages::MessagePayload;
use crossbeam_channel::{bounded, Receiver, Sender};

#[derive(Debug, PartialEq)]
pub enum Outbound {
    /// A message to chunk and write on the chunk stream matching its type
    Message(MessagePayload),

    /// Switch the outbound chunk size, announcing it to the peer first
    SetChunkSize(u32),
}

pub type OutboundSender = Sender<Outbound>;
pub type OutboundReceiver = Receiver<Outbound>;

pub fn outbound_queue(capacity: usize) -> (OutboundSender, OutboundReceiver) {
    bounded(capacity)
}
