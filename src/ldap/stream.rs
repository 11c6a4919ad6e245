//! Streaming TLV decoder.
//!
//! TCP reads do not respect LDAP message boundaries: one read may carry half
//! a message, several messages, or the tail of one and the head of the next.
//! `StreamDecoder` accumulates whatever the transport hands it and drains
//! complete messages from the front, keeping any partial tail for the next
//! `feed` call. Bytes are never dropped and never consumed twice; the cursor
//! only advances past fully decoded messages.
//!
//! The decoder is owned by a single processing loop and is not thread-safe.

use bytes::{Buf, BytesMut};
use tracing::trace;

use crate::ldap::codec;
use crate::ldap::protocol::LdapMessage;
use crate::Result;

#[derive(Debug, Default)]
pub struct StreamDecoder {
    buf: BytesMut,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return every complete message now available.
    ///
    /// A decode error poisons the exchange; the caller is expected to drop
    /// the decoder (and the connection) rather than resynchronize.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<LdapMessage>> {
        self.buf.extend_from_slice(chunk);

        let mut messages = Vec::new();
        let mut consumed = 0usize;
        loop {
            match codec::decode_message(&self.buf[consumed..])? {
                Some((message, used)) => {
                    trace!(
                        message_id = message.message_id,
                        op = message.protocol_op.name(),
                        bytes = used,
                        "decoded message"
                    );
                    consumed += used;
                    messages.push(message);
                }
                None => break,
            }
        }
        // Discard the fully decoded prefix; the partial tail stays put.
        self.buf.advance(consumed);
        Ok(messages)
    }

    /// Bytes held back waiting for the rest of an in-progress message.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Drop all partial state. Called at the start of each logical exchange.
    pub fn reset(&mut self) {
        self.buf.clear();
    }
}
