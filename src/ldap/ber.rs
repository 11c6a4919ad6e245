//! BER TLV primitives shared by the LDAP encoder and decoder.
//!
//! Only the subset LDAPv3 needs: definite-length encodings, universal
//! INTEGER/ENUMERATED/BOOLEAN/OCTET STRING, and constructed wrappers.
//! Indefinite lengths are rejected (RFC 4511 section 5.1).

use bytes::{BufMut, BytesMut};

use crate::{GatewayError, Result};

// Universal tags
pub const TAG_BOOLEAN: u8 = 0x01;
pub const TAG_INTEGER: u8 = 0x02;
pub const TAG_OCTET_STRING: u8 = 0x04;
pub const TAG_ENUMERATED: u8 = 0x0a;
pub const TAG_SEQUENCE: u8 = 0x30;
pub const TAG_SET: u8 = 0x31;

/// Outcome of peeking at a length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LengthPeek {
    /// Definite length plus the number of bytes the length field itself used.
    Definite { value: usize, header_len: usize },
    /// The buffer ends inside the length field.
    NeedMore,
}

/// Parse a BER length field at the front of `data`.
///
/// Lengths above four octets are rejected outright; no LDAP message the
/// gateway handles comes close, and it bounds buffer growth on hostile input.
pub fn peek_length(data: &[u8]) -> Result<LengthPeek> {
    let Some(&first) = data.first() else {
        return Ok(LengthPeek::NeedMore);
    };

    if first & 0x80 == 0 {
        return Ok(LengthPeek::Definite {
            value: first as usize,
            header_len: 1,
        });
    }

    let num_octets = (first & 0x7f) as usize;
    if num_octets == 0 {
        return Err(GatewayError::Decoding(
            "indefinite BER length is not allowed in LDAP".to_string(),
        ));
    }
    if num_octets > 4 {
        return Err(GatewayError::Decoding(format!(
            "BER length of {} octets exceeds the supported maximum",
            num_octets
        )));
    }
    if data.len() < 1 + num_octets {
        return Ok(LengthPeek::NeedMore);
    }

    let mut value = 0usize;
    for &byte in &data[1..1 + num_octets] {
        value = (value << 8) | byte as usize;
    }
    Ok(LengthPeek::Definite {
        value,
        header_len: 1 + num_octets,
    })
}

/// Write a definite BER length field.
pub fn put_length(buf: &mut BytesMut, length: usize) {
    if length < 0x80 {
        buf.put_u8(length as u8);
    } else if length < 0x100 {
        buf.put_u8(0x81);
        buf.put_u8(length as u8);
    } else if length < 0x1_0000 {
        buf.put_u8(0x82);
        buf.put_u16(length as u16);
    } else if length < 0x100_0000 {
        buf.put_u8(0x83);
        buf.put_u8((length >> 16) as u8);
        buf.put_u8((length >> 8) as u8);
        buf.put_u8(length as u8);
    } else {
        buf.put_u8(0x84);
        buf.put_u32(length as u32);
    }
}

/// Write one complete TLV.
pub fn put_tlv(buf: &mut BytesMut, tag: u8, content: &[u8]) {
    buf.put_u8(tag);
    put_length(buf, content.len());
    buf.put_slice(content);
}

/// Write an INTEGER or ENUMERATED with minimal two's-complement content.
pub fn put_integer(buf: &mut BytesMut, tag: u8, value: u32) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < 3 && bytes[start] == 0 {
        start += 1;
    }
    buf.put_u8(tag);
    // A leading 1-bit would flip the sign, so pad with a zero octet.
    if bytes[start] & 0x80 != 0 {
        put_length(buf, bytes.len() - start + 1);
        buf.put_u8(0);
    } else {
        put_length(buf, bytes.len() - start);
    }
    buf.put_slice(&bytes[start..]);
}

pub fn put_octet_string(buf: &mut BytesMut, tag: u8, value: &[u8]) {
    put_tlv(buf, tag, value);
}

pub fn put_boolean(buf: &mut BytesMut, value: bool) {
    buf.put_u8(TAG_BOOLEAN);
    buf.put_u8(1);
    buf.put_u8(if value { 0xff } else { 0x00 });
}

/// Cursor over the content octets of one decoded TLV.
///
/// All reads fail with `GatewayError::Decoding` on truncated or mis-tagged
/// input; "need more data" never occurs here because the streaming layer only
/// hands over complete top-level messages.
pub struct BerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    pub fn peek_tag(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| GatewayError::Decoding("unexpected end of BER content".to_string()))
    }

    /// Read the next TLV, returning its tag and content octets.
    pub fn read_any(&mut self) -> Result<(u8, &'a [u8])> {
        let tag = self.peek_tag()?;
        self.pos += 1;
        let length = match peek_length(&self.data[self.pos..])? {
            LengthPeek::Definite { value, header_len } => {
                self.pos += header_len;
                value
            }
            LengthPeek::NeedMore => {
                return Err(GatewayError::Decoding(
                    "truncated BER length field".to_string(),
                ));
            }
        };
        if self.remaining() < length {
            return Err(GatewayError::Decoding(format!(
                "BER value of {} bytes overruns its enclosing structure",
                length
            )));
        }
        let content = &self.data[self.pos..self.pos + length];
        self.pos += length;
        Ok((tag, content))
    }

    /// Read the next TLV and require a specific tag.
    pub fn read_expected(&mut self, expected: u8) -> Result<&'a [u8]> {
        let (tag, content) = self.read_any()?;
        if tag != expected {
            return Err(GatewayError::Decoding(format!(
                "expected BER tag 0x{:02x}, found 0x{:02x}",
                expected, tag
            )));
        }
        Ok(content)
    }

    pub fn read_integer(&mut self) -> Result<u32> {
        let content = self.read_expected(TAG_INTEGER)?;
        decode_integer_content(content)
    }

    pub fn read_enumerated(&mut self) -> Result<u32> {
        let content = self.read_expected(TAG_ENUMERATED)?;
        decode_integer_content(content)
    }

    pub fn read_boolean(&mut self) -> Result<bool> {
        let content = self.read_expected(TAG_BOOLEAN)?;
        if content.len() != 1 {
            return Err(GatewayError::Decoding(
                "BOOLEAN content must be one octet".to_string(),
            ));
        }
        Ok(content[0] != 0)
    }

    pub fn read_octet_string(&mut self) -> Result<&'a [u8]> {
        self.read_expected(TAG_OCTET_STRING)
    }

    pub fn read_string(&mut self) -> Result<String> {
        let content = self.read_octet_string()?;
        string_from_bytes(content)
    }
}

pub fn decode_integer_content(content: &[u8]) -> Result<u32> {
    if content.is_empty() || content.len() > 5 {
        return Err(GatewayError::Decoding(format!(
            "INTEGER content of {} octets is out of range",
            content.len()
        )));
    }
    // Five octets are only valid as a zero pad before a high bit.
    if content.len() == 5 && content[0] != 0 {
        return Err(GatewayError::Decoding(
            "INTEGER value exceeds 32 bits".to_string(),
        ));
    }
    let mut value = 0u32;
    for &byte in content.iter().skip(if content.len() == 5 { 1 } else { 0 }) {
        value = (value << 8) | byte as u32;
    }
    Ok(value)
}

pub fn string_from_bytes(bytes: &[u8]) -> Result<String> {
    String::from_utf8(bytes.to_vec())
        .map_err(|_| GatewayError::Decoding("string value is not valid UTF-8".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peek_length_short_form() {
        assert_eq!(
            peek_length(&[0x05]).unwrap(),
            LengthPeek::Definite {
                value: 5,
                header_len: 1
            }
        );
        assert_eq!(
            peek_length(&[0x7f]).unwrap(),
            LengthPeek::Definite {
                value: 0x7f,
                header_len: 1
            }
        );
    }

    #[test]
    fn test_peek_length_long_form() {
        assert_eq!(
            peek_length(&[0x81, 0x80]).unwrap(),
            LengthPeek::Definite {
                value: 0x80,
                header_len: 2
            }
        );
        assert_eq!(
            peek_length(&[0x82, 0x01, 0x00]).unwrap(),
            LengthPeek::Definite {
                value: 0x100,
                header_len: 3
            }
        );
        assert_eq!(
            peek_length(&[0x84, 0x01, 0x00, 0x00, 0x00]).unwrap(),
            LengthPeek::Definite {
                value: 0x0100_0000,
                header_len: 5
            }
        );
    }

    #[test]
    fn test_peek_length_needs_more() {
        assert_eq!(peek_length(&[]).unwrap(), LengthPeek::NeedMore);
        assert_eq!(peek_length(&[0x82, 0x01]).unwrap(), LengthPeek::NeedMore);
    }

    #[test]
    fn test_peek_length_rejects_indefinite_and_oversized() {
        assert!(peek_length(&[0x80]).is_err());
        assert!(peek_length(&[0x85, 0, 0, 0, 0, 1]).is_err());
    }

    #[test]
    fn test_put_length_round_trip() {
        for len in [0usize, 1, 0x7f, 0x80, 0xff, 0x100, 0xffff, 0x1_0000, 0x12_3456] {
            let mut buf = BytesMut::new();
            put_length(&mut buf, len);
            match peek_length(&buf).unwrap() {
                LengthPeek::Definite { value, header_len } => {
                    assert_eq!(value, len);
                    assert_eq!(header_len, buf.len());
                }
                LengthPeek::NeedMore => panic!("encoded length must parse"),
            }
        }
    }

    #[test]
    fn test_integer_round_trip() {
        for value in [0u32, 1, 127, 128, 255, 256, 0x7fff, 0x8000, 0x7fff_ffff, u32::MAX] {
            let mut buf = BytesMut::new();
            put_integer(&mut buf, TAG_INTEGER, value);
            let mut reader = BerReader::new(&buf);
            assert_eq!(reader.read_integer().unwrap(), value, "value {}", value);
            assert!(reader.is_empty());
        }
    }

    #[test]
    fn test_integer_minimal_encoding() {
        let mut buf = BytesMut::new();
        put_integer(&mut buf, TAG_INTEGER, 1);
        assert_eq!(&buf[..], &[0x02, 0x01, 0x01]);

        // 128 needs a zero pad to keep the sign bit clear
        let mut buf = BytesMut::new();
        put_integer(&mut buf, TAG_INTEGER, 128);
        assert_eq!(&buf[..], &[0x02, 0x02, 0x00, 0x80]);
    }

    #[test]
    fn test_boolean_round_trip() {
        for value in [true, false] {
            let mut buf = BytesMut::new();
            put_boolean(&mut buf, value);
            let mut reader = BerReader::new(&buf);
            assert_eq!(reader.read_boolean().unwrap(), value);
        }
    }

    #[test]
    fn test_octet_string_round_trip() {
        let mut buf = BytesMut::new();
        put_octet_string(&mut buf, TAG_OCTET_STRING, b"dc=example,dc=com");
        let mut reader = BerReader::new(&buf);
        assert_eq!(reader.read_string().unwrap(), "dc=example,dc=com");
    }

    #[test]
    fn test_reader_tag_mismatch() {
        let mut buf = BytesMut::new();
        put_octet_string(&mut buf, TAG_OCTET_STRING, b"x");
        let mut reader = BerReader::new(&buf);
        assert!(reader.read_integer().is_err());
    }

    #[test]
    fn test_reader_overrun() {
        // Claims 10 content bytes but only 2 follow
        let data = [0x04, 0x0a, 0x41, 0x42];
        let mut reader = BerReader::new(&data);
        assert!(reader.read_octet_string().is_err());
    }

    #[test]
    fn test_reader_empty() {
        let mut reader = BerReader::new(&[]);
        assert!(reader.is_empty());
        assert!(reader.read_any().is_err());
    }
}
