//! AWS event-stream codec — the binary framing `InvokeAgent` streams back.
//!
//! DESIGN
//! ======
//! Each message is self-delimiting:
//!
//! ```text
//! total_len:u32 | headers_len:u32 | prelude_crc:u32 | headers | payload | message_crc:u32
//! ```
//!
//! All integers are big-endian and both checksums are CRC-32 (IEEE). The
//! decoder is incremental: callers `push` whatever bytes the transport
//! delivered and pull complete messages with `next_message`. A message split
//! across transport chunks simply stays buffered until the rest arrives.

use bytes::{Buf, BufMut, Bytes, BytesMut};

const PRELUDE_LEN: usize = 12;
const CRC_LEN: usize = 4;
const MIN_MESSAGE_LEN: usize = PRELUDE_LEN + CRC_LEN;
const MAX_PAYLOAD_LEN: usize = 16 * 1024 * 1024;
const MAX_HEADERS_LEN: usize = 128 * 1024;
const MAX_MESSAGE_LEN: usize = MIN_MESSAGE_LEN + MAX_HEADERS_LEN + MAX_PAYLOAD_LEN;

// =============================================================================
// ERROR
// =============================================================================

/// Framing errors. Any of these poisons the stream; there is no resync.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventStreamError {
    /// The prelude announced a length outside the allowed range.
    #[error("message length {0} out of range")]
    InvalidLength(u32),

    /// The prelude checksum did not match.
    #[error("prelude checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    PreludeChecksum { expected: u32, actual: u32 },

    /// The trailing message checksum did not match.
    #[error("message checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    MessageChecksum { expected: u32, actual: u32 },

    /// The header block could not be parsed or encoded.
    #[error("malformed header block: {0}")]
    InvalidHeader(String),

    /// The transport ended in the middle of a message.
    #[error("stream ended with {0} undecoded bytes")]
    Truncated(usize),
}

// =============================================================================
// MESSAGE TYPES
// =============================================================================

/// Typed header value. Wire type tags are 0 through 9.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderValue {
    Bool(bool),
    Byte(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    Bytes(Bytes),
    String(String),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
    Uuid([u8; 16]),
}

impl HeaderValue {
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub value: HeaderValue,
}

impl Header {
    #[must_use]
    pub fn string(name: &str, value: &str) -> Self {
        Self { name: name.to_string(), value: HeaderValue::String(value.to_string()) }
    }
}

/// One decoded event-stream message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventMessage {
    pub headers: Vec<Header>,
    pub payload: Bytes,
}

impl EventMessage {
    /// First header with the given name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&HeaderValue> {
        self.headers
            .iter()
            .find(|h| h.name == name)
            .map(|h| &h.value)
    }

    /// String value of a header, if present and string-typed.
    #[must_use]
    pub fn header_str(&self, name: &str) -> Option<&str> {
        self.header(name).and_then(HeaderValue::as_str)
    }
}

// =============================================================================
// DECODER
// =============================================================================

/// Incremental decoder over an arbitrary split of the byte stream.
#[derive(Debug, Default)]
pub struct EventStreamDecoder {
    buf: BytesMut,
}

impl EventStreamDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append transport bytes to the internal buffer.
    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Number of buffered bytes not yet consumed by a complete message.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    /// Pop the next complete message, or `None` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns an [`EventStreamError`] on length, checksum, or header
    /// violations.
    pub fn next_message(&mut self) -> Result<Option<EventMessage>, EventStreamError> {
        if self.buf.len() < PRELUDE_LEN {
            return Ok(None);
        }

        let mut prelude = &self.buf[..PRELUDE_LEN];
        let total_len = prelude.get_u32();
        let headers_len = prelude.get_u32() as usize;
        let prelude_crc = prelude.get_u32();

        let total = total_len as usize;
        if !(MIN_MESSAGE_LEN..=MAX_MESSAGE_LEN).contains(&total) {
            return Err(EventStreamError::InvalidLength(total_len));
        }

        let actual = crc32(&self.buf[..8]);
        if actual != prelude_crc {
            return Err(EventStreamError::PreludeChecksum { expected: prelude_crc, actual });
        }

        if headers_len > total - MIN_MESSAGE_LEN {
            return Err(EventStreamError::InvalidHeader(format!(
                "header block of {headers_len} bytes exceeds message of {total} bytes"
            )));
        }

        if self.buf.len() < total {
            return Ok(None);
        }

        let frame = self.buf.split_to(total).freeze();
        let body_end = total - CRC_LEN;
        let message_crc = (&frame[body_end..]).get_u32();
        let actual = crc32(&frame[..body_end]);
        if actual != message_crc {
            return Err(EventStreamError::MessageChecksum { expected: message_crc, actual });
        }

        let headers_end = PRELUDE_LEN + headers_len;
        let headers = parse_headers(&frame[PRELUDE_LEN..headers_end])?;
        let payload = frame.slice(headers_end..body_end);

        Ok(Some(EventMessage { headers, payload }))
    }
}

fn need(data: &[u8], n: usize, what: &str) -> Result<(), EventStreamError> {
    if data.len() < n {
        return Err(EventStreamError::InvalidHeader(format!("truncated {what}")));
    }
    Ok(())
}

fn parse_headers(mut data: &[u8]) -> Result<Vec<Header>, EventStreamError> {
    let mut headers = Vec::new();

    while data.has_remaining() {
        let name_len = data.get_u8() as usize;
        need(data, name_len, "header name")?;
        let name = std::str::from_utf8(&data[..name_len])
            .map_err(|e| EventStreamError::InvalidHeader(format!("header name: {e}")))?
            .to_string();
        data.advance(name_len);

        need(data, 1, "header type")?;
        let value = match data.get_u8() {
            0 => HeaderValue::Bool(true),
            1 => HeaderValue::Bool(false),
            2 => {
                need(data, 1, "byte value")?;
                HeaderValue::Byte(data.get_i8())
            }
            3 => {
                need(data, 2, "int16 value")?;
                HeaderValue::Int16(data.get_i16())
            }
            4 => {
                need(data, 4, "int32 value")?;
                HeaderValue::Int32(data.get_i32())
            }
            5 => {
                need(data, 8, "int64 value")?;
                HeaderValue::Int64(data.get_i64())
            }
            tag @ (6 | 7) => {
                need(data, 2, "value length")?;
                let len = data.get_u16() as usize;
                need(data, len, "value")?;
                let raw = &data[..len];
                let value = if tag == 6 {
                    HeaderValue::Bytes(Bytes::copy_from_slice(raw))
                } else {
                    let s = std::str::from_utf8(raw)
                        .map_err(|e| EventStreamError::InvalidHeader(format!("header {name}: {e}")))?;
                    HeaderValue::String(s.to_string())
                };
                data.advance(len);
                value
            }
            8 => {
                need(data, 8, "timestamp value")?;
                HeaderValue::Timestamp(data.get_i64())
            }
            9 => {
                need(data, 16, "uuid value")?;
                let mut uuid = [0u8; 16];
                data.copy_to_slice(&mut uuid);
                HeaderValue::Uuid(uuid)
            }
            other => {
                return Err(EventStreamError::InvalidHeader(format!("unknown header type {other} for {name}")));
            }
        };

        headers.push(Header { name, value });
    }

    Ok(headers)
}

// =============================================================================
// ENCODER
// =============================================================================

/// Encode one message. Mirrors the decoder; used to build fixtures and by
/// anything that needs to replay a captured stream.
///
/// # Errors
///
/// Returns [`EventStreamError::InvalidHeader`] when a header name exceeds 255
/// bytes or a string/bytes value exceeds 65535 bytes, and
/// [`EventStreamError::InvalidLength`] when the message exceeds the maximum.
pub fn encode_message(headers: &[Header], payload: &[u8]) -> Result<Vec<u8>, EventStreamError> {
    let mut block = BytesMut::new();
    for header in headers {
        let name_len = u8::try_from(header.name.len())
            .map_err(|_| EventStreamError::InvalidHeader(format!("header name too long: {}", header.name)))?;
        block.put_u8(name_len);
        block.put_slice(header.name.as_bytes());

        match &header.value {
            HeaderValue::Bool(true) => block.put_u8(0),
            HeaderValue::Bool(false) => block.put_u8(1),
            HeaderValue::Byte(v) => {
                block.put_u8(2);
                block.put_i8(*v);
            }
            HeaderValue::Int16(v) => {
                block.put_u8(3);
                block.put_i16(*v);
            }
            HeaderValue::Int32(v) => {
                block.put_u8(4);
                block.put_i32(*v);
            }
            HeaderValue::Int64(v) => {
                block.put_u8(5);
                block.put_i64(*v);
            }
            HeaderValue::Bytes(v) => put_sized(&mut block, 6, &header.name, v)?,
            HeaderValue::String(v) => put_sized(&mut block, 7, &header.name, v.as_bytes())?,
            HeaderValue::Timestamp(v) => {
                block.put_u8(8);
                block.put_i64(*v);
            }
            HeaderValue::Uuid(v) => {
                block.put_u8(9);
                block.put_slice(v);
            }
        }
    }

    let total = PRELUDE_LEN + block.len() + payload.len() + CRC_LEN;
    if total > MAX_MESSAGE_LEN {
        return Err(EventStreamError::InvalidLength(u32::try_from(total).unwrap_or(u32::MAX)));
    }
    let total_len = u32::try_from(total).map_err(|_| EventStreamError::InvalidLength(u32::MAX))?;
    let headers_len = u32::try_from(block.len()).map_err(|_| EventStreamError::InvalidLength(total_len))?;

    let mut out = BytesMut::with_capacity(total);
    out.put_u32(total_len);
    out.put_u32(headers_len);
    let prelude_crc = crc32(&out[..8]);
    out.put_u32(prelude_crc);
    out.put_slice(&block);
    out.put_slice(payload);
    let message_crc = crc32(&out);
    out.put_u32(message_crc);

    Ok(out.to_vec())
}

fn put_sized(block: &mut BytesMut, tag: u8, name: &str, value: &[u8]) -> Result<(), EventStreamError> {
    let len = u16::try_from(value.len())
        .map_err(|_| EventStreamError::InvalidHeader(format!("header {name} value too long")))?;
    block.put_u8(tag);
    block.put_u16(len);
    block.put_slice(value);
    Ok(())
}

// =============================================================================
// CHECKSUM
// =============================================================================

/// CRC-32 (IEEE 802.3, reflected polynomial `0xEDB88320`).
fn crc32(data: &[u8]) -> u32 {
    let mut crc = 0xFFFF_FFFF_u32;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            let mask = (crc & 1).wrapping_neg();
            crc = (crc >> 1) ^ (0xEDB8_8320 & mask);
        }
    }
    !crc
}

#[cfg(test)]
#[path = "eventstream_test.rs"]
mod tests;
