//! Utility service wire format.
//!
//! All multi-byte integers are little-endian.
//! Request:  job:u8 | format:u8 | type:u8 | reserved:u8 (0) | trailing:u32*
//! Response: job_high:4 sub_id:4 | payload (at most 19 bytes)

use crate::error::{JobError, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Request header length, reserved byte included
pub const REQUEST_HEADER_LEN: usize = 4;

/// Highest valid response sub-id
pub const SUB_ID_MAX: u8 = 0x0E;

/// Sub-id the device uses to signal a failed job; payload is an i32 error code
pub const SUB_ID_ERROR: u8 = 0x0F;

// =============================================================================
// Request Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RequestType {
    /// Reply: 4 bytes total log length
    LogLength = 0x01,
    /// Reply: one or more packets of log data
    LogRead = 0x02,
}

impl RequestType {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x01 => Some(Self::LogLength),
            0x02 => Some(Self::LogRead),
            _ => None,
        }
    }
}

// =============================================================================
// Output Formats
// =============================================================================

/// Output encoding the device is asked to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Format {
    HeaderedHtml = 0x00,
    PlainHtml = 0x01,
    Csv = 0x02,
}

impl Format {
    pub fn from_u8(b: u8) -> Option<Self> {
        match b {
            0x00 => Some(Self::HeaderedHtml),
            0x01 => Some(Self::PlainHtml),
            0x02 => Some(Self::Csv),
            _ => None,
        }
    }

    pub fn as_set(self) -> FormatSet {
        match self {
            Format::HeaderedHtml => FormatSet::HEADERED_HTML,
            Format::PlainHtml => FormatSet::PLAIN_HTML,
            Format::Csv => FormatSet::CSV,
        }
    }
}

bitflags::bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FormatSet: u8 {
        const HEADERED_HTML = 1 << 0;
        const PLAIN_HTML = 1 << 1;
        const CSV = 1 << 2;
    }
}

impl FormatSet {
    pub fn allows(&self, format: Format) -> bool {
        self.contains(format.as_set())
    }
}

// =============================================================================
// Requests
// =============================================================================

/// Build a request packet: four header bytes followed by each trailing value.
pub fn encode_request(job_id: u8, format: u8, request_type: u8, trailing: &[u32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(REQUEST_HEADER_LEN + 4 * trailing.len());
    buf.put_u8(job_id);
    buf.put_u8(format);
    buf.put_u8(request_type);
    buf.put_u8(0);
    for value in trailing {
        buf.put_u32_le(*value);
    }
    buf.freeze()
}

/// Requests understood by the log service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRequest {
    Length,
    Read { offset: u32, window: u32, total: u32 },
}

impl LogRequest {
    pub fn request_type(&self) -> RequestType {
        match self {
            LogRequest::Length => RequestType::LogLength,
            LogRequest::Read { .. } => RequestType::LogRead,
        }
    }

    pub fn encode(&self, job_id: u8, format: Format) -> Bytes {
        let kind = self.request_type() as u8;
        match *self {
            LogRequest::Length => encode_request(job_id, format as u8, kind, &[]),
            LogRequest::Read {
                offset,
                window,
                total,
            } => encode_request(job_id, format as u8, kind, &[offset, window, total]),
        }
    }
}

/// A request as seen by the device side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedRequest {
    pub job_id: u8,
    pub format: Format,
    pub request: LogRequest,
}

pub fn decode_request(mut packet: &[u8]) -> Result<DecodedRequest> {
    if packet.remaining() < REQUEST_HEADER_LEN {
        return Err(JobError::Malformed("request header truncated"));
    }
    let job_id = packet.get_u8();
    let format = Format::from_u8(packet.get_u8()).ok_or(JobError::Malformed("unknown format"))?;
    let kind = RequestType::from_u8(packet.get_u8())
        .ok_or(JobError::Malformed("unknown request type"))?;
    if packet.get_u8() != 0 {
        return Err(JobError::Malformed("reserved byte not zero"));
    }

    let request = match kind {
        RequestType::LogLength => LogRequest::Length,
        RequestType::LogRead => {
            if packet.remaining() < 12 {
                return Err(JobError::Malformed("log read parameters truncated"));
            }
            LogRequest::Read {
                offset: packet.get_u32_le(),
                window: packet.get_u32_le(),
                total: packet.get_u32_le(),
            }
        }
    };

    Ok(DecodedRequest {
        job_id,
        format,
        request,
    })
}

// =============================================================================
// Responses
// =============================================================================

/// Response packet split into header nibbles and payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response<'a> {
    /// High nibble of byte 0, echoing the job
    pub job: u8,
    /// Low nibble of byte 0
    pub sub_id: u8,
    /// Bytes after the header byte
    pub payload: &'a [u8],
}

impl<'a> Response<'a> {
    pub fn decode(packet: &'a [u8]) -> Result<Self> {
        let (&header, payload) = packet
            .split_first()
            .ok_or(JobError::Malformed("empty response"))?;
        Ok(Self {
            job: header & 0xF0,
            sub_id: header & 0x0F,
            payload,
        })
    }

    pub fn is_device_error(&self) -> bool {
        self.sub_id == SUB_ID_ERROR
    }

    /// Error code carried by a device error response, if present.
    pub fn error_code(&self) -> Option<i32> {
        let mut payload = self.payload;
        if payload.remaining() < 4 {
            return None;
        }
        Some(payload.get_i32_le())
    }
}

pub fn encode_response(job: u8, sub_id: u8, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(1 + payload.len());
    buf.put_u8((job & 0xF0) | (sub_id & 0x0F));
    buf.put_slice(payload);
    buf.freeze()
}

/// Total log length from a Length reply payload: up to four LE bytes, zero-padded.
pub fn decode_length(payload: &[u8]) -> u32 {
    let mut raw = [0u8; 4];
    let n = payload.len().min(4);
    raw[..n].copy_from_slice(&payload[..n]);
    u32::from_le_bytes(raw)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_length_request() {
        let packet = LogRequest::Length.encode(0x10, Format::Csv);
        assert_eq!(packet.as_ref(), &[0x10, 0x02, 0x01, 0x00]);
    }

    #[test]
    fn test_encode_read_request() {
        let packet = LogRequest::Read {
            offset: 76,
            window: 24,
            total: 100,
        }
        .encode(0x20, Format::PlainHtml);
        assert_eq!(
            packet.as_ref(),
            &[0x20, 0x01, 0x02, 0x00, 76, 0, 0, 0, 24, 0, 0, 0, 100, 0, 0, 0]
        );
    }

    #[test]
    fn test_decode_request() {
        let packet = LogRequest::Read {
            offset: 0x0102_0304,
            window: 76,
            total: 0x0001_0000,
        }
        .encode(0x30, Format::HeaderedHtml);
        let decoded = decode_request(&packet).unwrap();
        assert_eq!(decoded.job_id, 0x30);
        assert_eq!(decoded.format, Format::HeaderedHtml);
        assert_eq!(
            decoded.request,
            LogRequest::Read {
                offset: 0x0102_0304,
                window: 76,
                total: 0x0001_0000,
            }
        );
    }

    #[test]
    fn test_decode_request_truncated() {
        assert!(decode_request(&[0x10, 0x00]).is_err());
        assert!(decode_request(&[0x10, 0x00, 0x02, 0x00, 1, 2, 3]).is_err());
        assert!(decode_request(&[0x10, 0x07, 0x01, 0x00]).is_err());
    }

    #[test]
    fn test_response_decode() {
        let packet = [0x3A, 1, 2, 3];
        let response = Response::decode(&packet).unwrap();
        assert_eq!(response.job, 0x30);
        assert_eq!(response.sub_id, 0x0A);
        assert_eq!(response.payload, &[1, 2, 3]);
        assert!(!response.is_device_error());

        assert!(Response::decode(&[]).is_err());
    }

    #[test]
    fn test_response_error_code() {
        let packet = encode_response(0x10, SUB_ID_ERROR, &(-5i32).to_le_bytes());
        let response = Response::decode(&packet).unwrap();
        assert!(response.is_device_error());
        assert_eq!(response.error_code(), Some(-5));

        let response = Response::decode(&[0x1F]).unwrap();
        assert_eq!(response.error_code(), None);
    }

    #[test]
    fn test_decode_length_padding() {
        assert_eq!(decode_length(&[100, 0, 0, 0]), 100);
        assert_eq!(decode_length(&[0x34, 0x12, 0x01]), 0x0001_1234);
        assert_eq!(decode_length(&[1, 0, 0, 0, 0xFF]), 1);
    }

    #[test]
    fn test_format_set() {
        let all = FormatSet::all();
        assert!(all.allows(Format::Csv));
        assert!(!FormatSet::CSV.allows(Format::PlainHtml));
        assert_eq!(Format::from_u8(0x01), Some(Format::PlainHtml));
        assert_eq!(Format::from_u8(0x03), None);
    }

    proptest! {
        #[test]
        fn prop_request_layout(
            job_id: u8,
            format: u8,
            request_type: u8,
            trailing in proptest::collection::vec(any::<u32>(), 0..6),
        ) {
            let packet = encode_request(job_id, format, request_type, &trailing);
            prop_assert_eq!(packet.len(), REQUEST_HEADER_LEN + 4 * trailing.len());
            prop_assert_eq!(&packet[..4], &[job_id, format, request_type, 0][..]);
            for (i, value) in trailing.iter().enumerate() {
                let start = REQUEST_HEADER_LEN + 4 * i;
                prop_assert_eq!(&packet[start..start + 4], &value.to_le_bytes()[..]);
            }
        }
    }
}
