// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! The yamux-shaped frame header this crate's muxer speaks:
//! `{ stream_id: u32, flags: u16, type: u8, length: u32 }` followed by
//! `length` bytes of payload (for `Data` frames only).

use thiserror::Error;

/// Frame header errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("truncated frame header")]
    TruncatedHeader,
    #[error("unknown frame type {0}")]
    UnknownType(u8),
}

pub const HEADER_LEN: usize = 11;

pub const FLAG_SYN: u16 = 0x1;
pub const FLAG_ACK: u16 = 0x2;
pub const FLAG_FIN: u16 = 0x4;
pub const FLAG_RST: u16 = 0x8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameType {
    Data,
    WindowUpdate,
}

impl FrameType {
    fn to_u8(self) -> u8 {
        match self {
            FrameType::Data => 0,
            FrameType::WindowUpdate => 1,
        }
    }

    fn from_u8(b: u8) -> Result<Self, FrameError> {
        match b {
            0 => Ok(FrameType::Data),
            1 => Ok(FrameType::WindowUpdate),
            other => Err(FrameError::UnknownType(other)),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    pub stream_id: u32,
    pub flags: u16,
    pub frame_type: FrameType,
    /// For `Data`, the payload bytes. For `WindowUpdate`, the window
    /// increment, still carried in `length` (no payload bytes follow).
    pub length: u32,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn data(stream_id: u32, flags: u16, payload: Vec<u8>) -> Self {
        Self { stream_id, flags, frame_type: FrameType::Data, length: payload.len() as u32, payload }
    }

    pub fn window_update(stream_id: u32, flags: u16, increment: u32) -> Self {
        Self { stream_id, flags, frame_type: FrameType::WindowUpdate, length: increment, payload: Vec::new() }
    }

    pub fn has_flag(&self, flag: u16) -> bool {
        self.flags & flag != 0
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.stream_id.to_be_bytes());
        out.extend_from_slice(&self.flags.to_be_bytes());
        out.push(self.frame_type.to_u8());
        out.extend_from_slice(&self.length.to_be_bytes());
        if self.frame_type == FrameType::Data {
            out.extend_from_slice(&self.payload);
        }
        out
    }

    pub fn decode_header(bytes: &[u8]) -> Result<(u32, u16, FrameType, u32), FrameError> {
        if bytes.len() < HEADER_LEN {
            return Err(FrameError::TruncatedHeader);
        }
        let stream_id = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let flags = u16::from_be_bytes([bytes[4], bytes[5]]);
        let frame_type = FrameType::from_u8(bytes[6])?;
        let length = u32::from_be_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]);
        Ok((stream_id, flags, frame_type, length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_frame_round_trips() {
        let frame = Frame::data(3, FLAG_SYN, b"hello".to_vec());
        let bytes = frame.encode();
        let (id, flags, ty, len) = Frame::decode_header(&bytes).unwrap();
        assert_eq!(id, 3);
        assert_eq!(flags, FLAG_SYN);
        assert_eq!(ty, FrameType::Data);
        assert_eq!(len, 5);
        assert_eq!(&bytes[HEADER_LEN..], b"hello");
    }

    #[test]
    fn window_update_frame_has_no_trailing_payload() {
        let frame = Frame::window_update(7, 0, 4096);
        let bytes = frame.encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        let (id, _flags, ty, len) = Frame::decode_header(&bytes).unwrap();
        assert_eq!(id, 7);
        assert_eq!(ty, FrameType::WindowUpdate);
        assert_eq!(len, 4096);
    }

    #[test]
    fn truncated_header_rejected() {
        assert_eq!(Frame::decode_header(&[0u8; HEADER_LEN - 1]), Err(FrameError::TruncatedHeader));
    }

    #[test]
    fn unknown_type_rejected() {
        let mut bytes = vec![0u8; HEADER_LEN];
        bytes[6] = 99;
        assert_eq!(Frame::decode_header(&bytes), Err(FrameError::UnknownType(99)));
    }
}
