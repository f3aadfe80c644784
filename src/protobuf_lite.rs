// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! A minimal protobuf codec that understands only wire type 2
//! (length-delimited). This is all the Noise/plaintext handshake payloads
//! and the DCUtR messages need; anything else is rejected rather than
//! silently misparsed.

use crate::varint::{self, ByteReader, VarintError};
use thiserror::Error;

/// Default cap on a single field's length, matching the libp2p convention.
pub const DEFAULT_MAX_FIELD_SIZE: usize = 1024 * 1024;

/// Protobuf-lite errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtobufLiteError {
    /// A tag declared a wire type other than 2 (length-delimited).
    #[error("unexpected wire type {0}")]
    UnexpectedWireType(u8),
    /// Fewer bytes were present than a field's declared length.
    #[error("truncated field")]
    TruncatedField,
    /// A field's declared length exceeded the configured maximum.
    #[error("field too large")]
    FieldTooLarge,
}

impl From<VarintError> for ProtobufLiteError {
    fn from(_: VarintError) -> Self {
        ProtobufLiteError::TruncatedField
    }
}

/// A single decoded field: its number and a zero-copy view of its bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field<'a> {
    /// The protobuf field number (`tag >> 3`).
    pub number: u64,
    /// The length-delimited payload, borrowed from the input buffer.
    pub bytes: &'a [u8],
}

/// Decode every wire-type-2 field in `input`, in order.
///
/// Unknown field numbers are preserved in the output (the caller decides
/// what to do with them); any field tagged with a wire type other than 2
/// is rejected.
pub fn decode_fields(
    input: &[u8],
    max_field_size: usize,
) -> Result<Vec<Field<'_>>, ProtobufLiteError> {
    let mut r = ByteReader::new(input);
    let mut fields = Vec::new();
    while !r.is_empty() {
        let tag = r.read_varint()?;
        let wire_type = (tag & 0x7) as u8;
        let number = tag >> 3;
        if wire_type != 2 {
            return Err(ProtobufLiteError::UnexpectedWireType(wire_type));
        }
        let len = r.read_varint()?;
        if len as usize > max_field_size {
            return Err(ProtobufLiteError::FieldTooLarge);
        }
        let bytes = r
            .read_exact(len as usize)
            .map_err(|_| ProtobufLiteError::TruncatedField)?;
        fields.push(Field { number, bytes });
    }
    Ok(fields)
}

/// Decode wire-type-2 fields with the default field size cap.
pub fn decode(input: &[u8]) -> Result<Vec<Field<'_>>, ProtobufLiteError> {
    decode_fields(input, DEFAULT_MAX_FIELD_SIZE)
}

/// Look up the first field with the given number.
pub fn field<'a>(fields: &[Field<'a>], number: u64) -> Option<&'a [u8]> {
    fields.iter().find(|f| f.number == number).map(|f| f.bytes)
}

/// Collect every field with the given number, in encounter order.
pub fn repeated_field<'a>(fields: &[Field<'a>], number: u64) -> Vec<&'a [u8]> {
    fields
        .iter()
        .filter(|f| f.number == number)
        .map(|f| f.bytes)
        .collect()
}

/// A tiny builder that emits `tag || varint(len) || bytes` for each
/// appended field, matching [`decode_fields`]'s expectations.
#[derive(Default)]
pub struct Encoder {
    buf: Vec<u8>,
}

impl Encoder {
    /// Start a fresh encoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a length-delimited field.
    pub fn field(&mut self, number: u64, bytes: &[u8]) -> &mut Self {
        let tag = (number << 3) | 2;
        varint::encode_into(tag, &mut self.buf);
        varint::encode_into(bytes.len() as u64, &mut self.buf);
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Consume the encoder, returning the assembled bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_single_field() {
        let bytes = Encoder::new().field(1, b"hello").into_bytes();
        let fields = decode(&bytes).unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].number, 1);
        assert_eq!(fields[0].bytes, b"hello");
    }

    #[test]
    fn unknown_fields_preserved() {
        let bytes = Encoder::new()
            .field(1, b"a")
            .field(99, b"b")
            .field(2, b"c")
            .into_bytes();
        let fields = decode(&bytes).unwrap();
        assert_eq!(fields.len(), 3);
        assert_eq!(field(&fields, 99), Some(b"b".as_slice()));
    }

    #[test]
    fn rejects_non_wire_type_2() {
        // tag with field number 1, wire type 0 (varint)
        let mut buf = Vec::new();
        varint::encode_into((1 << 3) | 0, &mut buf);
        buf.push(5);
        assert_eq!(
            decode(&buf),
            Err(ProtobufLiteError::UnexpectedWireType(0))
        );
    }

    #[test]
    fn field_exactly_at_cap_parses() {
        let payload = vec![9u8; 16];
        let bytes = Encoder::new().field(1, &payload).into_bytes();
        assert!(decode_fields(&bytes, 16).is_ok());
    }

    #[test]
    fn field_over_cap_rejected() {
        let payload = vec![9u8; 17];
        let bytes = Encoder::new().field(1, &payload).into_bytes();
        assert_eq!(
            decode_fields(&bytes, 16),
            Err(ProtobufLiteError::FieldTooLarge)
        );
    }

    #[test]
    fn repeated_fields_collected_in_order() {
        let bytes = Encoder::new()
            .field(5, b"x")
            .field(5, b"y")
            .field(5, b"z")
            .into_bytes();
        let fields = decode(&bytes).unwrap();
        assert_eq!(repeated_field(&fields, 5), vec![b"x".as_slice(), b"y", b"z"]);
    }
}
