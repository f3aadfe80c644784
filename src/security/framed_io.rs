// Copyright (c) 2026 Amunchain
// Licensed under the Apache License, Version 2.0

//! Small helpers for reading/writing varint length-prefixed frames over
//! a raw connection, shared by multistream-select and the DCUtR stream.

use crate::transport::{RawConn, TransportError};
use crate::varint::{self, VarintError};

/// Maximum frame length this crate will read, guarding against a remote
/// declaring an absurd length and stalling us on a read that never ends.
pub const MAX_FRAME_LEN: usize = 64 * 1024;

/// Read `n` bytes, looping over partial reads.
pub async fn read_exact(conn: &mut dyn RawConn, n: usize) -> Result<Vec<u8>, TransportError> {
    let mut out = vec![0u8; n];
    let mut read = 0;
    while read < n {
        let got = conn.read(&mut out[read..]).await?;
        if got == 0 {
            return Err(TransportError::ConnectionClosed);
        }
        read += got;
    }
    Ok(out)
}

/// Read one byte-at-a-time varint, up to 10 bytes (enough for a u64).
async fn read_varint(conn: &mut dyn RawConn) -> Result<u64, TransportError> {
    let mut buf = Vec::with_capacity(10);
    loop {
        let byte = read_exact(conn, 1).await?;
        buf.push(byte[0]);
        match varint::decode(&buf) {
            Ok((value, consumed)) if consumed == buf.len() => return Ok(value),
            Ok(_) => unreachable!("decode never consumes less than the whole buffer here"),
            Err(VarintError::Truncated) => {
                if buf.len() >= 10 {
                    return Err(TransportError::IoError("varint too long".to_string()));
                }
                continue;
            }
            Err(VarintError::Overflow) => {
                return Err(TransportError::IoError("varint overflow".to_string()))
            }
        }
    }
}

/// Read a varint-length-prefixed frame.
pub async fn read_frame(conn: &mut dyn RawConn) -> Result<Vec<u8>, TransportError> {
    let len = read_varint(conn).await? as usize;
    if len > MAX_FRAME_LEN {
        return Err(TransportError::IoError("frame too large".to_string()));
    }
    read_exact(conn, len).await
}

/// Write a varint-length-prefixed frame.
pub async fn write_frame(conn: &mut dyn RawConn, payload: &[u8]) -> Result<(), TransportError> {
    let mut out = Vec::with_capacity(payload.len() + 2);
    varint::encode_into(payload.len() as u64, &mut out);
    out.extend_from_slice(payload);
    conn.write(&out).await
}
