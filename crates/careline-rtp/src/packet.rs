// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed-header real-time transport packet parsing.
//!
//! Only the 12-byte fixed header is interpreted. CSRC lists and header
//! extensions are left in the payload untouched.

use careline_core::types::AudioChunk;
use thiserror::Error;

/// Length of the fixed header in bytes.
pub const HEADER_LEN: usize = 12;

/// The only protocol version accepted.
pub const SUPPORTED_VERSION: u8 = 2;

/// Why a datagram was rejected. Never surfaced past the receive loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MalformedPacket {
    #[error("datagram of {len} bytes is shorter than the {HEADER_LEN}-byte header")]
    TooShort { len: usize },

    #[error("unsupported protocol version {version}")]
    UnsupportedVersion { version: u8 },
}

/// Decoded fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RtpHeader {
    pub version: u8,
    pub padding: bool,
    pub extension: bool,
    pub csrc_count: u8,
    pub marker: bool,
    pub payload_type: u8,
    pub sequence: u16,
    pub timestamp: u32,
    pub ssrc: u32,
}

/// A parsed packet borrowing its payload from the receive buffer.
#[derive(Debug, PartialEq, Eq)]
pub struct RtpPacket<'a> {
    pub header: RtpHeader,
    pub payload: &'a [u8],
}

impl RtpPacket<'_> {
    /// Copy the packet into an owned chunk for cross-task handoff.
    pub fn to_chunk(&self) -> AudioChunk {
        AudioChunk {
            sequence: self.header.sequence,
            timestamp: self.header.timestamp,
            ssrc: self.header.ssrc,
            payload_type: self.header.payload_type,
            payload: self.payload.to_vec(),
        }
    }
}

/// Parse one datagram. All multi-byte fields are big-endian.
pub fn parse(datagram: &[u8]) -> Result<RtpPacket<'_>, MalformedPacket> {
    if datagram.len() < HEADER_LEN {
        return Err(MalformedPacket::TooShort {
            len: datagram.len(),
        });
    }

    let b0 = datagram[0];
    let b1 = datagram[1];
    let version = b0 >> 6;
    if version != SUPPORTED_VERSION {
        return Err(MalformedPacket::UnsupportedVersion { version });
    }

    let header = RtpHeader {
        version,
        padding: b0 & 0x20 != 0,
        extension: b0 & 0x10 != 0,
        csrc_count: b0 & 0x0f,
        marker: b1 & 0x80 != 0,
        payload_type: b1 & 0x7f,
        sequence: u16::from_be_bytes([datagram[2], datagram[3]]),
        timestamp: u32::from_be_bytes([datagram[4], datagram[5], datagram[6], datagram[7]]),
        ssrc: u32::from_be_bytes([datagram[8], datagram[9], datagram[10], datagram[11]]),
    };

    Ok(RtpPacket {
        header,
        payload: &datagram[HEADER_LEN..],
    })
}
