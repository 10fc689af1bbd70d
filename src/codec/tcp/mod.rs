// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP

use super::*;
use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BytesMut};

pub mod client;
pub mod server;

pub use crate::frame::tcp::*;

/// Size of the MBAP header.
pub const HEADER_LEN: usize = 7;

/// The largest PDU the MBAP length field can announce.
const MAX_PDU_LEN: usize = u16::MAX as usize - 1;

/// The raw fields of an MBAP header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mbap {
    pub transaction_id: TransactionId,
    pub protocol_id: u16,
    /// Number of bytes following the length field (unit id and PDU).
    pub length: u16,
    pub unit_id: UnitId,
}

impl Mbap {
    /// Read the header at the start of `buf`, if it is complete.
    #[must_use]
    pub fn peek(buf: &[u8]) -> Option<Self> {
        if buf.len() < HEADER_LEN {
            return None;
        }
        Some(Self {
            transaction_id: BigEndian::read_u16(&buf[0..2]),
            protocol_id: BigEndian::read_u16(&buf[2..4]),
            length: BigEndian::read_u16(&buf[4..6]),
            unit_id: buf[6],
        })
    }

    /// Number of bytes of the whole unit this header introduces.
    ///
    /// A unit is never shorter than its header.
    #[must_use]
    pub const fn adu_len(&self) -> usize {
        let len = 6 + self.length as usize;
        if len < HEADER_LEN { HEADER_LEN } else { len }
    }

    /// Check that the header introduces a Modbus unit with a PDU.
    pub const fn validate(&self) -> Result<()> {
        if self.protocol_id != 0 {
            return Err(Error::ProtocolNotModbus(self.protocol_id));
        }
        if self.length < 2 {
            return Err(Error::LengthField(self.length));
        }
        Ok(())
    }

    #[must_use]
    pub const fn header(&self) -> Header {
        Header {
            transaction_id: self.transaction_id,
            unit_id: self.unit_id,
        }
    }
}

/// Write an MBAP header for `pdu_len` bytes of PDU into `buf`.
fn write_header(hdr: Header, pdu_len: usize, buf: &mut [u8]) -> Result<()> {
    if pdu_len == 0 || pdu_len > MAX_PDU_LEN {
        return Err(Error::LengthMismatch(MAX_PDU_LEN, pdu_len));
    }
    if buf.len() < HEADER_LEN {
        return Err(Error::BufferSize);
    }
    BigEndian::write_u16(&mut buf[0..2], hdr.transaction_id);
    BigEndian::write_u16(&mut buf[2..4], 0); //MODBUS Protocol
    BigEndian::write_u16(&mut buf[4..6], (pdu_len + 1) as u16);
    buf[6] = hdr.unit_id;
    Ok(())
}

/// Prepend an MBAP header to an already encoded PDU.
pub fn encode_adu(hdr: Header, pdu: &[u8]) -> Result<Vec<u8>> {
    let mut buf = vec![0; HEADER_LEN + pdu.len()];
    write_header(hdr, pdu.len(), &mut buf)?;
    buf[HEADER_LEN..].copy_from_slice(pdu);
    Ok(buf)
}

/// Turns a byte stream into complete [`Adu`]s.
///
/// Partially received units stay buffered until the rest arrives.
/// Units with a foreign protocol id or without a PDU are dropped,
/// including the part of them that has not been received yet.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buf: BytesMut,
    /// Bytes of a dropped unit that are still to be skipped.
    discard: usize,
}

impl FrameReassembler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` to the stream and iterate over the completed units.
    pub fn feed(&mut self, bytes: &[u8]) -> Frames<'_> {
        self.buf.extend_from_slice(bytes);
        Frames { reassembler: self }
    }

    /// Take the next complete unit out of the buffer.
    pub fn next_frame(&mut self) -> Option<Adu> {
        loop {
            if self.discard > 0 {
                let cnt = self.discard.min(self.buf.len());
                self.buf.advance(cnt);
                self.discard -= cnt;
                if self.discard > 0 {
                    return None;
                }
            }
            let mbap = Mbap::peek(&self.buf)?;
            let size = mbap.adu_len();
            if let Err(err) = mbap.validate() {
                warn!("Dropping {size} byte(s) of an invalid frame: {err}");
                self.discard = size;
                continue;
            }
            if self.buf.len() < size {
                return None;
            }
            let mut adu = self.buf.split_to(size);
            let pdu = adu.split_off(HEADER_LEN).freeze();
            return Some(Adu {
                hdr: mbap.header(),
                pdu,
            });
        }
    }

    /// Number of buffered bytes that do not form a complete unit yet.
    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Forget everything received so far.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.discard = 0;
    }
}

/// Iterator over the units completed by [`FrameReassembler::feed`].
#[derive(Debug)]
pub struct Frames<'a> {
    reassembler: &'a mut FrameReassembler,
}

impl Iterator for Frames<'_> {
    type Item = Adu;

    fn next(&mut self) -> Option<Self::Item> {
        self.reassembler.next_frame()
    }
}
