// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;
use bytes::Bytes;

pub type TransactionId = u16;
pub type UnitId = u8;

/// The MBAP header fields that identify a transaction.
///
/// The protocol id is always `0` and the length field is derived from the
/// PDU, so neither is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    pub transaction_id: TransactionId,
    pub unit_id: UnitId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestAdu<'r> {
    pub hdr: Header,
    pub pdu: RequestPdu<'r>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseAdu<'r> {
    pub hdr: Header,
    pub pdu: ResponsePdu<'r>,
}

/// A complete application data unit as cut out of a byte stream.
///
/// The PDU is kept undecoded; it starts with the function code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Adu {
    pub hdr: Header,
    pub pdu: Bytes,
}

impl Adu {
    /// The raw function code byte, if the PDU is not empty.
    #[must_use]
    pub fn function_code(&self) -> Option<u8> {
        self.pdu.first().copied()
    }
}
