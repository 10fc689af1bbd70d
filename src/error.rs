// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::frame::{Exception, FunctionCode};
use thiserror::Error;

/// Protocol error
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Protocol not Modbus
    #[error("Protocol not Modbus(0), received {0} instead")]
    ProtocolNotModbus(u16),
    /// The MBAP length field announces no PDU
    #[error("Invalid length field: {0}")]
    LengthField(u16),
    /// Invalid buffer size
    #[error("Invalid buffer size")]
    BufferSize,
    /// Invalid function code
    #[error("Invalid function code: 0x{0:0>2X}")]
    FnCode(u8),
    /// Invalid coil value
    #[error("Invalid coil value: 0x{0:0>4X}")]
    CoilValue(u16),
    /// Invalid byte count
    #[error("Invalid byte count: {0}")]
    ByteCount(u8),
    /// Length Mismatch
    #[error("Length mismatch: expected {0} byte(s), got {1}")]
    LengthMismatch(usize, usize),
    /// Quantity outside of the bounds of the function code
    #[error("Quantity {1} out of range for function code {0}")]
    Quantity(FunctionCode, u16),
    /// Invalid exception code
    #[error("Invalid exception code: 0x{0:0>2X}")]
    ExceptionCode(u8),
    /// Invalid exception function code
    #[error("Invalid exception function code: 0x{0:0>2X}")]
    ExceptionFnCode(u8),
    /// Target host name of an operator request is not UTF-8
    #[error("Target host name is not valid UTF-8")]
    HostName,
    /// No connection with this id
    #[error("Unknown connection {0}")]
    UnknownConnection(u32),
    /// No slave with this id behind the connection
    #[error("Unknown slave {0}")]
    UnknownSlave(u8),
    /// No single group covers the requested range
    #[error("No register group covers {quantity} item(s) at address {address}")]
    NoGroup { address: u16, quantity: u16 },
    /// A response arrived while nothing was outstanding
    #[error("Unsolicited response with transaction id {0}")]
    Unsolicited(u16),
    /// A response does not belong to the outstanding request
    #[error("Transaction mismatch: expected {expected}, received {actual}")]
    TransactionMismatch { expected: u16, actual: u16 },
}

impl Error {
    /// The exception a slave answers with when a request fails with this error.
    #[must_use]
    pub const fn exception(&self) -> Exception {
        match self {
            Self::FnCode(_) => Exception::IllegalFunction,
            Self::UnknownConnection(_) | Self::UnknownSlave(_) | Self::NoGroup { .. } => {
                Exception::IllegalDataAddress
            }
            _ => Exception::IllegalDataValue,
        }
    }
}

/// Failure to build a consistent register store.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("slave {slave_id}: {class} groups at {first} and {second} overlap")]
    Overlap {
        slave_id: u8,
        class: &'static str,
        first: u16,
        second: u16,
    },
    #[error("{what}: declared {declared}, found {actual}")]
    CountMismatch {
        what: &'static str,
        declared: usize,
        actual: usize,
    },
    #[error("duplicate connection {0}")]
    DuplicateConnection(String),
    #[error("duplicate slave {slave_id} on connection {connection}")]
    DuplicateSlave { connection: u32, slave_id: u8 },
    #[error("slave id {0} outside 1..=247")]
    InvalidSlaveId(u8),
    #[error("group at {start} with {count} item(s) exceeds the address space")]
    AddressSpace { start: u16, count: u32 },
    #[error("slave {slave_id}: {class} group at {start} holds the wrong kind of values")]
    ValueKind {
        slave_id: u8,
        class: &'static str,
        start: u16,
    },
    #[error("slave {slave_id}: empty group at {start}")]
    EmptyGroup { slave_id: u8, start: u16 },
    #[error("value {0} does not fit into a register")]
    RegisterValue(i64),
    #[error("negative {what}: {value}")]
    NegativeCount { what: &'static str, value: i32 },
    #[error("snapshot truncated at offset {0}")]
    Truncated(usize),
    #[error("unsupported address type {0}")]
    AddressType(u8),
    #[error("invalid address {0:?}")]
    InvalidAddress(String),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
