// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Requests of an external operator station
//!
//! An operator request names its target by host name instead of by
//! connection. Layout (big-endian):
//!
//! ```text
//! hostLen:u16 host:[u8; hostLen]
//! transactionId:u16 protocolId:u16 length:u16 slaveId:u8
//! functionCode:u8 startAddress:u16 quantity:u16
//! payload
//! ```
//!
//! The payload depends on the function code: one byte per coil for
//! `0x05`/`0x0F`, one word per register for `0x06`/`0x10` and
//! `writeStart:u16 writeQty:u16 byteCount:u8 values` for `0x17`.
//! Reads carry no payload. The `length` field is not used for framing.

use crate::{
    error::Error,
    frame::{Address, FunctionCode, Quantity, Request},
    tcp::{TransactionId, UnitId},
    util::{bool_to_u16_coil, pack_coils, packed_coils_len},
};
use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};

type Result<T> = core::result::Result<T, Error>;

/// Fields following the host name up to the payload.
const FIELDS_LEN: usize = 12;

/// Fixed part of the `0x17` payload.
const READ_WRITE_PREFIX_LEN: usize = 5;

/// Function specific write data of an [`OperatorRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Payload {
    #[default]
    None,
    Coils(Vec<bool>),
    Registers(Vec<u16>),
    ReadWrite {
        write_address: Address,
        write_quantity: Quantity,
        /// Big-endian register values.
        values: Vec<u8>,
    },
}

impl Payload {
    fn encoded_len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Coils(coils) => coils.len(),
            Self::Registers(words) => words.len() * 2,
            Self::ReadWrite { values, .. } => READ_WRITE_PREFIX_LEN + values.len(),
        }
    }
}

/// A request addressed to a slave behind some host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorRequest {
    pub target_host: String,
    pub transaction_id: TransactionId,
    pub protocol_id: u16,
    pub slave_id: UnitId,
    pub function: FunctionCode,
    pub start_address: Address,
    pub quantity: Quantity,
    pub payload: Payload,
}

impl OperatorRequest {
    /// A read request without payload.
    #[must_use]
    pub fn read(
        target_host: impl Into<String>,
        transaction_id: TransactionId,
        slave_id: UnitId,
        function: FunctionCode,
        start_address: Address,
        quantity: Quantity,
    ) -> Self {
        Self {
            target_host: target_host.into(),
            transaction_id,
            protocol_id: 0,
            slave_id,
            function,
            start_address,
            quantity,
            payload: Payload::None,
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let host = self.target_host.as_bytes();
        let host_len = u16::try_from(host.len()).map_err(|_| Error::BufferSize)?;
        let payload_len = self.payload.encoded_len();
        let length = u16::try_from(6 + payload_len).map_err(|_| Error::BufferSize)?;

        let mut buf = BytesMut::with_capacity(2 + host.len() + FIELDS_LEN + payload_len);
        buf.put_u16(host_len);
        buf.put_slice(host);
        buf.put_u16(self.transaction_id);
        buf.put_u16(self.protocol_id);
        buf.put_u16(length);
        buf.put_u8(self.slave_id);
        buf.put_u8(self.function.value());
        buf.put_u16(self.start_address);
        buf.put_u16(self.quantity);
        match &self.payload {
            Payload::None => {}
            Payload::Coils(coils) => coils.iter().for_each(|c| buf.put_u8(u8::from(*c))),
            Payload::Registers(words) => words.iter().for_each(|w| buf.put_u16(*w)),
            Payload::ReadWrite {
                write_address,
                write_quantity,
                values,
            } => {
                let byte_count = u8::try_from(values.len()).map_err(|_| Error::BufferSize)?;
                buf.put_u16(*write_address);
                buf.put_u16(*write_quantity);
                buf.put_u8(byte_count);
                buf.put_slice(values);
            }
        }
        Ok(buf.to_vec())
    }

    /// Build and validate the Modbus request PDU.
    pub fn to_request_pdu(&self) -> Result<Vec<u8>> {
        use FunctionCode as f;

        let function = self.function;
        if !function.is_supported() {
            return Err(Error::FnCode(function.value()));
        }
        let quantity = self.quantity;
        let mut pdu = BytesMut::new();
        pdu.put_u8(function.value());
        pdu.put_u16(self.start_address);

        match (function, &self.payload) {
            (
                f::ReadCoils | f::ReadDiscreteInputs | f::ReadHoldingRegisters | f::ReadInputRegisters,
                Payload::None,
            ) => pdu.put_u16(quantity),
            (f::WriteSingleCoil, Payload::Coils(coils)) => {
                let [state] = single(coils, quantity)?;
                pdu.put_u16(bool_to_u16_coil(state));
            }
            (f::WriteSingleRegister, Payload::Registers(words)) => {
                let [word] = single(words, quantity)?;
                pdu.put_u16(word);
            }
            (f::WriteMultipleCoils, Payload::Coils(coils)) => {
                expect_items(coils.len(), quantity)?;
                let mut packed = vec![0; packed_coils_len(coils.len())];
                pack_coils(coils, &mut packed)?;
                let byte_count =
                    u8::try_from(packed.len()).map_err(|_| Error::Quantity(function, quantity))?;
                pdu.put_u16(quantity);
                pdu.put_u8(byte_count);
                pdu.put_slice(&packed);
            }
            (f::WriteMultipleRegisters, Payload::Registers(words)) => {
                expect_items(words.len(), quantity)?;
                let byte_count = u8::try_from(words.len() * 2)
                    .map_err(|_| Error::Quantity(function, quantity))?;
                pdu.put_u16(quantity);
                pdu.put_u8(byte_count);
                words.iter().for_each(|w| pdu.put_u16(*w));
            }
            (
                f::ReadWriteMultipleRegisters,
                Payload::ReadWrite {
                    write_address,
                    write_quantity,
                    values,
                },
            ) => {
                let byte_count = u8::try_from(values.len()).map_err(|_| Error::BufferSize)?;
                pdu.put_u16(quantity);
                pdu.put_u16(*write_address);
                pdu.put_u16(*write_quantity);
                pdu.put_u8(byte_count);
                pdu.put_slice(values);
            }
            _ => return Err(Error::BufferSize),
        }
        let pdu = pdu.to_vec();
        Request::try_from(pdu.as_slice())?;
        Ok(pdu)
    }
}

fn expect_items(actual: usize, quantity: Quantity) -> Result<()> {
    if actual != usize::from(quantity) {
        return Err(Error::LengthMismatch(quantity.into(), actual));
    }
    Ok(())
}

fn single<T: Copy>(items: &[T], quantity: Quantity) -> Result<[T; 1]> {
    expect_items(items.len(), quantity)?;
    match items {
        [item] => Ok([*item]),
        _ => Err(Error::LengthMismatch(1, items.len())),
    }
}

/// Number of bytes of the request at the start of `buf`, once known.
fn request_len(buf: &[u8]) -> Option<usize> {
    let host_len = usize::from(BigEndian::read_u16(buf.get(..2)?));
    let fields_start = 2 + host_len;
    let fields = buf.get(fields_start..fields_start + FIELDS_LEN)?;
    let function = FunctionCode::new(fields[7]);
    let quantity = usize::from(BigEndian::read_u16(&fields[10..12]));
    let payload_start = fields_start + FIELDS_LEN;
    let payload_len = match function {
        FunctionCode::WriteSingleCoil | FunctionCode::WriteMultipleCoils => quantity,
        FunctionCode::WriteSingleRegister | FunctionCode::WriteMultipleRegisters => quantity * 2,
        FunctionCode::ReadWriteMultipleRegisters => {
            let prefix = buf.get(payload_start..payload_start + READ_WRITE_PREFIX_LEN)?;
            READ_WRITE_PREFIX_LEN + usize::from(prefix[4])
        }
        _ => 0,
    };
    Some(payload_start + payload_len)
}

impl TryFrom<&[u8]> for OperatorRequest {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        let len = request_len(bytes).ok_or(Error::BufferSize)?;
        if len != bytes.len() {
            return Err(Error::LengthMismatch(len, bytes.len()));
        }
        let host_len = usize::from(BigEndian::read_u16(&bytes[..2]));
        let target_host = std::str::from_utf8(&bytes[2..2 + host_len])
            .map_err(|_| Error::HostName)?
            .to_owned();
        let fields = &bytes[2 + host_len..2 + host_len + FIELDS_LEN];
        let function = FunctionCode::new(fields[7]);
        let payload = &bytes[2 + host_len + FIELDS_LEN..];
        let payload = match function {
            FunctionCode::WriteSingleCoil | FunctionCode::WriteMultipleCoils => {
                Payload::Coils(payload.iter().map(|b| *b != 0).collect())
            }
            FunctionCode::WriteSingleRegister | FunctionCode::WriteMultipleRegisters => {
                Payload::Registers(payload.chunks_exact(2).map(BigEndian::read_u16).collect())
            }
            FunctionCode::ReadWriteMultipleRegisters => Payload::ReadWrite {
                write_address: BigEndian::read_u16(&payload[..2]),
                write_quantity: BigEndian::read_u16(&payload[2..4]),
                values: payload[READ_WRITE_PREFIX_LEN..].to_vec(),
            },
            _ => Payload::None,
        };
        Ok(Self {
            target_host,
            transaction_id: BigEndian::read_u16(&fields[..2]),
            protocol_id: BigEndian::read_u16(&fields[2..4]),
            slave_id: fields[6],
            function,
            start_address: BigEndian::read_u16(&fields[8..10]),
            quantity: BigEndian::read_u16(&fields[10..12]),
            payload,
        })
    }
}

/// Reassembles operator requests from a byte stream.
#[derive(Debug, Default)]
pub struct OperatorDecoder {
    buf: BytesMut,
}

impl OperatorDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and take the next complete request.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Option<OperatorRequest>> {
        self.buf.extend_from_slice(bytes);
        self.next_request()
    }

    /// Take the next complete request out of the buffer.
    ///
    /// A malformed request is removed from the buffer before its error is
    /// returned, so decoding can go on with the following one.
    pub fn next_request(&mut self) -> Result<Option<OperatorRequest>> {
        let Some(len) = request_len(&self.buf) else {
            return Ok(None);
        };
        if self.buf.len() < len {
            return Ok(None);
        }
        let bytes = self.buf.split_to(len);
        OperatorRequest::try_from(&bytes[..]).map(Some)
    }

    #[must_use]
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}
