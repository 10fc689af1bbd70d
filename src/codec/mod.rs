// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{error::*, frame::*, util::*};
use byteorder::{BigEndian, ByteOrder};
use core::convert::TryFrom;

pub mod tcp;

type Result<T> = core::result::Result<T, Error>;

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalDataAddress,
            0x03 => IllegalDataValue,
            0x04 => ServerDeviceFailure,
            0x05 => Acknowledge,
            0x06 => ServerDeviceBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayTargetDevice,
            _ => {
                return Err(Error::ExceptionCode(code));
            }
        };
        Ok(ex)
    }
}

impl From<ExceptionResponse> for [u8; 2] {
    fn from(ex: ExceptionResponse) -> [u8; 2] {
        let fn_code: u8 = ex.function.into();
        [fn_code | 0x80, ex.exception as u8]
    }
}

impl TryFrom<&[u8]> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 2 {
            return Err(Error::LengthMismatch(2, bytes.len()));
        }
        let fn_err_code = bytes[0];
        if fn_err_code < 0x80 {
            return Err(Error::ExceptionFnCode(fn_err_code));
        }
        let function = (fn_err_code - 0x80).into();
        let exception = Exception::try_from(bytes[1])?;
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

/// Reject a quantity outside of the bounds of `function`.
pub(crate) fn check_quantity(function: FunctionCode, quantity: u16) -> Result<()> {
    match function.quantity_bounds() {
        Some((min, max)) if quantity < min || quantity > max => {
            Err(Error::Quantity(function, quantity))
        }
        _ => Ok(()),
    }
}

fn expect_len(bytes: &[u8], len: usize) -> Result<()> {
    if bytes.len() != len {
        return Err(Error::LengthMismatch(len, bytes.len()));
    }
    Ok(())
}

fn item_count(len: usize) -> u16 {
    u16::try_from(len).unwrap_or(u16::MAX)
}

impl<'r> TryFrom<&'r [u8]> for Request<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        let Some(&fn_code) = bytes.first() else {
            return Err(Error::BufferSize);
        };
        let function = FunctionCode::new(fn_code);
        if !function.is_supported() {
            return Err(Error::FnCode(fn_code));
        }
        let min_len = min_request_pdu_len(function);
        if bytes.len() < min_len {
            return Err(Error::LengthMismatch(min_len, bytes.len()));
        }

        use crate::frame::Request::*;
        use FunctionCode as f;

        let addr = BigEndian::read_u16(&bytes[1..3]);
        let value = BigEndian::read_u16(&bytes[3..5]);

        let req = match function {
            f::ReadCoils | f::ReadDiscreteInputs | f::ReadInputRegisters | f::ReadHoldingRegisters => {
                expect_len(bytes, 5)?;
                check_quantity(function, value)?;
                match function {
                    f::ReadCoils => ReadCoils(addr, value),
                    f::ReadDiscreteInputs => ReadDiscreteInputs(addr, value),
                    f::ReadInputRegisters => ReadInputRegisters(addr, value),
                    _ => ReadHoldingRegisters(addr, value),
                }
            }
            f::WriteSingleCoil => {
                expect_len(bytes, 5)?;
                WriteSingleCoil(addr, u16_coil_to_bool(value)?)
            }
            f::WriteSingleRegister => {
                expect_len(bytes, 5)?;
                WriteSingleRegister(addr, value)
            }
            f::WriteMultipleCoils => {
                check_quantity(function, value)?;
                let byte_count = bytes[5];
                if byte_count as usize != packed_coils_len(value.into()) {
                    return Err(Error::ByteCount(byte_count));
                }
                expect_len(bytes, 6 + byte_count as usize)?;
                let coils = Coils {
                    quantity: value.into(),
                    data: &bytes[6..],
                };
                WriteMultipleCoils(addr, coils)
            }
            f::WriteMultipleRegisters => {
                check_quantity(function, value)?;
                let byte_count = bytes[5];
                if byte_count as usize != value as usize * 2 {
                    return Err(Error::ByteCount(byte_count));
                }
                expect_len(bytes, 6 + byte_count as usize)?;
                let data = Data {
                    quantity: value.into(),
                    data: &bytes[6..],
                };
                WriteMultipleRegisters(addr, data)
            }
            f::ReadWriteMultipleRegisters => {
                check_quantity(function, value)?;
                let write_address = BigEndian::read_u16(&bytes[5..7]);
                let write_quantity = BigEndian::read_u16(&bytes[7..9]);
                if check_quantity(f::WriteMultipleRegisters, write_quantity).is_err() {
                    return Err(Error::Quantity(function, write_quantity));
                }
                let write_count = bytes[9];
                if write_count as usize != write_quantity as usize * 2 {
                    return Err(Error::ByteCount(write_count));
                }
                expect_len(bytes, 10 + write_count as usize)?;
                let data = Data {
                    quantity: write_quantity.into(),
                    data: &bytes[10..],
                };
                ReadWriteMultipleRegisters(addr, value, write_address, data)
            }
            f::Custom(_) => return Err(Error::FnCode(fn_code)),
        };
        Ok(req)
    }
}

impl<'r> TryFrom<&'r [u8]> for Response<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        use crate::frame::Response::*;
        use FunctionCode as f;

        let Some(&fn_code) = bytes.first() else {
            return Err(Error::BufferSize);
        };
        let function = FunctionCode::new(fn_code);
        if !function.is_supported() {
            return Err(Error::FnCode(fn_code));
        }
        let min_len = min_response_pdu_len(function);
        if bytes.len() < min_len {
            return Err(Error::LengthMismatch(min_len, bytes.len()));
        }
        let rsp = match function {
            f::ReadCoils | f::ReadDiscreteInputs => {
                let byte_count = bytes[1] as usize;
                expect_len(bytes, 2 + byte_count)?;
                // The exact requested quantity is unknown here,
                // therefore we assume that every bit of the last byte is meant.
                let coils = Coils {
                    quantity: byte_count * 8,
                    data: &bytes[2..],
                };
                if function == f::ReadCoils {
                    ReadCoils(coils)
                } else {
                    ReadDiscreteInputs(coils)
                }
            }
            f::WriteSingleCoil => {
                expect_len(bytes, 5)?;
                WriteSingleCoil(
                    BigEndian::read_u16(&bytes[1..3]),
                    u16_coil_to_bool(BigEndian::read_u16(&bytes[3..5]))?,
                )
            }
            f::WriteMultipleCoils | f::WriteSingleRegister | f::WriteMultipleRegisters => {
                expect_len(bytes, 5)?;
                let addr = BigEndian::read_u16(&bytes[1..3]);
                let payload = BigEndian::read_u16(&bytes[3..5]);
                match function {
                    f::WriteMultipleCoils => WriteMultipleCoils(addr, payload),
                    f::WriteSingleRegister => WriteSingleRegister(addr, payload),
                    _ => WriteMultipleRegisters(addr, payload),
                }
            }
            f::ReadInputRegisters | f::ReadHoldingRegisters | f::ReadWriteMultipleRegisters => {
                let byte_count = bytes[1];
                if byte_count % 2 != 0 {
                    return Err(Error::ByteCount(byte_count));
                }
                expect_len(bytes, 2 + byte_count as usize)?;
                let data = Data {
                    quantity: byte_count as usize / 2,
                    data: &bytes[2..],
                };
                match function {
                    f::ReadInputRegisters => ReadInputRegisters(data),
                    f::ReadHoldingRegisters => ReadHoldingRegisters(data),
                    _ => ReadWriteMultipleRegisters(data),
                }
            }
            f::Custom(_) => return Err(Error::FnCode(fn_code)),
        };
        Ok(rsp)
    }
}

impl<'r> TryFrom<&'r [u8]> for RequestPdu<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        Request::try_from(bytes).map(RequestPdu)
    }
}

impl<'r> TryFrom<&'r [u8]> for ResponsePdu<'r> {
    type Error = Error;

    fn try_from(bytes: &'r [u8]) -> Result<Self> {
        match bytes.first() {
            Some(fn_code) if *fn_code >= 0x80 => {
                ExceptionResponse::try_from(bytes).map(|ex| ResponsePdu(Err(ex)))
            }
            _ => Response::try_from(bytes).map(|rsp| ResponsePdu(Ok(rsp))),
        }
    }
}

impl Request<'_> {
    /// Check the quantities of an outbound request.
    pub fn validate(&self) -> Result<()> {
        use FunctionCode as f;
        let function = FunctionCode::from(*self);
        match *self {
            Self::ReadCoils(_, qty)
            | Self::ReadDiscreteInputs(_, qty)
            | Self::ReadInputRegisters(_, qty)
            | Self::ReadHoldingRegisters(_, qty) => check_quantity(function, qty),
            Self::WriteSingleCoil(_, _) | Self::WriteSingleRegister(_, _) => Ok(()),
            Self::WriteMultipleCoils(_, coils) => check_quantity(function, item_count(coils.len())),
            Self::WriteMultipleRegisters(_, words) => {
                check_quantity(function, item_count(words.len()))
            }
            Self::ReadWriteMultipleRegisters(_, read_qty, _, words) => {
                check_quantity(function, read_qty)?;
                let write_qty = item_count(words.len());
                check_quantity(f::WriteMultipleRegisters, write_qty)
                    .map_err(|_| Error::Quantity(function, write_qty))
            }
        }
    }
}

impl RequestPdu<'_> {
    /// Encode the PDU into `buf`.
    ///
    /// It returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let RequestPdu(req) = *self;
        req.validate()?;
        let len = req.pdu_len();
        if buf.len() < len {
            return Err(Error::BufferSize);
        }
        buf[0] = FunctionCode::from(req).value();
        match req {
            Request::ReadCoils(address, quantity)
            | Request::ReadDiscreteInputs(address, quantity)
            | Request::ReadInputRegisters(address, quantity)
            | Request::ReadHoldingRegisters(address, quantity) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], quantity);
            }
            Request::WriteSingleCoil(address, state) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], bool_to_u16_coil(state));
            }
            Request::WriteSingleRegister(address, word) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], word);
            }
            Request::WriteMultipleCoils(address, coils) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], coils.len() as u16);
                buf[5] = coils.packed_len() as u8;
                coils.copy_to(&mut buf[6..]);
            }
            Request::WriteMultipleRegisters(address, words) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], words.len() as u16);
                buf[5] = (words.len() * 2) as u8;
                words.copy_to(&mut buf[6..]);
            }
            Request::ReadWriteMultipleRegisters(read_address, quantity, write_address, words) => {
                BigEndian::write_u16(&mut buf[1..3], read_address);
                BigEndian::write_u16(&mut buf[3..5], quantity);
                BigEndian::write_u16(&mut buf[5..7], write_address);
                BigEndian::write_u16(&mut buf[7..9], words.len() as u16);
                buf[9] = (words.len() * 2) as u8;
                words.copy_to(&mut buf[10..]);
            }
        }
        Ok(len)
    }

    /// Encode the PDU into a freshly allocated buffer.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0; self.0.pdu_len()];
        let len = self.encode(&mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }
}

impl ResponsePdu<'_> {
    /// Encode the PDU into `buf`.
    ///
    /// It returns the number of bytes written.
    pub fn encode(&self, buf: &mut [u8]) -> Result<usize> {
        let rsp = match self.0 {
            Ok(rsp) => rsp,
            Err(ex) => {
                if buf.len() < 2 {
                    return Err(Error::BufferSize);
                }
                let bytes: [u8; 2] = ex.into();
                buf[..2].copy_from_slice(&bytes);
                return Ok(2);
            }
        };
        let len = rsp.pdu_len();
        if buf.len() < len {
            return Err(Error::BufferSize);
        }
        buf[0] = FunctionCode::from(rsp).value();
        match rsp {
            Response::ReadCoils(coils) | Response::ReadDiscreteInputs(coils) => {
                let byte_count =
                    u8::try_from(coils.packed_len()).map_err(|_| Error::BufferSize)?;
                buf[1] = byte_count;
                coils.copy_to(&mut buf[2..]);
            }
            Response::WriteSingleCoil(address, state) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], bool_to_u16_coil(state));
            }
            Response::WriteMultipleCoils(address, payload)
            | Response::WriteSingleRegister(address, payload)
            | Response::WriteMultipleRegisters(address, payload) => {
                BigEndian::write_u16(&mut buf[1..3], address);
                BigEndian::write_u16(&mut buf[3..5], payload);
            }
            Response::ReadInputRegisters(words)
            | Response::ReadHoldingRegisters(words)
            | Response::ReadWriteMultipleRegisters(words) => {
                let byte_count = u8::try_from(words.len() * 2).map_err(|_| Error::BufferSize)?;
                buf[1] = byte_count;
                words.copy_to(&mut buf[2..]);
            }
        }
        Ok(len)
    }

    /// Encode the PDU into a freshly allocated buffer.
    pub fn to_vec(&self) -> Result<Vec<u8>> {
        let len = match self.0 {
            Ok(rsp) => rsp.pdu_len(),
            Err(_) => 2,
        };
        let mut buf = vec![0; len];
        let len = self.encode(&mut buf)?;
        buf.truncate(len);
        Ok(buf)
    }
}

const fn min_request_pdu_len(fn_code: FunctionCode) -> usize {
    use FunctionCode::*;
    match fn_code {
        ReadCoils | ReadDiscreteInputs | ReadInputRegisters | WriteSingleCoil
        | ReadHoldingRegisters | WriteSingleRegister => 5,
        WriteMultipleCoils | WriteMultipleRegisters => 6,
        ReadWriteMultipleRegisters => 10,
        Custom(_) => 1,
    }
}

const fn min_response_pdu_len(fn_code: FunctionCode) -> usize {
    use FunctionCode::*;
    match fn_code {
        ReadCoils
        | ReadDiscreteInputs
        | ReadInputRegisters
        | ReadHoldingRegisters
        | ReadWriteMultipleRegisters => 2,
        WriteSingleCoil | WriteMultipleCoils | WriteSingleRegister | WriteMultipleRegisters => 5,
        Custom(_) => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exception_response_into_bytes() {
        let bytes: [u8; 2] = ExceptionResponse {
            function: 0x03.into(),
            exception: Exception::IllegalDataAddress,
        }
        .into();
        assert_eq!(bytes[0], 0x83);
        assert_eq!(bytes[1], 0x02);
    }

    #[test]
    fn exception_response_from_bytes() {
        let data: &[u8] = &[0x79, 0x02];
        assert!(ExceptionResponse::try_from(data).is_err());

        let bytes: &[u8] = &[0x83, 0x02];
        let rsp = ExceptionResponse::try_from(bytes).unwrap();
        assert_eq!(
            rsp,
            ExceptionResponse {
                function: 0x03.into(),
                exception: Exception::IllegalDataAddress,
            }
        );

        let bytes: &[u8] = &[0x83];
        assert_eq!(
            ExceptionResponse::try_from(bytes).err().unwrap(),
            Error::LengthMismatch(2, 1)
        );
        let bytes: &[u8] = &[0x83, 0x07];
        assert_eq!(
            ExceptionResponse::try_from(bytes).err().unwrap(),
            Error::ExceptionCode(0x07)
        );
    }

    #[test]
    fn test_min_request_pdu_len() {
        use FunctionCode::*;

        assert_eq!(min_request_pdu_len(ReadCoils), 5);
        assert_eq!(min_request_pdu_len(ReadDiscreteInputs), 5);
        assert_eq!(min_request_pdu_len(ReadInputRegisters), 5);
        assert_eq!(min_request_pdu_len(WriteSingleCoil), 5);
        assert_eq!(min_request_pdu_len(ReadHoldingRegisters), 5);
        assert_eq!(min_request_pdu_len(WriteSingleRegister), 5);
        assert_eq!(min_request_pdu_len(WriteMultipleCoils), 6);
        assert_eq!(min_request_pdu_len(WriteMultipleRegisters), 6);
        assert_eq!(min_request_pdu_len(ReadWriteMultipleRegisters), 10);
    }

    #[test]
    fn test_min_response_pdu_len() {
        use FunctionCode::*;

        assert_eq!(min_response_pdu_len(ReadCoils), 2);
        assert_eq!(min_response_pdu_len(ReadDiscreteInputs), 2);
        assert_eq!(min_response_pdu_len(ReadInputRegisters), 2);
        assert_eq!(min_response_pdu_len(WriteSingleCoil), 5);
        assert_eq!(min_response_pdu_len(ReadHoldingRegisters), 2);
        assert_eq!(min_response_pdu_len(WriteSingleRegister), 5);
        assert_eq!(min_response_pdu_len(WriteMultipleCoils), 5);
        assert_eq!(min_response_pdu_len(WriteMultipleRegisters), 5);
        assert_eq!(min_response_pdu_len(ReadWriteMultipleRegisters), 2);
    }

    mod serialize_requests {
        use super::*;

        fn encode(req: Request) -> Vec<u8> {
            RequestPdu(req).to_vec().unwrap()
        }

        #[test]
        fn read_coils() {
            assert_eq!(
                encode(Request::ReadCoils(0x12, 4)),
                &[0x01, 0x00, 0x12, 0x00, 0x04]
            );
        }

        #[test]
        fn write_single_coil() {
            assert_eq!(
                encode(Request::WriteSingleCoil(0x1234, true)),
                &[0x05, 0x12, 0x34, 0xFF, 0x00]
            );
            assert_eq!(
                encode(Request::WriteSingleCoil(0x1234, false)),
                &[0x05, 0x12, 0x34, 0x00, 0x00]
            );
        }

        #[test]
        fn write_multiple_coils() {
            let buf = &mut [0; 2];
            let coils = Coils::from_bools(&[true, false, true, true], buf).unwrap();
            assert_eq!(
                encode(Request::WriteMultipleCoils(0x3311, coils)),
                &[0x0F, 0x33, 0x11, 0x00, 0x04, 0x01, 0b_0000_1101]
            );
        }

        #[test]
        fn write_multiple_registers() {
            let buf = &mut [0; 4];
            let words = Data::from_words(&[0xABCD, 0xEF12], buf).unwrap();
            assert_eq!(
                encode(Request::WriteMultipleRegisters(0x06, words)),
                &[0x10, 0x00, 0x06, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12]
            );
        }

        #[test]
        fn read_write_multiple_registers() {
            let buf = &mut [0; 4];
            let words = Data::from_words(&[0xABCD, 0xEF12], buf).unwrap();
            assert_eq!(
                encode(Request::ReadWriteMultipleRegisters(0x05, 51, 0x03, words)),
                &[
                    0x17, 0x00, 0x05, 0x00, 0x33, 0x00, 0x03, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF,
                    0x12
                ]
            );
        }

        #[test]
        fn reject_quantity_out_of_range() {
            assert_eq!(
                RequestPdu(Request::ReadCoils(0, 2001)).to_vec().err().unwrap(),
                Error::Quantity(FunctionCode::ReadCoils, 2001)
            );
            assert_eq!(
                RequestPdu(Request::ReadHoldingRegisters(0, 0))
                    .to_vec()
                    .err()
                    .unwrap(),
                Error::Quantity(FunctionCode::ReadHoldingRegisters, 0)
            );
            let words = [0_u16; 124];
            let buf = &mut [0; 248];
            let data = Data::from_words(&words, buf).unwrap();
            assert_eq!(
                RequestPdu(Request::ReadWriteMultipleRegisters(0, 1, 0, data))
                    .to_vec()
                    .err()
                    .unwrap(),
                Error::Quantity(FunctionCode::ReadWriteMultipleRegisters, 124)
            );
        }

        #[test]
        fn buffer_too_small() {
            let buf = &mut [0; 4];
            assert_eq!(
                RequestPdu(Request::ReadCoils(0, 1)).encode(buf).err().unwrap(),
                Error::BufferSize
            );
        }

        #[test]
        fn round_trip() {
            let coil_buf = &mut [0; 3];
            let coils = Coils::from_bools(&[true, false, false, true, true, false, true, true, false, true], coil_buf).unwrap();
            let word_buf = &mut [0; 6];
            let words = Data::from_words(&[1, 0x8000, 0xFFFF], word_buf).unwrap();
            let requests = [
                Request::ReadCoils(1, 2000),
                Request::ReadDiscreteInputs(2, 1),
                Request::ReadHoldingRegisters(3, 125),
                Request::ReadInputRegisters(4, 7),
                Request::WriteSingleCoil(5, true),
                Request::WriteSingleRegister(6, 0xBEEF),
                Request::WriteMultipleCoils(7, coils),
                Request::WriteMultipleRegisters(8, words),
                Request::ReadWriteMultipleRegisters(9, 10, 11, words),
            ];
            for req in requests {
                let bytes = encode(req);
                assert_eq!(Request::try_from(&bytes[..]).unwrap(), req);
            }
        }
    }

    mod deserialize_requests {
        use super::*;

        #[test]
        fn empty_request() {
            let data: &[u8] = &[];
            assert!(Request::try_from(data).is_err());
        }

        #[test]
        fn read_coils() {
            let data: &[u8] = &[0x01];
            assert!(Request::try_from(data).is_err());
            let data: &[u8] = &[0x01, 0x0, 0x0, 0x22];
            assert!(Request::try_from(data).is_err());

            let data: &[u8] = &[0x01, 0x00, 0x12, 0x0, 0x4];
            let req = Request::try_from(data).unwrap();
            assert_eq!(req, Request::ReadCoils(0x12, 4));
        }

        #[test]
        fn read_coils_with_trailing_bytes() {
            let data: &[u8] = &[0x01, 0x00, 0x12, 0x0, 0x4, 0x00];
            assert_eq!(
                Request::try_from(data).err().unwrap(),
                Error::LengthMismatch(5, 6)
            );
        }

        #[test]
        fn read_coils_quantity_bounds() {
            let data: &[u8] = &[0x01, 0x00, 0x00, 0x07, 0xD0];
            assert_eq!(Request::try_from(data).unwrap(), Request::ReadCoils(0, 2000));
            let data: &[u8] = &[0x01, 0x00, 0x00, 0x07, 0xD1];
            assert_eq!(
                Request::try_from(data).err().unwrap(),
                Error::Quantity(FunctionCode::ReadCoils, 2001)
            );
            let data: &[u8] = &[0x01, 0x00, 0x00, 0x00, 0x00];
            assert_eq!(
                Request::try_from(data).err().unwrap(),
                Error::Quantity(FunctionCode::ReadCoils, 0)
            );
        }

        #[test]
        fn read_discrete_inputs() {
            let data: &[u8] = &[2, 0x00, 0x03, 0x00, 19];
            let req = Request::try_from(data).unwrap();
            assert_eq!(req, Request::ReadDiscreteInputs(0x03, 19));
        }

        #[test]
        fn write_single_coil() {
            let bytes: &[u8] = &[5, 0x12, 0x34, 0xFF, 0x00];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::WriteSingleCoil(0x1234, true));

            let bytes: &[u8] = &[5, 0x12, 0x34, 0x00, 0xFF];
            assert_eq!(
                Request::try_from(bytes).err().unwrap(),
                Error::CoilValue(0x00FF)
            );
        }

        #[test]
        fn write_multiple_coils() {
            let data: &[u8] = &[0x0F, 0x33, 0x11, 0x00, 0x04, 0x02, 0b_0000_1101];
            assert_eq!(Request::try_from(data).err().unwrap(), Error::ByteCount(2));

            let data: &[u8] = &[
                0x0F, 0x33, 0x11, 0x00, 0x04, 0x00, // byte count == 0
            ];
            assert!(Request::try_from(data).is_err());

            let data: &[u8] = &[0x0F, 0x33, 0x11, 0x00, 0x04, 0x01];
            assert_eq!(
                Request::try_from(data).err().unwrap(),
                Error::LengthMismatch(7, 6)
            );

            let bytes: &[u8] = &[0x0F, 0x33, 0x11, 0x00, 0x04, 0x01, 0b_0000_1101];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(
                req,
                Request::WriteMultipleCoils(
                    0x3311,
                    Coils {
                        quantity: 4,
                        data: &[0b1101]
                    }
                )
            );
        }

        #[test]
        fn read_input_registers() {
            let bytes: &[u8] = &[4, 0x00, 0x09, 0x00, 0x4D];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::ReadInputRegisters(0x09, 77));
        }

        #[test]
        fn read_holding_registers() {
            let bytes: &[u8] = &[3, 0x00, 0x09, 0x00, 0x4D];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::ReadHoldingRegisters(0x09, 77));

            let bytes: &[u8] = &[3, 0x00, 0x09, 0x00, 0x7E];
            assert_eq!(
                Request::try_from(bytes).err().unwrap(),
                Error::Quantity(FunctionCode::ReadHoldingRegisters, 126)
            );
        }

        #[test]
        fn write_single_register() {
            let bytes: &[u8] = &[6, 0x00, 0x07, 0xAB, 0xCD];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(req, Request::WriteSingleRegister(0x07, 0xABCD));
        }

        #[test]
        fn write_multiple_registers() {
            let data: &[u8] = &[0x10, 0x00, 0x06, 0x00, 0x02, 0x05, 0xAB, 0xCD, 0xEF, 0x12];
            assert!(Request::try_from(data).is_err());

            let bytes: &[u8] = &[0x10, 0x00, 0x06, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12];
            let req = Request::try_from(bytes).unwrap();
            assert_eq!(
                req,
                Request::WriteMultipleRegisters(
                    0x06,
                    Data {
                        quantity: 2,
                        data: &[0xAB, 0xCD, 0xEF, 0x12]
                    }
                )
            );
            if let Request::WriteMultipleRegisters(_, data) = req {
                assert_eq!(data.get(0), Some(0xABCD));
                assert_eq!(data.get(1), Some(0xEF12));
            } else {
                unreachable!()
            };
        }

        #[test]
        fn read_write_multiple_registers() {
            let data: &[u8] = &[
                0x17, 0x00, 0x05, 0x00, 0x33, 0x00, 0x03, 0x00, 0x02, 0x05, 0xAB, 0xCD, 0xEF, 0x12,
            ];
            assert!(Request::try_from(data).is_err());
            let bytes: &[u8] = &[
                0x17, 0x00, 0x05, 0x00, 0x33, 0x00, 0x03, 0x00, 0x02, 0x04, 0xAB, 0xCD, 0xEF, 0x12,
            ];
            let req = Request::try_from(bytes).unwrap();
            let data = Data {
                quantity: 2,
                data: &[0xAB, 0xCD, 0xEF, 0x12],
            };
            assert_eq!(
                req,
                Request::ReadWriteMultipleRegisters(0x05, 51, 0x03, data)
            );
        }

        #[test]
        fn unsupported_function_code() {
            let bytes: &[u8] = &[0x2B, 0x0E, 0x01, 0x00];
            assert_eq!(Request::try_from(bytes).err().unwrap(), Error::FnCode(0x2B));
            let bytes: &[u8] = &[0x81, 0x00];
            assert_eq!(Request::try_from(bytes).err().unwrap(), Error::FnCode(0x81));
        }
    }

    mod serialize_responses {
        use super::*;

        #[test]
        fn read_holding_registers() {
            let buf = &mut [0; 10];
            let words = Data::from_words(&[0, 100, 200, 300, 400], buf).unwrap();
            let bytes = ResponsePdu(Ok(Response::ReadHoldingRegisters(words)))
                .to_vec()
                .unwrap();
            assert_eq!(
                bytes,
                &[0x03, 0x0A, 0x00, 0x00, 0x00, 0x64, 0x00, 0xC8, 0x01, 0x2C, 0x01, 0x90]
            );
        }

        #[test]
        fn read_coils() {
            let buf = &mut [0; 2];
            let coils = Coils::from_bools(&[true, false, false, true, false, false, false, false, true], buf).unwrap();
            let bytes = ResponsePdu(Ok(Response::ReadCoils(coils))).to_vec().unwrap();
            assert_eq!(bytes, &[0x01, 0x02, 0b_0000_1001, 0b_0000_0001]);
        }

        #[test]
        fn exception() {
            let rsp = ResponsePdu(Err(ExceptionResponse {
                function: FunctionCode::ReadCoils,
                exception: Exception::IllegalDataValue,
            }));
            assert_eq!(rsp.to_vec().unwrap(), &[0x81, 0x03]);
            assert_eq!(rsp.encode(&mut [0; 1]).err().unwrap(), Error::BufferSize);
        }

        #[test]
        fn round_trip() {
            let coil_buf = &mut [0; 2];
            let coils = Coils::from_bools(&[true; 16], coil_buf).unwrap();
            let word_buf = &mut [0; 4];
            let words = Data::from_words(&[0x1234, 0xFFFF], word_buf).unwrap();
            let responses = [
                Response::ReadCoils(coils),
                Response::ReadDiscreteInputs(coils),
                Response::ReadHoldingRegisters(words),
                Response::ReadInputRegisters(words),
                Response::WriteSingleCoil(5, false),
                Response::WriteSingleRegister(6, 0xBEEF),
                Response::WriteMultipleCoils(7, 16),
                Response::WriteMultipleRegisters(8, 2),
                Response::ReadWriteMultipleRegisters(words),
            ];
            for rsp in responses {
                let bytes = ResponsePdu(Ok(rsp)).to_vec().unwrap();
                assert_eq!(Response::try_from(&bytes[..]).unwrap(), rsp);
            }
        }
    }

    mod deserialize_responses {
        use super::*;

        #[test]
        fn read_coils() {
            let bytes: &[u8] = &[1, 1, 0b_0000_1001];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::ReadCoils(Coils {
                    quantity: 8,
                    data: &[0b_0000_1001]
                })
            );
        }

        #[test]
        fn read_no_coils() {
            let bytes: &[u8] = &[1, 0];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::ReadCoils(Coils {
                    quantity: 0,
                    data: &[]
                })
            );
        }

        #[test]
        fn read_coils_with_invalid_byte_count() {
            let bytes: &[u8] = &[1, 2, 0x6];
            assert!(Response::try_from(bytes).is_err());
        }

        #[test]
        fn write_single_coil() {
            let bytes: &[u8] = &[5, 0x00, 0x33, 0xFF, 0x00];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(rsp, Response::WriteSingleCoil(0x33, true));

            let broken_bytes: &[u8] = &[5, 0x00];
            assert!(Response::try_from(broken_bytes).is_err());
        }

        #[test]
        fn write_multiple_coils() {
            let bytes: &[u8] = &[0x0F, 0x33, 0x11, 0x00, 0x05];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(rsp, Response::WriteMultipleCoils(0x3311, 5));
            let broken_bytes: &[u8] = &[0x0F, 0x33, 0x11, 0x00];
            assert!(Response::try_from(broken_bytes).is_err());
        }

        #[test]
        fn read_input_registers() {
            let bytes: &[u8] = &[4, 0x06, 0xAA, 0x00, 0xCC, 0xBB, 0xEE, 0xDD];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::ReadInputRegisters(Data {
                    quantity: 3,
                    data: &[0xAA, 0x00, 0xCC, 0xBB, 0xEE, 0xDD]
                })
            );
        }

        #[test]
        fn read_registers_with_odd_byte_count() {
            let bytes: &[u8] = &[3, 0x03, 0xAA, 0x00, 0x11];
            assert_eq!(Response::try_from(bytes).err().unwrap(), Error::ByteCount(3));
        }

        #[test]
        fn read_write_multiple_registers() {
            let bytes: &[u8] = &[0x17, 0x02, 0x12, 0x34];
            let rsp = Response::try_from(bytes).unwrap();
            assert_eq!(
                rsp,
                Response::ReadWriteMultipleRegisters(Data {
                    quantity: 1,
                    data: &[0x12, 0x34]
                })
            );
            let broken_bytes: &[u8] = &[0x17, 0x02, 0x12];
            assert!(Response::try_from(broken_bytes).is_err());
        }

        #[test]
        fn response_pdu_with_exception() {
            let bytes: &[u8] = &[0x90, 0x02];
            assert_eq!(
                ResponsePdu::try_from(bytes).unwrap(),
                ResponsePdu(Err(ExceptionResponse {
                    function: FunctionCode::WriteMultipleRegisters,
                    exception: Exception::IllegalDataAddress,
                }))
            );
            let bytes: &[u8] = &[0x06, 0x00, 0x07, 0xAB, 0xCD];
            assert_eq!(
                ResponsePdu::try_from(bytes).unwrap(),
                ResponsePdu(Ok(Response::WriteSingleRegister(0x07, 0xABCD)))
            );
        }

        #[test]
        fn unsupported_function_code() {
            let bytes: &[u8] = &[0x55, 0xCC, 0x88, 0xAA, 0xFF];
            assert_eq!(Response::try_from(bytes).err().unwrap(), Error::FnCode(0x55));
        }
    }
}
