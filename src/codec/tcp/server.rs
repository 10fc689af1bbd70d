// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP server (slave) specific functions.
use super::*;

/// Encode an TCP response.
pub fn encode_response(adu: ResponseAdu, buf: &mut [u8]) -> Result<usize> {
    let ResponseAdu { hdr, pdu } = adu;
    if buf.len() < HEADER_LEN {
        return Err(Error::BufferSize);
    }
    let len = pdu.encode(&mut buf[HEADER_LEN..])?;
    write_header(hdr, len, buf)?;
    Ok(len + HEADER_LEN)
}

/// Encode an TCP response into a freshly allocated buffer.
pub fn response_to_vec(adu: ResponseAdu) -> Result<Vec<u8>> {
    let pdu_len = match adu.pdu.0 {
        Ok(rsp) => rsp.pdu_len(),
        Err(_) => 2,
    };
    let mut buf = vec![0; HEADER_LEN + pdu_len];
    let len = encode_response(adu, &mut buf)?;
    buf.truncate(len);
    Ok(buf)
}

/// Encode an exception response to the request identified by `hdr`.
pub fn exception_to_vec(hdr: Header, function: FunctionCode, exception: Exception) -> Result<Vec<u8>> {
    response_to_vec(ResponseAdu {
        hdr,
        pdu: ResponsePdu(Err(ExceptionResponse {
            function,
            exception,
        })),
    })
}
