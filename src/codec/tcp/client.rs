// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP client (master) specific functions.
use super::*;

/// Encode an TCP request.
pub fn encode_request(adu: RequestAdu, buf: &mut [u8]) -> Result<usize> {
    let RequestAdu { hdr, pdu } = adu;
    if buf.len() < HEADER_LEN {
        return Err(Error::BufferSize);
    }
    let len = pdu.encode(&mut buf[HEADER_LEN..])?;
    write_header(hdr, len, buf)?;
    Ok(len + HEADER_LEN)
}

/// Encode an TCP request into a freshly allocated buffer.
pub fn request_to_vec(adu: RequestAdu) -> Result<Vec<u8>> {
    let mut buf = vec![0; HEADER_LEN + adu.pdu.0.pdu_len()];
    let len = encode_request(adu, &mut buf)?;
    buf.truncate(len);
    Ok(buf)
}

/// Decode the PDU of a reassembled response unit.
pub fn parse_response(adu: &Adu) -> Result<ResponseAdu<'_>> {
    let pdu = ResponsePdu::try_from(&adu.pdu[..])?;
    Ok(ResponseAdu { hdr: adu.hdr, pdu })
}
