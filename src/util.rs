// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common helpers

use crate::{error::Error, frame::Coil};
use byteorder::{BigEndian, ByteOrder};

/// Turn a bool into a u16 coil value
#[must_use]
pub const fn bool_to_u16_coil(state: bool) -> u16 {
    if state { 0xFF00 } else { 0x0000 }
}

/// Turn a u16 coil value into a boolean value.
pub const fn u16_coil_to_bool(coil: u16) -> Result<bool, Error> {
    match coil {
        0xFF00 => Ok(true),
        0x0000 => Ok(false),
        _ => Err(Error::CoilValue(coil)),
    }
}

/// Calculate the number of bytes required for a given number of coils.
#[must_use]
pub const fn packed_coils_len(bitcount: usize) -> usize {
    bitcount.div_ceil(8)
}

/// Pack coils into a byte array, least significant bit first.
///
/// It returns the number of bytes used to pack the coils.
pub fn pack_coils(coils: &[Coil], bytes: &mut [u8]) -> Result<usize, Error> {
    let packed_size = packed_coils_len(coils.len());
    if bytes.len() < packed_size {
        return Err(Error::BufferSize);
    }
    bytes[..packed_size].fill(0);
    coils.iter().enumerate().for_each(|(i, b)| {
        let v = if *b { 0b1 } else { 0b0 };
        bytes[i / 8] |= v << (i % 8);
    });
    Ok(packed_size)
}

/// Unpack coils from a byte array, least significant bit first.
pub fn unpack_coils(bytes: &[u8], count: u16, coils: &mut [Coil]) -> Result<(), Error> {
    if coils.len() < count as usize || bytes.len() < packed_coils_len(count as usize) {
        return Err(Error::BufferSize);
    }
    (0..count as usize).for_each(|i| {
        coils[i] = (bytes[i / 8] >> (i % 8)) & 0b1 > 0;
    });
    Ok(())
}

/// Write words (u16 values) big-endian into a byte array.
///
/// It returns the number of bytes written.
pub fn pack_words(words: &[u16], bytes: &mut [u8]) -> Result<usize, Error> {
    let size = words.len() * 2;
    if bytes.len() < size {
        return Err(Error::BufferSize);
    }
    for (chunk, w) in bytes.chunks_exact_mut(2).zip(words) {
        BigEndian::write_u16(chunk, *w);
    }
    Ok(size)
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn convert_bool_to_coil() {
        assert_eq!(bool_to_u16_coil(true), 0xFF00);
        assert_eq!(bool_to_u16_coil(false), 0x0000);
    }

    #[test]
    fn convert_coil_to_bool() {
        assert!(u16_coil_to_bool(0xFF00).unwrap());
        assert!(!u16_coil_to_bool(0x0000).unwrap());
        assert_eq!(
            u16_coil_to_bool(0x1234).err().unwrap(),
            Error::CoilValue(0x1234)
        );
    }

    #[test]
    fn packed_len() {
        assert_eq!(packed_coils_len(0), 0);
        assert_eq!(packed_coils_len(1), 1);
        assert_eq!(packed_coils_len(8), 1);
        assert_eq!(packed_coils_len(9), 2);
        assert_eq!(packed_coils_len(2000), 250);
    }

    #[test]
    fn pack_coils_into_byte_array() {
        assert_eq!(pack_coils(&[], &mut []).unwrap(), 0);
        assert_eq!(pack_coils(&[], &mut [0, 0]).unwrap(), 0);
        assert_eq!(
            pack_coils(&[true; 2], &mut []).err().unwrap(),
            Error::BufferSize
        );

        let buff = &mut [0];
        assert_eq!(pack_coils(&[true, false], buff).unwrap(), 1);
        assert_eq!(buff, &[0b_01]);

        let buff = &mut [0];
        assert_eq!(pack_coils(&[false, true], buff).unwrap(), 1);
        assert_eq!(buff, &[0b_10]);

        let buff = &mut [0xFF];
        assert_eq!(pack_coils(&[false; 8], buff).unwrap(), 1);
        assert_eq!(buff, &[0]);

        let buff = &mut [0, 0];
        assert_eq!(pack_coils(&[true; 9], buff).unwrap(), 2);
        assert_eq!(buff, &[0xff, 1]);
    }

    // Bit i of the logical sequence lives in bit (i % 8) of byte (i / 8).
    #[test]
    fn coil_bit_order_is_lsb_first() {
        let mut bools = [false; 11];
        bools[0] = true;
        bools[3] = true;
        bools[10] = true;
        let buff = &mut [0; 2];
        pack_coils(&bools, buff).unwrap();
        assert_eq!(buff, &[0b0000_1001, 0b0000_0100]);

        let mut back = [false; 11];
        unpack_coils(buff, 11, &mut back).unwrap();
        assert_eq!(back, bools);
    }

    #[test]
    fn unpack_coils_from_a_byte_array() {
        assert!(unpack_coils(&[], 0, &mut []).is_ok());
        assert!(unpack_coils(&[1, 2, 3], 0, &mut []).is_ok());
        assert_eq!(
            unpack_coils(&[], 1, &mut [false]).err().unwrap(),
            Error::BufferSize
        );
        assert_eq!(
            unpack_coils(&[0xFF], 1, &mut []).err().unwrap(),
            Error::BufferSize
        );

        let buff = &mut [false; 3];
        assert!(unpack_coils(&[0b101], 3, buff).is_ok());
        assert_eq!(&[true, false, true], buff);

        let buff = &mut [false; 10];
        assert!(unpack_coils(&[0xff, 0b11], 10, buff).is_ok());
        assert_eq!(&[true; 10], buff);
    }

    #[test]
    fn pack_words_big_endian() {
        let buff = &mut [0; 4];
        assert_eq!(pack_words(&[0x0102, 0xABCD], buff).unwrap(), 4);
        assert_eq!(buff, &[0x01, 0x02, 0xAB, 0xCD]);
        assert_eq!(
            pack_words(&[1, 2, 3], &mut [0; 5]).err().unwrap(),
            Error::BufferSize
        );
    }
}
