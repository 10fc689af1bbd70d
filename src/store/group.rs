// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    error::Error,
    frame::{Address, Quantity},
    util::{pack_coils, packed_coils_len, unpack_coils},
};
use byteorder::{BigEndian, ByteOrder};

/// The values of a [`RegisterGroup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Values {
    /// Coils or discrete inputs
    Bits(Vec<bool>),
    /// Holding or input registers
    Registers(Vec<i16>),
}

impl Values {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Bits(bits) => bits.len(),
            Self::Registers(words) => words.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub const fn is_bits(&self) -> bool {
        matches!(self, Self::Bits(_))
    }
}

/// A contiguous range of addresses of one register class.
///
/// The shape (start address and count) is fixed on construction,
/// only the contents can change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterGroup {
    start_address: Address,
    values: Values,
}

impl RegisterGroup {
    #[must_use]
    pub const fn new(start_address: Address, values: Values) -> Self {
        Self {
            start_address,
            values,
        }
    }

    #[must_use]
    pub const fn bits(start_address: Address, bits: Vec<bool>) -> Self {
        Self::new(start_address, Values::Bits(bits))
    }

    #[must_use]
    pub const fn registers(start_address: Address, words: Vec<i16>) -> Self {
        Self::new(start_address, Values::Registers(words))
    }

    #[must_use]
    pub const fn start_address(&self) -> Address {
        self.start_address
    }

    /// Number of items in the group.
    #[must_use]
    pub fn count(&self) -> usize {
        self.values.len()
    }

    /// The item count as written to dumps.
    ///
    /// A [`RegisterStore`](super::RegisterStore) never holds a group whose
    /// count exceeds [`Quantity::MAX`].
    #[must_use]
    pub fn quantity(&self) -> Quantity {
        Quantity::try_from(self.count()).unwrap_or(Quantity::MAX)
    }

    /// One past the last address of the group.
    #[must_use]
    pub fn end(&self) -> u32 {
        u32::from(self.start_address) + self.count() as u32
    }

    #[must_use]
    pub const fn values(&self) -> &Values {
        &self.values
    }

    /// `true` if `[address, address + quantity)` lies completely inside the group.
    #[must_use]
    pub fn contains(&self, address: Address, quantity: Quantity) -> bool {
        quantity > 0
            && address >= self.start_address
            && u32::from(address) + u32::from(quantity) <= self.end()
    }

    /// `true` if the address intervals of both groups intersect.
    #[must_use]
    pub fn overlaps(&self, other: &Self) -> bool {
        u32::from(self.start_address) < other.end() && u32::from(other.start_address) < self.end()
    }

    fn check_range(&self, offset: u16, quantity: Quantity) -> Result<(usize, usize), Error> {
        let start = usize::from(offset);
        let end = start + usize::from(quantity);
        if quantity == 0 || end > self.count() {
            return Err(Error::NoGroup {
                address: self.start_address.wrapping_add(offset),
                quantity,
            });
        }
        Ok((start, end))
    }

    /// Read `quantity` items starting at `offset` in their wire representation.
    ///
    /// Bits are packed least significant bit first, registers are written
    /// as big-endian words.
    pub fn read_range(&self, offset: u16, quantity: Quantity) -> Result<Vec<u8>, Error> {
        let (start, end) = self.check_range(offset, quantity)?;
        match &self.values {
            Values::Bits(bits) => {
                let mut bytes = vec![0; packed_coils_len(end - start)];
                pack_coils(&bits[start..end], &mut bytes)?;
                Ok(bytes)
            }
            Values::Registers(words) => {
                let mut bytes = vec![0; (end - start) * 2];
                for (chunk, word) in bytes.chunks_exact_mut(2).zip(&words[start..end]) {
                    BigEndian::write_i16(chunk, *word);
                }
                Ok(bytes)
            }
        }
    }

    /// Overwrite `quantity` items starting at `offset` from their wire representation.
    pub fn write_range(
        &mut self,
        offset: u16,
        quantity: Quantity,
        wire: &[u8],
    ) -> Result<(), Error> {
        let (start, end) = self.check_range(offset, quantity)?;
        match &mut self.values {
            Values::Bits(bits) => {
                let expected = packed_coils_len(end - start);
                if wire.len() != expected {
                    return Err(Error::LengthMismatch(expected, wire.len()));
                }
                unpack_coils(wire, quantity, &mut bits[start..end])
            }
            Values::Registers(words) => {
                let expected = (end - start) * 2;
                if wire.len() != expected {
                    return Err(Error::LengthMismatch(expected, wire.len()));
                }
                for (word, chunk) in words[start..end].iter_mut().zip(wire.chunks_exact(2)) {
                    *word = BigEndian::read_i16(chunk);
                }
                Ok(())
            }
        }
    }

    /// The bit at `offset`, if the group holds bits.
    #[must_use]
    pub fn bit(&self, offset: u16) -> Option<bool> {
        match &self.values {
            Values::Bits(bits) => bits.get(usize::from(offset)).copied(),
            Values::Registers(_) => None,
        }
    }

    /// The register at `offset`, if the group holds registers.
    #[must_use]
    pub fn register(&self, offset: u16) -> Option<i16> {
        match &self.values {
            Values::Registers(words) => words.get(usize::from(offset)).copied(),
            Values::Bits(_) => None,
        }
    }
}
