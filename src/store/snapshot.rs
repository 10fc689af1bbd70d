// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Binary snapshot of a register store
//!
//! All numbers are big-endian. Every group carries its item count twice;
//! both must agree.

use super::{Connection, ConnectionId, RegisterClass, RegisterGroup, RegisterStore, SlaveMapping, Values};
use crate::error::LoadError;
use byteorder::{BigEndian, ByteOrder};
use bytes::{BufMut, BytesMut};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

type Result<T> = core::result::Result<T, LoadError>;

const ADDRESS_TYPE_V4: u8 = 0;
const ADDRESS_TYPE_V6: u8 = 1;

/// Size of the length prefix of a framed snapshot.
const PREFIX_LEN: usize = 4;

/// Encode the whole store.
#[must_use]
pub fn encode_store(store: &RegisterStore) -> Vec<u8> {
    let mut buf = BytesMut::new();
    put_store(store, &mut buf);
    buf.to_vec()
}

/// Encode the whole store behind a `u32` length prefix.
#[must_use]
pub fn encode_store_framed(store: &RegisterStore) -> Vec<u8> {
    let mut body = BytesMut::new();
    put_store(store, &mut body);
    let mut buf = BytesMut::with_capacity(PREFIX_LEN + body.len());
    buf.put_u32(body.len() as u32);
    buf.extend_from_slice(&body);
    buf.to_vec()
}

/// Decode and validate a store.
pub fn decode_store(bytes: &[u8]) -> Result<RegisterStore> {
    let mut reader = Reader { bytes, pos: 0 };
    let store = reader.store()?;
    if reader.pos < bytes.len() {
        warn!(
            "Ignoring {} trailing byte(s) after the register store snapshot",
            bytes.len() - reader.pos
        );
    }
    Ok(store)
}

/// Decode a length prefixed store once it has been received completely.
///
/// Returns the store and the number of consumed bytes, or `None` while
/// the snapshot is still incomplete.
pub fn try_decode_store_framed(buf: &[u8]) -> Result<Option<(RegisterStore, usize)>> {
    if buf.len() < PREFIX_LEN {
        return Ok(None);
    }
    let len = BigEndian::read_u32(&buf[..PREFIX_LEN]) as usize;
    let Some(body) = buf.get(PREFIX_LEN..PREFIX_LEN + len) else {
        return Ok(None);
    };
    let store = decode_store(body)?;
    Ok(Some((store, PREFIX_LEN + len)))
}

fn put_count(buf: &mut BytesMut, count: usize) {
    buf.put_i32(count as i32);
}

fn put_store(store: &RegisterStore, buf: &mut BytesMut) {
    put_count(buf, store.connections().len());
    for conn in store.connections() {
        buf.put_i32(conn.id().0 as i32);
        match conn.remote_address() {
            IpAddr::V4(ip) => {
                buf.put_u8(ADDRESS_TYPE_V4);
                buf.put_slice(&ip.octets());
            }
            IpAddr::V6(ip) => {
                buf.put_u8(ADDRESS_TYPE_V6);
                buf.put_slice(&ip.octets());
            }
        }
        put_count(buf, conn.slaves().len());
        for slave in conn.slaves() {
            put_slave(slave, buf);
        }
    }
}

fn put_slave(slave: &SlaveMapping, buf: &mut BytesMut) {
    buf.put_u8(slave.slave_id());
    for class in RegisterClass::ALL {
        put_count(buf, slave.groups(class).len());
    }
    for class in RegisterClass::ALL {
        for group in slave.groups(class) {
            let count = group.quantity();
            buf.put_u16(group.start_address());
            buf.put_u16(count);
            buf.put_u16(count);
            match group.values() {
                Values::Bits(bits) => bits.iter().for_each(|b| buf.put_u8(u8::from(*b))),
                Values::Registers(words) => words.iter().for_each(|w| buf.put_i16(*w)),
            }
        }
    }
}

struct Reader<'b> {
    bytes: &'b [u8],
    pos: usize,
}

impl<'b> Reader<'b> {
    fn take(&mut self, len: usize) -> Result<&'b [u8]> {
        let slice = self
            .bytes
            .get(self.pos..self.pos + len)
            .ok_or(LoadError::Truncated(self.pos))?;
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        self.take(2).map(BigEndian::read_u16)
    }

    fn i16(&mut self) -> Result<i16> {
        self.take(2).map(BigEndian::read_i16)
    }

    fn count(&mut self, what: &'static str) -> Result<usize> {
        let value = self.take(4).map(BigEndian::read_i32)?;
        usize::try_from(value).map_err(|_| LoadError::NegativeCount { what, value })
    }

    fn address(&mut self) -> Result<IpAddr> {
        let address = match self.u8()? {
            ADDRESS_TYPE_V4 => {
                let mut octets = [0; 4];
                octets.copy_from_slice(self.take(4)?);
                IpAddr::V4(Ipv4Addr::from(octets))
            }
            ADDRESS_TYPE_V6 => {
                let mut octets = [0; 16];
                octets.copy_from_slice(self.take(16)?);
                IpAddr::V6(Ipv6Addr::from(octets))
            }
            other => return Err(LoadError::AddressType(other)),
        };
        Ok(address)
    }

    fn group(&mut self, class: RegisterClass) -> Result<RegisterGroup> {
        let start = self.u16()?;
        let count = self.u16()?;
        let check = self.u16()?;
        if check != count {
            return Err(LoadError::CountMismatch {
                what: "group count",
                declared: count.into(),
                actual: check.into(),
            });
        }
        let values = if class.is_bits() {
            let bits = self.take(count.into())?;
            Values::Bits(bits.iter().map(|b| *b != 0).collect())
        } else {
            let words = (0..count).map(|_| self.i16()).collect::<Result<_>>()?;
            Values::Registers(words)
        };
        Ok(RegisterGroup::new(start, values))
    }

    fn slave(&mut self) -> Result<SlaveMapping> {
        let mut slave = SlaveMapping::new(self.u8()?);
        let mut counts = [0; 4];
        for count in &mut counts {
            *count = self.count("group count")?;
        }
        for (class, count) in RegisterClass::ALL.into_iter().zip(counts) {
            for _ in 0..count {
                slave = slave.with_group(class, self.group(class)?);
            }
        }
        Ok(slave)
    }

    fn connection(&mut self) -> Result<Connection> {
        let id = self.take(4).map(BigEndian::read_u32)?;
        let address = self.address()?;
        let num_slave = self.count("slave count")?;
        let slaves = (0..num_slave)
            .map(|_| self.slave())
            .collect::<Result<Vec<_>>>()?;
        Ok(Connection::new(ConnectionId(id), address, slaves))
    }

    fn store(&mut self) -> Result<RegisterStore> {
        let num_connect = self.count("connection count")?;
        let connections = (0..num_connect)
            .map(|_| self.connection())
            .collect::<Result<Vec<_>>>()?;
        RegisterStore::new(connections)
    }
}
