// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP slave (server)
//!
//! Requests are served against a [`RegisterStore`]; no state is kept
//! between two requests apart from the store itself.

use crate::{
    codec::tcp::{Adu, FrameReassembler, Header, encode_adu},
    error::Error,
    frame::{
        Coils, Data, Exception, ExceptionResponse, FunctionCode, Request, Response, ResponsePdu,
    },
    store::{RegisterClass, RegisterGroup, RegisterStore, SlaveMapping},
};
use std::collections::HashMap;

type Result<T> = core::result::Result<T, Error>;

/// Serve one request PDU and return the response PDU.
///
/// Failures are answered with an exception response echoing the
/// function code of the request.
pub fn handle(store: &mut RegisterStore, hdr: Header, pdu: &[u8]) -> Vec<u8> {
    match serve(store, hdr.unit_id, pdu) {
        Ok(rsp) => rsp,
        Err(err) => {
            let function = FunctionCode::new(pdu.first().copied().unwrap_or_default());
            let exception = err.exception();
            warn!(
                "Request {} to slave {} failed: {err}",
                hdr.transaction_id, hdr.unit_id
            );
            exception_pdu(function, exception)
        }
    }
}

/// Serve a reassembled request unit and return the encoded response unit.
pub fn handle_adu(store: &mut RegisterStore, adu: &Adu) -> Result<Vec<u8>> {
    let rsp = handle(store, adu.hdr, &adu.pdu);
    encode_adu(adu.hdr, &rsp)
}

fn exception_pdu(function: FunctionCode, exception: Exception) -> Vec<u8> {
    let bytes: [u8; 2] = ExceptionResponse {
        function,
        exception,
    }
    .into();
    bytes.to_vec()
}

fn find_group(
    slave: &SlaveMapping,
    class: RegisterClass,
    address: u16,
    quantity: u16,
) -> Result<&RegisterGroup> {
    slave
        .find_group(class, address, quantity)
        .ok_or(Error::NoGroup { address, quantity })
}

fn find_group_mut(
    slave: &mut SlaveMapping,
    class: RegisterClass,
    address: u16,
    quantity: u16,
) -> Result<&mut RegisterGroup> {
    slave
        .find_group_mut(class, address, quantity)
        .ok_or(Error::NoGroup { address, quantity })
}

fn read(slave: &SlaveMapping, class: RegisterClass, address: u16, quantity: u16) -> Result<Vec<u8>> {
    let group = find_group(slave, class, address, quantity)?;
    group.read_range(address - group.start_address(), quantity)
}

fn write(
    slave: &mut SlaveMapping,
    class: RegisterClass,
    address: u16,
    quantity: u16,
    wire: &[u8],
) -> Result<()> {
    let group = find_group_mut(slave, class, address, quantity)?;
    let offset = address - group.start_address();
    group.write_range(offset, quantity, wire)
}

fn serve(store: &mut RegisterStore, unit_id: u8, pdu: &[u8]) -> Result<Vec<u8>> {
    let req = Request::try_from(pdu)?;
    let slave = store
        .find_slave_mut(unit_id)
        .ok_or(Error::UnknownSlave(unit_id))?;
    let function = FunctionCode::from(req);
    let class = RegisterClass::of_function(function).ok_or(Error::FnCode(function.value()))?;
    debug!("Slave {unit_id} serves {req:?}");

    let rsp = match req {
        Request::ReadCoils(address, quantity) | Request::ReadDiscreteInputs(address, quantity) => {
            let bytes = read(slave, class, address, quantity)?;
            let coils = Coils::from_packed(&bytes, quantity.into())?;
            let rsp = if class == RegisterClass::Coils {
                Response::ReadCoils(coils)
            } else {
                Response::ReadDiscreteInputs(coils)
            };
            ResponsePdu(Ok(rsp)).to_vec()?
        }
        Request::ReadHoldingRegisters(address, quantity)
        | Request::ReadInputRegisters(address, quantity) => {
            let bytes = read(slave, class, address, quantity)?;
            let words = Data::from_be_bytes(&bytes, quantity.into())?;
            let rsp = if class == RegisterClass::HoldingRegisters {
                Response::ReadHoldingRegisters(words)
            } else {
                Response::ReadInputRegisters(words)
            };
            ResponsePdu(Ok(rsp)).to_vec()?
        }
        Request::WriteSingleCoil(address, state) => {
            write(slave, class, address, 1, &[u8::from(state)])?;
            pdu.to_vec()
        }
        Request::WriteSingleRegister(address, word) => {
            write(slave, class, address, 1, &word.to_be_bytes())?;
            pdu.to_vec()
        }
        Request::WriteMultipleCoils(address, coils) => {
            let quantity = coils.len() as u16;
            write(slave, class, address, quantity, coils.payload())?;
            ResponsePdu(Ok(Response::WriteMultipleCoils(address, quantity))).to_vec()?
        }
        Request::WriteMultipleRegisters(address, words) => {
            let quantity = words.len() as u16;
            write(slave, class, address, quantity, words.payload())?;
            ResponsePdu(Ok(Response::WriteMultipleRegisters(address, quantity))).to_vec()?
        }
        Request::ReadWriteMultipleRegisters(read_address, read_quantity, write_address, words) => {
            let write_quantity = words.len() as u16;
            // Both ranges are resolved before anything is written.
            find_group(slave, class, read_address, read_quantity)?;
            find_group(slave, class, write_address, write_quantity)?;
            write(slave, class, write_address, write_quantity, words.payload())?;
            let bytes = read(slave, class, read_address, read_quantity)?;
            let words = Data::from_be_bytes(&bytes, read_quantity.into())?;
            ResponsePdu(Ok(Response::ReadWriteMultipleRegisters(words))).to_vec()?
        }
    };
    Ok(rsp)
}

/// Identifies a peer (master) connected to a [`SlaveStation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(pub u32);

/// A slave node: the local register store and one byte stream per peer.
#[derive(Debug)]
pub struct SlaveStation {
    store: RegisterStore,
    peers: HashMap<PeerId, FrameReassembler>,
}

impl SlaveStation {
    #[must_use]
    pub fn new(store: RegisterStore) -> Self {
        Self {
            store,
            peers: HashMap::new(),
        }
    }

    /// Bytes received from `peer`; returns the response units to send back.
    pub fn on_bytes(&mut self, peer: PeerId, bytes: &[u8]) -> Vec<Vec<u8>> {
        let Self { store, peers } = self;
        let reassembler = peers.entry(peer).or_insert_with(|| {
            info!("Peer {} connected", peer.0);
            FrameReassembler::new()
        });
        reassembler
            .feed(bytes)
            .filter_map(|adu| {
                handle_adu(store, &adu)
                    .inspect_err(|err| error!("Failed to encode response to peer {}: {err}", peer.0))
                    .ok()
            })
            .collect()
    }

    /// Forget everything buffered for `peer`.
    pub fn peer_closed(&mut self, peer: PeerId) {
        if self.peers.remove(&peer).is_some() {
            info!("Peer {} disconnected", peer.0);
        }
    }

    #[must_use]
    pub const fn store(&self) -> &RegisterStore {
        &self.store
    }

    /// Stop serving and hand the store back.
    #[must_use]
    pub fn finish(self) -> RegisterStore {
        self.store
    }
}
