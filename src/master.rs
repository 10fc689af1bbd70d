// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Modbus TCP master (client)
//!
//! The [`MasterSession`] paces the requests of every connection: at most
//! one request per connection is outstanding, the others wait in a FIFO
//! queue. Matched responses are applied to the master's own
//! [`RegisterStore`].
//!
//! There is no request timeout. A slave that never answers stalls the
//! queue of its connection until the connection is closed.

use crate::{
    codec::tcp::{
        Adu, FrameReassembler, Header, RequestAdu, ResponseAdu, TransactionId,
        client::{parse_response, request_to_vec},
    },
    error::Error,
    frame::{Address, ExceptionResponse, FunctionCode, Quantity, Request, RequestPdu, Response},
    store::{ConnectionId, RegisterClass, RegisterStore},
};
use bytes::Bytes;
use std::collections::VecDeque;

type Result<T> = core::result::Result<T, Error>;

/// A request waiting for transmission or for its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequest {
    pub transaction_id: TransactionId,
    pub slave_id: u8,
    pub function: FunctionCode,
    pub start_address: Address,
    pub quantity: Quantity,
    pdu: Vec<u8>,
}

impl PendingRequest {
    /// The encoded request PDU.
    #[must_use]
    pub fn pdu(&self) -> &[u8] {
        &self.pdu
    }

    const fn header(&self) -> Header {
        Header {
            transaction_id: self.transaction_id,
            unit_id: self.slave_id,
        }
    }

    fn to_adu(&self) -> Result<Vec<u8>> {
        let pdu = RequestPdu(Request::try_from(self.pdu())?);
        request_to_vec(RequestAdu {
            hdr: self.header(),
            pdu,
        })
    }
}

/// A response that has been matched to its request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub connection: ConnectionId,
    pub request: PendingRequest,
    /// The raw response PDU.
    pub pdu: Bytes,
}

impl Completion {
    #[must_use]
    pub fn is_exception(&self) -> bool {
        self.pdu.first().is_some_and(|fn_code| fn_code & 0x80 != 0)
    }
}

#[derive(Debug)]
struct Channel {
    id: ConnectionId,
    established: bool,
    next_transaction_id: TransactionId,
    expected_transaction_id: TransactionId,
    queue: VecDeque<PendingRequest>,
    in_flight: Option<PendingRequest>,
    reassembler: FrameReassembler,
}

impl Channel {
    fn new(id: ConnectionId) -> Self {
        Self {
            id,
            established: false,
            next_transaction_id: 1,
            expected_transaction_id: 1,
            queue: VecDeque::new(),
            in_flight: None,
            reassembler: FrameReassembler::new(),
        }
    }

    fn enqueue(&mut self, slave_id: u8, request: Request<'_>) -> Result<TransactionId> {
        let pdu = RequestPdu(request).to_vec()?;
        let (start_address, quantity) = request.range();
        let transaction_id = self.next_transaction_id;
        self.next_transaction_id = transaction_id.wrapping_add(1);
        self.queue.push_back(PendingRequest {
            transaction_id,
            slave_id,
            function: request.into(),
            start_address,
            quantity,
            pdu,
        });
        Ok(transaction_id)
    }

    fn transmit(&mut self) -> Option<Vec<u8>> {
        if !self.established || self.in_flight.is_some() {
            return None;
        }
        let head = self.queue.front()?;
        if head.transaction_id != self.expected_transaction_id {
            debug!(
                "Connection {}: queue head {} is not the expected transaction {}",
                self.id, head.transaction_id, self.expected_transaction_id
            );
            return None;
        }
        let request = self.queue.pop_front()?;
        self.expected_transaction_id = request.transaction_id.wrapping_add(1);
        match request.to_adu() {
            Ok(adu) => {
                self.in_flight = Some(request);
                Some(adu)
            }
            Err(err) => {
                error!(
                    "Connection {}: dropping request {}: {err}",
                    self.id, request.transaction_id
                );
                None
            }
        }
    }

    fn reset(&mut self) -> usize {
        let discarded = self.queue.len() + usize::from(self.in_flight.is_some());
        self.established = false;
        self.queue.clear();
        self.in_flight = None;
        self.reassembler.clear();
        self.expected_transaction_id = self.next_transaction_id;
        discarded
    }

    fn accept(&mut self, hdr: Header) -> Result<PendingRequest> {
        let Some(pending) = &self.in_flight else {
            return Err(Error::Unsolicited(hdr.transaction_id));
        };
        if pending.header() != hdr {
            return Err(Error::TransactionMismatch {
                expected: pending.transaction_id,
                actual: hdr.transaction_id,
            });
        }
        self.in_flight.take().ok_or(Error::Unsolicited(hdr.transaction_id))
    }
}

/// Request pacing of all connections of a master node.
#[derive(Debug, Default)]
pub struct MasterSession {
    channels: Vec<Channel>,
    cursor: usize,
}

impl MasterSession {
    /// Create a session with one (not yet established) channel per
    /// connection of `store`.
    #[must_use]
    pub fn new(store: &RegisterStore) -> Self {
        Self {
            channels: store.connections().iter().map(|c| Channel::new(c.id())).collect(),
            cursor: 0,
        }
    }

    fn channel(&self, connection: ConnectionId) -> Result<&Channel> {
        self.channels
            .iter()
            .find(|c| c.id == connection)
            .ok_or(Error::UnknownConnection(connection.0))
    }

    fn channel_mut(&mut self, connection: ConnectionId) -> Result<&mut Channel> {
        self.channels
            .iter_mut()
            .find(|c| c.id == connection)
            .ok_or(Error::UnknownConnection(connection.0))
    }

    pub fn connection_established(&mut self, connection: ConnectionId) -> Result<()> {
        let channel = self.channel_mut(connection)?;
        channel.established = true;
        info!("Connection {connection} established");
        Ok(())
    }

    /// Tear down a connection and discard its queue and outstanding request.
    ///
    /// Returns the number of discarded requests.
    pub fn close(&mut self, connection: ConnectionId) -> Result<usize> {
        let discarded = self.channel_mut(connection)?.reset();
        if discarded > 0 {
            warn!("Connection {connection} closed, discarding {discarded} request(s)");
        } else {
            info!("Connection {connection} closed");
        }
        Ok(discarded)
    }

    #[must_use]
    pub fn is_established(&self, connection: ConnectionId) -> bool {
        self.channel(connection).is_ok_and(|c| c.established)
    }

    /// The request of `connection` that awaits its response.
    #[must_use]
    pub fn in_flight(&self, connection: ConnectionId) -> Option<&PendingRequest> {
        self.channel(connection).ok()?.in_flight.as_ref()
    }

    /// Number of requests of `connection` waiting for transmission.
    #[must_use]
    pub fn queued(&self, connection: ConnectionId) -> usize {
        self.channel(connection).map_or(0, |c| c.queue.len())
    }

    /// Queue `request` for `slave_id` behind `connection`.
    ///
    /// Returns the transaction id assigned to the request.
    pub fn submit(
        &mut self,
        connection: ConnectionId,
        slave_id: u8,
        request: Request<'_>,
    ) -> Result<TransactionId> {
        let transaction_id = self.channel_mut(connection)?.enqueue(slave_id, request)?;
        debug!("Connection {connection}: queued {request:?} as transaction {transaction_id}");
        Ok(transaction_id)
    }

    /// Queue one read request per configured group of every established
    /// connection.
    ///
    /// Returns the number of queued requests.
    pub fn on_poll_tick(&mut self, store: &RegisterStore) -> Result<usize> {
        let mut queued = 0;
        for conn in store.connections() {
            let channel = self.channel_mut(conn.id())?;
            if !channel.established {
                continue;
            }
            for slave in conn.slaves() {
                for class in RegisterClass::ALL {
                    for group in slave.groups(class) {
                        let address = group.start_address();
                        let Ok(quantity) = Quantity::try_from(group.count()) else {
                            warn!("Group at {address} of slave {} is too large to poll", slave.slave_id());
                            continue;
                        };
                        let request = poll_request(class, address, quantity);
                        match channel.enqueue(slave.slave_id(), request) {
                            Ok(_) => queued += 1,
                            Err(err) => warn!(
                                "Not polling {class} group at {address} of slave {}: {err}",
                                slave.slave_id()
                            ),
                        }
                    }
                }
            }
        }
        debug!("Queued {queued} poll request(s)");
        Ok(queued)
    }

    /// The next request to transmit, visiting the connections round robin.
    pub fn poll_transmit(&mut self) -> Option<(ConnectionId, Vec<u8>)> {
        let count = self.channels.len();
        for step in 0..count {
            let idx = (self.cursor + step) % count;
            let channel = &mut self.channels[idx];
            if let Some(adu) = channel.transmit() {
                self.cursor = (idx + 1) % count;
                return Some((channel.id, adu));
            }
        }
        None
    }

    /// Bytes received on `connection`.
    ///
    /// Responses that do not belong to the outstanding request are
    /// discarded. Matched normal responses are applied to `store`.
    pub fn on_bytes(
        &mut self,
        connection: ConnectionId,
        bytes: &[u8],
        store: &mut RegisterStore,
    ) -> Vec<Completion> {
        let channel = match self.channel_mut(connection) {
            Ok(channel) => channel,
            Err(err) => {
                warn!("Ignoring {} received byte(s): {err}", bytes.len());
                return Vec::new();
            }
        };
        let adus: Vec<Adu> = channel.reassembler.feed(bytes).collect();
        let mut completions = Vec::with_capacity(adus.len());
        for adu in adus {
            let request = match channel.accept(adu.hdr) {
                Ok(request) => request,
                Err(err) => {
                    warn!("Connection {connection}: discarding response: {err}");
                    continue;
                }
            };
            if let Err(err) = apply_response(store, connection, &request, &adu) {
                warn!(
                    "Connection {connection}: response to transaction {} not applied: {err}",
                    request.transaction_id
                );
            }
            completions.push(Completion {
                connection,
                request,
                pdu: adu.pdu,
            });
        }
        completions
    }
}

const fn poll_request(class: RegisterClass, address: Address, quantity: Quantity) -> Request<'static> {
    match class {
        RegisterClass::Coils => Request::ReadCoils(address, quantity),
        RegisterClass::DiscreteInputs => Request::ReadDiscreteInputs(address, quantity),
        RegisterClass::HoldingRegisters => Request::ReadHoldingRegisters(address, quantity),
        RegisterClass::InputRegisters => Request::ReadInputRegisters(address, quantity),
    }
}

fn store_range(
    store: &mut RegisterStore,
    connection: ConnectionId,
    slave_id: u8,
    class: RegisterClass,
    address: Address,
    quantity: Quantity,
    wire: &[u8],
) -> Result<()> {
    let group = store
        .find_group_mut(connection, class, slave_id, address, quantity)
        .ok_or(Error::NoGroup { address, quantity })?;
    let offset = address - group.start_address();
    group.write_range(offset, quantity, wire)
}

fn apply_response(
    store: &mut RegisterStore,
    connection: ConnectionId,
    pending: &PendingRequest,
    adu: &Adu,
) -> Result<()> {
    let ResponseAdu { pdu, .. } = parse_response(adu)?;
    let rsp = match pdu.0 {
        Ok(rsp) => rsp,
        Err(ExceptionResponse { function, exception }) => {
            info!(
                "Connection {connection}: slave {} answered function {function} with: {exception}",
                pending.slave_id
            );
            return Ok(());
        }
    };
    let function = FunctionCode::from(rsp);
    if function != pending.function {
        return Err(Error::FnCode(function.value()));
    }
    let class = RegisterClass::of_function(function).ok_or(Error::FnCode(function.value()))?;
    let slave_id = pending.slave_id;
    let request = Request::try_from(pending.pdu())?;
    match (request, rsp) {
        (
            Request::ReadCoils(address, quantity) | Request::ReadDiscreteInputs(address, quantity),
            Response::ReadCoils(coils) | Response::ReadDiscreteInputs(coils),
        ) => store_range(store, connection, slave_id, class, address, quantity, coils.payload()),
        (
            Request::ReadHoldingRegisters(address, quantity)
            | Request::ReadInputRegisters(address, quantity),
            Response::ReadHoldingRegisters(words) | Response::ReadInputRegisters(words),
        ) => store_range(store, connection, slave_id, class, address, quantity, words.payload()),
        (Request::WriteSingleCoil(address, state), _) => {
            store_range(store, connection, slave_id, class, address, 1, &[u8::from(state)])
        }
        (Request::WriteSingleRegister(address, word), _) => {
            store_range(store, connection, slave_id, class, address, 1, &word.to_be_bytes())
        }
        (Request::WriteMultipleCoils(address, coils), _) => store_range(
            store,
            connection,
            slave_id,
            class,
            address,
            coils.len() as Quantity,
            coils.payload(),
        ),
        (Request::WriteMultipleRegisters(address, words), _) => store_range(
            store,
            connection,
            slave_id,
            class,
            address,
            words.len() as Quantity,
            words.payload(),
        ),
        (
            Request::ReadWriteMultipleRegisters(read_address, read_quantity, write_address, written),
            Response::ReadWriteMultipleRegisters(words),
        ) => {
            store_range(
                store,
                connection,
                slave_id,
                class,
                write_address,
                written.len() as Quantity,
                written.payload(),
            )?;
            store_range(store, connection, slave_id, class, read_address, read_quantity, words.payload())
        }
        _ => Err(Error::FnCode(function.value())),
    }
}
