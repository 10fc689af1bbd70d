// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Relay of operator requests onto the master's connections
//!
//! The target host of an [`OperatorRequest`] is resolved to one of the
//! configured connections. The request is then queued on that connection
//! like any other master request and the response is routed back to the
//! caller under the caller's own transaction id.

pub mod operator;

use self::operator::OperatorRequest;
use crate::{
    codec::tcp::{Header, TransactionId, UnitId, encode_adu, server::exception_to_vec},
    error::Error,
    frame::{Exception, FunctionCode, Request},
    master::{Completion, MasterSession},
    store::{ConnectionId, RegisterStore},
};
use std::{collections::HashMap, net::IpAddr};

/// Maps a host name to its network addresses.
pub trait HostResolver {
    fn resolve(&self, host: &str) -> Vec<IpAddr>;
}

/// A fixed table of host names.
#[derive(Debug, Clone, Default)]
pub struct StaticResolver {
    hosts: HashMap<String, Vec<IpAddr>>,
}

impl StaticResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_host(
        mut self,
        host: impl Into<String>,
        addresses: impl IntoIterator<Item = IpAddr>,
    ) -> Self {
        self.insert(host, addresses);
        self
    }

    pub fn insert(&mut self, host: impl Into<String>, addresses: impl IntoIterator<Item = IpAddr>) {
        self.hosts
            .entry(host.into())
            .or_default()
            .extend(addresses);
    }
}

impl HostResolver for StaticResolver {
    fn resolve(&self, host: &str) -> Vec<IpAddr> {
        self.hosts.get(host).cloned().unwrap_or_default()
    }
}

/// Identifies the operator connection a request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallerId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Correlation {
    caller: CallerId,
    caller_transaction_id: TransactionId,
    slave_id: UnitId,
}

/// What happened to a relayed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relayed {
    /// Queued on `connection` as `transaction_id`.
    Forwarded {
        connection: ConnectionId,
        transaction_id: TransactionId,
    },
    /// Answered right away, the exception response for the caller.
    Rejected(Vec<u8>),
}

/// Correlates relayed requests with their callers.
#[derive(Debug)]
pub struct TransitRelay<R> {
    resolver: R,
    correlations: HashMap<(ConnectionId, TransactionId), Correlation>,
}

impl<R: HostResolver> TransitRelay<R> {
    pub fn new(resolver: R) -> Self {
        Self {
            resolver,
            correlations: HashMap::new(),
        }
    }

    /// The connection serving `host`: the first resolved address that
    /// belongs to a configured connection wins.
    pub fn resolve(&self, store: &RegisterStore, host: &str) -> Option<ConnectionId> {
        self.resolver
            .resolve(host)
            .into_iter()
            .find_map(|address| store.connection_by_address(address))
            .map(|conn| conn.id())
    }

    /// Number of relayed requests still waiting for their response.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.correlations.len()
    }

    /// Queue `request` of `caller` on the connection serving its target.
    pub fn relay(
        &mut self,
        caller: CallerId,
        request: &OperatorRequest,
        store: &RegisterStore,
        session: &mut MasterSession,
    ) -> Relayed {
        let hdr = Header {
            transaction_id: request.transaction_id,
            unit_id: request.slave_id,
        };
        let Some(connection) = self.resolve(store, &request.target_host) else {
            warn!(
                "Cannot relay request {} of caller {}: no connection serves {:?}",
                request.transaction_id, caller.0, request.target_host
            );
            return reject(hdr, request.function, Exception::GatewayPathUnavailable);
        };
        let submitted = request.to_request_pdu().and_then(|pdu| {
            let modbus_request = Request::try_from(pdu.as_slice())?;
            session.submit(connection, request.slave_id, modbus_request)
        });
        match submitted {
            Ok(transaction_id) => {
                debug!(
                    "Relaying request {} of caller {} as transaction {transaction_id} on connection {connection}",
                    request.transaction_id, caller.0
                );
                self.correlations.insert(
                    (connection, transaction_id),
                    Correlation {
                        caller,
                        caller_transaction_id: request.transaction_id,
                        slave_id: request.slave_id,
                    },
                );
                Relayed::Forwarded {
                    connection,
                    transaction_id,
                }
            }
            Err(err) => {
                warn!(
                    "Cannot relay request {} of caller {}: {err}",
                    request.transaction_id, caller.0
                );
                let exception = match err {
                    Error::UnknownConnection(_) => Exception::GatewayPathUnavailable,
                    err => err.exception(),
                };
                reject(hdr, request.function, exception)
            }
        }
    }

    /// Route a matched response back to the caller that requested it.
    ///
    /// Returns `None` for responses to the master's own requests.
    pub fn complete(&mut self, completion: &Completion) -> Option<(CallerId, Vec<u8>)> {
        let key = (completion.connection, completion.request.transaction_id);
        let correlation = self.correlations.remove(&key)?;
        let hdr = Header {
            transaction_id: correlation.caller_transaction_id,
            unit_id: correlation.slave_id,
        };
        match encode_adu(hdr, &completion.pdu) {
            Ok(adu) => Some((correlation.caller, adu)),
            Err(err) => {
                error!(
                    "Cannot return response to caller {}: {err}",
                    correlation.caller.0
                );
                None
            }
        }
    }

    /// Forget all relayed requests of `connection`.
    pub fn connection_closed(&mut self, connection: ConnectionId) -> usize {
        let before = self.correlations.len();
        self.correlations.retain(|(conn, _), _| *conn != connection);
        let dropped = before - self.correlations.len();
        if dropped > 0 {
            warn!("Dropped {dropped} relayed request(s) of closed connection {connection}");
        }
        dropped
    }
}

fn reject(hdr: Header, function: FunctionCode, exception: Exception) -> Relayed {
    let adu = exception_to_vec(hdr, function, exception).unwrap_or_else(|err| {
        error!("Cannot encode exception response: {err}");
        Vec::new()
    });
    Relayed::Rejected(adu)
}
