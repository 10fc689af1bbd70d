// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event driven master node
//!
//! The host delivers events (timers, received bytes, connection state)
//! and carries out the returned [`Action`]s.

use crate::{
    error::Error,
    master::MasterSession,
    store::{ConnectionId, RegisterStore, config::MasterConfig},
    transit::{
        CallerId, HostResolver, Relayed, TransitRelay,
        operator::{OperatorDecoder, OperatorRequest},
    },
};
use std::{collections::HashMap, time::Duration};

type Result<T> = core::result::Result<T, Error>;

/// Timers a [`MasterStation`] asks to be scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timer {
    /// Read all configured groups.
    Poll,
}

/// Something the host has to do on behalf of the station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    /// Write `bytes` to the socket of `connection`.
    Send {
        connection: ConnectionId,
        bytes: Vec<u8>,
    },
    /// Answer the operator `caller`.
    Reply { caller: CallerId, bytes: Vec<u8> },
    /// Fire `timer` once `after` has elapsed.
    Schedule { timer: Timer, after: Duration },
}

/// A polling master with a transit relay in front of it.
#[derive(Debug)]
pub struct MasterStation<R> {
    store: RegisterStore,
    session: MasterSession,
    relay: TransitRelay<R>,
    config: MasterConfig,
    operators: HashMap<CallerId, OperatorDecoder>,
}

impl<R: HostResolver> MasterStation<R> {
    pub fn new(store: RegisterStore, config: MasterConfig, resolver: R) -> Self {
        let session = MasterSession::new(&store);
        Self {
            store,
            session,
            relay: TransitRelay::new(resolver),
            config,
            operators: HashMap::new(),
        }
    }

    /// The actions to perform when the node starts: the first poll fires
    /// immediately.
    #[must_use]
    pub const fn start(&self) -> [Action; 1] {
        [Action::Schedule {
            timer: Timer::Poll,
            after: Duration::ZERO,
        }]
    }

    #[must_use]
    pub const fn store(&self) -> &RegisterStore {
        &self.store
    }

    #[must_use]
    pub const fn session(&self) -> &MasterSession {
        &self.session
    }

    #[must_use]
    pub const fn relay(&self) -> &TransitRelay<R> {
        &self.relay
    }

    /// Stop and hand the store back for the result dump.
    #[must_use]
    pub fn into_store(self) -> RegisterStore {
        self.store
    }

    fn transmit(&mut self, actions: &mut Vec<Action>) {
        while let Some((connection, bytes)) = self.session.poll_transmit() {
            actions.push(Action::Send { connection, bytes });
        }
    }

    /// A timer fired. The poll timer always schedules its next period.
    pub fn on_timer(&mut self, timer: Timer) -> Vec<Action> {
        let mut actions = Vec::new();
        match timer {
            Timer::Poll => {
                if let Err(err) = self.session.on_poll_tick(&self.store) {
                    error!("Poll cycle incomplete: {err}");
                }
                self.transmit(&mut actions);
                actions.push(Action::Schedule {
                    timer: Timer::Poll,
                    after: self.config.poll_interval(),
                });
            }
        }
        actions
    }

    /// Bytes received on the Modbus connection `connection`.
    pub fn on_bytes(&mut self, connection: ConnectionId, bytes: &[u8]) -> Vec<Action> {
        let completions = self.session.on_bytes(connection, bytes, &mut self.store);
        let mut actions: Vec<_> = completions
            .iter()
            .filter_map(|completion| self.relay.complete(completion))
            .map(|(caller, bytes)| Action::Reply { caller, bytes })
            .collect();
        self.transmit(&mut actions);
        actions
    }

    /// Bytes received from the operator `caller`.
    pub fn on_operator_bytes(&mut self, caller: CallerId, bytes: &[u8]) -> Vec<Action> {
        let Self {
            store,
            session,
            relay,
            operators,
            ..
        } = self;
        let decoder = operators.entry(caller).or_default();
        let mut actions = Vec::new();
        let mut next = decoder.feed(bytes);
        loop {
            match next {
                Ok(Some(request)) => {
                    if let Some(action) = relay_request(relay, caller, &request, store, session) {
                        actions.push(action);
                    }
                }
                Ok(None) => break,
                Err(err) => warn!("Dropping request of caller {}: {err}", caller.0),
            }
            next = decoder.next_request();
        }
        self.transmit(&mut actions);
        actions
    }

    /// The operator `caller` went away.
    ///
    /// Requests already relayed still complete, their replies are
    /// addressed to the closed caller.
    pub fn operator_closed(&mut self, caller: CallerId) {
        self.operators.remove(&caller);
    }

    pub fn connection_established(&mut self, connection: ConnectionId) -> Result<Vec<Action>> {
        self.session.connection_established(connection)?;
        let mut actions = Vec::new();
        self.transmit(&mut actions);
        Ok(actions)
    }

    /// Discard everything pending on `connection`, relayed requests included.
    pub fn connection_closed(&mut self, connection: ConnectionId) -> Result<()> {
        self.session.close(connection)?;
        self.relay.connection_closed(connection);
        Ok(())
    }
}

fn relay_request<R: HostResolver>(
    relay: &mut TransitRelay<R>,
    caller: CallerId,
    request: &OperatorRequest,
    store: &RegisterStore,
    session: &mut MasterSession,
) -> Option<Action> {
    if request.protocol_id != 0 {
        warn!(
            "Dropping request {} of caller {}: {}",
            request.transaction_id,
            caller.0,
            Error::ProtocolNotModbus(request.protocol_id)
        );
        return None;
    }
    match relay.relay(caller, request, store, session) {
        Relayed::Forwarded { .. } => None,
        Relayed::Rejected(bytes) => Some(Action::Reply { caller, bytes }),
    }
}
