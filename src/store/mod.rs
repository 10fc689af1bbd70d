// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Register store
//!
//! Per connection and per slave storage of the four Modbus register
//! classes, each organised in non-overlapping address range groups.

use crate::{
    error::LoadError,
    frame::{Address, FunctionCode, Quantity},
};
use core::fmt;
use std::net::IpAddr;

pub mod config;
mod group;
pub mod snapshot;

pub use self::group::*;

/// Smallest valid slave id.
pub const MIN_SLAVE_ID: u8 = 1;
/// Largest valid slave id.
pub const MAX_SLAVE_ID: u8 = 247;

/// One of the four Modbus data tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    Coils,
    DiscreteInputs,
    HoldingRegisters,
    InputRegisters,
}

impl RegisterClass {
    /// All classes in polling order.
    pub const ALL: [Self; 4] = [
        Self::Coils,
        Self::DiscreteInputs,
        Self::HoldingRegisters,
        Self::InputRegisters,
    ];

    /// `true` for the single bit classes.
    #[must_use]
    pub const fn is_bits(self) -> bool {
        matches!(self, Self::Coils | Self::DiscreteInputs)
    }

    /// `false` for the classes a Modbus client can only read.
    #[must_use]
    pub const fn is_writable(self) -> bool {
        matches!(self, Self::Coils | Self::HoldingRegisters)
    }

    /// The function code that reads this class.
    #[must_use]
    pub const fn read_function(self) -> FunctionCode {
        match self {
            Self::Coils => FunctionCode::ReadCoils,
            Self::DiscreteInputs => FunctionCode::ReadDiscreteInputs,
            Self::HoldingRegisters => FunctionCode::ReadHoldingRegisters,
            Self::InputRegisters => FunctionCode::ReadInputRegisters,
        }
    }

    /// The class a function code operates on.
    ///
    /// For [`FunctionCode::ReadWriteMultipleRegisters`] this is
    /// [`RegisterClass::HoldingRegisters`].
    #[must_use]
    pub const fn of_function(function: FunctionCode) -> Option<Self> {
        match function {
            FunctionCode::ReadCoils
            | FunctionCode::WriteSingleCoil
            | FunctionCode::WriteMultipleCoils => Some(Self::Coils),
            FunctionCode::ReadDiscreteInputs => Some(Self::DiscreteInputs),
            FunctionCode::ReadHoldingRegisters
            | FunctionCode::WriteSingleRegister
            | FunctionCode::WriteMultipleRegisters
            | FunctionCode::ReadWriteMultipleRegisters => Some(Self::HoldingRegisters),
            FunctionCode::ReadInputRegisters => Some(Self::InputRegisters),
            FunctionCode::Custom(_) => None,
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Coils => "coil",
            Self::DiscreteInputs => "discrete input",
            Self::HoldingRegisters => "holding register",
            Self::InputRegisters => "input register",
        }
    }
}

impl fmt::Display for RegisterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Opaque handle of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u32);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The register map of one slave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlaveMapping {
    slave_id: u8,
    coils: Vec<RegisterGroup>,
    discrete_inputs: Vec<RegisterGroup>,
    holding_registers: Vec<RegisterGroup>,
    input_registers: Vec<RegisterGroup>,
}

impl SlaveMapping {
    #[must_use]
    pub const fn new(slave_id: u8) -> Self {
        Self {
            slave_id,
            coils: Vec::new(),
            discrete_inputs: Vec::new(),
            holding_registers: Vec::new(),
            input_registers: Vec::new(),
        }
    }

    /// Add a group of `class`.
    #[must_use]
    pub fn with_group(mut self, class: RegisterClass, group: RegisterGroup) -> Self {
        self.groups_vec(class).push(group);
        self
    }

    fn groups_vec(&mut self, class: RegisterClass) -> &mut Vec<RegisterGroup> {
        match class {
            RegisterClass::Coils => &mut self.coils,
            RegisterClass::DiscreteInputs => &mut self.discrete_inputs,
            RegisterClass::HoldingRegisters => &mut self.holding_registers,
            RegisterClass::InputRegisters => &mut self.input_registers,
        }
    }

    #[must_use]
    pub const fn slave_id(&self) -> u8 {
        self.slave_id
    }

    #[must_use]
    pub fn groups(&self, class: RegisterClass) -> &[RegisterGroup] {
        match class {
            RegisterClass::Coils => &self.coils,
            RegisterClass::DiscreteInputs => &self.discrete_inputs,
            RegisterClass::HoldingRegisters => &self.holding_registers,
            RegisterClass::InputRegisters => &self.input_registers,
        }
    }

    /// The single group of `class` that covers `[address, address + quantity)`.
    ///
    /// A range spanning two adjacent groups is not found.
    #[must_use]
    pub fn find_group(
        &self,
        class: RegisterClass,
        address: Address,
        quantity: Quantity,
    ) -> Option<&RegisterGroup> {
        self.groups(class)
            .iter()
            .find(|g| g.contains(address, quantity))
    }

    pub fn find_group_mut(
        &mut self,
        class: RegisterClass,
        address: Address,
        quantity: Quantity,
    ) -> Option<&mut RegisterGroup> {
        self.groups_vec(class)
            .iter_mut()
            .find(|g| g.contains(address, quantity))
    }

    fn validate(&self) -> Result<(), LoadError> {
        if !(MIN_SLAVE_ID..=MAX_SLAVE_ID).contains(&self.slave_id) {
            return Err(LoadError::InvalidSlaveId(self.slave_id));
        }
        for class in RegisterClass::ALL {
            let groups = self.groups(class);
            for (i, group) in groups.iter().enumerate() {
                if group.values().is_bits() != class.is_bits() {
                    return Err(LoadError::ValueKind {
                        slave_id: self.slave_id,
                        class: class.name(),
                        start: group.start_address(),
                    });
                }
                if group.count() == 0 {
                    return Err(LoadError::EmptyGroup {
                        slave_id: self.slave_id,
                        start: group.start_address(),
                    });
                }
                if group.count() > usize::from(Quantity::MAX)
                    || group.end() > u32::from(u16::MAX) + 1
                {
                    return Err(LoadError::AddressSpace {
                        start: group.start_address(),
                        count: group.count() as u32,
                    });
                }
                if let Some(other) = groups[..i].iter().find(|other| other.overlaps(group)) {
                    return Err(LoadError::Overlap {
                        slave_id: self.slave_id,
                        class: class.name(),
                        first: other.start_address(),
                        second: group.start_address(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// A remote (or local) Modbus endpoint and the slaves behind it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    id: ConnectionId,
    remote_address: IpAddr,
    slaves: Vec<SlaveMapping>,
}

impl Connection {
    #[must_use]
    pub const fn new(id: ConnectionId, remote_address: IpAddr, slaves: Vec<SlaveMapping>) -> Self {
        Self {
            id,
            remote_address,
            slaves,
        }
    }

    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    #[must_use]
    pub const fn remote_address(&self) -> IpAddr {
        self.remote_address
    }

    #[must_use]
    pub fn slaves(&self) -> &[SlaveMapping] {
        &self.slaves
    }

    #[must_use]
    pub fn slave(&self, slave_id: u8) -> Option<&SlaveMapping> {
        self.slaves.iter().find(|s| s.slave_id == slave_id)
    }

    pub fn slave_mut(&mut self, slave_id: u8) -> Option<&mut SlaveMapping> {
        self.slaves.iter_mut().find(|s| s.slave_id == slave_id)
    }
}

/// All connections of a node, indexed by id and by remote address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegisterStore {
    connections: Vec<Connection>,
}

impl RegisterStore {
    /// Build a store and check its consistency.
    ///
    /// Connection ids and remote addresses must be unique, slave ids
    /// must be unique per connection and within `1..=247`, and the
    /// groups of one slave and class must not overlap.
    pub fn new(connections: Vec<Connection>) -> Result<Self, LoadError> {
        let store = Self { connections };
        store.validate()?;
        Ok(store)
    }

    fn validate(&self) -> Result<(), LoadError> {
        for (i, conn) in self.connections.iter().enumerate() {
            let earlier = &self.connections[..i];
            if earlier.iter().any(|c| c.id == conn.id) {
                return Err(LoadError::DuplicateConnection(conn.id.to_string()));
            }
            if earlier.iter().any(|c| c.remote_address == conn.remote_address) {
                return Err(LoadError::DuplicateConnection(
                    conn.remote_address.to_string(),
                ));
            }
            for (j, slave) in conn.slaves.iter().enumerate() {
                if conn.slaves[..j].iter().any(|s| s.slave_id == slave.slave_id) {
                    return Err(LoadError::DuplicateSlave {
                        connection: conn.id.0,
                        slave_id: slave.slave_id,
                    });
                }
                slave.validate()?;
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    #[must_use]
    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.id == id)
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.iter_mut().find(|c| c.id == id)
    }

    #[must_use]
    pub fn connection_by_address(&self, address: IpAddr) -> Option<&Connection> {
        self.connections
            .iter()
            .find(|c| c.remote_address == address)
    }

    /// The first slave with `slave_id` across all connections.
    #[must_use]
    pub fn find_slave(&self, slave_id: u8) -> Option<(ConnectionId, &SlaveMapping)> {
        self.connections
            .iter()
            .find_map(|c| c.slave(slave_id).map(|s| (c.id, s)))
    }

    pub fn find_slave_mut(&mut self, slave_id: u8) -> Option<&mut SlaveMapping> {
        self.connections
            .iter_mut()
            .find_map(|c| c.slave_mut(slave_id))
    }

    /// The group of `class` of slave `slave_id` behind `connection` that
    /// covers `[address, address + quantity)`.
    #[must_use]
    pub fn find_group(
        &self,
        connection: ConnectionId,
        class: RegisterClass,
        slave_id: u8,
        address: Address,
        quantity: Quantity,
    ) -> Option<&RegisterGroup> {
        self.connection(connection)?
            .slave(slave_id)?
            .find_group(class, address, quantity)
    }

    pub fn find_group_mut(
        &mut self,
        connection: ConnectionId,
        class: RegisterClass,
        slave_id: u8,
        address: Address,
        quantity: Quantity,
    ) -> Option<&mut RegisterGroup> {
        self.connection_mut(connection)?
            .slave_mut(slave_id)?
            .find_group_mut(class, address, quantity)
    }

    #[must_use]
    pub fn into_connections(self) -> Vec<Connection> {
        self.connections
    }
}
