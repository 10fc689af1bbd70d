// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Structured (JSON) configuration of a register store

use super::{Connection, ConnectionId, RegisterClass, RegisterGroup, RegisterStore, SlaveMapping, Values};
use crate::error::LoadError;
use serde::{Deserialize, Serialize};
use std::{net::IpAddr, path::Path, time::Duration};

/// The whole register store of a node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    pub connect_array: Vec<ConnectionConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub ip_address: String,
    pub num_slave: usize,
    #[serde(default)]
    pub slaves: Vec<SlaveConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlaveConfig {
    pub slave_id: u8,
    #[serde(default)]
    pub num_bit_group: usize,
    #[serde(default)]
    pub num_input_bit_group: usize,
    #[serde(default)]
    pub num_register_group: usize,
    #[serde(default)]
    pub num_input_register_group: usize,
    #[serde(default)]
    pub bit_group: Vec<GroupConfig>,
    #[serde(default)]
    pub input_bit_group: Vec<GroupConfig>,
    #[serde(default)]
    pub register_group: Vec<GroupConfig>,
    #[serde(default)]
    pub input_register_group: Vec<GroupConfig>,
}

/// A register group; an empty `data` list means all zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupConfig {
    pub start_address: u16,
    pub number: u16,
    #[serde(default)]
    pub data: Vec<i64>,
}

/// Settings of a polling master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl MasterConfig {
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn check_count(what: &'static str, declared: usize, actual: usize) -> Result<(), LoadError> {
    if declared != actual {
        return Err(LoadError::CountMismatch {
            what,
            declared,
            actual,
        });
    }
    Ok(())
}

/// Registers accept signed as well as unsigned 16 bit notation.
fn register_value(value: i64) -> Result<i16, LoadError> {
    match value {
        -32768..=32767 => Ok(value as i16),
        32768..=65535 => Ok(value as u16 as i16),
        _ => Err(LoadError::RegisterValue(value)),
    }
}

impl GroupConfig {
    fn into_group(self, class: RegisterClass) -> Result<RegisterGroup, LoadError> {
        let count = usize::from(self.number);
        if !self.data.is_empty() {
            check_count("number", count, self.data.len())?;
        }
        let values = if class.is_bits() {
            let mut bits = vec![false; count];
            for (bit, v) in bits.iter_mut().zip(&self.data) {
                *bit = *v != 0;
            }
            Values::Bits(bits)
        } else {
            let mut words = vec![0; count];
            for (word, v) in words.iter_mut().zip(&self.data) {
                *word = register_value(*v)?;
            }
            Values::Registers(words)
        };
        Ok(RegisterGroup::new(self.start_address, values))
    }

    fn from_group(group: &RegisterGroup) -> Self {
        let data = match group.values() {
            Values::Bits(bits) => bits.iter().map(|b| i64::from(*b)).collect(),
            Values::Registers(words) => words.iter().map(|w| i64::from(*w)).collect(),
        };
        Self {
            start_address: group.start_address(),
            number: group.quantity(),
            data,
        }
    }
}

impl SlaveConfig {
    fn into_mapping(self) -> Result<SlaveMapping, LoadError> {
        let Self {
            slave_id,
            num_bit_group,
            num_input_bit_group,
            num_register_group,
            num_input_register_group,
            bit_group,
            input_bit_group,
            register_group,
            input_register_group,
        } = self;
        let classes = [
            (RegisterClass::Coils, "numBitGroup", num_bit_group, bit_group),
            (
                RegisterClass::DiscreteInputs,
                "numInputBitGroup",
                num_input_bit_group,
                input_bit_group,
            ),
            (
                RegisterClass::HoldingRegisters,
                "numRegisterGroup",
                num_register_group,
                register_group,
            ),
            (
                RegisterClass::InputRegisters,
                "numInputRegisterGroup",
                num_input_register_group,
                input_register_group,
            ),
        ];
        let mut mapping = SlaveMapping::new(slave_id);
        for (class, what, declared, groups) in classes {
            check_count(what, declared, groups.len())?;
            for group in groups {
                mapping = mapping.with_group(class, group.into_group(class)?);
            }
        }
        Ok(mapping)
    }

    fn from_mapping(mapping: &SlaveMapping) -> Self {
        let groups = |class| -> Vec<GroupConfig> {
            mapping
                .groups(class)
                .iter()
                .map(GroupConfig::from_group)
                .collect()
        };
        let bit_group = groups(RegisterClass::Coils);
        let input_bit_group = groups(RegisterClass::DiscreteInputs);
        let register_group = groups(RegisterClass::HoldingRegisters);
        let input_register_group = groups(RegisterClass::InputRegisters);
        Self {
            slave_id: mapping.slave_id(),
            num_bit_group: bit_group.len(),
            num_input_bit_group: input_bit_group.len(),
            num_register_group: register_group.len(),
            num_input_register_group: input_register_group.len(),
            bit_group,
            input_bit_group,
            register_group,
            input_register_group,
        }
    }
}

impl ConnectionConfig {
    fn address(&self) -> Result<IpAddr, LoadError> {
        self.ip_address
            .parse()
            .map_err(|_| LoadError::InvalidAddress(self.ip_address.clone()))
    }

    fn into_connection(self, id: ConnectionId) -> Result<Connection, LoadError> {
        let address = self.address()?;
        check_count("numSlave", self.num_slave, self.slaves.len())?;
        let slaves = self
            .slaves
            .into_iter()
            .map(SlaveConfig::into_mapping)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Connection::new(id, address, slaves))
    }
}

impl StoreConfig {
    pub fn from_json(json: &str) -> Result<Self, LoadError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, LoadError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Keep only the entries whose address is one of `local_addresses`.
    ///
    /// A slave node serves the entry that describes itself.
    #[must_use]
    pub fn select_local(self, local_addresses: &[IpAddr]) -> Self {
        let connect_array = self
            .connect_array
            .into_iter()
            .filter(|c| {
                c.address()
                    .is_ok_and(|address| local_addresses.contains(&address))
            })
            .collect();
        Self { connect_array }
    }

    /// Build the store; connection ids are assigned by position.
    pub fn into_store(self) -> Result<RegisterStore, LoadError> {
        let connections = self
            .connect_array
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.into_connection(ConnectionId(i as u32)))
            .collect::<Result<Vec<_>, _>>()?;
        let store = RegisterStore::new(connections)?;
        info!(
            "Loaded register store with {} connection(s)",
            store.connections().len()
        );
        Ok(store)
    }
}

impl From<&RegisterStore> for StoreConfig {
    fn from(store: &RegisterStore) -> Self {
        let connect_array = store
            .connections()
            .iter()
            .map(|conn| {
                let slaves: Vec<_> = conn.slaves().iter().map(SlaveConfig::from_mapping).collect();
                ConnectionConfig {
                    ip_address: conn.remote_address().to_string(),
                    num_slave: slaves.len(),
                    slaves,
                }
            })
            .collect();
        Self { connect_array }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    const JSON: &str = r#"{
        "connectArray": [
            {
                "ipAddress": "10.0.0.1",
                "numSlave": 1,
                "slaves": [
                    {
                        "slaveId": 1,
                        "numBitGroup": 1,
                        "numInputBitGroup": 0,
                        "numRegisterGroup": 2,
                        "numInputRegisterGroup": 1,
                        "bitGroup": [
                            { "startAddress": 0, "number": 4, "data": [1, 0, 1, 1] }
                        ],
                        "inputBitGroup": [],
                        "registerGroup": [
                            { "startAddress": 0, "number": 3, "data": [0, -1, 65535] },
                            { "startAddress": 100, "number": 2, "data": [] }
                        ],
                        "inputRegisterGroup": [
                            { "startAddress": 0, "number": 1, "data": [7] }
                        ]
                    }
                ]
            },
            {
                "ipAddress": "10.0.0.2",
                "numSlave": 0,
                "slaves": []
            }
        ]
    }"#;

    #[test]
    fn load_store_from_json() {
        let store = StoreConfig::from_json(JSON).unwrap().into_store().unwrap();
        assert_eq!(store.connections().len(), 2);
        let conn = store.connection(ConnectionId(0)).unwrap();
        assert_eq!(conn.remote_address(), IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)));
        let slave = conn.slave(1).unwrap();
        let coils = &slave.groups(RegisterClass::Coils)[0];
        assert_eq!(coils.values(), &Values::Bits(vec![true, false, true, true]));
        let holding = slave.groups(RegisterClass::HoldingRegisters);
        assert_eq!(holding[0].values(), &Values::Registers(vec![0, -1, -1]));
        assert_eq!(holding[1].values(), &Values::Registers(vec![0, 0]));
        assert_eq!(
            store.connection_by_address("10.0.0.2".parse().unwrap()).unwrap().id(),
            ConnectionId(1)
        );
    }

    #[test]
    fn reject_declared_count_mismatch() {
        let json = JSON.replace("\"numRegisterGroup\": 2", "\"numRegisterGroup\": 3");
        let err = StoreConfig::from_json(&json).unwrap().into_store().err().unwrap();
        assert!(matches!(
            err,
            LoadError::CountMismatch {
                what: "numRegisterGroup",
                declared: 3,
                actual: 2
            }
        ));

        let json = JSON.replace("\"number\": 4", "\"number\": 5");
        let err = StoreConfig::from_json(&json).unwrap().into_store().err().unwrap();
        assert!(matches!(err, LoadError::CountMismatch { what: "number", .. }));

        let json = JSON.replace("\"numSlave\": 0", "\"numSlave\": 1");
        let err = StoreConfig::from_json(&json).unwrap().into_store().err().unwrap();
        assert!(matches!(err, LoadError::CountMismatch { what: "numSlave", .. }));
    }

    #[test]
    fn reject_invalid_values() {
        let json = JSON.replace("[7]", "[70000]");
        let err = StoreConfig::from_json(&json).unwrap().into_store().err().unwrap();
        assert!(matches!(err, LoadError::RegisterValue(70000)));

        let json = JSON.replace("10.0.0.2", "not-an-address");
        let err = StoreConfig::from_json(&json).unwrap().into_store().err().unwrap();
        assert!(matches!(err, LoadError::InvalidAddress(_)));

        assert!(matches!(
            StoreConfig::from_json("{").err().unwrap(),
            LoadError::Json(_)
        ));
    }

    #[test]
    fn reject_overlapping_groups() {
        let json = JSON.replace("\"startAddress\": 100", "\"startAddress\": 2");
        let err = StoreConfig::from_json(&json).unwrap().into_store().err().unwrap();
        assert!(matches!(err, LoadError::Overlap { slave_id: 1, .. }));
    }

    #[test]
    fn select_local_connection() {
        let local = [IpAddr::V4(Ipv4Addr::new(10, 0, 0, 2))];
        let config = StoreConfig::from_json(JSON).unwrap().select_local(&local);
        assert_eq!(config.connect_array.len(), 1);
        assert_eq!(config.connect_array[0].ip_address, "10.0.0.2");
    }

    #[test]
    fn dump_store_as_json() {
        let store = StoreConfig::from_json(JSON).unwrap().into_store().unwrap();
        let config = StoreConfig::from(&store);
        let reloaded = StoreConfig::from_json(&config.to_json().unwrap())
            .unwrap()
            .into_store()
            .unwrap();
        assert_eq!(reloaded, store);
        let group = &config.connect_array[0].slaves[0].register_group[1];
        assert_eq!(group.data, vec![0, 0]);
    }

    #[test]
    fn dump_largest_group_as_json() {
        let json = JSON.replace(
            r#"{ "startAddress": 100, "number": 2, "data": [] }"#,
            r#"{ "startAddress": 3, "number": 65533, "data": [] }"#,
        );
        let store = StoreConfig::from_json(&json).unwrap().into_store().unwrap();
        let config = StoreConfig::from(&store);
        assert_eq!(config.connect_array[0].slaves[0].register_group[1].number, 65533);
        let reloaded = StoreConfig::from_json(&config.to_json().unwrap())
            .unwrap()
            .into_store()
            .unwrap();
        assert_eq!(reloaded, store);
    }

    #[test]
    fn master_config() {
        assert_eq!(
            MasterConfig::default().poll_interval(),
            Duration::from_secs(1)
        );
        let config: MasterConfig = serde_json::from_str(r#"{"pollIntervalMs": 250}"#).unwrap();
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
        let config: MasterConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, MasterConfig::default());
    }
}
