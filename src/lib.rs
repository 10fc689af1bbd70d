// SPDX-FileCopyrightText: Copyright (c) 2018-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

#![doc = include_str!("../README.md")]

#[macro_use]
extern crate log;

mod codec;
mod error;
mod frame;
mod util;

pub mod master;
pub mod slave;
pub mod station;
pub mod store;
pub mod transit;

pub use codec::tcp;
pub use error::*;
pub use frame::*;
