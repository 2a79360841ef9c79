// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Boot orchestration core for a Hart Software Services monitor-hart
//! supervisor: the per-target boot state machine that brings each of a
//! heterogeneous SoC's application harts from reset to executing its boot
//! image payload, plus the image validator, permission oracle, and chunked
//! copy engine it depends on.
//!
//! This crate owns the state machine and its data model only. The IPI
//! transport, the domain/ownership registry, the DMA copy primitive, the
//! CRC-32 routine, the wall clock, and (behind feature gates) signature
//! checking and GPIO status reporting are all represented as traits or bare
//! function pointers — [`domain`], [`ipi`], [`copy`], [`crc`], [`clock`],
//! [`validate`], [`gpio_ui`] — so this core can be exercised with in-memory
//! fakes in its own test suite and wired to real firmware services by the
//! embedding supervisor.
//!
//! Built `no_std` outside test builds so it can be linked directly into a
//! monitor-hart firmware image with no OS underneath it.

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod macros;

pub mod api;
pub mod clock;
pub mod context;
pub mod copy;
pub mod crc;
pub mod domain;
#[cfg(feature = "provide-dtb")]
pub mod dtb;
pub mod error;
pub mod events;
pub mod fsm;
#[cfg(feature = "gpio-ui")]
pub mod gpio_ui;
pub mod hart;
pub mod image;
pub mod ipi;
pub mod permission;
pub mod validate;

pub use api::{BootCore, RestartSource};
pub use error::{ErrorKind, Result};
pub use hart::{HartId, N_APP};
