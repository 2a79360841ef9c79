// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Domain registry: the boot core's contract-only view of whatever
//! isolation/ownership scheme (PMP regions, a hypervisor's VM table) a board
//! uses to decide which harts belong together.
//!
//! The core never inspects domain membership itself; it only reports hart
//! arrivals, departures, and boot-set metadata and lets the registry decide
//! what that means.

use crate::hart::{HartId, PrivMode};

/// Collaborator notified as harts join and leave domains during boot.
/// Mirrors the original service's `HSS_DomainIPIHartSetup`/
/// `HSS_DomainIPIHartRegister` pair, generalized from "PMP setup" to
/// "whatever ownership scheme the board uses" per the redesign that pulls
/// PMP policy out of the core.
pub trait DomainRegistry {
    /// Registers `hart` as a member of the domain named `set_name` (the
    /// boot image's set name, read once at image registration and threaded
    /// through every call for the rest of the boot). `primary` is `true`
    /// iff `hart` is the lowest-indexed member of its boot-set
    /// (invariant 5).
    fn register_hart(&mut self, hart: HartId, set_name: &str, primary: bool);

    /// Kicks off the domain itself once its primary has passed PMP setup:
    /// `hart_mask` is every hart sharing `hart`'s entry point (including
    /// `hart`), `ancillary` is the device-tree-style pointer discovered so
    /// far (absent until a download pass records one).
    fn register_boot_hart(
        &mut self,
        hart: HartId,
        set_name: &str,
        hart_mask: u32,
        priv_mode: PrivMode,
        entry_point: u64,
        ancillary: Option<u64>,
        allow_cold_reboot: bool,
        allow_warm_reboot: bool,
    );

    /// Removes `hart` from its domain, e.g. because its image flags asked
    /// to skip OpenSBI init entirely (invariant 6).
    fn deregister_hart(&mut self, hart: HartId);
}

/// A `DomainRegistry` that discards every call — useful for boards with no
/// isolation scheme at all, and for tests that don't care about domain
/// membership.
pub struct NullDomainRegistry;

impl DomainRegistry for NullDomainRegistry {
    fn register_hart(&mut self, _hart: HartId, _set_name: &str, _primary: bool) {}

    fn register_boot_hart(
        &mut self,
        _hart: HartId,
        _set_name: &str,
        _hart_mask: u32,
        _priv_mode: PrivMode,
        _entry_point: u64,
        _ancillary: Option<u64>,
        _allow_cold_reboot: bool,
        _allow_warm_reboot: bool,
    ) {
    }

    fn deregister_hart(&mut self, _hart: HartId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_registry_accepts_every_call_without_panicking() {
        let mut registry = NullDomainRegistry;
        registry.register_hart(HartId::Hart1, "set-a", true);
        registry.register_boot_hart(HartId::Hart1, "set-a", 0b11, PrivMode::Supervisor, 0x8000_0000, None, true, true);
        registry.deregister_hart(HartId::Hart2);
    }
}
