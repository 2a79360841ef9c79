// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Hart identity, privilege modes, and per-hart boot flags.

use core::fmt;

/// Number of application harts this core brings up. A `const` so every bound
/// in this crate — chunk-table walks, boot-set bitmasks, `bootComplete[]` — is
/// auditable against one name instead of a scattered `4`.
pub const N_APP: usize = 4;

/// Identity of one of the four application harts. `Hart1` is always the
/// lowest-indexed member of any boot-set it belongs to, and therefore the
/// candidate primary (see [`HartId::index`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum HartId {
    Hart1 = 1,
    Hart2 = 2,
    Hart3 = 3,
    Hart4 = 4,
}

impl HartId {
    pub const ALL: [HartId; N_APP] = [HartId::Hart1, HartId::Hart2, HartId::Hart3, HartId::Hart4];

    /// Zero-based index into per-hart arrays (`0..N_APP`).
    #[inline]
    pub const fn index(self) -> usize {
        (self as u8 - 1) as usize
    }

    /// Inverse of [`HartId::index`]. Panics on an out-of-range index; callers
    /// only ever iterate `0..N_APP`.
    pub const fn from_index(index: usize) -> Self {
        match index {
            0 => HartId::Hart1,
            1 => HartId::Hart2,
            2 => HartId::Hart3,
            3 => HartId::Hart4,
            _ => panic!("hart index out of range"),
        }
    }

    #[inline]
    pub const fn mask_bit(self) -> u32 {
        1u32 << (self as u32)
    }
}

impl fmt::Display for HartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "u54_{}", *self as u8)
    }
}

/// RISC-V privilege mode an entry point is handed off in. Values match the
/// standard RISC-V privilege-level encoding (`PRV_U`/`PRV_S`/`PRV_M`) so a raw
/// value read straight out of the boot image needs no translation table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum PrivMode {
    User = 0,
    Supervisor = 1,
    Machine = 3,
}

impl PrivMode {
    pub const fn from_raw(raw: u32) -> Option<Self> {
        match raw {
            0 => Some(PrivMode::User),
            1 => Some(PrivMode::Supervisor),
            3 => Some(PrivMode::Machine),
            _ => None,
        }
    }
}

bitflags::bitflags! {
    /// Per-hart flags carried in the boot image header.
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct HartFlags: u32 {
        /// Skip OpenSBI firmware init for this hart; deliver a raw `GOTO`
        /// instead, and deregister the hart from any domain (invariant 6).
        const SKIP_OPENSBI      = 1 << 0;
        /// Do not auto-boot this hart after PMP setup; the FSM goes straight
        /// from `SetupPMPComplete` to `Complete`.
        const SKIP_AUTOBOOT     = 1 << 1;
        /// Hart may be restarted from a cold reset.
        const ALLOW_COLD_REBOOT = 1 << 2;
        /// Hart may be restarted from a warm reset (already running).
        const ALLOW_WARM_REBOOT = 1 << 3;
    }
}

/// High bit of a load chunk's `owner` field, marking the chunk's `exec_addr`
/// as the location of ancillary data (e.g. a device-tree blob) rather than
/// plain code/data. Chosen well above the four-hart id range so it can never
/// collide with a real `HartId` value.
pub const ANCILLIARY_DATA_BIT: u32 = 0x8000_0000;

/// Splits a chunk's raw `owner` field into the owning hart id (if the low
/// bits encode one of the four valid hart ids) and the ancillary-data flag.
pub fn decode_owner(raw: u32) -> (Option<HartId>, bool) {
    let ancillary = raw & ANCILLIARY_DATA_BIT != 0;
    let hart_raw = raw & !ANCILLIARY_DATA_BIT;
    let hart = match hart_raw {
        1 => Some(HartId::Hart1),
        2 => Some(HartId::Hart2),
        3 => Some(HartId::Hart3),
        4 => Some(HartId::Hart4),
        _ => None,
    };
    (hart, ancillary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_round_trips() {
        for (i, id) in HartId::ALL.iter().enumerate() {
            assert_eq!(id.index(), i);
            assert_eq!(HartId::from_index(i), *id);
        }
    }

    #[test]
    fn decode_owner_splits_ancillary_bit() {
        assert_eq!(decode_owner(2), (Some(HartId::Hart2), false));
        assert_eq!(decode_owner(2 | ANCILLIARY_DATA_BIT), (Some(HartId::Hart2), true));
        assert_eq!(decode_owner(9), (None, false));
    }
}
