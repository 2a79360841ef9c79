// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Permission oracle: the boot core's external answer to "is this hart
//! allowed to run right now?" and "is this write allowed at all?" — gating
//! things the state machine itself has no opinion on, such as DDR training
//! status or a board's per-target memory map.

use crate::hart::HartId;

/// A half-open physical address window `[start, end)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Window {
    pub start: u64,
    pub end: u64,
}

impl Window {
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    fn contains_range(&self, addr: u64, size: u32) -> bool {
        let Some(end) = addr.checked_add(size as u64) else {
            return false;
        };
        addr >= self.start && end <= self.end
    }

    fn overlaps_range(&self, addr: u64, size: u32) -> bool {
        let Some(end) = addr.checked_add(size as u64) else {
            return true;
        };
        addr < self.end && end > self.start
    }
}

/// Collaborator consulted before a hart is allowed to leave `Init`, and
/// before every byte the orchestrator copies into target-owned memory
/// (invariant 2 / property P1). Kept trait-based rather than a single bool
/// flag because a real implementation typically folds in several
/// independent conditions: DDR training, a per-hart security policy, a
/// compile-time memory map.
pub trait PermissionOracle {
    /// Whether DDR has finished training. Most boards gate every hart but
    /// the one doing the training on this, and every chunk whose
    /// destination lies in DDR (§4.2, boundary property B3).
    fn ddr_trained(&self) -> bool;

    /// Whether the startup barrier has released every hart to begin
    /// booting. Gates `Init`'s transition to `SetupPMP` alongside
    /// [`Self::ddr_trained`].
    fn startup_complete(&self) -> bool;

    /// Whether `hart` is currently permitted to boot at all, independent of
    /// DDR state (e.g. a board policy that disables a hart entirely).
    fn hart_permitted(&self, hart: HartId) -> bool;

    /// Whether `target` may be written `size` bytes at `addr` right now.
    /// `false` for any window `target` doesn't own, and for a window that
    /// overlaps DDR while DDR training hasn't completed yet.
    fn check_write(&self, target: HartId, addr: u64, size: u32) -> bool;

    /// Whether `[addr, addr + size)` falls inside the board's DDR window,
    /// regardless of ownership — used by `ZeroInit` to defer a chunk until
    /// training completes (boundary property B3) without otherwise
    /// requiring a destination-owner check.
    fn in_ddr(&self, addr: u64, size: u32) -> bool;
}

/// A static, never-changing permission table — the simplest possible
/// [`PermissionOracle`], useful for boards with a fixed memory map and for
/// tests. Each target owns a fixed set of write windows; DDR is named
/// separately so any window overlapping it can be gated by training state
/// without every board having to repeat that check itself.
pub struct StaticPermissionMap {
    ddr_trained: bool,
    startup_complete: bool,
    permitted: [bool; crate::hart::N_APP],
    windows: [&'static [Window]; crate::hart::N_APP],
    ddr: Window,
}

impl StaticPermissionMap {
    pub const fn new(
        ddr_trained: bool,
        startup_complete: bool,
        permitted: [bool; crate::hart::N_APP],
        windows: [&'static [Window]; crate::hart::N_APP],
        ddr: Window,
    ) -> Self {
        Self { ddr_trained, startup_complete, permitted, windows, ddr }
    }

    /// All harts permitted, DDR already trained, startup barrier already
    /// released, and every target may write anywhere — the common case for
    /// tests that don't care about memory maps or startup sequencing.
    pub const fn always_permitted() -> Self {
        const EVERYTHING: [Window; 1] = [Window::new(0, u64::MAX)];
        Self::new(true, true, [true; crate::hart::N_APP], [&EVERYTHING; crate::hart::N_APP], Window::new(0, u64::MAX))
    }

    pub fn set_ddr_trained(&mut self, trained: bool) {
        self.ddr_trained = trained;
    }

    pub fn set_startup_complete(&mut self, complete: bool) {
        self.startup_complete = complete;
    }
}

impl PermissionOracle for StaticPermissionMap {
    fn ddr_trained(&self) -> bool {
        self.ddr_trained
    }

    fn startup_complete(&self) -> bool {
        self.startup_complete
    }

    fn hart_permitted(&self, hart: HartId) -> bool {
        self.permitted[hart.index()]
    }

    fn check_write(&self, target: HartId, addr: u64, size: u32) -> bool {
        if self.ddr.overlaps_range(addr, size) && !self.ddr_trained {
            return false;
        }
        self.windows[target.index()].iter().any(|w| w.contains_range(addr, size))
    }

    fn in_ddr(&self, addr: u64, size: u32) -> bool {
        self.ddr.overlaps_range(addr, size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn always_permitted_allows_every_hart_and_write() {
        let oracle = StaticPermissionMap::always_permitted();
        assert!(oracle.ddr_trained());
        for hart in HartId::ALL {
            assert!(oracle.hart_permitted(hart));
            assert!(oracle.check_write(hart, 0x8000_0000, 4096));
        }
    }

    #[test]
    fn static_map_can_exclude_a_hart() {
        const WINDOWS: [Window; 1] = [Window::new(0, u64::MAX)];
        let oracle = StaticPermissionMap::new(
            true,
            true,
            [true, false, true, true],
            [&WINDOWS; crate::hart::N_APP],
            Window::new(0, 0),
        );
        assert!(!oracle.hart_permitted(HartId::Hart2));
        assert!(oracle.hart_permitted(HartId::Hart1));
    }

    #[test]
    fn write_outside_every_window_is_denied() {
        const HART1_WINDOWS: [Window; 1] = [Window::new(0x8000_0000, 0x8010_0000)];
        const EMPTY: [Window; 0] = [];
        let oracle = StaticPermissionMap::new(
            true,
            true,
            [true; crate::hart::N_APP],
            [&HART1_WINDOWS, &EMPTY, &EMPTY, &EMPTY],
            Window::new(0x9000_0000, 0xA000_0000),
        );
        assert!(oracle.check_write(HartId::Hart1, 0x8000_1000, 512));
        assert!(!oracle.check_write(HartId::Hart1, 0x7FFF_F000, 512), "window doesn't cover this address");
        assert!(!oracle.check_write(HartId::Hart2, 0x8000_1000, 512), "hart 2 owns no windows here");
    }

    #[test]
    fn ddr_overlapping_write_is_denied_before_training() {
        const HART1_WINDOWS: [Window; 1] = [Window::new(0x9000_0000, 0xA000_0000)];
        const EMPTY: [Window; 0] = [];
        let mut oracle = StaticPermissionMap::new(
            false,
            true,
            [true; crate::hart::N_APP],
            [&HART1_WINDOWS, &EMPTY, &EMPTY, &EMPTY],
            Window::new(0x9000_0000, 0xA000_0000),
        );
        assert!(!oracle.check_write(HartId::Hart1, 0x9000_1000, 256), "DDR not trained yet");
        oracle.set_ddr_trained(true);
        assert!(oracle.check_write(HartId::Hart1, 0x9000_1000, 256));
    }
}
