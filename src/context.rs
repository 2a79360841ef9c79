// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Per-target runtime state and the shared context every FSM handler is
//! invoked with.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::clock::Ticks;
use crate::hart::{HartId, N_APP};
use crate::image::BootImage;
use crate::ipi::{MessageKind, NO_OUTSTANDING};

/// `bootComplete[]` values, matching the original service's plain 0/1
/// `atomic_t` array (`bootComplete[1..4]`, each written once by
/// `boot_complete_onEntry` and read by `boot_complete_handler`'s AND across
/// all four).
#[repr(u8)]
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BootCompleteStatus {
    NotStarted = 0,
    Complete = 1,
}

impl BootCompleteStatus {
    pub const fn from_u8(raw: u8) -> Self {
        match raw {
            0 => BootCompleteStatus::NotStarted,
            _ => BootCompleteStatus::Complete,
        }
    }
}

/// Working state one hart's FSM carries between handler invocations — the
/// data that must survive across repeated `step()` calls within a single
/// state (chunk cursors, the hart's own outstanding IPI slot, the timeout
/// deadline it's waiting against). Lives in the boot core, never in the
/// image or the collaborators.
pub struct RuntimeState {
    /// Index of the load or zero-init chunk currently being processed,
    /// relative to the table's own start for this target.
    pub chunk_index: u32,
    /// Bytes of the current chunk already copied or zeroed.
    pub chunk_bytes_done: u32,
    /// Outstanding IPI slot for this hart, or [`NO_OUTSTANDING`]. Also used
    /// by a primary to track its own self-entry message in `Wait`; peer
    /// slots live in each peer's own `RuntimeState`, written there directly
    /// by the primary's `OpenSBIInit` handler.
    pub ipi_slot: u32,
    /// What was sent in `ipi_slot`, if anything.
    pub ipi_message: Option<MessageKind>,
    /// Tick count `ipi_slot` was allocated at, for timeout comparison.
    pub ipi_started_at: Ticks,
    /// Bitmask of boot-set peers this hart (acting as primary) still owes
    /// an entry-point IPI or an ack to. Cleared bit by bit as each peer's
    /// ack is observed; only meaningful on the primary's own instance.
    pub peer_pending: u32,
    /// Per-peer auxiliary IPI slot, indexed by [`crate::hart::HartId::index`],
    /// allocated by a primary's `OpenSBIInit` handler as it walks its
    /// boot-set. Only the slots named by `peer_pending` are meaningful.
    pub msg_index_aux: [u32; crate::hart::N_APP],
    /// Index of the next boot-set peer `OpenSBIInit` has yet to visit,
    /// reset on entry to that state.
    pub peer_iterator: u32,
    /// Device-tree-style ancillary pointer discovered while downloading
    /// this target's load chunks (a chunk whose owner has the ancillary
    /// bit set), forwarded to the firmware-init IPI.
    pub ancillary_addr: Option<u64>,
    /// Tick the FSM last left `Idle` at, laid down by `Idle`'s on-entry
    /// side effect. Not read by any handler; kept for an embedding
    /// supervisor that wants to report per-hart boot latency.
    pub perf_lap: Ticks,
}

impl RuntimeState {
    pub const fn new() -> Self {
        Self {
            chunk_index: 0,
            chunk_bytes_done: 0,
            ipi_slot: NO_OUTSTANDING,
            ipi_message: None,
            ipi_started_at: 0,
            peer_pending: 0,
            msg_index_aux: [NO_OUTSTANDING; crate::hart::N_APP],
            peer_iterator: 0,
            ancillary_addr: None,
            perf_lap: 0,
        }
    }

    pub fn has_outstanding_ipi(&self) -> bool {
        self.ipi_slot != NO_OUTSTANDING
    }

    pub fn clear_ipi(&mut self) {
        self.ipi_slot = NO_OUTSTANDING;
        self.ipi_message = None;
    }
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared state every FSM handler call is invoked against: the registered
/// image (if any), each hart's completion status, and the crate-wide
/// boot-failure latch.
///
/// The registered image is required to live for the program's duration —
/// like the original service, which holds a raw pointer into flash/fixed RAM
/// for as long as the monitor hart runs — so [`BootImage`] is stored with a
/// `'static` borrow rather than threading a lifetime through every FSM type.
///
/// Atomics rather than a single mutex because independent harts' status
/// reads/writes must never block each other — only the registered image
/// pointer (set once, read many times) and each hart's own [`RuntimeState`]
/// need exclusive access, and those are guarded separately by callers (the
/// image via a `spin::Mutex<Option<...>>`, `RuntimeState` one per hart).
pub struct BootCoreContext {
    image: spin::Mutex<Option<BootImage<'static>>>,
    boot_complete: [AtomicU8; N_APP],
    status: [AtomicU32; N_APP],
    boot_fail: AtomicBool,
    /// Per-target "PMP already configured" latch (invariant 3). Written
    /// from the target hart in M-mode in the real firmware; an `AtomicBool`
    /// keeps the exactly-once check race-free even though this crate's own
    /// scheduler never runs two harts' steps concurrently.
    pmp_configured: [AtomicBool; N_APP],
}

impl BootCoreContext {
    pub const fn new() -> Self {
        const INIT_U8: AtomicU8 = AtomicU8::new(0);
        const INIT_U32: AtomicU32 = AtomicU32::new(0);
        const INIT_BOOL: AtomicBool = AtomicBool::new(false);
        Self {
            image: spin::Mutex::new(None),
            boot_complete: [INIT_U8; N_APP],
            status: [INIT_U32; N_APP],
            boot_fail: AtomicBool::new(false),
            pmp_configured: [INIT_BOOL; N_APP],
        }
    }

    /// Runs `init` exactly once for `hart`'s PMP setup (invariant 3,
    /// property R1): the first caller gets `init` invoked and `true`
    /// returned; every later caller observes the latch already set, skips
    /// `init`, and still gets `true` back (a repeated request is not an
    /// error).
    pub fn latch_pmp_setup(&self, hart: HartId, init: impl FnOnce()) -> bool {
        if self.pmp_configured[hart.index()].swap(true, Ordering::AcqRel) {
            return true;
        }
        init();
        true
    }

    pub fn pmp_configured(&self, hart: HartId) -> bool {
        self.pmp_configured[hart.index()].load(Ordering::Acquire)
    }

    pub fn register_image(&self, image: BootImage<'static>) {
        *self.image.lock() = Some(image);
    }

    pub fn image(&self) -> Option<BootImage<'static>> {
        *self.image.lock()
    }

    pub fn clear_image(&self) {
        *self.image.lock() = None;
    }

    pub fn boot_complete(&self, index: usize) -> BootCompleteStatus {
        BootCompleteStatus::from_u8(self.boot_complete[index].load(Ordering::Acquire))
    }

    pub fn set_boot_complete(&self, index: usize, status: BootCompleteStatus) {
        self.boot_complete[index].store(status as u8, Ordering::Release);
    }

    /// `true` once every one of the four harts' `bootComplete[]` entries has
    /// transitioned to [`BootCompleteStatus::Complete`]. A straight AND
    /// across all four, mirroring the original's `boot_complete_handler`
    /// (property P4: the event fires iff all four have transitioned).
    pub fn all_complete(&self) -> bool {
        self.boot_complete
            .iter()
            .map(|c| BootCompleteStatus::from_u8(c.load(Ordering::Acquire)))
            .all(|s| s == BootCompleteStatus::Complete)
    }

    pub fn status_raw(&self, index: usize) -> u32 {
        self.status[index].load(Ordering::Acquire)
    }

    pub fn set_status_raw(&self, index: usize, raw: u32) {
        self.status[index].store(raw, Ordering::Release);
    }

    pub fn boot_failed(&self) -> bool {
        self.boot_fail.load(Ordering::Acquire)
    }

    pub fn latch_boot_failure(&self) {
        self.boot_fail.store(true, Ordering::Release);
    }

    pub fn reset_boot_failure(&self) {
        self.boot_fail.store(false, Ordering::Release);
    }
}

impl Default for BootCoreContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_complete_requires_every_hart_to_have_transitioned() {
        let ctx = BootCoreContext::new();
        assert!(!ctx.all_complete(), "no hart has completed yet");

        ctx.set_boot_complete(0, BootCompleteStatus::Complete);
        assert!(!ctx.all_complete(), "three harts still at NotStarted");

        for i in 1..N_APP {
            ctx.set_boot_complete(i, BootCompleteStatus::Complete);
        }
        assert!(ctx.all_complete());
    }

    #[test]
    fn boot_failure_latches_until_reset() {
        let ctx = BootCoreContext::new();
        assert!(!ctx.boot_failed());
        ctx.latch_boot_failure();
        assert!(ctx.boot_failed());
        ctx.reset_boot_failure();
        assert!(!ctx.boot_failed());
    }

    #[test]
    fn pmp_setup_latches_exactly_once() {
        let ctx = BootCoreContext::new();
        let mut init_calls = 0;
        assert!(!ctx.pmp_configured(HartId::Hart1));
        assert!(ctx.latch_pmp_setup(HartId::Hart1, || init_calls += 1));
        assert!(ctx.latch_pmp_setup(HartId::Hart1, || init_calls += 1));
        assert_eq!(init_calls, 1, "second request must not reconfigure");
        assert!(ctx.pmp_configured(HartId::Hart1));
        assert!(!ctx.pmp_configured(HartId::Hart2), "latch is per-target");
    }
}
