// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! IPI coordination: allocating, delivering, and tracking acknowledgement of
//! the inter-hart messages the boot FSM sends as it walks a target through
//! PMP setup and OpenSBI init.

use crate::hart::HartId;

/// Sentinel returned by [`IpiCoordinator::alloc`] on failure and stored in a
/// [`crate::context::BootCoreContext`] slot that has no outstanding message.
pub const NO_OUTSTANDING: u32 = u32::MAX;

/// The four message kinds the boot FSM ever sends. Distinct from the
/// original service's single opaque `IPI_MESSAGE` union — each variant here
/// carries exactly the payload its handler needs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MessageKind {
    /// Ask `target` to program its PMP regions for the image about to run.
    PmpSetup,
    /// Ask `target` to run OpenSBI firmware init before jumping to its
    /// entry point. `ancillary` is the device-tree-style pointer discovered
    /// during that hart's (or its primary's) chunk download, if any.
    OpenSbiInit { entry_point: u64, priv_mode_raw: u32, ancillary: Option<u64> },
    /// Ask `target` to jump directly to `entry_point` (used when
    /// `SKIP_OPENSBI` is set).
    Goto { entry_point: u64, priv_mode_raw: u32, ancillary: Option<u64> },
    /// A remote-proc request naming the hart that should be (re)booted.
    BootRequest,
}

/// Collaborator responsible for the mechanics of message slots and hart
/// notification. The FSM only ever calls `alloc`, `deliver`,
/// `check_complete`, and `free` — it never inspects the underlying
/// transport.
pub trait IpiCoordinator {
    /// Reserves a message slot addressed to `target`. Returns `None` if no
    /// slot is available (mirrors the original's `NO_OUTSTANDING_IPIs`
    /// single-slot design generalized to an arbitrary-capacity allocator).
    fn alloc(&mut self, target: HartId) -> Option<u32>;

    /// Hands `message` to `target` using the slot returned by `alloc`.
    /// Returns `false` if delivery failed (e.g. target not present).
    fn deliver(&mut self, target: HartId, slot: u32, message: MessageKind) -> bool;

    /// Polls whether `target` has acknowledged the message in `slot`.
    fn check_complete(&mut self, target: HartId, slot: u32) -> bool;

    /// Releases `slot` back to the allocator once its ack has been
    /// observed (or its timeout has elapsed and the FSM is giving up).
    fn free(&mut self, target: HartId, slot: u32);

    /// Consumes a pending `BootRequest` addressed to `target`, if any.
    /// `Idle`'s handler polls this directly rather than allocating a slot —
    /// a boot request has no payload to acknowledge, so there is nothing to
    /// `alloc`/`deliver`/`free` a round trip for.
    fn consume_boot_request(&mut self, target: HartId) -> bool;
}


#[cfg(test)]
mod tests {
    use super::test_fixture::FakeIpi;
    use super::*;

    #[test]
    fn alloc_deliver_ack_free_round_trips() {
        let mut ipi = FakeIpi::new();
        let slot = ipi.alloc(HartId::Hart2).expect("slot available");
        assert!(ipi.deliver(HartId::Hart2, slot, MessageKind::PmpSetup));
        assert!(!ipi.check_complete(HartId::Hart2, slot));
        ipi.ack(HartId::Hart2, slot);
        assert!(ipi.check_complete(HartId::Hart2, slot));
        ipi.free(HartId::Hart2, slot);
        assert!(ipi.outstanding.get(&HartId::Hart2).is_none());
    }

    #[test]
    fn alloc_failure_yields_none() {
        let mut ipi = FakeIpi::new();
        ipi.fail_alloc = true;
        assert_eq!(ipi.alloc(HartId::Hart1), None);
    }
}
