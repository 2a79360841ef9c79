// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Boot lifecycle events: the small set of signals the core emits and
//! consumes, independent of any one hart's FSM state.

/// A lifecycle signal. Distinct from an [`crate::ipi::MessageKind`]: events
/// are broadcast/observed facts about the system, not addressed requests to
/// a specific hart.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Event {
    /// DDR has finished training; harts blocked on it in `Init` may proceed.
    /// Consumed, not produced, by this crate — surfaced here only so an
    /// embedding supervisor can feed it through a shared [`EventSource`]
    /// into whatever updates [`crate::permission::PermissionOracle`].
    DdrTrained,
    /// The startup barrier has released every hart to begin booting.
    /// Consumed, not produced (see [`Event::DdrTrained`]).
    StartupComplete,
    /// All four `bootComplete[]` entries have transitioned to set. Fires at
    /// most once per boot round; the sink, not the FSM, is responsible for
    /// that idempotence (each of the four instances observes the same
    /// global condition and notifies independently).
    BootComplete,
    /// A restart request was handled, successfully or not.
    PostBoot,
}

/// Collaborator the core polls for externally-originated events (e.g. a DDR
/// training completion interrupt, or the startup barrier release). This
/// crate's FSM itself reads those two preconditions through
/// [`crate::permission::PermissionOracle::ddr_trained`] and
/// [`crate::permission::PermissionOracle::startup_complete`] rather than
/// draining this queue directly — `EventSource` is the seam an embedding
/// supervisor uses to keep that oracle's view current.
pub trait EventSource {
    /// Returns the next pending event, if any, without blocking.
    fn poll(&mut self) -> Option<Event>;
}

/// Collaborator the core notifies as it produces events of its own (e.g. a
/// board's status LED or a GPIO UI behind the `gpio-ui` feature).
pub trait EventSink {
    fn notify(&mut self, event: Event);
}

/// An `EventSink` that discards every event, for boards and tests with no
/// interest in lifecycle notifications.
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn notify(&mut self, _event: Event) {}
}
