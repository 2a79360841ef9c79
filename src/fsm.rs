// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! The per-target boot state machine: state declarations, the step context
//! handlers run against, and the ten state handlers themselves.

use crate::clock::{has_elapsed, Clock, Ticks, ENTRY_ACK_TIMEOUT, PMP_ACK_TIMEOUT};
use crate::context::{BootCompleteStatus, BootCoreContext, RuntimeState};
use crate::copy::{CopyPrimitive, DEFAULT_SUB_CHUNK_SIZE};
use crate::crc::Crc32Fn;
use crate::domain::DomainRegistry;
use crate::events::{Event, EventSink};
use crate::hart::{HartFlags, HartId, PrivMode, N_APP};
use crate::image::BootImage;
use crate::ipi::{IpiCoordinator, MessageKind, NO_OUTSTANDING};
use crate::permission::PermissionOracle;

#[cfg(feature = "signing")]
use crate::validate::SignatureCheck;

/// Descriptor of one state: its human-readable name and the functions that
/// drive it. Deliberately untyped by the step-context type — see
/// `_StateTableData` in the macro expansion for why a `'static` table can't
/// carry a per-call borrow lifetime as a real generic parameter.
pub struct StateDescriptor {
    pub state: BootState,
    pub name: &'static str,
    pub on_entry: Option<SideEffect>,
    pub on_exit: Option<SideEffect>,
    pub handler: Handler,
}

/// A state handler: inspects and mutates the step context, returns the next
/// state (which may be the same state, meaning "stay here").
pub type Handler = for<'r> fn(&mut StepContext<'r>) -> BootState;
/// An entry/exit side effect: runs once on the corresponding transition edge
/// and never itself changes the state.
pub type SideEffect = for<'r> fn(&mut StepContext<'r>);

declare_state_table! {
    pub enum BootState [pub STATE_DESCS => StepContext<'_>] {
        Idle              => "Idle",             on_entry: Some(idle_on_entry),    on_exit: None, handler: idle_handler,
        Init              => "Init",              on_entry: Some(init_on_entry),    on_exit: None, handler: init_handler,
        SetupPmp          => "SetupPMP",           on_entry: Some(setup_pmp_on_entry), on_exit: None, handler: setup_pmp_handler,
        SetupPmpComplete  => "SetupPMPComplete",   on_entry: None,                   on_exit: None, handler: setup_pmp_complete_handler,
        DownloadChunks    => "DownloadChunks",     on_entry: Some(download_chunks_on_entry), on_exit: Some(download_chunks_on_exit), handler: download_chunks_handler,
        ZeroInit          => "ZeroInit",           on_entry: Some(zero_init_on_entry), on_exit: None, handler: zero_init_handler,
        OpenSbiInit       => "OpenSBIInit",        on_entry: Some(opensbi_init_on_entry), on_exit: Some(opensbi_init_on_exit), handler: opensbi_init_handler,
        Wait              => "Wait",               on_entry: Some(wait_on_entry),    on_exit: None, handler: wait_handler,
        Complete          => "Complete",           on_entry: Some(complete_on_entry), on_exit: None, handler: complete_handler,
        Error             => "Error",              on_entry: None,                   on_exit: None, handler: error_handler,
    }
}

/// Everything one call to [`StateMachine::step`] needs: the target's own
/// runtime bookkeeping, the shared boot-core context, the registered image,
/// and every collaborator. Built fresh for each call — nothing here outlives
/// the call that constructs it.
pub struct StepContext<'r> {
    pub hart: HartId,
    pub core: &'r BootCoreContext,
    pub runtime: &'r mut RuntimeState,
    /// `None` until a caller has registered an image; `Init` is the only
    /// handler that ever has to tolerate that.
    pub image: Option<BootImage<'static>>,
    pub domain: &'r mut dyn DomainRegistry,
    pub ipi: &'r mut dyn IpiCoordinator,
    pub permission: &'r dyn PermissionOracle,
    pub events: &'r mut dyn EventSink,
    pub clock: &'r dyn Clock,
    pub copier: &'r mut dyn CopyPrimitive,
    pub crc32: Crc32Fn,
    #[cfg(feature = "signing")]
    pub signature_check: &'r dyn SignatureCheck,
}

impl<'r> StepContext<'r> {
    fn hart_descriptor(&self) -> crate::image::HartDescriptor {
        self.image().hart(self.hart)
    }

    /// The registered image. Every handler but `Init`'s runs only once an
    /// image is known to be present (`Init` is the sole gate), so this is a
    /// logic error rather than a degraded-input case if it ever panics.
    fn image(&self) -> BootImage<'static> {
        self.image.expect("boot image is registered before any handler past Init runs")
    }
}

/// Drives one hart's state through repeated [`Self::step`] calls. Holds no
/// collaborator references between calls — those are supplied fresh each
/// time, so a `StateMachine` itself is trivially `Send`/`'static`.
pub struct StateMachine {
    hart: HartId,
    state: BootState,
    runtime: RuntimeState,
}

impl StateMachine {
    pub fn new(hart: HartId) -> Self {
        Self {
            hart,
            state: BootState::Idle,
            runtime: RuntimeState::new(),
        }
    }

    pub fn state(&self) -> BootState {
        self.state
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.runtime
    }

    /// Forces the target into `state` outside the normal transition path —
    /// used by the restart API to recover a hart after an external reset.
    pub fn force_state(&mut self, state: BootState) {
        self.runtime = RuntimeState::new();
        self.state = state;
    }

    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        core: &BootCoreContext,
        image: Option<BootImage<'static>>,
        domain: &mut dyn DomainRegistry,
        ipi: &mut dyn IpiCoordinator,
        permission: &dyn PermissionOracle,
        events: &mut dyn EventSink,
        clock: &dyn Clock,
        copier: &mut dyn CopyPrimitive,
        crc32: Crc32Fn,
        #[cfg(feature = "signing")] signature_check: &dyn SignatureCheck,
    ) -> BootState {
        let descriptor = &STATE_DESCS[self.state as usize];
        let mut ctx = StepContext {
            hart: self.hart,
            core,
            runtime: &mut self.runtime,
            image,
            domain,
            ipi,
            permission,
            events,
            clock,
            copier,
            crc32,
            #[cfg(feature = "signing")]
            signature_check,
        };

        let next = (descriptor.handler)(&mut ctx);
        if next != self.state {
            if let Some(on_exit) = descriptor.on_exit {
                on_exit(&mut ctx);
            }
            let next_descriptor = &STATE_DESCS[next as usize];
            if let Some(on_entry) = next_descriptor.on_entry {
                on_entry(&mut ctx);
            }
            self.state = next;
        }
        self.state
    }
}

/// Registers every member of `ctx.hart`'s boot-set with the domain
/// collaborator: a `SKIP_OPENSBI` peer is deregistered outright (invariant
/// 6), every other peer is (re-)registered as a plain domain member, and the
/// boot-set's primary additionally kicks off the domain itself. Shared
/// between `SetupPMP`'s on-entry (first registration) and
/// `DownloadChunks`'s on-exit (re-registration once a download pass may have
/// discovered ancillary data).
fn register_boot_set(ctx: &mut StepContext<'_>) {
    let image = ctx.image();
    let desc = image.hart(ctx.hart);
    let set_name = image.set_name();
    let mask = image.boot_set_mask(ctx.hart);
    let primary = image.boot_set_primary(ctx.hart);

    let mut hart_mask = 0u32;
    for peer in HartId::ALL {
        if mask & peer.mask_bit() == 0 {
            continue;
        }
        let peer_desc = image.hart(peer);
        if peer_desc.flags.contains(HartFlags::SKIP_OPENSBI) {
            ctx.domain.deregister_hart(peer);
        } else {
            ctx.domain.register_hart(peer, set_name, peer == primary);
            hart_mask |= peer.mask_bit();
        }
    }

    if ctx.hart == primary && desc.entry_point != 0 && !desc.flags.contains(HartFlags::SKIP_OPENSBI) {
        ctx.domain.register_boot_hart(
            ctx.hart,
            set_name,
            hart_mask,
            desc.priv_mode().unwrap_or(PrivMode::Supervisor),
            desc.entry_point,
            ancillary_or_bundled(ctx.runtime.ancillary_addr),
            desc.flags.contains(HartFlags::ALLOW_COLD_REBOOT),
            desc.flags.contains(HartFlags::ALLOW_WARM_REBOOT),
        );
    }
}

/// Falls back to the bundled device-tree blob (`provide-dtb`) when no
/// ancillary chunk was discovered during download; a no-op otherwise.
fn ancillary_or_bundled(ancillary: Option<u64>) -> Option<u64> {
    #[cfg(feature = "provide-dtb")]
    {
        ancillary.or_else(|| Some(crate::dtb::bundled_addr()))
    }
    #[cfg(not(feature = "provide-dtb"))]
    {
        ancillary
    }
}

/// Builds the entry-point message for `target` per its own `SKIP_OPENSBI`
/// flag, carrying whatever ancillary pointer has been discovered so far.
fn entry_message(desc: &crate::image::HartDescriptor, ancillary: Option<u64>) -> MessageKind {
    let ancillary = ancillary_or_bundled(ancillary);
    if desc.flags.contains(HartFlags::SKIP_OPENSBI) {
        MessageKind::Goto { entry_point: desc.entry_point, priv_mode_raw: desc.priv_mode_raw, ancillary }
    } else {
        MessageKind::OpenSbiInit { entry_point: desc.entry_point, priv_mode_raw: desc.priv_mode_raw, ancillary }
    }
}

fn idle_on_entry(ctx: &mut StepContext<'_>) {
    ctx.runtime.perf_lap = ctx.clock.now();
}

/// Parks here until a `BOOT_REQUEST` IPI names this target, mirroring the
/// original service's `IPI_ConsumeIntent` poll.
fn idle_handler(ctx: &mut StepContext<'_>) -> BootState {
    if ctx.ipi.consume_boot_request(ctx.hart) {
        BootState::Init
    } else {
        BootState::Idle
    }
}

fn init_on_entry(ctx: &mut StepContext<'_>) {
    ctx.core.set_status_raw(ctx.hart.index(), BootState::Init as u32);
}

/// Gates solely on image presence and the two startup preconditions.
/// Validation itself is a public-API concern (`crate::api::validate_image`),
/// run once up front by whatever registers the image or restarts a core —
/// not repeated on every `Init` tick.
fn init_handler(ctx: &mut StepContext<'_>) -> BootState {
    if ctx.image.is_none() {
        return BootState::Error;
    }
    if ctx.permission.ddr_trained() && ctx.permission.startup_complete() {
        BootState::SetupPmp
    } else {
        BootState::Init
    }
}

fn setup_pmp_on_entry(ctx: &mut StepContext<'_>) {
    register_boot_set(ctx);
}

/// Allocates and delivers a `PmpSetup` message, then hands off to
/// `SetupPMPComplete` to poll for the ack — the original's
/// `HSS_Boot_PMPSetupRequest`/`boot_setup_pmp_complete_handler` split.
fn setup_pmp_handler(ctx: &mut StepContext<'_>) -> BootState {
    match ctx.ipi.alloc(ctx.hart) {
        None => BootState::SetupPmp,
        Some(slot) => {
            if !ctx.ipi.deliver(ctx.hart, slot, MessageKind::PmpSetup) {
                ctx.ipi.free(ctx.hart, slot);
                return BootState::SetupPmp;
            }
            ctx.runtime.ipi_slot = slot;
            ctx.runtime.ipi_message = Some(MessageKind::PmpSetup);
            ctx.runtime.ipi_started_at = ctx.clock.now();
            BootState::SetupPmpComplete
        }
    }
}

fn setup_pmp_complete_handler(ctx: &mut StepContext<'_>) -> BootState {
    if ctx.ipi.check_complete(ctx.hart, ctx.runtime.ipi_slot) {
        ctx.ipi.free(ctx.hart, ctx.runtime.ipi_slot);
        ctx.runtime.clear_ipi();
        let desc = ctx.hart_descriptor();
        return if desc.flags.contains(HartFlags::SKIP_AUTOBOOT) {
            BootState::Complete
        } else {
            BootState::ZeroInit
        };
    }

    if has_elapsed(ctx.clock, ctx.runtime.ipi_started_at, PMP_ACK_TIMEOUT) {
        ctx.ipi.free(ctx.hart, ctx.runtime.ipi_slot);
        ctx.runtime.clear_ipi();
        return BootState::Error;
    }

    BootState::SetupPmpComplete
}

fn zero_init_on_entry(ctx: &mut StepContext<'_>) {
    ctx.runtime.chunk_index = 0;
    ctx.runtime.chunk_bytes_done = 0;
}

/// Zero-fills this hart's zero-init chunks, one sub-chunk at a time. The
/// zero-init table isn't per-hart in the image, so every target walks the
/// whole table, skipping one entry per tick when it isn't theirs, and
/// deferring (without advancing) a chunk that lands in untrained DDR
/// (boundary property B3).
fn zero_init_handler(ctx: &mut StepContext<'_>) -> BootState {
    let image = ctx.image();
    let mut cursor = image.zi_chunks();
    for _ in 0..ctx.runtime.chunk_index {
        cursor.advance();
    }

    let chunk = match cursor.peek() {
        None => {
            ctx.runtime.chunk_index = 0;
            ctx.runtime.chunk_bytes_done = 0;
            return BootState::DownloadChunks;
        }
        Some(chunk) if chunk.is_sentinel() => {
            ctx.runtime.chunk_index = 0;
            ctx.runtime.chunk_bytes_done = 0;
            return BootState::DownloadChunks;
        }
        Some(chunk) => chunk,
    };

    if chunk.owner != Some(ctx.hart) {
        ctx.runtime.chunk_index += 1;
        return BootState::ZeroInit;
    }

    if ctx.permission.in_ddr(chunk.exec_addr, chunk.size) && !ctx.permission.ddr_trained() {
        return BootState::ZeroInit;
    }

    #[cfg(feature = "debug-chunk-downloads")]
    if ctx.runtime.chunk_bytes_done == 0 {
        log::debug!("{}: ziChunk {}@{:#x}, {} bytes", ctx.hart, ctx.runtime.chunk_index, chunk.exec_addr, chunk.size);
    }

    let remaining = chunk.size - ctx.runtime.chunk_bytes_done;
    let step_len = remaining.min(DEFAULT_SUB_CHUNK_SIZE as u32);
    ctx.copier.zero(chunk.exec_addr + ctx.runtime.chunk_bytes_done as u64, step_len as usize);

    ctx.runtime.chunk_bytes_done += step_len;
    if ctx.runtime.chunk_bytes_done >= chunk.size {
        ctx.runtime.chunk_index += 1;
        ctx.runtime.chunk_bytes_done = 0;
    }
    BootState::ZeroInit
}

fn download_chunks_on_entry(ctx: &mut StepContext<'_>) {
    ctx.runtime.chunk_index = 0;
    ctx.runtime.chunk_bytes_done = 0;
}

/// Copies the target's load chunks a sub-chunk at a time (property R1: a
/// repeated call with the same `chunk_index`/`chunk_bytes_done` just
/// re-derives the same cursor position and keeps going). A chunk owned by
/// another target is skipped with a warning; one this target owns but isn't
/// permitted to write is skipped with an error — both advance past the
/// chunk without copying.
fn download_chunks_handler(ctx: &mut StepContext<'_>) -> BootState {
    let desc = ctx.hart_descriptor();
    if desc.num_chunks == 0 {
        return BootState::Complete;
    }

    let image = ctx.image();
    let mut cursor = image.load_chunks(ctx.hart);
    for _ in 0..ctx.runtime.chunk_index {
        cursor.advance();
    }

    let chunk = match cursor.peek() {
        None => return BootState::OpenSbiInit,
        Some(chunk) => chunk,
    };

    let (owner, ancillary) = chunk.owner();
    if owner != Some(ctx.hart) {
        log::warn!("{}: skipping chunk owned by a different target", ctx.hart);
        ctx.runtime.chunk_index += 1;
        ctx.runtime.chunk_bytes_done = 0;
        return BootState::DownloadChunks;
    }
    if !ctx.permission.check_write(ctx.hart, chunk.exec_addr, chunk.size) {
        log::error!("{}: permission denied for chunk at {:#x}", ctx.hart, chunk.exec_addr);
        ctx.runtime.chunk_index += 1;
        ctx.runtime.chunk_bytes_done = 0;
        return BootState::DownloadChunks;
    }

    #[cfg(feature = "debug-chunk-downloads")]
    if ctx.runtime.chunk_bytes_done == 0 {
        log::debug!(
            "{}: chunk {}@{:#x}->{:#x}, {} bytes",
            ctx.hart, ctx.runtime.chunk_index, chunk.load_addr, chunk.exec_addr, chunk.size
        );
    }

    let remaining = chunk.size - ctx.runtime.chunk_bytes_done;
    let step_len = remaining.min(DEFAULT_SUB_CHUNK_SIZE as u32);
    let src = image.bytes_at(chunk.load_addr, (ctx.runtime.chunk_bytes_done + step_len) as usize);
    let src_slice = &src[ctx.runtime.chunk_bytes_done as usize..];
    ctx.copier.copy(chunk.exec_addr + ctx.runtime.chunk_bytes_done as u64, src_slice, step_len as usize);

    if ancillary && ctx.runtime.ancillary_addr.is_none() {
        ctx.runtime.ancillary_addr = Some(chunk.exec_addr);
    }

    ctx.runtime.chunk_bytes_done += step_len;
    if ctx.runtime.chunk_bytes_done >= chunk.size {
        ctx.runtime.chunk_index += 1;
        ctx.runtime.chunk_bytes_done = 0;
    }
    BootState::DownloadChunks
}

fn download_chunks_on_exit(ctx: &mut StepContext<'_>) {
    register_boot_set(ctx);
}

fn opensbi_init_on_entry(ctx: &mut StepContext<'_>) {
    ctx.core.set_status_raw(ctx.hart.index(), BootState::OpenSbiInit as u32);
    ctx.runtime.peer_iterator = 0;
}

/// Only the primary of a boot-set (the one with both chunks and a non-zero
/// entry point) delivers entry-point IPIs to its peers; every hart still
/// walks this state so its own on-exit can deliver to itself. A peer-only
/// target (has an entry point but no chunks of its own) has nothing to
/// iterate and moves straight on, relying on its primary's delivery to it.
fn opensbi_init_handler(ctx: &mut StepContext<'_>) -> BootState {
    let desc = ctx.hart_descriptor();
    if !desc.is_primary_candidate() {
        return BootState::Wait;
    }

    let idx = ctx.runtime.peer_iterator as usize;
    if idx >= N_APP {
        return BootState::Wait;
    }

    let peer = HartId::from_index(idx);
    ctx.runtime.peer_iterator += 1;
    if peer == ctx.hart {
        return BootState::OpenSbiInit;
    }

    let image = ctx.image();
    let peer_desc = image.hart(peer);
    if peer_desc.entry_point != desc.entry_point {
        return BootState::OpenSbiInit;
    }

    let message = entry_message(&peer_desc, ctx.runtime.ancillary_addr);
    match ctx.ipi.alloc(peer) {
        None => {
            // Retry this same peer next tick.
            ctx.runtime.peer_iterator -= 1;
            BootState::OpenSbiInit
        }
        Some(slot) => {
            if !ctx.ipi.deliver(peer, slot, message) {
                ctx.ipi.free(peer, slot);
                return BootState::Error;
            }
            ctx.runtime.msg_index_aux[peer.index()] = slot;
            ctx.runtime.peer_pending |= peer.mask_bit();
            BootState::OpenSbiInit
        }
    }
}

/// Delivers the entry-point message to the target itself, closing the
/// boot-set (property: peers are always notified before the primary).
fn opensbi_init_on_exit(ctx: &mut StepContext<'_>) {
    let desc = ctx.hart_descriptor();
    if desc.entry_point != 0 {
        let message = entry_message(&desc, ctx.runtime.ancillary_addr);
        if let Some(slot) = ctx.ipi.alloc(ctx.hart) {
            if ctx.ipi.deliver(ctx.hart, slot, message) {
                ctx.runtime.ipi_slot = slot;
                ctx.runtime.ipi_message = Some(message);
            } else {
                ctx.ipi.free(ctx.hart, slot);
            }
        }
    }
    ctx.runtime.ipi_started_at = ctx.clock.now();
}

fn wait_on_entry(ctx: &mut StepContext<'_>) {
    ctx.runtime.ipi_started_at = ctx.clock.now();
}

/// Polls every outstanding auxiliary slot (peers notified on `OpenSBIInit`'s
/// handler) plus this target's own self-entry slot (from its on-exit); all
/// acked moves on to `Complete`, a 5 s silence frees everything and moves to
/// `Error`.
fn wait_handler(ctx: &mut StepContext<'_>) -> BootState {
    let mut all_acked = true;

    for peer in HartId::ALL {
        if ctx.runtime.peer_pending & peer.mask_bit() != 0 {
            let slot = ctx.runtime.msg_index_aux[peer.index()];
            if ctx.ipi.check_complete(peer, slot) {
                ctx.ipi.free(peer, slot);
                ctx.runtime.msg_index_aux[peer.index()] = NO_OUTSTANDING;
                ctx.runtime.peer_pending &= !peer.mask_bit();
            } else {
                all_acked = false;
            }
        }
    }

    if ctx.runtime.has_outstanding_ipi() {
        if ctx.ipi.check_complete(ctx.hart, ctx.runtime.ipi_slot) {
            ctx.ipi.free(ctx.hart, ctx.runtime.ipi_slot);
            ctx.runtime.clear_ipi();
        } else {
            all_acked = false;
        }
    }

    if all_acked {
        ctx.core.set_status_raw(ctx.hart.index(), BootState::Complete as u32);
        return BootState::Complete;
    }

    if has_elapsed(ctx.clock, ctx.runtime.ipi_started_at, ENTRY_ACK_TIMEOUT) {
        for peer in HartId::ALL {
            if ctx.runtime.peer_pending & peer.mask_bit() != 0 {
                ctx.ipi.free(peer, ctx.runtime.msg_index_aux[peer.index()]);
            }
        }
        ctx.runtime.peer_pending = 0;
        if ctx.runtime.has_outstanding_ipi() {
            ctx.ipi.free(ctx.hart, ctx.runtime.ipi_slot);
            ctx.runtime.clear_ipi();
        }
        return BootState::Error;
    }

    BootState::Wait
}

fn complete_on_entry(ctx: &mut StepContext<'_>) {
    ctx.core.set_boot_complete(ctx.hart.index(), BootCompleteStatus::Complete);
    ctx.core.set_status_raw(ctx.hart.index(), BootState::Complete as u32);
}

/// Fires `BOOT_COMPLETE` and returns to `Idle` once every target's
/// `bootComplete[]` entry is set. Every instance reaching `Complete`
/// evaluates the same global condition and notifies independently; the
/// event sink is responsible for treating repeats as idempotent (property
/// P4 / §5 ordering notes).
fn complete_handler(ctx: &mut StepContext<'_>) -> BootState {
    if ctx.core.all_complete() {
        ctx.events.notify(Event::BootComplete);
        return BootState::Idle;
    }
    BootState::Complete
}

/// Latches the crate-wide failure flag and folds straight into `Complete` so
/// `bootComplete[]` can still settle (§7 design philosophy): a failed target
/// must not block the other three from being recognized as done.
fn error_handler(ctx: &mut StepContext<'_>) -> BootState {
    ctx.core.latch_boot_failure();
    ctx.core.set_status_raw(ctx.hart.index(), BootState::Error as u32);
    BootState::Complete
}

/// Resolves the state a hart forced by [`crate::api::BootCore::restart_core`]
/// or [`crate::api::BootCore::restart_cores_by_bitmask`] should land in.
/// Mirrors the original's source-state-dependent restart mapping: a hart
/// sitting in `OpenSBIInit` stays there (a restart mid-handoff just retries
/// the handoff); one in `SetupPMPComplete`, `Idle`, or `Init` restarts clean
/// at `Init`; any other state is forced to `Init` too, but the `bool` return
/// flags that this was an anomalous source state so the caller can log it —
/// a restart request is never outright rejected (property: recovery always
/// succeeds).
pub fn restart_target_state(current: BootState) -> (BootState, bool) {
    match current {
        BootState::SetupPmpComplete | BootState::Idle | BootState::Init => (BootState::Init, false),
        BootState::OpenSbiInit => (BootState::OpenSbiInit, false),
        _ => (BootState::Init, true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FakeClock;
    use crate::domain::NullDomainRegistry;
    use crate::events::NullEventSink;
    use crate::image::test_fixture::ImageBuilder;
    use crate::ipi::test_fixture::FakeIpi;
    use crate::permission::StaticPermissionMap;

    fn crc32(bytes: &[u8]) -> u32 {
        crc32fast::hash(bytes)
    }

    struct NullCopier;
    impl CopyPrimitive for NullCopier {
        fn copy(&mut self, _dst: u64, _src: &[u8], _len: usize) {}
        fn zero(&mut self, _dst: u64, _len: usize) {}
    }

    #[allow(clippy::too_many_arguments)]
    fn step(
        sm: &mut StateMachine,
        core: &BootCoreContext,
        image: Option<BootImage<'static>>,
        domain: &mut dyn DomainRegistry,
        ipi: &mut dyn IpiCoordinator,
        permission: &dyn PermissionOracle,
        events: &mut dyn EventSink,
        clock: &dyn Clock,
        copier: &mut dyn CopyPrimitive,
    ) -> BootState {
        sm.step(core, image, domain, ipi, permission, events, clock, copier, crc32)
    }

    #[test]
    fn idle_stays_put_until_a_boot_request_arrives() {
        let core = BootCoreContext::new();
        let mut sm = StateMachine::new(HartId::Hart1);
        let mut domain = NullDomainRegistry;
        let mut ipi = FakeIpi::new();
        let permission = StaticPermissionMap::always_permitted();
        let mut events = NullEventSink;
        let clock = FakeClock::new();
        let mut copier = NullCopier;

        step(&mut sm, &core, None, &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::Idle, "no boot request yet");

        ipi.request_boot(HartId::Hart1);
        step(&mut sm, &core, None, &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::Init);
    }

    #[test]
    fn init_without_an_image_moves_to_error() {
        let core = BootCoreContext::new();
        let mut sm = StateMachine::new(HartId::Hart1);
        sm.force_state(BootState::Init);
        let mut domain = NullDomainRegistry;
        let mut ipi = FakeIpi::new();
        let permission = StaticPermissionMap::always_permitted();
        let mut events = NullEventSink;
        let clock = FakeClock::new();
        let mut copier = NullCopier;

        step(&mut sm, &core, None, &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::Error);
    }

    #[test]
    fn full_boot_sequence_with_a_single_chunk_reaches_complete() {
        let mut builder = ImageBuilder::new();
        builder.harts[0].entry_point = 0x8000_0000;
        builder.harts[0].priv_mode_raw = 1;
        builder.harts[0].num_chunks = 1;
        builder.harts[0].first_chunk = 0;
        builder.harts[0].last_chunk = 0;
        builder.load_chunks.push((0x8000_0000, 0x100, 1, 512));
        let bytes = builder.build(crc32);
        let image: BootImage<'static> = BootImage::from_bytes(Box::leak(bytes.into_boxed_slice()));

        let core = BootCoreContext::new();
        core.register_image(image);
        let mut sm = StateMachine::new(HartId::Hart1);
        let mut domain = NullDomainRegistry;
        let mut ipi = FakeIpi::new();
        let permission = StaticPermissionMap::always_permitted();
        let mut events = NullEventSink;
        let clock = FakeClock::new();
        let mut copier = NullCopier;

        ipi.request_boot(HartId::Hart1);
        assert_eq!(sm.state(), BootState::Idle);
        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::Init);
        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::SetupPmp);

        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::SetupPmpComplete, "allocation+delivery hands off to polling immediately");
        let slot = sm.runtime().ipi_slot;
        ipi.ack(HartId::Hart1, slot);
        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::ZeroInit);

        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::DownloadChunks, "no ZI chunks for this target");

        // 512 bytes at a 256-byte sub-chunk quantum: two ticks to drain.
        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::DownloadChunks);
        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::OpenSbiInit, "chunk fully copied, hand off to firmware init");

        // Primary with no peers: the iterator exhausts immediately, and
        // on-exit delivers the self message on the transition to Wait.
        for _ in 0..N_APP {
            step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        }
        assert_eq!(sm.state(), BootState::Wait);
        let entry_slot = sm.runtime().ipi_slot;
        ipi.ack(HartId::Hart1, entry_slot);
        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::Complete);
        assert_eq!(core.boot_complete(HartId::Hart1.index()), BootCompleteStatus::Complete);
    }

    #[test]
    fn zero_chunks_skips_straight_to_complete() {
        let mut builder = ImageBuilder::new();
        builder.harts[0].entry_point = 0x8000_0000;
        let bytes = builder.build(crc32);
        let image: BootImage<'static> = BootImage::from_bytes(Box::leak(bytes.into_boxed_slice()));

        let core = BootCoreContext::new();
        core.register_image(image);
        let mut sm = StateMachine::new(HartId::Hart1);
        sm.force_state(BootState::DownloadChunks);
        let mut domain = NullDomainRegistry;
        let mut ipi = FakeIpi::new();
        let permission = StaticPermissionMap::always_permitted();
        let mut events = NullEventSink;
        let clock = FakeClock::new();
        let mut copier = NullCopier;

        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::Complete, "a target with no chunks never sends its own entry IPI");
    }

    #[test]
    fn pmp_ack_timeout_moves_to_error() {
        let builder = ImageBuilder::new();
        let bytes = builder.build(crc32);
        let image: BootImage<'static> = BootImage::from_bytes(Box::leak(bytes.into_boxed_slice()));

        let core = BootCoreContext::new();
        core.register_image(image);
        let mut sm = StateMachine::new(HartId::Hart1);
        sm.force_state(BootState::SetupPmp);

        let mut domain = NullDomainRegistry;
        let mut ipi = FakeIpi::new();
        let permission = StaticPermissionMap::always_permitted();
        let mut events = NullEventSink;
        let clock = FakeClock::new();
        let mut copier = NullCopier;

        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::SetupPmpComplete);
        clock.advance(PMP_ACK_TIMEOUT);
        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::Error);
        assert!(core.boot_failed());
        // Error folds straight into Complete so bootComplete[] can settle.
        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::Complete);
    }

    #[test]
    fn skip_autoboot_parks_in_complete_after_pmp_setup() {
        let mut builder = ImageBuilder::new();
        builder.harts[0].flags = crate::hart::HartFlags::SKIP_AUTOBOOT;
        let bytes = builder.build(crc32);
        let image: BootImage<'static> = BootImage::from_bytes(Box::leak(bytes.into_boxed_slice()));

        let core = BootCoreContext::new();
        core.register_image(image);
        let mut sm = StateMachine::new(HartId::Hart1);
        sm.force_state(BootState::SetupPmp);

        let mut domain = NullDomainRegistry;
        let mut ipi = FakeIpi::new();
        let permission = StaticPermissionMap::always_permitted();
        let mut events = NullEventSink;
        let clock = FakeClock::new();
        let mut copier = NullCopier;

        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        let slot = sm.runtime().ipi_slot;
        ipi.ack(HartId::Hart1, slot);
        step(&mut sm, &core, Some(image), &mut domain, &mut ipi, &permission, &mut events, &clock, &mut copier);
        assert_eq!(sm.state(), BootState::Complete);
    }

    #[test]
    fn restart_mapping_never_rejects_and_recovers_anomalous_states() {
        assert_eq!(restart_target_state(BootState::Idle), (BootState::Init, false));
        assert_eq!(restart_target_state(BootState::Init), (BootState::Init, false));
        assert_eq!(restart_target_state(BootState::SetupPmpComplete), (BootState::Init, false));
        assert_eq!(restart_target_state(BootState::OpenSbiInit), (BootState::OpenSbiInit, false));
        assert_eq!(restart_target_state(BootState::DownloadChunks), (BootState::Init, true));
        assert_eq!(restart_target_state(BootState::Complete), (BootState::Init, true), "not in the original's clean-restart set");
    }
}
