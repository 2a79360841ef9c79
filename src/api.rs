// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Public control API: the small set of entry points an outer supervisor (or
//! an IPI handler running on the orchestrator hart) calls into this crate
//! with. Everything else — the state machines themselves — is driven purely
//! by repeated calls to [`BootCore::step`] or direct [`fsm::StateMachine`]
//! access.

use crate::clock::Clock;
use crate::context::BootCoreContext;
use crate::copy::CopyPrimitive;
use crate::crc::Crc32Fn;
use crate::domain::DomainRegistry;
use crate::error::{ErrorKind, Result};
use crate::events::{Event, EventSink};
use crate::fsm::{self, BootState, StateMachine};
use crate::hart::{HartFlags, HartId, N_APP};
use crate::image::{BootImage, HEADER_LEN};
use crate::ipi::IpiCoordinator;
use crate::permission::PermissionOracle;
use crate::validate::{self, MagicStatus};

#[cfg(feature = "signing")]
use crate::validate::SignatureCheck;

#[cfg(feature = "gpio-ui")]
use crate::gpio_ui::GpioUiReporter;

/// Source a restart request names: either one specific hart, or every hart
/// (mirrors the original's `HSS_HART_ALL` sentinel value).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RestartSource {
    Hart(HartId),
    All,
}

/// Owns the four per-hart state machines and the shared boot-core context,
/// and exposes the operations an outer supervisor drives booting with.
/// Collaborators are borrowed per call rather than stored, matching
/// [`StateMachine::step`]'s own shape — a `BootCore` is therefore `Send` and
/// holds nothing that outlives one call.
pub struct BootCore {
    context: BootCoreContext,
    machines: [StateMachine; N_APP],
}

impl BootCore {
    pub fn new() -> Self {
        Self {
            context: BootCoreContext::new(),
            machines: HartId::ALL.map(StateMachine::new),
        }
    }

    pub fn context(&self) -> &BootCoreContext {
        &self.context
    }

    pub fn machine(&self, hart: HartId) -> &StateMachine {
        &self.machines[hart.index()]
    }

    /// Stores the image pointer with no validation, matching the original's
    /// `HSS_BootInit` — callers are expected to have validated it themselves
    /// (or to rely on [`Self::restart_core`], which always does).
    pub fn register_image(&self, image: BootImage<'static>) {
        self.context.register_image(image);
    }

    pub fn verify_magic(&self, image: &BootImage<'_>) -> MagicStatus {
        validate::verify_magic(image)
    }

    pub fn validate_image(
        &self,
        image: &BootImage<'_>,
        crc32: Crc32Fn,
        #[cfg(feature = "signing")] signature_check: &dyn SignatureCheck,
        #[cfg(feature = "gpio-ui")] gpio_ui: &mut dyn GpioUiReporter,
    ) -> Result<()> {
        let mut scratch = [0u8; HEADER_LEN];
        validate::validate_image(
            image,
            &mut scratch,
            crc32,
            #[cfg(feature = "signing")]
            signature_check,
            #[cfg(feature = "gpio-ui")]
            gpio_ui,
        )
    }

    /// Runs one tick of `hart`'s state machine against the given collaborator
    /// set. The outer scheduler is expected to call this once per hart per
    /// round (§4.6.3: each handler does O(1) non-blocking work).
    #[allow(clippy::too_many_arguments)]
    pub fn step(
        &mut self,
        hart: HartId,
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
        self.machines[hart.index()].step(
            &self.context,
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
        )
    }

    /// `true` iff `target`'s own image flags ask to skip auto-boot after PMP
    /// setup.
    pub fn skip_boot_is_set(&self, image: &BootImage<'_>, target: HartId) -> bool {
        image.hart(target).flags.contains(HartFlags::SKIP_AUTOBOOT)
    }

    /// Runs `init` exactly once for `target`'s PMP setup (property R1),
    /// thin wrapper over [`BootCoreContext::latch_pmp_setup`] for the
    /// target-side caller (typically running on the target hart itself in
    /// M-mode, per the original's `HSS_Boot_PMPSetupCompleteHandler`).
    pub fn pmp_setup_handler(&self, target: HartId, init_pmp: impl FnOnce()) -> bool {
        self.context.latch_pmp_setup(target, init_pmp)
    }

    /// Allocates and delivers a `PmpSetup` message to `target`, freeing the
    /// slot again on delivery failure. Returns the allocated slot through
    /// `idx` on success, mirroring the original's `&idx` out-parameter.
    pub fn pmp_setup_request(&self, target: HartId, ipi: &mut dyn IpiCoordinator, idx: &mut u32) -> bool {
        let Some(slot) = ipi.alloc(target) else {
            return false;
        };
        if !ipi.deliver(target, slot, crate::ipi::MessageKind::PmpSetup) {
            ipi.free(target, slot);
            return false;
        }
        *idx = slot;
        true
    }

    /// Restarts `source` (a single hart, or every hart for [`RestartSource::All`]).
    /// A single-hart request is expanded to its boot-set before restarting
    /// (§4.7): a peer never restarts alone.
    pub fn restart_core(
        &mut self,
        source: RestartSource,
        image: &BootImage<'_>,
        crc32: Crc32Fn,
        events: &mut dyn EventSink,
        #[cfg(feature = "signing")] signature_check: &dyn SignatureCheck,
        #[cfg(feature = "gpio-ui")] gpio_ui: &mut dyn GpioUiReporter,
    ) -> Result<()> {
        let mask = match source {
            RestartSource::All => HartId::ALL.iter().map(|h| h.mask_bit()).fold(0u32, |a, b| a | b),
            RestartSource::Hart(hart) => image.boot_set_mask(hart),
        };
        self.restart_cores_by_bitmask(
            mask,
            image,
            crc32,
            events,
            #[cfg(feature = "signing")]
            signature_check,
            #[cfg(feature = "gpio-ui")]
            gpio_ui,
        )
    }

    /// For every set bit, expands to that hart's boot-set, validates the
    /// image once, and forces each selected machine into a legal restart
    /// state (never rejecting — [`fsm::restart_target_state`]). Fires
    /// `PostBoot` once, whether or not every bit named a valid hart.
    pub fn restart_cores_by_bitmask(
        &mut self,
        mask: u32,
        image: &BootImage<'_>,
        crc32: Crc32Fn,
        events: &mut dyn EventSink,
        #[cfg(feature = "signing")] signature_check: &dyn SignatureCheck,
        #[cfg(feature = "gpio-ui")] gpio_ui: &mut dyn GpioUiReporter,
    ) -> Result<()> {
        self.validate_image(
            image,
            crc32,
            #[cfg(feature = "signing")]
            signature_check,
            #[cfg(feature = "gpio-ui")]
            gpio_ui,
        )?;

        let mut expanded = 0u32;
        for hart in HartId::ALL {
            if mask & hart.mask_bit() != 0 {
                expanded |= image.boot_set_mask(hart);
            }
        }

        for hart in HartId::ALL {
            if expanded & hart.mask_bit() == 0 {
                continue;
            }
            let machine = &mut self.machines[hart.index()];
            let (next, anomalous) = fsm::restart_target_state(machine.state());
            if anomalous {
                log::warn!("{}: restart requested from a non-restartable state, forcing Init", hart);
            }
            machine.force_state(next);
        }

        events.notify(Event::PostBoot);
        Ok(())
    }

    /// Handles an inbound remote-proc IPI naming `target` for a (re)boot:
    /// forces `target`'s machine straight to `OpenSBIInit` (skipping the rest
    /// of the normal sequence, since a remote-proc request implies the image
    /// is already resident and PMP already configured) and then restarts it
    /// through the normal API so its boot-set peers come along too.
    #[cfg(feature = "remote-proc")]
    pub fn ipi_handler(
        &mut self,
        target: HartId,
        image: &BootImage<'_>,
        crc32: Crc32Fn,
        events: &mut dyn EventSink,
        #[cfg(feature = "signing")] signature_check: &dyn SignatureCheck,
        #[cfg(feature = "gpio-ui")] gpio_ui: &mut dyn GpioUiReporter,
    ) -> Result<()> {
        self.machines[target.index()].force_state(BootState::OpenSbiInit);
        self.restart_core(
            RestartSource::Hart(target),
            image,
            crc32,
            events,
            #[cfg(feature = "signing")]
            signature_check,
            #[cfg(feature = "gpio-ui")]
            gpio_ui,
        )
    }

    /// Alternate single-hart boot flow used instead of the whole per-target
    /// FSM when `custom-boot-flow` is enabled: finds the one hart in the
    /// image carrying load chunks, zero-fills and downloads its chunks
    /// synchronously (no cooperative yielding — the original's
    /// `HSS_Boot_Custom` runs this to completion before returning), then
    /// sends every hart a `GOTO`-equivalent message at that hart's own entry
    /// point but forced to machine mode, mirroring `PRV_M` in the source
    /// implementation. Returns `false` if no hart in the image has chunks.
    #[cfg(feature = "custom-boot-flow")]
    pub fn boot_custom(
        &self,
        image: &BootImage<'_>,
        permission: &dyn PermissionOracle,
        copier: &mut dyn CopyPrimitive,
        ipi: &mut dyn IpiCoordinator,
    ) -> bool {
        const CUSTOM_BOOT_PRIV_MODE_RAW: u32 = 3; // PRV_M

        let Some(target) = HartId::ALL.into_iter().find(|&h| image.hart(h).num_chunks != 0) else {
            log::error!("custom boot flow: no hart in the image carries chunks");
            return false;
        };

        let mut zi_cursor = image.zi_chunks();
        while let Some(chunk) = zi_cursor.peek() {
            if chunk.owner == Some(target) {
                copier.zero(chunk.exec_addr, chunk.size as usize);
            }
            zi_cursor.advance();
        }

        let mut cursor = image.load_chunks(target);
        while let Some(chunk) = cursor.peek() {
            let (owner, _) = chunk.owner();
            if owner == Some(target) && permission.check_write(target, chunk.exec_addr, chunk.size) {
                let src = image.bytes_at(chunk.load_addr, chunk.size as usize);
                copier.copy(chunk.exec_addr, src, chunk.size as usize);
            }
            cursor.advance();
        }

        let entry_point = image.hart(target).entry_point;
        for hart in HartId::ALL {
            let message = crate::ipi::MessageKind::Goto {
                entry_point,
                priv_mode_raw: CUSTOM_BOOT_PRIV_MODE_RAW,
                ancillary: None,
            };
            match ipi.alloc(hart) {
                Some(slot) => {
                    if !ipi.deliver(hart, slot, message) {
                        ipi.free(hart, slot);
                    }
                }
                None => log::error!("custom boot flow: no IPI slot available for {hart}"),
            }
        }

        true
    }
}

impl Default for BootCore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::NullEventSink;
    use crate::image::test_fixture::ImageBuilder;

    fn crc32(bytes: &[u8]) -> u32 {
        crc32fast::hash(bytes)
    }

    #[cfg(feature = "gpio-ui")]
    fn null_gpio_ui() -> crate::gpio_ui::NullGpioUi {
        crate::gpio_ui::NullGpioUi
    }

    #[test]
    fn verify_magic_rejects_garbage() {
        let core = BootCore::new();
        let builder = ImageBuilder::new();
        let mut bytes = builder.build(crc32);
        bytes[0..4].copy_from_slice(&0xDEAD_BEEFu32.to_le_bytes());
        let image = BootImage::from_bytes(&bytes);
        assert_eq!(core.verify_magic(&image), MagicStatus::Unrecognized);
    }

    #[test]
    fn skip_boot_is_set_reports_the_image_flag() {
        let core = BootCore::new();
        let mut builder = ImageBuilder::new();
        builder.harts[1].flags = HartFlags::SKIP_AUTOBOOT;
        let bytes = builder.build(crc32);
        let image = BootImage::from_bytes(&bytes);
        assert!(core.skip_boot_is_set(&image, HartId::Hart2));
        assert!(!core.skip_boot_is_set(&image, HartId::Hart1));
    }

    #[cfg(not(feature = "signing"))]
    #[test]
    fn restart_with_bad_crc_never_touches_any_machine() {
        let mut core = BootCore::new();
        let builder = ImageBuilder::new();
        let mut bytes = builder.build(crc32);
        bytes[50] ^= 0xFF;
        let image = BootImage::from_bytes(&bytes);
        let mut events = NullEventSink;
        #[cfg(feature = "gpio-ui")]
        let mut gpio_ui = null_gpio_ui();

        core.machines[0].force_state(BootState::OpenSbiInit);
        let result = core.restart_core(
            RestartSource::All,
            &image,
            crc32,
            &mut events,
            #[cfg(feature = "gpio-ui")]
            &mut gpio_ui,
        );
        assert_eq!(result, Err(ErrorKind::CrcMismatch));
        assert_eq!(core.machine(HartId::Hart1).state(), BootState::OpenSbiInit, "validation failure must not touch any machine");
    }

    #[cfg(not(feature = "signing"))]
    #[test]
    fn restart_cores_by_bitmask_recovers_every_selected_hart_to_init() {
        let mut core = BootCore::new();
        let builder = ImageBuilder::new();
        let bytes = builder.build(crc32);
        let image = BootImage::from_bytes(&bytes);
        let mut events = NullEventSink;
        #[cfg(feature = "gpio-ui")]
        let mut gpio_ui = null_gpio_ui();

        core.machines[0].force_state(BootState::DownloadChunks);
        core.machines[1].force_state(BootState::OpenSbiInit);

        let mask = HartId::Hart1.mask_bit() | HartId::Hart2.mask_bit();
        core.restart_cores_by_bitmask(
            mask,
            &image,
            crc32,
            &mut events,
            #[cfg(feature = "gpio-ui")]
            &mut gpio_ui,
        )
        .expect("well-formed image validates");

        assert_eq!(core.machine(HartId::Hart1).state(), BootState::Init, "no boot-set peers, anomalous state forced to Init");
        assert_eq!(core.machine(HartId::Hart2).state(), BootState::OpenSbiInit, "OpenSBIInit re-enters itself");
        assert_eq!(core.machine(HartId::Hart3).state(), BootState::Idle, "not named by the bitmask");
    }

    #[cfg(not(feature = "signing"))]
    #[test]
    fn restart_core_for_a_single_hart_pulls_in_its_boot_set_peers() {
        let mut core = BootCore::new();
        let mut builder = ImageBuilder::new();
        builder.harts[0].entry_point = 0x8100_0000;
        builder.harts[0].num_chunks = 1;
        builder.harts[1].entry_point = 0x8100_0000;
        let bytes = builder.build(crc32);
        let image = BootImage::from_bytes(&bytes);
        let mut events = NullEventSink;
        #[cfg(feature = "gpio-ui")]
        let mut gpio_ui = null_gpio_ui();

        core.machines[0].force_state(BootState::Complete);
        core.machines[1].force_state(BootState::Complete);

        core.restart_core(
            RestartSource::Hart(HartId::Hart1),
            &image,
            crc32,
            &mut events,
            #[cfg(feature = "gpio-ui")]
            &mut gpio_ui,
        )
        .expect("well-formed image validates");

        assert_eq!(core.machine(HartId::Hart1).state(), BootState::Init);
        assert_eq!(core.machine(HartId::Hart2).state(), BootState::Init, "boot-set peer restarted alongside the named hart");
        assert_eq!(core.machine(HartId::Hart3).state(), BootState::Idle, "outside the boot-set, untouched");
    }

    #[cfg(feature = "custom-boot-flow")]
    #[test]
    fn custom_boot_downloads_the_one_chunked_hart_and_messages_everyone() {
        use crate::ipi::test_fixture::FakeIpi;
        use crate::permission::StaticPermissionMap;

        let mut builder = ImageBuilder::new();
        builder.harts[1].entry_point = 0x8000_0000;
        builder.harts[1].num_chunks = 1;
        builder.harts[1].first_chunk = 0;
        builder.harts[1].last_chunk = 0;
        builder.load_chunks.push((0x8000_0000, 0x100, 2, 64));
        let bytes = builder.build(crc32);
        let image = BootImage::from_bytes(&bytes);

        let core = BootCore::new();
        let permission = StaticPermissionMap::always_permitted();
        let mut copier = RecordingCopier::default();
        let mut ipi = FakeIpi::new();

        assert!(core.boot_custom(&image, &permission, &mut copier, &mut ipi));
        assert_eq!(copier.copied.len(), 1, "only hart 2 carries chunks");
        assert_eq!(copier.copied[0], (0x8000_0000, 64));
        for hart in HartId::ALL {
            assert!(ipi.outstanding.contains_key(&hart), "every hart gets the shared entry message");
        }
    }

    #[cfg(feature = "custom-boot-flow")]
    #[derive(Default)]
    struct RecordingCopier {
        copied: std::vec::Vec<(u64, usize)>,
    }

    #[cfg(feature = "custom-boot-flow")]
    impl CopyPrimitive for RecordingCopier {
        fn copy(&mut self, dst: u64, _src: &[u8], len: usize) {
            self.copied.push((dst, len));
        }
        fn zero(&mut self, _dst: u64, _len: usize) {}
    }
}
