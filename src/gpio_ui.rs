// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! GPIO status UI reporter: the board-level LED/GPIO feedback the original
//! service drives once a registered image clears validation
//! (`HSS_GPIO_UI_ReportImageGoodCRC`). Out of scope per the core's own
//! purpose — this module only carries the seam, gated behind the `gpio-ui`
//! feature so a board with no such UI pays nothing for it.

/// Collaborator notified of boot-progress milestones worth surfacing on a
/// board's status LEDs, present only when the `gpio-ui` feature is enabled.
pub trait GpioUiReporter {
    /// Called once a registered image has passed magic and CRC (and, if
    /// `signing` is enabled, signature) checks.
    fn report_image_good_crc(&mut self);
}

/// A `GpioUiReporter` that discards every call, for boards that enable the
/// `gpio-ui` feature's plumbing in a shared build but have no UI wired up
/// (e.g. a CI image) and for tests.
pub struct NullGpioUi;

impl GpioUiReporter for NullGpioUi {
    fn report_image_good_crc(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_reporter_accepts_the_call_without_panicking() {
        let mut ui = NullGpioUi;
        ui.report_image_good_crc();
    }
}
