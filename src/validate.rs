// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Image magic and full-validation checks (spec section on image
//! registration/validation).

use crate::crc::{verify_header_crc, Crc32Fn};
use crate::error::{ErrorKind, Result};
use crate::image::{BootImage, COMPRESSED_MAGIC, HEADER_LEN, PLAIN_MAGIC};

#[cfg(feature = "gpio-ui")]
use crate::gpio_ui::GpioUiReporter;

/// Outcome of a magic check: a plain image can be validated and booted; a
/// compressed one must be decompressed by the caller first; anything else is
/// not a boot image at all.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum MagicStatus {
    Plain,
    Compressed,
    Unrecognized,
}

/// Cheap pre-check: does `image` even look like a boot image? Does not touch
/// the CRC or signature. Exposed separately because callers may want to
/// distinguish "not a boot image" from "a corrupt boot image" before
/// committing to the more expensive full validation.
pub fn verify_magic(image: &BootImage<'_>) -> MagicStatus {
    match image.magic() {
        PLAIN_MAGIC => MagicStatus::Plain,
        COMPRESSED_MAGIC => MagicStatus::Compressed,
        _ => MagicStatus::Unrecognized,
    }
}

/// Optional signature collaborator, present only when the `signing` feature
/// is enabled. Kept as a trait (rather than a bare fn pointer like
/// [`Crc32Fn`]) because a real signature check typically needs state — a
/// public key, a hardware crypto engine handle — that a fn pointer can't
/// carry.
#[cfg(feature = "signing")]
pub trait SignatureCheck {
    /// Returns `true` if `signature` is a valid signature over the header
    /// bytes covered by `header_crc`'s shadow computation.
    fn verify(&self, header_bytes: &[u8], signature: &[u8]) -> bool;
}

/// Full validation: magic, then header CRC, then (with `signing`) the
/// signature. Mirrors the original service's `validateCrc_` followed by its
/// signature-check step, run as one gate before any state transition out of
/// `Init` is allowed.
pub fn validate_image(
    image: &BootImage<'_>,
    scratch: &mut [u8; HEADER_LEN],
    crc32: Crc32Fn,
    #[cfg(feature = "signing")] signature_check: &dyn SignatureCheck,
    #[cfg(feature = "gpio-ui")] gpio_ui: &mut dyn GpioUiReporter,
) -> Result<()> {
    if verify_magic(image) != MagicStatus::Plain {
        return Err(ErrorKind::MagicMismatch);
    }

    let header_len = image.header_len();
    if !verify_header_crc(image, &mut scratch[..header_len], crc32) {
        return Err(ErrorKind::CrcMismatch);
    }

    #[cfg(feature = "signing")]
    {
        if let Some(signature) = image.signature() {
            if !signature_check.verify(&scratch[..header_len], signature) {
                return Err(ErrorKind::SignatureRejected);
            }
        }
    }

    // Mirrors the original's `HSS_GPIO_UI_ReportImageGoodCRC`, called once
    // magic and CRC (and, if enabled, signing) have all passed.
    #[cfg(feature = "gpio-ui")]
    gpio_ui.report_image_good_crc();

    Ok(())
}
