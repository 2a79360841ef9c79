// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! CRC-32 as an injected collaborator.
//!
//! The core never links a CRC-32 implementation itself — the original
//! service calls out to a board-provided `CRC32()` routine, and this crate
//! preserves that seam as a plain function pointer so callers can wire in
//! whatever implementation (hardware CRC unit, `crc32fast`, a bit-banged
//! table) fits their target.

/// Signature of the injected CRC-32 routine: input bytes in, CRC-32 out.
pub type Crc32Fn = fn(&[u8]) -> u32;

use crate::image::BootImage;

/// Recomputes the header CRC over `image`'s shadow header (property P6: the
/// stored `header_crc` and `signature` fields read as zero during the
/// computation) and compares it against the header's stored value.
///
/// `scratch` must be at least [`BootImage::header_len`] bytes; callers on a
/// constrained target can reuse a single stack buffer sized to
/// [`crate::image::HEADER_LEN`] across calls.
pub fn verify_header_crc(image: &BootImage<'_>, scratch: &mut [u8], crc32: Crc32Fn) -> bool {
    let len = image.crc_shadow(scratch);
    let computed = crc32(&scratch[..len]);
    computed == image.header_crc()
}
