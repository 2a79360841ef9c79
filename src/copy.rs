// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! The copy primitive collaborator: the seam the FSM's `ZeroInit` and
//! `DownloadChunks` handlers drive a sub-chunk at a time so the boot core can
//! yield back to the scheduler between sub-chunks instead of blocking for the
//! whole chunk.
//!
//! The sub-chunk stepping itself lives inline in `fsm.rs`, against
//! `chunk_index`/`chunk_bytes_done` held in each target's own
//! [`crate::context::RuntimeState`] — the FSM re-derives its cursor position
//! from that state on every tick (property R1: a repeated call is a no-op
//! past completion and cannot corrupt anything), which rules out a
//! self-contained stepping engine here that would hold its own `done` cursor
//! alongside it.

/// Default sub-chunk quantum, matching the original service's
/// `mHSS_BOOT_SUBCHUNK_SIZE`.
pub const DEFAULT_SUB_CHUNK_SIZE: usize = 256;

/// Collaborator that performs the actual memory movement. Kept as a trait so
/// a target can back it with a blocking `memcpy`, a DMA engine, or (in
/// tests) a plain slice copy.
pub trait CopyPrimitive {
    /// Copies `len` bytes from `src` to the physical address `dst`.
    fn copy(&mut self, dst: u64, src: &[u8], len: usize);
    /// Zero-fills `len` bytes at the physical address `dst`.
    fn zero(&mut self, dst: u64, len: usize);
}
