// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Boot image binary format: header, hart table, and the two sentinel-
//! terminated chunk tables.
//!
//! Fields are read directly out of a byte slice with explicit little-endian
//! decodes rather than by casting a `#[repr(C)]` struct over the image — the
//! image is an externally supplied blob with no alignment guarantee, so a
//! struct cast would be unsound. This is the same approach the `fdt` crate
//! the teacher depends on takes for device-tree blobs, for the same reason.

use crate::hart::{decode_owner, HartFlags, HartId, PrivMode, N_APP};

/// Plain magic: the only value that allows a boot to proceed.
pub const PLAIN_MAGIC: u32 = 0x4853_5330; // "HSS0"
/// Compressed magic: recognized by [`verify_magic`] only; a caller must
/// decompress the image before it can be validated or booted.
pub const COMPRESSED_MAGIC: u32 = 0x4853_535A; // "HSSZ"

const HART_NAME_LEN: usize = 16;
const SET_NAME_LEN: usize = 32;
const SIGNATURE_LEN: usize = 64;

const COMMON_PREFIX_LEN: usize = 4 + 4 + 4; // magic, header_crc, version
const HART_DESC_LEN: usize = HART_NAME_LEN + 8 + 4 + 4 + 4 + 4; // name, entry_point, priv_mode, num_chunks, first_chunk, last_chunk, flags

/// Size of the legacy (pre-signing) header, used for CRC purposes when
/// `version == 0`.
pub const HEADER_V0_LEN: usize = COMMON_PREFIX_LEN + SET_NAME_LEN + 4 + 4 + N_APP * HART_DESC_LEN;
/// Size of the current header (with the signature field), used for CRC
/// purposes when `version != 0`.
pub const HEADER_LEN: usize = COMMON_PREFIX_LEN + SIGNATURE_LEN + SET_NAME_LEN + 4 + 4 + N_APP * HART_DESC_LEN;

const LOAD_CHUNK_LEN: usize = 8 + 4 + 4 + 4; // exec_addr, load_addr, owner, size
const ZI_CHUNK_LEN: usize = 8 + 4 + 4; // exec_addr, owner, size

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes(bytes[offset..offset + 4].try_into().unwrap())
}

fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    u64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

/// Offsets of the fields that come after the (version-dependent) signature.
struct Layout {
    set_name_off: usize,
    chunk_table_off_field: usize,
    zi_chunk_table_off_field: usize,
    hart_table_off: usize,
    header_len: usize,
    signature_off: Option<usize>,
}

fn layout_for(version: u32) -> Layout {
    if version == 0 {
        let set_name_off = COMMON_PREFIX_LEN;
        Layout {
            set_name_off,
            chunk_table_off_field: set_name_off + SET_NAME_LEN,
            zi_chunk_table_off_field: set_name_off + SET_NAME_LEN + 4,
            hart_table_off: set_name_off + SET_NAME_LEN + 8,
            header_len: HEADER_V0_LEN,
            signature_off: None,
        }
    } else {
        let set_name_off = COMMON_PREFIX_LEN + SIGNATURE_LEN;
        Layout {
            set_name_off,
            chunk_table_off_field: set_name_off + SET_NAME_LEN,
            zi_chunk_table_off_field: set_name_off + SET_NAME_LEN + 4,
            hart_table_off: set_name_off + SET_NAME_LEN + 8,
            header_len: HEADER_LEN,
            signature_off: Some(COMMON_PREFIX_LEN),
        }
    }
}

/// One hart's entry in the boot image header.
#[derive(Copy, Clone, Debug)]
pub struct HartDescriptor {
    pub entry_point: u64,
    pub priv_mode_raw: u32,
    pub num_chunks: u32,
    pub first_chunk: u32,
    pub last_chunk: u32,
    pub flags: HartFlags,
}

impl HartDescriptor {
    pub fn priv_mode(&self) -> Option<PrivMode> {
        PrivMode::from_raw(self.priv_mode_raw)
    }

    /// A hart is a boot-set *primary candidate* if it both owns chunks and has
    /// a non-zero entry point (mirrors the original's `primary_boot_hart`
    /// test, reused in both `SetupPMP`'s domain registration and
    /// `OpenSBIInit`'s peer iteration).
    pub fn is_primary_candidate(&self) -> bool {
        self.num_chunks != 0 && self.entry_point != 0
    }
}

/// One entry in the load-chunk table: a copy from image-relative storage to
/// an absolute physical destination.
#[derive(Copy, Clone, Debug)]
pub struct LoadChunk {
    pub exec_addr: u64,
    pub load_addr: u32,
    pub owner_raw: u32,
    pub size: u32,
}

impl LoadChunk {
    pub fn owner(&self) -> (Option<HartId>, bool) {
        decode_owner(self.owner_raw)
    }

    pub fn is_sentinel(&self) -> bool {
        self.size == 0
    }
}

/// One entry in the zero-init chunk table.
#[derive(Copy, Clone, Debug)]
pub struct ZiChunk {
    pub exec_addr: u64,
    pub owner: Option<HartId>,
    pub size: u32,
}

impl ZiChunk {
    pub fn is_sentinel(&self) -> bool {
        self.size == 0
    }
}

/// Read-only view over a boot image's bytes. Does not own the bytes and does
/// not copy them; per invariant 1, the core never mutates image memory.
#[derive(Copy, Clone)]
pub struct BootImage<'a> {
    bytes: &'a [u8],
}

impl<'a> BootImage<'a> {
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn magic(&self) -> u32 {
        read_u32(self.bytes, 0)
    }

    pub fn header_crc(&self) -> u32 {
        read_u32(self.bytes, 4)
    }

    pub fn version(&self) -> u32 {
        read_u32(self.bytes, 8)
    }

    fn layout(&self) -> Layout {
        layout_for(self.version())
    }

    /// Length of the header (version-dependent) that the CRC is computed
    /// over.
    pub fn header_len(&self) -> usize {
        self.layout().header_len
    }

    pub fn set_name(&self) -> &'a str {
        let layout = self.layout();
        let raw = &self.bytes[layout.set_name_off..layout.set_name_off + SET_NAME_LEN];
        let nul = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
        core::str::from_utf8(&raw[..nul]).unwrap_or("")
    }

    pub fn chunk_table_offset(&self) -> u32 {
        read_u32(self.bytes, self.layout().chunk_table_off_field)
    }

    pub fn zi_chunk_table_offset(&self) -> u32 {
        read_u32(self.bytes, self.layout().zi_chunk_table_off_field)
    }

    pub fn hart(&self, id: HartId) -> HartDescriptor {
        let layout = self.layout();
        let off = layout.hart_table_off + id.index() * HART_DESC_LEN;
        let name_end = off + HART_NAME_LEN;
        HartDescriptor {
            entry_point: read_u64(self.bytes, name_end),
            priv_mode_raw: read_u32(self.bytes, name_end + 8),
            num_chunks: read_u32(self.bytes, name_end + 12),
            first_chunk: read_u32(self.bytes, name_end + 16),
            last_chunk: read_u32(self.bytes, name_end + 20),
            flags: HartFlags::from_bits_truncate(read_u32(self.bytes, name_end + 24)),
        }
    }

    /// Returns a shadow copy of the header (as owned bytes) with
    /// `header_crc` and `signature` zeroed, ready for CRC computation.
    /// Property P6.
    pub fn crc_shadow(&self, out: &mut [u8]) -> usize {
        let layout = self.layout();
        let len = layout.header_len;
        out[..len].copy_from_slice(&self.bytes[..len]);
        out[4..8].fill(0);
        if let Some(sig_off) = layout.signature_off {
            out[sig_off..sig_off + SIGNATURE_LEN].fill(0);
        }
        len
    }

    pub fn signature(&self) -> Option<&'a [u8]> {
        let off = self.layout().signature_off?;
        Some(&self.bytes[off..off + SIGNATURE_LEN])
    }

    /// A cursor over the load-chunk table belonging to `hart`, starting at
    /// `firstChunk` and refusing to read past `lastChunk + 1` (design note:
    /// sentinel-terminated arrays are exposed as bounded iterators).
    pub fn load_chunks(&self, hart: HartId) -> LoadChunkCursor<'a> {
        let desc = self.hart(hart);
        let base = self.chunk_table_offset() as usize + desc.first_chunk as usize * LOAD_CHUNK_LEN;
        LoadChunkCursor {
            bytes: self.bytes,
            next_offset: base,
            chunk_count: 0,
            last_chunk: desc.last_chunk,
        }
    }

    /// A cursor over the whole zero-init chunk table (not scoped to one
    /// hart; the ZeroInit state filters by owner itself).
    pub fn zi_chunks(&self) -> ZiChunkCursor<'a> {
        ZiChunkCursor {
            bytes: self.bytes,
            next_offset: self.zi_chunk_table_offset() as usize,
        }
    }

    /// Absolute offset (from image base) of `load_addr` bytes into the
    /// image, i.e. where a load chunk's source data actually lives.
    pub fn bytes_at(&self, load_addr: u32, len: usize) -> &'a [u8] {
        let start = load_addr as usize;
        &self.bytes[start..start + len]
    }

    /// Bitmask over every hart sharing `hart`'s entry point, including
    /// `hart` itself, per invariant 5. A hart with `entry_point == 0` forms
    /// a boot-set of one (itself), since a zero entry point never matches
    /// another hart's.
    pub fn boot_set_mask(&self, hart: HartId) -> u32 {
        let entry = self.hart(hart).entry_point;
        let mut mask = hart.mask_bit();
        if entry == 0 {
            return mask;
        }
        for peer in HartId::ALL {
            if peer != hart && self.hart(peer).entry_point == entry {
                mask |= peer.mask_bit();
            }
        }
        mask
    }

    /// The lowest-indexed member of `hart`'s boot-set — the primary per
    /// invariant 5. A hart with a zero entry point is always its own
    /// primary (it has no peers to defer to).
    pub fn boot_set_primary(&self, hart: HartId) -> HartId {
        let entry = self.hart(hart).entry_point;
        if entry == 0 {
            return hart;
        }
        HartId::ALL.into_iter().find(|&h| self.hart(h).entry_point == entry).unwrap_or(hart)
    }
}

/// Bounded iterator over one hart's load-chunk table. Stops at the sentinel
/// (`size == 0`) or at `chunk_count > last_chunk`, whichever comes first
/// (boundary property B1).
pub struct LoadChunkCursor<'a> {
    bytes: &'a [u8],
    next_offset: usize,
    chunk_count: u32,
    last_chunk: u32,
}

impl<'a> LoadChunkCursor<'a> {
    /// Reads the chunk at the cursor without advancing it.
    pub fn peek(&self) -> Option<LoadChunk> {
        if self.chunk_count > self.last_chunk {
            return None;
        }
        let off = self.next_offset;
        let chunk = LoadChunk {
            exec_addr: read_u64(self.bytes, off),
            load_addr: read_u32(self.bytes, off + 8),
            owner_raw: read_u32(self.bytes, off + 12),
            size: read_u32(self.bytes, off + 16),
        };
        if chunk.is_sentinel() {
            None
        } else {
            Some(chunk)
        }
    }

    /// Advances past the current chunk, as if a whole chunk (not a
    /// sub-chunk) had just been processed.
    pub fn advance(&mut self) {
        self.next_offset += LOAD_CHUNK_LEN;
        self.chunk_count += 1;
    }

    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }
}

/// Iterator over the zero-init chunk table; stops at the sentinel (B1).
pub struct ZiChunkCursor<'a> {
    bytes: &'a [u8],
    next_offset: usize,
}

impl<'a> ZiChunkCursor<'a> {
    pub fn peek(&self) -> Option<ZiChunk> {
        let off = self.next_offset;
        let size = read_u32(self.bytes, off + 12);
        if size == 0 {
            return None;
        }
        let (owner, _) = decode_owner(read_u32(self.bytes, off + 8));
        Some(ZiChunk {
            exec_addr: read_u64(self.bytes, off),
            owner,
            size,
        })
    }

    pub fn advance(&mut self) {
        self.next_offset += ZI_CHUNK_LEN;
    }
}
