// Copyright (c) 2026 HSS Boot Core Contributors. All rights reserved.
// This software is licensed under Mulan PSL v2.
// You can use this software according to the terms and conditions of the Mulan PSL v2.
// You may obtain a copy of Mulan PSL v2 at:
//          http://license.coscl.org.cn/MulanPSL2
// THIS SOFTWARE IS PROVIDED ON AN "AS IS" BASIS, WITHOUT WARRANTIES OF ANY KIND,
// EITHER EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO NON-INFRINGEMENT,
// MERCHANTABILITY OR FIT FOR A PARTICULAR PURPOSE.
// See the Mulan PSL v2 for more details.

//! Error type for the boot orchestration core.
//!
//! Every failure this crate can produce belongs to a small, closed set — there
//! is no external I/O and nothing that would need a boxed `dyn Error` source.
//! A plain fieldless enum is the whole story.
//!
//! Only image-validation failures are represented here. Every other failure
//! §7 names (image not registered, IPI allocation/delivery/ack-timeout,
//! restart from a non-restartable state) is detected and handled entirely
//! inside the per-target FSM: it is surfaced as a transition to
//! `BootState::Error` (read back via [`crate::fsm::StateMachine::state`]) or,
//! for an anomalous restart source state, as a logged warning from
//! `restart_cores_by_bitmask` that still recovers the hart rather than
//! failing the call. Neither has a caller-visible `Result` to report through,
//! so no variant here stands in for them unconstructed.

use core::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// `Header::magic` did not match the plain boot magic.
    MagicMismatch,
    /// The header CRC recomputed over the shadow header did not match
    /// `Header::header_crc`.
    CrcMismatch,
    /// The `signing` feature is enabled and the signature collaborator
    /// rejected the image.
    SignatureRejected,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            ErrorKind::MagicMismatch => "boot image magic mismatch",
            ErrorKind::CrcMismatch => "boot image header CRC mismatch",
            ErrorKind::SignatureRejected => "boot image failed signature check",
        };
        f.write_str(msg)
    }
}

pub type Result<T> = core::result::Result<T, ErrorKind>;
