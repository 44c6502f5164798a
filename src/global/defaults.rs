// urraca is a configuration history tool for the Claude toolchain
// Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use crate::utils::size;

// -- Repository layout --
/// File name of the embedded database inside the repository directory.
pub const DATABASE_FILENAME: &str = "urraca.db";

/// Directory for blobs too large to live inline in the database.
pub const BLOBS_DIR: &str = "blobs";

/// Number of hex characters used for the blob directory fan-out.
pub const BLOBS_DIR_FANOUT: usize = 2;

// -- Capture policy --
/// Files larger than this are observed (size, mtime, hash) but their bytes
/// are not captured. The cap in force is recorded on every snapshot row.
pub const MAX_CONTENT_CAPTURE_BYTES: u64 = 4 * size::MiB;

/// Blobs up to this size are stored inline in the database; larger blobs go
/// to the external blob directory.
pub const INLINE_BLOB_LIMIT: u64 = 256 * size::KiB;

// -- Display --
/// Display length for a snapshot fingerprint in bytes.
pub const SHORT_FINGERPRINT_LEN: usize = 4;

/// Default number of rows returned by `list` when no limit is given.
pub const DEFAULT_LIST_LIMIT: usize = 50;

pub(crate) const DEFAULT_VERBOSITY: u32 = 1;
