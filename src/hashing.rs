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

use std::fmt;
use std::io::Read;

use anyhow::{Result, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Length of a content hash in bytes (SHA-256).
pub const HASH_LENGTH: usize = 32;

/// SHA-256 content address. Blobs, snapshot fingerprints and entity bodies
/// are all identified by this type. The canonical text form is lower-case hex.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ContentHash([u8; HASH_LENGTH]);

impl ContentHash {
    /// Computes the hash of a byte sequence.
    pub fn from_content(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(digest.into())
    }

    /// The hash of the empty byte sequence. Every zero-byte file shares this
    /// canonical blob.
    pub fn empty() -> Self {
        Self::from_content(b"")
    }

    /// The all-zero hash, used as a provisional fingerprint before the real
    /// one is computed inside the snapshot transaction.
    pub fn zero() -> Self {
        Self([0u8; HASH_LENGTH])
    }

    pub fn as_bytes(&self) -> &[u8; HASH_LENGTH] {
        &self.0
    }

    /// Encodes the hash as lower-case hex.
    pub fn to_hex(&self) -> String {
        let mut hex = String::with_capacity(2 * HASH_LENGTH);
        for byte in &self.0 {
            hex.push_str(&format!("{byte:02x}"));
        }
        hex
    }

    /// Short hex prefix for display purposes.
    pub fn to_short_hex(&self, num_bytes: usize) -> String {
        let num_bytes = num_bytes.min(HASH_LENGTH);
        let mut hex = String::with_capacity(2 * num_bytes);
        for byte in &self.0[..num_bytes] {
            hex.push_str(&format!("{byte:02x}"));
        }
        hex
    }

    /// Parses a full-length hex string.
    pub fn from_hex(hex: &str) -> Result<Self> {
        if hex.len() != 2 * HASH_LENGTH {
            bail!(
                "Invalid hash length {} (expected {})",
                hex.len(),
                2 * HASH_LENGTH
            );
        }

        let mut bytes = [0u8; HASH_LENGTH];
        for (i, chunk) in hex.as_bytes().chunks_exact(2).enumerate() {
            let chunk = std::str::from_utf8(chunk)?;
            bytes[i] = u8::from_str_radix(chunk, 16)?;
        }

        Ok(Self(bytes))
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({})", self.to_hex())
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        ContentHash::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Incremental hasher for streamed file reads. Tracks the number of bytes
/// consumed so callers can detect files that changed size mid-read.
pub struct StreamHasher {
    hasher: Sha256,
    num_bytes: u64,
}

impl Default for StreamHasher {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamHasher {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
            num_bytes: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.num_bytes += data.len() as u64;
    }

    pub fn finalize(self) -> (ContentHash, u64) {
        (ContentHash(self.hasher.finalize().into()), self.num_bytes)
    }
}

/// Hashes a reader to completion without retaining the bytes.
/// Returns the hash and the total number of bytes read.
pub fn hash_reader<R: Read>(reader: &mut R) -> Result<(ContentHash, u64)> {
    let mut hasher = StreamHasher::new();
    let mut buffer = [0u8; 64 * 1024];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hasher.finalize())
}
