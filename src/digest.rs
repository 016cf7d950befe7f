// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 pipewright contributors

//! Content digests
//!
//! BLAKE3 digests identify compiled artifacts and staged build contexts.

use blake3::Hasher;
use std::path::Path;

use crate::errors::PipewrightError;

/// Incremental content hasher
pub struct ContentHasher {
    hasher: Hasher,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            hasher: Hasher::new(),
        }
    }

    /// Hash arbitrary bytes
    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    /// Hash a relative path together with the file's contents
    pub fn update_file(&mut self, relative: &Path, path: &Path) -> Result<(), PipewrightError> {
        let content = std::fs::read(path).map_err(|e| PipewrightError::FileReadError {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        self.hasher.update(relative.to_string_lossy().as_bytes());
        self.hasher.update(&[0]);
        self.hasher.update(&content);
        Ok(())
    }

    /// Finalize and get the hex digest
    pub fn finalize(self) -> String {
        self.hasher.finalize().to_hex().to_string()
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Hex digest of a byte slice
pub fn hash_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}
