// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Newline framing of the inbound serial stream.

use tracing::debug;

/// Splits an arbitrarily chunked byte stream into trimmed text lines.
///
/// Bytes are buffered until a `\n` arrives, so a UTF-8 sequence split
/// across two chunks is decoded only once it is whole. The buffer has no
/// upper bound.
pub struct LineFramer {
    buffer: Vec<u8>,
}

impl LineFramer {
    /// Create a new, empty line framer.
    pub fn new() -> Self {
        Self {
            buffer: Vec::with_capacity(256),
        }
    }

    /// Append a chunk and return every line it completed, in arrival order.
    ///
    /// Lines are trimmed; lines that are empty after trimming are dropped.
    /// The trailing unterminated segment stays buffered.
    pub fn feed(&mut self, chunk: impl AsRef<[u8]>) -> Vec<String> {
        self.buffer.extend_from_slice(chunk.as_ref());

        let Some(last_newline) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return Vec::new();
        };

        let rest = self.buffer.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buffer, rest);

        let lines: Vec<String> = complete
            .split(|&b| b == b'\n')
            .map(|segment| String::from_utf8_lossy(segment).trim().to_string())
            .filter(|line| !line.is_empty())
            .collect();

        if !self.buffer.is_empty() {
            debug!("Holding {} bytes of partial line", self.buffer.len());
        }

        lines
    }

    /// Drop any buffered partial line.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }

    /// Number of bytes waiting for a newline.
    pub fn pending_len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if a partial line is buffered.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }
}

impl Default for LineFramer {
    fn default() -> Self {
        Self::new()
    }
}
