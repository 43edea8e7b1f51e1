// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::atomic::{AtomicU32, Ordering};

/// Inclusive UDP port range handed out to connected calls.
///
/// Each allocation starts scanning one port after the previous one, so a
/// port released by an ended call is the last candidate rather than the first.
#[derive(Debug)]
pub struct PortRange {
    start: u16,
    end: u16,
    cursor: AtomicU32,
}

impl PortRange {
    pub fn new(start: u16, end: u16) -> Self {
        Self {
            start,
            end,
            cursor: AtomicU32::new(0),
        }
    }

    pub fn len(&self) -> u32 {
        if self.end < self.start {
            0
        } else {
            u32::from(self.end - self.start) + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, port: u16) -> bool {
        (self.start..=self.end).contains(&port)
    }

    /// Every port in the range exactly once, rotated for this allocation.
    pub fn candidates(&self) -> impl Iterator<Item = u16> + '_ {
        let len = self.len();
        let offset = if len == 0 {
            0
        } else {
            self.cursor.fetch_add(1, Ordering::Relaxed) % len
        };
        (0..len).map(move |i| {
            // (offset + i) % len < len <= 65536 - start, so the sum fits in u16.
            let step = (offset + i) % len;
            (u32::from(self.start) + step) as u16
        })
    }
}
