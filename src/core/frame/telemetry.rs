use crate::core::frame::layout::{telemetry as field, TELEMETRY_LAYOUT};
use crate::domain::error::FrameError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Busy/done signals returned by the chip in debug mode.
///
/// Every bitmap is MSB-first: the most significant bit is cluster 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    pub l5_busy: u8,
    pub l4_busy: u8,
    pub l3_busy: u16,
    pub l2_busy: u64,
    pub l2_done: u64,
}

impl TelemetryFrame {
    /// Decode a 19-byte telemetry frame. Reserved bits are ignored.
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        TELEMETRY_LAYOUT.require_len(bytes)?;

        Ok(Self {
            l5_busy: field::L5_BUSY.unpack(bytes)? as u8,
            l4_busy: field::L4_BUSY.unpack(bytes)? as u8,
            l3_busy: field::L3_BUSY.unpack(bytes)? as u16,
            l2_busy: field::L2_BUSY.unpack(bytes)?,
            l2_done: field::L2_DONE.unpack(bytes)?,
        })
    }

    pub fn l5_busy(&self) -> bool {
        self.l5_busy != 0
    }

    /// Busy signal of L4 cluster `n` (1..=4)
    pub fn l4_busy_cluster(&self, n: usize) -> bool {
        cluster_bit(u64::from(self.l4_busy), 4, n)
    }

    /// Busy signal of L3 cluster `n` (1..=16)
    pub fn l3_busy_cluster(&self, n: usize) -> bool {
        cluster_bit(u64::from(self.l3_busy), 16, n)
    }

    /// Busy signal of L2 cluster `n` (1..=64)
    pub fn l2_busy_cluster(&self, n: usize) -> bool {
        cluster_bit(self.l2_busy, 64, n)
    }

    /// Done signal of L2 cluster `n` (1..=64)
    pub fn l2_done_cluster(&self, n: usize) -> bool {
        cluster_bit(self.l2_done, 64, n)
    }

    /// Total number of asserted busy signals across L5..L2 (85 at most)
    pub fn busy_count(&self) -> u32 {
        self.l5_busy.count_ones()
            + self.l4_busy.count_ones()
            + self.l3_busy.count_ones()
            + self.l2_busy.count_ones()
    }

    pub fn is_idle(&self) -> bool {
        self.busy_count() == 0
    }
}

fn cluster_bit(bitmap: u64, clusters: usize, n: usize) -> bool {
    if n == 0 || n > clusters {
        return false;
    }
    (bitmap >> (clusters - n)) & 1 == 1
}

impl fmt::Display for TelemetryFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "L5 busy={} L4 busy={:04b} L3 busy={:016b} L2 busy={:016X} L2 done={:016X}",
            self.l5_busy, self.l4_busy, self.l3_busy, self.l2_busy, self.l2_done
        )
    }
}
