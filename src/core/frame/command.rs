use crate::core::frame::layout::{command as field, FieldSpec, COMMAND_LAYOUT, COMMAND_LEN};
use crate::domain::error::FrameError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// PLL reference clock
pub const FREF_HZ: u64 = 24_000_000;

/// Minimum VCO frequency, Fref * NF / NR
pub const VCO_MIN_HZ: u64 = 360_000_000;

/// Number of L2 clusters addressed by the clock-enable bitmap
pub const L2_CLUSTERS: usize = 64;

/// Logical configuration sent to the chip.
///
/// Values are kept as plain integers so a configuration file can describe
/// them directly; widths are enforced when the frame is encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurationFrame {
    /// L2 clock enables, byte 0 = clusters 0..7 with cluster 0 in bit 7
    #[serde(default = "default_clock_enable")]
    pub clock_enable: [u8; 8],
    /// NF = CLKF + 1
    #[serde(default = "default_pll_clkf")]
    pub pll_clkf: u8,
    /// NR = CLKR + 1
    #[serde(default)]
    pub pll_clkr: u8,
    /// OD = CLKOD + 1
    #[serde(default = "default_pll_clkod")]
    pub pll_clkod: u8,
    #[serde(default = "default_pll_clkf")]
    pub pll_bwadj: u8,
    #[serde(default)]
    pub chip_x: u8,
    #[serde(default)]
    pub chip_y: u8,
    #[serde(default = "default_global_delay")]
    pub global_delay: u16,
    #[serde(default = "default_global_signal_width")]
    pub global_signal_width: u8,
    #[serde(default = "default_global_busy_mask")]
    pub global_busy_mask: u16,
    #[serde(default)]
    pub debug_mode_enable: bool,
}

fn default_clock_enable() -> [u8; 8] {
    [0xFF; 8]
}

fn default_pll_clkf() -> u8 {
    25
}

fn default_pll_clkod() -> u8 {
    1
}

fn default_global_delay() -> u16 {
    100
}

fn default_global_signal_width() -> u8 {
    10
}

fn default_global_busy_mask() -> u16 {
    100
}

impl Default for ConfigurationFrame {
    fn default() -> Self {
        Self {
            clock_enable: default_clock_enable(),
            pll_clkf: default_pll_clkf(),
            pll_clkr: 0,
            pll_clkod: default_pll_clkod(),
            pll_bwadj: default_pll_clkf(),
            chip_x: 0,
            chip_y: 0,
            global_delay: default_global_delay(),
            global_signal_width: default_global_signal_width(),
            global_busy_mask: default_global_busy_mask(),
            debug_mode_enable: false,
        }
    }
}

impl ConfigurationFrame {
    fn field_values(&self) -> [(FieldSpec, u64); 11] {
        [
            (field::CLOCK_ENABLE, u64::from_be_bytes(self.clock_enable)),
            (field::PLL_CLKF, u64::from(self.pll_clkf)),
            (field::PLL_CLKR, u64::from(self.pll_clkr)),
            (field::PLL_CLKOD, u64::from(self.pll_clkod)),
            (field::PLL_BWADJ, u64::from(self.pll_bwadj)),
            (field::CHIP_X, u64::from(self.chip_x)),
            (field::CHIP_Y, u64::from(self.chip_y)),
            (field::GLOBAL_DELAY, u64::from(self.global_delay)),
            (field::GLOBAL_SIGNAL_WIDTH, u64::from(self.global_signal_width)),
            (field::GLOBAL_BUSY_MASK, u64::from(self.global_busy_mask)),
            (field::DEBUG_MODE_ENABLE, u64::from(self.debug_mode_enable)),
        ]
    }

    /// Check every field against its bit width
    pub fn validate(&self) -> Result<(), FrameError> {
        for (spec, value) in self.field_values() {
            spec.check(value)?;
        }
        Ok(())
    }

    /// Pack into the 15-byte wire form
    pub fn encode(&self) -> Result<CommandFrame, FrameError> {
        let mut bytes = [0u8; COMMAND_LEN];
        for (spec, value) in self.field_values() {
            spec.pack(&mut bytes, value)?;
        }
        Ok(CommandFrame(bytes))
    }

    /// Unpack a 15-byte command, e.g. one echoed by the chip
    pub fn decode(bytes: &[u8]) -> Result<Self, FrameError> {
        COMMAND_LAYOUT.require_len(bytes)?;

        // Every field is at most as wide as its target type, so the narrowing
        // casts below cannot drop bits.
        Ok(Self {
            clock_enable: field::CLOCK_ENABLE.unpack(bytes)?.to_be_bytes(),
            pll_clkf: field::PLL_CLKF.unpack(bytes)? as u8,
            pll_clkr: field::PLL_CLKR.unpack(bytes)? as u8,
            pll_clkod: field::PLL_CLKOD.unpack(bytes)? as u8,
            pll_bwadj: field::PLL_BWADJ.unpack(bytes)? as u8,
            chip_x: field::CHIP_X.unpack(bytes)? as u8,
            chip_y: field::CHIP_Y.unpack(bytes)? as u8,
            global_delay: field::GLOBAL_DELAY.unpack(bytes)? as u16,
            global_signal_width: field::GLOBAL_SIGNAL_WIDTH.unpack(bytes)? as u8,
            global_busy_mask: field::GLOBAL_BUSY_MASK.unpack(bytes)? as u16,
            debug_mode_enable: field::DEBUG_MODE_ENABLE.unpack(bytes)? == 1,
        })
    }

    /// Clock enable of L2 cluster `index` (0..64)
    pub fn cluster_clock_enabled(&self, index: usize) -> bool {
        index < L2_CLUSTERS && self.clock_enable[index / 8] & (0x80 >> (index % 8)) != 0
    }

    /// Set the clock enable of L2 cluster `index` (0..64)
    pub fn set_cluster_clock(&mut self, index: usize, enabled: bool) -> Result<(), FrameError> {
        if index >= L2_CLUSTERS {
            return Err(FrameError::FieldOutOfRange {
                field: field::CLOCK_ENABLE.name,
                value: index as u64,
                width: 6,
            });
        }

        let mask = 0x80u8 >> (index % 8);
        if enabled {
            self.clock_enable[index / 8] |= mask;
        } else {
            self.clock_enable[index / 8] &= !mask;
        }
        Ok(())
    }

    /// Whether L3 cluster `index` (0..16) keeps a clock.
    ///
    /// The chip gates an L3 cluster off once all four of its L2 clusters are
    /// disabled; this only reports that consequence.
    pub fn l3_clock_active(&self, index: usize) -> bool {
        (index * 4..index * 4 + 4).any(|l2| self.cluster_clock_enabled(l2))
    }

    /// Number of enabled L2 clusters
    pub fn enabled_clusters(&self) -> u32 {
        self.clock_enable.iter().map(|b| b.count_ones()).sum()
    }

    pub fn pll(&self) -> PllSettings {
        PllSettings {
            nf: u64::from(self.pll_clkf) + 1,
            nr: u64::from(self.pll_clkr) + 1,
            od: u64::from(self.pll_clkod) + 1,
        }
    }
}

/// Effective PLL multipliers derived from the CLKF/CLKR/CLKOD fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PllSettings {
    pub nf: u64,
    pub nr: u64,
    pub od: u64,
}

impl PllSettings {
    /// Fref * NF / NR
    pub fn vco_hz(&self, fref_hz: u64) -> u64 {
        fref_hz * self.nf / self.nr
    }

    /// Fout = Fref * NF / (NR * OD)
    pub fn output_hz(&self, fref_hz: u64) -> u64 {
        fref_hz * self.nf / (self.nr * self.od)
    }

    pub fn meets_vco_minimum(&self, fref_hz: u64) -> bool {
        self.vco_hz(fref_hz) >= VCO_MIN_HZ
    }
}

/// The 15 bytes actually written to the UART
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFrame([u8; COMMAND_LEN]);

impl CommandFrame {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn debug_mode(&self) -> bool {
        self.0[COMMAND_LEN - 1] & 0x01 != 0
    }

    pub fn to_hex(&self) -> String {
        hex::encode_upper(self.0)
    }
}

impl AsRef<[u8]> for CommandFrame {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", format_bytes(&self.0))
    }
}

/// Render bytes the way the progress output shows them: `0xFF 0x05 ...`
pub fn format_bytes(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("0x{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
