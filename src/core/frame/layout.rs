//! Declarative bit layout of the PAICORE UART frames.
//!
//! Every field is described once, by its bit offset and width inside the
//! frame. Offsets count from the MSB of the first byte, which is the order
//! bits leave the UART, so a field that crosses a byte boundary simply
//! continues in the high bits of the next byte. Packing and unpacking walk
//! the field bit by bit and never depend on host byte order.

use crate::domain::error::FrameError;
use std::fmt;

/// Length of the configuration command in bytes
pub const COMMAND_LEN: usize = 15;

/// Length of the debug telemetry frame in bytes
pub const TELEMETRY_LEN: usize = 19;

/// Placement of one field inside a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    /// Bit offset from the MSB of byte 0
    pub offset: usize,
    /// Width in bits, 1..=64
    pub width: u32,
}

/// The part of a field that lives in a single byte, in register-map notation
/// `Byte<n>[high:low]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// Zero-based byte index
    pub byte: usize,
    pub high_bit: u8,
    pub low_bit: u8,
}

impl Segment {
    pub fn width(&self) -> u8 {
        self.high_bit - self.low_bit + 1
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.high_bit == self.low_bit {
            write!(f, "Byte{}[{}]", self.byte + 1, self.high_bit)
        } else {
            write!(f, "Byte{}[{}:{}]", self.byte + 1, self.high_bit, self.low_bit)
        }
    }
}

impl FieldSpec {
    pub const fn new(name: &'static str, offset: usize, width: u32) -> Self {
        Self { name, offset, width }
    }

    /// Largest value the field can hold
    pub fn max_value(&self) -> u64 {
        if self.width >= 64 {
            u64::MAX
        } else {
            (1u64 << self.width) - 1
        }
    }

    /// One past the last bit owned by the field
    pub fn end(&self) -> usize {
        self.offset + self.width as usize
    }

    /// Reject values that would need more bits than the field has
    pub fn check(&self, value: u64) -> Result<u64, FrameError> {
        if value > self.max_value() {
            return Err(FrameError::FieldOutOfRange {
                field: self.name,
                value,
                width: self.width,
            });
        }
        Ok(value)
    }

    fn require(&self, buf: &[u8]) -> Result<(), FrameError> {
        let needed = (self.end() + 7) / 8;
        if buf.len() < needed {
            return Err(FrameError::ShortBuffer {
                expected: needed,
                actual: buf.len(),
            });
        }
        Ok(())
    }

    /// Write `value` into the field's bits, leaving every other bit untouched
    pub fn pack(&self, buf: &mut [u8], value: u64) -> Result<(), FrameError> {
        self.check(value)?;
        self.require(buf)?;

        for i in 0..self.width {
            let bit = (value >> (self.width - 1 - i)) & 1;
            let pos = self.offset + i as usize;
            let mask = 0x80u8 >> (pos % 8);
            if bit == 1 {
                buf[pos / 8] |= mask;
            } else {
                buf[pos / 8] &= !mask;
            }
        }

        Ok(())
    }

    /// Read the field's bits as an unsigned value
    pub fn unpack(&self, buf: &[u8]) -> Result<u64, FrameError> {
        self.require(buf)?;

        let mut value = 0u64;
        for i in 0..self.width as usize {
            let pos = self.offset + i;
            let bit = (buf[pos / 8] >> (7 - pos % 8)) & 1;
            value = (value << 1) | u64::from(bit);
        }

        Ok(value)
    }

    /// Split the field into per-byte segments, first byte first
    pub fn segments(&self) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut pos = self.offset;

        while pos < self.end() {
            let byte = pos / 8;
            let first = pos % 8;
            let last = (self.end() - byte * 8).min(8) - 1;
            segments.push(Segment {
                byte,
                high_bit: (7 - first) as u8,
                low_bit: (7 - last) as u8,
            });
            pos = (byte + 1) * 8;
        }

        segments
    }
}

/// A complete fixed-length frame description
#[derive(Debug)]
pub struct FrameLayout {
    pub name: &'static str,
    pub len: usize,
    pub fields: &'static [FieldSpec],
}

impl FrameLayout {
    /// Look a field up by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Fail with `ShortBuffer` unless `buf` holds a whole frame
    pub fn require_len(&self, buf: &[u8]) -> Result<(), FrameError> {
        if buf.len() < self.len {
            return Err(FrameError::ShortBuffer {
                expected: self.len,
                actual: buf.len(),
            });
        }
        Ok(())
    }

    /// Bits claimed by the field table
    pub fn covered_bits(&self) -> usize {
        self.fields.iter().map(|field| field.width as usize).sum()
    }
}

/// Configuration command fields, Byte1..Byte15
pub mod command {
    use super::FieldSpec;

    pub const CLOCK_ENABLE: FieldSpec = FieldSpec::new("clock_enable", 0, 64);
    pub const PLL_CLKF: FieldSpec = FieldSpec::new("pll_clkf", 64, 6);
    pub const PLL_CLKR: FieldSpec = FieldSpec::new("pll_clkr", 70, 4);
    pub const PLL_CLKOD: FieldSpec = FieldSpec::new("pll_clkod", 74, 4);
    pub const PLL_BWADJ: FieldSpec = FieldSpec::new("pll_bwadj", 78, 6);
    pub const CHIP_X: FieldSpec = FieldSpec::new("chip_x", 84, 5);
    pub const CHIP_Y: FieldSpec = FieldSpec::new("chip_y", 89, 5);
    pub const GLOBAL_DELAY: FieldSpec = FieldSpec::new("global_delay", 94, 10);
    pub const GLOBAL_SIGNAL_WIDTH: FieldSpec = FieldSpec::new("global_signal_width", 104, 5);
    pub const GLOBAL_BUSY_MASK: FieldSpec = FieldSpec::new("global_busy_mask", 109, 10);
    pub const DEBUG_MODE_ENABLE: FieldSpec = FieldSpec::new("debug_mode_enable", 119, 1);
}

/// Debug telemetry fields, Byte1..Byte19
pub mod telemetry {
    use super::FieldSpec;

    pub const L5_BUSY: FieldSpec = FieldSpec::new("l5_busy", 0, 1);
    pub const L4_BUSY: FieldSpec = FieldSpec::new("l4_busy", 1, 4);
    pub const RESERVED: FieldSpec = FieldSpec::new("reserved", 5, 3);
    pub const L3_BUSY: FieldSpec = FieldSpec::new("l3_busy", 8, 16);
    pub const L2_BUSY: FieldSpec = FieldSpec::new("l2_busy", 24, 64);
    pub const L2_DONE: FieldSpec = FieldSpec::new("l2_done", 88, 64);
}

pub static COMMAND_LAYOUT: FrameLayout = FrameLayout {
    name: "command",
    len: COMMAND_LEN,
    fields: &[
        command::CLOCK_ENABLE,
        command::PLL_CLKF,
        command::PLL_CLKR,
        command::PLL_CLKOD,
        command::PLL_BWADJ,
        command::CHIP_X,
        command::CHIP_Y,
        command::GLOBAL_DELAY,
        command::GLOBAL_SIGNAL_WIDTH,
        command::GLOBAL_BUSY_MASK,
        command::DEBUG_MODE_ENABLE,
    ],
};

pub static TELEMETRY_LAYOUT: FrameLayout = FrameLayout {
    name: "telemetry",
    len: TELEMETRY_LEN,
    fields: &[
        telemetry::L5_BUSY,
        telemetry::L4_BUSY,
        telemetry::RESERVED,
        telemetry::L3_BUSY,
        telemetry::L2_BUSY,
        telemetry::L2_DONE,
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_tiles_exactly(layout: &FrameLayout) {
        let mut owner: Vec<Option<&str>> = vec![None; layout.len * 8];
        for field in layout.fields {
            for bit in field.offset..field.end() {
                assert!(
                    owner[bit].is_none(),
                    "{} bit {} claimed by {:?} and {}",
                    layout.name,
                    bit,
                    owner[bit],
                    field.name
                );
                owner[bit] = Some(field.name);
            }
        }
        assert!(owner.iter().all(Option::is_some), "{} has unassigned bits", layout.name);
        assert_eq!(layout.covered_bits(), layout.len * 8);
    }

    #[test]
    fn test_command_layout_tiles_fifteen_bytes() {
        assert_tiles_exactly(&COMMAND_LAYOUT);
    }

    #[test]
    fn test_telemetry_layout_tiles_nineteen_bytes() {
        assert_tiles_exactly(&TELEMETRY_LAYOUT);
    }

    #[test]
    fn test_split_field_segments() {
        let segments = command::PLL_CLKR.segments();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].to_string(), "Byte9[1:0]");
        assert_eq!(segments[1].to_string(), "Byte10[7:6]");

        let segments = command::CHIP_X.segments();
        assert_eq!(segments[0].to_string(), "Byte11[3:0]");
        assert_eq!(segments[1].to_string(), "Byte12[7]");

        let segments = command::GLOBAL_BUSY_MASK.segments();
        assert_eq!(segments[0].to_string(), "Byte14[2:0]");
        assert_eq!(segments[1].to_string(), "Byte15[7:1]");
        assert_eq!(segments.iter().map(Segment::width).sum::<u8>(), 10);
    }

    #[test]
    fn test_pack_boundary() {
        let mut buf = [0u8; COMMAND_LEN];
        command::PLL_CLKF.pack(&mut buf, 63).unwrap();
        assert_eq!(buf[8], 0b1111_1100);
        assert!(buf.iter().enumerate().all(|(i, b)| i == 8 || *b == 0));

        let err = command::PLL_CLKF.pack(&mut buf, 64).unwrap_err();
        assert_eq!(
            err,
            FrameError::FieldOutOfRange { field: "pll_clkf", value: 64, width: 6 }
        );
    }

    #[test]
    fn test_pack_preserves_neighbours() {
        let mut buf = [0xFFu8; COMMAND_LEN];
        command::PLL_CLKR.pack(&mut buf, 0).unwrap();
        assert_eq!(buf[8], 0b1111_1100);
        assert_eq!(buf[9], 0b0011_1111);
        assert_eq!(command::PLL_CLKR.unpack(&buf).unwrap(), 0);
        assert_eq!(command::PLL_CLKF.unpack(&buf).unwrap(), 63);
    }

    #[test]
    fn test_unpack_short_buffer() {
        let buf = [0u8; 10];
        assert_eq!(
            telemetry::L2_DONE.unpack(&buf),
            Err(FrameError::ShortBuffer { expected: 19, actual: 10 })
        );
    }

    #[test]
    fn test_full_width_field() {
        let mut buf = [0u8; TELEMETRY_LEN];
        telemetry::L2_BUSY.pack(&mut buf, u64::MAX).unwrap();
        assert_eq!(&buf[3..11], &[0xFF; 8]);
        assert_eq!(telemetry::L2_BUSY.unpack(&buf).unwrap(), u64::MAX);
        assert_eq!(telemetry::L2_DONE.unpack(&buf).unwrap(), 0);
    }

    #[test]
    fn test_field_lookup() {
        assert_eq!(COMMAND_LAYOUT.field("chip_y"), Some(&command::CHIP_Y));
        assert!(COMMAND_LAYOUT.field("nope").is_none());
    }
}
