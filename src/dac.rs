//! # DAC codec
//!
//! The output DACs are MCP49x1 family parts, single channel SPI DACs with 8, 10, or 12 bits of resolution. Each write is
//! one 16 bit frame, sent most significant byte first:
//!
//! ```text
//! bit 15   14    13   12     11 .. 0
//!     A/B  BUF   GA   SHDN   data, left aligned
//! ```
//!
//! The upper nibble is fixed: channel A, buffered reference, 1x gain, output active. The code sits left aligned in the
//! lower 12 bits, so a 10 bit code occupies bits 11..2 and the two lowest bits are don't-care.

/// The fixed control nibble, `0b0111`: channel A, buffered Vref, 1x gain, output active
pub const CONTROL_BITS: u8 = 0b0111;

/// The number of data bits in the frame, codes narrower than this are left aligned
const FRAME_DATA_BITS: u32 = 12;

/// The default resolution of the output DAC
pub const DEFAULT_CODE_WIDTH_BITS: u32 = 10;

/// One serial frame for the output DAC is represented here, most significant byte first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DacFrame(pub [u8; 2]);

impl DacFrame {
    /// `DacFrame::encode(v, vmax, bits)` is the frame which drives a `bits` wide DAC with full scale `vmax` to voltage `v`
    ///
    /// The voltage is clamped to `[0.0, vmax]` and floored to the code at or below it.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cv_quantizer::dac::DacFrame;
    /// let frame = DacFrame::encode(5.0, 5.0, 10);
    /// assert_eq!(frame.code(10), 1023);
    /// assert_eq!(frame.0, [0b0111_1111, 0b1111_1100]);
    /// ```
    pub fn encode(voltage: f32, v_max: f32, code_width_bits: u32) -> Self {
        let bits = clamp_width(code_width_bits);
        let max_code = max_code(bits);

        let voltage = voltage.max(0.0_f32).min(v_max);
        let code = (libm::floorf(voltage / volts_per_step(v_max, bits)) as u16).min(max_code);

        Self::from_code(code, bits)
    }

    /// `DacFrame::from_code(c, bits)` is the frame for raw `bits` wide code `c`
    pub fn from_code(code: u16, code_width_bits: u32) -> Self {
        let bits = clamp_width(code_width_bits);
        let data = (code & max_code(bits)) << (FRAME_DATA_BITS - bits);
        let word = ((CONTROL_BITS as u16) << FRAME_DATA_BITS) | data;
        Self(word.to_be_bytes())
    }

    /// `f.code(bits)` is the raw `bits` wide DAC code carried by the frame
    pub fn code(&self, code_width_bits: u32) -> u16 {
        let bits = clamp_width(code_width_bits);
        let data = u16::from_be_bytes(self.0) & 0x0FFF;
        data >> (FRAME_DATA_BITS - bits)
    }

    /// `f.decode(vmax, bits)` is the voltage a `bits` wide DAC with full scale `vmax` outputs when sent this frame
    pub fn decode(&self, v_max: f32, code_width_bits: u32) -> f32 {
        let bits = clamp_width(code_width_bits);
        self.code(bits) as f32 * volts_per_step(v_max, bits)
    }

    /// `f.control_bits()` is the upper control nibble of the frame
    pub fn control_bits(&self) -> u8 {
        self.0[0] >> 4
    }
}

/// `volts_per_step(vmax, bits)` is the output voltage change for one code step
///
/// The DAC reaches its full scale at the maximum code, so the step is `vmax / (2^bits - 1)`.
pub fn volts_per_step(v_max: f32, code_width_bits: u32) -> f32 {
    v_max / max_code(clamp_width(code_width_bits)) as f32
}

/// `max_code(bits)` is the largest code a `bits` wide DAC accepts
const fn max_code(bits: u32) -> u16 {
    ((1_u32 << bits) - 1) as u16
}

/// `clamp_width(bits)` is `bits` clamped to the supported widths `[8, 12]`
const fn clamp_width(bits: u32) -> u32 {
    if bits < 8 {
        8
    } else if FRAME_DATA_BITS < bits {
        FRAME_DATA_BITS
    } else {
        bits
    }
}
