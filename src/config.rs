//! # Configuration
//!
//! All tunable constants of the quantizer engines live in [`Config`]. The defaults reproduce the dual-channel module
//! hardware, [`Config::spectral`] reproduces the single channel spectral pitch tracker.
//!
//! Table and sample block lengths are compile time constants, passed to the engines as const generic arguments. The
//! lengths used by the two hardware builds are exported here.

use crate::{dac, error::ConfigError, tables::VOLTS_PER_SEMITONE};

/// Number of notes in the dual-channel tables, six octaves starting at C0
pub const DUAL_CHANNEL_KEYS: usize = 6 * 12;

/// Number of samples averaged per gate in the dual-channel module
pub const DUAL_CHANNEL_NSAMP: usize = 10;

/// Number of notes in the spectral tables, ten octaves starting at A0
pub const SPECTRAL_KEYS: usize = 120;

/// Number of samples per FFT block in the spectral tracker
pub const SPECTRAL_NSAMP: usize = 2048;

/// The lowest root frequency that still gives distinct table entries after rounding to 3 decimal places
pub const MIN_ROOT_FREQUENCY_HZ: f32 = 0.1;

/// C0, the frequency at zero volts for the dual-channel module
const C0_HZ: f32 = 16.35;

/// A0, the frequency at zero volts for the spectral tracker
const A0_HZ: f32 = 27.5;

/// Quantizer engine configuration is represented here
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    /// Frequency of the first note in the frequency table, in Hertz
    pub root_frequency_hz: f32,

    /// Width of one semitone in the voltage table, in volts
    pub volts_per_semitone: f32,

    /// Semitones between zero volts and the first voltage table entry
    pub voltage_origin_step: usize,

    /// ADC sample rate, in Hertz
    pub sample_rate_hz: f32,

    /// ADC full scale voltage
    pub adc_v_max: f32,

    /// Fraction of the jack voltage that reaches the ADC through the input divider
    pub input_divider: f32,

    /// Width of each raw ADC code, in bits
    pub adc_code_width_bits: u32,

    /// DAC full scale voltage
    pub dac_v_max: f32,

    /// Width of each DAC code, in bits
    pub dac_code_width_bits: u32,

    /// Time to let the input CV settle after a gate before sampling, in milliseconds
    pub settle_ms: u32,

    /// Maximum number of polls to wait for a capture to complete
    pub capture_poll_limit: u32,

    /// Maximum number of polls to wait for a DAC write to complete
    pub write_poll_limit: u32,
}

impl Default for Config {
    /// `Config::default()` is the dual-channel module configuration
    fn default() -> Self {
        Self {
            root_frequency_hz: C0_HZ,
            volts_per_semitone: VOLTS_PER_SEMITONE,
            voltage_origin_step: 0,
            sample_rate_hz: 5_000.0_f32,
            adc_v_max: 3.3_f32,
            input_divider: 0.333_f32,
            // the ADC FIFO shifts every sample down to 8 bits for byte-wide DMA
            adc_code_width_bits: 8,
            dac_v_max: 5.0_f32,
            dac_code_width_bits: dac::DEFAULT_CODE_WIDTH_BITS,
            settle_ms: 10,
            capture_poll_limit: 1_000_000,
            write_poll_limit: 10_000,
        }
    }
}

impl Config {
    /// `Config::dual_channel()` is the dual-channel module configuration, same as the default
    pub fn dual_channel() -> Self {
        Self::default()
    }

    /// `Config::spectral()` is the spectral pitch tracker configuration
    ///
    /// The spectral build measures audio rate signals directly, so there is no settling delay and no input divider.
    pub fn spectral() -> Self {
        Self {
            root_frequency_hz: A0_HZ,
            voltage_origin_step: 1,
            sample_rate_hz: 8_000.0_f32,
            input_divider: 1.0_f32,
            settle_ms: 0,
            ..Self::default()
        }
    }

    /// `cfg.validate()` is `Ok` iff every value is in range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(MIN_ROOT_FREQUENCY_HZ <= self.root_frequency_hz && self.root_frequency_hz.is_finite()) {
            return Err(ConfigError::RootFrequency(self.root_frequency_hz));
        }
        if !is_positive(self.volts_per_semitone) {
            return Err(ConfigError::VoltsPerSemitone(self.volts_per_semitone));
        }
        if !is_positive(self.sample_rate_hz) {
            return Err(ConfigError::SampleRate(self.sample_rate_hz));
        }
        if !is_positive(self.adc_v_max) {
            return Err(ConfigError::AdcFullScale(self.adc_v_max));
        }
        if !is_positive(self.input_divider) {
            return Err(ConfigError::InputDivider(self.input_divider));
        }
        if !(1..=16).contains(&self.adc_code_width_bits) {
            return Err(ConfigError::AdcCodeWidth(self.adc_code_width_bits));
        }
        if !is_positive(self.dac_v_max) {
            return Err(ConfigError::DacFullScale(self.dac_v_max));
        }
        if !(8..=12).contains(&self.dac_code_width_bits) {
            return Err(ConfigError::DacCodeWidth(self.dac_code_width_bits));
        }
        if self.capture_poll_limit == 0 || self.write_poll_limit == 0 {
            return Err(ConfigError::PollLimit);
        }
        Ok(())
    }
}

/// `is_positive(v)` is true iff `v` is finite and greater than zero
fn is_positive(val: f32) -> bool {
    val.is_finite() && 0.0_f32 < val
}
