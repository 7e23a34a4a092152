//! Errors reported by the quantizer engines

use core::fmt;

use crate::hal::Channel;

/// Hardware errors during a capture or output cycle are represented here.
///
/// `AE` and `DE` are the error types of the ADC and DAC collaborators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<AE, DE> {
    /// The ADC never finished filling the sample buffer within the poll budget
    CaptureTimeout { channel: Channel },

    /// The ADC reported a finished transfer without filling the whole sample buffer
    IncompleteCapture {
        channel: Channel,
        expected: usize,
        received: usize,
    },

    /// The ADC collaborator failed
    Capture(AE),

    /// The DAC never accepted the frame within the poll budget
    WriteTimeout { channel: Channel },

    /// The DAC collaborator failed
    Write(DE),
}

impl<AE: fmt::Debug, DE: fmt::Debug> fmt::Display for Error<AE, DE> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::CaptureTimeout { channel } => write!(f, "capture on channel {channel} timed out"),
            Error::IncompleteCapture {
                channel,
                expected,
                received,
            } => write!(
                f,
                "capture on channel {channel} delivered {received} of {expected} samples"
            ),
            Error::Capture(e) => write!(f, "capture failed: {e:?}"),
            Error::WriteTimeout { channel } => write!(f, "DAC write on channel {channel} timed out"),
            Error::Write(e) => write!(f, "DAC write failed: {e:?}"),
        }
    }
}

#[cfg(feature = "std")]
impl<AE: fmt::Debug, DE: fmt::Debug> std::error::Error for Error<AE, DE> {}

/// Invalid configuration values are represented here
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConfigError {
    /// The root frequency is too low for 3 decimal rounding to keep the table strictly increasing
    RootFrequency(f32),
    VoltsPerSemitone(f32),
    SampleRate(f32),
    AdcFullScale(f32),
    InputDivider(f32),
    AdcCodeWidth(u32),
    DacFullScale(f32),
    DacCodeWidth(u32),
    /// Poll limits must allow at least one poll
    PollLimit,
    /// The pre-filter cutoff must sit between zero and the Nyquist frequency
    PrefilterCutoff(f32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::RootFrequency(v) => write!(f, "root frequency {v} Hz is too low"),
            ConfigError::VoltsPerSemitone(v) => write!(f, "volts per semitone {v} must be positive"),
            ConfigError::SampleRate(v) => write!(f, "sample rate {v} Hz must be positive"),
            ConfigError::AdcFullScale(v) => write!(f, "ADC full scale {v} V must be positive"),
            ConfigError::InputDivider(v) => write!(f, "input divider {v} must be positive"),
            ConfigError::AdcCodeWidth(v) => write!(f, "ADC code width {v} is not in [1, 16]"),
            ConfigError::DacFullScale(v) => write!(f, "DAC full scale {v} V must be positive"),
            ConfigError::DacCodeWidth(v) => write!(f, "DAC code width {v} is not in [8, 12]"),
            ConfigError::PollLimit => write!(f, "poll limits must be at least 1"),
            ConfigError::PrefilterCutoff(v) => write!(f, "pre-filter cutoff {v} Hz is outside (0, nyquist)"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for ConfigError {}
