//! # Spectral quantizer loop
//!
//! The single channel build of the quantizer listens to an audio signal instead of a control voltage. It runs free,
//! with no gates and no scale switches:
//!
//! 1. capture a block of samples
//! 2. estimate the pitch of the block from its strongest FFT bin
//! 3. snap the pitch DOWN onto the frequency table
//! 4. output the voltage of that note on channel `A`
//!
//! The same index is used for both tables, so the output is a 1 volt per octave control voltage tracking the input
//! pitch, one semitone step at a time.

use crate::{
    config::Config,
    dac::DacFrame,
    dispatcher::{capture_block, emit_frame, ChannelState},
    error::{ConfigError, Error},
    hal::{AdcCaptureSource, Channel, SampleBuffer, SpiDacSink},
    quantizer::quantize_floor,
    spectral::{SpectralPeak, SpectralPitchEstimator},
    tables::{generate_frequency_table, generate_voltage_table, NoteTable},
};

/// The output channel of the spectral tracker
pub const OUTPUT_CHANNEL: Channel = Channel::A;

/// The result of one pass of the loop is represented here
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralReading {
    /// The strongest bin of the captured block
    pub peak: SpectralPeak,

    /// The index of the note the peak was snapped to
    pub index: usize,

    /// The nominal frequency of that note
    pub quantized_hz: f32,

    /// The voltage written to the DAC
    pub voltage: f32,

    pub frame: DacFrame,
}

/// The free running spectral pitch quantizer is represented here.
///
/// `KEYS` is the length of the note tables, `NSAMP` is the FFT block length.
pub struct SpectralQuantizer<ADC, DAC, const KEYS: usize, const NSAMP: usize> {
    config: Config,

    frequencies: NoteTable<KEYS>,
    voltages: NoteTable<KEYS>,

    estimator: SpectralPitchEstimator<NSAMP>,
    buffer: SampleBuffer<NSAMP>,

    output: ChannelState,

    adc: ADC,
    dac: DAC,
}

impl<ADC, DAC, const KEYS: usize, const NSAMP: usize> SpectralQuantizer<ADC, DAC, KEYS, NSAMP>
where
    ADC: AdcCaptureSource<NSAMP>,
    DAC: SpiDacSink,
{
    /// `SpectralQuantizer::new(cfg, adc, dac)` is a new spectral quantizer with a rectangular window and no pre-filter
    ///
    /// # Errors
    ///
    /// Fails if `cfg` doesn't validate.
    pub fn new(config: Config, adc: ADC, dac: DAC) -> Result<Self, ConfigError> {
        let estimator = SpectralPitchEstimator::new(config.sample_rate_hz);
        Self::with_estimator(config, estimator, adc, dac)
    }

    /// `SpectralQuantizer::with_estimator(cfg, est, adc, dac)` is a new spectral quantizer using the pre-configured
    /// estimator `est`
    ///
    /// # Errors
    ///
    /// Fails if `cfg` doesn't validate.
    pub fn with_estimator(
        config: Config,
        estimator: SpectralPitchEstimator<NSAMP>,
        adc: ADC,
        dac: DAC,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            frequencies: generate_frequency_table(config.root_frequency_hz),
            voltages: generate_voltage_table(config.volts_per_semitone, config.voltage_origin_step),
            config,
            estimator,
            buffer: SampleBuffer::new(),
            output: ChannelState::default(),
            adc,
            dac,
        })
    }

    /// `sq.run_once()` captures one block, quantizes its pitch, and writes the matching voltage
    ///
    /// # Errors
    ///
    /// Hardware failures and timeouts. The output keeps its previous voltage.
    pub fn run_once(&mut self) -> Result<SpectralReading, Error<ADC::Error, DAC::Error>> {
        self.adc.settle(self.config.settle_ms);
        capture_block(
            &mut self.adc,
            OUTPUT_CHANNEL,
            &mut self.buffer,
            self.config.capture_poll_limit,
        )?;

        let peak = self.estimator.find_peak(&self.buffer);
        let index = quantize_floor(peak.frequency_hz, &self.frequencies);
        let quantized_hz = self.frequencies[index];

        let voltage = self.voltages[index].min(self.config.dac_v_max);
        let frame = DacFrame::encode(voltage, self.config.dac_v_max, self.config.dac_code_width_bits);
        emit_frame(&mut self.dac, OUTPUT_CHANNEL, frame, self.config.write_poll_limit)?;
        self.output.record(index, voltage);

        log::debug!(
            "bin {}: {:.3}Hz, quantized to {quantized_hz:.3}Hz, output {voltage:.4}V",
            peak.bin,
            peak.frequency_hz
        );

        Ok(SpectralReading {
            peak,
            index,
            quantized_hz,
            voltage,
            frame,
        })
    }

    /// `sq.run()` loops forever, only returning the first hardware error
    pub fn run(&mut self) -> Error<ADC::Error, DAC::Error> {
        loop {
            if let Err(e) = self.run_once() {
                log::error!("{e}");
                return e;
            }
        }
    }

    /// `sq.output()` is the bookkeeping for the output channel
    pub fn output(&self) -> &ChannelState {
        &self.output
    }

    /// `sq.frequencies()` is the frequency table
    pub fn frequencies(&self) -> &NoteTable<KEYS> {
        &self.frequencies
    }

    /// `sq.voltages()` is the voltage table
    pub fn voltages(&self) -> &NoteTable<KEYS> {
        &self.voltages
    }

    /// `sq.release()` tears down the quantizer and hands back the hardware collaborators
    pub fn release(self) -> (ADC, DAC) {
        (self.adc, self.dac)
    }
}
