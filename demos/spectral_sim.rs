//! Run the spectral pitch quantizer against a simulated audio input
//!
//! The input is a sawtooth gliding up from A1 to A5, one block at a time. The harmonics of the sawtooth are tamed with
//! the optional lowpass pre-filter. Run with `RUST_LOG=debug` to see every block.

use cv_quantizer::{
    config::{Config, SPECTRAL_KEYS, SPECTRAL_NSAMP},
    dac::DacFrame,
    hal::{AdcCaptureSource, Channel, SampleBuffer, SpiDacSink},
    spectral::{SpectralPitchEstimator, Window},
    spectral_loop::SpectralQuantizer,
};

/// An 8 bit ADC sampling a sawtooth oscillator
struct SawtoothAdc {
    sample_rate_hz: f32,
    frequency_hz: f32,
    phase: f32,
}

impl AdcCaptureSource<SPECTRAL_NSAMP> for SawtoothAdc {
    type Error = std::convert::Infallible;

    fn capture(
        &mut self,
        _channel: Channel,
        buffer: &mut SampleBuffer<SPECTRAL_NSAMP>,
    ) -> nb::Result<(), Self::Error> {
        while !buffer.is_full() {
            let code = (self.phase * 200.0 + 28.0) as u16;
            let _ = buffer.push(code);
            self.phase = (self.phase + self.frequency_hz / self.sample_rate_hz).fract();
        }
        // glide up one semitone per block
        self.frequency_hz *= 2.0_f32.powf(1.0 / 12.0);
        Ok(())
    }
}

struct PrintingDac;

impl SpiDacSink for PrintingDac {
    type Error = std::convert::Infallible;

    fn write(&mut self, channel: Channel, frame: DacFrame) -> nb::Result<(), Self::Error> {
        log::info!("DAC {channel}: {:02X} {:02X}", frame.0[0], frame.0[1]);
        Ok(())
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config::spectral();

    let estimator = SpectralPitchEstimator::<SPECTRAL_NSAMP>::new(config.sample_rate_hz)
        .with_window(Window::Hann)
        .with_prefilter(1_000.0)?;

    let adc = SawtoothAdc {
        sample_rate_hz: config.sample_rate_hz,
        frequency_hz: 55.0,
        phase: 0.0,
    };

    let mut quantizer =
        SpectralQuantizer::<_, _, SPECTRAL_KEYS, SPECTRAL_NSAMP>::with_estimator(config, estimator, adc, PrintingDac)?;

    // four octaves, one semitone per block
    for _ in 0..=48 {
        let reading = quantizer.run_once()?;
        println!(
            "peak {:7.2}Hz (bin {:3}) -> note {:3} at {:7.2}Hz, output {:.3}V",
            reading.peak.frequency_hz, reading.peak.bin, reading.index, reading.quantized_hz, reading.voltage
        );
    }

    Ok(())
}
