//! Run the dual-channel quantizer against simulated hardware
//!
//! Two slow triangle LFOs feed the channel inputs, each channel is clocked by its own gate, and the scale switches are
//! flipped partway through. Run with `RUST_LOG=debug` to watch the dispatcher work.

use cv_quantizer::{
    config::{Config, DUAL_CHANNEL_KEYS, DUAL_CHANNEL_NSAMP},
    dac::DacFrame,
    dispatcher::{EventDispatcher, Outcome},
    hal::{AdcCaptureSource, Channel, GateInputSource, SampleBuffer, ScaleInputSource, SpiDacSink},
    scale::{Mode, Note},
};

/// An 8 bit ADC behind the 1/3 input divider, sampling a voltage per channel
struct SimAdc {
    jack_voltages: [f32; 2],
    noise: u16,
}

impl AdcCaptureSource<DUAL_CHANNEL_NSAMP> for SimAdc {
    type Error = std::convert::Infallible;

    fn settle(&mut self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(ms as u64));
    }

    fn capture(
        &mut self,
        channel: Channel,
        buffer: &mut SampleBuffer<DUAL_CHANNEL_NSAMP>,
    ) -> nb::Result<(), Self::Error> {
        let at_adc = self.jack_voltages[channel.index()] * 0.333;
        let code = (at_adc / 3.3 * 256.0).clamp(0.0, 255.0) as u16;
        while !buffer.is_full() {
            // a little dither, +/-1 code
            self.noise = (self.noise + 1) % 3;
            let _ = buffer.push((code + self.noise).saturating_sub(1));
        }
        Ok(())
    }
}

/// A pair of MCP4911 DACs, which just remember their last frame
#[derive(Default)]
struct SimDac {
    frames: [Option<DacFrame>; 2],
}

impl SpiDacSink for SimDac {
    type Error = std::convert::Infallible;

    fn write(&mut self, channel: Channel, frame: DacFrame) -> nb::Result<(), Self::Error> {
        self.frames[channel.index()] = Some(frame);
        Ok(())
    }
}

#[derive(Default)]
struct SimGates {
    latched: [bool; 2],
}

impl GateInputSource for SimGates {
    fn take_edge(&mut self) -> Option<Channel> {
        let channel = Channel::ALL.into_iter().find(|ch| self.latched[ch.index()])?;
        self.latched[channel.index()] = false;
        Some(channel)
    }
}

struct SimSwitches {
    levels: u16,
    changed: bool,
}

impl ScaleInputSource for SimSwitches {
    fn take_edge(&mut self) -> bool {
        std::mem::replace(&mut self.changed, false)
    }

    fn read_note_levels(&mut self) -> u16 {
        self.levels
    }
}

/// `triangle(t, period, peak)` is a triangle wave from zero to `peak` volts
fn triangle(t: f32, period: f32, peak: f32) -> f32 {
    let phase = (t / period).fract();
    peak * (1.0 - (2.0 * phase - 1.0).abs())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let config = Config {
        // no need to actually wait in the simulation
        settle_ms: 0,
        ..Config::dual_channel()
    };

    let adc = SimAdc {
        jack_voltages: [0.0; 2],
        noise: 0,
    };
    let switches = SimSwitches {
        // switches are active low, start out in C major
        levels: !Mode::Major.mask(Note::C).bits(),
        changed: false,
    };

    let mut quantizer = EventDispatcher::<_, _, _, _, DUAL_CHANNEL_KEYS, DUAL_CHANNEL_NSAMP>::new(
        config,
        adc,
        SimDac::default(),
        SimGates::default(),
        switches,
    )?;

    const NUM_STEPS: usize = 48;
    let mut adc_inputs = [0.0_f32; 2];

    for step in 0..NUM_STEPS {
        let t = step as f32;
        adc_inputs[Channel::A.index()] = triangle(t, 24.0, 3.0);
        adc_inputs[Channel::B.index()] = triangle(t, 16.0, 2.0) + 1.0;

        if step == NUM_STEPS / 2 {
            let a_minor = Mode::Aeolian.mask(Note::A);
            let switches = quantizer.scale_input_mut();
            switches.levels = !a_minor.bits();
            switches.changed = true;
        }

        // channel A is clocked every step, channel B every other step
        quantizer.gates_mut().latched = [true, step % 2 == 0];

        quantizer.adc_mut().jack_voltages = adc_inputs;

        while let Some(outcome) = quantizer.poll()? {
            match outcome {
                Outcome::Emitted(e) => println!(
                    "step {step:2} ch {}: in {:.3}V -> {:.3}V ({:.2}Hz) code {}",
                    e.channel,
                    e.input_voltage,
                    e.voltage,
                    e.frequency_hz,
                    e.frame.code(config.dac_code_width_bits)
                ),
                Outcome::Held { channel, .. } => println!("step {step:2} ch {channel}: held"),
                Outcome::ScaleChanged(mask) => println!("step {step:2}: scale is now {mask:012b}"),
            }
        }
    }

    Ok(())
}
