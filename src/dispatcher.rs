//! # Event dispatcher
//!
//! The dual-channel quantizer is driven entirely by input edges. Each of the two channels has a gate input, and a
//! falling edge on a gate means "sample this channel now". The 12 scale switches also raise an edge whenever any of
//! them is flipped.
//!
//! All edges funnel into one dispatcher which handles them strictly one at a time:
//!
//! ```text
//!            gate edge on C                  buffer full
//!   Idle  ------------------>  Sampling(C)  ------------->  Emitting(C)
//!    ^  \                                                        |
//!    |   \ scale edge (rebuild the scale mask)                   |
//!    |    `------> Idle                                          |
//!    `------------------------------ done -----------------------'
//! ```
//!
//! While sampling, the average input voltage is snapped down onto the voltage table, corrected into the current scale,
//! and written to the channel's DAC. If the scale has no usable note at or within an octave below the input, nothing
//! is written and the channel keeps outputting its previous voltage.
//!
//! ## Missed edges
//!
//! A capture blocks the dispatcher until the ADC has filled the whole sample buffer. Edges that arrive during that time
//! are left in their input latches, and a latch only holds one pending edge. Several gate edges on the same channel, or
//! several switch flips, collapse into a single event, and an edge source without a latch loses them entirely. This is
//! a property of the hardware event model, there is deliberately no event queue here.
//!
//! All state that an event touches (the scale mask, the per-channel bookkeeping, the sample buffer) is owned by the
//! dispatcher and only mutated through `&mut self`, so the single-threaded borrow rules provide the serialization the
//! hardware interrupt controller provides on the module.

use crate::{
    averager::average_voltage,
    config::Config,
    dac::DacFrame,
    error::{ConfigError, Error},
    hal::{
        block_bounded, AdcCaptureSource, Bounded, Channel, Event, GateInputSource, SampleBuffer, ScaleInputSource,
        SpiDacSink,
    },
    quantizer::quantize_floor,
    scale::{self, ScaleMask},
    tables::{generate_frequency_table, generate_voltage_table, NoteTable},
};

/// The states of the dispatcher are represented here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Waiting for the next event
    Idle,

    /// Capturing a block of samples for a channel
    Sampling(Channel),

    /// Writing a new output voltage for a channel
    Emitting(Channel),
}

/// Per-channel bookkeeping is represented here
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ChannelState {
    last_index: Option<usize>,
    last_voltage: Option<f32>,
}

impl ChannelState {
    /// `cs.last_index()` is the table index of the last voltage written to the channel, if any
    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }

    /// `cs.last_voltage()` is the last voltage written to the channel, if any
    ///
    /// This is the voltage the channel holds when a correction fails.
    pub fn last_voltage(&self) -> Option<f32> {
        self.last_voltage
    }

    pub(crate) fn record(&mut self, index: usize, voltage: f32) {
        self.last_index = Some(index);
        self.last_voltage = Some(voltage);
    }
}

/// A successful output update is represented here
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Emission {
    pub channel: Channel,

    /// The averaged input voltage at the jack
    pub input_voltage: f32,

    /// The table index the input was quantized to, before scale correction
    pub raw_index: usize,

    /// The table index after scale correction
    pub index: usize,

    /// The nominal frequency of the corrected note
    pub frequency_hz: f32,

    /// The voltage written to the DAC
    pub voltage: f32,

    pub frame: DacFrame,
}

/// The result of handling one event is represented here
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Outcome {
    /// A new voltage was written to a channel
    Emitted(Emission),

    /// The channel kept its previous voltage because no note of the scale was usable
    ///
    /// `raw_index` is `None` when the scale was empty and no capture was made at all.
    Held {
        channel: Channel,
        raw_index: Option<usize>,
    },

    /// The scale switches were re-read
    ScaleChanged(ScaleMask),
}

/// The dual-channel event driven quantizer is represented here.
///
/// # Generic arguments:
///
/// * `ADC`, `DAC`, `G`, `S` - the hardware collaborators, see [`crate::hal`]
///
/// * `KEYS` - the number of notes in the frequency and voltage tables
///
/// * `NSAMP` - the number of samples averaged for each gate
pub struct EventDispatcher<ADC, DAC, G, S, const KEYS: usize, const NSAMP: usize> {
    config: Config,

    frequencies: NoteTable<KEYS>,
    voltages: NoteTable<KEYS>,

    scale: ScaleMask,
    channels: [ChannelState; 2],
    state: State,

    buffer: SampleBuffer<NSAMP>,

    adc: ADC,
    dac: DAC,
    gates: G,
    scale_input: S,
}

impl<ADC, DAC, G, S, const KEYS: usize, const NSAMP: usize> EventDispatcher<ADC, DAC, G, S, KEYS, NSAMP>
where
    ADC: AdcCaptureSource<NSAMP>,
    DAC: SpiDacSink,
    G: GateInputSource,
    S: ScaleInputSource,
{
    /// `EventDispatcher::new(cfg, adc, dac, g, s)` is a new dispatcher, with its tables built and the scale switches read
    ///
    /// # Errors
    ///
    /// Fails if `cfg` doesn't validate.
    pub fn new(config: Config, adc: ADC, dac: DAC, gates: G, scale_input: S) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut dispatcher = Self {
            frequencies: generate_frequency_table(config.root_frequency_hz),
            voltages: generate_voltage_table(config.volts_per_semitone, config.voltage_origin_step),
            config,
            scale: ScaleMask::EMPTY,
            channels: [ChannelState::default(); 2],
            state: State::Idle,
            buffer: SampleBuffer::new(),
            adc,
            dac,
            gates,
            scale_input,
        };

        // pick up the switch positions at power up, before any edge has happened
        dispatcher.reconfigure_scale();

        Ok(dispatcher)
    }

    /// `d.next_event()` is the next pending input event, if any, taken from the input latches
    ///
    /// Scale changes are serviced before gates, gate `A` before gate `B`.
    pub fn next_event(&mut self) -> Option<Event> {
        if self.scale_input.take_edge() {
            Some(Event::ScaleChanged)
        } else {
            self.gates.take_edge().map(Event::GateTriggered)
        }
    }

    /// `d.poll()` handles at most one pending event
    ///
    /// Returns `Ok(None)` when no event was pending. Call this from the main loop or from the shared edge interrupt.
    pub fn poll(&mut self) -> Result<Option<Outcome>, Error<ADC::Error, DAC::Error>> {
        match self.next_event() {
            Some(event) => self.handle(event).map(Some),
            None => Ok(None),
        }
    }

    /// `d.handle(e)` runs event `e` to completion and returns the dispatcher to `Idle`
    ///
    /// # Errors
    ///
    /// Hardware failures and timeouts during the capture or the DAC write. The channel keeps its previous output.
    pub fn handle(&mut self, event: Event) -> Result<Outcome, Error<ADC::Error, DAC::Error>> {
        let res = match event {
            Event::ScaleChanged => Ok(Outcome::ScaleChanged(self.reconfigure_scale())),
            Event::GateTriggered(channel) => self.quantize_channel(channel),
        };

        if let Err(e) = &res {
            log::warn!("{e}");
        }
        self.set_state(State::Idle);

        res
    }

    /// `d.reconfigure_scale()` reads the scale switches and replaces the current scale with what they select
    fn reconfigure_scale(&mut self) -> ScaleMask {
        self.scale = ScaleMask::from_switch_levels(self.scale_input.read_note_levels());
        log::info!("configured scale: {:012b}", self.scale);
        self.scale
    }

    /// `d.quantize_channel(ch)` samples, quantizes, corrects, and outputs channel `ch`
    fn quantize_channel(&mut self, channel: Channel) -> Result<Outcome, Error<ADC::Error, DAC::Error>> {
        if self.scale.is_empty() {
            log::warn!("channel {channel}: no notes selected, holding output");
            return Ok(Outcome::Held {
                channel,
                raw_index: None,
            });
        }

        self.set_state(State::Sampling(channel));
        self.adc.settle(self.config.settle_ms);
        capture_block(&mut self.adc, channel, &mut self.buffer, self.config.capture_poll_limit)?;

        let input_voltage = average_voltage(
            &self.buffer,
            self.config.adc_v_max,
            self.config.input_divider,
            self.config.adc_code_width_bits,
        );
        let raw_index = quantize_floor(input_voltage, &self.voltages);

        let index = match scale::correct(raw_index, self.scale, KEYS) {
            Some(idx) => idx,
            None => {
                log::warn!("channel {channel}: no scale note at or below index {raw_index}, holding output");
                return Ok(Outcome::Held {
                    channel,
                    raw_index: Some(raw_index),
                });
            }
        };
        if index != raw_index {
            log::debug!("channel {channel}: floored index {raw_index} to {index}");
        }

        self.set_state(State::Emitting(channel));
        let voltage = self.voltages[index].min(self.config.dac_v_max);
        let frame = DacFrame::encode(voltage, self.config.dac_v_max, self.config.dac_code_width_bits);
        emit_frame(&mut self.dac, channel, frame, self.config.write_poll_limit)?;

        self.channels[channel.index()].record(index, voltage);

        let frequency_hz = self.frequencies[index];
        log::debug!(
            "channel {channel}: sampled {input_voltage:.4}V, quantized to {voltage:.4}V ({frequency_hz:.1}Hz, index {index})"
        );

        Ok(Outcome::Emitted(Emission {
            channel,
            input_voltage,
            raw_index,
            index,
            frequency_hz,
            voltage,
            frame,
        }))
    }

    fn set_state(&mut self, state: State) {
        if self.state != state {
            log::trace!("{:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// `d.state()` is the current dispatcher state, always `Idle` between events
    pub fn state(&self) -> State {
        self.state
    }

    /// `d.scale()` is the scale currently selected by the switches
    pub fn scale(&self) -> ScaleMask {
        self.scale
    }

    /// `d.channel_state(ch)` is the bookkeeping for channel `ch`
    pub fn channel_state(&self, channel: Channel) -> &ChannelState {
        &self.channels[channel.index()]
    }

    /// `d.voltages()` is the voltage table
    pub fn voltages(&self) -> &NoteTable<KEYS> {
        &self.voltages
    }

    /// `d.frequencies()` is the frequency table
    pub fn frequencies(&self) -> &NoteTable<KEYS> {
        &self.frequencies
    }

    /// `d.config()` is the configuration the dispatcher was built with
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// `d.adc()` is the ADC collaborator
    pub fn adc(&self) -> &ADC {
        &self.adc
    }

    /// `d.adc_mut()` is the ADC collaborator
    pub fn adc_mut(&mut self) -> &mut ADC {
        &mut self.adc
    }

    /// `d.dac()` is the DAC collaborator
    pub fn dac(&self) -> &DAC {
        &self.dac
    }

    /// `d.gates_mut()` is the gate input collaborator
    pub fn gates_mut(&mut self) -> &mut G {
        &mut self.gates
    }

    /// `d.scale_input_mut()` is the scale switch collaborator
    pub fn scale_input_mut(&mut self) -> &mut S {
        &mut self.scale_input
    }

    /// `d.release()` tears down the dispatcher and hands back the hardware collaborators
    pub fn release(self) -> (ADC, DAC, G, S) {
        (self.adc, self.dac, self.gates, self.scale_input)
    }
}

/// `capture_block(adc, ch, buf, n)` fills `buf` with a complete capture of channel `ch`, polling `adc` at most `n` times
pub(crate) fn capture_block<A, DE, const NSAMP: usize>(
    adc: &mut A,
    channel: Channel,
    buffer: &mut SampleBuffer<NSAMP>,
    max_polls: u32,
) -> Result<(), Error<A::Error, DE>>
where
    A: AdcCaptureSource<NSAMP>,
{
    buffer.clear();

    block_bounded(max_polls, || adc.capture(channel, buffer)).map_err(|e| match e {
        Bounded::TimedOut => Error::CaptureTimeout { channel },
        Bounded::Failed(e) => Error::Capture(e),
    })?;

    if !buffer.is_full() {
        return Err(Error::IncompleteCapture {
            channel,
            expected: NSAMP,
            received: buffer.len(),
        });
    }

    Ok(())
}

/// `emit_frame(dac, ch, f, n)` writes frame `f` to the DAC for channel `ch`, polling `dac` at most `n` times
pub(crate) fn emit_frame<D, AE>(
    dac: &mut D,
    channel: Channel,
    frame: DacFrame,
    max_polls: u32,
) -> Result<(), Error<AE, D::Error>>
where
    D: SpiDacSink,
{
    log::trace!("channel {channel}: writing frame {:08b} {:08b}", frame.0[0], frame.0[1]);

    block_bounded(max_polls, || dac.write(channel, frame)).map_err(|e| match e {
        Bounded::TimedOut => Error::WriteTimeout { channel },
        Bounded::Failed(e) => Error::Write(e),
    })
}

#[cfg(test)]
pub(crate) mod mock {
    //! Stand-in hardware for exercising the engines off target

    use heapless::{Deque, Vec};

    use crate::{
        dac::DacFrame,
        hal::{AdcCaptureSource, Channel, GateInputSource, SampleBuffer, ScaleInputSource, SpiDacSink},
    };

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Fault;

    /// An ADC that fills each capture with one constant code per block, after being busy for a few polls
    pub struct MockAdc {
        pub blocks: Deque<u16, 8>,
        pub last_code: u16,
        pub busy_polls: u32,
        pub short: bool,
        pub fail: bool,
        pub captures: Vec<Channel, 16>,
        pub settle_ms: Option<u32>,
        polls_left: u32,
        in_flight: bool,
    }

    impl Default for MockAdc {
        fn default() -> Self {
            Self {
                blocks: Deque::new(),
                last_code: 0,
                busy_polls: 0,
                short: false,
                fail: false,
                captures: Vec::new(),
                settle_ms: None,
                polls_left: 0,
                in_flight: false,
            }
        }
    }

    impl MockAdc {
        /// `MockAdc::with_blocks(cs)` is an ADC which returns a block of code `c` for each `c` in `cs`, in order
        pub fn with_blocks(codes: &[u16]) -> Self {
            let mut adc = Self::default();
            codes.iter().for_each(|c| adc.blocks.push_back(*c).unwrap());
            adc
        }
    }

    impl<const N: usize> AdcCaptureSource<N> for MockAdc {
        type Error = Fault;

        fn settle(&mut self, ms: u32) {
            self.settle_ms = Some(ms);
        }

        fn capture(&mut self, channel: Channel, buffer: &mut SampleBuffer<N>) -> nb::Result<(), Fault> {
            if self.fail {
                return Err(nb::Error::Other(Fault));
            }
            if !self.in_flight {
                self.in_flight = true;
                self.polls_left = self.busy_polls;
                self.captures.push(channel).unwrap();
            }
            if 0 < self.polls_left {
                self.polls_left -= 1;
                return Err(nb::Error::WouldBlock);
            }
            self.in_flight = false;

            let code = self.blocks.pop_front().unwrap_or(self.last_code);
            self.last_code = code;
            let n = if self.short { N / 2 } else { N };
            for _ in 0..n {
                buffer.push(code).unwrap();
            }
            Ok(())
        }
    }

    /// A DAC which records every frame it is sent
    #[derive(Default)]
    pub struct MockDac {
        pub writes: Vec<(Channel, DacFrame), 16>,
        pub never_ready: bool,
        pub fail: bool,
    }

    impl SpiDacSink for MockDac {
        type Error = Fault;

        fn write(&mut self, channel: Channel, frame: DacFrame) -> nb::Result<(), Fault> {
            if self.fail {
                return Err(nb::Error::Other(Fault));
            }
            if self.never_ready {
                return Err(nb::Error::WouldBlock);
            }
            self.writes.push((channel, frame)).unwrap();
            Ok(())
        }
    }

    /// One edge latch per gate input
    #[derive(Default)]
    pub struct MockGates {
        pub latched: [bool; 2],
    }

    impl MockGates {
        pub fn trigger(&mut self, channel: Channel) {
            self.latched[channel.index()] = true;
        }
    }

    impl GateInputSource for MockGates {
        fn take_edge(&mut self) -> Option<Channel> {
            let channel = Channel::ALL.into_iter().find(|ch| self.latched[ch.index()])?;
            self.latched[channel.index()] = false;
            Some(channel)
        }
    }

    /// Scale switches with a single edge latch
    pub struct MockScale {
        pub levels: u16,
        pub latched: bool,
    }

    impl MockScale {
        /// `MockScale::with_notes_on(bits)` is a switch bank with the notes in `bits` switched ON (pulled low)
        pub fn with_notes_on(bits: u16) -> Self {
            Self {
                levels: !bits,
                latched: false,
            }
        }

        pub fn flip_to(&mut self, bits: u16) {
            self.levels = !bits;
            self.latched = true;
        }
    }

    impl ScaleInputSource for MockScale {
        fn take_edge(&mut self) -> bool {
            core::mem::replace(&mut self.latched, false)
        }

        fn read_note_levels(&mut self) -> u16 {
            self.levels
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::*;
    use super::*;
    use crate::{
        config::{DUAL_CHANNEL_KEYS, DUAL_CHANNEL_NSAMP},
        scale::{Mode, Note},
        utils::is_almost,
    };

    type TestDispatcher = EventDispatcher<MockAdc, MockDac, MockGates, MockScale, DUAL_CHANNEL_KEYS, DUAL_CHANNEL_NSAMP>;

    const ALL_ON: u16 = 0x0FFF;
    const ONLY_D: u16 = 1 << 2;
    const ONLY_B: u16 = 1 << 11;

    // with the default config an 8 bit code of 52 is about 2.013 volts at the jack, index 24
    const CODE_2V: u16 = 52;
    // about 0.19 volts, index 2
    const CODE_D0: u16 = 5;

    fn dispatcher(adc: MockAdc, notes_on: u16) -> TestDispatcher {
        EventDispatcher::new(
            Config::default(),
            adc,
            MockDac::default(),
            MockGates::default(),
            MockScale::with_notes_on(notes_on),
        )
        .unwrap()
    }

    fn emitted(outcome: Outcome) -> Emission {
        match outcome {
            Outcome::Emitted(e) => e,
            other => panic!("expected an emission, got {other:?}"),
        }
    }

    #[test]
    fn reads_the_switches_at_startup() {
        let d = dispatcher(MockAdc::default(), Mode::Major.mask(Note::C).bits());
        assert_eq!(d.scale(), Mode::Major.mask(Note::C));
        assert_eq!(d.state(), State::Idle);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let cfg = Config {
            dac_v_max: -5.0,
            ..Config::default()
        };
        let res = TestDispatcher::new(
            cfg,
            MockAdc::default(),
            MockDac::default(),
            MockGates::default(),
            MockScale::with_notes_on(ALL_ON),
        );
        assert!(matches!(res, Err(ConfigError::DacFullScale(_))));
    }

    #[test]
    fn gate_emits_the_quantized_voltage() {
        let mut d = dispatcher(MockAdc::with_blocks(&[CODE_2V]), ALL_ON);

        let e = emitted(d.handle(Event::GateTriggered(Channel::A)).unwrap());

        assert!(is_almost(e.input_voltage, 2.013, 0.001));
        assert_eq!(e.raw_index, 24);
        assert_eq!(e.index, 24);
        assert!(is_almost(e.voltage, 2.0, 1E-5));
        assert!(is_almost(e.frequency_hz, 65.4, 0.001));
        assert_eq!(e.frame, DacFrame::encode(e.voltage, 5.0, 10));
        assert_eq!(e.frame.code(10), 409);

        assert_eq!(d.dac().writes.as_slice(), &[(Channel::A, e.frame)]);
        assert_eq!(d.adc().captures.as_slice(), &[Channel::A]);
        assert_eq!(d.channel_state(Channel::A).last_index(), Some(24));
        assert_eq!(d.channel_state(Channel::B).last_index(), None);
        assert_eq!(d.state(), State::Idle);
    }

    #[test]
    fn settles_before_sampling() {
        let mut d = dispatcher(MockAdc::with_blocks(&[CODE_2V]), ALL_ON);
        d.handle(Event::GateTriggered(Channel::A)).unwrap();
        assert_eq!(d.adc().settle_ms, Some(10));
    }

    #[test]
    fn forbidden_note_snaps_down_into_the_scale() {
        let mut d = dispatcher(MockAdc::with_blocks(&[CODE_2V]), ONLY_D);

        let e = emitted(d.handle(Event::GateTriggered(Channel::A)).unwrap());

        // C2 drops down to D1
        assert_eq!(e.raw_index, 24);
        assert_eq!(e.index, 14);
        assert!(is_almost(e.voltage, 14.0 / 12.0, 1E-5));
    }

    #[test]
    fn empty_scale_holds_without_sampling() {
        let mut d = dispatcher(MockAdc::with_blocks(&[CODE_2V]), 0);

        let outcome = d.handle(Event::GateTriggered(Channel::B)).unwrap();

        assert_eq!(
            outcome,
            Outcome::Held {
                channel: Channel::B,
                raw_index: None
            }
        );
        assert!(d.adc().captures.is_empty());
        assert!(d.dac().writes.is_empty());
    }

    #[test]
    fn unreachable_note_holds_the_previous_output() {
        let mut d = dispatcher(MockAdc::with_blocks(&[CODE_2V, CODE_D0]), ONLY_B);

        // C2 drops to B1
        let first = emitted(d.handle(Event::GateTriggered(Channel::A)).unwrap());
        assert_eq!(first.index, 23);

        // D0 would need B-1, which is below the table
        let second = d.handle(Event::GateTriggered(Channel::A)).unwrap();
        assert_eq!(
            second,
            Outcome::Held {
                channel: Channel::A,
                raw_index: Some(2)
            }
        );

        assert_eq!(d.dac().writes.len(), 1);
        assert_eq!(d.channel_state(Channel::A).last_index(), Some(23));
        assert_eq!(d.channel_state(Channel::A).last_voltage(), Some(first.voltage));
    }

    #[test]
    fn silent_input_emits_the_bottom_note() {
        let mut d = dispatcher(MockAdc::with_blocks(&[0]), ONLY_B);

        // index zero always passes, even when C is not in the scale
        let e = emitted(d.handle(Event::GateTriggered(Channel::A)).unwrap());
        assert_eq!(e.index, 0);
        assert_eq!(e.voltage, 0.0);
        assert_eq!(e.frame.code(10), 0);
    }

    #[test]
    fn over_range_input_is_clamped_to_the_dac_full_scale() {
        let mut d = dispatcher(MockAdc::with_blocks(&[255]), ALL_ON);

        let e = emitted(d.handle(Event::GateTriggered(Channel::A)).unwrap());
        assert_eq!(e.raw_index, DUAL_CHANNEL_KEYS - 1);
        assert_eq!(e.voltage, 5.0);
        assert_eq!(e.frame.code(10), 1023);
    }

    #[test]
    fn channels_are_independent() {
        let mut d = dispatcher(MockAdc::with_blocks(&[CODE_2V, CODE_D0]), ALL_ON);

        d.handle(Event::GateTriggered(Channel::A)).unwrap();
        d.handle(Event::GateTriggered(Channel::B)).unwrap();

        assert_eq!(d.channel_state(Channel::A).last_index(), Some(24));
        assert_eq!(d.channel_state(Channel::B).last_index(), Some(2));
        assert_eq!(d.dac().writes[0].0, Channel::A);
        assert_eq!(d.dac().writes[1].0, Channel::B);
    }

    #[test]
    fn scale_edge_rebuilds_the_scale() {
        let mut d = dispatcher(MockAdc::default(), ALL_ON);
        d.scale_input_mut().flip_to(ONLY_D);

        let outcome = d.poll().unwrap();

        assert_eq!(outcome, Some(Outcome::ScaleChanged(ScaleMask::from_bits(ONLY_D))));
        assert_eq!(d.scale(), ScaleMask::from_bits(ONLY_D));
        assert!(d.adc().captures.is_empty());
    }

    #[test]
    fn nothing_pending_is_nothing_to_do() {
        let mut d = dispatcher(MockAdc::default(), ALL_ON);
        assert_eq!(d.poll(), Ok(None));
    }

    #[test]
    fn scale_edges_are_serviced_before_gates() {
        let mut d = dispatcher(MockAdc::with_blocks(&[CODE_2V]), ALL_ON);
        d.gates_mut().trigger(Channel::A);
        d.scale_input_mut().flip_to(ONLY_D);

        assert!(matches!(d.poll(), Ok(Some(Outcome::ScaleChanged(_)))));

        // the gate sees the new scale
        let e = emitted(d.poll().unwrap().unwrap());
        assert_eq!(e.index, 14);

        assert_eq!(d.poll(), Ok(None));
    }

    #[test]
    fn gate_a_is_serviced_before_gate_b() {
        let mut d = dispatcher(MockAdc::with_blocks(&[CODE_2V, CODE_2V]), ALL_ON);
        d.gates_mut().trigger(Channel::B);
        d.gates_mut().trigger(Channel::A);

        assert_eq!(emitted(d.poll().unwrap().unwrap()).channel, Channel::A);
        assert_eq!(emitted(d.poll().unwrap().unwrap()).channel, Channel::B);
        assert_eq!(d.poll(), Ok(None));
    }

    #[test]
    fn repeated_gate_edges_collapse_into_one_event() {
        let mut d = dispatcher(MockAdc::with_blocks(&[CODE_2V]), ALL_ON);
        d.gates_mut().trigger(Channel::A);
        d.gates_mut().trigger(Channel::A);

        assert!(d.poll().unwrap().is_some());
        assert_eq!(d.poll(), Ok(None));
        assert_eq!(d.adc().captures.len(), 1);
    }

    #[test]
    fn slow_adc_within_the_poll_budget_is_fine() {
        let mut adc = MockAdc::with_blocks(&[CODE_2V]);
        adc.busy_polls = 500;
        let mut d = dispatcher(adc, ALL_ON);

        assert!(d.handle(Event::GateTriggered(Channel::A)).is_ok());
    }

    #[test]
    fn stuck_adc_times_out() {
        let mut adc = MockAdc::with_blocks(&[CODE_2V]);
        adc.busy_polls = u32::MAX;
        let cfg = Config {
            capture_poll_limit: 1_000,
            ..Config::default()
        };
        let mut d = TestDispatcher::new(
            cfg,
            adc,
            MockDac::default(),
            MockGates::default(),
            MockScale::with_notes_on(ALL_ON),
        )
        .unwrap();

        assert_eq!(
            d.handle(Event::GateTriggered(Channel::B)),
            Err(Error::CaptureTimeout { channel: Channel::B })
        );
        assert_eq!(d.state(), State::Idle);
        assert!(d.dac().writes.is_empty());
        assert_eq!(d.channel_state(Channel::B).last_voltage(), None);
    }

    #[test]
    fn short_capture_is_an_error() {
        let mut adc = MockAdc::with_blocks(&[CODE_2V]);
        adc.short = true;
        let mut d = dispatcher(adc, ALL_ON);

        assert_eq!(
            d.handle(Event::GateTriggered(Channel::A)),
            Err(Error::IncompleteCapture {
                channel: Channel::A,
                expected: DUAL_CHANNEL_NSAMP,
                received: DUAL_CHANNEL_NSAMP / 2
            })
        );
    }

    #[test]
    fn adc_fault_is_passed_through() {
        let mut adc = MockAdc::default();
        adc.fail = true;
        let mut d = dispatcher(adc, ALL_ON);

        assert_eq!(d.handle(Event::GateTriggered(Channel::A)), Err(Error::Capture(Fault)));
    }

    #[test]
    fn stuck_dac_times_out_and_keeps_the_old_bookkeeping() {
        let d = dispatcher(MockAdc::with_blocks(&[CODE_2V]), ALL_ON);
        let (adc, mut dac, gates, scale) = d.release();
        dac.never_ready = true;
        let mut d = TestDispatcher::new(Config::default(), adc, dac, gates, scale).unwrap();

        assert_eq!(
            d.handle(Event::GateTriggered(Channel::A)),
            Err(Error::WriteTimeout { channel: Channel::A })
        );
        assert_eq!(d.channel_state(Channel::A).last_index(), None);
        assert_eq!(d.state(), State::Idle);
    }

    #[test]
    fn dac_fault_is_passed_through() {
        let dac = MockDac {
            fail: true,
            ..MockDac::default()
        };
        let mut d = TestDispatcher::new(
            Config::default(),
            MockAdc::with_blocks(&[CODE_2V]),
            dac,
            MockGates::default(),
            MockScale::with_notes_on(ALL_ON),
        )
        .unwrap();

        assert_eq!(d.handle(Event::GateTriggered(Channel::A)), Err(Error::Write(Fault)));
    }

    #[test]
    fn one_based_voltage_table_shifts_the_output_up_a_semitone() {
        let cfg = Config {
            voltage_origin_step: 1,
            ..Config::default()
        };
        let mut d = TestDispatcher::new(
            cfg,
            MockAdc::with_blocks(&[CODE_2V]),
            MockDac::default(),
            MockGates::default(),
            MockScale::with_notes_on(ALL_ON),
        )
        .unwrap();

        // 2.013 volts sits between entries 23 (2.0V) and 24 (2.083V) of a table starting at 1/12 volt
        let e = emitted(d.handle(Event::GateTriggered(Channel::A)).unwrap());
        assert_eq!(e.index, 23);
        assert!(is_almost(e.voltage, 2.0, 1E-5));
    }
}
