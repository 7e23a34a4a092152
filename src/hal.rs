//! # Hardware collaborators
//!
//! The quantizer engines never touch peripherals directly. Everything they need from the hardware comes through the
//! four traits in this module:
//!
//! - [`AdcCaptureSource`] fills a block of raw ADC samples at the configured sample rate
//! - [`SpiDacSink`] shifts one frame out to an output DAC and strobes its load line
//! - [`GateInputSource`] reports latched gate edges, one per output channel
//! - [`ScaleInputSource`] reports latched edges on the scale switches and reads their levels
//!
//! The ADC and DAC traits follow the `nb` convention: a call that can't complete yet returns
//! `Err(nb::Error::WouldBlock)` and is simply called again. The engines wrap these calls in [`block_bounded`] so that
//! a peripheral that never finishes shows up as a timeout instead of a hung module.
//!
//! Edge sources are latches, not queues. A latch holds at most one pending edge, and edges that arrive while the
//! engine is busy with a capture are merged into the pending one or lost, exactly like a GPIO interrupt flag.

use core::fmt;

use crate::dac::DacFrame;

/// A fixed capacity block of raw ADC codes, filled in place by each capture
pub type SampleBuffer<const N: usize> = heapless::Vec<u16, N>;

/// The two independent quantizer channels are represented here
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    A,
    B,
}

impl Channel {
    /// Both channels, in servicing order
    pub const ALL: [Channel; 2] = [Channel::A, Channel::B];

    /// `ch.index()` is the zero based position of the channel, `A` is 0 and `B` is 1
    pub const fn index(&self) -> usize {
        match self {
            Channel::A => 0,
            Channel::B => 1,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::A => write!(f, "A"),
            Channel::B => write!(f, "B"),
        }
    }
}

/// Discrete input events are represented here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// A qualifying edge arrived on the gate input of a channel, sample it now
    GateTriggered(Channel),

    /// One or more of the scale switches changed
    ScaleChanged,
}

/// A block-capturing ADC is represented here.
///
/// `NSAMP` is the exact number of samples every completed capture must deliver.
pub trait AdcCaptureSource<const NSAMP: usize> {
    type Error: fmt::Debug;

    /// `adc.settle(ms)` waits about `ms` milliseconds for the input to stabilize before a capture
    ///
    /// The default does nothing, for sources that don't need settling time.
    fn settle(&mut self, _ms: u32) {}

    /// `adc.capture(ch, buf)` captures the input for channel `ch` into `buf`
    ///
    /// Called with an empty buffer to start a transfer, then polled until it stops returning `WouldBlock`. Samples are
    /// paced by the hardware at the configured sample rate. A completed capture leaves exactly `NSAMP` codes in `buf`.
    fn capture(&mut self, channel: Channel, buffer: &mut SampleBuffer<NSAMP>) -> nb::Result<(), Self::Error>;
}

/// A set of SPI DACs, one per channel, is represented here
pub trait SpiDacSink {
    type Error: fmt::Debug;

    /// `dac.write(ch, f)` sends frame `f` to the DAC for channel `ch` and pulses its load strobe
    ///
    /// The output only changes once the load strobe is pulsed, so a completed write means the new voltage is live.
    fn write(&mut self, channel: Channel, frame: DacFrame) -> nb::Result<(), Self::Error>;
}

/// Latched gate inputs are represented here
pub trait GateInputSource {
    /// `gates.take_edge()` is the channel with a pending gate edge, if any, clearing that channel's latch
    ///
    /// When both channels have pending edges channel `A` is reported first.
    fn take_edge(&mut self) -> Option<Channel>;
}

/// The 12 scale switches are represented here
pub trait ScaleInputSource {
    /// `scale.take_edge()` is true iff any switch changed since the last call, clearing the latch
    fn take_edge(&mut self) -> bool;

    /// `scale.read_note_levels()` is the current logic level of every note switch pin
    ///
    /// Bit `i` is the level of the pin for chromatic note `i`, C is bit 0. The switches are active-low.
    fn read_note_levels(&mut self) -> u16;
}

/// The ways a bounded blocking call can fail are represented here
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bounded<E> {
    /// The operation was still busy after the last allowed poll
    TimedOut,

    /// The operation itself failed
    Failed(E),
}

/// `block_bounded(n, op)` polls the non-blocking operation `op` until it completes, at most `n` times
///
/// Under normal operation this behaves exactly like a plain busy-wait, the limit only matters when the hardware never
/// finishes.
///
/// # Examples
///
/// ```
/// # use cv_quantizer::hal::{block_bounded, Bounded};
/// let mut countdown = 3;
/// let res: Result<u8, Bounded<()>> = block_bounded(10, || {
///     if countdown == 0 {
///         Ok(42)
///     } else {
///         countdown -= 1;
///         Err(nb::Error::WouldBlock)
///     }
/// });
/// assert_eq!(res, Ok(42));
/// ```
pub fn block_bounded<T, E>(
    max_polls: u32,
    mut op: impl FnMut() -> nb::Result<T, E>,
) -> Result<T, Bounded<E>> {
    for _ in 0..max_polls {
        match op() {
            Ok(val) => return Ok(val),
            Err(nb::Error::WouldBlock) => continue,
            Err(nb::Error::Other(e)) => return Err(Bounded::Failed(e)),
        }
    }
    Err(Bounded::TimedOut)
}
