//! # Note tables
//!
//! The quantizer works against lookup tables with one entry per equal tempered semitone. There are two flavors:
//!
//! - frequency tables, in Hertz, starting at some root frequency and climbing by the ratio `2^(1/12)` per step
//! - voltage tables, in volts, climbing by a fixed volts-per-semitone step, typically 1/12 of a volt for 1volt/octave
//!
//! Tables are built once at startup and never change afterwards.

use crate::utils::round_to_places;

/// The number of semitones in an octave
pub const SEMITONES_PER_OCTAVE: usize = 12;

/// The standard 1volt/octave width of a semitone
pub const VOLTS_PER_SEMITONE: f32 = 1.0_f32 / SEMITONES_PER_OCTAVE as f32;

/// Frequency table entries are rounded to this many decimal places
const FREQUENCY_DECIMAL_PLACES: i32 = 3;

/// An ascending table of `N` note values, one per semitone, is represented here.
///
/// The values are either frequencies in Hertz or voltages in volts, depending on how the table was generated.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteTable<const N: usize> {
    values: [f32; N],
}

impl<const N: usize> NoteTable<N> {
    /// `NoteTable::from_values(vs)` is a table holding the values `vs`
    ///
    /// The values must be strictly increasing for the quantizer to make any sense of them.
    pub const fn from_values(values: [f32; N]) -> Self {
        Self { values }
    }

    /// `t.len()` is the number of entries in the table
    pub const fn len(&self) -> usize {
        N
    }

    /// `t.is_empty()` is true iff the table has no entries
    pub const fn is_empty(&self) -> bool {
        N == 0
    }

    /// `t.get(i)` is the table entry at index `i`, if there is one
    pub fn get(&self, idx: usize) -> Option<f32> {
        self.values.get(idx).copied()
    }

    /// `t.as_slice()` is the table entries in ascending order
    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// `t.last_index()` is the index of the highest entry, zero for an empty table
    pub const fn last_index(&self) -> usize {
        N.saturating_sub(1)
    }

    /// `t.is_strictly_increasing()` is true iff every entry is larger than the one before it
    pub fn is_strictly_increasing(&self) -> bool {
        self.values.windows(2).all(|w| w[0] < w[1])
    }
}

impl<const N: usize> core::ops::Index<usize> for NoteTable<N> {
    type Output = f32;

    fn index(&self, idx: usize) -> &f32 {
        &self.values[idx]
    }
}

/// `generate_frequency_table(f0)` is a table of `N` equal tempered frequencies starting at root frequency `f0`
///
/// Each entry is `f0 * 2^(i/12)`, rounded to 3 decimal places.
///
/// # Examples
///
/// ```
/// # use cv_quantizer::tables;
/// let freqs = tables::generate_frequency_table::<72>(16.35);
/// // one octave up from C0 is C1
/// assert!((freqs[12] - 32.7).abs() < 0.001);
/// ```
pub fn generate_frequency_table<const N: usize>(root_frequency_hz: f32) -> NoteTable<N> {
    let semitone_ratio = libm::pow(2.0, 1.0 / SEMITONES_PER_OCTAVE as f64);
    let mut values = [0.0_f32; N];

    for (i, v) in values.iter_mut().enumerate() {
        let freq = root_frequency_hz as f64 * libm::pow(semitone_ratio, i as f64);
        *v = round_to_places(freq, FREQUENCY_DECIMAL_PLACES) as f32;
    }

    NoteTable::from_values(values)
}

/// `generate_voltage_table(vps, origin)` is a table of `N` evenly spaced voltages
///
/// Each entry is `vps * (i + origin)`. Two flavors of the module firmware disagree about whether the first entry sits
/// at zero volts (`origin == 0`) or one semitone up (`origin == 1`), so the origin step is an explicit argument.
///
/// # Arguments
///
/// * `volts_per_semitone` - the width of each step, `1/12` for 1volt/octave
///
/// * `origin_step` - the number of semitones between zero volts and the first entry
///
/// # Examples
///
/// ```
/// # use cv_quantizer::tables;
/// let volts = tables::generate_voltage_table::<72>(1. / 12., 0);
/// assert!((volts[24] - 2.0).abs() < 1E-6);
/// ```
pub fn generate_voltage_table<const N: usize>(volts_per_semitone: f32, origin_step: usize) -> NoteTable<N> {
    let mut values = [0.0_f32; N];

    for (i, v) in values.iter_mut().enumerate() {
        *v = volts_per_semitone * (i + origin_step) as f32;
    }

    NoteTable::from_values(values)
}
