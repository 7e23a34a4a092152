//! # Quantizer
//!
//! Quantizers are used to force continuous inputs into discrete output steps. Musically they are used to generate
//! in-tune outputs from various inputs.
//!
//! This quantizer snaps a value onto an ascending [`NoteTable`], either a table of frequencies or a table of 1volt/octave
//! voltages. The value is always snapped DOWN onto the greatest table entry which is less than or equal to it, values
//! that fall between two notes never round up to the higher note.

use crate::tables::NoteTable;

/// `quantize_floor(x, t)` is the index of the greatest entry in table `t` that is less than or equal to `x`
///
/// Inputs at or below the first entry map to index zero, inputs at or above the last entry map to the last index. The
/// result is always a valid index for a non-empty table.
///
/// # Examples
///
/// ```
/// # use cv_quantizer::{quantizer, tables};
/// let volts = tables::generate_voltage_table::<72>(1. / 12., 0);
///
/// // a little above D, but not yet D#
/// assert_eq!(quantizer::quantize_floor(2.5 / 12., &volts), 2);
///
/// // way out of range in both directions
/// assert_eq!(quantizer::quantize_floor(-3.0, &volts), 0);
/// assert_eq!(quantizer::quantize_floor(100.0, &volts), 71);
/// ```
pub fn quantize_floor<const N: usize>(x: f32, table: &NoteTable<N>) -> usize {
    let values = table.as_slice();
    let (first, last) = match (values.first(), values.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return 0,
    };

    if x <= first {
        return 0;
    }
    if last <= x {
        return table.last_index();
    }

    // the answer is always bracketed in [l, u)
    let mut l = 0;
    let mut u = table.last_index();

    while 1 < u - l {
        let m = (l + u) / 2;
        if x == values[m] {
            return m;
        } else if values[m] < x {
            l = m;
        } else {
            u = m;
        }
    }

    l
}

/// `quantize_value(x, t)` is the table entry that `x` quantizes to, see [`quantize_floor`]
pub fn quantize_value<const N: usize>(x: f32, table: &NoteTable<N>) -> f32 {
    table.get(quantize_floor(x, table)).unwrap_or(0.0_f32)
}
