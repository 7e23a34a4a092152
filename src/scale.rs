//! # Scales
//!
//! A scale is represented as a 12 bit mask over the chromatic notes C, C#, D, ... B. A set-bit means the note is part of
//! the scale, a cleared-bit means the note is forbidden.
//!
//! Quantized indices that land on forbidden notes are corrected by stepping DOWN chromatically until an allowed note is
//! found. The search never looks more than one octave below the starting note, and never steps upward, so the
//! corrected pitch is always at or below the raw quantized pitch.
//!
//! On the hardware the scale is set with 12 panel switches, one per note. The switches pull their pins low when they
//! are ON, so the mask is the inverse of the pin levels.

use crate::tables::SEMITONES_PER_OCTAVE;

/// Mask with all 12 notes allowed
const ALL_NOTES: u16 = 0b0000_1111_1111_1111;

/// A set of allowed chromatic scale degrees is represented here.
///
/// Bit `i` represents chromatic degree `i` above the root, the 12 lowest bits represent C, C#, D, ... B.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScaleMask(u16);

impl ScaleMask {
    /// The fully chromatic scale, every note allowed
    pub const CHROMATIC: Self = Self(ALL_NOTES);

    /// The empty scale, no note allowed
    pub const EMPTY: Self = Self(0);

    /// `ScaleMask::from_bits(b)` is a new scale from the lowest 12 bits of `b`, higher bits are ignored
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits & ALL_NOTES)
    }

    /// `ScaleMask::from_switch_levels(l)` is the scale selected by the panel switches with pin levels `l`
    ///
    /// Bit `i` of `l` is the logic level read from the switch for note `i`. The switches are active-low, so a note is
    /// allowed iff its pin reads low.
    ///
    /// # Examples
    ///
    /// ```
    /// # use cv_quantizer::scale::{ScaleMask, Note};
    /// // every pin pulled high except C and G
    /// let levels = !((1 << 0) | (1 << 7));
    /// let scale = ScaleMask::from_switch_levels(levels);
    ///
    /// assert!(scale.contains(Note::C));
    /// assert!(scale.contains(Note::G));
    /// assert!(!scale.contains(Note::D));
    /// ```
    pub const fn from_switch_levels(levels: u16) -> Self {
        Self::from_bits(!levels)
    }

    /// `s.bits()` is the raw 12 bit mask
    pub const fn bits(&self) -> u16 {
        self.0
    }

    /// `s.is_empty()` is true iff no note is allowed
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// `s.contains(n)` is true iff note `n` is allowed
    pub const fn contains(&self, note: Note) -> bool {
        self.0 >> note.0 & 1 == 1
    }

    /// `s.contains_degree(d)` is true iff chromatic degree `d` wrapped into `[0..11]` is allowed
    fn contains_degree(&self, degree: usize) -> bool {
        self.0 >> (degree % SEMITONES_PER_OCTAVE) & 1 == 1
    }

    /// `s.allow(ns)` allows notes `ns`
    ///
    /// Any notes in `ns` that are already allowed are left unchanged
    pub fn allow(&mut self, notes: &[Note]) {
        notes.iter().for_each(|n| self.0 |= 1 << n.0);
    }

    /// `s.forbid(ns)` forbids notes `ns`
    ///
    /// Unlike a panel-driven scale there is no guard against forbidding every note, an empty scale is a valid state
    /// which makes every correction fail.
    pub fn forbid(&mut self, notes: &[Note]) {
        notes.iter().for_each(|n| self.0 &= !(1 << n.0));
    }

    /// `s.num_notes()` is the number of allowed notes
    pub const fn num_notes(&self) -> u32 {
        self.0.count_ones()
    }
}

impl Default for ScaleMask {
    /// `ScaleMask::default()` is the chromatic scale
    fn default() -> Self {
        Self::CHROMATIC
    }
}

impl core::fmt::Binary for ScaleMask {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Binary::fmt(&self.0, f)
    }
}

/// `correct(i, s, len)` is quantized index `i` adjusted to the nearest allowed note of scale `s` at or below it
///
/// Index zero, and any index that already lands on an allowed note, pass through unchanged. Otherwise the search steps
/// down chromatically from `i` through `i - 12` and returns the first position whose note is allowed.
///
/// `None` means there is no usable note: either the scale is empty, or the nearest allowed note lies below the bottom of
/// the table. Callers hold their previous output in that case.
///
/// Indices past the end of a table of `len` entries are treated as the last entry.
///
/// # Examples
///
/// ```
/// # use cv_quantizer::scale::{self, ScaleMask, Note};
/// let mut roots = ScaleMask::EMPTY;
/// roots.allow(&[Note::C]);
///
/// // G in octave 1 drops down to C in octave 1
/// assert_eq!(scale::correct(19, roots, 72), Some(12));
///
/// // nothing allowed, nothing to do
/// assert_eq!(scale::correct(19, ScaleMask::EMPTY, 72), None);
/// ```
pub fn correct(index: usize, scale: ScaleMask, table_len: usize) -> Option<usize> {
    let index = index.min(table_len.saturating_sub(1));

    if index == 0 || scale.contains_degree(index) {
        return Some(index);
    }

    // positions below the bottom of the table wrap their degree like the notes of a lower octave would, but even if
    // they are allowed there is nothing we can output there
    (0..=SEMITONES_PER_OCTAVE as isize)
        .map(|step| index as isize - step)
        .find(|pos| scale.contains_degree(pos.rem_euclid(SEMITONES_PER_OCTAVE as isize) as usize))
        .and_then(|pos| usize::try_from(pos).ok())
}

/// Note names are represented here, scales allow and forbid various notes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Note(u8);

impl Note {
    pub const C: Self = Self::new(0);
    pub const CSHARP: Self = Self::new(1);
    pub const D: Self = Self::new(2);
    pub const DSHARP: Self = Self::new(3);
    pub const E: Self = Self::new(4);
    pub const F: Self = Self::new(5);
    pub const FSHARP: Self = Self::new(6);
    pub const G: Self = Self::new(7);
    pub const GSHARP: Self = Self::new(8);
    pub const A: Self = Self::new(9);
    pub const ASHARP: Self = Self::new(10);
    pub const B: Self = Self::new(11);

    /// `Note::new(n)` is a new note from `n` clamped to `[0..11]`
    pub const fn new(n: u8) -> Self {
        Self(if n <= 11 { n } else { 11 })
    }
}

impl From<u8> for Note {
    fn from(n: u8) -> Self {
        Self::new(n)
    }
}

impl From<Note> for u8 {
    fn from(n: Note) -> Self {
        n.0
    }
}

/// Preset scales are represented here, the seven diatonic modes plus the chromatic scale
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Chromatic,
    Major,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
}

impl Mode {
    /// `m.mask(r)` is the scale of mode `m` played from root note `r`
    ///
    /// # Examples
    ///
    /// ```
    /// # use cv_quantizer::scale::{Mode, Note};
    /// let g_major = Mode::Major.mask(Note::G);
    /// assert!(g_major.contains(Note::FSHARP));
    /// assert!(!g_major.contains(Note::F));
    /// ```
    pub fn mask(&self, root: Note) -> ScaleMask {
        let c_rooted = match self {
            Mode::Chromatic => ALL_NOTES,
            Mode::Major => rotate_down(MAJOR_STEPS, 0),
            Mode::Dorian => rotate_down(MAJOR_STEPS, 2),
            Mode::Phrygian => rotate_down(MAJOR_STEPS, 4),
            Mode::Lydian => rotate_down(MAJOR_STEPS, 5),
            Mode::Mixolydian => rotate_down(MAJOR_STEPS, 7),
            Mode::Aeolian => rotate_down(MAJOR_STEPS, 9),
            Mode::Locrian => rotate_down(MAJOR_STEPS, 11),
        };
        ScaleMask::from_bits(rotate_up(c_rooted, u8::from(root) as u32))
    }
}

/// The C major scale, C D E F G A B
const MAJOR_STEPS: u16 = 0b1010_1011_0101;

/// `rotate_up(m, n)` is the 12 bit mask `m` transposed up by `n` semitones
const fn rotate_up(mask: u16, semitones: u32) -> u16 {
    let n = semitones % 12;
    ((mask << n) | (mask >> (12 - n))) & ALL_NOTES
}

/// `rotate_down(m, n)` is the 12 bit mask `m` transposed down by `n` semitones
const fn rotate_down(mask: u16, semitones: u32) -> u16 {
    rotate_up(mask, 12 - semitones % 12)
}

#[cfg(test)]
#[allow(non_snake_case)]
mod tests {
    use super::*;

    const TABLE_LEN: usize = 72;

    fn only(notes: &[Note]) -> ScaleMask {
        let mut s = ScaleMask::EMPTY;
        s.allow(notes);
        s
    }

    #[test]
    fn chromatic_never_corrects() {
        for i in 0..TABLE_LEN {
            assert_eq!(correct(i, ScaleMask::CHROMATIC, TABLE_LEN), Some(i));
        }
    }

    #[test]
    fn index_zero_passes_regardless_of_scale() {
        assert_eq!(correct(0, ScaleMask::EMPTY, TABLE_LEN), Some(0));
        assert_eq!(correct(0, only(&[Note::B]), TABLE_LEN), Some(0));
    }

    #[test]
    fn allowed_degrees_pass_unchanged() {
        let s = Mode::Major.mask(Note::C);
        for i in 0..TABLE_LEN {
            if s.contains(Note::new((i % 12) as u8)) {
                assert_eq!(correct(i, s, TABLE_LEN), Some(i));
            }
        }
    }

    #[test]
    fn empty_scale_never_corrects() {
        for i in 1..TABLE_LEN {
            assert_eq!(correct(i, ScaleMask::EMPTY, TABLE_LEN), None);
        }
    }

    #[test]
    fn when_only_C_is_allowed_G_drops_to_C() {
        let s = only(&[Note::C]);
        let corrected = correct(7, s, TABLE_LEN).unwrap();
        assert_eq!(corrected % 12, 0);
        assert!(corrected <= 7);
        assert_eq!(corrected, 0);
    }

    #[test]
    fn when_only_C_is_allowed_every_index_floors_to_its_octave() {
        let s = only(&[Note::C]);
        for i in 0..TABLE_LEN {
            assert_eq!(correct(i, s, TABLE_LEN), Some((i / 12) * 12));
        }
    }

    #[test]
    fn never_snaps_upward_and_stays_within_an_octave() {
        let s = Mode::Locrian.mask(Note::FSHARP);
        for i in 0..TABLE_LEN {
            if let Some(c) = correct(i, s, TABLE_LEN) {
                assert!(c <= i);
                assert!(i - c <= 12);
            }
        }
    }

    #[test]
    fn forbidden_Csharp_drops_to_C() {
        let s = Mode::Major.mask(Note::C);
        assert_eq!(correct(13, s, TABLE_LEN), Some(12));
    }

    #[test]
    fn search_wraps_below_C_into_the_previous_octave() {
        // only B allowed, C# in octave 2 must land on B in octave 1
        let s = only(&[Note::B]);
        assert_eq!(correct(25, s, TABLE_LEN), Some(23));
    }

    #[test]
    fn allowed_note_below_the_table_is_no_result() {
        // only B allowed, D in octave 0 would need B in octave -1
        let s = only(&[Note::B]);
        assert_eq!(correct(2, s, TABLE_LEN), None);
    }

    #[test]
    fn indices_past_the_table_are_clamped() {
        assert_eq!(correct(500, ScaleMask::CHROMATIC, TABLE_LEN), Some(71));
    }

    #[test]
    fn switch_levels_are_active_low() {
        // all pins high means every switch is OFF
        assert!(ScaleMask::from_switch_levels(0xFFFF).is_empty());
        // all pins low means every switch is ON
        assert_eq!(ScaleMask::from_switch_levels(0x0000), ScaleMask::CHROMATIC);
        // only pin 3 low
        assert_eq!(ScaleMask::from_switch_levels(!(1 << 3)), only(&[Note::DSHARP]));
    }

    #[test]
    fn high_bits_are_ignored() {
        assert_eq!(ScaleMask::from_bits(0xF001).bits(), 0x001);
    }

    #[test]
    fn forbid_can_empty_the_scale() {
        let mut s = only(&[Note::E]);
        s.forbid(&[Note::E]);
        assert!(s.is_empty());
    }

    #[test]
    fn c_major_mask() {
        let s = Mode::Major.mask(Note::C);
        assert_eq!(s.bits(), MAJOR_STEPS);
        assert_eq!(s.num_notes(), 7);
    }

    #[test]
    fn modes_from_c_are_rotations_of_the_white_keys() {
        // D dorian, E phrygian, etc. all use the white keys
        let white_keys = Mode::Major.mask(Note::C);
        assert_eq!(Mode::Dorian.mask(Note::D), white_keys);
        assert_eq!(Mode::Phrygian.mask(Note::E), white_keys);
        assert_eq!(Mode::Lydian.mask(Note::F), white_keys);
        assert_eq!(Mode::Mixolydian.mask(Note::G), white_keys);
        assert_eq!(Mode::Aeolian.mask(Note::A), white_keys);
        assert_eq!(Mode::Locrian.mask(Note::B), white_keys);
    }

    #[test]
    fn a_minor_has_flat_third_relative_to_a_major() {
        let minor = Mode::Aeolian.mask(Note::A);
        let major = Mode::Major.mask(Note::A);
        assert!(minor.contains(Note::C));
        assert!(!major.contains(Note::C));
        assert!(major.contains(Note::CSHARP));
    }

    #[test]
    fn chromatic_mode_is_chromatic_for_any_root() {
        assert_eq!(Mode::Chromatic.mask(Note::FSHARP), ScaleMask::CHROMATIC);
    }
}
