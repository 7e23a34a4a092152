//! # Sample averager
//!
//! The direct-voltage quantizer doesn't care about the frequency content of its input, it just wants to know what the
//! input voltage is right now. A short block of ADC samples is averaged to knock down noise, and the average is scaled
//! back up to the voltage present at the jack.
//!
//! The input CV is attenuated by a resistor divider before it hits the ADC, so the divider ratio is needed to get back
//! to jack-referred volts.

use crate::utils::mean_of_codes;

/// `average_voltage(b, vmax, div, bits)` is the mean of the raw ADC codes in `b` converted to volts at the input jack
///
/// # Arguments
///
/// * `buffer` - the raw ADC codes
///
/// * `v_max` - the ADC full scale voltage
///
/// * `input_divider` - the attenuation of the input divider, the fraction of the jack voltage that reaches the ADC
///
/// * `code_width_bits` - the number of bits in each ADC code
///
/// # Examples
///
/// ```
/// # use cv_quantizer::averager;
/// // half scale 8 bit codes with no input divider on a 3.3 volt ADC
/// let v = averager::average_voltage(&[128, 128, 128, 128], 3.3, 1.0, 8);
/// assert!((v - 1.65).abs() < 1E-6);
/// ```
pub fn average_voltage(buffer: &[u16], v_max: f32, input_divider: f32, code_width_bits: u32) -> f32 {
    let mean = mean_of_codes(buffer);
    mean / input_divider * volts_per_code(v_max, code_width_bits)
}

/// `volts_per_code(vmax, bits)` is the size of one ADC code step in volts
///
/// The step is `vmax / 2^bits`, as a SAR ADC never actually reaches its full scale code.
pub fn volts_per_code(v_max: f32, code_width_bits: u32) -> f32 {
    v_max / libm::powf(2.0, code_width_bits as f32)
}
