/// `is_almost(v1, v2, e)` is true iff `v1` is within `e` of `v2`
pub fn is_almost(v1: f32, v2: f32, eps: f32) -> bool {
    libm::fabsf(v1 - v2) <= eps
}

/// `round_to_places(v, p)` is `v` rounded half-away-from-zero to `p` decimal places
pub fn round_to_places(val: f64, places: i32) -> f64 {
    let scale = libm::pow(10.0, places as f64);
    libm::round(val * scale) / scale
}

/// `mean_of_codes(codes)` is the arithmetic mean of the raw ADC codes, zero for an empty slice
///
/// The sum is accumulated as an integer so long blocks of 16 bit codes don't lose precision.
pub fn mean_of_codes(codes: &[u16]) -> f32 {
    if codes.is_empty() {
        return 0.0_f32;
    }
    let sum: u64 = codes.iter().map(|c| *c as u64).sum();
    (sum as f64 / codes.len() as f64) as f32
}
