/// Random number generator (xorshift32)
#[inline]
pub(super) fn xorshift32(state: &mut u32) -> u32 {
    let mut x = *state;
    x ^= x << 13;
    x ^= x >> 17;
    x ^= x << 5;
    *state = x;
    x
}

/// Uniform in [0, 1) from the top 24 bits
#[inline]
pub(super) fn next_f32(state: &mut u32) -> f32 {
    (xorshift32(state) >> 8) as f32 * (1.0 / 16_777_216.0)
}

/// xorshift has a fixed point at zero
#[inline]
pub(super) fn seed_state(seed: u32) -> u32 {
    if seed == 0 { 0x9E37_79B9 } else { seed }
}
