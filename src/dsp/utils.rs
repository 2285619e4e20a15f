/// Floor used before any log/division on a linear level.
pub const DB_EPS: f32 = 1e-9;

/// Magnitude below which accumulator states are flushed to zero.
pub const DENORMAL_FLOOR: f32 = 1e-15;

/// One-pole smoothing coefficient for a time constant in milliseconds.
/// `y = c * y + (1 - c) * x` reaches ~63% of a step after `time_ms`.
#[inline]
pub fn time_constant_coeff(time_ms: f32, sample_rate: f32) -> f32 {
    let samples = (time_ms * 0.001 * sample_rate).max(1e-3);
    (-1.0 / samples).exp()
}

#[inline]
pub fn db_to_lin(db: f32) -> f32 {
    10.0f32.powf(db / 20.0)
}

#[inline]
pub fn lin_to_db(lin: f32) -> f32 {
    20.0 * lin.max(DB_EPS).log10()
}

/// Clamp tiny, negative or non-finite accumulator values to zero.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if !x.is_finite() || x < DENORMAL_FLOOR {
        0.0
    } else {
        x
    }
}

pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let denom = (edge1 - edge0).max(1e-12);
    let t = ((x - edge0) / denom).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
