// ============================================================
// Layer 4 — GELU Activation
// ============================================================
// Host-side GELU shared by the graph runtime and the fused kernel.
//
// Uses the exact erf form, x * 0.5 * (1 + erf(x / sqrt(2))),
// which is also what Burn's `activation::gelu` computes. The
// erf is evaluated in f64 through libm and rounded once.

use std::f64::consts::SQRT_2;

#[inline]
pub fn gelu(x: f32) -> f32 {
    let xd  = x as f64;
    let cdf = 0.5 * (1.0 + libm::erf(xd / SQRT_2));
    (xd * cdf) as f32
}

/// Apply GELU to every element in place.
pub fn gelu_inplace(values: &mut [f32]) {
    for v in values.iter_mut() {
        *v = gelu(*v);
    }
}
