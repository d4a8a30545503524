//! Golden Ratio constants
//!
//! φ is the positive root of x² = x + 1, which gives the sqrt-free identities
//! used below: 1/φ = φ − 1 and φ² = φ + 1.

/// φ = (1 + √5) / 2
pub const PHI: f64 = 1.618_033_988_749_895_f64;

/// 1/φ = φ − 1
pub const PHI_INV: f64 = PHI - 1.0;

/// φ² = φ + 1
pub const PHI_SQ: f64 = PHI + 1.0;

/// φ^k for a non-negative integer exponent.
pub fn phi_pow(k: u32) -> f64 {
    // powi takes i32; anything past i32::MAX is already infinite.
    match i32::try_from(k) {
        Ok(k) => PHI.powi(k),
        Err(_) => f64::INFINITY,
    }
}
