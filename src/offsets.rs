//! Offset generation
//!
//! Turns a base duration and an event count into golden-ratio offsets,
//! measured from an anchor point rather than from absolute zero.

use crate::error::{require_positive, PhiError, Result};
use crate::phi::{phi_pow, PHI};

/// How successive offsets grow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OffsetPolicy {
    /// Gaps between events grow by φ: base·φ, base·(φ+φ²), base·(φ+φ²+φ³), ...
    #[default]
    CumulativeIntervals,
    /// Offsets themselves are powers of φ: base·φ, base·φ², base·φ³, ...
    DirectPowers,
}

impl std::str::FromStr for OffsetPolicy {
    type Err = PhiError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cumulative" | "cumulative_intervals" => Ok(OffsetPolicy::CumulativeIntervals),
            "direct" | "direct_powers" => Ok(OffsetPolicy::DirectPowers),
            other => Err(PhiError::invalid(
                "policy",
                format!("expected `cumulative` or `direct`, got `{other}`"),
            )),
        }
    }
}

/// Strictly increasing positive offsets, one per event.
#[derive(Clone, Debug, PartialEq)]
pub struct OffsetSeries(Vec<f64>);

impl OffsetSeries {
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Offset of the last event, i.e. the span the series covers past its anchor.
    pub fn total(&self) -> f64 {
        self.0.last().copied().unwrap_or(0.0)
    }

    /// Distance between consecutive offsets, with an implicit leading 0.
    pub fn gaps(&self) -> Vec<f64> {
        let mut prev = 0.0;
        self.0
            .iter()
            .map(|&t| {
                let g = t - prev;
                prev = t;
                g
            })
            .collect()
    }
}

impl AsRef<[f64]> for OffsetSeries {
    fn as_ref(&self) -> &[f64] {
        &self.0
    }
}

impl IntoIterator for OffsetSeries {
    type Item = f64;
    type IntoIter = std::vec::IntoIter<f64>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Compute `count` offsets from `base` using `policy`.
///
/// Fails with `InvalidArgument` when `base` is not a positive finite number,
/// when `count` is zero, or when the series overflows `f64`.
pub fn generate_offsets(base: f64, count: usize, policy: OffsetPolicy) -> Result<OffsetSeries> {
    let base = require_positive("base", base)?;
    if count == 0 {
        return Err(PhiError::invalid("count", "must be at least 1"));
    }

    // Overflow bounds the loop long before a huge count would, so cap the
    // up-front allocation.
    let mut out = Vec::with_capacity(count.min(4096));

    match policy {
        OffsetPolicy::CumulativeIntervals => {
            let mut dt = base;
            let mut t = 0.0;
            for _ in 0..count {
                dt *= PHI;
                t += dt;
                out.push(check_finite(t, count)?);
            }
        }
        OffsetPolicy::DirectPowers => {
            for k in 1..=count {
                let exp = u32::try_from(k).unwrap_or(u32::MAX);
                out.push(check_finite(base * phi_pow(exp), count)?);
            }
        }
    }

    Ok(OffsetSeries(out))
}

fn check_finite(t: f64, count: usize) -> Result<f64> {
    if t.is_finite() {
        Ok(t)
    } else {
        Err(PhiError::invalid(
            "count",
            format!("{count} events overflow the offset range"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9 * b.abs().max(1.0)
    }

    #[test]
    fn test_cumulative_scenario() {
        let s = generate_offsets(1.0, 3, OffsetPolicy::CumulativeIntervals).unwrap();
        let expected = [PHI, PHI + PHI * PHI, PHI + PHI * PHI + PHI.powi(3)];
        assert_eq!(s.len(), 3);
        for (a, b) in s.as_slice().iter().zip(expected) {
            assert!(approx(*a, b), "{a} vs {b}");
        }
        assert!((s.as_slice()[0] - 1.618).abs() < 1e-3);
        assert!((s.as_slice()[1] - 4.236).abs() < 1e-3);
        assert!((s.as_slice()[2] - 9.708).abs() < 1e-3);
    }

    #[test]
    fn test_direct_scenario() {
        let s = generate_offsets(1.0, 3, OffsetPolicy::DirectPowers).unwrap();
        assert!((s.as_slice()[0] - 1.618).abs() < 1e-3);
        assert!((s.as_slice()[1] - 2.618).abs() < 1e-3);
        assert!((s.as_slice()[2] - 4.236).abs() < 1e-3);
    }

    #[test]
    fn test_cumulative_gaps_grow_by_phi() {
        let s = generate_offsets(0.5, 12, OffsetPolicy::CumulativeIntervals).unwrap();
        let gaps = s.gaps();
        assert!(approx(gaps[0], 0.5 * PHI));
        for w in gaps.windows(2) {
            assert!(approx(w[1], w[0] * PHI));
        }
    }

    #[test]
    fn test_direct_gaps_not_constant_ratio_of_offsets() {
        let s = generate_offsets(2.0, 5, OffsetPolicy::DirectPowers).unwrap();
        for (k, &t) in s.as_slice().iter().enumerate() {
            assert!(approx(t, 2.0 * PHI.powi(k as i32 + 1)));
        }
        // First gap is the first offset itself, later gaps are base·φ^(k-1)
        let gaps = s.gaps();
        assert!(approx(gaps[0], 2.0 * PHI));
        assert!(approx(gaps[1], 2.0));
        assert!(approx(gaps[2], 2.0 * PHI));
    }

    #[test]
    fn test_total() {
        let s = generate_offsets(1.0, 2, OffsetPolicy::DirectPowers).unwrap();
        assert!(approx(s.total(), PHI * PHI));
    }

    #[test]
    fn test_invalid_arguments() {
        for base in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let r = generate_offsets(base, 3, OffsetPolicy::CumulativeIntervals);
            assert!(
                matches!(r, Err(PhiError::InvalidArgument { name: "base", .. })),
                "base={base}"
            );
        }
        let r = generate_offsets(1.0, 0, OffsetPolicy::DirectPowers);
        assert!(matches!(
            r,
            Err(PhiError::InvalidArgument { name: "count", .. })
        ));
    }

    #[test]
    fn test_overflow_is_an_error() {
        let r = generate_offsets(1.0, 5000, OffsetPolicy::CumulativeIntervals);
        assert!(matches!(
            r,
            Err(PhiError::InvalidArgument { name: "count", .. })
        ));
        let r = generate_offsets(1.0, 5000, OffsetPolicy::DirectPowers);
        assert!(r.is_err());
    }

    #[test]
    fn test_policy_from_str() {
        assert_eq!(
            "cumulative".parse::<OffsetPolicy>().unwrap(),
            OffsetPolicy::CumulativeIntervals
        );
        assert_eq!(
            "direct_powers".parse::<OffsetPolicy>().unwrap(),
            OffsetPolicy::DirectPowers
        );
        assert!("fibonacci".parse::<OffsetPolicy>().is_err());
    }
}
