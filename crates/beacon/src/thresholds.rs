//! Eligibility and voting threshold math.
//!
//! Two thresholds govern the protocol:
//!
//! - the **ATX threshold** gates which VRF signatures may be broadcast as
//!   proposals: a 64-byte signature is eligible iff its big-endian integer
//!   value is below `floor(f(W) * 2^512)` where
//!   `f(W) = 1 - 2^(-kappa / ((1 - q) * W))` and `W` is the epoch weight;
//! - the **voting threshold** `floor(theta * W)` decides when a proposal's
//!   accumulated margin counts as a definite opinion.
//!
//! `2^512` matches the bit length of a 64-byte VRF signature, making
//! eligibility a uniform Bernoulli trial over signature space.

use num_bigint::{BigInt, BigUint};
use num_rational::{BigRational, Ratio};
use num_traits::{Float, ToPrimitive};
use thiserror::Error;

/// Bit length of a VRF signature, which doubles as the proposal space.
const SIGNATURE_BITS: u32 = 64 * 8;

/// Errors produced by threshold computations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThresholdError {
    /// The epoch weight is zero, so no threshold can be derived.
    #[error("zero epoch weight provided")]
    ZeroEpochWeight,
}

/// The eligibility fraction `f(W) = 1 - 2^(-kappa / ((1 - q) * W))`.
///
/// `q` must lie in `(0, 1)`; configuration validation enforces this.
/// The exponent is formed with exact rational arithmetic and only the final
/// transcendental step runs in IEEE-754 double precision, which is
/// bit-identical across conforming platforms.
pub fn atx_threshold_fraction(
    kappa: u64,
    q: Ratio<u64>,
    epoch_weight: u64,
) -> Result<f64, ThresholdError> {
    if epoch_weight == 0 {
        return Err(ThresholdError::ZeroEpochWeight);
    }

    // kappa / ((1 - q) * W), as an exact rational before the float conversion
    let one_minus_q = BigRational::new(
        BigInt::from(*q.denom()) - BigInt::from(*q.numer()),
        BigInt::from(*q.denom()),
    );
    let denom = one_minus_q * BigRational::from_integer(BigInt::from(epoch_weight));
    let exponent = BigRational::from_integer(BigInt::from(kappa)) / denom;
    let exponent = exponent.to_f64().unwrap_or(f64::MAX);

    // 1 - 2^(-x) through exp_m1, which keeps precision for the tiny
    // fractions produced by very large epoch weights.
    Ok(-(-exponent * std::f64::consts::LN_2).exp_m1())
}

/// The ATX threshold `floor(f(W) * 2^512)`.
///
/// The fraction's mantissa and binary exponent are carried into the 512-bit
/// signature space exactly, so thresholds keep their magnitude across the
/// whole weight range instead of being clipped to a fixed scale.
pub fn atx_threshold(
    kappa: u64,
    q: Ratio<u64>,
    epoch_weight: u64,
) -> Result<BigUint, ThresholdError> {
    let fraction = atx_threshold_fraction(kappa, q, epoch_weight)?;
    if fraction <= 0.0 {
        return Ok(BigUint::from(0u32));
    }
    let (mantissa, exponent, _sign) = fraction.integer_decode();
    let shift = SIGNATURE_BITS as i64 + i64::from(exponent);
    let threshold = if shift >= 0 {
        BigUint::from(mantissa) << shift as u32
    } else {
        BigUint::from(mantissa) >> (-shift) as u32
    };
    Ok(threshold)
}

/// Whether a VRF signature passes the eligibility threshold.
///
/// The signature bytes are interpreted as a big-endian integer.
pub fn proposal_passes_threshold(signature: &[u8], threshold: &BigUint) -> bool {
    BigUint::from_bytes_be(signature) < *threshold
}

/// The voting threshold `floor(theta * W)`, computed exactly.
pub fn voting_threshold(theta: Ratio<u64>, epoch_weight: u64) -> BigInt {
    let scaled = BigUint::from(epoch_weight) * BigUint::from(*theta.numer())
        / BigUint::from(*theta.denom());
    BigInt::from(scaled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::Sign;
    use num_traits::One;

    #[test]
    fn zero_weight_is_an_error() {
        assert_eq!(
            atx_threshold_fraction(40, Ratio::new(1, 3), 0),
            Err(ThresholdError::ZeroEpochWeight)
        );
        assert_eq!(
            atx_threshold(40, Ratio::new(1, 3), 0),
            Err(ThresholdError::ZeroEpochWeight)
        );
    }

    #[test]
    fn fraction_in_unit_interval() {
        for weight in [1, 10, 1_000, 1_000_000, u64::MAX] {
            let f = atx_threshold_fraction(40, Ratio::new(1, 3), weight).unwrap();
            assert!(f > 0.0, "weight {weight}");
            assert!(f <= 1.0, "weight {weight}");
        }
    }

    #[test]
    fn fraction_decreases_with_weight() {
        let small = atx_threshold_fraction(40, Ratio::new(1, 3), 100).unwrap();
        let large = atx_threshold_fraction(40, Ratio::new(1, 3), 100_000).unwrap();
        assert!(small > large);
    }

    #[test]
    fn tiny_weight_admits_everything() {
        // kappa large relative to the weight pushes the fraction to 1 and
        // the threshold to the full signature space.
        let threshold = atx_threshold(1_000, Ratio::new(1, 3), 1).unwrap();
        assert_eq!(threshold, BigUint::one() << 512);
        assert!(proposal_passes_threshold(&[0xffu8; 64], &threshold));
    }

    #[test]
    fn huge_weights_keep_a_positive_threshold() {
        // The fraction is ~2e-18 here; the threshold must keep its
        // magnitude (~2^452) rather than collapse to zero.
        let threshold = atx_threshold(40, Ratio::new(1, 3), u64::MAX).unwrap();
        assert!(threshold > BigUint::from(0u32));
        assert!(threshold < BigUint::one() << 512);
    }

    #[test]
    fn threshold_gates_signatures() {
        let threshold = atx_threshold(40, Ratio::new(1, 3), 1_000_000).unwrap();
        // An all-zero signature is always below any positive threshold.
        assert!(proposal_passes_threshold(&[0u8; 64], &threshold));
        // An all-ones signature is the maximum value and never passes a
        // fraction strictly below one.
        assert!(!proposal_passes_threshold(&[0xffu8; 64], &threshold));
    }

    #[test]
    fn voting_threshold_floors() {
        assert_eq!(voting_threshold(Ratio::new(1, 4), 1_000), BigInt::from(250));
        assert_eq!(voting_threshold(Ratio::new(1, 3), 10), BigInt::from(3));
        assert_eq!(voting_threshold(Ratio::new(1, 2), 0), BigInt::from(0));
        assert_eq!(
            voting_threshold(Ratio::new(1, 1), u64::MAX).sign(),
            Sign::Plus
        );
    }
}
