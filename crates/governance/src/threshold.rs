//! Threshold scaling by proposal class.
//!
//! Classes with a larger blast radius demand proportionally more sustained
//! commitment: an informational proposal executes at the base threshold,
//! while one relaying arbitrary contract actions needs 2.5x as much
//! conviction.

use crate::proposal::ProposalClass;

/// Threshold multipliers, expressed in tenths to keep the math integral.
const fn multiplier_tenths(class: ProposalClass) -> u64 {
    match class {
        ProposalClass::General => 10,   // x1.0
        ProposalClass::Funding => 15,   // x1.5
        ProposalClass::Parameter => 20, // x2.0
        ProposalClass::Contract => 25,  // x2.5
    }
}

/// Conviction a proposal of the given class must accumulate before it
/// becomes executable.
///
/// Scaled in `u128` and saturated after the division, so a class multiplier
/// never yields less than the base threshold even at extreme bases.
pub fn required_conviction(class: ProposalClass, base_threshold: u64) -> u64 {
    let scaled = base_threshold as u128 * multiplier_tenths(class) as u128 / 10;
    scaled.min(u64::MAX as u128) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_scaling() {
        let base = 1_000_000;
        assert_eq!(required_conviction(ProposalClass::General, base), 1_000_000);
        assert_eq!(required_conviction(ProposalClass::Funding, base), 1_500_000);
        assert_eq!(
            required_conviction(ProposalClass::Parameter, base),
            2_000_000
        );
        assert_eq!(
            required_conviction(ProposalClass::Contract, base),
            2_500_000
        );
    }

    #[test]
    fn test_threshold_saturates_without_inverting_classes() {
        let base = u64::MAX;

        // Saturation must never push a scaled class below the base
        for class in [
            ProposalClass::General,
            ProposalClass::Funding,
            ProposalClass::Parameter,
            ProposalClass::Contract,
        ] {
            assert!(required_conviction(class, base) >= base);
        }

        assert_eq!(required_conviction(ProposalClass::General, base), base);
        assert_eq!(required_conviction(ProposalClass::Contract, base), u64::MAX);

        // Below the saturation point the scaling stays exact
        let base = u64::MAX / 4;
        assert_eq!(
            required_conviction(ProposalClass::Funding, base),
            (base as u128 * 15 / 10) as u64
        );
    }
}
