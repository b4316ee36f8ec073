//! Errors raised by the incidence pipeline.
//!
//! Every error is terminal for one invocation. Callers decide whether to abort
//! a multi-country run or skip the affected country.

use thiserror::Error;

/// Errors that can occur while computing incidence for one country.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum IncidenceError {
    /// A required table, row, column or key is absent.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    /// A category, decile or group sums to zero and would be divided by.
    #[error("empty aggregation group `{group}`: total {quantity} is zero")]
    EmptyAggregationGroup {
        /// The offending category, decile or group.
        group: String,
        /// What was being summed.
        quantity: &'static str,
    },

    /// An elasticity exponent was applied to a non-positive base.
    #[error("domain violation in `{group}`: exponent base {base} must be positive")]
    DomainViolation {
        /// The offending category or decile.
        group: String,
        /// The post-shock base, i.e. `1 + Δp` or `1 + transfer / expenditure`.
        base: f64,
    },

    /// An expenditure category code outside the closed category set.
    #[error("unknown expenditure category `{0}`")]
    UnknownCategory(String),

    /// A value outside its admissible range (negative demand, bad decile...).
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

impl IncidenceError {
    pub(crate) fn empty_group(group: impl ToString, quantity: &'static str) -> Self {
        Self::EmptyAggregationGroup {
            group: group.to_string(),
            quantity,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, IncidenceError>;

/// Raise `base` to `exponent`, rejecting non-positive bases.
///
/// Both the price response `(1 + Δp)^ε` and the income response
/// `(1 + transfer / expenditure)^η` go through here.
pub(crate) fn elastic_response(group: impl ToString, base: f64, exponent: f64) -> Result<f64> {
    if !(base > 0.0) || !base.is_finite() {
        return Err(IncidenceError::DomainViolation {
            group: group.to_string(),
            base,
        });
    }
    Ok(base.powf(exponent))
}

/// Divide, treating a zero (or non-finite) denominator as an empty group.
pub(crate) fn share_of(
    group: impl ToString,
    quantity: &'static str,
    part: f64,
    total: f64,
) -> Result<f64> {
    if total == 0.0 || !total.is_finite() {
        return Err(IncidenceError::empty_group(group, quantity));
    }
    Ok(part / total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_elastic_response() {
        let r = elastic_response("food", 1.1, -0.5).unwrap();
        assert!((r - 1.1f64.powf(-0.5)).abs() < 1e-12);

        // Zero exponent leaves demand unchanged
        assert_eq!(elastic_response("food", 0.5, 0.0).unwrap(), 1.0);
    }

    #[test]
    fn test_elastic_response_rejects_non_positive_base() {
        assert_matches!(
            elastic_response("ely", 0.0, -0.3),
            Err(IncidenceError::DomainViolation { ref group, base })
                if group == "ely" && base == 0.0
        );
        assert_matches!(
            elastic_response("ely", -0.2, 1.0),
            Err(IncidenceError::DomainViolation { .. })
        );
        assert_matches!(
            elastic_response("ely", f64::NAN, 1.0),
            Err(IncidenceError::DomainViolation { .. })
        );
    }

    #[test]
    fn test_share_of_zero_total() {
        assert_eq!(share_of("food", "demand", 1.0, 4.0).unwrap(), 0.25);
        assert_matches!(
            share_of("food", "demand", 0.0, 0.0),
            Err(IncidenceError::EmptyAggregationGroup { quantity: "demand", .. })
        );
    }

    #[test]
    fn test_error_display() {
        let err = IncidenceError::empty_group("ccl", "expenditure");
        assert_eq!(
            err.to_string(),
            "empty aggregation group `ccl`: total expenditure is zero"
        );
    }
}
