/// Statistical helpers for regression diagnostics.
use statrs::distribution::{ContinuousCDF, StudentsT};

/// Two-sided p-value of a t statistic with the given degrees of freedom.
///
/// Returns `None` when there are no degrees of freedom or the statistic is not finite.
pub(crate) fn two_sided_p_value(t_value: f64, degrees_of_freedom: usize) -> Option<f64> {
    if degrees_of_freedom == 0 || !t_value.is_finite() {
        return None;
    }

    let distribution = StudentsT::new(0., 1., degrees_of_freedom as f64).ok()?;

    Some((2. * (1. - distribution.cdf(t_value.abs()))).clamp(0., 1.))
}
