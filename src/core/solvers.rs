use tracing::debug;

/// When a forward-difference Newton iteration may stop.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Convergence {
    /// Stop once a step moves the estimate by no more than the tolerance.
    StepSize,
    /// Stop once the residual at the new estimate is below the tolerance.
    ResidualAfterStep,
    /// Test the residual at the current estimate before stepping.
    ResidualBeforeStep,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct ForwardNewton {
    pub(crate) step: f64,
    pub(crate) tolerance: f64,
    pub(crate) max_steps: usize,
    pub(crate) convergence: Convergence,
    pub(crate) bounds: Option<(f64, f64)>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct NewtonOutcome {
    pub(crate) estimate: f64,
    pub(crate) steps: usize,
    pub(crate) converged: bool,
}

impl ForwardNewton {
    /// Drive `residual` towards zero from `x0`, approximating the derivative with a forward
    /// difference of width `step`. The best estimate is returned even when the iteration cap is
    /// reached first.
    pub(crate) fn solve(&self, residual: impl Fn(f64) -> f64, x0: f64) -> NewtonOutcome {
        let clamp = |x: f64| match self.bounds {
            Some((lower, upper)) => x.clamp(lower, upper),
            None => x,
        };

        let mut estimate = x0;
        for steps in 0..self.max_steps {
            estimate = clamp(estimate);
            let current = residual(estimate);

            if self.convergence == Convergence::ResidualBeforeStep
                && current.abs() < self.tolerance
            {
                return NewtonOutcome {
                    estimate,
                    steps,
                    converged: true,
                };
            }

            let slope = (current - residual(estimate + self.step)) / self.step;
            if !slope.is_finite() || slope.abs() < 1e-9 {
                debug!(estimate, slope, "Newton iteration stopped on a flat or undefined slope");
                return NewtonOutcome {
                    estimate,
                    steps,
                    converged: false,
                };
            }

            let next = estimate + current / slope;
            if !next.is_finite() {
                return NewtonOutcome {
                    estimate,
                    steps,
                    converged: false,
                };
            }

            let converged = match self.convergence {
                Convergence::StepSize => (next - estimate).abs() <= self.tolerance,
                Convergence::ResidualAfterStep => residual(next).abs() < self.tolerance,
                Convergence::ResidualBeforeStep => false,
            };
            estimate = next;
            if converged {
                return NewtonOutcome {
                    estimate,
                    steps: steps + 1,
                    converged: true,
                };
            }
        }

        debug!(
            estimate,
            max_steps = self.max_steps,
            "Newton iteration reached its step limit, keeping last estimate"
        );
        NewtonOutcome {
            estimate: clamp(estimate),
            steps: self.max_steps,
            converged: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::*;

    fn solver(convergence: Convergence) -> ForwardNewton {
        ForwardNewton {
            step: 1e-4,
            tolerance: 1e-6,
            max_steps: 10,
            convergence,
            bounds: None,
        }
    }

    #[rstest]
    #[case(Convergence::StepSize)]
    #[case(Convergence::ResidualAfterStep)]
    #[case(Convergence::ResidualBeforeStep)]
    fn test_finds_square_root(#[case] convergence: Convergence) {
        let outcome = solver(convergence).solve(|x| 2. - x * x, 1.);
        assert!(outcome.converged);
        assert_relative_eq!(outcome.estimate, 2f64.sqrt(), epsilon = 1e-4);
    }

    #[rstest]
    fn test_respects_bounds() {
        let bounded = ForwardNewton {
            bounds: Some((0., 1.)),
            ..solver(Convergence::ResidualBeforeStep)
        };
        let outcome = bounded.solve(|x| 5. - x, 0.5);
        assert!(!outcome.converged);
        assert_eq!(outcome.estimate, 1.);
    }

    #[rstest]
    fn test_returns_last_estimate_when_capped() {
        let capped = ForwardNewton {
            max_steps: 1,
            ..solver(Convergence::ResidualAfterStep)
        };
        let outcome = capped.solve(|x| 2. - x * x, 10.);
        assert!(!outcome.converged);
        assert_eq!(outcome.steps, 1);
        assert!(outcome.estimate < 10.);
    }

    #[rstest]
    fn test_flat_residual_stops_without_moving() {
        let outcome = solver(Convergence::StepSize).solve(|_| 3., 4.);
        assert!(!outcome.converged);
        assert_eq!(outcome.estimate, 4.);
    }
}
