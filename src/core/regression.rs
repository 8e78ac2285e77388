/// Polynomial least squares over a symbolic term list.
///
/// A term expression is a `+`-separated sum of terms, each a `*`-separated product of factors
/// `Xk` or `Xk^n` (regressor `k`, counting from 1, raised to `n`). The factor `1` contributes a
/// constant. Rows are `[response, x1, x2, ...]`.
use crate::statistics::two_sided_p_value;
use nalgebra::{DMatrix, DVector};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq)]
pub enum RegressionError {
    #[error("No model terms")]
    NoModelTerms,
    #[error("Unsupported factor: {0}")]
    UnsupportedFactor(String),
    #[error("Insufficient data points ({valid_rows} valid rows for {terms} terms)")]
    InsufficientData { valid_rows: usize, terms: usize },
    #[error("Singular matrix")]
    SingularMatrix,
    #[error("Expected {expected} weights but {actual} were supplied")]
    WeightCountMismatch { expected: usize, actual: usize },
}

#[derive(Clone, Debug, PartialEq)]
struct Factor {
    regressor: usize,
    power: i32,
}

impl FromStr for Factor {
    type Err = RegressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || RegressionError::UnsupportedFactor(s.to_string());

        let body = s.strip_prefix('X').ok_or_else(unsupported)?;
        let (index, power) = match body.split_once('^') {
            Some((index, power)) => (index, power),
            None => (body, "1"),
        };
        let all_digits = |part: &str| !part.is_empty() && part.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(index) || !all_digits(power) {
            return Err(unsupported());
        }

        Ok(Self {
            regressor: index.parse().map_err(|_| unsupported())?,
            power: power.parse().map_err(|_| unsupported())?,
        })
    }
}

/// One monomial of a model: the product of its factors (empty for the constant term).
#[derive(Clone, Debug, PartialEq)]
struct Term {
    factors: Vec<Factor>,
}

impl Term {
    /// Value of the monomial for regressors `x` (x[0] is X1). A regressor that is not present
    /// evaluates as not-a-number.
    fn evaluate(&self, x: &[f64]) -> f64 {
        self.factors.iter().fold(1., |product, factor| {
            let base = factor
                .regressor
                .checked_sub(1)
                .and_then(|i| x.get(i))
                .copied()
                .unwrap_or(f64::NAN);
            product * base.powi(factor.power)
        })
    }
}

impl FromStr for Term {
    type Err = RegressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let factors = s
            .split('*')
            .map(str::trim)
            .filter(|factor| !factor.is_empty() && *factor != "1")
            .map(Factor::from_str)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { factors })
    }
}

fn parse_terms(expression: &str) -> Result<Vec<Term>, RegressionError> {
    let terms = expression
        .split('+')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .map(Term::from_str)
        .collect::<Result<Vec<_>, _>>()?;

    if terms.is_empty() {
        return Err(RegressionError::NoModelTerms);
    }

    Ok(terms)
}

/// Gauss-Jordan elimination with partial pivoting, solving `a · x = b` for every column of `b`.
fn solve_with_partial_pivoting(
    mut a: DMatrix<f64>,
    mut b: DMatrix<f64>,
) -> Result<DMatrix<f64>, RegressionError> {
    let n = a.nrows();

    for col in 0..n {
        let (pivot_row, pivot_abs) = (col..n)
            .map(|row| (row, a[(row, col)].abs()))
            .fold((col, a[(col, col)].abs()), |best, candidate| {
                if candidate.1 > best.1 {
                    candidate
                } else {
                    best
                }
            });

        if !pivot_abs.is_finite() || pivot_abs == 0. {
            return Err(RegressionError::SingularMatrix);
        }

        if pivot_row != col {
            a.swap_rows(col, pivot_row);
            b.swap_rows(col, pivot_row);
        }

        let pivot = a[(col, col)];
        a.row_mut(col).scale_mut(1. / pivot);
        b.row_mut(col).scale_mut(1. / pivot);

        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[(row, col)];
            if factor == 0. {
                continue;
            }
            for c in col..n {
                let pivot_value = a[(col, c)];
                a[(row, c)] -= factor * pivot_value;
            }
            for c in 0..b.ncols() {
                let pivot_value = b[(col, c)];
                b[(row, c)] -= factor * pivot_value;
            }
        }
    }

    Ok(b)
}

/// A solved regression model. Only constructed by a successful fit.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FittedModel {
    expression: String,
    #[serde(skip)]
    terms: Vec<Term>,
    coefficients: Vec<f64>,
    r_squared: Option<f64>,
    residual_standard_error: Option<f64>,
    t_values: Vec<Option<f64>>,
    p_values: Vec<Option<f64>>,
    observations: usize,
}

impl FittedModel {
    /// Ordinary least squares fit of `expression` to `rows`.
    pub fn fit(rows: &[Vec<f64>], expression: &str) -> Result<Self, RegressionError> {
        Self::fit_weighted(rows, None, expression)
    }

    /// Weighted least squares fit.
    ///
    /// Arguments:
    /// * `rows` - observations as `[response, x1, x2, ...]`
    /// * `weights` - one weight per row (all 1 when `None`); rows with a negative or non-finite
    ///   weight are discarded
    /// * `expression` - the model's term expression
    pub fn fit_weighted(
        rows: &[Vec<f64>],
        weights: Option<&[f64]>,
        expression: &str,
    ) -> Result<Self, RegressionError> {
        let terms = parse_terms(expression)?;
        if let Some(weights) = weights {
            if weights.len() != rows.len() {
                return Err(RegressionError::WeightCountMismatch {
                    expected: rows.len(),
                    actual: weights.len(),
                });
            }
        }

        let mut design_rows: Vec<Vec<f64>> = vec![];
        let mut responses: Vec<f64> = vec![];
        let mut row_weights: Vec<f64> = vec![];

        for (i, row) in rows.iter().enumerate() {
            if row.len() < 2 || !row[0].is_finite() {
                continue;
            }
            let weight = weights.map_or(1., |weights| weights[i]);
            if !weight.is_finite() || weight < 0. {
                continue;
            }
            let design_row: Vec<f64> = terms.iter().map(|term| term.evaluate(&row[1..])).collect();
            if design_row.iter().any(|value| !value.is_finite()) {
                continue;
            }
            design_rows.push(design_row);
            responses.push(row[0]);
            row_weights.push(weight);
        }

        let n = design_rows.len();
        let p = terms.len();
        if n < p {
            return Err(RegressionError::InsufficientData {
                valid_rows: n,
                terms: p,
            });
        }

        let x = DMatrix::from_fn(n, p, |i, j| design_rows[i][j]);
        let y = DVector::from_vec(responses);
        let w = DVector::from_vec(row_weights);

        let x_weighted = DMatrix::from_fn(n, p, |i, j| x[(i, j)] * w[i]);
        let xtwx = x.transpose() * &x_weighted;
        let xtwy = x_weighted.transpose() * &y;

        let beta = solve_with_partial_pivoting(
            xtwx.clone(),
            DMatrix::from_column_slice(p, 1, xtwy.as_slice()),
        )?
        .column(0)
        .clone_owned();

        let fitted = &x * &beta;
        let weight_total = w.sum();
        let y_mean = if weight_total > 0. {
            w.dot(&y) / weight_total
        } else {
            f64::NAN
        };
        let (sse, sst) = (0..n).fold((0., 0.), |(sse, sst), i| {
            (
                sse + w[i] * (y[i] - fitted[i]).powi(2),
                sst + w[i] * (y[i] - y_mean).powi(2),
            )
        });

        let r_squared = (sst > 0.).then(|| 1. - sse / sst);
        let degrees_of_freedom = n - p;
        let mse = if degrees_of_freedom > 0 {
            sse / degrees_of_freedom as f64
        } else {
            0.
        };
        let residual_standard_error = (degrees_of_freedom > 0).then(|| mse.sqrt());

        let t_values: Vec<Option<f64>> =
            match solve_with_partial_pivoting(xtwx, DMatrix::identity(p, p)) {
                Ok(inverse) => (0..p)
                    .map(|j| {
                        let standard_error = (mse * inverse[(j, j)]).max(0.).sqrt();
                        (standard_error > 0.).then(|| beta[j] / standard_error)
                    })
                    .collect(),
                Err(_) => vec![None; p],
            };
        let p_values = t_values
            .iter()
            .map(|t| t.and_then(|t| two_sided_p_value(t, degrees_of_freedom)))
            .collect();

        Ok(Self {
            expression: expression.to_string(),
            terms,
            coefficients: beta.iter().copied().collect(),
            r_squared,
            residual_standard_error,
            t_values,
            p_values,
            observations: n,
        })
    }

    /// Evaluate the fitted polynomial; `x[0]` is X1.
    pub fn predict(&self, x: &[f64]) -> f64 {
        self.terms
            .iter()
            .zip(&self.coefficients)
            .map(|(term, coefficient)| coefficient * term.evaluate(x))
            .sum()
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn r_squared(&self) -> Option<f64> {
        self.r_squared
    }

    pub fn residual_standard_error(&self) -> Option<f64> {
        self.residual_standard_error
    }

    pub fn t_values(&self) -> &[Option<f64>] {
        &self.t_values
    }

    pub fn p_values(&self) -> &[Option<f64>] {
        &self.p_values
    }

    pub fn observations(&self) -> usize {
        self.observations
    }

    pub fn parameters(&self) -> usize {
        self.terms.len()
    }
}

impl fmt::Display for FittedModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (n={}, p={}, R²={})",
            self.expression,
            self.observations,
            self.terms.len(),
            self.r_squared
                .map_or_else(|| "n/a".to_string(), |r2| format!("{r2:.4}"))
        )
    }
}
