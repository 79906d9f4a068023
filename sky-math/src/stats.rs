//! NaN-aware robust statistics.
//!
//! All functions filter NaN values before computing and return an error when
//! no valid values remain, so callers always distinguish "undefined" from a
//! numeric zero.

use thiserror::Error;

/// Errors from statistical computations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StatsError {
    /// No valid (non-NaN) values were available.
    #[error("insufficient data points: {total} total values, 0 valid (all NaN or empty)")]
    Empty {
        /// Number of values supplied, including NaN.
        total: usize,
    },
}

fn valid_values(values: &[f64]) -> Result<Vec<f64>, StatsError> {
    let valid: Vec<f64> = values.iter().filter(|v| !v.is_nan()).copied().collect();
    if valid.is_empty() {
        return Err(StatsError::Empty {
            total: values.len(),
        });
    }
    Ok(valid)
}

/// Calculate the median of a slice of f64 values.
///
/// NaN values are filtered out; infinite values are kept. For even-length
/// data the average of the two middle values is returned.
///
/// # Errors
///
/// Returns [`StatsError::Empty`] if no valid values remain after filtering.
pub fn median(values: &[f64]) -> Result<f64, StatsError> {
    let mut valid = valid_values(values)?;
    valid.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let n = valid.len();
    let m = if n % 2 == 0 {
        (valid[n / 2 - 1] + valid[n / 2]) / 2.0
    } else {
        valid[n / 2]
    };
    Ok(m)
}

/// Calculate the arithmetic mean of a slice of f64 values, ignoring NaN.
///
/// # Errors
///
/// Returns [`StatsError::Empty`] if no valid values remain after filtering.
pub fn mean(values: &[f64]) -> Result<f64, StatsError> {
    let valid = valid_values(values)?;
    Ok(valid.iter().sum::<f64>() / valid.len() as f64)
}

/// Calculate the population standard deviation, ignoring NaN.
///
/// Uses the population convention (divide by N, not N-1), matching the
/// repeatability definition used for per-star magnitude RMS. A single value
/// has zero scatter.
///
/// # Errors
///
/// Returns [`StatsError::Empty`] if no valid values remain after filtering.
pub fn std_dev(values: &[f64]) -> Result<f64, StatsError> {
    let valid = valid_values(values)?;
    let n = valid.len() as f64;
    let mu = valid.iter().sum::<f64>() / n;
    let var = valid.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / n;
    Ok(var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_median_odd_length() {
        assert_eq!(median(&[3.0, 1.0, 2.0]).unwrap(), 2.0);
    }

    #[test]
    fn test_median_even_length() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]).unwrap(), 2.5);
    }

    #[test]
    fn test_median_filters_nan() {
        assert_eq!(median(&[f64::NAN, 5.0, 1.0, f64::NAN, 3.0]).unwrap(), 3.0);
    }

    #[test]
    fn test_median_all_nan_is_error() {
        let err = median(&[f64::NAN, f64::NAN]).unwrap_err();
        assert_eq!(err, StatsError::Empty { total: 2 });
    }

    #[test]
    fn test_median_empty_is_error() {
        assert!(median(&[]).is_err());
    }

    #[test]
    fn test_mean_simple() {
        assert_relative_eq!(mean(&[1.0, 2.0, 3.0, 4.0]).unwrap(), 2.5);
    }

    #[test]
    fn test_mean_ignores_nan() {
        assert_relative_eq!(mean(&[2.0, f64::NAN, 4.0]).unwrap(), 3.0);
    }

    #[test]
    fn test_std_dev_population_convention() {
        // Population std of [2, 4, 4, 4, 5, 5, 7, 9] is exactly 2.
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(std_dev(&values).unwrap(), 2.0);
    }

    #[test]
    fn test_std_dev_single_value_is_zero() {
        assert_eq!(std_dev(&[17.25]).unwrap(), 0.0);
    }
}
