use std::error::Error;
use std::fmt;

/// Error type for model fitting and evaluation failures
#[derive(Debug, Clone, PartialEq)]
pub enum ForecastError {
    /// (what, expected, found)
    ShapeMismatch(&'static str, usize, usize),
    EmptyData(&'static str),
    SingleClass,
    InvalidParameter(String),
    NotFitted(&'static str),
}

impl fmt::Display for ForecastError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ForecastError::ShapeMismatch(what, expected, found) => {
                write!(f, "Shape mismatch for {}: expected {}, found {}", what, expected, found)
            }
            ForecastError::EmptyData(what) => write!(f, "Empty input: {}", what),
            ForecastError::SingleClass => {
                write!(f, "Labels must contain both classes (0 and 1)")
            }
            ForecastError::InvalidParameter(msg) => write!(f, "Invalid parameter: {}", msg),
            ForecastError::NotFitted(step) => {
                write!(f, "Step '{}' must be fitted before it is used", step)
            }
        }
    }
}

impl Error for ForecastError {}

pub type Result<T> = std::result::Result<T, ForecastError>;

/// Check that a feature matrix and label vector describe the same samples and
/// that both classes are present.
pub fn check_xy(n_rows: usize, y: &[usize]) -> Result<()> {
    if n_rows == 0 {
        return Err(ForecastError::EmptyData("feature matrix has no rows"));
    }
    if y.len() != n_rows {
        return Err(ForecastError::ShapeMismatch("labels", n_rows, y.len()));
    }
    if let Some(&bad) = y.iter().find(|&&l| l > 1) {
        return Err(ForecastError::InvalidParameter(format!(
            "label {} is not a binary class id",
            bad
        )));
    }
    let positives = y.iter().filter(|&&l| l == 1).count();
    if positives == 0 || positives == y.len() {
        return Err(ForecastError::SingleClass);
    }
    Ok(())
}
