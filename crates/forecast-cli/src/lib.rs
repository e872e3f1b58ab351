//! forecast-cli: experiment driver for the health-forecast study.
pub mod experiments;
pub mod input;
pub mod util;
