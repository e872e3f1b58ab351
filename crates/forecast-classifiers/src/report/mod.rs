pub mod plots;
pub mod report;
