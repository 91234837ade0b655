//! Statistics used throughout the pipeline
//!
//! - Whole-series statistics and centering ([`series`])
//! - Online accumulation across windows or files ([`running`])

pub mod running;
pub mod series;

pub use running::{RunningStatistic, Summary};
pub use series::SeriesStatistics;
