//! Input substrate: the validated bar series a run replays.

pub mod series;

pub use series::{BarSeries, DataError};
