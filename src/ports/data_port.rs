//! Bar feed port trait.

use crate::domain::error::OrbtraderError;
use crate::domain::ohlcv::Bar;
use chrono::NaiveDate;

pub trait DataPort {
    /// Bars between `start` and `end` inclusive, ascending by timestamp.
    ///
    /// Fails with `NoData` when nothing falls inside the range.
    fn fetch_bars(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<Vec<Bar>, OrbtraderError>;

    /// Human-readable name of the feed, used in logs and output file names.
    fn source_name(&self) -> String;
}
