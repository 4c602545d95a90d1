pub mod fixed;
pub mod snapshot;

pub use snapshot::{
    CclHistory, DayDocument, History, Instrument, Macd, MacroIndicatorSnapshot, MetricSnapshot,
};
