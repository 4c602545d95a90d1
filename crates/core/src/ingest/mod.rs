pub mod macro_feed;
pub mod provider;
pub mod types;

pub use macro_feed::{BuffettReading, HttpMacroFeed, MacroFeed};
pub use provider::{AlphaVantageClient, FeedError, MarketFeed};
pub use types::{DailyBar, DailySeries};
