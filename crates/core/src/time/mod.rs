pub mod market_date;

pub use market_date::resolve_as_of_date;
