pub mod builder;
pub mod events;
pub mod macro_sync;
pub mod pipeline;
pub mod usage;

pub use builder::build_snapshot;
pub use events::{ChannelObserver, SyncEvent, SyncObserver, TracingObserver};
pub use macro_sync::{MacroReport, MacroSync};
pub use pipeline::{SyncOptions, SyncPipeline, SyncReport, SyncStatus};
pub use usage::UsageCounter;
