// Command handlers module
pub mod config;
pub mod monitor;
pub mod store;
pub mod version;

// Re-exports for cleaner imports
pub use monitor::{MonitorOptions, MonitorSession, MonitorSummary};
pub use store::{ReadingStore, StoredReading};
pub use version::execute as version;
