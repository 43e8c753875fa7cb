pub mod client;
pub mod event_log;
pub mod utils;

pub use client::ServiceClient;
pub use event_log::EventLog;
