pub mod service;

pub use service::{CollectorService, CycleSummary, PollError};
