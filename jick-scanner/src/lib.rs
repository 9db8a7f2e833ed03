pub mod config;
pub mod controls;
pub mod crawler;
pub mod endpoint;
pub mod error;
pub mod extract;
pub mod frontier;
pub mod result;
pub mod scope;
pub mod session;
pub mod sink;
pub mod synth;

pub use config::GenerationConfig;
pub use crawler::{CrawlSettings, Crawler, Features, ProgressCallback};
pub use endpoint::{Endpoint, FingerprintScope, Method};
pub use error::ScanError;
pub use frontier::Frontier;
pub use result::{CrawlOutcome, TerminationReason};
pub use scope::Scope;
pub use session::{DelayBounds, SessionSettings};
pub use sink::{EndpointSink, LineSink};
