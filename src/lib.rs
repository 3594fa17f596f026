pub mod api_client;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod domain_utils;
pub mod export;
pub mod logger;
pub mod orchestrator;
pub mod rate_limit;
pub mod result_sink;
pub mod target;

pub use api_client::{ApiCallError, ApiClient, ApiRequest, Provider};
pub use discovery::{Collector, CollectorError, SourceKind, SubdomainSet};
pub use orchestrator::{CollectionReport, Orchestrator, SourceOutcome};
pub use result_sink::{FileSink, ResultSink};
pub use target::Target;
