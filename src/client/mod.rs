pub mod analyzer_client;

pub use analyzer_client::AnalyzerClient;
