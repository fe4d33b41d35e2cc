//! testiki-client: Backend integrations for testiki.
//!
//! Implements the `TestSource` and `ResultSink` traits over the testiki REST
//! API, plus in-memory doubles for exercising the runner without a server.

pub mod api;
pub mod config;
mod error;
pub mod mock;

pub use api::ApiClient;
pub use config::{load_config, ClientConfig};
pub use mock::{MemorySink, MemorySource};
