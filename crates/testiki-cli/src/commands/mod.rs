pub mod init;
pub mod list;
pub mod score;
pub mod take;
pub mod validate;

use std::sync::Arc;

use anyhow::Result;
use testiki_client::{ApiClient, ClientConfig};
use testiki_core::parser::DirectorySource;
use testiki_core::traits::TestSource;

/// A local directory when one was given, the backend otherwise.
pub(crate) fn test_source(
    dir: Option<std::path::PathBuf>,
    config: &ClientConfig,
) -> Result<Arc<dyn TestSource>> {
    Ok(match dir {
        Some(dir) => Arc::new(DirectorySource::new(dir)),
        None => Arc::new(ApiClient::new(config)?),
    })
}
