use log::debug;
use polars::frame::DataFrame;

use crate::config::Config;
use crate::error::EurolensError;
use crate::source::SourceTables;

// Re-exports
pub use column_names as COL;

// Modules
pub mod charts;
pub mod column_names;
pub mod config;
pub mod error;
pub mod formatters;
pub mod jsonstat;
pub mod metadata;
pub mod pipeline;
pub mod report;
pub mod schema;
pub mod source;

/// Type for the eurolens pipeline and API
pub struct Eurolens {
    pub config: Config,
}

impl Eurolens {
    /// Setup the Eurolens object with default configuration
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Setup the Eurolens object with custom configuration
    pub fn with_config(config: Config) -> Self {
        debug!("config: {config:?}");
        Self { config }
    }

    /// Fetches the three sources and runs the full pipeline, returning the final
    /// country/year/sex table.
    pub async fn build_dataset(&self) -> Result<DataFrame, EurolensError> {
        let tables = source::fetch_source_tables(&self.config).await?;
        self.build_dataset_from(tables)
    }

    /// Runs the pipeline over already-retrieved source tables. This is the seam used by tests
    /// to supply canned JSON-stat fixtures instead of the live API.
    pub fn build_dataset_from(&self, tables: SourceTables) -> Result<DataFrame, EurolensError> {
        pipeline::run(tables, &self.config)
    }

    /// Builds the FAIR metadata document for a final table produced by this configuration.
    pub fn metadata_for(&self, df: &DataFrame) -> metadata::DatasetMetadata {
        metadata::build(&self.config, df)
    }
}

impl Default for Eurolens {
    fn default() -> Self {
        Self::new()
    }
}
