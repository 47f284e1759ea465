//! Company query services
//!
//! `aggregation` holds the pure joins; `directory` sequences the upstream
//! fetches they need.

pub mod aggregation;
pub mod directory;

pub use aggregation::AggregationRules;
pub use directory::CompanyDirectory;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::models::CompanySummary;

/// Queries served to the HTTP layer
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompanyQueries: Send + Sync {
    /// Companies of users with enough completed todos whose name contains
    /// `query`, case-insensitively
    async fn search_companies(&self, query: &str) -> Result<Vec<String>, FetchError>;

    /// Qualifying users of each requested company, in request order
    async fn users_by_companies(
        &self,
        companies: &[String],
    ) -> Result<Vec<CompanySummary>, FetchError>;
}
