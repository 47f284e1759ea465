/// Company aggregation endpoint
///
/// Searches companies by name fragment, then returns the engaged users of
/// every match.
use actix_web::{get, web, HttpResponse};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::Result;
use crate::models::CompaniesResponse;
use crate::services::CompanyQueries;

/// Query parameters for GET /get_data
#[derive(Debug, Deserialize)]
pub struct GetDataQuery {
    /// Case-insensitive company name fragment; absent matches every company
    pub company: Option<String>,
}

pub struct CompanyHandlerState {
    pub queries: Arc<dyn CompanyQueries>,
}

#[get("/get_data")]
pub async fn get_data(
    state: web::Data<CompanyHandlerState>,
    query: web::Query<GetDataQuery>,
) -> Result<HttpResponse> {
    let search = query.into_inner().company.unwrap_or_default();

    let companies = state.queries.search_companies(&search).await?;
    let summaries = state.queries.users_by_companies(&companies).await?;

    debug!(
        search = %search,
        companies = summaries.len(),
        "Served company aggregation"
    );

    Ok(HttpResponse::Ok().json(CompaniesResponse {
        companies: summaries,
    }))
}
