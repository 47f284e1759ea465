use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use super::aggregation::{self, AggregationRules};
use super::CompanyQueries;
use crate::error::FetchError;
use crate::gateway::DataGateway;
use crate::models::CompanySummary;

/// Company queries backed by the upstream API
///
/// Each query fetches the collections it needs concurrently and fails as a
/// whole if any one of them fails.
pub struct CompanyDirectory {
    gateway: Arc<DataGateway>,
    rules: AggregationRules,
}

impl CompanyDirectory {
    pub fn new(gateway: Arc<DataGateway>, rules: AggregationRules) -> Self {
        Self { gateway, rules }
    }

    pub fn gateway(&self) -> &DataGateway {
        &self.gateway
    }
}

#[async_trait]
impl CompanyQueries for CompanyDirectory {
    async fn search_companies(&self, query: &str) -> Result<Vec<String>, FetchError> {
        let (users, todos) = tokio::try_join!(self.gateway.users(), self.gateway.todos())
            .map_err(|e| {
                warn!(error = %e, "Company search aborted");
                e
            })?;

        let companies = aggregation::search_companies(query, &users, &todos, &self.rules);

        debug!(
            query = %query,
            matches = companies.len(),
            "Company search complete"
        );
        Ok(companies)
    }

    async fn users_by_companies(
        &self,
        companies: &[String],
    ) -> Result<Vec<CompanySummary>, FetchError> {
        let (users, todos, comments, posts) = tokio::try_join!(
            self.gateway.users(),
            self.gateway.todos(),
            self.gateway.comments(),
            self.gateway.posts()
        )
        .map_err(|e| {
            warn!(error = %e, "Company user lookup aborted");
            e
        })?;

        let summaries = aggregation::users_by_companies(
            companies,
            &users,
            &todos,
            &comments,
            &posts,
            &self.rules,
        );

        debug!(
            companies = companies.len(),
            users = summaries.iter().map(|s| s.users.len()).sum::<usize>(),
            "Company user lookup complete"
        );
        Ok(summaries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;
    use crate::error::FetchCause;
    use crate::gateway::Resource;
    use resource_cache::ManualClock;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, route: &str, body: serde_json::Value, calls: u64) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .expect(calls)
            .mount(server)
            .await;
    }

    fn directory(server: &MockServer) -> CompanyDirectory {
        let gateway = DataGateway::with_clock(
            UpstreamConfig::with_base_url(server.uri()),
            Duration::from_secs(600),
            Arc::new(ManualClock::new()),
        )
        .unwrap();
        CompanyDirectory::new(Arc::new(gateway), AggregationRules::default())
    }

    fn users_json() -> serde_json::Value {
        serde_json::json!([
            {
                "id": 1,
                "name": "Leanne Graham",
                "email": "Sincere@april.biz",
                "address": { "geo": { "lat": "-37.3159", "lng": "81.1496" } },
                "company": { "name": "Romaguera-Crona" }
            },
            {
                "id": 2,
                "name": "Ervin Howell",
                "email": "Shanna@melissa.tv",
                "address": { "geo": { "lat": "-43.9509", "lng": "-34.4618" } },
                "company": { "name": "Deckow-Crist" }
            }
        ])
    }

    #[tokio::test]
    async fn test_search_fetches_only_users_and_todos() {
        let server = MockServer::start().await;
        mount(&server, "/users", users_json(), 1).await;
        mount(
            &server,
            "/todos",
            serde_json::json!([
                { "userId": 1, "id": 1, "completed": true },
                { "userId": 1, "id": 2, "completed": true },
                { "userId": 1, "id": 3, "completed": true },
                { "userId": 1, "id": 4, "completed": true },
                { "userId": 2, "id": 5, "completed": true }
            ]),
            1,
        )
        .await;
        mount(&server, "/comments", serde_json::json!([]), 0).await;
        mount(&server, "/posts", serde_json::json!([]), 0).await;

        let directory = directory(&server);

        assert_eq!(
            directory.search_companies("ROM").await.unwrap(),
            vec!["Romaguera-Crona".to_string()]
        );
        // Served from cache the second time
        assert_eq!(
            directory.search_companies("rom").await.unwrap(),
            vec!["Romaguera-Crona".to_string()]
        );
    }

    #[tokio::test]
    async fn test_users_by_companies_shares_cache_with_search() {
        let server = MockServer::start().await;
        mount(&server, "/users", users_json(), 1).await;
        mount(
            &server,
            "/todos",
            serde_json::json!([
                { "userId": 1, "id": 1, "completed": true },
                { "userId": 1, "id": 2, "completed": false }
            ]),
            1,
        )
        .await;
        mount(
            &server,
            "/comments",
            serde_json::json!([
                { "postId": 1, "id": 1 },
                { "postId": 1, "id": 2 },
                { "postId": 1, "id": 3 },
                { "postId": 1, "id": 4 }
            ]),
            1,
        )
        .await;
        mount(
            &server,
            "/posts",
            serde_json::json!([{ "userId": 1, "id": 1 }, { "userId": 2, "id": 2 }]),
            1,
        )
        .await;

        let directory = directory(&server);
        directory.search_companies("").await.unwrap();

        let companies = vec!["Romaguera-Crona".to_string(), "Deckow-Crist".to_string()];
        let summaries = directory.users_by_companies(&companies).await.unwrap();

        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].company_name, "Romaguera-Crona");
        assert_eq!(summaries[0].users.len(), 1);
        assert_eq!(summaries[0].users[0].todo_count, 2);
        assert!(summaries[1].users.is_empty());
        assert_eq!(directory.gateway().cache().len(), 4);
    }

    #[tokio::test]
    async fn test_any_failed_fetch_fails_the_query() {
        let server = MockServer::start().await;
        // Sibling fetches may be dropped once one fails, so their call
        // counts are not asserted
        for (route, body) in [
            ("/users", users_json()),
            ("/todos", serde_json::json!([])),
            ("/posts", serde_json::json!([])),
        ] {
            Mock::given(method("GET"))
                .and(path(route))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
                .mount(&server)
                .await;
        }
        Mock::given(method("GET"))
            .and(path("/comments"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let directory = directory(&server);
        let err = directory
            .users_by_companies(&["Romaguera-Crona".to_string()])
            .await
            .unwrap_err();

        assert_eq!(err.resource, Resource::Comments);
        assert!(matches!(err.cause, FetchCause::Status { status: 500, .. }));
    }
}
