//! Configuration for company-insights-service
//!
//! Loads settings from environment variables, with a `.env` file picked up
//! for local development. Every field has a default.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

use crate::gateway::Resource;
use crate::services::AggregationRules;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment error: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub cache: CacheConfig,
    pub rules: AggregationRules,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_server_host")]
    pub server_host: String,
    #[serde(default = "default_server_port")]
    pub server_port: u16,
}

/// Location of the upstream REST API
#[derive(Debug, Clone, Deserialize)]
pub struct UpstreamConfig {
    #[serde(rename = "api_url", default = "default_base_url")]
    pub base_url: String,
    #[serde(rename = "users_endpoint", default = "default_users_path")]
    pub users_path: String,
    #[serde(rename = "todos_endpoint", default = "default_todos_path")]
    pub todos_path: String,
    #[serde(rename = "comments_endpoint", default = "default_comments_path")]
    pub comments_path: String,
    #[serde(rename = "posts_endpoint", default = "default_posts_path")]
    pub posts_path: String,
    #[serde(default = "default_timeout_secs")]
    pub upstream_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

/// Longest accepted cache TTL (one day)
pub const MAX_CACHE_TTL_SECS: u64 = 86_400;

fn default_server_host() -> String {
    "0.0.0.0".to_string()
}

fn default_server_port() -> u16 {
    3000
}

fn default_base_url() -> String {
    "https://jsonplaceholder.typicode.com".to_string()
}

fn default_users_path() -> String {
    "/users".to_string()
}

fn default_todos_path() -> String {
    "/todos".to_string()
}

fn default_comments_path() -> String {
    "/comments".to_string()
}

fn default_posts_path() -> String {
    "/posts".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_cache_ttl_secs() -> u64 {
    resource_cache::ttl::RESOURCE
}

impl UpstreamConfig {
    /// Config pointing every resource at its conventional path under `base_url`
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            users_path: default_users_path(),
            todos_path: default_todos_path(),
            comments_path: default_comments_path(),
            posts_path: default_posts_path(),
            upstream_timeout_secs: default_timeout_secs(),
        }
    }

    pub fn path(&self, resource: Resource) -> &str {
        match resource {
            Resource::Users => &self.users_path,
            Resource::Todos => &self.todos_path,
            Resource::Comments => &self.comments_path,
            Resource::Posts => &self.posts_path,
        }
    }

    pub fn url(&self, resource: Resource) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.path(resource)
        )
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "API_URL must be an http(s) URL, got {:?}",
                self.base_url
            )));
        }

        for resource in Resource::ALL {
            if !self.path(resource).starts_with('/') {
                return Err(ConfigError::Invalid(format!(
                    "{} endpoint must start with '/', got {:?}",
                    resource,
                    self.path(resource)
                )));
            }
        }

        if self.upstream_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "UPSTREAM_TIMEOUT_SECS must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(std::env::vars().collect())
    }

    /// Load configuration from an explicit set of variables
    pub fn from_vars(vars: Vec<(String, String)>) -> Result<Self, ConfigError> {
        Ok(Self {
            server: envy::from_iter(vars.clone())?,
            upstream: envy::from_iter(vars.clone())?,
            cache: envy::from_iter(vars.clone())?,
            rules: envy::from_iter(vars)?,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.server_port == 0 {
            return Err(ConfigError::Invalid(
                "SERVER_PORT must be greater than 0".to_string(),
            ));
        }

        if self.cache.cache_ttl_secs == 0 {
            return Err(ConfigError::Invalid(
                "CACHE_TTL_SECS must be greater than 0".to_string(),
            ));
        }

        if self.cache.cache_ttl_secs > MAX_CACHE_TTL_SECS {
            return Err(ConfigError::Invalid(format!(
                "CACHE_TTL_SECS must be at most {}, got {}",
                MAX_CACHE_TTL_SECS, self.cache.cache_ttl_secs
            )));
        }

        self.upstream.validate()
    }
}
