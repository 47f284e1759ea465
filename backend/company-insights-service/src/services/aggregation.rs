//! Company aggregation
//!
//! Pure joins over the upstream collections. Every function here is total:
//! dangling foreign keys and missing rows count as zero, never as errors.

use serde::Deserialize;
use std::collections::{HashMap, HashSet};

use crate::models::{Comment, CompanySummary, Post, Todo, User, UserSummary};

/// Thresholds applied by the aggregation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AggregationRules {
    /// A user's company is searchable once the user has strictly more
    /// completed todos than this
    #[serde(default = "default_completed_todo_threshold")]
    pub completed_todo_threshold: usize,

    /// A post counts as engaged once it has strictly more comments than this
    #[serde(default = "default_post_comment_threshold")]
    pub post_comment_threshold: usize,

    /// Minimum engaged posts for a user to be reported
    #[serde(default = "default_min_engaged_posts")]
    pub min_engaged_posts: usize,
}

fn default_completed_todo_threshold() -> usize {
    3
}

fn default_post_comment_threshold() -> usize {
    3
}

fn default_min_engaged_posts() -> usize {
    1
}

impl Default for AggregationRules {
    fn default() -> Self {
        Self {
            completed_todo_threshold: default_completed_todo_threshold(),
            post_comment_threshold: default_post_comment_threshold(),
            min_engaged_posts: default_min_engaged_posts(),
        }
    }
}

/// Tally occurrences of each key
fn count_by<T>(items: impl IntoIterator<Item = T>, key: impl Fn(T) -> i64) -> HashMap<i64, usize> {
    let mut counts = HashMap::new();
    for item in items {
        *counts.entry(key(item)).or_insert(0) += 1;
    }
    counts
}

/// Company names of users with enough completed todos, filtered by a
/// case-insensitive substring match on `query`
///
/// Names come out in user order and are not deduplicated.
pub fn search_companies(
    query: &str,
    users: &[User],
    todos: &[Todo],
    rules: &AggregationRules,
) -> Vec<String> {
    let completed_per_user = count_by(todos.iter().filter(|todo| todo.completed), |todo| {
        todo.user_id
    });
    let needle = query.to_lowercase();

    users
        .iter()
        .filter(|user| {
            completed_per_user.get(&user.id).copied().unwrap_or(0)
                > rules.completed_todo_threshold
        })
        .map(|user| &user.company.name)
        .filter(|name| name.to_lowercase().contains(&needle))
        .cloned()
        .collect()
}

/// One summary per requested company, in request order
///
/// A user is reported when they own enough engaged posts, belong to one of
/// `companies` and have both geo coordinates.
pub fn users_by_companies(
    companies: &[String],
    users: &[User],
    todos: &[Todo],
    comments: &[Comment],
    posts: &[Post],
    rules: &AggregationRules,
) -> Vec<CompanySummary> {
    let comments_per_post = count_by(comments, |comment| comment.post_id);

    let engaged_posts_per_user = count_by(
        posts.iter().filter(|post| {
            comments_per_post.get(&post.id).copied().unwrap_or(0) > rules.post_comment_threshold
        }),
        |post| post.user_id,
    );

    let todos_per_user = count_by(todos, |todo| todo.user_id);

    let targets: HashSet<&str> = companies.iter().map(String::as_str).collect();

    let valid_users: Vec<&User> = users
        .iter()
        .filter(|user| {
            engaged_posts_per_user.get(&user.id).copied().unwrap_or(0) >= rules.min_engaged_posts
                && targets.contains(user.company.name.as_str())
                && user.address.geo.is_known()
        })
        .collect();

    companies
        .iter()
        .map(|company_name| CompanySummary {
            company_name: company_name.clone(),
            users: valid_users
                .iter()
                .filter(|user| &user.company.name == company_name)
                .map(|user| UserSummary {
                    name: user.name.clone(),
                    email: user.email.clone(),
                    todo_count: todos_per_user.get(&user.id).copied().unwrap_or(0),
                })
                .collect(),
        })
        .collect()
}
