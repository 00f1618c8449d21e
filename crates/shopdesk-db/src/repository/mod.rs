//! # Repositories
//!
//! One repository per collection. Each wraps a cloned `SqlitePool` and is
//! created on demand through [`crate::Database`].

pub mod audit;
pub mod category;
pub mod loyalty;
pub mod order;
pub mod product;
pub mod sale;
pub mod supplier;
pub mod user;

use shopdesk_core::Visibility;
use uuid::Uuid;

/// Generates a new primary key.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// SQL predicate for a catalog visibility. Column name is always `status`.
pub(crate) fn visibility_predicate(visibility: Visibility) -> &'static str {
    match visibility {
        Visibility::ActiveOnly => "status = 'active'",
        Visibility::IncludeArchived => "1 = 1",
    }
}

/// Builds a case-insensitive `LIKE` pattern matching `query` anywhere,
/// escaping the wildcard characters. Use with `ESCAPE '\'`.
pub(crate) fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.trim().to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}
