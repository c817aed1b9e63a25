use std::time::Duration;

use super::Cache;
use crate::hash;

/// Default lifetime for cached query results.
const DEFAULT_QUERY_TTL: Duration = Duration::from_secs(30 * 60);

/// Cache for database query results, keyed by a digest of the SQL text and
/// its parameters. Keys carry the queried table name so that all results for
/// one table can be invalidated together.
pub struct QueryCache<T> {
    inner: Cache<T>,
    ttl: Duration,
}

impl<T: Clone + Send + 'static> QueryCache<T> {
    pub fn new(inner: Cache<T>) -> Self {
        Self {
            inner,
            ttl: DEFAULT_QUERY_TTL,
        }
    }

    pub fn with_ttl(inner: Cache<T>, ttl: Duration) -> Self {
        Self { inner, ttl }
    }

    pub fn get(&self, table: &str, sql: &str, params: &[&str]) -> Option<T> {
        self.inner.get(&Self::key(table, sql, params))
    }

    pub fn set(&self, table: &str, sql: &str, params: &[&str], result: T) {
        self.inner
            .set_with_ttl(&Self::key(table, sql, params), result, self.ttl);
    }

    /// Drop every cached result for `table`. Returns the number of entries
    /// removed.
    pub fn invalidate_table(&self, table: &str) -> usize {
        self.inner.invalidate_matching(&format!("db_{table}_"))
    }

    fn key(table: &str, sql: &str, params: &[&str]) -> String {
        let digest = hash::sha256_bytes(format!("{sql}\x1f{}", params.join("\x1f")).as_bytes());
        format!("db_{table}_{digest}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_cache() -> QueryCache<Vec<String>> {
        QueryCache::new(Cache::new(32, Duration::from_secs(3600)))
    }

    #[test]
    fn result_round_trip() {
        let cache = query_cache();
        cache.set("users", "SELECT * FROM users WHERE id = ?", &["1"], vec!["alice".into()]);
        assert_eq!(
            cache.get("users", "SELECT * FROM users WHERE id = ?", &["1"]),
            Some(vec!["alice".into()])
        );
    }

    #[test]
    fn parameters_are_part_of_the_key() {
        let cache = query_cache();
        let sql = "SELECT * FROM users WHERE id = ?";
        cache.set("users", sql, &["1"], vec!["alice".into()]);
        assert_eq!(cache.get("users", sql, &["2"]), None);
    }

    #[test]
    fn invalidate_table_only_hits_that_table() {
        let cache = query_cache();
        cache.set("users", "SELECT * FROM users", &[], vec!["alice".into()]);
        cache.set("orders", "SELECT * FROM orders", &[], vec!["o1".into()]);
        assert_eq!(cache.invalidate_table("users"), 1);
        assert_eq!(cache.get("users", "SELECT * FROM users", &[]), None);
        assert!(cache.get("orders", "SELECT * FROM orders", &[]).is_some());
    }
}
