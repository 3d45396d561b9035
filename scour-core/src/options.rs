//! Query options shared by folder listings and searches.

use crate::args::QueryArgs;
use std::collections::BTreeSet;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// `max_results` value that imposes no cap.
pub const ALL_RESULTS: usize = usize::MAX;

/// Immutable query configuration.
///
/// - maximum number of rows per root; [`ALL_RESULTS`] for no cap
/// - maximum last-modified age; rows older than `now - age` are rejected
/// - maximum time to wait for per-root queries; `None` waits indefinitely
/// - whether hidden rows are shown
/// - acceptable MIME type wildcards; empty means no restriction
/// - extra provider arguments, merged last into every per-root query
///
/// Categories are a set, so equality and hashing ignore their order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryOptions {
    pub max_results: usize,
    pub max_last_modified_age: Option<Duration>,
    pub max_query_time: Option<Duration>,
    pub show_hidden: bool,
    pub acceptable_categories: BTreeSet<String>,
    pub other_query_args: QueryArgs,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            max_results: ALL_RESULTS,
            max_last_modified_age: None,
            max_query_time: None,
            show_hidden: false,
            acceptable_categories: BTreeSet::new(),
            other_query_args: QueryArgs::new(),
        }
    }
}

impl QueryOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_max_last_modified_age(mut self, age: Duration) -> Self {
        self.max_last_modified_age = Some(age);
        self
    }

    pub fn with_max_query_time(mut self, time: Duration) -> Self {
        self.max_query_time = Some(time);
        self
    }

    pub fn with_show_hidden(mut self, show_hidden: bool) -> Self {
        self.show_hidden = show_hidden;
        self
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.acceptable_categories = categories.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_other_query_args(mut self, args: QueryArgs) -> Self {
        self.other_query_args = args;
        self
    }

    /// Earliest acceptable last-modified timestamp in epoch millis, or 0
    /// when there is no age limit.
    pub fn reject_before_timestamp(&self) -> i64 {
        self.reject_before_timestamp_at(now_millis())
    }

    /// [`QueryOptions::reject_before_timestamp`] against a fixed clock.
    pub fn reject_before_timestamp_at(&self, now_ms: i64) -> i64 {
        match self.max_last_modified_age {
            None => 0,
            Some(age) => {
                let age_ms = i64::try_from(age.as_millis()).unwrap_or(i64::MAX);
                now_ms.saturating_sub(age_ms)
            }
        }
    }

    pub fn is_time_unlimited(&self) -> bool {
        self.max_query_time.is_none()
    }

    pub fn has_category_restriction(&self) -> bool {
        !self.acceptable_categories.is_empty()
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    fn hash_of(options: &QueryOptions) -> u64 {
        let mut hasher = DefaultHasher::new();
        options.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn reject_before_is_zero_without_age() {
        let options = QueryOptions::new();
        assert_eq!(options.reject_before_timestamp(), 0);
        assert_eq!(options.reject_before_timestamp_at(1_000_000), 0);
    }

    #[test]
    fn reject_before_subtracts_age_from_now() {
        let options = QueryOptions::new().with_max_last_modified_age(Duration::from_secs(60));
        assert_eq!(options.reject_before_timestamp_at(1_000_000), 940_000);

        let now = now_millis();
        let live = options.reject_before_timestamp();
        assert!(live >= now - 60_000 && live <= now_millis() - 60_000);
    }

    #[test]
    fn time_unlimited_only_without_query_time() {
        assert!(QueryOptions::new().is_time_unlimited());
        assert!(!QueryOptions::new()
            .with_max_query_time(Duration::from_millis(1))
            .is_time_unlimited());
    }

    #[test]
    fn equality_ignores_category_order() {
        let a = QueryOptions::new()
            .with_max_results(10)
            .with_categories(["image/*", "video/*"]);
        let b = QueryOptions::new()
            .with_max_results(10)
            .with_categories(["video/*", "image/*"]);
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        let c = b.clone().with_categories(["video/*"]);
        assert_ne!(a, c);
    }

    #[test]
    fn equality_covers_every_field() {
        let base = QueryOptions::new();
        assert_ne!(base, base.clone().with_show_hidden(true));
        assert_ne!(base, base.clone().with_max_results(5));
        assert_ne!(
            base,
            base.clone()
                .with_max_query_time(Duration::from_secs(1))
        );
        let mut args = QueryArgs::new();
        args.put_bool("x", true);
        assert_ne!(base, base.clone().with_other_query_args(args));
    }
}
