//! Location query client: fetches rows for one location on behalf of the
//! loaders, trying each user profile in turn.

use crate::args::QueryArgs;
use crate::cancel::CancellationSignal;
use crate::location::{Location, ProfileId};
use crate::stream::RowStream;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// What the loaders consume. `None` means "no rows from this location" and
/// is never an error for the caller.
pub trait LocationQueryClient: Send + Sync {
    fn fetch(
        &self,
        root_id: &str,
        location: &Location,
        args: &QueryArgs,
        max_results: usize,
        cancel: &CancellationSignal,
    ) -> Option<RowStream>;
}

/// A content provider serving one authority for one profile.
pub trait DocumentsProvider: Send + Sync {
    fn query(
        &self,
        location: &Location,
        args: &QueryArgs,
        cancel: &CancellationSignal,
    ) -> crate::Result<Option<RowStream>>;
}

/// Acquires a provider for `(profile, authority)`. `Ok(None)` means the
/// profile has no such provider.
pub trait ProviderResolver: Send + Sync {
    fn acquire(
        &self,
        profile: ProfileId,
        authority: &str,
    ) -> crate::Result<Option<Arc<dyn DocumentsProvider>>>;
}

/// Static `(profile, authority) -> provider` table.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<(ProfileId, String), Arc<dyn DocumentsProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        profile: ProfileId,
        authority: impl Into<String>,
        provider: Arc<dyn DocumentsProvider>,
    ) {
        self.providers.insert((profile, authority.into()), provider);
    }

    pub fn with(
        mut self,
        profile: ProfileId,
        authority: impl Into<String>,
        provider: Arc<dyn DocumentsProvider>,
    ) -> Self {
        self.register(profile, authority, provider);
        self
    }
}

impl ProviderResolver for ProviderRegistry {
    fn acquire(
        &self,
        profile: ProfileId,
        authority: &str,
    ) -> crate::Result<Option<Arc<dyn DocumentsProvider>>> {
        Ok(self
            .providers
            .get(&(profile, authority.to_string()))
            .cloned())
    }
}

/// Multi-profile client: profiles are tried in order and the first one
/// whose provider yields a stream wins. Unreachable providers, provider
/// errors and empty answers all fall through to the next profile; when
/// every profile fails the result is `None`. Never retries.
pub struct ProfileQueryClient<R> {
    profiles: Vec<ProfileId>,
    resolver: R,
}

impl<R: ProviderResolver> ProfileQueryClient<R> {
    pub fn new(profiles: Vec<ProfileId>, resolver: R) -> Self {
        Self { profiles, resolver }
    }

    pub fn profiles(&self) -> &[ProfileId] {
        &self.profiles
    }
}

impl<R: ProviderResolver> LocationQueryClient for ProfileQueryClient<R> {
    fn fetch(
        &self,
        root_id: &str,
        location: &Location,
        args: &QueryArgs,
        max_results: usize,
        cancel: &CancellationSignal,
    ) -> Option<RowStream> {
        let authority = location.authority()?;
        for &profile in &self.profiles {
            debug!(%profile, %location, "Querying location");
            let provider = match self.resolver.acquire(profile, authority) {
                Ok(Some(provider)) => provider,
                Ok(None) => {
                    debug!(%profile, authority, "No provider for profile");
                    continue;
                }
                Err(err) => {
                    warn!(%profile, %location, error = %err, "Failed to acquire provider");
                    continue;
                }
            };
            match provider.query(location, args, cancel) {
                Ok(Some(stream)) => {
                    return Some(tag_rows(&stream, root_id, authority, profile, max_results));
                }
                Ok(None) => debug!(%profile, %location, "Provider returned no stream"),
                Err(err) => warn!(%profile, %location, error = %err, "Failed to query location"),
            }
        }
        None
    }
}

/// Stamps origin tags on every row and applies the per-root cap.
fn tag_rows(
    stream: &RowStream,
    root_id: &str,
    authority: &str,
    profile: ProfileId,
    max_results: usize,
) -> RowStream {
    stream.map_rows(|rows| {
        rows.into_iter()
            .take(max_results)
            .map(|mut row| {
                row.root_id = Some(root_id.to_string());
                row.authority = Some(authority.to_string());
                row.profile = Some(profile);
                row
            })
            .collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ScourError;
    use crate::location::RootRef;
    use crate::options::ALL_RESULTS;
    use crate::row::Row;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Answer {
        Rows(usize),
        Nothing,
        Fail,
    }

    struct Scripted {
        answer: Answer,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(answer: Answer) -> Arc<Self> {
            Arc::new(Self {
                answer,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl DocumentsProvider for Scripted {
        fn query(
            &self,
            _location: &Location,
            _args: &QueryArgs,
            _cancel: &CancellationSignal,
        ) -> crate::Result<Option<RowStream>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match self.answer {
                Answer::Rows(n) => Ok(Some(RowStream::new(
                    (0..n)
                        .map(|i| Row::new(i.to_string(), format!("f{i}"), "text/plain", 0))
                        .collect(),
                ))),
                Answer::Nothing => Ok(None),
                Answer::Fail => Err(ScourError::provider("docs", "remote died")),
            }
        }
    }

    fn fetch(client: &dyn LocationQueryClient, root: &RootRef, max: usize) -> Option<RowStream> {
        client.fetch(
            &root.root_id,
            &root.search_location(),
            &QueryArgs::new(),
            max,
            &CancellationSignal::new(),
        )
    }

    #[test]
    fn first_successful_profile_wins() {
        let failing = Scripted::new(Answer::Fail);
        let empty = Scripted::new(Answer::Nothing);
        let good = Scripted::new(Answer::Rows(3));
        let later = Scripted::new(Answer::Rows(9));
        let registry = ProviderRegistry::new()
            .with(ProfileId(0), "docs", failing.clone())
            .with(ProfileId(1), "docs", empty.clone())
            .with(ProfileId(2), "docs", good.clone())
            .with(ProfileId(3), "docs", later.clone());
        let client = ProfileQueryClient::new(
            vec![ProfileId(0), ProfileId(1), ProfileId(9), ProfileId(2), ProfileId(3)],
            registry,
        );

        let stream = fetch(&client, &RootRef::new("docs", "r1"), ALL_RESULTS).unwrap();
        assert_eq!(stream.len(), 3);
        assert_eq!(failing.calls.load(Ordering::SeqCst), 1);
        assert_eq!(empty.calls.load(Ordering::SeqCst), 1);
        assert_eq!(later.calls.load(Ordering::SeqCst), 0);

        let row = &stream.rows()[0];
        assert_eq!(row.root_id.as_deref(), Some("r1"));
        assert_eq!(row.authority.as_deref(), Some("docs"));
        assert_eq!(row.profile, Some(ProfileId(2)));
    }

    #[test]
    fn all_profiles_failing_is_not_found() {
        let registry = ProviderRegistry::new()
            .with(ProfileId(0), "docs", Scripted::new(Answer::Fail))
            .with(ProfileId(1), "docs", Scripted::new(Answer::Nothing));
        let client = ProfileQueryClient::new(vec![ProfileId(0), ProfileId(1)], registry);
        assert!(fetch(&client, &RootRef::new("docs", "r1"), ALL_RESULTS).is_none());
    }

    #[test]
    fn unresolvable_authority_skips_profiles() {
        let provider = Scripted::new(Answer::Rows(1));
        let registry = ProviderRegistry::new().with(ProfileId(0), "", provider.clone());
        let client = ProfileQueryClient::new(vec![ProfileId(0)], registry);
        assert!(fetch(&client, &RootRef::new("", "r1"), ALL_RESULTS).is_none());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn caps_rows_per_root() {
        let registry =
            ProviderRegistry::new().with(ProfileId(0), "docs", Scripted::new(Answer::Rows(10)));
        let client = ProfileQueryClient::new(vec![ProfileId(0)], registry);
        let stream = fetch(&client, &RootRef::new("docs", "r1"), 4).unwrap();
        assert_eq!(stream.len(), 4);
        assert_eq!(stream.rows()[3].document_id, "3");
    }
}
