//! Lists the direct children of one folder.

use super::{BackgroundLoad, DirectoryResult, LoadContext, Target};
use crate::args::QueryArgs;
use crate::client::LocationQueryClient;
use crate::filter::RowFilterPipeline;
use crate::location::{DocumentInfo, RootRef};
use crate::mime::MimeTypeLookup;
use crate::options::{QueryOptions, ALL_RESULTS};
use crate::sort::RowOrdering;
use crate::stream::RowStream;
use std::sync::Arc;
use tracing::debug;

pub struct FolderLoader {
    client: Arc<dyn LocationQueryClient>,
    lookup: Arc<dyn MimeTypeLookup>,
    root: RootRef,
    dir: DocumentInfo,
    options: QueryOptions,
    ordering: Arc<dyn RowOrdering>,
}

impl FolderLoader {
    pub fn new(
        client: Arc<dyn LocationQueryClient>,
        lookup: Arc<dyn MimeTypeLookup>,
        root: RootRef,
        dir: DocumentInfo,
        options: QueryOptions,
        ordering: Arc<dyn RowOrdering>,
    ) -> Self {
        Self {
            client,
            lookup,
            root,
            dir,
            options,
            ordering,
        }
    }

    pub fn dir(&self) -> &DocumentInfo {
        &self.dir
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }
}

impl BackgroundLoad for FolderLoader {
    fn load_in_background(&self, ctx: &LoadContext) -> crate::Result<DirectoryResult> {
        let reject_before = self.options.reject_before_timestamp();
        let location = self.dir.children_location();
        debug!(%location, "Listing folder");

        // The children of a folder are never capped.
        let stream = self
            .client
            .fetch(
                &self.root.root_id,
                &location,
                &QueryArgs::new(),
                ALL_RESULTS,
                ctx.signal(),
            )
            .unwrap_or_else(RowStream::empty);

        let filtered = RowFilterPipeline::for_folder(&self.options, reject_before).apply(stream);
        let sorted = self.ordering.sort(filtered, self.lookup.as_ref());
        if let Some(observer) = ctx.observer() {
            sorted.register_observer(Arc::clone(observer));
        }

        Ok(DirectoryResult::new(Target::Folder(self.dir.clone())).with_stream(sorted))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationSignal;
    use crate::location::Location;
    use crate::mime::ExtensionLookup;
    use crate::row::Row;
    use crate::sort::{SortDimension, SortDirection, SortModel};
    use crate::stream::ChangeObserver;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recording {
        rows: Option<Vec<Row>>,
        seen: Mutex<Vec<(Location, usize, bool)>>,
    }

    impl LocationQueryClient for Recording {
        fn fetch(
            &self,
            _root_id: &str,
            location: &Location,
            args: &QueryArgs,
            max_results: usize,
            _cancel: &CancellationSignal,
        ) -> Option<RowStream> {
            self.seen
                .lock()
                .unwrap()
                .push((location.clone(), max_results, args.is_empty()));
            self.rows.clone().map(RowStream::new)
        }
    }

    fn loader(client: Arc<Recording>, options: QueryOptions) -> FolderLoader {
        FolderLoader::new(
            client,
            Arc::new(ExtensionLookup::new()),
            RootRef::new("local", "r0"),
            DocumentInfo::new("local", "r0:docs"),
            options,
            Arc::new(SortModel::new(SortDimension::Name, SortDirection::Ascending)),
        )
    }

    #[test]
    fn lists_children_uncapped_filtered_and_sorted() {
        let now = crate::options::now_millis();
        let client = Arc::new(Recording {
            rows: Some(vec![
                Row::new("1", "b.txt", "text/plain", now),
                Row::new("2", ".hidden", "text/plain", now),
                Row::directory("3", "z-dir", now),
                Row::new("4", "a.txt", "text/plain", now - 7_200_000),
            ]),
            ..Default::default()
        });
        let options = QueryOptions::new()
            .with_max_results(1)
            .with_max_last_modified_age(Duration::from_secs(3600));
        let result = loader(Arc::clone(&client), options)
            .load_in_background(&LoadContext::detached())
            .unwrap();

        let names: Vec<_> = result
            .stream()
            .unwrap()
            .iter()
            .map(|r| r.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["z-dir", "b.txt"]);
        assert_eq!(
            result.target(),
            &Target::Folder(DocumentInfo::new("local", "r0:docs"))
        );

        let seen = client.seen.lock().unwrap();
        assert_eq!(seen[0].0, DocumentInfo::new("local", "r0:docs").children_location());
        assert_eq!(seen[0].1, ALL_RESULTS);
        assert!(seen[0].2);
    }

    #[test]
    fn missing_folder_is_an_empty_listing() {
        let result = loader(Arc::new(Recording::default()), QueryOptions::new())
            .load_in_background(&LoadContext::detached())
            .unwrap();
        assert!(result.is_empty());
        assert!(!result.is_stale());
    }

    #[test]
    fn registers_context_observer_on_result() {
        let client = Arc::new(Recording {
            rows: Some(vec![Row::new("1", "a.txt", "text/plain", 0)]),
            ..Default::default()
        });
        let hits = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&hits);
        let observer: Arc<dyn ChangeObserver> = Arc::new(move || *counter.lock().unwrap() += 1);
        let ctx = LoadContext::new(Some(observer));

        let result = loader(client, QueryOptions::new())
            .load_in_background(&ctx)
            .unwrap();
        result.stream().unwrap().sources()[0].notify_changed();
        assert_eq!(*hits.lock().unwrap(), 1);
    }
}
