//! Scour Core - Concurrent multi-root document search
//!
//! This library fans a query out to every selected storage root, collects
//! whatever completes within the time budget, and runs the merged rows
//! through a fixed filter and sort pipeline. Single-folder listings share
//! the same pipeline and result lifecycle.

pub mod args;
pub mod cancel;
pub mod client;
pub mod config;
pub mod error;
pub mod filter;
pub mod gate;
pub mod loader;
pub mod location;
pub mod merge;
pub mod mime;
pub mod options;
pub mod progress;
pub mod provider;
pub mod row;
pub mod sort;
pub mod stream;

pub use args::{ArgValue, QueryArgs};
pub use cancel::CancellationSignal;
pub use client::{
    DocumentsProvider, LocationQueryClient, ProfileQueryClient, ProviderRegistry,
    ProviderResolver,
};
pub use config::Config;
pub use error::ScourError;
pub use filter::RowFilterPipeline;
pub use gate::CountdownGate;
pub use loader::{
    BackgroundLoad, DirectoryResult, FolderLoader, LoadContext, LoadOutcome, LoaderHost,
    QueryTask, SearchLoader, Target, TaskState,
};
pub use location::{DocumentInfo, Location, ProfileId, RootRef};
pub use merge::merge_streams;
pub use mime::{ExtensionLookup, MimeTypeLookup};
pub use options::{QueryOptions, ALL_RESULTS};
pub use progress::{JobProgress, JobProgressTracker, JobState, ProgressObserver, ProgressState};
pub use provider::LocalProvider;
pub use row::Row;
pub use sort::{RowOrdering, SortDimension, SortDirection, SortModel};
pub use stream::{ChangeObserver, Cursor, RowSource, RowStream};

/// Result type alias for scour operations
pub type Result<T> = std::result::Result<T, ScourError>;
