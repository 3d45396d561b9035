//! Scour CLI - concurrent search and listing over local document roots

mod output;

use clap::{Parser, Subcommand};
use crossbeam_channel::unbounded;
use scour_core::config::{parse_duration, DEFAULT_CONFIG};
use scour_core::loader::BackgroundLoad;
use scour_core::provider::LOCAL_AUTHORITY;
use scour_core::{
    Config, DirectoryResult, ExtensionLookup, FolderLoader, LoadOutcome, LoaderHost,
    LocalProvider, LocationQueryClient, ProfileId, ProfileQueryClient, ProviderRegistry,
    QueryOptions, ScourError, SearchLoader, SortDimension, SortDirection, SortModel, ALL_RESULTS,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "scour")]
#[command(about = "Search many document roots at once", long_about = None)]
struct Cli {
    /// Config file (defaults apply when omitted)
    #[arg(long, global = true, env = "SCOUR_CONFIG")]
    config: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Verbose logging to stderr (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct FilterArgs {
    /// Only rows modified within this age (e.g., "90m", "7d")
    #[arg(long)]
    max_age: Option<String>,

    /// Include hidden files
    #[arg(long)]
    show_hidden: bool,

    /// Sort by: name, modified, size or type
    #[arg(long)]
    sort: Option<String>,

    /// Sort ascending instead of the configured direction
    #[arg(long, conflicts_with = "desc")]
    asc: bool,

    /// Sort descending instead of the configured direction
    #[arg(long)]
    desc: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search roots by name and/or recency
    Search {
        /// Case-insensitive name fragment; omit to browse recent files
        query: Option<String>,

        /// Directory to search (repeatable)
        #[arg(long = "root", required = true)]
        roots: Vec<PathBuf>,

        /// Time budget for all roots (e.g., "500ms", "3s", "none")
        #[arg(long)]
        timeout: Option<String>,

        /// Maximum rows per root (0 = unlimited)
        #[arg(long)]
        max_results: Option<usize>,

        /// MIME pattern to keep, e.g. "image/*" (repeatable)
        #[arg(long = "category")]
        categories: Vec<String>,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// List the direct children of a directory
    Ls {
        /// Directory to list
        dir: PathBuf,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Print the default configuration
    DefaultConfig,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Search {
            query,
            roots,
            timeout,
            max_results,
            categories,
            filters,
        } => cmd_search(
            cli.config.as_deref(),
            query,
            &roots,
            timeout.as_deref(),
            max_results,
            categories,
            &filters,
            cli.json,
        ),
        Commands::Ls { dir, filters } => cmd_ls(cli.config.as_deref(), &dir, &filters, cli.json),
        Commands::DefaultConfig => {
            print!("{}", DEFAULT_CONFIG);
            Ok(())
        }
    };

    if let Err(e) = result {
        if cli.json {
            let error_json = serde_json::json!({
                "code": e.code(),
                "message": e.to_string(),
                "hint": hint_for(&e),
            });
            eprintln!(
                "{}",
                serde_json::to_string_pretty(&error_json).unwrap_or_else(|_| e.to_string())
            );
        } else {
            eprintln!("Error: {}", e);
            let hint = hint_for(&e);
            if !hint.is_empty() {
                eprintln!("Hint: {}", hint);
            }
        }
        std::process::exit(exit_code(&e));
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "scour_core=debug,scour=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn exit_code(e: &ScourError) -> i32 {
    match e {
        ScourError::InvalidArgument(_) | ScourError::ConfigParse(_) => 2,
        _ => 1,
    }
}

fn hint_for(e: &ScourError) -> &'static str {
    match e {
        ScourError::InvalidArgument(_) => {
            "check the --root paths, --category patterns and query"
        }
        ScourError::ConfigParse(_) => "run `scour default-config` for a valid example",
        _ => "",
    }
}

fn load_config(path: Option<&Path>) -> scour_core::Result<Config> {
    match path {
        Some(path) => {
            debug!(path = %path.display(), "Loading config");
            Config::load(path)
        }
        None => Ok(Config::default()),
    }
}

fn flag_duration(flag: &str, value: &str) -> scour_core::Result<Duration> {
    parse_duration(value)
        .ok_or_else(|| ScourError::ConfigParse(format!("invalid duration for {flag}: '{value}'")))
}

/// Config options with the shared command-line overrides applied.
fn apply_filters(mut options: QueryOptions, filters: &FilterArgs) -> scour_core::Result<QueryOptions> {
    if let Some(age) = &filters.max_age {
        options = options.with_max_last_modified_age(flag_duration("--max-age", age)?);
    }
    if filters.show_hidden {
        options = options.with_show_hidden(true);
    }
    Ok(options)
}

fn sort_model(config: &Config, filters: &FilterArgs) -> scour_core::Result<SortModel> {
    let mut model = config.sort_model();
    if let Some(dimension) = &filters.sort {
        model.dimension = dimension.parse::<SortDimension>()?;
    }
    if filters.asc {
        model.direction = SortDirection::Ascending;
    } else if filters.desc {
        model.direction = SortDirection::Descending;
    }
    Ok(model)
}

fn local_client(provider: LocalProvider) -> Arc<dyn LocationQueryClient> {
    let registry =
        ProviderRegistry::new().with(ProfileId::DEFAULT, LOCAL_AUTHORITY, Arc::new(provider));
    Arc::new(ProfileQueryClient::new(vec![ProfileId::DEFAULT], registry))
}

fn add_root(provider: &mut LocalProvider, path: &Path) -> scour_core::Result<scour_core::RootRef> {
    let path = path.canonicalize()?;
    if !path.is_dir() {
        return Err(ScourError::InvalidArgument(format!(
            "{} is not a directory",
            path.display()
        )));
    }
    Ok(provider.add_root(path))
}

/// Runs one load cycle through a host and waits for its outcome.
fn run_once<L: BackgroundLoad>(loader: L) -> scour_core::Result<Arc<DirectoryResult>> {
    let host = LoaderHost::new(loader);
    let (tx, rx) = unbounded();
    host.set_listener(move |outcome| {
        let _ = tx.send(outcome);
    });
    host.start_loading();
    match rx.recv().map_err(|_| ScourError::Cancelled)? {
        LoadOutcome::Delivered(result) => Ok(result),
        LoadOutcome::Failed(err) => Err(Arc::try_unwrap(err)
            .unwrap_or_else(|shared| ScourError::provider(LOCAL_AUTHORITY, shared.to_string()))),
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_search(
    config_path: Option<&Path>,
    query: Option<String>,
    root_paths: &[PathBuf],
    timeout: Option<&str>,
    max_results: Option<usize>,
    categories: Vec<String>,
    filters: &FilterArgs,
    json: bool,
) -> scour_core::Result<()> {
    let config = load_config(config_path)?;
    let query = query
        .map(|q| q.trim().to_string())
        .filter(|q| !q.is_empty());

    let mut options = apply_filters(config.query_options(query.is_none())?, filters)?;
    match timeout {
        Some(t) if t.eq_ignore_ascii_case("none") => options.max_query_time = None,
        Some(t) => options = options.with_max_query_time(flag_duration("--timeout", t)?),
        None => {}
    }
    if let Some(max) = max_results {
        options = options.with_max_results(if max == 0 { ALL_RESULTS } else { max });
    }
    if !categories.is_empty() {
        options = options.with_categories(categories);
    }

    let mut provider = LocalProvider::new();
    let mut roots = Vec::with_capacity(root_paths.len());
    for path in root_paths {
        roots.push(add_root(&mut provider, path)?);
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(config.search.workers)
        .thread_name(|i| format!("scour-query-{i}"))
        .build()
        .map_err(|e| ScourError::Io(std::io::Error::other(e.to_string())))?;

    let loader = SearchLoader::new(
        local_client(provider),
        Arc::new(ExtensionLookup::new()),
        roots,
        query,
        options,
        Arc::new(sort_model(&config, filters)?),
        Arc::new(pool),
    )?;
    let result = run_once(loader)?;
    output::print_result(&result, json)
}

fn cmd_ls(
    config_path: Option<&Path>,
    dir: &Path,
    filters: &FilterArgs,
    json: bool,
) -> scour_core::Result<()> {
    let config = load_config(config_path)?;
    let options = apply_filters(config.query_options(false)?, filters)?;

    let mut provider = LocalProvider::new();
    let root = add_root(&mut provider, dir)?;
    let document = provider.root_document(&root).ok_or_else(|| {
        ScourError::InvalidArgument(format!("{} cannot be listed", dir.display()))
    })?;

    let loader = FolderLoader::new(
        local_client(provider),
        Arc::new(ExtensionLookup::new()),
        root,
        document,
        options,
        Arc::new(sort_model(&config, filters)?),
    );
    let result = run_once(loader)?;
    output::print_result(&result, json)
}
