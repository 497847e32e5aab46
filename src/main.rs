use clap::{Parser, Subcommand};
use songbook_intermediates::config::{self, DocumentLayout, SongbookConfig};
use songbook_intermediates::convert::CommandConverter;
use songbook_intermediates::hash_store::ContentHashStore;
use songbook_intermediates::process::{self, ArtifactBuilder, BuildMode, ConversionCache};
use songbook_intermediates::scan::{self, Library};
use songbook_intermediates::{generate, layout, output};
use std::path::{Path, PathBuf};
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;

fn version_string() -> &'static str {
    let on_tag = env!("ON_RELEASE_TAG");
    if on_tag == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup, called exactly once
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "songbook")]
#[command(about = "Incremental build of songbook slides, piano scores and the piano songbook")]
#[command(long_about = "\
Incremental build of songbook slides, piano scores and the piano songbook

Every folder holding an info.yml is a song. Scores next to it are converted
into numbered intermediate files, and only when their content changed.

Library structure:

  songs/
  ├── songbook.toml                # Configuration (optional)
  ├── filehashes.json              # Content hashes of converted scores (generated)
  ├── songs.tex                    # Piano songbook document (generated)
  └── s/
      └── Swing-low/
          ├── info.yml             # Song metadata, title is required
          ├── projector.mscx       # Projector score → NB/Projector_noNNN.svg
          ├── piano.mscx           # Piano score (or lead.mscx) → NB/Piano_noNNN.eps
          └── NB/                  # Intermediate files (generated)

Run 'songbook gen-config' to generate a documented songbook.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Library base directory
    #[arg(long, default_value = ".", global = true)]
    base: PathBuf,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Bring intermediate files of every song up to date
    Build {
        /// Which artifacts to build: all, slides or piano
        #[arg(long, default_value = "all")]
        mode: String,
        /// Rebuild even when scores are unchanged
        #[arg(long)]
        force: bool,
        /// File listing the song IDs to build, whitespace separated
        #[arg(long)]
        songs: Option<PathBuf>,
    },
    /// Rebuild one song, by song ID or folder path
    Update {
        /// Song ID or song folder
        target: String,
        /// Which artifacts to build: all, slides or piano
        #[arg(long, default_value = "all")]
        mode: String,
    },
    /// Remove all generated files and the hash store
    Clean,
    /// Write the piano songbook document
    Assemble {
        /// Document layout: page-turn, alphabetical or sequential
        #[arg(long)]
        layout: Option<String>,
        /// File listing the song IDs to include, whitespace separated
        #[arg(long)]
        songs: Option<PathBuf>,
    },
    /// Validate the library and show the page-turn plan without building
    Check,
    /// Maintain the content hash store
    Hashes {
        #[command(subcommand)]
        action: HashesAction,
    },
    /// Print a stock songbook.toml with all options documented
    GenConfig,
}

#[derive(Subcommand, Clone, Copy)]
enum HashesAction {
    /// Forget all recorded hashes and rewrite an empty store
    Flush,
    /// Forget all recorded hashes and delete the store file
    Purge,
    /// Drop records of files that no longer exist
    Prune,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = match cli.command {
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
            return Ok(());
        }
        _ => config::load_config(&cli.base)?,
    };
    debug!(base = %cli.base.display(), "configuration loaded");

    match cli.command {
        Command::Build { mode, force, songs } => {
            let mode: BuildMode = mode.parse()?;
            let mut library = load_library(&cli.base, &config, songs.as_deref())?;
            init_thread_pool(&config.processing);

            let store = ContentHashStore::open(config.hash_store_path(library.base_path()))?;
            let converter = CommandConverter::new(config.converters.clone());
            let cache = ConversionCache::new();
            let builder = ArtifactBuilder::new(&converter, &store, &config, &cache);

            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                for event in rx {
                    for line in output::format_build_event(&event, mode) {
                        println!("{}", line);
                    }
                }
            });
            let report = builder.build_library(&mut library, mode, force, Some(&tx));
            drop(tx);
            printer.join().map_err(|_| "build output thread panicked")?;

            output::print_build_summary(&report);
            if report.failure_count() > 0 {
                return Err(format!("{} songs failed to build", report.failure_count()).into());
            }
        }
        Command::Update { target, mode } => {
            let mode: BuildMode = mode.parse()?;
            let mut library = load_library(&cli.base, &config, None)?;

            let store = ContentHashStore::open(config.hash_store_path(library.base_path()))?;
            let converter = CommandConverter::new(config.converters.clone());
            let cache = ConversionCache::new();
            let builder = ArtifactBuilder::new(&converter, &store, &config, &cache);

            let report = builder.update_song(&mut library, &target, mode)?;
            for line in output::format_song_report(1, &report) {
                println!("{}", line);
            }
            if report.has_failure() {
                return Err(format!("{} failed to build", report.song_id).into());
            }
        }
        Command::Clean => {
            let mut library = load_library(&cli.base, &config, None)?;
            let store = ContentHashStore::open(config.hash_store_path(library.base_path()))?;
            let report = process::clean_library(&mut library, &store, &config)?;
            output::print_clean_output(&report, library.base_path());
        }
        Command::Assemble { layout, songs } => {
            let layout = match layout {
                Some(name) => name.parse::<DocumentLayout>()?,
                None => config.document.layout,
            };
            let library = load_library(&cli.base, &config, songs.as_deref())?;
            let path = config.document_path(library.base_path());
            generate::write_document(&library, layout, &path)?;
            let song_count = generate::document_songs(&library).len();
            for line in output::format_assemble_output(&path, song_count, layout.as_str()) {
                println!("{}", line);
            }
        }
        Command::Check => {
            let library = load_library(&cli.base, &config, None)?;
            output::print_scan_output(&library);
            let groups = layout::plan(generate::document_songs(&library))?;
            output::print_layout_plan(&groups);
            println!("==> Library is valid");
        }
        Command::Hashes { action } => {
            let store = ContentHashStore::open(config.hash_store_path(&cli.base))?;
            match action {
                HashesAction::Flush => {
                    store.flush()?;
                    println!("Flushed {}", store.path().display());
                }
                HashesAction::Purge => {
                    store.purge()?;
                    println!("Purged {}", store.path().display());
                }
                HashesAction::Prune => {
                    let removed = store.prune()?;
                    println!("Pruned {} stale records from {}", removed, store.path().display());
                }
            }
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// Scan the library and apply an optional restriction list.
fn load_library(
    base: &Path,
    config: &SongbookConfig,
    songs: Option<&Path>,
) -> Result<Library, scan::ScanError> {
    let mut library = scan::scan(base, config)?;
    if let Some(list) = songs {
        library.restrict_to(list)?;
    }
    debug!(songs = library.len(), "library scanned");
    Ok(library)
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores; the user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}
