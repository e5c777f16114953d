//! mtree CLI - stage directories into a content-addressed store

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::debug;

use mtree::{load_mtree, path::put_file_at, stage_dir, write_mtree, Hash, MutableTree, Store};

#[derive(Parser, Debug)]
#[command(name = "mtree")]
#[command(about = "stage directory trees into a content-addressed store")]
#[command(version)]
struct Cli {
    /// store path
    #[arg(short, long, default_value = ".", env = "MTREE_STORE")]
    store: PathBuf,

    /// log verbosity
    #[arg(long, value_enum, default_value_t = LogLevel::Warn)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// initialize a new store
    Init {
        /// path to create the store at
        #[arg(default_value = ".")]
        path: PathBuf,
    },

    /// stage one or more directories into a single tree and write it
    Commit {
        /// source directories, later ones overlaid on earlier ones
        #[arg(required = true)]
        sources: Vec<PathBuf>,
    },

    /// list a stored tree
    Ls {
        /// contents checksum of the tree
        contents: String,

        /// list recursively
        #[arg(short, long)]
        recursive: bool,
    },

    /// replace one file in a stored tree and write the result
    PutFile {
        /// contents checksum of the tree
        contents: String,

        /// metadata checksum of the tree root
        metadata: String,

        /// path of the file inside the tree
        path: String,

        /// checksum of the file blob
        checksum: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum LogLevel {
    Debug,
    Info,
    #[default]
    Warn,
    Error,
    Silent,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<tracing::Level> {
        match self {
            LogLevel::Debug => Some(tracing::Level::DEBUG),
            LogLevel::Info => Some(tracing::Level::INFO),
            LogLevel::Warn => Some(tracing::Level::WARN),
            LogLevel::Error => Some(tracing::Level::ERROR),
            LogLevel::Silent => None,
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_tracing(cli.log_level);
    debug!("parsed cli arguments: {cli:?}");

    if let Err(e) = run(cli) {
        eprintln!("error: {}", e);
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn setup_tracing(level: LogLevel) {
    if let Some(level) = level.to_tracing_level() {
        tracing_subscriber::fmt()
            .with_max_level(level)
            .with_writer(std::io::stderr)
            .without_time()
            .compact()
            .init();
    }
}

fn run(cli: Cli) -> mtree::Result<()> {
    match cli.command {
        Commands::Init { path } => {
            Store::init(&path)?;
            println!("initialized store at {}", path.display());
        }

        Commands::Commit { sources } => {
            let store = Store::open(&cli.store)?;
            let mut tree = MutableTree::new();

            for source in &sources {
                let stats = stage_dir(&store, &mut tree, source)?;
                if stats.skipped > 0 {
                    eprintln!(
                        "warning: skipped {} special files in {}",
                        stats.skipped,
                        source.display()
                    );
                }
            }

            let (contents, metadata) =
                write_mtree(&store, &mut tree, &store.config().write_options())?;
            println!("{} {}", contents, metadata);
        }

        Commands::Ls {
            contents,
            recursive,
        } => {
            let store = Store::open(&cli.store)?;
            list_tree(&store, &Hash::from_hex(&contents)?, "", recursive)?;
        }

        Commands::PutFile {
            contents,
            metadata,
            path,
            checksum,
        } => {
            let store = Store::open(&cli.store)?;
            // validate before it goes into the tree as an opaque string
            let checksum = Hash::from_hex(&checksum)?.to_hex();

            let mut tree = load_mtree(
                &store,
                &Hash::from_hex(&contents)?,
                &Hash::from_hex(&metadata)?,
            )?;
            put_file_at(&mut tree, &path, &checksum, &metadata)?;

            let (contents, metadata) =
                write_mtree(&store, &mut tree, &store.config().write_options())?;
            println!("{} {}", contents, metadata);
        }
    }

    Ok(())
}

fn list_tree(store: &Store, contents: &Hash, prefix: &str, recursive: bool) -> mtree::Result<()> {
    let tree = store.read_dirtree(contents)?;

    for dir in tree.dirs() {
        let path = format!("{}/{}", prefix, dir.name);
        println!("d {} {} {}", dir.contents, dir.metadata, path);
        if recursive {
            list_tree(store, &dir.contents, &path, recursive)?;
        }
    }
    for file in tree.files() {
        println!("f {} {}/{}", file.checksum, prefix, file.name);
    }

    Ok(())
}
