use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use partition::{
    load_collection_config, open_partition_manager, update_directory_indexes, IndexStore,
    PartitionEntry, PartitionError, PartitionManager, PartitionType, RemovedSet,
    SnapshotIndexStore, UpdateMode,
};

#[derive(Parser, Debug)]
#[command(name = "partition-tree")]
#[command(about = "Print the partition tree of a configured collection", long_about = None)]
struct Cli {
    /// Collection config (JSON)
    config: PathBuf,

    /// Update mode: nocheck, test or always (defaults to the config's)
    #[arg(short, long)]
    mode: Option<UpdateMode>,

    /// Write or refresh indexes before printing
    #[arg(long)]
    write_indexes: bool,

    /// Number of levels to expand
    #[arg(short, long, default_value_t = 2)]
    depth: usize,

    /// List member files under each collection
    #[arg(long)]
    files: bool,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("partition-tree: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> partition::Result<()> {
    let config = load_collection_config(&cli.config)?;
    let mode = cli.mode.unwrap_or(config.update_mode);
    let store: Arc<dyn IndexStore> = Arc::new(SnapshotIndexStore::new());

    if cli.write_indexes {
        if config.partition_type()? != PartitionType::Directory {
            return Err(PartitionError::Config(format!(
                "--write-indexes needs directory partitioning, {} uses {}",
                config.name, config.partition
            )));
        }
        let summary = update_directory_indexes(
            &config.name,
            &config.root,
            &config.file_filter()?,
            store.as_ref(),
            mode,
        )?;
        println!(
            "indexes: {} written, {} kept, {} partial",
            summary.written, summary.kept, summary.partial
        );
    }

    let removed = config.removed_set();
    let mut manager = open_partition_manager(&config, store)?;
    println!("{} ({})", manager.name(), manager.root().display());
    print_level(manager.as_mut(), mode, &removed, cli, 1)
}

fn print_level(
    manager: &mut dyn PartitionManager,
    mode: UpdateMode,
    removed: &RemovedSet,
    cli: &Cli,
    level: usize,
) -> partition::Result<()> {
    let indent = "  ".repeat(level);
    for entry in manager.make_partitions(mode, removed)? {
        match entry {
            PartitionEntry::Partition(mut partition) => {
                println!("{indent}{}/", partition.name());
                if level < cli.depth {
                    print_level(&mut partition, mode, removed, cli, level + 1)?;
                }
            }
            PartitionEntry::Collection(collection) => {
                let files = collection.files()?;
                println!("{indent}{} ({} files)", collection.name(), files.len());
                if cli.files {
                    for file in &files {
                        println!("{indent}  {}", file.path().display());
                    }
                }
            }
        }
    }
    Ok(())
}
