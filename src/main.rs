use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use s3dbconv::{CliOverrides, PlanRequest};
use s3dbconv_core::JobTarget;
use tokio::io::AsyncReadExt;

#[cfg(feature = "dhat-heap")]
#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

/// Convert gzip CSV sources into partitioned Arrow/Parquet objects
#[derive(Parser)]
#[command(name = "s3dbconv")]
#[command(version)]
#[command(about = "Convert gzip CSV sources into partitioned Arrow/Parquet objects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Root directory for the filesystem backend
    #[arg(short, long, value_name = "DIR", global = true)]
    storage_path: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(short = 'v', long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert the sources named by a job payload
    Run {
        /// Payload file, or '-' for stdin
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,
    },
    /// Print one backfill payload per bucket for a dataset
    Plan(PlanArgs),
    /// Check a job payload without converting anything
    Validate {
        /// Payload file, or '-' for stdin
        #[arg(value_name = "PAYLOAD")]
        payload: PathBuf,
    },
    /// List collections, or the datasets of one collection
    List {
        collection: Option<String>,
    },
}

#[derive(Args)]
struct PlanArgs {
    #[arg(long)]
    collection: String,

    #[arg(long)]
    dataset: String,

    /// Output prefix; must end with '/'
    #[arg(long)]
    dest_prefix: String,

    /// br, gz, lz4, zst or sz
    #[arg(long)]
    compression: String,

    #[arg(long, allow_negative_numbers = true)]
    compression_level: Option<i32>,

    /// dataclient or athena
    #[arg(long)]
    dest_store: Option<String>,

    /// arrow or parquet
    #[arg(long)]
    file_format: Option<String>,

    /// hour, day, month or year
    #[arg(long)]
    partition_size: Option<String>,

    /// Copy the dataset's metadata file next to the outputs
    #[arg(long)]
    copy_metadata: bool,
}

impl PlanArgs {
    fn into_request(self) -> PlanRequest {
        PlanRequest {
            collection: self.collection,
            dataset: self.dataset,
            target: JobTarget {
                dest_prefix: self.dest_prefix,
                dest_store: self.dest_store,
                file_format: self.file_format,
                compression: self.compression,
                compression_level: self.compression_level,
                partition_size: self.partition_size,
            },
            copy_metadata: self.copy_metadata,
        }
    }
}

fn main() -> Result<()> {
    #[cfg(feature = "dhat-heap")]
    let _profiler = dhat::Profiler::new_heap();

    let cli = Cli::parse();

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?
        .block_on(async_main(cli))
}

async fn async_main(cli: Cli) -> Result<()> {
    let overrides = CliOverrides {
        storage_path: cli.storage_path,
        log_level: cli.log_level,
    };
    let config = s3dbconv::load_config(cli.config.as_deref(), &overrides)?;
    s3dbconv::init_tracing(&config);

    match cli.command {
        Commands::Run { payload } => {
            let body = read_payload(&payload).await?;
            let result = s3dbconv::run_payload(&config, &body).await?;
            for object in &result.objects {
                println!(
                    "{}\trows={}\tbytes={}\tblake3={}",
                    object.key, object.rows, object.bytes, object.hash
                );
            }
        }
        Commands::Plan(args) => {
            for line in s3dbconv::plan_jobs(&config, &args.into_request()).await? {
                println!("{line}");
            }
        }
        Commands::Validate { payload } => {
            let body = read_payload(&payload).await?;
            let job = s3dbconv::validate_payload(&config, &body)?;
            println!("{}", serde_json::to_string_pretty(&job.params.to_target())?);
        }
        Commands::List { collection } => {
            for name in s3dbconv::list_sources(&config, collection.as_deref()).await? {
                println!("{name}");
            }
        }
    }

    Ok(())
}

async fn read_payload(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut body = String::new();
        tokio::io::stdin()
            .read_to_string(&mut body)
            .await
            .context("Failed to read payload from stdin")?;
        return Ok(body);
    }

    std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload {}", path.display()))
}
