// s3dbconv - Convert time-stamped gzip CSV objects into partitioned
// Arrow/Parquet objects
//
// The library half of the CLI. Conversion logic lives in the workspace
// crates; this crate resolves configuration and wires commands to them.

pub mod commands;
mod init;

pub use commands::{list_sources, plan_jobs, run_payload, validate_payload, PlanRequest};
pub use init::{init_tracing, load_config, CliOverrides};
