use crate::config::{EndBound, ExportConfig};
use clap::{value_parser, Parser};
use cx_primitives::Height;
use std::time::Duration;
use url::Url;


#[derive(Parser, Debug)]
#[command(version, about = "Exports chain blocks in order to one or more sinks", long_about = None)]
pub struct Cli {
    /// First block to export. Negative means "not specified".
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    pub begin: Option<Height>,

    /// Positive value is an exclusive upper bound,
    /// zero or negative keeps following the chain tip at that offset
    #[arg(long, value_name = "N", default_value_t = 0, allow_negative_numbers = true)]
    pub end: Height,

    /// Continue from the last block persisted by the first checkpoint capable sink
    #[arg(long)]
    pub resume: bool,

    /// Number of parallel fetch workers
    #[arg(long, value_name = "N", value_parser = value_parser!(u16).range(1..), default_value_t = 4)]
    pub threads: u16,

    /// Skip blocks that failed to fetch instead of aborting
    #[arg(long)]
    pub ignore_fetch_errors: bool,

    /// Number of blocks per sink write
    #[arg(long, value_name = "N", value_parser = value_parser!(u32).range(1..), default_value_t = 100)]
    pub pack_size: u32,

    /// Destination table (file or key prefix) inside every sink
    #[arg(long, value_name = "NAME", default_value = "blocks")]
    pub table: String,

    /// Sink to write to, e.g. ndjson:./out, parquet:./data or rocksdb:./blocks.db.
    /// Can be repeated.
    #[arg(long = "sink", value_name = "KIND:LOCATION", required = true)]
    pub sinks: Vec<String>,

    /// JSON-RPC endpoint of the chain node
    #[arg(long, value_name = "URL")]
    pub rpc: Url,

    /// Retries of failed rpc requests
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub rpc_retries: usize,

    /// Interval between chain tip polls in seconds
    #[arg(long, value_name = "SECS", value_parser = value_parser!(u64).range(1..), default_value_t = 10)]
    pub poll_interval: u64,

    /// Report progress every N blocks
    #[arg(long, value_name = "N", value_parser = value_parser!(u32).range(1..), default_value_t = 100)]
    pub progress_interval: u32,

    /// First block when neither --begin nor a checkpoint is available
    #[arg(long, value_name = "N", default_value_t = 0)]
    pub default_begin: Height,

    /// Whether the logs should be structured in JSON format
    #[arg(long)]
    pub json_log: bool,

    /// Port to use for built-in prometheus metrics server
    #[arg(long)]
    pub prom_port: Option<u16>,
}


impl Cli {
    pub fn export_config(&self) -> ExportConfig {
        ExportConfig {
            begin: self.begin,
            end: EndBound::from_end_height(self.end),
            resume: self.resume,
            default_begin: self.default_begin,
            threads: self.threads as usize,
            ignore_fetch_errors: self.ignore_fetch_errors,
            pack_size: self.pack_size as usize,
            table: self.table.clone(),
            poll_interval: Duration::from_secs(self.poll_interval),
            progress_interval: self.progress_interval as usize,
            ..ExportConfig::default()
        }
    }
}
