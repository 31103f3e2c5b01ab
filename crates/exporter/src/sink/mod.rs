use crate::pack::Pack;
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use cx_data_client::RawBlock;
use cx_primitives::{Block, Height};
use serde::Serialize;
use serde_json::value::RawValue;
use std::path::Path;


mod ndjson;
mod parquet_dir;
mod rocks;


pub use self::ndjson::NdjsonSink;
pub use self::parquet_dir::ParquetSink;
pub use self::rocks::RocksSink;


pub type SinkBox = Box<dyn Sink>;


/// A destination for packs of ordered blocks.
///
/// Writes of one sink are issued one at a time, in height order.
#[async_trait]
pub trait Sink: Send + Sync {
    /// Human readable identification used in logs, metrics and errors
    fn name(&self) -> &str;

    async fn write(&mut self, table: &str, pack: &Pack) -> anyhow::Result<()>;

    fn supports_checkpoint(&self) -> bool {
        false
    }

    /// Highest height persisted under `table`, `None` if there is nothing yet
    async fn max_persisted_height(&self, table: &str) -> anyhow::Result<Option<Height>> {
        anyhow::bail!("{} can't report persisted heights of '{}'", self.name(), table)
    }
}


/// Creates a sink from a `<kind>:<location>` spec,
/// e.g. `ndjson:./out`, `parquet:/data/blocks` or `rocksdb:./blocks.db`.
pub async fn create_sink(spec: &str) -> anyhow::Result<SinkBox> {
    let (kind, location) = spec.split_once(':').ok_or_else(|| {
        anyhow!("invalid sink '{}', expected <kind>:<location>", spec)
    })?;

    anyhow::ensure!(!location.is_empty(), "sink '{}' has no location", spec);
    let location = Path::new(location);

    let sink: SinkBox = match kind {
        "ndjson" => Box::new(NdjsonSink::new(location)),
        "parquet" => Box::new(ParquetSink::new(location)),
        "rocksdb" => {
            let path = location.to_path_buf();
            let sink = tokio::task::spawn_blocking(move || RocksSink::open(&path))
                .await
                .context("rocksdb open task panicked")??;
            Box::new(sink)
        },
        _ => anyhow::bail!("unsupported sink kind '{}' in '{}'", kind, spec)
    };

    Ok(sink)
}


#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BlockLine<'a> {
    height: Height,
    hash: &'a str,
    parent_hash: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<i64>,
    block: &'a RawValue
}


/// Single line JSON document describing a block
pub(crate) fn block_json_line(block: &RawBlock) -> anyhow::Result<String> {
    let line = BlockLine {
        height: block.height(),
        hash: block.hash(),
        parent_hash: block.parent_hash(),
        timestamp: block.timestamp(),
        block: block.payload()
    };
    serde_json::to_string(&line).with_context(|| {
        format!("failed to serialize block {}", block.height())
    })
}
