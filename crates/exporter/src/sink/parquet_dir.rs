use crate::pack::Pack;
use crate::sink::Sink;
use anyhow::Context;
use arrow::array::{ArrayRef, Int64Array, RecordBatch, StringArray};
use arrow::datatypes::{DataType, Field, Schema, SchemaRef};
use async_trait::async_trait;
use cx_primitives::{Block, Height};
use parquet::arrow::ArrowWriter;
use parquet::basic::{Compression, ZstdLevel};
use parquet::file::properties::WriterProperties;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};


/// Writes every pack as `<dir>/<table>/<first>-<last>.parquet`
pub struct ParquetSink {
    name: String,
    dir: PathBuf
}


impl ParquetSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            name: format!("parquet:{}", dir.display()),
            dir
        }
    }

    pub fn table_dir(&self, table: &str) -> PathBuf {
        self.dir.join(table)
    }
}


pub fn chunk_file_name(first: Height, last: Height) -> String {
    format!("{:010}-{:010}.parquet", first, last)
}


fn parse_chunk_file_name(name: &str) -> Option<(Height, Height)> {
    static RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^(\d{10,})-(\d{10,})\.parquet$").unwrap()
    });

    let caps = RE.captures(name)?;
    let first = caps[1].parse().ok()?;
    let last = caps[2].parse().ok()?;
    (chunk_file_name(first, last) == name && first <= last).then_some((first, last))
}


fn schema() -> SchemaRef {
    static SCHEMA: LazyLock<SchemaRef> = LazyLock::new(|| {
        Arc::new(Schema::new(vec![
            Field::new("height", DataType::Int64, false),
            Field::new("hash", DataType::Utf8, false),
            Field::new("parent_hash", DataType::Utf8, false),
            Field::new("timestamp", DataType::Int64, true),
            Field::new("block", DataType::Utf8, false),
        ]))
    });
    SCHEMA.clone()
}


fn record_batch(pack: &Pack) -> anyhow::Result<RecordBatch> {
    let blocks = pack.blocks();
    let columns: Vec<ArrayRef> = vec![
        Arc::new(Int64Array::from_iter_values(blocks.iter().map(|b| b.height()))),
        Arc::new(StringArray::from_iter_values(blocks.iter().map(|b| b.hash()))),
        Arc::new(StringArray::from_iter_values(blocks.iter().map(|b| b.parent_hash()))),
        Arc::new(Int64Array::from_iter(blocks.iter().map(|b| b.timestamp()))),
        Arc::new(StringArray::from_iter_values(blocks.iter().map(|b| b.payload().get()))),
    ];
    let batch = RecordBatch::try_new(schema(), columns)?;
    Ok(batch)
}


fn write_file(dest: &Path, batch: RecordBatch) -> anyhow::Result<()> {
    let dir = dest.parent().context("chunk file has no parent dir")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;

    let tmp = dir.join(format!(
        ".{}.tmp",
        dest.file_name().and_then(|n| n.to_str()).unwrap_or("chunk")
    ));

    let props = WriterProperties::builder()
        .set_compression(Compression::ZSTD(ZstdLevel::try_new(3)?))
        .set_data_page_size_limit(32 * 1024)
        .set_dictionary_page_size_limit(192 * 1024)
        .build();

    let file = std::fs::File::create(&tmp)
        .with_context(|| format!("failed to create {}", tmp.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))?;
    writer.write(&batch)?;
    writer.close()?;

    std::fs::rename(&tmp, dest)
        .with_context(|| format!("failed to move {} to {}", tmp.display(), dest.display()))?;
    Ok(())
}


#[async_trait]
impl Sink for ParquetSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, table: &str, pack: &Pack) -> anyhow::Result<()> {
        let batch = record_batch(pack)?;
        let dest = self.table_dir(table).join(
            chunk_file_name(pack.first_height(), pack.last_height())
        );
        tokio::task::spawn_blocking(move || write_file(&dest, batch))
            .await
            .context("parquet write task panicked")?
    }

    fn supports_checkpoint(&self) -> bool {
        true
    }

    async fn max_persisted_height(&self, table: &str) -> anyhow::Result<Option<Height>> {
        let dir = self.table_dir(table);
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(read_dir) => read_dir,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err).with_context(|| {
                format!("failed to list {}", dir.display())
            })
        };

        let mut max_height = None;
        while let Some(entry) = read_dir.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue
            };
            if let Some((_, last)) = parse_chunk_file_name(&name) {
                max_height = std::cmp::max(max_height, Some(last));
            }
        }
        Ok(max_height)
    }
}
