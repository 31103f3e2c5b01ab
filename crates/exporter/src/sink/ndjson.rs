use crate::pack::Pack;
use crate::sink::{block_json_line, Sink};
use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;


/// Appends blocks as JSON lines to `<dir>/<table>.ndjson`
pub struct NdjsonSink {
    name: String,
    dir: PathBuf
}


impl NdjsonSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            name: format!("ndjson:{}", dir.display()),
            dir
        }
    }

    pub fn file_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.ndjson", table))
    }
}


#[async_trait]
impl Sink for NdjsonSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, table: &str, pack: &Pack) -> anyhow::Result<()> {
        let mut buf = String::new();
        for block in pack.blocks() {
            buf.push_str(&block_json_line(block)?);
            buf.push('\n');
        }

        tokio::fs::create_dir_all(&self.dir).await.with_context(|| {
            format!("failed to create {}", self.dir.display())
        })?;

        let path = self.file_path(table);
        let mut file = open_append(&path).await?;
        file.write_all(buf.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}


async fn open_append(path: &Path) -> anyhow::Result<tokio::fs::File> {
    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await
        .with_context(|| format!("failed to open {}", path.display()))
}
