#![allow(dead_code)]

use async_trait::async_trait;
use cx_data_client::{make_data_client_ref, DataClient, DataClientRef, RawBlock};
use cx_exporter::{ExportConfig, Exporter, Pack, ProgressObserver, Sink, SinkBox};
use cx_primitives::Height;
use futures::future::BoxFuture;
use futures::FutureExt;
use rand::Rng;
use serde_json::value::RawValue;
use std::collections::HashSet;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;


pub fn make_block(height: Height) -> RawBlock {
    let payload = format!(
        r#"{{"number":"0x{:x}","hash":"0xh{}","parentHash":"0xh{}","transactions":[]}}"#,
        height,
        height,
        height - 1
    );
    RawBlock::new(
        height,
        format!("0xh{}", height),
        format!("0xh{}", height - 1),
        Some(1_600_000_000 + height),
        RawValue::from_string(payload).unwrap()
    )
}


#[derive(Debug, Default)]
pub struct MockClient {
    tip: AtomicI64,
    failing: HashSet<Height>,
    max_latency_ms: u64,
    tip_failures: AtomicUsize,
    fetch_calls: AtomicUsize
}


impl MockClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tip(self, tip: Height) -> Self {
        self.tip.store(tip, Ordering::SeqCst);
        self
    }

    pub fn with_failing(mut self, heights: impl IntoIterator<Item = Height>) -> Self {
        self.failing.extend(heights);
        self
    }

    /// Every fetch sleeps for a random duration up to `ms`
    pub fn with_random_latency(mut self, ms: u64) -> Self {
        self.max_latency_ms = ms;
        self
    }

    /// The first `n` tip queries fail
    pub fn with_tip_failures(self, n: usize) -> Self {
        self.tip_failures.store(n, Ordering::SeqCst);
        self
    }

    pub fn set_tip(&self, tip: Height) {
        self.tip.store(tip, Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}


impl DataClient for MockClient {
    fn current_height(&self) -> BoxFuture<'_, anyhow::Result<Height>> {
        async move {
            let failed = self.tip_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failed {
                anyhow::bail!("node is not reachable")
            }
            Ok(self.tip.load(Ordering::SeqCst))
        }.boxed()
    }

    fn fetch(&self, height: Height) -> BoxFuture<'_, anyhow::Result<RawBlock>> {
        async move {
            self.fetch_calls.fetch_add(1, Ordering::SeqCst);
            if self.max_latency_ms > 0 {
                let ms = rand::rng().random_range(0..=self.max_latency_ms);
                tokio::time::sleep(Duration::from_millis(ms)).await;
            }
            if self.failing.contains(&height) {
                anyhow::bail!("block {} is not available", height)
            }
            Ok(make_block(height))
        }.boxed()
    }
}


pub type Recorded = Arc<Mutex<Vec<Vec<Height>>>>;


pub enum Checkpoint {
    Unsupported,
    Fixed(Option<Height>),
    Broken
}


/// Keeps the heights of every written pack in memory
pub struct MemorySink {
    name: String,
    packs: Recorded,
    fail_on: Option<Height>,
    checkpoint: Checkpoint
}


impl MemorySink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            packs: Default::default(),
            fail_on: None,
            checkpoint: Checkpoint::Unsupported
        }
    }

    /// Fails the write of the pack containing `height` and everything after it
    pub fn failing_on(mut self, height: Height) -> Self {
        self.fail_on = Some(height);
        self
    }

    pub fn with_checkpoint(mut self, checkpoint: Checkpoint) -> Self {
        self.checkpoint = checkpoint;
        self
    }

    pub fn recorded(&self) -> Recorded {
        self.packs.clone()
    }

    pub fn boxed(self) -> SinkBox {
        Box::new(self)
    }
}


#[async_trait]
impl Sink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn write(&mut self, _table: &str, pack: &Pack) -> anyhow::Result<()> {
        if let Some(height) = self.fail_on {
            if pack.last_height() >= height {
                anyhow::bail!("disk is full")
            }
        }
        self.packs.lock().unwrap().push(pack.heights().collect());
        Ok(())
    }

    fn supports_checkpoint(&self) -> bool {
        !matches!(self.checkpoint, Checkpoint::Unsupported)
    }

    async fn max_persisted_height(&self, _table: &str) -> anyhow::Result<Option<Height>> {
        match self.checkpoint {
            Checkpoint::Unsupported => anyhow::bail!("not supported"),
            Checkpoint::Fixed(height) => Ok(height),
            Checkpoint::Broken => anyhow::bail!("connection refused")
        }
    }
}


pub fn delivered(recorded: &Recorded) -> Vec<Height> {
    recorded.lock().unwrap().iter().flatten().copied().collect()
}


pub fn pack_sizes(recorded: &Recorded) -> Vec<usize> {
    recorded.lock().unwrap().iter().map(|p| p.len()).collect()
}


/// Bounded run over `[begin, end)`
pub fn bounded_config(begin: Height, end: Height, threads: usize, pack_size: usize) -> ExportConfig {
    ExportConfig {
        begin: Some(begin),
        end: cx_exporter::EndBound::from_end_height(end),
        threads,
        pack_size,
        ..ExportConfig::default()
    }
}


pub fn exporter(config: ExportConfig, client: MockClient, sinks: Vec<SinkBox>) -> Exporter {
    exporter_with_ref(config, make_data_client_ref(client), sinks)
}


pub fn exporter_with_ref(config: ExportConfig, client: DataClientRef, sinks: Vec<SinkBox>) -> Exporter {
    Exporter::new(config, client, sinks).with_progress(Box::new(NoProgress))
}


pub struct NoProgress;


impl ProgressObserver for NoProgress {
    fn report(&mut self, _height: Height) {}
}


/// Waits until `recorded` holds at least `count` blocks
pub async fn wait_for_blocks(recorded: &Recorded, count: usize) {
    let wait = async {
        while delivered(recorded).len() < count {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    };
    tokio::time::timeout(Duration::from_secs(10), wait)
        .await
        .expect("sink did not receive enough blocks in time")
}
