use crate::checkpoint::resolve_first_height;
use crate::config::{EndBound, ExportConfig};
use crate::fanout::{RunOutcome, SinkFanout, SinkReport};
use crate::gate::OrderingGate;
use crate::index_source::IndexSource;
use crate::progress::{ProgressLogger, ProgressObserver};
use crate::sink::SinkBox;
use crate::stream::{ordered_blocks, packs};
use crate::workers::{FetchOptions, FetchPool};
use cx_data_client::DataClientRef;
use cx_primitives::{Block, BlockRef, DisplayBlockRefOption, Height};
use futures::StreamExt;
use std::pin::pin;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};


#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RunSummary {
    pub first_height: Height,
    /// Last block handed to the sinks
    pub last_block: Option<BlockRef>,
    pub blocks: usize,
    pub packs: usize,
    pub sinks: Vec<SinkReport>
}


pub struct Exporter {
    config: ExportConfig,
    client: DataClientRef,
    sinks: Vec<SinkBox>,
    progress: Box<dyn ProgressObserver>,
    cancel: CancellationToken
}


impl Exporter {
    pub fn new(config: ExportConfig, client: DataClientRef, sinks: Vec<SinkBox>) -> Self {
        Self {
            config,
            client,
            sinks,
            progress: Box::new(ProgressLogger::new()),
            cancel: CancellationToken::new()
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressObserver>) -> Self {
        self.progress = progress;
        self
    }

    /// Cancelling `token` stops the run after everything fetched so far was written
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub async fn run(self) -> anyhow::Result<RunSummary> {
        let Exporter {
            config,
            client,
            sinks,
            progress,
            cancel
        } = self;

        config.validate()?;
        anyhow::ensure!(!sinks.is_empty(), "at least one sink is required");

        let first_height = resolve_first_height(&config, &sinks).await?;

        let mut summary = RunSummary {
            first_height,
            last_block: None,
            blocks: 0,
            packs: 0,
            sinks: Vec::new()
        };

        if let EndBound::Bounded(end) = config.end {
            if first_height >= end {
                info!("nothing to do, first block {} is not below end {}", first_height, end);
                return Ok(summary)
            }
        }

        match config.end {
            EndBound::Bounded(end) => info!("exporting blocks {}-{}", first_height, end - 1),
            EndBound::Tip { offset } => info!(
                "exporting blocks from {}, following the chain tip with offset {}",
                first_height,
                offset
            )
        }

        let pipeline = cancel.child_token();
        let gate = Arc::new(OrderingGate::new(first_height));
        let (output_tx, output_rx) = mpsc::channel(config.output_queue_size());

        let pool = FetchPool::start(
            client,
            IndexSource::new(first_height, config.end, config.poll_interval),
            gate,
            output_tx,
            FetchOptions {
                threads: config.threads,
                ignore_errors: config.ignore_fetch_errors,
                index_queue_size: config.index_queue_size()
            },
            pipeline.clone()
        );

        let fanout = SinkFanout::start(sinks, &config.table, config.sink_queue_size);

        {
            let blocks = ordered_blocks(
                output_rx,
                config.end.end(),
                progress,
                config.progress_interval
            );
            let mut pack_stream = pin!(packs(blocks, config.pack_size));

            loop {
                let pack = tokio::select! {
                    biased;
                    _ = fanout.failed() => break,
                    pack = pack_stream.next() => match pack {
                        Some(pack) => pack,
                        None => break
                    }
                };
                summary.blocks += pack.len();
                summary.packs += 1;
                summary.last_block = Some(pack.last_block().block_ref());
                if !fanout.dispatch(pack).await {
                    break
                }
            }
            pipeline.cancel();
        }

        let fetch_result = pool.join().await;
        let outcome = fanout.finish().await;

        if let (RunOutcome::Failure(_), Err(err)) = (&outcome, &fetch_result) {
            error!("fetching was aborted with: {:#}", err);
        }
        summary.sinks = outcome.into_result()?;
        fetch_result?;

        info!(
            "exported {} blocks in {} packs, last block: {}",
            summary.blocks,
            summary.packs,
            DisplayBlockRefOption(summary.last_block.as_ref())
        );
        Ok(summary)
    }
}
