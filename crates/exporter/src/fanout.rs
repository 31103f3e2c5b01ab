use crate::error::{ExportError, SinkFailure};
use crate::metrics;
use crate::pack::Pack;
use crate::sink::SinkBox;
use anyhow::anyhow;
use futures::future::join_all;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, error};


/// What a single sink managed to persist during the run
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SinkReport {
    pub sink: String,
    pub packs: usize,
    pub blocks: usize
}


struct SinkWriter {
    name: String,
    packs: mpsc::Sender<Arc<Pack>>,
    handle: JoinHandle<Result<SinkReport, SinkFailure>>
}


/// Hands every pack to every sink.
///
/// Each sink is driven by its own task which writes packs one by one in the order
/// they were dispatched, so writes to a sink never interleave while different
/// sinks make progress independently.
pub struct SinkFanout {
    writers: Vec<SinkWriter>,
    failed: CancellationToken
}


impl SinkFanout {
    pub fn start(sinks: Vec<SinkBox>, table: &str, queue_size: usize) -> Self {
        let failed = CancellationToken::new();
        let writers = sinks.into_iter().map(|sink| {
            let name = sink.name().to_string();
            let (tx, rx) = mpsc::channel(queue_size);
            let handle = tokio::spawn(write_loop(sink, table.to_string(), rx, failed.clone()));
            SinkWriter {
                name,
                packs: tx,
                handle
            }
        }).collect();
        Self { writers, failed }
    }

    /// Resolves as soon as any sink failed a write
    pub fn failed(&self) -> WaitForCancellationFuture<'_> {
        self.failed.cancelled()
    }

    /// Queues `pack` for every sink.
    ///
    /// Returns `false` when at least one sink has stopped accepting packs.
    /// That only happens after a failed write, whose details are reported by [SinkFanout::finish].
    pub async fn dispatch(&self, pack: Pack) -> bool {
        let pack = Arc::new(pack);
        let sends = self.writers.iter().map(|w| w.packs.send(pack.clone()));
        let results = join_all(sends).await;
        let mut accepted = true;
        for (writer, res) in self.writers.iter().zip(results) {
            if res.is_err() {
                debug!("{} no longer accepts packs", writer.name);
                accepted = false
            }
        }
        accepted
    }

    /// Waits for all dispatched writes to complete.
    pub async fn finish(self) -> RunOutcome {
        let mut reports = Vec::with_capacity(self.writers.len());
        let mut failures = Vec::new();

        for writer in self.writers {
            drop(writer.packs);
            match writer.handle.await {
                Ok(Ok(report)) => reports.push(report),
                Ok(Err(failure)) => failures.push(failure),
                Err(join_error) => failures.push(SinkFailure {
                    sink: writer.name,
                    first_height: -1,
                    last_height: -1,
                    error: anyhow!("writer task terminated abnormally: {}", join_error)
                })
            }
        }

        if failures.is_empty() {
            RunOutcome::Success(reports)
        } else {
            RunOutcome::Failure(failures)
        }
    }
}


/// Aggregate of every sink write of the run
#[derive(Debug)]
pub enum RunOutcome {
    Success(Vec<SinkReport>),
    Failure(Vec<SinkFailure>)
}


impl RunOutcome {
    pub fn into_result(self) -> Result<Vec<SinkReport>, ExportError> {
        match self {
            RunOutcome::Success(reports) => Ok(reports),
            RunOutcome::Failure(failures) => Err(ExportError::WriteFailed(failures))
        }
    }
}


async fn write_loop(
    mut sink: SinkBox,
    table: String,
    mut packs: mpsc::Receiver<Arc<Pack>>,
    failed: CancellationToken
) -> Result<SinkReport, SinkFailure>
{
    let name = sink.name().to_string();
    let labels = metrics::sink_labels(&name);
    let mut report = SinkReport {
        sink: name.clone(),
        packs: 0,
        blocks: 0
    };

    while let Some(pack) = packs.recv().await {
        let result = AssertUnwindSafe(sink.write(&table, &pack))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| Err(anyhow!("sink panicked")));

        if let Err(error) = result {
            let failure = SinkFailure {
                sink: name,
                first_height: pack.first_height(),
                last_height: pack.last_height(),
                error
            };
            error!("{}", failure);
            failed.cancel();
            return Err(failure)
        }

        metrics::LAST_SAVED_BLOCK.get_or_create(&labels).set(pack.last_height());
        debug!(
            sink = %name,
            "saved blocks {}-{}",
            pack.first_height(),
            pack.last_height()
        );
        report.packs += 1;
        report.blocks += pack.len();
    }

    Ok(report)
}
