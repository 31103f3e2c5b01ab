use anyhow::ensure;
use cx_primitives::Height;
use std::time::Duration;


/// Where the export stops.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum EndBound {
    /// Export `[begin, end)` and finish
    Bounded(Height),
    /// Follow the chain, staying `-offset` blocks behind the tip
    Tip {
        offset: Height
    }
}


impl EndBound {
    /// `end > 0` is an exclusive bound, anything else is an offset from the tip
    pub fn from_end_height(end: Height) -> Self {
        if end > 0 {
            EndBound::Bounded(end)
        } else {
            EndBound::Tip { offset: end }
        }
    }

    pub fn end(&self) -> Option<Height> {
        match self {
            EndBound::Bounded(end) => Some(*end),
            EndBound::Tip { .. } => None
        }
    }
}


#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Explicit first height. Negative or missing means "not specified".
    pub begin: Option<Height>,
    pub end: EndBound,
    pub resume: bool,
    /// First height when neither `begin` nor a checkpoint is available
    pub default_begin: Height,
    pub threads: usize,
    pub ignore_fetch_errors: bool,
    pub pack_size: usize,
    /// Destination name passed to every sink
    pub table: String,
    /// Pause between tip polls in continuous mode
    pub poll_interval: Duration,
    /// Report progress every N delivered blocks
    pub progress_interval: usize,
    pub index_queue_size: Option<usize>,
    pub output_queue_size: Option<usize>,
    /// Packs buffered per sink writer
    pub sink_queue_size: usize
}


impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            begin: None,
            end: EndBound::Tip { offset: 0 },
            resume: false,
            default_begin: 0,
            threads: 4,
            ignore_fetch_errors: false,
            pack_size: 100,
            table: "blocks".to_string(),
            poll_interval: Duration::from_secs(10),
            progress_interval: 100,
            index_queue_size: None,
            output_queue_size: None,
            sink_queue_size: 2
        }
    }
}


impl ExportConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        ensure!(self.threads >= 1, "thread count must be at least 1");
        ensure!(self.pack_size >= 1, "pack size must be at least 1");
        ensure!(self.progress_interval >= 1, "progress interval must be at least 1");
        ensure!(self.sink_queue_size >= 1, "sink queue size must be at least 1");
        ensure!(!self.poll_interval.is_zero(), "poll interval must be positive");
        ensure!(!self.table.is_empty(), "table name must not be empty");
        ensure!(
            self.table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'),
            "table name '{}' may only contain ascii letters, digits, '_' and '-'",
            self.table
        );
        ensure!(self.default_begin >= 0, "default begin height must not be negative");
        if let Some(size) = self.index_queue_size {
            ensure!(size >= 1, "index queue size must be at least 1");
        }
        if let Some(size) = self.output_queue_size {
            ensure!(size >= 1, "output queue size must be at least 1");
        }
        Ok(())
    }

    /// Explicit begin height, if one was given
    pub fn explicit_begin(&self) -> Option<Height> {
        self.begin.filter(|b| *b >= 0)
    }

    pub fn index_queue_size(&self) -> usize {
        self.index_queue_size.unwrap_or(2 * self.threads)
    }

    pub fn output_queue_size(&self) -> usize {
        self.output_queue_size.unwrap_or(2 * self.threads)
    }
}
