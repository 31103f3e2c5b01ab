pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod fanout;
pub mod gate;
pub mod index_source;
pub mod metrics;
pub mod pack;
pub mod progress;
pub mod server;
pub mod sink;
pub mod stream;
pub mod workers;


pub use config::{EndBound, ExportConfig};
pub use error::{ExportError, SinkFailure};
pub use export::{Exporter, RunSummary};
pub use fanout::{RunOutcome, SinkReport};
pub use pack::Pack;
pub use progress::{ProgressLogger, ProgressObserver};
pub use sink::{create_sink, Sink, SinkBox};
