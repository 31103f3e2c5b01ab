use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;
use std::sync::LazyLock;


pub type SinkLabels = Vec<(String, String)>;


pub static PROGRESS: LazyLock<Gauge<f64, AtomicU64>> = LazyLock::new(Default::default);
pub static CHAIN_HEIGHT: LazyLock<Gauge> = LazyLock::new(Default::default);
pub static LAST_BLOCK: LazyLock<Gauge> = LazyLock::new(Default::default);
pub static LAST_SAVED_BLOCK: LazyLock<Family<SinkLabels, Gauge>> = LazyLock::new(Default::default);
pub static FETCH_ERRORS: LazyLock<Counter> = LazyLock::new(Default::default);
pub static SKIPPED_BLOCKS: LazyLock<Counter> = LazyLock::new(Default::default);


pub fn sink_labels(sink: &str) -> SinkLabels {
    vec![("sink".to_string(), sink.to_string())]
}


pub fn register_metrics(registry: &mut Registry) {
    registry.register(
        "cx_progress_blocks_per_second",
        "Overall block processing speed",
        PROGRESS.clone()
    );
    registry.register(
        "cx_chain_height",
        "Last observed chain tip",
        CHAIN_HEIGHT.clone()
    );
    registry.register(
        "cx_last_block",
        "Last block delivered in order",
        LAST_BLOCK.clone()
    );
    registry.register(
        "cx_last_saved_block",
        "Last block written by a sink",
        LAST_SAVED_BLOCK.clone()
    );
    registry.register(
        "cx_fetch_errors",
        "Number of failed block fetches",
        FETCH_ERRORS.clone()
    );
    registry.register(
        "cx_skipped_blocks",
        "Number of blocks skipped after a failed fetch",
        SKIPPED_BLOCKS.clone()
    );
}
