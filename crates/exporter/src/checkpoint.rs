use crate::config::ExportConfig;
use crate::error::ExportError;
use crate::sink::SinkBox;
use anyhow::anyhow;
use cx_primitives::Height;
use tracing::info;


/// Picks the first height of the run.
///
/// An explicit begin always wins. Otherwise, with `resume` set, the first
/// checkpoint capable sink decides. Failing to consult it is fatal.
pub async fn resolve_first_height(
    config: &ExportConfig,
    sinks: &[SinkBox]
) -> Result<Height, ExportError>
{
    if let Some(begin) = config.explicit_begin() {
        return Ok(begin)
    }

    if !config.resume {
        return Ok(config.default_begin)
    }

    let sink = sinks.iter().find(|s| s.supports_checkpoint()).ok_or_else(|| {
        ExportError::CheckpointUnavailable {
            reason: anyhow!("none of the configured sinks supports checkpoints")
        }
    })?;

    let persisted = sink.max_persisted_height(&config.table).await.map_err(|reason| {
        ExportError::CheckpointUnavailable {
            reason: ExportError::QueryFailed {
                sink: sink.name().to_string(),
                reason
            }.into()
        }
    })?;

    match persisted {
        Some(height) => {
            info!("{} has blocks up to {}, resuming from {}", sink.name(), height, height + 1);
            Ok(height + 1)
        },
        None => {
            info!("{} is empty, starting from {}", sink.name(), config.default_begin);
            Ok(config.default_begin)
        }
    }
}
