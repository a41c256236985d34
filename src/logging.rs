use anyhow::Result;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

/// SDK and driver crates that are chatty below `WARN`.
const NOISY_TARGETS: &[&str] = &["aws_smithy_runtime", "aws_config", "hyper", "sqlx"];

/// Installs the global subscriber at `level`. The SDK and driver crates are
/// capped at `WARN` so a `debug` run shows this crate's own events.
pub fn init_logging(level: Level) -> Result<()> {
    let quiet = level.min(Level::WARN);
    let filter = NOISY_TARGETS
        .iter()
        .fold(Targets::new().with_default(level), |targets, target| {
            targets.with_target(*target, quiet)
        });

    let layer = fmt::layer()
        .with_line_number(true)
        .with_file(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()?;
    Ok(())
}
