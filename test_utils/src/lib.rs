//! Fixtures shared by the integration tests and benches: on-disk CLI
//! assemblies with XML documentation, GAC layouts, caret-marked sources and
//! quickcheck generators.

pub mod assembly;
pub mod caret;
pub mod generator;
mod image;

use std::io;

use time::UtcOffset;
use time::macros::format_description;
use tracing_subscriber::{self, fmt, prelude::*};

pub use assembly::{AssemblyFixture, TypeFixture, write_gac_assembly};
pub use caret::with_caret;

/// Stderr logging for tests, filtered by RUST_LOG (default "warn")
pub fn init_logger() -> io::Result<()> {
    let timer = fmt::time::OffsetTime::new(
        UtcOffset::UTC,
        format_description!("[[[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]Z]"),
    );

    let stderr_layer = fmt::layer().with_test_writer().with_timer(timer);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));

    match tracing_subscriber::registry().with(env_filter).with(stderr_layer).try_init() {
        Ok(()) => Ok(()),
        Err(e) => {
            let message = e.to_string();
            if message.contains("already been set") || message.contains("already initialized") {
                tracing::trace!("Test logger already installed");
                Ok(())
            } else {
                Err(io::Error::other(e))
            }
        }
    }
}
