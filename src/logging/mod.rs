//! Structured logging via `tracing`.
//!
//! Initialization is idempotent so hosts, tests and the demo binary can all
//! call it without caring who went first. Filtering follows `RUST_LOG`,
//! defaulting to `info`.

use std::sync::Once;

use bevy::prelude::*;
use tracing_subscriber::EnvFilter;

static TRACING_INIT: Once = Once::new();

/// Install the global tracing subscriber (first call wins).
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    });
}

pub struct LoggingPlugin;

impl Plugin for LoggingPlugin {
    fn build(&self, _app: &mut App) {
        init_tracing();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
