use std::sync::Once;

use tracing::Level;

static INIT: Once = Once::new();

/// Installs a process-wide `tracing` subscriber exactly once. The library itself never calls
/// this — it only emits spans and events through the `tracing` facade — but example binaries
/// and integration tests want a quick way to see them.
pub struct TracingFactory;

impl TracingFactory {
    pub fn init_test_log() {
        Self::init(Level::TRACE);
    }

    pub fn init(level: Level) {
        INIT.call_once(|| {
            let subscriber = tracing_subscriber::fmt()
                .with_max_level(level)
                .with_thread_ids(true)
                .with_target(false)
                .compact()
                .finish();

            // Ignore the error: a global subscriber may already be installed by the
            // embedding application, which takes precedence.
            let _ = tracing::subscriber::set_global_default(subscriber);
        });
    }
}
