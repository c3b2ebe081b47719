use std::sync::Once;

use tracing::Level;

static INIT: Once = Once::new();

/// One-shot tracing setup. Subsequent calls are no-ops, so libraries and
/// tests can call it without coordinating.
#[derive(Debug, Clone, Default)]
pub struct LogFactory;

impl LogFactory {
    pub fn init_log(debug: bool) {
        INIT.call_once(|| {
            let level = if debug { Level::DEBUG } else { Level::INFO };
            tracing_subscriber::fmt()
                .with_max_level(level)
                .with_target(false)
                .with_thread_names(true)
                .compact()
                .init();
        });
    }
}

#[cfg(test)]
mod test {
    use super::LogFactory;

    #[test]
    fn test_idempotent_init() {
        LogFactory::init_log(true);
        LogFactory::init_log(false);
        tracing::debug!("log factory test");
    }
}
