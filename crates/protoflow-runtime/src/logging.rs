//! Logger installation for binaries and tests
//!
//! Library code only emits through the `log` facade; call [`init`] once from
//! the hosting binary to see the records.

use env_logger::Builder;
use log::LevelFilter;
use std::sync::Once;

/// Install `env_logger` at `level` (`RUST_LOG` still wins when set)
///
/// Safe to call repeatedly; only the first call has an effect.
pub fn init(level: LevelFilter) {
    static INIT: Once = Once::new();

    INIT.call_once(|| {
        let mut builder = Builder::new();
        builder.filter_level(level);
        if let Ok(spec) = std::env::var("RUST_LOG") {
            builder.parse_filters(&spec);
        }
        builder.format_timestamp_millis();
        // Another logger may already be installed by the host
        builder.try_init().ok();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init(LevelFilter::Warn);
        init(LevelFilter::Trace);
        log::warn!("logger installed");
    }
}
