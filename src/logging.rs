//! Logger setup for the command-line tool
//!
//! Records go to stderr so the hex dump on stdout stays clean.

use std::io::Write;

use log::LevelFilter;

/// Level used when `RUST_LOG` is not set
pub fn default_level(verbose: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Initialize env_logger.
///
/// `RUST_LOG` takes precedence; otherwise `verbose` picks between `info` and
/// `debug`. Calling this more than once is harmless.
pub fn init(verbose: bool) {
    let mut builder = env_logger::Builder::from_default_env();

    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(default_level(verbose));
    }

    builder.format(|buf, record| {
        writeln!(
            buf,
            "[{}] {}: {}",
            record.level(),
            record.target(),
            record.args()
        )
    });

    let _ = builder.try_init();
}
