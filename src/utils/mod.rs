//! Utilities: logging setup (level derived from -v/-q, overridable through
//! RUST_LOG).
//!
//! Key items:
//!   derive_level / init_logging
//!
//! Logs go to stderr so they never mix with interpreter output.

/// Logging helpers.
pub mod logging {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::prelude::*;

    #[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
    pub enum LogLevel {
        Error = 0,
        Info = 1,
        Debug = 2,
        Trace = 3,
    }

    impl LogLevel {
        pub fn as_str(&self) -> &'static str {
            match self {
                LogLevel::Error => "error",
                LogLevel::Info => "info",
                LogLevel::Debug => "debug",
                LogLevel::Trace => "trace",
            }
        }

        /// Filter directive: this crate at the level, dependencies one notch
        /// quieter (never below warn).
        pub fn directive(&self) -> String {
            let deps = match self {
                LogLevel::Error => "error",
                LogLevel::Info | LogLevel::Debug => "warn",
                LogLevel::Trace => "info",
            };
            format!("fsterm={},{deps}", self.as_str())
        }
    }

    pub fn derive_level(verbose: u8, quiet: bool) -> LogLevel {
        if quiet {
            return LogLevel::Error;
        }
        match verbose {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }

    /// Installs the global subscriber. `RUST_LOG`, when set, replaces the
    /// derived filter. Calling twice is harmless.
    pub fn init_logging(level: LogLevel) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.directive()));
        let _ = tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_filter(filter),
            )
            .try_init();
    }
}

pub use logging::{derive_level, init_logging};

#[cfg(test)]
mod tests {
    use super::logging::LogLevel;
    use super::*;

    #[test]
    fn level_from_flags() {
        assert_eq!(derive_level(0, false), LogLevel::Info);
        assert_eq!(derive_level(1, false), LogLevel::Debug);
        assert_eq!(derive_level(5, false), LogLevel::Trace);
        assert_eq!(derive_level(3, true), LogLevel::Error);
    }

    #[test]
    fn directive_scopes_crate() {
        assert_eq!(LogLevel::Debug.directive(), "fsterm=debug,warn");
        assert_eq!(LogLevel::Error.directive(), "fsterm=error,error");
    }
}
