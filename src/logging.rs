//! Tracing setup for the command line tool

use std::io;

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter,
};

/// How much the tool reports while it works
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Verbosity {
    /// Warnings and errors only
    #[default]
    Normal,
    /// Per-pair progress and state transitions
    Verbose,
}

impl Verbosity {
    pub fn from_verbose_flag(verbose: bool) -> Self {
        if verbose {
            Self::Verbose
        } else {
            Self::Normal
        }
    }

    /// Default filter directive for this verbosity
    pub fn directive(&self) -> &'static str {
        match self {
            Self::Normal => "warn",
            Self::Verbose => "debug",
        }
    }
}

/// Filter from `RUST_LOG` when set, otherwise from `verbosity`
pub fn build_env_filter(verbosity: Verbosity) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity.directive()))
}

/// Install the global subscriber, writing to stderr
///
/// Fails if a subscriber is already installed.
pub fn init_tracing(verbosity: Verbosity) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(build_env_filter(verbosity))
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verbosity_directives() {
        assert_eq!(Verbosity::default(), Verbosity::Normal);
        assert_eq!(Verbosity::from_verbose_flag(false).directive(), "warn");
        assert_eq!(Verbosity::from_verbose_flag(true).directive(), "debug");
    }

    #[test]
    fn test_directives_parse() {
        for verbosity in [Verbosity::Normal, Verbosity::Verbose] {
            assert!(EnvFilter::try_new(verbosity.directive()).is_ok());
        }
    }
}
