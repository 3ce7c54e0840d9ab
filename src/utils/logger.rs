use std::sync::Once;

use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;

/// Environment variable that overrides the JIT log filter.
pub const LOG_ENV: &str = "OTTER_JIT_LOG";

static INIT: Once = Once::new();

/// Default filter for a JIT `verbose` level.
pub fn default_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "otterjit=warn",
        1 => "otterjit=info",
        _ => "otterjit=debug",
    }
}

/// Installs a stderr `fmt` subscriber for the host process.
///
/// Does nothing after the first call or when the host already installed a
/// global subscriber.
pub fn init_logging(verbose: u8) {
    INIT.call_once(|| {
        let directive = default_directive(verbose)
            .parse::<Directive>()
            .unwrap_or_else(|_| Directive::from(tracing::Level::WARN));
        let filter = EnvFilter::builder()
            .with_default_directive(directive)
            .with_env_var(LOG_ENV)
            .from_env_lossy();
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(verbose >= 2)
            .with_writer(std::io::stderr)
            .try_init();
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_maps_to_directive() {
        assert_eq!(default_directive(0), "otterjit=warn");
        assert_eq!(default_directive(1), "otterjit=info");
        assert_eq!(default_directive(2), "otterjit=debug");
        assert!(default_directive(2).parse::<Directive>().is_ok());
    }

    #[test]
    fn init_is_idempotent() {
        init_logging(1);
        init_logging(2);
    }
}
