// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use tracing_subscriber::{fmt, EnvFilter};

const FALLBACK_LEVEL: &str = "info";
const KNOWN_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Install the global subscriber.
///
/// `RUST_LOG` wins when set; otherwise `log_level` (usually from the config
/// file) is used, and `info` when that is missing or not a level name.
pub fn init_tracing(log_level: Option<&str>) {
    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let (directive, rejected) = filter_directive(env.as_deref(), log_level);

    let _ = fmt()
        .with_env_filter(EnvFilter::new(directive))
        .with_target(false)
        .compact()
        .try_init();

    if let Some(bad) = rejected {
        tracing::warn!("ignoring unknown log level '{bad}' from config, using {FALLBACK_LEVEL}");
    }
}

/// Returns the filter directive to install and, if the configured level was
/// not usable, the rejected value so it can be reported once logging is up.
fn filter_directive<'a>(env: Option<&'a str>, configured: Option<&'a str>) -> (String, Option<&'a str>) {
    if let Some(env) = env.filter(|s| !s.trim().is_empty()) {
        return (env.to_owned(), None);
    }
    match configured {
        Some(level) => {
            let lower = level.trim().to_ascii_lowercase();
            if KNOWN_LEVELS.contains(&lower.as_str()) {
                (lower, None)
            } else {
                (FALLBACK_LEVEL.to_owned(), Some(level))
            }
        }
        None => (FALLBACK_LEVEL.to_owned(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::filter_directive;

    #[test]
    fn env_overrides_config() {
        let (d, bad) = filter_directive(Some("ekki_render=trace"), Some("warn"));
        assert_eq!(d, "ekki_render=trace");
        assert!(bad.is_none());
    }

    #[test]
    fn config_level_is_case_insensitive() {
        assert_eq!(filter_directive(None, Some("DEBUG")).0, "debug");
        assert_eq!(filter_directive(Some("  "), Some("Warn")).0, "warn");
    }

    #[test]
    fn unknown_level_falls_back_and_is_reported() {
        let (d, bad) = filter_directive(None, Some("loud"));
        assert_eq!(d, "info");
        assert_eq!(bad, Some("loud"));
    }

    #[test]
    fn nothing_configured_means_info() {
        assert_eq!(filter_directive(None, None), ("info".to_owned(), None));
    }
}
