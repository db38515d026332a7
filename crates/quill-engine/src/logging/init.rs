use std::sync::Once;

use env_logger::{Builder, WriteStyle};
use log::LevelFilter;

/// Environment variable consulted when no explicit filter is configured.
pub const FILTER_ENV: &str = "RUST_LOG";

/// Logger settings for a quill host.
///
/// Filter precedence: `env_filter`, then [`FILTER_ENV`], then `info`.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// `env_logger` directives, e.g. `"warn,quill_template=trace"`.
    pub env_filter: Option<String>,
    pub write_style: WriteStyle,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            env_filter: None,
            write_style: WriteStyle::Auto,
        }
    }
}

impl LoggingConfig {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    pub fn with_write_style(mut self, style: WriteStyle) -> Self {
        self.write_style = style;
        self
    }

    /// The filter directives in effect, or `None` for the `info` default.
    fn directives(&self) -> Option<String> {
        self.env_filter
            .clone()
            .or_else(|| std::env::var(FILTER_ENV).ok())
            .filter(|f| !f.trim().is_empty())
    }

    fn builder(&self) -> Builder {
        let mut builder = Builder::new();
        match self.directives() {
            Some(directives) => builder.parse_filters(&directives),
            None => builder.filter_level(LevelFilter::Info),
        };
        builder.write_style(self.write_style);
        builder
    }
}

static INIT: Once = Once::new();

/// Install the global logger. Only the first call has an effect, and a
/// logger installed by the host beforehand is left in place.
pub fn init_logging(config: LoggingConfig) {
    INIT.call_once(|| match config.builder().try_init() {
        Ok(()) => log::debug!("logging initialized ({:?})", config.directives()),
        Err(_) => log::debug!("a logger was already installed"),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins() {
        let config = LoggingConfig::default().with_filter("quill_template=trace");
        assert_eq!(config.directives().as_deref(), Some("quill_template=trace"));
    }

    #[test]
    fn blank_filter_is_ignored() {
        let config = LoggingConfig::default().with_filter("  ");
        assert_ne!(config.directives().as_deref(), Some("  "));
    }

    #[test]
    fn init_is_idempotent() {
        init_logging(LoggingConfig::default().with_write_style(WriteStyle::Never));
        init_logging(LoggingConfig::default().with_filter("trace"));
    }
}
