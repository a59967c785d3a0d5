//! Tracing setup
//!
//! Logs go to stderr; stdout carries the MCP protocol.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global subscriber
///
/// `RUST_LOG` filters as usual, with `<crate_name>=info` added on top.
/// `LOG_FORMAT=json` switches to one JSON object per line.
pub fn init_tracing(crate_name: &str) -> anyhow::Result<()> {
    let filter =
        EnvFilter::from_default_env().add_directive(format!("{}=info", crate_name).parse()?);
    let registry = tracing_subscriber::registry().with(filter);

    if json_requested(std::env::var("LOG_FORMAT").ok().as_deref()) {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(false),
            )
            .try_init()?;
    }

    Ok(())
}

fn json_requested(format: Option<&str>) -> bool {
    format.map_or(false, |f| f.eq_ignore_ascii_case("json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_format_flag() {
        assert!(json_requested(Some("json")));
        assert!(json_requested(Some("JSON")));
        assert!(!json_requested(Some("text")));
        assert!(!json_requested(None));
    }
}
