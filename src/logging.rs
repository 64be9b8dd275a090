// src/logging.rs
//! Tracing setup for the binary and the anonymised text id used in log events.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "sentimetric=info,warn";
pub const ENV_LOG_FORMAT: &str = "SENTIMETRIC_LOG_FORMAT";

/// Short stable id for a text. Log events carry this, never the raw text.
pub(crate) fn anon_hash(text: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(12);
    for b in digest.iter().take(6) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Install the global subscriber. `RUST_LOG` wins over the default filter;
/// `SENTIMETRIC_LOG_FORMAT=json` switches to JSON lines. A subscriber that
/// is already installed stays in place.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let json = std::env::var(ENV_LOG_FORMAT)
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).try_init().ok();
    } else {
        registry.with(fmt::layer().compact()).try_init().ok();
    }
}
