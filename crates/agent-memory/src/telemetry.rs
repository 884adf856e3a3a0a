//! Tracing setup for the memory service.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` overrides the default filter,
/// which keeps this crate at info and quiets everything else.
pub fn init_tracing() {
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| "agent_memory=info,warn".into());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_target(true)
        .compact()
        .finish();

    // Tests and embedders may have installed their own subscriber already.
    let _ = tracing::subscriber::set_global_default(subscriber);
}
