// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Structured logging setup.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Install the global tracing subscriber.
///
/// `RUST_LOG` directives are honored on top of the crate defaults. If the
/// host already installed a subscriber this is a no-op.
pub fn init_logging(json: bool) {
    let filter = EnvFilter::from_default_env()
        .add_directive(
            "nutrition_coach=debug"
                .parse()
                .unwrap_or_else(|_| tracing::Level::DEBUG.into()),
        )
        .add_directive(tracing::Level::INFO.into());

    let result = if json {
        let format = tracing_subscriber::fmt::layer()
            .json()
            .with_target(false)
            .with_current_span(true)
            .flatten_event(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(format)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
