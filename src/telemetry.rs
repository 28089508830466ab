//! Optional `tracing` subscriber setup for hosts of `chart-stock`.
//!
//! The crate only emits events; it never installs a subscriber on its own.
//! Events are grouped by module target:
//!
//! - `chart_stock::data::table` logs row batches at `debug` and dropped
//!   non-finite keys at `warn`.
//! - `chart_stock::stock::controller` logs source registration, grouping
//!   changes and published selections at `debug`, skipped selections and
//!   table invalidations at `trace`.
//! - `chart_stock::stock::registry` logs every rebuild at `debug`, with the
//!   merged key count and whether the sources are synchronized.
//! - `chart_stock::stock::grouping` and `chart_stock::data::selectable` log
//!   interval choices and per-source selections at `trace`.
//! - `chart_stock::core::interval_list` warns about duplicate grouping levels.
//!
//! `RUST_LOG=chart_stock::stock::controller=debug` is usually enough to follow
//! a scrolling session without the per-rebuild noise.

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "warn,chart_stock=info";

/// Initializes a default `tracing` subscriber when the `telemetry` feature is enabled.
///
/// Returns `true` when initialization succeeds.
/// Returns `false` when no initialization is performed (feature disabled) or if a
/// global subscriber was already set by the host application.
#[must_use]
pub fn init_default_tracing() -> bool {
    #[cfg(feature = "telemetry")]
    {
        let builder = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(DEFAULT_FILTER)),
            )
            .with_target(true)
            .compact();

        return builder.try_init().is_ok();
    }

    #[cfg(not(feature = "telemetry"))]
    {
        false
    }
}

#[cfg(test)]
mod tests {
    #[cfg(not(feature = "telemetry"))]
    #[test]
    fn init_is_a_no_op_without_feature() {
        assert!(!super::init_default_tracing());
    }

    #[cfg(feature = "telemetry")]
    #[test]
    fn default_filter_names_this_crate() {
        assert!(super::DEFAULT_FILTER.contains("chart_stock="));
        assert!(tracing_subscriber::EnvFilter::try_new(super::DEFAULT_FILTER).is_ok());
    }
}
