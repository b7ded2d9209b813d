//! Prometheus metrics for the pinboard server.
//!
//! Exposes counters for toggle operations, notification fan-out,
//! cascade deletions, and media uploads.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus
//! scraping. Metrics carry no per-user data, only aggregate counts.
//!
//! **Deployment Requirement**: the `/metrics` endpoint MUST be
//! network-restricted to authorized Prometheus scraper IPs only. This
//! should be enforced at the infrastructure level (firewall, load
//! balancer, or reverse proxy rules). Do NOT expose `/metrics` on
//! public networks.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use pinboard_core::{EngagementKind, ToggleOutcome};
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Toggle metrics

/// Toggle operations by edge kind and outcome.
/// Outcomes: "created", "removed", "raced" (lost a concurrent creation).
pub static TOGGLES: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("pinboard_toggles_total", "Toggle operations by kind and outcome"),
        &["kind", "outcome"],
    )
    .expect("metric creation failed")
});

// Notification fan-out metrics

pub static NOTIFICATIONS_EMITTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pinboard_notifications_emitted_total",
        "Total notification records written by fan-out",
    )
    .expect("metric creation failed")
});

pub static NOTIFICATIONS_SUPPRESSED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pinboard_notifications_suppressed_total",
        "Total notifications suppressed because actor and receiver match",
    )
    .expect("metric creation failed")
});

pub static NOTIFICATIONS_FAILED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pinboard_notifications_failed_total",
        "Total notification writes that failed after the primary mutation committed",
    )
    .expect("metric creation failed")
});

// Post lifecycle metrics

pub static POSTS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("pinboard_posts_created_total", "Total posts created")
        .expect("metric creation failed")
});

pub static CASCADE_DELETIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pinboard_cascade_deletions_total",
        "Total post cascade deletions",
    )
    .expect("metric creation failed")
});

pub static CASCADE_DELETE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "pinboard_cascade_delete_duration_seconds",
            "Time taken to cascade-delete a post",
        )
        .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5]),
    )
    .expect("metric creation failed")
});

// Media metrics

pub static MEDIA_UPLOADS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new("pinboard_media_uploads_total", "Total media assets stored")
        .expect("metric creation failed")
});

pub static MEDIA_UPLOAD_BYTES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pinboard_media_upload_bytes_total",
        "Total bytes of media stored",
    )
    .expect("metric creation failed")
});

pub static MEDIA_DELETE_FAILURES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pinboard_media_delete_failures_total",
        "Total best-effort media deletions that failed",
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// This function is idempotent - subsequent calls after the first are
/// no-ops, which allows safe use in integration tests.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        REGISTRY
            .register(Box::new(TOGGLES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(NOTIFICATIONS_EMITTED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(NOTIFICATIONS_SUPPRESSED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(NOTIFICATIONS_FAILED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(POSTS_CREATED.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CASCADE_DELETIONS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(CASCADE_DELETE_DURATION.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MEDIA_UPLOADS.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MEDIA_UPLOAD_BYTES.clone()))
            .expect("metric registration failed");
        REGISTRY
            .register(Box::new(MEDIA_DELETE_FAILURES.clone()))
            .expect("metric registration failed");
    });
}

/// Record a toggle operation outcome.
pub fn record_toggle(kind: EngagementKind, outcome: &ToggleOutcome) {
    let label = match (outcome.engaged, outcome.created) {
        (true, true) => "created",
        (true, false) => "raced",
        (false, _) => "removed",
    };
    TOGGLES.with_label_values(&[kind.as_str(), label]).inc();
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        // This would panic if any metric creation failed
        register_metrics();
    }

    #[test]
    fn test_record_toggle_labels() {
        register_metrics();
        record_toggle(
            EngagementKind::Like,
            &ToggleOutcome {
                engaged: true,
                created: true,
            },
        );
        record_toggle(
            EngagementKind::Like,
            &ToggleOutcome {
                engaged: true,
                created: false,
            },
        );
        record_toggle(
            EngagementKind::Like,
            &ToggleOutcome {
                engaged: false,
                created: false,
            },
        );

        assert!(TOGGLES.with_label_values(&["like", "created"]).get() >= 1);
        assert!(TOGGLES.with_label_values(&["like", "raced"]).get() >= 1);
        assert!(TOGGLES.with_label_values(&["like", "removed"]).get() >= 1);
    }
}
