//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Counters describe sink activity: records, rotations, collisions, errors, drops.
//! - Cloning is cheap; every clone reports into the same registry.

use std::fmt;
use std::sync::Arc;

use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Prometheus-backed metrics registry shared by every sink of a process.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    records_written_total: IntCounter,
    rotations_total: IntCounter,
    empty_files_discarded_total: IntCounter,
    name_collisions_total: IntCounter,
    sink_errors_total: IntCounterVec,
    records_dropped_total: IntCounterVec,
    queue_depth: IntGauge,
    last_rotation_timestamp_seconds: IntGauge,
}

/// Snapshot of the unlabelled gauges and counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Records appended to active files.
    pub records_written_total: u64,
    /// Completed rotations, archived or discarded.
    pub rotations_total: u64,
    /// Rotations that deleted an untouched initial file instead of archiving it.
    pub empty_files_discarded_total: u64,
    /// Archive names that were already taken and needed a suffix.
    pub name_collisions_total: u64,
    /// Records waiting for the delivery worker.
    pub queue_depth: i64,
    /// Unix time of the latest rotation, zero before the first one.
    pub last_rotation_timestamp_seconds: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// built or registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let records_written_total = register(
            &registry,
            "tidelog_records_written_total",
            IntCounter::with_opts(Opts::new(
                "tidelog_records_written_total",
                "Records appended to active log files",
            )),
        )?;
        let rotations_total = register(
            &registry,
            "tidelog_rotations_total",
            IntCounter::with_opts(Opts::new(
                "tidelog_rotations_total",
                "Completed time-interval rotations",
            )),
        )?;
        let empty_files_discarded_total = register(
            &registry,
            "tidelog_empty_files_discarded_total",
            IntCounter::with_opts(Opts::new(
                "tidelog_empty_files_discarded_total",
                "Untouched initial files deleted instead of archived",
            )),
        )?;
        let name_collisions_total = register(
            &registry,
            "tidelog_name_collisions_total",
            IntCounter::with_opts(Opts::new(
                "tidelog_name_collisions_total",
                "Archive names that required a numeric suffix",
            )),
        )?;
        let sink_errors_total = register(
            &registry,
            "tidelog_sink_errors_total",
            IntCounterVec::new(
                Opts::new("tidelog_sink_errors_total", "Sink failures by kind"),
                &["kind"],
            ),
        )?;
        let records_dropped_total = register(
            &registry,
            "tidelog_records_dropped_total",
            IntCounterVec::new(
                Opts::new(
                    "tidelog_records_dropped_total",
                    "Records lost to a full delivery queue by overflow policy",
                ),
                &["policy"],
            ),
        )?;
        let queue_depth = register(
            &registry,
            "tidelog_queue_depth",
            IntGauge::with_opts(Opts::new(
                "tidelog_queue_depth",
                "Records waiting for the delivery worker",
            )),
        )?;
        let last_rotation_timestamp_seconds = register(
            &registry,
            "tidelog_last_rotation_timestamp_seconds",
            IntGauge::with_opts(Opts::new(
                "tidelog_last_rotation_timestamp_seconds",
                "Unix time of the most recent rotation",
            )),
        )?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                records_written_total,
                rotations_total,
                empty_files_discarded_total,
                name_collisions_total,
                sink_errors_total,
                records_dropped_total,
                queue_depth,
                last_rotation_timestamp_seconds,
            }),
        })
    }

    /// Count one appended record.
    pub fn inc_record_written(&self) {
        self.inner.records_written_total.inc();
    }

    /// Count a rotation that happened at `unix_seconds`.
    pub fn inc_rotation(&self, unix_seconds: i64) {
        self.inner.rotations_total.inc();
        self.inner.last_rotation_timestamp_seconds.set(unix_seconds);
    }

    /// Count an initial file that was deleted rather than archived.
    pub fn inc_empty_file_discarded(&self) {
        self.inner.empty_files_discarded_total.inc();
    }

    /// Count an archive name that needed disambiguation.
    pub fn inc_name_collision(&self) {
        self.inner.name_collisions_total.inc();
    }

    /// Count a sink failure of the given kind (`open`, `flush`, `rename`, ...).
    pub fn inc_sink_error(&self, kind: &str) {
        self.inner
            .sink_errors_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Count a record dropped under the given overflow policy.
    pub fn inc_record_dropped(&self, policy: &str) {
        self.inner
            .records_dropped_total
            .with_label_values(&[policy])
            .inc();
    }

    /// Set the delivery queue depth gauge.
    pub fn set_queue_depth(&self, depth: i64) {
        self.inner.queue_depth.set(depth);
    }

    /// Current value of the sink error counter for `kind`.
    #[must_use]
    pub fn sink_errors(&self, kind: &str) -> u64 {
        self.inner
            .sink_errors_total
            .with_label_values(&[kind])
            .get()
    }

    /// Current value of the dropped record counter for `policy`.
    #[must_use]
    pub fn records_dropped(&self, policy: &str) -> u64 {
        self.inner
            .records_dropped_total
            .with_label_values(&[policy])
            .get()
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::MetricsEncode { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::MetricsUtf8 { source })
    }

    /// Take a point-in-time snapshot of the unlabelled gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_written_total: self.inner.records_written_total.get(),
            rotations_total: self.inner.rotations_total.get(),
            empty_files_discarded_total: self.inner.empty_files_discarded_total.get(),
            name_collisions_total: self.inner.name_collisions_total.get(),
            queue_depth: self.inner.queue_depth.get(),
            last_rotation_timestamp_seconds: self.inner.last_rotation_timestamp_seconds.get(),
        }
    }
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("snapshot", &self.snapshot())
            .finish_non_exhaustive()
    }
}

fn register<C>(
    registry: &Registry,
    name: &'static str,
    collector: prometheus::Result<C>,
) -> Result<C>
where
    C: Collector + Clone + 'static,
{
    let collector = collector.map_err(|source| TelemetryError::MetricsCollector { name, source })?;
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricsRegister { name, source })?;
    Ok(collector)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_snapshot_reflects_updates() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_record_written();
        metrics.inc_record_written();
        metrics.inc_rotation(1_700_000_000);
        metrics.inc_empty_file_discarded();
        metrics.inc_name_collision();
        metrics.set_queue_depth(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.records_written_total, 2);
        assert_eq!(snapshot.rotations_total, 1);
        assert_eq!(snapshot.empty_files_discarded_total, 1);
        assert_eq!(snapshot.name_collisions_total, 1);
        assert_eq!(snapshot.queue_depth, 3);
        assert_eq!(snapshot.last_rotation_timestamp_seconds, 1_700_000_000);
        Ok(())
    }

    #[test]
    fn labelled_counters_render_with_their_labels() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.inc_sink_error("flush");
        metrics.inc_sink_error("flush");
        metrics.inc_record_dropped("discard_new");

        assert_eq!(metrics.sink_errors("flush"), 2);
        assert_eq!(metrics.sink_errors("open"), 0);
        assert_eq!(metrics.records_dropped("discard_new"), 1);

        let rendered = metrics.render()?;
        assert!(rendered.contains("tidelog_sink_errors_total{kind=\"flush\"} 2"));
        assert!(rendered.contains("tidelog_records_dropped_total{policy=\"discard_new\"} 1"));
        assert!(rendered.contains("tidelog_rotations_total 0"));
        Ok(())
    }

    #[test]
    fn clones_share_one_registry() -> Result<()> {
        let metrics = Metrics::new()?;
        let clone = metrics.clone();
        clone.inc_rotation(42);
        assert_eq!(metrics.snapshot().rotations_total, 1);
        assert!(format!("{metrics:?}").contains("rotations_total: 1"));
        Ok(())
    }
}
