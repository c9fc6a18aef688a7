use std::net::SocketAddr;

use crate::model::BookingStatus;

/// Counter: availability queries answered. Labels: query.
pub const AVAILABILITY_QUERIES_TOTAL: &str = "bookable_availability_queries_total";

/// Counter: bookings committed. Labels: status.
pub const BOOKINGS_SAVED_TOTAL: &str = "bookable_bookings_saved_total";

/// Counter: booking requests refused for lack of capacity.
pub const BOOKINGS_REJECTED_TOTAL: &str = "bookable_bookings_rejected_total";

/// Counter: bookings removed (explicit delete or line-item cascade).
pub const BOOKINGS_DELETED_TOTAL: &str = "bookable_bookings_deleted_total";

/// Counter: commerce writes performed by the synchronizer.
pub const SYNC_WRITES_TOTAL: &str = "bookable_sync_writes_total";

/// Counter: synchronizations that failed and were rolled back.
pub const SYNC_FAILURES_TOTAL: &str = "bookable_sync_failures_total";

/// Histogram: synchronizer duration in seconds.
pub const SYNC_DURATION_SECONDS: &str = "bookable_sync_duration_seconds";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) -> Result<(), metrics_exporter_prometheus::BuildError> {
    let Some(port) = port else { return Ok(()) };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
    Ok(())
}

/// Map a status to a short label for metrics.
pub fn status_label(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "pending",
        BookingStatus::Confirmed => "confirmed",
        BookingStatus::Cancelled => "cancelled",
    }
}
