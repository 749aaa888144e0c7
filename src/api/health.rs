//! Health check with request statistics

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::api::middleware::AppState;
use crate::db::migrations;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: &'static str,
    /// "ok" or "unavailable"
    pub database: &'static str,
    /// "current", "pending" or "unknown"
    pub migrations: &'static str,
    pub uptime_seconds: u64,
    pub uptime_formatted: String,
    pub total_requests: u64,
    pub avg_response_time_us: f64,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health))
}

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database_ok = match state.pool.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Database ping failed: {:#}", e);
            false
        }
    };

    let migration_state = if !database_ok {
        "unknown"
    } else {
        match migrations::is_up_to_date(&state.pool).await {
            Ok(true) => "current",
            Ok(false) => "pending",
            Err(e) => {
                tracing::warn!("Migration check failed: {:#}", e);
                "unknown"
            }
        }
    };

    let uptime_seconds = state.request_stats.uptime_seconds();
    Json(HealthResponse {
        status: if migration_state == "current" { "ok" } else { "degraded" },
        database: if database_ok { "ok" } else { "unavailable" },
        migrations: migration_state,
        uptime_seconds,
        uptime_formatted: format_uptime(uptime_seconds),
        total_requests: state.request_stats.total_requests(),
        avg_response_time_us: state.request_stats.avg_response_time_us(),
    })
}

/// Format uptime to human readable string
fn format_uptime(seconds: u64) -> String {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;

    if days > 0 {
        format!("{}d {}h {}m", days, hours, minutes)
    } else if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m", minutes)
    } else {
        format!("{}s", seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(42), "42s");
        assert_eq!(format_uptime(125), "2m");
        assert_eq!(format_uptime(3 * 3600 + 60), "3h 1m");
        assert_eq!(format_uptime(2 * 86400 + 3600), "2d 1h 0m");
    }
}
