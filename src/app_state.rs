use chrono::{DateTime, Utc};

use crate::prediction_service::PredictionService;

/// Router state shared by every handler.
pub struct AppState {
    pub service: PredictionService,
    pub version: &'static str,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self {
            service,
            version: env!("CARGO_PKG_VERSION"),
            started_at: Utc::now(),
        }
    }

    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds().max(0)
    }
}
