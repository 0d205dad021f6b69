use crate::service::PredictionService;

/// Shared, read-only handler state. All mutability lives behind the
/// service's atomic table snapshot and counters.
pub struct AppState {
    pub service: PredictionService,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl AppState {
    pub fn new(service: PredictionService) -> Self {
        Self {
            service,
            started_at: chrono::Utc::now(),
        }
    }
}
