use std::{collections::HashMap, sync::Arc, time::Instant};

use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    clients::{database::DatabaseClient, fcm::FcmClient},
    models::health::{HealthCheckResponse, HealthStatus, ServiceHealth},
};

pub struct HealthChecker {
    database: Arc<DatabaseClient>,
    fcm: Arc<FcmClient>,
}

impl HealthChecker {
    pub fn new(database: Arc<DatabaseClient>, fcm: Arc<FcmClient>) -> Self {
        Self { database, fcm }
    }

    pub async fn check_all(&self) -> HealthCheckResponse {
        let mut checks = HashMap::new();

        checks.insert("database".to_string(), self.check_database().await);
        checks.insert("fcm".to_string(), self.check_fcm().await);

        aggregate(checks)
    }

    async fn check_database(&self) -> ServiceHealth {
        let start = Instant::now();

        match self.database.health_check().await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "Database health check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                ServiceHealth::unhealthy(format!("Health check query failed: {}", e))
            }
        }
    }

    async fn check_fcm(&self) -> ServiceHealth {
        let start = Instant::now();

        match self.fcm.health_check().await {
            Ok(_) => {
                let elapsed = start.elapsed().as_millis() as u64;
                debug!(response_time_ms = elapsed, "FCM credential check passed");
                ServiceHealth::healthy(elapsed)
            }
            Err(e) => {
                warn!(error = %e, "FCM credential check failed");
                ServiceHealth::unhealthy(format!("Cannot obtain access token: {}", e))
            }
        }
    }
}

/// Unhealthy if any single dependency is.
fn aggregate(checks: HashMap<String, ServiceHealth>) -> HealthCheckResponse {
    let status = if checks
        .values()
        .any(|health| health.status == HealthStatus::Unhealthy)
    {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Healthy
    };

    HealthCheckResponse {
        status,
        timestamp: Utc::now(),
        checks,
    }
}
