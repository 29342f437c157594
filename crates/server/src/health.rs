use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;

use quill_db::DbPool;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
    pub component: &'static str,
    pub healthy: bool,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub checked_at: String,
    pub components: Vec<ComponentHealth>,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(health)).with_state(db_pool)
}

pub async fn health(State(db_pool): State<DbPool>) -> (StatusCode, Json<HealthReport>) {
    let components = vec![
        ComponentHealth {
            component: "service",
            healthy: true,
            detail: "quill-server runtime initialized".to_string(),
        },
        probe_database(&db_pool).await,
    ];

    let all_healthy = components.iter().all(|component| component.healthy);
    let report = HealthReport {
        status: if all_healthy { "ok" } else { "unavailable" },
        checked_at: Utc::now().to_rfc3339(),
        components,
    };

    let code = if all_healthy { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(report))
}

async fn probe_database(pool: &DbPool) -> ComponentHealth {
    let (healthy, detail) = match sqlx::query_scalar::<_, i64>("SELECT 1").fetch_one(pool).await {
        Ok(_) => (true, "database reachable".to_string()),
        Err(error) => (false, format!("database probe failed: {error}")),
    };

    ComponentHealth { component: "database", healthy, detail }
}
