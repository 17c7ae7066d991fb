mod common;

use axum::extract::State;
use supermarket_api::{config::CartBackend, routes::health::health_check};

#[tokio::test]
async fn health_check_reports_database() -> anyhow::Result<()> {
    let state = common::setup_state(CartBackend::Session).await?;

    let response = health_check(State(state)).await;
    assert_eq!(response.0.message, "Health check");

    let data = serde_json::to_value(response.0.data.expect("health data"))?;
    assert_eq!(data["status"], "ok");
    assert_eq!(data["database"], "up");
    Ok(())
}
