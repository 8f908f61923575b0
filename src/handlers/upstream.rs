use axum::{extract::Path, Json};
use rand::Rng;
use serde::Serialize;
use std::time::Duration;

use super::AppError;

// ─── Domain types ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: u32,
    pub name: String,
    pub role: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: u32,
    pub sku: String,
    pub price_cents: u32,
}

const NUM_USERS: u32 = 1_000;
const NUM_PRODUCTS: u32 = 500;

/// Sleep for a random latency in `[min_ms, max_ms)`.
///
/// The RNG is dropped before the await so handlers stay `Send`.
async fn simulate_latency(min_ms: u64, max_ms: u64) {
    let ms = rand::thread_rng().gen_range(min_ms..max_ms);
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// ─── GET /api/users ──────────────────────────────────────────────

pub async fn list_users() -> Json<Vec<User>> {
    simulate_latency(20, 120).await;
    Json((1..=10).map(user).collect())
}

// ─── GET /api/users/:id ──────────────────────────────────────────

pub async fn get_user(Path(id): Path<u32>) -> Result<Json<User>, AppError> {
    simulate_latency(2, 60).await;
    if id == 0 || id > NUM_USERS {
        return Err(AppError::NotFound(format!("user '{id}' not found")));
    }
    Ok(Json(user(id)))
}

// ─── GET /api/products/:id ───────────────────────────────────────

pub async fn get_product(Path(id): Path<u32>) -> Result<Json<Product>, AppError> {
    simulate_latency(5, 40).await;
    if id == 0 || id > NUM_PRODUCTS {
        return Err(AppError::NotFound(format!("product '{id}' not found")));
    }
    Ok(Json(Product {
        id,
        sku: format!("prod_{id:04}"),
        price_cents: 499 + (id * 37) % 10_000,
    }))
}

// ─── GET /api/flaky ──────────────────────────────────────────────

/// Fails roughly one call in four with a 503.
pub async fn flaky() -> Result<Json<serde_json::Value>, AppError> {
    simulate_latency(10, 200).await;
    let fail = rand::thread_rng().gen_bool(0.25);
    if fail {
        return Err(AppError::Unavailable("upstream temporarily unavailable".into()));
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ─── GET /other/path ─────────────────────────────────────────────

/// Slow, but outside the default `/api/*` filter.
pub async fn other_path() -> &'static str {
    simulate_latency(50, 150).await;
    "not an api route"
}

fn user(id: u32) -> User {
    const NAMES: &[&str] = &["Emma", "Liam", "Olivia", "Noah", "Ava", "Ethan", "Sophia", "Mason"];
    const ROLES: &[&str] = &["viewer", "editor", "admin"];
    User {
        id,
        name: NAMES[id as usize % NAMES.len()].to_string(),
        role: ROLES[id as usize % ROLES.len()].to_string(),
    }
}
