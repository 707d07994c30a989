use crate::state::AppState;
use axum::Router;

pub(crate) mod cookies;
mod dto;
pub(crate) mod extractors;
pub mod handlers;
#[cfg(test)]
pub mod memory;
pub mod repo;
pub mod repo_types;
pub mod services;

pub fn router() -> Router<AppState> {
    handlers::auth_routes()
}
