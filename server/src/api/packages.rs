use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::error::AppError;
use super::AppState;
use crate::packages::{PackageFilter, ResolvedName};

/// Request body for batch resolution.
#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub ids: Vec<String>,
}

/// Query parameters for listing installed packages.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub filter: PackageFilter,
}

/// Resolved names keyed by package id.
#[derive(Debug, Serialize, Deserialize)]
pub struct PackagesResponse {
    pub packages: HashMap<String, ResolvedName>,
}

/// POST /api/v1/packages/resolve — resolve display names for the given ids.
pub async fn resolve(
    State(state): State<AppState>,
    Json(body): Json<ResolveRequest>,
) -> Result<Json<PackagesResponse>, AppError> {
    let packages = state.service.resolve_packages(&body.ids).await?;
    Ok(Json(PackagesResponse { packages }))
}

/// GET /api/v1/packages — list installed packages with resolved names.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<PackagesResponse>, AppError> {
    let packages = state.service.resolve_installed(query.filter).await?;
    Ok(Json(PackagesResponse { packages }))
}
