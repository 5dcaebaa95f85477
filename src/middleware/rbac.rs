// src/middleware/rbac.rs

use axum::extract::{FromRef, FromRequestParts};
use axum::http::request::Parts;
use std::marker::PhantomData;

use crate::{
    common::error::{ApiError, AppError},
    config::AppState,
    middleware::{auth::AuthenticatedUser, i18n::Locale},
    models::rbac,
};

/// A permission a handler can demand through `RequirePermission<T>`.
pub trait PermissionDef: Send + Sync + 'static {
    fn slug() -> &'static str;
}

/// Extractor that fails with 403 unless the caller's role grants `T`.
pub struct RequirePermission<T>(pub PhantomData<T>);

impl<T, S> FromRequestParts<S> for RequirePermission<T>
where
    T: PermissionDef,
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app_state = AppState::from_ref(state);
        let locale = Locale::from_request_parts(parts, state)
            .await
            .unwrap_or_else(|never| match never {});

        let user = parts
            .extensions
            .get::<AuthenticatedUser>()
            .ok_or_else(|| AppError::InvalidToken.to_api_error(&locale, &app_state.i18n_store))?;

        let required_perm = T::slug();
        if !user.0.role.has_permission(required_perm) {
            tracing::warn!(user_id = %user.0.id, role = ?user.0.role, permission = required_perm, "⛔ Permission denied");
            return Err(AppError::Forbidden(required_perm).to_api_error(&locale, &app_state.i18n_store));
        }

        Ok(RequirePermission(PhantomData))
    }
}

pub struct PermInventoryRead;
impl PermissionDef for PermInventoryRead {
    fn slug() -> &'static str { rbac::INVENTORY_READ }
}

pub struct PermInventoryWrite;
impl PermissionDef for PermInventoryWrite {
    fn slug() -> &'static str { rbac::INVENTORY_WRITE }
}

pub struct PermInventoryApprove;
impl PermissionDef for PermInventoryApprove {
    fn slug() -> &'static str { rbac::INVENTORY_APPROVE }
}
