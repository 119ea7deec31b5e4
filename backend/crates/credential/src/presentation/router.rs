//! Credential Router

use crate::application::context::CredentialContext;
use crate::domain::repository::{CredentialRepository, IdentitySource, PlatformClient};
use crate::presentation::handlers;
use crate::presentation::middleware::{AdminAuth, require_admin};
use axum::{
    Router, middleware,
    routing::{delete, get, post},
};

/// Create the public and admin routes over a shared context
///
/// Mount under `/api`. Admin routes sit behind [`require_admin`].
pub fn credential_router<R, P, S>(ctx: CredentialContext<R, P, S>, admin: AdminAuth) -> Router
where
    R: CredentialRepository,
    P: PlatformClient + Send + Sync + 'static,
    S: IdentitySource + Send + Sync + 'static,
{
    let admin_routes = Router::new()
        .route(
            "/identities",
            get(handlers::list_identities::<R, P, S>).post(handlers::add_identity::<R, P, S>),
        )
        .route(
            "/identities/{name}",
            delete(handlers::remove_identity::<R, P, S>),
        )
        .route("/reload", post(handlers::reload_identities::<R, P, S>))
        .route_layer(middleware::from_fn_with_state(admin, require_admin));

    Router::new()
        .route("/download", post(handlers::submit_download::<R, P, S>))
        .route("/status/{task_id}", get(handlers::task_status::<R, P, S>))
        .nest("/admin", admin_routes)
        .with_state(ctx)
}
