pub mod analytics;
pub mod authentication;
pub mod config;
pub mod crud_ops;
pub mod entities;
pub mod error;
pub mod i18n;
pub mod preferences;
pub mod store;
pub mod uploads;
pub mod views;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use axum_login::{login_required, AuthManagerLayerBuilder};
use sha2::{Digest, Sha512};
use time::Duration;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tower_sessions::{cookie::Key, Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::SqliteStore;
use tracing::{info, warn};

use crate::{
    authentication::Backend,
    config::Config,
    store::{TagRepository, TaskRepository, UserRepository},
    uploads::FileStore,
    views::Views,
};

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub users: UserRepository,
    pub tasks: TaskRepository,
    pub tags: TagRepository,
    pub files: FileStore,
    pub views: Arc<Views>,
}

/// Signing key for session cookies. The configured secret is stretched to
/// the 64 bytes the cookie signer wants.
fn session_key(secret: Option<&str>) -> Key {
    match secret {
        Some(secret) => Key::from(Sha512::digest(secret.as_bytes()).as_slice()),
        None => {
            warn!("no secret key configured, sessions will not survive a restart");
            Key::generate()
        }
    }
}

/// Connect storage, run migrations and assemble the full router.
pub async fn build_app(config: &Config) -> anyhow::Result<Router> {
    let pool = store::connect(&config.database_url).await?;

    let session_store = SqliteStore::new(pool.clone());
    session_store.migrate().await?;

    let files = FileStore::new(&config.upload_dir);
    files.ensure_root().await?;

    let state = AppState {
        users: UserRepository::new(pool.clone()),
        tasks: TaskRepository::new(pool.clone()),
        tags: TagRepository::new(pool),
        files,
        views: Arc::new(Views::new()?),
    };

    let session_layer = SessionManagerLayer::new(session_store)
        .with_secure(config.cookie_secure)
        .with_expiry(Expiry::OnInactivity(Duration::days(config.session_days)))
        .with_signed(session_key(config.secret_key.as_deref()));

    let backend = Backend::new(state.users.clone());
    let auth_layer = AuthManagerLayerBuilder::new(backend, session_layer).build();

    let protected = Router::new()
        .route("/", get(crud_ops::index))
        .route("/analytics", get(crud_ops::analytics))
        .route("/add", post(crud_ops::add_task))
        .route("/update_order", post(crud_ops::update_order))
        .route("/complete/{task_id}", get(crud_ops::complete_task))
        .route("/archive_task/{task_id}", get(crud_ops::archive_task))
        .route("/restore_task/{task_id}", get(crud_ops::restore_task))
        .route("/delete/{task_id}", get(crud_ops::delete_task))
        .route("/archive", get(crud_ops::archive))
        .route("/logout", get(authentication::logout))
        .nest_service("/uploads", ServeDir::new(state.files.root()))
        .route_layer(login_required!(Backend, login_url = "/login"));

    let public = Router::new()
        .route(
            "/register",
            get(authentication::register_page).post(authentication::register),
        )
        .route(
            "/login",
            get(authentication::login_page).post(authentication::login),
        )
        .route("/language/{code}", get(preferences::set_language))
        .route("/theme/{name}", get(preferences::set_theme));

    info!(
        database = %config.database_url,
        uploads = %config.upload_dir.display(),
        "application ready"
    );

    Ok(protected
        .merge(public)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(auth_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
