use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use tera::Context;
use tracing::info;

use crate::{
    entities::{User, MAX_USERNAME_LEN},
    error::{AppError, Result},
    preferences::Preferences,
    store::UserRepository,
    views::is_local_path,
    AppState,
};

pub type AuthSession = axum_login::AuthSession<Backend>;

#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
    pub next: Option<String>,
}

// never print the password
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .field("next", &self.next)
            .finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Store(#[from] AppError),

    #[error(transparent)]
    TaskJoin(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone)]
pub struct Backend {
    users: UserRepository,
}

impl Backend {
    pub fn new(users: UserRepository) -> Self {
        Self { users }
    }
}

#[async_trait::async_trait]
impl axum_login::AuthnBackend for Backend {
    type User = User;
    type Credentials = self::Credentials;
    type Error = self::Error;

    async fn authenticate(
        &self,
        creds: Self::Credentials,
    ) -> std::result::Result<Option<Self::User>, Self::Error> {
        // registration stores the trimmed name
        let user = self.users.find_by_username(creds.username.trim()).await?;

        // `password_auth::verify_password()` is blocking, hence using `tokio::task::spawn_blocking()`
        tokio::task::spawn_blocking(|| {
            // compares form input with argon2 password hash
            Ok(user.filter(|user| {
                password_auth::verify_password(creds.password, &user.password_hash).is_ok()
            }))
        })
        .await?
    }

    async fn get_user(
        &self,
        user_id: &axum_login::UserId<Self>,
    ) -> std::result::Result<Option<Self::User>, Self::Error> {
        Ok(self.users.find(*user_id).await?)
    }
}

/// Hash a password off the async runtime.
pub async fn hash_password(password: String) -> Result<String> {
    Ok(tokio::task::spawn_blocking(move || password_auth::generate_hash(password)).await?)
}

#[derive(Debug, Deserialize)]
pub struct NextQuery {
    pub next: Option<String>,
}

pub async fn login_page(
    auth_session: AuthSession,
    prefs: Preferences,
    State(state): State<AppState>,
    Query(query): Query<NextQuery>,
) -> Result<Response> {
    if auth_session.user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    render_login(&state, prefs, None, query.next, StatusCode::OK)
}

pub async fn login(
    mut auth_session: AuthSession,
    prefs: Preferences,
    State(state): State<AppState>,
    Form(creds): Form<Credentials>,
) -> Result<Response> {
    let next = creds.next.clone();
    let user = match auth_session.authenticate(creds).await? {
        Some(user) => user,
        None => {
            return render_login(
                &state,
                prefs,
                Some("error_invalid_credentials"),
                next,
                StatusCode::UNAUTHORIZED,
            );
        }
    };

    auth_session.login(&user).await?;
    info!(user_id = user.id, "user logged in");

    let target = next.as_deref().filter(|path| is_local_path(path)).unwrap_or("/");
    Ok(Redirect::to(target).into_response())
}

pub async fn register_page(
    auth_session: AuthSession,
    prefs: Preferences,
    State(state): State<AppState>,
) -> Result<Response> {
    if auth_session.user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    render_register(&state, prefs, None, StatusCode::OK)
}

#[derive(Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub password: String,
}

pub async fn register(
    mut auth_session: AuthSession,
    prefs: Preferences,
    State(state): State<AppState>,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    let username = form.username.trim();
    let invalid = if username.is_empty() || form.password.is_empty() {
        Some("error_fields_required")
    } else if username.chars().count() > MAX_USERNAME_LEN {
        Some("error_username_too_long")
    } else {
        None
    };
    if invalid.is_some() {
        return render_register(&state, prefs, invalid, StatusCode::BAD_REQUEST);
    }

    let password_hash = hash_password(form.password).await?;
    let user = match state.users.create(username, &password_hash).await {
        Ok(user) => user,
        Err(AppError::DuplicateUsername) => {
            let error = Some("error_username_taken");
            return render_register(&state, prefs, error, StatusCode::CONFLICT);
        }
        Err(err) => return Err(err),
    };

    auth_session.login(&user).await?;
    info!(user_id = user.id, "user registered");

    Ok(Redirect::to("/").into_response())
}

pub async fn logout(mut auth_session: AuthSession) -> Result<Redirect> {
    if let Some(user) = auth_session.logout().await? {
        info!(user_id = user.id, "user logged out");
    }
    Ok(Redirect::to("/login"))
}

/// The current user on a route guarded by `login_required!`.
pub fn current_user(auth_session: &AuthSession) -> Result<&User> {
    auth_session.user.as_ref().ok_or(AppError::Unauthenticated)
}

fn render_login(
    state: &AppState,
    prefs: Preferences,
    error_key: Option<&str>,
    next: Option<String>,
    status: StatusCode,
) -> Result<Response> {
    let mut context = Context::new();
    context.insert("error", &error_key);
    context.insert("next", &next.filter(|path| is_local_path(path)));
    let html = state.views.render("login.html", prefs, None, context)?;
    Ok((status, html).into_response())
}

fn render_register(
    state: &AppState,
    prefs: Preferences,
    error_key: Option<&str>,
    status: StatusCode,
) -> Result<Response> {
    let mut context = Context::new();
    context.insert("error", &error_key);
    let html = state.views.render("register.html", prefs, None, context)?;
    Ok((status, html).into_response())
}
