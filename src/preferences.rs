//! Per-session language and theme, resolved once per request.

use axum::{
    extract::{FromRequestParts, Path},
    http::{request::Parts, HeaderMap, StatusCode},
    response::IntoResponse,
};
use tower_sessions::Session;
use tracing::debug;

use crate::{
    error::Result,
    i18n::{Lang, Theme},
    views::redirect_back,
};

const LANG_KEY: &str = "lang";
const THEME_KEY: &str = "theme";

/// Display preferences of the current session, defaults filled in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Preferences {
    pub lang: Lang,
    pub theme: Theme,
}

impl<S> FromRequestParts<S> for Preferences
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state).await?;

        // unreadable values fall back to defaults rather than failing the page
        let lang = session.get::<Lang>(LANG_KEY).await.ok().flatten();
        let theme = session.get::<Theme>(THEME_KEY).await.ok().flatten();

        Ok(Preferences {
            lang: lang.unwrap_or_default(),
            theme: theme.unwrap_or_default(),
        })
    }
}

/// `GET /language/{code}`. Unsupported codes leave the setting unchanged.
pub async fn set_language(
    session: Session,
    headers: HeaderMap,
    Path(code): Path<String>,
) -> Result<impl IntoResponse> {
    match code.parse::<Lang>() {
        Ok(lang) => session.insert(LANG_KEY, lang).await?,
        Err(()) => debug!(code, "ignoring unsupported language"),
    }
    Ok(redirect_back(&headers, "/"))
}

/// `GET /theme/{name}`. Unsupported names leave the setting unchanged.
pub async fn set_theme(
    session: Session,
    headers: HeaderMap,
    Path(name): Path<String>,
) -> Result<impl IntoResponse> {
    match name.parse::<Theme>() {
        Ok(theme) => session.insert(THEME_KEY, theme).await?,
        Err(()) => debug!(name, "ignoring unsupported theme"),
    }
    Ok(redirect_back(&headers, "/"))
}
