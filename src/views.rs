//! Server-side HTML rendering and redirect helpers.

use axum::{
    http::{header, HeaderMap},
    response::{Html, Redirect},
};
use tera::{Context, Tera};

use crate::{error::Result, i18n, preferences::Preferences};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("register.html", include_str!("../templates/register.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("archive.html", include_str!("../templates/archive.html")),
    ("analytics.html", include_str!("../templates/analytics.html")),
];

pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> Result<Self, tera::Error> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        tera.register_function("t", i18n::tera_text);
        Ok(Self { tera })
    }

    /// Render `template` with the page context plus the values every page
    /// layout reads (`lang`, `theme`, `username`).
    pub fn render(
        &self,
        template: &str,
        prefs: Preferences,
        username: Option<&str>,
        mut context: Context,
    ) -> Result<Html<String>> {
        context.insert("lang", prefs.lang.code());
        context.insert("theme", prefs.theme.name());
        context.insert("username", &username);
        Ok(Html(self.tera.render(template, &context)?))
    }
}

/// Redirect to the page the request came from, or `fallback` without a
/// usable `Referer`. Only same-site paths are followed.
pub fn redirect_back(headers: &HeaderMap, fallback: &str) -> Redirect {
    let target = headers
        .get(header::REFERER)
        .and_then(|value| value.to_str().ok())
        .and_then(|referer| local_path(referer, headers))
        .unwrap_or(fallback);
    Redirect::to(target)
}

/// Path and query of `url` when it points at this host, or when it already
/// is a bare absolute path.
fn local_path<'a>(url: &'a str, headers: &HeaderMap) -> Option<&'a str> {
    if is_local_path(url) {
        return Some(url);
    }
    let host = headers.get(header::HOST)?.to_str().ok()?;
    let rest = url
        .strip_prefix("http://")
        .or_else(|| url.strip_prefix("https://"))?;
    match rest.strip_prefix(host)? {
        "" => Some("/"),
        path if is_local_path(path) => Some(path),
        _ => None,
    }
}

/// A path on this site: rooted, and neither protocol-relative nor using
/// backslashes that browsers read as `/`.
pub fn is_local_path(path: &str) -> bool {
    path.starts_with('/') && !path.starts_with("//") && !path.contains('\\')
}
