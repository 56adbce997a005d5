//! Versioned documentation sites.
//!
//! Each site keeps three trees under `<public>/<site>/`: `stable`, `master` and
//! `tags`. The first two are mounted under their own prefix; release tags are
//! looked up by the full request path inside `tags`.

use axum::{
    Router,
    extract::{Request, State},
    http::{HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::get,
};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tower::util::ServiceExt;
use tower_http::services::ServeDir;
use tracing::debug;

use super::not_found_page;
use crate::core::config::SiteConfig;

static RELEASE_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^v(0|[1-9][0-9]*)\.(0|[1-9][0-9]*)(\.(0|[1-9][0-9]*))?$")
        .expect("release tag pattern compiles")
});

pub(crate) fn is_release_tag(segment: &str) -> bool {
    RELEASE_TAG.is_match(segment)
}

#[derive(Debug, Clone)]
pub(crate) struct DocsSite {
    name: String,
    stable_dir: PathBuf,
    master_dir: PathBuf,
    tags_dir: PathBuf,
    stable_root: String,
    master_root: String,
    not_found_page: Arc<str>,
}

impl DocsSite {
    pub(crate) fn new(site: &SiteConfig, public_dir: &Path, not_found_page: Arc<str>) -> Self {
        let base = public_dir.join(&site.name);
        Self {
            name: site.name.clone(),
            stable_dir: base.join("stable"),
            master_dir: base.join("master"),
            tags_dir: base.join("tags"),
            stable_root: format!("//{}/stable{}", site.base_url, site.root),
            master_root: format!("//{}/master{}", site.base_url, site.root),
            not_found_page,
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.stable_dir, &self.master_dir, &self.tags_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }

    pub(crate) fn router(self) -> Router {
        Router::new()
            .route("/", get(redirect_stable))
            .route("/stable", get(redirect_stable))
            .route("/master", get(redirect_master))
            .fallback(serve_versioned)
            .with_state(Arc::new(self))
    }
}

fn moved_permanently(location: &str) -> Response {
    (
        StatusCode::MOVED_PERMANENTLY,
        [(header::LOCATION, location.to_string())],
    )
        .into_response()
}

async fn redirect_stable(State(site): State<Arc<DocsSite>>) -> Response {
    moved_permanently(&site.stable_root)
}

async fn redirect_master(State(site): State<Arc<DocsSite>>) -> Response {
    moved_permanently(&site.master_root)
}

async fn serve_versioned(State(site): State<Arc<DocsSite>>, req: Request) -> Response {
    if req.method() != Method::GET && req.method() != Method::HEAD {
        return not_found_page(&site.not_found_page);
    }

    let path = req.uri().path().to_string();
    let target = if let Some(rest) = path.strip_prefix("/stable/") {
        Some((&site.stable_dir, "/stable", format!("/{}", rest)))
    } else if let Some(rest) = path.strip_prefix("/master/") {
        Some((&site.master_dir, "/master", format!("/{}", rest)))
    } else {
        let first = path.trim_start_matches('/').split('/').next().unwrap_or("");
        is_release_tag(first).then(|| (&site.tags_dir, "", path.clone()))
    };

    match target {
        Some((dir, mount, file_path)) => {
            serve_file(dir, mount, &file_path, req, &site.not_found_page).await
        }
        None => not_found_page(&site.not_found_page),
    }
}

/// Serve `file_path` out of `dir`. `mount` is the prefix stripped from the
/// request path; redirects issued by `ServeDir` get it back.
async fn serve_file(
    dir: &Path,
    mount: &str,
    file_path: &str,
    req: Request,
    page: &str,
) -> Response {
    let uri = match req.uri().query() {
        Some(q) => format!("{}?{}", file_path, q),
        None => file_path.to_string(),
    };
    let Ok(uri) = uri.parse::<Uri>() else {
        return not_found_page(page);
    };

    let (mut parts, body) = req.into_parts();
    parts.uri = uri;
    debug!("serving {} from {}", parts.uri.path(), dir.display());

    let mut response = match ServeDir::new(dir)
        .oneshot(Request::from_parts(parts, body))
        .await
    {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    };
    if response.status() == StatusCode::NOT_FOUND {
        return not_found_page(page);
    }
    if response.status().is_redirection() && !mount.is_empty() {
        remount_location(&mut response, mount);
    }
    response
}

fn remount_location(response: &mut Response, mount: &str) {
    let Some(location) = response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
    else {
        return;
    };
    if !location.starts_with('/') || location.starts_with("//") {
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{}{}", mount, location)) {
        response.headers_mut().insert(header::LOCATION, value);
    }
}
