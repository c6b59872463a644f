use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::http::{Request, Response, StatusCode};
use registry::{ActivityDescriptor, FrameworkType};

use crate::runtime::{ActivityRuntime, Body, RuntimeError};

pub const IMMUTABLE_CACHE: &str = "public, max-age=31536000";
const INDEX_FILE: &str = "index.html";

/// Serves an activity's files straight from its build output.
pub struct StaticFileRuntime {
    activity: Arc<ActivityDescriptor>,
    roots: Vec<PathBuf>,
}

impl StaticFileRuntime {
    pub fn new(activity: Arc<ActivityDescriptor>) -> Self {
        let roots = candidate_roots(activity.framework, &activity.path);
        Self { activity, roots }
    }

    pub fn activity(&self) -> &Arc<ActivityDescriptor> {
        &self.activity
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve a path relative to the activity to a file on disk.
    pub fn find(&self, request_path: &str) -> Option<PathBuf> {
        find_file(&self.roots, request_path, true)
    }
}

#[async_trait]
impl ActivityRuntime for StaticFileRuntime {
    async fn handle(&self, request: Request<Body>) -> Result<Response<Body>, RuntimeError> {
        let path = request.uri().path();
        let file = self
            .find(path)
            .ok_or_else(|| RuntimeError::NotFound(format!("{}{}", self.activity.route, path)))?;
        tracing::debug!(
            route = %self.activity.route,
            file = %file.display(),
            "serving static file"
        );
        file_response(&file, None).await
    }
}

/// Build-output directories searched for an activity's files, most specific
/// first.
pub fn candidate_roots(framework: FrameworkType, activity_dir: &Path) -> Vec<PathBuf> {
    let subdirs: &[&str] = match framework {
        FrameworkType::Cra => &["build", "public"],
        FrameworkType::React => &["public", "build", "dist"],
        FrameworkType::Vite => &["dist", "public", ""],
        FrameworkType::Nextjs => &["out", "public", ""],
        FrameworkType::Static | FrameworkType::Unknown => &["", "public", "build", "dist", "out"],
    };
    subdirs
        .iter()
        .map(|subdir| {
            if subdir.is_empty() {
                activity_dir.to_path_buf()
            } else {
                activity_dir.join(subdir)
            }
        })
        .collect()
}

/// Turn a URL path into a relative filesystem path.
///
/// Segments are percent-decoded first. Decoded segments that start with a
/// dot (`..`, `.env`) or contain a separator or NUL are rejected.
pub fn relative_request_path(request_path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for raw in request_path.split('/') {
        if raw.is_empty() {
            continue;
        }
        let segment = urlencoding::decode(raw).ok()?;
        match segment.as_ref() {
            "." => continue,
            segment if segment.starts_with('.') => return None,
            segment if segment.contains(['/', '\\', '\0']) => return None,
            segment => {
                let mut components = Path::new(segment).components();
                match (components.next(), components.next()) {
                    (Some(Component::Normal(part)), None) => relative.push(part),
                    _ => return None,
                }
            }
        }
    }
    Some(relative)
}

/// First existing file for `request_path` under `roots`.
///
/// Directories resolve to their `index.html`. With `spa_fallback`, a path
/// whose last segment has no extension (a client-side route) falls back to
/// the first `index.html` found.
pub fn find_file(roots: &[PathBuf], request_path: &str, spa_fallback: bool) -> Option<PathBuf> {
    let relative = relative_request_path(request_path)?;

    for root in roots {
        let candidate = root.join(&relative);
        if candidate.is_file() {
            return Some(candidate);
        }
        let index = candidate.join(INDEX_FILE);
        if candidate.is_dir() && index.is_file() {
            return Some(index);
        }
    }

    let has_extension = relative.extension().is_some();
    if !spa_fallback || has_extension {
        return None;
    }
    roots
        .iter()
        .map(|root| root.join(INDEX_FILE))
        .find(|index| index.is_file())
}

pub fn content_type_for(path: &Path) -> String {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("css") => "text/css".to_string(),
        Some("js") | Some("mjs") => "application/javascript".to_string(),
        Some("html") => "text/html; charset=utf-8".to_string(),
        _ => mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string(),
    }
}

/// Read `path` into a 200 response with a content type from its extension.
pub async fn file_response(
    path: &Path,
    cache_control: Option<&'static str>,
) -> Result<Response<Body>, RuntimeError> {
    let contents = tokio::fs::read(path).await?;
    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type_for(path));
    if let Some(cache_control) = cache_control {
        builder = builder.header(CACHE_CONTROL, cache_control);
    }
    builder
        .body(Body::from(contents))
        .map_err(|err| RuntimeError::InvalidRequest(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use std::fs;
    use tempfile::TempDir;

    fn touch(root: &Path, relative: &str, contents: &str) {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("mkdir");
        }
        fs::write(path, contents).expect("write");
    }

    fn runtime(dir: &Path, framework: FrameworkType) -> StaticFileRuntime {
        StaticFileRuntime::new(Arc::new(ActivityDescriptor::new(
            "two", dir, "b", framework, None,
        )))
    }

    #[test]
    fn traversal_is_rejected() {
        assert!(relative_request_path("/../secret").is_none());
        assert!(relative_request_path("/a/../../b").is_none());
        assert_eq!(
            relative_request_path("/css//site.css"),
            Some(PathBuf::from("css/site.css"))
        );
        assert_eq!(relative_request_path("/"), Some(PathBuf::new()));
        assert!(relative_request_path("/%2e%2e/secret").is_none());
        assert!(relative_request_path("/a%2F..%2F..%2Fb").is_none());
        assert!(relative_request_path("/a%5Cb").is_none());
    }

    #[test]
    fn dotfiles_are_never_resolved() {
        assert!(relative_request_path("/.env").is_none());
        assert!(relative_request_path("/config/.env.local").is_none());
        assert!(relative_request_path("/.git/HEAD").is_none());

        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "index.html", "<h1>two</h1>");
        touch(dir.path(), ".env", "DATABASE_URL=postgres://secret");
        let runtime = runtime(dir.path(), FrameworkType::Static);
        assert_eq!(runtime.find("/.env"), None);
    }

    #[test]
    fn segments_are_percent_decoded() {
        assert_eq!(
            relative_request_path("/img/my%20file.png"),
            Some(PathBuf::from("img/my file.png"))
        );
        assert!(relative_request_path("/bad%FF").is_none());

        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "my file.html", "spaced");
        let runtime = runtime(dir.path(), FrameworkType::Static);
        assert_eq!(
            runtime.find("/my%20file.html"),
            Some(dir.path().join("my file.html"))
        );
    }

    #[test]
    fn candidate_order_follows_framework() {
        let dir = Path::new("/srv/x");
        assert_eq!(
            candidate_roots(FrameworkType::Cra, dir),
            vec![dir.join("build"), dir.join("public")]
        );
        assert_eq!(candidate_roots(FrameworkType::Vite, dir)[2], dir.to_path_buf());
        assert_eq!(candidate_roots(FrameworkType::Static, dir)[0], dir.to_path_buf());
    }

    #[test]
    fn build_output_wins_over_public_for_cra() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "build/index.html", "built");
        touch(dir.path(), "public/index.html", "source");

        let runtime = runtime(dir.path(), FrameworkType::Cra);
        assert_eq!(runtime.find("/"), Some(dir.path().join("build/index.html")));
    }

    #[test]
    fn client_routes_fall_back_to_index() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "dist/index.html", "app");
        touch(dir.path(), "dist/assets/app.js", "");

        let runtime = runtime(dir.path(), FrameworkType::Vite);
        assert_eq!(
            runtime.find("/assets/app.js"),
            Some(dir.path().join("dist/assets/app.js"))
        );
        assert_eq!(
            runtime.find("/results/42"),
            Some(dir.path().join("dist/index.html"))
        );
        assert_eq!(runtime.find("/missing.png"), None);
    }

    #[test]
    fn content_types_by_extension() {
        assert_eq!(content_type_for(Path::new("a/site.css")), "text/css");
        assert_eq!(content_type_for(Path::new("chunk.js")), "application/javascript");
        assert_eq!(content_type_for(Path::new("logo.png")), "image/png");
        assert_eq!(
            content_type_for(Path::new("blob")),
            "application/octet-stream"
        );
    }

    #[tokio::test]
    async fn handle_serves_file_and_reports_misses() {
        let dir = TempDir::new().expect("tempdir");
        touch(dir.path(), "index.html", "<h1>two</h1>");
        let runtime = runtime(dir.path(), FrameworkType::Static);

        let request = Request::builder().uri("/").body(Body::empty()).expect("request");
        let response = runtime.handle(request).await.expect("served");
        assert_eq!(
            response.headers()[CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        let body = response.into_body().collect().await.expect("body").to_bytes();
        assert_eq!(&body[..], b"<h1>two</h1>");

        let request = Request::builder()
            .uri("/nope.css")
            .body(Body::empty())
            .expect("request");
        assert!(matches!(
            runtime.handle(request).await,
            Err(RuntimeError::NotFound(_))
        ));
    }
}
