use axum::http::header::CONTENT_TYPE;
use axum::http::{Response, StatusCode};
use html_escape::encode_text;
use pool::Body;
use registry::ActivityDescriptor;

pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Placeholder shown when an activity cannot be served normally.
pub fn fallback_page(activity: &ActivityDescriptor) -> String {
    let name = encode_text(activity.display_name());
    let description = activity
        .meta
        .as_ref()
        .and_then(|meta| meta.description.as_deref())
        .map(|description| format!("<p>{}</p>", encode_text(description)))
        .unwrap_or_default();

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>{name} - Fallback Mode</title>
    <style>
        body {{ font-family: sans-serif; padding: 2rem; text-align: center; }}
        .container {{ max-width: 600px; margin: 0 auto; }}
        .status {{ color: #f39c12; }}
    </style>
</head>
<body>
    <div class="container">
        <h1>{name}</h1>
        <div class="status">Fallback Mode: this activity is not available right now.</div>
        {description}
        <p>Activity: <code>{route}</code></p>
        <p>Type: {framework}</p>
        <p><a href="/">&larr; Dashboard</a></p>
    </div>
</body>
</html>
"#,
        name = name,
        description = description,
        route = encode_text(&activity.route),
        framework = activity.framework,
    )
}

pub fn not_found_page(url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>404 - Not Found</title></head>
<body style="font-family: sans-serif; text-align: center; padding: 2rem;">
    <h1>Not Found</h1>
    <p>Route <code>{}</code> not found</p>
    <p><a href="/">&larr; Dashboard</a></p>
</body>
</html>
"#,
        encode_text(url)
    )
}

pub fn html_response(status: StatusCode, html: String) -> Response<Body> {
    let mut response = Response::new(Body::from(html));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, axum::http::HeaderValue::from_static(HTML_CONTENT_TYPE));
    response
}

pub fn text_response(status: StatusCode, text: &'static str) -> Response<Body> {
    let mut response = Response::new(Body::from(text));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        axum::http::HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use registry::{ActivityMeta, FrameworkType};

    #[test]
    fn pages_escape_untrusted_text() {
        let page = not_found_page("/<script>alert(1)</script>");
        assert!(page.contains("&lt;script&gt;"));
        assert!(!page.contains("<script>"));

        let meta = ActivityMeta {
            name: Some("Bias <Lab>".to_string()),
            description: Some("Spot the & bias".to_string()),
            ..ActivityMeta::default()
        };
        let activity =
            ActivityDescriptor::new("bias", "/srv/bias", "causality", FrameworkType::Nextjs, Some(meta));
        let page = fallback_page(&activity);
        assert!(page.contains("Bias &lt;Lab&gt;"));
        assert!(page.contains("Spot the &amp; bias"));
        assert!(page.contains("/causality/bias"));
        assert!(page.contains("Type: nextjs"));
    }
}
