use std::fmt::Write;

use engine::{ActivitySummary, RuntimeState};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use indexmap::IndexMap;

const STYLE: &str = r#"
    body { font-family: 'Segoe UI', sans-serif; margin: 0; background: #f5f7fa; }
    .header { background: linear-gradient(135deg, #667eea 0%, #764ba2 100%); color: white; padding: 2rem; }
    .metrics { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 1rem; margin: 2rem; }
    .metric-card, .domain { background: white; padding: 1rem; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1); }
    .metric-value { font-size: 2rem; font-weight: bold; color: #3498db; }
    .domain { margin: 2rem; }
    .activity { display: flex; gap: 1rem; align-items: baseline; padding: 0.4rem 0; border-bottom: 1px solid #eee; }
    .type, .state { font-size: 0.8rem; padding: 0.1rem 0.5rem; border-radius: 4px; background: #ecf0f1; }
    .state-ready { background: #d5f5e3; }
    .state-failed { background: #fadbd8; }
    .state-initializing { background: #fcf3cf; }
    .links a { display: inline-block; margin: 0.5rem; padding: 0.5rem 1rem; background: #3498db; color: white; text-decoration: none; border-radius: 4px; }
"#;

/// The `/` page: counters plus every activity grouped by domain.
pub fn dashboard_page(state: &RuntimeState) -> String {
    let metrics = state.metrics_snapshot();
    let catalog = state.catalog();

    let mut html = String::new();
    let _ = write!(
        html,
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Activity Server</title>
    <style>{STYLE}</style>
</head>
<body>
    <div class="header">
        <h1>Activity Server</h1>
        <p>{count} activities on one origin</p>
    </div>
    <div class="metrics">
        <div class="metric-card"><div class="metric-value">{loaded}</div><div>Activities Loaded</div></div>
        <div class="metric-card"><div class="metric-value">{requests}</div><div>Total Requests</div></div>
        <div class="metric-card"><div class="metric-value">{errors}</div><div>Errors</div></div>
        <div class="metric-card"><div class="metric-value">{uptime}</div><div>Uptime</div></div>
        <div class="metric-card"><div class="metric-value">{ready}/{failed}</div><div>Runtimes Ready/Failed</div></div>
    </div>
"#,
        count = catalog.len(),
        loaded = metrics.activities_loaded,
        requests = metrics.request_count,
        errors = metrics.error_count,
        uptime = metrics.uptime_formatted,
        ready = metrics.runtimes.ready,
        failed = metrics.runtimes.failed,
    );

    for (domain, activities) in group_by_domain(&catalog) {
        let _ = write!(html, "    <div class=\"domain\">\n        <h2>{}</h2>\n", text(domain));
        for activity in activities {
            let state_badge = match activity.runtime {
                Some(status) => format!(
                    r#"<span class="state state-{0}">{0}</span>"#,
                    status.as_str()
                ),
                None => String::new(),
            };
            let description = activity
                .description
                .as_deref()
                .map(|d| format!("<span>{}</span>", text(d)))
                .unwrap_or_default();
            let _ = writeln!(
                html,
                r#"        <div class="activity"><a href="{href}">{name}</a><span class="type">{framework}</span>{state_badge}{description}</div>"#,
                href = attr(&activity.route),
                name = text(&activity.name),
                framework = activity.framework,
            );
        }
        html.push_str("    </div>\n");
    }

    html.push_str(
        r#"    <div class="links domain">
        <a href="/browse">Browse</a>
        <a href="/api/activities">Activities JSON</a>
        <a href="/api/metrics">Live Metrics</a>
    </div>
</body>
</html>
"#,
    );
    html
}

/// Generated `/browse` page, used when no `activity-browser.html` exists.
pub fn browse_page(state: &RuntimeState) -> String {
    let catalog = state.catalog();
    let mut html = String::from(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <title>Activity Browser</title>
    <style>
        body { font-family: sans-serif; max-width: 900px; margin: 2rem auto; }
        li { margin: 0.3rem 0; }
        .meta { color: #7f8c8d; font-size: 0.9rem; }
    </style>
</head>
<body>
    <h1>Activity Browser</h1>
"#,
    );

    for (domain, activities) in group_by_domain(&catalog) {
        let _ = write!(html, "    <h2>{}</h2>\n    <ul>\n", text(domain));
        for activity in activities {
            let mut meta = vec![activity.framework.to_string()];
            if let Some(tech) = &activity.tech {
                meta.push(tech.clone());
            }
            if let Some(status) = &activity.status {
                meta.push(status.clone());
            }
            let _ = writeln!(
                html,
                r#"        <li><a href="{href}">{name}</a> <span class="meta">{meta}</span></li>"#,
                href = attr(&activity.route),
                name = text(&activity.name),
                meta = text(&meta.join(" · ")),
            );
        }
        html.push_str("    </ul>\n");
    }

    html.push_str("    <p><a href=\"/\">&larr; Dashboard</a></p>\n</body>\n</html>\n");
    html
}

/// Group summaries by domain, keeping first-seen domain order.
fn group_by_domain(catalog: &[ActivitySummary]) -> IndexMap<&str, Vec<&ActivitySummary>> {
    let mut groups: IndexMap<&str, Vec<&ActivitySummary>> = IndexMap::new();
    for activity in catalog {
        groups
            .entry(activity.domain.as_str())
            .or_default()
            .push(activity);
    }
    groups
}
