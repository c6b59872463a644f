use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Web toolchain an activity was built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameworkType {
    Nextjs,
    Vite,
    Cra,
    React,
    Static,
    Unknown,
}

impl FrameworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FrameworkType::Nextjs => "nextjs",
            FrameworkType::Vite => "vite",
            FrameworkType::Cra => "cra",
            FrameworkType::React => "react",
            FrameworkType::Static => "static",
            FrameworkType::Unknown => "unknown",
        }
    }

    /// Parse a framework name as written in `activity.config.json`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nextjs" | "next" | "next.js" => Some(FrameworkType::Nextjs),
            "vite" => Some(FrameworkType::Vite),
            "cra" | "create-react-app" => Some(FrameworkType::Cra),
            "react" => Some(FrameworkType::React),
            "static" | "html" => Some(FrameworkType::Static),
            "unknown" => Some(FrameworkType::Unknown),
            _ => None,
        }
    }

    /// Type an activity is served as. `unknown` is served like `static`.
    pub fn served_as(self) -> Self {
        match self {
            FrameworkType::Unknown => FrameworkType::Static,
            other => other,
        }
    }

    /// Only Next.js activities get a dedicated runtime instance.
    pub fn has_runtime(self) -> bool {
        matches!(self, FrameworkType::Nextjs)
    }
}

impl fmt::Display for FrameworkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const NEXT_CONFIGS: [&str; 2] = ["next.config.js", "next.config.mjs"];
const VITE_CONFIGS: [&str; 3] = ["vite.config.js", "vite.config.ts", "vite.config.mjs"];
const REACT_ENTRIES: [&str; 3] = ["src/App.js", "src/App.jsx", "src/index.js"];

/// Classify a directory by the marker files it contains.
///
/// First match wins, in this order: Next.js config or `pages/`/`app/`,
/// Vite config, a CRA production build (`build/static`) or
/// `public/manifest.json`, `src/` with an app entry, an `index.html` at the
/// root or under `public/`. Anything else (including directories that do
/// not exist or cannot be read) is `unknown`.
pub fn classify(dir: &Path) -> FrameworkType {
    if !dir.is_dir() {
        return FrameworkType::Unknown;
    }

    let framework = detect(dir);
    match framework {
        FrameworkType::Unknown => {
            tracing::debug!(
                path = %dir.display(),
                event = "framework_unknown",
                "framework detection failed"
            );
        }
        detected => {
            tracing::debug!(
                path = %dir.display(),
                framework = %detected,
                event = "framework_detected",
                "framework detected"
            );
        }
    }
    framework
}

fn detect(dir: &Path) -> FrameworkType {
    if NEXT_CONFIGS.iter().any(|name| dir.join(name).is_file())
        || dir.join("pages").is_dir()
        || dir.join("app").is_dir()
    {
        return FrameworkType::Nextjs;
    }

    if VITE_CONFIGS.iter().any(|name| dir.join(name).is_file()) {
        return FrameworkType::Vite;
    }

    if dir.join("build").join("static").is_dir() || dir.join("public").join("manifest.json").is_file()
    {
        return FrameworkType::Cra;
    }

    if dir.join("src").is_dir() && REACT_ENTRIES.iter().any(|entry| dir.join(entry).is_file()) {
        return FrameworkType::React;
    }

    if dir.join("index.html").is_file() || dir.join("public").join("index.html").is_file() {
        return FrameworkType::Static;
    }

    FrameworkType::Unknown
}
