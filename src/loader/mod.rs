//! Script loading.
//!
//! Resolves a script reference to a readable local file:
//!
//! 1. `http://` / `https://` references are downloaded and staged to a temp file
//! 2. existing paths are used as-is
//! 3. bare names are searched in each module directory with each configured extension
//!
//! Staged files are removed when the loader is dropped. The built-in `std` and
//! `os` modules are served before any file lookup.

mod builtin;
mod fetch;
mod resolver;

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::config::LoaderConfig;
use fetch::UrlFetcher;

pub use builtin::{builtin_resolver, BuiltinModules, OsModule, StdModule, BUILTIN_MODULES};
pub use resolver::ModuleResolver;

/// Errors that can occur while locating or fetching a script
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Nothing matched the reference
    #[error("Script not found: {0}")]
    NotFound(String),

    /// Remote loading is switched off
    #[error("Remote scripts are disabled: {0}")]
    RemoteDisabled(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP {status} for URL: {url}")]
    HttpStatus { status: u16, url: String },

    /// Content too large
    #[error("Content too large: {size} bytes (max: {max})")]
    ContentTooLarge { size: u64, max: u64 },

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Script is not valid UTF-8
    #[error("Script is not valid UTF-8: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Where a loaded script came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOrigin {
    Local,
    Remote(Url),
}

/// A script ready for evaluation
#[derive(Debug, Clone)]
pub struct ScriptSource {
    /// Local path; also used as the display name
    pub path: PathBuf,
    pub source: String,
    pub origin: ScriptOrigin,
}

impl ScriptSource {
    pub fn is_remote(&self) -> bool {
        matches!(self.origin, ScriptOrigin::Remote(_))
    }
}

pub struct ScriptLoader {
    config: LoaderConfig,
    fetcher: Option<UrlFetcher>,
    by_url: HashMap<Url, PathBuf>,
    origins: HashMap<PathBuf, Url>,
}

impl ScriptLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self {
            config,
            fetcher: None,
            by_url: HashMap::new(),
            origins: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Whether `target` names a network resource
    pub fn is_remote(target: &str) -> bool {
        target.starts_with("http://") || target.starts_with("https://")
    }

    /// Original URL of a staged file
    pub fn origin_of(&self, path: &Path) -> Option<&Url> {
        self.origins.get(path)
    }

    /// Join a module specifier against the module importing it
    pub fn join(&self, base: &str, name: &str) -> String {
        let relative = name.starts_with("./") || name.starts_with("../");
        if Self::is_remote(name) || !relative {
            return name.to_string();
        }

        let base_url = self
            .origin_of(Path::new(base))
            .cloned()
            .or_else(|| Url::parse(base).ok().filter(|u| Self::is_remote(u.as_str())));
        if let Some(joined) = base_url.and_then(|url| url.join(name).ok()) {
            return joined.to_string();
        }

        let parent = Path::new(base).parent().unwrap_or_else(|| Path::new(""));
        parent.join(name).to_string_lossy().into_owned()
    }

    /// Resolve a reference to a readable local file
    pub fn resolve(&mut self, target: &str) -> Result<PathBuf, LoaderError> {
        if Self::is_remote(target) {
            let url = Url::parse(target)?;
            return self.stage_remote(url);
        }
        self.locate_local(target)
    }

    /// Resolve and read a script
    pub fn read_script(&mut self, target: &str) -> Result<ScriptSource, LoaderError> {
        let path = self.resolve(target)?;
        let bytes = fs::read(&path)?;
        let source = String::from_utf8(bytes)
            .map_err(|e| LoaderError::Encoding(format!("{}: {}", path.display(), e)))?;
        let origin = match self.origins.get(&path) {
            Some(url) => ScriptOrigin::Remote(url.clone()),
            None => ScriptOrigin::Local,
        };
        Ok(ScriptSource {
            path,
            source,
            origin,
        })
    }

    fn locate_local(&self, target: &str) -> Result<PathBuf, LoaderError> {
        let direct = Path::new(target);
        if direct.is_file() {
            return Ok(normalize(direct));
        }

        for dir in &self.config.module_dirs {
            for ext in &self.config.extensions {
                let candidate = dir.join(format!("{}{}", target, ext));
                if candidate.is_file() {
                    return Ok(normalize(&candidate));
                }
            }
        }

        Err(LoaderError::NotFound(target.to_string()))
    }

    fn stage_remote(&mut self, url: Url) -> Result<PathBuf, LoaderError> {
        if !self.config.allow_remote {
            return Err(LoaderError::RemoteDisabled(url.to_string()));
        }
        if let Some(path) = self.by_url.get(&url) {
            return Ok(path.clone());
        }

        if self.fetcher.is_none() {
            self.fetcher = Some(UrlFetcher::new(
                Duration::from_secs(self.config.fetch_timeout_secs),
                self.config.max_fetch_bytes,
            )?);
        }
        let content = match &self.fetcher {
            Some(fetcher) => fetcher.fetch(&url)?,
            None => return Err(LoaderError::NotFound(url.to_string())),
        };

        let mut builder = tempfile::Builder::new();
        builder.prefix("qjs-bind-").suffix(".js");
        let mut file = match &self.config.staging_dir {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                builder.tempfile_in(dir)?
            }
            None => builder.tempfile()?,
        };
        file.write_all(&content)?;
        let (_, path) = file.keep().map_err(|e| e.error)?;

        info!(
            target: "quickjs_bind::loader",
            %url,
            path = %path.display(),
            bytes = content.len(),
            "Staged remote script"
        );
        self.by_url.insert(url.clone(), path.clone());
        self.origins.insert(path.clone(), url);
        Ok(path)
    }
}

impl Drop for ScriptLoader {
    fn drop(&mut self) {
        for path in self.origins.keys() {
            if fs::remove_file(path).is_ok() {
                debug!(target: "quickjs_bind::loader", path = %path.display(), "Removed staged script");
            }
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loader_in(dir: &Path) -> ScriptLoader {
        ScriptLoader::new(LoaderConfig {
            module_dirs: vec![dir.join("node_modules")],
            ..Default::default()
        })
    }

    #[test]
    fn test_remote_detection() {
        assert!(ScriptLoader::is_remote("https://example.com/a.js"));
        assert!(ScriptLoader::is_remote("http://example.com/a.js"));
        assert!(!ScriptLoader::is_remote("./a.js"));
        assert!(!ScriptLoader::is_remote("lodash"));
    }

    #[test]
    fn test_reads_existing_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.js");
        fs::write(&path, "1 + 1").unwrap();

        let mut loader = loader_in(dir.path());
        let script = loader.read_script(path.to_str().unwrap()).unwrap();
        assert_eq!(script.source, "1 + 1");
        assert_eq!(script.origin, ScriptOrigin::Local);
    }

    #[test]
    fn test_searches_module_dirs_with_extensions() {
        let dir = tempfile::tempdir().unwrap();
        let modules = dir.path().join("node_modules");
        fs::create_dir_all(&modules).unwrap();
        fs::write(modules.join("util.mjs"), "export const x = 1;").unwrap();

        let mut loader = loader_in(dir.path());
        let path = loader.resolve("util").unwrap();
        assert!(path.ends_with("util.mjs"));
    }

    #[test]
    fn test_missing_script() {
        let dir = tempfile::tempdir().unwrap();
        let mut loader = loader_in(dir.path());
        assert!(matches!(
            loader.resolve("does-not-exist"),
            Err(LoaderError::NotFound(_))
        ));
    }

    #[test]
    fn test_remote_disabled() {
        let mut loader = ScriptLoader::new(LoaderConfig {
            allow_remote: false,
            ..Default::default()
        });
        assert!(matches!(
            loader.resolve("https://example.com/x.js"),
            Err(LoaderError::RemoteDisabled(_))
        ));
    }

    #[test]
    fn test_join_relative_local() {
        let loader = ScriptLoader::new(LoaderConfig::default());
        let joined = loader.join("/srv/app/main.js", "./lib/util.js");
        assert_eq!(Path::new(&joined), Path::new("/srv/app/./lib/util.js"));
        assert_eq!(loader.join("/srv/app/main.js", "lodash"), "lodash");
    }

    #[test]
    fn test_join_relative_remote() {
        let loader = ScriptLoader::new(LoaderConfig::default());
        assert_eq!(
            loader.join("https://cdn.example.com/pkg/index.js", "./dep.js"),
            "https://cdn.example.com/pkg/dep.js"
        );
    }
}
