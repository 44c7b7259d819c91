//! Test discovery.
//!
//! Rust has no class loader, so discovery is registry-backed: each test
//! file's class name (`namespace` plus the path segments below the root,
//! joined by the separator) is looked up among registered factories. Files
//! without a registered factory are skipped. Each directory becomes a nested
//! suite holding what was found below it.

use std::collections::BTreeMap;
use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};
use walkdir::WalkDir;

use crate::config::RunConfig;
use crate::runnable::Runnable;
use crate::suite::Suite;
use crate::unit::{TestCase, TestUnit};

/// Default separator between class name segments.
pub const DEFAULT_SEPARATOR: &str = "::";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum FinderError {
    /// The discovery root does not exist or is not a directory.
    #[error("test root not found: {}", path.display())]
    RootNotFound { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type FinderResult<T> = Result<T, FinderError>;

// ============================================================================
// Finder
// ============================================================================

type UnitFactory = Box<dyn Fn(&str) -> Box<dyn Runnable>>;

/// Discovers registered test units under a root directory.
pub struct Finder {
    root: PathBuf,
    namespace: String,
    extension: String,
    separator: String,
    factories: BTreeMap<String, UnitFactory>,
}

impl fmt::Debug for Finder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Finder")
            .field("root", &self.root)
            .field("namespace", &self.namespace)
            .field("extension", &self.extension)
            .field("registered", &self.factories.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Finder {
    pub fn new(root: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Finder {
            root: root.into(),
            namespace: namespace.into(),
            extension: "rs".to_string(),
            separator: DEFAULT_SEPARATOR.to_string(),
            factories: BTreeMap::new(),
        }
    }

    /// Only files with this extension are considered. A leading dot is
    /// ignored.
    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    /// Take the test file extension from a resolved run configuration.
    pub fn with_config(self, config: &RunConfig) -> Self {
        self.with_extension(config.test_extension.value.as_str())
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = separator.into();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Register a factory for `class_name`. The factory receives the
    /// package the unit was found in.
    pub fn register<F>(&mut self, class_name: impl Into<String>, factory: F) -> &mut Self
    where
        F: Fn(&str) -> Box<dyn Runnable> + 'static,
    {
        self.factories.insert(class_name.into(), Box::new(factory));
        self
    }

    /// Register a default-constructed [`TestUnit`] for `class_name`.
    pub fn register_case<T: TestCase + Default>(&mut self, class_name: impl Into<String>) -> &mut Self {
        self.register(class_name, |package| {
            Box::new(TestUnit::new(T::default()).with_package(package))
        })
    }

    pub fn is_registered(&self, class_name: &str) -> bool {
        self.factories.contains_key(class_name)
    }

    /// Class name for a test file under the root, or `None` when the path
    /// is outside the root or has another extension.
    pub fn class_name_for(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        if rel.extension()?.to_str()? != self.extension {
            return None;
        }
        let stem = rel.with_extension("");
        let segments = stem
            .components()
            .map(|c| c.as_os_str().to_str())
            .collect::<Option<Vec<_>>>()?;
        if segments.is_empty() {
            return None;
        }
        Some(self.qualify(&segments.join(&self.separator)))
    }

    fn qualify(&self, rest: &str) -> String {
        match (self.namespace.is_empty(), rest.is_empty()) {
            (true, _) => rest.to_string(),
            (false, true) => self.namespace.clone(),
            (false, false) => format!("{}{}{}", self.namespace, self.separator, rest),
        }
    }

    /// Walk the root and build the suite of registered units found there.
    pub fn find(&self) -> FinderResult<Suite> {
        if !self.root.is_dir() {
            return Err(FinderError::RootNotFound {
                path: self.root.clone(),
            });
        }
        let name = if self.namespace.is_empty() {
            self.root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            self.namespace.clone()
        };
        let suite = self.find_in(&self.root, name)?;
        debug!(root = %self.root.display(), tests = suite.count(), "discovery complete");
        Ok(suite)
    }

    fn find_in(&self, dir: &Path, name: String) -> FinderResult<Suite> {
        let package = self.package_for(dir);
        let mut suite = Suite::new(name);
        if !package.is_empty() {
            suite = suite.with_package(package.clone());
        }

        let entries = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(false)
            .sort_by_file_name();
        for entry in entries {
            let entry = entry.map_err(io::Error::from)?;
            let path = entry.path();

            if entry.file_type().is_dir() {
                let child_name = self.package_for(path);
                let child = self.find_in(path, child_name)?;
                if !child.is_empty() {
                    suite.add_test(child);
                }
                continue;
            }

            let Some(class_name) = self.class_name_for(path) else {
                continue;
            };
            match self.factories.get(&class_name) {
                Some(factory) => {
                    trace!(class = %class_name, "unit discovered");
                    suite.add_boxed(factory(&package));
                }
                None => trace!(class = %class_name, "no unit registered, skipping"),
            }
        }
        Ok(suite)
    }

    /// Namespace-qualified package for a directory under the root.
    fn package_for(&self, dir: &Path) -> String {
        let rel = dir
            .strip_prefix(&self.root)
            .map(|rel| {
                rel.components()
                    .map(|c| c.as_os_str().to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join(&self.separator)
            })
            .unwrap_or_default();
        self.qualify(&rel)
    }
}
