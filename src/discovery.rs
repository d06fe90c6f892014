//! Discovery Module
//!
//! Scans a module directory for `.html` files and groups them into packages,
//! one per directory.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::compile::{compile_sources, Compilation, CompileOptions, SourceFile, SourcePackage};
use crate::error::CompileError;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("failed to scan {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Compile(#[from] CompileError),
}

// ═══════════════════════════════════════════════════════════════════════════════
// METADATA TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredPackage {
    pub import_path: String,
    pub dir: PathBuf,
    /// Sorted by file name.
    pub files: Vec<PathBuf>,
}

/// A module root and the packages below it, sorted by import path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BaseDir {
    pub import_path: String,
    pub packages: Vec<DiscoveredPackage>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

fn package_path(import_path: &str, root: &Path, dir: &Path) -> String {
    let relative = dir.strip_prefix(root).unwrap_or(dir);
    let segments: Vec<String> = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect();
    if segments.is_empty() {
        import_path.to_string()
    } else {
        format!("{}/{}", import_path.trim_end_matches('/'), segments.join("/"))
    }
}

/// Finds every `.html` file below `root`. Directories without one are not
/// packages.
pub fn discover(root: &Path, import_path: &str) -> Result<BaseDir, DiscoveryError> {
    let mut packages: BTreeMap<String, DiscoveredPackage> = BTreeMap::new();

    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            path: root.display().to_string(),
            source,
        })?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |ext| ext != "html") {
            continue;
        }
        let dir = path.parent().unwrap_or(root);
        let package = package_path(import_path, root, dir);
        packages
            .entry(package.clone())
            .or_insert_with(|| DiscoveredPackage {
                import_path: package,
                dir: dir.to_path_buf(),
                files: Vec::new(),
            })
            .files
            .push(path.to_path_buf());
    }
    debug!(root = %root.display(), packages = packages.len(), "discovered packages");

    Ok(BaseDir {
        import_path: import_path.to_string(),
        packages: packages.into_values().collect(),
    })
}

/// Reads the discovered files into compiler input.
pub fn load_sources(base: &BaseDir) -> Result<Vec<SourcePackage>, DiscoveryError> {
    base.packages
        .iter()
        .map(|package| {
            let files = package
                .files
                .iter()
                .map(|path| {
                    let source = fs::read_to_string(path).map_err(|source| DiscoveryError::Read {
                        path: path.display().to_string(),
                        source,
                    })?;
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().to_string())
                        .unwrap_or_default();
                    Ok(SourceFile { name, source })
                })
                .collect::<Result<Vec<_>, DiscoveryError>>()?;
            Ok(SourcePackage {
                import_path: package.import_path.clone(),
                files,
            })
        })
        .collect()
}

/// Discovers, reads and compiles the module rooted at `root`.
pub fn compile_dir(
    options: &CompileOptions,
    root: &Path,
    import_path: &str,
) -> Result<Compilation, DiscoveryError> {
    let base = discover(root, import_path)?;
    let sources = load_sources(&base)?;
    Ok(compile_sources(options, import_path, &sources)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockDir(PathBuf);

    impl MockDir {
        fn new(label: &str, files: &[(&str, &str)]) -> Self {
            let root = std::env::temp_dir().join(format!(
                "weft-discovery-{}-{}",
                label,
                std::process::id()
            ));
            let _ = fs::remove_dir_all(&root);
            for (path, content) in files {
                let path = root.join(path);
                fs::create_dir_all(path.parent().unwrap()).unwrap();
                fs::write(path, content).unwrap();
            }
            MockDir(root)
        }
    }

    impl Drop for MockDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn test_packages_per_directory() {
        let dir = MockDir::new(
            "layout",
            &[
                ("main.html", ""),
                ("ui/b.html", ""),
                ("ui/a.html", ""),
                ("ui/notes.txt", ""),
                ("assets/logo.svg", ""),
            ],
        );
        let base = discover(&dir.0, "example.com/app").unwrap();
        let paths: Vec<_> = base.packages.iter().map(|p| p.import_path.as_str()).collect();
        assert_eq!(paths, vec!["example.com/app", "example.com/app/ui"]);
        let names: Vec<_> = base.packages[1]
            .files
            .iter()
            .map(|f| f.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["a.html", "b.html"]);
    }

    #[test]
    fn test_compile_dir() {
        let dir = MockDir::new(
            "compile",
            &[
                (
                    "main.html",
                    r#"<a:import>"example.com/app/ui"</a:import>
                    <a:component name="Page"><a:embed name="btn" type="ui.Button" args='"ok"'/></a:component>"#,
                ),
                (
                    "ui/button.html",
                    r#"<a:component name="Button" params="label string"><button></button></a:component>"#,
                ),
            ],
        );
        let compilation = compile_dir(&CompileOptions::default(), &dir.0, "example.com/app").unwrap();
        let output = compilation.output();
        assert_eq!(output.packages[0].import_path, "example.com/app/ui");
        let page = &output.packages[1].files[0].components[0];
        assert_eq!(page.embeds()[0].target.package.as_deref(), Some("example.com/app/ui"));
    }

    #[test]
    fn test_missing_root() {
        let missing = std::env::temp_dir().join("weft-discovery-does-not-exist");
        assert!(matches!(
            discover(&missing, "example.com/app"),
            Err(DiscoveryError::Walk { .. })
        ));
    }
}
