//! Compile orchestrator.
//!
//! Parses every file, registers declarations, orders packages by their
//! imports and then expands macros and builds units file by file.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, warn};

use crate::builder::{build_file, BuildContext};
use crate::declare::declare_file;
use crate::dom::parse_fragment_root;
use crate::error::{CompileError, CompileResult, ErrorReport};
use crate::macros::expand_file;
use crate::model::{Component, Site};
use crate::packages::dependency_order;
use crate::symbols::{File, FileId, SymbolTable};

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS AND INPUT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompileOptions {
    /// Prefix of the directive vocabulary (`a` for `a:component`).
    pub namespace: String,
    /// Record a failing file and keep compiling the others.
    pub continue_on_error: bool,
    /// Log embeds of components outside the module at warning level.
    pub warn_unchecked_embeds: bool,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            namespace: "a".to_string(),
            continue_on_error: false,
            warn_unchecked_embeds: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFile {
    pub name: String,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourcePackage {
    pub import_path: String,
    pub files: Vec<SourceFile>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// OUTPUT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileOutput {
    pub name: String,
    pub imports: BTreeMap<String, String>,
    pub components: Vec<Component>,
    pub site: Option<Site>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOutput {
    pub name: String,
    pub import_path: String,
    pub files: Vec<FileOutput>,
}

/// Packages in dependency order plus the errors of skipped files.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOutput {
    pub packages: Vec<PackageOutput>,
    pub errors: Vec<ErrorReport>,
}

/// Result of a run: the filled symbol table and the processing order.
#[derive(Debug)]
pub struct Compilation {
    pub table: SymbolTable,
    /// Package indices of `table`, dependencies first.
    pub order: Vec<usize>,
    pub errors: Vec<ErrorReport>,
}

impl Compilation {
    pub fn output(&self) -> CompileOutput {
        let packages = self
            .order
            .iter()
            .filter_map(|&index| self.table.packages().get(index))
            .map(|package| PackageOutput {
                name: package.name.clone(),
                import_path: package.import_path.clone(),
                files: package
                    .files
                    .iter()
                    .map(|file| FileOutput {
                        name: file.name.clone(),
                        imports: file.imports.clone(),
                        components: file.components.clone(),
                        site: file.site.clone(),
                    })
                    .collect(),
            })
            .collect();
        CompileOutput {
            packages,
            errors: self.errors.clone(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PASSES
// ═══════════════════════════════════════════════════════════════════════════════

fn file_label(table: &SymbolTable, id: FileId) -> String {
    let package = table
        .packages()
        .get(id.package)
        .map(|p| p.import_path.as_str())
        .unwrap_or_default();
    let name = table.file(id).map(|f| f.name.as_str()).unwrap_or_default();
    format!("{}/{}", package, name)
}

/// Records a failed file, or aborts the run without `continue_on_error`.
fn skip_file(
    options: &CompileOptions,
    errors: &mut Vec<ErrorReport>,
    label: &str,
    error: CompileError,
) -> CompileResult<()> {
    if !options.continue_on_error {
        return Err(error);
    }
    warn!(file = %label, %error, "skipping file");
    errors.push(ErrorReport::from_error(label, &error));
    Ok(())
}

fn compile_file(options: &CompileOptions, table: &mut SymbolTable, id: FileId) -> CompileResult<()> {
    expand_file(table, id, &options.namespace)?;
    let units = {
        let ctx = BuildContext {
            table: &*table,
            file: id,
            namespace: &options.namespace,
            warn_unchecked_embeds: options.warn_unchecked_embeds,
        };
        build_file(&ctx)?
    };
    let file = table.file_mut(id)?;
    file.components = units.components;
    file.site = units.site;
    Ok(())
}

/// Compiles a module whose root package lives at `import_path`.
///
/// Import cycles abort the run. A file that fails to parse, declare or
/// build aborts it too unless `continue_on_error` is set, in which case the
/// error is recorded:
///
/// - an unparsable file is left out,
/// - a file failing its declarations loses its tree and imports and is not
///   built, keeping whatever it declared before the failure,
/// - a file failing its build keeps only its declarations.
pub fn compile_sources(
    options: &CompileOptions,
    import_path: &str,
    sources: &[SourcePackage],
) -> CompileResult<Compilation> {
    let mut table = SymbolTable::new(import_path);
    let mut errors = Vec::new();
    for package in sources {
        let index = table.add_package(&package.import_path)?;
        for source in &package.files {
            match parse_fragment_root(&source.source) {
                Ok(root) => {
                    table.add_file(index, File::new(&source.name, root))?;
                }
                Err(error) => {
                    let label = format!("{}/{}", package.import_path, source.name);
                    skip_file(options, &mut errors, &label, error.within(&source.name))?;
                }
            }
        }
    }
    debug!(packages = sources.len(), "parsed sources");

    let mut undeclared = HashSet::new();
    for package in 0..table.packages().len() {
        for id in table.file_ids(package) {
            let name = table.file(id)?.name.clone();
            if let Err(error) = declare_file(&mut table, id, &options.namespace) {
                let label = file_label(&table, id);
                skip_file(options, &mut errors, &label, error.within(name))?;
                let file = table.file_mut(id)?;
                file.root = None;
                file.imports.clear();
                undeclared.insert(id);
            }
        }
    }
    let order = dependency_order(&table)?;
    debug!(?order, "declarations registered");

    for &package in &order {
        for id in table.file_ids(package) {
            if undeclared.contains(&id) {
                continue;
            }
            let name = table.file(id)?.name.clone();
            if let Err(error) = compile_file(options, &mut table, id) {
                let label = file_label(&table, id);
                skip_file(options, &mut errors, &label, error.within(name))?;
            }
        }
    }
    debug!(failed = errors.len(), "compilation finished");

    Ok(Compilation {
        table,
        order,
        errors,
    })
}

// ═══════════════════════════════════════════════════════════════════════════════
// NAPI EXPORTS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileRequest {
    #[serde(default)]
    pub options: CompileOptions,
    pub import_path: String,
    pub packages: Vec<SourcePackage>,
}

/// Runs a JSON [`CompileRequest`] and returns the JSON [`CompileOutput`].
#[cfg(feature = "napi")]
#[napi]
pub fn compile_sources_native(request: serde_json::Value) -> napi::Result<serde_json::Value> {
    let request: CompileRequest =
        serde_json::from_value(request).map_err(|e| napi::Error::from_reason(e.to_string()))?;
    let compilation = compile_sources(&request.options, &request.import_path, &request.packages)
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(compilation.output()).map_err(|e| napi::Error::from_reason(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_defaults_from_json() {
        let options: CompileOptions = serde_json::from_str(r#"{"continueOnError": true}"#).unwrap();
        assert_eq!(options.namespace, "a");
        assert!(options.continue_on_error);
        assert!(!options.warn_unchecked_embeds);
    }

    #[test]
    fn test_request_without_options() {
        let request: CompileRequest = serde_json::from_value(serde_json::json!({
            "importPath": "example.com/app",
            "packages": [{"importPath": "example.com/app", "files": []}]
        }))
        .unwrap();
        assert_eq!(request.options, CompileOptions::default());
        assert_eq!(request.packages[0].import_path, "example.com/app");
    }
}
