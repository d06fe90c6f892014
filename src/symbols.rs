//! Packages, files and the symbols they declare.

use markup5ever_rcdom::Handle;
use serde::Serialize;
use std::collections::BTreeMap;

use crate::cursor::is_identifier;
use crate::error::{CompileError, CompileResult, ErrorKind};
use crate::model::{Component, Site};

/// Address of a file inside the [`SymbolTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileId {
    pub package: usize,
    pub file: usize,
}

/// A reusable markup fragment with named slots.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroDef {
    pub name: String,
    pub slots: Vec<String>,
    /// Detached `a:macro` element; its children are the body.
    #[serde(skip)]
    pub body: Handle,
    /// Macro bodies resolve names from the file that defines them.
    pub origin: FileId,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct File {
    pub name: String,
    /// Alias to package import path.
    pub imports: BTreeMap<String, String>,
    pub components: Vec<Component>,
    pub macros: Vec<MacroDef>,
    pub site: Option<Site>,
    #[serde(skip)]
    pub root: Option<Handle>,
}

impl File {
    pub fn new(name: &str, root: Handle) -> Self {
        Self {
            name: name.to_string(),
            imports: BTreeMap::new(),
            components: Vec::new(),
            macros: Vec::new(),
            site: None,
            root: Some(root),
        }
    }

    pub fn component(&self, name: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.name == name)
    }

    pub fn component_mut(&mut self, name: &str) -> Option<&mut Component> {
        self.components.iter_mut().find(|c| c.name == name)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub name: String,
    pub import_path: String,
    pub files: Vec<File>,
}

/// Outcome of a successful lookup.
#[derive(Debug)]
pub enum Resolution<'a> {
    Component {
        package: &'a str,
        component: &'a Component,
    },
    Macro {
        package: &'a str,
        definition: &'a MacroDef,
    },
    /// The alias points outside the module; nothing can be checked.
    OutsideModule { package: String },
}

// ═══════════════════════════════════════════════════════════════════════════════
// SYMBOL TABLE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolTable {
    module_path: String,
    packages: Vec<Package>,
    #[serde(skip)]
    index: BTreeMap<String, usize>,
}

impl SymbolTable {
    pub fn new(module_path: &str) -> Self {
        Self {
            module_path: module_path.trim_end_matches('/').to_string(),
            packages: Vec::new(),
            index: BTreeMap::new(),
        }
    }

    pub fn module_path(&self) -> &str {
        &self.module_path
    }

    pub fn add_package(&mut self, import_path: &str) -> CompileResult<usize> {
        if self.index.contains_key(import_path) {
            return Err(CompileError::duplicate("package", import_path));
        }
        let name = import_path.rsplit('/').next().unwrap_or(import_path);
        self.packages.push(Package {
            name: name.to_string(),
            import_path: import_path.to_string(),
            files: Vec::new(),
        });
        let id = self.packages.len() - 1;
        self.index.insert(import_path.to_string(), id);
        Ok(id)
    }

    pub fn add_file(&mut self, package: usize, file: File) -> CompileResult<FileId> {
        let pkg = self
            .packages
            .get_mut(package)
            .ok_or_else(|| CompileError::invalid(format!("no package #{}", package)))?;
        if pkg.files.iter().any(|f| f.name == file.name) {
            return Err(CompileError::duplicate("file", file.name));
        }
        pkg.files.push(file);
        Ok(FileId {
            package,
            file: pkg.files.len() - 1,
        })
    }

    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn package_index(&self, import_path: &str) -> Option<usize> {
        self.index.get(import_path).copied()
    }

    pub fn file_ids(&self, package: usize) -> Vec<FileId> {
        let count = self.packages.get(package).map(|p| p.files.len()).unwrap_or(0);
        (0..count).map(|file| FileId { package, file }).collect()
    }

    pub fn file(&self, id: FileId) -> CompileResult<&File> {
        self.packages
            .get(id.package)
            .and_then(|p| p.files.get(id.file))
            .ok_or_else(|| CompileError::invalid(format!("no file {:?}", id)))
    }

    pub fn file_mut(&mut self, id: FileId) -> CompileResult<&mut File> {
        self.packages
            .get_mut(id.package)
            .and_then(|p| p.files.get_mut(id.file))
            .ok_or_else(|| CompileError::invalid(format!("no file {:?}", id)))
    }

    /// Checks `name` against every component and macro of the package.
    fn check_unique(&self, package: usize, what: &'static str, name: &str) -> CompileResult<()> {
        let taken = self.packages.get(package).map_or(false, |p| {
            p.files.iter().any(|f| {
                f.component(name).is_some() || f.macros.iter().any(|m| m.name == name)
            })
        });
        if taken {
            Err(CompileError::duplicate(what, name))
        } else {
            Ok(())
        }
    }

    pub fn declare_component(&mut self, file: FileId, component: Component) -> CompileResult<()> {
        self.check_unique(file.package, "component", &component.name)?;
        self.file_mut(file)?.components.push(component);
        Ok(())
    }

    pub fn declare_macro(&mut self, file: FileId, definition: MacroDef) -> CompileResult<()> {
        self.check_unique(file.package, "macro", &definition.name)?;
        self.file_mut(file)?.macros.push(definition);
        Ok(())
    }

    fn in_module(&self, path: &str) -> bool {
        path == self.module_path
            || path
                .strip_prefix(self.module_path.as_str())
                .map_or(false, |rest| rest.starts_with('/'))
    }

    /// Resolves `Name` or `alias.Name` as seen from the file `from`.
    pub fn resolve_from(&self, from: FileId, id: &str) -> CompileResult<Resolution<'_>> {
        let parts: Vec<&str> = id.split('.').collect();
        if !parts.iter().all(|p| is_identifier(p)) {
            return Err(ErrorKind::InvalidIdentifier(id.to_string()).into());
        }
        match parts.as_slice() {
            [name] => self.lookup(from.package, name),
            [alias, name] => {
                let path = self
                    .file(from)?
                    .imports
                    .get(*alias)
                    .ok_or_else(|| ErrorKind::UnknownAlias(alias.to_string()))?;
                match self.index.get(path) {
                    Some(&package) => self.lookup(package, name),
                    None if self.in_module(path) => {
                        Err(ErrorKind::UnknownPackage(path.clone()).into())
                    }
                    None => Ok(Resolution::OutsideModule {
                        package: path.clone(),
                    }),
                }
            }
            _ => Err(ErrorKind::InvalidIdentifier(id.to_string()).into()),
        }
    }

    fn lookup(&self, package: usize, name: &str) -> CompileResult<Resolution<'_>> {
        let pkg = self
            .packages
            .get(package)
            .ok_or_else(|| CompileError::invalid(format!("no package #{}", package)))?;
        for file in &pkg.files {
            if let Some(component) = file.component(name) {
                return Ok(Resolution::Component {
                    package: &pkg.import_path,
                    component,
                });
            }
            if let Some(definition) = file.macros.iter().find(|m| m.name == name) {
                return Ok(Resolution::Macro {
                    package: &pkg.import_path,
                    definition,
                });
            }
        }
        Err(ErrorKind::UnknownSymbol(name.to_string()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::create_element;

    fn mock_component(name: &str) -> Component {
        Component {
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn mock_table() -> (SymbolTable, FileId, FileId) {
        let mut table = SymbolTable::new("example.com/app");
        let app = table.add_package("example.com/app").unwrap();
        let ui = table.add_package("example.com/app/ui").unwrap();
        let main = table
            .add_file(app, File::new("main.html", create_element("html", &[])))
            .unwrap();
        let widgets = table
            .add_file(ui, File::new("widgets.html", create_element("html", &[])))
            .unwrap();
        table.declare_component(main, mock_component("Page")).unwrap();
        table.declare_component(widgets, mock_component("Button")).unwrap();
        let imports = &mut table.file_mut(main).unwrap().imports;
        imports.insert("ui".to_string(), "example.com/app/ui".to_string());
        imports.insert("missing".to_string(), "example.com/app/missing".to_string());
        imports.insert("ext".to_string(), "example.org/lib".to_string());
        (table, main, widgets)
    }

    #[test]
    fn test_bare_and_qualified_resolution() {
        let (table, main, _) = mock_table();
        match table.resolve_from(main, "Page").unwrap() {
            Resolution::Component { package, component } => {
                assert_eq!(package, "example.com/app");
                assert_eq!(component.name, "Page");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(matches!(
            table.resolve_from(main, "ui.Button").unwrap(),
            Resolution::Component { package: "example.com/app/ui", .. }
        ));
        // Bare names never look into imported packages.
        let err = table.resolve_from(main, "Button").unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnknownSymbol("Button".to_string()));
    }

    #[test]
    fn test_resolution_errors() {
        let (table, main, _) = mock_table();
        assert_eq!(
            table.resolve_from(main, "nope.Button").unwrap_err().kind,
            ErrorKind::UnknownAlias("nope".to_string())
        );
        assert_eq!(
            table.resolve_from(main, "missing.Button").unwrap_err().kind,
            ErrorKind::UnknownPackage("example.com/app/missing".to_string())
        );
        assert_eq!(
            table.resolve_from(main, "a.b.C").unwrap_err().kind,
            ErrorKind::InvalidIdentifier("a.b.C".to_string())
        );
        assert_eq!(
            table.resolve_from(main, "ui.Nothing").unwrap_err().kind,
            ErrorKind::UnknownSymbol("Nothing".to_string())
        );
    }

    #[test]
    fn test_outside_module() {
        let (table, main, _) = mock_table();
        match table.resolve_from(main, "ext.Chart").unwrap() {
            Resolution::OutsideModule { package } => assert_eq!(package, "example.org/lib"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_resolve_from_origin_file() {
        let (table, _, widgets) = mock_table();
        // From the ui package, `Button` is a bare name and `ui` is unknown.
        assert!(table.resolve_from(widgets, "Button").is_ok());
        assert!(table.resolve_from(widgets, "ui.Button").is_err());
    }

    #[test]
    fn test_names_unique_across_package() {
        let (mut table, main, _) = mock_table();
        let second = table
            .add_file(0, File::new("other.html", create_element("html", &[])))
            .unwrap();
        let err = table
            .declare_component(second, mock_component("Page"))
            .unwrap_err();
        assert_eq!(err.to_string(), "duplicate component: Page");

        let definition = MacroDef {
            name: "Page".to_string(),
            slots: Vec::new(),
            body: create_element("a:macro", &[]),
            origin: main,
        };
        assert!(table.declare_macro(main, definition).is_err());
    }
}
