//! Package dependency ordering.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::error::{CompileResult, ErrorKind};
use crate::symbols::SymbolTable;

/// Import path to the import paths it depends on.
pub type DependencyGraph = BTreeMap<String, BTreeSet<String>>;

struct Sorter<'a> {
    graph: &'a DependencyGraph,
    done: HashSet<&'a str>,
    stack: Vec<&'a str>,
    order: Vec<String>,
}

impl<'a> Sorter<'a> {
    fn visit(&mut self, package: &'a str) -> CompileResult<()> {
        if self.done.contains(package) {
            return Ok(());
        }
        if let Some(start) = self.stack.iter().position(|p| *p == package) {
            let mut cycle: Vec<String> = self.stack[start..].iter().map(|p| p.to_string()).collect();
            cycle.push(package.to_string());
            return Err(ErrorKind::CircularDependency(cycle).into());
        }
        let Some(imports) = self.graph.get(package) else {
            // Outside the known universe.
            return Ok(());
        };
        self.stack.push(package);
        for import in imports {
            self.visit(import)?;
        }
        self.stack.pop();
        self.done.insert(package);
        self.order.push(package.to_string());
        Ok(())
    }
}

/// Orders packages so that each one follows everything it imports.
///
/// Packages are visited in import-path order, so the result is
/// deterministic. Imports of unknown packages are ignored.
pub fn sort_packages(graph: &DependencyGraph) -> CompileResult<Vec<String>> {
    let mut sorter = Sorter {
        graph,
        done: HashSet::new(),
        stack: Vec::new(),
        order: Vec::new(),
    };
    for package in graph.keys() {
        sorter.visit(package)?;
    }
    Ok(sorter.order)
}

/// Collects the import edges of every file, per package.
pub fn dependency_graph(table: &SymbolTable) -> DependencyGraph {
    table
        .packages()
        .iter()
        .map(|package| {
            let imports = package
                .files
                .iter()
                .flat_map(|f| f.imports.values().cloned())
                .collect();
            (package.import_path.clone(), imports)
        })
        .collect()
}

/// Package indices of `table` in dependency order.
pub fn dependency_order(table: &SymbolTable) -> CompileResult<Vec<usize>> {
    let order = sort_packages(&dependency_graph(table))?;
    Ok(order
        .iter()
        .filter_map(|path| table.package_index(path))
        .collect())
}
