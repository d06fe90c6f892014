//! # Weft Compiler
//!
//! Front end for annotated markup components. A module is a tree of
//! packages; each package holds `.html` files declaring components, macros
//! and at most one site per file with the `a:` vocabulary:
//!
//! ```html
//! <a:component name="Counter" params="start int">
//!   <a:handlers>bump(by int)</a:handlers>
//!   <button a:capture="click:bump(by=data(step))" data-step="1">
//!     <a:text expr="c.count">0</a:text>
//!   </button>
//! </a:component>
//! ```
//!
//! ## Pipeline
//!
//! 1. **Parse**: every file becomes an rcdom tree ([`dom`]).
//! 2. **Declare**: imports, component signatures and macros enter the
//!    [`SymbolTable`] ([`declare`]).
//! 3. **Order**: packages are sorted so imports come first ([`packages`]).
//! 4. **Expand**: `a:include` is replaced by macro bodies ([`macros`]).
//! 5. **Build**: each component and site subtree becomes a [`Unit`] of
//!    blocks, control blocks, embeds, variables and captures ([`builder`]).
//!
//! Host-language expressions inside attribute values are delimited and
//! forwarded verbatim, never evaluated.
//!
//! ## Path invariant
//!
//! Every recorded position is a child-index path relative to its unit or
//! control block. Embeds are removed from the tree and control blocks keep
//! their element, so both lists are stored back-to-front. Replaying
//! [`Block::insertions`], which interleaves the two, never shifts a position
//! still to be processed.

#[cfg(feature = "napi")]
use napi_derive::napi;

pub mod attributes;
pub mod bindings;
pub mod builder;
pub mod compile;
pub mod cursor;
pub mod declarations;
pub mod declare;
pub mod directive;
pub mod discovery;
pub mod dom;
pub mod error;
pub mod forms;
pub mod macros;
pub mod model;
pub mod packages;
pub mod symbols;
pub mod walker;


pub use builder::{build_component, build_file, build_site, BuildContext, FileUnits};
pub use compile::{
    compile_sources, Compilation, CompileOptions, CompileOutput, CompileRequest, SourceFile,
    SourcePackage,
};
#[cfg(feature = "napi")]
pub use compile::compile_sources_native;
pub use discovery::{compile_dir, discover, BaseDir, DiscoveryError};
pub use error::{CompileError, CompileResult, ErrorFamily, ErrorKind, ErrorReport};
pub use model::*;
pub use symbols::{FileId, Resolution, SymbolTable};
pub use walker::{NodeHandler, Step, StepResult, Walker};

#[cfg(feature = "napi")]
#[napi]
pub fn compile_bridge() -> String {
    "Weft Native Bridge Connected".to_string()
}
