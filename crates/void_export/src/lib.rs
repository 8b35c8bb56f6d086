//! Void Export - Scene-graph export engine
//!
//! Moves a selection of objects (or a whole scene) from a source document
//! into a destination document while keeping its shape:
//! - The collection hierarchy of the selection is rebuilt in the destination
//! - Objects referenced through modifiers come along as dependencies
//! - Names already used in the destination are never touched; incoming
//!   entities get a `.NNN` suffix instead
//!
//! # Example
//!
//! ```ignore
//! use void_export::{ExportCommand, ExportOptions};
//!
//! let options = ExportOptions {
//!     source_file: "assets/props.json".into(),
//!     destination_file: "out/crate.json".into(),
//!     source_object_list: vec!["Crate".into()],
//!     dependencies_in_dedicated_collection: true,
//!     ..Default::default()
//! };
//! let report = ExportCommand::new(options)?.run()?;
//! println!("{}", report);
//! ```

pub mod command;
pub mod dependencies;
pub mod error;
pub mod hierarchy;
pub mod naming;
pub mod options;
pub mod registry;
pub mod rename;
pub mod report;
pub mod selection;

pub use command::{ExportCommand, DEPENDENCIES_COLLECTION_NAME, STAGING_COLLECTION_NAME};
pub use dependencies::{detach_order, DependencyResolver, ObjectDependencies};
pub use error::{ExportError, LookupKind, Result};
pub use hierarchy::{ancestor_chain, CollectionTree, HierarchyWalker, ParentLookup};
pub use naming::{strip_numeric_suffix, NameKey, NameReconciler};
pub use options::{ExportOptions, OverrideMode, SourceKind, TransferMode};
pub use registry::{CollectionRegistry, Entity, EntityKind, EntityRegistry, ObjectRegistry};
pub use rename::{apply_rename_pairs, rename_in_file, rename_object, RenameReport};
pub use report::{DependencyPlacement, ExportReport, ExportStage};
pub use selection::ExportSnapshot;

/// Prelude for common imports
pub mod prelude {
    pub use crate::command::ExportCommand;
    pub use crate::error::{ExportError, Result};
    pub use crate::options::{ExportOptions, OverrideMode, SourceKind, TransferMode};
    pub use crate::report::{ExportReport, ExportStage};
}
