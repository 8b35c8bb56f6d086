//! Void Document - In-memory scene document
//!
//! The document is the host data model that export tooling works against:
//! - Objects with parent pointers, world matrices and modifier stacks
//! - Collections nested as a DAG under one root per scene
//! - Libraries tagging data linked from another document
//! - Images that can be packed into the document
//!
//! Datablocks live in arenas and are addressed by copyable handles
//! (`ObjectId`, `CollectionId`, ...). Names are unique per kind within one
//! library namespace; the host disambiguates new local names with a `.NNN`
//! suffix and never renames existing data as a side effect.
//!
//! # Example
//!
//! ```ignore
//! use void_document::{Document, Object};
//!
//! let mut doc = Document::new();
//! let props = doc.new_collection("Props");
//! let root = doc.scene_root(doc.active_scene())?;
//! doc.link_collection(root, props)?;
//!
//! let crate_id = doc.add_object(Object::new("Crate"));
//! doc.link_object(props, crate_id)?;
//! doc.save("level.json")?;
//! ```

pub mod collection;
pub mod document;
pub mod error;
pub mod file;
pub mod id;
pub mod library;
pub mod link;
pub mod maintenance;
pub mod object;

pub use collection::{Collection, Scene};
pub use document::{Document, SCENE_ROOT_NAME};
pub use error::{DocumentError, Result};
pub use file::{DocumentFile, FileFormat, DOCUMENT_VERSION};
pub use id::{CollectionId, ImageId, LibraryId, ObjectId, SceneId};
pub use library::{Image, Library};
pub use maintenance::{LibraryKeep, PackReport};
pub use object::{BooleanOperation, Modifier, ModifierKind, Object};

/// Prelude for common imports
pub mod prelude {
    pub use crate::collection::{Collection, Scene};
    pub use crate::document::{Document, SCENE_ROOT_NAME};
    pub use crate::error::{DocumentError, Result};
    pub use crate::id::{CollectionId, ImageId, LibraryId, ObjectId, SceneId};
    pub use crate::object::{Modifier, ModifierKind, Object};
}
