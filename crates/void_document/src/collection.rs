//! Collections and scenes

use crate::document::SCENE_ROOT_NAME;
use crate::id::{CollectionId, LibraryId, ObjectId};

/// A named group of objects and child collections
///
/// A collection can be linked under several parents. Scene roots are
/// collections too, but they sit outside the named collection namespace.
#[derive(Clone, Debug)]
pub struct Collection {
    pub(crate) name: String,
    pub(crate) library: Option<LibraryId>,
    pub(crate) children: Vec<CollectionId>,
    pub(crate) objects: Vec<ObjectId>,
    pub(crate) scene_root: bool,
}

impl Collection {
    pub(crate) fn new(name: impl Into<String>, library: Option<LibraryId>) -> Self {
        Self {
            name: name.into(),
            library,
            children: Vec::new(),
            objects: Vec::new(),
            scene_root: false,
        }
    }

    pub(crate) fn scene_root(library: Option<LibraryId>) -> Self {
        Self {
            scene_root: true,
            ..Self::new(SCENE_ROOT_NAME, library)
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn library(&self) -> Option<LibraryId> {
        self.library
    }

    pub fn is_linked(&self) -> bool {
        self.library.is_some()
    }

    pub fn is_scene_root(&self) -> bool {
        self.scene_root
    }

    /// Child collections in link order
    pub fn children(&self) -> &[CollectionId] {
        &self.children
    }

    /// Member objects in link order
    pub fn objects(&self) -> &[ObjectId] {
        &self.objects
    }

    pub fn has_child(&self, child: CollectionId) -> bool {
        self.children.contains(&child)
    }

    pub fn has_object(&self, object: ObjectId) -> bool {
        self.objects.contains(&object)
    }
}

/// A scene: a root collection plus the collection new data lands in
#[derive(Clone, Debug)]
pub struct Scene {
    pub(crate) name: String,
    pub(crate) library: Option<LibraryId>,
    pub(crate) root: CollectionId,
    pub(crate) active_collection: CollectionId,
}

impl Scene {
    pub(crate) fn new(name: impl Into<String>, library: Option<LibraryId>, root: CollectionId) -> Self {
        Self {
            name: name.into(),
            library,
            root,
            active_collection: root,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn library(&self) -> Option<LibraryId> {
        self.library
    }

    pub fn is_linked(&self) -> bool {
        self.library.is_some()
    }

    pub fn root(&self) -> CollectionId {
        self.root
    }

    pub fn active_collection(&self) -> CollectionId {
        self.active_collection
    }
}
