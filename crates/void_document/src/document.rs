//! The document: datablock arenas, name namespaces and graph queries

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use glam::{Mat4, Vec3};
use log::debug;

use crate::collection::{Collection, Scene};
use crate::error::{DocumentError, Result};
use crate::id::{Arena, ArenaKey, CollectionId, ImageId, LibraryId, ObjectId, SceneId};
use crate::library::{Image, Library};
use crate::object::Object;

/// Name of every scene's root collection
pub const SCENE_ROOT_NAME: &str = "Scene Collection";

const STARTUP_WORKSPACES: [&str; 3] = ["Layout", "Modeling", "Shading"];

/// Split a trailing `.NNN` (three or more digits) off a name
pub(crate) fn split_numeric_suffix(name: &str) -> (&str, Option<u32>) {
    if let Some((stem, digits)) = name.rsplit_once('.') {
        if digits.len() >= 3 && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(number) = digits.parse() {
                return (stem, Some(number));
            }
        }
    }
    (name, None)
}

/// The name itself when free, otherwise the first free `stem.NNN`
pub(crate) fn next_free_name(name: &str, is_taken: impl Fn(&str) -> bool) -> String {
    if !is_taken(name) {
        return name.to_string();
    }
    let (stem, _) = split_numeric_suffix(name);
    let mut number = 1u32;
    loop {
        let candidate = format!("{stem}.{number:03}");
        if !is_taken(&candidate) {
            return candidate;
        }
        number += 1;
    }
}

pub(crate) fn stale<K: ArenaKey>(key: K) -> DocumentError {
    DocumentError::StaleHandle(key.to_string())
}

/// In-memory scene document
#[derive(Clone, Debug)]
pub struct Document {
    pub(crate) path: Option<PathBuf>,
    pub(crate) objects: Arena<ObjectId, Object>,
    pub(crate) collections: Arena<CollectionId, Collection>,
    pub(crate) scenes: Arena<SceneId, Scene>,
    pub(crate) libraries: Arena<LibraryId, Library>,
    pub(crate) images: Arena<ImageId, Image>,
    pub(crate) workspaces: Vec<String>,
    pub(crate) active_scene: SceneId,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    /// An empty document with a single scene named `Scene`
    pub fn new() -> Self {
        let mut collections = Arena::new();
        let root = collections.insert(Collection::scene_root(None));
        let mut scenes = Arena::new();
        let active_scene = scenes.insert(Scene::new("Scene", None, root));

        Self {
            path: None,
            objects: Arena::new(),
            collections,
            scenes,
            libraries: Arena::new(),
            images: Arena::new(),
            workspaces: Vec::new(),
            active_scene,
        }
    }

    /// The factory startup document
    ///
    /// Workspace layouts plus a `Collection` holding `Cube`, `Camera` and
    /// `Light` under the root of `Scene`.
    pub fn startup() -> Self {
        let mut doc = Self::new();
        doc.workspaces = STARTUP_WORKSPACES.iter().map(|s| s.to_string()).collect();

        let collection = doc.new_collection("Collection");
        let root = doc.scenes.get(doc.active_scene).map(|s| s.root);
        if let Some(root) = root.and_then(|r| doc.collections.get_mut(r)) {
            root.children.push(collection);
        }

        let defaults = [
            ("Cube", Vec3::ZERO),
            ("Camera", Vec3::new(7.36, -6.93, 4.96)),
            ("Light", Vec3::new(4.08, 1.0, 5.9)),
        ];
        for (name, translation) in defaults {
            let object = doc.add_object(
                Object::new(name).with_matrix_world(Mat4::from_translation(translation)),
            );
            if let Some(collection) = doc.collections.get_mut(collection) {
                collection.objects.push(object);
            }
        }
        doc
    }

    /// Path the document was loaded from or last saved to
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn set_path(&mut self, path: impl Into<PathBuf>) {
        self.path = Some(path.into());
    }

    // ------------------------------------------------------------------
    // Workspaces
    // ------------------------------------------------------------------

    pub fn workspaces(&self) -> &[String] {
        &self.workspaces
    }

    pub fn add_workspace(&mut self, name: impl Into<String>) {
        let name = name.into();
        if !self.workspaces.contains(&name) {
            self.workspaces.push(name);
        }
    }

    // ------------------------------------------------------------------
    // Scenes
    // ------------------------------------------------------------------

    pub fn active_scene(&self) -> SceneId {
        self.active_scene
    }

    pub fn set_active_scene(&mut self, scene: SceneId) -> Result<()> {
        if !self.scenes.contains(scene) {
            return Err(stale(scene));
        }
        self.active_scene = scene;
        Ok(())
    }

    pub fn scene(&self, id: SceneId) -> Result<&Scene> {
        self.scenes.get(id).ok_or_else(|| stale(id))
    }

    pub fn scenes(&self) -> impl Iterator<Item = (SceneId, &Scene)> {
        self.scenes.iter()
    }

    pub fn scene_count(&self) -> usize {
        self.scenes.len()
    }

    /// Scene by name, preferring local data over linked data
    pub fn scene_by_name(&self, name: &str) -> Option<SceneId> {
        self.scene_by_name_in(name, None)
            .or_else(|| self.scenes.iter().find(|(_, s)| s.name == name).map(|(id, _)| id))
    }

    pub fn scene_by_name_in(&self, name: &str, library: Option<LibraryId>) -> Option<SceneId> {
        self.scenes
            .iter()
            .find(|(_, s)| s.name == name && s.library == library)
            .map(|(id, _)| id)
    }

    /// Create a local scene with an empty root
    pub fn new_scene(&mut self, name: &str) -> SceneId {
        self.insert_scene(name, None)
    }

    pub(crate) fn insert_scene(&mut self, name: &str, library: Option<LibraryId>) -> SceneId {
        let name = next_free_name(name, |n| self.scene_by_name_in(n, library).is_some());
        let root = self.collections.insert(Collection::scene_root(library));
        let scene = self.scenes.insert(Scene::new(name, library, root));
        debug!("Created scene {}", scene);
        scene
    }

    /// Remove a scene and its root collection
    ///
    /// The last scene cannot be removed. Removing the active scene makes the
    /// first remaining scene active.
    pub fn remove_scene(&mut self, id: SceneId) -> Result<()> {
        let scene = self.scene(id)?;
        if self.scenes.len() == 1 {
            return Err(DocumentError::InvalidOperation(format!(
                "cannot remove '{}', the last scene of the document",
                scene.name
            )));
        }
        let root = scene.root;
        self.scenes.remove(id);
        self.collections.remove(root);
        if self.active_scene == id {
            if let Some((first, _)) = self.scenes.iter().next() {
                self.active_scene = first;
            }
        }
        Ok(())
    }

    pub fn scene_root(&self, scene: SceneId) -> Result<CollectionId> {
        self.scene(scene).map(|s| s.root)
    }

    /// Make `collection` the target of new data in `scene`
    pub fn set_active_collection(&mut self, scene: SceneId, collection: CollectionId) -> Result<()> {
        let root = self.scene_root(scene)?;
        if collection != root && !self.descendants(root).contains(&collection) {
            let name = self.collection(collection)?.name.clone();
            return Err(DocumentError::CollectionNotFound(name));
        }
        if let Some(scene) = self.scenes.get_mut(scene) {
            scene.active_collection = collection;
        }
        Ok(())
    }

    /// Collections reachable from the scene root, root excluded
    pub fn scene_collections(&self, scene: SceneId) -> Result<Vec<CollectionId>> {
        Ok(self.descendants(self.scene_root(scene)?))
    }

    /// Objects linked anywhere in the scene tree, in discovery order
    pub fn scene_objects(&self, scene: SceneId) -> Result<Vec<ObjectId>> {
        let root = self.scene_root(scene)?;
        let mut objects = Vec::new();
        for collection in std::iter::once(root).chain(self.descendants(root)) {
            for object in self.collection(collection)?.objects() {
                if !objects.contains(object) {
                    objects.push(*object);
                }
            }
        }
        Ok(objects)
    }

    // ------------------------------------------------------------------
    // Collections
    // ------------------------------------------------------------------

    pub fn collection(&self, id: CollectionId) -> Result<&Collection> {
        self.collections.get(id).ok_or_else(|| stale(id))
    }

    pub(crate) fn collection_mut(&mut self, id: CollectionId) -> Result<&mut Collection> {
        self.collections.get_mut(id).ok_or_else(|| stale(id))
    }

    /// Named collections; scene roots are skipped
    pub fn collections(&self) -> impl Iterator<Item = (CollectionId, &Collection)> {
        self.collections.iter().filter(|(_, c)| !c.scene_root)
    }

    /// Collection by name, preferring local data over linked data
    pub fn collection_by_name(&self, name: &str) -> Option<CollectionId> {
        self.collection_by_name_in(name, None).or_else(|| {
            self.collections()
                .find(|(_, c)| c.name == name)
                .map(|(id, _)| id)
        })
    }

    pub fn collection_by_name_in(
        &self,
        name: &str,
        library: Option<LibraryId>,
    ) -> Option<CollectionId> {
        self.collections()
            .find(|(_, c)| c.name == name && c.library == library)
            .map(|(id, _)| id)
    }

    /// Create an unlinked local collection, disambiguating the name
    pub fn new_collection(&mut self, name: &str) -> CollectionId {
        self.insert_collection(name, None)
    }

    pub(crate) fn insert_collection(&mut self, name: &str, library: Option<LibraryId>) -> CollectionId {
        let name = next_free_name(name, |n| {
            n == SCENE_ROOT_NAME || self.collection_by_name_in(n, library).is_some()
        });
        let id = self.collections.insert(Collection::new(name, library));
        debug!("Created collection {}", id);
        id
    }

    /// Rename a local collection; returns the name it ends up with
    pub fn rename_collection(&mut self, id: CollectionId, name: &str) -> Result<String> {
        let collection = self.collection(id)?;
        if collection.scene_root || collection.library.is_some() {
            return Err(DocumentError::InvalidOperation(format!(
                "collection '{}' cannot be renamed",
                collection.name
            )));
        }
        if collection.name == name {
            return Ok(collection.name.clone());
        }
        let name = next_free_name(name, |n| {
            n == SCENE_ROOT_NAME
                || self
                    .collection_by_name_in(n, None)
                    .is_some_and(|other| other != id)
        });
        self.collection_mut(id)?.name = name.clone();
        Ok(name)
    }

    /// Remove a collection, unlinking it from every parent
    ///
    /// Member objects and child collections stay in the document.
    pub fn remove_collection(&mut self, id: CollectionId) -> Result<()> {
        if self.collection(id)?.scene_root {
            return Err(DocumentError::InvalidOperation(
                "scene roots are removed with their scene".to_string(),
            ));
        }
        for (_, collection) in self.collections.iter_mut() {
            collection.children.retain(|c| *c != id);
        }
        for (_, scene) in self.scenes.iter_mut() {
            if scene.active_collection == id {
                scene.active_collection = scene.root;
            }
        }
        self.collections.remove(id);
        Ok(())
    }

    /// Link `child` under `parent`. Returns false when already linked.
    pub fn link_collection(&mut self, parent: CollectionId, child: CollectionId) -> Result<bool> {
        let child_data = self.collection(child)?;
        let parent_data = self.collection(parent)?;
        if child_data.scene_root {
            return Err(DocumentError::InvalidOperation(format!(
                "scene root cannot be linked under '{}'",
                parent_data.name
            )));
        }
        if parent_data.has_child(child) {
            return Ok(false);
        }
        if parent == child || self.descendants(child).contains(&parent) {
            return Err(DocumentError::CycleDetected {
                child: child_data.name.clone(),
                parent: parent_data.name.clone(),
            });
        }
        self.collection_mut(parent)?.children.push(child);
        Ok(true)
    }

    /// Unlink `child` from `parent`. Returns false when it was not linked.
    pub fn unlink_collection(&mut self, parent: CollectionId, child: CollectionId) -> Result<bool> {
        self.collection(child)?;
        let parent = self.collection_mut(parent)?;
        let before = parent.children.len();
        parent.children.retain(|c| *c != child);
        Ok(parent.children.len() != before)
    }

    /// Link `object` into `collection`. Returns false when already linked.
    pub fn link_object(&mut self, collection: CollectionId, object: ObjectId) -> Result<bool> {
        if !self.objects.contains(object) {
            return Err(stale(object));
        }
        let collection = self.collection_mut(collection)?;
        if collection.objects.contains(&object) {
            return Ok(false);
        }
        collection.objects.push(object);
        Ok(true)
    }

    /// Unlink `object` from `collection`. Returns false when it was not linked.
    pub fn unlink_object(&mut self, collection: CollectionId, object: ObjectId) -> Result<bool> {
        let collection = self.collection_mut(collection)?;
        let before = collection.objects.len();
        collection.objects.retain(|o| *o != object);
        Ok(collection.objects.len() != before)
    }

    /// Collections (scene roots included) that list `child` as a child
    pub fn collection_parents(&self, child: CollectionId) -> Vec<CollectionId> {
        self.collections
            .iter()
            .filter(|(_, c)| c.has_child(child))
            .map(|(id, _)| id)
            .collect()
    }

    /// Pre-order descendants of `root`, each visited once, root excluded
    pub fn descendants(&self, root: CollectionId) -> Vec<CollectionId> {
        let mut visited = HashSet::new();
        let mut order = Vec::new();
        let mut stack = vec![root];
        visited.insert(root);

        while let Some(current) = stack.pop() {
            if current != root {
                order.push(current);
            }
            if let Some(collection) = self.collections.get(current) {
                for child in collection.children.iter().rev() {
                    if visited.insert(*child) {
                        stack.push(*child);
                    }
                }
            }
        }
        order
    }

    // ------------------------------------------------------------------
    // Objects
    // ------------------------------------------------------------------

    pub fn object(&self, id: ObjectId) -> Result<&Object> {
        self.objects.get(id).ok_or_else(|| stale(id))
    }

    pub fn object_mut(&mut self, id: ObjectId) -> Result<&mut Object> {
        self.objects.get_mut(id).ok_or_else(|| stale(id))
    }

    pub fn contains_object(&self, id: ObjectId) -> bool {
        self.objects.contains(id)
    }

    pub fn objects(&self) -> impl Iterator<Item = (ObjectId, &Object)> {
        self.objects.iter()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Object by name, preferring local data over linked data
    pub fn object_by_name(&self, name: &str) -> Option<ObjectId> {
        self.object_by_name_in(name, None).or_else(|| {
            self.objects
                .iter()
                .find(|(_, o)| o.name == name)
                .map(|(id, _)| id)
        })
    }

    pub fn object_by_name_in(&self, name: &str, library: Option<LibraryId>) -> Option<ObjectId> {
        self.objects
            .iter()
            .find(|(_, o)| o.name == name && o.library == library)
            .map(|(id, _)| id)
    }

    /// Add an object, disambiguating its name within its namespace
    pub fn add_object(&mut self, mut object: Object) -> ObjectId {
        let library = object.library;
        let name = next_free_name(&object.name, |n| self.object_by_name_in(n, library).is_some());
        if name != object.name {
            debug!("Object name \"{}\" is taken, using \"{}\"", object.name, name);
            object.name = name;
        }
        self.objects.insert(object)
    }

    /// Rename a local object; returns the name it ends up with
    pub fn rename_object(&mut self, id: ObjectId, name: &str) -> Result<String> {
        let object = self.object(id)?;
        if object.library.is_some() {
            return Err(DocumentError::InvalidOperation(format!(
                "linked object '{}' cannot be renamed",
                object.name
            )));
        }
        if object.name == name {
            return Ok(object.name.clone());
        }
        let name = next_free_name(name, |n| {
            self.object_by_name_in(n, None)
                .is_some_and(|other| other != id)
        });
        self.object_mut(id)?.name = name.clone();
        Ok(name)
    }

    /// Remove an object from the document
    ///
    /// It is unlinked from every collection, and parent or modifier pointers
    /// targeting it are cleared.
    pub fn remove_object(&mut self, id: ObjectId) -> Result<Object> {
        let removed = self.objects.remove(id).ok_or_else(|| stale(id))?;
        for (_, collection) in self.collections.iter_mut() {
            collection.objects.retain(|o| *o != id);
        }
        for (_, object) in self.objects.iter_mut() {
            object.clear_references_to(id);
        }
        Ok(removed)
    }

    /// Collections (scene roots included) that contain `object`
    pub fn users_collection(&self, object: ObjectId) -> Vec<CollectionId> {
        self.collections
            .iter()
            .filter(|(_, c)| c.has_object(object))
            .map(|(id, _)| id)
            .collect()
    }

    /// Objects whose parent pointer is `parent`
    pub fn children_of(&self, parent: ObjectId) -> Vec<ObjectId> {
        self.objects
            .iter()
            .filter(|(_, o)| o.parent == Some(parent))
            .map(|(id, _)| id)
            .collect()
    }

    /// Set or clear the parent of `child`
    ///
    /// With `keep_transform` the child keeps its world matrix and the parent
    /// inverse becomes the inverse of the parent's world matrix. Without it
    /// the child's previous world matrix is applied relative to the parent.
    pub fn set_parent(
        &mut self,
        child: ObjectId,
        parent: Option<ObjectId>,
        keep_transform: bool,
    ) -> Result<()> {
        let child_name = self.object(child)?.name.clone();

        let Some(parent) = parent else {
            let object = self.object_mut(child)?;
            object.parent = None;
            object.matrix_parent_inverse = Mat4::IDENTITY;
            return Ok(());
        };

        let parent_data = self.object(parent)?;
        let parent_world = parent_data.matrix_world;

        // Walk up from the new parent; reaching the child means a cycle
        let mut visited = HashSet::new();
        let mut current = Some(parent);
        while let Some(id) = current {
            if id == child {
                return Err(DocumentError::CycleDetected {
                    child: child_name,
                    parent: parent_data.name.clone(),
                });
            }
            if !visited.insert(id) {
                break;
            }
            current = self.objects.get(id).and_then(|o| o.parent);
        }

        let object = self.object_mut(child)?;
        object.parent = Some(parent);
        if keep_transform {
            object.matrix_parent_inverse = parent_world.inverse();
        } else {
            object.matrix_parent_inverse = Mat4::IDENTITY;
            object.matrix_world = parent_world * object.matrix_world;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Libraries and images
    // ------------------------------------------------------------------

    pub fn library(&self, id: LibraryId) -> Result<&Library> {
        self.libraries.get(id).ok_or_else(|| stale(id))
    }

    pub fn libraries(&self) -> impl Iterator<Item = (LibraryId, &Library)> {
        self.libraries.iter()
    }

    pub fn library_by_path(&self, path: &Path) -> Option<LibraryId> {
        self.libraries
            .iter()
            .find(|(_, l)| l.path == path)
            .map(|(id, _)| id)
    }

    /// The library for `path`, registering it on first use
    pub fn ensure_library(&mut self, path: &Path) -> LibraryId {
        match self.library_by_path(path) {
            Some(id) => id,
            None => {
                let id = self.libraries.insert(Library {
                    path: path.to_path_buf(),
                });
                debug!("Registered library {} ({})", id, path.display());
                id
            }
        }
    }

    pub fn image(&self, id: ImageId) -> Result<&Image> {
        self.images.get(id).ok_or_else(|| stale(id))
    }

    pub fn image_mut(&mut self, id: ImageId) -> Result<&mut Image> {
        self.images.get_mut(id).ok_or_else(|| stale(id))
    }

    pub fn images(&self) -> impl Iterator<Item = (ImageId, &Image)> {
        self.images.iter()
    }

    pub fn image_by_name_in(&self, name: &str, library: Option<LibraryId>) -> Option<ImageId> {
        self.images
            .iter()
            .find(|(_, i)| i.name == name && i.library == library)
            .map(|(id, _)| id)
    }

    /// Add an image, disambiguating its name within its namespace
    pub fn add_image(&mut self, mut image: Image) -> ImageId {
        let library = image.library;
        image.name = next_free_name(&image.name, |n| self.image_by_name_in(n, library).is_some());
        self.images.insert(image)
    }
}
