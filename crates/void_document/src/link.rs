//! Bringing data in from a source document
//!
//! Linking keeps the source names and tags the data with a library for the
//! source path; linking the same datablock twice reuses the first copy.
//! Appending creates local copies whose names the host disambiguates.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use log::{debug, warn};

use crate::document::Document;
use crate::error::{DocumentError, Result};
use crate::id::{CollectionId, ImageId, LibraryId, ObjectId, SceneId};
use crate::object::Modifier;

impl Document {
    /// Link (or append) the named local objects of `source`
    ///
    /// Parent and modifier pointers are preserved among the brought-in set
    /// and toward data already linked from the same library; other pointers
    /// are cleared. Referenced images come along. The returned objects are
    /// not linked into any collection.
    pub fn link_objects(
        &mut self,
        source: &Document,
        source_path: &Path,
        names: &[String],
        link: bool,
    ) -> Result<Vec<ObjectId>> {
        self.import_objects(source, source_path, names, link, &HashSet::new())
    }

    /// Link the named local objects of `source` without reusing `reserved`
    ///
    /// A reserved object already linked from the same library gets a fresh
    /// linked copy next to it, and so do the images it uses. Detaching the
    /// result then leaves the reserved data linked.
    pub fn link_objects_fresh(
        &mut self,
        source: &Document,
        source_path: &Path,
        names: &[String],
        reserved: &HashSet<ObjectId>,
    ) -> Result<Vec<ObjectId>> {
        self.import_objects(source, source_path, names, true, reserved)
    }

    fn import_objects(
        &mut self,
        source: &Document,
        source_path: &Path,
        names: &[String],
        link: bool,
        reserved: &HashSet<ObjectId>,
    ) -> Result<Vec<ObjectId>> {
        let mut requested = Vec::with_capacity(names.len());
        for name in names {
            let id = source
                .object_by_name_in(name, None)
                .ok_or_else(|| DocumentError::ObjectNotFound(name.clone()))?;
            if !requested.contains(&id) {
                requested.push(id);
            }
        }

        let library = link.then(|| self.ensure_library(source_path));
        let mut importer = Importer::new(self, source, library);
        importer.reserve(reserved);
        let mut imported = Vec::with_capacity(requested.len());
        for id in requested {
            imported.push(importer.import_object(id)?);
        }
        importer.remap_references()?;

        debug!(
            "{} {} object(s) from {}",
            if link { "Linked" } else { "Appended" },
            imported.len(),
            source_path.display()
        );
        Ok(imported)
    }

    /// Link (or append) a whole local scene of `source`
    ///
    /// The collection tree and every object in it come along. Linking a
    /// scene that is already linked from the same library returns it.
    pub fn link_scene(
        &mut self,
        source: &Document,
        source_path: &Path,
        scene_name: &str,
        link: bool,
    ) -> Result<SceneId> {
        let source_scene = source
            .scene_by_name_in(scene_name, None)
            .ok_or_else(|| DocumentError::SceneNotFound(scene_name.to_string()))?;
        let source_root = source.scene_root(source_scene)?;
        let source_collections = source.scene_collections(source_scene)?;

        let library = link.then(|| self.ensure_library(source_path));
        if let Some(library) = library {
            if let Some(existing) = self.scene_by_name_in(scene_name, Some(library)) {
                return Ok(existing);
            }
        }

        let mut importer = Importer::new(self, source, library);
        for object in source.scene_objects(source_scene)? {
            importer.import_object(object)?;
        }
        importer.remap_references()?;

        let mut collections: HashMap<CollectionId, CollectionId> = HashMap::new();
        for id in &source_collections {
            let name = source.collection(*id)?.name();
            let copy = match library.and_then(|l| importer.target.collection_by_name_in(name, Some(l))) {
                Some(existing) => existing,
                None => importer.target.insert_collection(name, library),
            };
            collections.insert(*id, copy);
        }

        let scene = importer.target.insert_scene(scene_name, library);
        let root = importer.target.scene_root(scene)?;
        collections.insert(source_root, root);

        for id in std::iter::once(source_root).chain(source_collections) {
            let original = source.collection(id)?;
            let Some(&target) = collections.get(&id) else {
                continue;
            };
            let children: Vec<CollectionId> = original
                .children()
                .iter()
                .filter_map(|c| collections.get(c).copied())
                .collect();
            let objects: Vec<ObjectId> = original
                .objects()
                .iter()
                .filter_map(|o| importer.objects.get(o).copied())
                .collect();

            let copy = importer.target.collection_mut(target)?;
            for child in children {
                if !copy.children.contains(&child) {
                    copy.children.push(child);
                }
            }
            for object in objects {
                if !copy.objects.contains(&object) {
                    copy.objects.push(object);
                }
            }
        }

        debug!(
            "{} scene \"{}\" from {}",
            if link { "Linked" } else { "Appended" },
            scene_name,
            source_path.display()
        );
        Ok(scene)
    }
}

/// Copies datablocks from one document into another, remembering the
/// source-to-target handle mapping
struct Importer<'a> {
    target: &'a mut Document,
    source: &'a Document,
    library: Option<LibraryId>,
    objects: HashMap<ObjectId, ObjectId>,
    images: HashMap<ImageId, ImageId>,
    fresh: Vec<(ObjectId, ObjectId)>,
    /// Target data that must not be reused
    reserved_objects: HashSet<ObjectId>,
    reserved_images: HashSet<ImageId>,
}

impl<'a> Importer<'a> {
    fn new(target: &'a mut Document, source: &'a Document, library: Option<LibraryId>) -> Self {
        Self {
            target,
            source,
            library,
            objects: HashMap::new(),
            images: HashMap::new(),
            fresh: Vec::new(),
            reserved_objects: HashSet::new(),
            reserved_images: HashSet::new(),
        }
    }

    fn reserve(&mut self, objects: &HashSet<ObjectId>) {
        for id in objects {
            let Ok(object) = self.target.object(*id) else {
                continue;
            };
            self.reserved_images.extend(object.images.iter().copied());
            self.reserved_objects.insert(*id);
        }
    }

    fn import_object(&mut self, id: ObjectId) -> Result<ObjectId> {
        if let Some(copy) = self.objects.get(&id) {
            return Ok(*copy);
        }
        let source = self.source;
        let original = source.object(id)?;

        let existing = self
            .library
            .and_then(|library| self.target.object_by_name_in(original.name(), Some(library)))
            .filter(|existing| !self.reserved_objects.contains(existing));
        if let Some(existing) = existing {
            self.objects.insert(id, existing);
            return Ok(existing);
        }

        let mut copy = original.clone();
        copy.library = self.library;
        copy.parent = None;
        copy.modifiers.clear();
        copy.images.clear();
        let copy = self.target.add_object(copy);
        self.objects.insert(id, copy);
        self.fresh.push((id, copy));
        Ok(copy)
    }

    fn import_image(&mut self, id: ImageId) -> Result<ImageId> {
        if let Some(copy) = self.images.get(&id) {
            return Ok(*copy);
        }
        let source = self.source;
        let original = source.image(id)?;

        let existing = self
            .library
            .and_then(|library| self.target.image_by_name_in(original.name(), Some(library)))
            .filter(|existing| !self.reserved_images.contains(existing));
        let copy = match existing {
            Some(existing) => existing,
            None => {
                let mut copy = original.clone();
                copy.library = self.library;
                self.target.add_image(copy)
            }
        };
        self.images.insert(id, copy);
        Ok(copy)
    }

    /// Resolve a source object pointer to its counterpart in the target
    fn resolve(&self, source_id: ObjectId) -> Option<ObjectId> {
        if let Some(copy) = self.objects.get(&source_id) {
            return Some(*copy);
        }
        let original = self.source.objects.get(source_id)?;
        let found = self
            .library
            .and_then(|library| self.target.object_by_name_in(original.name(), Some(library)));
        if found.is_none() {
            warn!(
                "Pointer to \"{}\" dropped, it was not brought in",
                original.name()
            );
        }
        found
    }

    /// Rewire parent, modifier and image pointers of freshly copied objects
    fn remap_references(&mut self) -> Result<()> {
        let source = self.source;
        let fresh = std::mem::take(&mut self.fresh);
        for (source_id, copy_id) in fresh {
            let original = source.object(source_id)?;
            let parent = original.parent.and_then(|p| self.resolve(p));
            let modifiers: Vec<Modifier> = original
                .modifiers
                .iter()
                .map(|m| Modifier {
                    name: m.name.clone(),
                    kind: m.kind.map_references(|r| self.resolve(*r)),
                })
                .collect();
            let mut images = Vec::with_capacity(original.images.len());
            for image in &original.images {
                images.push(self.import_image(*image)?);
            }

            let copy = self.target.object_mut(copy_id)?;
            copy.parent = parent;
            copy.modifiers = modifiers;
            copy.images = images;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Image;
    use crate::object::{ModifierKind, Object};
    use std::path::PathBuf;

    fn source() -> Document {
        let mut doc = Document::new();
        let root = doc.scene_root(doc.active_scene()).unwrap();
        let props = doc.new_collection("Props");
        doc.link_collection(root, props).unwrap();

        let image = doc.add_image(Image::new("wood", "textures/wood.png"));
        let cutter = doc.add_object(Object::new("Cutter"));
        let crate_id = doc.add_object(
            Object::new("Crate")
                .with_modifier(Modifier::new("Boolean", ModifierKind::boolean(cutter)))
                .with_image(image),
        );
        doc.link_object(props, crate_id).unwrap();
        doc.link_object(root, cutter).unwrap();
        doc
    }

    fn path() -> PathBuf {
        PathBuf::from("/assets/props.json")
    }

    #[test]
    fn test_link_preserves_pointers_in_set() {
        let src = source();
        let mut dest = Document::new();
        let names = vec!["Crate".to_string(), "Cutter".to_string()];

        let ids = dest.link_objects(&src, &path(), &names, true).unwrap();
        assert_eq!(ids.len(), 2);

        let crate_obj = dest.object(ids[0]).unwrap();
        assert!(crate_obj.is_linked());
        assert_eq!(crate_obj.modifiers[0].kind.reference("object"), Some(&ids[1]));
        assert_eq!(crate_obj.images.len(), 1);
        assert!(dest.users_collection(ids[0]).is_empty());
    }

    #[test]
    fn test_link_twice_reuses() {
        let src = source();
        let mut dest = Document::new();
        let names = vec!["Crate".to_string()];

        let first = dest.link_objects(&src, &path(), &names, true).unwrap();
        let second = dest.link_objects(&src, &path(), &names, true).unwrap();
        assert_eq!(first, second);
        assert_eq!(dest.object_count(), 1);
    }

    #[test]
    fn test_append_disambiguates_local_names() {
        let src = source();
        let mut dest = Document::new();
        dest.add_object(Object::new("Crate"));

        let ids = dest
            .link_objects(&src, &path(), &["Crate".to_string()], false)
            .unwrap();
        let appended = dest.object(ids[0]).unwrap();
        assert_eq!(appended.name(), "Crate.001");
        assert!(!appended.is_linked());
        // Cutter was not brought in, so the pointer is cleared
        assert_eq!(appended.modifiers[0].kind.reference("object"), None);
    }

    #[test]
    fn test_link_fresh_skips_reserved() {
        let src = source();
        let mut dest = Document::new();
        let names = vec!["Crate".to_string()];

        let first = dest.link_objects(&src, &path(), &names, true).unwrap();
        let reserved: HashSet<ObjectId> = first.iter().copied().collect();
        let second = dest.link_objects_fresh(&src, &path(), &names, &reserved).unwrap();

        assert_ne!(first, second);
        assert_eq!(dest.object_count(), 2);
        let fresh = dest.object(second[0]).unwrap();
        assert!(fresh.is_linked());
        assert_eq!(fresh.name(), "Crate.001");
        // Images are not shared with the reserved object either
        let kept = dest.object(first[0]).unwrap();
        assert_ne!(fresh.images, kept.images);
    }

    #[test]
    fn test_link_missing_object() {
        let src = source();
        let mut dest = Document::new();
        let result = dest.link_objects(&src, &path(), &["Ghost".to_string()], true);
        assert!(matches!(result, Err(DocumentError::ObjectNotFound(name)) if name == "Ghost"));
    }

    #[test]
    fn test_link_scene() {
        let src = source();
        let mut dest = Document::new();

        let scene = dest.link_scene(&src, &path(), "Scene", false).unwrap();
        assert_eq!(dest.scene(scene).unwrap().name(), "Scene.001");

        let props = dest.collection_by_name("Props").unwrap();
        let root = dest.scene_root(scene).unwrap();
        assert!(dest.collection(root).unwrap().has_child(props));
        assert_eq!(dest.scene_objects(scene).unwrap().len(), 2);
    }
}
