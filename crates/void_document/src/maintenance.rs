//! Document-wide maintenance: detaching linked data, dropping libraries,
//! packing images and cleaning the file

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};

use crate::document::{next_free_name, Document};
use crate::error::Result;
use crate::id::{CollectionId, ImageId, LibraryId, ObjectId, SceneId};

/// Linked data that must survive [`Document::remove_library_data`]
#[derive(Clone, Debug, Default)]
pub struct LibraryKeep {
    pub objects: HashSet<ObjectId>,
    pub collections: HashSet<CollectionId>,
    pub scenes: HashSet<SceneId>,
}

impl LibraryKeep {
    /// Snapshot of everything currently linked from `library`
    pub fn snapshot(doc: &Document, library: LibraryId) -> Self {
        Self {
            objects: doc
                .objects()
                .filter(|(_, o)| o.library == Some(library))
                .map(|(id, _)| id)
                .collect(),
            collections: doc
                .collections
                .iter()
                .filter(|(_, c)| c.library == Some(library))
                .map(|(id, _)| id)
                .collect(),
            scenes: doc
                .scenes()
                .filter(|(_, s)| s.library == Some(library))
                .map(|(id, _)| id)
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.collections.is_empty() && self.scenes.is_empty()
    }
}

/// Outcome of [`Document::pack_all`]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PackReport {
    /// Images packed by this call
    pub packed: Vec<String>,
    /// Images whose file could not be read, with the reason
    pub failed: Vec<(String, String)>,
}

impl Document {
    /// Detach a linked object from its library
    ///
    /// When no other linked datablock uses the object it becomes local in
    /// place. Otherwise a local copy is made: the copy replaces the original
    /// in local collections and as the parent of local objects, while
    /// modifier pointers keep targeting the original. Linked images the
    /// object uses become local too. Returns the handle of the now local
    /// object.
    pub fn make_local(&mut self, id: ObjectId) -> Result<ObjectId> {
        let object = self.object(id)?.clone();
        if object.library.is_none() {
            return Ok(id);
        }
        let name = next_free_name(&object.name, |n| self.object_by_name_in(n, None).is_some());
        self.make_images_local(id)?;

        if !self.has_linked_users(id) {
            let object = self.object_mut(id)?;
            object.library = None;
            if object.name != name {
                debug!("Made \"{}\" local as \"{}\"", object.name, name);
                object.name = name;
            }
            return Ok(id);
        }

        let mut copy = object;
        copy.library = None;
        copy.name = name;
        let copy = self.objects.insert(copy);

        for (_, collection) in self.collections.iter_mut() {
            if collection.library.is_some() {
                continue;
            }
            if let Some(slot) = collection.objects.iter().position(|o| *o == id) {
                if collection.objects.contains(&copy) {
                    collection.objects.remove(slot);
                } else {
                    collection.objects[slot] = copy;
                }
            }
        }
        for (_, object) in self.objects.iter_mut() {
            if object.library.is_none() && object.parent == Some(id) {
                object.parent = Some(copy);
            }
        }
        debug!("Made local copy {} of linked {}", copy, id);
        Ok(copy)
    }

    fn make_images_local(&mut self, object: ObjectId) -> Result<()> {
        let images = self.object(object)?.images.clone();
        for image in images {
            let Some(current) = self.images.get(image) else {
                continue;
            };
            if current.library.is_none() {
                continue;
            }
            let name = next_free_name(&current.name, |n| self.image_by_name_in(n, None).is_some());
            if let Some(current) = self.images.get_mut(image) {
                current.library = None;
                current.name = name;
            }
        }
        Ok(())
    }

    /// Whether a linked datablock other than `id` points at it
    fn has_linked_users(&self, id: ObjectId) -> bool {
        let by_object = self
            .objects
            .iter()
            .any(|(other, o)| other != id && o.library.is_some() && o.references_object(id));
        let by_collection = self
            .collections
            .iter()
            .any(|(_, c)| c.library.is_some() && c.has_object(id));
        by_object || by_collection
    }

    /// Remove data linked from `library`, except what `keep` lists
    ///
    /// The library itself is dropped once nothing links to it anymore.
    /// Returns the number of removed datablocks.
    pub fn remove_library_data(&mut self, library: LibraryId, keep: &LibraryKeep) -> Result<usize> {
        let path = self.library(library)?.path.clone();
        let mut removed = 0;

        let scenes: Vec<SceneId> = self
            .scenes()
            .filter(|(id, s)| s.library == Some(library) && !keep.scenes.contains(id))
            .map(|(id, _)| id)
            .collect();
        for scene in scenes {
            self.remove_scene(scene)?;
            removed += 1;
        }

        let collections: Vec<CollectionId> = self
            .collections()
            .filter(|(id, c)| c.library == Some(library) && !keep.collections.contains(id))
            .map(|(id, _)| id)
            .collect();
        for collection in collections {
            self.remove_collection(collection)?;
            removed += 1;
        }

        let objects: Vec<ObjectId> = self
            .objects()
            .filter(|(id, o)| o.library == Some(library) && !keep.objects.contains(id))
            .map(|(id, _)| id)
            .collect();
        for object in objects {
            self.remove_object(object)?;
            removed += 1;
        }

        let images: Vec<ImageId> = self
            .images()
            .filter(|(_, i)| i.library == Some(library))
            .map(|(id, _)| id)
            .collect();
        let images_in_use: HashSet<ImageId> = self
            .objects()
            .flat_map(|(_, o)| o.images.iter().copied())
            .collect();
        for image in images {
            if !images_in_use.contains(&image) {
                self.images.remove(image);
                removed += 1;
            }
        }

        let still_used = self.objects().any(|(_, o)| o.library == Some(library))
            || self.collections.iter().any(|(_, c)| c.library == Some(library))
            || self.images().any(|(_, i)| i.library == Some(library));
        if !still_used {
            self.libraries.remove(library);
            debug!("Removed library {}", path.display());
        }

        info!(
            "Removed {} datablock(s) linked from {}",
            removed,
            path.display()
        );
        Ok(removed)
    }

    /// Embed the bytes of every local, unpacked image
    ///
    /// Relative image paths resolve against the document's directory.
    /// Unreadable files are reported and skipped.
    pub fn pack_all(&mut self) -> PackReport {
        let base = self
            .path
            .as_ref()
            .and_then(|p| p.parent())
            .map(PathBuf::from);
        self.pack_all_relative_to(base.as_deref())
    }

    /// [`Document::pack_all`] with relative image paths resolved against
    /// `base`
    pub fn pack_all_relative_to(&mut self, base: Option<&Path>) -> PackReport {
        let mut report = PackReport::default();

        for (_, image) in self.images.iter_mut() {
            if image.library.is_some() || image.packed.is_some() {
                continue;
            }
            let path = match base {
                Some(base) if image.filepath.is_relative() => base.join(&image.filepath),
                _ => image.filepath.clone(),
            };
            match fs::read(&path) {
                Ok(bytes) => {
                    debug!("Packed image \"{}\" ({} bytes)", image.name, bytes.len());
                    image.packed = Some(bytes);
                    report.packed.push(image.name.clone());
                }
                Err(e) => {
                    warn!("Unable to pack image \"{}\" from {}: {}", image.name, path.display(), e);
                    report.failed.push((image.name.clone(), e.to_string()));
                }
            }
        }
        report
    }

    /// Remove every datablock except workspaces and the active scene
    ///
    /// The active scene survives with an empty root.
    pub fn clean(&mut self) {
        let active = self.active_scene;
        let root = self.scenes.get(active).map(|s| s.root);

        let scenes: Vec<SceneId> = self.scenes.keys().into_iter().filter(|s| *s != active).collect();
        for scene in scenes {
            self.scenes.remove(scene);
        }
        for collection in self.collections.keys() {
            if Some(collection) != root {
                self.collections.remove(collection);
            }
        }
        for object in self.objects.keys() {
            self.objects.remove(object);
        }
        for image in self.images.keys() {
            self.images.remove(image);
        }
        for library in self.libraries.keys() {
            self.libraries.remove(library);
        }

        if let Some(root) = root.and_then(|r| self.collections.get_mut(r)) {
            root.children.clear();
            root.objects.clear();
        }
        if let Some(scene) = self.scenes.get_mut(active) {
            scene.active_collection = scene.root;
        }
        info!("Cleaned document, kept {} workspace(s)", self.workspaces.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Image;
    use crate::object::{Modifier, ModifierKind, Object};

    fn linked_pair(doc: &mut Document) -> (LibraryId, ObjectId, ObjectId) {
        let library = doc.ensure_library(Path::new("/lib/source.json"));
        let mut target = Object::new("Target");
        target.library = Some(library);
        let target = doc.add_object(target);

        let mut user = Object::new("User")
            .with_modifier(Modifier::new("Boolean", ModifierKind::boolean(target)));
        user.library = Some(library);
        let user = doc.add_object(user);
        (library, user, target)
    }

    #[test]
    fn test_make_local_in_place() {
        let mut doc = Document::new();
        let (_, user, target) = linked_pair(&mut doc);

        // User first: nothing linked points at it
        assert_eq!(doc.make_local(user).unwrap(), user);
        // Target next: its only user is local now
        assert_eq!(doc.make_local(target).unwrap(), target);

        let user_obj = doc.object(user).unwrap();
        assert!(!user_obj.is_linked());
        assert_eq!(user_obj.modifiers[0].kind.reference("object"), Some(&target));
    }

    #[test]
    fn test_make_local_detaches_images() {
        let mut doc = Document::new();
        doc.add_image(Image::new("wood", "wood.png"));
        let (library, user, _) = linked_pair(&mut doc);
        let mut image = Image::new("wood", "textures/wood.png");
        image.library = Some(library);
        let image = doc.add_image(image);
        doc.object_mut(user).unwrap().images.push(image);

        doc.make_local(user).unwrap();
        let image = doc.image(image).unwrap();
        assert!(image.library().is_none());
        assert_eq!(image.name(), "wood.001");
    }

    #[test]
    fn test_make_local_copies_when_linked_users_remain() {
        let mut doc = Document::new();
        let (_, user, target) = linked_pair(&mut doc);
        let c = doc.new_collection("Staging");
        doc.link_object(c, target).unwrap();

        let local = doc.make_local(target).unwrap();
        assert_ne!(local, target);
        assert!(doc.object(target).unwrap().is_linked());
        assert_eq!(doc.collection(c).unwrap().objects(), &[local]);
        // The linked user still points at the linked original
        let user_obj = doc.object(user).unwrap();
        assert_eq!(user_obj.modifiers[0].kind.reference("object"), Some(&target));
    }

    #[test]
    fn test_make_local_copy_carries_local_images() {
        let mut doc = Document::new();
        let (library, _, target) = linked_pair(&mut doc);
        let mut image = Image::new("stone", "textures/stone.png");
        image.library = Some(library);
        let image = doc.add_image(image);
        doc.object_mut(target).unwrap().images.push(image);

        let local = doc.make_local(target).unwrap();
        assert_ne!(local, target);
        assert_eq!(doc.object(local).unwrap().images, vec![image]);
        assert!(doc.image(image).unwrap().library().is_none());
    }

    #[test]
    fn test_make_local_name_collision() {
        let mut doc = Document::new();
        doc.add_object(Object::new("Target"));
        let (_, _, target) = linked_pair(&mut doc);
        let user = doc.object_by_name_in("User", doc.object(target).unwrap().library()).unwrap();
        doc.make_local(user).unwrap();

        let local = doc.make_local(target).unwrap();
        assert_eq!(doc.object(local).unwrap().name(), "Target.001");
    }

    #[test]
    fn test_remove_library_data_keeps_previous() {
        let mut doc = Document::new();
        let (library, user, target) = linked_pair(&mut doc);
        let keep = LibraryKeep {
            objects: [target].into_iter().collect(),
            ..Default::default()
        };

        let removed = doc.remove_library_data(library, &keep).unwrap();
        assert_eq!(removed, 1);
        assert!(!doc.contains_object(user));
        assert!(doc.contains_object(target));
        assert!(doc.library(library).is_ok());

        doc.remove_library_data(library, &LibraryKeep::default()).unwrap();
        assert!(doc.library(library).is_err());
    }

    #[test]
    fn test_pack_all() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("wood.png"), b"png-bytes").unwrap();

        let mut doc = Document::new();
        doc.set_path(dir.path().join("scene.json"));
        doc.add_image(Image::new("wood", "wood.png"));
        doc.add_image(Image::new("missing", "missing.png"));

        let report = doc.pack_all();
        assert_eq!(report.packed, vec!["wood".to_string()]);
        assert_eq!(report.failed.len(), 1);

        let wood = doc.images().find(|(_, i)| i.name() == "wood").unwrap().1;
        assert_eq!(wood.packed.as_deref(), Some(&b"png-bytes"[..]));
    }

    #[test]
    fn test_clean_keeps_workspaces_and_active_scene() {
        let mut doc = Document::startup();
        let active = doc.active_scene();
        doc.new_scene("Other");

        doc.clean();
        assert_eq!(doc.scene_count(), 1);
        assert_eq!(doc.active_scene(), active);
        assert_eq!(doc.object_count(), 0);
        assert_eq!(doc.collections().count(), 0);
        assert!(!doc.workspaces().is_empty());
    }
}
