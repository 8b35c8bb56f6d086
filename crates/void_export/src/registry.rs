//! Entity registries
//!
//! A registry tracks every entity of one kind seen during an export pass.
//! It owns the kind's [`NameReconciler`], seeded with the names present in
//! the destination when the registry is built, so pre-existing datablocks
//! keep their names and only newly introduced entities are disambiguated.
//!
//! Collection registries also own the idempotent linking operations used to
//! rebuild a hierarchy.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use log::{debug, info};
use void_document::{CollectionId, Document, ObjectId, SCENE_ROOT_NAME};

use crate::error::{ExportError, LookupKind, Result};
use crate::naming::{strip_numeric_suffix, CleanFn, NameKey, NameReconciler};

/// Binds a registry to one datablock kind of the document
pub trait EntityKind {
    type Handle: Copy + Eq + Hash + fmt::Debug + fmt::Display;

    const LOOKUP: LookupKind;

    /// `(handle, name, is_linked)` for every datablock, in document order
    fn snapshot(doc: &Document) -> Vec<(Self::Handle, String, bool)>;

    /// Current name of a live handle
    fn name_of(doc: &Document, handle: Self::Handle) -> Option<&str>;

    /// Local-first lookup by name
    fn find(doc: &Document, name: &str) -> Option<Self::Handle>;
}

/// Object datablocks
#[derive(Debug)]
pub enum ObjectKind {}

/// Named collections (scene roots excluded)
#[derive(Debug)]
pub enum CollectionKind {}

impl EntityKind for ObjectKind {
    type Handle = ObjectId;

    const LOOKUP: LookupKind = LookupKind::Object;

    fn snapshot(doc: &Document) -> Vec<(ObjectId, String, bool)> {
        doc.objects()
            .map(|(id, o)| (id, o.name().to_string(), o.is_linked()))
            .collect()
    }

    fn name_of(doc: &Document, handle: ObjectId) -> Option<&str> {
        doc.object(handle).ok().map(|o| o.name())
    }

    fn find(doc: &Document, name: &str) -> Option<ObjectId> {
        doc.object_by_name(name)
    }
}

impl EntityKind for CollectionKind {
    type Handle = CollectionId;

    const LOOKUP: LookupKind = LookupKind::Collection;

    fn snapshot(doc: &Document) -> Vec<(CollectionId, String, bool)> {
        doc.collections()
            .map(|(id, c)| (id, c.name().to_string(), c.is_linked()))
            .collect()
    }

    fn name_of(doc: &Document, handle: CollectionId) -> Option<&str> {
        doc.collection(handle).ok().map(|c| c.name())
    }

    fn find(doc: &Document, name: &str) -> Option<CollectionId> {
        doc.collection_by_name_in(name, None)
    }
}

/// An object or collection tracked during an export pass
///
/// The incoming name never changes. The local name is not stored here: it
/// is resolved from the registry's correspondence table on demand with
/// [`EntityRegistry::resolve_name`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entity<H> {
    incoming_name: String,
    key: NameKey<H>,
    handle: Option<H>,
    assigned_name: String,
}

impl<H: Copy> Entity<H> {
    pub fn incoming_name(&self) -> &str {
        &self.incoming_name
    }

    pub fn key(&self) -> &NameKey<H> {
        &self.key
    }

    /// Destination handle, once materialized
    pub fn handle(&self) -> Option<H> {
        self.handle
    }
}

/// Registry of entities of one kind
#[derive(Debug)]
pub struct EntityRegistry<K: EntityKind> {
    names: NameReconciler<K::Handle>,
    entities: Vec<Entity<K::Handle>>,
    clean: Option<CleanFn>,
    _kind: PhantomData<K>,
}

pub type ObjectRegistry = EntityRegistry<ObjectKind>;
pub type CollectionRegistry = EntityRegistry<CollectionKind>;

impl<K: EntityKind> EntityRegistry<K> {
    /// Snapshot the destination's names of this kind
    ///
    /// A linked datablock whose name is already taken is skipped, so a
    /// library duplicate never pushes a local name to a suffix.
    pub fn new(doc: &Document) -> Self {
        let mut names = NameReconciler::new();
        for (index, (_, name, linked)) in K::snapshot(doc).into_iter().enumerate() {
            if linked && names.contains_name(&name) {
                continue;
            }
            names.unique_name(NameKey::Preexisting(index), &name, None, true);
        }
        debug!("{} registry starts with {} name(s)", K::LOOKUP, names.len());

        Self {
            names,
            entities: Vec::new(),
            clean: None,
            _kind: PhantomData,
        }
    }

    /// Use `clean` on desired names before reconciling them
    pub fn with_clean(mut self, clean: CleanFn) -> Self {
        self.clean = Some(clean);
        self
    }

    pub fn reconciler(&self) -> &NameReconciler<K::Handle> {
        &self.names
    }

    /// Entities materialized during this pass, in insertion order
    pub fn entities(&self) -> &[Entity<K::Handle>] {
        &self.entities
    }

    /// Current local name of `entity`
    pub fn resolve_name<'a>(&'a self, entity: &'a Entity<K::Handle>) -> &'a str {
        entity
            .handle
            .and_then(|h| self.names.get(&NameKey::Handle(h)))
            .or_else(|| self.names.get(&entity.key))
            .unwrap_or(&entity.assigned_name)
    }

    pub fn get_by_incoming_name(&self, name: &str) -> Option<&Entity<K::Handle>> {
        self.entities.iter().find(|e| e.incoming_name == name)
    }

    pub fn get_by_local_name(&self, name: &str) -> Option<&Entity<K::Handle>> {
        self.entities.iter().find(|e| self.resolve_name(e) == name)
    }

    /// Record that `entity` is now called `name` in the destination
    pub fn update_element_name(&mut self, entity: &Entity<K::Handle>, name: &str) {
        let key = match entity.handle {
            Some(handle) => NameKey::Handle(handle),
            None => entity.key.clone(),
        };
        info!(
            "Updating {} \"{}\" name to \"{}\"",
            K::LOOKUP,
            self.resolve_name(entity),
            name
        );
        self.names.update(key, name);
    }

    /// Live handle of `entity`, falling back to a lookup by its local name
    pub fn handle(&self, doc: &Document, entity: &Entity<K::Handle>) -> Option<K::Handle> {
        entity
            .handle
            .filter(|h| K::name_of(doc, *h).is_some())
            .or_else(|| K::find(doc, self.resolve_name(entity)))
    }

    /// Live handle of `entity`, or a lookup error naming it
    pub fn require(&self, doc: &Document, entity: &Entity<K::Handle>) -> Result<K::Handle> {
        self.handle(doc, entity)
            .ok_or_else(|| ExportError::lookup(K::LOOKUP, self.resolve_name(entity)))
    }

    /// Insert into the entity list, replacing an entry with the same
    /// incoming name
    fn upsert(&mut self, entity: Entity<K::Handle>) {
        match self
            .entities
            .iter_mut()
            .find(|e| e.incoming_name == entity.incoming_name)
        {
            Some(existing) => *existing = entity,
            None => self.entities.push(entity),
        }
    }

    fn entity_for_key(&self, key: &NameKey<K::Handle>) -> Option<&Entity<K::Handle>> {
        self.entities.iter().find(|e| {
            &e.key == key || matches!(key, NameKey::Handle(h) if e.handle == Some(*h))
        })
    }
}

impl EntityRegistry<ObjectKind> {
    /// Wrap a live object into an entity
    ///
    /// With `register`, its current name is recorded under its handle
    /// before any renaming can happen.
    pub fn add_element(
        &mut self,
        doc: &Document,
        object: ObjectId,
        register: bool,
        append_to_list: bool,
    ) -> Result<Entity<ObjectId>> {
        let name = doc.object(object)?.name().to_string();
        let key = NameKey::Handle(object);
        if register {
            self.names.register(key.clone(), name.clone());
        }
        let entity = Entity {
            incoming_name: name.clone(),
            key,
            handle: Some(object),
            assigned_name: name,
        };
        if append_to_list && !self.entities.iter().any(|e| e.handle == Some(object)) {
            self.entities.push(entity.clone());
        }
        Ok(entity)
    }

    /// Wrap an object brought in under `incoming`, which may differ from
    /// the name the host gave it
    pub fn add_imported(
        &mut self,
        doc: &Document,
        object: ObjectId,
        incoming: &str,
    ) -> Result<Entity<ObjectId>> {
        let mut entity = self.add_element(doc, object, true, false)?;
        entity.incoming_name = incoming.to_string();
        self.upsert(entity.clone());
        Ok(entity)
    }

    /// Entity for a registered name, or for the live object of that name
    pub fn get_element(&mut self, doc: &Document, name: &str) -> Result<Entity<ObjectId>> {
        if let Some(NameKey::Handle(handle)) = self.names.live_key_for(name).cloned() {
            debug!("Element found : {}", handle);
            if let Some(entity) = self.entity_for_key(&NameKey::Handle(handle)) {
                return Ok(entity.clone());
            }
            return self.add_element(doc, handle, false, false);
        }
        let object = doc
            .object_by_name(name)
            .ok_or_else(|| ExportError::lookup(LookupKind::Object, name))?;
        self.add_element(doc, object, true, true)
    }

    /// Point the entities of `old` at `new` after the host swapped handles
    pub fn rebind(&mut self, doc: &Document, old: ObjectId, new: ObjectId) -> Result<()> {
        let name = doc.object(new)?.name().to_string();
        if old != new {
            self.names.forget(&NameKey::Handle(old));
        }
        self.names.update(NameKey::Handle(new), name.clone());
        for entity in self.entities.iter_mut().filter(|e| e.handle == Some(old)) {
            entity.handle = Some(new);
            entity.key = NameKey::Handle(new);
            entity.assigned_name = name.clone();
        }
        Ok(())
    }

    /// Parent `child` to `parent`
    pub fn parent(
        &self,
        doc: &mut Document,
        parent: &Entity<ObjectId>,
        child: &Entity<ObjectId>,
        keep_transform: bool,
    ) -> Result<()> {
        info!(
            "Parent \"{}\" object to \"{}\" object",
            self.resolve_name(child),
            self.resolve_name(parent)
        );
        let parent_id = self.require(doc, parent)?;
        let child_id = self.require(doc, child)?;
        doc.set_parent(child_id, Some(parent_id), keep_transform)?;
        Ok(())
    }
}

impl EntityRegistry<CollectionKind> {
    /// Registry that strips `.NNN` from desired collection names
    pub fn for_collections(doc: &Document) -> Self {
        Self::new(doc).with_clean(strip_numeric_suffix)
    }

    /// Create an entity for an incoming collection name
    ///
    /// The local name is reconciled against every tracked name. With
    /// `register`, it is recorded under the incoming name.
    pub fn add_element(
        &mut self,
        name: &str,
        register: bool,
        append_to_list: bool,
    ) -> Entity<CollectionId> {
        let key = NameKey::Incoming(name.to_string());
        let local = self.names.unique_name(key.clone(), name, self.clean, register);
        if local != name {
            info!("New name for \"{}\" is \"{}\"", name, local);
        }
        let entity = Entity {
            incoming_name: name.to_string(),
            key,
            handle: None,
            assigned_name: local,
        };
        if append_to_list && self.get_by_incoming_name(name).is_none() {
            self.entities.push(entity.clone());
        }
        entity
    }

    /// Entity owning the local name `name`, or a new registered one
    pub fn get_element(&mut self, name: &str) -> Entity<CollectionId> {
        if let Some(key) = self.names.live_key_for(name).cloned() {
            debug!("Element found : {}", key);
            if let Some(entity) = self.entity_for_key(&key) {
                return entity.clone();
            }
            let (incoming, handle) = match &key {
                NameKey::Incoming(incoming) => (incoming.clone(), None),
                NameKey::Handle(handle) => (name.to_string(), Some(*handle)),
                NameKey::Preexisting(_) => (name.to_string(), None),
            };
            return Entity {
                incoming_name: incoming,
                key,
                handle,
                assigned_name: name.to_string(),
            };
        }
        self.add_element(name, true, true)
    }

    /// Entity for an incoming name, created and registered when missing
    pub fn element_for_incoming(&mut self, name: &str) -> Entity<CollectionId> {
        if let Some(entity) = self.get_by_incoming_name(name) {
            debug!("Element found for incoming \"{}\" : \"{}\"", name, self.resolve_name(entity));
            return entity.clone();
        }
        debug!("Element not found for incoming \"{}\", adding it", name);
        self.add_element(name, true, true)
    }

    /// Create a destination collection for `name`
    ///
    /// An entity that already has a live collection is returned as is.
    pub fn create_collection(&mut self, doc: &mut Document, name: &str) -> Result<Entity<CollectionId>> {
        let mut entity = if self.names.contains_name(name) {
            self.get_element(name)
        } else {
            self.add_element(name, false, true)
        };
        if let Some(handle) = entity.handle.filter(|h| doc.collection(*h).is_ok()) {
            debug!("Collection \"{}\" already exists", self.resolve_name(&entity));
            entity.handle = Some(handle);
            return Ok(entity);
        }

        let requested = self.resolve_name(&entity).to_string();
        let id = doc.new_collection(&requested);
        let actual = doc.collection(id)?.name().to_string();
        info!("Create new collection : \"{}\"", actual);

        self.names.register(NameKey::Handle(id), actual);
        entity.handle = Some(id);
        self.upsert(entity.clone());
        Ok(entity)
    }

    /// Live collection for an incoming name, creating it when missing
    pub fn ensure_collection(&mut self, doc: &mut Document, incoming: &str) -> Result<CollectionId> {
        let entity = self.element_for_incoming(incoming);
        if let Some(id) = self.handle(doc, &entity) {
            if entity.handle != Some(id) {
                let mut bound = entity;
                bound.handle = Some(id);
                self.upsert(bound);
            }
            return Ok(id);
        }
        let local = self.resolve_name(&entity).to_string();
        let created = self.create_collection(doc, &local)?;
        let id = created.handle.ok_or_else(|| ExportError::lookup(LookupKind::Collection, &local))?;

        let mut bound = entity;
        bound.handle = Some(id);
        self.upsert(bound);
        Ok(id)
    }

    /// Destination collection of `entity`; the scene root name maps to the
    /// active scene's root
    pub fn collection_id(&self, doc: &Document, entity: &Entity<CollectionId>) -> Result<CollectionId> {
        if self.resolve_name(entity) == SCENE_ROOT_NAME {
            return Ok(doc.scene_root(doc.active_scene())?);
        }
        self.require(doc, entity)
    }

    pub fn link_object_to_collection(
        &self,
        doc: &mut Document,
        object: ObjectId,
        collection: CollectionId,
    ) -> Result<bool> {
        if doc.collection(collection)?.has_object(object) {
            return Ok(false);
        }
        info!(
            "Link object \"{}\" to collection \"{}\"",
            doc.object(object)?.name(),
            doc.collection(collection)?.name()
        );
        Ok(doc.link_object(collection, object)?)
    }

    pub fn unlink_object_from_collection(
        &self,
        doc: &mut Document,
        object: ObjectId,
        collection: CollectionId,
    ) -> Result<bool> {
        if !doc.collection(collection)?.has_object(object) {
            return Ok(false);
        }
        info!(
            "Unlink object \"{}\" from collection \"{}\"",
            doc.object(object)?.name(),
            doc.collection(collection)?.name()
        );
        Ok(doc.unlink_object(collection, object)?)
    }

    pub fn move_object_to_collection(
        &self,
        doc: &mut Document,
        object: ObjectId,
        from: CollectionId,
        to: CollectionId,
    ) -> Result<()> {
        info!(
            "Move object \"{}\" from collection \"{}\" to \"{}\"",
            doc.object(object)?.name(),
            doc.collection(from)?.name(),
            doc.collection(to)?.name()
        );
        doc.unlink_object(from, object)?;
        doc.link_object(to, object)?;
        Ok(())
    }

    pub fn link_collection_to_collection(
        &self,
        doc: &mut Document,
        child: CollectionId,
        parent: CollectionId,
    ) -> Result<bool> {
        if doc.collection(parent)?.has_child(child) {
            return Ok(false);
        }
        info!(
            "Link collection \"{}\" to collection \"{}\"",
            doc.collection(child)?.name(),
            doc.collection(parent)?.name()
        );
        Ok(doc.link_collection(parent, child)?)
    }

    pub fn unlink_collection_from_collection(
        &self,
        doc: &mut Document,
        child: CollectionId,
        parent: CollectionId,
    ) -> Result<bool> {
        if !doc.collection(parent)?.has_child(child) {
            return Ok(false);
        }
        info!(
            "Unlink collection \"{}\" from collection \"{}\"",
            doc.collection(child)?.name(),
            doc.collection(parent)?.name()
        );
        Ok(doc.unlink_collection(parent, child)?)
    }

    /// Make the collection called `name` the active one of the active scene
    ///
    /// Searches the scene tree depth-first. Returns `None` when no such
    /// collection is reachable.
    pub fn set_active(&self, doc: &mut Document, name: &str) -> Result<Option<CollectionId>> {
        let scene = doc.active_scene();
        let root = doc.scene_root(scene)?;
        let found = std::iter::once(root)
            .chain(doc.descendants(root))
            .find(|id| doc.collection(*id).map(|c| c.name() == name).unwrap_or(false));

        match found {
            Some(id) => {
                doc.set_active_collection(scene, id)?;
                debug!("Active collection is now \"{}\"", name);
                Ok(Some(id))
            }
            None => {
                debug!("No collection \"{}\" to make active", name);
                Ok(None)
            }
        }
    }
}
