//! The export pipeline
//!
//! An [`ExportCommand`] reads the source once, then runs the stages of
//! [`ExportStage`] in order against the destination document:
//!
//! 1. clean the destination (override + clean file)
//! 2. link the expanded selection into a staging collection
//! 3. move it into the target group (a new collection or the scene root)
//! 4. rebuild the source collection hierarchy around the selection
//! 5. place dependency-only objects
//! 6. drop the staging collection; in append mode detach everything from
//!    the source library, re-point dependencies and apply rename pairs
//! 7. pack external data and save
//!
//! A non-fatal error inside stages 2 to 6 stops the pipeline, but whatever
//! was produced is still saved and the error is recorded in the report.

use std::path::Path;

use indexmap::IndexMap;
use log::{debug, error, info, warn};
use void_document::{
    CollectionId, Document, LibraryId, LibraryKeep, ObjectId, SCENE_ROOT_NAME,
};

use crate::dependencies::detach_order;
use crate::error::{ExportError, LookupKind, Result};
use crate::options::{ExportOptions, OverrideMode, SourceKind, TransferMode};
use crate::hierarchy::ancestor_chain;
use crate::registry::{CollectionRegistry, ObjectRegistry};
use crate::rename::rename_object;
use crate::report::{DependencyPlacement, ExportReport, ExportStage};
use crate::selection::ExportSnapshot;

/// Temporary collection holding freshly linked objects
pub const STAGING_COLLECTION_NAME: &str = "IMPORT_COLLECTION";

/// Collection receiving dependency-only objects in dedicated mode
pub const DEPENDENCIES_COLLECTION_NAME: &str = "Dependencies";

/// One export invocation
pub struct ExportCommand {
    options: ExportOptions,
    source: Document,
    snapshot: ExportSnapshot,
    warnings: Vec<String>,
}

impl ExportCommand {
    /// Validate `options` and read the source document
    ///
    /// Configuration, I/O and selection lookup errors abort here, before
    /// the destination is opened.
    pub fn new(options: ExportOptions) -> Result<Self> {
        let warnings = options.validate()?;
        let source = Document::load(&options.source_file).map_err(ExportError::Io)?;
        Self::build(options, source, warnings)
    }

    /// Like [`ExportCommand::new`] with an already loaded source document
    pub fn with_source(options: ExportOptions, source: Document) -> Result<Self> {
        let warnings = options.validate()?;
        Self::build(options, source, warnings)
    }

    fn build(options: ExportOptions, source: Document, warnings: Vec<String>) -> Result<Self> {
        for warning in &warnings {
            warn!("{}", warning);
        }
        log_options(&options);

        let snapshot = ExportSnapshot::build(&source, &options)?;
        snapshot.log();

        Ok(Self {
            options,
            source,
            snapshot,
            warnings,
        })
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    pub fn snapshot(&self) -> &ExportSnapshot {
        &self.snapshot
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Open the destination, run every stage and save the result
    ///
    /// The destination is saved even when a stage failed; check
    /// [`ExportReport::failure`].
    pub fn run(mut self) -> Result<ExportReport> {
        let mut dest = self.prepare_destination()?;
        let mut report = self.execute(&mut dest)?;

        let destination = self.options.destination_file.clone();
        dest.save(&destination).map_err(ExportError::Io)?;
        info!("Saved {}", destination.display());
        report.stages.push(ExportStage::Finalize);
        Ok(report)
    }

    /// Run every stage except saving against `dest`
    pub fn execute(&self, dest: &mut Document) -> Result<ExportReport> {
        let mut report = ExportReport::new(&self.options.destination_file);
        report.warnings = self.warnings.clone();

        if self.options.export_to_clean_file && self.options.file_override == OverrideMode::Override {
            info!("Cleaning File");
            dest.clean();
            report.stages.push(ExportStage::CleanDestination);
        }

        let mut pass = ExportPass::new(self, dest, report);
        let outcome = match self.options.source_data {
            SourceKind::Objects => pass.import_objects(),
            SourceKind::Scene => pass.import_scene(),
        };
        let mut report = pass.finish();

        if let Err(e) = outcome {
            if e.is_fatal() {
                return Err(e);
            }
            error!("Export stopped, saving partial result: {}", e);
            report.failure = Some(e.to_string());
        }
        Ok(report)
    }

    /// Startup document for `OVERRIDE`, the existing file for `APPEND_LINK`
    fn prepare_destination(&mut self) -> Result<Document> {
        let path = &self.options.destination_file;
        match self.options.file_override {
            OverrideMode::Override => Ok(Document::startup()),
            OverrideMode::AppendLink if path.exists() => {
                info!("Opening destination {}", path.display());
                Document::load(path).map_err(ExportError::Io)
            }
            OverrideMode::AppendLink => {
                let message = format!(
                    "Destination {} does not exist, falling back to OVERRIDE",
                    path.display()
                );
                warn!("{}", message);
                self.warnings.push(message);
                self.options.file_override = OverrideMode::Override;
                Ok(Document::startup())
            }
        }
    }
}

fn log_options(options: &ExportOptions) {
    debug!("source_file = {}", options.source_file.display());
    debug!("destination_file = {}", options.destination_file.display());
    debug!("source_data = {}", options.source_data);
    debug!("file_override = {}", options.file_override);
    debug!("export_mode = {}", options.export_mode);
    debug!("target_scene = {:?}", options.target_scene);
    debug!("export_to_clean_file = {}", options.export_to_clean_file);
    debug!("pack_external_data = {}", options.pack_external_data);
    debug!("source_scene_name = {}", options.source_scene_name);
    debug!("source_object_list = {:?}", options.source_object_list);
    debug!("export_object_children = {}", options.export_object_children);
    debug!("create_collection_hierarchy = {}", options.create_collection_hierarchy);
    debug!("export_in_new_collection = {}", options.export_in_new_collection);
    debug!("new_collection_name = {}", options.new_collection_name);
    debug!(
        "dependencies_in_dedicated_collection = {}",
        options.dependencies_in_dedicated_collection
    );
    debug!("rename pairs = {:?}", options.rename_pairs());
}

/// State of one run of the stages against a destination
struct ExportPass<'a> {
    options: &'a ExportOptions,
    source: &'a Document,
    snapshot: &'a ExportSnapshot,
    dest: &'a mut Document,
    report: ExportReport,
    objects: ObjectRegistry,
    collections: CollectionRegistry,
    /// Incoming name -> destination handle
    imported: IndexMap<String, ObjectId>,
    previous: LibraryKeep,
    library: Option<LibraryId>,
    staging: Option<CollectionId>,
    root_collection: Option<CollectionId>,
}

impl<'a> ExportPass<'a> {
    fn new(command: &'a ExportCommand, dest: &'a mut Document, report: ExportReport) -> Self {
        let options = &command.options;
        let previous = dest
            .library_by_path(&options.source_file)
            .map(|library| LibraryKeep::snapshot(dest, library))
            .unwrap_or_default();
        if !previous.is_empty() {
            debug!(
                "Keeping {} object(s) previously linked from {}",
                previous.objects.len(),
                options.source_file.display()
            );
        }
        let objects = ObjectRegistry::new(dest);
        let collections = CollectionRegistry::for_collections(dest);

        Self {
            options,
            source: &command.source,
            snapshot: &command.snapshot,
            dest,
            report,
            objects,
            collections,
            imported: IndexMap::new(),
            previous,
            library: None,
            staging: None,
            root_collection: None,
        }
    }

    fn source_path(&self) -> &'a Path {
        &self.options.source_file
    }

    fn import_scene(&mut self) -> Result<()> {
        let name = &self.options.source_scene_name;
        let link = self.options.export_mode == TransferMode::Link;
        let path = self.source_path();
        let leftover = self.dest.active_scene();

        info!("Importing scene \"{}\"", name);
        let scene = self.dest.link_scene(self.source, path, name, link)?;
        for object in self.dest.scene_objects(scene)? {
            let local = self.dest.object(object)?.name().to_string();
            self.report.objects.insert(local.clone(), local);
        }
        self.report.stages.push(ExportStage::StageRawImport);

        let cleaned = self.options.export_to_clean_file
            && self.options.file_override == OverrideMode::Override;
        if cleaned && !link && scene != leftover {
            self.dest.set_active_scene(scene)?;
            self.dest.remove_scene(leftover)?;
            info!("Removed leftover scene, \"{}\" is now active", name);
        }

        self.finalize();
        Ok(())
    }

    fn import_objects(&mut self) -> Result<()> {
        self.select_target_scene()?;
        self.stage_raw_import()?;
        self.place_into_target_group()?;
        if self.options.create_collection_hierarchy {
            self.rebuild_hierarchy()?;
        }
        self.place_dependencies()?;
        self.cleanup()?;
        self.finalize();
        Ok(())
    }

    fn select_target_scene(&mut self) -> Result<()> {
        let Some(name) = &self.options.target_scene else {
            return Ok(());
        };
        match self.dest.scene_by_name(name) {
            Some(scene) => {
                info!("Target scene is \"{}\"", name);
                self.dest.set_active_scene(scene)?;
            }
            None => error!(
                "{}, objects go to the current scene",
                ExportError::lookup(LookupKind::Scene, name)
            ),
        }
        Ok(())
    }

    fn scene_root(&self) -> Result<CollectionId> {
        Ok(self.dest.scene_root(self.dest.active_scene())?)
    }

    fn root_collection(&self) -> Result<CollectionId> {
        match self.root_collection {
            Some(root) => Ok(root),
            None => self.scene_root(),
        }
    }

    fn stage_raw_import(&mut self) -> Result<()> {
        let names = self.snapshot.import_list();
        let path = self.source_path();
        info!("Linking {} object(s) from {}", names.len(), path.display());
        // Data already linked from this source stays linked in append mode
        let staged = match self.options.export_mode {
            TransferMode::Append => {
                self.dest
                    .link_objects_fresh(self.source, path, &names, &self.previous.objects)?
            }
            TransferMode::Link => self.dest.link_objects(self.source, path, &names, true)?,
        };
        self.library = self.dest.library_by_path(path);

        let staging = self.dest.new_collection(STAGING_COLLECTION_NAME);
        let root = self.scene_root()?;
        self.dest.link_collection(root, staging)?;
        self.staging = Some(staging);

        for (name, id) in names.iter().zip(staged) {
            if self.snapshot.is_selected(name) {
                info!("Importing : {}", name);
            } else {
                info!("Importing dependency : {}", name);
            }
            self.dest.link_object(staging, id)?;
            self.objects.add_imported(self.dest, id, name)?;
            self.imported.insert(name.clone(), id);
        }
        self.report.stages.push(ExportStage::StageRawImport);
        Ok(())
    }

    fn place_into_target_group(&mut self) -> Result<()> {
        self.collections.set_active(self.dest, SCENE_ROOT_NAME)?;
        let staging = self
            .staging
            .ok_or_else(|| ExportError::lookup(LookupKind::Collection, STAGING_COLLECTION_NAME))?;
        let scene_root = self.scene_root()?;

        if self.options.wants_new_collection() {
            let name = &self.options.new_collection_name;
            info!("Creating \"{}\" new collection and move imported files to it", name);
            let entity = self.collections.create_collection(self.dest, name)?;
            let root = self.collections.require(self.dest, &entity)?;
            self.collections
                .link_collection_to_collection(self.dest, root, scene_root)?;
            for object in self.imported.values() {
                self.collections
                    .unlink_object_from_collection(self.dest, *object, staging)?;
                self.collections
                    .link_object_to_collection(self.dest, *object, root)?;
            }
            self.root_collection = Some(root);
        } else {
            if self.options.export_in_new_collection {
                warn!("New collection name is empty, skipping root collection creation.");
            }
            info!("Move Objects to Scene Root Collection");
            for object in self.imported.values() {
                self.collections
                    .move_object_to_collection(self.dest, *object, staging, scene_root)?;
            }
            self.root_collection = Some(scene_root);
        }
        self.report.stages.push(ExportStage::PlaceIntoTargetGroup);
        Ok(())
    }

    /// Collection for `incoming`, the root collection for the source root
    fn collection_for(&mut self, incoming: &str) -> Result<CollectionId> {
        if incoming == self.snapshot.root_collection_name {
            return self.root_collection();
        }
        self.collections.ensure_collection(self.dest, incoming)
    }

    fn has_collection(&self, incoming: &str) -> bool {
        self.collections
            .get_by_incoming_name(incoming)
            .is_some_and(|entity| self.collections.handle(self.dest, entity).is_some())
    }

    /// Create `incoming` and the missing part of its ancestor chain, wired
    /// down from the root collection
    ///
    /// Wiring stops at the first ancestor that already exists.
    fn wire_collection_chain(&mut self, incoming: &str) -> Result<CollectionId> {
        let mut chain = Vec::new();
        ancestor_chain(incoming, &mut chain, &self.snapshot.collection_set);

        let leaf = self.collection_for(incoming)?;
        let mut child = leaf;
        for name in chain.iter().skip(1) {
            let existed = self.has_collection(name);
            let parent = self.collection_for(name)?;
            self.collections
                .link_collection_to_collection(self.dest, child, parent)?;
            if existed {
                return Ok(leaf);
            }
            child = parent;
        }
        let root = self.root_collection()?;
        self.collections
            .link_collection_to_collection(self.dest, child, root)?;
        Ok(leaf)
    }

    fn rebuild_hierarchy(&mut self) -> Result<()> {
        info!("Create Collection Hierarchy");
        let snapshot = self.snapshot;
        let wanted = &snapshot.objects_collection_list;

        for (child, parents) in &snapshot.parent_collections {
            if !wanted.contains(child) {
                continue;
            }
            for parent in parents.iter().filter(|p| wanted.contains(p)) {
                let child_id = self.collection_for(child)?;
                let parent_id = self.collection_for(parent)?;
                self.collections
                    .link_collection_to_collection(self.dest, child_id, parent_id)?;
            }
        }

        info!("Link Objects to Collection");
        let root = self.root_collection()?;
        for name in &snapshot.selection {
            let Some(&object) = self.imported.get(name) else {
                continue;
            };
            let users = snapshot.memberships.get(name).cloned().unwrap_or_default();
            let mut placed = false;
            for collection in &users {
                if !snapshot.parent_collections.contains_key(collection) {
                    continue;
                }
                let id = if self.has_collection(collection) {
                    self.collection_for(collection)?
                } else {
                    self.wire_collection_chain(collection)?
                };
                self.collections
                    .link_object_to_collection(self.dest, object, id)?;
                placed = true;
            }

            let in_root = users.contains(&snapshot.root_collection_name);
            if placed && !in_root {
                self.collections
                    .unlink_object_from_collection(self.dest, object, root)?;
            }
        }
        self.report.stages.push(ExportStage::RebuildHierarchy);
        Ok(())
    }

    fn place_dependencies(&mut self) -> Result<()> {
        if self.snapshot.have_dependencies() {
            let placement = if self.options.dependencies_in_dedicated_collection {
                self.link_dependencies_in_dedicated_collection()?;
                DependencyPlacement::Dedicated
            } else {
                if self.options.create_collection_hierarchy {
                    self.link_dependencies_in_their_respective_collection()?;
                } else {
                    info!("Dependencies stay in the root collection");
                }
                DependencyPlacement::Respective
            };
            self.report.dependency_placement = Some(placement);
        }
        self.report.stages.push(ExportStage::PlaceDependencies);
        Ok(())
    }

    fn link_dependencies_in_dedicated_collection(&mut self) -> Result<()> {
        let root = self.root_collection()?;
        let entity = self
            .collections
            .create_collection(self.dest, DEPENDENCIES_COLLECTION_NAME)?;
        info!(
            "Link Dependencies in \"{}\" collection",
            self.collections.resolve_name(&entity)
        );
        let dependencies = self.collections.require(self.dest, &entity)?;
        self.collections
            .link_collection_to_collection(self.dest, dependencies, root)?;

        for name in &self.snapshot.dependency_objects {
            let Some(&object) = self.imported.get(name) else {
                continue;
            };
            if !self.dest.collection(root)?.has_object(object) {
                continue;
            }
            self.collections
                .move_object_to_collection(self.dest, object, root, dependencies)?;
        }
        Ok(())
    }

    fn link_dependencies_in_their_respective_collection(&mut self) -> Result<()> {
        info!("Link Dependencies to their respective collection");
        let snapshot = self.snapshot;
        let root = self.root_collection()?;

        for name in &snapshot.dependency_objects {
            let Some(&object) = self.imported.get(name) else {
                continue;
            };
            if !self.dest.collection(root)?.has_object(object) {
                continue;
            }
            info!("Linking Dependency object \"{}\"", name);

            let chains = snapshot
                .all_objects_collection_hierarchy
                .get(name)
                .cloned()
                .unwrap_or_default();
            let mut placed = false;
            for chain in chains.iter().filter(|c| !c.is_empty()) {
                let mut parent = root;
                for incoming in chain.iter().rev() {
                    let id = self.collections.ensure_collection(self.dest, incoming)?;
                    self.collections
                        .link_collection_to_collection(self.dest, id, parent)?;
                    parent = id;
                }
                self.collections
                    .link_object_to_collection(self.dest, object, parent)?;
                placed = true;
            }
            if placed {
                self.collections
                    .unlink_object_from_collection(self.dest, object, root)?;
            }
        }
        Ok(())
    }

    fn cleanup(&mut self) -> Result<()> {
        if let Some(staging) = self.staging.take() {
            self.dest.remove_collection(staging)?;
            debug!("Removed staging collection");
        }

        if self.options.export_object_children {
            self.parent_children_hierarchy()?;
        }

        if self.options.export_mode == TransferMode::Append {
            self.make_imported_objects_local()?;
            self.report.resolved_dependencies = self
                .snapshot
                .dependencies
                .resolve_all(self.dest, &self.objects)?;
            if let Some(library) = self.library.take() {
                self.dest.remove_library_data(library, &self.previous)?;
            }
            self.apply_rename_pairs()?;
        } else if !self.options.imported_names.is_empty() {
            warn!("Rename pairs are only applied in APPEND mode");
        }

        self.report.stages.push(ExportStage::Cleanup);
        Ok(())
    }

    /// Parent imported children back to their imported parent
    fn parent_children_hierarchy(&mut self) -> Result<()> {
        for (parent, children) in &self.snapshot.objects_children {
            let Some(parent) = self.objects.get_by_incoming_name(parent).cloned() else {
                continue;
            };
            for child in children {
                let Some(child) = self.objects.get_by_incoming_name(child).cloned() else {
                    continue;
                };
                self.objects.parent(self.dest, &parent, &child, true)?;
            }
        }
        Ok(())
    }

    fn make_imported_objects_local(&mut self) -> Result<()> {
        info!("Make all imported objects local");
        let handles: Vec<ObjectId> = self.imported.values().copied().collect();
        for id in detach_order(self.dest, &handles) {
            info!("Make local : {}", self.dest.object(id)?.name());
            let local = self.dest.make_local(id)?;
            self.objects.rebind(self.dest, id, local)?;
            for handle in self.imported.values_mut().filter(|h| **h == id) {
                *handle = local;
            }
        }
        Ok(())
    }

    fn apply_rename_pairs(&mut self) -> Result<()> {
        let pairs = self.options.rename_pairs();
        if pairs.is_empty() {
            return Ok(());
        }
        for (old, new) in &pairs {
            let entity = self
                .objects
                .get_by_incoming_name(old)
                .or_else(|| self.objects.get_by_local_name(old))
                .cloned();
            let Some(entity) = entity else {
                warn!("{}, rename skipped", ExportError::lookup(LookupKind::Object, old));
                continue;
            };
            let id = self.objects.require(self.dest, &entity)?;
            let actual = rename_object(self.dest, id, new)?;
            self.objects.update_element_name(&entity, &actual);
            self.report.renamed.push((old.clone(), actual));
        }
        Ok(())
    }

    fn finalize(&mut self) {
        if self.options.wants_pack() {
            info!("Packing external data");
            let base = self.source_path().parent();
            let packed = self.dest.pack_all_relative_to(base);
            for (image, reason) in &packed.failed {
                error!("Cannot pack \"{}\": {}", image, reason);
            }
            self.report.packed = packed.packed;
            self.report.pack_failures = packed.failed;
        } else if self.options.pack_external_data {
            warn!("External data is only packed in APPEND mode");
        }
    }

    fn finish(self) -> ExportReport {
        let dest: &Document = self.dest;
        let mut report = self.report;
        for (incoming, id) in &self.imported {
            if let Ok(object) = dest.object(*id) {
                report
                    .objects
                    .insert(incoming.clone(), object.name().to_string());
            }
        }
        report.collections_created = self
            .collections
            .entities()
            .iter()
            .filter(|e| self.collections.handle(dest, e).is_some())
            .map(|e| self.collections.resolve_name(e).to_string())
            .collect();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_document::{Modifier, ModifierKind, Object};

    fn source() -> Document {
        let mut doc = Document::new();
        let root = doc.scene_root(doc.active_scene()).unwrap();
        let props = doc.new_collection("Props");
        doc.link_collection(root, props).unwrap();

        let cutter = doc.add_object(Object::new("Cutter"));
        let crate_id = doc.add_object(
            Object::new("Crate").with_modifier(Modifier::new("Boolean", ModifierKind::boolean(cutter))),
        );
        doc.link_object(props, crate_id).unwrap();
        doc.link_object(root, cutter).unwrap();
        doc
    }

    fn options() -> ExportOptions {
        ExportOptions {
            source_file: "/assets/props.json".into(),
            destination_file: "/out/crate.json".into(),
            source_object_list: vec!["Crate".into()],
            ..Default::default()
        }
    }

    #[test]
    fn test_stages_run_in_order() {
        let command = ExportCommand::with_source(options(), source()).unwrap();
        let mut dest = Document::startup();
        let report = command.execute(&mut dest).unwrap();

        assert!(report.succeeded());
        assert_eq!(
            report.stages,
            vec![
                ExportStage::CleanDestination,
                ExportStage::StageRawImport,
                ExportStage::PlaceIntoTargetGroup,
                ExportStage::RebuildHierarchy,
                ExportStage::PlaceDependencies,
                ExportStage::Cleanup,
            ]
        );
        assert!(dest.collection_by_name(STAGING_COLLECTION_NAME).is_none());
        assert!(dest.libraries().next().is_none());
        assert!(dest.objects().all(|(_, o)| !o.is_linked()));
    }

    #[test]
    fn test_clean_file_removes_startup_content() {
        let command = ExportCommand::with_source(options(), source()).unwrap();
        let mut dest = Document::startup();
        command.execute(&mut dest).unwrap();
        assert!(dest.object_by_name("Cube").is_none());
        assert!(dest.collection_by_name("Collection").is_none());

        let mut keep = options();
        keep.export_to_clean_file = false;
        let command = ExportCommand::with_source(keep, source()).unwrap();
        let mut dest = Document::startup();
        command.execute(&mut dest).unwrap();
        assert!(dest.object_by_name("Cube").is_some());
    }

    #[test]
    fn test_link_mode_keeps_library() {
        let mut opts = options();
        opts.export_mode = TransferMode::Link;
        let command = ExportCommand::with_source(opts, source()).unwrap();
        let mut dest = Document::startup();
        let report = command.execute(&mut dest).unwrap();

        assert!(report.succeeded());
        let crate_id = dest.object_by_name("Crate").unwrap();
        assert!(dest.object(crate_id).unwrap().is_linked());
        assert!(dest.library_by_path(Path::new("/assets/props.json")).is_some());
        let props = dest.collection_by_name("Props").unwrap();
        assert!(dest.collection(props).unwrap().has_object(crate_id));
    }

    #[test]
    fn test_dependencies_repointed_after_detach() {
        let command = ExportCommand::with_source(options(), source()).unwrap();
        let mut dest = Document::startup();
        let report = command.execute(&mut dest).unwrap();

        let crate_id = dest.object_by_name("Crate").unwrap();
        let cutter = dest.object_by_name("Cutter").unwrap();
        let crate_obj = dest.object(crate_id).unwrap();
        assert_eq!(crate_obj.modifiers[0].kind.reference("object"), Some(&cutter));
        assert_eq!(report.objects["Cutter"], "Cutter");
    }

    #[test]
    fn test_target_scene() {
        let mut opts = options();
        opts.export_to_clean_file = false;
        opts.target_scene = Some("Layout".into());
        let command = ExportCommand::with_source(opts, source()).unwrap();

        let mut dest = Document::startup();
        let layout = dest.new_scene("Layout");
        command.execute(&mut dest).unwrap();
        assert_eq!(dest.active_scene(), layout);
        let crate_id = dest.object_by_name("Crate").unwrap();
        assert!(dest.scene_objects(layout).unwrap().contains(&crate_id));

        // Unknown target scene: the current scene is used
        let mut opts = options();
        opts.target_scene = Some("Missing".into());
        let command = ExportCommand::with_source(opts, source()).unwrap();
        let mut dest = Document::startup();
        let current = dest.active_scene();
        assert!(command.execute(&mut dest).unwrap().succeeded());
        assert_eq!(dest.active_scene(), current);
    }

    #[test]
    fn test_scene_import_replaces_leftover_scene() {
        let mut opts = options();
        opts.source_data = SourceKind::Scene;
        opts.source_object_list.clear();
        let command = ExportCommand::with_source(opts, source()).unwrap();

        let mut dest = Document::startup();
        let report = command.execute(&mut dest).unwrap();
        assert!(report.succeeded());
        assert_eq!(dest.scene_count(), 1);
        let scene = dest.active_scene();
        assert_eq!(dest.scene_objects(scene).unwrap().len(), 2);
        assert_eq!(report.objects.len(), 2);
    }

    #[test]
    fn test_new_validates_once_before_loading() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("props.json");
        source().save(&source_path).unwrap();

        let mut opts = options();
        opts.source_file = source_path;
        opts.export_in_new_collection = true;
        opts.new_collection_name.clear();
        let command = ExportCommand::new(opts).unwrap();
        assert_eq!(command.warnings().len(), 1);

        // Configuration errors win over the missing source file
        let mut opts = options();
        opts.source_file = dir.path().join("missing.json");
        opts.imported_names = vec!["Crate".into()];
        let err = ExportCommand::new(opts).err().unwrap();
        assert!(matches!(err, ExportError::Configuration(_)));
    }

    #[test]
    fn test_rename_pairs_only_in_append() {
        let mut opts = options();
        opts.imported_names = vec!["Crate".into()];
        opts.new_names = vec!["Chest".into()];
        let command = ExportCommand::with_source(opts.clone(), source()).unwrap();
        let mut dest = Document::startup();
        let report = command.execute(&mut dest).unwrap();
        assert_eq!(report.renamed, vec![("Crate".to_string(), "Chest".to_string())]);
        assert!(dest.object_by_name("Chest").is_some());

        opts.export_mode = TransferMode::Link;
        let command = ExportCommand::with_source(opts, source()).unwrap();
        let mut dest = Document::startup();
        let report = command.execute(&mut dest).unwrap();
        assert!(report.renamed.is_empty());
        assert!(dest.object_by_name("Crate").is_some());
    }
}
