//! Integration tests for void_export
//!
//! Each test builds a source document, runs the pipeline against a
//! destination and checks the resulting collection tree and names.

use std::path::Path;

use void_document::prelude::*;
use void_document::{DocumentFile, Image};
use void_export::prelude::*;
use void_export::{
    DependencyPlacement, NameKey, NameReconciler, DEPENDENCIES_COLLECTION_NAME,
};

/// Scene Collection > A > B > C; `Obj1` in C has a Boolean on `Obj2` in A
fn nested_source() -> Document {
    let mut doc = Document::new();
    let root = doc.scene_root(doc.active_scene()).unwrap();
    let a = doc.new_collection("A");
    let b = doc.new_collection("B");
    let c = doc.new_collection("C");
    doc.link_collection(root, a).unwrap();
    doc.link_collection(a, b).unwrap();
    doc.link_collection(b, c).unwrap();

    let obj2 = doc.add_object(Object::new("Obj2"));
    let obj1 = doc.add_object(
        Object::new("Obj1").with_modifier(Modifier::new("Boolean", ModifierKind::boolean(obj2))),
    );
    doc.link_object(c, obj1).unwrap();
    doc.link_object(a, obj2).unwrap();
    doc
}

fn options_for(objects: &[&str]) -> ExportOptions {
    ExportOptions {
        source_file: "/assets/source.json".into(),
        destination_file: "/out/destination.json".into(),
        source_object_list: objects.iter().map(|o| o.to_string()).collect(),
        ..Default::default()
    }
}

fn export(options: ExportOptions, source: Document, dest: &mut Document) -> ExportReport {
    let command = ExportCommand::with_source(options, source).unwrap();
    command.execute(dest).unwrap()
}

fn collection(doc: &Document, name: &str) -> CollectionId {
    doc.collection_by_name(name)
        .unwrap_or_else(|| panic!("collection {} missing", name))
}

fn object(doc: &Document, name: &str) -> ObjectId {
    doc.object_by_name(name)
        .unwrap_or_else(|| panic!("object {} missing", name))
}

fn root(doc: &Document) -> CollectionId {
    doc.scene_root(doc.active_scene()).unwrap()
}

/// Collection names from the object's first collection up to the scene root
fn chain_of(doc: &Document, object: ObjectId) -> Vec<String> {
    let mut chain = Vec::new();
    let mut current = doc.users_collection(object).first().copied();
    while let Some(id) = current {
        let collection = doc.collection(id).unwrap();
        if collection.is_scene_root() {
            break;
        }
        chain.push(collection.name().to_string());
        current = doc.collection_parents(id).first().copied();
    }
    chain
}

#[test]
fn test_idempotent_naming() {
    let mut names: NameReconciler<u32> = NameReconciler::new();
    names.register(NameKey::Preexisting(0), "Rock");

    let first = names.unique_name(NameKey::Handle(1), "Rock", None, true);
    let again = names.unique_name(NameKey::Handle(1), "Rock", None, true);
    let other = names.unique_name(NameKey::Handle(2), "Rock", None, true);

    assert_eq!(first, "Rock.001");
    assert_eq!(first, again);
    assert_eq!(other, "Rock.002");
}

#[test]
fn test_no_destructive_rename() {
    let mut dest = Document::new();
    let a = dest.new_collection("A");
    let deps = dest.new_collection(DEPENDENCIES_COLLECTION_NAME);
    dest.link_collection(root(&dest), a).unwrap();
    dest.link_collection(root(&dest), deps).unwrap();
    let obj1 = dest.add_object(Object::new("Obj1"));
    let obj2 = dest.add_object(Object::new("Obj2"));
    dest.link_object(a, obj1).unwrap();

    let mut options = options_for(&["Obj1"]);
    options.file_override = OverrideMode::AppendLink;
    options.dependencies_in_dedicated_collection = true;
    let report = export(options, nested_source(), &mut dest);
    assert!(report.succeeded());

    assert_eq!(dest.collection(a).unwrap().name(), "A");
    assert_eq!(dest.collection(deps).unwrap().name(), DEPENDENCIES_COLLECTION_NAME);
    assert_eq!(dest.object(obj1).unwrap().name(), "Obj1");
    assert_eq!(dest.object(obj2).unwrap().name(), "Obj2");
    assert!(dest.collection(a).unwrap().has_object(obj1));

    assert_eq!(report.objects["Obj1"], "Obj1.001");
    assert_eq!(report.objects["Obj2"], "Obj2.001");
    assert!(report.collections_created.contains(&"A.001".to_string()));
    assert!(report
        .collections_created
        .contains(&format!("{}.001", DEPENDENCIES_COLLECTION_NAME)));
}

#[test]
fn test_closure_completeness_with_cycles() {
    let mut source = Document::new();
    let scene_root = root(&source);
    let d1 = source.add_object(Object::new("D1"));
    let d2 = source.add_object(
        Object::new("D2").with_modifier(Modifier::new("Boolean", ModifierKind::boolean(d1))),
    );
    source
        .object_mut(d1)
        .unwrap()
        .modifiers
        .push(Modifier::new("Boolean", ModifierKind::boolean(d2)));

    let parent = source.add_object(
        Object::new("Parent").with_modifier(Modifier::new("Boolean", ModifierKind::boolean(d1))),
    );
    let child = source.add_object(Object::new("Child"));
    let grandchild = source.add_object(
        Object::new("Grandchild").with_modifier(Modifier::new("Mirror", ModifierKind::mirror(parent))),
    );
    source.set_parent(child, Some(parent), true).unwrap();
    source.set_parent(grandchild, Some(child), true).unwrap();
    for id in [d1, d2, parent, child, grandchild] {
        source.link_object(scene_root, id).unwrap();
    }

    let mut options = options_for(&["Parent"]);
    options.export_object_children = true;
    let mut dest = Document::startup();
    let report = export(options, source, &mut dest);

    assert!(report.succeeded());
    let mut imported: Vec<&str> = report.objects.keys().map(String::as_str).collect();
    imported.sort_unstable();
    assert_eq!(imported, vec!["Child", "D1", "D2", "Grandchild", "Parent"]);

    let parent = object(&dest, "Parent");
    let child = object(&dest, "Child");
    let grandchild = object(&dest, "Grandchild");
    assert_eq!(dest.object(child).unwrap().parent, Some(parent));
    assert_eq!(dest.object(grandchild).unwrap().parent, Some(child));
    assert_eq!(
        dest.object(grandchild).unwrap().modifiers[0].kind.reference("mirror_object"),
        Some(&parent)
    );
}

#[test]
fn test_hierarchy_round_trip() {
    // Scene Collection > L1 > {L2a > Leaf1, L2b > Leaf2}
    let mut source = Document::new();
    let scene_root = root(&source);
    let l1 = source.new_collection("L1");
    let l2a = source.new_collection("L2a");
    let l2b = source.new_collection("L2b");
    let leaf1 = source.new_collection("Leaf1");
    let leaf2 = source.new_collection("Leaf2");
    source.link_collection(scene_root, l1).unwrap();
    source.link_collection(l1, l2a).unwrap();
    source.link_collection(l1, l2b).unwrap();
    source.link_collection(l2a, leaf1).unwrap();
    source.link_collection(l2b, leaf2).unwrap();
    let rock = source.add_object(Object::new("Rock"));
    let tree = source.add_object(Object::new("Tree"));
    source.link_object(leaf1, rock).unwrap();
    source.link_object(leaf2, tree).unwrap();
    let expected_rock = chain_of(&source, rock);
    let expected_tree = chain_of(&source, tree);
    assert_eq!(expected_rock, vec!["Leaf1", "L2a", "L1"]);

    // A pre-existing L1 forces the rebuilt one to take a suffix
    let mut dest = Document::new();
    let existing = dest.new_collection("L1");
    dest.link_collection(root(&dest), existing).unwrap();

    let mut options = options_for(&["Rock", "Tree"]);
    options.file_override = OverrideMode::AppendLink;
    let report = export(options, source, &mut dest);
    assert!(report.succeeded());

    let strip = |chain: Vec<String>| -> Vec<String> {
        chain
            .into_iter()
            .map(|name| void_export::strip_numeric_suffix(&name).0)
            .collect()
    };
    let rock_chain = chain_of(&dest, object(&dest, "Rock"));
    let tree_chain = chain_of(&dest, object(&dest, "Tree"));
    assert_eq!(rock_chain, vec!["Leaf1", "L2a", "L1.001"]);
    assert_eq!(strip(rock_chain), expected_rock);
    assert_eq!(strip(tree_chain), expected_tree);

    // Both leaves share one rebuilt L1
    let rebuilt = collection(&dest, "L1.001");
    assert_eq!(dest.collection(rebuilt).unwrap().children().len(), 2);
    assert!(dest.collection(existing).unwrap().children().is_empty());
}

#[test]
fn test_dependency_placement_exclusivity() {
    for dedicated in [true, false] {
        let mut options = options_for(&["Obj1"]);
        options.dependencies_in_dedicated_collection = dedicated;
        let mut dest = Document::startup();
        let report = export(options, nested_source(), &mut dest);

        let expected = if dedicated {
            DependencyPlacement::Dedicated
        } else {
            DependencyPlacement::Respective
        };
        assert_eq!(report.dependency_placement, Some(expected));
        assert_eq!(
            dest.collection_by_name(DEPENDENCIES_COLLECTION_NAME).is_some(),
            dedicated
        );
    }

    // Nothing pulled in beyond the selection: no placement at all
    let mut dest = Document::startup();
    let report = export(options_for(&["Obj2"]), nested_source(), &mut dest);
    assert_eq!(report.dependency_placement, None);
    assert!(dest.collection_by_name(DEPENDENCIES_COLLECTION_NAME).is_none());
}

#[test]
fn test_dependencies_in_dedicated_collection() {
    let mut options = options_for(&["Obj1"]);
    options.dependencies_in_dedicated_collection = true;
    let mut dest = Document::startup();
    let report = export(options, nested_source(), &mut dest);
    assert!(report.succeeded());

    let root = root(&dest);
    let a = collection(&dest, "A");
    let b = collection(&dest, "B");
    let c = collection(&dest, "C");
    let deps = collection(&dest, DEPENDENCIES_COLLECTION_NAME);
    let obj1 = object(&dest, "Obj1");
    let obj2 = object(&dest, "Obj2");

    assert!(dest.collection(root).unwrap().has_child(a));
    assert!(dest.collection(a).unwrap().has_child(b));
    assert!(dest.collection(b).unwrap().has_child(c));
    assert!(dest.collection(root).unwrap().has_child(deps));

    assert_eq!(dest.users_collection(obj1), vec![c]);
    assert_eq!(dest.users_collection(obj2), vec![deps]);
    assert_eq!(
        dest.object(obj1).unwrap().modifiers[0].kind.reference("object"),
        Some(&obj2)
    );
}

#[test]
fn test_dependencies_in_respective_collection() {
    let mut dest = Document::startup();
    let report = export(options_for(&["Obj1"]), nested_source(), &mut dest);
    assert!(report.succeeded());

    let a = collection(&dest, "A");
    let c = collection(&dest, "C");
    assert_eq!(dest.users_collection(object(&dest, "Obj2")), vec![a]);
    assert_eq!(dest.users_collection(object(&dest, "Obj1")), vec![c]);
    assert!(dest.collection_by_name(DEPENDENCIES_COLLECTION_NAME).is_none());
    assert!(dest.collection(root(&dest)).unwrap().objects().is_empty());
}

#[test]
fn test_empty_new_collection_name_falls_back() {
    let mut options = options_for(&["Obj1"]);
    options.export_in_new_collection = true;
    options.new_collection_name = String::new();
    options.create_collection_hierarchy = false;

    let mut dest = Document::startup();
    let report = export(options, nested_source(), &mut dest);

    assert!(report.succeeded());
    assert_eq!(report.warnings.len(), 1);
    let obj1 = object(&dest, "Obj1");
    let obj2 = object(&dest, "Obj2");
    assert_eq!(dest.users_collection(obj1), vec![root(&dest)]);
    // No hierarchy: dependencies stay in the root collection
    assert_eq!(dest.users_collection(obj2), vec![root(&dest)]);
    assert_eq!(report.dependency_placement, Some(DependencyPlacement::Respective));
}

#[test]
fn test_export_in_new_collection() {
    let mut options = options_for(&["Obj1"]);
    options.export_in_new_collection = true;
    options.dependencies_in_dedicated_collection = true;

    let mut dest = Document::startup();
    export(options, nested_source(), &mut dest);

    let wrapper = collection(&dest, "Root Collection");
    let a = collection(&dest, "A");
    let deps = collection(&dest, DEPENDENCIES_COLLECTION_NAME);
    assert!(dest.collection(root(&dest)).unwrap().has_child(wrapper));
    assert!(dest.collection(wrapper).unwrap().has_child(a));
    assert!(dest.collection(wrapper).unwrap().has_child(deps));
    assert!(dest.collection(wrapper).unwrap().objects().is_empty());
}

#[test]
fn test_run_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("source.json");
    let dest_path = dir.path().join("out").join("destination.toml");

    let mut source = nested_source();
    std::fs::create_dir_all(dir.path().join("textures")).unwrap();
    std::fs::write(dir.path().join("textures/wood.png"), b"wood").unwrap();
    let image = source.add_image(Image::new("wood", "textures/wood.png"));
    let obj1 = source.object_by_name("Obj1").unwrap();
    source.object_mut(obj1).unwrap().images.push(image);
    source.save(&source_path).unwrap();

    let options = ExportOptions {
        source_file: source_path.clone(),
        destination_file: dest_path.clone(),
        source_object_list: vec!["Obj1".into()],
        pack_external_data: true,
        dependencies_in_dedicated_collection: true,
        ..Default::default()
    };
    let report = ExportCommand::new(options.clone()).unwrap().run().unwrap();
    assert!(report.succeeded());
    assert!(report.completed(ExportStage::Finalize));
    assert_eq!(report.packed, vec!["wood".to_string()]);

    let saved = Document::load(&dest_path).unwrap();
    assert!(saved.object_by_name("Obj1").is_some());
    assert!(saved.collection_by_name(DEPENDENCIES_COLLECTION_NAME).is_some());
    assert!(saved.libraries().next().is_none());
    assert!(saved.images().all(|(_, i)| i.is_packed()));
    assert!(!saved.workspaces().is_empty());

    // Merging the same export again never renames what is already there
    let again = ExportOptions {
        file_override: OverrideMode::AppendLink,
        ..options
    };
    let report = ExportCommand::new(again).unwrap().run().unwrap();
    assert_eq!(report.objects["Obj1"], "Obj1.001");

    let merged = Document::load(&dest_path).unwrap();
    assert!(merged.object_by_name("Obj1").is_some());
    assert!(merged.object_by_name("Obj1.001").is_some());
    assert!(merged.collection_by_name("Dependencies.001").is_some());
}

#[test]
fn test_append_link_without_destination_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    let source_path = dir.path().join("source.json");
    nested_source().save(&source_path).unwrap();

    let options = ExportOptions {
        source_file: source_path,
        destination_file: dir.path().join("missing.json"),
        file_override: OverrideMode::AppendLink,
        source_object_list: vec!["Obj2".into()],
        ..Default::default()
    };
    let report = ExportCommand::new(options).unwrap().run().unwrap();
    assert!(report.succeeded());
    assert!(report.completed(ExportStage::CleanDestination));
    assert!(report.warnings.iter().any(|w| w.contains("falling back")));
    assert!(Path::new(&report.destination).exists());
}

#[test]
fn test_missing_source_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        source_file: dir.path().join("nowhere.json"),
        destination_file: dir.path().join("out.json"),
        source_object_list: vec!["Obj1".into()],
        ..Default::default()
    };
    let err = ExportCommand::new(options).err().unwrap();
    assert!(err.is_fatal());
    assert!(!dir.path().join("out.json").exists());
}

#[test]
fn test_missing_selection_aborts_before_mutation() {
    let options = options_for(&["Ghost"]);
    let err = ExportCommand::with_source(options, nested_source()).err().unwrap();
    assert!(matches!(err, ExportError::Lookup { .. }));
}

#[test]
fn test_rename_pairs_target_the_imported_object() {
    let mut dest = Document::new();
    let existing = dest.add_object(Object::new("Obj2"));
    dest.link_object(root(&dest), existing).unwrap();

    let mut options = options_for(&["Obj2"]);
    options.file_override = OverrideMode::AppendLink;
    options.imported_names = vec!["Obj2".into()];
    options.new_names = vec!["Renamed".into()];
    let report = export(options, nested_source(), &mut dest);
    assert!(report.succeeded());

    assert_eq!(dest.object(existing).unwrap().name(), "Obj2");
    assert_eq!(report.objects["Obj2"], "Renamed");
    assert_eq!(report.renamed, vec![("Obj2".to_string(), "Renamed".to_string())]);
    assert_ne!(object(&dest, "Renamed"), existing);
}

#[test]
fn test_append_keeps_previously_linked_data() {
    let mut dest = Document::new();
    let mut link = options_for(&["Obj2"]);
    link.file_override = OverrideMode::AppendLink;
    link.export_mode = TransferMode::Link;
    assert!(export(link, nested_source(), &mut dest).succeeded());
    let linked = object(&dest, "Obj2");
    assert!(dest.object(linked).unwrap().is_linked());

    let mut append = options_for(&["Obj2"]);
    append.file_override = OverrideMode::AppendLink;
    let report = export(append, nested_source(), &mut dest);
    assert!(report.succeeded());

    assert!(dest.object(linked).unwrap().is_linked());
    assert_eq!(dest.object_count(), 2);
    let appended = object(&dest, &report.objects["Obj2"]);
    assert_ne!(appended, linked);
    assert!(!dest.object(appended).unwrap().is_linked());
    assert!(dest.library_by_path(Path::new("/assets/source.json")).is_some());
}

#[test]
fn test_second_membership_is_wired_to_root() {
    // Scene Collection > {A > C, F > E}; Obj is in both C and E
    let mut source = Document::new();
    let scene_root = root(&source);
    let a = source.new_collection("A");
    let c = source.new_collection("C");
    let f = source.new_collection("F");
    let e = source.new_collection("E");
    source.link_collection(scene_root, a).unwrap();
    source.link_collection(a, c).unwrap();
    source.link_collection(scene_root, f).unwrap();
    source.link_collection(f, e).unwrap();
    let obj = source.add_object(Object::new("Obj"));
    source.link_object(c, obj).unwrap();
    source.link_object(e, obj).unwrap();

    let mut dest = Document::new();
    let report = export(options_for(&["Obj"]), source, &mut dest);
    assert!(report.succeeded());

    let dest_root = root(&dest);
    let f = collection(&dest, "F");
    let e = collection(&dest, "E");
    let obj = object(&dest, "Obj");
    assert_eq!(dest.collection_parents(f), vec![dest_root]);
    assert_eq!(dest.collection_parents(e), vec![f]);
    assert!(dest.collection(e).unwrap().has_object(obj));
    assert_eq!(chain_of(&dest, obj), vec!["C", "A"]);
    assert!(dest.descendants(dest_root).contains(&e));
    assert!(!dest.collection(dest_root).unwrap().has_object(obj));
}

#[test]
fn test_stage_error_still_saves_partial_result() {
    // Scene Collection > A > B, and B lists A as a child: a cyclic source
    let mut source = Document::new();
    let scene_root = root(&source);
    let a = source.new_collection("A");
    let b = source.new_collection("B");
    source.link_collection(scene_root, a).unwrap();
    source.link_collection(a, b).unwrap();
    let obj = source.add_object(Object::new("Obj"));
    source.link_object(b, obj).unwrap();

    let mut file = DocumentFile::from_document(&source).unwrap();
    let index = |name: &str| file.collections.iter().position(|c| c.name == name).unwrap();
    let (a_index, b_index) = (index("A"), index("B"));
    file.collections[b_index].children.push(a_index);
    let cyclic = file.into_document(Path::new("/assets/source.json")).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let dest_path = dir.path().join("partial.json");
    let options = ExportOptions {
        source_file: "/assets/source.json".into(),
        destination_file: dest_path.clone(),
        source_object_list: vec!["Obj".into()],
        ..Default::default()
    };
    let report = ExportCommand::with_source(options, cyclic).unwrap().run().unwrap();

    assert!(!report.succeeded());
    assert!(report.failure.as_deref().unwrap().contains("cycle"));
    assert!(report.completed(ExportStage::PlaceIntoTargetGroup));
    assert!(!report.completed(ExportStage::RebuildHierarchy));
    assert!(report.completed(ExportStage::Finalize));

    let saved = Document::load(&dest_path).unwrap();
    assert!(saved.object_by_name("Obj").is_some());
}
