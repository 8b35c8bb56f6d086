//! Source-side snapshot of an export
//!
//! Everything the pipeline needs to know about the source document is read
//! up front, by name, before the destination is touched: the expanded
//! selection, the collection tree and each object's memberships.

use std::collections::{HashSet, VecDeque};

use indexmap::IndexMap;
use log::debug;
use void_document::{Document, ObjectId};

use crate::dependencies::DependencyResolver;
use crate::error::{ExportError, LookupKind, Result};
use crate::hierarchy::{
    all_collection_hierarchies, objects_collection_hierarchy, CollectionSet, HierarchyWalker,
    ParentLookup,
};
use crate::options::ExportOptions;

/// Names and tables read from the source document
#[derive(Debug, Clone, Default)]
pub struct ExportSnapshot {
    /// Object name -> names of its direct children, breadth-first from the
    /// requested objects
    pub objects_children: IndexMap<String, Vec<String>>,
    /// Requested objects, plus their children when children are exported
    pub selection: Vec<String>,
    /// Objects reached only through dependencies
    pub dependency_objects: Vec<String>,
    pub dependencies: DependencyResolver,
    pub parent_collections: ParentLookup,
    /// Source collections of every imported object
    pub memberships: IndexMap<String, Vec<String>>,
    pub root_collection_name: String,
    pub collections_in_scene: Vec<String>,
    pub collection_set: CollectionSet,
    /// Leaf-first ancestor chain of each selected object
    pub objects_collection_hierarchy: IndexMap<String, Vec<String>>,
    /// Root name, then every collection on a selected object's chain
    pub objects_collection_list: Vec<String>,
    /// Every in-scope ancestor chain of every imported object
    pub all_objects_collection_hierarchy: IndexMap<String, Vec<Vec<String>>>,
}

impl ExportSnapshot {
    /// Read the source scene and expand the requested selection
    ///
    /// A requested object missing from the source is a lookup error; the
    /// export stops before the destination is modified.
    pub fn build(source: &Document, options: &ExportOptions) -> Result<Self> {
        let scene = source
            .scene_by_name_in(&options.source_scene_name, None)
            .ok_or_else(|| ExportError::lookup(LookupKind::Scene, &options.source_scene_name))?;
        let root = source.scene_root(scene)?;

        let mut requested: Vec<ObjectId> = Vec::new();
        for name in &options.source_object_list {
            let id = source
                .object_by_name_in(name, None)
                .ok_or_else(|| ExportError::lookup(LookupKind::Object, name))?;
            if !requested.contains(&id) {
                requested.push(id);
            }
        }

        let (objects_children, children) = children_breadth_first(source, &requested)?;
        let mut explicit = requested;
        if options.export_object_children {
            for child in children {
                if !explicit.contains(&child) {
                    explicit.push(child);
                }
            }
        }

        let mut dependencies = DependencyResolver::new();
        let extras = dependencies.expand(source, &explicit)?;

        let selection = names_of(source, &explicit)?;
        let dependency_objects = names_of(source, &extras)?;

        let mut memberships = IndexMap::new();
        for id in explicit.iter().chain(&extras) {
            let users = source
                .users_collection(*id)
                .into_iter()
                .map(|c| source.collection(c).map(|c| c.name().to_string()))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            memberships.insert(source.object(*id)?.name().to_string(), users);
        }

        let walker = HierarchyWalker::new(source, root);
        let parent_collections = walker.parent_lookup();
        let root_collection_name = walker.root_name().to_string();
        let collections_in_scene = walker.collection_names();
        let collection_set = walker.collection_set();

        let selected: IndexMap<String, Vec<String>> = memberships
            .iter()
            .filter(|(name, _)| selection.contains(name))
            .map(|(name, users)| (name.clone(), users.clone()))
            .collect();
        let objects_collection_hierarchy =
            objects_collection_hierarchy(&selected, &collections_in_scene, &collection_set);

        let mut objects_collection_list = vec![root_collection_name.clone()];
        for chain in objects_collection_hierarchy.values() {
            for name in chain {
                if !objects_collection_list.contains(name) {
                    objects_collection_list.push(name.clone());
                }
            }
        }

        let all_objects_collection_hierarchy =
            all_collection_hierarchies(&memberships, &collections_in_scene, &collection_set);

        Ok(Self {
            objects_children,
            selection,
            dependency_objects,
            dependencies,
            parent_collections,
            memberships,
            root_collection_name,
            collections_in_scene,
            collection_set,
            objects_collection_hierarchy,
            objects_collection_list,
            all_objects_collection_hierarchy,
        })
    }

    /// Selection followed by dependency-only objects
    pub fn import_list(&self) -> Vec<String> {
        self.selection
            .iter()
            .chain(&self.dependency_objects)
            .cloned()
            .collect()
    }

    pub fn is_selected(&self, name: &str) -> bool {
        self.selection.iter().any(|s| s == name)
    }

    pub fn have_dependencies(&self) -> bool {
        !self.dependency_objects.is_empty()
    }

    pub fn log(&self) {
        debug!("selection = {:?}", self.selection);
        debug!("dependency_objects = {:?}", self.dependency_objects);
        debug!("objects_children = {:?}", self.objects_children);
        debug!("collections_in_scene = {:?}", self.collections_in_scene);
        debug!("parent_collections = {:?}", self.parent_collections);
        debug!("memberships = {:?}", self.memberships);
        debug!("root_collection_name = {}", self.root_collection_name);
        debug!("objects_collection_list = {:?}", self.objects_collection_list);
        debug!("objects_collection_hierarchy = {:?}", self.objects_collection_hierarchy);
        debug!(
            "all_objects_collection_hierarchy = {:?}",
            self.all_objects_collection_hierarchy
        );
        for (name, dependencies) in self.dependencies.iter() {
            if !dependencies.is_empty() {
                debug!("object_dependencies[{}] = {:?}", name, dependencies.modifiers);
            }
        }
    }
}

/// Children table of `roots` and every descendant reached, breadth-first
fn children_breadth_first(
    doc: &Document,
    roots: &[ObjectId],
) -> Result<(IndexMap<String, Vec<String>>, Vec<ObjectId>)> {
    let mut table = IndexMap::new();
    let mut discovered = Vec::new();
    let mut visited: HashSet<ObjectId> = roots.iter().copied().collect();
    let mut queue: VecDeque<ObjectId> = roots.iter().copied().collect();

    while let Some(id) = queue.pop_front() {
        let children = doc.children_of(id);
        table.insert(doc.object(id)?.name().to_string(), names_of(doc, &children)?);
        for child in children {
            if visited.insert(child) {
                discovered.push(child);
                queue.push_back(child);
            }
        }
    }
    Ok((table, discovered))
}

fn names_of(doc: &Document, ids: &[ObjectId]) -> Result<Vec<String>> {
    ids.iter()
        .map(|id| Ok(doc.object(*id)?.name().to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_document::{Modifier, ModifierKind, Object, SCENE_ROOT_NAME};

    /// A > B > C; Obj1 in C points at Obj2 in A; Child is parented to Obj1
    fn source() -> Document {
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
        let child = doc.add_object(Object::new("Child"));
        doc.set_parent(child, Some(obj1), true).unwrap();
        doc.link_object(c, obj1).unwrap();
        doc.link_object(a, obj2).unwrap();
        doc.link_object(c, child).unwrap();
        doc
    }

    fn options(children: bool) -> ExportOptions {
        ExportOptions {
            source_file: "in.json".into(),
            destination_file: "out.json".into(),
            source_object_list: vec!["Obj1".into()],
            export_object_children: children,
            ..Default::default()
        }
    }

    #[test]
    fn test_selection_and_dependencies() {
        let snapshot = ExportSnapshot::build(&source(), &options(false)).unwrap();

        assert_eq!(snapshot.selection, vec!["Obj1"]);
        assert_eq!(snapshot.dependency_objects, vec!["Obj2"]);
        assert_eq!(snapshot.import_list(), vec!["Obj1", "Obj2"]);
        assert_eq!(snapshot.objects_children["Obj1"], vec!["Child"]);
        assert!(snapshot.have_dependencies());
    }

    #[test]
    fn test_children_join_selection() {
        let snapshot = ExportSnapshot::build(&source(), &options(true)).unwrap();
        assert_eq!(snapshot.selection, vec!["Obj1", "Child"]);
        assert!(snapshot.is_selected("Child"));
        assert!(!snapshot.is_selected("Obj2"));
    }

    #[test]
    fn test_collection_tables() {
        let snapshot = ExportSnapshot::build(&source(), &options(false)).unwrap();

        assert_eq!(snapshot.root_collection_name, SCENE_ROOT_NAME);
        assert_eq!(snapshot.collections_in_scene, vec!["A", "B", "C"]);
        assert_eq!(snapshot.objects_collection_hierarchy["Obj1"], vec!["C", "B", "A"]);
        assert_eq!(
            snapshot.objects_collection_list,
            vec![SCENE_ROOT_NAME, "C", "B", "A"]
        );
        assert_eq!(snapshot.all_objects_collection_hierarchy["Obj2"], vec![vec!["A"]]);
        assert_eq!(snapshot.memberships["Obj2"], vec!["A"]);
    }

    #[test]
    fn test_missing_object_is_lookup_error() {
        let mut opts = options(false);
        opts.source_object_list.push("Ghost".into());
        let err = ExportSnapshot::build(&source(), &opts).unwrap_err();
        assert!(matches!(err, ExportError::Lookup { kind: LookupKind::Object, .. }));
    }

    #[test]
    fn test_missing_scene_is_lookup_error() {
        let mut opts = options(false);
        opts.source_scene_name = "Nowhere".into();
        let err = ExportSnapshot::build(&source(), &opts).unwrap_err();
        assert!(matches!(err, ExportError::Lookup { kind: LookupKind::Scene, .. }));
    }
}
