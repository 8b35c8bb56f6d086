//! Object dependencies through modifier pointers
//!
//! Every modifier kind declares its reference-valued fields, so scanning is
//! a walk over that schema. Dependencies are recorded by name: after an
//! append pass the referenced objects may have new handles and names, and
//! [`ObjectDependencies::resolve_dependencies`] re-points the fields through
//! the object registry.

use std::collections::{HashMap, HashSet, VecDeque};

use indexmap::IndexMap;
use log::{debug, info, warn};
use serde::Serialize;
use void_document::{Document, ObjectId};

use crate::error::Result;
use crate::registry::ObjectRegistry;

/// Pointers held by one object's modifier stack
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ObjectDependencies {
    /// Modifier name -> (field name -> referenced object name)
    pub modifiers: IndexMap<String, IndexMap<String, String>>,
    /// Distinct referenced object names, in discovery order
    pub dependency_objects: Vec<String>,
}

impl ObjectDependencies {
    pub fn scan(doc: &Document, object: ObjectId) -> Result<Self> {
        let mut dependencies = Self::default();
        for modifier in &doc.object(object)?.modifiers {
            for (field, target) in modifier.references() {
                let name = doc.object(target)?.name().to_string();
                dependencies
                    .modifiers
                    .entry(modifier.name.clone())
                    .or_default()
                    .insert(field.to_string(), name.clone());
                if !dependencies.dependency_objects.contains(&name) {
                    dependencies.dependency_objects.push(name);
                }
            }
        }
        Ok(dependencies)
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty()
    }

    /// Point every recorded field of `object` at the current local handle
    /// of its target
    ///
    /// Targets the registry does not know are skipped with a warning.
    /// Returns the number of fields written.
    pub fn resolve_dependencies(
        &self,
        doc: &mut Document,
        object: ObjectId,
        registry: &ObjectRegistry,
    ) -> Result<usize> {
        let mut resolved = 0;
        for (modifier_name, fields) in &self.modifiers {
            for (field, target_name) in fields {
                let target = registry
                    .get_by_incoming_name(target_name)
                    .and_then(|entity| registry.handle(doc, entity).map(|h| (h, entity)));
                let Some((target, entity)) = target else {
                    warn!(
                        "Dependency \"{}\" of {}.{} is not available, skipped",
                        target_name, modifier_name, field
                    );
                    continue;
                };
                info!(
                    "Resolving dependencies, setting attr of {}.{} to {}",
                    modifier_name,
                    field,
                    registry.resolve_name(entity)
                );

                let modifier = doc
                    .object_mut(object)?
                    .modifiers
                    .iter_mut()
                    .find(|m| &m.name == modifier_name);
                match modifier {
                    Some(modifier) => {
                        if modifier.kind.set_reference(field, Some(target)) {
                            resolved += 1;
                        }
                    }
                    None => debug!("Modifier \"{}\" no longer exists", modifier_name),
                }
            }
        }
        Ok(resolved)
    }
}

/// Dependency tables of a set of objects, keyed by incoming object name
#[derive(Clone, Debug, Default, Serialize)]
pub struct DependencyResolver {
    objects: IndexMap<String, ObjectDependencies>,
}

impl DependencyResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the dependencies of `object` under its current name
    pub fn scan(&mut self, doc: &Document, object: ObjectId) -> Result<&ObjectDependencies> {
        let name = doc.object(object)?.name().to_string();
        let dependencies = ObjectDependencies::scan(doc, object)?;
        Ok(self.objects.entry(name).or_insert(dependencies))
    }

    /// Scan `seeds` and everything they reach through modifier pointers
    ///
    /// Returns the reached objects that are not seeds, in discovery order.
    /// Each object is visited once, so cyclic pointers terminate.
    pub fn expand(&mut self, doc: &Document, seeds: &[ObjectId]) -> Result<Vec<ObjectId>> {
        let mut visited: HashSet<ObjectId> = seeds.iter().copied().collect();
        let mut queue: VecDeque<ObjectId> = seeds.iter().copied().collect();
        let mut discovered = Vec::new();

        while let Some(id) = queue.pop_front() {
            self.scan(doc, id)?;
            let targets: Vec<ObjectId> = doc
                .object(id)?
                .modifiers
                .iter()
                .flat_map(|m| m.references().map(|(_, target)| target))
                .collect();
            for target in targets {
                if visited.insert(target) {
                    debug!("Dependency found: {}", doc.object(target)?.name());
                    discovered.push(target);
                    queue.push_back(target);
                }
            }
        }
        Ok(discovered)
    }

    pub fn get(&self, object_name: &str) -> Option<&ObjectDependencies> {
        self.objects.get(object_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ObjectDependencies)> {
        self.objects.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every distinct referenced name across all scanned objects
    pub fn dependency_objects(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for dependencies in self.objects.values() {
            for name in &dependencies.dependency_objects {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
        }
        names
    }

    /// Re-point the modifiers of every registered object
    pub fn resolve_all(&self, doc: &mut Document, registry: &ObjectRegistry) -> Result<usize> {
        info!("Resolve objects dependencies");
        let mut resolved = 0;
        for entity in registry.entities() {
            let Some(dependencies) = self.get(entity.incoming_name()) else {
                continue;
            };
            if dependencies.is_empty() {
                continue;
            }
            let object = registry.require(doc, entity)?;
            resolved += dependencies.resolve_dependencies(doc, object, registry)?;
        }
        Ok(resolved)
    }
}

/// Order `objects` so that every object comes before the objects it points
/// at, through modifiers or its parent
///
/// Detaching in this order lets each target become local in place once its
/// users are local. Objects caught in a pointer cycle keep their input
/// order at the end.
pub fn detach_order(doc: &Document, objects: &[ObjectId]) -> Vec<ObjectId> {
    let mut input: Vec<ObjectId> = Vec::with_capacity(objects.len());
    for id in objects {
        if !input.contains(id) {
            input.push(*id);
        }
    }

    let mut pending: HashMap<ObjectId, usize> = input.iter().map(|id| (*id, 0)).collect();
    let mut targets: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
    for id in &input {
        let Ok(object) = doc.object(*id) else {
            continue;
        };
        let mut out: Vec<ObjectId> = Vec::new();
        let pointers = object
            .modifiers
            .iter()
            .flat_map(|m| m.references().map(|(_, target)| target))
            .chain(object.parent);
        for target in pointers {
            if target != *id && pending.contains_key(&target) && !out.contains(&target) {
                out.push(target);
            }
        }
        for target in &out {
            if let Some(count) = pending.get_mut(target) {
                *count += 1;
            }
        }
        targets.insert(*id, out);
    }

    let mut queue: VecDeque<ObjectId> = input
        .iter()
        .filter(|id| pending.get(id) == Some(&0))
        .copied()
        .collect();
    let mut order = Vec::with_capacity(input.len());
    while let Some(id) = queue.pop_front() {
        order.push(id);
        for target in targets.get(&id).into_iter().flatten() {
            if let Some(count) = pending.get_mut(target) {
                *count -= 1;
                if *count == 0 {
                    queue.push_back(*target);
                }
            }
        }
    }

    for id in input {
        if !order.contains(&id) {
            order.push(id);
        }
    }
    order
}
