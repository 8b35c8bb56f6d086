//! Objects and modifier stacks

use glam::Mat4;
use serde::{Deserialize, Serialize};

use crate::id::{ImageId, LibraryId, ObjectId};

/// Boolean modifier operation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BooleanOperation {
    #[default]
    Difference,
    Union,
    Intersect,
}

fn default_count() -> u32 {
    2
}

fn default_levels() -> u32 {
    1
}

/// Modifier type with its settings
///
/// `R` is the type of object references. In a live document it is
/// [`ObjectId`]; the file format stores indices instead.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ModifierKind<R = ObjectId> {
    Array {
        #[serde(default = "default_count")]
        count: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        start_cap: Option<R>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        end_cap: Option<R>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        offset_object: Option<R>,
    },
    Boolean {
        #[serde(default)]
        operation: BooleanOperation,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        object: Option<R>,
    },
    Curve {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        object: Option<R>,
    },
    Lattice {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        object: Option<R>,
    },
    Mirror {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mirror_object: Option<R>,
    },
    Shrinkwrap {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<R>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auxiliary_target: Option<R>,
    },
    Subdivision {
        #[serde(default = "default_levels")]
        levels: u32,
    },
}

impl<R> ModifierKind<R> {
    /// Type name as shown in the modifier stack
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Array { .. } => "ARRAY",
            Self::Boolean { .. } => "BOOLEAN",
            Self::Curve { .. } => "CURVE",
            Self::Lattice { .. } => "LATTICE",
            Self::Mirror { .. } => "MIRROR",
            Self::Shrinkwrap { .. } => "SHRINKWRAP",
            Self::Subdivision { .. } => "SUBSURF",
        }
    }

    /// Fields of this modifier type that hold an object reference
    pub fn reference_fields(&self) -> &'static [&'static str] {
        match self {
            Self::Array { .. } => &["start_cap", "end_cap", "offset_object"],
            Self::Boolean { .. } | Self::Curve { .. } | Self::Lattice { .. } => &["object"],
            Self::Mirror { .. } => &["mirror_object"],
            Self::Shrinkwrap { .. } => &["target", "auxiliary_target"],
            Self::Subdivision { .. } => &[],
        }
    }

    fn slot(&self, field: &str) -> Option<&Option<R>> {
        match (self, field) {
            (Self::Array { start_cap, .. }, "start_cap") => Some(start_cap),
            (Self::Array { end_cap, .. }, "end_cap") => Some(end_cap),
            (Self::Array { offset_object, .. }, "offset_object") => Some(offset_object),
            (Self::Boolean { object, .. }, "object")
            | (Self::Curve { object }, "object")
            | (Self::Lattice { object }, "object") => Some(object),
            (Self::Mirror { mirror_object }, "mirror_object") => Some(mirror_object),
            (Self::Shrinkwrap { target, .. }, "target") => Some(target),
            (Self::Shrinkwrap {
                auxiliary_target, ..
            }, "auxiliary_target") => Some(auxiliary_target),
            _ => None,
        }
    }

    fn slot_mut(&mut self, field: &str) -> Option<&mut Option<R>> {
        match (self, field) {
            (Self::Array { start_cap, .. }, "start_cap") => Some(start_cap),
            (Self::Array { end_cap, .. }, "end_cap") => Some(end_cap),
            (Self::Array { offset_object, .. }, "offset_object") => Some(offset_object),
            (Self::Boolean { object, .. }, "object")
            | (Self::Curve { object }, "object")
            | (Self::Lattice { object }, "object") => Some(object),
            (Self::Mirror { mirror_object }, "mirror_object") => Some(mirror_object),
            (Self::Shrinkwrap { target, .. }, "target") => Some(target),
            (Self::Shrinkwrap {
                auxiliary_target, ..
            }, "auxiliary_target") => Some(auxiliary_target),
            _ => None,
        }
    }

    /// Current value of a reference field; `None` when unset or unknown
    pub fn reference(&self, field: &str) -> Option<&R> {
        self.slot(field).and_then(Option::as_ref)
    }

    /// Assign a reference field. Returns false for an unknown field.
    pub fn set_reference(&mut self, field: &str, value: Option<R>) -> bool {
        match self.slot_mut(field) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Set (field, target) pairs in declaration order
    pub fn references(&self) -> impl Iterator<Item = (&'static str, &R)> + '_ {
        self.reference_fields()
            .iter()
            .filter_map(move |field| self.reference(field).map(|r| (*field, r)))
    }

    /// Convert references through `f`; references it maps to `None` are cleared
    pub fn map_references<S>(&self, mut f: impl FnMut(&R) -> Option<S>) -> ModifierKind<S> {
        let mut map = |r: &Option<R>| r.as_ref().and_then(&mut f);
        match self {
            Self::Array {
                count,
                start_cap,
                end_cap,
                offset_object,
            } => ModifierKind::Array {
                count: *count,
                start_cap: map(start_cap),
                end_cap: map(end_cap),
                offset_object: map(offset_object),
            },
            Self::Boolean { operation, object } => ModifierKind::Boolean {
                operation: *operation,
                object: map(object),
            },
            Self::Curve { object } => ModifierKind::Curve { object: map(object) },
            Self::Lattice { object } => ModifierKind::Lattice { object: map(object) },
            Self::Mirror { mirror_object } => ModifierKind::Mirror {
                mirror_object: map(mirror_object),
            },
            Self::Shrinkwrap {
                target,
                auxiliary_target,
            } => ModifierKind::Shrinkwrap {
                target: map(target),
                auxiliary_target: map(auxiliary_target),
            },
            Self::Subdivision { levels } => ModifierKind::Subdivision { levels: *levels },
        }
    }
}

impl ModifierKind {
    pub fn boolean(object: ObjectId) -> Self {
        Self::Boolean {
            operation: BooleanOperation::Difference,
            object: Some(object),
        }
    }

    pub fn mirror(mirror_object: ObjectId) -> Self {
        Self::Mirror {
            mirror_object: Some(mirror_object),
        }
    }

    pub fn subdivision(levels: u32) -> Self {
        Self::Subdivision { levels }
    }
}

/// A named entry in an object's modifier stack
#[derive(Clone, Debug, PartialEq)]
pub struct Modifier {
    pub name: String,
    pub kind: ModifierKind,
}

impl Modifier {
    pub fn new(name: impl Into<String>, kind: ModifierKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    /// Objects this modifier points at
    pub fn references(&self) -> impl Iterator<Item = (&'static str, ObjectId)> + '_ {
        self.kind.references().map(|(field, id)| (field, *id))
    }
}

/// An object datablock
#[derive(Clone, Debug)]
pub struct Object {
    pub(crate) name: String,
    pub(crate) library: Option<LibraryId>,
    pub parent: Option<ObjectId>,
    pub matrix_world: Mat4,
    pub matrix_parent_inverse: Mat4,
    pub modifiers: Vec<Modifier>,
    pub images: Vec<ImageId>,
}

impl Object {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            library: None,
            parent: None,
            matrix_world: Mat4::IDENTITY,
            matrix_parent_inverse: Mat4::IDENTITY,
            modifiers: Vec::new(),
            images: Vec::new(),
        }
    }

    pub fn with_matrix_world(mut self, matrix: Mat4) -> Self {
        self.matrix_world = matrix;
        self
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifiers.push(modifier);
        self
    }

    pub fn with_image(mut self, image: ImageId) -> Self {
        self.images.push(image);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Source library, `None` for local data
    pub fn library(&self) -> Option<LibraryId> {
        self.library
    }

    pub fn is_linked(&self) -> bool {
        self.library.is_some()
    }

    /// Whether any modifier or the parent pointer targets `target`
    pub fn references_object(&self, target: ObjectId) -> bool {
        self.parent == Some(target)
            || self
                .modifiers
                .iter()
                .any(|m| m.references().any(|(_, id)| id == target))
    }

    /// Clear every pointer (parent and modifier fields) targeting `target`
    pub(crate) fn clear_references_to(&mut self, target: ObjectId) {
        if self.parent == Some(target) {
            self.parent = None;
        }
        for modifier in &mut self.modifiers {
            for field in modifier.kind.reference_fields() {
                if modifier.kind.reference(field) == Some(&target) {
                    modifier.kind.set_reference(field, None);
                }
            }
        }
    }
}
