//! Document persistence
//!
//! Documents are stored as JSON or TOML, picked by file extension. Handles
//! are compacted to indices into the record lists on save, and packed image
//! bytes are stored as base64. Writes are atomic: the document goes to a
//! temporary sibling file that is then renamed over the target.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use glam::Mat4;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::collection::{Collection, Scene};
use crate::document::Document;
use crate::error::{DocumentError, Result};
use crate::id::{Arena, ArenaKey, CollectionId, ImageId, LibraryId, ObjectId, SceneId};
use crate::library::{Image, Library};
use crate::object::{Modifier, ModifierKind, Object};

/// Current on-disk format version
pub const DOCUMENT_VERSION: u32 = 1;

/// On-disk encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileFormat {
    Json,
    Toml,
}

impl FileFormat {
    /// `.toml` files are TOML, everything else is JSON
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Json,
        }
    }
}

fn identity() -> Mat4 {
    Mat4::IDENTITY
}

fn is_identity(matrix: &Mat4) -> bool {
    *matrix == Mat4::IDENTITY
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LibraryRecord {
    pub path: PathBuf,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ImageRecord {
    pub name: String,
    pub filepath: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<usize>,
    /// Base64 of the packed bytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packed: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CollectionRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<usize>,
    #[serde(default)]
    pub scene_root: bool,
    #[serde(default)]
    pub children: Vec<usize>,
    #[serde(default)]
    pub objects: Vec<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SceneRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<usize>,
    pub root: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_collection: Option<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModifierRecord {
    pub name: String,
    pub kind: ModifierKind<usize>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ObjectRecord {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
    #[serde(default = "identity")]
    pub matrix_world: Mat4,
    #[serde(default = "identity", skip_serializing_if = "is_identity")]
    pub matrix_parent_inverse: Mat4,
    #[serde(default)]
    pub images: Vec<usize>,
    #[serde(default)]
    pub modifiers: Vec<ModifierRecord>,
}

/// Serializable form of a [`Document`]
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DocumentFile {
    pub version: u32,
    pub active_scene: usize,
    #[serde(default)]
    pub workspaces: Vec<String>,
    #[serde(default)]
    pub libraries: Vec<LibraryRecord>,
    #[serde(default)]
    pub images: Vec<ImageRecord>,
    #[serde(default)]
    pub collections: Vec<CollectionRecord>,
    #[serde(default)]
    pub scenes: Vec<SceneRecord>,
    #[serde(default)]
    pub objects: Vec<ObjectRecord>,
}

/// Dense index for every live handle of one arena
fn index_map<K: ArenaKey + std::hash::Hash, T>(arena: &Arena<K, T>) -> HashMap<K, usize> {
    arena.iter().enumerate().map(|(i, (k, _))| (k, i)).collect()
}

fn lookup<K: ArenaKey + std::hash::Hash>(map: &HashMap<K, usize>, key: K) -> Result<usize> {
    map.get(&key)
        .copied()
        .ok_or_else(|| DocumentError::StaleHandle(key.to_string()))
}

impl DocumentFile {
    /// Compact a document into records
    pub fn from_document(doc: &Document) -> Result<Self> {
        let libraries = index_map(&doc.libraries);
        let images = index_map(&doc.images);
        let collections = index_map(&doc.collections);
        let scenes = index_map(&doc.scenes);
        let objects = index_map(&doc.objects);

        let opt = |map: &HashMap<LibraryId, usize>, key: Option<LibraryId>| -> Result<Option<usize>> {
            key.map(|k| lookup(map, k)).transpose()
        };

        let library_records = doc
            .libraries
            .iter()
            .map(|(_, l)| LibraryRecord { path: l.path.clone() })
            .collect();

        let image_records = doc
            .images
            .iter()
            .map(|(_, image)| {
                Ok(ImageRecord {
                    name: image.name.clone(),
                    filepath: image.filepath.clone(),
                    library: opt(&libraries, image.library)?,
                    packed: image.packed.as_ref().map(|bytes| STANDARD.encode(bytes)),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let collection_records = doc
            .collections
            .iter()
            .map(|(_, c)| {
                Ok(CollectionRecord {
                    name: c.name.clone(),
                    library: opt(&libraries, c.library)?,
                    scene_root: c.scene_root,
                    children: c
                        .children
                        .iter()
                        .map(|id| lookup(&collections, *id))
                        .collect::<Result<_>>()?,
                    objects: c
                        .objects
                        .iter()
                        .map(|id| lookup(&objects, *id))
                        .collect::<Result<_>>()?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let scene_records = doc
            .scenes
            .iter()
            .map(|(_, s)| {
                let active = (s.active_collection != s.root)
                    .then(|| lookup(&collections, s.active_collection))
                    .transpose()?;
                Ok(SceneRecord {
                    name: s.name.clone(),
                    library: opt(&libraries, s.library)?,
                    root: lookup(&collections, s.root)?,
                    active_collection: active,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let object_records = doc
            .objects
            .iter()
            .map(|(_, o)| {
                let modifiers = o
                    .modifiers
                    .iter()
                    .map(|m| ModifierRecord {
                        name: m.name.clone(),
                        // Pointers to removed objects are dropped
                        kind: m.kind.map_references(|r| objects.get(r).copied()),
                    })
                    .collect();
                Ok(ObjectRecord {
                    name: o.name.clone(),
                    library: opt(&libraries, o.library)?,
                    parent: o.parent.and_then(|p| objects.get(&p).copied()),
                    matrix_world: o.matrix_world,
                    matrix_parent_inverse: o.matrix_parent_inverse,
                    images: o
                        .images
                        .iter()
                        .map(|id| lookup(&images, *id))
                        .collect::<Result<_>>()?,
                    modifiers,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            version: DOCUMENT_VERSION,
            active_scene: lookup(&scenes, doc.active_scene)?,
            workspaces: doc.workspaces.clone(),
            libraries: library_records,
            images: image_records,
            collections: collection_records,
            scenes: scene_records,
            objects: object_records,
        })
    }

    /// Rebuild a live document, validating every index
    pub fn into_document(self, path: &Path) -> Result<Document> {
        if self.version > DOCUMENT_VERSION {
            return Err(DocumentError::VersionMismatch {
                found: self.version,
                supported: DOCUMENT_VERSION,
            });
        }

        let invalid = |what: &str, index: usize| DocumentError::Parse {
            path: path.to_path_buf(),
            message: format!("{} index {} is out of range", what, index),
        };
        let check = |what: &str, index: usize, len: usize| -> Result<u32> {
            if index < len {
                Ok(index as u32)
            } else {
                Err(invalid(what, index))
            }
        };
        let library_of = |index: Option<usize>| -> Result<Option<LibraryId>> {
            index
                .map(|i| check("library", i, self.libraries.len()).map(LibraryId::from_index))
                .transpose()
        };
        let object_count = self.objects.len();
        let object_of = |i: usize| check("object", i, object_count).map(ObjectId::from_index);
        let collection_of =
            |i: usize| check("collection", i, self.collections.len()).map(CollectionId::from_index);

        let mut doc = Document {
            path: Some(path.to_path_buf()),
            objects: Arena::new(),
            collections: Arena::new(),
            scenes: Arena::new(),
            libraries: Arena::new(),
            images: Arena::new(),
            workspaces: self.workspaces.clone(),
            active_scene: SceneId::from_index(check("scene", self.active_scene, self.scenes.len())?),
        };

        for record in &self.libraries {
            doc.libraries.insert(Library {
                path: record.path.clone(),
            });
        }

        for record in &self.images {
            let packed = match &record.packed {
                Some(encoded) => Some(STANDARD.decode(encoded).map_err(|e| DocumentError::Parse {
                    path: path.to_path_buf(),
                    message: format!("image '{}' has invalid packed data: {}", record.name, e),
                })?),
                None => None,
            };
            doc.images.insert(Image {
                name: record.name.clone(),
                library: library_of(record.library)?,
                filepath: record.filepath.clone(),
                packed,
            });
        }
        let image_count = self.images.len();

        for record in &self.collections {
            doc.collections.insert(Collection {
                name: record.name.clone(),
                library: library_of(record.library)?,
                children: record
                    .children
                    .iter()
                    .map(|i| collection_of(*i))
                    .collect::<Result<_>>()?,
                objects: record
                    .objects
                    .iter()
                    .map(|i| object_of(*i))
                    .collect::<Result<_>>()?,
                scene_root: record.scene_root,
            });
        }

        for record in &self.scenes {
            let root = collection_of(record.root)?;
            let active_collection = match record.active_collection {
                Some(i) => collection_of(i)?,
                None => root,
            };
            doc.scenes.insert(Scene {
                name: record.name.clone(),
                library: library_of(record.library)?,
                root,
                active_collection,
            });
        }

        for record in &self.objects {
            let mut modifiers = Vec::with_capacity(record.modifiers.len());
            for m in &record.modifiers {
                for (_, target) in m.kind.references() {
                    object_of(*target)?;
                }
                modifiers.push(Modifier {
                    name: m.name.clone(),
                    kind: m.kind.map_references(|i| Some(ObjectId::from_index(*i as u32))),
                });
            }
            doc.objects.insert(Object {
                name: record.name.clone(),
                library: library_of(record.library)?,
                parent: record.parent.map(object_of).transpose()?,
                matrix_world: record.matrix_world,
                matrix_parent_inverse: record.matrix_parent_inverse,
                modifiers,
                images: record
                    .images
                    .iter()
                    .map(|i| check("image", *i, image_count).map(ImageId::from_index))
                    .collect::<Result<_>>()?,
            });
        }

        Ok(doc)
    }

    pub fn to_text(&self, format: FileFormat) -> Result<String> {
        match format {
            FileFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|e| DocumentError::Serialize(e.to_string())),
            FileFormat::Toml => {
                toml::to_string_pretty(self).map_err(|e| DocumentError::Serialize(e.to_string()))
            }
        }
    }

    pub fn from_text(content: &str, format: FileFormat, path: &Path) -> Result<Self> {
        let parsed = match format {
            FileFormat::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            FileFormat::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|message| DocumentError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }
}

impl Document {
    /// Load a document from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let file = DocumentFile::from_text(&content, FileFormat::from_path(path), path)?;
        let doc = file.into_document(path)?;
        debug!(
            "Loaded {} ({} objects, {} scenes)",
            path.display(),
            doc.object_count(),
            doc.scene_count()
        );
        Ok(doc)
    }

    /// Save the document atomically and remember `path` as its location
    pub fn save(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = DocumentFile::from_document(self)?.to_text(FileFormat::from_path(path))?;

        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)?;
        }
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let temp_path = path.with_file_name(format!(".{}.tmp", file_name));
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, path)?;

        self.path = Some(path.to_path_buf());
        info!("Saved {}", path.display());
        Ok(())
    }
}
