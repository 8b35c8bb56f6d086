//! Export options
//!
//! Every option of an export invocation in one serde record. The CLI builds
//! it from flags, optionally on top of a TOML options file:
//!
//! ```toml
//! source_file = "assets/props.json"
//! destination_file = "out/crate.json"
//! source_data = "OBJECTS"        # OBJECTS, SCENE
//! file_override = "OVERRIDE"     # OVERRIDE, APPEND_LINK
//! export_mode = "APPEND"         # APPEND, LINK
//! source_object_list = ["Crate"]
//! dependencies_in_dedicated_collection = true
//! ```

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use void_document::DocumentError;

use crate::error::{ExportError, Result};

/// What the export brings in from the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceKind {
    /// A selection of objects
    #[default]
    Objects,
    /// A whole scene
    Scene,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Objects => write!(f, "OBJECTS"),
            Self::Scene => write!(f, "SCENE"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OBJECTS" => Ok(Self::Objects),
            "SCENE" => Ok(Self::Scene),
            _ => Err(format!("Unknown source kind: {}", s)),
        }
    }
}

/// How the destination document is prepared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverrideMode {
    /// Start from the startup document
    #[default]
    Override,
    /// Merge into the existing destination
    AppendLink,
}

impl fmt::Display for OverrideMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Override => write!(f, "OVERRIDE"),
            Self::AppendLink => write!(f, "APPEND_LINK"),
        }
    }
}

impl std::str::FromStr for OverrideMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "OVERRIDE" => Ok(Self::Override),
            "APPEND_LINK" => Ok(Self::AppendLink),
            _ => Err(format!("Unknown override mode: {}", s)),
        }
    }
}

/// Whether data is copied in or kept as a reference to the source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferMode {
    #[default]
    Append,
    Link,
}

impl fmt::Display for TransferMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Append => write!(f, "APPEND"),
            Self::Link => write!(f, "LINK"),
        }
    }
}

impl std::str::FromStr for TransferMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "APPEND" => Ok(Self::Append),
            "LINK" => Ok(Self::Link),
            _ => Err(format!("Unknown export mode: {}", s)),
        }
    }
}

/// Options of one export invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportOptions {
    pub source_file: PathBuf,
    pub destination_file: PathBuf,
    pub source_data: SourceKind,
    pub file_override: OverrideMode,
    pub export_mode: TransferMode,
    /// Scene of the destination to place objects into
    pub target_scene: Option<String>,
    /// Drop the startup content of an overridden destination
    pub export_to_clean_file: bool,
    pub pack_external_data: bool,
    /// Pull in the children of selected objects
    pub export_object_children: bool,
    pub source_scene_name: String,
    pub source_object_list: Vec<String>,
    pub create_collection_hierarchy: bool,
    pub export_in_new_collection: bool,
    pub new_collection_name: String,
    pub dependencies_in_dedicated_collection: bool,
    /// Rename pairs, old names
    pub imported_names: Vec<String>,
    /// Rename pairs, new names
    pub new_names: Vec<String>,
    pub print_debug: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            source_file: PathBuf::new(),
            destination_file: PathBuf::new(),
            source_data: SourceKind::default(),
            file_override: OverrideMode::default(),
            export_mode: TransferMode::default(),
            target_scene: None,
            export_to_clean_file: true,
            pack_external_data: false,
            export_object_children: false,
            source_scene_name: "Scene".to_string(),
            source_object_list: Vec::new(),
            create_collection_hierarchy: true,
            export_in_new_collection: false,
            new_collection_name: "Root Collection".to_string(),
            dependencies_in_dedicated_collection: false,
            imported_names: Vec::new(),
            new_names: Vec::new(),
            print_debug: false,
        }
    }
}

impl ExportOptions {
    /// Parse options from TOML text; absent keys keep their defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| ExportError::configuration(format!("Invalid options: {}", e)))
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| ExportError::Io(DocumentError::Io(e)))?;
        Self::from_toml(&content).map_err(|e| match e {
            ExportError::Configuration(message) => {
                ExportError::Configuration(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    /// Check the options before anything is touched
    ///
    /// Contradictory or missing required values are a configuration error.
    /// Recoverable problems come back as warnings; the export then disables
    /// the affected feature.
    pub fn validate(&self) -> Result<Vec<String>> {
        if self.source_file.as_os_str().is_empty() {
            return Err(ExportError::configuration("source file is required"));
        }
        if self.destination_file.as_os_str().is_empty() {
            return Err(ExportError::configuration("destination file is required"));
        }
        if self.imported_names.len() != self.new_names.len() {
            return Err(ExportError::configuration(format!(
                "imported_names and new_names need to have the same length ({} != {})",
                self.imported_names.len(),
                self.new_names.len()
            )));
        }
        if self.source_scene_name.is_empty() {
            return Err(ExportError::configuration("source scene name is required"));
        }
        if self.source_data == SourceKind::Objects && self.source_object_list.is_empty() {
            return Err(ExportError::configuration("no object selected for export"));
        }

        let mut warnings = Vec::new();
        if self.export_in_new_collection && self.new_collection_name.is_empty() {
            warnings.push(
                "New collection name is empty, skipping root collection creation.".to_string(),
            );
        }
        if self.pack_external_data && self.export_mode == TransferMode::Link {
            warnings.push("External data is only packed in APPEND mode.".to_string());
        }
        Ok(warnings)
    }

    /// Rename pairs, old name first
    pub fn rename_pairs(&self) -> Vec<(String, String)> {
        self.imported_names
            .iter()
            .cloned()
            .zip(self.new_names.iter().cloned())
            .collect()
    }

    /// Whether the new-collection placement can run
    pub fn wants_new_collection(&self) -> bool {
        self.export_in_new_collection && !self.new_collection_name.is_empty()
    }

    /// Whether packing can run
    pub fn wants_pack(&self) -> bool {
        self.pack_external_data && self.export_mode == TransferMode::Append
    }
}
