//! Command line arguments
//!
//! Flags mirror the keys of an options file. Every flag is optional so a
//! `--config` file can supply the rest; a flag given on the command line
//! always wins over the file.

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::{Args, Parser, Subcommand};
use void_export::{ExportOptions, OverrideMode, Result, SourceKind, TransferMode};

/// Environment variable that turns on debug logging
pub const DEBUG_ENV: &str = "VOID_EXPORT_DEBUG";

#[derive(Parser, Debug)]
#[command(name = "void-export")]
#[command(version, about = "Export objects or scenes between documents")]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub export: ExportArgs,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Export objects or a scene (default)
    Export(ExportArgs),

    /// Rename objects in an existing document
    Rename(RenameArgs),
}

#[derive(Args, Debug, Clone, Default)]
pub struct ExportArgs {
    /// TOML options file; flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print the report as JSON instead of text
    #[arg(long)]
    pub report_json: bool,

    /// Document to read from
    #[arg(short = 'f', long, value_name = "FILE")]
    pub source_file: Option<PathBuf>,

    /// Document to write to
    #[arg(short = 'd', long, value_name = "FILE")]
    pub destination_file: Option<PathBuf>,

    /// OBJECTS or SCENE
    #[arg(short = 's', long)]
    pub source_data: Option<SourceKind>,

    /// OVERRIDE or APPEND_LINK
    #[arg(short = 'o', long)]
    pub file_override: Option<OverrideMode>,

    /// Destination scene receiving the objects
    #[arg(short = 't', long)]
    pub target_scene: Option<String>,

    /// APPEND or LINK
    #[arg(short = 'm', long)]
    pub export_mode: Option<TransferMode>,

    /// Drop the destination's startup content first
    #[arg(short = 'X', long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub export_to_clean_file: Option<bool>,

    /// Embed external files (APPEND only)
    #[arg(short = 'p', long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub pack_external_data: Option<bool>,

    /// Export the children of listed objects too
    #[arg(short = 'C', long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub export_object_children: Option<bool>,

    /// Scene holding the objects to export
    #[arg(short = 'S', long)]
    pub source_scene_name: Option<String>,

    /// Objects to export
    #[arg(short = 'O', long, num_args = 1..)]
    pub source_object_list: Vec<String>,

    /// Rebuild the collection hierarchy of each object
    #[arg(short = 'c', long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub create_collection_hierarchy: Option<bool>,

    /// Wrap everything in one new collection
    #[arg(short = 'N', long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub export_in_new_collection: Option<bool>,

    /// Name of the wrapping collection
    #[arg(short = 'n', long)]
    pub new_collection_name: Option<String>,

    /// Put dependencies in a "Dependencies" collection instead of their own
    #[arg(short = 'D', long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub dependencies_in_dedicated_collection: Option<bool>,

    /// Objects to rename after import, paired with --new-names
    #[arg(short = 'i', long, num_args = 1..)]
    pub imported_names: Vec<String>,

    /// New names, one per --imported-names entry
    #[arg(short = 'x', long, num_args = 1..)]
    pub new_names: Vec<String>,

    /// Debug logging
    #[arg(short = 'P', long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub print_debug: Option<bool>,
}

impl ExportArgs {
    /// Options file (if any) with command line values laid over it
    pub fn resolve(&self) -> Result<ExportOptions> {
        let mut options = match &self.config {
            Some(path) => ExportOptions::from_toml_file(path)?,
            None => ExportOptions::default(),
        };
        self.apply(&mut options);
        Ok(options)
    }

    fn apply(&self, options: &mut ExportOptions) {
        if let Some(path) = &self.source_file {
            options.source_file = path.clone();
        }
        if let Some(path) = &self.destination_file {
            options.destination_file = path.clone();
        }
        if let Some(kind) = self.source_data {
            options.source_data = kind;
        }
        if let Some(mode) = self.file_override {
            options.file_override = mode;
        }
        if let Some(scene) = &self.target_scene {
            options.target_scene = Some(scene.clone());
        }
        if let Some(mode) = self.export_mode {
            options.export_mode = mode;
        }
        if let Some(scene) = &self.source_scene_name {
            options.source_scene_name = scene.clone();
        }
        if let Some(name) = &self.new_collection_name {
            options.new_collection_name = name.clone();
        }
        if !self.source_object_list.is_empty() {
            options.source_object_list = self.source_object_list.clone();
        }
        if !self.imported_names.is_empty() {
            options.imported_names = self.imported_names.clone();
        }
        if !self.new_names.is_empty() {
            options.new_names = self.new_names.clone();
        }

        let flags = [
            (self.export_to_clean_file, &mut options.export_to_clean_file),
            (self.pack_external_data, &mut options.pack_external_data),
            (self.export_object_children, &mut options.export_object_children),
            (self.create_collection_hierarchy, &mut options.create_collection_hierarchy),
            (self.export_in_new_collection, &mut options.export_in_new_collection),
            (
                self.dependencies_in_dedicated_collection,
                &mut options.dependencies_in_dedicated_collection,
            ),
            (self.print_debug, &mut options.print_debug),
        ];
        for (value, slot) in flags {
            if let Some(value) = value {
                *slot = value;
            }
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct RenameArgs {
    /// Document to rename objects in; saved in place
    #[arg(long, value_name = "FILE")]
    pub file: PathBuf,

    /// Current object names
    #[arg(short = 'i', long, num_args = 1.., required = true)]
    pub original_names: Vec<String>,

    /// New names, one per --original-names entry
    #[arg(short = 'x', long, num_args = 1.., required = true)]
    pub new_names: Vec<String>,

    /// Debug logging
    #[arg(short = 'P', long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub print_debug: Option<bool>,
}

impl RenameArgs {
    /// `(old, new)` pairs, or a message when the lists differ in length
    pub fn pairs(&self) -> std::result::Result<Vec<(String, String)>, String> {
        if self.original_names.len() != self.new_names.len() {
            return Err(format!(
                "{} original name(s) but {} new name(s)",
                self.original_names.len(),
                self.new_names.len()
            ));
        }
        Ok(self
            .original_names
            .iter()
            .cloned()
            .zip(self.new_names.iter().cloned())
            .collect())
    }
}

/// `VOID_EXPORT_DEBUG` set to anything but `0`/`false`
pub fn debug_from_env() -> bool {
    std::env::var(DEBUG_ENV)
        .map(|v| v != "0" && !v.eq_ignore_ascii_case("false"))
        .unwrap_or(false)
}
