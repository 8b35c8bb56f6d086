//! Post-import rename pairs

use std::path::Path;

use log::{info, warn};
use serde::Serialize;
use void_document::{Document, ObjectId};

use crate::error::{ExportError, LookupKind, Result};

/// What a rename pass did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RenameReport {
    /// `(old, new)` as applied; `new` is the name the document accepted
    pub renamed: Vec<(String, String)>,
    /// Old names with no local object
    pub skipped: Vec<String>,
}

/// Rename local objects, one `(old, new)` pair at a time
///
/// Old names are looked up among local objects. A missing old name is
/// logged and skipped.
pub fn apply_rename_pairs(doc: &mut Document, pairs: &[(String, String)]) -> Result<RenameReport> {
    let mut report = RenameReport::default();
    for (old, new) in pairs {
        let Some(id) = doc.object_by_name_in(old, None) else {
            warn!("{}, rename skipped", ExportError::lookup(LookupKind::Object, old));
            report.skipped.push(old.clone());
            continue;
        };
        let actual = rename_object(doc, id, new)?;
        report.renamed.push((old.clone(), actual));
    }
    Ok(report)
}

/// Rename one local object; returns the name the document accepted
pub fn rename_object(doc: &mut Document, id: ObjectId, new: &str) -> Result<String> {
    let current = doc.object(id)?.name().to_string();
    info!("Renaming object \"{}\" to \"{}\"", current, new);
    let actual = doc.rename_object(id, new)?;
    if actual != new {
        warn!("\"{}\" is taken, object renamed to \"{}\"", new, actual);
    }
    Ok(actual)
}

/// Apply rename pairs to a document on disk and save it in place
pub fn rename_in_file(path: impl AsRef<Path>, pairs: &[(String, String)]) -> Result<RenameReport> {
    let path = path.as_ref();
    let mut doc = Document::load(path).map_err(ExportError::Io)?;
    let report = apply_rename_pairs(&mut doc, pairs)?;
    doc.save(path).map_err(ExportError::Io)?;
    Ok(report)
}
