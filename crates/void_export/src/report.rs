//! Export outcome

use std::fmt;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::Serialize;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExportStage {
    CleanDestination,
    StageRawImport,
    PlaceIntoTargetGroup,
    RebuildHierarchy,
    PlaceDependencies,
    Cleanup,
    Finalize,
}

impl fmt::Display for ExportStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CleanDestination => write!(f, "clean destination"),
            Self::StageRawImport => write!(f, "stage raw import"),
            Self::PlaceIntoTargetGroup => write!(f, "place into target group"),
            Self::RebuildHierarchy => write!(f, "rebuild hierarchy"),
            Self::PlaceDependencies => write!(f, "place dependencies"),
            Self::Cleanup => write!(f, "cleanup"),
            Self::Finalize => write!(f, "finalize"),
        }
    }
}

/// Where objects pulled in only as dependencies ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DependencyPlacement {
    /// One `Dependencies` collection under the root collection
    Dedicated,
    /// The collections they belong to in the source, or the root collection
    /// when no hierarchy is rebuilt
    Respective,
}

impl fmt::Display for DependencyPlacement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dedicated => write!(f, "dedicated collection"),
            Self::Respective => write!(f, "respective collections"),
        }
    }
}

/// What an export did to the destination
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExportReport {
    pub destination: PathBuf,
    /// Incoming object name -> local name in the destination
    pub objects: IndexMap<String, String>,
    pub collections_created: Vec<String>,
    pub stages: Vec<ExportStage>,
    pub dependency_placement: Option<DependencyPlacement>,
    /// Dependency fields re-pointed after detaching
    pub resolved_dependencies: usize,
    pub renamed: Vec<(String, String)>,
    pub packed: Vec<String>,
    pub pack_failures: Vec<(String, String)>,
    pub warnings: Vec<String>,
    /// Error that stopped the pipeline; the partial result was still saved
    pub failure: Option<String>,
}

impl ExportReport {
    pub fn new(destination: impl Into<PathBuf>) -> Self {
        Self {
            destination: destination.into(),
            ..Default::default()
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }

    pub fn completed(&self, stage: ExportStage) -> bool {
        self.stages.contains(&stage)
    }
}

impl fmt::Display for ExportReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Export to {}", self.destination.display())?;
        for (incoming, local) in &self.objects {
            if incoming == local {
                writeln!(f, "  object {}", local)?;
            } else {
                writeln!(f, "  object {} -> {}", incoming, local)?;
            }
        }
        for collection in &self.collections_created {
            writeln!(f, "  collection {}", collection)?;
        }
        if let Some(placement) = self.dependency_placement {
            writeln!(f, "  dependencies: {}", placement)?;
        }
        for (old, new) in &self.renamed {
            writeln!(f, "  renamed {} -> {}", old, new)?;
        }
        if !self.packed.is_empty() {
            writeln!(f, "  packed {} image(s)", self.packed.len())?;
        }
        for (image, reason) in &self.pack_failures {
            writeln!(f, "  could not pack {}: {}", image, reason)?;
        }
        for warning in &self.warnings {
            writeln!(f, "  warning: {}", warning)?;
        }
        let stages: Vec<String> = self.stages.iter().map(ToString::to_string).collect();
        writeln!(f, "  stages: {}", stages.join(", "))?;
        match &self.failure {
            Some(failure) => write!(f, "  failed: {}", failure),
            None => write!(f, "  ok"),
        }
    }
}
