//! Stage graph: typed DAG nodes, artifact plumbing, and the scheduler
//!
//! A pipeline is a set of stages with declared artifact inputs and
//! outputs. Edges are derived from those declarations, validated once at
//! startup, and executed by a generic scheduler that knows nothing about
//! what the stages do.

pub mod dag;
pub mod scheduler;
pub mod stage;

pub use dag::Dag;
pub use scheduler::{RunReport, Scheduler, StageReport};
pub use stage::{
    Artifact, ArtifactRef, ArtifactStore, ExecutionKind, FailurePolicy, StageContext, StageDef,
    StageMeta, StageOutput, StageRunner, StageState,
};
