//! Stage definitions, artifact references, and the per-run artifact store

use crate::error::{DocforgeError, DocforgeResult};
use crate::revision::Revision;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// Name of an artifact produced by one stage and consumed by others.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactRef(String);

impl ArtifactRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An immutable named byte blob published by exactly one stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// Logical path inside the final archive.
    pub path: String,
    pub bytes: Vec<u8>,
}

impl Artifact {
    pub fn new(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into(),
        }
    }
}

/// What the scheduler does when a stage fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Downstream stages that depend on this one's outputs are skipped
    /// without running; the run continues and fails at the end.
    FailToStartDownstream,
    /// The stage's own contract guarantees a usable result, so any error
    /// it does return is absorbed and recorded as a degradation.
    ContinueWithFallback,
    /// The whole run aborts.
    Fatal,
}

/// Broad classification of a stage's work, for reporting and timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionKind {
    NetworkFetch,
    LocalCompute,
    Package,
}

/// Per-stage state machine.
///
/// `Pending -> Ready -> Running -> {Succeeded, Failed, SkippedUpstreamFailure}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    Pending,
    Ready,
    Running,
    Succeeded,
    Failed,
    SkippedUpstreamFailure,
}

impl StageState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Failed | Self::SkippedUpstreamFailure
        )
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::SkippedUpstreamFailure => "skipped-upstream-failure",
        };
        f.write_str(s)
    }
}

/// Declarative description of a stage: identity, artifact interface, and
/// failure behavior. The work itself lives in a [`StageRunner`].
#[derive(Debug, Clone)]
pub struct StageMeta {
    pub name: String,
    pub inputs: Vec<ArtifactRef>,
    pub outputs: Vec<ArtifactRef>,
    pub policy: FailurePolicy,
    pub kind: ExecutionKind,
}

impl StageMeta {
    pub fn new(name: impl Into<String>, kind: ExecutionKind, policy: FailurePolicy) -> Self {
        Self {
            name: name.into(),
            inputs: vec![],
            outputs: vec![],
            policy,
            kind,
        }
    }

    pub fn input(mut self, reference: impl Into<String>) -> Self {
        self.inputs.push(ArtifactRef::new(reference));
        self
    }

    pub fn output(mut self, reference: impl Into<String>) -> Self {
        self.outputs.push(ArtifactRef::new(reference));
        self
    }
}

/// What a stage hands back: the artifact sets for each declared output,
/// plus an optional human-readable note for the run report.
#[derive(Debug, Default)]
pub struct StageOutput {
    pub artifacts: Vec<(ArtifactRef, Vec<Artifact>)>,
    pub note: Option<String>,
}

impl StageOutput {
    pub fn publish(
        mut self,
        reference: impl Into<String>,
        artifacts: Vec<Artifact>,
    ) -> Self {
        self.artifacts.push((ArtifactRef::new(reference), artifacts));
        self
    }

    pub fn note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// The unit of pipeline work.
#[async_trait]
pub trait StageRunner: Send + Sync {
    async fn run(&self, ctx: &StageContext) -> DocforgeResult<StageOutput>;
}

/// A stage definition ready for scheduling.
pub struct StageDef {
    pub meta: StageMeta,
    pub runner: Arc<dyn StageRunner>,
}

impl StageDef {
    pub fn new(meta: StageMeta, runner: Arc<dyn StageRunner>) -> Self {
        Self { meta, runner }
    }
}

/// Shared per-run store of published artifacts.
///
/// Publishing is once-only per reference; artifacts are immutable after
/// that. Lock hold times are short since stages only touch the store at
/// their boundaries.
#[derive(Default)]
pub struct ArtifactStore {
    inner: RwLock<HashMap<ArtifactRef, Vec<Artifact>>>,
}

impl ArtifactStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, reference: ArtifactRef, artifacts: Vec<Artifact>) -> DocforgeResult<()> {
        let mut inner = self.inner.write().expect("artifact store lock poisoned");
        if inner.contains_key(&reference) {
            return Err(DocforgeError::ArtifactAlreadyPublished {
                reference: reference.to_string(),
            });
        }
        inner.insert(reference, artifacts);
        Ok(())
    }

    pub fn get(&self, reference: &ArtifactRef) -> Option<Vec<Artifact>> {
        self.inner
            .read()
            .expect("artifact store lock poisoned")
            .get(reference)
            .cloned()
    }

    pub fn contains(&self, reference: &ArtifactRef) -> bool {
        self.inner
            .read()
            .expect("artifact store lock poisoned")
            .contains_key(reference)
    }
}

/// Everything a running stage may look at.
pub struct StageContext {
    pub revision: Revision,
    artifacts: Arc<ArtifactStore>,
}

impl StageContext {
    pub fn new(revision: Revision, artifacts: Arc<ArtifactStore>) -> Self {
        Self {
            revision,
            artifacts,
        }
    }

    /// Published artifacts for a declared input. The scheduler only
    /// starts a stage once all of its inputs exist, so a `None` here
    /// means the stage asked for something it never declared.
    pub fn input(&self, reference: &str) -> Option<Vec<Artifact>> {
        self.artifacts.get(&ArtifactRef::new(reference))
    }
}
