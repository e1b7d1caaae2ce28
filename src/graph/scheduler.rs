//! Stage graph execution
//!
//! The scheduler validates the declared artifact interface once (single
//! producer per reference, no unknown inputs, no cycles), then executes
//! stages concurrently as their inputs become available. Failure policy
//! decides what a failed stage does to the rest of the run.

use crate::error::{DocforgeError, DocforgeResult};
use crate::graph::dag::Dag;
use crate::graph::stage::{
    Artifact, ArtifactRef, ArtifactStore, FailurePolicy, StageContext, StageDef, StageOutput,
    StageState,
};
use crate::revision::Revision;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Terminal record of one stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub name: String,
    pub state: StageState,
    pub duration_ms: u64,
    /// Failure reason, degradation note, or a runner-provided summary.
    pub detail: Option<String>,
}

/// Terminal record of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub revision: String,
    pub stages: Vec<StageReport>,
    pub duration_ms: u64,
    pub success: bool,
}

impl RunReport {
    pub fn stage(&self, name: &str) -> Option<&StageReport> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// The stage to blame when the run failed: the first failed stage,
    /// or the first skipped one if nothing actually failed.
    pub fn first_failure(&self) -> Option<&StageReport> {
        self.stages
            .iter()
            .find(|s| s.state == StageState::Failed)
            .or_else(|| {
                self.stages
                    .iter()
                    .find(|s| s.state == StageState::SkippedUpstreamFailure)
            })
    }
}

/// Validated execution plan: producer indices per stage and the stage
/// name DAG used for failure propagation.
struct Plan {
    producers: Vec<Vec<usize>>,
    dag: Dag<String>,
}

/// Executes a set of stage definitions against one revision.
pub struct Scheduler {
    stages: Vec<StageDef>,
    run_timeout: Duration,
}

impl Scheduler {
    pub fn new(stages: Vec<StageDef>, run_timeout: Duration) -> Self {
        Self {
            stages,
            run_timeout,
        }
    }

    /// Run the pipeline to completion or to its deadline.
    ///
    /// Stage failures do not surface here; they are recorded in the
    /// report and `success` is false. Errors are reserved for an invalid
    /// graph, a blown run deadline, or internal faults.
    pub async fn execute(
        &self,
        revision: Revision,
        artifacts: Arc<ArtifactStore>,
    ) -> DocforgeResult<RunReport> {
        let plan = self.validate()?;

        match tokio::time::timeout(self.run_timeout, self.drive(&plan, revision, artifacts)).await
        {
            Ok(result) => result,
            Err(_) => {
                // Dropping the drive future aborts every in-flight stage
                // task along with it.
                error!(timeout_secs = self.run_timeout.as_secs(), "pipeline deadline exceeded");
                Err(DocforgeError::PipelineTimeout {
                    timeout_secs: self.run_timeout.as_secs(),
                })
            }
        }
    }

    /// Check the declared artifact interface and build the plan.
    fn validate(&self) -> DocforgeResult<Plan> {
        let mut producer_of: HashMap<&str, usize> = HashMap::new();
        for (idx, stage) in self.stages.iter().enumerate() {
            for output in &stage.meta.outputs {
                if let Some(&prev) = producer_of.get(output.as_str()) {
                    return Err(DocforgeError::DuplicateProducer {
                        reference: output.to_string(),
                        first: self.stages[prev].meta.name.clone(),
                        second: stage.meta.name.clone(),
                    });
                }
                producer_of.insert(output.as_str(), idx);
            }
        }

        let mut dag = Dag::new();
        let node_ids: Vec<_> = self
            .stages
            .iter()
            .map(|s| dag.add(s.meta.name.clone()))
            .collect();

        let mut producers = vec![Vec::new(); self.stages.len()];
        for (idx, stage) in self.stages.iter().enumerate() {
            for input in &stage.meta.inputs {
                let &pidx = producer_of.get(input.as_str()).ok_or_else(|| {
                    DocforgeError::UnknownInput {
                        stage: stage.meta.name.clone(),
                        reference: input.to_string(),
                    }
                })?;
                if !producers[idx].contains(&pidx) {
                    producers[idx].push(pidx);
                }
                dag.link(node_ids[pidx], node_ids[idx]);
            }
        }

        dag.toposort()?;

        Ok(Plan { producers, dag })
    }

    async fn drive(
        &self,
        plan: &Plan,
        revision: Revision,
        artifacts: Arc<ArtifactStore>,
    ) -> DocforgeResult<RunReport> {
        let run_id = Uuid::new_v4();
        let started = Instant::now();
        let ctx = Arc::new(StageContext::new(revision.clone(), artifacts.clone()));

        let index_of: HashMap<String, usize> = self
            .stages
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.meta.name.clone(), idx))
            .collect();

        let mut states = vec![StageState::Pending; self.stages.len()];
        let mut details: Vec<Option<String>> = vec![None; self.stages.len()];
        let mut durations = vec![0u64; self.stages.len()];

        info!(run_id = %run_id, revision = %revision.short(), "starting pipeline run");

        let mut join_set: JoinSet<(usize, u64, DocforgeResult<StageOutput>)> = JoinSet::new();
        let mut fatal: Option<String> = None;

        self.spawn_ready(plan, &mut states, &ctx, &mut join_set);

        while let Some(joined) = join_set.join_next().await {
            let (idx, elapsed_ms, result) = joined
                .map_err(|e| DocforgeError::Internal(format!("stage task panicked: {e}")))?;
            durations[idx] = elapsed_ms;
            let meta = &self.stages[idx].meta;

            let failure = match result {
                Ok(output) => {
                    let StageOutput {
                        artifacts: published,
                        note,
                    } = output;
                    details[idx] = note;
                    self.publish_outputs(idx, published, &artifacts)
                }
                Err(e) if meta.policy == FailurePolicy::ContinueWithFallback => {
                    // The stage's contract says failure is survivable.
                    // Record the degradation and publish placeholders so
                    // downstream stages still have their inputs.
                    warn!(stage = %meta.name, "stage degraded: {e}");
                    for reference in &meta.outputs {
                        let _ = artifacts.publish(reference.clone(), vec![]);
                    }
                    details[idx] = Some(format!("degraded: {e}"));
                    None
                }
                Err(e) => Some(e.to_string()),
            };

            match failure {
                None => {
                    states[idx] = StageState::Succeeded;
                    info!(stage = %meta.name, duration_ms = elapsed_ms, "stage succeeded");
                }
                Some(reason) => {
                    states[idx] = StageState::Failed;
                    details[idx] = Some(reason.clone());
                    error!(stage = %meta.name, "stage failed: {reason}");

                    if meta.policy == FailurePolicy::Fatal {
                        fatal = Some(meta.name.clone());
                    } else {
                        for dependent in plan.dag.transitive_dependents(&meta.name) {
                            let didx = index_of[&dependent];
                            if !states[didx].is_terminal() && states[didx] != StageState::Running {
                                states[didx] = StageState::SkippedUpstreamFailure;
                                details[didx] =
                                    Some(format!("upstream stage '{}' failed", meta.name));
                                warn!(stage = %dependent, "skipped: upstream failure");
                            }
                        }
                    }
                }
            }

            // After a fatal failure nothing new starts; in-flight stages
            // drain to a terminal state before we return.
            if fatal.is_none() {
                self.spawn_ready(plan, &mut states, &ctx, &mut join_set);
            }
        }

        if let Some(fatal_stage) = &fatal {
            for (idx, state) in states.iter_mut().enumerate() {
                if !state.is_terminal() {
                    *state = StageState::SkippedUpstreamFailure;
                    details[idx] =
                        Some(format!("cancelled after fatal failure of '{fatal_stage}'"));
                }
            }
        }

        let success = states.iter().all(|s| *s == StageState::Succeeded);
        let report = RunReport {
            run_id,
            revision: revision.as_str().to_string(),
            stages: self
                .stages
                .iter()
                .enumerate()
                .map(|(idx, s)| StageReport {
                    name: s.meta.name.clone(),
                    state: states[idx],
                    duration_ms: durations[idx],
                    detail: details[idx].clone(),
                })
                .collect(),
            duration_ms: started.elapsed().as_millis() as u64,
            success,
        };

        if success {
            info!(run_id = %run_id, duration_ms = report.duration_ms, "pipeline run succeeded");
        } else {
            let blamed = report
                .first_failure()
                .map_or_else(|| "unknown".to_string(), |s| s.name.clone());
            warn!(run_id = %run_id, stage = %blamed, "pipeline run failed");
        }

        Ok(report)
    }

    /// Move every satisfied pending stage through Ready into Running.
    ///
    /// Stages becoming ready together share no data dependency, so the
    /// spawn order here is not part of the contract.
    fn spawn_ready(
        &self,
        plan: &Plan,
        states: &mut [StageState],
        ctx: &Arc<StageContext>,
        join_set: &mut JoinSet<(usize, u64, DocforgeResult<StageOutput>)>,
    ) {
        for idx in 0..self.stages.len() {
            if states[idx] != StageState::Pending {
                continue;
            }
            let satisfied = plan.producers[idx]
                .iter()
                .all(|&pidx| states[pidx] == StageState::Succeeded);
            if !satisfied {
                continue;
            }

            states[idx] = StageState::Ready;
            let runner = Arc::clone(&self.stages[idx].runner);
            let ctx = Arc::clone(ctx);
            let name = self.stages[idx].meta.name.clone();

            states[idx] = StageState::Running;
            info!(stage = %name, "stage started");
            join_set.spawn(async move {
                let started = Instant::now();
                let result = runner.run(&ctx).await;
                (idx, started.elapsed().as_millis() as u64, result)
            });
        }
    }

    /// Publish a finished stage's artifact sets, enforcing the declared
    /// interface. Returns the failure reason, if any.
    fn publish_outputs(
        &self,
        idx: usize,
        published: Vec<(ArtifactRef, Vec<Artifact>)>,
        artifacts: &ArtifactStore,
    ) -> Option<String> {
        let meta = &self.stages[idx].meta;

        for (reference, files) in published {
            if !meta.outputs.contains(&reference) {
                return Some(format!("published undeclared artifact '{reference}'"));
            }
            if let Err(e) = artifacts.publish(reference, files) {
                return Some(e.to_string());
            }
        }

        for reference in &meta.outputs {
            if !artifacts.contains(reference) {
                return Some(
                    DocforgeError::MissingOutput {
                        stage: meta.name.clone(),
                        reference: reference.to_string(),
                    }
                    .to_string(),
                );
            }
        }

        None
    }
}
