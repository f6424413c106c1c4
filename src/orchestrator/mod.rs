//! Run sequencing: plan, probe, evaluate, reallocate, complete, select.
//!
//! The orchestrator exclusively owns the budget ledger and every pilot state
//! transition. Collaborators only ever return data; the orchestrator applies
//! it. Within one round, all probe tasks reach a terminal outcome before any
//! evaluation starts, all evaluations before reallocation, and reallocation
//! before completion tasks run. Across pilots no ordering is guaranteed.
//!
//! Failures scoped to one pilot never propagate to siblings: a failed probe
//! auto-rejects that pilot at score zero and the round carries on. Only an
//! empty plan or zero surviving pilots fail the run as a whole.

pub mod state;

use crate::config::RunConfig;
use crate::errors::{LedgerError, PlanningError, RunError};
use crate::evaluation::{Decision, Evaluation, retained_budget, rubric_verdict};
use crate::executor::{PhaseExecutor, TaskError, TaskOutcome};
use crate::ledger::BudgetLedger;
use crate::money::Cents;
use crate::pilot::{PilotId, PilotState, PilotStrategy};
use crate::providers::{
    Artifact, EvaluationInput, Evaluator, GenerationProvider, ProductionRequest, SnapshotSink,
    StrategyGenerator,
};
use crate::realloc::{ReallocationPolicy, ReallocationRecord};
use crate::selection::SelectionPolicy;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use state::{FinalResult, PilotRun, RunSnapshot};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events emitted while a run progresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// Planning finished; these pilots entered the race.
    PlanCompleted { pilots: Vec<PilotId> },
    /// A probe/evaluate/reallocate round has started.
    RoundStarted { round: u32 },
    /// A pilot's probe reached a terminal outcome.
    ProbeCompleted {
        pilot: PilotId,
        spent: Cents,
        failed: bool,
    },
    /// A pilot was scored and the rubric applied.
    PilotEvaluated {
        pilot: PilotId,
        score: u8,
        decision: Decision,
    },
    /// A pilot was cancelled and its remainder reclaimed.
    PilotRejected { pilot: PilotId, reclaimed: Cents },
    /// Reclaimed budget was redistributed to survivors.
    BudgetReallocated { record: ReallocationRecord },
    /// A pilot's completion phase finished.
    CompletionFinished {
        pilot: PilotId,
        cut_off: bool,
        artifacts: usize,
    },
    /// The run finished (with or without a winner).
    RunCompleted {
        winner: Option<PilotId>,
        total_spent: Cents,
    },
}

/// Per-pilot unit-loop progress, shared between retry attempts so a retried
/// task resumes after the last paid-for unit instead of re-spending.
#[derive(Debug, Default)]
struct UnitProgress {
    units_done: u32,
    artifacts: Vec<Artifact>,
    spent: Cents,
    cut_off: bool,
}

/// Sequences a full speculative run over competing pilot strategies.
pub struct Orchestrator<G, P, E> {
    generator: G,
    provider: Arc<P>,
    evaluator: Arc<E>,
    config: RunConfig,
    selection: SelectionPolicy,
    realloc: ReallocationPolicy,
    event_tx: Option<mpsc::Sender<RunEvent>>,
    snapshot_sink: Option<Arc<dyn SnapshotSink>>,
}

impl<G, P, E> Orchestrator<G, P, E>
where
    G: StrategyGenerator,
    P: GenerationProvider + 'static,
    E: Evaluator + 'static,
{
    pub fn new(generator: G, provider: P, evaluator: E, config: RunConfig) -> Self {
        Self {
            generator,
            provider: Arc::new(provider),
            evaluator: Arc::new(evaluator),
            config,
            selection: SelectionPolicy,
            realloc: ReallocationPolicy,
            event_tx: None,
            snapshot_sink: None,
        }
    }

    /// Set the event channel for progress updates.
    pub fn with_event_channel(mut self, tx: mpsc::Sender<RunEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Set the best-effort snapshot sink invoked after each phase.
    pub fn with_snapshot_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.snapshot_sink = Some(sink);
        self
    }

    /// Execute a full run: plan, then bounded rounds of
    /// probe/evaluate/reallocate, then completion and selection.
    pub async fn run(
        &self,
        request: ProductionRequest,
        total_budget: Cents,
    ) -> Result<FinalResult, RunError> {
        let run_id = Uuid::new_v4();
        info!(%run_id, budget = %total_budget, "starting speculative run");

        // Plan. An empty plan fails before any ledger allocation exists.
        let strategies = self.generator.plan(&request, total_budget).await?;
        if strategies.is_empty() {
            return Err(RunError::NoStrategies);
        }

        let ledger = Arc::new(BudgetLedger::new(total_budget));
        let mut pilots = self.admit_pilots(strategies, &ledger)?;

        self.emit(RunEvent::PlanCompleted {
            pilots: pilots.keys().cloned().collect(),
        })
        .await;
        self.snapshot(run_id, "plan", &ledger, &pilots);

        // Bounded rounds of probe -> evaluate -> reallocate.
        let max_rounds = self.config.max_rounds.max(1);
        for round in 1..=max_rounds {
            let eligible: Vec<PilotId> = pilots
                .values()
                .filter(|p| matches!(p.state, PilotState::Planned | PilotState::Approved))
                .map(|p| p.id().clone())
                .collect();
            if eligible.is_empty() {
                break;
            }

            info!(round, pilots = eligible.len(), "starting trial round");
            self.emit(RunEvent::RoundStarted { round }).await;

            let rejected = self
                .probe_and_evaluate(run_id, round, &eligible, &ledger, &mut pilots)
                .await?;
            self.snapshot(run_id, &format!("evaluate:{round}"), &ledger, &pilots);

            self.reallocate(&rejected, &ledger, &pilots).await?;
            self.snapshot(run_id, &format!("reallocate:{round}"), &ledger, &pilots);
        }

        // Completion for every surviving pilot.
        let approved: Vec<PilotId> = pilots
            .values()
            .filter(|p| p.state == PilotState::Approved)
            .map(|p| p.id().clone())
            .collect();

        if !approved.is_empty() {
            self.complete(&approved, &ledger, &mut pilots).await?;
            self.snapshot(run_id, "complete", &ledger, &pilots);
        }

        // Selection over finalized pilots.
        let candidates: Vec<(PilotId, u8, Cents)> = pilots
            .values()
            .filter(|p| p.state == PilotState::Finalized)
            .map(|p| {
                Ok((
                    p.id().clone(),
                    p.score.unwrap_or(0),
                    ledger.spent_for(p.id())?,
                ))
            })
            .collect::<Result<_, LedgerError>>()?;

        let winner = self.selection.select(&candidates).map(|r| r.pilot_id);
        let result = self.build_result(&pilots, &ledger, winner.as_ref())?;
        self.snapshot(run_id, "select", &ledger, &pilots);

        self.emit(RunEvent::RunCompleted {
            winner: winner.clone(),
            total_spent: result.total_spent,
        })
        .await;

        match winner {
            Some(id) => {
                info!(%run_id, winner = %id, spent = %result.total_spent, "run finished");
                Ok(result)
            }
            None => {
                warn!(%run_id, "run finished with no finalized pilot");
                Err(RunError::AllPilotsFailed {
                    result: Box::new(result),
                })
            }
        }
    }

    /// Register strategies with the ledger. An over-budget strategy is
    /// rejected individually; the rest of the plan proceeds.
    fn admit_pilots(
        &self,
        strategies: Vec<PilotStrategy>,
        ledger: &BudgetLedger,
    ) -> Result<BTreeMap<PilotId, PilotRun>, RunError> {
        let mut pilots: BTreeMap<PilotId, PilotRun> = BTreeMap::new();
        for strategy in strategies {
            if pilots.contains_key(&strategy.id) {
                return Err(
                    PlanningError::new(format!("duplicate pilot id {}", strategy.id)).into(),
                );
            }
            let mut run = PilotRun::new(strategy.clone());
            match ledger.allocate(&strategy.id, strategy.allocated_budget) {
                Ok(()) => {}
                Err(LedgerError::LockPoisoned) => return Err(LedgerError::LockPoisoned.into()),
                Err(e) => {
                    warn!(pilot = %strategy.id, error = %e, "rejecting pilot at plan time");
                    run.failure = Some(e.to_string());
                    run.transition(PilotState::Rejected);
                }
            }
            pilots.insert(strategy.id.clone(), run);
        }
        Ok(pilots)
    }

    /// Probe all eligible pilots, score the survivors, apply the rubric.
    /// Returns `(source, reclaimed)` for every pilot rejected this round.
    async fn probe_and_evaluate(
        &self,
        run_id: Uuid,
        round: u32,
        eligible: &[PilotId],
        ledger: &Arc<BudgetLedger>,
        pilots: &mut BTreeMap<PilotId, PilotRun>,
    ) -> Result<Vec<(PilotId, Cents)>, RunError> {
        let mut rejected: Vec<(PilotId, Cents)> = Vec::new();

        // Probe phase.
        let mut progress: BTreeMap<PilotId, Arc<Mutex<UnitProgress>>> = BTreeMap::new();
        let tasks: Vec<_> = eligible
            .iter()
            .map(|id| {
                let run = &pilots[id];
                let shared = Arc::new(Mutex::new(UnitProgress::default()));
                progress.insert(id.clone(), shared.clone());
                let provider = self.provider.clone();
                let ledger = ledger.clone();
                let strategy = run.strategy.clone();
                let units = strategy.probe_units;
                (id.clone(), move |_attempt: u32| {
                    run_units(
                        provider.clone(),
                        ledger.clone(),
                        strategy.clone(),
                        units,
                        shared.clone(),
                        true,
                    )
                })
            })
            .collect();

        for id in eligible {
            if let Some(run) = pilots.get_mut(id) {
                run.transition(PilotState::Probing);
            }
        }

        let executor = PhaseExecutor::new(
            self.config
                .executor_config()
                .with_max_concurrency(self.config.probe_concurrency),
        );
        let outcomes = executor.run_phase(tasks).await;

        // Fold probe results back into pilot state. Partial artifacts are
        // retained even when the task ultimately failed.
        let mut to_evaluate: Vec<PilotId> = Vec::new();
        for TaskOutcome { pilot_id, outcome } in outcomes {
            let spent_this_round = {
                let shared = &progress[&pilot_id];
                let mut p = shared.lock().map_err(|_| LedgerError::LockPoisoned)?;
                let run = pilots
                    .get_mut(&pilot_id)
                    .ok_or_else(|| LedgerError::UnknownPilot(pilot_id.clone()))?;
                run.probe_artifacts.append(&mut p.artifacts);
                p.spent
            };

            match outcome {
                Ok(()) => {
                    debug!(pilot = %pilot_id, round, spent = %spent_this_round, "probe finished");
                    self.emit(RunEvent::ProbeCompleted {
                        pilot: pilot_id.clone(),
                        spent: spent_this_round,
                        failed: false,
                    })
                    .await;
                    to_evaluate.push(pilot_id);
                }
                Err(failure) => {
                    warn!(pilot = %pilot_id, round, error = %failure, "probe failed, auto-rejecting");
                    self.emit(RunEvent::ProbeCompleted {
                        pilot: pilot_id.clone(),
                        spent: spent_this_round,
                        failed: true,
                    })
                    .await;
                    let reclaimed = ledger.freeze(&pilot_id)?;
                    let run = pilots
                        .get_mut(&pilot_id)
                        .ok_or_else(|| LedgerError::UnknownPilot(pilot_id.clone()))?;
                    run.failure = Some(failure.to_string());
                    run.score = Some(0);
                    run.transition(PilotState::Rejected);
                    self.emit(RunEvent::PilotRejected {
                        pilot: pilot_id.clone(),
                        reclaimed,
                    })
                    .await;
                    rejected.push((pilot_id, reclaimed));
                }
            }
        }

        self.snapshot(run_id, &format!("probe:{round}"), ledger, pilots);

        // Evaluation phase for pilots whose probe succeeded.
        let eval_tasks: Vec<_> = to_evaluate
            .iter()
            .map(|id| {
                let run = &pilots[id];
                let entry = ledger.entry_for(id)?;
                let input = EvaluationInput {
                    pilot_id: id.clone(),
                    artifacts: run.probe_artifacts.clone(),
                    spent: entry.spent,
                    allocated: entry.allocated,
                };
                let evaluator = self.evaluator.clone();
                Ok((id.clone(), move |_attempt: u32| {
                    let evaluator = evaluator.clone();
                    let input = input.clone();
                    async move {
                        // Evaluator failures auto-reject the pilot; they are
                        // not worth retrying, only attempt timeouts are.
                        evaluator
                            .score(input)
                            .await
                            .map_err(|e| TaskError::Fatal(e.to_string()))
                    }
                }))
            })
            .collect::<Result<_, LedgerError>>()?;

        let executor = PhaseExecutor::new(
            self.config
                .executor_config()
                .with_max_concurrency(self.config.evaluation_concurrency),
        );
        let outcomes = executor.run_phase(eval_tasks).await;

        for TaskOutcome { pilot_id, outcome } in outcomes {
            match outcome {
                Ok(evaluation) => {
                    let reclaimed =
                        self.apply_verdict(&pilot_id, evaluation, ledger, pilots).await?;
                    if let Some(reclaimed) = reclaimed {
                        rejected.push((pilot_id, reclaimed));
                    }
                }
                Err(failure) => {
                    warn!(pilot = %pilot_id, error = %failure, "evaluation failed, auto-rejecting");
                    let reclaimed = ledger.freeze(&pilot_id)?;
                    let run = pilots
                        .get_mut(&pilot_id)
                        .ok_or_else(|| LedgerError::UnknownPilot(pilot_id.clone()))?;
                    run.failure = Some(failure.to_string());
                    run.score = Some(0);
                    run.transition(PilotState::Rejected);
                    self.emit(RunEvent::PilotRejected {
                        pilot: pilot_id.clone(),
                        reclaimed,
                    })
                    .await;
                    rejected.push((pilot_id, reclaimed));
                }
            }
        }

        Ok(rejected)
    }

    /// Apply the rubric to one evaluation. Returns the reclaimed amount if
    /// the pilot was cancelled.
    async fn apply_verdict(
        &self,
        pilot_id: &PilotId,
        evaluation: Evaluation,
        ledger: &BudgetLedger,
        pilots: &mut BTreeMap<PilotId, PilotRun>,
    ) -> Result<Option<Cents>, RunError> {
        let verdict = rubric_verdict(evaluation.score);
        let score = evaluation.score;

        {
            let run = pilots
                .get_mut(pilot_id)
                .ok_or_else(|| LedgerError::UnknownPilot(pilot_id.clone()))?;
            run.score = Some(score);
            run.evaluation = Some(evaluation);
            run.transition(PilotState::Evaluated);
        }

        self.emit(RunEvent::PilotEvaluated {
            pilot: pilot_id.clone(),
            score,
            decision: verdict.decision,
        })
        .await;

        match verdict.decision {
            Decision::Cancel => {
                let reclaimed = ledger.freeze(pilot_id)?;
                if let Some(run) = pilots.get_mut(pilot_id) {
                    run.transition(PilotState::Rejected);
                }
                info!(pilot = %pilot_id, score, reclaimed = %reclaimed, "pilot cancelled");
                self.emit(RunEvent::PilotRejected {
                    pilot: pilot_id.clone(),
                    reclaimed,
                })
                .await;
                Ok(Some(reclaimed))
            }
            Decision::Continue => {
                let remaining = ledger.remaining_for(pilot_id)?;
                let retained = retained_budget(remaining, verdict);
                if retained < remaining {
                    let spent = ledger.spent_for(pilot_id)?;
                    let trimmed = ledger.reduce_allocation(pilot_id, spent + retained)?;
                    debug!(pilot = %pilot_id, score, trimmed = %trimmed, "allocation trimmed by rubric");
                }
                if let Some(run) = pilots.get_mut(pilot_id) {
                    run.transition(PilotState::Approved);
                }
                Ok(None)
            }
        }
    }

    /// Redistribute each rejected pilot's remainder across approved
    /// survivors, in deterministic source order.
    async fn reallocate(
        &self,
        rejected: &[(PilotId, Cents)],
        ledger: &BudgetLedger,
        pilots: &BTreeMap<PilotId, PilotRun>,
    ) -> Result<(), RunError> {
        for (source, reclaimed) in rejected {
            let survivors: Vec<(PilotId, Cents)> = pilots
                .values()
                .filter(|p| p.state == PilotState::Approved)
                .map(|p| Ok((p.id().clone(), ledger.remaining_for(p.id())?)))
                .collect::<Result<_, LedgerError>>()?;

            let record = self.realloc.distribute(source, *reclaimed, &survivors);
            for (target, amount) in &record.distribution {
                ledger.increase_allocation(target, *amount)?;
            }
            info!(
                source = %source,
                reclaimed = %record.reclaimed,
                survivors = record.distribution.len(),
                reserve = %record.to_reserve,
                "reclaimed budget redistributed"
            );
            self.emit(RunEvent::BudgetReallocated { record }).await;
        }
        Ok(())
    }

    /// Run the completion phase for approved pilots. Pilots that hit their
    /// budget boundary mid-run are cut off and finalized with whatever they
    /// produced; only a failure with zero completed units marks Failed.
    async fn complete(
        &self,
        approved: &[PilotId],
        ledger: &Arc<BudgetLedger>,
        pilots: &mut BTreeMap<PilotId, PilotRun>,
    ) -> Result<(), RunError> {
        let mut progress: BTreeMap<PilotId, Arc<Mutex<UnitProgress>>> = BTreeMap::new();
        let tasks: Vec<_> = approved
            .iter()
            .map(|id| {
                let run = &pilots[id];
                let shared = Arc::new(Mutex::new(UnitProgress::default()));
                progress.insert(id.clone(), shared.clone());
                let provider = self.provider.clone();
                let ledger = ledger.clone();
                let strategy = run.strategy.clone();
                let units = strategy.full_units;
                (id.clone(), move |_attempt: u32| {
                    run_units(
                        provider.clone(),
                        ledger.clone(),
                        strategy.clone(),
                        units,
                        shared.clone(),
                        false,
                    )
                })
            })
            .collect();

        for id in approved {
            if let Some(run) = pilots.get_mut(id) {
                run.transition(PilotState::Completing);
            }
        }

        let executor = PhaseExecutor::new(
            self.config
                .executor_config()
                .with_max_concurrency(self.config.completion_concurrency),
        );
        let outcomes = executor.run_phase(tasks).await;

        for TaskOutcome { pilot_id, outcome } in outcomes {
            let (units_done, cut_off) = {
                let shared = &progress[&pilot_id];
                let mut p = shared.lock().map_err(|_| LedgerError::LockPoisoned)?;
                let run = pilots
                    .get_mut(&pilot_id)
                    .ok_or_else(|| LedgerError::UnknownPilot(pilot_id.clone()))?;
                run.final_artifacts.append(&mut p.artifacts);
                run.cut_off = p.cut_off;
                (p.units_done, p.cut_off)
            };

            // Spend is frozen whichever way the pilot ends.
            ledger.freeze(&pilot_id)?;

            let run = pilots
                .get_mut(&pilot_id)
                .ok_or_else(|| LedgerError::UnknownPilot(pilot_id.clone()))?;
            match outcome {
                Ok(()) => {
                    run.transition(PilotState::Finalized);
                }
                Err(failure) => {
                    run.failure = Some(failure.to_string());
                    if units_done > 0 {
                        // Partial output still counts; finalize with it.
                        run.transition(PilotState::Finalized);
                    } else {
                        run.transition(PilotState::Failed);
                    }
                }
            }

            let artifacts = run.final_artifacts.len();
            info!(
                pilot = %pilot_id,
                state = %run.state,
                units = units_done,
                cut_off,
                "completion finished"
            );
            self.emit(RunEvent::CompletionFinished {
                pilot: pilot_id,
                cut_off,
                artifacts,
            })
            .await;
        }
        Ok(())
    }

    fn build_result(
        &self,
        pilots: &BTreeMap<PilotId, PilotRun>,
        ledger: &BudgetLedger,
        winner: Option<&PilotId>,
    ) -> Result<FinalResult, RunError> {
        let snap = ledger.snapshot()?;
        let reports = pilots
            .values()
            .map(|p| p.report(snap.entry_for(p.id())))
            .collect();
        let artifacts = winner
            .and_then(|id| pilots.get(id))
            .map(|p| p.final_artifacts.clone())
            .unwrap_or_default();
        Ok(FinalResult {
            winner: winner.cloned(),
            pilots: reports,
            total_spent: snap.total_spent,
            total_remaining: snap.total_budget.saturating_sub(snap.total_spent),
            artifacts,
        })
    }

    /// Emit an event to the event channel if configured.
    async fn emit(&self, event: RunEvent) {
        if let Some(ref tx) = self.event_tx {
            tx.send(event).await.ok();
        }
    }

    /// Hand a post-phase snapshot to the sink, fire-and-forget. The run
    /// never waits on persistence and never fails because of it.
    fn snapshot(
        &self,
        run_id: Uuid,
        phase: &str,
        ledger: &BudgetLedger,
        pilots: &BTreeMap<PilotId, PilotRun>,
    ) {
        let Some(sink) = self.snapshot_sink.clone() else {
            return;
        };
        let ledger_snap = match ledger.snapshot() {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "skipping snapshot, ledger unreadable");
                return;
            }
        };
        let snapshot = RunSnapshot {
            run_id,
            phase: phase.to_string(),
            taken_at: Utc::now(),
            pilots: pilots
                .values()
                .map(|p| p.report(ledger_snap.entry_for(p.id())))
                .collect(),
            ledger: ledger_snap,
        };
        tokio::spawn(async move {
            if let Err(e) = sink.persist(&snapshot).await {
                warn!(phase = %snapshot.phase, error = %e, "snapshot sink failed");
            }
        });
    }
}

/// Produce up to `units` units for one pilot, spending through the ledger
/// before progress is recorded. Shared `progress` makes retries resume after
/// the last paid-for unit.
///
/// In probe mode a non-retryable provider error or a ledger refusal is fatal
/// to the task; in completion mode it cuts the pilot off with whatever was
/// produced so far.
async fn run_units<P: GenerationProvider>(
    provider: Arc<P>,
    ledger: Arc<BudgetLedger>,
    strategy: PilotStrategy,
    units: u32,
    progress: Arc<Mutex<UnitProgress>>,
    probe: bool,
) -> Result<(), TaskError> {
    loop {
        let done = lock_progress(&progress)?.units_done;
        if done >= units {
            break;
        }

        let cap = ledger
            .remaining_for(&strategy.id)
            .map_err(|e| TaskError::Fatal(e.to_string()))?;
        if cap.is_zero() {
            if !probe {
                lock_progress(&progress)?.cut_off = true;
            }
            break;
        }

        let output = match provider.run(&strategy.id, &strategy, cap).await {
            Ok(output) => output,
            Err(e) if e.is_retryable() => return Err(TaskError::Retryable(e.to_string())),
            Err(e) => {
                if probe {
                    return Err(TaskError::Fatal(e.to_string()));
                }
                debug!(pilot = %strategy.id, error = %e, "completion cut off, cap too low");
                lock_progress(&progress)?.cut_off = true;
                break;
            }
        };

        match ledger.record_spend(&strategy.id, output.cost) {
            Ok(()) => {}
            Err(e @ (LedgerError::BudgetExceeded { .. } | LedgerError::Frozen(_))) if !probe => {
                debug!(pilot = %strategy.id, error = %e, "completion cut off at budget boundary");
                lock_progress(&progress)?.cut_off = true;
                break;
            }
            Err(e) => return Err(TaskError::Fatal(e.to_string())),
        }

        let mut p = lock_progress(&progress)?;
        p.units_done += 1;
        p.spent += output.cost;
        p.artifacts.extend(output.artifacts);
    }
    Ok(())
}

fn lock_progress(
    progress: &Arc<Mutex<UnitProgress>>,
) -> Result<std::sync::MutexGuard<'_, UnitProgress>, TaskError> {
    progress
        .lock()
        .map_err(|_| TaskError::Fatal("progress state poisoned".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_event_serialization() {
        let event = RunEvent::PilotEvaluated {
            pilot: PilotId::new("a"),
            score: 85,
            decision: Decision::Continue,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("pilot_evaluated"));
        assert!(json.contains("85"));
        assert!(json.contains("continue"));
    }

    #[test]
    fn test_run_event_realloc_roundtrip() {
        let record = ReallocationRecord {
            source: PilotId::new("c"),
            reclaimed: Cents(3_000),
            distribution: [(PilotId::new("a"), Cents(923)), (PilotId::new("b"), Cents(2_077))]
                .into_iter()
                .collect(),
            to_reserve: Cents::ZERO,
        };
        let event = RunEvent::BudgetReallocated { record };
        let json = serde_json::to_string(&event).unwrap();
        let parsed: RunEvent = serde_json::from_str(&json).unwrap();
        match parsed {
            RunEvent::BudgetReallocated { record } => {
                assert!(record.is_conserved());
                assert_eq!(record.reclaimed, Cents(3_000));
            }
            other => panic!("Expected BudgetReallocated, got {other:?}"),
        }
    }
}
