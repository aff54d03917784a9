//! Dependency-ordered scheduler and executor.
//!
//! Drives a declaration to convergence: builds the dependency graph,
//! tears down orphans, then dispatches ready nodes to provider
//! adapters under a concurrency bound. A node is dispatched only when
//! every dependency is `Ready` and all of its referenced outputs are
//! resolved; reference markers in its properties are substituted just
//! before dispatch.
//!
//! Failure is contained: a failed node marks its transitive dependents
//! `Skipped`, while independent subgraphs run to completion.

use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use stratus_decl::{resolve_value, Declaration, ResolveConflicts, SpecHash};
use stratus_graph::DependencyGraph;
use stratus_id::ResourceName;
use stratus_provider::{Outputs, Provider, ProviderError, ProviderRegistry};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::outputs::OutputTable;
use crate::plan::{Plan, PlanEntry, PlannedAction};
use crate::report::{AppliedAction, FinalState, NodeReport, RunReport};
use crate::store::{ReconciliationRecord, StateStore, StoreError};

/// The provisioning engine.
pub struct Engine {
    registry: ProviderRegistry,
    store: Arc<StateStore>,
    config: EngineConfig,
}

/// What one worker hands back to the scheduler.
type NodeOutcome = Result<(AppliedAction, String, Outputs), EngineError>;

impl Engine {
    pub fn new(registry: ProviderRegistry, store: Arc<StateStore>, config: EngineConfig) -> Self {
        Self {
            registry,
            store,
            config,
        }
    }

    /// Compute what a run would do, with zero provider calls.
    ///
    /// Declared resources are diffed against stored records by spec
    /// hash; orphans are appended as deletions in teardown order.
    pub fn plan(&self, decl: &Declaration) -> Result<Plan, EngineError> {
        let graph = DependencyGraph::build(decl)?;
        self.validate_kinds(decl)?;
        let records = self.load_records()?;

        let mut entries = Vec::with_capacity(graph.len());
        for name in graph.topo_order() {
            let resource = decl
                .get(&name)
                .ok_or_else(|| EngineError::StateCorruption(format!("unknown node '{name}'")))?;
            let action = match records.get(&name) {
                None => PlannedAction::Create,
                Some(rec) if rec.spec_hash == resource.spec_hash() => PlannedAction::Noop,
                Some(_) => PlannedAction::Update,
            };
            entries.push(PlanEntry {
                name,
                kind: resource.kind.clone(),
                action,
            });
        }

        for rec in orphan_teardown_order(records.into_values().filter(|r| !decl.contains(&r.resource))) {
            entries.push(PlanEntry {
                name: rec.resource,
                kind: rec.kind,
                action: PlannedAction::Delete,
            });
        }

        Ok(Plan {
            stack: decl.stack.clone(),
            entries,
        })
    }

    /// Apply a declaration: converge every declared resource and tear
    /// down orphans. `cancel` flipping to `true` stops dispatch; work
    /// already in flight is joined, everything undispatched ends
    /// `Interrupted`.
    pub async fn up(
        &self,
        decl: &Declaration,
        mut cancel: watch::Receiver<bool>,
    ) -> Result<RunReport, EngineError> {
        // Everything that can abort the run fails here, before any
        // side effect.
        let graph = DependencyGraph::build(decl)?;
        self.validate_kinds(decl)?;
        let records = self.load_records()?;

        let mut report = RunReport::new(&decl.stack, self.config.dry_run);
        info!(
            run_id = %report.run_id,
            stack = %decl.stack,
            resources = graph.len(),
            dry_run = self.config.dry_run,
            "Starting run"
        );

        if self.config.dry_run {
            for entry in self.plan(decl)?.entries {
                report.record(NodeReport {
                    name: entry.name,
                    kind: entry.kind,
                    action: AppliedAction::None,
                    state: FinalState::Ready,
                    cause: Some(format!("dry-run: would {:?}", entry.action).to_lowercase()),
                    outputs: Outputs::new(),
                });
            }
            return Ok(report);
        }

        self.teardown_orphans(decl, &records, &cancel, &mut report)
            .await?;
        self.run_graph(decl, &graph, &records, &mut cancel, &mut report)
            .await?;

        info!(
            run_id = %report.run_id,
            ready = report.count(FinalState::Ready),
            failed = report.count(FinalState::Failed),
            skipped = report.count(FinalState::Skipped),
            interrupted = report.count(FinalState::Interrupted),
            "Run finished"
        );
        Ok(report)
    }

    fn validate_kinds(&self, decl: &Declaration) -> Result<(), EngineError> {
        for resource in decl.iter() {
            if self.registry.get(&resource.kind).is_none() {
                return Err(EngineError::UnknownKind(resource.kind.clone()));
            }
        }
        Ok(())
    }

    fn load_records(
        &self,
    ) -> Result<BTreeMap<ResourceName, ReconciliationRecord>, EngineError> {
        self.store.load_all().map_err(|e| match e {
            StoreError::Corrupt { resource, detail } => {
                EngineError::StateCorruption(format!("record '{resource}': {detail}"))
            }
            other => EngineError::Store(other),
        })
    }

    /// Delete recorded resources no longer declared, children first.
    ///
    /// A failed delete is contained to that orphan: its record stays
    /// in the store so the next run retries, and the rest of the run
    /// proceeds. Cancellation is checked between deletions.
    async fn teardown_orphans(
        &self,
        decl: &Declaration,
        records: &BTreeMap<ResourceName, ReconciliationRecord>,
        cancel: &watch::Receiver<bool>,
        report: &mut RunReport,
    ) -> Result<(), EngineError> {
        let orphans = orphan_teardown_order(
            records
                .values()
                .filter(|r| !decl.contains(&r.resource))
                .cloned(),
        );

        for rec in orphans {
            if *cancel.borrow() {
                report.record(NodeReport::interrupted(rec.resource, &rec.kind));
                continue;
            }

            let outcome = match self.registry.get(&rec.kind) {
                Some(provider) => {
                    let timeout = self.config.timeout_for(&rec.kind, None);
                    info!(resource = %rec.resource, kind = %rec.kind, "Tearing down orphan");
                    timed(timeout, &rec.resource, provider.delete(&rec.provider_id)).await
                }
                None => Err(EngineError::UnknownKind(rec.kind.clone())),
            };

            match outcome {
                Ok(()) => {
                    self.store.delete(&rec.resource)?;
                    report.record(NodeReport {
                        name: rec.resource,
                        kind: rec.kind,
                        action: AppliedAction::Delete,
                        state: FinalState::Ready,
                        cause: None,
                        outputs: Outputs::new(),
                    });
                }
                Err(e) => {
                    error!(resource = %rec.resource, cause = %e, "Orphan teardown failed");
                    report.record(NodeReport {
                        name: rec.resource,
                        kind: rec.kind,
                        action: AppliedAction::Delete,
                        state: FinalState::Failed,
                        cause: Some(e.to_string()),
                        outputs: Outputs::new(),
                    });
                }
            }
        }
        Ok(())
    }

    async fn run_graph(
        &self,
        decl: &Declaration,
        graph: &DependencyGraph,
        records: &BTreeMap<ResourceName, ReconciliationRecord>,
        cancel: &mut watch::Receiver<bool>,
        report: &mut RunReport,
    ) -> Result<(), EngineError> {
        let mut indegree: BTreeMap<ResourceName, usize> = graph
            .names()
            .map(|n| (n.clone(), graph.dependencies(n).len()))
            .collect();

        // BTreeSet gives the deterministic name-ordered tie-break.
        let mut ready: BTreeSet<ResourceName> = indegree
            .iter()
            .filter(|(_, deg)| **deg == 0)
            .map(|(n, _)| n.clone())
            .collect();

        let mut outputs = OutputTable::new();
        let mut done: BTreeSet<ResourceName> = BTreeSet::new();
        let mut workers: JoinSet<(ResourceName, NodeOutcome)> = JoinSet::new();
        let mut cancelled = false;
        let mut cancel_open = true;

        loop {
            while !cancelled && workers.len() < self.config.concurrency_limit {
                let Some(name) = ready.pop_first() else { break };
                let resource = decl
                    .get(&name)
                    .ok_or_else(|| EngineError::StateCorruption(format!("unknown node '{name}'")))?;

                // All dependencies are Ready, so every referenced cell
                // is resolved; a miss here is a bad output name.
                let desired = match resolve_value(&resource.properties, &|r| outputs.get(r)) {
                    Ok(v) => v,
                    Err(e) => {
                        fail_node(&name, decl, report, &e.to_string());
                        mark_skipped(&name, decl, graph, &mut done, report);
                        done.insert(name);
                        continue;
                    }
                };

                debug!(resource = %name, kind = %resource.kind, "Dispatching");
                let provider = self
                    .registry
                    .get(&resource.kind)
                    .ok_or_else(|| EngineError::UnknownKind(resource.kind.clone()))?;
                let timeout = self.config.timeout_for(&resource.kind, resource.timeout_secs);
                let record = records.get(&name).cloned();
                let decl_hash = resource.spec_hash();
                let policy = resource.resolve_conflicts;
                let task_name = name.clone();

                workers.spawn(async move {
                    let outcome = apply_node(
                        provider, &task_name, desired, record, decl_hash, policy, timeout,
                    )
                    .await;
                    (task_name, outcome)
                });
            }

            if workers.is_empty() {
                break;
            }

            // Biased so a pending cancellation is observed before more
            // completions are processed (and more nodes dispatched).
            tokio::select! {
                biased;
                changed = cancel.changed(), if cancel_open && !cancelled => {
                    match changed {
                        Ok(()) => {
                            if *cancel.borrow() {
                                warn!("Cancellation requested; joining in-flight work");
                                cancelled = true;
                            }
                        }
                        Err(_) => cancel_open = false,
                    }
                }
                joined = workers.join_next() => {
                    let (name, outcome) = match joined {
                        Some(Ok(pair)) => pair,
                        Some(Err(join_err)) => {
                            return Err(EngineError::StateCorruption(format!(
                                "worker task failed: {join_err}"
                            )));
                        }
                        None => break,
                    };
                    self.finish_node(
                        name, outcome, decl, graph, &mut indegree, &mut ready,
                        &mut outputs, &mut done, report,
                    )?;
                }
            }
        }

        // Whatever never got a report was either blocked behind the
        // cancellation or behind a skip already recorded above.
        for name in graph.names() {
            if !report.nodes.contains_key(name) {
                let kind = decl.get(name).map(|r| r.kind.as_str()).unwrap_or("");
                report.record(NodeReport::interrupted(name.clone(), kind));
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn finish_node(
        &self,
        name: ResourceName,
        outcome: NodeOutcome,
        decl: &Declaration,
        graph: &DependencyGraph,
        indegree: &mut BTreeMap<ResourceName, usize>,
        ready: &mut BTreeSet<ResourceName>,
        outputs: &mut OutputTable,
        done: &mut BTreeSet<ResourceName>,
        report: &mut RunReport,
    ) -> Result<(), EngineError> {
        let resource = decl
            .get(&name)
            .ok_or_else(|| EngineError::StateCorruption(format!("unknown node '{name}'")))?;

        match outcome {
            Ok((action, provider_id, node_outputs)) => {
                debug!(resource = %name, action = ?action, "Node ready");
                outputs.resolve_all(&name, &node_outputs)?;
                self.store.save(&ReconciliationRecord {
                    resource: name.clone(),
                    kind: resource.kind.clone(),
                    spec_hash: resource.spec_hash(),
                    provider_id,
                    outputs: node_outputs.clone(),
                    dependencies: graph.dependencies(&name).iter().cloned().collect(),
                    updated_at: chrono::Utc::now().timestamp(),
                })?;
                report.record(NodeReport::ready(
                    name.clone(),
                    &resource.kind,
                    action,
                    node_outputs,
                ));

                for dependent in graph.dependents(&name) {
                    if let Some(deg) = indegree.get_mut(dependent) {
                        *deg -= 1;
                        if *deg == 0 && !done.contains(dependent) {
                            ready.insert(dependent.clone());
                        }
                    }
                }
            }
            Err(e) => {
                fail_node(&name, decl, report, &e.to_string());
                mark_skipped(&name, decl, graph, done, report);
            }
        }
        done.insert(name);
        Ok(())
    }
}

fn fail_node(name: &ResourceName, decl: &Declaration, report: &mut RunReport, cause: &str) {
    let kind = decl.get(name).map(|r| r.kind.as_str()).unwrap_or("");
    error!(resource = %name, cause = %cause, "Node failed");
    report.record(NodeReport::failed(name.clone(), kind, cause.to_string()));
}

/// Mark every transitive dependent of a failed node `Skipped`.
fn mark_skipped(
    failed: &ResourceName,
    decl: &Declaration,
    graph: &DependencyGraph,
    done: &mut BTreeSet<ResourceName>,
    report: &mut RunReport,
) {
    for dependent in graph.transitive_dependents(failed) {
        if done.contains(&dependent) {
            continue;
        }
        let kind = decl.get(&dependent).map(|r| r.kind.as_str()).unwrap_or("");
        warn!(resource = %dependent, failed = %failed, "Skipping dependent");
        report.record(NodeReport::skipped(dependent.clone(), kind, failed));
        done.insert(dependent);
    }
}

/// Converge one resource against its provider.
async fn apply_node(
    provider: Arc<dyn Provider>,
    name: &ResourceName,
    desired: serde_json::Value,
    record: Option<ReconciliationRecord>,
    decl_hash: SpecHash,
    policy: ResolveConflicts,
    timeout: Duration,
) -> NodeOutcome {
    let Some(rec) = record else {
        return adopt_or_create(provider, name, &desired, timeout).await;
    };

    let observed = timed(timeout, name, provider.read(&rec.provider_id)).await?;
    let Some(observed) = observed else {
        // Recorded but gone at the provider. Re-create, adopting any
        // same-name resource whose create response was lost.
        return adopt_or_create(provider, name, &desired, timeout).await;
    };

    if observed.properties == desired {
        return Ok((AppliedAction::Noop, rec.provider_id, observed.outputs));
    }
    if rec.spec_hash == decl_hash && policy == ResolveConflicts::Ignore {
        // Drift, but the declaration says leave it alone.
        debug!(resource = %name, "Observed drift ignored by policy");
        return Ok((AppliedAction::Noop, rec.provider_id, observed.outputs));
    }

    let outputs = timed(timeout, name, provider.update(&rec.provider_id, &desired)).await?;
    Ok((AppliedAction::Update, rec.provider_id, outputs))
}

async fn adopt_or_create(
    provider: Arc<dyn Provider>,
    name: &ResourceName,
    desired: &serde_json::Value,
    timeout: Duration,
) -> NodeOutcome {
    if let Some(found) = timed(timeout, name, provider.lookup(name.as_str())).await? {
        info!(resource = %name, provider_id = %found.provider_id, "Adopted existing resource");
        // Adoption takes the resource under management; it does not
        // vouch for its contents. Converge it like any recorded node.
        match timed(timeout, name, provider.read(&found.provider_id)).await? {
            Some(observed) if observed.properties == *desired => {
                return Ok((AppliedAction::Adopt, found.provider_id, observed.outputs));
            }
            Some(_) => {
                let outputs =
                    timed(timeout, name, provider.update(&found.provider_id, desired)).await?;
                return Ok((AppliedAction::Adopt, found.provider_id, outputs));
            }
            // Vanished between lookup and read; fall through to create.
            None => {}
        }
    }
    let created = timed(timeout, name, provider.create(name.as_str(), desired)).await?;
    Ok((AppliedAction::Create, created.provider_id, created.outputs))
}

/// Bound one provider call by the configured timeout.
async fn timed<T, F>(limit: Duration, resource: &ResourceName, fut: F) -> Result<T, EngineError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => Err(EngineError::Provider {
            resource: resource.to_string(),
            source,
        }),
        Err(_) => Err(EngineError::Timeout {
            resource: resource.to_string(),
            seconds: limit.as_secs(),
        }),
    }
}

/// Order orphan records children-first: a record is deleted only once
/// no remaining orphan depends on it.
fn orphan_teardown_order(
    orphans: impl IntoIterator<Item = ReconciliationRecord>,
) -> Vec<ReconciliationRecord> {
    let mut remaining: BTreeMap<ResourceName, ReconciliationRecord> = orphans
        .into_iter()
        .map(|r| (r.resource.clone(), r))
        .collect();

    let mut dependents: BTreeMap<ResourceName, usize> =
        remaining.keys().map(|n| (n.clone(), 0)).collect();
    for rec in remaining.values() {
        for dep in &rec.dependencies {
            if let Some(count) = dependents.get_mut(dep) {
                *count += 1;
            }
        }
    }

    let mut order = Vec::with_capacity(remaining.len());
    let mut free: BTreeSet<ResourceName> = dependents
        .iter()
        .filter(|(_, c)| **c == 0)
        .map(|(n, _)| n.clone())
        .collect();

    while let Some(name) = free.pop_first() {
        let rec = match remaining.remove(&name) {
            Some(rec) => rec,
            None => continue,
        };
        for dep in &rec.dependencies {
            if let Some(count) = dependents.get_mut(dep) {
                *count -= 1;
                if *count == 0 {
                    free.insert(dep.clone());
                }
            }
        }
        order.push(rec);
    }

    // A cycle among stored records cannot come from a valid run, but
    // stale state must still drain: append leftovers by name.
    order.extend(remaining.into_values());
    order
}
