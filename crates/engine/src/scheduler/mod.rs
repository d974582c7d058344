// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job scheduler.
//!
//! Three schedule kinds: recurring cron expressions (with a per-job
//! overlap policy), one-shot reserved times, and queued messages that
//! fire when their target session pauses. Jobs persist in the scheduler
//! store; every fiber (timer task) is cancellable so CRUD can stop and
//! respawn it against the new definition.
//!
//! On startup, enabled queued jobs are executed immediately as fresh
//! session starts: the server just restarted, their target processes are
//! gone, so "when the session pauses" has collapsed to "now".

mod aggregate;
mod cron;

pub use aggregate::{aggregate_queued_messages, AggregatedMessage};

use crate::coordinator::Coordinator;
use crate::error::SchedulerError;
use self::cron::{next_fire, parse_cron};
use lo_adapters::AgentLauncher;
use lo_core::{
    format_iso_utc, parse_iso_utc, BusEvent, Clock, ConcurrencyPolicy, EventBus, JobId,
    JobMessage, PublicStatus, RunStatus, Schedule, SchedulerJob, SessionId, SessionProcessId,
    Subscription, SystemClock, UserInput, UserConfig,
};
use lo_storage::SchedulerStore;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Fields accepted when creating a job.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobDraft {
    pub name: String,
    pub schedule: Schedule,
    pub message: JobMessage,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

/// Partial update for an existing job.
#[derive(Debug, Clone, Default, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    pub name: Option<String>,
    pub schedule: Option<Schedule>,
    pub message: Option<JobMessage>,
    pub enabled: Option<bool>,
}

struct SchedulerInner<L: AgentLauncher, C: Clock> {
    store: SchedulerStore,
    coordinator: Coordinator<L>,
    bus: EventBus,
    clock: C,
    user_config: UserConfig,
    fibers: Mutex<HashMap<JobId, CancellationToken>>,
    in_flight: Mutex<HashSet<JobId>>,
    subscription: Mutex<Option<Subscription>>,
}

/// Owner of persisted jobs and their in-flight timers.
pub struct Scheduler<L: AgentLauncher, C: Clock = SystemClock> {
    inner: Arc<SchedulerInner<L, C>>,
}

impl<L: AgentLauncher, C: Clock> Clone for Scheduler<L, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L: AgentLauncher, C: Clock> Scheduler<L, C> {
    pub fn new(
        store: SchedulerStore,
        coordinator: Coordinator<L>,
        bus: EventBus,
        user_config: UserConfig,
        clock: C,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                store,
                coordinator,
                bus,
                clock,
                user_config,
                fibers: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashSet::new()),
                subscription: Mutex::new(None),
            }),
        }
    }

    /// Load persisted jobs, fire collapsed queued jobs, arm timers, and
    /// watch for session pauses.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let jobs = self.inner.store.load()?;
        for job in &jobs {
            if !job.enabled {
                continue;
            }
            if job.is_queued() {
                let scheduler = self.clone();
                let job = job.clone();
                tokio::spawn(async move { scheduler.run_startup_queued(job).await });
            } else {
                self.spawn_fiber(job.clone());
            }
        }

        let weak = Arc::downgrade(&self.inner);
        let subscription = self.inner.bus.subscribe(move |event| {
            let BusEvent::SessionProcessChanged { changed, processes } = event else {
                return;
            };
            if changed.status != PublicStatus::Paused {
                return;
            }
            // A completion event echoes the last public projection; only a
            // process still present in the snapshot has really paused.
            if !processes.iter().any(|p| p.id == changed.id) {
                return;
            }
            let Some(session_id) = changed.session_id.clone() else {
                return;
            };
            let Some(inner) = weak.upgrade() else { return };
            let scheduler = Scheduler { inner };
            let process_id = changed.id.clone();
            tokio::spawn(async move {
                scheduler.fire_queued_for(session_id, process_id).await;
            });
        });
        *self.inner.subscription.lock() = Some(subscription);
        Ok(())
    }

    /// Cancel all fibers and stop watching. Idempotent.
    pub fn shutdown(&self) {
        for (_, cancel) in self.inner.fibers.lock().drain() {
            cancel.cancel();
        }
        self.inner.subscription.lock().take();
    }

    pub fn list_jobs(&self) -> Result<Vec<SchedulerJob>, SchedulerError> {
        Ok(self.inner.store.load()?)
    }

    pub fn add_job(&self, draft: JobDraft) -> Result<SchedulerJob, SchedulerError> {
        self.validate_schedule(&draft.schedule)?;
        let job = SchedulerJob {
            id: JobId::new(uuid::Uuid::new_v4().to_string()),
            name: draft.name,
            schedule: draft.schedule,
            message: draft.message,
            enabled: draft.enabled,
            created_at: format_iso_utc(self.inner.clock.epoch_ms()),
            last_run_at: None,
            last_run_status: None,
        };
        let stored = job.clone();
        self.inner.store.update(move |jobs| {
            jobs.push(stored);
            true
        })?;
        if job.enabled {
            self.spawn_fiber(job.clone());
        }
        self.emit_jobs_changed(None);
        Ok(job)
    }

    pub fn update_job(&self, id: &JobId, update: JobUpdate) -> Result<SchedulerJob, SchedulerError> {
        if let Some(schedule) = &update.schedule {
            self.validate_schedule(schedule)?;
        }
        let mut updated: Option<SchedulerJob> = None;
        {
            let updated = &mut updated;
            self.inner.store.update(move |jobs| {
                let Some(job) = jobs.iter_mut().find(|j| &j.id == id) else {
                    return false;
                };
                if let Some(name) = update.name {
                    job.name = name;
                }
                if let Some(schedule) = update.schedule {
                    job.schedule = schedule;
                }
                if let Some(message) = update.message {
                    job.message = message;
                }
                if let Some(enabled) = update.enabled {
                    job.enabled = enabled;
                }
                *updated = Some(job.clone());
                true
            })?;
        }
        let job = updated.ok_or_else(|| SchedulerError::JobNotFound(id.clone()))?;

        self.stop_fiber(id);
        if job.enabled {
            self.spawn_fiber(job.clone());
        }
        self.emit_jobs_changed(None);
        Ok(job)
    }

    pub fn delete_job(&self, id: &JobId) -> Result<(), SchedulerError> {
        let mut removed = false;
        {
            let removed = &mut removed;
            self.inner.store.update(move |jobs| {
                let before = jobs.len();
                jobs.retain(|j| &j.id != id);
                *removed = jobs.len() != before;
                *removed
            })?;
        }
        if !removed {
            return Err(SchedulerError::JobNotFound(id.clone()));
        }
        self.stop_fiber(id);
        self.emit_jobs_changed(Some(id.clone()));
        Ok(())
    }

    fn validate_schedule(&self, schedule: &Schedule) -> Result<(), SchedulerError> {
        match schedule {
            Schedule::Cron { expr, .. } => parse_cron(expr).map(|_| ()),
            Schedule::Reserved { at_iso } => parse_iso_utc(at_iso)
                .map(|_| ())
                .ok_or_else(|| SchedulerError::InvalidReservedTime(at_iso.clone())),
            Schedule::Queued { .. } => Ok(()),
        }
    }

    fn stop_fiber(&self, id: &JobId) {
        if let Some(cancel) = self.inner.fibers.lock().remove(id) {
            cancel.cancel();
        }
    }

    fn emit_jobs_changed(&self, deleted_job_id: Option<JobId>) {
        self.inner
            .bus
            .emit(&BusEvent::SchedulerJobsChanged { deleted_job_id });
    }

    fn spawn_fiber(&self, job: SchedulerJob) {
        // Reserved jobs that already ran never run again.
        if matches!(job.schedule, Schedule::Reserved { .. }) && job.last_run_status.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        self.inner.fibers.lock().insert(job.id.clone(), cancel.clone());
        let scheduler = self.clone();
        tokio::spawn(async move {
            match job.schedule.clone() {
                Schedule::Cron {
                    expr,
                    concurrency_policy,
                } => scheduler.cron_loop(job, expr, concurrency_policy, cancel).await,
                Schedule::Reserved { at_iso } => {
                    scheduler.reserved_run(job, at_iso, cancel).await
                }
                // Queued jobs have no timer; they fire on session pause.
                Schedule::Queued { .. } => {}
            }
        });
    }

    /// Fixed cron loop: sleep to the next occurrence, fire, repeat.
    /// Never fires at arm time — only at the next natural boundary.
    async fn cron_loop(
        self,
        job: SchedulerJob,
        expr: String,
        policy: ConcurrencyPolicy,
        cancel: CancellationToken,
    ) {
        let schedule = match parse_cron(&expr) {
            Ok(schedule) => schedule,
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "cron job skipped");
                return;
            }
        };
        loop {
            let now = self.inner.clock.now_utc();
            let Some(next) = next_fire(&schedule, now) else {
                tracing::warn!(job_id = %job.id, "cron schedule has no future occurrence");
                return;
            };
            let delay = (next - now).to_std().unwrap_or_default();
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            self.fire_cron(&job, policy);
        }
    }

    /// One cron boundary: apply the overlap policy and spawn the run.
    /// Returns whether a run was started.
    pub(crate) fn fire_cron(&self, job: &SchedulerJob, policy: ConcurrencyPolicy) -> bool {
        if policy == ConcurrencyPolicy::Skip {
            let mut in_flight = self.inner.in_flight.lock();
            if in_flight.contains(&job.id) {
                tracing::info!(job_id = %job.id, name = %job.name, "cron fire skipped: previous run still executing");
                return false;
            }
            in_flight.insert(job.id.clone());
        }
        let scheduler = self.clone();
        let job = job.clone();
        tokio::spawn(async move {
            let success = scheduler.execute_job_message(&job).await;
            scheduler.record_cron_run(&job.id, success);
            if policy == ConcurrencyPolicy::Skip {
                scheduler.inner.in_flight.lock().remove(&job.id);
            }
        });
        true
    }

    fn record_cron_run(&self, id: &JobId, success: bool) {
        let now = format_iso_utc(self.inner.clock.epoch_ms());
        let result = self.inner.store.update(move |jobs| {
            let Some(job) = jobs.iter_mut().find(|j| &j.id == id) else {
                return false;
            };
            job.last_run_at = Some(now);
            job.last_run_status = Some(if success {
                RunStatus::Success
            } else {
                RunStatus::Failed
            });
            true
        });
        if let Err(e) = result {
            tracing::error!(job_id = %id, error = %e, "failed to record cron run");
        }
        self.emit_jobs_changed(None);
    }

    /// One-shot reserved job: run at its time, then remove it from the
    /// config whether it succeeded or failed.
    async fn reserved_run(self, job: SchedulerJob, at_iso: String, cancel: CancellationToken) {
        let Some(at) = parse_iso_utc(&at_iso) else {
            tracing::warn!(job_id = %job.id, at_iso, "reserved job has unparseable time, skipped");
            return;
        };
        let now = self.inner.clock.now_utc();
        let delay = (at - now).to_std().unwrap_or_default();
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(delay) => {}
        }
        let success = self.execute_job_message(&job).await;
        if !success {
            tracing::warn!(job_id = %job.id, name = %job.name, "reserved job failed");
        }
        self.remove_and_announce(&job.id);
    }

    /// Queued job found at startup: its target session is no longer
    /// running, so it executes immediately as a fresh session start.
    async fn run_startup_queued(&self, job: SchedulerJob) {
        let success = self.execute_job_message(&job).await;
        if success {
            self.remove_and_announce(&job.id);
        } else {
            tracing::warn!(job_id = %job.id, name = %job.name, "startup queued job failed, kept in config");
        }
    }

    /// A session paused: deliver every enabled queued job targeting it as
    /// one aggregated continuation, then delete them.
    pub(crate) async fn fire_queued_for(
        &self,
        session_id: SessionId,
        process_id: SessionProcessId,
    ) {
        let jobs = match self.inner.store.load() {
            Ok(jobs) => jobs,
            Err(e) => {
                tracing::error!(error = %e, "failed to load jobs for queued delivery");
                return;
            }
        };
        let mut queued: Vec<SchedulerJob> = jobs
            .into_iter()
            .filter(|j| j.enabled && j.targets_session(&session_id))
            .collect();
        if queued.is_empty() {
            return;
        }
        queued.sort_by(|a, b| a.created_at.cmp(&b.created_at));

        let aggregated = aggregate_queued_messages(&queued);
        let input = UserInput {
            text: aggregated.text,
            images: aggregated.images,
            documents: aggregated.documents,
        };
        if let Err(e) = self
            .inner
            .coordinator
            .continue_task(&process_id, session_id.clone(), input)
        {
            tracing::error!(
                %session_id,
                %process_id,
                error = %e,
                "queued delivery failed to continue session"
            );
        }
        for job in &queued {
            self.remove_and_announce(&job.id);
        }
    }

    fn remove_and_announce(&self, id: &JobId) {
        if let Err(e) = self.inner.store.remove(id) {
            tracing::error!(job_id = %id, error = %e, "failed to delete fired job");
        }
        self.emit_jobs_changed(Some(id.clone()));
    }

    /// Run a job's message as a fresh session start and wait for the
    /// turn to finish. Errors are logged, never propagated.
    async fn execute_job_message(&self, job: &SchedulerJob) -> bool {
        let project_id = job.message.project_id.clone();
        let cwd = match project_id.decode() {
            Ok(cwd) => cwd,
            Err(e) => {
                tracing::error!(job_id = %job.id, error = %e, "job project id does not decode");
                return false;
            }
        };
        let input = UserInput {
            text: job.message.content.clone(),
            images: job.message.images.clone(),
            documents: job.message.documents.clone(),
        };
        let started = match self
            .inner
            .coordinator
            .start_task(
                cwd,
                project_id,
                job.message.base_session_id.clone(),
                self.inner.user_config.permission_mode,
                input,
            )
            .await
        {
            Ok(started) => started,
            Err(e) => {
                tracing::error!(job_id = %job.id, name = %job.name, error = %e, "job execution failed to start");
                return false;
            }
        };
        match started.turn_done.await {
            Ok(Ok(())) => true,
            Ok(Err(reason)) => {
                tracing::warn!(job_id = %job.id, name = %job.name, reason, "job turn failed");
                false
            }
            Err(_) => false,
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
