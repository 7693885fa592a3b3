//! Deferred job dispatcher.
//!
//! Jobs sit in the store's job table until due. Each poll takes a bounded
//! batch (oldest first) and hands every job to the handler subscribed to its
//! topic. Delivery is at-least-once: a job is deleted only after its handler
//! committed, or after it failed in a way a retry cannot fix.
//!
//! | Handler result        | Job                                     |
//! |-----------------------|-----------------------------------------|
//! | `Ok`                  | deleted                                 |
//! | non-retryable `Err`   | logged, deleted                         |
//! | `StorageFault`        | rescheduled with backoff, attempts + 1  |
//! | fault, out of retries | dead-lettered: logged at error, deleted |
//! | no subscriber         | logged, left in place                   |
//!
//! [`Dispatcher::dispatch_due`] needs a store that rolls back one job on its
//! own. A store without savepoints (a SpacetimeDB reducer) instead claims due
//! jobs with [`Dispatcher::claim_due`], committing the attempt count and the
//! backoff up front, then runs [`Dispatcher::deliver`] for each job in a
//! transaction of its own. A faulting delivery rolls back alone, and the job
//! is dead-lettered by the first claim after `max_attempts` deliveries.

use std::collections::HashMap;

use crate::config::EngineConfig;
use crate::constants::Micros;
use crate::error::{EngineError, EngineResult};
use crate::model::DeferredJob;
use crate::store::Store;

pub type JobHandler<'a, S> = Box<dyn FnMut(&mut S, &DeferredJob, Micros) -> EngineResult<()> + 'a>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Micros,
}

impl RetryPolicy {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.job_max_attempts.max(1),
            backoff: config.retry_backoff_micros(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub completed: usize,
    pub discarded: usize,
    pub retried: usize,
    pub dead_lettered: usize,
}

impl DispatchReport {
    pub fn handled(&self) -> usize {
        self.completed + self.discarded + self.retried + self.dead_lettered
    }
}

/// Jobs claimed for delivery in separate transactions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Claim {
    /// Attempt count and due time already advanced.
    pub jobs: Vec<DeferredJob>,
    pub dead_lettered: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Completed,
    Discarded,
    /// No handler for the topic; the job was left alone.
    Unsubscribed,
}

pub struct Dispatcher<'a, S> {
    handlers: HashMap<String, JobHandler<'a, S>>,
    policy: RetryPolicy,
    batch_size: usize,
}

impl<'a, S: Store> Dispatcher<'a, S> {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            handlers: HashMap::new(),
            policy: RetryPolicy::from_config(config),
            batch_size: config.dispatch_batch_size.max(1),
        }
    }

    /// Register the handler for `topic`, replacing any previous one.
    pub fn subscribe<F>(&mut self, topic: &str, handler: F)
    where
        F: FnMut(&mut S, &DeferredJob, Micros) -> EngineResult<()> + 'a,
    {
        self.handlers.insert(topic.to_string(), Box::new(handler));
    }

    /// Deliver every job due at `now`, each inside its own unit of work.
    ///
    /// Returns `Err` when the store itself fails outside a handler, or when
    /// the store cannot roll back one job on its own.
    pub fn dispatch_due(&mut self, store: &mut S, now: Micros) -> EngineResult<DispatchReport> {
        if !store.isolated_units() {
            return Err(EngineError::precondition(
                "store cannot roll back a single job; claim and deliver jobs separately",
            ));
        }
        let mut report = DispatchReport::default();
        for job in store.due_jobs(now, self.batch_size)? {
            let Some(handler) = self.handlers.get_mut(&job.topic) else {
                log::warn!("job #{}: no subscriber for topic '{}'", job.id, job.topic);
                continue;
            };

            match store.unit_of_work(|s| handler(s, &job, now)) {
                Ok(()) => {
                    store.delete_job(job.id)?;
                    report.completed += 1;
                }
                Err(err) if err.is_retryable() => {
                    let attempts = job.attempts + 1;
                    if attempts >= self.policy.max_attempts {
                        dead_letter(store, &job, attempts, &err.to_string())?;
                        report.dead_lettered += 1;
                    } else {
                        log::warn!("job #{}: {}; retry {} scheduled", job.id, err, attempts);
                        store.reschedule_job(job.id, now + self.policy.backoff, attempts)?;
                        report.retried += 1;
                    }
                }
                Err(err) => {
                    log::info!("job #{} ({}) discarded: {}", job.id, job.topic, err);
                    store.delete_job(job.id)?;
                    report.discarded += 1;
                }
            }
        }
        if report.handled() > 0 {
            log::debug!("dispatch at {}: {:?}", now, report);
        }
        Ok(report)
    }

    /// Claim the subscribed jobs due at `now`.
    ///
    /// Every claimed job has its attempt counted and its due time moved past
    /// the backoff before any handler runs, so the claim outlives a delivery
    /// that rolls back. Jobs that used up their attempts are dead-lettered.
    pub fn claim_due(&self, store: &mut S, now: Micros) -> EngineResult<Claim> {
        let mut claim = Claim::default();
        for mut job in store.due_jobs(now, self.batch_size)? {
            if !self.handlers.contains_key(&job.topic) {
                log::warn!("job #{}: no subscriber for topic '{}'", job.id, job.topic);
                continue;
            }
            if job.attempts >= self.policy.max_attempts {
                dead_letter(store, &job, job.attempts, "every delivery failed")?;
                claim.dead_lettered += 1;
                continue;
            }
            job.attempts += 1;
            job.due_at = now + self.policy.backoff;
            store.reschedule_job(job.id, job.due_at, job.attempts)?;
            claim.jobs.push(job);
        }
        Ok(claim)
    }

    /// Run the handler for one claimed job and delete the job unless the
    /// handler faulted. A retryable error is returned; the caller's
    /// transaction rolls back and the claim brings the job back after the
    /// backoff.
    pub fn deliver(&mut self, store: &mut S, job: &DeferredJob, now: Micros) -> EngineResult<Delivery> {
        let Some(handler) = self.handlers.get_mut(&job.topic) else {
            log::warn!("job #{}: no subscriber for topic '{}'", job.id, job.topic);
            return Ok(Delivery::Unsubscribed);
        };
        match store.unit_of_work(|s| handler(s, job, now)) {
            Ok(()) => {
                store.delete_job(job.id)?;
                Ok(Delivery::Completed)
            }
            Err(err) if err.is_retryable() => {
                log::warn!("job #{}: attempt {} failed: {}", job.id, job.attempts, err);
                Err(err)
            }
            Err(err) => {
                log::info!("job #{} ({}) discarded: {}", job.id, job.topic, err);
                store.delete_job(job.id)?;
                Ok(Delivery::Discarded)
            }
        }
    }
}

fn dead_letter<S: Store>(store: &mut S, job: &DeferredJob, attempts: u32, reason: &str) -> EngineResult<()> {
    log::error!(
        "job #{} ({}) dead-lettered after {} attempts: {}; payload {}",
        job.id,
        job.topic,
        attempts,
        reason,
        job.payload
    );
    store.delete_job(job.id)
}
