//! Background DSP jobs
//!
//! At most one job per track may be in flight. A job is stamped with the
//! track's buffer version when it starts; if the buffer has changed by the
//! time the result arrives (an undo, another edit, a load) the result is
//! discarded instead of committed.

use std::any::Any;
use std::collections::HashMap;
use std::thread::JoinHandle;

use log::{error, info, warn};

use super::history::ActionType;
use super::store::TrackStore;
use super::track::TrackId;
use crate::dsp::EffectSpec;
use crate::engine::{SampleBuffer, SampleRange};
use crate::error::{CadenzaError, Result};

/// Permission to edit one track in the background
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobTicket {
    pub id: u64,
    pub track_id: TrackId,
    /// Buffer version the job started from
    pub buffer_version: u64,
}

/// What happened to a finished job's result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// The result replaced the track's buffer
    Committed,
    /// The track changed underneath the job; the result was dropped
    Discarded,
}

/// A job running on a worker thread
#[derive(Debug)]
pub struct PendingJob {
    ticket: JobTicket,
    effect: EffectSpec,
    handle: JoinHandle<Result<SampleBuffer>>,
}

impl PendingJob {
    pub fn ticket(&self) -> JobTicket {
        self.ticket
    }

    /// True once the worker has produced its result
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

/// In-flight bookkeeping, one slot per track
#[derive(Debug, Default)]
pub(crate) struct JobRegistry {
    next_id: u64,
    in_flight: HashMap<TrackId, u64>,
}

impl JobRegistry {
    pub(crate) fn is_busy(&self, track_id: TrackId) -> bool {
        self.in_flight.contains_key(&track_id)
    }

    fn acquire(&mut self, track_id: TrackId) -> Result<u64> {
        if self.is_busy(track_id) {
            return Err(CadenzaError::TrackBusy {
                track_id: track_id.to_string(),
            });
        }
        let id = self.next_id;
        self.next_id += 1;
        self.in_flight.insert(track_id, id);
        Ok(id)
    }

    /// Free the slot if it still belongs to `ticket`; false if it was already released
    fn release(&mut self, ticket: &JobTicket) -> bool {
        if self.in_flight.get(&ticket.track_id) == Some(&ticket.id) {
            self.in_flight.remove(&ticket.track_id);
            true
        } else {
            false
        }
    }

    pub(crate) fn clear(&mut self) {
        self.in_flight.clear();
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Wait for a worker, turning a panic into an error
fn join_worker(
    handle: JoinHandle<Result<SampleBuffer>>,
    job_id: u64,
    effect: &str,
) -> Result<SampleBuffer> {
    handle.join().unwrap_or_else(|payload| {
        let message = panic_message(payload.as_ref());
        error!("Worker for job {} ({}) panicked: {}", job_id, effect, message);
        Err(CadenzaError::JobPanicked {
            job_id,
            effect: effect.to_string(),
            message,
        })
    })
}

impl TrackStore {
    /// Reserve `track_id` for a background edit
    ///
    /// # Errors
    /// * `TrackNotFound` - no such track
    /// * `TrackBusy` - another job on the same track has not finished
    pub fn begin_job(&mut self, track_id: TrackId) -> Result<JobTicket> {
        self.require_track(track_id)?;
        let id = self.jobs.acquire(track_id)?;
        Ok(JobTicket {
            id,
            track_id,
            buffer_version: self.buffer_version(track_id).unwrap_or(0),
        })
    }

    /// Give up on a job; its result will be discarded if it ever arrives
    pub fn cancel_job(&mut self, ticket: &JobTicket) {
        if self.jobs.release(ticket) {
            info!("Cancelled job {} on track {}", ticket.id, ticket.track_id);
        }
    }

    /// Hand a result computed elsewhere back to the store
    ///
    /// Commits `result` as the track's new buffer unless the job was cancelled
    /// or the track changed since the ticket was issued.
    pub fn complete_job(
        &mut self,
        ticket: &JobTicket,
        result: SampleBuffer,
        description: impl Into<String>,
    ) -> Result<JobOutcome> {
        if !self.jobs.release(ticket) {
            warn!("Discarding result of cancelled job {}", ticket.id);
            return Ok(JobOutcome::Discarded);
        }
        if self.buffer_version(ticket.track_id) != Some(ticket.buffer_version) {
            warn!(
                "Discarding stale result for track {} (job {})",
                ticket.track_id, ticket.id
            );
            return Ok(JobOutcome::Discarded);
        }

        let mut next = self.state.clone();
        if let Some(track) = next.tracks.iter_mut().find(|t| t.id == ticket.track_id) {
            track.buffer = Some(std::sync::Arc::new(result));
        }
        self.commit(ActionType::ApplyEffect, description, next);
        Ok(JobOutcome::Committed)
    }

    /// Run `effect` over `range` of a track on a worker thread
    ///
    /// Parameters and range are checked up front so invalid requests fail
    /// without occupying the track.
    pub fn spawn_effect(
        &mut self,
        track_id: TrackId,
        effect: EffectSpec,
        range: SampleRange,
    ) -> Result<PendingJob> {
        effect.as_effect().validate()?;
        let buffer = self
            .require_track(track_id)?
            .shared_buffer()
            .ok_or_else(|| CadenzaError::EmptyOperation {
                operation: format!("{} on an empty track", effect),
            })?;
        range.check(buffer.len())?;

        let ticket = self.begin_job(track_id)?;
        let worker_effect = effect.clone();
        let handle = std::thread::spawn(move || worker_effect.apply(&buffer, range));
        info!("Started {} on track {} (job {})", effect, track_id, ticket.id);

        Ok(PendingJob {
            ticket,
            effect,
            handle,
        })
    }

    /// Wait for a job and commit or discard its result
    ///
    /// A failed job releases the track and reports its error; nothing is
    /// committed.
    pub fn finish_job(&mut self, job: PendingJob) -> Result<JobOutcome> {
        let PendingJob {
            ticket,
            effect,
            handle,
        } = job;

        let result = join_worker(handle, ticket.id, effect.as_effect().effect_type());

        match result {
            Ok(buffer) => self.complete_job(&ticket, buffer, effect.to_string()),
            Err(e) => {
                self.jobs.release(&ticket);
                warn!("Job {} failed: {}", ticket.id, e);
                Err(e)
            }
        }
    }
}
