// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

// Job coordinator
//
// Owns the single job slot. `submit` starts a completion and parks it in
// the slot; `attach` waits for a parked job, takes it and drains it through
// the segmenter and wire encoder into a bounded channel whose receiving end
// becomes the HTTP body.

use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::StreamExt;
use parking_lot::Mutex;
use tokio::sync::{mpsc, Notify};
use tokio_stream::wrappers::ReceiverStream;
use uuid::Uuid;

use crate::completion::{CompletionError, CompletionSource, FragmentStream};
use crate::config::Config;
use crate::prompt::Prompt;
use crate::segment::{Markers, MarkerSegmenter, OutputEvent};
use crate::wire;

pub type JobId = Uuid;

/// Rendered events buffered between the drain task and the HTTP body.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Observable state of the coordinator slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// No job; `submit` is accepted.
    Idle,
    /// `submit` is waiting for the completion endpoint to respond.
    Starting,
    /// A started job is waiting for `attach`.
    Ready,
    /// A job is being streamed to a consumer.
    Draining,
}

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("a job is already running")]
    AlreadyRunning,

    #[error("failed to start completion: {0}")]
    Start(#[from] CompletionError),
}

#[derive(Debug, Clone)]
pub struct CoordinatorOptions {
    pub markers: Markers,
    /// Longest silence between fragments before the job is finished early.
    pub fragment_timeout: Option<Duration>,
    /// How long a started job waits for `attach` before it is discarded.
    pub attach_timeout: Option<Duration>,
    pub channel_capacity: usize,
}

impl Default for CoordinatorOptions {
    fn default() -> Self {
        Self {
            markers: Markers::default(),
            fragment_timeout: None,
            attach_timeout: None,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl CoordinatorOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            markers: config.markers.clone(),
            fragment_timeout: config
                .completion
                .fragment_timeout_secs
                .map(Duration::from_secs),
            attach_timeout: config
                .completion
                .attach_timeout_secs
                .map(Duration::from_secs),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Slot
// ---------------------------------------------------------------------------

struct PendingJob {
    id: JobId,
    fragments: FragmentStream,
    started_at: Instant,
}

enum Slot {
    Idle,
    Starting(JobId),
    Ready(PendingJob),
    Draining(JobId),
}

impl Slot {
    fn state(&self) -> JobState {
        match self {
            Slot::Idle => JobState::Idle,
            Slot::Starting(_) => JobState::Starting,
            Slot::Ready(_) => JobState::Ready,
            Slot::Draining(_) => JobState::Draining,
        }
    }

    fn owner(&self) -> Option<JobId> {
        match self {
            Slot::Idle => None,
            Slot::Starting(id) | Slot::Draining(id) => Some(*id),
            Slot::Ready(job) => Some(job.id),
        }
    }
}

struct Inner {
    slot: Mutex<Slot>,
    published: Notify,
    source: Arc<dyn CompletionSource>,
    options: CoordinatorOptions,
}

impl Inner {
    /// Reset the slot to idle if `id` still owns it.
    fn release(&self, id: JobId) {
        let mut slot = self.slot.lock();
        if slot.owner() != Some(id) {
            return;
        }
        let previous = std::mem::replace(&mut *slot, Slot::Idle);
        drop(slot);
        tracing::debug!(job_id = %id, state = ?previous.state(), "slot released");
    }
}

// ---------------------------------------------------------------------------
// Coordinator
// ---------------------------------------------------------------------------

/// Single-slot job coordinator. Cheap to clone; clones share the slot.
#[derive(Clone)]
pub struct Coordinator {
    inner: Arc<Inner>,
}

impl Coordinator {
    pub fn new(source: Arc<dyn CompletionSource>, options: CoordinatorOptions) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot::Idle),
                published: Notify::new(),
                source,
                options,
            }),
        }
    }

    pub fn state(&self) -> JobState {
        self.inner.slot.lock().state()
    }

    /// Start a completion for `prompt` and park it until a consumer attaches.
    ///
    /// Fails with [`JobError::AlreadyRunning`] unless the slot is idle. The
    /// slot is released again if starting fails or this future is dropped
    /// before the completion endpoint answers.
    pub async fn submit(&self, prompt: &Prompt) -> Result<JobId, JobError> {
        let reservation = self.reserve()?;
        let id = reservation.id;
        tracing::info!(job_id = %id, "job starting");

        let started_at = Instant::now();
        let fragments = match self.inner.source.start(prompt).await {
            Ok(f) => f,
            Err(e) => {
                tracing::warn!(job_id = %id, error = %e, "completion failed to start");
                return Err(e.into());
            }
        };

        reservation.publish(PendingJob {
            id,
            fragments,
            started_at,
        });
        tracing::info!(
            job_id = %id,
            latency_ms = started_at.elapsed().as_millis() as u64,
            "job ready"
        );
        Ok(id)
    }

    /// Wait for a ready job, take it and stream its rendered events.
    ///
    /// Concurrent callers never share a job: each published job is taken by
    /// exactly one of them and the others keep waiting.
    pub async fn attach(&self) -> ReceiverStream<Bytes> {
        let job = loop {
            let notified = self.inner.published.notified();
            tokio::pin!(notified);
            // Register before checking so a publish in between is not missed.
            notified.as_mut().enable();

            if let Some(job) = self.take_ready() {
                break job;
            }
            notified.await;
        };

        let (tx, rx) = mpsc::channel(self.inner.options.channel_capacity);
        tokio::spawn(drain(self.inner.clone(), job, tx));
        ReceiverStream::new(rx)
    }

    fn reserve(&self) -> Result<Reservation, JobError> {
        let mut slot = self.inner.slot.lock();
        if !matches!(*slot, Slot::Idle) {
            return Err(JobError::AlreadyRunning);
        }
        let id = Uuid::new_v4();
        *slot = Slot::Starting(id);
        Ok(Reservation {
            inner: self.inner.clone(),
            id,
            armed: true,
        })
    }

    fn take_ready(&self) -> Option<PendingJob> {
        let mut slot = self.inner.slot.lock();
        let Slot::Ready(job) = &*slot else {
            return None;
        };
        let id = job.id;
        match std::mem::replace(&mut *slot, Slot::Draining(id)) {
            Slot::Ready(job) => Some(job),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Guards
// ---------------------------------------------------------------------------

/// Holds the slot in `Starting` until the job is published. Dropping an
/// unpublished reservation frees the slot.
struct Reservation {
    inner: Arc<Inner>,
    id: JobId,
    armed: bool,
}

impl Reservation {
    fn publish(mut self, job: PendingJob) {
        let id = job.id;
        {
            let mut slot = self.inner.slot.lock();
            *slot = Slot::Ready(job);
        }
        self.armed = false;
        self.inner.published.notify_waiters();

        if let Some(ttl) = self.inner.options.attach_timeout {
            let inner = self.inner.clone();
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                let mut slot = inner.slot.lock();
                if matches!(&*slot, Slot::Ready(job) if job.id == id) {
                    *slot = Slot::Idle;
                    drop(slot);
                    tracing::warn!(job_id = %id, "no consumer attached in time; discarding job");
                }
            });
        }
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.armed {
            self.inner.release(self.id);
        }
    }
}

/// Frees the slot when the drain task ends, however it ends.
struct DrainGuard {
    inner: Arc<Inner>,
    id: JobId,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        self.inner.release(self.id);
    }
}

// ---------------------------------------------------------------------------
// Drain task
// ---------------------------------------------------------------------------

async fn drain(inner: Arc<Inner>, job: PendingJob, tx: mpsc::Sender<Bytes>) {
    let id = job.id;
    let _guard = DrainGuard {
        inner: inner.clone(),
        id,
    };
    tracing::info!(job_id = %id, "consumer attached");

    let mut segmenter =
        MarkerSegmenter::new(inner.options.markers.clone(), inner.source.footer_label());
    let mut fragments = job.fragments;
    let mut fragment_count = 0usize;

    loop {
        // The consumer may leave while the upstream is silent.
        let next = tokio::select! {
            _ = tx.closed() => {
                tracing::info!(job_id = %id, "consumer disconnected while waiting for completion");
                return;
            }
            next = next_fragment(&mut fragments, inner.options.fragment_timeout) => next,
        };
        let next = match next {
            Ok(next) => next,
            Err(limit) => {
                tracing::warn!(job_id = %id, ?limit, "completion stalled; finishing job");
                break;
            }
        };

        match next {
            Some(Ok(fragment)) => {
                fragment_count += 1;
                if send_all(&tx, segmenter.advance(&fragment)).await.is_err() {
                    tracing::info!(job_id = %id, "consumer disconnected");
                    return;
                }
            }
            Some(Err(e)) => {
                tracing::warn!(job_id = %id, error = %e, "completion stream failed; finishing job");
                break;
            }
            None => break,
        }
    }

    // Stop the upstream before the footer goes out.
    drop(fragments);

    if send_all(&tx, segmenter.finalize()).await.is_err() {
        tracing::info!(job_id = %id, "consumer disconnected before footer");
        return;
    }

    tracing::info!(
        job_id = %id,
        fragments = fragment_count,
        latency_ms = job.started_at.elapsed().as_millis() as u64,
        "job finished"
    );
}

/// Next fragment, or `Err(limit)` if the stream stayed silent for `limit`.
async fn next_fragment(
    fragments: &mut FragmentStream,
    limit: Option<Duration>,
) -> Result<Option<Result<String, CompletionError>>, Duration> {
    match limit {
        Some(limit) => tokio::time::timeout(limit, fragments.next())
            .await
            .map_err(|_| limit),
        None => Ok(fragments.next().await),
    }
}

/// Sends fail as soon as the receiver is gone, even while waiting for capacity.
async fn send_all(
    tx: &mpsc::Sender<Bytes>,
    events: Vec<OutputEvent>,
) -> Result<(), mpsc::error::SendError<Bytes>> {
    for event in &events {
        tx.send(wire::render(event)).await?;
    }
    Ok(())
}
