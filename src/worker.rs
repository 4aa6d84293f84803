//! Background generation worker
//!
//! Moves a [`Pipeline`] onto its own thread so a front end never blocks on
//! model loading or completion. Jobs are queued on a channel and run strictly
//! one after another; results come back on a second channel.

use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info};

use crate::pipeline::{GenerationRequest, GenerationResult, Pipeline};
use crate::LorewrightError;

/// Outcome of one submitted job
#[derive(Debug)]
pub enum WorkerEvent {
    Finished { id: u64, result: GenerationResult },
    Failed { id: u64, error: LorewrightError },
}

impl WorkerEvent {
    pub fn id(&self) -> u64 {
        match self {
            Self::Finished { id, .. } | Self::Failed { id, .. } => *id,
        }
    }
}

enum Job {
    Generate { id: u64, request: GenerationRequest },
    Release,
    Shutdown,
}

pub struct GenerationWorker {
    jobs: Sender<Job>,
    events: Receiver<WorkerEvent>,
    handle: Option<JoinHandle<()>>,
    next_id: u64,
}

impl GenerationWorker {
    /// Start the worker thread, taking ownership of `pipeline`
    pub fn spawn(pipeline: Pipeline) -> Result<Self, LorewrightError> {
        let (jobs, job_rx) = mpsc::channel();
        let (event_tx, events) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("lorewright-worker".to_string())
            .spawn(move || run(pipeline, job_rx, event_tx))?;

        Ok(Self {
            jobs,
            events,
            handle: Some(handle),
            next_id: 1,
        })
    }

    /// Queue a generation; the returned id tags its event
    pub fn submit(&mut self, request: GenerationRequest) -> Result<u64, LorewrightError> {
        let id = self.next_id;
        self.jobs
            .send(Job::Generate { id, request })
            .map_err(|_| disconnected())?;
        self.next_id += 1;
        debug!(id, "Queued generation");
        Ok(id)
    }

    /// Queue a VRAM release after the jobs already submitted
    pub fn release(&self) -> Result<(), LorewrightError> {
        self.jobs.send(Job::Release).map_err(|_| disconnected())
    }

    pub fn try_recv(&self) -> Option<WorkerEvent> {
        match self.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Block until the next event; `None` once the worker has stopped
    pub fn recv(&self) -> Option<WorkerEvent> {
        self.events.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<WorkerEvent> {
        match self.events.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => None,
        }
    }

    /// Finish queued jobs, stop the server and join the thread
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.jobs.send(Job::Shutdown);
        if handle.join().is_err() {
            tracing::error!("Generation worker panicked");
        }
    }
}

impl Drop for GenerationWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(mut pipeline: Pipeline, jobs: Receiver<Job>, events: Sender<WorkerEvent>) {
    info!("Generation worker started");
    for job in jobs {
        match job {
            Job::Generate { id, request } => {
                let event = match pipeline.generate(&request) {
                    Ok(result) => WorkerEvent::Finished { id, result },
                    Err(error) => WorkerEvent::Failed { id, error },
                };
                if events.send(event).is_err() {
                    break;
                }
            }
            Job::Release => pipeline.release(),
            Job::Shutdown => break,
        }
    }
    pipeline.shutdown();
    info!("Generation worker stopped");
}

fn disconnected() -> LorewrightError {
    LorewrightError::IoError(io::Error::new(
        io::ErrorKind::BrokenPipe,
        "generation worker has stopped",
    ))
}
