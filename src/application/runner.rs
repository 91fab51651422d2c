use crate::application::events::EventHub;
use crate::application::pipeline::PipelineService;
use crate::domain::job::{Job, JobEvent, JobStatus};
use crate::ports::encoder::Encoder;
use crate::ports::memory::MemoryProbe;
use crate::ports::store::AssetStore;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Default number of pipeline workers.
pub const WORKERS_COUNT: usize = 4;

/// Submissions waiting for a worker. A full queue pushes back on `submit`
/// instead of spawning unbounded work.
const QUEUE_DEPTH: usize = 64;

struct QueuedJob {
    id: String,
    images: Vec<String>,
}

/// Outcome of a result lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultLookup {
    Ready(String),
    NotReady,
    Failed(String),
    NotFound,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("job runner is shut down")]
    Shutdown,
}

type SharedJobs = Arc<RwLock<HashMap<String, Job>>>;

/// Accepts submissions, runs them on a bounded worker pool and tracks every
/// job's state. Submission never waits for pipeline completion; each job
/// reaches exactly one terminal state, observable via `status`/`result` and
/// published once on the event hub.
pub struct JobRunner {
    jobs: SharedJobs,
    hub: Arc<EventHub>,
    queue: mpsc::Sender<QueuedJob>,
    workers: Vec<JoinHandle<()>>,
}

impl JobRunner {
    pub fn start<S, E, M>(pipeline: PipelineService<S, E, M>, workers: usize) -> Self
    where
        S: AssetStore + 'static,
        E: Encoder + 'static,
        M: MemoryProbe + 'static,
    {
        let jobs: SharedJobs = Arc::default();
        let hub = Arc::new(EventHub::new());
        let (queue, rx) = mpsc::channel::<QueuedJob>(QUEUE_DEPTH);
        let rx = Arc::new(Mutex::new(rx));
        let pipeline = Arc::new(pipeline);

        let workers = (0..workers.max(1))
            .map(|worker_id| {
                let rx = rx.clone();
                let pipeline = pipeline.clone();
                let jobs = jobs.clone();
                let hub = hub.clone();
                tokio::spawn(async move {
                    worker_loop(worker_id, rx, pipeline, jobs, hub).await;
                })
            })
            .collect();

        Self {
            jobs,
            hub,
            queue,
            workers,
        }
    }

    /// Accept a submission. Returns as soon as the job is registered and
    /// queued, however large the input list is.
    pub async fn submit(&self, images: Vec<String>) -> Result<String, SubmitError> {
        let job = Job::new(images.clone());
        let id = job.id.clone();
        self.jobs
            .write()
            .expect("job registry poisoned")
            .insert(id.clone(), job);

        let queued = QueuedJob {
            id: id.clone(),
            images,
        };
        if self.queue.send(queued).await.is_err() {
            // Workers are gone; surface that instead of stranding a
            // forever-Pending job.
            self.jobs
                .write()
                .expect("job registry poisoned")
                .remove(&id);
            return Err(SubmitError::Shutdown);
        }
        Ok(id)
    }

    pub fn status(&self, id: &str) -> Option<Job> {
        self.jobs
            .read()
            .expect("job registry poisoned")
            .get(id)
            .cloned()
    }

    pub fn result(&self, id: &str) -> ResultLookup {
        match self.jobs.read().expect("job registry poisoned").get(id) {
            None => ResultLookup::NotFound,
            Some(job) => match &job.status {
                JobStatus::Completed { result } => ResultLookup::Ready(result.clone()),
                JobStatus::Failed { error } => ResultLookup::Failed(error.clone()),
                JobStatus::Pending | JobStatus::Running => ResultLookup::NotReady,
            },
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.hub.subscribe()
    }
}

impl Drop for JobRunner {
    fn drop(&mut self) {
        for worker in &self.workers {
            worker.abort();
        }
    }
}

async fn worker_loop<S, E, M>(
    worker_id: usize,
    rx: Arc<Mutex<mpsc::Receiver<QueuedJob>>>,
    pipeline: Arc<PipelineService<S, E, M>>,
    jobs: SharedJobs,
    hub: Arc<EventHub>,
) where
    S: AssetStore,
    E: Encoder,
    M: MemoryProbe,
{
    info!(worker_id, "pipeline worker started");

    loop {
        let queued = { rx.lock().await.recv().await };
        let Some(queued) = queued else {
            // Runner dropped; no more submissions can arrive.
            break;
        };

        if let Some(job) = jobs
            .write()
            .expect("job registry poisoned")
            .get_mut(&queued.id)
        {
            job.start();
        }
        hub.publish(JobEvent::Progress {
            job_id: queued.id.clone(),
            percent: 0,
        });

        let progress = {
            let jobs = jobs.clone();
            let hub = hub.clone();
            let id = queued.id.clone();
            move |percent: u8| publish_progress(&jobs, &hub, &id, percent)
        };

        match pipeline.run(&queued.id, &queued.images, &progress).await {
            Ok(locator) => {
                let transitioned = jobs
                    .write()
                    .expect("job registry poisoned")
                    .get_mut(&queued.id)
                    .map(|job| job.complete(&locator))
                    .unwrap_or(false);
                if transitioned {
                    hub.publish(JobEvent::Completed {
                        job_id: queued.id.clone(),
                        result: locator,
                    });
                }
                info!(worker_id, job_id = %queued.id, "job completed");
            }
            Err(e) => {
                error!(worker_id, job_id = %queued.id, error = %e, "job failed");
                let detail = e.to_string();
                let transitioned = jobs
                    .write()
                    .expect("job registry poisoned")
                    .get_mut(&queued.id)
                    .map(|job| job.fail(&detail))
                    .unwrap_or(false);
                if transitioned {
                    hub.publish(JobEvent::Failed {
                        job_id: queued.id.clone(),
                        error: detail,
                    });
                }
            }
        }
    }
}

fn publish_progress(jobs: &SharedJobs, hub: &EventHub, id: &str, percent: u8) {
    let current = {
        let mut jobs = jobs.write().expect("job registry poisoned");
        match jobs.get_mut(id) {
            Some(job) => {
                job.advance_progress(percent);
                Some(job.progress)
            }
            None => None,
        }
    };
    if let Some(percent) = current {
        hub.publish(JobEvent::Progress {
            job_id: id.to_string(),
            percent,
        });
    }
}
