use serde::Serialize;
use uuid::Uuid;

/// Lifecycle of one submission. A job reaches exactly one of the two
/// terminal states.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed { result: String },
    Failed { error: String },
}

/// Snapshot of one end-to-end pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: String,
    pub images: Vec<String>,
    pub status: JobStatus,
    /// 0-100, never regresses.
    pub progress: u8,
}

impl Job {
    pub fn new(images: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            images,
            status: JobStatus::Pending,
            progress: 0,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            JobStatus::Completed { .. } | JobStatus::Failed { .. }
        )
    }

    pub fn start(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Running;
        }
    }

    /// Clamped and monotone; a stale update can never move the bar
    /// backwards.
    pub fn advance_progress(&mut self, percent: u8) {
        self.progress = self.progress.max(percent.min(100));
    }

    /// First terminal transition wins. Returns whether this call made it.
    pub fn complete(&mut self, result: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Completed {
            result: result.into(),
        };
        self.progress = 100;
        true
    }

    /// First terminal transition wins. Returns whether this call made it.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.is_terminal() {
            return false;
        }
        self.status = JobStatus::Failed {
            error: error.into(),
        };
        true
    }
}

/// Progress and terminal notifications published to observers. Delivery is
/// best effort; the job registry stays authoritative.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum JobEvent {
    Progress { job_id: String, percent: u8 },
    Completed { job_id: String, result: String },
    Failed { job_id: String, error: String },
}

impl JobEvent {
    pub fn job_id(&self) -> &str {
        match self {
            JobEvent::Progress { job_id, .. }
            | JobEvent::Completed { job_id, .. }
            | JobEvent::Failed { job_id, .. } => job_id,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Progress { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_jobs_are_pending_at_zero() {
        let job = Job::new(vec!["vi-image/a.png".into()]);
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.progress, 0);
        assert!(!job.is_terminal());
    }

    #[test]
    fn progress_is_monotone_and_clamped() {
        let mut job = Job::new(Vec::new());
        job.advance_progress(40);
        job.advance_progress(25);
        assert_eq!(job.progress, 40);
        job.advance_progress(250);
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn only_the_first_terminal_transition_lands() {
        let mut job = Job::new(Vec::new());
        job.start();
        assert!(job.complete("vi-video/out.mp4"));
        assert!(!job.fail("too late"));
        assert_eq!(
            job.status,
            JobStatus::Completed {
                result: "vi-video/out.mp4".into()
            }
        );
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn failing_first_blocks_completion() {
        let mut job = Job::new(Vec::new());
        job.start();
        assert!(job.fail("base video 404"));
        assert!(!job.complete("vi-video/out.mp4"));
        assert!(matches!(job.status, JobStatus::Failed { .. }));
    }

    #[test]
    fn start_only_promotes_pending_jobs() {
        let mut job = Job::new(Vec::new());
        job.fail("boom");
        job.start();
        assert!(matches!(job.status, JobStatus::Failed { .. }));
    }

    #[test]
    fn events_carry_their_job_id() {
        let event = JobEvent::Progress {
            job_id: "abc".into(),
            percent: 10,
        };
        assert_eq!(event.job_id(), "abc");
        assert!(!event.is_terminal());
        assert!(JobEvent::Failed {
            job_id: "abc".into(),
            error: "x".into()
        }
        .is_terminal());
    }
}
