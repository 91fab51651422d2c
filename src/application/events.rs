use crate::domain::job::JobEvent;
use tokio::sync::broadcast;

/// Fan-out channel for job progress. Best effort: slow or absent observers
/// never block the pipeline, and the job registry stays the source of
/// truth for anything they miss.
#[derive(Debug)]
pub struct EventHub {
    sender: broadcast::Sender<JobEvent>,
}

impl EventHub {
    pub fn new() -> Self {
        // Room for a burst of per-item progress updates
        let (sender, _) = broadcast::channel(256);
        Self { sender }
    }

    pub fn publish(&self, event: JobEvent) {
        // Send only errors when nobody is subscribed, which is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<JobEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let hub = EventHub::new();
        let mut rx = hub.subscribe();

        hub.publish(JobEvent::Progress {
            job_id: "j1".into(),
            percent: 40,
        });

        match rx.recv().await.unwrap() {
            JobEvent::Progress { job_id, percent } => {
                assert_eq!(job_id, "j1");
                assert_eq!(percent, 40);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn publishing_without_subscribers_is_harmless() {
        let hub = EventHub::new();
        hub.publish(JobEvent::Completed {
            job_id: "j1".into(),
            result: "vi-video/out.mp4".into(),
        });
    }
}
