use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::dispatch::DispatchMode;
use crate::types::GenerationResult;

/// Emitted when a job takes the generation slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStartedEvent {
    pub job_id: String,
    pub mode: DispatchMode,
    pub num_images: u32,
}

/// Emitted when a request is deferred behind the running job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQueuedEvent {
    pub task_id: String,
    pub position: usize,
}

/// Emitted when a waiting task is removed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDequeuedEvent {
    pub task_id: String,
}

/// Emitted when a cancellation discards the waiting tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueClearedEvent {
    pub task_ids: Vec<String>,
}

/// Emitted as each image of a batch is ready.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageCompletedEvent {
    pub job_id: String,
    pub index: u32,
    pub result_id: String,
}

/// Emitted when a job ends without being cancelled.
///
/// `results` holds every image that succeeded; `error` carries the first
/// failure's message when at least one image failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobFinishedEvent {
    pub job_id: String,
    pub results: Vec<GenerationResult>,
    pub error: Option<String>,
}

/// Emitted when a job is cancelled. Images finished before the
/// cancellation are still reported.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCancelledEvent {
    pub job_id: String,
    pub results: Vec<GenerationResult>,
}

/// Every lifecycle notification the orchestrator produces.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum OrchestratorEvent {
    JobStarted(JobStartedEvent),
    TaskQueued(TaskQueuedEvent),
    TaskDequeued(TaskDequeuedEvent),
    QueueCleared(QueueClearedEvent),
    ImageCompleted(ImageCompletedEvent),
    JobFinished(JobFinishedEvent),
    JobCancelled(JobCancelledEvent),
}

impl OrchestratorEvent {
    /// Event channel name used by UI transports.
    pub fn name(&self) -> &'static str {
        match self {
            OrchestratorEvent::JobStarted(_) => "generation:job_started",
            OrchestratorEvent::TaskQueued(_) => "generation:task_queued",
            OrchestratorEvent::TaskDequeued(_) => "generation:task_dequeued",
            OrchestratorEvent::QueueCleared(_) => "generation:queue_cleared",
            OrchestratorEvent::ImageCompleted(_) => "generation:image_completed",
            OrchestratorEvent::JobFinished(_) => "generation:job_finished",
            OrchestratorEvent::JobCancelled(_) => "generation:job_cancelled",
        }
    }
}

/// Destination for orchestrator events.
pub trait EventSink: Send + Sync + 'static {
    fn emit(&self, event: OrchestratorEvent);
}

/// Discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: OrchestratorEvent) {}
}

/// Forwards events into an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<OrchestratorEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<OrchestratorEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: OrchestratorEvent) {
        // Receiver dropped: nobody is listening any more.
        let _ = self.tx.send(event);
    }
}

#[cfg(feature = "tauri")]
impl EventSink for tauri::AppHandle {
    fn emit(&self, event: OrchestratorEvent) {
        if let Err(e) = tauri::Emitter::emit(self, event.name(), &event) {
            tracing::warn!(event = event.name(), error = %e, "failed to emit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serializes_with_type_tag() {
        let event = OrchestratorEvent::TaskQueued(TaskQueuedEvent {
            task_id: "t1".into(),
            position: 2,
        });
        assert_eq!(event.name(), "generation:task_queued");
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "taskQueued");
        assert_eq!(json["taskId"], "t1");
        assert_eq!(json["position"], 2);
    }

    #[test]
    fn test_channel_sink_forwards() {
        let (sink, mut rx) = ChannelSink::new();
        sink.emit(OrchestratorEvent::TaskDequeued(TaskDequeuedEvent {
            task_id: "t".into(),
        }));
        assert!(matches!(
            rx.try_recv(),
            Ok(OrchestratorEvent::TaskDequeued(_))
        ));
    }
}
