use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::join_all;
use image_normalizer::{normalize, probe_dimensions, thumbnail, AspectRatio, NormalizeOptions};
use rand::Rng;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::compose::PassthroughComposer;
use crate::config::OrchestratorConfig;
use crate::dispatch::{prompt_for_image, DispatchMode};
use crate::error::GenerationError;
use crate::events::*;
use crate::queue::TaskQueue;
use crate::retry::generate_with_retry;
use crate::store::ResultStore;
use crate::types::{
    timestamp, CallConfig, GenerationRequest, GenerationResult, ImageBlob, QueuedTask,
    SubmitOutcome,
};
use crate::{ImageGenerator, PromptComposer};

/// Single-flight generation service.
///
/// At most one job talks to the generator at a time. Requests submitted
/// while a job runs wait in a FIFO queue and start automatically when the
/// slot frees up. Cloning is cheap and every clone drives the same slot.
///
/// Must be used from inside a tokio runtime.
///
/// # Example
///
/// ```ignore
/// let orchestrator = Orchestrator::builder(MyGenerator::new())
///     .with_events(sink)
///     .build();
///
/// orchestrator.submit(GenerationRequest::new("a red bicycle"))?;
/// orchestrator.wait_until_idle().await;
/// ```
pub struct Orchestrator<G, C = PassthroughComposer> {
    inner: Arc<Inner<G, C>>,
}

impl<G, C> Clone for Orchestrator<G, C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct Inner<G, C> {
    generator: G,
    composer: C,
    config: OrchestratorConfig,
    events: Arc<dyn EventSink>,
    store: Option<Arc<dyn ResultStore>>,
    state: Mutex<State>,
    busy_tx: watch::Sender<bool>,
}

#[derive(Default)]
struct State {
    active: Option<ActiveJob>,
    queue: TaskQueue,
}

struct ActiveJob {
    id: String,
    cancel: CancellationToken,
}

/// What a finished job produced, in initiation order.
struct JobReport {
    results: Vec<GenerationResult>,
    error: Option<GenerationError>,
}

/// Everything needed to produce one image of a batch.
struct ImageSlot {
    index: u32,
    prompt: String,
    config: CallConfig,
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder<G, C = PassthroughComposer> {
    generator: G,
    composer: C,
    config: OrchestratorConfig,
    events: Arc<dyn EventSink>,
    store: Option<Arc<dyn ResultStore>>,
}

impl<G: ImageGenerator> Orchestrator<G> {
    /// Start building an orchestrator around `generator`.
    pub fn builder(generator: G) -> OrchestratorBuilder<G> {
        OrchestratorBuilder {
            generator,
            composer: PassthroughComposer,
            config: OrchestratorConfig::default(),
            events: Arc::new(NoopSink),
            store: None,
        }
    }

    /// An orchestrator with the passthrough composer, no events and no store.
    pub fn new(generator: G, config: OrchestratorConfig) -> Self {
        Self::builder(generator).with_config(config).build()
    }
}

impl<G: ImageGenerator, C: PromptComposer> OrchestratorBuilder<G, C> {
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Route lifecycle events to `sink`.
    pub fn with_events(mut self, sink: impl EventSink) -> Self {
        self.events = Arc::new(sink);
        self
    }

    /// Persist every result into `store`.
    pub fn with_store<S: ResultStore>(mut self, store: Arc<S>) -> Self {
        let store: Arc<dyn ResultStore> = store;
        self.store = Some(store);
        self
    }

    /// Replace the prompt composer.
    pub fn with_composer<C2: PromptComposer>(self, composer: C2) -> OrchestratorBuilder<G, C2> {
        OrchestratorBuilder {
            generator: self.generator,
            composer,
            config: self.config,
            events: self.events,
            store: self.store,
        }
    }

    pub fn build(self) -> Orchestrator<G, C> {
        let (busy_tx, _) = watch::channel(false);
        Orchestrator {
            inner: Arc::new(Inner {
                generator: self.generator,
                composer: self.composer,
                config: self.config,
                events: self.events,
                store: self.store,
                state: Mutex::new(State::default()),
                busy_tx,
            }),
        }
    }
}

impl<G: ImageGenerator, C: PromptComposer> Orchestrator<G, C> {
    /// Submit a request.
    ///
    /// Starts a job immediately when the slot is free, otherwise appends the
    /// request to the queue. A request with no prompt, reference or style
    /// image is dropped and reported as [`SubmitOutcome::Ignored`].
    pub fn submit(&self, request: GenerationRequest) -> Result<SubmitOutcome, GenerationError> {
        if request.is_empty() {
            debug!("ignoring empty generation request");
            return Ok(SubmitOutcome::Ignored);
        }
        request.validate(&self.inner.config)?;

        let mut state = self.inner.lock_state();
        if state.active.is_some() {
            let task = QueuedTask::new(request);
            let task_id = task.id.clone();
            let position = state.queue.push(task);
            info!(task_id = %task_id, position, "slot busy, request queued");
            self.inner.events.emit(OrchestratorEvent::TaskQueued(TaskQueuedEvent {
                task_id: task_id.clone(),
                position,
            }));
            return Ok(SubmitOutcome::Queued { task_id, position });
        }

        let job_id = uuid::Uuid::new_v4().to_string();
        Inner::start_locked(&self.inner, &mut state, job_id.clone(), request);
        Ok(SubmitOutcome::Started { job_id })
    }

    /// Stop everything: discard every queued task, then cancel the active
    /// job. Returns the number of queued tasks discarded.
    pub fn cancel(&self) -> usize {
        let mut state = self.inner.lock_state();
        let cleared = state.queue.clear();
        if !cleared.is_empty() {
            info!(count = cleared.len(), "queue cleared");
            self.inner
                .events
                .emit(OrchestratorEvent::QueueCleared(QueueClearedEvent {
                    task_ids: cleared.iter().map(|t| t.id.clone()).collect(),
                }));
        }
        if let Some(active) = &state.active {
            info!(job_id = %active.id, "cancelling active job");
            active.cancel.cancel();
        }
        cleared.len()
    }

    /// Remove one waiting task. Returns `false` if it is not queued.
    pub fn dequeue(&self, task_id: &str) -> bool {
        let mut state = self.inner.lock_state();
        match state.queue.remove(task_id) {
            Some(task) => {
                info!(task_id = %task.id, "task removed from queue");
                self.inner
                    .events
                    .emit(OrchestratorEvent::TaskDequeued(TaskDequeuedEvent {
                        task_id: task.id,
                    }));
                true
            }
            None => false,
        }
    }

    /// Snapshot of the waiting tasks, head first.
    pub fn queued_tasks(&self) -> Vec<QueuedTask> {
        self.inner.lock_state().queue.snapshot()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.lock_state().queue.len()
    }

    /// Id of the running job, if any.
    pub fn active_job(&self) -> Option<String> {
        self.inner.lock_state().active.as_ref().map(|a| a.id.clone())
    }

    pub fn is_busy(&self) -> bool {
        *self.inner.busy_tx.borrow()
    }

    /// Resolve once no job is running and the queue is drained.
    pub async fn wait_until_idle(&self) {
        let mut rx = self.inner.busy_tx.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = rx.wait_for(|busy| !*busy).await;
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    pub fn store(&self) -> Option<&Arc<dyn ResultStore>> {
        self.inner.store.as_ref()
    }
}

impl<G: ImageGenerator, C: PromptComposer> Inner<G, C> {
    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claim the slot for `request` and spawn its job. The caller holds the
    /// state lock, so no other job can start in between.
    fn start_locked(
        this: &Arc<Self>,
        state: &mut State,
        job_id: String,
        request: GenerationRequest,
    ) {
        let cancel = CancellationToken::new();
        state.active = Some(ActiveJob {
            id: job_id.clone(),
            cancel: cancel.clone(),
        });
        this.busy_tx.send_replace(true);

        let mode = DispatchMode::for_request(&request);
        info!(
            job_id = %job_id,
            %mode,
            num_images = request.num_images,
            "starting generation job"
        );
        this.events
            .emit(OrchestratorEvent::JobStarted(JobStartedEvent {
                job_id: job_id.clone(),
                mode,
                num_images: request.num_images,
            }));

        let inner = Arc::clone(this);
        tokio::spawn(async move {
            let worker = Arc::clone(&inner);
            let worker_job_id = job_id.clone();
            let worker_cancel = cancel.clone();
            let handle = tokio::spawn(async move {
                worker
                    .run_job(&worker_job_id, request, mode, &worker_cancel)
                    .await
            });

            let report = match handle.await {
                Ok(report) => report,
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "generation job panicked");
                    JobReport {
                        results: Vec::new(),
                        error: Some(GenerationError::Other(format!(
                            "generation job aborted: {}",
                            e
                        ))),
                    }
                }
            };
            Inner::finish(&inner, &job_id, &cancel, report);
        });
    }

    /// Report the job outcome, release the slot and start the next queued
    /// task if there is one.
    fn finish(this: &Arc<Self>, job_id: &str, cancel: &CancellationToken, report: JobReport) {
        if cancel.is_cancelled() {
            info!(
                job_id,
                completed = report.results.len(),
                "generation job cancelled"
            );
            this.events
                .emit(OrchestratorEvent::JobCancelled(JobCancelledEvent {
                    job_id: job_id.to_string(),
                    results: report.results,
                }));
        } else {
            match &report.error {
                Some(e) => warn!(
                    job_id,
                    completed = report.results.len(),
                    error = %e,
                    "generation job finished with errors"
                ),
                None => info!(
                    job_id,
                    completed = report.results.len(),
                    "generation job finished"
                ),
            }
            this.events
                .emit(OrchestratorEvent::JobFinished(JobFinishedEvent {
                    job_id: job_id.to_string(),
                    results: report.results,
                    error: report.error.map(|e| e.to_string()),
                }));
        }

        let mut state = this.lock_state();
        if state.active.as_ref().is_some_and(|a| a.id == job_id) {
            state.active = None;
        }
        match state.queue.pop_front() {
            Some(task) => {
                debug!(task_id = %task.id, "draining queue");
                Inner::start_locked(this, &mut state, task.id, task.request);
            }
            None => {
                this.busy_tx.send_replace(false);
            }
        }
    }

    async fn run_job(
        &self,
        job_id: &str,
        request: GenerationRequest,
        mode: DispatchMode,
        cancel: &CancellationToken,
    ) -> JobReport {
        let base_prompt = self.composer.compose(&request).await;
        let images = request.dispatch_images();
        let hint = aspect_hint(&request);
        let base_seed = request.seed.unwrap_or_else(random_seed);
        let negative = request.negative_prompt.trim();
        let negative = (!negative.is_empty()).then(|| negative.to_string());

        let count = request.num_images;
        let slots: Vec<ImageSlot> = (0..count)
            .map(|index| ImageSlot {
                index,
                prompt: prompt_for_image(&base_prompt, index, count),
                config: CallConfig {
                    aspect_ratio: hint,
                    seed: Some(base_seed.wrapping_add(index)),
                    model: request.model,
                    resolution: request.resolution,
                    negative_prompt: negative.clone(),
                },
            })
            .collect();

        let outcomes = match mode {
            DispatchMode::Sequential => {
                let mut outcomes = Vec::with_capacity(slots.len());
                for slot in &slots {
                    if cancel.is_cancelled() {
                        break;
                    }
                    let outcome = self
                        .produce_image(job_id, &request, slot, &images, cancel)
                        .await;
                    let failed = outcome.is_err();
                    outcomes.push(outcome);
                    if failed {
                        break;
                    }
                }
                outcomes
            }
            DispatchMode::Parallel => {
                join_all(
                    slots
                        .iter()
                        .map(|slot| self.produce_image(job_id, &request, slot, &images, cancel)),
                )
                .await
            }
        };

        let mut results = Vec::new();
        let mut error = None;
        for outcome in outcomes {
            match outcome {
                Ok(result) => results.push(result),
                Err(GenerationError::Cancelled) => {}
                Err(e) => {
                    error.get_or_insert(e);
                }
            }
        }
        JobReport { results, error }
    }

    async fn produce_image(
        &self,
        job_id: &str,
        request: &GenerationRequest,
        slot: &ImageSlot,
        images: &[ImageBlob],
        cancel: &CancellationToken,
    ) -> Result<GenerationResult, GenerationError> {
        let raw = generate_with_retry(
            &self.generator,
            &self.config.retry_policy(),
            &slot.prompt,
            images,
            &slot.config,
            cancel,
        )
        .await?;

        let target = request.aspect_ratio;
        let options = self.config.normalize.clone();
        let thumb_side = self.config.thumbnail_max_side;
        let (image, thumb) =
            tokio::task::spawn_blocking(move || post_process(&raw, target, &options, thumb_side))
                .await
                .map_err(|e| GenerationError::Other(format!("normalization task failed: {}", e)))??;

        let result = GenerationResult {
            id: uuid::Uuid::new_v4().to_string(),
            mime_type: image.mime_type.to_string(),
            width: image.width,
            height: image.height,
            image: image.bytes,
            thumbnail: thumb,
            prompt: slot.prompt.clone(),
            negative_prompt: request.negative_prompt.clone(),
            aspect_ratio: target,
            seed: slot.config.seed.unwrap_or_default(),
            model: request.model,
            resolution: request.resolution,
            created_at: timestamp(),
            favorite: false,
        };

        debug!(
            job_id,
            index = slot.index,
            width = result.width,
            height = result.height,
            "image ready"
        );
        self.events
            .emit(OrchestratorEvent::ImageCompleted(ImageCompletedEvent {
                job_id: job_id.to_string(),
                index: slot.index,
                result_id: result.id.clone(),
            }));

        if let Some(store) = &self.store {
            self.persist(store, &result).await;
        }
        Ok(result)
    }

    async fn persist(&self, store: &Arc<dyn ResultStore>, result: &GenerationResult) {
        let store = Arc::clone(store);
        let record = result.clone();
        let outcome = tokio::task::spawn_blocking(move || store.put(&record)).await;
        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(result_id = %result.id, error = %e, "failed to persist result"),
            Err(e) => warn!(result_id = %result.id, error = %e, "persist task failed"),
        }
    }
}

fn post_process(
    raw: &[u8],
    target: AspectRatio,
    options: &NormalizeOptions,
    thumb_side: u32,
) -> Result<(image_normalizer::NormalizedImage, Vec<u8>), GenerationError> {
    let image = normalize(raw, target, options)?;
    let thumb = thumbnail(&image.bytes, thumb_side)?;
    Ok((image, thumb))
}

/// The ratio hint for the remote call. `Auto` with a reference image asks
/// for the supported ratio closest to that reference.
fn aspect_hint(request: &GenerationRequest) -> AspectRatio {
    if !request.aspect_ratio.is_auto() {
        return request.aspect_ratio;
    }
    let Some(first) = request.reference_images.first() else {
        return AspectRatio::Auto;
    };
    match probe_dimensions(&first.data) {
        Ok((w, h)) => AspectRatio::closest_supported(w, h),
        Err(e) => {
            debug!(error = %e, "could not probe reference image, leaving ratio to the model");
            AspectRatio::Auto
        }
    }
}

fn random_seed() -> u32 {
    rand::rng().random_range(0..i32::MAX as u32)
}
