use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::StreamExt;
use jobstream_core::{
    update, Effect, FrameDecoder, JobId, JobState, JobView, Manifest, Msg, SmootherSettings,
};
use jobstream_logging::{job_debug, job_info, job_warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::backend::{ByteStream, JobBackend};
use crate::ApiError;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Pause before opening the stream so the backend can register the job.
    pub connect_delay: Duration,
    /// One rendering frame.
    pub animation_interval: Duration,
    pub smoother: SmootherSettings,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            connect_delay: Duration::from_millis(500),
            animation_interval: Duration::from_millis(16),
            smoother: SmootherSettings::default(),
        }
    }
}

/// Handle to the task that owns one job.
///
/// Dropping the handle tears the job down: the task stops reading, runs no
/// further updates, and never starts a manifest fetch afterwards.
pub struct JobSession {
    cancel: CancellationToken,
    views: watch::Receiver<JobView>,
    task: Option<JoinHandle<JobView>>,
}

impl JobSession {
    /// Spawns the job task on the current tokio runtime.
    pub fn spawn(
        backend: Arc<dyn JobBackend>,
        job_id: impl Into<JobId>,
        settings: SessionSettings,
    ) -> Self {
        Self::spawn_with_token(backend, job_id, settings, CancellationToken::new())
    }

    /// Like [`JobSession::spawn`], tied to a caller-owned cancellation token.
    pub fn spawn_with_token(
        backend: Arc<dyn JobBackend>,
        job_id: impl Into<JobId>,
        settings: SessionSettings,
        cancel: CancellationToken,
    ) -> Self {
        let state = JobState::with_smoother(job_id, settings.smoother.clone());
        let (view_tx, views) = watch::channel(state.view());
        let driver = JobDriver::new(backend, state, settings, cancel.clone(), view_tx);
        let task = tokio::spawn(driver.run());
        Self {
            cancel,
            views,
            task: Some(task),
        }
    }

    /// A receiver that observes every published view.
    pub fn views(&self) -> watch::Receiver<JobView> {
        self.views.clone()
    }

    pub fn latest(&self) -> JobView {
        self.views.borrow().clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Tears the job down, as when the owning view unmounts.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Waits for the task to finish and returns its final view.
    pub async fn wait(mut self) -> JobView {
        match self.task.take() {
            Some(task) => match task.await {
                Ok(view) => view,
                Err(err) => {
                    job_warn!("job task ended abnormally: {}", err);
                    self.latest()
                }
            },
            None => self.latest(),
        }
    }
}

impl Drop for JobSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

enum Wake {
    Cancelled,
    Connected(Result<ByteStream, ApiError>),
    Chunk(Option<Result<Bytes, ApiError>>),
    ManifestFetched(Result<Manifest, ApiError>),
    SimulationTick,
    AnimationTick,
}

/// Single task driving one job. All state mutation happens here, between
/// suspension points, so frames are never processed concurrently.
struct JobDriver {
    backend: Arc<dyn JobBackend>,
    state: JobState,
    cancel: CancellationToken,
    views: watch::Sender<JobView>,
    decoder: FrameDecoder,
    connecting: Option<BoxFuture<'static, Result<ByteStream, ApiError>>>,
    stream: Option<ByteStream>,
    manifest: Option<BoxFuture<'static, Result<Manifest, ApiError>>>,
    simulation: Option<Interval>,
    animation: Interval,
}

impl JobDriver {
    fn new(
        backend: Arc<dyn JobBackend>,
        state: JobState,
        settings: SessionSettings,
        cancel: CancellationToken,
        views: watch::Sender<JobView>,
    ) -> Self {
        let connecting = Some(connect(
            backend.clone(),
            state.job_id().to_string(),
            settings.connect_delay,
        ));
        Self {
            backend,
            state,
            cancel,
            views,
            decoder: FrameDecoder::new(),
            connecting,
            stream: None,
            manifest: None,
            simulation: Some(ticker(settings.smoother.simulation_interval)),
            animation: ticker(settings.animation_interval),
        }
    }

    async fn run(mut self) -> JobView {
        loop {
            self.publish();
            if self.state.is_terminal() && self.manifest.is_none() {
                break;
            }

            let animating = !self.state.is_terminal() && !self.state.smoother().is_settled();
            let wake = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => Wake::Cancelled,
                result = settle(&mut self.connecting) => Wake::Connected(result),
                chunk = next_chunk(&mut self.stream) => Wake::Chunk(chunk),
                result = settle(&mut self.manifest) => Wake::ManifestFetched(result),
                _ = tick(&mut self.simulation) => Wake::SimulationTick,
                _ = self.animation.tick(), if animating => Wake::AnimationTick,
            };

            match wake {
                Wake::Cancelled => {
                    job_debug!("job {} torn down", self.state.job_id());
                    break;
                }
                Wake::Connected(result) => {
                    self.connecting = None;
                    match result {
                        Ok(stream) => {
                            self.stream = Some(stream);
                            self.apply(Msg::Connected);
                        }
                        Err(err) => self.apply(Msg::ConnectFailed {
                            reason: err.to_string(),
                        }),
                    }
                }
                Wake::Chunk(Some(Ok(bytes))) => {
                    for frame in self.decoder.push(&bytes) {
                        if self.cancel.is_cancelled() || self.stream.is_none() {
                            break;
                        }
                        self.apply(Msg::FrameReceived(frame));
                    }
                }
                Wake::Chunk(Some(Err(err))) => {
                    self.stream = None;
                    self.apply(Msg::TransportFailed {
                        reason: err.to_string(),
                    });
                }
                Wake::Chunk(None) => {
                    self.stream = None;
                    if self.decoder.finish() {
                        job_debug!(
                            "job {} stream closed with an unterminated frame",
                            self.state.job_id()
                        );
                    }
                    self.apply(Msg::StreamEnded);
                }
                Wake::ManifestFetched(result) => {
                    self.manifest = None;
                    self.apply(Msg::ManifestFetched(result.map_err(|err| err.to_string())));
                }
                Wake::SimulationTick => self.apply(Msg::SimulationTick),
                Wake::AnimationTick => self.apply(Msg::AnimationTick),
            }
        }

        self.state.view()
    }

    fn apply(&mut self, msg: Msg) {
        if self.cancel.is_cancelled() {
            return;
        }
        let state = std::mem::take(&mut self.state);
        let (state, effects) = update(state, msg);
        self.state = state;
        self.run_effects(effects);
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::CloseStream => {
                    self.stream = None;
                    self.connecting = None;
                    self.simulation = None;
                }
                Effect::StopSimulation => {
                    self.simulation = None;
                }
                Effect::FetchManifest { job_id } => {
                    if self.cancel.is_cancelled() {
                        job_debug!("job {} torn down before manifest fetch", job_id);
                        continue;
                    }
                    if self.manifest.is_some() {
                        continue;
                    }
                    job_info!("fetching manifest for job {}", job_id);
                    let backend = self.backend.clone();
                    self.manifest =
                        Some(Box::pin(async move { backend.fetch_manifest(&job_id).await }));
                }
            }
        }
    }

    fn publish(&mut self) {
        if self.state.consume_dirty() {
            self.views.send_replace(self.state.view());
        }
    }
}

fn connect(
    backend: Arc<dyn JobBackend>,
    job_id: JobId,
    delay: Duration,
) -> BoxFuture<'static, Result<ByteStream, ApiError>> {
    Box::pin(async move {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        backend.open_stream(&job_id).await
    })
}

fn ticker(period: Duration) -> Interval {
    let period = period.max(Duration::from_millis(1));
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn settle<T>(slot: &mut Option<BoxFuture<'static, T>>) -> T {
    match slot.as_mut() {
        Some(fut) => fut.await,
        None => std::future::pending().await,
    }
}

async fn next_chunk(stream: &mut Option<ByteStream>) -> Option<Result<Bytes, ApiError>> {
    match stream.as_mut() {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}

async fn tick(interval: &mut Option<Interval>) {
    match interval.as_mut() {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
