//! Render orchestrator: owns the accumulation buffer, the walker pool and the
//! render thread, and publishes scene snapshots to it.

use crate::animation::Animations;
use crate::camera::YawPitchCamera;
use crate::engine::{DispatchStats, Engine, EngineSettings, FrameImage, Histogram, SceneSnapshot, ToneMapper};
use crate::ifs::Ifs;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Stopped,
    Rendering,
    Faulted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// The display surface went away; the render loop stopped.
    SurfaceLost(String),
    /// A previous surface loss has not been cleared by `reinitialize`.
    Faulted,
    ThreadPool(String),
    Spawn(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SurfaceLost(msg) => write!(f, "display surface lost: {msg}"),
            Self::Faulted => write!(f, "renderer is faulted; reinitialize before starting"),
            Self::ThreadPool(msg) => write!(f, "failed to build worker pool: {msg}"),
            Self::Spawn(msg) => write!(f, "failed to spawn render thread: {msg}"),
        }
    }
}

impl std::error::Error for RenderError {}

/// Display surface fed by the render thread. Returning an error faults the
/// renderer.
pub trait FrameSink: Send {
    fn present(&mut self, frame: &FrameImage) -> Result<(), RenderError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RendererOptions {
    pub engine: EngineSettings,
    pub present_fps: u32,
    pub display_updates: bool,
    /// Worker threads for dispatch; 0 lets rayon decide.
    pub threads: usize,
    /// Stack size for the render thread; `None` keeps the platform default.
    pub render_stack_size: Option<usize>,
    pub tone: ToneMapper,
}

impl Default for RendererOptions {
    fn default() -> Self {
        Self {
            engine: EngineSettings::default(),
            present_fps: 30,
            display_updates: true,
            threads: 0,
            render_stack_size: None,
            tone: ToneMapper::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub dispatches: u64,
    pub resets: u64,
    pub presented: u64,
    pub totals: DispatchStats,
    pub last: DispatchStats,
}

struct Shared {
    ifs: Mutex<Ifs>,
    snapshot: RwLock<Arc<SceneSnapshot>>,
    generation: AtomicU64,
    histogram: RwLock<Arc<Histogram>>,
    animations: Mutex<Animations>,
    last_tick: Mutex<Option<f32>>,
    pending_reset: AtomicBool,
    stop: AtomicBool,
    faulted: AtomicBool,
    display_updates: AtomicBool,
    fault: Mutex<Option<RenderError>>,
    frame: Mutex<Arc<FrameImage>>,
    stats: Mutex<RenderStats>,
    tone: Mutex<ToneMapper>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Shared {
    fn snapshot(&self) -> Arc<SceneSnapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn histogram(&self) -> Arc<Histogram> {
        self.histogram
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn publish(&self, ifs: &Ifs) {
        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let snap = Arc::new(SceneSnapshot::new(ifs, generation));
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = snap;
    }

    fn tone_map(&self, hist: &Histogram, scene: &SceneSnapshot) -> Arc<FrameImage> {
        let tone = *lock(&self.tone);
        let frame = Arc::new(tone.map(hist, scene.view()));
        *lock(&self.frame) = frame.clone();
        frame
    }
}

type Handoff = (Engine, Option<Box<dyn FrameSink>>);
type Worker = JoinHandle<Handoff>;

pub struct Renderer {
    shared: Arc<Shared>,
    options: RendererOptions,
    pool: Arc<rayon::ThreadPool>,
    engine: Option<Engine>,
    sink: Option<Box<dyn FrameSink>>,
    worker: Option<Worker>,
}

impl Renderer {
    pub fn new(mut ifs: Ifs, options: RendererOptions) -> Result<Self, RenderError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(options.threads)
            .thread_name(|i| format!("flame-walker-{i}"))
            .build()
            .map_err(|e| RenderError::ThreadPool(e.to_string()))?;

        let width = ifs.camera.width.max(1);
        let height = ifs.camera.height.max(1);
        ifs.camera.width = width;
        ifs.camera.height = height;

        let snapshot = Arc::new(SceneSnapshot::new(&ifs, 0));
        let histogram = Arc::new(Histogram::new(width as usize, height as usize));
        let frame = Arc::new(FrameImage::blank(width as usize, height as usize));

        let shared = Arc::new(Shared {
            ifs: Mutex::new(ifs),
            snapshot: RwLock::new(snapshot),
            generation: AtomicU64::new(0),
            histogram: RwLock::new(histogram),
            animations: Mutex::new(Animations::new()),
            last_tick: Mutex::new(None),
            pending_reset: AtomicBool::new(false),
            stop: AtomicBool::new(false),
            faulted: AtomicBool::new(false),
            display_updates: AtomicBool::new(options.display_updates),
            fault: Mutex::new(None),
            frame: Mutex::new(frame),
            stats: Mutex::new(RenderStats::default()),
            tone: Mutex::new(options.tone),
        });

        Ok(Self {
            shared,
            options,
            pool: Arc::new(pool),
            engine: Some(Engine::new(options.engine)),
            sink: None,
            worker: None,
        })
    }

    pub fn state(&self) -> RenderState {
        if self.shared.faulted.load(Ordering::Acquire) {
            RenderState::Faulted
        } else if self.worker.is_some() {
            RenderState::Rendering
        } else {
            RenderState::Stopped
        }
    }

    pub fn options(&self) -> &RendererOptions {
        &self.options
    }

    /// Replaces the display surface. Takes effect on the next `start`.
    pub fn set_frame_sink(&mut self, sink: Option<Box<dyn FrameSink>>) {
        self.sink = sink;
    }

    pub fn start(&mut self) -> Result<(), RenderError> {
        match self.state() {
            RenderState::Faulted => return Err(RenderError::Faulted),
            RenderState::Rendering => return Ok(()),
            RenderState::Stopped => {}
        }
        let Some(engine) = self.engine.take() else {
            return Err(RenderError::Faulted);
        };
        self.shared.stop.store(false, Ordering::Release);

        // The thread takes the engine out of the slot, so a failed spawn
        // leaves it here to be put back.
        let slot: Arc<Mutex<Option<Handoff>>> =
            Arc::new(Mutex::new(Some((engine, self.sink.take()))));
        let shared = self.shared.clone();
        let pool = self.pool.clone();
        let present_every = Duration::from_secs_f64(1.0 / self.options.present_fps.max(1) as f64);
        let fallback = self.options.engine;

        let mut builder = thread::Builder::new().name("flame-render".to_string());
        if let Some(size) = self.options.render_stack_size {
            builder = builder.stack_size(size);
        }
        let handoff = slot.clone();
        let spawned = builder.spawn(move || {
            let (engine, sink) = lock(&handoff)
                .take()
                .unwrap_or_else(|| (Engine::new(fallback), None));
            render_loop(shared, pool, engine, sink, present_every)
        });
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                log::info!("renderer started");
                Ok(())
            }
            Err(err) => {
                if let Some((engine, sink)) = lock(&slot).take() {
                    self.engine = Some(engine);
                    self.sink = sink;
                }
                log::error!("render thread did not start: {err}");
                Err(RenderError::Spawn(err.to_string()))
            }
        }
    }

    /// Signals the render thread and waits for the in-flight dispatch to
    /// finish. Reports a surface loss that ended the loop.
    pub fn stop(&mut self) -> Result<(), RenderError> {
        self.join_worker();
        match lock(&self.shared.fault).clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn join_worker(&mut self) {
        let Some(handle) = self.worker.take() else {
            return;
        };
        self.shared.stop.store(true, Ordering::Release);
        match handle.join() {
            Ok((engine, sink)) => {
                self.engine = Some(engine);
                self.sink = sink;
            }
            Err(_) => {
                log::error!("render thread panicked; rebuilding walker pool");
                self.engine = Some(Engine::new(self.options.engine));
                self.shared.faulted.store(true, Ordering::Release);
                *lock(&self.shared.fault) =
                    Some(RenderError::SurfaceLost("render thread panicked".to_string()));
            }
        }
        log::info!("renderer stopped");
    }

    /// Takes the recorded fault, if any. The renderer stays faulted until
    /// `reinitialize`.
    pub fn take_fault(&self) -> Option<RenderError> {
        lock(&self.shared.fault).take()
    }

    /// Clears a fault and reallocates the buffer at `width`×`height`. Leaves
    /// the renderer stopped.
    pub fn reinitialize(&mut self, width: u32, height: u32) {
        self.join_worker();
        *lock(&self.shared.fault) = None;
        self.shared.faulted.store(false, Ordering::Release);
        self.set_display_resolution(width, height);
        log::info!("renderer reinitialized at {width}x{height}");
    }

    /// Requests an accumulation reset. While rendering it is applied at the
    /// top of the next pass, so bursts collapse into one reset.
    pub fn invalidate_accumulation(&mut self) {
        if self.worker.is_some() {
            self.shared.pending_reset.store(true, Ordering::Release);
            log::debug!("accumulation invalidated");
        } else {
            self.reset_now();
        }
    }

    fn reset_now(&mut self) {
        self.shared.pending_reset.store(false, Ordering::Release);
        self.shared.histogram().clear();
        if let Some(engine) = self.engine.as_mut() {
            engine.reset();
        }
        lock(&self.shared.stats).resets += 1;
    }

    pub fn set_display_resolution(&mut self, width: u32, height: u32) {
        let width = width.max(1);
        let height = height.max(1);
        {
            let mut ifs = lock(&self.shared.ifs);
            ifs.camera.width = width;
            ifs.camera.height = height;
            self.shared.publish(&ifs);
        }
        *self
            .shared
            .histogram
            .write()
            .unwrap_or_else(PoisonError::into_inner) =
            Arc::new(Histogram::new(width as usize, height as usize));
        *lock(&self.shared.frame) = Arc::new(FrameImage::blank(width as usize, height as usize));
        log::info!("display resolution {width}x{height}");
        self.invalidate_accumulation();
    }

    pub fn resolution(&self) -> (usize, usize) {
        let hist = self.shared.histogram();
        (hist.width(), hist.height())
    }

    pub fn set_display_updates(&self, enabled: bool) {
        self.shared.display_updates.store(enabled, Ordering::Release);
    }

    pub fn display_updates(&self) -> bool {
        self.shared.display_updates.load(Ordering::Acquire)
    }

    pub fn set_tone_mapper(&self, tone: ToneMapper) {
        *lock(&self.shared.tone) = tone;
    }

    /// Copy of the editable scene.
    pub fn scene(&self) -> Ifs {
        lock(&self.shared.ifs).clone()
    }

    pub fn snapshot(&self) -> Arc<SceneSnapshot> {
        self.shared.snapshot()
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Ordering::Acquire)
    }

    /// Mutates the scene, publishes a new snapshot and invalidates.
    pub fn update_scene<R>(&mut self, f: impl FnOnce(&mut Ifs) -> R) -> R {
        let out = {
            let mut ifs = lock(&self.shared.ifs);
            let out = f(&mut ifs);
            self.shared.publish(&ifs);
            out
        };
        self.invalidate_accumulation();
        out
    }

    pub fn update_camera<R>(&mut self, f: impl FnOnce(&mut YawPitchCamera) -> R) -> R {
        self.update_scene(|ifs| f(&mut ifs.camera))
    }

    /// Replaces the scene. The camera keeps the current display resolution.
    pub fn set_scene(&mut self, mut ifs: Ifs) {
        let (w, h) = self.resolution();
        ifs.camera.width = w as u32;
        ifs.camera.height = h as u32;
        self.update_scene(move |current| *current = ifs);
    }

    pub fn update_animations<R>(&self, f: impl FnOnce(&mut Animations) -> R) -> R {
        f(&mut lock(&self.shared.animations))
    }

    /// Treats the current scene as the animation's state at `t`, so the next
    /// tick at the same time leaves it alone.
    pub fn mark_animation_applied(&self, t: f32) {
        *lock(&self.shared.last_tick) = Some(t);
    }

    /// Applies every animation channel at `t`; invalidates when a rendered
    /// value changed. Repeating the previous `t` is a no-op, so edits made
    /// while playback is paused are not overwritten.
    pub fn tick_animation(&mut self, t: f32) -> bool {
        if lock(&self.shared.last_tick).replace(t) == Some(t) {
            return false;
        }
        let changed = {
            let anims = lock(&self.shared.animations);
            if anims.is_empty() {
                return false;
            }
            let mut ifs = lock(&self.shared.ifs);
            let changed = anims.apply(t, &mut ifs);
            if changed {
                self.shared.publish(&ifs);
            }
            changed
        };
        if changed {
            self.invalidate_accumulation();
        }
        changed
    }

    /// Runs one dispatch on the calling thread. Only valid while stopped;
    /// returns `None` otherwise.
    pub fn dispatch_now(&mut self) -> Option<DispatchStats> {
        if self.worker.is_some() {
            return None;
        }
        if self.shared.pending_reset.load(Ordering::Acquire) {
            self.reset_now();
        }
        let engine = self.engine.as_mut()?;
        let scene = self.shared.snapshot();
        let hist = self.shared.histogram();
        let stats = self.pool.install(|| engine.dispatch(&scene, &hist));
        record_dispatch(&self.shared, stats);
        Some(stats)
    }

    pub fn current_frame(&self) -> Arc<FrameImage> {
        lock(&self.shared.frame).clone()
    }

    /// Tone maps the buffer now on the calling thread.
    pub fn render_frame_now(&self) -> Arc<FrameImage> {
        let scene = self.shared.snapshot();
        let hist = self.shared.histogram();
        self.shared.tone_map(&hist, &scene)
    }

    pub fn stats(&self) -> RenderStats {
        *lock(&self.shared.stats)
    }

    pub fn total_hits(&self) -> u64 {
        self.shared.histogram().total_hits()
    }

    pub fn histogram(&self) -> Arc<Histogram> {
        self.shared.histogram()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.join_worker();
    }
}

fn record_dispatch(shared: &Shared, stats: DispatchStats) {
    let mut s = lock(&shared.stats);
    s.dispatches += 1;
    s.last = stats;
    s.totals = s.totals.merge(stats);
}

fn render_loop(
    shared: Arc<Shared>,
    pool: Arc<rayon::ThreadPool>,
    mut engine: Engine,
    mut sink: Option<Box<dyn FrameSink>>,
    present_every: Duration,
) -> (Engine, Option<Box<dyn FrameSink>>) {
    let mut last_present: Option<Instant> = None;

    while !shared.stop.load(Ordering::Acquire) {
        if shared.pending_reset.swap(false, Ordering::AcqRel) {
            shared.histogram().clear();
            engine.reset();
            lock(&shared.stats).resets += 1;
        }

        // One full dispatch per pass, whatever arrives meanwhile.
        let scene = shared.snapshot();
        let hist = shared.histogram();
        let stats = pool.install(|| engine.dispatch(&scene, &hist));
        record_dispatch(&shared, stats);
        log::trace!(
            "dispatch gen={} steps={} splats={} reseeds={}",
            scene.generation,
            stats.steps,
            stats.splats,
            stats.reseeds
        );

        if !shared.display_updates.load(Ordering::Acquire) {
            continue;
        }
        let due = last_present.is_none_or(|t| t.elapsed() >= present_every);
        if !due {
            continue;
        }
        last_present = Some(Instant::now());
        let frame = shared.tone_map(&hist, &scene);
        let Some(out) = sink.as_mut() else {
            continue;
        };
        match out.present(&frame) {
            Ok(()) => lock(&shared.stats).presented += 1,
            Err(err) => {
                log::error!("render loop stopped: {err}");
                *lock(&shared.fault) = Some(err);
                shared.faulted.store(true, Ordering::Release);
                break;
            }
        }
    }
    (engine, sink)
}
