use crate::animation::{Animations, PropertyPath};
use crate::audio::AudioClip;
use crate::config::Config;
use crate::engine::FrameImage;
use crate::ifs::Ifs;
use crate::present::{HalfBlockPresenter, Screen, TerminalSurface};
use crate::renderer::{RenderState, Renderer};
use crate::scene_file::{self, SceneDocument};
use crate::terminal::TerminalGuard;
use anyhow::{bail, Context};
use crossterm::event::{
    self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent,
    MouseEventKind,
};
use glam::Vec3;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

const HUD_ROWS: u16 = 2;
const UI_FPS: f32 = 60.0;
const ROTATE_STEP: f32 = 3.0;
/// Approximate pixels per terminal cell when turning drags into rotation.
const DRAG_CELL_PIXELS: f32 = 10.0;
/// Wheel units per scroll notch.
const SCROLL_NOTCH: f32 = 120.0;
const DEFAULT_SAVE_PATH: &str = "scene.json";

/// Properties keyed by the "keyframe camera" action.
const CAMERA_CHANNELS: [&str; 6] = [
    "camera.x",
    "camera.y",
    "camera.z",
    "camera.yaw",
    "camera.pitch",
    "view.focus_distance",
];

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Direction in camera space (x right, y up, z forward); scaled by twice
    /// the focus distance.
    Translate(Vec3),
    /// Yaw/pitch delta in degrees before sensitivity.
    Rotate(Vec3),
    /// Mouse-wheel units; positive pushes the focus plane away.
    Focus(f32),
    Brightness(f32),
    Gamma(f32),
    Fog(f32),
    Dof(f32),
    Randomize,
    ResetCamera,
    ToggleRendering,
    ToggleDisplayUpdates,
    ToggleAnimation,
    KeyframeCamera,
    Save,
    ToggleHelp,
    Quit,
}

pub fn action_for_key(key: KeyEvent) -> Option<Action> {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('s') => Some(Action::Save),
            KeyCode::Char('c') => Some(Action::Quit),
            _ => None,
        };
    }
    let t = |x: f32, y: f32, z: f32| Some(Action::Translate(Vec3::new(x, y, z)));
    let r = |x: f32, y: f32| Some(Action::Rotate(Vec3::new(x, y, 0.0) * ROTATE_STEP));
    match key.code {
        KeyCode::Char('w') => t(0.0, 0.0, 1.0),
        KeyCode::Char('s') => t(0.0, 0.0, -1.0),
        KeyCode::Char('d') => t(1.0, 0.0, 0.0),
        KeyCode::Char('a') => t(-1.0, 0.0, 0.0),
        KeyCode::Char('e') => t(0.0, 1.0, 0.0),
        KeyCode::Char('q') | KeyCode::Char('c') => t(0.0, -1.0, 0.0),
        KeyCode::Char('l') => r(1.0, 0.0),
        KeyCode::Char('j') => r(-1.0, 0.0),
        KeyCode::Char('k') => r(0.0, 1.0),
        KeyCode::Char('i') => r(0.0, -1.0),
        // Roll has no effect on a yaw/pitch camera but the keys stay mapped.
        KeyCode::Char('u') => Some(Action::Rotate(Vec3::Z * ROTATE_STEP)),
        KeyCode::Char('o') => Some(Action::Rotate(Vec3::NEG_Z * ROTATE_STEP)),
        KeyCode::Char('b') => Some(Action::Brightness(1.1)),
        KeyCode::Char('B') => Some(Action::Brightness(1.0 / 1.1)),
        KeyCode::Char('g') => Some(Action::Gamma(0.25)),
        KeyCode::Char('G') => Some(Action::Gamma(-0.25)),
        KeyCode::Char('f') => Some(Action::Fog(0.25)),
        KeyCode::Char('F') => Some(Action::Fog(-0.25)),
        KeyCode::Char('n') => Some(Action::Dof(1.25)),
        KeyCode::Char('N') => Some(Action::Dof(0.8)),
        KeyCode::Char('r') => Some(Action::Randomize),
        KeyCode::Char('0') => Some(Action::ResetCamera),
        KeyCode::Char(' ') => Some(Action::ToggleRendering),
        KeyCode::Char('v') => Some(Action::ToggleDisplayUpdates),
        KeyCode::Char('p') => Some(Action::ToggleAnimation),
        KeyCode::Char('x') => Some(Action::KeyframeCamera),
        KeyCode::Char('h') | KeyCode::Char('?') | KeyCode::F(1) => Some(Action::ToggleHelp),
        KeyCode::Esc => Some(Action::Quit),
        _ => None,
    }
}

/// Tracks the last drag position so drags turn into rotation deltas.
#[derive(Debug, Default)]
pub struct PointerState {
    last: Option<(u16, u16)>,
}

impl PointerState {
    pub fn action_for_mouse(&mut self, ev: MouseEvent) -> Option<Action> {
        match ev.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                self.last = Some((ev.column, ev.row));
                None
            }
            MouseEventKind::Drag(MouseButton::Left) => {
                let (lc, lr) = self.last.replace((ev.column, ev.row))?;
                let dx = (ev.column as f32 - lc as f32) * DRAG_CELL_PIXELS;
                let dy = (lr as f32 - ev.row as f32) * DRAG_CELL_PIXELS * 2.0;
                (dx != 0.0 || dy != 0.0).then_some(Action::Rotate(Vec3::new(dx, dy, 0.0)))
            }
            MouseEventKind::Up(MouseButton::Left) => {
                self.last = None;
                None
            }
            MouseEventKind::ScrollUp => Some(Action::Focus(SCROLL_NOTCH)),
            MouseEventKind::ScrollDown => Some(Action::Focus(-SCROLL_NOTCH)),
            _ => None,
        }
    }
}

/// UI-side state that is not part of the scene.
pub struct Session {
    pub save_path: PathBuf,
    pub animating: bool,
    pub show_help: bool,
    pub status: String,
    clock: Duration,
    last_tick: Instant,
}

impl Session {
    pub fn new(save_path: PathBuf) -> Self {
        Self {
            save_path,
            animating: true,
            show_help: false,
            status: String::new(),
            clock: Duration::ZERO,
            last_tick: Instant::now(),
        }
    }

    /// Animation time in seconds; only advances while playback is on.
    pub fn animation_time(&mut self) -> f32 {
        let now = Instant::now();
        if self.animating {
            self.clock += now - self.last_tick;
        }
        self.last_tick = now;
        self.clock.as_secs_f32()
    }
}

/// Applies `action`; returns false when the session should end.
pub fn apply_action(
    renderer: &mut Renderer,
    session: &mut Session,
    action: Action,
) -> anyhow::Result<bool> {
    match action {
        Action::Translate(dir) => renderer.update_scene(|ifs| {
            let scale = ifs.view.focus_distance * 2.0;
            ifs.camera.translate_with_sensitivity(dir * scale);
        }),
        Action::Rotate(delta) => renderer.update_camera(|cam| cam.rotate_with_sensitivity(delta)),
        Action::Focus(delta) => renderer.update_scene(|ifs| {
            let fd = ifs.view.focus_distance;
            ifs.view.focus_distance = (fd + delta * fd * 0.001).max(1e-3);
        }),
        Action::Brightness(f) => {
            renderer.update_scene(|ifs| ifs.view.brightness = (ifs.view.brightness * f).max(1e-3))
        }
        Action::Gamma(d) => {
            renderer.update_scene(|ifs| ifs.view.gamma = (ifs.view.gamma + d).max(0.25))
        }
        Action::Fog(d) => {
            renderer.update_scene(|ifs| ifs.view.fog_effect = (ifs.view.fog_effect + d).max(0.0))
        }
        Action::Dof(f) => renderer.update_scene(|ifs| ifs.view.dof = (ifs.view.dof * f).max(1e-4)),
        Action::Randomize => {
            renderer.update_scene(|ifs| {
                ifs.randomize_params();
            });
            session.status = format!("randomized: {} iterators", renderer.scene().iterators.len());
        }
        Action::ResetCamera => renderer.update_scene(|ifs| {
            ifs.reset_camera();
        }),
        Action::ToggleRendering => match renderer.state() {
            RenderState::Rendering => {
                renderer.stop()?;
                session.status = "paused".to_string();
            }
            RenderState::Stopped => {
                renderer.start()?;
                session.status = "rendering".to_string();
            }
            RenderState::Faulted => bail!("renderer is faulted"),
        },
        Action::ToggleDisplayUpdates => {
            let enabled = !renderer.display_updates();
            renderer.set_display_updates(enabled);
            session.status = format!("display updates {}", on_off(enabled));
        }
        Action::ToggleAnimation => {
            session.animating = !session.animating;
            session.status = format!("animation {}", on_off(session.animating));
        }
        Action::KeyframeCamera => {
            let t = session.animation_time();
            let scene = renderer.scene();
            let keyed = renderer.update_animations(|anims| {
                let mut keyed = 0;
                for name in CAMERA_CHANNELS {
                    let Ok(path) = PropertyPath::parse(name) else {
                        continue;
                    };
                    if anims.insert_keyframe_from_scene(name, path, &scene, t) {
                        keyed += 1;
                    }
                }
                keyed
            });
            renderer.mark_animation_applied(t);
            session.status = format!("keyed {keyed} channels at {t:.2}s");
        }
        Action::Save => {
            let scene = renderer.scene();
            let anims = renderer.update_animations(|a| a.clone());
            scene_file::save_file(&session.save_path, &scene, &anims)
                .with_context(|| format!("save scene to {}", session.save_path.display()))?;
            session.status = format!("saved {}", session.save_path.display());
        }
        Action::ToggleHelp => session.show_help = !session.show_help,
        Action::Quit => return Ok(false),
    }
    Ok(true)
}

fn on_off(v: bool) -> &'static str {
    if v { "on" } else { "off" }
}

pub fn run(cfg: Config) -> anyhow::Result<()> {
    let doc = load_initial_scene(&cfg)?;
    if cfg.headless {
        let path = render_headless(&cfg, doc)?;
        log::info!("wrote {}", path.display());
        return Ok(());
    }
    run_interactive(&cfg, doc)
}

/// Scene from `--scene`, or a random one (seeded by `--seed` when given),
/// with the `--audio` clip attached.
pub fn load_initial_scene(cfg: &Config) -> anyhow::Result<SceneDocument> {
    let mut doc = match &cfg.scene {
        Some(path) => scene_file::load_file(path, cfg.load_options())
            .with_context(|| format!("load scene {}", path.display()))?,
        None => {
            let mut ifs = Ifs::empty();
            match cfg.seed {
                Some(seed) => ifs.randomize_params_with(&mut fastrand::Rng::with_seed(seed)),
                None => ifs.randomize_params(),
            };
            SceneDocument {
                ifs,
                animations: Animations::new(),
            }
        }
    };
    if let Some(path) = &cfg.audio {
        let clip = AudioClip::load_wav(path)?;
        log::info!(
            "audio {}: {} ch, {} Hz, {:.1}s",
            path.display(),
            clip.channel_count(),
            clip.sample_rate(),
            clip.duration()
        );
        doc.animations.set_audio_clip(Some(Arc::new(clip)));
    }
    Ok(doc)
}

/// Accumulates for `--seconds` at `--width`×`--height` and writes a PNG.
pub fn render_headless(cfg: &Config, doc: SceneDocument) -> anyhow::Result<PathBuf> {
    let SceneDocument { mut ifs, animations } = doc;
    ifs.camera.width = cfg.width.max(1);
    ifs.camera.height = cfg.height.max(1);

    let mut options = cfg.renderer_options();
    options.display_updates = false;
    let mut renderer = Renderer::new(ifs, options).context("create renderer")?;
    renderer.update_animations(|a| *a = animations);
    renderer.tick_animation(0.0);

    renderer.start().context("start renderer")?;
    std::thread::sleep(Duration::from_secs_f32(cfg.seconds.max(0.0)));
    renderer.stop().context("stop renderer")?;
    if renderer.stats().dispatches == 0 {
        renderer.dispatch_now();
    }

    let stats = renderer.stats();
    log::info!(
        "headless: {} dispatches, {} steps, {} splats, {} reseeds",
        stats.dispatches,
        stats.totals.steps,
        stats.totals.splats,
        stats.totals.reseeds
    );
    let frame = renderer.render_frame_now();
    save_png(&frame, &cfg.output)?;
    Ok(cfg.output.clone())
}

pub fn save_png(frame: &FrameImage, path: &Path) -> anyhow::Result<()> {
    let img = image::RgbaImage::from_raw(frame.width as u32, frame.height as u32, frame.rgba.clone())
        .context("frame buffer does not match its dimensions")?;
    img.save(path)
        .with_context(|| format!("write {}", path.display()))
}

fn run_interactive(cfg: &Config, doc: SceneDocument) -> anyhow::Result<()> {
    let _term = TerminalGuard::new()?;
    let (cols, rows) = TerminalGuard::size()?;
    if rows < HUD_ROWS + 2 || cols < 4 {
        bail!("terminal too small (need at least 4x{}, got {cols}x{rows})", HUD_ROWS + 2);
    }

    let mut screen = Screen {
        cols,
        rows,
        hud_rows: HUD_ROWS,
        sync_updates: cfg.sync_updates,
    };
    let surface = TerminalSurface::new(screen, TerminalGuard::stdout());

    let SceneDocument { mut ifs, animations } = doc;
    let (pw, ph) = HalfBlockPresenter::pixel_size(&screen);
    ifs.camera.width = pw;
    ifs.camera.height = ph;

    let mut renderer = Renderer::new(ifs, cfg.renderer_options()).context("create renderer")?;
    renderer.update_animations(|a| *a = animations);
    renderer.set_frame_sink(Some(Box::new(surface.clone())));
    renderer.start().context("start renderer")?;

    let save_path = cfg
        .scene
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_SAVE_PATH));
    let mut session = Session::new(save_path);
    let mut pointer = PointerState::default();
    let mut meter = StepMeter::new();
    let frame_budget = Duration::from_secs_f32(1.0 / UI_FPS);
    let mut last_idle_draw = Instant::now();

    'outer: loop {
        let now = Instant::now();

        while event::poll(Duration::from_millis(0))? {
            let action = match event::read()? {
                Event::Key(k) if k.kind != KeyEventKind::Release => action_for_key(k),
                Event::Mouse(m) => pointer.action_for_mouse(m),
                Event::Resize(c, r) => {
                    screen.cols = c;
                    screen.rows = r.max(HUD_ROWS + 1);
                    surface.set_screen(screen);
                    let (w, h) = HalfBlockPresenter::pixel_size(&screen);
                    renderer.set_display_resolution(w, h);
                    None
                }
                _ => None,
            };
            if let Some(action) = action {
                if !apply_action(&mut renderer, &mut session, action)? {
                    break 'outer;
                }
            }
        }

        if let Some(fault) = renderer.take_fault() {
            return Err(fault).context("render loop failed");
        }

        let t = session.animation_time();
        renderer.tick_animation(t);

        let stats = renderer.stats();
        meter.update(stats.totals.steps);
        surface.set_hud(build_hud(&renderer, &session, meter.rate(), t));
        surface.set_overlay(session.show_help.then(|| help_text().to_string()));

        // The render thread only draws while it runs with display updates on.
        let idle = renderer.state() != RenderState::Rendering || !renderer.display_updates();
        if idle && last_idle_draw.elapsed() >= frame_budget * 4 {
            last_idle_draw = Instant::now();
            surface
                .draw(&renderer.current_frame())
                .context("draw to terminal")?;
        }

        let elapsed = now.elapsed();
        if elapsed < frame_budget {
            std::thread::sleep(frame_budget - elapsed);
        }
    }

    renderer.stop().context("stop renderer")?;
    Ok(())
}

fn build_hud(renderer: &Renderer, session: &Session, steps_per_sec: f64, t: f32) -> String {
    let stats = renderer.stats();
    let (w, h) = renderer.resolution();
    let scene = renderer.scene();
    let v = &scene.view;
    let state = match renderer.state() {
        RenderState::Rendering => "rendering",
        RenderState::Stopped => "stopped",
        RenderState::Faulted => "FAULTED",
    };

    let mut hud = String::new();
    let _ = write!(
        hud,
        "{state} | {w}x{h} | {} iters | gen {} | {:.1}M steps/s | splats {} | reseeds {} | resets {}",
        scene.iterators.len(),
        renderer.generation(),
        steps_per_sec / 1.0e6,
        stats.totals.splats,
        stats.totals.reseeds,
        stats.resets,
    );
    let _ = write!(
        hud,
        "\nbright {:.2} gamma {:.2} fog {:.2} dof {:.3} focus {:.2} | anim {:.1}s {} | display {} | {}",
        v.brightness,
        v.gamma,
        v.fog_effect,
        v.dof,
        v.focus_distance,
        t,
        on_off(session.animating),
        on_off(renderer.display_updates()),
        if session.status.is_empty() { "h: help" } else { session.status.as_str() },
    );
    hud
}

fn help_text() -> &'static str {
    "Flame Renderer Keys\n\
w/s  forward/back   a/d  left/right   e, q/c  up/down\n\
i/k  pitch   j/l  yaw   mouse drag  look around\n\
scroll  move focus plane\n\
b/B  brightness   g/G  gamma   f/F  fog   n/N  depth of field\n\
r  randomize scene   0  reset camera\n\
space  start/stop rendering   v  toggle display updates\n\
p  play/pause animation   x  keyframe camera at current time\n\
ctrl+s  save scene\n\
h or ?  toggle this help\n\
esc  quit"
}

/// Walker steps per second, averaged over half-second windows.
struct StepMeter {
    last: Instant,
    last_steps: u64,
    rate: f64,
}

impl StepMeter {
    fn new() -> Self {
        Self {
            last: Instant::now(),
            last_steps: 0,
            rate: 0.0,
        }
    }

    fn update(&mut self, total_steps: u64) {
        let dt = self.last.elapsed().as_secs_f64();
        if dt >= 0.5 {
            self.rate = total_steps.saturating_sub(self.last_steps) as f64 / dt;
            self.last_steps = total_steps;
            self.last = Instant::now();
        }
    }

    fn rate(&self) -> f64 {
        self.rate
    }
}
