// THEORY:
// The `session` module is the top-level API of the painting engine. It owns
// every piece of mutable state an installation has (the painter ensemble, the
// persistent paint layer, the background mode and the frame counter) and runs
// the per-frame pipeline over it. There are no ambient globals: a host creates
// a `Session`, feeds it the newest skeletons once per display refresh, and asks
// it for a composed frame whenever it needs pixels.
//
// Per frame, in order:
// 1.  Background check: a temporary background past its delay reverts to light.
// 2.  Reset activity: every painter starts the frame inactive.
// 3.  Pairing: skeleton `i` drives painter `i`; extra skeletons are ignored,
//     painters without a skeleton stay inactive but keep their state.
// 4.  Presence: any confidently detected subject switches presence-aware
//     color policies to their vivid palette. The bar sits above the painting
//     gate, so a faint subject still paints, in the muted colors.
// 5.  Per pair: validity gate -> target resolution -> depth estimate ->
//     respawn on a tracking jump -> steering step -> mark making.
//
// Nothing in the loop can fail. Weak data simply leaves a painter idle for a
// frame.

use crate::core_modules::background::{BackgroundConfig, BackgroundController, BackgroundMode};
use crate::core_modules::brush::{Brush, BrushConfig, BrushContext};
use crate::core_modules::depth::{DepthConfig, estimate_depth_scale};
use crate::core_modules::hud::HudMarker;
use crate::core_modules::noise_field::NoiseField;
use crate::core_modules::painter::{MotionConfig, Painter};
use crate::core_modules::palette::{ColorPolicy, Palette};
use crate::core_modules::pose_resolver::{ResolverConfig, resolve_target};
use crate::core_modules::skeleton::Skeleton;
use crate::core_modules::surface::PaintLayer;
use crate::core_modules::vector::Vec2;
use crate::error::{EngineError, EngineResult};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use imageproc::drawing::Blend;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info};

/// Configuration for a painting session. Every hand-tuned constant lives here.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Size of the painter ensemble.
    pub agent_count: usize,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// A target further than this from its painter is treated as a tracking
    /// discontinuity and triggers a respawn instead of a steer.
    pub respawn_distance: f64,
    /// Colors painters are dipped in on (re)assignment.
    pub palette: Palette,
    pub color_policy: ColorPolicy,
    /// Seed of the blot outline noise field.
    pub noise_seed: u32,
    pub resolver: ResolverConfig,
    pub depth: DepthConfig,
    pub motion: MotionConfig,
    pub brush: BrushConfig,
    pub background: BackgroundConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            agent_count: 6,
            canvas_width: 1280,
            canvas_height: 720,
            respawn_distance: 300.0,
            palette: Palette::default(),
            color_policy: ColorPolicy::default(),
            noise_seed: 0,
            resolver: ResolverConfig::default(),
            depth: DepthConfig::default(),
            motion: MotionConfig::default(),
            brush: BrushConfig::default(),
            background: BackgroundConfig::default(),
        }
    }
}

impl SessionConfig {
    pub fn validate(&self) -> EngineResult<()> {
        if self.agent_count == 0 {
            return Err(EngineError::config("agent_count must be at least 1"));
        }
        if self.canvas_width == 0 || self.canvas_height == 0 {
            return Err(EngineError::config(format!(
                "canvas must not be empty, got {}x{}",
                self.canvas_width, self.canvas_height
            )));
        }
        if self.palette.is_empty() {
            return Err(EngineError::config("palette must contain at least one color"));
        }
        if self.resolver.estimator_width <= 0.0 || self.resolver.estimator_height <= 0.0 {
            return Err(EngineError::config("estimator resolution must be positive"));
        }
        if self.depth.near_separation <= self.depth.far_separation {
            return Err(EngineError::config(
                "depth near_separation must be larger than far_separation",
            ));
        }
        if self.depth.min_scale > self.depth.max_scale {
            return Err(EngineError::config("depth min_scale must not exceed max_scale"));
        }
        if self.motion.arrive_radius <= 0.0 || self.motion.max_speed <= 0.0 {
            return Err(EngineError::config("arrive_radius and max_speed must be positive"));
        }
        if self.brush.outline_step <= 0.0 {
            return Err(EngineError::config("brush outline_step must be positive"));
        }
        if self.brush.drip_min_size >= self.brush.drip_max_size {
            return Err(EngineError::config("brush drip_min_size must be below drip_max_size"));
        }
        if self.brush.drip_spread <= 0.0 {
            return Err(EngineError::config("brush drip_spread must be positive"));
        }
        if self.brush.min_stroke_width > self.brush.max_stroke_width {
            return Err(EngineError::config(
                "brush min_stroke_width must not exceed max_stroke_width",
            ));
        }
        if !(0.0..=1.0).contains(&self.brush.splatter_chance) {
            return Err(EngineError::config(format!(
                "brush splatter_chance must lie in [0, 1], got {}",
                self.brush.splatter_chance
            )));
        }
        Ok(())
    }
}

/// What happened during one frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    /// Painters that received an update this frame.
    pub active_painters: usize,
    pub marks_drawn: usize,
    /// Ids of painters teleported this frame.
    pub respawned: Vec<usize>,
    /// Paired skeletons rejected by the validity gate.
    pub skipped_skeletons: usize,
    pub background: BackgroundMode,
    /// Whether the background reverted to light this frame.
    pub background_reset: bool,
}

/// The simulation-session object: painters, paint layer, background, clock.
pub struct Session {
    config: SessionConfig,
    painters: Vec<Painter>,
    layer: PaintLayer,
    brush: Brush,
    background: BackgroundController,
    canvas_scale: Vec2,
    frame_count: u64,
    last_tick_ms: u64,
    rng: StdRng,
}

impl Session {
    /// Builds a session with an entropy-seeded random source.
    pub fn new(config: SessionConfig) -> EngineResult<Self> {
        Self::build(config, StdRng::from_entropy())
    }

    /// Builds a session whose role, color and splatter choices are reproducible.
    pub fn with_seed(config: SessionConfig, seed: u64) -> EngineResult<Self> {
        Self::build(config, StdRng::seed_from_u64(seed))
    }

    fn build(config: SessionConfig, mut rng: StdRng) -> EngineResult<Self> {
        config.validate()?;

        let center = Vec2::new(config.canvas_width as f64 / 2.0, config.canvas_height as f64 / 2.0);
        let painters = (0..config.agent_count)
            .map(|id| Painter::new(id, center, &config.palette, 0, &mut rng))
            .collect();

        info!(
            agents = config.agent_count,
            width = config.canvas_width,
            height = config.canvas_height,
            "painting session started"
        );

        Ok(Self {
            painters,
            layer: PaintLayer::new(config.canvas_width, config.canvas_height),
            brush: Brush::new(config.brush.clone(), NoiseField::new(config.noise_seed)),
            background: BackgroundController::new(config.background.clone()),
            canvas_scale: config
                .resolver
                .canvas_scale(config.canvas_width, config.canvas_height),
            frame_count: 0,
            last_tick_ms: 0,
            rng,
            config,
        })
    }

    /// Runs one frame of the pipeline against the newest skeleton list.
    pub fn tick(&mut self, skeletons: &[Skeleton], now_ms: u64) -> FrameReport {
        let background_reset = self.background.tick(now_ms);
        self.frame_count += 1;
        self.last_tick_ms = now_ms;

        for painter in &mut self.painters {
            painter.active = false;
        }

        let resolver = &self.config.resolver;
        let subject_present = skeletons.iter().any(|s| s.is_present(resolver));

        let mut report = FrameReport {
            frame: self.frame_count,
            background_reset,
            ..FrameReport::default()
        };

        for (skeleton, painter) in skeletons.iter().zip(self.painters.iter_mut()) {
            if !skeleton.is_usable(resolver) {
                report.skipped_skeletons += 1;
                continue;
            }

            let mut target = resolve_target(skeleton, painter.role, resolver, self.canvas_scale);
            if !target.is_trackable(resolver) {
                continue;
            }
            let depth = estimate_depth_scale(skeleton, &self.config.depth);

            if painter.position.dist(target.position) > self.config.respawn_distance {
                painter.respawn(target.position, &self.config.palette, now_ms, &mut self.rng);
                debug!(painter = painter.id, role = ?painter.role, "respawned after tracking jump");
                report.respawned.push(painter.id);
                target = resolve_target(skeleton, painter.role, resolver, self.canvas_scale);
            }

            painter.update(target.position, depth, now_ms, &self.config.motion);
            report.active_painters += 1;

            let ctx = BrushContext {
                color: self
                    .config
                    .color_policy
                    .pick(painter.id, painter.color, subject_present),
                frame: self.frame_count,
                now_ms,
                max_speed: self.config.motion.max_speed,
            };
            report.marks_drawn += self.brush.draw_paint(painter, &ctx, &mut self.layer, &mut self.rng);
        }

        report.background = self.background.mode();
        report
    }

    /// Produces the visible frame: background, then the paint layer, then the
    /// HUD rings. `camera` is only used in live-feed mode.
    pub fn compose(&self, camera: Option<&RgbaImage>) -> RgbaImage {
        let (width, height) = (self.layer.width(), self.layer.height());
        let mut front = match self.background.mode() {
            BackgroundMode::BlankLight => RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255])),
            BackgroundMode::BlankDark => RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255])),
            BackgroundMode::LiveFeed => match camera {
                Some(frame) if frame.dimensions() == (width, height) => frame.clone(),
                Some(frame) => imageops::resize(frame, width, height, FilterType::Triangle),
                None => RgbaImage::new(width, height),
            },
        };
        imageops::overlay(&mut front, self.layer.image(), 0, 0);

        let mut canvas = Blend(front);
        for marker in self.hud() {
            marker.draw_ring(&mut canvas);
        }
        canvas.0
    }

    /// HUD markers for the painters active in the last tick.
    pub fn hud(&self) -> Vec<HudMarker> {
        self.painters
            .iter()
            .filter_map(|p| HudMarker::for_painter(p, self.last_tick_ms, self.config.brush.wait_ms))
            .collect()
    }

    /// Advances the background mode (light -> dark -> live feed -> light).
    pub fn cycle_background(&mut self, now_ms: u64) -> BackgroundMode {
        self.background.cycle(now_ms)
    }

    /// Wipes the painting and gives every painter a new role and color.
    pub fn reset_canvas(&mut self) {
        self.layer.clear();
        for painter in &mut self.painters {
            painter.assign_random_role(&self.config.palette, &mut self.rng);
        }
        info!("canvas reset");
    }

    /// Replaces the paint layer with an empty one of the new size.
    pub fn resize(&mut self, width: u32, height: u32) -> EngineResult<()> {
        if width == 0 || height == 0 {
            return Err(EngineError::config(format!(
                "canvas must not be empty, got {width}x{height}"
            )));
        }
        self.config.canvas_width = width;
        self.config.canvas_height = height;
        self.layer = PaintLayer::new(width, height);
        self.canvas_scale = self.config.resolver.canvas_scale(width, height);
        debug!(width, height, "canvas resized");
        Ok(())
    }

    pub fn painters(&self) -> &[Painter] {
        &self.painters
    }

    pub fn layer(&self) -> &PaintLayer {
        &self.layer
    }

    pub fn background_mode(&self) -> BackgroundMode {
        self.background.mode()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::palette::{HEAD, LEFT_SHOULDER, RIGHT_SHOULDER};
    use crate::core_modules::skeleton::fixtures::{uniform, with_keypoint};

    /// Canvas the size of the estimator, so keypoints map 1:1.
    fn config() -> SessionConfig {
        SessionConfig {
            canvas_width: 640,
            canvas_height: 480,
            ..SessionConfig::default()
        }
    }

    /// A confident person with every keypoint near `(x, y)`.
    fn person(x: f64, y: f64) -> Skeleton {
        let s = uniform(0.9, x, y);
        let s = with_keypoint(s, LEFT_SHOULDER, x - 40.0, y, 0.9);
        with_keypoint(s, RIGHT_SHOULDER, x + 40.0, y, 0.9)
    }

    #[cfg(feature = "serde")]
    #[test]
    fn partial_json_overrides_only_named_fields() {
        let cfg: SessionConfig = serde_json::from_str(
            r##"{"agent_count": 3, "palette": ["#000000"], "brush": {"wait_ms": 500}}"##,
        )
        .unwrap();
        assert_eq!(cfg.agent_count, 3);
        assert_eq!(cfg.palette.colors(), &[Rgba([0, 0, 0, 255])]);
        assert_eq!(cfg.brush.wait_ms, 500);
        assert_eq!(cfg.brush.max_blot_radius, 120.0);
        assert_eq!(cfg.respawn_distance, 300.0);
        assert!(cfg.validate().is_ok());

        let bad = serde_json::from_str::<SessionConfig>(r##"{"palette": ["red"]}"##);
        assert!(bad.is_err());
    }

    #[test]
    fn invalid_configs_are_rejected() {
        let zero_agents = SessionConfig {
            agent_count: 0,
            ..config()
        };
        assert!(Session::with_seed(zero_agents, 1).is_err());

        let empty_canvas = SessionConfig {
            canvas_width: 0,
            ..config()
        };
        assert!(Session::with_seed(empty_canvas, 1).is_err());
    }

    #[test]
    fn brush_settings_that_would_break_a_frame_are_rejected() {
        let mut no_spread = config();
        no_spread.brush.drip_spread = 0.0;
        assert!(no_spread.validate().is_err());

        let mut inverted_widths = config();
        inverted_widths.brush.min_stroke_width = 50.0;
        assert!(inverted_widths.validate().is_err());

        let mut certain_splatter = config();
        certain_splatter.brush.splatter_chance = 1.5;
        assert!(Session::with_seed(certain_splatter, 1).is_err());
    }

    #[test]
    fn edge_brush_settings_survive_a_fast_sweep() {
        let mut cfg = config();
        cfg.brush.splatter_chance = 1.0;
        cfg.brush.splatter_speed = 0.0;
        cfg.brush.min_stroke_width = 10.0;
        cfg.brush.max_stroke_width = 10.0;
        let mut session = Session::with_seed(cfg, 3).unwrap();

        let mut marks = 0;
        for frame in 0..400u64 {
            let x = if (frame / 20) % 2 == 0 { 200.0 } else { 440.0 };
            marks += session.tick(&[person(x, 240.0)], frame * 16).marks_drawn;
        }
        assert!(marks > 0);
    }

    #[test]
    fn painters_start_centered_and_inactive() {
        let session = Session::with_seed(config(), 1).unwrap();
        assert_eq!(session.painters().len(), 6);
        for p in session.painters() {
            assert_eq!(p.position, Vec2::new(320.0, 240.0));
            assert!(!p.active);
        }
    }

    #[test]
    fn skeleton_i_drives_painter_i_and_extras_are_ignored() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        let crowd: Vec<Skeleton> = (0..8).map(|_| person(330.0, 250.0)).collect();
        let report = session.tick(&crowd, 16);
        assert_eq!(report.active_painters, 6);
        assert!(session.painters().iter().all(|p| p.active));

        let report = session.tick(&crowd[..2], 32);
        assert_eq!(report.active_painters, 2);
        let active: Vec<bool> = session.painters().iter().map(|p| p.active).collect();
        assert_eq!(active, vec![true, true, false, false, false, false]);
    }

    #[test]
    fn ghost_skeletons_leave_no_marks() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        let mut ghost = person(330.0, 250.0);
        ghost.score = 0.1;

        for frame in 0..200u64 {
            let report = session.tick(std::slice::from_ref(&ghost), frame * 16);
            assert_eq!(report.marks_drawn, 0);
            assert_eq!(report.skipped_skeletons, 1);
        }
        assert!(!session.painters()[0].active);
        assert_eq!(session.layer().painted_pixels(), 0);
    }

    #[test]
    fn large_jump_respawns_instead_of_steering() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        let far = person(600.0, 40.0);
        let report = session.tick(std::slice::from_ref(&far), 16);
        assert_eq!(report.respawned, vec![0]);

        let painter = &session.painters()[0];
        assert!(painter.active);
        // Respawn snaps to the target, then one (tiny) steering step follows.
        assert!(painter.position.dist(painter.raw_target) < 1.0);
    }

    #[test]
    fn holding_still_pools_a_blot_on_the_layer() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        let still = person(320.0, 240.0);
        let mut blots = 0;
        for frame in 0..150u64 {
            blots += session.tick(std::slice::from_ref(&still), frame * 16).marks_drawn;
        }
        assert!(blots > 0);
        assert!(session.layer().painted_pixels() > 0);
    }

    fn presence_config() -> SessionConfig {
        SessionConfig {
            color_policy: ColorPolicy::PresenceAware {
                vivid: Palette::parse(&["#FF0000"]).unwrap(),
                neutral: Palette::parse(&["#00FF00"]).unwrap(),
            },
            ..config()
        }
    }

    /// Holds `subject` still long enough to pool a blot and returns the
    /// painted pixels of the layer.
    fn pooled_pixels(subject: Skeleton) -> Vec<Rgba<u8>> {
        let mut session = Session::with_seed(presence_config(), 1).unwrap();
        for frame in 0..150u64 {
            session.tick(std::slice::from_ref(&subject), frame * 16);
        }
        session.layer().image().pixels().filter(|p| p[3] > 0).copied().collect()
    }

    #[test]
    fn faint_subject_paints_in_the_neutral_palette() {
        let mut faint = person(320.0, 240.0);
        faint.score = 0.3;
        let pixels = pooled_pixels(faint);
        assert!(!pixels.is_empty());
        assert!(pixels.iter().all(|p| p[0] == 0 && p[1] > 0));
    }

    #[test]
    fn confident_subject_paints_in_the_vivid_palette() {
        let pixels = pooled_pixels(person(320.0, 240.0));
        assert!(!pixels.is_empty());
        assert!(pixels.iter().all(|p| p[1] == 0 && p[0] > 0));
    }

    #[test]
    fn missing_depth_keeps_the_previous_target_scale() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        session.tick(&[person(320.0, 240.0)], 16);
        let scale = session.painters()[0].target_scale;

        let mut hidden_shoulders = person(320.0, 240.0);
        hidden_shoulders = with_keypoint(hidden_shoulders, LEFT_SHOULDER, 280.0, 240.0, 0.1);
        hidden_shoulders = with_keypoint(hidden_shoulders, HEAD, 320.0, 200.0, 0.9);
        session.tick(&[hidden_shoulders], 32);
        assert_eq!(session.painters()[0].target_scale, scale);
    }

    #[test]
    fn background_cycles_and_auto_resets_through_tick() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        assert_eq!(session.cycle_background(0), BackgroundMode::BlankDark);
        let report = session.tick(&[], 15_001);
        assert!(report.background_reset);
        assert_eq!(report.background, BackgroundMode::BlankLight);
    }

    #[test]
    fn compose_layers_background_paint_and_hud() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        let light = session.compose(None);
        assert_eq!(*light.get_pixel(0, 0), Rgba([255, 255, 255, 255]));

        session.cycle_background(0);
        assert_eq!(*session.compose(None).get_pixel(0, 0), Rgba([0, 0, 0, 255]));

        session.cycle_background(0);
        let camera = RgbaImage::from_pixel(640, 480, Rgba([10, 200, 10, 255]));
        let live = session.compose(Some(&camera));
        assert_eq!(*live.get_pixel(5, 5), Rgba([10, 200, 10, 255]));
        let small = RgbaImage::from_pixel(64, 48, Rgba([10, 200, 10, 255]));
        assert_eq!(session.compose(Some(&small)).dimensions(), (640, 480));
        assert_eq!(session.compose(None).get_pixel(5, 5)[3], 0);
    }

    #[test]
    fn reset_clears_paint_and_resize_starts_a_fresh_layer() {
        let mut session = Session::with_seed(config(), 1).unwrap();
        let still = person(320.0, 240.0);
        for frame in 0..150u64 {
            session.tick(std::slice::from_ref(&still), frame * 16);
        }
        assert!(session.layer().painted_pixels() > 0);

        session.reset_canvas();
        assert_eq!(session.layer().painted_pixels(), 0);

        session.resize(320, 240).unwrap();
        assert_eq!((session.layer().width(), session.layer().height()), (320, 240));
        assert!(session.resize(0, 10).is_err());
    }
}
