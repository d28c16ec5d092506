// session.rs — one live panorama: owns its GPU resources, camera, input and loads
//
// Lifecycle:
//  - `create` measures the host, attaches the surface, builds the sphere and
//    starts loading the image. A zero-sized host is the only fatal error.
//  - While live, the host forwards input/resize events and calls `frame` on
//    every redraw; background loads and settle timers arrive through `pump`.
//  - `teardown` stops the loop, detaches listeners, releases every resource
//    exactly once, and is the only way to stop. It also runs on drop.
//
// Stale results (an old load generation, or anything after teardown) are
// dropped without touching resources.

use crate::animation::{AnimationLoop, FrameStep};
use crate::camera::{CameraState, PerspectiveCamera};
use crate::config::ViewerConfig;
use crate::error::{RenderError, TextureLoadError, ViewerError};
use crate::fullscreen::{FullscreenBackend, FullscreenSynchronizer};
use crate::interaction::{CursorAffordance, InteractionController};
use crate::lifecycle::{GraphicsContext, Overlay, SphericalSurface};
use crate::mesh::build_inverted_sphere;
use crate::texture::{short_url, spawn_load};
use crate::viewport::{RenderTarget, ResizeHandler};
use image::RgbaImage;
use std::sync::mpsc::{channel, Receiver, Sender};

#[derive(Debug)]
pub enum SessionMessage {
    TextureLoaded {
        generation: u64,
        url: String,
        result: Result<RgbaImage, TextureLoadError>,
    },
    SettleElapsed,
}

pub struct ViewerSession<G: GraphicsContext> {
    ctx: Option<G>,
    surface: SphericalSurface<G>,
    camera: PerspectiveCamera,
    controller: InteractionController,
    animation: AnimationLoop,
    resize: ResizeHandler,
    fullscreen: FullscreenSynchronizer,
    measure: Box<dyn Fn() -> RenderTarget>,

    image_url: String,
    display_name: String,
    loading: bool,
    error: Option<String>,
    generation: u64,
    max_texture_dimension: u32,

    listening: bool,
    torn_down: bool,
    on_close: Option<Box<dyn FnMut()>>,
    tx: Sender<SessionMessage>,
    rx: Receiver<SessionMessage>,
}

impl<G: GraphicsContext> ViewerSession<G> {
    /// `measure` reports the host's current size; it is called now and again
    /// after every fullscreen settle delay.
    pub fn create(
        mut ctx: G,
        measure: impl Fn() -> RenderTarget + 'static,
        image_url: impl Into<String>,
        display_name: impl Into<String>,
        config: &ViewerConfig,
        fullscreen_chain: Vec<Box<dyn FullscreenBackend>>,
    ) -> Result<Self, ViewerError> {
        let target = measure();
        if let Err(e) = target.ensure_mountable() {
            ctx.release();
            return Err(e.into());
        }

        let resize = ResizeHandler::new(target, config.max_pixel_ratio);
        let (w, h) = resize.backing_size();
        if let Err(e) = ctx.attach(w, h) {
            ctx.release();
            return Err(e.into());
        }

        let mesh = build_inverted_sphere(
            config.sphere_radius,
            config.sphere_width_segments,
            config.sphere_height_segments,
        );
        let surface = SphericalSurface::create(&mut ctx, &mesh);
        let max_texture_dimension = ctx.max_texture_dimension();
        let camera = PerspectiveCamera::new(config.initial_fov, target.aspect(), config.near, config.far);
        let (tx, rx) = channel();
        let fullscreen = FullscreenSynchronizer::new(fullscreen_chain, config.settle_delay(), tx.clone());

        let mut session = Self {
            ctx: Some(ctx),
            surface,
            camera,
            controller: InteractionController::new(config),
            animation: AnimationLoop::new(config.auto_rotate_speed),
            resize,
            fullscreen,
            measure: Box::new(measure),
            image_url: image_url.into(),
            display_name: display_name.into(),
            loading: false,
            error: None,
            generation: 0,
            max_texture_dimension,
            listening: true,
            torn_down: false,
            on_close: None,
            tx,
            rx,
        };
        log::info!(
            "session created for {:?} at {}x{} (backing {}x{})",
            session.display_name,
            target.width,
            target.height,
            w,
            h
        );
        session.request_load();
        Ok(session)
    }

    pub fn set_on_close(&mut self, on_close: impl FnMut() + 'static) {
        self.on_close = Some(Box::new(on_close));
    }

    pub fn is_live(&self) -> bool {
        !self.torn_down
    }

    pub fn is_running(&self) -> bool {
        self.animation.is_running()
    }

    pub fn image_url(&self) -> &str {
        &self.image_url
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen.is_fullscreen()
    }

    pub fn has_texture(&self) -> bool {
        self.surface.has_texture()
    }

    pub fn camera_state(&self) -> &CameraState {
        self.controller.camera()
    }

    pub fn camera(&self) -> &PerspectiveCamera {
        &self.camera
    }

    pub fn cursor(&self) -> CursorAffordance {
        self.controller.cursor()
    }

    pub fn context_mut(&mut self) -> Option<&mut G> {
        self.ctx.as_mut()
    }

    /// Swap the image. The current texture is released before the new load
    /// starts, and any load still in flight is superseded.
    pub fn set_image_url(&mut self, url: impl Into<String>, display_name: impl Into<String>) {
        if !self.is_live() {
            return;
        }
        if let Some(ctx) = self.ctx.as_mut() {
            self.surface.release_texture(ctx);
        }
        self.image_url = url.into();
        self.display_name = display_name.into();
        self.request_load();
    }

    fn request_load(&mut self) {
        self.generation += 1;
        self.loading = true;
        self.error = None;
        spawn_load(
            self.image_url.clone(),
            self.generation,
            self.max_texture_dimension,
            self.tx.clone(),
        );
    }

    /// Drain finished loads and timers. Returns how many messages were applied.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(message) = self.rx.try_recv() {
            if self.handle_message(message) {
                applied += 1;
            }
        }
        applied
    }

    /// Apply one message; `false` when it was stale and discarded.
    pub fn handle_message(&mut self, message: SessionMessage) -> bool {
        match message {
            SessionMessage::TextureLoaded {
                generation,
                url,
                result,
            } => {
                if self.torn_down || generation != self.generation {
                    log::debug!(
                        "discarding stale load of generation {} (current {})",
                        generation,
                        self.generation
                    );
                    return false;
                }
                self.finish_load(&url, result);
                true
            }
            SessionMessage::SettleElapsed => {
                if self.torn_down {
                    log::debug!("discarding settle timer after teardown");
                    return false;
                }
                let target = (self.measure)();
                self.resize(target);
                true
            }
        }
    }

    fn finish_load(&mut self, url: &str, result: Result<RgbaImage, TextureLoadError>) {
        let Some(ctx) = self.ctx.as_mut() else {
            return;
        };
        self.loading = false;

        // already fitted on the loader thread; only the upload happens here
        let texture = result.and_then(|img| ctx.create_texture(&img));
        match texture {
            Ok(texture) => {
                self.surface.bind(ctx, texture);
                self.error = None;
                log::info!("bound texture for {}", self.display_name);
            }
            Err(e) => {
                log::warn!("cannot show {}: {}", short_url(url), e);
                self.error = Some(crate::i18n::tr_with(
                    "error.load_failed",
                    &[("err", e.to_string())],
                ));
            }
        }
    }

    /// Render one frame. `Stop` means no further frames should be requested.
    pub fn frame(&mut self) -> Result<FrameStep, RenderError> {
        let Some(ctx) = self.ctx.as_mut() else {
            return Ok(FrameStep::Stop);
        };
        let Some(uniform) = self.animation.advance(&mut self.controller, &mut self.camera) else {
            return Ok(FrameStep::Stop);
        };

        let overlay = Overlay {
            display_name: self.display_name.clone(),
            loading: self.loading,
            error: self.error.clone(),
            is_fullscreen: self.fullscreen.is_fullscreen(),
            fullscreen_available: self.fullscreen.is_available(),
            fov: self.camera.fov,
        };

        match self.surface.render(ctx, &uniform, &overlay) {
            Ok(actions) => {
                if actions.toggle_fullscreen {
                    self.toggle_fullscreen();
                }
                if actions.close {
                    self.request_close();
                }
            }
            Err(RenderError::Surface(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated)) => {
                log::warn!("surface lost, reconfiguring");
                let (w, h) = self.resize.backing_size();
                ctx.resize(w, h);
            }
            Err(RenderError::Surface(wgpu::SurfaceError::Timeout)) => {
                log::debug!("surface timeout, skipping frame");
            }
            Err(e) => return Err(e),
        }
        Ok(self.animation.next_step())
    }

    fn accepts_input(&self) -> bool {
        self.listening && self.error.is_none()
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        if self.accepts_input() {
            self.controller.pointer_down(x, y);
        }
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if self.accepts_input() {
            self.controller.pointer_move(x, y);
        }
    }

    pub fn pointer_up(&mut self) {
        if self.listening {
            self.controller.pointer_up();
        }
    }

    pub fn pointer_leave(&mut self) {
        if self.listening {
            self.controller.pointer_leave();
        }
    }

    /// Returns true when the wheel event was consumed by the viewer.
    pub fn wheel(&mut self, delta_y: f32) -> bool {
        self.accepts_input() && self.controller.wheel(delta_y)
    }

    pub fn reset_view(&mut self) {
        if self.accepts_input() {
            self.controller.reset_view();
        }
    }

    pub fn resize(&mut self, target: RenderTarget) {
        if !self.listening {
            return;
        }
        if let Some((w, h)) = self.resize.apply(target, &mut self.camera) {
            if let Some(ctx) = self.ctx.as_mut() {
                ctx.resize(w, h);
            }
        }
    }

    /// Request the change, then mirror whatever the platform already reports.
    /// Platforms that switch asynchronously are picked up by `observe_fullscreen`.
    pub fn toggle_fullscreen(&mut self) {
        if self.listening {
            self.fullscreen.toggle();
            self.fullscreen.observe();
        }
    }

    /// Mirror the platform fullscreen state; call on host resize notifications.
    pub fn observe_fullscreen(&mut self) -> bool {
        self.listening && self.fullscreen.observe()
    }

    /// Notify the host; the host decides whether to tear the session down.
    pub fn request_close(&mut self) {
        if !self.listening {
            return;
        }
        if let Some(on_close) = self.on_close.as_mut() {
            on_close();
        }
    }

    /// Stop the loop, drop listeners, detach and release everything. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.animation.stop();
        self.listening = false;
        self.on_close = None;
        self.controller.pointer_up();
        // invalidate in-flight loads
        self.generation += 1;
        self.loading = false;

        if let Some(mut ctx) = self.ctx.take() {
            ctx.detach();
            self.surface.dispose(&mut ctx);
            ctx.release();
        }
        log::info!("session for {:?} torn down", self.display_name);
    }
}

impl<G: GraphicsContext> Drop for ViewerSession<G> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MountError;
    use crate::fullscreen::tests::fake;
    use crate::lifecycle::tests::RecordingContext;
    use crate::lifecycle::OverlayActions;
    use crate::texture::tests::png_data_url;
    use std::cell::Cell;
    use std::rc::Rc;
    use std::time::Duration;

    type Session = ViewerSession<RecordingContext>;

    fn session_with(url: &str, target: Rc<Cell<RenderTarget>>) -> (Session, RecordingContext) {
        let ctx = RecordingContext::default();
        let session = ViewerSession::create(
            ctx.clone(),
            move || target.get(),
            url,
            "Test",
            &ViewerConfig::default(),
            Vec::new(),
        )
        .unwrap();
        (session, ctx)
    }

    fn session(url: &str) -> (Session, RecordingContext) {
        session_with(url, Rc::new(Cell::new(RenderTarget::new(800.0, 400.0, 1.0))))
    }

    fn next_message(session: &Session) -> SessionMessage {
        session
            .rx
            .recv_timeout(Duration::from_secs(5))
            .expect("no message from background thread")
    }

    fn settle_load(session: &mut Session) {
        let message = next_message(session);
        assert!(session.handle_message(message));
    }

    #[test]
    fn zero_sized_host_is_mount_error() {
        let ctx = RecordingContext::default();
        let result = ViewerSession::create(
            ctx.clone(),
            || RenderTarget::new(0.0, 0.0, 1.0),
            "pano.jpg",
            "Test",
            &ViewerConfig::default(),
            Vec::new(),
        );
        assert!(matches!(result, Err(ViewerError::Mount(MountError::ZeroSize { .. }))));
        let l = ctx.ledger.borrow();
        assert_eq!(l.released, 1);
        assert!(l.live.is_empty());
        assert_eq!(l.attach_calls, 0);
    }

    #[test]
    fn create_attaches_and_builds_sphere() {
        let (session, ctx) = session(&png_data_url(8, 4));
        let l = ctx.ledger.borrow();
        assert!(l.attached);
        assert_eq!(l.resizes, vec![(800, 400)]);
        assert_eq!(l.live.len(), 2);
        assert!(session.loading());
        assert_eq!(session.camera().fov, 75.0);
        assert_eq!(session.camera().aspect, 2.0);
    }

    #[test]
    fn successful_load_binds_texture() {
        let (mut session, ctx) = session(&png_data_url(8, 4));
        settle_load(&mut session);
        assert!(!session.loading());
        assert!(session.error().is_none());
        assert!(session.has_texture());
        assert!(ctx.ledger.borrow().bound.is_some());
    }

    #[test]
    fn applying_a_load_only_uploads() {
        let (mut session, ctx) = session("/no/such/place.jpg");
        let message = SessionMessage::TextureLoaded {
            generation: session.generation,
            url: "wide.png".into(),
            result: Ok(RgbaImage::new(4, 1)),
        };
        assert!(session.handle_message(message));
        // no padding or scaling on the event thread
        assert_eq!(ctx.ledger.borrow().last_texture_size, Some((4, 1)));
        assert!(session.has_texture());
    }

    #[test]
    fn loader_thread_prepares_the_image() {
        let (mut session, ctx) = session(&png_data_url(8, 2));
        settle_load(&mut session);
        assert_eq!(ctx.ledger.borrow().last_texture_size, Some((8, 4)));
    }

    #[test]
    fn invalid_url_sets_error_without_texture() {
        let (mut session, ctx) = session("/no/such/place/sunset.jpg");
        settle_load(&mut session);
        assert!(!session.loading());
        assert!(!session.error().unwrap_or_default().is_empty());
        assert!(!session.has_texture());
        assert_eq!(ctx.ledger.borrow().bound, None);
        assert_eq!(ctx.ledger.borrow().textures_created, 0);
    }

    #[test]
    fn error_state_makes_controls_inert() {
        let (mut session, _ctx) = session("data:text/plain,nope");
        settle_load(&mut session);
        assert!(session.error().is_some());
        session.pointer_down(0.0, 0.0);
        session.pointer_move(100.0, 100.0);
        assert!(!session.wheel(120.0));
        assert_eq!(session.camera_state().pitch, 0.0);
        assert_eq!(session.camera_state().fov, 75.0);
    }

    #[test]
    fn teardown_is_idempotent() {
        let (mut session, ctx) = session(&png_data_url(8, 4));
        settle_load(&mut session);
        session.teardown();
        session.teardown();
        drop(session);

        let l = ctx.ledger.borrow();
        assert!(l.live.is_empty());
        assert_eq!(l.disposed.len(), 3);
        assert_eq!(l.double_frees, 0);
        assert_eq!(l.detach_calls, 1);
        assert_eq!(l.released, 1);
        assert!(!l.attached);
    }

    #[test]
    fn load_resolving_after_teardown_is_discarded() {
        let (mut session, ctx) = session(&png_data_url(8, 4));
        session.teardown();
        let message = next_message(&session);
        assert!(!session.handle_message(message));
        assert_eq!(session.pump(), 0);

        let l = ctx.ledger.borrow();
        assert_eq!(l.textures_created, 0);
        assert_eq!(l.bind_calls, 0);
        assert!(l.live.is_empty());
    }

    #[test]
    fn new_url_releases_texture_before_loading() {
        let (mut session, ctx) = session(&png_data_url(8, 4));
        settle_load(&mut session);
        let first = ctx.ledger.borrow().bound;
        assert!(first.is_some());

        session.set_image_url(png_data_url(16, 8), "Second");
        {
            let l = ctx.ledger.borrow();
            assert_eq!(l.bound, None);
            assert_eq!(l.disposed, vec![first.unwrap()]);
        }
        assert!(session.loading());
        assert!(!session.has_texture());

        settle_load(&mut session);
        assert!(session.has_texture());
        assert_eq!(session.display_name(), "Second");
    }

    #[test]
    fn stale_load_never_binds_after_url_change() {
        let (mut session, ctx) = session(&png_data_url(8, 4));
        let old_generation = session.generation;
        session.set_image_url("/no/such/newer.jpg", "Newer");

        let stale = SessionMessage::TextureLoaded {
            generation: old_generation,
            url: "old".into(),
            result: Ok(RgbaImage::new(4, 2)),
        };
        assert!(!session.handle_message(stale));
        assert_eq!(ctx.ledger.borrow().textures_created, 0);

        // drain both background threads; only the newer one applies
        let mut applied = 0;
        for _ in 0..2 {
            if session.handle_message(next_message(&session)) {
                applied += 1;
            }
        }
        assert_eq!(applied, 1);
        assert!(!session.has_texture());
        assert!(session.error().is_some());
    }

    #[test]
    fn idle_frames_rotate_and_render() {
        let (mut session, ctx) = session("/no/such/place.jpg");
        for _ in 0..500 {
            assert_eq!(session.frame().unwrap(), FrameStep::Continue);
        }
        assert!((session.camera_state().yaw - 1.0).abs() < 1e-3);
        assert_eq!(ctx.ledger.borrow().renders, 500);
    }

    #[test]
    fn frames_stop_after_teardown() {
        let (mut session, ctx) = session("/no/such/place.jpg");
        session.frame().unwrap();
        session.teardown();
        assert_eq!(session.frame().unwrap(), FrameStep::Stop);
        assert!(!session.is_running());
        assert_eq!(ctx.ledger.borrow().renders, 1);
    }

    #[test]
    fn overlay_reflects_session_state() {
        let (mut session, ctx) = session(&png_data_url(8, 4));
        session.frame().unwrap();
        let overlay = ctx.ledger.borrow().last_overlay.clone().unwrap();
        assert!(overlay.loading);
        assert_eq!(overlay.display_name, "Test");
        assert!(!overlay.fullscreen_available);
    }

    #[test]
    fn close_button_notifies_host_only() {
        let (mut session, ctx) = session("/no/such/place.jpg");
        let closed = Rc::new(Cell::new(0));
        let flag = closed.clone();
        session.set_on_close(move || flag.set(flag.get() + 1));

        ctx.ledger.borrow_mut().next_actions = OverlayActions {
            close: true,
            ..Default::default()
        };
        session.frame().unwrap();
        assert_eq!(closed.get(), 1);
        assert!(session.is_live());
    }

    #[test]
    fn resize_updates_aspect_and_backing() {
        let (mut session, ctx) = session("/no/such/place.jpg");
        session.resize(RenderTarget::new(1024.0, 768.0, 3.0));
        assert_eq!(session.camera().aspect, (1024.0f64 / 768.0) as f32);
        assert_eq!(ctx.ledger.borrow().resizes.last(), Some(&(2048, 1536)));
    }

    #[test]
    fn settle_remeasures_host() {
        let target = Rc::new(Cell::new(RenderTarget::new(800.0, 400.0, 1.0)));
        let (mut session, ctx) = session_with("/no/such/place.jpg", target.clone());
        target.set(RenderTarget::new(1920.0, 1080.0, 1.0));
        assert!(session.handle_message(SessionMessage::SettleElapsed));
        assert_eq!(ctx.ledger.borrow().resizes.last(), Some(&(1920, 1080)));
    }

    #[test]
    fn settle_after_teardown_is_discarded() {
        let (mut session, ctx) = session("/no/such/place.jpg");
        session.teardown();
        let before = ctx.ledger.borrow().resizes.len();
        assert!(!session.handle_message(SessionMessage::SettleElapsed));
        assert_eq!(ctx.ledger.borrow().resizes.len(), before);
    }

    #[test]
    fn fullscreen_toggle_mirrors_and_settles() {
        let platform = Rc::new(Cell::new(None));
        let (backend, _) = fake("borderless", true, true, &platform);
        let ctx = RecordingContext::default();
        let mut config = ViewerConfig::default();
        config.settle_delay_ms = 1;
        let mut session = ViewerSession::create(
            ctx.clone(),
            || RenderTarget::new(640.0, 480.0, 1.0),
            "/no/such/place.jpg",
            "Test",
            &config,
            vec![backend],
        )
        .unwrap();

        session.toggle_fullscreen();
        assert!(session.is_fullscreen());
        assert!(!session.observe_fullscreen());

        // one load failure and one settle timer, in either order
        let mut settled = false;
        for _ in 0..2 {
            if let SessionMessage::SettleElapsed = next_message(&session) {
                settled = true;
                assert!(session.handle_message(SessionMessage::SettleElapsed));
            }
        }
        assert!(settled);
        assert_eq!(ctx.ledger.borrow().resizes.last(), Some(&(640, 480)));
    }

    #[test]
    fn same_size_fullscreen_change_is_mirrored() {
        let platform = Rc::new(Cell::new(None));
        let (backend, _) = fake("borderless", true, true, &platform);
        let ctx = RecordingContext::default();
        let mut session = ViewerSession::create(
            ctx,
            || RenderTarget::new(640.0, 480.0, 1.0),
            "/no/such/place.jpg",
            "Test",
            &ViewerConfig::default(),
            vec![backend],
        )
        .unwrap();

        // the platform leaves fullscreen on its own without any resize
        session.toggle_fullscreen();
        platform.set(None);
        assert!(session.observe_fullscreen());
        assert!(!session.is_fullscreen());

        session.toggle_fullscreen();
        assert!(session.is_fullscreen());
        session.toggle_fullscreen();
        assert!(!session.is_fullscreen());
    }

    #[test]
    fn wheel_zooms_within_limits() {
        let (mut session, _ctx) = session("/no/such/place.jpg");
        assert!(session.wheel(120.0));
        assert_eq!(session.camera_state().fov, 87.0);
        session.frame().unwrap();
        assert_eq!(session.camera().fov, 87.0);
    }
}
