// interaction.rs — pointer drag and wheel input mapped onto camera yaw/pitch/FOV
//
// Handlers run to completion on the event thread, so a frame never sees a
// half-applied update. The controller owns both the drag state and the camera
// state; the frame loop borrows them each frame.

use crate::camera::CameraState;
use crate::config::ViewerConfig;
use winit::dpi::PhysicalPosition;
use winit::event::MouseScrollDelta;

/// Pixels of scroll per wheel line, matching a standard mouse notch.
pub const LINE_DELTA_PIXELS: f32 = 120.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InteractionState {
    pub is_pointer_down: bool,
    pub last_pointer_x: f64,
    pub last_pointer_y: f64,
}

/// Cursor shown over the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorAffordance {
    Grab,
    Grabbing,
}

#[derive(Debug, Clone)]
pub struct InteractionController {
    state: InteractionState,
    camera: CameraState,
    drag_sensitivity: f32,
    wheel_zoom_factor: f32,
    min_fov: f32,
    max_fov: f32,
    initial_fov: f32,
}

impl InteractionController {
    pub fn new(config: &ViewerConfig) -> Self {
        Self {
            state: InteractionState::default(),
            camera: CameraState::new(config.initial_fov),
            drag_sensitivity: config.drag_sensitivity,
            wheel_zoom_factor: config.wheel_zoom_factor,
            min_fov: config.min_fov,
            max_fov: config.max_fov,
            initial_fov: config.initial_fov,
        }
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn camera(&self) -> &CameraState {
        &self.camera
    }

    /// Split borrow for the frame loop: drag state read-only, camera mutable.
    pub fn frame_view(&mut self) -> (&InteractionState, &mut CameraState) {
        (&self.state, &mut self.camera)
    }

    pub fn cursor(&self) -> CursorAffordance {
        if self.state.is_pointer_down {
            CursorAffordance::Grabbing
        } else {
            CursorAffordance::Grab
        }
    }

    pub fn pointer_down(&mut self, x: f64, y: f64) {
        if !(x.is_finite() && y.is_finite()) {
            return;
        }
        self.state.is_pointer_down = true;
        self.state.last_pointer_x = x;
        self.state.last_pointer_y = y;
    }

    pub fn pointer_move(&mut self, x: f64, y: f64) {
        if !self.state.is_pointer_down || !(x.is_finite() && y.is_finite()) {
            return;
        }
        let dx = (x - self.state.last_pointer_x) as f32;
        let dy = (y - self.state.last_pointer_y) as f32;

        self.camera.add_yaw(dx * self.drag_sensitivity);
        self.camera.add_pitch(dy * self.drag_sensitivity);

        self.state.last_pointer_x = x;
        self.state.last_pointer_y = y;
    }

    pub fn pointer_up(&mut self) {
        self.state.is_pointer_down = false;
    }

    pub fn pointer_leave(&mut self) {
        self.state.is_pointer_down = false;
    }

    /// Positive `delta_y` scrolls down and zooms out. Returns true when the
    /// event was used, i.e. the host should not scroll anything else.
    pub fn wheel(&mut self, delta_y: f32) -> bool {
        if !delta_y.is_finite() {
            return false;
        }
        self.camera
            .add_fov(delta_y * self.wheel_zoom_factor, self.min_fov, self.max_fov);
        true
    }

    pub fn reset_view(&mut self) {
        self.camera = CameraState::new(self.initial_fov);
    }
}

/// Pointer position in logical pixels; drag sensitivity is per logical pixel.
pub fn logical_pointer(position: PhysicalPosition<f64>, scale_factor: f64) -> (f64, f64) {
    let logical = position.to_logical::<f64>(scale_factor);
    (logical.x, logical.y)
}

/// Convert a winit scroll delta to a DOM-style `deltaY` in logical pixels
/// (positive = scroll down).
pub fn wheel_delta_y(delta: MouseScrollDelta, scale_factor: f64) -> f32 {
    match delta {
        MouseScrollDelta::LineDelta(_, y) => -y * LINE_DELTA_PIXELS,
        MouseScrollDelta::PixelDelta(pos) => -(pos.to_logical::<f64>(scale_factor).y as f32),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::FRAC_PI_2;

    fn controller() -> InteractionController {
        InteractionController::new(&ViewerConfig::default())
    }

    #[test]
    fn drag_updates_yaw_and_pitch() {
        let mut c = controller();
        c.pointer_down(100.0, 100.0);
        assert_eq!(c.cursor(), CursorAffordance::Grabbing);
        c.pointer_move(110.0, 96.0);

        assert!((c.camera().yaw - 0.05).abs() < 1e-6);
        assert!((c.camera().pitch + 0.02).abs() < 1e-6);
        assert_eq!(c.state().last_pointer_x, 110.0);
        assert_eq!(c.state().last_pointer_y, 96.0);
    }

    #[test]
    fn move_without_press_is_ignored() {
        let mut c = controller();
        c.pointer_move(500.0, 500.0);
        assert_eq!(c.camera(), &CameraState::new(75.0));
    }

    #[test]
    fn release_and_leave_stop_the_drag() {
        let mut c = controller();
        c.pointer_down(0.0, 0.0);
        c.pointer_up();
        assert!(!c.state().is_pointer_down);
        assert_eq!(c.cursor(), CursorAffordance::Grab);

        c.pointer_down(0.0, 0.0);
        c.pointer_leave();
        c.pointer_move(50.0, 50.0);
        assert_eq!(c.camera().pitch, 0.0);
    }

    #[test]
    fn non_finite_pointer_events_are_ignored() {
        let mut c = controller();
        c.pointer_down(f64::NAN, 1.0);
        assert!(!c.state().is_pointer_down);

        c.pointer_down(1.0, 1.0);
        c.pointer_move(f64::INFINITY, 2.0);
        assert_eq!(c.camera().yaw, 0.0);
        assert_eq!(c.state().last_pointer_x, 1.0);
    }

    #[test]
    fn drag_past_vertical_hits_the_clamp() {
        let mut c = controller();
        c.camera.pitch = 80f32.to_radians();
        c.pointer_down(0.0, 0.0);
        // +20 degrees of drag
        let dy = 20f32.to_radians() / c.drag_sensitivity;
        c.pointer_move(0.0, dy as f64);
        assert_eq!(c.camera().pitch, FRAC_PI_2);
    }

    #[test]
    fn pitch_stays_bounded_for_any_drag_sequence() {
        let mut c = controller();
        c.pointer_down(0.0, 0.0);
        let mut y = 0.0;
        for step in [300.0, 900.0, -50.0, -2000.0, 4000.0, 1.0, -1.0, -9000.0] {
            y += step;
            c.pointer_move(0.0, y);
            let pitch = c.camera().pitch;
            assert!((-FRAC_PI_2..=FRAC_PI_2).contains(&pitch), "pitch {pitch}");
        }
    }

    #[test]
    fn wheel_down_zooms_out() {
        let mut c = controller();
        assert!(c.wheel(120.0));
        assert_eq!(c.camera().fov, 87.0);
    }

    #[test]
    fn fov_stays_bounded_for_any_wheel_sequence() {
        let mut c = controller();
        for delta in [120.0, 1200.0, -3.0, -5000.0, 250.0, 99999.0, -1.0] {
            c.wheel(delta);
            let fov = c.camera().fov;
            assert!((30.0..=120.0).contains(&fov), "fov {fov}");
        }
        assert!(!c.wheel(f32::NAN));
    }

    #[test]
    fn reset_restores_initial_view() {
        let mut c = controller();
        c.pointer_down(0.0, 0.0);
        c.pointer_move(40.0, 40.0);
        c.wheel(-200.0);
        c.reset_view();
        assert_eq!(c.camera(), &CameraState::new(75.0));
    }

    #[test]
    fn winit_deltas_map_to_dom_direction() {
        assert_eq!(wheel_delta_y(MouseScrollDelta::LineDelta(0.0, -1.0), 1.0), 120.0);
        assert_eq!(
            wheel_delta_y(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, 30.0)), 1.0),
            -30.0
        );
    }

    #[test]
    fn pixel_deltas_are_scaled_to_logical() {
        assert_eq!(
            wheel_delta_y(MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -240.0)), 2.0),
            120.0
        );
        // line deltas are already device independent
        assert_eq!(wheel_delta_y(MouseScrollDelta::LineDelta(0.0, -1.0), 2.0), 120.0);
    }

    #[test]
    fn hidpi_drag_uses_logical_pixels() {
        let mut c = controller();
        let (x0, y0) = logical_pointer(PhysicalPosition::new(100.0, 100.0), 2.0);
        let (x1, y1) = logical_pointer(PhysicalPosition::new(300.0, 100.0), 2.0);
        c.pointer_down(x0, y0);
        c.pointer_move(x1, y1);
        assert!((c.camera().yaw - 0.5).abs() < 1e-6);
        assert_eq!(c.camera().pitch, 0.0);
    }
}
