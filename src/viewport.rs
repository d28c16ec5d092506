// viewport.rs — keeps camera aspect and backing-buffer size in step with the host

use crate::camera::PerspectiveCamera;
use crate::error::MountError;

/// Host surface in logical pixels plus its device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderTarget {
    pub width: f64,
    pub height: f64,
    pub pixel_ratio: f64,
}

impl RenderTarget {
    pub fn new(width: f64, height: f64, pixel_ratio: f64) -> Self {
        Self {
            width,
            height,
            pixel_ratio,
        }
    }

    /// From a physical size as reported by the windowing system.
    pub fn from_physical(width: u32, height: u32, scale_factor: f64) -> Self {
        let scale = if scale_factor > 0.0 { scale_factor } else { 1.0 };
        Self::new(width as f64 / scale, height as f64 / scale, scale)
    }

    pub fn is_empty(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }

    pub fn ensure_mountable(&self) -> Result<(), MountError> {
        if self.is_empty() {
            return Err(MountError::ZeroSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }

    pub fn aspect(&self) -> f32 {
        (self.width / self.height) as f32
    }

    pub fn effective_ratio(&self, max_pixel_ratio: f64) -> f64 {
        self.pixel_ratio.min(max_pixel_ratio)
    }

    /// Backing buffer size in device pixels, never zero.
    pub fn backing_size(&self, max_pixel_ratio: f64) -> (u32, u32) {
        let ratio = self.effective_ratio(max_pixel_ratio);
        let w = (self.width * ratio).round().max(1.0) as u32;
        let h = (self.height * ratio).round().max(1.0) as u32;
        (w, h)
    }
}

/// Applies host size changes. The viewer never polls; the host forwards them.
#[derive(Debug, Clone)]
pub struct ResizeHandler {
    target: RenderTarget,
    max_pixel_ratio: f64,
}

impl ResizeHandler {
    pub fn new(target: RenderTarget, max_pixel_ratio: f64) -> Self {
        Self {
            target,
            max_pixel_ratio,
        }
    }

    pub fn target(&self) -> RenderTarget {
        self.target
    }

    pub fn backing_size(&self) -> (u32, u32) {
        self.target.backing_size(self.max_pixel_ratio)
    }

    /// Updates the camera aspect and returns the new backing size, or `None`
    /// for an empty (e.g. minimised) host, which keeps the previous state.
    pub fn apply(
        &mut self,
        target: RenderTarget,
        camera: &mut PerspectiveCamera,
    ) -> Option<(u32, u32)> {
        if target.is_empty() {
            log::debug!("ignoring resize to empty host {}x{}", target.width, target.height);
            return None;
        }
        self.target = target;
        camera.aspect = target.aspect();
        Some(self.backing_size())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PerspectiveCamera {
        PerspectiveCamera::new(75.0, 1.0, 0.1, 1000.0)
    }

    #[test]
    fn resize_sets_aspect_and_backing_size() {
        let mut handler = ResizeHandler::new(RenderTarget::new(100.0, 100.0, 1.0), 2.0);
        let mut cam = camera();
        let size = handler.apply(RenderTarget::new(1280.0, 720.0, 1.5), &mut cam);
        assert_eq!(cam.aspect, (1280.0f64 / 720.0) as f32);
        assert_eq!(size, Some((1920, 1080)));
    }

    #[test]
    fn pixel_ratio_is_capped() {
        let mut handler = ResizeHandler::new(RenderTarget::new(10.0, 10.0, 1.0), 2.0);
        let mut cam = camera();
        let size = handler.apply(RenderTarget::new(800.0, 600.0, 3.0), &mut cam);
        assert_eq!(size, Some((1600, 1200)));
    }

    #[test]
    fn empty_host_is_ignored() {
        let mut handler = ResizeHandler::new(RenderTarget::new(640.0, 480.0, 1.0), 2.0);
        let mut cam = camera();
        cam.aspect = 640.0 / 480.0;
        assert_eq!(handler.apply(RenderTarget::new(0.0, 480.0, 1.0), &mut cam), None);
        assert_eq!(cam.aspect, 640.0 / 480.0);
        assert_eq!(handler.backing_size(), (640, 480));
        assert_eq!(handler.target().width, 640.0);
    }

    #[test]
    fn physical_sizes_convert_to_logical() {
        let target = RenderTarget::from_physical(2560, 1440, 2.0);
        assert_eq!((target.width, target.height), (1280.0, 720.0));
        assert_eq!(target.backing_size(2.0), (2560, 1440));
    }

    #[test]
    fn zero_sized_host_cannot_mount() {
        let err = RenderTarget::new(0.0, 300.0, 1.0).ensure_mountable().unwrap_err();
        assert_eq!(
            err,
            MountError::ZeroSize {
                width: 0.0,
                height: 300.0
            }
        );
        assert!(RenderTarget::new(1.0, 1.0, 1.0).ensure_mountable().is_ok());
    }
}
