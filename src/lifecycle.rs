// lifecycle.rs — graphics resource seam and the sphere's owned resource set
//
// Every GPU object is created through `GraphicsContext` and handed back to it
// by value for disposal, so a handle cannot be released twice. The session
// keeps handles in `Option`s and takes them on teardown.

use crate::camera::CameraUniform;
use crate::error::{GpuError, RenderError, TextureLoadError};
use crate::mesh::SphereMesh;
use image::RgbaImage;

/// Sampling for equirectangular images: wrap around horizontally, clamp at the poles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SamplerSpec {
    pub wrap_u: bool,
    pub wrap_v: bool,
    pub linear: bool,
}

impl SamplerSpec {
    pub const EQUIRECT: SamplerSpec = SamplerSpec {
        wrap_u: true,
        wrap_v: false,
        linear: true,
    };
}

/// What the overlay shows for the current frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overlay {
    pub display_name: String,
    pub loading: bool,
    pub error: Option<String>,
    pub is_fullscreen: bool,
    pub fullscreen_available: bool,
    pub fov: f32,
}

/// Buttons the user pressed on the overlay this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverlayActions {
    pub toggle_fullscreen: bool,
    pub close: bool,
}

pub trait GraphicsContext {
    type Geometry;
    type Material;
    type Texture;

    /// Bind the drawable surface to the host at the given backing size.
    fn attach(&mut self, width: u32, height: u32) -> Result<(), GpuError>;
    fn detach(&mut self);
    fn resize(&mut self, width: u32, height: u32);
    /// Largest texture edge the device accepts.
    fn max_texture_dimension(&self) -> u32;

    fn create_geometry(&mut self, mesh: &SphereMesh) -> Self::Geometry;
    fn create_material(&mut self, sampler: SamplerSpec) -> Self::Material;
    fn create_texture(&mut self, image: &RgbaImage) -> Result<Self::Texture, TextureLoadError>;

    fn bind_texture(&mut self, material: &mut Self::Material, texture: &Self::Texture);
    /// Return the material to its blank state.
    fn unbind_texture(&mut self, material: &mut Self::Material);

    fn render(
        &mut self,
        geometry: &Self::Geometry,
        material: &Self::Material,
        camera: &CameraUniform,
        overlay: &Overlay,
    ) -> Result<OverlayActions, RenderError>;

    fn dispose_geometry(&mut self, geometry: Self::Geometry);
    fn dispose_material(&mut self, material: Self::Material);
    fn dispose_texture(&mut self, texture: Self::Texture);
    /// Drop the device/queue. Called once, last.
    fn release(&mut self);
}

/// Inverted sphere geometry, its material and at most one bound texture.
pub struct SphericalSurface<G: GraphicsContext> {
    geometry: Option<G::Geometry>,
    material: Option<G::Material>,
    texture: Option<G::Texture>,
}

impl<G: GraphicsContext> SphericalSurface<G> {
    pub fn create(ctx: &mut G, mesh: &SphereMesh) -> Self {
        Self {
            geometry: Some(ctx.create_geometry(mesh)),
            material: Some(ctx.create_material(SamplerSpec::EQUIRECT)),
            texture: None,
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.material.is_none()
    }

    pub fn has_texture(&self) -> bool {
        self.texture.is_some()
    }

    /// Bind a new texture, releasing any previous one first. A disposed
    /// surface refuses the bind and releases the texture it was given.
    pub fn bind(&mut self, ctx: &mut G, texture: G::Texture) -> bool {
        let Some(material) = self.material.as_mut() else {
            ctx.dispose_texture(texture);
            return false;
        };
        if let Some(old) = self.texture.take() {
            ctx.unbind_texture(material);
            ctx.dispose_texture(old);
        }
        ctx.bind_texture(material, &texture);
        self.texture = Some(texture);
        true
    }

    pub fn release_texture(&mut self, ctx: &mut G) {
        if let Some(old) = self.texture.take() {
            if let Some(material) = self.material.as_mut() {
                ctx.unbind_texture(material);
            }
            ctx.dispose_texture(old);
        }
    }

    pub fn render(
        &self,
        ctx: &mut G,
        camera: &CameraUniform,
        overlay: &Overlay,
    ) -> Result<OverlayActions, RenderError> {
        match (&self.geometry, &self.material) {
            (Some(geometry), Some(material)) => ctx.render(geometry, material, camera, overlay),
            _ => Err(RenderError::Gpu(GpuError::Detached)),
        }
    }

    /// Geometry, then material with its texture. Safe to call repeatedly.
    pub fn dispose(&mut self, ctx: &mut G) {
        if let Some(geometry) = self.geometry.take() {
            ctx.dispose_geometry(geometry);
        }
        self.release_texture(ctx);
        if let Some(material) = self.material.take() {
            ctx.dispose_material(material);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashSet;
    use std::rc::Rc;

    #[derive(Debug, Default)]
    pub(crate) struct Ledger {
        pub next_id: u32,
        pub live: HashSet<u32>,
        pub disposed: Vec<u32>,
        pub double_frees: u32,
        pub attached: bool,
        pub attach_calls: u32,
        pub detach_calls: u32,
        pub released: u32,
        pub resizes: Vec<(u32, u32)>,
        pub renders: u32,
        pub bound: Option<u32>,
        pub bind_calls: u32,
        pub textures_created: u32,
        pub last_texture_size: Option<(u32, u32)>,
        pub last_overlay: Option<Overlay>,
        pub next_actions: OverlayActions,
    }

    impl Ledger {
        fn acquire(&mut self) -> u32 {
            self.next_id += 1;
            self.live.insert(self.next_id);
            self.next_id
        }

        fn free(&mut self, id: u32) {
            if self.live.remove(&id) {
                self.disposed.push(id);
            } else {
                self.double_frees += 1;
            }
        }
    }

    /// Counts every acquisition and release instead of touching a GPU.
    #[derive(Clone, Default)]
    pub(crate) struct RecordingContext {
        pub ledger: Rc<RefCell<Ledger>>,
    }

    #[derive(Debug)]
    pub(crate) struct Handle(pub u32);

    impl GraphicsContext for RecordingContext {
        type Geometry = Handle;
        type Material = Handle;
        type Texture = Handle;

        fn attach(&mut self, width: u32, height: u32) -> Result<(), GpuError> {
            let mut l = self.ledger.borrow_mut();
            l.attached = true;
            l.attach_calls += 1;
            l.resizes.push((width, height));
            Ok(())
        }
        fn detach(&mut self) {
            let mut l = self.ledger.borrow_mut();
            l.attached = false;
            l.detach_calls += 1;
        }
        fn resize(&mut self, width: u32, height: u32) {
            self.ledger.borrow_mut().resizes.push((width, height));
        }
        fn max_texture_dimension(&self) -> u32 {
            8192
        }
        fn create_geometry(&mut self, _mesh: &SphereMesh) -> Handle {
            Handle(self.ledger.borrow_mut().acquire())
        }
        fn create_material(&mut self, sampler: SamplerSpec) -> Handle {
            assert_eq!(sampler, SamplerSpec::EQUIRECT);
            Handle(self.ledger.borrow_mut().acquire())
        }
        fn create_texture(&mut self, image: &RgbaImage) -> Result<Handle, TextureLoadError> {
            let mut l = self.ledger.borrow_mut();
            l.textures_created += 1;
            l.last_texture_size = Some(image.dimensions());
            Ok(Handle(l.acquire()))
        }
        fn bind_texture(&mut self, _material: &mut Handle, texture: &Handle) {
            let mut l = self.ledger.borrow_mut();
            assert!(l.live.contains(&texture.0), "binding a disposed texture");
            l.bound = Some(texture.0);
            l.bind_calls += 1;
        }
        fn unbind_texture(&mut self, _material: &mut Handle) {
            self.ledger.borrow_mut().bound = None;
        }
        fn render(
            &mut self,
            _geometry: &Handle,
            _material: &Handle,
            _camera: &CameraUniform,
            overlay: &Overlay,
        ) -> Result<OverlayActions, RenderError> {
            let mut l = self.ledger.borrow_mut();
            l.renders += 1;
            l.last_overlay = Some(overlay.clone());
            Ok(std::mem::take(&mut l.next_actions))
        }
        fn dispose_geometry(&mut self, geometry: Handle) {
            self.ledger.borrow_mut().free(geometry.0);
        }
        fn dispose_material(&mut self, material: Handle) {
            self.ledger.borrow_mut().free(material.0);
        }
        fn dispose_texture(&mut self, texture: Handle) {
            self.ledger.borrow_mut().free(texture.0);
        }
        fn release(&mut self) {
            self.ledger.borrow_mut().released += 1;
        }
    }

    fn mesh() -> SphereMesh {
        crate::mesh::build_inverted_sphere(1.0, 4, 2)
    }

    #[test]
    fn rebinding_releases_previous_texture() {
        let mut ctx = RecordingContext::default();
        let mut surface = SphericalSurface::create(&mut ctx, &mesh());
        let img = RgbaImage::new(2, 1);

        let first = ctx.create_texture(&img).unwrap();
        let first_id = first.0;
        assert!(surface.bind(&mut ctx, first));
        let second = ctx.create_texture(&img).unwrap();
        let second_id = second.0;
        assert!(surface.bind(&mut ctx, second));

        let l = ctx.ledger.borrow();
        assert_eq!(l.disposed, vec![first_id]);
        assert_eq!(l.bound, Some(second_id));
        assert_eq!(l.live.len(), 3);
    }

    #[test]
    fn dispose_is_idempotent() {
        let mut ctx = RecordingContext::default();
        let mut surface = SphericalSurface::create(&mut ctx, &mesh());
        let tex = ctx.create_texture(&RgbaImage::new(2, 1)).unwrap();
        surface.bind(&mut ctx, tex);

        surface.dispose(&mut ctx);
        surface.dispose(&mut ctx);

        let l = ctx.ledger.borrow();
        assert!(l.live.is_empty());
        assert_eq!(l.disposed.len(), 3);
        assert_eq!(l.double_frees, 0);
        assert!(surface.is_disposed());
        assert!(!surface.has_texture());
    }

    #[test]
    fn disposed_surface_refuses_binds() {
        let mut ctx = RecordingContext::default();
        let mut surface = SphericalSurface::create(&mut ctx, &mesh());
        surface.dispose(&mut ctx);

        let tex = ctx.create_texture(&RgbaImage::new(2, 1)).unwrap();
        assert!(!surface.bind(&mut ctx, tex));
        let l = ctx.ledger.borrow();
        assert!(l.live.is_empty());
        assert_eq!(l.bind_calls, 0);
    }

    #[test]
    fn disposed_surface_cannot_render() {
        let mut ctx = RecordingContext::default();
        let mut surface = SphericalSurface::create(&mut ctx, &mesh());
        surface.dispose(&mut ctx);
        let camera = CameraUniform {
            view_proj: [[0.0; 4]; 4],
        };
        assert!(surface.render(&mut ctx, &camera, &Overlay::default()).is_err());
        assert_eq!(ctx.ledger.borrow().renders, 0);
    }
}
