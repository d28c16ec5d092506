// error.rs — error taxonomy for the viewer

use thiserror::Error;

/// Top-level failure surfaced to the host. Everything else is handled inside the session.
#[derive(Error, Debug)]
pub enum ViewerError {
    #[error(transparent)]
    Mount(#[from] MountError),

    #[error(transparent)]
    Gpu(#[from] GpuError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum MountError {
    #[error("host surface has zero size ({width}x{height})")]
    ZeroSize { width: f64, height: f64 },
}

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("failed to create window: {0}")]
    Window(#[from] winit::error::OsError),

    #[error("failed to create GPU surface: {0}")]
    SurfaceCreation(#[from] wgpu::CreateSurfaceError),

    #[error("no compatible GPU adapter found")]
    NoAdapter,

    #[error("failed to create GPU device: {0}")]
    DeviceCreation(#[from] wgpu::RequestDeviceError),

    #[error("rendering surface is detached")]
    Detached,
}

/// Image fetch/decode/upload failure. The `Display` text is what the overlay shows.
#[derive(Error, Debug)]
pub enum TextureLoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("request for {url} failed: {message}")]
    Http { url: String, message: String },

    #[error("malformed data URL: {0}")]
    DataUrl(String),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),

    #[error("cannot upload texture: {0}")]
    Upload(String),
}

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),

    #[error(transparent)]
    Gpu(#[from] GpuError),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}
