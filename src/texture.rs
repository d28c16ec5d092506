// texture.rs — background image fetch/decode and equirectangular preparation
//
// A load runs on its own thread and reports back through the session channel.
// Each request carries the generation it was issued under; the session drops
// any result whose generation is no longer current.

use crate::error::TextureLoadError;
use crate::session::SessionMessage;
use base64::Engine;
use image::{GenericImage, Rgba, RgbaImage};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::sync::mpsc::Sender;
use std::thread;

/// Largest HTTP body accepted for a panorama.
const MAX_DOWNLOAD_BYTES: u64 = 256 * 1024 * 1024;

/// Fetch, decode and fit to `max_dimension` on a background thread, so the
/// event thread only uploads. The send fails silently if the session (and its
/// receiver) is already gone.
pub fn spawn_load(url: String, generation: u64, max_dimension: u32, tx: Sender<SessionMessage>) {
    thread::spawn(move || {
        log::info!("loading {} (generation {})", short_url(&url), generation);
        let result = fetch_image(&url).map(|img| {
            log::info!("decoded {}x{} image", img.width(), img.height());
            prepare_equirect(img, max_dimension)
        });
        if let Err(e) = &result {
            log::warn!("load of {} failed: {}", short_url(&url), e);
        }
        if tx
            .send(SessionMessage::TextureLoaded {
                generation,
                url,
                result,
            })
            .is_err()
        {
            log::debug!("session gone before load of generation {} finished", generation);
        }
    });
}

pub fn fetch_image(url: &str) -> Result<RgbaImage, TextureLoadError> {
    let bytes = fetch_bytes(url)?;
    decode(&bytes)
}

fn fetch_bytes(url: &str) -> Result<Vec<u8>, TextureLoadError> {
    if let Some(rest) = url.strip_prefix("data:") {
        return decode_data_url(rest);
    }
    if url.starts_with("http://") || url.starts_with("https://") {
        return fetch_http(url);
    }
    if let Some(path) = url.strip_prefix("file://") {
        return read_file(Path::new(path));
    }
    if let Some((scheme, _)) = url.split_once("://") {
        return Err(TextureLoadError::UnsupportedScheme(scheme.to_string()));
    }
    read_file(Path::new(url))
}

fn read_file(path: &Path) -> Result<Vec<u8>, TextureLoadError> {
    let io_err = |source| TextureLoadError::Io {
        path: path.display().to_string(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(io_err)?);
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).map_err(io_err)?;
    Ok(bytes)
}

fn fetch_http(url: &str) -> Result<Vec<u8>, TextureLoadError> {
    let http_err = |e: ureq::Error| TextureLoadError::Http {
        url: url.to_string(),
        message: e.to_string(),
    };
    let mut response = ureq::get(url).call().map_err(http_err)?;
    response
        .body_mut()
        .with_config()
        .limit(MAX_DOWNLOAD_BYTES)
        .read_to_vec()
        .map_err(http_err)
}

/// `data:[<mediatype>][;base64],<payload>` with the `data:` prefix already removed.
fn decode_data_url(rest: &str) -> Result<Vec<u8>, TextureLoadError> {
    let (meta, payload) = rest
        .split_once(',')
        .ok_or_else(|| TextureLoadError::DataUrl("missing ','".to_string()))?;

    if meta.split(';').any(|p| p.eq_ignore_ascii_case("base64")) {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| TextureLoadError::DataUrl(e.to_string()))
    } else {
        Ok(payload.as_bytes().to_vec())
    }
}

fn decode(bytes: &[u8]) -> Result<RgbaImage, TextureLoadError> {
    let mut reader = image::io::Reader::new(std::io::Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TextureLoadError::Decode(image::ImageError::IoError(e)))?;
    reader.no_limits();
    Ok(reader.decode()?.to_rgba8())
}

/// Fit an image to the GPU limit and pad it to 2:1 so it maps onto the full sphere.
///
/// Images shorter than half their width are placed at the bottom of a black
/// canvas; the top of the sphere stays dark.
pub fn prepare_equirect(img: RgbaImage, max_dimension: u32) -> RgbaImage {
    let (src_w, src_h) = img.dimensions();

    let img = if src_w > max_dimension || src_h > max_dimension {
        let scale = max_dimension as f32 / src_w.max(src_h) as f32;
        let new_w = ((src_w as f32 * scale) as u32).clamp(1, max_dimension);
        let new_h = ((src_h as f32 * scale) as u32).clamp(1, max_dimension);
        log::warn!(
            "image {}x{} exceeds GPU limit {}, scaled to {}x{}",
            src_w,
            src_h,
            max_dimension,
            new_w,
            new_h
        );
        image::imageops::resize(&img, new_w, new_h, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    let (w, h) = img.dimensions();
    let target_h = w / 2;
    if target_h == 0 || h >= target_h {
        return img;
    }

    let mut canvas = RgbaImage::from_pixel(w, target_h, Rgba([0, 0, 0, 255]));
    // bounds hold: img.width() == w and h < target_h
    if let Err(e) = canvas.copy_from(&img, 0, target_h - h) {
        log::warn!("padding to 2:1 failed: {}", e);
        return img;
    }
    canvas
}

pub fn short_url(url: &str) -> &str {
    if url.starts_with("data:") {
        url.split_once(',').map(|(m, _)| m).unwrap_or("data:")
    } else {
        url
    }
}
