// main.rs — winit host: window, event routing and session lifetime

#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod animation;
mod camera;
mod config;
mod error;
mod fonts;
mod fullscreen;
mod i18n;
mod interaction;
mod lifecycle;
mod mesh;
mod renderer;
mod session;
mod texture;
mod viewport;

use animation::FrameStep;
use clap::Parser;
use config::{display_name_for, Cli, ViewerConfig};
use error::{GpuError, RenderError, ViewerError};
use fullscreen::{BorderlessFullscreen, ExclusiveFullscreen, FullscreenBackend};
use interaction::{logical_pointer, wheel_delta_y, CursorAffordance};
use renderer::WgpuContext;
use session::ViewerSession;
use viewport::RenderTarget;

use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;

use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::*,
    event_loop::{ControlFlow, EventLoop},
    window::{CursorIcon, Window, WindowBuilder},
};

const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "webp", "tif"];

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run(cli) {
        log::error!("{}", e);
        std::process::exit(1);
    }
}

fn pick_image() -> Option<String> {
    rfd::FileDialog::new()
        .set_title(i18n::tr("dialog.open_image"))
        .add_filter(i18n::tr("file.filter.images"), &IMAGE_EXTENSIONS)
        .pick_file()
        .map(|p| p.to_string_lossy().into_owned())
}

fn cursor_icon(cursor: CursorAffordance) -> CursorIcon {
    match cursor {
        CursorAffordance::Grab => CursorIcon::Grab,
        CursorAffordance::Grabbing => CursorIcon::Grabbing,
    }
}

fn open(session: &mut ViewerSession<WgpuContext>, window: &Window, url: String) {
    let name = display_name_for(&url);
    window.set_title(&format!("{} - {}", name, i18n::tr("app.title")));
    session.set_image_url(url, name);
}

fn run(cli: Cli) -> Result<(), ViewerError> {
    let config = ViewerConfig::resolve(cli.config.as_deref())?;
    i18n::init(cli.lang.clone());

    let Some(image_url) = cli.image.clone().or_else(pick_image) else {
        log::info!("no image selected, exiting");
        return Ok(());
    };
    let display_name = cli
        .name
        .clone()
        .unwrap_or_else(|| display_name_for(&image_url));

    let event_loop = EventLoop::new();
    let window = Arc::new(
        WindowBuilder::new()
            .with_title(format!("{} - {}", display_name, i18n::tr("app.title")))
            .with_inner_size(LogicalSize::new(1280, 720))
            .build(&event_loop)
            .map_err(GpuError::from)?,
    );

    let ctx = pollster::block_on(WgpuContext::new(window.clone()))?;

    let chain: Vec<Box<dyn FullscreenBackend>> = vec![
        Box::new(BorderlessFullscreen::new(window.clone())),
        Box::new(ExclusiveFullscreen::new(window.clone())),
    ];
    let measured = window.clone();
    let measure = move || {
        let size = measured.inner_size();
        RenderTarget::from_physical(size.width, size.height, measured.scale_factor())
    };

    let mut session = ViewerSession::create(ctx, measure, image_url, display_name, &config, chain)?;
    let close_requested = Rc::new(Cell::new(false));
    {
        let flag = close_requested.clone();
        session.set_on_close(move || flag.set(true));
    }
    window.set_cursor_icon(cursor_icon(session.cursor()));

    let mut cursor_pos: Option<PhysicalPosition<f64>> = None;

    event_loop.run(move |event, _, control_flow| {
        *control_flow = ControlFlow::Poll;
        session.pump();

        match event {
            Event::WindowEvent { event, .. } => {
                let consumed = session
                    .context_mut()
                    .map(|ctx| ctx.on_window_event(&event))
                    .unwrap_or(false);

                match event {
                    WindowEvent::CloseRequested => {
                        close_requested.set(true);
                    }

                    WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                        session.observe_fullscreen();
                        let size = window.inner_size();
                        session.resize(RenderTarget::from_physical(
                            size.width,
                            size.height,
                            window.scale_factor(),
                        ));
                    }

                    // fullscreen can change without a size change
                    WindowEvent::Focused(_) => {
                        session.observe_fullscreen();
                    }

                    WindowEvent::DroppedFile(path) => {
                        open(&mut session, &window, path.to_string_lossy().into_owned());
                    }

                    WindowEvent::KeyboardInput { input, .. } if !consumed => {
                        if input.state == ElementState::Pressed {
                            match input.virtual_keycode {
                                Some(VirtualKeyCode::F11) => session.toggle_fullscreen(),
                                Some(VirtualKeyCode::Escape) => {
                                    if session.is_fullscreen() {
                                        session.toggle_fullscreen();
                                    } else {
                                        session.request_close();
                                    }
                                }
                                Some(VirtualKeyCode::O) => {
                                    if let Some(url) = pick_image() {
                                        open(&mut session, &window, url);
                                    }
                                }
                                Some(VirtualKeyCode::R) => session.reset_view(),
                                _ => {}
                            }
                        }
                    }

                    WindowEvent::MouseInput {
                        state,
                        button: MouseButton::Left,
                        ..
                    } => match state {
                        ElementState::Pressed if !consumed => {
                            if let Some(pos) = cursor_pos {
                                let (x, y) = logical_pointer(pos, window.scale_factor());
                                session.pointer_down(x, y);
                            }
                        }
                        ElementState::Released => session.pointer_up(),
                        _ => {}
                    },

                    WindowEvent::CursorMoved { position, .. } => {
                        cursor_pos = Some(position);
                        let (x, y) = logical_pointer(position, window.scale_factor());
                        session.pointer_move(x, y);
                    }

                    WindowEvent::CursorLeft { .. } => {
                        cursor_pos = None;
                        session.pointer_leave();
                    }

                    WindowEvent::MouseWheel { delta, .. } if !consumed => {
                        session.wheel(wheel_delta_y(delta, window.scale_factor()));
                    }

                    _ => {}
                }
                window.set_cursor_icon(cursor_icon(session.cursor()));
            }

            Event::RedrawRequested(_) => match session.frame() {
                Ok(FrameStep::Continue) => {}
                Ok(FrameStep::Stop) => log::debug!("frame loop stopped"),
                Err(RenderError::Surface(wgpu::SurfaceError::OutOfMemory)) => {
                    log::error!("out of GPU memory");
                    close_requested.set(true);
                }
                Err(e) => log::warn!("frame failed: {}", e),
            },

            Event::MainEventsCleared => {
                if session.is_running() {
                    window.request_redraw();
                }
            }

            _ => {}
        }

        if close_requested.get() {
            session.teardown();
            *control_flow = ControlFlow::Exit;
        }
    });
}
