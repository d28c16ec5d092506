// fullscreen.rs — fullscreen toggle with a fallback chain of platform modes
//
// Backends are tried in order: borderless first, then exclusive video mode.
// With no usable backend the toggle is a no-op. The mirrored `is_fullscreen`
// only changes when the platform reports it, after which a settle timer asks
// the session to re-measure the host.

use crate::session::SessionMessage;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use winit::window::{Fullscreen, Window};

pub trait FullscreenBackend {
    fn name(&self) -> &'static str;
    fn is_supported(&self) -> bool;
    /// Ask the platform to enter fullscreen. `false` means this variant failed.
    fn request(&self) -> bool;
    fn exit(&self);
    /// What the platform currently reports for this variant.
    fn is_active(&self) -> bool;
}

pub struct BorderlessFullscreen {
    window: Arc<Window>,
}

impl BorderlessFullscreen {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }
}

impl FullscreenBackend for BorderlessFullscreen {
    fn name(&self) -> &'static str {
        "borderless"
    }

    fn is_supported(&self) -> bool {
        self.window.current_monitor().is_some()
    }

    fn request(&self) -> bool {
        if !self.is_supported() {
            return false;
        }
        self.window
            .set_fullscreen(Some(Fullscreen::Borderless(self.window.current_monitor())));
        true
    }

    fn exit(&self) {
        self.window.set_fullscreen(None);
    }

    fn is_active(&self) -> bool {
        matches!(self.window.fullscreen(), Some(Fullscreen::Borderless(_)))
    }
}

pub struct ExclusiveFullscreen {
    window: Arc<Window>,
}

impl ExclusiveFullscreen {
    pub fn new(window: Arc<Window>) -> Self {
        Self { window }
    }

    fn best_mode(&self) -> Option<winit::monitor::VideoMode> {
        self.window.current_monitor()?.video_modes().max_by_key(|m| {
            let size = m.size();
            (size.width * size.height, m.refresh_rate_millihertz())
        })
    }
}

impl FullscreenBackend for ExclusiveFullscreen {
    fn name(&self) -> &'static str {
        "exclusive"
    }

    fn is_supported(&self) -> bool {
        self.best_mode().is_some()
    }

    fn request(&self) -> bool {
        match self.best_mode() {
            Some(mode) => {
                self.window.set_fullscreen(Some(Fullscreen::Exclusive(mode)));
                true
            }
            None => false,
        }
    }

    fn exit(&self) {
        self.window.set_fullscreen(None);
    }

    fn is_active(&self) -> bool {
        matches!(self.window.fullscreen(), Some(Fullscreen::Exclusive(_)))
    }
}

pub struct FullscreenSynchronizer {
    chain: Vec<Box<dyn FullscreenBackend>>,
    is_fullscreen: bool,
    settle_delay: Duration,
    tx: Sender<SessionMessage>,
}

impl FullscreenSynchronizer {
    pub fn new(
        chain: Vec<Box<dyn FullscreenBackend>>,
        settle_delay: Duration,
        tx: Sender<SessionMessage>,
    ) -> Self {
        let mut sync = Self {
            chain,
            is_fullscreen: false,
            settle_delay,
            tx,
        };
        sync.is_fullscreen = sync.platform_state();
        sync
    }

    pub fn is_fullscreen(&self) -> bool {
        self.is_fullscreen
    }

    pub fn is_available(&self) -> bool {
        self.chain.iter().any(|b| b.is_supported())
    }

    fn platform_state(&self) -> bool {
        self.chain.iter().any(|b| b.is_active())
    }

    /// Enter or leave fullscreen. The mirrored flag is only updated by `observe`.
    pub fn toggle(&mut self) {
        if self.platform_state() {
            if let Some(active) = self.chain.iter().find(|b| b.is_active()) {
                log::info!("leaving {} fullscreen", active.name());
                active.exit();
            }
            return;
        }

        for backend in &self.chain {
            if !backend.is_supported() {
                log::debug!("{} fullscreen unsupported, trying next", backend.name());
                continue;
            }
            if backend.request() {
                log::info!("requested {} fullscreen", backend.name());
                return;
            }
            log::debug!("{} fullscreen request failed, trying next", backend.name());
        }
        log::debug!("fullscreen unavailable");
    }

    /// Mirror the platform state. On change, start the settle timer and return true.
    pub fn observe(&mut self) -> bool {
        let actual = self.platform_state();
        if actual == self.is_fullscreen {
            return false;
        }
        log::info!("fullscreen {}", if actual { "entered" } else { "left" });
        self.is_fullscreen = actual;
        spawn_settle_timer(self.settle_delay, self.tx.clone());
        true
    }
}

/// Fire-and-forget: sleeps, then notifies. The receiver checks liveness.
pub fn spawn_settle_timer(delay: Duration, tx: Sender<SessionMessage>) {
    thread::spawn(move || {
        thread::sleep(delay);
        let _ = tx.send(SessionMessage::SettleElapsed);
    });
}
