// animation.rs — per-frame driver: idle rotation, camera sync, render, reschedule

use crate::camera::{CameraUniform, PerspectiveCamera};
use crate::interaction::InteractionController;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Running,
    Stopped,
}

/// Whether the host should request another frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStep {
    Continue,
    Stop,
}

/// Running → Stopped, one way. A stopped loop never produces another frame.
#[derive(Debug)]
pub struct AnimationLoop {
    state: LoopState,
    auto_rotate_speed: f32,
    frames: u64,
}

impl AnimationLoop {
    pub fn new(auto_rotate_speed: f32) -> Self {
        Self {
            state: LoopState::Running,
            auto_rotate_speed,
            frames: 0,
        }
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == LoopState::Running
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn stop(&mut self) {
        if self.state == LoopState::Running {
            log::debug!("animation loop stopped after {} frames", self.frames);
        }
        self.state = LoopState::Stopped;
    }

    /// Steps 1 and 2 of a frame: idle rotation, then copy state into the camera.
    /// Returns the uniform to render with, or `None` once stopped.
    pub fn advance(
        &mut self,
        controller: &mut InteractionController,
        camera: &mut PerspectiveCamera,
    ) -> Option<CameraUniform> {
        if self.state == LoopState::Stopped {
            return None;
        }

        let (interaction, state) = controller.frame_view();
        if !interaction.is_pointer_down {
            state.add_yaw(self.auto_rotate_speed);
        }
        camera.apply(state);
        self.frames += 1;
        Some(camera.uniform())
    }

    /// Step 4: decide whether another frame is scheduled.
    pub fn next_step(&self) -> FrameStep {
        match self.state {
            LoopState::Running => FrameStep::Continue,
            LoopState::Stopped => FrameStep::Stop,
        }
    }
}
