//! Keyboard bindings for the viewer.

use glam::Vec3;
use winit::keyboard::KeyCode;

use crate::plot::catalog::CycleDirection;

/// Base flight speed in world units per second.
pub const MOVE_SPEED: f32 = 10.0;
/// Multiplier while Shift is held.
pub const BOOST_FACTOR: f32 = 1.7;

/// One-shot actions triggered by a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerCommand {
    Quit,
    SetLookEnabled(bool),
    ToggleMovementOnly,
    DoubleRadius,
    HalveRadius,
    SwitchDataset(CycleDirection),
}

impl ViewerCommand {
    pub fn for_key(key: KeyCode) -> Option<Self> {
        let command = match key {
            KeyCode::Escape => Self::Quit,
            KeyCode::Backspace => Self::SetLookEnabled(false),
            KeyCode::Enter | KeyCode::NumpadEnter => Self::SetLookEnabled(true),
            KeyCode::F1 => Self::ToggleMovementOnly,
            KeyCode::ArrowUp => Self::DoubleRadius,
            KeyCode::ArrowDown => Self::HalveRadius,
            KeyCode::ArrowLeft => Self::SwitchDataset(CycleDirection::Previous),
            KeyCode::ArrowRight => Self::SwitchDataset(CycleDirection::Next),
            _ => return None,
        };
        Some(command)
    }

    /// Commands that change the plot; movement-only mode locks these out.
    fn changes_plot(&self) -> bool {
        matches!(
            self,
            Self::DoubleRadius | Self::HalveRadius | Self::SwitchDataset(_)
        )
    }
}

/// Look and movement-only toggles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputState {
    look_enabled: bool,
    movement_only: bool,
}

impl Default for InputState {
    fn default() -> Self {
        Self {
            look_enabled: false,
            movement_only: false,
        }
    }
}

impl InputState {
    pub fn look_enabled(&self) -> bool {
        self.look_enabled
    }

    pub fn set_look_enabled(&mut self, enabled: bool) {
        self.look_enabled = enabled;
    }

    pub fn movement_only(&self) -> bool {
        self.movement_only
    }

    pub fn set_movement_only(&mut self, movement_only: bool) {
        self.movement_only = movement_only;
    }

    /// Maps a pressed key to a command, dropping anything that movement-only
    /// mode suppresses. Look and movement-only toggles are applied here; the
    /// caller handles the rest.
    pub fn press(&mut self, key: KeyCode) -> Option<ViewerCommand> {
        let command = ViewerCommand::for_key(key)?;
        if self.movement_only && command.changes_plot() {
            return None;
        }
        match command {
            ViewerCommand::SetLookEnabled(enabled) => self.set_look_enabled(enabled),
            ViewerCommand::ToggleMovementOnly => self.set_movement_only(!self.movement_only),
            _ => {}
        }
        Some(command)
    }
}

/// Held movement keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MovementKeys {
    forward: bool,
    back: bool,
    left: bool,
    right: bool,
    up: bool,
    down: bool,
    boost: bool,
}

impl MovementKeys {
    /// Records a key transition. Returns `false` for keys that are not
    /// movement keys.
    pub fn set(&mut self, key: KeyCode, pressed: bool) -> bool {
        let slot = match key {
            KeyCode::KeyW => &mut self.forward,
            KeyCode::KeyS => &mut self.back,
            KeyCode::KeyA => &mut self.left,
            KeyCode::KeyD => &mut self.right,
            KeyCode::Space => &mut self.up,
            KeyCode::KeyZ => &mut self.down,
            KeyCode::ShiftLeft | KeyCode::ShiftRight => &mut self.boost,
            _ => return false,
        };
        *slot = pressed;
        true
    }

    /// Camera-local velocity: x right, y up, z forward. Vertical motion runs
    /// at half speed.
    pub fn velocity(&self) -> Vec3 {
        let axis = |positive: bool, negative: bool| positive as i32 as f32 - negative as i32 as f32;
        let speed = if self.boost {
            MOVE_SPEED * BOOST_FACTOR
        } else {
            MOVE_SPEED
        };
        Vec3::new(
            axis(self.right, self.left),
            0.5 * axis(self.up, self.down),
            axis(self.forward, self.back),
        ) * speed
    }

    pub fn is_idle(&self) -> bool {
        !(self.forward || self.back || self.left || self.right || self.up || self.down)
    }
}
