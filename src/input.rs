//! Keyboard and mouse state sampled once per frame.
//!
//! Window events only update the raw state (which keys are down, where the
//! cursor is). [`Controller::update`] turns that into per-key values
//! according to each key's [`KeyMode`], so every consumer in a frame sees
//! the same snapshot.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use glam::{DVec2, Vec2};
use winit::event::ElementState;
use winit::keyboard::KeyCode;

/// How a key's value evolves while it is held.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum KeyMode {
    /// 1 while held, 0 otherwise.
    #[default]
    Press,
    /// Each press flips the value; holding repeats after the cooldown.
    Toggle,
    /// A press sets 1 for the cooldown duration.
    Cooldown,
    /// A press sets 1 for a single update, then waits out the cooldown.
    Instant,
    /// Each press advances the value through `0..cycles`.
    Cycle,
}

#[derive(Clone, Copy, Debug)]
pub struct KeyState {
    pub value: u16,
    pub mode: KeyMode,
    pub cooldown: Duration,
    pub cycles: u16,
    last: Option<Instant>,
}

impl Default for KeyState {
    fn default() -> Self {
        Self {
            value: 0,
            mode: KeyMode::Press,
            cooldown: Duration::from_millis(250),
            cycles: 1,
            last: None,
        }
    }
}

impl KeyState {
    /// Time since the last transition; a key that never fired counts as
    /// cooled down.
    fn cooled_down(&self, now: Instant) -> bool {
        self.last
            .map_or(true, |last| now.saturating_duration_since(last) > self.cooldown)
    }

    fn update(&mut self, pressed: bool, now: Instant) {
        match self.mode {
            KeyMode::Press => self.value = pressed as u16,
            KeyMode::Toggle => {
                if pressed && self.cooled_down(now) {
                    self.value ^= 1;
                    self.last = Some(now);
                }
                if !pressed {
                    self.last = None;
                }
            }
            KeyMode::Cooldown => {
                if pressed && self.value == 0 {
                    self.value = 1;
                    self.last = Some(now);
                }
                if self.cooled_down(now) {
                    self.value = 0;
                }
            }
            KeyMode::Instant => {
                if self.value != 0 && !self.cooled_down(now) {
                    self.value = 0;
                }
                if pressed && self.value == 0 && self.cooled_down(now) {
                    self.value = 1;
                    self.last = Some(now);
                }
            }
            KeyMode::Cycle => {
                if pressed && self.cooled_down(now) {
                    self.value = if self.value + 1 >= self.cycles {
                        0
                    } else {
                        self.value + 1
                    };
                    self.last = Some(now);
                }
                if !pressed {
                    self.last = None;
                }
            }
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MouseState {
    pub position: DVec2,
    pub previous: DVec2,
}

impl MouseState {
    pub fn delta(&self) -> DVec2 {
        self.position - self.previous
    }
}

#[derive(Debug, Default)]
pub struct Controller {
    keys: HashMap<KeyCode, KeyState>,
    held: HashSet<KeyCode>,
    cursor: Option<DVec2>,
    mouse: MouseState,
    close_requested: bool,
}

impl Controller {
    /// Controller with the viewer's bindings: `P` toggles shadows (initially
    /// on), everything else reads as held/not held.
    pub fn new() -> Self {
        let mut controller = Self::default();
        controller.set_key_properties(KeyCode::KeyP, KeyMode::Toggle, 1, 1000, 1);
        controller
    }

    pub fn set_key_properties(
        &mut self,
        key: KeyCode,
        mode: KeyMode,
        initial: u16,
        cooldown_ms: u64,
        cycles: u16,
    ) {
        self.keys.insert(
            key,
            KeyState {
                value: initial,
                mode,
                cooldown: Duration::from_millis(cooldown_ms),
                cycles: cycles.max(1),
                last: None,
            },
        );
    }

    pub fn handle_key(&mut self, key: KeyCode, state: ElementState) {
        match state {
            ElementState::Pressed => {
                if key == KeyCode::Escape {
                    self.close_requested = true;
                }
                self.held.insert(key);
            }
            ElementState::Released => {
                self.held.remove(&key);
            }
        }
    }

    pub fn handle_cursor(&mut self, x: f64, y: f64) {
        let position = DVec2::new(x, y);
        if self.cursor.is_none() {
            // No look jump on the first event.
            self.mouse = MouseState {
                position,
                previous: position,
            };
        }
        self.cursor = Some(position);
    }

    /// Clears held keys, e.g. when the window loses focus.
    pub fn release_all(&mut self) {
        self.held.clear();
    }

    /// Advances key states and the mouse snapshot for a new frame.
    pub fn update(&mut self, now: Instant) {
        self.mouse.previous = self.mouse.position;
        if let Some(cursor) = self.cursor {
            self.mouse.position = cursor;
        }
        for (key, state) in &mut self.keys {
            state.update(self.held.contains(key), now);
        }
    }

    /// Configured keys report their mode's value; others whether they are held.
    pub fn key_value(&self, key: KeyCode) -> u16 {
        match self.keys.get(&key) {
            Some(state) => state.value,
            None => self.held.contains(&key) as u16,
        }
    }

    pub fn is_on(&self, key: KeyCode) -> bool {
        self.key_value(key) != 0
    }

    pub fn mouse(&self) -> &MouseState {
        &self.mouse
    }

    /// Cursor in [-1, 1] with Y up.
    pub fn mouse_clip_space(&self, width: u32, height: u32) -> Vec2 {
        let size = DVec2::new(width.max(1) as f64, height.max(1) as f64);
        let ndc = self.mouse.position / size * 2.0 - DVec2::ONE;
        Vec2::new(ndc.x as f32, -ndc.y as f32)
    }

    pub fn use_shadows(&self) -> bool {
        self.is_on(KeyCode::KeyP)
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn close_requested(&self) -> bool {
        self.close_requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(base: Instant, millis: u64) -> Instant {
        base + Duration::from_millis(millis)
    }

    #[test]
    fn unconfigured_keys_follow_the_held_state() {
        let mut controller = Controller::new();
        controller.handle_key(KeyCode::KeyW, ElementState::Pressed);
        controller.update(Instant::now());
        assert_eq!(controller.key_value(KeyCode::KeyW), 1);

        controller.handle_key(KeyCode::KeyW, ElementState::Released);
        controller.update(Instant::now());
        assert_eq!(controller.key_value(KeyCode::KeyW), 0);
    }

    #[test]
    fn shadow_toggle_flips_once_per_press() {
        let t0 = Instant::now();
        let mut controller = Controller::new();
        assert!(controller.use_shadows());

        controller.handle_key(KeyCode::KeyP, ElementState::Pressed);
        controller.update(t0);
        assert!(!controller.use_shadows());

        // Still held, inside the cooldown.
        controller.update(ms(t0, 500));
        assert!(!controller.use_shadows());

        controller.handle_key(KeyCode::KeyP, ElementState::Released);
        controller.update(ms(t0, 600));
        controller.handle_key(KeyCode::KeyP, ElementState::Pressed);
        controller.update(ms(t0, 650));
        assert!(controller.use_shadows());
    }

    #[test]
    fn cooldown_key_stays_on_then_expires() {
        let t0 = Instant::now();
        let mut controller = Controller::new();
        controller.set_key_properties(KeyCode::KeyC, KeyMode::Cooldown, 0, 100, 1);

        controller.handle_key(KeyCode::KeyC, ElementState::Pressed);
        controller.update(t0);
        controller.handle_key(KeyCode::KeyC, ElementState::Released);
        controller.update(ms(t0, 50));
        assert_eq!(controller.key_value(KeyCode::KeyC), 1);

        controller.update(ms(t0, 150));
        assert_eq!(controller.key_value(KeyCode::KeyC), 0);
    }

    #[test]
    fn instant_key_fires_for_one_update() {
        let t0 = Instant::now();
        let mut controller = Controller::new();
        controller.set_key_properties(KeyCode::KeyI, KeyMode::Instant, 0, 100, 1);

        controller.handle_key(KeyCode::KeyI, ElementState::Pressed);
        controller.update(t0);
        assert_eq!(controller.key_value(KeyCode::KeyI), 1);
        controller.update(ms(t0, 16));
        assert_eq!(controller.key_value(KeyCode::KeyI), 0);
        controller.update(ms(t0, 200));
        assert_eq!(controller.key_value(KeyCode::KeyI), 1);
    }

    #[test]
    fn cycle_key_wraps() {
        let t0 = Instant::now();
        let mut controller = Controller::new();
        controller.set_key_properties(KeyCode::KeyM, KeyMode::Cycle, 0, 0, 3);

        let mut seen = Vec::new();
        for i in 0..4 {
            controller.handle_key(KeyCode::KeyM, ElementState::Pressed);
            controller.update(ms(t0, i * 10));
            seen.push(controller.key_value(KeyCode::KeyM));
            controller.handle_key(KeyCode::KeyM, ElementState::Released);
            controller.update(ms(t0, i * 10 + 5));
        }
        assert_eq!(seen, [1, 2, 0, 1]);
    }

    #[test]
    fn first_cursor_event_does_not_move_the_view() {
        let mut controller = Controller::new();
        controller.handle_cursor(400.0, 300.0);
        controller.update(Instant::now());
        assert_eq!(controller.mouse().delta(), DVec2::ZERO);

        controller.handle_cursor(410.0, 290.0);
        controller.update(Instant::now());
        assert_eq!(controller.mouse().delta(), DVec2::new(10.0, -10.0));
    }

    #[test]
    fn clip_space_mouse_has_y_up() {
        let mut controller = Controller::new();
        controller.handle_cursor(0.0, 0.0);
        controller.update(Instant::now());
        assert_eq!(controller.mouse_clip_space(800, 600), Vec2::new(-1.0, 1.0));

        controller.handle_cursor(800.0, 600.0);
        controller.update(Instant::now());
        assert_eq!(controller.mouse_clip_space(800, 600), Vec2::new(1.0, -1.0));
    }

    #[test]
    fn escape_requests_close() {
        let mut controller = Controller::new();
        controller.handle_key(KeyCode::Escape, ElementState::Pressed);
        assert!(controller.close_requested());
    }
}
