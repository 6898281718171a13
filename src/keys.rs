use bistable_core::KeyEvent;
use bistable_experiment::InputSource;
use std::collections::HashMap;
use winit::keyboard::{KeyCode, PhysicalKey};

/// Collects key presses from the window and hands them to the session once released.
#[derive(Debug, Default)]
pub struct KeyQueue {
    held: HashMap<&'static str, f64>,
    released: Vec<KeyEvent>,
}

impl KeyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Auto-repeat presses keep the first press time.
    pub fn press(&mut self, name: &'static str, now: f64) {
        self.held.entry(name).or_insert(now);
    }

    pub fn release(&mut self, name: &'static str, now: f64) {
        let event = KeyEvent::new(name, now);
        self.released.push(match self.held.remove(name) {
            Some(pressed) => event.with_duration(now - pressed),
            None => event,
        });
    }
}

impl InputSource for KeyQueue {
    fn released_keys(&mut self) -> Vec<KeyEvent> {
        std::mem::take(&mut self.released)
    }
}

/// Name a physical key is known by in the settings file, e.g. `space`, `q`, `left`.
pub fn key_name(key: PhysicalKey) -> Option<&'static str> {
    let PhysicalKey::Code(code) = key else {
        return None;
    };
    let name = match code {
        KeyCode::Space => "space",
        KeyCode::Enter => "return",
        KeyCode::NumpadEnter => "enter",
        KeyCode::Escape => "escape",
        KeyCode::Backspace => "backspace",
        KeyCode::Tab => "tab",
        KeyCode::ArrowLeft => "left",
        KeyCode::ArrowRight => "right",
        KeyCode::ArrowUp => "up",
        KeyCode::ArrowDown => "down",
        KeyCode::ShiftLeft => "lshift",
        KeyCode::ShiftRight => "rshift",
        KeyCode::ControlLeft => "lctrl",
        KeyCode::ControlRight => "rctrl",
        KeyCode::KeyA => "a",
        KeyCode::KeyB => "b",
        KeyCode::KeyC => "c",
        KeyCode::KeyD => "d",
        KeyCode::KeyE => "e",
        KeyCode::KeyF => "f",
        KeyCode::KeyG => "g",
        KeyCode::KeyH => "h",
        KeyCode::KeyI => "i",
        KeyCode::KeyJ => "j",
        KeyCode::KeyK => "k",
        KeyCode::KeyL => "l",
        KeyCode::KeyM => "m",
        KeyCode::KeyN => "n",
        KeyCode::KeyO => "o",
        KeyCode::KeyP => "p",
        KeyCode::KeyQ => "q",
        KeyCode::KeyR => "r",
        KeyCode::KeyS => "s",
        KeyCode::KeyT => "t",
        KeyCode::KeyU => "u",
        KeyCode::KeyV => "v",
        KeyCode::KeyW => "w",
        KeyCode::KeyX => "x",
        KeyCode::KeyY => "y",
        KeyCode::KeyZ => "z",
        KeyCode::Digit0 => "0",
        KeyCode::Digit1 => "1",
        KeyCode::Digit2 => "2",
        KeyCode::Digit3 => "3",
        KeyCode::Digit4 => "4",
        KeyCode::Digit5 => "5",
        KeyCode::Digit6 => "6",
        KeyCode::Digit7 => "7",
        KeyCode::Digit8 => "8",
        KeyCode::Digit9 => "9",
        KeyCode::Numpad0 => "num_0",
        KeyCode::Numpad1 => "num_1",
        KeyCode::Numpad2 => "num_2",
        KeyCode::Numpad3 => "num_3",
        KeyCode::Numpad4 => "num_4",
        KeyCode::Numpad5 => "num_5",
        KeyCode::Numpad6 => "num_6",
        KeyCode::Numpad7 => "num_7",
        KeyCode::Numpad8 => "num_8",
        KeyCode::Numpad9 => "num_9",
        _ => return None,
    };
    Some(name)
}
