//! Input bridge: host joypad state folded into the engine's button bitmask.

use crate::engine::JoypadState;
use crate::host::{Button, Host};

/// Engine-side bit for each of the eight fixed buttons.
const BUTTON_MAP: [(Button, u8); 8] = [
    (Button::A, JoypadState::A),
    (Button::B, JoypadState::B),
    (Button::Select, JoypadState::SELECT),
    (Button::Start, JoypadState::START),
    (Button::Right, JoypadState::RIGHT),
    (Button::Left, JoypadState::LEFT),
    (Button::Up, JoypadState::UP),
    (Button::Down, JoypadState::DOWN),
];

/// Latch the joypad for one frame: exactly one poll, then one state query
/// per button. Queries are only valid immediately after the poll, so the
/// ordering here is part of the host contract.
pub fn poll_joypad(host: &mut impl Host) -> JoypadState {
    host.poll_input();

    let mut bits = 0u8;
    for (button, bit) in BUTTON_MAP {
        if host.button_pressed(button) {
            bits |= bit;
        }
    }
    JoypadState(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    enum Event {
        Poll,
        Query(Button),
    }

    #[derive(Default)]
    struct FakeHost {
        held: Vec<Button>,
        events: Vec<Event>,
    }

    impl Host for FakeHost {
        fn poll_input(&mut self) {
            self.events.push(Event::Poll);
        }

        fn button_pressed(&mut self, button: Button) -> bool {
            self.events.push(Event::Query(button));
            self.held.contains(&button)
        }

        fn deliver_frame(&mut self, _frame: Option<&[u16]>) {}

        fn deliver_audio(&mut self, _samples: &[i16]) {}
    }

    #[test]
    fn a_alone_sets_exactly_the_a_bit() {
        let mut host = FakeHost {
            held: vec![Button::A],
            ..FakeHost::default()
        };
        assert_eq!(poll_joypad(&mut host).bits(), JoypadState::A);
    }

    #[test]
    fn each_button_maps_to_its_own_bit() {
        for (button, bit) in BUTTON_MAP {
            let mut host = FakeHost {
                held: vec![button],
                ..FakeHost::default()
            };
            assert_eq!(poll_joypad(&mut host).bits(), bit, "{button:?}");
        }
    }

    #[test]
    fn combined_buttons_or_together() {
        let mut host = FakeHost {
            held: vec![Button::Start, Button::Left],
            ..FakeHost::default()
        };
        assert_eq!(
            poll_joypad(&mut host).bits(),
            JoypadState::START | JoypadState::LEFT
        );
    }

    #[test]
    fn polls_once_and_before_any_query() {
        let mut host = FakeHost::default();
        poll_joypad(&mut host);

        let polls = host.events.iter().filter(|e| **e == Event::Poll).count();
        assert_eq!(polls, 1, "exactly one poll per latch");
        assert_eq!(host.events[0], Event::Poll, "poll must precede queries");
        assert_eq!(host.events.len(), 1 + BUTTON_MAP.len());
    }
}
