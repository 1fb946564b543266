use crossterm::event::{poll, read, Event, KeyCode, KeyModifiers};
use crossterm::terminal;
use log::{debug, warn};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::{Duration, Instant};

/// map the left-hand side of a qwerty keyboard onto the hex keypad:
///   1 2 3 C      1 2 3 4
///   4 5 6 D  <=  q w e r
///   7 8 9 E      a s d f
///   A 0 B F      z x c v
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); 16] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

/// terminals only tell us about presses, so a key is treated as held for
/// this long after the last press (or auto-repeat) we saw for it
const KEY_HOLD: Duration = Duration::from_millis(150);

/// presses kept for Fx0A; beyond this the oldest are dropped
const MAX_PENDING_PRESSES: usize = 16;

/// queue a press edge, forgetting the oldest once the queue is full
fn queue_press(presses: &mut VecDeque<u8>, key: u8) {
    if presses.len() >= MAX_PENDING_PRESSES {
        presses.pop_front();
    }
    presses.push_back(key);
}

/// which of the 16 keys are down, indexed by key value
pub type KeyState = [bool; 16];

/// the 16-key hex pad, as seen by the machine
pub trait Keypad {
    /// is key 0x0-0xf held down right now
    fn is_key_pressed(&mut self, key: u8) -> Result<bool, io::Error>;

    /// take the oldest key press that arrived since the last flush, if any
    fn next_key_press(&mut self) -> Result<Option<u8>, io::Error>;

    /// forget all the key presses waiting in the buffer
    fn flush_keys(&mut self) -> Result<(), io::Error>;

    /// every key's held state at once
    fn key_state(&mut self) -> Result<KeyState, io::Error> {
        let mut keys = [false; 16];
        for (key, down) in keys.iter_mut().enumerate() {
            *down = self.is_key_pressed(key as u8)?;
        }
        Ok(keys)
    }

    /// has the user asked to leave
    fn quit_requested(&mut self) -> Result<bool, io::Error> {
        Ok(false)
    }
}

/// keypad read from the terminal through crossterm, in raw mode
pub struct TermKeypad {
    keymap: HashMap<char, u8>,
    last_seen: [Option<Instant>; 16],
    presses: VecDeque<u8>,
    quit: bool,
}

impl TermKeypad {
    pub fn new() -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        Ok(TermKeypad {
            keymap: HashMap::from(CHIP8_CONVENTIONAL_KEYMAP),
            last_seen: [None; 16],
            presses: VecDeque::new(),
            quit: false,
        })
    }

    fn read_terminal(&mut self) -> Result<(), io::Error> {
        while poll(Duration::from_millis(0))? {
            match read()? {
                Event::Key(evt) => match evt.code {
                    KeyCode::Esc => self.quit = true,
                    KeyCode::Char('c') if evt.modifiers.contains(KeyModifiers::CONTROL) => {
                        self.quit = true
                    }
                    KeyCode::Char(key) => match self.keymap.get(&key.to_ascii_lowercase()) {
                        Some(&mapped_key) => {
                            self.last_seen[mapped_key as usize] = Some(Instant::now());
                            queue_press(&mut self.presses, mapped_key);
                        }
                        None => warn!("can't map {:?} to a hex key", key),
                    },
                    other => debug!("ignoring key {:?}", other),
                },
                other => debug!("ignoring event {:?}", other),
            }
        }
        Ok(())
    }
}

impl Drop for TermKeypad {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

impl Keypad for TermKeypad {
    fn is_key_pressed(&mut self, key: u8) -> Result<bool, io::Error> {
        self.read_terminal()?;
        Ok(self.last_seen[(key & 0x0f) as usize].is_some_and(|t| t.elapsed() < KEY_HOLD))
    }

    fn next_key_press(&mut self) -> Result<Option<u8>, io::Error> {
        self.read_terminal()?;
        Ok(self.presses.pop_front())
    }

    fn flush_keys(&mut self) -> Result<(), io::Error> {
        self.read_terminal()?;
        self.presses.clear();
        Ok(())
    }

    fn quit_requested(&mut self) -> Result<bool, io::Error> {
        self.read_terminal()?;
        Ok(self.quit)
    }
}

/// dummy Keypad implementation for testing: a fixed set of held keys plus a
/// queue of presses still to be delivered
#[derive(Default)]
pub struct DummyKeypad {
    held: Vec<u8>,
    presses: VecDeque<u8>,
}

impl DummyKeypad {
    pub fn new(held: &[u8]) -> Self {
        DummyKeypad {
            held: Vec::from(held),
            presses: VecDeque::new(),
        }
    }

    /// queue a key press edge
    pub fn press(&mut self, key: u8) {
        self.presses.push_back(key);
    }
}

impl Keypad for DummyKeypad {
    fn is_key_pressed(&mut self, key: u8) -> Result<bool, io::Error> {
        Ok(self.held.contains(&key))
    }

    fn next_key_press(&mut self) -> Result<Option<u8>, io::Error> {
        Ok(self.presses.pop_front())
    }

    fn flush_keys(&mut self) -> Result<(), io::Error> {
        self.presses.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keymap_covers_every_key() {
        let mut keys = CHIP8_CONVENTIONAL_KEYMAP
            .iter()
            .map(|(_, k)| *k)
            .collect::<Vec<_>>();
        keys.sort_unstable();
        assert_eq!(keys, (0..16).collect::<Vec<u8>>());
    }

    #[test]
    fn test_press_queue_is_bounded() {
        let mut presses = VecDeque::new();
        for i in 0..1000 {
            queue_press(&mut presses, (i % 16) as u8);
        }
        assert_eq!(presses.len(), MAX_PENDING_PRESSES);
        // the most recent presses survive, oldest first: 984..1000 mod 16
        assert_eq!(presses.front(), Some(&0x8));
        assert_eq!(presses.back(), Some(&0x7));
    }

    #[test]
    fn test_dummy_keypad() -> Result<(), io::Error> {
        let mut k = DummyKeypad::new(&[0x5]);
        assert!(k.is_key_pressed(0x5)?);
        assert!(!k.is_key_pressed(0x6)?);
        let state = k.key_state()?;
        assert_eq!(state.iter().filter(|d| **d).count(), 1);
        assert!(state[0x5]);
        k.press(0xa);
        k.press(0xb);
        assert_eq!(k.next_key_press()?, Some(0xa));
        k.flush_keys()?;
        assert_eq!(k.next_key_press()?, None);
        assert!(!k.quit_requested()?);
        Ok(())
    }
}
