//! The fixed-rate driver. Each tick runs a batch of instructions, counts the
//! timers down, switches the tone on or off and presents the frame:
//!
//! ```text
//!  main loop
//!   |-- poll(now): has a whole tick interval gone by since the last tick?
//!   |    `-- tick()
//!   |         |-- deliver a key press to a pending Fx0A
//!   |         |-- steps_per_tick x interpreter.step()
//!   |         |-- tick timers (unless paused)
//!   |         |-- sound on/off from the sound timer
//!   |         `-- display.draw(frame)
//!   `-- sleep until the next tick is due
//! ```
use crate::display::{Display, FrameBuffer};
use crate::error::Error;
use crate::input::Keypad;
use crate::interpreter::Interpreter;
use crate::machine::Machine;
use crate::sound::Sound;
use log::{debug, error, info, warn};
use std::io;
use std::time::{Duration, Instant};

/// knobs for a session
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    /// ticks per second; timers count down and frames are drawn at this rate
    pub tick_rate: u32,
    /// instructions executed per tick
    pub steps_per_tick: usize,
    /// pitch of the tone played while the sound timer runs
    pub tone_hz: u16,
    /// presentation scale, screen units per pixel
    pub scale: usize,
    /// leave 8xyE's flag as the raw masked high bit
    pub shift_left_raw_flag: bool,
    /// stop on words that name no operation instead of stepping over them
    pub strict_decode: bool,
    /// seed for the random number instruction
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            tick_rate: 60,
            steps_per_tick: 10,
            tone_hz: 440,
            scale: 1,
            shift_left_raw_flag: false,
            strict_decode: false,
            seed: None,
        }
    }
}

impl Config {
    /// time between ticks
    pub fn interval(&self) -> Duration {
        Duration::from_secs(1) / self.tick_rate.max(1)
    }
}

/// One emulated session: owns the machine and its frame buffer, borrows the
/// outside world's screen, keys and speaker.
pub struct Emulator<'a> {
    config: Config,
    interval: Duration,
    machine: Machine,
    frame: FrameBuffer,
    interpreter: Interpreter,
    display: &'a mut dyn Display,
    keypad: &'a mut dyn Keypad,
    sound: &'a mut dyn Sound,
    last_tick: Option<Instant>,
    ticks: u64,
    loaded: bool,
}

impl<'a> Emulator<'a> {
    pub fn new(
        config: Config,
        display: &'a mut dyn Display,
        keypad: &'a mut dyn Keypad,
        sound: &'a mut dyn Sound,
    ) -> Self {
        debug!("{:?}", config);
        let interpreter = Interpreter::new(config.seed)
            .shift_left_raw_flag(config.shift_left_raw_flag)
            .strict_decode(config.strict_decode);
        Emulator {
            interval: config.interval(),
            config,
            machine: Machine::new(),
            frame: FrameBuffer::default(),
            interpreter,
            display,
            keypad,
            sound,
            last_tick: None,
            ticks: 0,
            loaded: false,
        }
    }

    /// load a chip8 program
    pub fn load_program(&mut self, reader: &mut impl io::Read) -> Result<usize, Error> {
        let len = self.machine.load_program(reader)?;
        self.loaded = true;
        Ok(len)
    }

    /// load a chip8 program from bytes in hand
    pub fn load_bytes(&mut self, image: &[u8]) -> Result<usize, Error> {
        let len = self.machine.load_bytes(image)?;
        self.loaded = true;
        Ok(len)
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn frame(&self) -> &FrameBuffer {
        &self.frame
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// One tick, right now: the instruction batch, timers, sound, frame. A
    /// machine error stops the batch and comes straight back.
    pub fn tick(&mut self) -> Result<(), Error> {
        if self.machine.is_paused() {
            if let Some(key) = self.keypad.next_key_press()? {
                self.machine.key_pressed(key);
            }
        }

        let keys = self.keypad.key_state()?;
        for _ in 0..self.config.steps_per_tick {
            let was_paused = self.machine.is_paused();
            self.interpreter
                .step(&mut self.machine, &mut self.frame, &keys)?;
            if !was_paused && self.machine.is_paused() {
                // only presses from here on can answer the wait
                self.keypad.flush_keys()?;
            }
        }

        if !self.machine.is_paused() {
            self.machine.tick_timers();
        }

        if self.machine.is_sound_active() {
            self.sound.play(self.config.tone_hz)?;
        } else {
            self.sound.stop()?;
        }

        self.display.draw(&self.frame)?;
        self.ticks += 1;
        Ok(())
    }

    /// Tick if more than one interval has passed since the last tick. The
    /// last tick time is then moved to `now` less the leftover part of an
    /// interval, so late ticks don't push every later one back. The first
    /// poll only starts the clock.
    pub fn poll(&mut self, now: Instant) -> Result<bool, Error> {
        let last = *self.last_tick.get_or_insert(now);
        let elapsed = now.saturating_duration_since(last);
        if elapsed <= self.interval {
            return Ok(false);
        }

        self.tick()?;
        let leftover = elapsed
            .as_nanos()
            .checked_rem(self.interval.as_nanos())
            .unwrap_or(0);
        let excess = Duration::from_nanos(leftover as u64);
        self.last_tick = Some(now.checked_sub(excess).unwrap_or(now));
        Ok(true)
    }

    /// when the next tick falls due
    pub fn next_deadline(&self) -> Option<Instant> {
        self.last_tick.map(|t| t + self.interval)
    }

    /// Run until the keypad asks to quit, `max_ticks` ticks have run, or the
    /// program fails. Nothing runs if no program was loaded.
    pub fn run(&mut self, max_ticks: Option<u64>) -> Result<(), Error> {
        if !self.loaded {
            warn!("no program loaded, nothing to run");
            return Ok(());
        }

        info!(
            "running at {} ticks/s, {} steps per tick",
            self.config.tick_rate, self.config.steps_per_tick
        );
        self.last_tick = Some(Instant::now());
        loop {
            if self.keypad.quit_requested()? {
                info!("quit after {} ticks", self.ticks);
                break;
            }
            if max_ticks.is_some_and(|max| self.ticks >= max) {
                break;
            }

            if let Err(e) = self.poll(Instant::now()) {
                error!(
                    "stopped at {:#05x} after {} instructions: {}",
                    self.machine.pc, self.machine.cycles, e
                );
                let _ = self.sound.stop();
                return Err(e);
            }

            if let Some(deadline) = self.next_deadline() {
                let now = Instant::now();
                if deadline > now {
                    spin_sleep::sleep(deadline - now);
                }
            }
        }
        self.sound.stop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::DummyDisplay;
    use crate::error::MachineError;
    use crate::input::DummyKeypad;
    use crate::sound::Mute;
    use std::collections::VecDeque;

    fn devices() -> (DummyDisplay, DummyKeypad, Mute) {
        (DummyDisplay::new(), DummyKeypad::new(&[]), Mute::new())
    }

    /// presses queued before the first flush are stale; `late` ones only show
    /// up once the keypad has been flushed
    struct LateKeypad {
        early: VecDeque<u8>,
        late: VecDeque<u8>,
        flushed: bool,
    }

    impl Keypad for LateKeypad {
        fn is_key_pressed(&mut self, _key: u8) -> Result<bool, io::Error> {
            Ok(false)
        }

        fn next_key_press(&mut self) -> Result<Option<u8>, io::Error> {
            Ok(if self.flushed {
                self.late.pop_front()
            } else {
                self.early.pop_front()
            })
        }

        fn flush_keys(&mut self) -> Result<(), io::Error> {
            self.early.clear();
            self.flushed = true;
            Ok(())
        }
    }

    #[test]
    fn test_batch_size() -> Result<(), Error> {
        let (mut display, mut keypad, mut sound) = devices();
        {
            let mut emu = Emulator::new(Config::default(), &mut display, &mut keypad, &mut sound);
            emu.load_bytes(&[0x12, 0x00])?; // JP 0x200, forever
            for _ in 0..7 {
                emu.tick()?;
            }
            assert_eq!(emu.machine().cycles, 70);
            assert_eq!(emu.ticks(), 7);
        }
        assert_eq!(display.frames, 7);
        Ok(())
    }

    #[test]
    fn test_custom_batch_size() -> Result<(), Error> {
        let (mut display, mut keypad, mut sound) = devices();
        let config = Config {
            steps_per_tick: 3,
            ..Config::default()
        };
        let mut emu = Emulator::new(config, &mut display, &mut keypad, &mut sound);
        emu.load_bytes(&[0x12, 0x00])?;
        for _ in 0..4 {
            emu.tick()?;
        }
        assert_eq!(emu.machine().cycles, 12);
        Ok(())
    }

    #[test]
    fn test_sound_follows_timer() -> Result<(), Error> {
        let (mut display, mut keypad, mut sound) = devices();
        {
            // V0 = 2; LD ST,V0; LD DT,V0; JP 0x206
            let mut emu = Emulator::new(Config::default(), &mut display, &mut keypad, &mut sound);
            emu.load_bytes(&[0x60, 0x02, 0xf0, 0x18, 0xf0, 0x15, 0x12, 0x06])?;
            emu.tick()?;
            assert_eq!(emu.machine().sound_timer, 1);
            assert_eq!(emu.machine().delay_timer, 1);
        }
        assert_eq!(sound.playing, Some(440));
        Ok(())
    }

    #[test]
    fn test_sound_stops_when_timer_runs_out() -> Result<(), Error> {
        let (mut display, mut keypad, mut sound) = devices();
        {
            let mut emu = Emulator::new(Config::default(), &mut display, &mut keypad, &mut sound);
            emu.load_bytes(&[0x60, 0x02, 0xf0, 0x18, 0x12, 0x04])?;
            for _ in 0..5 {
                emu.tick()?;
            }
            assert_eq!(emu.machine().sound_timer, 0);
        }
        assert_eq!(sound.playing, None);
        Ok(())
    }

    #[test]
    fn test_wait_for_key_pauses_timers() -> Result<(), Error> {
        let mut display = DummyDisplay::new();
        let mut keypad = LateKeypad {
            early: VecDeque::from([0x1]),
            late: VecDeque::new(),
            flushed: false,
        };
        let mut sound = Mute::new();
        let mut emu = Emulator::new(Config::default(), &mut display, &mut keypad, &mut sound);
        // V0 = 5; LD DT,V0; LD V3,K; V4 = 1; JP 0x208
        emu.load_bytes(&[0x60, 0x05, 0xf0, 0x15, 0xf3, 0x0a, 0x64, 0x01, 0x12, 0x08])?;

        emu.tick()?;
        assert!(emu.machine().is_paused());
        assert_eq!(emu.machine().cycles, 3);
        assert_eq!(emu.machine().delay_timer, 5);

        // the press from before the wait was thrown away
        emu.tick()?;
        assert!(emu.machine().is_paused());
        assert_eq!(emu.machine().delay_timer, 5);
        Ok(())
    }

    #[test]
    fn test_key_press_resumes() -> Result<(), Error> {
        let mut display = DummyDisplay::new();
        let mut keypad = LateKeypad {
            early: VecDeque::from([0x1]),
            late: VecDeque::from([0xe]),
            flushed: false,
        };
        let mut sound = Mute::new();
        let mut emu = Emulator::new(Config::default(), &mut display, &mut keypad, &mut sound);
        emu.load_bytes(&[0xf3, 0x0a, 0x64, 0x01, 0x12, 0x04])?;

        emu.tick()?;
        assert!(emu.machine().is_paused());
        emu.tick()?;
        assert!(!emu.machine().is_paused());
        assert_eq!(emu.machine().v[3], 0xe);
        assert_eq!(emu.machine().v[4], 1);
        Ok(())
    }

    #[test]
    fn test_machine_error_stops_tick() -> Result<(), Error> {
        let (mut display, mut keypad, mut sound) = devices();
        let mut emu = Emulator::new(Config::default(), &mut display, &mut keypad, &mut sound);
        emu.load_bytes(&[0x00, 0xee])?;
        assert!(matches!(
            emu.tick(),
            Err(Error::Machine(MachineError::StackUnderflow { addr: 0x200 }))
        ));
        assert_eq!(emu.ticks(), 0);
        Ok(())
    }

    #[test]
    fn test_poll_keeps_to_the_interval() -> Result<(), Error> {
        let (mut display, mut keypad, mut sound) = devices();
        let mut emu = Emulator::new(Config::default(), &mut display, &mut keypad, &mut sound);
        emu.load_bytes(&[0x12, 0x00])?;
        let ms = Duration::from_millis;
        let t0 = Instant::now();

        assert!(!emu.poll(t0)?);
        assert!(!emu.poll(t0 + ms(10))?);
        assert!(emu.poll(t0 + ms(17))?);
        assert!(!emu.poll(t0 + ms(20))?);
        // re-based to one interval after t0, not to t0 + 17ms
        assert_eq!(emu.next_deadline(), Some(t0 + emu.config().interval() * 2));
        assert!(emu.poll(t0 + ms(34))?);
        assert_eq!(emu.ticks(), 2);
        Ok(())
    }

    #[test]
    fn test_run_stops_at_tick_limit() -> Result<(), Error> {
        let (mut display, mut keypad, mut sound) = devices();
        let config = Config {
            tick_rate: 1000,
            ..Config::default()
        };
        {
            let mut emu = Emulator::new(config, &mut display, &mut keypad, &mut sound);
            emu.load_bytes(&[0x12, 0x00])?;
            emu.run(Some(3))?;
            assert_eq!(emu.ticks(), 3);
            assert_eq!(emu.machine().cycles, 30);
        }
        assert_eq!(display.frames, 3);
        Ok(())
    }

    #[test]
    fn test_run_reports_machine_error() -> Result<(), Error> {
        let (mut display, mut keypad, mut sound) = devices();
        let config = Config {
            tick_rate: 1000,
            ..Config::default()
        };
        let mut emu = Emulator::new(config, &mut display, &mut keypad, &mut sound);
        // V0 = 1; RET with nothing on the stack
        emu.load_bytes(&[0x60, 0x01, 0x00, 0xee])?;
        assert!(matches!(
            emu.run(Some(5)),
            Err(Error::Machine(MachineError::StackUnderflow { addr: 0x202 }))
        ));
        Ok(())
    }

    #[test]
    fn test_run_steps_over_undefined_sub_opcode() -> Result<(), Error> {
        let (mut display, mut keypad, mut sound) = devices();
        let mut emu = Emulator::new(Config::default(), &mut display, &mut keypad, &mut sound);
        // 8xy8 names nothing; V1 = 7; JP 0x204
        emu.load_bytes(&[0x80, 0x08, 0x61, 0x07, 0x12, 0x04])?;
        emu.tick()?;
        assert_eq!(emu.machine().pc, 0x204);
        assert_eq!(emu.machine().v[1], 0x07);
        Ok(())
    }

    #[test]
    fn test_strict_decode_stops_on_undefined_sub_opcode() -> Result<(), Error> {
        let (mut display, mut keypad, mut sound) = devices();
        let config = Config {
            strict_decode: true,
            ..Config::default()
        };
        let mut emu = Emulator::new(config, &mut display, &mut keypad, &mut sound);
        emu.load_bytes(&[0x80, 0x0f])?;
        assert!(matches!(
            emu.tick(),
            Err(Error::Machine(MachineError::Decode {
                opcode: 0x800f,
                addr: 0x200
            }))
        ));
        Ok(())
    }

    #[test]
    fn test_frame_shows_what_was_drawn() -> Result<(), Error> {
        let (mut display, mut keypad, mut sound) = devices();
        let mut emu = Emulator::new(Config::default(), &mut display, &mut keypad, &mut sound);
        // V0 = 1; LD F,V0; DRW V2,V2,5; JP 0x206
        emu.load_bytes(&[0x60, 0x01, 0xf0, 0x29, 0xd2, 0x25, 0x12, 0x06])?;
        emu.tick()?;
        // glyph 1 top row is 0x20: only column 2 lit
        assert!(emu.frame().is_lit(2, 0));
        assert!(!emu.frame().is_lit(1, 0));
        assert_eq!(emu.frame().present().iter().filter(|c| **c == 1).count(), 8);
        Ok(())
    }

    #[test]
    fn test_run_without_program_does_nothing() -> Result<(), Error> {
        let (mut display, mut keypad, mut sound) = devices();
        let mut emu = Emulator::new(Config::default(), &mut display, &mut keypad, &mut sound);
        emu.run(Some(3))?;
        assert_eq!(emu.ticks(), 0);
        assert_eq!(emu.machine().cycles, 0);
        Ok(())
    }

    #[test]
    fn test_interval() {
        let config = Config {
            tick_rate: 50,
            ..Config::default()
        };
        assert_eq!(config.interval(), Duration::from_millis(20));
    }
}
