use crate::error::Error;
use beep::beep;
use log::debug;

/// tone output, switched on and off by the sound timer
pub trait Sound {
    fn play(&mut self, frequency_hz: u16) -> Result<(), Error>;
    fn stop(&mut self) -> Result<(), Error>;
}

/// PC speaker beep; only talks to the device when the state changes
#[derive(Default)]
pub struct SimpleBeep {
    playing: Option<u16>,
}

impl SimpleBeep {
    pub fn new() -> Self {
        SimpleBeep { playing: None }
    }
}

impl Sound for SimpleBeep {
    fn play(&mut self, frequency_hz: u16) -> Result<(), Error> {
        if self.playing != Some(frequency_hz) {
            debug!("tone on at {}Hz", frequency_hz);
            beep(frequency_hz).map_err(|e| Error::Sound(e.to_string()))?;
            self.playing = Some(frequency_hz);
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        if self.playing.is_some() {
            debug!("tone off");
            beep(0).map_err(|e| Error::Sound(e.to_string()))?;
            self.playing = None;
        }
        Ok(())
    }
}

/// silence, but keeps track of what it was asked to do
#[derive(Default)]
pub struct Mute {
    pub playing: Option<u16>,
}

impl Mute {
    pub fn new() -> Self {
        Mute { playing: None }
    }
}

impl Sound for Mute {
    fn play(&mut self, frequency_hz: u16) -> Result<(), Error> {
        self.playing = Some(frequency_hz);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), Error> {
        self.playing = None;
        Ok(())
    }
}
