//! Discrete sound effects driven by the OUT 3 / OUT 5 latches.
//!
//! The cabinet has no sample playback hardware; each output bit gates
//! an analog circuit. We approximate that by playing a WAV per bit and
//! triggering on rising edges only, so a bit held high across frames
//! does not restart its sound.

use std::fs;
use std::io::{BufReader, Cursor};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use log::{error, info, warn};
use rodio::{Decoder, OutputStream, Sink};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SoundEffect {
    Ufo,
    Shot,
    PlayerDies,
    InvaderDies,
    FleetMove1,
    FleetMove2,
    FleetMove3,
    FleetMove4,
    UfoHit,
}

struct EffectWiring {
    effect: SoundEffect,
    port: u8,
    bit: u8,
    path: &'static str,
}

const fn wired(effect: SoundEffect, port: u8, bit: u8, path: &'static str) -> EffectWiring {
    EffectWiring {
        effect,
        port,
        bit,
        path,
    }
}

/// Output bit to sample mapping. Paths are relative to the workspace
/// root, where the emulator is expected to be run from.
const EFFECTS: &[EffectWiring] = &[
    wired(SoundEffect::Ufo, 3, 0, "assets/sounds/ufo_lowpitch.wav"),
    wired(SoundEffect::Shot, 3, 1, "assets/sounds/shoot.wav"),
    wired(SoundEffect::PlayerDies, 3, 2, "assets/sounds/explosion.wav"),
    wired(SoundEffect::InvaderDies, 3, 3, "assets/sounds/invaderkilled.wav"),
    wired(SoundEffect::FleetMove1, 5, 0, "assets/sounds/fastinvader1.wav"),
    wired(SoundEffect::FleetMove2, 5, 1, "assets/sounds/fastinvader2.wav"),
    wired(SoundEffect::FleetMove3, 5, 2, "assets/sounds/fastinvader3.wav"),
    wired(SoundEffect::FleetMove4, 5, 3, "assets/sounds/fastinvader4.wav"),
    wired(SoundEffect::UfoHit, 5, 4, "assets/sounds/explosion.wav"),
];

fn load_samples() -> Vec<(SoundEffect, Vec<u8>)> {
    let mut samples = Vec::new();
    for wiring in EFFECTS {
        match fs::read(wiring.path) {
            Ok(bytes) => samples.push((wiring.effect, bytes)),
            Err(e) => warn!("failed to load {:?} from {}: {e}", wiring.effect, wiring.path),
        }
    }
    samples
}

fn audio_thread(receiver: Receiver<SoundEffect>) {
    let samples = load_samples();
    if samples.is_empty() {
        warn!("no sound assets found, running silent");
        return;
    }

    // The stream must stay alive for as long as we intend to play.
    let Ok((_stream, handle)) = OutputStream::try_default() else {
        error!("no audio output device, running silent");
        return;
    };
    let Ok(sink) = Sink::try_new(&handle) else {
        error!("failed to create audio sink, running silent");
        return;
    };

    while let Ok(effect) = receiver.recv() {
        let Some((_, bytes)) = samples.iter().find(|(e, _)| *e == effect) else {
            continue;
        };
        match Decoder::new(BufReader::new(Cursor::new(bytes.clone()))) {
            Ok(source) => {
                sink.append(source);
                sink.sleep_until_end();
            }
            Err(e) => error!("failed to decode {:?}: {e}", effect),
        }
    }
}

/// Main-thread side of the audio pipeline: watches the sound latches
/// and forwards rising edges to the playback thread.
pub struct SoundBoard {
    sender: Sender<SoundEffect>,
    last_port3: u8,
    last_port5: u8,
}

impl SoundBoard {
    /// Spawn the playback thread. Returns `None` when the thread cannot
    /// be spawned; the machine then runs without sound.
    pub fn new() -> Option<Self> {
        let (sender, receiver) = mpsc::channel();
        if let Err(e) = thread::Builder::new()
            .name("invaders_sound".into())
            .spawn(move || audio_thread(receiver))
        {
            error!("failed to spawn audio thread: {e}");
            return None;
        }
        info!("sound board up");
        Some(Self {
            sender,
            last_port3: 0,
            last_port5: 0,
        })
    }

    /// Feed the current OUT 3 / OUT 5 values, once per frame.
    pub fn update(&mut self, port3: u8, port5: u8) {
        let rising3 = port3 & !self.last_port3;
        let rising5 = port5 & !self.last_port5;
        self.last_port3 = port3;
        self.last_port5 = port5;

        for wiring in EFFECTS {
            let rising = match wiring.port {
                3 => rising3,
                5 => rising5,
                _ => 0,
            };
            if rising & (1 << wiring.bit) != 0 {
                // If the playback thread is gone we just go silent.
                let _ = self.sender.send(wiring.effect);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    fn edges(updates: &[(u8, u8)]) -> Vec<SoundEffect> {
        let (sender, receiver) = mpsc::channel();
        let mut board = SoundBoard {
            sender,
            last_port3: 0,
            last_port5: 0,
        };
        for &(p3, p5) in updates {
            board.update(p3, p5);
        }
        drop(board);
        receiver.iter().collect()
    }

    #[test]
    fn rising_edges_trigger_once() {
        // Shot bit held across three frames plays once.
        let fired = edges(&[(0x02, 0x00), (0x02, 0x00), (0x02, 0x00)]);
        assert_eq!(fired, vec![SoundEffect::Shot]);
    }

    #[test]
    fn retrigger_after_falling_edge() {
        let fired = edges(&[(0x02, 0x00), (0x00, 0x00), (0x02, 0x00)]);
        assert_eq!(fired, vec![SoundEffect::Shot, SoundEffect::Shot]);
    }

    #[test]
    fn both_ports_decode_independently() {
        let fired = edges(&[(0x08, 0x10)]);
        assert_eq!(fired, vec![SoundEffect::InvaderDies, SoundEffect::UfoHit]);
    }
}
