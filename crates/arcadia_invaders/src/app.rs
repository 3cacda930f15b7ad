use crate::machine::InvadersMachine;
use crate::sound::SoundBoard;
use crate::{SCREEN_HEIGHT, SCREEN_SCALE, SCREEN_WIDTH};
use arcadia_common::{App, Color, Key};

/// Frontend adapter: one `update` call runs one emulated frame and
/// paints the framebuffer into the RGB24 screen buffer.
#[derive(Default)]
pub struct InvadersApp {
    should_exit: bool,
    paused: bool,
    pub machine: InvadersMachine,
    sound: Option<SoundBoard>,
}

impl App for InvadersApp {
    fn init(&mut self) {
        log::info!("Space Invaders init");
        if self.sound.is_none() {
            self.sound = SoundBoard::new();
        }
    }

    fn update(&mut self, screen_state: &mut [u8]) {
        if !self.paused {
            if let Err(e) = self.machine.step_frame() {
                log::error!("CPU fault: {e}");
                self.should_exit = true;
                return;
            }

            if let Some(sound) = &mut self.sound {
                let (out3, out5) = self.machine.sound_ports();
                sound.update(out3, out5);
            }
        }

        render_video(self.machine.video_ram(), screen_state);

        if self.paused {
            overlay_pause_banner(screen_state);
        }
    }

    fn handle_key_event(&mut self, key: Key, is_down: bool) {
        if is_down {
            match key {
                Key::Escape => {
                    self.should_exit = true;
                    return;
                }
                Key::P => {
                    self.paused = !self.paused;
                    return;
                }
                _ => {}
            }
        }

        self.machine.handle_key(key, is_down);
    }

    fn should_exit(&self) -> bool {
        self.should_exit
    }

    fn exit(&mut self) {
        log::info!("Space Invaders exit");
    }

    fn width(&self) -> u32 {
        SCREEN_WIDTH as u32
    }

    fn height(&self) -> u32 {
        SCREEN_HEIGHT as u32
    }

    fn scale(&self) -> u32 {
        SCREEN_SCALE
    }

    fn title(&self) -> String {
        "Arcadia Space Invaders".to_string()
    }
}

/// Unpack the 1bpp framebuffer into RGB24.
///
/// The tube is mounted rotated 90 degrees: VRAM is column-major, 224
/// columns of 32 bytes, each byte 8 vertical pixels bottom-up. The tint
/// bands stand in for the color gel overlays on the original cabinet.
fn render_video(vram: &[u8], screen_state: &mut [u8]) {
    debug_assert_eq!(vram.len(), SCREEN_WIDTH * SCREEN_HEIGHT / 8);
    debug_assert_eq!(screen_state.len(), SCREEN_WIDTH * SCREEN_HEIGHT * 3);

    let mut i = 0usize;
    for x in 0..SCREEN_WIDTH {
        for row_base in (0..SCREEN_HEIGHT).step_by(8) {
            let mut byte = vram[i];
            i += 1;
            for bit in 0..8 {
                let on = byte & 1 != 0;
                byte >>= 1;

                let y = SCREEN_HEIGHT - (row_base + bit) - 1;
                let idx = (y * SCREEN_WIDTH + x) * 3;
                let color = if !on {
                    Color::BLACK
                } else if row_base > 200 && row_base < 220 {
                    Color::RED
                } else if row_base < 80 {
                    Color::GREEN
                } else {
                    Color::WHITE
                };
                screen_state[idx] = color.r;
                screen_state[idx + 1] = color.g;
                screen_state[idx + 2] = color.b;
            }
        }
    }
}

/// Striped band across the top of the screen while paused.
fn overlay_pause_banner(screen_state: &mut [u8]) {
    let banner_height = 12usize.min(SCREEN_HEIGHT);
    for y in 0..banner_height {
        for x in 0..SCREEN_WIDTH {
            let idx = (y * SCREEN_WIDTH + x) * 3;
            let color = if y % 2 == 0 { Color::WHITE } else { Color::BLACK };
            screen_state[idx] = color.r;
            screen_state[idx + 1] = color.g;
            screen_state[idx + 2] = color.b;
        }
    }
}
