use anyhow::{anyhow, Result};
use sdl2::event::Event;
use sdl2::keyboard::Keycode;
use sdl2::pixels::PixelFormatEnum;
use typed_builder::TypedBuilder;

use arcadia_common::{App, Key};

pub use sdl2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Rgb24,
}

impl PixelFormat {
    fn native(self) -> PixelFormatEnum {
        match self {
            PixelFormat::Rgb24 => PixelFormatEnum::RGB24,
        }
    }

    fn bytes_per_pixel(self) -> u32 {
        match self {
            PixelFormat::Rgb24 => 3,
        }
    }
}

#[derive(TypedBuilder)]
pub struct SdlInitInfo {
    pub width: u32,
    pub height: u32,
    pub scale: u32,
    pub title: String,
    #[builder(default = PixelFormat::Rgb24)]
    pub pixel_format: PixelFormat,
}

pub struct SdlContext;

impl SdlContext {
    /// Open a window sized for the app and pump frames until the app
    /// asks to exit or the window is closed.
    pub fn run(init: SdlInitInfo, mut app: impl App) -> Result<()> {
        let SdlInitInfo {
            width,
            height,
            scale,
            title,
            pixel_format,
        } = init;

        let sdl = sdl2::init().map_err(|e| anyhow!("SDL init failed: {e}"))?;
        let video = sdl.video().map_err(|e| anyhow!("SDL video failed: {e}"))?;
        let window = video
            .window(&title, width * scale, height * scale)
            .position_centered()
            .build()?;
        let mut canvas = window.into_canvas().present_vsync().build()?;
        canvas
            .set_scale(scale as f32, scale as f32)
            .map_err(|e| anyhow!("canvas scale failed: {e}"))?;
        let creator = canvas.texture_creator();
        let mut texture = creator.create_texture_target(pixel_format.native(), width, height)?;
        let mut event_pump = sdl
            .event_pump()
            .map_err(|e| anyhow!("SDL event pump failed: {e}"))?;

        let bpp = pixel_format.bytes_per_pixel();
        let mut screen_state = vec![0u8; (width * height * bpp) as usize];

        log::info!("SDL window up: {}x{} scale {}", width, height, scale);
        app.init();

        loop {
            if app.should_exit() {
                app.exit();
                break;
            }

            while let Some(event) = event_pump.poll_event() {
                match event {
                    Event::Quit { .. } => {
                        app.exit();
                        return Ok(());
                    }
                    Event::KeyDown {
                        keycode: Some(keycode),
                        ..
                    } => app.handle_key_event(map_keycode(keycode), true),
                    Event::KeyUp {
                        keycode: Some(keycode),
                        ..
                    } => app.handle_key_event(map_keycode(keycode), false),
                    _ => {}
                }
            }

            app.update(&mut screen_state);

            texture.update(None, &screen_state, (width * bpp) as usize)?;
            canvas
                .copy(&texture, None, None)
                .map_err(|e| anyhow!("canvas copy failed: {e}"))?;
            canvas.present();
        }

        Ok(())
    }
}

pub fn map_keycode(keycode: Keycode) -> Key {
    match keycode {
        Keycode::Num1 => Key::Num1,
        Keycode::Num2 => Key::Num2,
        Keycode::Num3 => Key::Num3,
        Keycode::Num4 => Key::Num4,
        Keycode::A => Key::A,
        Keycode::C => Key::C,
        Keycode::D => Key::D,
        Keycode::J => Key::J,
        Keycode::K => Key::K,
        Keycode::L => Key::L,
        Keycode::P => Key::P,
        Keycode::S => Key::S,
        Keycode::T => Key::T,
        Keycode::Space => Key::Space,
        Keycode::Left => Key::Left,
        Keycode::Right => Key::Right,
        Keycode::Return => Key::Return,
        Keycode::Escape => Key::Escape,
        _ => Key::None,
    }
}
