use anyhow::{Context, Result};
use arcadia_common::App;
use arcadia_sdl2::{SdlContext, SdlInitInfo};

/// Load the combined Space Invaders ROM image and run it in an SDL2
/// window until the player quits.
pub fn run(rom_path: &str) -> Result<()> {
    let rom = std::fs::read(rom_path).with_context(|| format!("failed to read ROM {rom_path}"))?;

    let mut app = arcadia_invaders::InvadersApp::default();
    app.machine.load_rom(&rom);

    let init_info = SdlInitInfo::builder()
        .width(app.width())
        .height(app.height())
        .scale(app.scale())
        .title(app.title())
        .build();
    SdlContext::run(init_info, app)?;
    Ok(())
}
