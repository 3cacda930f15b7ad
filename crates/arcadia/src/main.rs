const DEFAULT_ROM_PATH: &str = "assets/roms/invaders.rom";

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let rom_path = match std::env::args().nth(1) {
        Some(path) if !path.is_empty() => path,
        _ => {
            log::info!("no ROM path provided, using default: {DEFAULT_ROM_PATH}");
            DEFAULT_ROM_PATH.to_string()
        }
    };

    arcadia::run(&rom_path)
}
