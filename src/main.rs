use std::{env, error, fs, io::Read};

use emu::gba::{Gba, GbaConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_FRAMES: u64 = 60;

fn main() -> Result<(), Box<dyn error::Error>> {
    let args = env::args().skip(1).collect::<Vec<String>>();
    let (Some(bios_path), Some(rom_path)) = (args.first(), args.get(1)) else {
        eprintln!("usage: tangerine <bios> <rom> [frames]");
        std::process::exit(1);
    };
    let frames = match args.get(2) {
        Some(frames) => frames.parse::<u64>()?,
        None => DEFAULT_FRAMES,
    };

    // Keep the guard alive until the end so buffered lines reach the file.
    let _guard = init_tracing();

    info!("tangerine v{}", env!("CARGO_PKG_VERSION"));
    info!("loading {rom_path} with BIOS {bios_path}");

    let mut gba = Gba::new(
        read_file(bios_path)?,
        read_file(rom_path)?,
        GbaConfig::default(),
    )?;

    let mut samples = 0;
    for frame in 0..frames {
        let cycles = gba.run_frame();
        samples += gba.take_audio_samples().len();
        tracing::debug!("frame {frame} took {cycles} cycles");
    }

    info!(
        "ran {frames} frames, {} cycles, {samples} audio samples, pc 0x{:08X}",
        gba.cycles(),
        gba.cpu().current_instruction_address()
    );

    Ok(())
}

/// Logs to stderr, filtered by `RUST_LOG` (default `info`). When
/// `TANGERINE_LOG_DIR` is set the same events also go to a daily log file.
fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr = fmt::layer().with_writer(std::io::stderr);

    match env::var_os("TANGERINE_LOG_DIR") {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "tangerine.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry()
                .with(filter)
                .with(stderr)
                .init();
            None
        }
    }
}

fn read_file(filepath: &str) -> Result<Vec<u8>, Box<dyn error::Error>> {
    let mut f = fs::File::open(filepath)?;
    let mut buf = vec![];
    f.read_to_end(&mut buf)?;

    Ok(buf)
}
