pub mod cli;
pub mod logging;

use std::io::Read as _;
use std::path::PathBuf;

use anyhow::Context as _;
use clap::Clap as _;
use termcolor::ColorChoice;

use cli::Opts;
use logging::AppLogger;
use vrjit::emulator;
use vrjit::ir::RegisterFile;
use vrjit::isa::Capabilities;
use vrjit::jit::{self, Strategy};
use vrjit::util::HexBytes;

pub fn run() -> anyhow::Result<()> {
    let opts = Opts::parse();

    unsafe { AppLogger::instance().set_level(opts.log_level_filter()) };
    match opts.color_choice {
        ColorChoice::Auto => unsafe {
            let choice = if atty::is(atty::Stream::Stderr) {
                ColorChoice::Always
            } else {
                ColorChoice::Never
            };
            AppLogger::instance().set_color_choice(choice);
        },
        choice => unsafe {
            AppLogger::instance().set_color_choice(choice);
        },
    };

    let source = read_source(opts.input.as_ref())?;
    let program = vrjit::asm::parse(&source).context("failed to assemble program")?;
    log::debug!("assembled {} instructions", program.len());

    let caps = match opts.isa {
        Some(profile) => Capabilities::force_profile(profile),
        None => Capabilities::detect(),
    };
    log::debug!("using isa profile {:?}", caps.profile());

    match opts.mode.as_str() {
        "emulate" => {
            let mut rf = RegisterFile::zeroed();
            let outcome = emulator::run(&program, &mut rf);
            log::info!("emulator halted: {:?}", outcome);
            if opts.dump_regs {
                dump_regs(&rf);
            }
        }
        "jit" => {
            let compiled = jit::compile(&program, &caps, Strategy::Lru);
            let mut rf = RegisterFile::zeroed();
            unsafe {
                compiled.call(&mut rf);
            }
            log::info!("jit function returned");
            if opts.dump_regs {
                dump_regs(&rf);
            }
        }
        "both" => {
            let mut emulated = RegisterFile::zeroed();
            emulator::run(&program, &mut emulated);

            let compiled = jit::compile(&program, &caps, Strategy::Lru);
            let mut jitted = RegisterFile::zeroed();
            unsafe {
                compiled.call(&mut jitted);
            }

            if emulated == jitted {
                log::info!(target: logging::EQUIVALENCE_TARGET, "emulator and jit agree bit-for-bit");
            } else {
                log::warn!(target: logging::EQUIVALENCE_TARGET, "emulator and jit disagree");
            }
            if opts.dump_regs {
                dump_regs(&jitted);
            }
        }
        other => anyhow::bail!("unknown --mode `{}` (expected jit, emulate, or both)", other),
    }

    Ok(())
}

fn read_source(path: Option<&PathBuf>) -> anyhow::Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read `{}`", path.display())),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read stdin")?;
            Ok(buf)
        }
    }
}

fn dump_regs(rf: &RegisterFile) {
    for (i, r) in rf.r.iter().enumerate() {
        log::info!("r{:<2} = {}", i, HexBytes(&r.to_le_bytes()));
    }
    for (i, v) in rf.v.iter().enumerate() {
        log::info!("v{:<2} = {}", i, HexBytes(&v.0));
    }
}
