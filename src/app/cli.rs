use clap::Clap;
use std::path::PathBuf;
use termcolor::ColorChoice;

use vrjit::isa::IsaProfile;

#[derive(Clap)]
#[clap(name = "vrjit-asm", version = env!("CARGO_PKG_VERSION"), author = "Marc C.")]
pub struct Opts {
    /// Path to a textual IR program. Reads from stdin when omitted.
    pub input: Option<PathBuf>,

    /// Which lowering path to force, regardless of what the host
    /// actually supports: `scalar`, `sse2`, or `avx`. Detects host
    /// capabilities when unspecified.
    #[clap(long = "isa", parse(try_from_str = parse_isa))]
    pub isa: Option<IsaProfile>,

    /// Prints the register file after execution.
    #[clap(long = "dump-regs")]
    pub dump_regs: bool,

    /// Which back-end(s) to run: `jit`, `emulate`, or `both` (the
    /// default), which also checks the two agree bit-for-bit.
    #[clap(long = "mode", default_value = "both")]
    pub mode: String,

    /// Sets the log level: (default)=+error, 0=+warning, 1=+info, 2=+debug, 3=+trace
    /// The `quiet` flag can be used to turn off logging completely.
    #[clap(short, long, parse(from_occurrences))]
    pub verbose: u32,

    /// Disables logging.
    #[clap(short, long)]
    pub quiet: bool,

    /// Coloring: auto, always, never, and always-ansi (only uses ansi color codes).
    #[clap(long = "color", default_value = "auto", parse(try_from_str = parse_colorchoice))]
    pub color_choice: ColorChoice,
}

impl Opts {
    pub fn log_level_filter(&self) -> log::LevelFilter {
        use log::LevelFilter;

        if self.quiet {
            return LevelFilter::Off;
        }

        match self.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}

pub fn parse_colorchoice(s: &str) -> Result<ColorChoice, String> {
    if s.eq_ignore_ascii_case("auto") {
        Ok(ColorChoice::Auto)
    } else if s.eq_ignore_ascii_case("always") {
        Ok(ColorChoice::Always)
    } else if s.eq_ignore_ascii_case("never") {
        Ok(ColorChoice::Never)
    } else if s.eq_ignore_ascii_case("always-ansi") {
        Ok(ColorChoice::AlwaysAnsi)
    } else {
        Err(format!("{} is not a valid color value", s))
    }
}

pub fn parse_isa(s: &str) -> Result<IsaProfile, String> {
    if s.eq_ignore_ascii_case("scalar") {
        Ok(IsaProfile::Scalar)
    } else if s.eq_ignore_ascii_case("sse2") {
        Ok(IsaProfile::Sse2)
    } else if s.eq_ignore_ascii_case("avx") {
        Ok(IsaProfile::Avx)
    } else {
        Err(format!("{} is not a valid isa profile", s))
    }
}
