use std::fmt;

/// Everything that can go wrong inside this crate, split along the three
/// error classes the generator distinguishes: a compile-time bug in the
/// generator itself, a syntax error in a textual program, and a request
/// to emit code the current ISA profile cannot support.
#[derive(Debug)]
pub enum Error {
    /// A generator invariant was violated: unknown opcode, unreachable
    /// dispatch arm, scratch-pool exhaustion. These are bugs, not user
    /// errors, so the message carries source location.
    Fatal {
        message: String,
        file: &'static str,
        line: u32,
    },
    /// A single syntax-error site in a textual program, as `line:col`
    /// plus the remaining unparsed text.
    Parse {
        line: usize,
        column: usize,
        message: String,
    },
    /// A lowering needs an ISA feature that the current `enabled` mask
    /// does not include; the generator refuses to emit rather than emit
    /// wrong code.
    CapabilityGap {
        opcode: String,
        required: &'static str,
    },
}

impl Error {
    pub fn fatal<M: Into<String>>(message: M, file: &'static str, line: u32) -> Error {
        Error::Fatal { message: message.into(), file, line }
    }

    pub fn parse<M: Into<String>>(line: usize, column: usize, message: M) -> Error {
        Error::Parse { line, column, message: message.into() }
    }

    pub fn capability_gap<O: Into<String>>(opcode: O, required: &'static str) -> Error {
        Error::CapabilityGap { opcode: opcode.into(), required }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Fatal { message, file, line } => {
                write!(f, "fatal: {} ({}:{})", message, file, line)
            }
            Error::Parse { line, column, message } => {
                write!(f, "{}:{}: error: {}", line, column, message)
            }
            Error::CapabilityGap { opcode, required } => {
                write!(f, "cannot lower `{}`: requires {}", opcode, required)
            }
        }
    }
}

impl std::error::Error for Error {}

/// Panics with file/line context, used where the generator hits a
/// condition the spec calls "fatal": scratch exhaustion, or a lowering
/// table gap that should be unreachable by construction. These are bugs
/// in the generator, not user errors, so a panic rather than a `Result`
/// is the right shape.
#[macro_export]
macro_rules! crash {
    ($($arg:tt)*) => {{
        panic!("vrjit: fatal: {} ({}:{})", format!($($arg)*), file!(), line!());
    }};
}
