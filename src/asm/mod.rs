//! Textual front-end: `[label:] [opcode[.type] operand[, operand]*] ['//' comment]`.
//!
//! An opcode token is `[v]<mnemonic>[i][.<type>]`: a leading `v` selects
//! the vector form, a trailing `i` the immediate form, and the `.type`
//! suffix picks the element type (default `i64`, the host's native
//! integer width, when omitted). Registers are written `%r0`..`%r15`,
//! immediates `$-5`, and jump targets either a bare signed displacement
//! or a `label:`-suffixed name resolved against the program's other
//! labels.

mod lexer;
mod parser;

pub use parser::parse;
