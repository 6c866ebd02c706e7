//! Turns lexed lines into a [`Program`], resolving labels in two passes
//! the same way [`Program::jump_target`] expects displacements: relative
//! to `pc + 1`.

use std::collections::HashMap;
use std::convert::TryFrom;

use crate::error::Error;
use crate::ir::{BaseOp, ElementType, Instruction, Op, Program};

use super::lexer::{self, Line};

/// Assembles one complete textual program. `source` may contain
/// `//`/`/* */` comments and blank lines; see the module docs for the
/// line grammar.
pub fn parse(source: &str) -> Result<Program, Error> {
    let stripped = lexer::strip_block_comments(source);
    let lines = lexer::lines(&stripped);

    let labels = resolve_labels(&lines)?;

    let mut instructions = Vec::new();
    let mut pc = 0usize;
    for line in &lines {
        let mnemonic = match line.mnemonic {
            Some(m) => m,
            None => continue,
        };
        let inst = parse_instruction(line.number, mnemonic, &line.operands, pc, &labels)?;
        instructions.push(inst);
        pc += 1;
    }
    Ok(Program::new(instructions))
}

fn resolve_labels<'a>(lines: &'a [Line<'a>]) -> Result<HashMap<&'a str, usize>, Error> {
    let mut labels = HashMap::new();
    let mut pc = 0usize;
    for line in lines {
        if let Some(name) = line.label {
            if labels.insert(name, pc).is_some() {
                return Err(Error::parse(line.number, 1, format!("label `{}` defined twice", name)));
            }
        }
        if line.mnemonic.is_some() {
            pc += 1;
        }
    }
    Ok(labels)
}

struct Mnemonic {
    base: BaseOp,
    vec: bool,
    imm: bool,
}

fn parse_mnemonic(line: usize, token: &str) -> Result<Mnemonic, Error> {
    let opcode_part = match token.find('.') {
        Some(idx) => &token[..idx],
        None => token,
    };
    if opcode_part.is_empty() {
        return Err(Error::parse(line, 1, format!("empty opcode in `{}`", token)));
    }

    if let Some((base, imm)) = resolve_stem(opcode_part) {
        return Ok(Mnemonic { base, vec: false, imm });
    }
    if let Some(rest) = opcode_part.strip_prefix('v') {
        if let Some((base, imm)) = resolve_stem(rest) {
            return Ok(Mnemonic { base, vec: true, imm });
        }
    }
    Err(Error::parse(line, 1, format!("unknown opcode `{}`", opcode_part)))
}

/// Matches a scalar/vector-stripped opcode stem against either a base
/// mnemonic directly (register form) or, failing that, its `i`-suffixed
/// immediate form — `FLAG_IMM`/`FLAG_BIN` are never an independent
/// authoring choice, just `(stem ends in "i", base.is_binary())`.
fn resolve_stem(text: &str) -> Option<(BaseOp, bool)> {
    if let Some(base) = base_from_mnemonic(text) {
        return Some((base, false));
    }
    let stem = text.strip_suffix('i')?;
    let base = base_from_mnemonic(stem)?;
    if base.supports_imm() {
        Some((base, true))
    } else {
        None
    }
}

fn base_from_mnemonic(text: &str) -> Option<BaseOp> {
    (0..BaseOp::COUNT as u8)
        .filter_map(BaseOp::from_index)
        .find(|b| b.mnemonic() == text)
}

fn parse_type(line: usize, token: &str) -> Result<ElementType, Error> {
    match token.find('.') {
        None => Ok(ElementType::I64),
        Some(idx) => {
            let name = &token[idx + 1..];
            if name.is_empty() {
                // "add." with nothing after the dot: treated the same as
                // no type suffix at all rather than a parse error.
                return Ok(ElementType::I64);
            }
            element_type_from_name(name)
                .ok_or_else(|| Error::parse(line, idx + 2, format!("unknown element type `{}`", name)))
        }
    }
}

fn element_type_from_name(name: &str) -> Option<ElementType> {
    Some(match name {
        "i8" => ElementType::I8,
        "i16" => ElementType::I16,
        "i32" => ElementType::I32,
        "i64" => ElementType::I64,
        "u8" => ElementType::U8,
        "u16" => ElementType::U16,
        "u32" => ElementType::U32,
        "u64" => ElementType::U64,
        "f32" => ElementType::F32,
        "f64" => ElementType::F64,
        "f16" => ElementType::F16,
        "f8" => ElementType::F8,
        _ => return None,
    })
}

enum Operand<'a> {
    Reg(u8),
    Imm(i16),
    Label(&'a str),
}

fn classify(line: usize, token: &str) -> Result<Operand<'_>, Error> {
    if let Some(rest) = token.strip_prefix("%r") {
        let index: u8 = rest
            .parse()
            .map_err(|_| Error::parse(line, 1, format!("bad register `{}`", token)))?;
        if index >= 16 {
            return Err(Error::parse(line, 1, format!("register out of range `{}`", token)));
        }
        return Ok(Operand::Reg(index));
    }
    if let Some(rest) = token.strip_prefix('$') {
        let value: i16 = rest
            .parse()
            .map_err(|_| Error::parse(line, 1, format!("bad immediate `{}`", token)))?;
        return Ok(Operand::Imm(value));
    }
    if let Some(name) = token.strip_suffix(':') {
        return Ok(Operand::Label(name));
    }
    if token.starts_with(|c: char| c.is_ascii_digit() || c == '-') {
        let value: i16 = token
            .parse()
            .map_err(|_| Error::parse(line, 1, format!("bad integer `{}`", token)))?;
        return Ok(Operand::Imm(value));
    }
    Err(Error::parse(line, 1, format!("unrecognized operand `{}`", token)))
}

fn expect_reg(line: usize, op: &Operand<'_>) -> Result<u8, Error> {
    match op {
        Operand::Reg(r) => Ok(*r),
        _ => Err(Error::parse(line, 1, "expected a register operand")),
    }
}

fn expect_imm(line: usize, op: &Operand<'_>) -> Result<i16, Error> {
    match op {
        Operand::Imm(v) => Ok(*v),
        _ => Err(Error::parse(line, 1, "expected an immediate operand")),
    }
}

fn jump_displacement(
    line: usize,
    op: &Operand<'_>,
    pc: usize,
    labels: &HashMap<&str, usize>,
) -> Result<i16, Error> {
    match op {
        Operand::Imm(v) => Ok(*v),
        Operand::Label(name) => {
            let target = *labels
                .get(name)
                .ok_or_else(|| Error::parse(line, 1, format!("undefined label `{}`", name)))?;
            let disp = target as i64 - (pc as i64 + 1);
            i16::try_from(disp).map_err(|_| Error::parse(line, 1, "jump target out of range"))
        }
        Operand::Reg(_) => Err(Error::parse(line, 1, "expected a jump target")),
    }
}

fn parse_instruction(
    line: usize,
    mnemonic_token: &str,
    operand_tokens: &[&str],
    pc: usize,
    labels: &HashMap<&str, usize>,
) -> Result<Instruction, Error> {
    let m = parse_mnemonic(line, mnemonic_token)?;
    let ty = parse_type(line, mnemonic_token)?;
    let op = Op::new(m.base, m.vec, m.base.is_binary() && !m.imm, m.imm);

    let operands: Vec<Operand<'_>> = operand_tokens
        .iter()
        .map(|t| classify(line, t))
        .collect::<Result<_, _>>()?;

    let arity_error = || Error::parse(line, 1, format!("wrong number of operands for `{}`", mnemonic_token));

    match m.base {
        BaseOp::Nop => {
            if !operands.is_empty() {
                return Err(arity_error());
            }
            Ok(Instruction::reg1(op, ty, 0))
        }
        BaseOp::Jmp => {
            let [d] = take::<1>(&operands).ok_or_else(arity_error)?;
            let disp = jump_displacement(line, d, pc, labels)?;
            Ok(Instruction::jump(op, 0, disp))
        }
        BaseOp::Jz | BaseOp::Jnz => {
            let [rd, d] = take::<2>(&operands).ok_or_else(arity_error)?;
            let rd = expect_reg(line, rd)?;
            let disp = jump_displacement(line, d, pc, labels)?;
            Ok(Instruction::jump(op, rd, disp))
        }
        BaseOp::Ret => {
            let [rd] = take::<1>(&operands).ok_or_else(arity_error)?;
            Ok(Instruction::reg1(op, ty, expect_reg(line, rd)?))
        }
        BaseOp::Mov if m.imm => {
            let [rd, imm] = take::<2>(&operands).ok_or_else(arity_error)?;
            let rd = expect_reg(line, rd)?;
            let imm = expect_imm(line, imm)?;
            if m.vec {
                Ok(Instruction::imm12(op, ty, rd, 0, imm))
            } else {
                Ok(Instruction::imm8(op, ty, rd, 0, imm))
            }
        }
        BaseOp::Mov | BaseOp::Neg | BaseOp::Bnot | BaseOp::Inv => {
            let [rd, ri] = take::<2>(&operands).ok_or_else(arity_error)?;
            Ok(Instruction::reg2(op, ty, expect_reg(line, rd)?, expect_reg(line, ri)?))
        }
        base if base.is_binary() && m.imm => {
            let [rd, ri, imm] = take::<3>(&operands).ok_or_else(arity_error)?;
            let rd = expect_reg(line, rd)?;
            let ri = expect_reg(line, ri)?;
            let imm = expect_imm(line, imm)?;
            if m.vec {
                Ok(Instruction::imm12(op, ty, rd, ri, imm))
            } else {
                Ok(Instruction::imm8(op, ty, rd, ri, imm))
            }
        }
        base if base.is_binary() => {
            let [rd, ri, rj] = take::<3>(&operands).ok_or_else(arity_error)?;
            Ok(Instruction::reg3(
                op,
                ty,
                expect_reg(line, rd)?,
                expect_reg(line, ri)?,
                expect_reg(line, rj)?,
            ))
        }
        _ => unreachable!("every BaseOp variant is handled above"),
    }
}

fn take<'a, const N: usize>(slice: &'a [Operand<'a>]) -> Option<[&'a Operand<'a>; N]> {
    if slice.len() != N {
        return None;
    }
    let mut out: [Option<&'a Operand<'a>>; N] = [None; N];
    for (i, item) in slice.iter().enumerate() {
        out[i] = Some(item);
    }
    Some(out.map(|o| o.unwrap()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_constant_add_assembles_and_runs_in_the_emulator() {
        let program = parse("movi.i32 %r0, $1\naddi.i32 %r0, %r0, $41\nret %r0\n").unwrap();
        assert_eq!(program.len(), 3);
        assert!(program.is_well_formed());

        let mut rf = crate::ir::RegisterFile::zeroed();
        crate::emulator::run(&program, &mut rf);
        assert_eq!(rf.read_int(ElementType::I32, 0), 42);
    }

    #[test]
    fn a_backward_branch_resolves_to_a_negative_displacement() {
        let program = parse("loop: subi.i32 %r0, %r0, $1\njnz %r0, loop:\nret %r0\n").unwrap();
        assert_eq!(program.instructions()[1].displacement(), -2);
    }

    #[test]
    fn an_unknown_opcode_is_a_parse_error_naming_the_line() {
        let err = parse("bogus %r0, %r0, %r1\n").unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("expected a parse error, got {:?}", other),
        }
    }

    #[test]
    fn missing_type_suffix_defaults_to_i64() {
        let program = parse("mov %r0, %r1\n").unwrap();
        assert_eq!(program.instructions()[0].ty(), ElementType::I64);
    }

    #[test]
    fn a_vector_add_sets_the_vec_flag_and_uses_imm12_range() {
        let program = parse("vaddi.i32 %r0, %r1, $1000\n").unwrap();
        let inst = &program.instructions()[0];
        assert!(inst.op().is_vec());
        assert_eq!(inst.imm(), 1000);
    }
}
