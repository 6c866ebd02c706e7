//! Lowering entry point: for every data instruction (everything except
//! `NOP`/`JMP`/`JZ`/`JNZ`/`RET`, which the framer in [`crate::jit`] emits
//! directly against its own label table) picks the scalar or vector
//! table by the `VEC` flag and hands off.

pub mod scalar;
pub mod source;
pub mod vector;

use x86enc::{Assembler, Gpr};

use crate::ir::{BaseOp, Instruction};
use crate::isa::Capabilities;
use crate::regalloc::Scratch;

pub use source::{v_offset, FixedSource, LruSource, RegisterSource};
pub(crate) use source::r_offset;

/// True for the five opcodes the framer handles itself.
pub fn is_control_flow(inst: &Instruction) -> bool {
    matches!(
        inst.op().base(),
        Some(BaseOp::Nop) | Some(BaseOp::Jmp) | Some(BaseOp::Jz) | Some(BaseOp::Jnz) | Some(BaseOp::Ret)
    )
}

/// Lowers one non-control-flow instruction. Panics (via the dispatcher's
/// own `expect`, inside `scalar`/`vector`) if handed a control-flow
/// opcode; callers are expected to have filtered those out with
/// [`is_control_flow`] first.
pub fn lower<S: RegisterSource>(
    asm: &mut Assembler,
    scratch: &mut Scratch,
    source: &mut S,
    rfp: Gpr,
    caps: &Capabilities,
    inst: &Instruction,
) {
    if inst.op().is_vec() {
        vector::lower(asm, scratch, source, rfp, caps, inst);
    } else {
        scalar::lower(asm, scratch, source, rfp, inst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ElementType, Op};

    #[test]
    fn control_flow_opcodes_are_recognized() {
        let jmp = Instruction::jump(Op::new(BaseOp::Jmp, false, false, false), 0, 1);
        assert!(is_control_flow(&jmp));

        let add = Instruction::reg3(Op::new(BaseOp::Add, false, true, false), ElementType::I32, 0, 1, 2);
        assert!(!is_control_flow(&add));
    }
}
