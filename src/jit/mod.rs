//! The function framer: turns a well-formed [`Program`] into an
//! executable native function.
//!
//! Builds the prolog/epilog around the lowering tables in
//! [`crate::codegen`]: a computed dirty-register set (only the
//! callee-saved physical registers the chosen residency strategy
//! actually assigned get pushed/popped), the load/store phase that
//! strategy requires, and an embedded `FXSAVE64` footer the epilogue
//! writes just before returning its address in `rax`.

pub mod exec;

use x86enc::reg::CALLEE_SAVED_GP;
use x86enc::{Assembler, Cond, Gpr, Label, Width, Xmm};

use crate::codegen::{self, r_offset, v_offset, FixedSource, LruSource, RegisterSource};
use crate::ir::{BaseOp, Program};
use crate::isa::Capabilities;
use crate::regalloc::{pinned_gp_allocator, Lru, Scratch};

pub use exec::JitFunction;

/// Which resident-register strategy the framer should compile against
/// (§4.5/§4.7 in the generator's own terms): a fixed one-time load/store
/// pair for bodies that reference few enough virtual registers to keep
/// them all resident, or LRU paging for everything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Fixed,
    Lru,
}

/// The register-file pointer lives in `rdi` for the whole function body;
/// nothing in the lowering tables or the framer ever reassigns it.
const RFP: Gpr = Gpr::Rdi;

/// GP registers available for virtual-register residency: everything
/// except `rsp`, `rdi` (the register-file pointer), and the scratch
/// pool (r10/r11/r13/r14, see [`crate::regalloc::scratch::R_FREE_MASK`]).
/// Caller-saved registers are listed first so small bodies need no
/// prolog pushes at all.
const GP_POOL: &[Gpr] = &[
    Gpr::Rax,
    Gpr::Rcx,
    Gpr::Rdx,
    Gpr::Rsi,
    Gpr::R8,
    Gpr::R9,
    Gpr::Rbx,
    Gpr::Rbp,
    Gpr::R12,
    Gpr::R15,
];

/// XMM registers available for residency: everything except the scratch
/// pool (xmm11-13). SysV leaves every XMM register caller-saved, so none
/// of these ever need a prolog push.
const XMM_POOL: &[Xmm] = &[
    Xmm::Xmm0,
    Xmm::Xmm1,
    Xmm::Xmm2,
    Xmm::Xmm3,
    Xmm::Xmm4,
    Xmm::Xmm5,
    Xmm::Xmm6,
    Xmm::Xmm7,
    Xmm::Xmm8,
    Xmm::Xmm9,
    Xmm::Xmm10,
    Xmm::Xmm14,
    Xmm::Xmm15,
];

/// Compiles `program` into a callable native function. Panics (via
/// `crash!`) if `program` is not well-formed, or if `Strategy::Fixed` is
/// asked to keep more virtual registers resident than `GP_POOL`/`XMM_POOL`
/// can hold — use `Strategy::Lru` for those bodies instead.
pub fn compile(program: &Program, caps: &Capabilities, strategy: Strategy) -> JitFunction {
    if !program.is_well_formed() {
        crate::crash!("refusing to compile a malformed program");
    }

    let mut asm = Assembler::new();
    let pc_labels: Vec<Label> = (0..=program.len()).map(|_| asm.new_label()).collect();
    let epilogue = asm.new_label();
    let footer = asm.new_label();

    match strategy {
        Strategy::Fixed => compile_fixed(&mut asm, program, caps, &pc_labels, epilogue, footer),
        Strategy::Lru => compile_lru(&mut asm, program, caps, &pc_labels, epilogue, footer),
    }

    asm.buffer_mut()
        .resolve_fixups(0)
        .unwrap_or_else(|_| crate::crash!("generated code referenced an unbound label"));
    JitFunction::new(&asm.into_bytes())
}

fn dirty_callee_saved(assigned: &[Gpr]) -> Vec<Gpr> {
    let mut dirty: Vec<Gpr> = CALLEE_SAVED_GP
        .iter()
        .copied()
        .filter(|r| assigned.contains(r))
        .collect();
    dirty.sort_by_key(|r| r.index());
    dirty
}

fn compile_fixed(
    asm: &mut Assembler,
    program: &Program,
    caps: &Capabilities,
    pc_labels: &[Label],
    epilogue: Label,
    footer: Label,
) {
    let gp_vregs = scalar_vregs(program);
    let xmm_vregs = vector_vregs(program);
    if gp_vregs.len() > GP_POOL.len() {
        crate::crash!(
            "program uses {} scalar registers, more than the {} fixed slots available",
            gp_vregs.len(),
            GP_POOL.len()
        );
    }
    if xmm_vregs.len() > XMM_POOL.len() {
        crate::crash!(
            "program uses {} vector registers, more than the {} fixed slots available",
            xmm_vregs.len(),
            XMM_POOL.len()
        );
    }

    let mut gp_map: [Option<Gpr>; 16] = [None; 16];
    let mut assigned_gp = Vec::new();
    for (v, phys) in gp_vregs.iter().zip(GP_POOL.iter()) {
        gp_map[*v as usize] = Some(*phys);
        assigned_gp.push(*phys);
    }
    let mut xmm_map: [Option<Xmm>; 16] = [None; 16];
    for (v, phys) in xmm_vregs.iter().zip(XMM_POOL.iter()) {
        xmm_map[*v as usize] = Some(*phys);
    }

    let dirty = dirty_callee_saved(&assigned_gp);
    for reg in &dirty {
        asm.push(*reg);
    }
    for (v, phys) in gp_map.iter().enumerate() {
        if let Some(phys) = phys {
            asm.load(Width::B64, *phys, RFP, r_offset(v as u8));
        }
    }
    for (v, phys) in xmm_map.iter().enumerate() {
        if let Some(phys) = phys {
            asm.movdqa_load(*phys, RFP, v_offset(v as u8));
        }
    }

    let mut source = FixedSource::new(gp_map, xmm_map);
    let mut scratch = Scratch::new();
    emit_body(asm, &mut scratch, &mut source, caps, program, pc_labels, epilogue);

    asm.bind_label(epilogue);
    for (v, phys) in gp_map.iter().enumerate() {
        if let Some(phys) = phys {
            asm.store(Width::B64, RFP, r_offset(v as u8), *phys);
        }
    }
    for (v, phys) in xmm_map.iter().enumerate() {
        if let Some(phys) = phys {
            asm.movdqa_store(RFP, v_offset(v as u8), *phys);
        }
    }
    emit_footer_and_return(asm, footer, &dirty);
}

fn compile_lru(
    asm: &mut Assembler,
    program: &Program,
    caps: &Capabilities,
    pc_labels: &[Label],
    epilogue: Label,
    footer: Label,
) {
    // The whole GP pool is in play here (no upfront assignment), so the
    // framer conservatively saves every callee-saved register the pool
    // could ever touch rather than tracking actual LRU usage.
    let dirty = dirty_callee_saved(GP_POOL);
    for reg in &dirty {
        asm.push(*reg);
    }

    let gp_lru = pinned_gp_allocator(GP_POOL.to_vec());
    let xmm_lru: Lru<Xmm> = Lru::new(XMM_POOL.to_vec());
    let mut source = LruSource::new(gp_lru, xmm_lru);
    let mut scratch = Scratch::new();
    emit_body(asm, &mut scratch, &mut source, caps, program, pc_labels, epilogue);

    asm.bind_label(epilogue);
    source.flush(asm, RFP);
    emit_footer_and_return(asm, footer, &dirty);
}

/// Emits every instruction body, handling the five control-flow opcodes
/// directly and delegating everything else to [`codegen::lower`].
fn emit_body<S: RegisterSource>(
    asm: &mut Assembler,
    scratch: &mut Scratch,
    source: &mut S,
    caps: &Capabilities,
    program: &Program,
    pc_labels: &[Label],
    epilogue: Label,
) {
    for (pc, inst) in program.instructions().iter().enumerate() {
        asm.bind_label(pc_labels[pc]);
        match inst.op().base() {
            Some(BaseOp::Nop) => {}
            Some(BaseOp::Jmp) => {
                let target = program
                    .jump_target(pc, inst.displacement())
                    .unwrap_or_else(|| crate::crash!("jump target out of range"));
                asm.jmp(pc_labels[target]);
            }
            Some(BaseOp::Jz) | Some(BaseOp::Jnz) => {
                let target = program
                    .jump_target(pc, inst.displacement())
                    .unwrap_or_else(|| crate::crash!("jump target out of range"));
                let reg = source.gp(asm, RFP, inst.rd());
                asm.alu_ri(x86enc::AluOp::Cmp, Width::B64, reg, 0);
                let cond = if inst.op().base() == Some(BaseOp::Jz) { Cond::Zero } else { Cond::NotZero };
                asm.jcc(cond, pc_labels[target]);
            }
            Some(BaseOp::Ret) => {
                asm.jmp(epilogue);
            }
            _ => codegen::lower(asm, scratch, source, RFP, caps, inst),
        }
    }
    asm.bind_label(pc_labels[program.len()]);
}

/// `FXSAVE64` the current FPU/SSE state into an embedded, 16-byte
/// aligned footer, restore the dirty callee-saved registers, and return
/// the footer's address in `rax`.
fn emit_footer_and_return(asm: &mut Assembler, footer: Label, dirty: &[Gpr]) {
    asm.fxsave64(footer);
    asm.lea_label(Gpr::Rax, footer);
    for reg in dirty.iter().rev() {
        asm.pop(*reg);
    }
    asm.ret();
    asm.buffer_mut().align16();
    asm.bind_label(footer);
    asm.buffer_mut().emit_bytes(&[0u8; 512]);
}

/// Scans `program` for every scalar (non-vector) virtual register index
/// actually referenced, in first-use order.
fn scalar_vregs(program: &Program) -> Vec<u8> {
    collect_vregs(program, false)
}

fn vector_vregs(program: &Program) -> Vec<u8> {
    collect_vregs(program, true)
}

fn collect_vregs(program: &Program, vec: bool) -> Vec<u8> {
    let mut seen = [false; 16];
    let mut order = Vec::new();
    let mut note = |v: u8, seen: &mut [bool; 16], order: &mut Vec<u8>| {
        if !seen[v as usize] {
            seen[v as usize] = true;
            order.push(v);
        }
    };
    for inst in program.instructions() {
        match inst.op().base() {
            Some(BaseOp::Jz) | Some(BaseOp::Jnz) if !vec => note(inst.rd(), &mut seen, &mut order),
            Some(BaseOp::Nop) | Some(BaseOp::Jmp) | Some(BaseOp::Jz) | Some(BaseOp::Jnz) | Some(BaseOp::Ret) => {}
            _ if inst.op().is_vec() == vec => {
                note(inst.rd(), &mut seen, &mut order);
                note(inst.ri(), &mut seen, &mut order);
                if inst.op().is_bin() && !inst.op().is_imm() {
                    note(inst.rj(), &mut seen, &mut order);
                }
            }
            _ => {}
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{ElementType, Instruction, Op, RegisterFile};

    fn add_ri(rd: u8, ri: u8, imm: i16) -> Instruction {
        Instruction::imm8(Op::new(BaseOp::Add, false, false, true), ElementType::I32, rd, ri, imm)
    }

    fn ret(rd: u8) -> Instruction {
        Instruction::reg1(Op::new(BaseOp::Ret, false, false, false), ElementType::I32, rd)
    }

    #[test]
    fn fixed_strategy_adds_a_constant_and_returns_it_through_the_register_file() {
        let program = Program::new(vec![add_ri(0, 0, 41), ret(0)]);
        let jf = compile(&program, &Capabilities::detect(), Strategy::Fixed);
        let mut rf = RegisterFile::zeroed();
        rf.write_int(ElementType::I32, 0, 1);
        unsafe {
            jf.call(&mut rf);
        }
        assert_eq!(rf.read_int(ElementType::I32, 0), 42);
    }

    #[test]
    fn lru_strategy_agrees_with_fixed_on_the_same_program() {
        let program = Program::new(vec![add_ri(0, 0, 41), ret(0)]);
        let caps = Capabilities::detect();

        let mut rf_fixed = RegisterFile::zeroed();
        rf_fixed.write_int(ElementType::I32, 0, 1);
        unsafe {
            compile(&program, &caps, Strategy::Fixed).call(&mut rf_fixed);
        }

        let mut rf_lru = RegisterFile::zeroed();
        rf_lru.write_int(ElementType::I32, 0, 1);
        unsafe {
            compile(&program, &caps, Strategy::Lru).call(&mut rf_lru);
        }

        assert_eq!(rf_fixed.read_int(ElementType::I32, 0), rf_lru.read_int(ElementType::I32, 0));
    }

    #[test]
    fn a_backward_branch_loop_counts_down_to_zero() {
        // r0 = 3; loop: r0 -= 1; jnz r0, loop; ret r0
        let dec = Instruction::imm8(Op::new(BaseOp::Sub, false, false, true), ElementType::I32, 0, 0, 1);
        let jnz = Instruction::jump(Op::new(BaseOp::Jnz, false, false, false), 0, -2);
        let program = Program::new(vec![dec, jnz, ret(0)]);
        assert!(program.is_well_formed());

        let jf = compile(&program, &Capabilities::detect(), Strategy::Fixed);
        let mut rf = RegisterFile::zeroed();
        rf.write_int(ElementType::I32, 0, 3);
        unsafe {
            jf.call(&mut rf);
        }
        assert_eq!(rf.read_int(ElementType::I32, 0), 0);
    }

    #[test]
    fn emulator_and_jit_agree_on_a_mixed_scalar_and_vector_program() {
        let scalar_add = add_ri(0, 0, 9);
        let vector_broadcast = Instruction::imm12(
            Op::new(BaseOp::Mov, true, false, true),
            ElementType::I32,
            0,
            0,
            7,
        );
        let vector_add = Instruction::reg3(
            Op::new(BaseOp::Add, true, true, false),
            ElementType::I32,
            0,
            0,
            0,
        );
        let program = Program::new(vec![scalar_add, vector_broadcast, vector_add, ret(0)]);
        assert!(program.is_well_formed());

        let mut initial = RegisterFile::zeroed();
        initial.write_int(ElementType::I32, 0, 1);
        crate::compare::assert_equivalent(&program, &initial, &Capabilities::detect(), Strategy::Lru);
    }
}
