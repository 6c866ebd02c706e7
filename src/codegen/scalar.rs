//! Scalar (non-vector) lowering. Every scalar value, float included,
//! lives in a GP register as a raw bit pattern (§3: "the element-type
//! field decides which sub-field is read/written"); float arithmetic
//! stages the bits through an XMM scratch register since x86 has no
//! integer-unit float ALU.

use x86enc::{AluOp, Assembler, Cond, Gpr, ShiftOp, Width};

use crate::ir::{BaseOp, ElementType, Instruction};
use crate::regalloc::Scratch;

use super::source::RegisterSource;

fn width_of(ty: ElementType) -> Width {
    match ty.size_bits() {
        8 => Width::B8,
        16 => Width::B16,
        32 => Width::B32,
        _ => Width::B64,
    }
}

fn cond_for(base: BaseOp, signed: bool) -> Cond {
    match base {
        BaseOp::CmpLt => Cond::Lt { signed },
        BaseOp::CmpLe => Cond::Le { signed },
        BaseOp::CmpEq => Cond::Eq,
        BaseOp::CmpNe => Cond::Ne,
        BaseOp::CmpGt => Cond::Gt { signed },
        BaseOp::CmpGe => Cond::Ge { signed },
        _ => unreachable!("{:?} is not a comparison", base),
    }
}

fn alu_op_for(base: BaseOp) -> AluOp {
    match base {
        BaseOp::Add => AluOp::Add,
        BaseOp::Band => AluOp::And,
        BaseOp::Bor => AluOp::Or,
        BaseOp::Bxor => AluOp::Xor,
        _ => unreachable!("{:?} has no direct AluOp mapping", base),
    }
}

/// Lowers one scalar instruction against `asm`, using `source` to find
/// the physical register backing each virtual register and `scratch`
/// for any temporaries the sequence needs. `rfp` is the register-file
/// pointer, needed only so `source` can spill/reload through memory.
pub fn lower<S: RegisterSource>(
    asm: &mut Assembler,
    scratch: &mut Scratch,
    source: &mut S,
    rfp: Gpr,
    inst: &Instruction,
) {
    scratch.reset();
    let ty = inst.ty();
    if matches!(ty, ElementType::F16 | ElementType::F8) {
        crate::crash!("{} has no defined lowering", ty);
    }
    let width = width_of(ty);
    let base = inst.op().base().expect("dispatcher already validated the opcode");

    if ty.is_float() {
        lower_float(asm, scratch, source, rfp, inst, base, ty);
        return;
    }

    let rd = inst.rd();
    match base {
        BaseOp::Mov => {
            let dst = source.gp_dest(asm, rfp, rd);
            if inst.op().is_imm() {
                asm.mov_ri(width, dst, inst.imm() as i64);
            } else {
                let src = source.gp(asm, rfp, inst.ri());
                asm.mov_rr(width, dst, src);
            }
        }
        BaseOp::Neg => {
            let src = source.gp(asm, rfp, inst.ri());
            let dst = source.gp_dest(asm, rfp, rd);
            asm.mov_rr(width, dst, src);
            asm.neg(width, dst);
        }
        BaseOp::Bnot => {
            let src = source.gp(asm, rfp, inst.ri());
            let dst = source.gp_dest(asm, rfp, rd);
            asm.mov_rr(width, dst, src);
            asm.not(width, dst);
        }
        BaseOp::Inv => {
            // Logical complement of a mask: 0 -> all-ones, else -> 0.
            let src = source.gp(asm, rfp, inst.ri());
            asm.alu_ri(AluOp::Cmp, width, src, 0);
            materialize_mask(asm, source, rfp, rd, width, Cond::Eq);
        }
        BaseOp::Add | BaseOp::Band | BaseOp::Bor | BaseOp::Bxor => {
            lower_commutative(asm, source, rfp, inst, width, alu_op_for(base));
        }
        BaseOp::Sub => lower_sub(asm, source, rfp, width, rd, inst.ri(), inst.rj_or_imm(), inst.op().is_imm()),
        BaseOp::Rsub => lower_sub(asm, source, rfp, width, rd, inst.rj_or_imm(), inst.ri(), inst.op().is_imm()),
        BaseOp::Mul => lower_mul(asm, source, rfp, inst, width),
        BaseOp::Sll | BaseOp::Srl | BaseOp::Sra => lower_shift(asm, scratch, source, rfp, inst, width, base),
        BaseOp::Bandn => lower_bandn(asm, source, rfp, inst, width),
        _ if base.is_cmp() => lower_compare_int(asm, source, rfp, inst, width, ty, base),
        BaseOp::Nop | BaseOp::Jmp | BaseOp::Jz | BaseOp::Jnz | BaseOp::Ret => {
            unreachable!("control-flow ops are handled by the framer, not the lowering table")
        }
    }
}

/// Reads the second source operand as a raw `i64`, whether it's `rj` or
/// an immediate; the caller has already checked `op.is_imm()`.
trait RjOrImm {
    fn rj_or_imm(&self) -> RegOrImm;
}

#[derive(Clone, Copy)]
pub enum RegOrImm {
    Reg(u8),
    Imm(i64),
}

impl RjOrImm for Instruction {
    fn rj_or_imm(&self) -> RegOrImm {
        if self.op().is_imm() {
            RegOrImm::Imm(self.imm() as i64)
        } else {
            RegOrImm::Reg(self.rj())
        }
    }
}

fn lower_commutative<S: RegisterSource>(
    asm: &mut Assembler,
    source: &mut S,
    rfp: Gpr,
    inst: &Instruction,
    width: Width,
    op: AluOp,
) {
    let rd = inst.rd();
    let s1 = source.gp(asm, rfp, inst.ri());
    match inst.rj_or_imm() {
        RegOrImm::Imm(imm) => {
            let dst = source.gp_dest(asm, rfp, rd);
            asm.mov_rr(width, dst, s1);
            asm.alu_ri(op, width, dst, imm as i32);
        }
        RegOrImm::Reg(rj_idx) => {
            let s2 = source.gp(asm, rfp, rj_idx);
            let dst = source.gp_dest(asm, rfp, rd);
            if dst == s1 {
                asm.alu_rr(op, width, dst, s2);
            } else if dst == s2 {
                asm.alu_rr(op, width, dst, s1);
            } else {
                asm.mov_rr(width, dst, s1);
                asm.alu_rr(op, width, dst, s2);
            }
        }
    }
}

fn lower_sub<S: RegisterSource>(
    asm: &mut Assembler,
    source: &mut S,
    rfp: Gpr,
    width: Width,
    rd: u8,
    s1_reg: u8,
    rhs: RegOrImm,
    _is_imm: bool,
) {
    let s1 = source.gp(asm, rfp, s1_reg);
    match rhs {
        RegOrImm::Imm(imm) => {
            let dst = source.gp_dest(asm, rfp, rd);
            asm.mov_rr(width, dst, s1);
            asm.alu_ri(AluOp::Sub, width, dst, imm as i32);
        }
        RegOrImm::Reg(rj_idx) => {
            let s2 = source.gp(asm, rfp, rj_idx);
            let dst = source.gp_dest(asm, rfp, rd);
            if dst == s1 && dst == s2 {
                asm.mov_ri(width, dst, 0);
            } else if dst == s1 {
                asm.alu_rr(AluOp::Sub, width, dst, s2);
            } else if dst == s2 {
                asm.neg(width, dst);
                asm.alu_rr(AluOp::Add, width, dst, s1);
            } else {
                asm.mov_rr(width, dst, s1);
                asm.alu_rr(AluOp::Sub, width, dst, s2);
            }
        }
    }
}

fn lower_mul<S: RegisterSource>(asm: &mut Assembler, source: &mut S, rfp: Gpr, inst: &Instruction, width: Width) {
    let rd = inst.rd();
    let s1 = source.gp(asm, rfp, inst.ri());
    match inst.rj_or_imm() {
        RegOrImm::Imm(imm) => {
            let dst = source.gp_dest(asm, rfp, rd);
            asm.mov_rr(width, dst, s1);
            asm.mov_ri(width, Gpr::R11, imm); // r11 is in the scratch pool; safe as a transient imul operand.
            asm.imul_rr(width, dst, Gpr::R11);
        }
        RegOrImm::Reg(rj_idx) => {
            let s2 = source.gp(asm, rfp, rj_idx);
            let dst = source.gp_dest(asm, rfp, rd);
            if dst == s1 {
                asm.imul_rr(width, dst, s2);
            } else if dst == s2 {
                asm.imul_rr(width, dst, s1);
            } else {
                asm.mov_rr(width, dst, s1);
                asm.imul_rr(width, dst, s2);
            }
        }
    }
}

fn lower_bandn<S: RegisterSource>(asm: &mut Assembler, source: &mut S, rfp: Gpr, inst: &Instruction, width: Width) {
    // BANDN(d,i,j) = ~r[i] & r[j]: non-commutative, so it gets its own
    // aliasing handling rather than reusing `lower_commutative`.
    let rd = inst.rd();
    let s1 = source.gp(asm, rfp, inst.ri());
    let rhs = inst.rj_or_imm();
    let dst = source.gp_dest(asm, rfp, rd);
    match rhs {
        RegOrImm::Imm(imm) => {
            asm.mov_rr(width, dst, s1);
            asm.not(width, dst);
            asm.alu_ri(AluOp::And, width, dst, imm as i32);
        }
        RegOrImm::Reg(rj_idx) => {
            let s2 = source.gp(asm, rfp, rj_idx);
            if dst == s2 && dst != s1 {
                // `and` is commutative, so compute ~s1 in a copy first.
                asm.mov_rr(width, Gpr::R11, s1);
                asm.not(width, Gpr::R11);
                asm.alu_rr(AluOp::And, width, dst, Gpr::R11);
            } else {
                asm.mov_rr(width, dst, s1);
                asm.not(width, dst);
                asm.alu_rr(AluOp::And, width, dst, s2);
            }
        }
    }
}

fn lower_shift<S: RegisterSource>(
    asm: &mut Assembler,
    scratch: &mut Scratch,
    source: &mut S,
    rfp: Gpr,
    inst: &Instruction,
    width: Width,
    base: BaseOp,
) {
    let op = match base {
        BaseOp::Sll => ShiftOp::Shl,
        BaseOp::Srl => ShiftOp::Shr,
        BaseOp::Sra => ShiftOp::Sar,
        _ => unreachable!(),
    };
    let rd = inst.rd();
    let s1 = source.gp(asm, rfp, inst.ri());
    match inst.rj_or_imm() {
        RegOrImm::Imm(count) => {
            let dst = source.gp_dest(asm, rfp, rd);
            asm.mov_rr(width, dst, s1);
            asm.shift_ri(op, width, dst, (count as u32 & (width.bytes() * 8 - 1)) as u8);
        }
        RegOrImm::Reg(rj_idx) => {
            // Shift by register needs the count in CL (§4.6); save/reload
            // RCX around a scratch copy of the shiftee.
            let s2 = source.gp(asm, rfp, rj_idx);
            let tmp = scratch.gp.acquire();
            asm.push(Gpr::Rcx);
            asm.mov_rr(width, *tmp, s1);
            asm.mov_rr(Width::B32, Gpr::Rcx, s2);
            asm.shift_cl(op, width, *tmp);
            let tmp_reg = tmp.reg();
            drop(tmp);
            // Restore RCX before resolving `dst`: if `dst` happens to be
            // the physical RCX (vreg1 is pinned there by the LRU
            // allocator), writing the result first and popping after
            // would clobber it right back.
            asm.pop(Gpr::Rcx);
            let dst = source.gp_dest(asm, rfp, rd);
            asm.mov_rr(width, dst, tmp_reg);
        }
    }
}

fn lower_compare_int<S: RegisterSource>(
    asm: &mut Assembler,
    source: &mut S,
    rfp: Gpr,
    inst: &Instruction,
    width: Width,
    ty: ElementType,
    base: BaseOp,
) {
    let rd = inst.rd();
    let s1 = source.gp(asm, rfp, inst.ri());
    let cond = cond_for(base, ty.is_signed());
    match inst.rj_or_imm() {
        RegOrImm::Imm(imm) => {
            asm.alu_ri(AluOp::Cmp, width, s1, imm as i32);
        }
        RegOrImm::Reg(rj_idx) => {
            let s2 = source.gp(asm, rfp, rj_idx);
            asm.cmp_rr(width, s1, s2);
        }
    }
    materialize_mask(asm, source, rfp, rd, width, cond);
}

/// `MOV dst,0; Jcc skip; DEC dst; skip:` — zero decremented by one is
/// all-ones of the destination width, the trick §4.6 uses to turn a
/// flags-register condition into a −1/0 mask without a branch per bit.
fn materialize_mask<S: RegisterSource>(asm: &mut Assembler, source: &mut S, rfp: Gpr, rd: u8, width: Width, cond: Cond) {
    let dst = source.gp_dest(asm, rfp, rd);
    let skip = asm.new_label();
    asm.mov_ri(width, dst, 0);
    asm.jcc(negate(cond), skip);
    asm.alu_ri(AluOp::Sub, width, dst, 1);
    asm.bind_label(skip);
}

fn negate(cond: Cond) -> Cond {
    match cond {
        Cond::Eq => Cond::Ne,
        Cond::Ne => Cond::Eq,
        Cond::Lt { signed } => Cond::Ge { signed },
        Cond::Le { signed } => Cond::Gt { signed },
        Cond::Gt { signed } => Cond::Le { signed },
        Cond::Ge { signed } => Cond::Lt { signed },
        Cond::Zero => Cond::NotZero,
        Cond::NotZero => Cond::Zero,
        Cond::Parity => Cond::NotParity,
        Cond::NotParity => Cond::Parity,
    }
}

/// Float-comparison counterpart of [`materialize_mask`]: `COMISS`/`COMISD`
/// set `ZF = PF = CF = 1` when either operand is NaN, so the plain
/// `Jcc`-on-`cond` sequence above would call `CMPEQ(NaN, NaN)` true (it
/// takes the `JE` branch) and `CMPNE(NaN, NaN)` false. Every comparison
/// except `!=` is false on an unordered pair; `!=` is the one comparison
/// that must be true, so it gets its own branch shape.
fn materialize_float_mask<S: RegisterSource>(asm: &mut Assembler, source: &mut S, rfp: Gpr, rd: u8, width: Width, cond: Cond) {
    let dst = source.gp_dest(asm, rfp, rd);
    let skip = asm.new_label();
    asm.mov_ri(width, dst, 0);
    if cond == Cond::Ne {
        let set_true = asm.new_label();
        asm.jcc(Cond::Parity, set_true);
        asm.jcc(Cond::Eq, skip);
        asm.bind_label(set_true);
        asm.alu_ri(AluOp::Sub, width, dst, 1);
    } else {
        asm.jcc(Cond::Parity, skip);
        asm.jcc(negate(cond), skip);
        asm.alu_ri(AluOp::Sub, width, dst, 1);
    }
    asm.bind_label(skip);
}

fn lower_float<S: RegisterSource>(
    asm: &mut Assembler,
    scratch: &mut Scratch,
    source: &mut S,
    rfp: Gpr,
    inst: &Instruction,
    base: BaseOp,
    ty: ElementType,
) {
    let is64 = ty == ElementType::F64;
    let rd = inst.rd();

    macro_rules! to_xmm {
        ($gp:expr) => {{
            let x = scratch.xmm.acquire();
            asm.movd_to_xmm(x.reg(), $gp, is64);
            x
        }};
    }

    match base {
        BaseOp::Mov if inst.op().is_imm() => {
            let dst = source.gp_dest(asm, rfp, rd);
            let gp_tmp = scratch.gp.acquire();
            asm.mov_ri(Width::B64, *gp_tmp, inst.imm() as i64);
            let x = scratch.xmm.acquire();
            if is64 {
                asm.cvtsi2sd(x.reg(), *gp_tmp, true);
            } else {
                asm.cvtsi2ss(x.reg(), *gp_tmp, true);
            }
            asm.movd_from_xmm(dst, x.reg(), is64);
        }
        BaseOp::Mov => {
            let src = source.gp(asm, rfp, inst.ri());
            let dst = source.gp_dest(asm, rfp, rd);
            asm.mov_rr(if is64 { Width::B64 } else { Width::B32 }, dst, src);
        }
        BaseOp::Neg => {
            let src = source.gp(asm, rfp, inst.ri());
            let xs = to_xmm!(src);
            let zero = scratch.xmm.acquire();
            asm.pxor(zero.reg(), zero.reg());
            if is64 {
                asm.subsd(zero.reg(), xs.reg());
            } else {
                asm.subss(zero.reg(), xs.reg());
            }
            let dst = source.gp_dest(asm, rfp, rd);
            asm.movd_from_xmm(dst, zero.reg(), is64);
        }
        _ if base.is_cmp() => {
            let s1 = source.gp(asm, rfp, inst.ri());
            let s2 = match inst.rj_or_imm() {
                RegOrImm::Reg(rj_idx) => source.gp(asm, rfp, rj_idx),
                RegOrImm::Imm(_) => crate::crash!("float comparisons do not support an immediate operand"),
            };
            let x1 = to_xmm!(s1);
            let x2 = to_xmm!(s2);
            if is64 {
                asm.comisd(x1.reg(), x2.reg());
            } else {
                asm.comiss(x1.reg(), x2.reg());
            }
            // COMISS/COMISD always sets flags as an unsigned compare.
            let cond = cond_for(base, false);
            let mask_width = if is64 { Width::B64 } else { Width::B32 };
            materialize_float_mask(asm, source, rfp, rd, mask_width, cond);
        }
        _ if base.is_binary() => {
            let s1 = source.gp(asm, rfp, inst.ri());
            let s2 = match inst.rj_or_imm() {
                RegOrImm::Reg(rj_idx) => source.gp(asm, rfp, rj_idx),
                RegOrImm::Imm(_) => crate::crash!("float binary ops do not support an immediate operand"),
            };
            let x1 = to_xmm!(s1);
            let x2 = to_xmm!(s2);
            // RSUB(d,i,j) = j - i: swap the operand feeding the accumulator.
            let (a, b) = match base {
                BaseOp::Rsub => (x2.reg(), x1.reg()),
                _ => (x1.reg(), x2.reg()),
            };
            let acc = scratch.xmm.acquire();
            asm.movq_xmm_xmm(acc.reg(), a);
            match base {
                BaseOp::Add if is64 => asm.addsd(acc.reg(), b),
                BaseOp::Add => asm.addss(acc.reg(), b),
                BaseOp::Mul if is64 => asm.mulsd(acc.reg(), b),
                BaseOp::Mul => asm.mulss(acc.reg(), b),
                BaseOp::Sub | BaseOp::Rsub if is64 => asm.subsd(acc.reg(), b),
                BaseOp::Sub | BaseOp::Rsub => asm.subss(acc.reg(), b),
                _ => unreachable!(),
            }
            let dst = source.gp_dest(asm, rfp, rd);
            asm.movd_from_xmm(dst, acc.reg(), is64);
        }
        BaseOp::Bnot => {
            let src = source.gp(asm, rfp, inst.ri());
            let dst = source.gp_dest(asm, rfp, rd);
            let width = if is64 { Width::B64 } else { Width::B32 };
            asm.mov_rr(width, dst, src);
            asm.not(width, dst);
        }
        BaseOp::Inv => {
            // v == 0.0 -> 1.0, else -> 0.0; a floating compare against zero
            // (not an integer bit test) so -0.0 counts as zero too.
            let width = if is64 { Width::B64 } else { Width::B32 };
            let src = source.gp(asm, rfp, inst.ri());
            let xs = to_xmm!(src);
            let zero = scratch.xmm.acquire();
            asm.pxor(zero.reg(), zero.reg());
            if is64 {
                asm.comisd(xs.reg(), zero.reg());
            } else {
                asm.comiss(xs.reg(), zero.reg());
            }
            let dst = source.gp_dest(asm, rfp, rd);
            let not_equal = asm.new_label();
            let done = asm.new_label();
            asm.jcc(Cond::Ne, not_equal);
            let one_bits: i64 = if is64 { 0x3FF0000000000000u64 as i64 } else { 0x3F80_0000_i64 };
            asm.mov_ri(width, dst, one_bits);
            asm.jmp(done);
            asm.bind_label(not_equal);
            asm.mov_ri(width, dst, 0);
            asm.bind_label(done);
        }
        BaseOp::Nop | BaseOp::Jmp | BaseOp::Jz | BaseOp::Jnz | BaseOp::Ret => unreachable!(),
        _ => unreachable!("every BaseOp variant is handled above via is_cmp()/is_binary()"),
    }
}
