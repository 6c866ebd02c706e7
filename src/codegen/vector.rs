//! Vector lowering: one packed op lowers to one (or a short constant
//! sequence of) SSE2/AVX instructions on the ISA profiles that have
//! them, or to the generic per-lane scalar fallback below otherwise.
//! Comparisons synthesize every predicate from native GT/EQ only (§4.6).

use x86enc::{AluOp, Assembler, Gpr, ShiftOp, Width, Xmm};

use crate::ir::{BaseOp, ElementType, Instruction};
use crate::isa::{Capabilities, IsaProfile};
use crate::regalloc::Scratch;

use super::source::{v_offset, RegisterSource};

/// The second vector operand: another vector register, or (for
/// `VMOVI`/`vXXXi` forms) a broadcast immediate.
enum Rhs {
    Reg(u8),
    Imm(i16),
}

fn rhs_of(inst: &Instruction) -> Rhs {
    if inst.op().is_imm() {
        Rhs::Imm(inst.imm())
    } else {
        Rhs::Reg(inst.rj())
    }
}

pub fn lower<S: RegisterSource>(
    asm: &mut Assembler,
    scratch: &mut Scratch,
    source: &mut S,
    rfp: Gpr,
    caps: &Capabilities,
    inst: &Instruction,
) {
    scratch.reset();
    let ty = inst.ty();
    if matches!(ty, ElementType::F16 | ElementType::F8) {
        crate::crash!("{} has no defined lowering", ty);
    }
    let base = inst.op().base().expect("dispatcher already validated the opcode");
    let profile = caps.profile();

    // No packed-float encoder exists in this generator (no ADDPS/ADDPD
    // family): float vectors always decompose lanewise onto the scalar
    // float sequences, which already handle both F32 and F64 correctly.
    if profile == IsaProfile::Scalar || ty.is_float() {
        fallback::lower(asm, scratch, rfp, inst, base, ty);
        return;
    }

    // Widths/ops with no profitable native encoding always take the
    // lane-wise fallback, regardless of how capable the host is.
    let needs_fallback = matches!(base, BaseOp::Mul) && matches!(ty.size_bytes(), 1 | 8)
        || matches!(base, BaseOp::Sra) && ty.size_bytes() == 8
        || base.is_cmp() && ty.size_bytes() == 8
        || matches!(base, BaseOp::Sll | BaseOp::Srl | BaseOp::Sra) && ty.size_bytes() == 1
        || matches!(base, BaseOp::Sll | BaseOp::Srl | BaseOp::Sra) && matches!(rhs_of(inst), Rhs::Reg(_));
    if needs_fallback {
        fallback::lower(asm, scratch, rfp, inst, base, ty);
        return;
    }

    lower_int(asm, scratch, source, rfp, profile, inst, base, ty);
}

fn lower_int<S: RegisterSource>(
    asm: &mut Assembler,
    scratch: &mut Scratch,
    source: &mut S,
    rfp: Gpr,
    profile: IsaProfile,
    inst: &Instruction,
    base: BaseOp,
    ty: ElementType,
) {
    let rd = inst.rd();

    match base {
        BaseOp::Mov if inst.op().is_imm() => {
            // Broadcast-immediate: materialize the value in a GP
            // register, move it into the low lane, then shuffle it to
            // every lane of the destination width.
            let imm = inst.imm() as i64;
            let tmp = scratch.gp.acquire();
            asm.mov_ri(Width::B64, *tmp, broadcast_pattern(imm, ty));
            let dst = source.xmm_dest(asm, rfp, rd);
            asm.movd_to_xmm(dst, *tmp, true);
            broadcast_qword(asm, profile, dst);
        }
        BaseOp::Mov => {
            let src = source.xmm(asm, rfp, inst.ri());
            let dst = source.xmm_dest(asm, rfp, rd);
            movdqa(asm, profile, dst, src);
        }
        BaseOp::Neg => {
            // 0 - src, lanewise.
            let src = source.xmm(asm, rfp, inst.ri());
            let zero = scratch.xmm.acquire();
            asm.pxor(zero.reg(), zero.reg());
            let dst = source.xmm_dest(asm, rfp, rd);
            sub_native(ty).emit(asm, profile, dst, zero.reg(), src);
        }
        BaseOp::Bnot => {
            let src = source.xmm(asm, rfp, inst.ri());
            let ones = scratch.xmm.acquire();
            all_ones(asm, ones.reg());
            let dst = source.xmm_dest(asm, rfp, rd);
            xor_native().emit(asm, profile, dst, src, ones.reg());
        }
        BaseOp::Inv => {
            // lane == 0 -> all-ones, else -> 0: (lane == 0) IS the mask.
            let src = source.xmm(asm, rfp, inst.ri());
            let zero = scratch.xmm.acquire();
            asm.pxor(zero.reg(), zero.reg());
            let dst = source.xmm_dest(asm, rfp, rd);
            eq_native(ty).emit(asm, profile, dst, src, zero.reg());
        }
        BaseOp::Add => add_native(ty).emit_rhs(asm, scratch, source, rfp, profile, inst, rd),
        BaseOp::Sub => sub_native(ty).emit_rhs(asm, scratch, source, rfp, profile, inst, rd),
        BaseOp::Rsub => {
            // dst = rj - ri: swap operand order into the native subtract.
            let a = rhs_operand(asm, scratch, source, rfp, inst);
            let b = source.xmm(asm, rfp, inst.ri());
            let dst = source.xmm_dest(asm, rfp, rd);
            sub_native(ty).emit(asm, profile, dst, a, b);
        }
        BaseOp::Mul => mul_native(ty).emit_rhs(asm, scratch, source, rfp, profile, inst, rd),
        BaseOp::Band => and_native().emit_rhs(asm, scratch, source, rfp, profile, inst, rd),
        BaseOp::Bor => or_native().emit_rhs(asm, scratch, source, rfp, profile, inst, rd),
        BaseOp::Bxor => xor_native().emit_rhs(asm, scratch, source, rfp, profile, inst, rd),
        BaseOp::Bandn => {
            // PANDN computes ~dst & src: the destination must start out
            // holding `ri` (the operand to complement), not `rj`.
            let a = source.xmm(asm, rfp, inst.ri());
            let b = rhs_operand(asm, scratch, source, rfp, inst);
            let dst = source.xmm_dest(asm, rfp, rd);
            if dst != a {
                movdqa(asm, profile, dst, a);
            }
            match profile {
                IsaProfile::Avx => asm.vpandn(dst, dst, b),
                _ => asm.pandn(dst, b),
            }
        }
        BaseOp::Sll | BaseOp::Srl | BaseOp::Sra => lower_shift_imm(asm, source, rfp, profile, inst, base, ty, rd),
        _ if base.is_cmp() => lower_compare(asm, scratch, source, rfp, profile, inst, base, ty, rd),
        BaseOp::Nop | BaseOp::Jmp | BaseOp::Jz | BaseOp::Jnz | BaseOp::Ret => {
            unreachable!("control-flow ops are handled by the framer, not the lowering table")
        }
        _ => unreachable!("every BaseOp variant is handled above via is_cmp()"),
    }
}

/// Resolves `rj` (register or broadcast immediate) to a live XMM value.
fn rhs_operand<S: RegisterSource>(
    asm: &mut Assembler,
    scratch: &mut Scratch,
    source: &mut S,
    rfp: Gpr,
    inst: &Instruction,
) -> Xmm {
    match rhs_of(inst) {
        Rhs::Reg(rj) => source.xmm(asm, rfp, rj),
        Rhs::Imm(imm) => {
            let tmp_gp = scratch.gp.acquire();
            asm.mov_ri(Width::B64, *tmp_gp, broadcast_pattern(imm as i64, inst.ty()));
            let x = scratch.xmm.acquire();
            asm.movd_to_xmm(x.reg(), *tmp_gp, true);
            broadcast_qword(asm, IsaProfile::Sse2, x.reg());
            x.reg()
        }
    }
}

fn movdqa(asm: &mut Assembler, profile: IsaProfile, dst: Xmm, src: Xmm) {
    if dst == src {
        return;
    }
    match profile {
        IsaProfile::Avx => asm.vmovdqa(dst, src),
        _ => asm.movdqa_rr(dst, src),
    }
}

fn all_ones(asm: &mut Assembler, reg: Xmm) {
    asm.pcmpeqb(reg, reg);
}

/// Repeats a narrow immediate to fill 64 bits, so a single `MOVQ` +
/// shuffle broadcasts it to every lane regardless of element width.
fn broadcast_pattern(imm: i64, ty: ElementType) -> i64 {
    let bits = imm as u64 & mask_for(ty.size_bits());
    let mut pattern = bits;
    let mut filled = ty.size_bits();
    while filled < 64 {
        pattern |= pattern << filled;
        filled *= 2;
    }
    pattern as i64
}

fn mask_for(bits: u32) -> u64 {
    if bits >= 64 {
        u64::MAX
    } else {
        (1u64 << bits) - 1
    }
}

/// Spreads the low 64 bits (already the correct repeating byte pattern)
/// across both 64-bit halves of the register.
fn broadcast_qword(asm: &mut Assembler, profile: IsaProfile, reg: Xmm) {
    match profile {
        IsaProfile::Avx => asm.vpshufd(reg, reg, 0b01_00_01_00),
        _ => asm.pshufd(reg, reg, 0b01_00_01_00),
    }
}

struct BinaryNative {
    avx: fn(&mut Assembler, Xmm, Xmm, Xmm),
    sse2: fn(&mut Assembler, Xmm, Xmm),
    commutative: bool,
}

impl BinaryNative {
    fn emit(&self, asm: &mut Assembler, profile: IsaProfile, dst: Xmm, a: Xmm, b: Xmm) {
        match profile {
            IsaProfile::Avx => (self.avx)(asm, dst, a, b),
            _ => {
                if dst != a {
                    asm.movdqa_rr(dst, a);
                }
                (self.sse2)(asm, dst, b);
            }
        }
    }

    fn emit_rhs<S: RegisterSource>(
        &self,
        asm: &mut Assembler,
        scratch: &mut Scratch,
        source: &mut S,
        rfp: Gpr,
        profile: IsaProfile,
        inst: &Instruction,
        rd: u8,
    ) {
        let a = source.xmm(asm, rfp, inst.ri());
        let b = rhs_operand(asm, scratch, source, rfp, inst);
        let dst = source.xmm_dest(asm, rfp, rd);
        if self.commutative && dst == b && dst != a {
            self.emit(asm, profile, dst, b, a);
        } else {
            self.emit(asm, profile, dst, a, b);
        }
    }
}

fn add_native(ty: ElementType) -> BinaryNative {
    match ty.size_bytes() {
        1 => BinaryNative { avx: |a, d, x, y| a.vpaddb(d, x, y), sse2: |a, d, s| a.paddb(d, s), commutative: true },
        2 => BinaryNative { avx: |a, d, x, y| a.vpaddw(d, x, y), sse2: |a, d, s| a.paddw(d, s), commutative: true },
        4 => BinaryNative { avx: |a, d, x, y| a.vpaddd(d, x, y), sse2: |a, d, s| a.paddd(d, s), commutative: true },
        _ => BinaryNative { avx: |a, d, x, y| a.vpaddq(d, x, y), sse2: |a, d, s| a.paddq(d, s), commutative: true },
    }
}

fn sub_native(ty: ElementType) -> BinaryNative {
    match ty.size_bytes() {
        1 => BinaryNative { avx: |a, d, x, y| a.vpsubb(d, x, y), sse2: |a, d, s| a.psubb(d, s), commutative: false },
        2 => BinaryNative { avx: |a, d, x, y| a.vpsubw(d, x, y), sse2: |a, d, s| a.psubw(d, s), commutative: false },
        4 => BinaryNative { avx: |a, d, x, y| a.vpsubd(d, x, y), sse2: |a, d, s| a.psubd(d, s), commutative: false },
        _ => BinaryNative { avx: |a, d, x, y| a.vpsubq(d, x, y), sse2: |a, d, s| a.psubq(d, s), commutative: false },
    }
}

/// Only called for 16/32-bit element types; 8/64-bit route through the
/// lane-wise fallback before reaching here.
fn mul_native(ty: ElementType) -> BinaryNative {
    match ty.size_bytes() {
        2 => BinaryNative { avx: |a, d, x, y| a.vpmullw(d, x, y), sse2: |a, d, s| a.pmullw(d, s), commutative: true },
        4 => BinaryNative { avx: |a, d, x, y| a.vpmulld(d, x, y), sse2: |a, d, s| a.pmulld(d, s), commutative: true },
        other => unreachable!("vector mul at {}-byte width should have used the fallback", other),
    }
}

fn and_native() -> BinaryNative {
    BinaryNative { avx: |a, d, x, y| a.vpand(d, x, y), sse2: |a, d, s| a.pand(d, s), commutative: true }
}
fn or_native() -> BinaryNative {
    BinaryNative { avx: |a, d, x, y| a.vpor(d, x, y), sse2: |a, d, s| a.por(d, s), commutative: true }
}
fn xor_native() -> BinaryNative {
    BinaryNative { avx: |a, d, x, y| a.vpxor(d, x, y), sse2: |a, d, s| a.pxor(d, s), commutative: true }
}

fn gt_native(ty: ElementType) -> BinaryNative {
    match ty.size_bytes() {
        1 => BinaryNative { avx: |a, d, x, y| a.vpcmpgtb(d, x, y), sse2: |a, d, s| a.pcmpgtb(d, s), commutative: false },
        2 => BinaryNative { avx: |a, d, x, y| a.vpcmpgtw(d, x, y), sse2: |a, d, s| a.pcmpgtw(d, s), commutative: false },
        _ => BinaryNative { avx: |a, d, x, y| a.vpcmpgtd(d, x, y), sse2: |a, d, s| a.pcmpgtd(d, s), commutative: false },
    }
}

fn eq_native(ty: ElementType) -> BinaryNative {
    match ty.size_bytes() {
        1 => BinaryNative { avx: |a, d, x, y| a.vpcmpeqb(d, x, y), sse2: |a, d, s| a.pcmpeqb(d, s), commutative: true },
        2 => BinaryNative { avx: |a, d, x, y| a.vpcmpeqw(d, x, y), sse2: |a, d, s| a.pcmpeqw(d, s), commutative: true },
        _ => BinaryNative { avx: |a, d, x, y| a.vpcmpeqd(d, x, y), sse2: |a, d, s| a.pcmpeqd(d, s), commutative: true },
    }
}

/// `pcmpgt`/`pcmpeq` only compare as signed; unsigned compares flip the
/// sign bit of both operands first so the signed compare orders them
/// the same way an unsigned compare would (the standard bias trick).
fn bias_to_signed(asm: &mut Assembler, profile: IsaProfile, scratch: &mut Scratch, ty: ElementType, reg: Xmm) -> Xmm {
    if ty.is_signed() {
        return reg;
    }
    let bias = scratch.xmm.acquire();
    match ty.size_bytes() {
        // x86 has no byte-granularity shift, so the word-shift trick the
        // other widths use can't produce a uniform per-byte 0x80 — it
        // leaves alternating bytes at 0xFF. Materialize the pattern
        // directly instead.
        1 => {
            let tmp = scratch.gp.acquire();
            asm.mov_ri(Width::B64, *tmp, broadcast_pattern(0x80, ElementType::U8));
            asm.movd_to_xmm(bias.reg(), *tmp, true);
            broadcast_qword(asm, profile, bias.reg());
        }
        _ => {
            all_ones(asm, bias.reg()); // all-ones...
            bias_via_shift(asm, profile, ty, bias.reg());
        }
    };
    // `bias` now holds the sign bit of each lane; XOR it into a copy of
    // `reg` and leave `reg` itself untouched (the caller reuses it).
    let biased = scratch.xmm.acquire();
    movdqa(asm, profile, biased.reg(), reg);
    xor_native().emit(asm, profile, biased.reg(), biased.reg(), bias.reg());
    biased.reg()
}

/// Shifts an all-ones register so only the sign bit of each lane survives,
/// for the element widths x86 actually has a lane-shift instruction for.
fn bias_via_shift(asm: &mut Assembler, profile: IsaProfile, ty: ElementType, reg: Xmm) {
    match ty.size_bytes() {
        2 => match profile {
            IsaProfile::Avx => asm.vpsllw_i(reg, reg, 15),
            _ => asm.psllw_i(reg, 15),
        },
        4 => match profile {
            IsaProfile::Avx => asm.vpslld_i(reg, reg, 31),
            _ => asm.pslld_i(reg, 31),
        },
        _ => unreachable!("64-bit unsigned compares use the fallback"),
    }
}

fn lower_compare<S: RegisterSource>(
    asm: &mut Assembler,
    scratch: &mut Scratch,
    source: &mut S,
    rfp: Gpr,
    profile: IsaProfile,
    inst: &Instruction,
    base: BaseOp,
    ty: ElementType,
    rd: u8,
) {
    let a_raw = source.xmm(asm, rfp, inst.ri());
    let b_raw = rhs_operand(asm, scratch, source, rfp, inst);
    let a = bias_to_signed(asm, profile, scratch, ty, a_raw);
    let b = bias_to_signed(asm, profile, scratch, ty, b_raw);

    // Every predicate is one of GT(a,b), GT(b,a), EQ(a,b), or the
    // logical negation of one of those (§4.6).
    let (op, swap, negate) = match base {
        BaseOp::CmpGt => (gt_native(ty), false, false),
        BaseOp::CmpLt => (gt_native(ty), true, false),
        BaseOp::CmpGe => (gt_native(ty), true, true),
        BaseOp::CmpLe => (gt_native(ty), false, true),
        BaseOp::CmpEq => (eq_native(ty), false, false),
        BaseOp::CmpNe => (eq_native(ty), false, true),
        _ => unreachable!(),
    };
    let (x, y) = if swap { (b, a) } else { (a, b) };
    let dst = source.xmm_dest(asm, rfp, rd);
    op.emit(asm, profile, dst, x, y);
    if negate {
        let ones = scratch.xmm.acquire();
        all_ones(asm, ones.reg());
        xor_native().emit(asm, profile, dst, dst, ones.reg());
    }
}

fn lower_shift_imm<S: RegisterSource>(
    asm: &mut Assembler,
    source: &mut S,
    rfp: Gpr,
    profile: IsaProfile,
    inst: &Instruction,
    base: BaseOp,
    ty: ElementType,
    rd: u8,
) {
    let count = match rhs_of(inst) {
        Rhs::Imm(imm) => (imm as u32 & (ty.size_bits() - 1)) as u8,
        Rhs::Reg(_) => unreachable!("shift-by-register routes through the fallback before reaching here"),
    };
    // 8-bit shifts have no packed encoding at all and route through the
    // lane-wise fallback before reaching here.
    let src = source.xmm(asm, rfp, inst.ri());
    let dst = source.xmm_dest(asm, rfp, rd);

    let shift = shift_op_for(base);
    match (profile, ty.size_bytes()) {
        (IsaProfile::Avx, 2) => match shift {
            ShiftOp::Shl => asm.vpsllw_i(dst, src, count),
            ShiftOp::Shr => asm.vpsrlw_i(dst, src, count),
            ShiftOp::Sar => asm.vpsraw_i(dst, src, count),
        },
        (IsaProfile::Avx, 4) => match shift {
            ShiftOp::Shl => asm.vpslld_i(dst, src, count),
            ShiftOp::Shr => asm.vpsrld_i(dst, src, count),
            ShiftOp::Sar => asm.vpsrad_i(dst, src, count),
        },
        (IsaProfile::Avx, _) => match shift {
            ShiftOp::Shl => asm.vpsllq_i(dst, src, count),
            ShiftOp::Shr => asm.vpsrlq_i(dst, src, count),
            ShiftOp::Sar => unreachable!("64-bit arithmetic shift right routes through the fallback"),
        },
        (_, width) => {
            if dst != src {
                asm.movdqa_rr(dst, src);
            }
            match (shift, width) {
                (ShiftOp::Shl, 2) => asm.psllw_i(dst, count),
                (ShiftOp::Shr, 2) => asm.psrlw_i(dst, count),
                (ShiftOp::Sar, 2) => asm.psraw_i(dst, count),
                (ShiftOp::Shl, 4) => asm.pslld_i(dst, count),
                (ShiftOp::Shr, 4) => asm.psrld_i(dst, count),
                (ShiftOp::Sar, 4) => asm.psrad_i(dst, count),
                (ShiftOp::Shl, _) => asm.psllq_i(dst, count),
                (ShiftOp::Shr, _) => asm.psrlq_i(dst, count),
                (ShiftOp::Sar, _) => unreachable!("64-bit arithmetic shift right routes through the fallback"),
            }
        }
    }
}

fn shift_op_for(base: BaseOp) -> ShiftOp {
    match base {
        BaseOp::Sll => ShiftOp::Shl,
        BaseOp::Srl => ShiftOp::Shr,
        BaseOp::Sra => ShiftOp::Sar,
        _ => unreachable!(),
    }
}

/// The generic, ISA-independent path: decomposes a vector op into one
/// scalar GP-register operation per lane, reading/writing `v[]` directly
/// in the register file rather than through a resident XMM register.
/// Used for the forced-scalar ISA profile and for every op with no
/// profitable native vector encoding (8-/64-bit multiply, 64-bit
/// arithmetic shift right, 64-bit compares, float vectors, shift by a
/// per-lane register operand).
mod fallback {
    use super::*;

    pub fn lower(asm: &mut Assembler, scratch: &mut Scratch, rfp: Gpr, inst: &Instruction, base: BaseOp, ty: ElementType) {
        let lanes = ty.lanes();
        let bytes = ty.size_bytes() as i32;
        let rd = inst.rd();
        let ri = inst.ri();
        let rhs = rhs_of(inst);

        for lane in 0..lanes {
            let off = lane as i32 * bytes;
            one_lane(asm, scratch, rfp, base, ty, rd, ri, &rhs, off);
        }
    }

    fn one_lane(
        asm: &mut Assembler,
        scratch: &mut Scratch,
        rfp: Gpr,
        base: BaseOp,
        ty: ElementType,
        rd: u8,
        ri: u8,
        rhs: &Rhs,
        off: i32,
    ) {
        if ty.is_float() {
            one_lane_float(asm, scratch, rfp, base, ty, rd, ri, rhs, off);
            return;
        }
        let width = match ty.size_bytes() {
            1 => Width::B8,
            2 => Width::B16,
            4 => Width::B32,
            _ => Width::B64,
        };
        let a = scratch.gp.acquire();
        asm.load(width, *a, rfp, v_offset(ri) + off);

        let result = match base {
            BaseOp::Mov if matches!(rhs, Rhs::Imm(_)) => {
                if let Rhs::Imm(imm) = rhs {
                    asm.mov_ri(width, *a, *imm as i64);
                }
                *a
            }
            BaseOp::Mov => *a,
            BaseOp::Neg => {
                asm.neg(width, *a);
                *a
            }
            BaseOp::Bnot => {
                asm.not(width, *a);
                *a
            }
            BaseOp::Inv => {
                let skip = asm.new_label();
                asm.alu_ri(AluOp::Cmp, width, *a, 0);
                asm.jcc(x86enc::Cond::Eq, skip);
                asm.mov_ri(width, *a, 0);
                let done = asm.new_label();
                asm.jmp(done);
                asm.bind_label(skip);
                asm.mov_ri(width, *a, -1);
                asm.bind_label(done);
                *a
            }
            _ => {
                let b = scratch.gp.acquire();
                match rhs {
                    Rhs::Imm(imm) => asm.mov_ri(width, *b, *imm as i64),
                    Rhs::Reg(rj) => asm.load(width, *b, rfp, v_offset(*rj) + off),
                }
                apply_binary(asm, base, ty, width, *a, *b)
            }
        };
        asm.store(width, rfp, v_offset(rd) + off, result);
    }

    fn apply_binary(asm: &mut Assembler, base: BaseOp, ty: ElementType, width: Width, a: Gpr, b: Gpr) -> Gpr {
        match base {
            BaseOp::Add => asm.alu_rr(AluOp::Add, width, a, b),
            BaseOp::Sub => asm.alu_rr(AluOp::Sub, width, a, b),
            BaseOp::Rsub => {
                asm.neg(width, a);
                asm.alu_rr(AluOp::Add, width, a, b);
            }
            BaseOp::Mul => asm.imul_rr(width, a, b),
            BaseOp::Band => asm.alu_rr(AluOp::And, width, a, b),
            BaseOp::Bandn => {
                asm.not(width, a);
                asm.alu_rr(AluOp::And, width, a, b);
            }
            BaseOp::Bor => asm.alu_rr(AluOp::Or, width, a, b),
            BaseOp::Bxor => asm.alu_rr(AluOp::Xor, width, a, b),
            BaseOp::Sll => shift_by_register(asm, ShiftOp::Shl, width, a, b),
            BaseOp::Srl => shift_by_register(asm, ShiftOp::Shr, width, a, b),
            BaseOp::Sra => shift_by_register(asm, ShiftOp::Sar, width, a, b),
            _ if base.is_cmp() => {
                asm.cmp_rr(width, a, b);
                materialize_mask(asm, a, width, cond_for(base, ty.is_signed()));
            }
            _ => unreachable!("{:?} has no lane-wise fallback", base),
        }
        a
    }

    fn one_lane_float(
        asm: &mut Assembler,
        scratch: &mut Scratch,
        rfp: Gpr,
        base: BaseOp,
        ty: ElementType,
        rd: u8,
        ri: u8,
        rhs: &Rhs,
        off: i32,
    ) {
        let is64 = ty == ElementType::F64;
        let width = if is64 { Width::B64 } else { Width::B32 };
        let a = scratch.gp.acquire();
        asm.load(width, *a, rfp, v_offset(ri) + off);
        match (base, rhs) {
            (BaseOp::Mov, Rhs::Imm(imm)) => {
                let tmp = scratch.gp.acquire();
                asm.mov_ri(Width::B64, *tmp, *imm as i64);
                let x = scratch.xmm.acquire();
                if is64 {
                    asm.cvtsi2sd(x.reg(), *tmp, true);
                } else {
                    asm.cvtsi2ss(x.reg(), *tmp, true);
                }
                asm.movd_from_xmm(*a, x.reg(), is64);
                asm.store(width, rfp, v_offset(rd) + off, *a);
                return;
            }
            (BaseOp::Mov, Rhs::Reg(_)) => {
                asm.store(width, rfp, v_offset(rd) + off, *a);
                return;
            }
            _ => {}
        }

        if base == BaseOp::Bnot {
            asm.not(width, *a);
            asm.store(width, rfp, v_offset(rd) + off, *a);
            return;
        }

        let xa = scratch.xmm.acquire();
        asm.movd_to_xmm(xa.reg(), *a, is64);

        if base == BaseOp::Neg {
            let zero = scratch.xmm.acquire();
            asm.pxor(zero.reg(), zero.reg());
            if is64 {
                asm.subsd(zero.reg(), xa.reg());
            } else {
                asm.subss(zero.reg(), xa.reg());
            }
            asm.movd_from_xmm(*a, zero.reg(), is64);
            asm.store(width, rfp, v_offset(rd) + off, *a);
            return;
        }

        if base == BaseOp::Inv {
            // v == 0.0 -> 1.0, else -> 0.0; a floating compare against
            // zero (not an integer bit test), so -0.0 counts as zero too.
            let zero = scratch.xmm.acquire();
            asm.pxor(zero.reg(), zero.reg());
            if is64 {
                asm.comisd(xa.reg(), zero.reg());
            } else {
                asm.comiss(xa.reg(), zero.reg());
            }
            let not_equal = asm.new_label();
            let done = asm.new_label();
            asm.jcc(x86enc::Cond::Ne, not_equal);
            let one_bits: i64 = if is64 { 0x3FF0000000000000u64 as i64 } else { 0x3F80_0000_i64 };
            asm.mov_ri(width, *a, one_bits);
            asm.jmp(done);
            asm.bind_label(not_equal);
            asm.mov_ri(width, *a, 0);
            asm.bind_label(done);
            asm.store(width, rfp, v_offset(rd) + off, *a);
            return;
        }

        let b = scratch.gp.acquire();
        match rhs {
            Rhs::Reg(rj) => asm.load(width, *b, rfp, v_offset(*rj) + off),
            Rhs::Imm(_) => crate::crash!("float vector ops do not support an immediate rhs"),
        }
        let xb = scratch.xmm.acquire();
        asm.movd_to_xmm(xb.reg(), *b, is64);

        match base {
            BaseOp::Add if is64 => {
                asm.addsd(xa.reg(), xb.reg());
                asm.movd_from_xmm(*a, xa.reg(), is64);
            }
            BaseOp::Add => {
                asm.addss(xa.reg(), xb.reg());
                asm.movd_from_xmm(*a, xa.reg(), is64);
            }
            BaseOp::Sub if is64 => {
                asm.subsd(xa.reg(), xb.reg());
                asm.movd_from_xmm(*a, xa.reg(), is64);
            }
            BaseOp::Sub => {
                asm.subss(xa.reg(), xb.reg());
                asm.movd_from_xmm(*a, xa.reg(), is64);
            }
            BaseOp::Rsub if is64 => {
                asm.subsd(xb.reg(), xa.reg());
                asm.movd_from_xmm(*a, xb.reg(), is64);
            }
            BaseOp::Rsub => {
                asm.subss(xb.reg(), xa.reg());
                asm.movd_from_xmm(*a, xb.reg(), is64);
            }
            BaseOp::Mul if is64 => {
                asm.mulsd(xa.reg(), xb.reg());
                asm.movd_from_xmm(*a, xa.reg(), is64);
            }
            BaseOp::Mul => {
                asm.mulss(xa.reg(), xb.reg());
                asm.movd_from_xmm(*a, xa.reg(), is64);
            }
            _ if base.is_cmp() => {
                if is64 {
                    asm.comisd(xa.reg(), xb.reg());
                } else {
                    asm.comiss(xa.reg(), xb.reg());
                }
                materialize_float_mask(asm, *a, width, cond_for(base, false));
            }
            _ => unreachable!("{:?} has no float lane fallback", base),
        }
        asm.store(width, rfp, v_offset(rd) + off, *a);
    }

    fn shift_by_register(asm: &mut Assembler, op: ShiftOp, width: Width, a: Gpr, b: Gpr) {
        // `a`/`b` come from the scratch pool, which never hands out RCX,
        // so the save/restore below can never clobber either operand.
        asm.push(Gpr::Rcx);
        asm.mov_rr(Width::B32, Gpr::Rcx, b);
        asm.shift_cl(op, width, a);
        asm.pop(Gpr::Rcx);
    }

    fn materialize_mask(asm: &mut Assembler, dst: Gpr, width: Width, cond: x86enc::Cond) {
        let skip = asm.new_label();
        asm.mov_ri(width, dst, -1);
        asm.jcc(cond, skip);
        asm.mov_ri(width, dst, 0);
        asm.bind_label(skip);
    }

    /// Float-comparison counterpart of [`materialize_mask`]: `COMISS`/
    /// `COMISD` raise `PF` alongside `ZF`/`CF` when an operand is NaN, so
    /// every predicate but `!=` must treat the unordered case as false
    /// and `!=` must treat it as true.
    fn materialize_float_mask(asm: &mut Assembler, dst: Gpr, width: Width, cond: x86enc::Cond) {
        let skip = asm.new_label();
        asm.mov_ri(width, dst, -1);
        if cond == x86enc::Cond::Ne {
            asm.jcc(x86enc::Cond::Parity, skip);
            asm.jcc(x86enc::Cond::Ne, skip);
            asm.mov_ri(width, dst, 0);
        } else {
            let unordered_or_false = asm.new_label();
            asm.jcc(x86enc::Cond::Parity, unordered_or_false);
            asm.jcc(cond, skip);
            asm.bind_label(unordered_or_false);
            asm.mov_ri(width, dst, 0);
        }
        asm.bind_label(skip);
    }

    fn cond_for(base: BaseOp, signed: bool) -> x86enc::Cond {
        use x86enc::Cond;
        match base {
            BaseOp::CmpLt => Cond::Lt { signed },
            BaseOp::CmpLe => Cond::Le { signed },
            BaseOp::CmpEq => Cond::Eq,
            BaseOp::CmpNe => Cond::Ne,
            BaseOp::CmpGt => Cond::Gt { signed },
            BaseOp::CmpGe => Cond::Ge { signed },
            _ => unreachable!(),
        }
    }
}
