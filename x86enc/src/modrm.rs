//! REX/ModR/M/SIB/VEX primitives.
//!
//! Adapted from the prefix-flag style used by QEMU-derived x86_64 TCG
//! backends (see `examples/other_examples/..tcg-rs..x86_64-emitter.rs`):
//! an opcode is a small bitset of "needs this prefix byte" flags plus
//! the trailing opcode byte itself, so one generic `emit_opcode`
//! function handles REX/0x66/0x0F/0x0F38 for every instruction shape.

use crate::buffer::CodeBuffer;

/// `0x0F` escape.
pub const ESC_0F: u32 = 0x1_0000;
/// `0x0F 0x38` escape.
pub const ESC_0F38: u32 = 0x2_0000;
/// Mandatory `0x66` operand-size prefix (used by every SSE2 packed-integer op).
pub const PFX_66: u32 = 0x4_0000;
/// Mandatory `0xF3` prefix (scalar single-precision float ops, `MOVQ` xmm form).
pub const PFX_F3: u32 = 0x8_0000;
/// Mandatory `0xF2` prefix (scalar double-precision float ops).
pub const PFX_F2: u32 = 0x10_0000;
/// REX.W (64-bit operand size).
pub const REX_W: u32 = 0x20_0000;

fn opcode_byte(opc: u32) -> u8 {
    opc as u8
}

/// Emits the prefix bytes and trailing opcode byte described by `opc`'s
/// high bits, plus a REX prefix synthesized from `reg`/`rm`/`index`'s
/// high bit and `opc`'s `REX_W` flag. `reg`/`index` may be 0 when unused
/// by the instruction shape (group opcodes, `PUSH`/`POP`, ...).
fn emit_prefixes_and_opcode(buf: &mut CodeBuffer, opc: u32, reg: u8, index: u8, rm: u8) {
    if opc & PFX_66 != 0 {
        buf.emit_u8(0x66);
    }
    if opc & PFX_F3 != 0 {
        buf.emit_u8(0xF3);
    } else if opc & PFX_F2 != 0 {
        buf.emit_u8(0xF2);
    }

    let mut rex = 0u8;
    if opc & REX_W != 0 {
        rex |= 0x08;
    }
    if reg >= 8 {
        rex |= 0x04;
    }
    if index >= 8 {
        rex |= 0x02;
    }
    if rm >= 8 {
        rex |= 0x01;
    }
    if rex != 0 {
        buf.emit_u8(0x40 | rex);
    }

    if opc & ESC_0F38 != 0 {
        buf.emit_u8(0x0F);
        buf.emit_u8(0x38);
    } else if opc & ESC_0F != 0 {
        buf.emit_u8(0x0F);
    }

    buf.emit_u8(opcode_byte(opc));
}

/// Forces a REX prefix to be present even when no bit would otherwise be
/// set, needed for the byte-register forms (`SPL`/`BPL`/`SIL`/`DIL`) that
/// this encoder never emits but which the helper exists to make explicit.
pub fn force_rex_if_needed(buf: &mut CodeBuffer, opc: u32, reg: u8, index: u8, rm: u8) {
    emit_prefixes_and_opcode(buf, opc, reg, index, rm)
}

/// `opc /r`, register-to-register ModR/M byte (mod = 11).
pub fn emit_rr(buf: &mut CodeBuffer, opc: u32, reg: u8, rm: u8) {
    emit_prefixes_and_opcode(buf, opc, reg, 0, rm);
    buf.emit_u8(0xC0 | ((reg & 7) << 3) | (rm & 7));
}

/// `opc /digit`, register-only ModR/M with a numeric opcode extension in
/// place of a second register (group opcodes: shifts, `NOT`/`NEG`, ...).
pub fn emit_rr_ext(buf: &mut CodeBuffer, opc: u32, ext: u8, rm: u8) {
    emit_prefixes_and_opcode(buf, opc, ext, 0, rm);
    buf.emit_u8(0xC0 | ((ext & 7) << 3) | (rm & 7));
}

/// `opc /r`, `reg, [base + disp]` memory ModR/M (handles the RSP-needs-SIB
/// and RBP/R13-needs-disp8 special cases).
pub fn emit_rm(buf: &mut CodeBuffer, opc: u32, reg: u8, base: u8, disp: i32) {
    emit_prefixes_and_opcode(buf, opc, reg, 0, base);
    emit_modrm_mem(buf, reg & 7, base, disp);
}

/// `opc /digit`, numeric-extension form of [`emit_rm`].
pub fn emit_rm_ext(buf: &mut CodeBuffer, opc: u32, ext: u8, base: u8, disp: i32) {
    emit_prefixes_and_opcode(buf, opc, ext, 0, base);
    emit_modrm_mem(buf, ext & 7, base, disp);
}

fn emit_modrm_mem(buf: &mut CodeBuffer, reg_field: u8, base: u8, disp: i32) {
    let b3 = base & 7;
    let needs_sib = b3 == 4; // RSP/R12 always need a SIB byte.
    let needs_disp8_zero = b3 == 5; // RBP/R13 can't encode mod=00.

    if disp == 0 && !needs_disp8_zero {
        buf.emit_u8((reg_field << 3) | if needs_sib { 0x04 } else { b3 });
        if needs_sib {
            buf.emit_u8(0x24); // SIB: no index, base = RSP/R12.
        }
    } else if (-128..=127).contains(&disp) {
        buf.emit_u8(0x40 | (reg_field << 3) | if needs_sib { 0x04 } else { b3 });
        if needs_sib {
            buf.emit_u8(0x24);
        }
        buf.emit_u8(disp as i8 as u8);
    } else {
        buf.emit_u8(0x80 | (reg_field << 3) | if needs_sib { 0x04 } else { b3 });
        if needs_sib {
            buf.emit_u8(0x24);
        }
        buf.emit_u32(disp as u32);
    }
}

/// `opc /r`, `reg, [rip + disp32]` RIP-relative ModR/M, used to address
/// the embedded constant pool / FXSAVE area from within the function body.
/// Leaves the disp32 field unwritten; the caller immediately follows this
/// with `buf.emit_rel32_fixup(label)`, which is exactly the "relative to
/// the byte after this 4-byte field" semantics RIP-relative addressing
/// wants when (as here) nothing else trails the displacement.
pub fn emit_rip_rel(buf: &mut CodeBuffer, opc: u32, reg: u8) {
    emit_prefixes_and_opcode(buf, opc, reg, 0, 0b101);
    buf.emit_u8(((reg & 7) << 3) | 0b101);
}

/// Three-byte VEX prefix (`C4`) encoding for `VEX.128.pp.mmmmm` forms.
/// `map` is 1 for the `0F` map, 2 for `0F38`. `pp` is 0/1/2/3 for
/// none/66/F3/F2. `vvvv` is the NDS/NDD source register (already in
/// 0..=15 form; this function inverts it per the VEX encoding).
pub fn emit_vex(buf: &mut CodeBuffer, map: u8, pp: u8, rexw: bool, vvvv: u8, reg: u8, rm: u8) {
    buf.emit_u8(0xC4);
    let r_bit = if reg >= 8 { 0 } else { 0x80 };
    let x_bit = 0x40; // index unused by any VEX form this encoder emits.
    let b_bit = if rm >= 8 { 0 } else { 0x20 };
    buf.emit_u8(r_bit | x_bit | b_bit | (map & 0x1F));
    let w_bit = if rexw { 0x80 } else { 0 };
    let vvvv_bits = (!vvvv & 0xF) << 3;
    buf.emit_u8(w_bit | vvvv_bits | (pp & 0x3));
}

/// VEX-prefixed `opc /r`, three-register form (`dst, src1(vvvv), src2(rm)`).
pub fn emit_vex_rr(buf: &mut CodeBuffer, map: u8, pp: u8, rexw: bool, opc_byte: u8, reg: u8, vvvv: u8, rm: u8) {
    emit_vex(buf, map, pp, rexw, vvvv, reg, rm);
    buf.emit_u8(opc_byte);
    buf.emit_u8(0xC0 | ((reg & 7) << 3) | (rm & 7));
}

/// VEX-prefixed `opc /digit ib`, used by the immediate-count packed shifts.
pub fn emit_vex_rr_ext(buf: &mut CodeBuffer, map: u8, pp: u8, opc_byte: u8, ext: u8, vvvv: u8, rm: u8) {
    emit_vex(buf, map, pp, false, vvvv, ext, rm);
    buf.emit_u8(opc_byte);
    buf.emit_u8(0xC0 | ((ext & 7) << 3) | (rm & 7));
}
