//! Growable code buffer with a label/fixup system.
//!
//! Grounded on the patch-list pattern used by hand-rolled x86-64 JIT
//! emitters (e.g. an eBPF-to-x86_64 JIT's `jump_patches` +
//! `insn_offsets` + `patch_jumps`): labels are declared up front,
//! bound to a byte offset exactly once, and every reference to an
//! unbound label is recorded as a `(patch_offset, label)` pair that
//! gets resolved in one pass once the whole function has been emitted.

/// An as-yet-unresolved (or resolved) destination in the code buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Label(pub(crate) u32);

#[derive(Debug, Clone, Copy)]
enum PatchKind {
    /// A 32-bit displacement relative to the byte right after the patch site.
    Rel32,
    /// An absolute 64-bit little-endian pointer, relocated against the
    /// buffer's eventual load address.
    Abs64,
}

struct Patch {
    at: u32,
    label: Label,
    kind: PatchKind,
}

/// Accumulates machine code bytes and resolves label references.
pub struct CodeBuffer {
    bytes: Vec<u8>,
    label_offsets: Vec<Option<u32>>,
    patches: Vec<Patch>,
}

impl CodeBuffer {
    pub fn new() -> CodeBuffer {
        CodeBuffer {
            bytes: Vec::new(),
            label_offsets: Vec::new(),
            patches: Vec::new(),
        }
    }

    pub fn offset(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn emit_u8(&mut self, b: u8) {
        self.bytes.push(b);
    }

    pub fn emit_bytes(&mut self, bs: &[u8]) {
        self.bytes.extend_from_slice(bs);
    }

    pub fn emit_u32(&mut self, v: u32) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    pub fn emit_u64(&mut self, v: u64) {
        self.bytes.extend_from_slice(&v.to_le_bytes());
    }

    /// Pads with `0xCC` (INT3) up to a 16-byte boundary, used to keep the
    /// embedded FXSAVE area aligned.
    pub fn align16(&mut self) {
        while self.bytes.len() % 16 != 0 {
            self.bytes.push(0xCC);
        }
    }

    /// Declares a new, unbound label.
    pub fn new_label(&mut self) -> Label {
        self.label_offsets.push(None);
        Label((self.label_offsets.len() - 1) as u32)
    }

    /// Binds `label` to the current buffer offset. A label may only be
    /// bound once.
    pub fn bind_label(&mut self, label: Label) {
        let offset = self.offset();
        let slot = &mut self.label_offsets[label.0 as usize];
        assert!(slot.is_none(), "label {:?} bound twice", label);
        *slot = Some(offset);
    }

    /// Emits a 32-bit rel32 placeholder and records a fixup against
    /// `label`. The displacement is relative to the byte after the
    /// 4-byte field being written (i.e. the end of the containing
    /// instruction, matching x86 `Jcc`/`CALL`/`JMP rel32` semantics).
    pub fn emit_rel32_fixup(&mut self, label: Label) {
        let at = self.offset();
        self.patches.push(Patch {
            at,
            label,
            kind: PatchKind::Rel32,
        });
        self.emit_u32(0);
    }

    /// Emits an 8-byte placeholder and records an absolute-address fixup
    /// against `label`, used for the constant pool and the embedded
    /// FXSAVE data section when referenced as raw pointers rather than
    /// RIP-relative operands.
    pub fn emit_abs64_fixup(&mut self, label: Label) {
        let at = self.offset();
        self.patches.push(Patch {
            at,
            label,
            kind: PatchKind::Abs64,
        });
        self.emit_u64(0);
    }

    /// Resolves every recorded fixup against its bound label. `base_addr`
    /// is the address the buffer will be loaded at, needed for `Abs64`
    /// fixups; `Rel32` fixups are position-independent and ignore it.
    pub fn resolve_fixups(&mut self, base_addr: u64) -> Result<(), Label> {
        for patch in &self.patches {
            let target = self.label_offsets[patch.label.0 as usize].ok_or(patch.label)?;
            match patch.kind {
                PatchKind::Rel32 => {
                    let rel = (target as i64) - (patch.at as i64 + 4);
                    let rel = rel as i32;
                    self.bytes[patch.at as usize..patch.at as usize + 4]
                        .copy_from_slice(&rel.to_le_bytes());
                }
                PatchKind::Abs64 => {
                    let abs = base_addr + target as u64;
                    self.bytes[patch.at as usize..patch.at as usize + 8]
                        .copy_from_slice(&abs.to_le_bytes());
                }
            }
        }
        Ok(())
    }

    /// The address of a bound label relative to the start of the buffer.
    pub fn label_offset(&self, label: Label) -> Option<u32> {
        self.label_offsets[label.0 as usize]
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl Default for CodeBuffer {
    fn default() -> Self {
        CodeBuffer::new()
    }
}
