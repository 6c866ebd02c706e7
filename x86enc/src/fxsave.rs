//! Layout of the 512-byte area written by `FXSAVE64` / read by `FXRSTOR64`.
//!
//! Only the fields the vector codegen cares about (the `XMM0..XMM15` save
//! slots) are named; everything else is present for size/offset fidelity
//! only, matching the Intel SDM's `FXSAVE_AREA` layout.

/// One 128-bit XMM save slot as raw bytes (the FXSAVE area makes no
/// claims about the element type stored in it).
pub type XmmSlot = [u8; 16];

/// The legacy/SSE state image written by `FXSAVE64`, 512 bytes, 16-byte
/// aligned. Field names follow the Intel SDM volume 1, section 10.5.1.
#[repr(C, align(16))]
#[derive(Clone, Copy)]
pub struct FxsaveArea {
    pub fcw: u16,
    pub fsw: u16,
    pub ftw: u8,
    _reserved1: u8,
    pub fop: u16,
    pub fip: u64,
    pub fdp: u64,
    pub mxcsr: u32,
    pub mxcsr_mask: u32,
    /// ST0..ST7 / MM0..MM7, 16 bytes each though only 10 are significant.
    pub st_mm: [[u8; 16]; 8],
    pub xmm: [XmmSlot; 16],
    _reserved2: [u8; 96],
}

const _: () = assert!(core::mem::size_of::<FxsaveArea>() == 512);

impl FxsaveArea {
    pub fn zeroed() -> FxsaveArea {
        // Safety: an all-zero bit pattern is valid for every field here
        // (plain integers and byte arrays, no padding-sensitive niches).
        unsafe { core::mem::zeroed() }
    }

    pub fn xmm_bytes(&self, index: usize) -> &XmmSlot {
        &self.xmm[index]
    }

    pub fn xmm_bytes_mut(&mut self, index: usize) -> &mut XmmSlot {
        &mut self.xmm[index]
    }
}

impl Default for FxsaveArea {
    fn default() -> Self {
        FxsaveArea::zeroed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_and_alignment_match_the_hardware_layout() {
        assert_eq!(core::mem::size_of::<FxsaveArea>(), 512);
        assert_eq!(core::mem::align_of::<FxsaveArea>(), 16);
    }

    #[test]
    fn xmm_slots_are_at_the_documented_offset() {
        let area = FxsaveArea::zeroed();
        let base = &area as *const _ as usize;
        let xmm0 = area.xmm_bytes(0) as *const _ as usize;
        assert_eq!(xmm0 - base, 32 + 128);
    }
}
