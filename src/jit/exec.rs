//! Executable memory: copies a finished code buffer into an
//! `mmap`-backed page and exposes it as a callable native function.
//!
//! The embedded `FXSAVE64` footer (see [`super::compile`]) is data the
//! function itself writes at runtime, so the mapping has to stay
//! writable as well as executable — there is no separate read-only code
//! page plus a read-write data page here, just one RWX region. Hardening
//! that split is out of scope for this generator.

use std::os::raw::c_void;

use x86enc::FxsaveArea;

use crate::ir::RegisterFile;

/// The native function signature every compiled program conforms to:
/// takes the register-file pointer, returns the address of the
/// `FXSAVE64` footer the epilogue wrote right before returning.
pub type EntryFn = unsafe extern "C" fn(*mut RegisterFile) -> *const FxsaveArea;

/// An mmap'd, page-owning callable. Frees its mapping on drop.
pub struct JitFunction {
    ptr: *mut c_void,
    len: usize,
    entry: EntryFn,
}

// Safety: the mapping is immutable machine code once built, and the
// only mutation that ever happens to it (the embedded FXSAVE footer)
// is performed by the native code itself while it runs, not from Rust.
unsafe impl Send for JitFunction {}
unsafe impl Sync for JitFunction {}

impl JitFunction {
    /// Maps `code` into a fresh RWX page and returns a callable wrapping
    /// it. `code` must already have every label fixup resolved.
    pub fn new(code: &[u8]) -> JitFunction {
        let len = page_round(code.len().max(1));
        let ptr = unsafe {
            libc::mmap(
                std::ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE | libc::PROT_EXEC,
                libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
                -1,
                0,
            )
        };
        if ptr == libc::MAP_FAILED {
            crate::crash!("mmap failed for a {}-byte executable region", len);
        }
        unsafe {
            std::ptr::copy_nonoverlapping(code.as_ptr(), ptr as *mut u8, code.len());
        }
        let entry: EntryFn = unsafe { std::mem::transmute::<*mut c_void, EntryFn>(ptr) };
        JitFunction { ptr, len, entry }
    }

    /// Calls the compiled function against `rf`, in place. Safety: `rf`
    /// must describe a well-formed 16-scalar/16-vector register file;
    /// the caller is trusting bytes this crate generated.
    pub unsafe fn call(&self, rf: &mut RegisterFile) -> *const FxsaveArea {
        (self.entry)(rf as *mut RegisterFile)
    }
}

impl Drop for JitFunction {
    fn drop(&mut self) {
        unsafe {
            libc::munmap(self.ptr, self.len);
        }
    }
}

fn page_round(n: usize) -> usize {
    let page = 4096;
    (n + page - 1) / page * page
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn an_empty_ret_only_function_leaves_the_register_file_untouched() {
        // C3 = RET with no prolog/epilog; a minimal smoke test that the
        // mmap/call/munmap path itself works end to end.
        let jf = JitFunction::new(&[0xC3]);
        let mut rf = RegisterFile::zeroed();
        unsafe {
            jf.call(&mut rf);
        }
        assert_eq!(rf, RegisterFile::zeroed());
    }
}
