//! Capability gate: which x86 vector extensions the host supports, and
//! which subset the caller has enabled for this compilation.

use bitflags::bitflags;

bitflags! {
    /// One bit per x86 vector extension the lowering tables might need.
    /// `MMX` is tracked for completeness even though no lowering uses it.
    pub struct Features: u32 {
        const MMX     = 0b0000_0001;
        const SSE     = 0b0000_0010;
        const SSE2    = 0b0000_0100;
        const SSE3    = 0b0000_1000;
        const SSSE3   = 0b0001_0000;
        const SSE4_1  = 0b0010_0000;
        const SSE4_2  = 0b0100_0000;
        const AVX     = 0b1000_0000;
        const AVX2    = 0b1_0000_0000;
    }
}

impl Features {
    /// The set every x86-64 CPU supports unconditionally (SSE/SSE2 are
    /// part of the baseline ABI), used as the floor for `enabled` even
    /// when detection is skipped (e.g. in tests).
    pub fn baseline() -> Features {
        Features::SSE | Features::SSE2
    }
}

/// Detected host capabilities plus the caller-configured subset actually
/// available to lowering. Kept as two separate bitsets (§4.3) so a test
/// harness can force the SSE2-only path on an AVX2-capable host by
/// narrowing `enabled` without re-detecting `available`.
#[derive(Debug, Clone, Copy)]
pub struct Capabilities {
    available: Features,
    enabled: Features,
}

impl Capabilities {
    /// Detects host support via `is_x86_feature_detected!` and enables
    /// everything detected.
    #[cfg(target_arch = "x86_64")]
    pub fn detect() -> Capabilities {
        let mut available = Features::empty();
        available.set(Features::MMX, std::is_x86_feature_detected!("mmx"));
        available.set(Features::SSE, std::is_x86_feature_detected!("sse"));
        available.set(Features::SSE2, std::is_x86_feature_detected!("sse2"));
        available.set(Features::SSE3, std::is_x86_feature_detected!("sse3"));
        available.set(Features::SSSE3, std::is_x86_feature_detected!("ssse3"));
        available.set(Features::SSE4_1, std::is_x86_feature_detected!("sse4.1"));
        available.set(Features::SSE4_2, std::is_x86_feature_detected!("sse4.2"));
        available.set(Features::AVX, std::is_x86_feature_detected!("avx"));
        available.set(Features::AVX2, std::is_x86_feature_detected!("avx2"));
        Capabilities { available, enabled: available }
    }

    #[cfg(not(target_arch = "x86_64"))]
    pub fn detect() -> Capabilities {
        Capabilities::none()
    }

    /// Nothing enabled: the scalar-fallback path only. Used by tests that
    /// want to exercise scalar lowering on any host.
    pub fn none() -> Capabilities {
        Capabilities { available: Features::empty(), enabled: Features::empty() }
    }

    /// Everything available, as if detected on a fully-featured host.
    pub fn all() -> Capabilities {
        Capabilities { available: Features::all(), enabled: Features::all() }
    }

    pub fn available(&self) -> Features {
        self.available
    }

    pub fn enabled(&self) -> Features {
        self.enabled
    }

    /// Narrows `enabled` to `features & available`. Enabling an implied
    /// ancestor set (e.g. SSE2 alongside SSE4.1) is the caller's
    /// responsibility (§4.3); this does not compute transitive closure.
    pub fn set_enabled(&mut self, features: Features) {
        self.enabled = features & self.available;
    }

    /// Forces `enabled` down to a fixed ISA profile regardless of what
    /// the host actually supports, used by the test harness to exercise
    /// every lowering path on a single machine.
    pub fn force_profile(profile: IsaProfile) -> Capabilities {
        let enabled = match profile {
            IsaProfile::Scalar => Features::empty(),
            IsaProfile::Sse2 => Features::baseline(),
            IsaProfile::Avx => Features::baseline() | Features::AVX | Features::AVX2,
        };
        Capabilities { available: Features::all(), enabled }
    }

    pub fn use_sse2(&self) -> bool {
        self.enabled.contains(Features::SSE2)
    }

    pub fn use_sse3(&self) -> bool {
        self.enabled.contains(Features::SSE3)
    }

    pub fn use_ssse3(&self) -> bool {
        self.enabled.contains(Features::SSSE3)
    }

    pub fn use_sse4_1(&self) -> bool {
        self.enabled.contains(Features::SSE4_1)
    }

    pub fn use_sse4_2(&self) -> bool {
        self.enabled.contains(Features::SSE4_2)
    }

    pub fn use_avx(&self) -> bool {
        self.enabled.contains(Features::AVX)
    }

    pub fn use_avx2(&self) -> bool {
        self.enabled.contains(Features::AVX2)
    }

    /// The coarse profile lowering dispatches on: AVX beats SSE2 beats
    /// scalar fallback.
    pub fn profile(&self) -> IsaProfile {
        if self.use_avx() {
            IsaProfile::Avx
        } else if self.use_sse2() {
            IsaProfile::Sse2
        } else {
            IsaProfile::Scalar
        }
    }
}

/// The three back-ends the generator picks among per operation (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsaProfile {
    Avx,
    Sse2,
    Scalar,
}

impl IsaProfile {
    pub const ALL: [IsaProfile; 3] = [IsaProfile::Avx, IsaProfile::Sse2, IsaProfile::Scalar];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forced_profiles_disable_everything_above_them() {
        let caps = Capabilities::force_profile(IsaProfile::Sse2);
        assert!(caps.use_sse2());
        assert!(!caps.use_avx());
        assert_eq!(caps.profile(), IsaProfile::Sse2);
    }

    #[test]
    fn set_enabled_cannot_exceed_available() {
        let mut caps = Capabilities::none();
        caps.set_enabled(Features::AVX2);
        assert!(!caps.use_avx2());
    }

    #[test]
    fn scalar_profile_has_nothing_enabled() {
        let caps = Capabilities::force_profile(IsaProfile::Scalar);
        assert_eq!(caps.profile(), IsaProfile::Scalar);
        assert!(!caps.use_sse2());
    }
}
