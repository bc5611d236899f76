//! OS release / CPU ABI oracles and the status-code vocabulary shared with
//! the platform audio stack.

use bitflags::bitflags;

/// `status_t` success.
pub const NO_ERROR: i32 = 0;
/// `status_t` for an object whose remote/native side is gone. Returned by
/// every operation on a session that has been marked dead.
pub const DEAD_OBJECT: i32 = -32;
/// Sentinel for parameters the running OS release cannot honor. Distinct
/// from every real `status_t` the platform library produces.
pub const BAD_PARAMETER: i32 = i32::MIN;
/// Sentinel for queries that have no answer on the running OS release.
pub const UNSUPPORTED: i32 = i32::MAX;

// from AOSP system/audio.h
pub const AUDIO_STREAM_MUSIC: i32 = 3;
pub const AUDIO_USAGE_MEDIA: i32 = 1;
pub const AUDIO_SOURCE_DEFAULT: i32 = 0;

bitflags! {
    /// `audio_output_flags_t`. Only the bits this crate actually inspects are
    /// named; everything else passes through opaquely.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OutputFlags: u32 {
        const DIRECT = 0x1;
        const PRIMARY = 0x2;
        const FAST = 0x4;
        const DEEP_BUFFER = 0x8;
        const COMPRESS_OFFLOAD = 0x10;
        const NON_BLOCKING = 0x20;
        const HW_AV_SYNC = 0x40;
        const _ = !0;
    }
}

/// Instruction set + word width of the running process. Raw field offsets
/// inside foreign objects are keyed on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abi {
    Arm64,
    Arm32,
    X86,
    X86_64,
}

impl Abi {
    pub fn current() -> Abi {
        #[cfg(target_arch = "aarch64")]
        return Abi::Arm64;
        #[cfg(target_arch = "arm")]
        return Abi::Arm32;
        #[cfg(target_arch = "x86")]
        return Abi::X86;
        #[cfg(target_arch = "x86_64")]
        return Abi::X86_64;
        #[cfg(not(any(
            target_arch = "aarch64",
            target_arch = "arm",
            target_arch = "x86",
            target_arch = "x86_64"
        )))]
        return if cfg!(target_pointer_width = "64") {
            Abi::Arm64
        } else {
            Abi::Arm32
        };
    }

    pub fn is_lp64(self) -> bool {
        matches!(self, Abi::Arm64 | Abi::X86_64)
    }
}

/// `ro.build.version.sdk` of the running device, cached after the first read.
#[cfg(target_os = "android")]
pub fn device_api_level() -> i32 {
    use std::sync::OnceLock;
    static LEVEL: OnceLock<i32> = OnceLock::new();
    *LEVEL.get_or_init(|| {
        let mut value = [0u8; libc::PROP_VALUE_MAX as usize];
        let len = unsafe {
            libc::__system_property_get(
                c"ro.build.version.sdk".as_ptr(),
                value.as_mut_ptr() as *mut libc::c_char,
            )
        };
        if len <= 0 {
            return 0;
        }
        std::str::from_utf8(&value[..len as usize])
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(0)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_width_matches_abi() {
        assert!(Abi::Arm64.is_lp64());
        assert!(Abi::X86_64.is_lp64());
        assert!(!Abi::Arm32.is_lp64());
        assert!(!Abi::X86.is_lp64());
    }

    #[test]
    fn sentinels_are_distinct() {
        assert_ne!(DEAD_OBJECT, BAD_PARAMETER);
        assert_ne!(DEAD_OBJECT, NO_ERROR);
        assert_ne!(BAD_PARAMETER, UNSUPPORTED);
    }

    #[test]
    fn fast_flag_matches_platform_value() {
        assert_eq!(OutputFlags::FAST.bits(), 4);
        assert!(OutputFlags::from_bits_retain(0x15).contains(OutputFlags::FAST));
    }
}
