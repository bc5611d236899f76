//! Raw byte offsets into the opaque track object, for fields that never had
//! an exported accessor. Offsets are keyed on the exact OS release and the
//! CPU ABI; a handful of CAF/CM forks shift the layout and are told apart by
//! probing for symbols only they export. If a vendor image lies about its
//! layout there is nothing to check against; these reads are best effort by
//! construction.

use log::{debug, error, info};

use crate::dispatch::{Lib, SymbolSource};
use crate::platform::Abi;

/// MSM8x60 CM forks with the legacy ALSA direct-track patchset.
const CAF_NOTIFY: &str = "_ZN7android10AudioTrack6notifyEi";
/// CAF images carrying the track-offload preparation patch.
const CAF_INIT_OFFLOAD: &str = "_ZN7android10AudioTrack28initializeTrackOffloadParamsEv";

fn pick(abi: Abi, lp64: usize, x86: usize, arm32: usize) -> usize {
    match abi {
        Abi::Arm64 | Abi::X86_64 => lp64,
        Abi::X86 => x86,
        Abi::Arm32 => arm32,
    }
}

fn has_symbol(src: &dyn SymbolSource, name: &str) -> bool {
    src.resolve(Lib::AudioClient, name).is_some()
}

/// Offset of the selected-output-device field, for the releases where the
/// field exists but its setter must not be called before `set()`.
pub fn selected_device_offset(level: i32, abi: Abi) -> Option<usize> {
    match level {
        24 | 25 => Some(pick(abi, 0x300, 0x270, 0x27c)),
        23 => Some(pick(abi, 0x2e0, 0x24c, 0x254)),
        _ => None,
    }
}

/// Offset of the effective notification-frame count. Gone from raw-offset
/// territory once the accessor appeared in 9.
pub fn notification_frames_offset(
    level: i32,
    abi: Abi,
    src: &dyn SymbolSource,
) -> Option<usize> {
    match level {
        26 | 27 => Some(pick(abi, 0x228, 0x1d8, 0x1dc)),
        24 | 25 => Some(pick(abi, 0x220, 0x1cc, 0x1d4)),
        23 => Some(pick(abi, 0x214, 0x1c0, 0x1c8)),
        22 => {
            let base = pick(abi, 0x1ec, 0x1a4, 0x1ac);
            let extra = if abi == Abi::Arm32 && has_symbol(src, CAF_NOTIFY) {
                0x1c
            } else if has_symbol(src, CAF_INIT_OFFLOAD) {
                // no known x86_64 build of this fork; the value is a guess
                pick(abi, 0x20, 0x18, 0x14)
            } else {
                0
            };
            Some(base + extra)
        }
        21 => {
            let base = pick(abi, 0x1ec, 0x1a4, 0x1ac);
            let extra = if abi == Abi::Arm32 && has_symbol(src, CAF_NOTIFY) { 0x8 } else { 0 };
            Some(base + extra)
        }
        _ => None,
    }
}

/// Offset of the output flags field. 8.0+ exposes the flags through the
/// managed accessor instead and must not come through here.
pub fn track_flags_offset(level: i32, abi: Abi, src: &dyn SymbolSource) -> Option<usize> {
    match level {
        24 | 25 => Some(match abi {
            Abi::X86 => 0x23c,
            Abi::X86_64 | Abi::Arm64 => 0x2a0,
            Abi::Arm32 => 0x248,
        }),
        23 => Some(pick(abi, 0x280, 0x218, 0x220)),
        22 => {
            let base = pick(abi, 0x228, 0x1e0, 0x1e8);
            let extra = if abi == Abi::Arm32 && has_symbol(src, CAF_NOTIFY) {
                0x20
            } else if has_symbol(src, CAF_INIT_OFFLOAD) {
                pick(abi, 0x20, 0x18, 0x18)
            } else {
                0
            };
            Some(base + extra)
        }
        21 => {
            let base = pick(abi, 0x228, 0x1e0, 0x1e8);
            let extra = if abi == Abi::Arm32 && has_symbol(src, CAF_NOTIFY) { 0x8 } else { 0 };
            Some(base + extra)
        }
        _ => None,
    }
}

/// The run of private fields the AudioFlinger flags sit in on 14+. Only used
/// to cross-check a candidate match during the sentinel scan.
#[repr(C)]
struct TrackInternals {
    af_latency: u32,
    af_frame_count: usize,
    af_sample_rate: u32,
    af_channel_count: u32,
    af_format: u32,
    af_track_flags: u32,
    format: u32,
}

/// Window scanned forward from the object base. An arbitrary approximation,
/// comfortably past every observed layout.
pub const SCAN_WINDOW: usize = 800;

/// Values the caller already knows, used as the scan sentinel and its
/// cross-checks.
#[derive(Debug, Clone, Copy)]
pub struct AfFlagsQuery {
    pub latency: u32,
    pub af_latency: u32,
    pub af_frame_count: usize,
    pub af_sample_rate: u32,
    pub format: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScanOutcome {
    Found { offset: usize, flags: u32 },
    /// 14 QPR0/QPR1 layout detected; the field is not where it can be found
    /// on this image, ever.
    Hopeless,
    /// No trustworthy match in the window; worth retrying with a live track.
    NotFound,
}

/// Scans for the known AudioFlinger latency value and validates the
/// surrounding field run before trusting the match.
pub unsafe fn scan_af_track_flags(base: *const u8, q: &AfFlagsQuery, level: i32) -> ScanOutcome {
    let mut pos = 4usize;
    while pos + std::mem::size_of::<TrackInternals>() <= SCAN_WINDOW {
        let value = *(base.add(pos) as *const u32);
        if value == q.latency {
            // hit the track's own latency before AudioFlinger's; the layout
            // is not what we expect
            error!(
                "scan reached latency({}) at +{pos:#x} before afLatency({})",
                q.latency, q.af_latency
            );
            return ScanOutcome::NotFound;
        }
        if value == q.af_latency {
            // the candidate run is only 4-aligned, not at the struct's
            // natural alignment
            let internals =
                std::ptr::read_unaligned(base.add(pos) as *const TrackInternals);
            if internals.af_frame_count != q.af_frame_count {
                debug!(
                    "+{pos:#x}: afFrameCount {} != {}, continuing",
                    internals.af_frame_count, q.af_frame_count
                );
                pos += 4;
                continue;
            }
            if internals.af_sample_rate != q.af_sample_rate {
                debug!(
                    "+{pos:#x}: afSampleRate {} != {}, continuing",
                    internals.af_sample_rate, q.af_sample_rate
                );
                pos += 4;
                continue;
            }
            if internals.format != q.format {
                if level == 34 && internals.format as i32 == -1 {
                    // original stream type sits where format should be
                    info!("QPR0/QPR1 field order detected, giving up for good");
                    return ScanOutcome::Hopeless;
                }
                debug!(
                    "+{pos:#x}: format {:#x} != {:#x}, continuing",
                    internals.format, q.format
                );
                pos += 4;
                continue;
            }
            let offset = pos + std::mem::offset_of!(TrackInternals, af_track_flags);
            return ScanOutcome::Found {
                offset,
                flags: internals.af_track_flags,
            };
        }
        pos += 4;
    }
    error!("afLatency({}) not found within {SCAN_WINDOW} bytes", q.af_latency);
    ScanOutcome::NotFound
}

// Cache for the discovered AudioFlinger-flags offset. A discovered offset of
// zero would be valid, so "not yet computed" gets its own sentinel instead of
// doubling up on zero.
const AF_OFFSET_UNCOMPUTED: isize = -1;
const AF_OFFSET_HOPELESS: isize = isize::MIN;

static AF_FLAGS_OFFSET: std::sync::atomic::AtomicIsize =
    std::sync::atomic::AtomicIsize::new(AF_OFFSET_UNCOMPUTED);

/// Cached front-end to [`scan_af_track_flags`]. Returns the flags value,
/// `i32::MIN` if this image can never answer, `i32::MAX` if the scan failed
/// transiently.
pub unsafe fn af_track_flags(base: *const u8, q: &AfFlagsQuery, level: i32) -> i32 {
    use std::sync::atomic::Ordering;
    match AF_FLAGS_OFFSET.load(Ordering::Relaxed) {
        AF_OFFSET_HOPELESS => i32::MIN,
        AF_OFFSET_UNCOMPUTED => match scan_af_track_flags(base, q, level) {
            ScanOutcome::Found { offset, flags } => {
                AF_FLAGS_OFFSET.store(offset as isize, Ordering::Relaxed);
                flags as i32
            }
            ScanOutcome::Hopeless => {
                AF_FLAGS_OFFSET.store(AF_OFFSET_HOPELESS, Ordering::Relaxed);
                i32::MIN
            }
            ScanOutcome::NotFound => i32::MAX,
        },
        offset => *(base.add(offset as usize) as *const u32) as i32,
    }
}

#[cfg(test)]
pub(crate) fn reset_af_cache() {
    AF_FLAGS_OFFSET.store(AF_OFFSET_UNCOMPUTED, std::sync::atomic::Ordering::Relaxed);
}
