//! `#[repr(C)]` mirrors of the platform audio structs the private library
//! reads straight out of raw memory. Field order, size and alignment must
//! match the binary exactly per OS release; the tests below pin them down.

use std::ffi::c_void;

pub const fn offload_info_version(major: u16, minor: u16) -> u16 {
    ((major & 0xff) << 8) | (minor & 0xff)
}

pub const OFFLOAD_INFO_VERSION_0_1: u16 = offload_info_version(0, 1);
pub const OFFLOAD_INFO_VERSION_0_2: u16 = offload_info_version(0, 2);

/// `audio_offload_info_t` as it looked from 5.0 through 8.1 (version 0.1,
/// including the 0.1b fields and the trailing CAF small-buffer flag).
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OffloadInfoLegacy {
    pub version: u16,
    pub size: u16,
    pub sample_rate: u32,
    pub channel_mask: u32,
    pub format: u32,
    pub stream_type: i32,
    pub bit_rate: u32,
    pub duration_us: i64,
    pub has_video: bool,
    pub is_streaming: bool,
    pub bit_width: u32,
    pub offload_buffer_size: u32,
    pub usage: i32,
    /// CAF only; stock builds ignore the byte.
    pub use_small_bufs: bool,
}

/// `audio_offload_info_t` version 0.2 (9+), growing the tuner fields.
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy)]
pub struct OffloadInfo {
    pub version: u16,
    pub size: u16,
    pub sample_rate: u32,
    pub channel_mask: u32,
    pub format: u32,
    pub stream_type: i32,
    pub bit_rate: u32,
    pub duration_us: i64,
    pub has_video: bool,
    pub is_streaming: bool,
    pub bit_width: u32,
    pub offload_buffer_size: u32,
    pub usage: i32,
    pub encapsulation_mode: i32,
    /// content id from tuner hal (0 if none)
    pub content_id: i32,
    /// sync id from tuner hal (0 if none)
    pub sync_id: i32,
}

/// `audio_attributes_t` before 9 (natural alignment).
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AudioAttributesLegacy {
    pub content_type: i32,
    pub usage: i32,
    pub source: i32,
    pub flags: u32,
    pub tags: [u8; 256],
}

/// `audio_attributes_t` since 9 (declared packed in the platform headers).
#[repr(C, packed)]
#[derive(Clone, Copy)]
pub struct AudioAttributes {
    pub content_type: i32,
    pub usage: i32,
    pub source: i32,
    pub flags: u32,
    pub tags: [u8; 256],
}

impl AudioAttributesLegacy {
    pub fn new(content_type: i32, usage: i32, source: i32, flags: u32) -> Self {
        Self { content_type, usage, source, flags, tags: [0; 256] }
    }
}

impl AudioAttributes {
    pub fn new(content_type: i32, usage: i32, source: i32, flags: u32) -> Self {
        Self { content_type, usage, source, flags, tags: [0; 256] }
    }
}

/// `android::AudioPlaybackRate`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackRate {
    pub speed: f32,
    pub pitch: f32,
    pub stretch_mode: i32,
    pub fallback_mode: i32,
}

/// `android::AudioTimestamp`: a frame position paired with the CLOCK_MONOTONIC
/// time it was presented.
#[repr(C)]
#[derive(Clone, Copy)]
pub struct AudioTimestamp {
    pub position: u32,
    pub time: libc::timespec,
}

impl AudioTimestamp {
    /// The single combined-nanoseconds representation used everywhere in this
    /// crate for presentation times.
    pub fn when_ns(&self) -> i64 {
        (self.time.tv_sec as i64) * 1_000_000_000 + self.time.tv_nsec as i64
    }
}

/// `android::ExtendedTimestamp` (7.0+).
#[repr(C, align(8))]
#[derive(Debug, Clone, Copy)]
pub struct ExtendedTimestamp {
    pub position: [i64; 5],
    pub time_ns: [i64; 5],
    pub timebase_offset: [i64; 2],
    pub flushed: i64,
}

impl Default for ExtendedTimestamp {
    fn default() -> Self {
        Self {
            position: [0; 5],
            time_ns: [-1; 5],
            timebase_offset: [0; 2],
            flushed: 0,
        }
    }
}

/// `android::AudioTrack::Buffer`. The union of raw/i16/u8 pointers collapses
/// to the one pointer it is.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TrackBuffer {
    pub frame_count: usize,
    pub size: usize,
    pub raw: *mut c_void,
    pub sequence: u32,
}

impl TrackBuffer {
    pub fn empty() -> Self {
        Self { frame_count: 0, size: 0, raw: std::ptr::null_mut(), sequence: 0 }
    }
}

/// `android::String8` as the library passes it around: a single pointer to the
/// character data. Construction/destruction go through resolved symbols.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct String8 {
    pub data: *const libc::c_char,
}

impl String8 {
    pub fn uninit() -> Self {
        Self { data: std::ptr::null() }
    }
}

/// `std::vector<int32_t>` in the libc++ ABI: begin/end/capacity pointers.
/// Returned by value (sret) from the routed-device query on 15+.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct CxxIntVector {
    pub begin: *mut i32,
    pub end: *mut i32,
    pub cap: *mut i32,
}

impl CxxIntVector {
    pub fn empty() -> Self {
        Self {
            begin: std::ptr::null_mut(),
            end: std::ptr::null_mut(),
            cap: std::ptr::null_mut(),
        }
    }

    pub unsafe fn as_slice(&self) -> &[i32] {
        if self.begin.is_null() {
            return &[];
        }
        std::slice::from_raw_parts(self.begin, self.end.offset_from(self.begin) as usize)
    }

    /// Frees the heap buffer the library allocated. Both sides resolve
    /// operator new/delete to the bionic allocator, so `free` matches.
    pub unsafe fn release(self) {
        if !self.begin.is_null() {
            libc::free(self.begin as *mut c_void);
        }
    }
}
