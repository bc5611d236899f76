//! The process-wide table of resolved private symbols, and the version
//! dispatch that decides which historical overload of each symbol to look up.
//!
//! Range selection is evaluated newest-first; where two vendor forks share an
//! API level the decision falls back to probing which symbol actually exists
//! in the loaded image. Resolution happens once; a missing mandatory symbol
//! fails the whole table, a missing optional symbol only disables the feature
//! that needed it.

use std::ffi::c_void;

use log::{error, info};

use crate::layout::{
    AudioTimestamp, CxxIntVector, ExtendedTimestamp, PlaybackRate, String8, TrackBuffer,
};
use crate::refbase::{
    CreateWeakFn, FakeSp, FakeWp, RefBaseCtorFn, RefBaseDtorFn, RefBaseOps, RefCountFn, WeakDecFn,
};

/// The system libraries symbols are resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lib {
    AudioClient,
    Utils,
    Binder,
    Permission,
    AndroidRuntime,
    AvEnhancements,
}

/// One symbol lookup against an already-open library handle. The production
/// implementation wraps the loaded handles; tests substitute counting mocks.
pub trait SymbolSource {
    fn resolve(&self, lib: Lib, name: &str) -> Option<*mut c_void>;
}

/// Casts a resolved address into a typed function pointer slot.
unsafe fn sym<T: Copy>(src: &dyn SymbolSource, lib: Lib, name: &str) -> Option<T> {
    debug_assert_eq!(std::mem::size_of::<T>(), std::mem::size_of::<*mut c_void>());
    src.resolve(lib, name).map(|p| std::mem::transmute_copy(&p))
}

pub type LegacyCallbackFn =
    unsafe extern "C" fn(event: i32, user: *mut c_void, info: *mut c_void);

pub type TrackCtorDefaultFn = unsafe extern "C" fn(this: *mut c_void);
pub type TrackCtorAttributionFn =
    unsafe extern "C" fn(this: *mut c_void, attribution: *const c_void);
pub type ParcelForJavaObjectFn =
    unsafe extern "C" fn(env: *mut c_void, obj: *mut c_void) -> *mut c_void;
pub type AttributionReadParcelFn =
    unsafe extern "C" fn(this: *mut c_void, parcel: *const c_void) -> i32;

pub type StatusFn = unsafe extern "C" fn(this: *mut c_void) -> i32;
pub type VoidFn = unsafe extern "C" fn(this: *mut c_void);
pub type BoolFn = unsafe extern "C" fn(this: *mut c_void) -> bool;
pub type U32Fn = unsafe extern "C" fn(this: *mut c_void) -> u32;
pub type I32Fn = unsafe extern "C" fn(this: *mut c_void) -> i32;
pub type SetF32Fn = unsafe extern "C" fn(this: *mut c_void, value: f32) -> i32;
pub type GetF32Fn = unsafe extern "C" fn(this: *mut c_void, out: *mut f32) -> i32;
pub type SetU32Fn = unsafe extern "C" fn(this: *mut c_void, value: u32) -> i32;
pub type GetU32Fn = unsafe extern "C" fn(this: *mut c_void, out: *mut u32) -> i32;
pub type SetI32Fn = unsafe extern "C" fn(this: *mut c_void, value: i32) -> i32;
pub type SetLoopFn =
    unsafe extern "C" fn(this: *mut c_void, start: u32, end: u32, count: i32) -> i32;
pub type GetI64Fn = unsafe extern "C" fn(this: *mut c_void, out: *mut i64) -> i32;
pub type PendingDurationFn =
    unsafe extern "C" fn(this: *mut c_void, out: *mut i32, location: i32) -> i32;
pub type GetExtendedTimestampFn =
    unsafe extern "C" fn(this: *mut c_void, ts: *mut ExtendedTimestamp) -> i32;
pub type GetTimestampFn =
    unsafe extern "C" fn(this: *mut c_void, ts: *mut AudioTimestamp) -> i32;
pub type GetPlaybackRateFn = unsafe extern "C" fn(this: *mut c_void) -> PlaybackRate;
pub type SetPlaybackRateFn =
    unsafe extern "C" fn(this: *mut c_void, rate: *const PlaybackRate) -> i32;
pub type PauseAndWaitFn =
    unsafe extern "C" fn(this: *mut c_void, timeout_ms: *const i64) -> bool;
pub type WriteFn =
    unsafe extern "C" fn(this: *mut c_void, buf: *const c_void, size: u32, blocking: bool) -> isize;
pub type ObtainBufferFn = unsafe extern "C" fn(
    this: *mut c_void,
    buf: *mut TrackBuffer,
    wait_count: i32,
    non_contig: *mut usize,
) -> i32;
pub type ReleaseBufferFn = unsafe extern "C" fn(this: *mut c_void, buf: *const TrackBuffer);
pub type String8CtorFn = unsafe extern "C" fn(this: *mut String8, s: *const libc::c_char);
pub type String8DtorFn = unsafe extern "C" fn(this: *mut String8);
pub type SetParametersFn = unsafe extern "C" fn(this: *mut c_void, params: *const String8) -> i32;
// String8 has a non-trivial copy, so the return value travels through a
// hidden first parameter rather than a register.
pub type GetParametersFn =
    unsafe extern "C" fn(ret: *mut String8, this: *mut c_void, keys: *const String8);
pub type DeviceCallbackRegFn = unsafe extern "C" fn(this: *mut c_void, cb: *const FakeSp) -> i32;
pub type GetRoutedDeviceIdFn = unsafe extern "C" fn(this: *mut c_void) -> i32;
// std::vector return: non-trivial, hidden first parameter again.
pub type GetRoutedDeviceIdsFn = unsafe extern "C" fn(ret: *mut CxxIntVector, this: *mut c_void);
pub type MinFrameCountFn =
    unsafe extern "C" fn(out: *mut usize, stream_type: i32, sample_rate: u32) -> i32;
pub type IsOffloadSupportedFn = unsafe extern "C" fn(info: *const c_void) -> bool;
pub type ExtendedIsTrackOffloadedFn =
    unsafe extern "C" fn(this: *mut c_void, output: u32) -> bool;
pub type GetOutputForAttrFn = unsafe extern "C" fn(
    attr: *const c_void,
    output: *mut i32,
    session: i32,
    stream: *mut i32,
    uid: u32,
    sampling_rate: u32,
    format: u32,
    channel_mask: u32,
    flags: u32,
    selected_device: i32,
    offload_info: *const c_void,
) -> i32;
pub type AfLatencyFn = unsafe extern "C" fn(output: i32, out: *mut u32) -> i32;
pub type AfFrameCountFn = unsafe extern "C" fn(output: i32, out: *mut usize) -> i32;
pub type AfSamplingRateFn = unsafe extern "C" fn(output: i32, out: *mut u32) -> i32;
pub type ReleaseOutputFn = unsafe extern "C" fn(output: i32, stream: i32, session: i32);

pub type SetV21Fn = unsafe extern "C" fn(
    this: *mut c_void,
    stream_type: i32,
    sample_rate: u32,
    format: u32,
    channel_mask: u32,
    frame_count: usize,
    flags: u32,
    callback: Option<LegacyCallbackFn>,
    user: *mut c_void,
    notification_frames: i32,
    shared: *const FakeSp,
    can_call_java: bool,
    session_id: i32,
    transfer: i32,
    offload: *const c_void,
    uid: i32,
    pid: i32,
    attributes: *const c_void,
) -> i32;

pub type SetV23Fn = unsafe extern "C" fn(
    this: *mut c_void,
    stream_type: i32,
    sample_rate: u32,
    format: u32,
    channel_mask: u32,
    frame_count: usize,
    flags: u32,
    callback: Option<LegacyCallbackFn>,
    user: *mut c_void,
    notification_frames: i32,
    shared: *const FakeSp,
    can_call_java: bool,
    session_id: i32,
    transfer: i32,
    offload: *const c_void,
    uid: i32,
    pid: i32,
    attributes: *const c_void,
    do_not_reconnect: bool,
) -> i32;

pub type SetV24Fn = unsafe extern "C" fn(
    this: *mut c_void,
    stream_type: i32,
    sample_rate: u32,
    format: u32,
    channel_mask: u32,
    frame_count: usize,
    flags: u32,
    callback: Option<LegacyCallbackFn>,
    user: *mut c_void,
    notification_frames: i32,
    shared: *const FakeSp,
    can_call_java: bool,
    session_id: i32,
    transfer: i32,
    offload: *const c_void,
    uid: i32,
    pid: i32,
    attributes: *const c_void,
    do_not_reconnect: bool,
    max_required_speed: f32,
) -> i32;

pub type SetV26Fn = unsafe extern "C" fn(
    this: *mut c_void,
    stream_type: i32,
    sample_rate: u32,
    format: u32,
    channel_mask: u32,
    frame_count: usize,
    flags: u32,
    callback: Option<LegacyCallbackFn>,
    user: *mut c_void,
    notification_frames: i32,
    shared: *const FakeSp,
    can_call_java: bool,
    session_id: i32,
    transfer: i32,
    offload: *const c_void,
    uid: u32,
    pid: i32,
    attributes: *const c_void,
    do_not_reconnect: bool,
    max_required_speed: f32,
) -> i32;

pub type SetV28Fn = unsafe extern "C" fn(
    this: *mut c_void,
    stream_type: i32,
    sample_rate: u32,
    format: u32,
    channel_mask: u32,
    frame_count: usize,
    flags: u32,
    callback: Option<LegacyCallbackFn>,
    user: *mut c_void,
    notification_frames: i32,
    shared: *const FakeSp,
    can_call_java: bool,
    session_id: i32,
    transfer: i32,
    offload: *const c_void,
    uid: u32,
    pid: i32,
    attributes: *const c_void,
    do_not_reconnect: bool,
    max_required_speed: f32,
    selected_device: i32,
) -> i32;

pub type SetV31Fn = unsafe extern "C" fn(
    this: *mut c_void,
    stream_type: i32,
    sample_rate: u32,
    format: u32,
    channel_mask: u32,
    frame_count: usize,
    flags: u32,
    callback: *const FakeWp,
    notification_frames: i32,
    shared: *const FakeSp,
    can_call_java: bool,
    session_id: i32,
    transfer: i32,
    offload: *const c_void,
    attribution: *const c_void,
    attributes: *const c_void,
    do_not_reconnect: bool,
    max_required_speed: f32,
    selected_device: i32,
) -> i32;

/// Which historical `set()` overload the running release exports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetVariant {
    /// 12+: attribution source, weak-referenced callback object.
    V31,
    /// 9–11: C callback, explicit selected device.
    V28,
    /// 8.x: C callback, device chosen through the setter before `set()`.
    V26,
    /// 7.x: C callback, speed parameter, device patched by raw offset.
    V24,
    /// 6.0: no speed parameter, device patched by raw offset.
    V23,
    /// 5.x: baseline.
    V21,
}

impl SetVariant {
    pub fn select(level: i32) -> SetVariant {
        if level >= 31 {
            SetVariant::V31
        } else if level >= 28 {
            SetVariant::V28
        } else if level >= 26 {
            SetVariant::V26
        } else if level >= 24 {
            SetVariant::V24
        } else if level >= 23 {
            SetVariant::V23
        } else {
            SetVariant::V21
        }
    }
}

/// The selected `set()` overload together with its resolved entry point.
#[derive(Clone, Copy)]
pub enum SetCall {
    V31(SetV31Fn),
    V28(SetV28Fn),
    V26(SetV26Fn),
    V24(SetV24Fn),
    V23(SetV23Fn),
    V21(SetV21Fn),
}

impl SetCall {
    pub fn variant(&self) -> SetVariant {
        match self {
            SetCall::V31(_) => SetVariant::V31,
            SetCall::V28(_) => SetVariant::V28,
            SetCall::V26(_) => SetVariant::V26,
            SetCall::V24(_) => SetVariant::V24,
            SetCall::V23(_) => SetVariant::V23,
            SetCall::V21(_) => SetVariant::V21,
        }
    }
}

/// How routed devices are queried. 15 QPR2 changed the return type from a
/// single id to a vector without bumping the API level, so level 35 has to
/// probe which symbol exists instead of trusting the version number.
#[derive(Clone, Copy)]
pub enum RoutedCall {
    Vector(GetRoutedDeviceIdsFn),
    Scalar(GetRoutedDeviceIdFn),
    Unsupported,
}

pub struct Dispatch {
    pub level: i32,
    pub refbase: RefBaseOps,

    // construction
    pub parcel_for_java_object: Option<ParcelForJavaObjectFn>,
    pub attribution_read_parcel: Option<AttributionReadParcelFn>,
    pub ctor_attribution: Option<TrackCtorAttributionFn>,
    pub ctor_default: Option<TrackCtorDefaultFn>,
    pub set_call: SetCall,

    // lifecycle
    pub start: StatusFn,
    pub stop: VoidFn,
    pub stopped: BoolFn,
    pub pause: VoidFn,
    pub pause_and_wait: Option<PauseAndWaitFn>,
    pub flush: VoidFn,
    pub reload: StatusFn,
    pub has_started: Option<BoolFn>,
    pub get_output: U32Fn,

    // volume / effects
    pub set_volume: SetF32Fn,
    pub set_aux_effect_send_level: SetF32Fn,
    pub get_aux_effect_send_level: GetF32Fn,
    pub attach_aux_effect: SetI32Fn,

    // rate / position
    pub set_sample_rate: SetU32Fn,
    pub get_sample_rate: U32Fn,
    pub get_original_sample_rate: Option<U32Fn>,
    pub set_loop: SetLoopFn,
    pub set_marker_position: SetU32Fn,
    pub get_marker_position: GetU32Fn,
    pub set_position_update_period: SetU32Fn,
    pub get_position_update_period: GetU32Fn,
    pub set_position: SetU32Fn,
    pub get_position: GetU32Fn,
    pub get_buffer_position: GetU32Fn,
    pub get_buffer_duration_us: Option<GetI64Fn>,
    pub get_playback_rate: Option<GetPlaybackRateFn>,
    pub set_playback_rate: Option<SetPlaybackRateFn>,
    pub pending_duration: Option<PendingDurationFn>,
    pub get_extended_timestamp: Option<GetExtendedTimestampFn>,
    pub get_timestamp: GetTimestampFn,
    pub get_underrun_frames: U32Fn,

    // data transfer
    pub write: WriteFn,
    pub obtain_buffer: ObtainBufferFn,
    pub release_buffer: ReleaseBufferFn,

    // key/value parameters
    pub string8_ctor: String8CtorFn,
    pub string8_dtor: String8DtorFn,
    pub set_parameters: SetParametersFn,
    pub get_parameters: GetParametersFn,

    // routing
    pub set_output_device: Option<SetI32Fn>,
    pub get_output_device: Option<I32Fn>,
    pub add_device_callback: Option<DeviceCallbackRegFn>,
    pub remove_device_callback: Option<DeviceCallbackRegFn>,
    pub routed: RoutedCall,

    // companion-level queries
    pub min_frame_count: MinFrameCountFn,
    pub is_offload_supported: Option<IsOffloadSupportedFn>,
    pub is_offloaded_or_direct: Option<BoolFn>,

    // AudioFlinger-side queries, only needed for speed emulation on 23
    pub get_output_for_attr: Option<GetOutputForAttrFn>,
    pub af_latency: Option<AfLatencyFn>,
    pub af_frame_count: Option<AfFrameCountFn>,
    pub af_sampling_rate: Option<AfSamplingRateFn>,
    pub release_output: Option<ReleaseOutputFn>,

    // hidden HAL-side accessors; absent on plenty of builds
    pub hal_sample_rate: Option<U32Fn>,
    pub hal_channel_count: Option<U32Fn>,
    pub hal_format: Option<U32Fn>,
    pub extended_is_track_offloaded: Option<ExtendedIsTrackOffloadedFn>,
}

macro_rules! require {
    ($src:expr, $lib:expr, $name:literal, $ty:ty) => {
        match unsafe { sym::<$ty>($src, $lib, $name) } {
            Some(f) => f,
            None => {
                error!("mandatory symbol {} missing in {:?}", $name, $lib);
                return None;
            }
        }
    };
}

macro_rules! optional {
    ($src:expr, $lib:expr, $name:literal, $ty:ty) => {
        match unsafe { sym::<$ty>($src, $lib, $name) } {
            Some(f) => Some(f),
            None => {
                info!("optional symbol {} missing in {:?}", $name, $lib);
                None
            }
        }
    };
}

impl Dispatch {
    /// Resolves every slot the given OS release needs. Returns `None` when a
    /// mandatory symbol is absent; that verdict is permanent for the running
    /// image and retrying will not change it.
    pub fn resolve(level: i32, src: &dyn SymbolSource) -> Option<Dispatch> {
        let refbase = RefBaseOps {
            ctor: require!(src, Lib::Utils, "_ZN7android7RefBaseC2Ev", RefBaseCtorFn),
            dtor: require!(src, Lib::Utils, "_ZN7android7RefBaseD2Ev", RefBaseDtorFn),
            inc_strong: require!(
                src,
                Lib::Utils,
                "_ZNK7android7RefBase9incStrongEPKv",
                RefCountFn
            ),
            dec_strong: require!(
                src,
                Lib::Utils,
                "_ZNK7android7RefBase9decStrongEPKv",
                RefCountFn
            ),
            create_weak: require!(
                src,
                Lib::Utils,
                "_ZNK7android7RefBase10createWeakEPKv",
                CreateWeakFn
            ),
            weak_dec: require!(
                src,
                Lib::Utils,
                "_ZN7android7RefBase12weakref_type7decWeakEPKv",
                WeakDecFn
            ),
        };

        let (parcel_for_java_object, attribution_read_parcel, ctor_attribution, ctor_default);
        if level >= 31 {
            parcel_for_java_object = Some(require!(
                src,
                Lib::AndroidRuntime,
                "_ZN7android19parcelForJavaObjectEP7_JNIEnvP8_jobject",
                ParcelForJavaObjectFn
            ));
            attribution_read_parcel = Some(require!(
                src,
                Lib::Permission,
                "_ZN7android7content22AttributionSourceState14readFromParcelEPKNS_6ParcelE",
                AttributionReadParcelFn
            ));
            ctor_attribution = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrackC1ERKNS_7content22AttributionSourceStateE",
                TrackCtorAttributionFn
            ));
            ctor_default = None;
        } else {
            parcel_for_java_object = None;
            attribution_read_parcel = None;
            ctor_attribution = None;
            ctor_default = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrackC1Ev",
                TrackCtorDefaultFn
            ));
        }

        let is_offload_supported = if level <= 30 {
            Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android11AudioSystem18isOffloadSupportedERK20audio_offload_info_t",
                IsOffloadSupportedFn
            ))
        } else {
            None
        };

        let routed = if level >= 36 {
            RoutedCall::Vector(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack18getRoutedDeviceIdsEv",
                GetRoutedDeviceIdsFn
            ))
        } else if level == 35 {
            // QPR2 forks export the vector shape a level early.
            match unsafe {
                sym::<GetRoutedDeviceIdsFn>(
                    src,
                    Lib::AudioClient,
                    "_ZN7android10AudioTrack18getRoutedDeviceIdsEv",
                )
            } {
                Some(f) => RoutedCall::Vector(f),
                None => RoutedCall::Scalar(require!(
                    src,
                    Lib::AudioClient,
                    "_ZN7android10AudioTrack17getRoutedDeviceIdEv",
                    GetRoutedDeviceIdFn
                )),
            }
        } else if level >= 23 {
            RoutedCall::Scalar(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack17getRoutedDeviceIdEv",
                GetRoutedDeviceIdFn
            ))
        } else {
            RoutedCall::Unsupported
        };

        let (
            set_output_device,
            get_output_device,
            add_device_callback,
            remove_device_callback,
            get_original_sample_rate,
            get_playback_rate,
            set_playback_rate,
            is_offloaded_or_direct,
        );
        if level >= 23 {
            set_output_device = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack15setOutputDeviceEi",
                SetI32Fn
            ));
            get_output_device = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack15getOutputDeviceEv",
                I32Fn
            ));
            add_device_callback = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack22addAudioDeviceCallbackERKNS_2spINS_11AudioSystem19AudioDeviceCallbackEEE",
                DeviceCallbackRegFn
            ));
            remove_device_callback = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack25removeAudioDeviceCallbackERKNS_2spINS_11AudioSystem19AudioDeviceCallbackEEE",
                DeviceCallbackRegFn
            ));
            get_original_sample_rate = Some(require!(
                src,
                Lib::AudioClient,
                "_ZNK7android10AudioTrack21getOriginalSampleRateEv",
                U32Fn
            ));
            get_playback_rate = Some(require!(
                src,
                Lib::AudioClient,
                "_ZNK7android10AudioTrack15getPlaybackRateEv",
                GetPlaybackRateFn
            ));
            set_playback_rate = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack15setPlaybackRateERKNS_17AudioPlaybackRateE",
                SetPlaybackRateFn
            ));
            is_offloaded_or_direct = None;
        } else {
            set_output_device = None;
            get_output_device = None;
            add_device_callback = None;
            remove_device_callback = None;
            get_original_sample_rate = None;
            get_playback_rate = None;
            set_playback_rate = None;
            is_offloaded_or_direct = Some(require!(
                src,
                Lib::AudioClient,
                "_ZNK7android10AudioTrack19isOffloadedOrDirectEv",
                BoolFn
            ));
        }

        let (get_buffer_duration_us, pending_duration, get_extended_timestamp);
        if level >= 24 {
            get_buffer_duration_us = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack21getBufferDurationInUsEPl",
                GetI64Fn
            ));
            pending_duration = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack15pendingDurationEPiNS_17ExtendedTimestamp8LocationE",
                PendingDurationFn
            ));
            get_extended_timestamp = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack12getTimestampEPNS_17ExtendedTimestampE",
                GetExtendedTimestampFn
            ));
        } else {
            get_buffer_duration_us = None;
            pending_duration = None;
            get_extended_timestamp = None;
        }

        let min_frame_count = require!(
            src,
            Lib::AudioClient,
            "_ZN7android10AudioTrack16getMinFrameCountEPm19audio_stream_type_tj",
            MinFrameCountFn
        );

        let (get_output_for_attr, af_latency, af_frame_count, af_sampling_rate, release_output);
        if level == 23 {
            get_output_for_attr = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android11AudioSystem16getOutputForAttrEPK18audio_attributes_tPi15audio_session_tP19audio_stream_type_tjj14audio_format_tj20audio_output_flags_tiPK20audio_offload_info_t",
                GetOutputForAttrFn
            ));
            af_latency = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android11AudioSystem10getLatencyEiPj",
                AfLatencyFn
            ));
            af_frame_count = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android11AudioSystem13getFrameCountEiPm",
                AfFrameCountFn
            ));
            af_sampling_rate = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android11AudioSystem15getSamplingRateEiPj",
                AfSamplingRateFn
            ));
            release_output = Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android11AudioSystem13releaseOutputEi19audio_stream_type_t15audio_session_t",
                ReleaseOutputFn
            ));
        } else {
            get_output_for_attr = None;
            af_latency = None;
            af_frame_count = None;
            af_sampling_rate = None;
            release_output = None;
        }

        let set_call = match SetVariant::select(level) {
            SetVariant::V31 => SetCall::V31(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack3setE19audio_stream_type_tj14audio_format_t20audio_channel_mask_tm20audio_output_flags_tRKNS_2wpINS0_19IAudioTrackCallbackEEEiRKNS_2spINS_7IMemoryEEEb15audio_session_tNS0_13transfer_typeEPK20audio_offload_info_tRKNS_7content22AttributionSourceStateEPK18audio_attributes_tbfi",
                SetV31Fn
            )),
            SetVariant::V28 => SetCall::V28(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack3setE19audio_stream_type_tj14audio_format_tjm20audio_output_flags_tPFviPvS4_ES4_iRKNS_2spINS_7IMemoryEEEb15audio_session_tNS0_13transfer_typeEPK20audio_offload_info_tjiPK18audio_attributes_tbfi",
                SetV28Fn
            )),
            SetVariant::V26 => SetCall::V26(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack3setE19audio_stream_type_tj14audio_format_tjm20audio_output_flags_tPFviPvS4_ES4_iRKNS_2spINS_7IMemoryEEEb15audio_session_tNS0_13transfer_typeEPK20audio_offload_info_tjiPK18audio_attributes_tbf",
                SetV26Fn
            )),
            SetVariant::V24 => SetCall::V24(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack3setE19audio_stream_type_tj14audio_format_tjm20audio_output_flags_tPFviPvS4_ES4_iRKNS_2spINS_7IMemoryEEEb15audio_session_tNS0_13transfer_typeEPK20audio_offload_info_tiiPK18audio_attributes_tbf",
                SetV24Fn
            )),
            SetVariant::V23 => SetCall::V23(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack3setE19audio_stream_type_tj14audio_format_tjm20audio_output_flags_tPFviPvS4_ES4_jRKNS_2spINS_7IMemoryEEEbiNS0_13transfer_typeEPK20audio_offload_info_tiiPK18audio_attributes_tb",
                SetV23Fn
            )),
            SetVariant::V21 => SetCall::V21(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack3setE19audio_stream_type_tj14audio_format_tjm20audio_output_flags_tPFviPvS4_ES4_jRKNS_2spINS_7IMemoryEEEbiNS0_13transfer_typeEPK20audio_offload_info_tiiPK18audio_attributes_t",
                SetV21Fn
            )),
        };

        let get_output = require!(
            src,
            Lib::AudioClient,
            "_ZNK7android10AudioTrack9getOutputEv",
            U32Fn
        );
        let pause_and_wait = if level >= 32 {
            Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack12pauseAndWaitERKNSt3__16chrono8durationIxNS1_5ratioILl1ELl1000EEEEE",
                PauseAndWaitFn
            ))
        } else {
            None
        };
        let has_started = if level >= 26 {
            Some(require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack10hasStartedEv",
                BoolFn
            ))
        } else {
            None
        };

        Some(Dispatch {
            level,
            refbase,
            parcel_for_java_object,
            attribution_read_parcel,
            ctor_attribution,
            ctor_default,
            set_call,
            start: require!(src, Lib::AudioClient, "_ZN7android10AudioTrack5startEv", StatusFn),
            stop: require!(src, Lib::AudioClient, "_ZN7android10AudioTrack4stopEv", VoidFn),
            stopped: require!(
                src,
                Lib::AudioClient,
                "_ZNK7android10AudioTrack7stoppedEv",
                BoolFn
            ),
            pause: require!(src, Lib::AudioClient, "_ZN7android10AudioTrack5pauseEv", VoidFn),
            pause_and_wait,
            flush: require!(src, Lib::AudioClient, "_ZN7android10AudioTrack5flushEv", VoidFn),
            reload: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack6reloadEv",
                StatusFn
            ),
            has_started,
            get_output,
            set_volume: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack9setVolumeEf",
                SetF32Fn
            ),
            set_aux_effect_send_level: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack21setAuxEffectSendLevelEf",
                SetF32Fn
            ),
            get_aux_effect_send_level: require!(
                src,
                Lib::AudioClient,
                "_ZNK7android10AudioTrack21getAuxEffectSendLevelEPf",
                GetF32Fn
            ),
            attach_aux_effect: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack15attachAuxEffectEi",
                SetI32Fn
            ),
            set_sample_rate: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack13setSampleRateEj",
                SetU32Fn
            ),
            get_sample_rate: require!(
                src,
                Lib::AudioClient,
                "_ZNK7android10AudioTrack13getSampleRateEv",
                U32Fn
            ),
            get_original_sample_rate,
            set_loop: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack7setLoopEjji",
                SetLoopFn
            ),
            set_marker_position: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack17setMarkerPositionEj",
                SetU32Fn
            ),
            get_marker_position: require!(
                src,
                Lib::AudioClient,
                "_ZNK7android10AudioTrack17getMarkerPositionEPj",
                GetU32Fn
            ),
            set_position_update_period: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack23setPositionUpdatePeriodEj",
                SetU32Fn
            ),
            get_position_update_period: require!(
                src,
                Lib::AudioClient,
                "_ZNK7android10AudioTrack23getPositionUpdatePeriodEPj",
                GetU32Fn
            ),
            set_position: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack11setPositionEj",
                SetU32Fn
            ),
            get_position: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack11getPositionEPj",
                GetU32Fn
            ),
            get_buffer_position: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack17getBufferPositionEPj",
                GetU32Fn
            ),
            get_buffer_duration_us,
            get_playback_rate,
            set_playback_rate,
            pending_duration,
            get_extended_timestamp,
            get_timestamp: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack12getTimestampERNS_14AudioTimestampE",
                GetTimestampFn
            ),
            get_underrun_frames: require!(
                src,
                Lib::AudioClient,
                "_ZNK7android10AudioTrack17getUnderrunFramesEv",
                U32Fn
            ),
            write: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack5writeEPKvjb",
                WriteFn
            ),
            obtain_buffer: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack12obtainBufferEPNS0_6BufferEiPj",
                ObtainBufferFn
            ),
            release_buffer: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack13releaseBufferEPKNS0_6BufferE",
                ReleaseBufferFn
            ),
            string8_ctor: require!(src, Lib::Binder, "_ZN7android7String8C1EPKc", String8CtorFn),
            string8_dtor: require!(src, Lib::Binder, "_ZN7android7String8D1Ev", String8DtorFn),
            set_parameters: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack13setParametersERKNS_7String8E",
                SetParametersFn
            ),
            get_parameters: require!(
                src,
                Lib::AudioClient,
                "_ZN7android10AudioTrack13getParametersERKNS_7String8E",
                GetParametersFn
            ),
            set_output_device,
            get_output_device,
            add_device_callback,
            remove_device_callback,
            routed,
            min_frame_count,
            is_offload_supported,
            is_offloaded_or_direct,
            get_output_for_attr,
            af_latency,
            af_frame_count,
            af_sampling_rate,
            release_output,
            hal_sample_rate: optional!(
                src,
                Lib::AudioClient,
                "_ZNK7android10AudioTrack16getHalSampleRateEv",
                U32Fn
            ),
            hal_channel_count: optional!(
                src,
                Lib::AudioClient,
                "_ZNK7android10AudioTrack18getHalChannelCountEv",
                U32Fn
            ),
            hal_format: optional!(
                src,
                Lib::AudioClient,
                "_ZNK7android10AudioTrack12getHalFormatEv",
                U32Fn
            ),
            extended_is_track_offloaded: optional!(
                src,
                Lib::AvEnhancements,
                "_ZN7android18ExtendedMediaUtils26AudioTrackIsTrackOffloadedEi",
                ExtendedIsTrackOffloadedFn
            ),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing;
