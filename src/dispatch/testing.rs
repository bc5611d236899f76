//! Callable stand-ins for every dispatch slot plus a reference-count ledger,
//! so session logic can be exercised on the host with no system library.
//! The stub source feeds `Dispatch::resolve`, so the per-level gating under
//! test is the real resolution logic, not a parallel copy.

use super::*;
use crate::layout::{OffloadInfo, OffloadInfoLegacy};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SetRecord {
    pub this: usize,
    pub frame_count: usize,
    pub selected_device: i32,
    pub offload_version: u16,
    pub content_id: i32,
    pub sync_id: i32,
    pub do_not_reconnect: bool,
}

#[derive(Default)]
pub struct Ledger {
    pub strong: std::collections::HashMap<usize, i32>,
    /// (object, id, delta) per strong-count mutation.
    pub strong_events: Vec<(usize, usize, i32)>,
    pub weak: std::collections::HashMap<usize, i32>,
    /// Objects whose strong count reaching zero must go through the deleting
    /// destructor in their vtable (slot 1 past the address point).
    pub vtable_objects: std::collections::HashSet<usize>,
    /// (operation, this) for every foreign call that reached a stub.
    pub calls: Vec<(&'static str, usize)>,
    pub set_records: Vec<SetRecord>,
    pub ctor_calls: Vec<usize>,
    pub obtained: Vec<(usize, u32)>,
    pub released: Vec<(usize, u32)>,
}

static LEDGER: Mutex<Option<Ledger>> = Mutex::new(None);

pub fn ledger() -> MutexGuard<'static, Option<Ledger>> {
    let mut guard = LEDGER.lock().unwrap();
    if guard.is_none() {
        *guard = Some(Ledger::default());
    }
    guard
}

pub fn with_ledger<R>(f: impl FnOnce(&mut Ledger) -> R) -> R {
    f(ledger().as_mut().unwrap())
}

fn record(op: &'static str, this: *mut c_void) {
    with_ledger(|l| l.calls.push((op, this as usize)));
}

// --- RefBase stubs ---------------------------------------------------------

unsafe extern "C" fn rb_ctor(this: *mut c_void) {
    with_ledger(|l| {
        l.vtable_objects.insert(this as usize);
        l.calls.push(("refbase_ctor", this as usize));
    });
    // mimic the real constructor writing the bookkeeping pointer
    *(this as *mut usize).add(1) = 0;
}

unsafe extern "C" fn rb_dtor(this: *mut c_void) {
    record("refbase_dtor", this);
}

unsafe extern "C" fn rb_inc_strong(this: *const c_void, id: *const c_void) {
    with_ledger(|l| {
        *l.strong.entry(this as usize).or_insert(0) += 1;
        l.strong_events.push((this as usize, id as usize, 1));
    });
}

unsafe extern "C" fn rb_dec_strong(this: *const c_void, id: *const c_void) {
    let call_deleter = with_ledger(|l| {
        let count = l.strong.entry(this as usize).or_insert(0);
        *count -= 1;
        l.strong_events.push((this as usize, id as usize, -1));
        *count == 0 && l.vtable_objects.contains(&(this as usize))
    });
    if call_deleter {
        // what the real library does when the last strong reference dies:
        // onLastStrongRef through the vtable, then `delete this` through the
        // deleting-destructor slot
        let vtable = *(this as *const *const usize);
        let on_last_strong: unsafe extern "C" fn(*mut c_void, *const c_void) =
            std::mem::transmute(*vtable.add(3));
        on_last_strong(this as *mut c_void, id);
        let deleting_dtor: unsafe extern "C" fn(*mut c_void) =
            std::mem::transmute(*vtable.add(1));
        deleting_dtor(this as *mut c_void);
    }
}

unsafe extern "C" fn rb_create_weak(this: *const c_void, id: *const c_void) -> *mut c_void {
    let refs = Box::into_raw(Box::new(0usize)) as *mut c_void;
    with_ledger(|l| {
        *l.weak.entry(refs as usize).or_insert(0) += 1;
        l.calls.push(("create_weak", this as usize));
        let _ = id;
    });
    refs
}

unsafe extern "C" fn rb_weak_dec(refs: *const c_void, _id: *const c_void) {
    let free_it = with_ledger(|l| {
        let count = l.weak.entry(refs as usize).or_insert(0);
        *count -= 1;
        *count == 0
    });
    if free_it {
        drop(Box::from_raw(refs as *mut usize));
    }
}

// --- construction ----------------------------------------------------------

unsafe extern "C" fn ctor_default(this: *mut c_void) {
    with_ledger(|l| l.ctor_calls.push(this as usize));
}

unsafe extern "C" fn ctor_attribution(this: *mut c_void, _attribution: *const c_void) {
    with_ledger(|l| l.ctor_calls.push(this as usize));
}

unsafe extern "C" fn parcel_for_java_object(_env: *mut c_void, _obj: *mut c_void) -> *mut c_void {
    std::ptr::null_mut()
}

unsafe extern "C" fn attribution_read_parcel(this: *mut c_void, _parcel: *const c_void) -> i32 {
    record("attribution_read_parcel", this);
    0
}

// --- set() overloads -------------------------------------------------------

#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn set_v21(
    this: *mut c_void,
    _stream_type: i32,
    _sample_rate: u32,
    _format: u32,
    _channel_mask: u32,
    frame_count: usize,
    _flags: u32,
    _callback: Option<LegacyCallbackFn>,
    _user: *mut c_void,
    _notification_frames: i32,
    _shared: *const FakeSp,
    _can_call_java: bool,
    _session_id: i32,
    _transfer: i32,
    offload: *const c_void,
    _uid: i32,
    _pid: i32,
    _attributes: *const c_void,
) -> i32 {
    record_legacy_set(this, frame_count, 0, offload, false);
    0
}

#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn set_v23(
    this: *mut c_void,
    _stream_type: i32,
    _sample_rate: u32,
    _format: u32,
    _channel_mask: u32,
    frame_count: usize,
    _flags: u32,
    _callback: Option<LegacyCallbackFn>,
    _user: *mut c_void,
    _notification_frames: i32,
    _shared: *const FakeSp,
    _can_call_java: bool,
    _session_id: i32,
    _transfer: i32,
    offload: *const c_void,
    _uid: i32,
    _pid: i32,
    _attributes: *const c_void,
    do_not_reconnect: bool,
) -> i32 {
    record_legacy_set(this, frame_count, 0, offload, do_not_reconnect);
    0
}

#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn set_v24(
    this: *mut c_void,
    _stream_type: i32,
    _sample_rate: u32,
    _format: u32,
    _channel_mask: u32,
    frame_count: usize,
    _flags: u32,
    _callback: Option<LegacyCallbackFn>,
    _user: *mut c_void,
    _notification_frames: i32,
    _shared: *const FakeSp,
    _can_call_java: bool,
    _session_id: i32,
    _transfer: i32,
    offload: *const c_void,
    _uid: i32,
    _pid: i32,
    _attributes: *const c_void,
    do_not_reconnect: bool,
    _max_required_speed: f32,
) -> i32 {
    record_legacy_set(this, frame_count, 0, offload, do_not_reconnect);
    0
}

#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn set_v26(
    this: *mut c_void,
    _stream_type: i32,
    _sample_rate: u32,
    _format: u32,
    _channel_mask: u32,
    frame_count: usize,
    _flags: u32,
    _callback: Option<LegacyCallbackFn>,
    _user: *mut c_void,
    _notification_frames: i32,
    _shared: *const FakeSp,
    _can_call_java: bool,
    _session_id: i32,
    _transfer: i32,
    offload: *const c_void,
    _uid: u32,
    _pid: i32,
    _attributes: *const c_void,
    do_not_reconnect: bool,
    _max_required_speed: f32,
) -> i32 {
    record_legacy_set(this, frame_count, 0, offload, do_not_reconnect);
    0
}

#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn set_v28(
    this: *mut c_void,
    _stream_type: i32,
    _sample_rate: u32,
    _format: u32,
    _channel_mask: u32,
    frame_count: usize,
    _flags: u32,
    _callback: Option<LegacyCallbackFn>,
    _user: *mut c_void,
    _notification_frames: i32,
    _shared: *const FakeSp,
    _can_call_java: bool,
    _session_id: i32,
    _transfer: i32,
    offload: *const c_void,
    _uid: u32,
    _pid: i32,
    _attributes: *const c_void,
    do_not_reconnect: bool,
    _max_required_speed: f32,
    selected_device: i32,
) -> i32 {
    record_modern_set(this, frame_count, selected_device, offload, do_not_reconnect);
    0
}

#[allow(clippy::too_many_arguments)]
unsafe extern "C" fn set_v31(
    this: *mut c_void,
    _stream_type: i32,
    _sample_rate: u32,
    _format: u32,
    _channel_mask: u32,
    frame_count: usize,
    _flags: u32,
    _callback: *const FakeWp,
    _notification_frames: i32,
    _shared: *const FakeSp,
    _can_call_java: bool,
    _session_id: i32,
    _transfer: i32,
    offload: *const c_void,
    _attribution: *const c_void,
    _attributes: *const c_void,
    do_not_reconnect: bool,
    _max_required_speed: f32,
    selected_device: i32,
) -> i32 {
    record_modern_set(this, frame_count, selected_device, offload, do_not_reconnect);
    0
}

unsafe fn record_legacy_set(
    this: *mut c_void,
    frame_count: usize,
    selected_device: i32,
    offload: *const c_void,
    do_not_reconnect: bool,
) {
    let info = &*(offload as *const OffloadInfoLegacy);
    with_ledger(|l| {
        l.calls.push(("set", this as usize));
        l.set_records.push(SetRecord {
            this: this as usize,
            frame_count,
            selected_device,
            offload_version: info.version,
            content_id: 0,
            sync_id: 0,
            do_not_reconnect,
        });
    });
}

unsafe fn record_modern_set(
    this: *mut c_void,
    frame_count: usize,
    selected_device: i32,
    offload: *const c_void,
    do_not_reconnect: bool,
) {
    let info = &*(offload as *const OffloadInfo);
    with_ledger(|l| {
        l.calls.push(("set", this as usize));
        l.set_records.push(SetRecord {
            this: this as usize,
            frame_count,
            selected_device,
            offload_version: info.version,
            content_id: info.content_id,
            sync_id: info.sync_id,
            do_not_reconnect,
        });
    });
}

// --- lifecycle / queries ---------------------------------------------------

unsafe extern "C" fn start(this: *mut c_void) -> i32 {
    record("start", this);
    0
}

unsafe extern "C" fn stop(this: *mut c_void) {
    record("stop", this);
}

unsafe extern "C" fn stopped(this: *mut c_void) -> bool {
    record("stopped", this);
    true
}

unsafe extern "C" fn pause(this: *mut c_void) {
    record("pause", this);
}

unsafe extern "C" fn pause_and_wait(this: *mut c_void, _timeout_ms: *const i64) -> bool {
    record("pause_and_wait", this);
    true
}

unsafe extern "C" fn flush(this: *mut c_void) {
    record("flush", this);
}

unsafe extern "C" fn reload(this: *mut c_void) -> i32 {
    record("reload", this);
    0
}

unsafe extern "C" fn has_started(this: *mut c_void) -> bool {
    record("has_started", this);
    false
}

unsafe extern "C" fn get_output(this: *mut c_void) -> u32 {
    record("get_output", this);
    7
}

unsafe extern "C" fn set_f32(this: *mut c_void, _value: f32) -> i32 {
    record("set_f32", this);
    0
}

unsafe extern "C" fn get_f32(this: *mut c_void, out: *mut f32) -> i32 {
    record("get_f32", this);
    *out = 0.5;
    0
}

unsafe extern "C" fn set_i32(this: *mut c_void, _value: i32) -> i32 {
    record("set_i32", this);
    0
}

unsafe extern "C" fn get_i32(this: *mut c_void) -> i32 {
    record("get_i32", this);
    5
}

unsafe extern "C" fn set_u32(this: *mut c_void, _value: u32) -> i32 {
    record("set_u32", this);
    0
}

unsafe extern "C" fn get_u32_out(this: *mut c_void, out: *mut u32) -> i32 {
    record("get_u32_out", this);
    *out = 48000;
    0
}

unsafe extern "C" fn get_u32(this: *mut c_void) -> u32 {
    record("get_u32", this);
    48000
}

unsafe extern "C" fn set_loop(this: *mut c_void, _start: u32, _end: u32, _count: i32) -> i32 {
    record("set_loop", this);
    0
}

unsafe extern "C" fn get_i64_out(this: *mut c_void, out: *mut i64) -> i32 {
    record("get_i64_out", this);
    *out = 1_000_000;
    0
}

unsafe extern "C" fn pending_duration(this: *mut c_void, out: *mut i32, _location: i32) -> i32 {
    record("pending_duration", this);
    *out = 100;
    0
}

unsafe extern "C" fn get_extended_timestamp(
    this: *mut c_void,
    ts: *mut ExtendedTimestamp,
) -> i32 {
    record("get_extended_timestamp", this);
    *ts = ExtendedTimestamp::default();
    0
}

unsafe extern "C" fn get_timestamp(this: *mut c_void, ts: *mut AudioTimestamp) -> i32 {
    record("get_timestamp", this);
    (*ts).position = 42;
    (*ts).time = libc::timespec { tv_sec: 1, tv_nsec: 0 };
    0
}

unsafe extern "C" fn get_playback_rate(this: *mut c_void) -> PlaybackRate {
    record("get_playback_rate", this);
    PlaybackRate { speed: 1.0, pitch: 1.0, stretch_mode: 0, fallback_mode: 0 }
}

unsafe extern "C" fn set_playback_rate(this: *mut c_void, _rate: *const PlaybackRate) -> i32 {
    record("set_playback_rate", this);
    0
}

unsafe extern "C" fn write(this: *mut c_void, _buf: *const c_void, size: u32, _blocking: bool) -> isize {
    record("write", this);
    size as isize
}

static NEXT_BUFFER: AtomicUsize = AtomicUsize::new(0x1000);
static NEXT_SEQUENCE: AtomicU32 = AtomicU32::new(1);

unsafe extern "C" fn obtain_buffer(
    this: *mut c_void,
    buf: *mut TrackBuffer,
    _wait_count: i32,
    non_contig: *mut usize,
) -> i32 {
    record("obtain_buffer", this);
    let raw = NEXT_BUFFER.fetch_add(0x100, Ordering::Relaxed);
    let sequence = NEXT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    (*buf).raw = raw as *mut c_void;
    (*buf).size = (*buf).frame_count * 4;
    (*buf).sequence = sequence;
    if !non_contig.is_null() {
        *non_contig = 0;
    }
    with_ledger(|l| l.obtained.push((raw, sequence)));
    0
}

unsafe extern "C" fn release_buffer(this: *mut c_void, buf: *const TrackBuffer) {
    record("release_buffer", this);
    with_ledger(|l| l.released.push(((*buf).raw as usize, (*buf).sequence)));
}

unsafe extern "C" fn string8_ctor(this: *mut String8, s: *const libc::c_char) {
    (*this).data = s;
}

unsafe extern "C" fn string8_dtor(_this: *mut String8) {}

unsafe extern "C" fn set_parameters(this: *mut c_void, _params: *const String8) -> i32 {
    record("set_parameters", this);
    0
}

unsafe extern "C" fn get_parameters(ret: *mut String8, this: *mut c_void, _keys: *const String8) {
    record("get_parameters", this);
    (*ret).data = std::ptr::null();
}

unsafe extern "C" fn device_callback_reg(this: *mut c_void, _cb: *const FakeSp) -> i32 {
    record("device_callback_reg", this);
    0
}

unsafe extern "C" fn get_routed_device_id(this: *mut c_void) -> i32 {
    record("get_routed_device_id", this);
    5
}

unsafe extern "C" fn get_routed_device_ids(ret: *mut CxxIntVector, this: *mut c_void) {
    record("get_routed_device_ids", this);
    *ret = CxxIntVector::empty();
}

unsafe extern "C" fn min_frame_count(out: *mut usize, _stream_type: i32, _sample_rate: u32) -> i32 {
    *out = 1234;
    0
}

unsafe extern "C" fn is_offload_supported(_info: *const c_void) -> bool {
    true
}

unsafe extern "C" fn is_offloaded_or_direct(this: *mut c_void) -> bool {
    record("is_offloaded_or_direct", this);
    false
}

unsafe extern "C" fn extended_is_track_offloaded(_this: *mut c_void, _output: u32) -> bool {
    false
}

unsafe extern "C" fn get_output_for_attr(
    _attr: *const c_void,
    output: *mut i32,
    _session: i32,
    _stream: *mut i32,
    _uid: u32,
    _sampling_rate: u32,
    _format: u32,
    _channel_mask: u32,
    _flags: u32,
    _selected_device: i32,
    _offload_info: *const c_void,
) -> i32 {
    *output = 9;
    0
}

unsafe extern "C" fn af_latency(_output: i32, out: *mut u32) -> i32 {
    *out = 20;
    0
}

unsafe extern "C" fn af_frame_count(_output: i32, out: *mut usize) -> i32 {
    *out = 960;
    0
}

unsafe extern "C" fn af_sampling_rate(_output: i32, out: *mut u32) -> i32 {
    *out = 48000;
    0
}

unsafe extern "C" fn release_output(output: i32, _stream: i32, _session: i32) {
    with_ledger(|l| l.calls.push(("release_output", output as usize)));
}

/// Symbol source backed by the stubs above.
pub struct StubSource;

impl SymbolSource for StubSource {
    fn resolve(&self, _lib: Lib, name: &str) -> Option<*mut c_void> {
        let f: *mut c_void = match name {
            "_ZN7android7RefBaseC2Ev" => rb_ctor as *mut c_void,
            "_ZN7android7RefBaseD2Ev" => rb_dtor as *mut c_void,
            "_ZNK7android7RefBase9incStrongEPKv" => rb_inc_strong as *mut c_void,
            "_ZNK7android7RefBase9decStrongEPKv" => rb_dec_strong as *mut c_void,
            "_ZNK7android7RefBase10createWeakEPKv" => rb_create_weak as *mut c_void,
            "_ZN7android7RefBase12weakref_type7decWeakEPKv" => rb_weak_dec as *mut c_void,
            "_ZN7android19parcelForJavaObjectEP7_JNIEnvP8_jobject" => {
                parcel_for_java_object as *mut c_void
            }
            "_ZN7android7content22AttributionSourceState14readFromParcelEPKNS_6ParcelE" => {
                attribution_read_parcel as *mut c_void
            }
            "_ZN7android10AudioTrackC1ERKNS_7content22AttributionSourceStateE" => {
                ctor_attribution as *mut c_void
            }
            "_ZN7android10AudioTrackC1Ev" => ctor_default as *mut c_void,
            "_ZN7android11AudioSystem18isOffloadSupportedERK20audio_offload_info_t" => {
                is_offload_supported as *mut c_void
            }
            "_ZN7android10AudioTrack18getRoutedDeviceIdsEv" => {
                get_routed_device_ids as *mut c_void
            }
            "_ZN7android10AudioTrack17getRoutedDeviceIdEv" => get_routed_device_id as *mut c_void,
            "_ZN7android10AudioTrack15setOutputDeviceEi" => set_i32 as *mut c_void,
            "_ZN7android10AudioTrack15getOutputDeviceEv" => get_i32 as *mut c_void,
            "_ZN7android10AudioTrack22addAudioDeviceCallbackERKNS_2spINS_11AudioSystem19AudioDeviceCallbackEEE"
            | "_ZN7android10AudioTrack25removeAudioDeviceCallbackERKNS_2spINS_11AudioSystem19AudioDeviceCallbackEEE" => {
                device_callback_reg as *mut c_void
            }
            "_ZNK7android10AudioTrack21getOriginalSampleRateEv" => get_u32 as *mut c_void,
            "_ZNK7android10AudioTrack15getPlaybackRateEv" => get_playback_rate as *mut c_void,
            "_ZN7android10AudioTrack15setPlaybackRateERKNS_17AudioPlaybackRateE" => {
                set_playback_rate as *mut c_void
            }
            "_ZNK7android10AudioTrack19isOffloadedOrDirectEv" => {
                is_offloaded_or_direct as *mut c_void
            }
            "_ZN7android10AudioTrack21getBufferDurationInUsEPl" => get_i64_out as *mut c_void,
            "_ZN7android10AudioTrack15pendingDurationEPiNS_17ExtendedTimestamp8LocationE" => {
                pending_duration as *mut c_void
            }
            "_ZN7android10AudioTrack12getTimestampEPNS_17ExtendedTimestampE" => {
                get_extended_timestamp as *mut c_void
            }
            "_ZN7android10AudioTrack16getMinFrameCountEPm19audio_stream_type_tj" => {
                min_frame_count as *mut c_void
            }
            "_ZN7android11AudioSystem10getLatencyEiPj" => af_latency as *mut c_void,
            "_ZN7android11AudioSystem13getFrameCountEiPm" => af_frame_count as *mut c_void,
            "_ZN7android11AudioSystem15getSamplingRateEiPj" => af_sampling_rate as *mut c_void,
            "_ZN7android11AudioSystem13releaseOutputEi19audio_stream_type_t15audio_session_t" => {
                release_output as *mut c_void
            }
            "_ZN7android11AudioSystem16getOutputForAttrEPK18audio_attributes_tPi15audio_session_tP19audio_stream_type_tjj14audio_format_tj20audio_output_flags_tiPK20audio_offload_info_t" => {
                get_output_for_attr as *mut c_void
            }
            name if name.starts_with("_ZN7android10AudioTrack3setE") => match name {
                n if n.ends_with("AttributionSourceStateEPK18audio_attributes_tbfi") => {
                    set_v31 as *mut c_void
                }
                n if n.ends_with("tjiPK18audio_attributes_tbfi") => set_v28 as *mut c_void,
                n if n.ends_with("tjiPK18audio_attributes_tbf") => set_v26 as *mut c_void,
                n if n.ends_with("tiiPK18audio_attributes_tbf") => set_v24 as *mut c_void,
                n if n.ends_with("tiiPK18audio_attributes_tb") => set_v23 as *mut c_void,
                _ => set_v21 as *mut c_void,
            },
            "_ZNK7android10AudioTrack9getOutputEv" => get_output as *mut c_void,
            "_ZN7android10AudioTrack12pauseAndWaitERKNSt3__16chrono8durationIxNS1_5ratioILl1ELl1000EEEEE" => {
                pause_and_wait as *mut c_void
            }
            "_ZN7android10AudioTrack10hasStartedEv" => has_started as *mut c_void,
            "_ZN7android10AudioTrack5startEv" => start as *mut c_void,
            "_ZN7android10AudioTrack4stopEv" => stop as *mut c_void,
            "_ZNK7android10AudioTrack7stoppedEv" => stopped as *mut c_void,
            "_ZN7android10AudioTrack5pauseEv" => pause as *mut c_void,
            "_ZN7android10AudioTrack5flushEv" => flush as *mut c_void,
            "_ZN7android10AudioTrack6reloadEv" => reload as *mut c_void,
            "_ZN7android10AudioTrack9setVolumeEf"
            | "_ZN7android10AudioTrack21setAuxEffectSendLevelEf" => set_f32 as *mut c_void,
            "_ZNK7android10AudioTrack21getAuxEffectSendLevelEPf" => get_f32 as *mut c_void,
            "_ZN7android10AudioTrack15attachAuxEffectEi" => set_i32 as *mut c_void,
            "_ZN7android10AudioTrack13setSampleRateEj"
            | "_ZN7android10AudioTrack17setMarkerPositionEj"
            | "_ZN7android10AudioTrack23setPositionUpdatePeriodEj"
            | "_ZN7android10AudioTrack11setPositionEj" => set_u32 as *mut c_void,
            "_ZNK7android10AudioTrack13getSampleRateEv" => get_u32 as *mut c_void,
            "_ZNK7android10AudioTrack17getMarkerPositionEPj"
            | "_ZNK7android10AudioTrack23getPositionUpdatePeriodEPj"
            | "_ZN7android10AudioTrack11getPositionEPj"
            | "_ZN7android10AudioTrack17getBufferPositionEPj" => get_u32_out as *mut c_void,
            "_ZN7android10AudioTrack7setLoopEjji" => set_loop as *mut c_void,
            "_ZNK7android10AudioTrack17getUnderrunFramesEv" => get_u32 as *mut c_void,
            "_ZN7android7String8C1EPKc" => string8_ctor as *mut c_void,
            "_ZN7android7String8D1Ev" => string8_dtor as *mut c_void,
            "_ZN7android10AudioTrack13setParametersERKNS_7String8E" => {
                set_parameters as *mut c_void
            }
            "_ZN7android10AudioTrack13getParametersERKNS_7String8E" => {
                get_parameters as *mut c_void
            }
            "_ZN7android10AudioTrack12getTimestampERNS_14AudioTimestampE" => {
                get_timestamp as *mut c_void
            }
            "_ZN7android10AudioTrack5writeEPKvjb" => write as *mut c_void,
            "_ZN7android10AudioTrack12obtainBufferEPNS0_6BufferEiPj" => {
                obtain_buffer as *mut c_void
            }
            "_ZN7android10AudioTrack13releaseBufferEPKNS0_6BufferE" => {
                release_buffer as *mut c_void
            }
            "_ZNK7android10AudioTrack16getHalSampleRateEv"
            | "_ZNK7android10AudioTrack18getHalChannelCountEv"
            | "_ZNK7android10AudioTrack12getHalFormatEv" => get_u32 as *mut c_void,
            "_ZN7android18ExtendedMediaUtils26AudioTrackIsTrackOffloadedEi" => {
                extended_is_track_offloaded as *mut c_void
            }
            _ => return None,
        };
        Some(f)
    }
}

/// A fully populated dispatch table over the stubs, gated by the real
/// resolution logic.
pub fn stub_dispatch(level: i32) -> Dispatch {
    Dispatch::resolve(level, &StubSource).expect("stub resolution")
}
