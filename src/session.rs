//! The session facade. Owns the fabricated foreign track object, sequences
//! the version-dispatched calls around it, and keeps the bookkeeping the
//! buffer-release protocol and the death handling depend on.

use std::collections::HashMap;
use std::ffi::{c_void, CStr, CString};
use std::sync::atomic::{AtomicBool, AtomicPtr, Ordering};
use std::sync::{Arc, Mutex};

use log::{debug, error, info};

use crate::bridge::{legacy_callback_adapter, CallbackObject, CallbackSink};
use crate::dispatch::{Dispatch, RoutedCall, SetCall, SymbolSource};
use crate::layout::{
    AudioAttributes, AudioAttributesLegacy, AudioTimestamp, CxxIntVector, ExtendedTimestamp,
    OffloadInfo, OffloadInfoLegacy, PlaybackRate, String8, TrackBuffer, OFFLOAD_INFO_VERSION_0_1,
    OFFLOAD_INFO_VERSION_0_2,
};
use crate::offsets;
use crate::platform::{
    Abi, OutputFlags, AUDIO_SOURCE_DEFAULT, AUDIO_STREAM_MUSIC, AUDIO_USAGE_MEDIA, BAD_PARAMETER,
    DEAD_OBJECT, NO_ERROR, UNSUPPORTED,
};
use crate::refbase::{virtual_refbase_of, FakeSp, FakeWp};
use crate::routing::{RoutingObject, RoutingSink};

/// Conservative over-allocation for the opaque track object (1312 bytes is
/// the largest observed real size, on current arm64). If a future release
/// outgrows this, nothing here can detect it.
pub const TRACK_BLOCK_SIZE: usize = 5000;
/// Fill for the fabricated block, so a field the real constructor leaves
/// uninitialized reads as obvious garbage instead of a plausible zero.
pub const TRACK_BLOCK_POISON: u8 = 0xde;
/// Over-allocation for the caller-identity block (152 bytes observed).
pub const ATTRIBUTION_BLOCK_SIZE: usize = 500;

/// Allocation shims. The foreign object's own destructor frees the block
/// through the platform allocator, so everything here must come from malloc.
mod mem {
    use std::ffi::c_void;

    #[cfg(test)]
    pub(super) static LIVE: std::sync::Mutex<Vec<usize>> = std::sync::Mutex::new(Vec::new());
    #[cfg(test)]
    pub(super) static FREED: std::sync::Mutex<Vec<usize>> = std::sync::Mutex::new(Vec::new());

    pub(super) unsafe fn alloc(size: usize, fill: u8) -> *mut c_void {
        let ptr = libc::malloc(size);
        if ptr.is_null() {
            return ptr;
        }
        std::ptr::write_bytes(ptr as *mut u8, fill, size);
        #[cfg(test)]
        LIVE.lock().unwrap().push(ptr as usize);
        ptr
    }

    pub(super) unsafe fn free(ptr: *mut c_void) {
        if ptr.is_null() {
            return;
        }
        #[cfg(test)]
        {
            let mut live = LIVE.lock().unwrap();
            let index = live
                .iter()
                .position(|&p| p == ptr as usize)
                .expect("freeing unknown or already-freed block");
            live.swap_remove(index);
            FREED.lock().unwrap().push(ptr as usize);
        }
        libc::free(ptr);
    }

    // Note: a freed address may be handed out again by a later alloc, so
    // this only answers "was freed at some point"; double frees are caught
    // by the panic in `free` itself.
    #[cfg(test)]
    pub(super) fn was_freed(ptr: usize) -> bool {
        FREED.lock().unwrap().contains(&ptr)
    }
}

/// Everything `set()` needs. Mirrors the foreign parameter set across all
/// historical overloads; fields a given release has no slot for are ignored
/// there.
pub struct SetParams {
    pub stream_type: i32,
    pub sample_rate: u32,
    pub format: u32,
    pub channel_mask: u32,
    pub frame_count: i32,
    pub track_flags: u32,
    pub session_id: i32,
    pub max_required_speed: f32,
    pub selected_device_id: i32,
    pub bit_rate: u32,
    pub duration_us: i64,
    pub has_video: bool,
    pub small_buf: bool,
    pub is_streaming: bool,
    pub bit_width: u32,
    pub offload_buffer_size: u32,
    pub usage: i32,
    pub content_type: i32,
    pub attr_flags: u32,
    pub notification_frames: i32,
    pub do_not_reconnect: bool,
    pub transfer_mode: i32,
    pub content_id: i32,
    pub sync_id: i32,
    pub encapsulation_mode: i32,
    pub shared_memory: *mut c_void,
}

impl Default for SetParams {
    fn default() -> Self {
        Self {
            stream_type: AUDIO_STREAM_MUSIC,
            sample_rate: 44100,
            format: 1,
            channel_mask: 3,
            frame_count: 0,
            track_flags: 0,
            session_id: 0,
            max_required_speed: 1.0,
            selected_device_id: 0,
            bit_rate: 0,
            duration_us: -1,
            has_video: false,
            small_buf: false,
            is_streaming: false,
            bit_width: 16,
            offload_buffer_size: 0,
            usage: AUDIO_USAGE_MEDIA,
            content_type: 2,
            attr_flags: 0,
            notification_frames: 0,
            do_not_reconnect: false,
            transfer_mode: 0,
            content_id: 0,
            sync_id: 0,
            encapsulation_mode: 0,
            shared_memory: std::ptr::null_mut(),
        }
    }
}

pub enum ObtainOutcome {
    Dead,
    Failed(i32),
    Buffer {
        data: *mut c_void,
        size: usize,
        non_contig: usize,
    },
}

pub struct TrackHolder {
    dispatch: Arc<Dispatch>,
    abi: Abi,
    track: *mut c_void,
    callback: AtomicPtr<CallbackObject>,
    device_callback: AtomicPtr<RoutingObject>,
    attribution: AtomicPtr<c_void>,
    death_emulation: AtomicBool,
    died: AtomicBool,
    /// Live transfer buffers: address of the handed-out region to the opaque
    /// sequence number that must be echoed back at release time.
    sequences: Mutex<HashMap<usize, u32>>,
}

unsafe impl Send for TrackHolder {}
unsafe impl Sync for TrackHolder {}

impl TrackHolder {
    /// Fabricates the foreign object and wires up the callback machinery.
    /// `attribution_parcel` is the library-native parcel carrying the caller
    /// identity; supplying one implies a release that expects attribution.
    ///
    /// On success the returned session owns exactly one strong reference on
    /// the track and one on the callback bridge, both held under the
    /// session's own address as identity token. On failure nothing foreign
    /// keeps a reference and every partial allocation is gone.
    pub unsafe fn create(
        dispatch: Arc<Dispatch>,
        abi: Abi,
        attribution_parcel: Option<*mut c_void>,
        sink: Box<dyn CallbackSink>,
        routing_sink: Box<dyn RoutingSink>,
    ) -> Option<Box<TrackHolder>> {
        let track = mem::alloc(TRACK_BLOCK_SIZE, TRACK_BLOCK_POISON);
        if track.is_null() {
            return None;
        }
        let mut holder = Box::new(TrackHolder {
            dispatch: dispatch.clone(),
            abi,
            track,
            callback: AtomicPtr::new(std::ptr::null_mut()),
            device_callback: AtomicPtr::new(std::ptr::null_mut()),
            attribution: AtomicPtr::new(std::ptr::null_mut()),
            death_emulation: AtomicBool::new(false),
            died: AtomicBool::new(false),
            sequences: Mutex::new(HashMap::new()),
        });

        if let Some(parcel) = attribution_parcel {
            let (Some(read_parcel), Some(ctor)) =
                (dispatch.attribution_read_parcel, dispatch.ctor_attribution)
            else {
                error!("attribution construction not available on level {}", dispatch.level);
                mem::free(track);
                return None;
            };
            let ats = mem::alloc(ATTRIBUTION_BLOCK_SIZE, 0);
            if ats.is_null() {
                mem::free(track);
                return None;
            }
            read_parcel(ats, parcel);
            ctor(track, ats);
            holder.attribution.store(ats, Ordering::Release);
        } else {
            let Some(ctor) = dispatch.ctor_default else {
                error!("default construction not available on level {}", dispatch.level);
                mem::free(track);
                return None;
            };
            ctor(track);
        }

        let id = holder.id();
        let bridge = CallbackObject::create(
            holder.as_mut() as *mut TrackHolder,
            sink,
            &dispatch.refbase,
        );
        if bridge.is_null() {
            holder.release_attribution();
            mem::free(track);
            return None;
        }
        dispatch.refbase.acquire(CallbackObject::refbase_ptr(bridge) as *const c_void, id);
        holder.callback.store(bridge, Ordering::Release);
        dispatch.refbase.acquire(holder.track_refbase() as *const c_void, id);

        if dispatch.level == 23 {
            let listener = RoutingObject::create(
                holder.as_mut() as *mut TrackHolder,
                routing_sink,
                &dispatch.refbase,
            );
            if !listener.is_null() {
                dispatch.refbase.acquire(listener as *const c_void, id);
                holder.device_callback.store(listener, Ordering::Release);
                let sp = FakeSp { ptr: listener as *mut c_void };
                if let Some(add) = dispatch.add_device_callback {
                    let ret = add(track, &sp);
                    if ret != NO_ERROR {
                        error!("failed to add device callback, error {ret}");
                    }
                }
            }
        }

        Some(holder)
    }

    fn id(&self) -> *const c_void {
        self as *const TrackHolder as *const c_void
    }

    /// The `RefBase` view of the foreign track. Virtual inheritance arrived
    /// in 13; from there the base offset has to come out of the real vtable.
    unsafe fn track_refbase(&self) -> *mut c_void {
        if self.dispatch.level >= 33 {
            virtual_refbase_of(self.track)
        } else {
            self.track
        }
    }

    fn guard(&self) -> Option<*mut c_void> {
        if self.died.load(Ordering::Acquire) {
            None
        } else {
            Some(self.track)
        }
    }

    fn release_attribution(&self) {
        let ats = self.attribution.swap(std::ptr::null_mut(), Ordering::AcqRel);
        if !ats.is_null() {
            unsafe { mem::free(ats) };
        }
    }

    pub fn is_dead(&self) -> bool {
        self.died.load(Ordering::Acquire)
    }

    pub fn death_emulation(&self) -> bool {
        self.death_emulation.load(Ordering::Acquire)
    }

    /// Terminal transition, driven by the one callback that means "the
    /// engine-side track is gone" on emulating builds. The track is quiesced
    /// first so a supervising caller observing the flag cannot race a
    /// restart against a still-running track.
    pub fn emulate_death(&self) {
        unsafe {
            (self.dispatch.pause)(self.track);
            (self.dispatch.stop)(self.track);
        }
        self.died.store(true, Ordering::Release);
    }

    pub fn level(&self) -> i32 {
        self.dispatch.level
    }

    pub fn abi(&self) -> Abi {
        self.abi
    }

    pub fn callback_object(&self) -> *mut CallbackObject {
        self.callback.load(Ordering::Acquire)
    }

    pub fn device_callback_object(&self) -> *mut RoutingObject {
        self.device_callback.load(Ordering::Acquire)
    }

    pub fn has_device_callback(&self) -> bool {
        !self.device_callback_object().is_null()
    }

    /// The raw foreign object pointer, for callers that need to hand it to
    /// other platform interfaces. Not guarded: the pointer itself stays
    /// valid until teardown.
    pub fn real_ptr(&self) -> *mut c_void {
        self.track
    }

    // --- set -----------------------------------------------------------

    pub unsafe fn set(&self, p: &SetParams) -> i32 {
        let d = &*self.dispatch;
        if d.level < 23 && p.max_required_speed != 1.0 {
            error!("speed adjustment needs 6.0, maxRequiredSpeed != 1.0 is wrong here");
            return BAD_PARAMETER;
        }
        if d.level < 23 && p.selected_device_id != 0 {
            error!("device selection needs 6.0, selectedDeviceId != 0 is wrong here");
            return BAD_PARAMETER;
        }
        if d.level < 30 && (p.content_id != 0 || p.sync_id != 0) {
            error!("tuner fields need 11, contentId/syncId != 0 is wrong here");
            return BAD_PARAMETER;
        }
        if self.is_dead() {
            return DEAD_OBJECT;
        }

        let shared = FakeSp { ptr: p.shared_memory };
        let mut frame_count = p.frame_count;

        // An offload info always goes along, even for plain PCM: without one
        // several vendor forks stub the path out, refuse legitimate offload,
        // or hardcode the wrong bit width.
        let mut offload_new = None;
        let mut offload_old = None;
        let mut attrs_new = None;
        let mut attrs_old = None;
        let (offload_ptr, attrs_ptr): (*const c_void, *const c_void) = if d.level >= 28 {
            let info = offload_new.insert(OffloadInfo {
                version: OFFLOAD_INFO_VERSION_0_2,
                size: std::mem::size_of::<OffloadInfo>() as u16,
                sample_rate: p.sample_rate,
                channel_mask: p.channel_mask,
                format: p.format,
                stream_type: p.stream_type,
                bit_rate: p.bit_rate,
                duration_us: p.duration_us,
                has_video: p.has_video,
                is_streaming: p.is_streaming,
                bit_width: p.bit_width,
                offload_buffer_size: p.offload_buffer_size,
                usage: p.usage,
                encapsulation_mode: p.encapsulation_mode,
                content_id: p.content_id,
                sync_id: p.sync_id,
            });
            let attrs = attrs_new.insert(AudioAttributes::new(
                p.content_type,
                p.usage,
                AUDIO_SOURCE_DEFAULT,
                p.attr_flags,
            ));
            (
                info as *const OffloadInfo as *const c_void,
                attrs as *const AudioAttributes as *const c_void,
            )
        } else {
            let info = offload_old.insert(OffloadInfoLegacy {
                version: OFFLOAD_INFO_VERSION_0_1,
                size: std::mem::size_of::<OffloadInfoLegacy>() as u16,
                sample_rate: p.sample_rate,
                channel_mask: p.channel_mask,
                format: p.format,
                stream_type: p.stream_type,
                bit_rate: p.bit_rate,
                duration_us: p.duration_us,
                has_video: p.has_video,
                is_streaming: p.is_streaming,
                bit_width: p.bit_width,
                offload_buffer_size: p.offload_buffer_size,
                usage: p.usage,
                use_small_bufs: p.small_buf,
            });
            let attrs = attrs_old.insert(AudioAttributesLegacy::new(
                p.content_type,
                p.usage,
                AUDIO_SOURCE_DEFAULT,
                p.attr_flags,
            ));
            (
                info as *const OffloadInfoLegacy as *const c_void,
                attrs as *const AudioAttributesLegacy as *const c_void,
            )
        };

        let user = self as *const TrackHolder as *mut c_void;
        let bridge = self.callback_object();

        match d.set_call {
            SetCall::V31(f) => {
                let refbase = CallbackObject::refbase_ptr(bridge);
                let refs = (d.refbase.create_weak)(refbase as *const c_void, self.id());
                let wp = FakeWp { ptr: bridge as *mut c_void, refs };
                let ats = self.attribution.load(Ordering::Acquire);
                let ret = f(
                    self.track,
                    p.stream_type,
                    p.sample_rate,
                    p.format,
                    p.channel_mask,
                    frame_count as usize,
                    p.track_flags,
                    &wp,
                    p.notification_frames,
                    &shared,
                    true,
                    p.session_id,
                    p.transfer_mode,
                    offload_ptr,
                    ats,
                    attrs_ptr,
                    p.do_not_reconnect,
                    p.max_required_speed,
                    p.selected_device_id,
                );
                // the wp copy constructor took its own weak count, so ours
                // goes away again (against the refs block, not the object)
                (d.refbase.weak_dec)(refs as *const c_void, self.id());
                // the identity block has been copied twice over by now
                self.release_attribution();
                ret
            }
            SetCall::V28(f) => f(
                self.track,
                p.stream_type,
                p.sample_rate,
                p.format,
                p.channel_mask,
                frame_count as usize,
                p.track_flags,
                Some(legacy_callback_adapter),
                user,
                p.notification_frames,
                &shared,
                true,
                p.session_id,
                p.transfer_mode,
                offload_ptr,
                libc::getuid(),
                libc::getpid(),
                attrs_ptr,
                p.do_not_reconnect,
                p.max_required_speed,
                p.selected_device_id,
            ),
            SetCall::V26(f) => {
                // this release has the setter and tolerates it before set();
                // one release later that order breaks, one earlier it does
                // not exist
                if let Some(set_device) = d.set_output_device {
                    set_device(self.track, p.selected_device_id);
                }
                f(
                    self.track,
                    p.stream_type,
                    p.sample_rate,
                    p.format,
                    p.channel_mask,
                    frame_count as usize,
                    p.track_flags,
                    Some(legacy_callback_adapter),
                    user,
                    p.notification_frames,
                    &shared,
                    true,
                    p.session_id,
                    p.transfer_mode,
                    offload_ptr,
                    libc::getuid(),
                    libc::getpid(),
                    attrs_ptr,
                    p.do_not_reconnect,
                    p.max_required_speed,
                )
            }
            SetCall::V24(f) => {
                self.patch_selected_device(p.selected_device_id);
                f(
                    self.track,
                    p.stream_type,
                    p.sample_rate,
                    p.format,
                    p.channel_mask,
                    frame_count as usize,
                    p.track_flags,
                    Some(legacy_callback_adapter),
                    user,
                    p.notification_frames,
                    &shared,
                    true,
                    p.session_id,
                    p.transfer_mode,
                    offload_ptr,
                    libc::getuid() as i32,
                    libc::getpid(),
                    attrs_ptr,
                    p.do_not_reconnect,
                    p.max_required_speed,
                )
            }
            SetCall::V23(f) => {
                self.patch_selected_device(p.selected_device_id);
                if p.max_required_speed > 1.0 {
                    if OutputFlags::from_bits_retain(p.track_flags).contains(OutputFlags::FAST) {
                        // the computed count may exceed what a fast track
                        // allows, but the estimate is conservative enough to
                        // try anyway
                        info!(
                            "fast track requested alongside speed({}) emulation, \
                             raising frame count regardless",
                            p.max_required_speed
                        );
                    }
                    if let Some(min) = self.emulated_min_frame_count(p, attrs_ptr, offload_ptr) {
                        if frame_count < min {
                            info!(
                                "raised frameCount({frame_count}) to minFrameCount({min}) \
                                 for maxRequiredSpeed({})",
                                p.max_required_speed
                            );
                            frame_count = min;
                        }
                    }
                }
                f(
                    self.track,
                    p.stream_type,
                    p.sample_rate,
                    p.format,
                    p.channel_mask,
                    frame_count as usize,
                    p.track_flags,
                    Some(legacy_callback_adapter),
                    user,
                    p.notification_frames,
                    &shared,
                    true,
                    p.session_id,
                    p.transfer_mode,
                    offload_ptr,
                    libc::getuid() as i32,
                    libc::getpid(),
                    attrs_ptr,
                    p.do_not_reconnect,
                )
            }
            SetCall::V21(f) => {
                let ret = f(
                    self.track,
                    p.stream_type,
                    p.sample_rate,
                    p.format,
                    p.channel_mask,
                    frame_count as usize,
                    p.track_flags,
                    Some(legacy_callback_adapter),
                    user,
                    p.notification_frames,
                    &shared,
                    true,
                    p.session_id,
                    p.transfer_mode,
                    offload_ptr,
                    libc::getuid() as i32,
                    libc::getpid(),
                    attrs_ptr,
                );
                if ret == NO_ERROR && p.do_not_reconnect {
                    if let Some(is_offloaded) = d.is_offloaded_or_direct {
                        // some forks of this vintage never deliver the
                        // new-track event for mixed playback; its arrival
                        // will be the death signal instead
                        self.death_emulation
                            .store(!is_offloaded(self.track), Ordering::Release);
                    }
                }
                ret
            }
        }
    }

    unsafe fn patch_selected_device(&self, device_id: i32) {
        if let Some(offset) = offsets::selected_device_offset(self.dispatch.level, self.abi) {
            *((self.track as *mut u8).add(offset) as *mut i32) = device_id;
        }
    }

    /// Grabs a mixer output matching the given parameters, runs the probe
    /// against its handle, and releases the output again whatever the probe
    /// returned.
    unsafe fn with_probe_output<R>(
        &self,
        p: &SetParams,
        attrs: *const c_void,
        offload: *const c_void,
        probe: impl FnOnce(i32) -> Option<R>,
    ) -> Option<R> {
        let d = &*self.dispatch;
        let get_output_for_attr = d.get_output_for_attr?;
        let release_output = d.release_output?;

        let mut output = 0i32;
        let mut stream_type = p.stream_type;
        let status = get_output_for_attr(
            attrs,
            &mut output,
            p.session_id,
            &mut stream_type,
            libc::getuid(),
            p.sample_rate,
            p.format,
            p.channel_mask,
            p.track_flags,
            p.selected_device_id,
            offload,
        );
        if status != NO_ERROR || output == 0 {
            error!(
                "no output for session {} stream {} rate {} format {:#x} flags {:#x}",
                p.session_id, p.stream_type, p.sample_rate, p.format, p.track_flags
            );
            return None;
        }
        let result = probe(output);
        release_output(output, p.stream_type, p.session_id);
        result
    }

    /// Asks the mixer for its geometry and derives the frame count a later
    /// release would have picked natively for this speed. Every step
    /// short-circuits to "no adjustment".
    unsafe fn emulated_min_frame_count(
        &self,
        p: &SetParams,
        attrs: *const c_void,
        offload: *const c_void,
    ) -> Option<i32> {
        let d = &*self.dispatch;
        let latency_of = d.af_latency?;
        let frame_count_of = d.af_frame_count?;
        let sampling_rate_of = d.af_sampling_rate?;

        self.with_probe_output(p, attrs, offload, |output| {
            let mut af_latency_ms = 0u32;
            let status = unsafe { latency_of(output, &mut af_latency_ms) };
            if status != NO_ERROR {
                error!("getLatency({output}) failed: {status}");
                return None;
            }
            let mut af_frames = 0usize;
            let status = unsafe { frame_count_of(output, &mut af_frames) };
            if status != NO_ERROR {
                error!("getFrameCount({output}) failed: {status}");
                return None;
            }
            let mut af_rate = 0u32;
            let status = unsafe { sampling_rate_of(output, &mut af_rate) };
            if status != NO_ERROR {
                error!("getSamplingRate({output}) failed: {status}");
                return None;
            }
            min_frame_count_for_speed(
                p.sample_rate,
                p.max_required_speed,
                af_latency_ms,
                af_frames,
                af_rate,
            )
        })
    }

    // --- transport ------------------------------------------------------

    pub fn start(&self) -> i32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.start)(track) },
            None => DEAD_OBJECT,
        }
    }

    pub fn stop(&self) {
        if let Some(track) = self.guard() {
            unsafe { (self.dispatch.stop)(track) }
        }
    }

    pub fn stopped(&self) -> bool {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.stopped)(track) },
            None => true,
        }
    }

    pub fn pause(&self) {
        if let Some(track) = self.guard() {
            unsafe { (self.dispatch.pause)(track) }
        }
    }

    pub fn pause_and_wait(&self, timeout_ms: i64) -> bool {
        let Some(track) = self.guard() else {
            return true;
        };
        match self.dispatch.pause_and_wait {
            Some(f) => unsafe { f(track, &timeout_ms) },
            None => {
                error!("pauseAndWait not available on level {}", self.dispatch.level);
                false
            }
        }
    }

    pub fn flush(&self) {
        if let Some(track) = self.guard() {
            unsafe { (self.dispatch.flush)(track) }
        }
    }

    pub fn reload(&self) -> i32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.reload)(track) },
            None => DEAD_OBJECT,
        }
    }

    pub fn has_started(&self) -> bool {
        let Some(track) = self.guard() else {
            return false;
        };
        match self.dispatch.has_started {
            Some(f) => unsafe { f(track) },
            None => false,
        }
    }

    pub fn output(&self) -> i32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.get_output)(track) as i32 },
            None => DEAD_OBJECT,
        }
    }

    // --- volume / effects ------------------------------------------------

    pub fn set_volume(&self, volume: f32) -> i32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.set_volume)(track, volume) },
            None => DEAD_OBJECT,
        }
    }

    pub fn set_aux_effect_send_level(&self, level: f32) -> i32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.set_aux_effect_send_level)(track, level) },
            None => DEAD_OBJECT,
        }
    }

    pub fn aux_effect_send_level(&self) -> f32 {
        let Some(track) = self.guard() else {
            return 0.0;
        };
        let mut level = 0.0f32;
        let status = unsafe { (self.dispatch.get_aux_effect_send_level)(track, &mut level) };
        if status != NO_ERROR {
            debug!("getAuxEffectSendLevel failed: {status}");
            return 0.0;
        }
        level
    }

    pub fn attach_aux_effect(&self, effect_id: i32) -> i32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.attach_aux_effect)(track, effect_id) },
            None => DEAD_OBJECT,
        }
    }

    // --- rate / position --------------------------------------------------

    pub fn set_sample_rate(&self, rate: u32) -> i32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.set_sample_rate)(track, rate) },
            None => DEAD_OBJECT,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.get_sample_rate)(track) },
            None => 0,
        }
    }

    pub fn original_sample_rate(&self) -> u32 {
        let Some(track) = self.guard() else {
            return 0;
        };
        match self.dispatch.get_original_sample_rate {
            Some(f) => unsafe { f(track) },
            None => 0,
        }
    }

    pub fn set_loop(&self, start: u32, end: u32, count: i32) -> i32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.set_loop)(track, start, end, count) },
            None => DEAD_OBJECT,
        }
    }

    pub fn set_marker_position(&self, position: u32) -> i32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.set_marker_position)(track, position) },
            None => DEAD_OBJECT,
        }
    }

    pub fn marker_position(&self) -> (i32, u32) {
        self.u32_query(self.dispatch.get_marker_position)
    }

    pub fn set_position_update_period(&self, period: u32) -> i32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.set_position_update_period)(track, period) },
            None => DEAD_OBJECT,
        }
    }

    pub fn position_update_period(&self) -> (i32, u32) {
        self.u32_query(self.dispatch.get_position_update_period)
    }

    pub fn set_position(&self, position: u32) -> i32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.set_position)(track, position) },
            None => DEAD_OBJECT,
        }
    }

    pub fn position(&self) -> (i32, u32) {
        self.u32_query(self.dispatch.get_position)
    }

    pub fn buffer_position(&self) -> (i32, u32) {
        self.u32_query(self.dispatch.get_buffer_position)
    }

    fn u32_query(&self, f: crate::dispatch::GetU32Fn) -> (i32, u32) {
        let Some(track) = self.guard() else {
            return (DEAD_OBJECT, 0);
        };
        let mut out = 0u32;
        let status = unsafe { f(track, &mut out) };
        (status, out)
    }

    pub fn buffer_duration_us(&self) -> i64 {
        let Some(track) = self.guard() else {
            return DEAD_OBJECT as i64;
        };
        let Some(f) = self.dispatch.get_buffer_duration_us else {
            return UNSUPPORTED as i64;
        };
        let mut out = 0i64;
        let status = unsafe { f(track, &mut out) };
        if status < 0 {
            status as i64
        } else {
            out
        }
    }

    pub fn playback_rate(&self) -> Option<PlaybackRate> {
        let track = self.guard()?;
        let f = self.dispatch.get_playback_rate?;
        Some(unsafe { f(track) })
    }

    pub fn set_playback_rate(&self, rate: &PlaybackRate) -> i32 {
        let Some(track) = self.guard() else {
            return DEAD_OBJECT;
        };
        match self.dispatch.set_playback_rate {
            Some(f) => unsafe { f(track, rate) },
            None => BAD_PARAMETER,
        }
    }

    pub fn pending_duration(&self, location: i32) -> i32 {
        let Some(track) = self.guard() else {
            return DEAD_OBJECT;
        };
        let Some(f) = self.dispatch.pending_duration else {
            return UNSUPPORTED;
        };
        let mut out = 0i32;
        let status = unsafe { f(track, &mut out, location) };
        if status < 0 {
            status
        } else {
            out
        }
    }

    /// Presentation timestamp as `(frames, combined nanoseconds)`.
    pub fn timestamp(&self) -> Result<(u32, i64), i32> {
        let Some(track) = self.guard() else {
            return Err(DEAD_OBJECT);
        };
        let mut ts = AudioTimestamp {
            position: 0,
            time: libc::timespec { tv_sec: 0, tv_nsec: 0 },
        };
        let status = unsafe { (self.dispatch.get_timestamp)(track, &mut ts) };
        if status != NO_ERROR {
            return Err(status);
        }
        Ok((ts.position, ts.when_ns()))
    }

    pub fn extended_timestamp(&self) -> (i32, ExtendedTimestamp) {
        let mut ts = ExtendedTimestamp::default();
        let Some(track) = self.guard() else {
            return (DEAD_OBJECT, ts);
        };
        let Some(f) = self.dispatch.get_extended_timestamp else {
            return (UNSUPPORTED, ts);
        };
        let status = unsafe { f(track, &mut ts) };
        (status, ts)
    }

    pub fn underrun_frames(&self) -> u32 {
        match self.guard() {
            Some(track) => unsafe { (self.dispatch.get_underrun_frames)(track) },
            None => 0,
        }
    }

    // --- data transfer ----------------------------------------------------

    pub unsafe fn write(&self, data: *const c_void, size: u32, blocking: bool) -> isize {
        match self.guard() {
            Some(track) => (self.dispatch.write)(track, data, size, blocking),
            None => DEAD_OBJECT as isize,
        }
    }

    pub unsafe fn obtain_buffer(
        &self,
        frame_size: u32,
        wait_count: i32,
        requested_frames: usize,
    ) -> ObtainOutcome {
        let Some(track) = self.guard() else {
            return ObtainOutcome::Dead;
        };
        let mut buffer = TrackBuffer {
            frame_count: requested_frames,
            size: requested_frames * frame_size as usize,
            raw: std::ptr::null_mut(),
            sequence: 0,
        };
        let mut non_contig = 0usize;
        let status =
            (self.dispatch.obtain_buffer)(track, &mut buffer, wait_count, &mut non_contig);
        if status != NO_ERROR {
            error!("obtainBuffer failed: {status}");
            return ObtainOutcome::Failed(status);
        }
        if buffer.frame_count * frame_size as usize != buffer.size {
            error!(
                "obtainBuffer geometry off: frameCount({}) frameSize({frame_size}) size({})",
                buffer.frame_count, buffer.size
            );
            buffer.frame_count = 0;
            buffer.size = 0;
            (self.dispatch.release_buffer)(track, &buffer);
            return ObtainOutcome::Failed(BAD_PARAMETER);
        }
        self.sequences
            .lock()
            .unwrap()
            .insert(buffer.raw as usize, buffer.sequence);
        ObtainOutcome::Buffer {
            data: buffer.raw,
            size: buffer.size,
            non_contig,
        }
    }

    pub unsafe fn release_buffer(&self, frame_size: u32, data: *mut c_void, limit: usize) {
        let Some(track) = self.guard() else {
            return;
        };
        let mut buffer = TrackBuffer {
            frame_count: limit / frame_size as usize,
            size: limit,
            raw: data,
            sequence: 0,
        };
        match self.sequences.lock().unwrap().remove(&(data as usize)) {
            Some(sequence) => buffer.sequence = sequence,
            // the protocol cannot work without the echoed value; this can
            // only mean the caller released something it never obtained
            None => error!("no sequence recorded for {data:p}, releasing with 0"),
        }
        (self.dispatch.release_buffer)(track, &buffer);
    }

    // --- key/value parameters ---------------------------------------------

    pub unsafe fn set_parameters(&self, pairs: &CStr) -> i32 {
        let Some(track) = self.guard() else {
            return DEAD_OBJECT;
        };
        let mut s8 = String8::uninit();
        (self.dispatch.string8_ctor)(&mut s8, pairs.as_ptr());
        let ret = (self.dispatch.set_parameters)(track, &s8);
        (self.dispatch.string8_dtor)(&mut s8);
        ret
    }

    pub unsafe fn parameters(&self, keys: &CStr) -> Option<CString> {
        let track = self.guard()?;
        let mut request = String8::uninit();
        (self.dispatch.string8_ctor)(&mut request, keys.as_ptr());
        let mut reply = String8::uninit();
        (self.dispatch.get_parameters)(&mut reply, track, &request);
        (self.dispatch.string8_dtor)(&mut request);
        let value = if reply.data.is_null() {
            CString::default()
        } else {
            CStr::from_ptr(reply.data).to_owned()
        };
        (self.dispatch.string8_dtor)(&mut reply);
        Some(value)
    }

    // --- routing ----------------------------------------------------------

    pub fn set_selected_device(&self, device_id: i32) -> i32 {
        let Some(track) = self.guard() else {
            return DEAD_OBJECT;
        };
        match self.dispatch.set_output_device {
            Some(f) => unsafe { f(track, device_id) },
            None => BAD_PARAMETER,
        }
    }

    pub fn selected_device(&self) -> i32 {
        let Some(track) = self.guard() else {
            return DEAD_OBJECT;
        };
        match self.dispatch.get_output_device {
            Some(f) => unsafe { f(track) },
            None => BAD_PARAMETER,
        }
    }

    pub fn routed_devices(&self) -> Option<Vec<i32>> {
        let track = self.guard()?;
        unsafe {
            match self.dispatch.routed {
                RoutedCall::Vector(f) => {
                    let mut ids = CxxIntVector::empty();
                    f(&mut ids, track);
                    let copy = ids.as_slice().to_vec();
                    ids.release();
                    Some(copy)
                }
                RoutedCall::Scalar(f) => Some(vec![f(track)]),
                RoutedCall::Unsupported => None,
            }
        }
    }

    // --- raw-offset reads -------------------------------------------------

    /// Effective notification-frame count, read straight out of the object
    /// on the releases that never exported an accessor for it.
    pub unsafe fn notification_frames_act(&self, probe: &dyn SymbolSource) -> i32 {
        let Some(track) = self.guard() else {
            return DEAD_OBJECT;
        };
        match offsets::notification_frames_offset(self.dispatch.level, self.abi, probe) {
            Some(offset) => *((track as *const u8).add(offset) as *const u32) as i32,
            None => UNSUPPORTED,
        }
    }

    /// Output flags by raw offset, pre-8.0 only (everything newer exposes a
    /// managed accessor that is both safer and correct per vendor).
    pub unsafe fn flags_from_offset(&self, probe: &dyn SymbolSource) -> i32 {
        if self.guard().is_none() {
            return DEAD_OBJECT;
        }
        flags_from_offset_raw(&self.dispatch, self.abi, self.track, probe)
    }

    // --- teardown ---------------------------------------------------------

    /// Runs to completion regardless of the death flag: each held strong
    /// reference is dropped exactly once and the foreign refcount discipline
    /// destroys the objects whenever the counts allow.
    pub unsafe fn destroy(self: Box<Self>) {
        let d = &*self.dispatch;
        let id = self.id();
        let listener = self.device_callback.swap(std::ptr::null_mut(), Ordering::AcqRel);
        if !listener.is_null() {
            let sp = FakeSp { ptr: listener as *mut c_void };
            if let Some(remove) = d.remove_device_callback {
                let ret = remove(self.track, &sp);
                if ret != NO_ERROR {
                    error!("failed to remove device callback, error {ret}");
                }
            }
            d.refbase.release(listener as *const c_void, id);
        }
        // the foreign discipline runs the real destructor off this release
        d.refbase.release(self.track_refbase() as *const c_void, id);
        let bridge = self.callback.swap(std::ptr::null_mut(), Ordering::AcqRel);
        if !bridge.is_null() {
            d.refbase.release(CallbackObject::refbase_ptr(bridge) as *const c_void, id);
        }
        self.release_attribution();
    }

    #[cfg(test)]
    pub(crate) fn mark_dead_for_test(&self) {
        self.died.store(true, Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn clear_callback_for_test(&self) {
        self.callback.store(std::ptr::null_mut(), Ordering::Release);
    }

    #[cfg(test)]
    pub(crate) fn attribution_ptr_for_test(&self) -> *mut c_void {
        self.attribution.load(Ordering::Acquire)
    }
}

/// The frame count a release with native speed support would have derived:
/// enough whole mixer buffers to cover the mixer latency, resampled to the
/// track rate, scaled by the top speed, plus slack.
pub fn min_frame_count_for_speed(
    sample_rate: u32,
    max_required_speed: f32,
    af_latency_ms: u32,
    af_frame_count: usize,
    af_sample_rate: u32,
) -> Option<i32> {
    if af_frame_count == 0 || af_sample_rate == 0 {
        return None;
    }
    let period_ms = (1000 * af_frame_count as u64 / af_sample_rate as u64) as u32;
    if period_ms == 0 {
        return None;
    }
    let min_buf_count = (af_latency_ms / period_ms).max(2);
    let source_frames = if sample_rate == af_sample_rate {
        af_frame_count as u64
    } else {
        af_frame_count as u64 * sample_rate as u64 / af_sample_rate as u64 + 1 + 1
    };
    Some(
        (min_buf_count as f64 * source_frames as f64 * max_required_speed as f64 + 1.0 + 1.0)
            as i32,
    )
}

// --- queries that work on any foreign track pointer ------------------------

pub unsafe fn hal_sample_rate(d: &Dispatch, track: *mut c_void) -> u32 {
    d.hal_sample_rate.map(|f| f(track)).unwrap_or(0)
}

pub unsafe fn hal_channel_count(d: &Dispatch, track: *mut c_void) -> u32 {
    d.hal_channel_count.map(|f| f(track)).unwrap_or(0)
}

pub unsafe fn hal_format(d: &Dispatch, track: *mut c_void) -> u32 {
    d.hal_format.map(|f| f(track)).unwrap_or(0)
}

pub unsafe fn output_of(d: &Dispatch, track: *mut c_void) -> i32 {
    (d.get_output)(track) as i32
}

/// Output flags by raw offset over any foreign track pointer, pre-8.0 only.
/// On the 7.x CAF arm builds the direct-PCM bit in the object lies for
/// direct tracks; the vendor helper arbitrates when it is around.
pub unsafe fn flags_from_offset_raw(
    d: &Dispatch,
    abi: Abi,
    track: *mut c_void,
    probe: &dyn SymbolSource,
) -> i32 {
    if d.level >= 26 {
        return UNSUPPORTED;
    }
    let Some(offset) = offsets::track_flags_offset(d.level, abi, probe) else {
        return UNSUPPORTED;
    };
    let mut flags = OutputFlags::from_bits_retain(*((track as *const u8).add(offset) as *const u32));
    if matches!(d.level, 24 | 25) && matches!(abi, Abi::Arm32 | Abi::Arm64) {
        if let Some(is_offloaded) = d.extended_is_track_offloaded {
            let output = (d.get_output)(track);
            // the vendor helper ignores its instance, any non-null does
            let direct_pcm = is_offloaded(0xcafebabeusize as *mut c_void, output);
            let marked = flags.intersects(OutputFlags::DIRECT | OutputFlags::COMPRESS_OFFLOAD);
            if flags.contains(OutputFlags::DIRECT)
                && !flags.contains(OutputFlags::COMPRESS_OFFLOAD)
                && !direct_pcm
            {
                flags.remove(OutputFlags::DIRECT);
            } else if !marked && direct_pcm {
                flags.insert(OutputFlags::DIRECT);
            }
        }
    }
    flags.bits() as i32
}

/// Companion query: whether the given stream could go to a compressed
/// offload sink. Meaningless past 11, where the policy moved elsewhere.
pub unsafe fn is_offload_supported(
    d: &Dispatch,
    sample_rate: u32,
    format: u32,
    channel_mask: u32,
    bit_rate: u32,
    bit_width: u32,
    offload_buffer_size: u32,
) -> bool {
    if d.level > 30 {
        error!("offload support query only exists through 11");
        return false;
    }
    let Some(query) = d.is_offload_supported else {
        return false;
    };
    // stream type must be MUSIC and the duration over a minute or the policy
    // says no regardless of format
    let duration_us: i64 = 2100 * 1000 * 1000;
    if d.level >= 28 {
        let info = OffloadInfo {
            version: OFFLOAD_INFO_VERSION_0_2,
            size: std::mem::size_of::<OffloadInfo>() as u16,
            sample_rate,
            channel_mask,
            format,
            stream_type: AUDIO_STREAM_MUSIC,
            bit_rate,
            duration_us,
            has_video: false,
            is_streaming: false,
            bit_width,
            offload_buffer_size,
            usage: AUDIO_USAGE_MEDIA,
            encapsulation_mode: 0,
            content_id: 0,
            sync_id: 0,
        };
        query(&info as *const OffloadInfo as *const c_void)
    } else {
        let info = OffloadInfoLegacy {
            version: OFFLOAD_INFO_VERSION_0_1,
            size: std::mem::size_of::<OffloadInfoLegacy>() as u16,
            sample_rate,
            channel_mask,
            format,
            stream_type: AUDIO_STREAM_MUSIC,
            bit_rate,
            duration_us,
            has_video: false,
            is_streaming: false,
            bit_width,
            offload_buffer_size,
            usage: AUDIO_USAGE_MEDIA,
            use_small_bufs: false,
        };
        query(&info as *const OffloadInfoLegacy as *const c_void)
    }
}

/// Companion query: minimum frame count for a plain stream track, or the
/// negative status if the mixer would not say.
pub unsafe fn min_frame_count(d: &Dispatch, stream_type: i32, sample_rate: u32) -> i64 {
    let mut count = 0usize;
    let status = (d.min_frame_count)(&mut count, stream_type, sample_rate);
    if status != NO_ERROR {
        status as i64
    } else {
        count as i64
    }
}
