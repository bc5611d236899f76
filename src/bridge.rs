//! The in-process callback object handed to the platform library. Its memory
//! has to look exactly like an instance of the library's callback interface:
//! a primary vtable whose slot order matches the interface declaration, and a
//! virtual `RefBase` subobject behind it whose vtable serves the refcount
//! machinery (`onLastStrongRef`, the deleting destructor, weak promotion).
//! Releases that still use the C callback convention get the same object
//! driven through [`legacy_callback_adapter`] instead of the vtable.
//!
//! All business logic (guarding, marshaling) lives in [`BridgeState`]; the
//! vtable slots and the adapter only translate arguments and bounce.

use std::ffi::c_void;

use log::error;

use crate::layout::{AudioTimestamp, TrackBuffer};
use crate::refbase::RefBaseOps;
use crate::session::TrackHolder;

// Engine event codes of the C callback convention.
pub const EVENT_MORE_DATA: i32 = 0;
pub const EVENT_UNDERRUN: i32 = 1;
pub const EVENT_LOOP_END: i32 = 2;
pub const EVENT_MARKER: i32 = 3;
pub const EVENT_NEW_POS: i32 = 4;
pub const EVENT_BUFFER_END: i32 = 5;
pub const EVENT_NEW_TRACK: i32 = 6;
pub const EVENT_STREAM_END: i32 = 7;
pub const EVENT_NEW_TIMESTAMP: i32 = 8;
pub const EVENT_CAN_WRITE_MORE_DATA: i32 = 9;
/// Ancient CAF builds reused code 9 for an ADSP failure during LPA playback.
const EVENT_ADSP_FAILURE: i32 = 1001;

/// Where the managed-side of each event lands. Methods the consumer is not
/// interested in are the implementation's business (it records them as
/// absent and drops the event); the bridge calls unconditionally.
pub trait CallbackSink: Send {
    fn on_more_data(&self, frame_count: u64, data: *mut c_void, size: usize) -> usize;
    fn on_underrun(&self);
    fn on_loop_end(&self, loops_remaining: i32);
    fn on_marker(&self, position: u32);
    fn on_new_pos(&self, position: u32);
    fn on_buffer_end(&self);
    fn on_new_track(&self);
    fn on_stream_end(&self);
    fn on_new_timestamp(&self, position: i32, when_ns: i64);
    fn on_can_write_more_data(&self, frames: u64, bytes: u64);
    /// Drops the managed reference. Called exactly once, from the last
    /// strong reference; failure to reach the runtime is a logged leak.
    fn release(&mut self);
}

/// Offset of the `RefBase` subobject inside [`CallbackObject`].
pub(crate) const REFBASE_OFFSET: isize = (2 * std::mem::size_of::<*const c_void>()) as isize;

pub struct BridgeState {
    holder: *mut TrackHolder,
    sink: Option<Box<dyn CallbackSink>>,
    refbase: RefBaseOps,
}

// holder/died access is atomic, sink is only taken once
unsafe impl Send for BridgeState {}
unsafe impl Sync for BridgeState {}

/// The fabricated object. Field order is load-bearing: primary vptr, the
/// one data member, then the virtual base (`RefBase`) subobject, the same
/// shape the platform compiler gives a nearly-empty-base hierarchy.
#[repr(C)]
pub struct CallbackObject {
    vtable: *const c_void,
    state: *mut BridgeState,
    refbase_vtable: *const c_void,
    refs: *mut c_void,
}

impl CallbackObject {
    /// Heap-fabricates the object: runs the real `RefBase` constructor on the
    /// subobject (it wires up the weakref bookkeeping and writes its own
    /// vtable pointer), then installs ours over it.
    pub unsafe fn create(
        holder: *mut TrackHolder,
        sink: Box<dyn CallbackSink>,
        refbase: &RefBaseOps,
    ) -> *mut CallbackObject {
        let obj = libc::malloc(std::mem::size_of::<CallbackObject>()) as *mut CallbackObject;
        if obj.is_null() {
            return std::ptr::null_mut();
        }
        std::ptr::write_bytes(obj as *mut u8, 0, std::mem::size_of::<CallbackObject>());
        (refbase.ctor)(Self::refbase_ptr(obj));
        (*obj).vtable = &PRIMARY_VTABLE.on_more_data as *const _ as *const c_void;
        (*obj).refbase_vtable = &REFBASE_VTABLE.dtor_complete as *const _ as *const c_void;
        (*obj).state = Box::into_raw(Box::new(BridgeState {
            holder,
            sink: Some(sink),
            refbase: *refbase,
        }));
        obj
    }

    /// The `RefBase` view of the object: the pointer every strong/weak
    /// count operation must receive.
    pub fn refbase_ptr(obj: *mut CallbackObject) -> *mut c_void {
        unsafe { (obj as *mut u8).offset(REFBASE_OFFSET) as *mut c_void }
    }
}

unsafe fn state_of<'a>(obj: *mut CallbackObject) -> Option<&'a BridgeState> {
    if obj.is_null() {
        return None;
    }
    let state = (*obj).state;
    if state.is_null() {
        None
    } else {
        Some(&*state)
    }
}

impl BridgeState {
    /// Shared entry guard: no session, dead session, or no sink all mean the
    /// event is silently dropped.
    fn guard(&self) -> Option<&dyn CallbackSink> {
        let holder = unsafe { self.holder.as_ref() }?;
        if holder.is_dead() {
            return None;
        }
        self.sink.as_deref()
    }

    pub fn more_data(&self, buffer: &TrackBuffer) -> usize {
        match self.guard() {
            Some(sink) => sink.on_more_data(buffer.frame_count as u64, buffer.raw, buffer.size),
            None => 0,
        }
    }

    pub fn underrun(&self) {
        if let Some(sink) = self.guard() {
            sink.on_underrun();
        }
    }

    pub fn loop_end(&self, loops_remaining: i32) {
        if let Some(sink) = self.guard() {
            sink.on_loop_end(loops_remaining);
        }
    }

    pub fn marker(&self, position: u32) {
        if let Some(sink) = self.guard() {
            sink.on_marker(position);
        }
    }

    pub fn new_pos(&self, position: u32) {
        if let Some(sink) = self.guard() {
            sink.on_new_pos(position);
        }
    }

    pub fn buffer_end(&self) {
        if let Some(sink) = self.guard() {
            sink.on_buffer_end();
        }
    }

    /// Quirk: with death emulation armed, arrival of this event *is* the
    /// death signal; the engine won't deliver anything more useful on those
    /// builds. The track is quiesced before the session is flagged dead so a
    /// supervising caller can't race a restart against the flag.
    pub fn new_track(&self) {
        let Some(holder) = (unsafe { self.holder.as_ref() }) else {
            return;
        };
        if holder.is_dead() {
            return;
        }
        if holder.death_emulation() {
            holder.emulate_death();
        }
        if let Some(sink) = self.sink.as_deref() {
            sink.on_new_track();
        }
    }

    pub fn stream_end(&self) {
        if let Some(sink) = self.guard() {
            sink.on_stream_end();
        }
    }

    pub fn new_timestamp(&self, ts: &AudioTimestamp) {
        if let Some(sink) = self.guard() {
            sink.on_new_timestamp(ts.position as i32, ts.when_ns());
        }
    }

    /// Despite the buffer argument this event is a capacity report; nothing
    /// is ever written and the engine expects 0 back.
    pub fn can_write_more_data(&self, buffer: &TrackBuffer) -> usize {
        if let Some(sink) = self.guard() {
            sink.on_can_write_more_data(buffer.frame_count as u64, buffer.size as u64);
        }
        0
    }

    fn last_strong_ref(&mut self) {
        if let Some(mut sink) = self.sink.take() {
            sink.release();
        }
        // leave a detectably-dead back pointer, not a dangling one
        self.holder = std::ptr::null_mut();
    }
}

// --- primary vtable: the callback interface the library dispatches into ----

#[repr(C)]
struct PrimaryVtable {
    vbase_offset: isize,
    offset_to_top: isize,
    type_info: usize,
    on_more_data: unsafe extern "C" fn(*mut CallbackObject, *const TrackBuffer) -> usize,
    on_underrun: unsafe extern "C" fn(*mut CallbackObject),
    on_loop_end: unsafe extern "C" fn(*mut CallbackObject, i32),
    on_marker: unsafe extern "C" fn(*mut CallbackObject, u32),
    on_new_pos: unsafe extern "C" fn(*mut CallbackObject, u32),
    on_buffer_end: unsafe extern "C" fn(*mut CallbackObject),
    on_new_track: unsafe extern "C" fn(*mut CallbackObject),
    on_stream_end: unsafe extern "C" fn(*mut CallbackObject),
    on_new_timestamp: unsafe extern "C" fn(*mut CallbackObject, AudioTimestamp),
    on_can_write_more_data:
        unsafe extern "C" fn(*mut CallbackObject, *const TrackBuffer) -> usize,
    dtor_complete: unsafe extern "C" fn(*mut CallbackObject),
    dtor_deleting: unsafe extern "C" fn(*mut CallbackObject),
}

static PRIMARY_VTABLE: PrimaryVtable = PrimaryVtable {
    vbase_offset: REFBASE_OFFSET,
    offset_to_top: 0,
    type_info: 0,
    on_more_data: vt_more_data,
    on_underrun: vt_underrun,
    on_loop_end: vt_loop_end,
    on_marker: vt_marker,
    on_new_pos: vt_new_pos,
    on_buffer_end: vt_buffer_end,
    on_new_track: vt_new_track,
    on_stream_end: vt_stream_end,
    on_new_timestamp: vt_new_timestamp,
    on_can_write_more_data: vt_can_write_more_data,
    dtor_complete: vt_dtor_complete,
    dtor_deleting: vt_dtor_deleting,
};

unsafe extern "C" fn vt_more_data(obj: *mut CallbackObject, buf: *const TrackBuffer) -> usize {
    match state_of(obj) {
        Some(state) => state.more_data(&*buf),
        None => 0,
    }
}

unsafe extern "C" fn vt_underrun(obj: *mut CallbackObject) {
    if let Some(state) = state_of(obj) {
        state.underrun();
    }
}

unsafe extern "C" fn vt_loop_end(obj: *mut CallbackObject, loops_remaining: i32) {
    if let Some(state) = state_of(obj) {
        state.loop_end(loops_remaining);
    }
}

unsafe extern "C" fn vt_marker(obj: *mut CallbackObject, position: u32) {
    if let Some(state) = state_of(obj) {
        state.marker(position);
    }
}

unsafe extern "C" fn vt_new_pos(obj: *mut CallbackObject, position: u32) {
    if let Some(state) = state_of(obj) {
        state.new_pos(position);
    }
}

unsafe extern "C" fn vt_buffer_end(obj: *mut CallbackObject) {
    if let Some(state) = state_of(obj) {
        state.buffer_end();
    }
}

unsafe extern "C" fn vt_new_track(obj: *mut CallbackObject) {
    if let Some(state) = state_of(obj) {
        state.new_track();
    }
}

unsafe extern "C" fn vt_stream_end(obj: *mut CallbackObject) {
    if let Some(state) = state_of(obj) {
        state.stream_end();
    }
}

unsafe extern "C" fn vt_new_timestamp(obj: *mut CallbackObject, ts: AudioTimestamp) {
    if let Some(state) = state_of(obj) {
        state.new_timestamp(&ts);
    }
}

unsafe extern "C" fn vt_can_write_more_data(
    obj: *mut CallbackObject,
    buf: *const TrackBuffer,
) -> usize {
    match state_of(obj) {
        Some(state) => state.can_write_more_data(&*buf),
        None => 0,
    }
}

unsafe extern "C" fn vt_dtor_complete(obj: *mut CallbackObject) {
    error!("complete destructor called on callback object {obj:p} we do not own placement for");
    destroy(obj, false);
}

unsafe extern "C" fn vt_dtor_deleting(obj: *mut CallbackObject) {
    destroy(obj, true);
}

/// Full teardown: drop the payload, run the real base destructor so the
/// library's weakref bookkeeping unwinds, optionally free the block.
unsafe fn destroy(obj: *mut CallbackObject, free: bool) {
    if obj.is_null() {
        return;
    }
    let state = (*obj).state;
    (*obj).state = std::ptr::null_mut();
    let refbase = if state.is_null() {
        None
    } else {
        let ops = (*state).refbase;
        drop(Box::from_raw(state));
        Some(ops)
    };
    if let Some(ops) = refbase {
        (ops.dtor)(CallbackObject::refbase_ptr(obj));
    }
    if free {
        libc::free(obj as *mut c_void);
    }
}

// --- RefBase vtable: what the refcount machinery dispatches through --------

#[repr(C)]
struct RefBaseVtable {
    offset_to_top: isize,
    type_info: usize,
    dtor_complete: unsafe extern "C" fn(*mut c_void),
    dtor_deleting: unsafe extern "C" fn(*mut c_void),
    on_first_ref: unsafe extern "C" fn(*mut c_void),
    on_last_strong_ref: unsafe extern "C" fn(*mut c_void, *const c_void),
    on_inc_strong_attempted: unsafe extern "C" fn(*mut c_void, u32, *const c_void) -> bool,
    on_last_weak_ref: unsafe extern "C" fn(*mut c_void, *const c_void),
}

static REFBASE_VTABLE: RefBaseVtable = RefBaseVtable {
    offset_to_top: -REFBASE_OFFSET,
    type_info: 0,
    dtor_complete: rb_dtor_complete,
    dtor_deleting: rb_dtor_deleting,
    on_first_ref: rb_first_ref,
    on_last_strong_ref: rb_last_strong_ref,
    on_inc_strong_attempted: rb_inc_strong_attempted,
    on_last_weak_ref: rb_last_weak_ref,
};

unsafe fn object_of(refbase_this: *mut c_void) -> *mut CallbackObject {
    (refbase_this as *mut u8).offset(-REFBASE_OFFSET) as *mut CallbackObject
}

unsafe extern "C" fn rb_dtor_complete(this: *mut c_void) {
    error!("complete destructor called on refbase subobject {this:p}");
    destroy(object_of(this), false);
}

unsafe extern "C" fn rb_dtor_deleting(this: *mut c_void) {
    destroy(object_of(this), true);
}

unsafe extern "C" fn rb_first_ref(_this: *mut c_void) {}

unsafe extern "C" fn rb_last_strong_ref(this: *mut c_void, _id: *const c_void) {
    let obj = object_of(this);
    if !(*obj).state.is_null() {
        (*(*obj).state).last_strong_ref();
    }
}

/// Never let the library revive a bridge past its strong lifetime, no matter
/// what flags the weak promotion asks with.
unsafe extern "C" fn rb_inc_strong_attempted(
    _this: *mut c_void,
    _flags: u32,
    _id: *const c_void,
) -> bool {
    false
}

unsafe extern "C" fn rb_last_weak_ref(_this: *mut c_void, _id: *const c_void) {}

// --- legacy C callback convention ------------------------------------------

/// Adapter for releases that deliver events through a plain function pointer
/// plus cookie. The cookie is the session holder; reading the bridge through
/// it means a torn-down session degrades to a logged no-op instead of a call
/// into freed memory.
pub unsafe extern "C" fn legacy_callback_adapter(
    mut event: i32,
    user: *mut c_void,
    info: *mut c_void,
) {
    let holder = user as *mut TrackHolder;
    let Some(holder) = holder.as_ref() else {
        error!("legacy callback with null cookie");
        return;
    };
    if event == EVENT_CAN_WRITE_MORE_DATA && holder.level() <= 23 {
        // old CAF used code 9 for the LPA ADSP-failure event; LPA playback
        // is never set up here so this must not be treated as a capacity
        // report
        event = EVENT_ADSP_FAILURE;
    }
    let bridge = holder.callback_object();
    let Some(state) = state_of(bridge) else {
        error!("leaked legacy callback trying to reach destroyed bridge");
        if (event == EVENT_MORE_DATA || event == EVENT_CAN_WRITE_MORE_DATA) && !info.is_null() {
            (*(info as *mut TrackBuffer)).size = 0;
        }
        return;
    };
    match event {
        EVENT_MORE_DATA => {
            let buffer = info as *mut TrackBuffer;
            (*buffer).size = state.more_data(&*buffer);
        }
        EVENT_UNDERRUN => state.underrun(),
        EVENT_LOOP_END => state.loop_end(*(info as *const i32)),
        EVENT_MARKER => state.marker(*(info as *const u32)),
        EVENT_NEW_POS => state.new_pos(*(info as *const u32)),
        EVENT_BUFFER_END => state.buffer_end(),
        EVENT_NEW_TRACK => state.new_track(),
        EVENT_STREAM_END => state.stream_end(),
        EVENT_NEW_TIMESTAMP => state.new_timestamp(&*(info as *const AudioTimestamp)),
        EVENT_CAN_WRITE_MORE_DATA => {
            let buffer = info as *mut TrackBuffer;
            (*buffer).size = state.can_write_more_data(&*buffer);
        }
        EVENT_ADSP_FAILURE => error!("unexpected ADSP failure event"),
        other => error!("unsupported engine event {other} (info={info:p})"),
    }
}

#[cfg(test)]
pub(crate) mod test_sink {
    use super::*;
    use crate::routing::RoutingSink;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    #[derive(Debug, Clone, PartialEq)]
    pub enum Event {
        MoreData(u64, usize),
        Underrun,
        LoopEnd(i32),
        Marker(u32),
        NewPos(u32),
        BufferEnd,
        NewTrack,
        StreamEnd,
        Timestamp(i32, i64),
        CanWrite(u64, u64),
        DeviceUpdate(i32, Vec<i32>),
    }

    #[derive(Clone, Default)]
    pub struct Recorder {
        pub events: Arc<Mutex<Vec<Event>>>,
        pub released: Arc<AtomicBool>,
    }

    impl Recorder {
        pub fn events(&self) -> Vec<Event> {
            self.events.lock().unwrap().clone()
        }

        pub fn released(&self) -> bool {
            self.released.load(Ordering::SeqCst)
        }

        fn push(&self, event: Event) {
            self.events.lock().unwrap().push(event);
        }
    }

    pub struct RecordingSink(pub Recorder);

    impl CallbackSink for RecordingSink {
        fn on_more_data(&self, frame_count: u64, _data: *mut c_void, size: usize) -> usize {
            self.0.push(Event::MoreData(frame_count, size));
            size
        }
        fn on_underrun(&self) {
            self.0.push(Event::Underrun);
        }
        fn on_loop_end(&self, loops_remaining: i32) {
            self.0.push(Event::LoopEnd(loops_remaining));
        }
        fn on_marker(&self, position: u32) {
            self.0.push(Event::Marker(position));
        }
        fn on_new_pos(&self, position: u32) {
            self.0.push(Event::NewPos(position));
        }
        fn on_buffer_end(&self) {
            self.0.push(Event::BufferEnd);
        }
        fn on_new_track(&self) {
            self.0.push(Event::NewTrack);
        }
        fn on_stream_end(&self) {
            self.0.push(Event::StreamEnd);
        }
        fn on_new_timestamp(&self, position: i32, when_ns: i64) {
            self.0.push(Event::Timestamp(position, when_ns));
        }
        fn on_can_write_more_data(&self, frames: u64, bytes: u64) {
            self.0.push(Event::CanWrite(frames, bytes));
        }
        fn release(&mut self) {
            self.0.released.store(true, Ordering::SeqCst);
        }
    }

    pub struct RecordingRoutingSink(pub Recorder);

    impl RoutingSink for RecordingRoutingSink {
        fn on_device_update(&self, audio_io: i32, device_ids: &[i32]) {
            self.0.push(Event::DeviceUpdate(audio_io, device_ids.to_vec()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_sink::{Event, Recorder, RecordingRoutingSink, RecordingSink};
    use super::*;
    use crate::dispatch::testing::stub_dispatch;
    use crate::session::TrackHolder;
    use std::sync::Arc;

    fn make_holder(level: i32) -> (Box<TrackHolder>, Recorder) {
        let recorder = Recorder::default();
        let parcel = if level >= 31 {
            Some(0x10usize as *mut c_void)
        } else {
            None
        };
        let holder = unsafe {
            TrackHolder::create(
                Arc::new(stub_dispatch(level)),
                crate::platform::Abi::current(),
                parcel,
                Box::new(RecordingSink(recorder.clone())),
                Box::new(RecordingRoutingSink(recorder.clone())),
            )
        }
        .expect("session");
        (holder, recorder)
    }

    unsafe fn primary_slot(obj: *mut CallbackObject, index: usize) -> usize {
        let vt = (*obj).vtable as *const usize;
        *vt.add(index)
    }

    unsafe fn refbase_slot(obj: *mut CallbackObject, index: usize) -> usize {
        let vt = (*obj).refbase_vtable as *const usize;
        *vt.add(index)
    }

    #[test]
    fn vtable_dispatch_reaches_the_sink() {
        let (holder, recorder) = make_holder(31);
        let obj = holder.callback_object();
        unsafe {
            // simulate the library calling through the interface vtable
            let marker: unsafe extern "C" fn(*mut CallbackObject, u32) =
                std::mem::transmute(primary_slot(obj, 3));
            marker(obj, 42);
            let ts_fn: unsafe extern "C" fn(*mut CallbackObject, AudioTimestamp) =
                std::mem::transmute(primary_slot(obj, 8));
            ts_fn(
                obj,
                AudioTimestamp {
                    position: 9,
                    time: libc::timespec { tv_sec: 1, tv_nsec: 250 },
                },
            );
        }
        assert_eq!(
            recorder.events(),
            vec![Event::Marker(42), Event::Timestamp(9, 1_000_000_250)]
        );
        unsafe { holder.destroy() };
    }

    #[test]
    fn vbase_offset_points_at_refbase_subobject() {
        let (holder, _recorder) = make_holder(31);
        let obj = holder.callback_object();
        unsafe {
            let vt = (*obj).vtable as *const isize;
            let vbase = *vt.offset(-3);
            assert_eq!(
                (obj as *mut u8).offset(vbase) as *mut c_void,
                CallbackObject::refbase_ptr(obj)
            );
        }
        unsafe { holder.destroy() };
    }

    #[test]
    fn weak_promotion_is_always_refused() {
        let (holder, _recorder) = make_holder(31);
        let obj = holder.callback_object();
        unsafe {
            let attempt: unsafe extern "C" fn(*mut c_void, u32, *const c_void) -> bool =
                std::mem::transmute(refbase_slot(obj, 4));
            // flag 1 is the "first inc strong" flag the default allows
            assert!(!attempt(CallbackObject::refbase_ptr(obj), 1, std::ptr::null()));
            assert!(!attempt(CallbackObject::refbase_ptr(obj), 0, std::ptr::null()));
        }
        unsafe { holder.destroy() };
    }

    #[test]
    fn last_strong_ref_releases_sink_exactly_once() {
        let (holder, recorder) = make_holder(28);
        assert!(!recorder.released());
        unsafe { holder.destroy() };
        assert!(recorder.released());
    }

    #[test]
    fn legacy_adapter_translates_events() {
        let (holder, recorder) = make_holder(24);
        let user = holder.as_ref() as *const TrackHolder as *mut c_void;
        unsafe {
            legacy_callback_adapter(EVENT_UNDERRUN, user, std::ptr::null_mut());
            let mut pos = 1234u32;
            legacy_callback_adapter(EVENT_NEW_POS, user, &mut pos as *mut u32 as *mut c_void);
            let mut buffer = TrackBuffer {
                frame_count: 16,
                size: 64,
                raw: std::ptr::null_mut(),
                sequence: 0,
            };
            legacy_callback_adapter(
                EVENT_CAN_WRITE_MORE_DATA,
                user,
                &mut buffer as *mut TrackBuffer as *mut c_void,
            );
            // capacity events must report zero consumed
            assert_eq!(buffer.size, 0);
        }
        assert_eq!(
            recorder.events(),
            vec![Event::Underrun, Event::NewPos(1234), Event::CanWrite(16, 64)]
        );
        unsafe { holder.destroy() };
    }

    #[test]
    fn ancient_caf_reuses_capacity_event_for_adsp_failure() {
        let (holder, recorder) = make_holder(22);
        let user = holder.as_ref() as *const TrackHolder as *mut c_void;
        let mut buffer = TrackBuffer {
            frame_count: 16,
            size: 64,
            raw: std::ptr::null_mut(),
            sequence: 0,
        };
        unsafe {
            legacy_callback_adapter(
                EVENT_CAN_WRITE_MORE_DATA,
                user,
                &mut buffer as *mut TrackBuffer as *mut c_void,
            );
        }
        // swallowed: no capacity report on builds where 9 meant ADSP failure
        assert!(recorder.events().is_empty());
        unsafe { holder.destroy() };
    }

    #[test]
    fn torn_down_bridge_zeroes_transfer_requests() {
        let (holder, recorder) = make_holder(24);
        holder.clear_callback_for_test();
        let user = holder.as_ref() as *const TrackHolder as *mut c_void;
        let mut buffer = TrackBuffer {
            frame_count: 16,
            size: 64,
            raw: std::ptr::null_mut(),
            sequence: 0,
        };
        unsafe {
            legacy_callback_adapter(
                EVENT_MORE_DATA,
                user,
                &mut buffer as *mut TrackBuffer as *mut c_void,
            );
        }
        assert_eq!(buffer.size, 0);
        assert!(recorder.events().is_empty());
        unsafe { holder.destroy() };
    }
}
