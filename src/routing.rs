//! Device-routing listener registered with the foreign track. Same ABI and
//! lifetime rules as the main callback bridge, but `RefBase` is a plain
//! (non-virtual) base here, so the object is just vptr + bookkeeping + state,
//! and it is added/removed through explicit registration calls instead of
//! being passed at construction.
//!
//! Only the 6.0 shape is fabricated; newer releases moved the interface
//! behind virtual inheritance more than once and those shapes are still
//! unmapped, a known gap rather than an oversight.

use std::ffi::c_void;

use log::{error, warn};

use crate::refbase::RefBaseOps;
use crate::session::TrackHolder;

pub trait RoutingSink: Send {
    fn on_device_update(&self, audio_io: i32, device_ids: &[i32]);
}

pub struct RoutingState {
    holder: *mut TrackHolder,
    sink: Box<dyn RoutingSink>,
    refbase: RefBaseOps,
}

unsafe impl Send for RoutingState {}
unsafe impl Sync for RoutingState {}

/// `RefBase` lives at offset zero: vptr, then its bookkeeping pointer, then
/// our own member.
#[repr(C)]
pub struct RoutingObject {
    vtable: *const c_void,
    refs: *mut c_void,
    state: *mut RoutingState,
}

impl RoutingObject {
    pub unsafe fn create(
        holder: *mut TrackHolder,
        sink: Box<dyn RoutingSink>,
        refbase: &RefBaseOps,
    ) -> *mut RoutingObject {
        let obj = libc::malloc(std::mem::size_of::<RoutingObject>()) as *mut RoutingObject;
        if obj.is_null() {
            return std::ptr::null_mut();
        }
        std::ptr::write_bytes(obj as *mut u8, 0, std::mem::size_of::<RoutingObject>());
        (refbase.ctor)(obj as *mut c_void);
        (*obj).vtable = &VTABLE.dtor_complete as *const _ as *const c_void;
        (*obj).state = Box::into_raw(Box::new(RoutingState {
            holder,
            sink,
            refbase: *refbase,
        }));
        obj
    }
}

#[repr(C)]
struct RoutingVtable {
    offset_to_top: isize,
    type_info: usize,
    dtor_complete: unsafe extern "C" fn(*mut RoutingObject),
    dtor_deleting: unsafe extern "C" fn(*mut RoutingObject),
    on_first_ref: unsafe extern "C" fn(*mut RoutingObject),
    on_last_strong_ref: unsafe extern "C" fn(*mut RoutingObject, *const c_void),
    on_inc_strong_attempted: unsafe extern "C" fn(*mut RoutingObject, u32, *const c_void) -> bool,
    on_last_weak_ref: unsafe extern "C" fn(*mut RoutingObject, *const c_void),
    on_audio_device_update: unsafe extern "C" fn(*mut RoutingObject, i32, i32),
}

static VTABLE: RoutingVtable = RoutingVtable {
    offset_to_top: 0,
    type_info: 0,
    dtor_complete: vt_dtor_complete,
    dtor_deleting: vt_dtor_deleting,
    on_first_ref: vt_first_ref,
    on_last_strong_ref: vt_last_strong_ref,
    on_inc_strong_attempted: vt_inc_strong_attempted,
    on_last_weak_ref: vt_last_weak_ref,
    on_audio_device_update: vt_device_update,
};

unsafe fn destroy(obj: *mut RoutingObject, free: bool) {
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
        (ops.dtor)(obj as *mut c_void);
    }
    if free {
        libc::free(obj as *mut c_void);
    }
}

unsafe extern "C" fn vt_dtor_complete(obj: *mut RoutingObject) {
    error!("complete destructor called on routing listener {obj:p}");
    destroy(obj, false);
}

unsafe extern "C" fn vt_dtor_deleting(obj: *mut RoutingObject) {
    destroy(obj, true);
}

unsafe extern "C" fn vt_first_ref(_obj: *mut RoutingObject) {}

unsafe extern "C" fn vt_last_strong_ref(obj: *mut RoutingObject, _id: *const c_void) {
    if !(*obj).state.is_null() {
        (*(*obj).state).holder = std::ptr::null_mut();
    }
}

unsafe extern "C" fn vt_inc_strong_attempted(
    _obj: *mut RoutingObject,
    _flags: u32,
    _id: *const c_void,
) -> bool {
    false
}

unsafe extern "C" fn vt_last_weak_ref(_obj: *mut RoutingObject, _id: *const c_void) {}

unsafe extern "C" fn vt_device_update(obj: *mut RoutingObject, audio_io: i32, device_id: i32) {
    if obj.is_null() || (*obj).state.is_null() {
        error!("leaked routing listener, dropping update io {audio_io} device {device_id}");
        return;
    }
    let state = &*(*obj).state;
    let Some(holder) = state.holder.as_ref() else {
        warn!("routing update after teardown, dropping io {audio_io} device {device_id}");
        return;
    };
    if holder.is_dead() {
        return;
    }
    state.sink.on_device_update(audio_io, &[device_id]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::test_sink::{Event, Recorder, RecordingRoutingSink, RecordingSink};
    use crate::dispatch::testing::stub_dispatch;
    use std::sync::Arc;

    fn make_holder_23() -> (Box<TrackHolder>, Recorder) {
        let recorder = Recorder::default();
        let holder = unsafe {
            TrackHolder::create(
                Arc::new(stub_dispatch(23)),
                crate::platform::Abi::current(),
                None,
                Box::new(RecordingSink(recorder.clone())),
                Box::new(RecordingRoutingSink(recorder.clone())),
            )
        }
        .expect("session");
        (holder, recorder)
    }

    #[test]
    fn device_update_reaches_the_sink() {
        let (holder, recorder) = make_holder_23();
        let obj = holder.device_callback_object();
        assert!(!obj.is_null());
        unsafe {
            let vt = (*obj).vtable as *const usize;
            let update: unsafe extern "C" fn(*mut RoutingObject, i32, i32) =
                std::mem::transmute(*vt.add(6));
            update(obj, 21, 3);
        }
        assert_eq!(recorder.events(), vec![Event::DeviceUpdate(21, vec![3])]);
        unsafe { holder.destroy() };
    }

    #[test]
    fn routing_weak_promotion_is_refused() {
        let (holder, _recorder) = make_holder_23();
        let obj = holder.device_callback_object();
        unsafe {
            let vt = (*obj).vtable as *const usize;
            let attempt: unsafe extern "C" fn(*mut RoutingObject, u32, *const c_void) -> bool =
                std::mem::transmute(*vt.add(4));
            assert!(!attempt(obj, 1, std::ptr::null()));
        }
        unsafe { holder.destroy() };
    }
}
