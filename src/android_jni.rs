//! JNI exports for `org.nativetrack.core.NativeTrack` (and the raw-pointer
//! queries under `TrackHiddenApi`), plus the managed-side sinks the callback
//! bridge delivers into.

#![allow(non_snake_case)]

use std::ffi::{c_void, CString};
use std::sync::{Arc, Mutex, OnceLock};

use jni::objects::{
    GlobalRef, JByteArray, JByteBuffer, JClass, JFloatArray, JLongArray, JMethodID, JObject,
    JString, JValue, ReleaseMode,
};
use jni::signature::{Primitive, ReturnType};
use jni::sys::{jboolean, jfloat, jint, jlong, jobject, jvalue, JNI_FALSE, JNI_TRUE};
use jni::{JNIEnv, JavaVM};
use log::{error, info};

use crate::bridge::CallbackSink;
use crate::dispatch::{Dispatch, SymbolSource};
use crate::layout::PlaybackRate;
use crate::library::{load_strategy, LibraryOpener, LoadStrategy, Loader};
use crate::platform::{device_api_level, Abi, BAD_PARAMETER, NO_ERROR};
use crate::routing::RoutingSink;
use crate::session::{self, ObtainOutcome, SetParams, TrackHolder};

static LOADER: Mutex<Loader<libloading::os::unix::Library>> = Mutex::new(Loader::new());
static DISPATCH: OnceLock<Arc<Dispatch>> = OnceLock::new();

/// Symbol lookups against the loaded set, for the probes (vendor fork
/// detection, raw-offset adjustments) that happen after init.
struct GlobalSymbols;

impl SymbolSource for GlobalSymbols {
    fn resolve(&self, lib: crate::dispatch::Lib, name: &str) -> Option<*mut c_void> {
        LOADER
            .lock()
            .unwrap()
            .libraries()
            .and_then(|set| set.resolve(lib, name))
    }
}

fn init_logging() {
    static ONCE: OnceLock<()> = OnceLock::new();
    ONCE.get_or_init(|| {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Info)
                .with_tag("NativeTrack"),
        );
    });
}

/// Opens libraries with whatever mechanism the release allows.
struct AndroidOpener<'a, 'b> {
    level: i32,
    env: &'a mut JNIEnv<'b>,
    namespace: Option<*mut c_void>,
}

impl AndroidOpener<'_, '_> {
    /// 7.x: dlopen is namespace-blocked but the runtime's own loader is not.
    /// Have it pull the library into the classloader namespace, then grab a
    /// handle onto the already-loaded image.
    fn runtime_mediated(&mut self, soname: &str) -> Option<libloading::os::unix::Library> {
        let name = self.env.new_string(soname).ok()?;
        let runtime = self
            .env
            .call_static_method("java/lang/Runtime", "getRuntime", "()Ljava/lang/Runtime;", &[])
            .ok()?
            .l()
            .ok()?;
        // the hidden loader entry changed its signature across releases
        let loaded = self
            .env
            .call_method(
                &runtime,
                "nativeLoad",
                "(Ljava/lang/String;Ljava/lang/ClassLoader;)Ljava/lang/String;",
                &[JValue::Object(&name), JValue::Object(&JObject::null())],
            )
            .or_else(|_| {
                let _ = self.env.exception_clear();
                self.env.call_method(
                    &runtime,
                    "nativeLoad",
                    "(Ljava/lang/String;Ljava/lang/ClassLoader;Ljava/lang/String;)Ljava/lang/String;",
                    &[
                        JValue::Object(&name),
                        JValue::Object(&JObject::null()),
                        JValue::Object(&JObject::null()),
                    ],
                )
            });
        if loaded.is_err() {
            let _ = self.env.exception_clear();
            error!("runtime-mediated load of {soname} failed");
            return None;
        }
        unsafe {
            libloading::os::unix::Library::open(
                Some(soname),
                libc::RTLD_NOLOAD | libc::RTLD_GLOBAL,
            )
            .or_else(|_| {
                libloading::os::unix::Library::open(
                    Some(soname),
                    libc::RTLD_NOW | libc::RTLD_GLOBAL,
                )
            })
            .map_err(|e| error!("post-load dlopen of {soname} failed: {e}"))
            .ok()
        }
    }
}

impl LibraryOpener for AndroidOpener<'_, '_> {
    type Handle = libloading::os::unix::Library;

    fn open(&mut self, soname: &str) -> Option<Self::Handle> {
        match load_strategy(self.level) {
            LoadStrategy::Plain => unsafe {
                libloading::os::unix::Library::open(
                    Some(soname),
                    libc::RTLD_NOW | libc::RTLD_GLOBAL,
                )
                .map_err(|e| error!("dlopen of {soname} failed: {e}"))
                .ok()
            },
            LoadStrategy::RuntimeMediated => self.runtime_mediated(soname),
            LoadStrategy::Namespace => {
                if !crate::linker::ensure() {
                    error!("linker namespace escape unavailable");
                    return None;
                }
                if self.namespace.is_none() {
                    self.namespace = crate::linker::create_shared_namespace("default_copy");
                }
                let namespace = self.namespace?;
                let handle = crate::linker::namespace_dlopen(soname, namespace);
                if handle.is_null() {
                    None
                } else {
                    Some(unsafe { libloading::os::unix::Library::from_raw(handle) })
                }
            }
        }
    }
}

/// Loads the libraries and resolves the dispatch table, both exactly once.
fn ensure_ready(env: &mut JNIEnv) -> Option<Arc<Dispatch>> {
    init_logging();
    if let Some(dispatch) = DISPATCH.get() {
        return Some(dispatch.clone());
    }
    let level = device_api_level();
    let mut loader = LOADER.lock().unwrap();
    let mut opener = AndroidOpener { level, env, namespace: None };
    if !loader.ensure(level, &mut opener) {
        return None;
    }
    let dispatch = Dispatch::resolve(level, loader.libraries()?)?;
    drop(loader);
    let _ = DISPATCH.set(Arc::new(dispatch));
    DISPATCH.get().cloned()
}

// --- managed sinks ---------------------------------------------------------

fn optional_method(
    env: &mut JNIEnv,
    class: &JClass,
    name: &str,
    sig: &str,
) -> Option<JMethodID> {
    match env.get_method_id(class, name, sig) {
        Ok(id) => Some(id),
        Err(_) => {
            let _ = env.exception_clear();
            info!("callback has no {name}{sig}, assuming it does not care");
            None
        }
    }
}

struct JniSink {
    vm: JavaVM,
    callback: GlobalRef,
    on_underrun: Option<JMethodID>,
    on_marker: Option<JMethodID>,
    on_new_pos: Option<JMethodID>,
    on_new_track: Option<JMethodID>,
    on_stream_end: Option<JMethodID>,
    on_new_timestamp: Option<JMethodID>,
    on_loop_end: Option<JMethodID>,
    on_buffer_end: Option<JMethodID>,
    on_more_data: Option<JMethodID>,
    on_can_write_more_data: Option<JMethodID>,
}

impl JniSink {
    fn new(env: &mut JNIEnv, callback: &JObject) -> Option<JniSink> {
        let vm = env.get_java_vm().ok()?;
        let callback = env.new_global_ref(callback).ok()?;
        let class = env.get_object_class(&callback).ok()?;
        Some(JniSink {
            on_underrun: optional_method(env, &class, "onUnderrun", "()V"),
            on_marker: optional_method(env, &class, "onMarker", "(I)V"),
            on_new_pos: optional_method(env, &class, "onNewPos", "(I)V"),
            on_new_track: optional_method(env, &class, "onNewIAudioTrack", "()V"),
            on_stream_end: optional_method(env, &class, "onStreamEnd", "()V"),
            on_new_timestamp: optional_method(env, &class, "onNewTimestamp", "(IJ)V"),
            on_loop_end: optional_method(env, &class, "onLoopEnd", "(I)V"),
            on_buffer_end: optional_method(env, &class, "onBufferEnd", "()V"),
            on_more_data: optional_method(env, &class, "onMoreData", "(Ljava/nio/ByteBuffer;J)J"),
            on_can_write_more_data: optional_method(env, &class, "onCanWriteMoreData", "(JJ)V"),
            vm,
            callback,
        })
    }

    /// Every delivery happens on the engine's single callback thread; the
    /// first one attaches it for good and the runtime detaches again at
    /// thread exit. Re-attaching per call would be both wasteful and racy
    /// against in-flight calls.
    fn with_env<R>(&self, f: impl FnOnce(&mut JNIEnv) -> R) -> Option<R> {
        fn run<R>(env: &mut JNIEnv, f: impl FnOnce(&mut JNIEnv) -> R) -> R {
            let result = f(env);
            if env.exception_check().unwrap_or(false) {
                let _ = env.exception_describe();
                let _ = env.exception_clear();
            }
            result
        }
        match self.vm.get_env() {
            Ok(mut env) => Some(run(&mut env, f)),
            Err(_) => match self.vm.attach_current_thread_permanently() {
                Ok(mut env) => Some(run(&mut env, f)),
                Err(e) => {
                    error!("failed to attach callback thread: {e}");
                    None
                }
            },
        }
    }

    fn call_void(&self, method: Option<JMethodID>, args: &[jvalue]) {
        let Some(method) = method else {
            return;
        };
        self.with_env(|env| unsafe {
            let _ = env.call_method_unchecked(
                &self.callback,
                method,
                ReturnType::Primitive(Primitive::Void),
                args,
            );
        });
    }
}

impl CallbackSink for JniSink {
    fn on_more_data(&self, frame_count: u64, data: *mut c_void, size: usize) -> usize {
        let Some(method) = self.on_more_data else {
            return 0;
        };
        self.with_env(|env| {
            let Ok(buffer) = (unsafe { env.new_direct_byte_buffer(data as *mut u8, size) })
            else {
                return 0;
            };
            let args = [
                jvalue { l: buffer.as_raw() },
                jvalue { j: frame_count as jlong },
            ];
            let written = unsafe {
                env.call_method_unchecked(
                    &self.callback,
                    method,
                    ReturnType::Primitive(Primitive::Long),
                    &args,
                )
            };
            written.ok().and_then(|v| v.j().ok()).unwrap_or(0).max(0) as usize
        })
        .unwrap_or(0)
    }

    fn on_underrun(&self) {
        self.call_void(self.on_underrun, &[]);
    }

    fn on_loop_end(&self, loops_remaining: i32) {
        self.call_void(self.on_loop_end, &[jvalue { i: loops_remaining }]);
    }

    fn on_marker(&self, position: u32) {
        self.call_void(self.on_marker, &[jvalue { i: position as jint }]);
    }

    fn on_new_pos(&self, position: u32) {
        self.call_void(self.on_new_pos, &[jvalue { i: position as jint }]);
    }

    fn on_buffer_end(&self) {
        self.call_void(self.on_buffer_end, &[]);
    }

    fn on_new_track(&self) {
        self.call_void(self.on_new_track, &[]);
    }

    fn on_stream_end(&self) {
        self.call_void(self.on_stream_end, &[]);
    }

    fn on_new_timestamp(&self, position: i32, when_ns: i64) {
        self.call_void(
            self.on_new_timestamp,
            &[jvalue { i: position }, jvalue { j: when_ns }],
        );
    }

    fn on_can_write_more_data(&self, frames: u64, bytes: u64) {
        self.call_void(
            self.on_can_write_more_data,
            &[jvalue { j: frames as jlong }, jvalue { j: bytes as jlong }],
        );
    }

    fn release(&mut self) {
        // dropping the sink drops the global reference; the jni crate
        // attaches this thread temporarily if it has to, so the reference
        // cannot leak the way a raw DeleteGlobalRef from a detached thread
        // would
    }
}

struct JniRoutingSink {
    vm: JavaVM,
    target: GlobalRef,
    method: Option<JMethodID>,
}

impl JniRoutingSink {
    fn new(env: &mut JNIEnv, target: &JObject) -> Option<JniRoutingSink> {
        let vm = env.get_java_vm().ok()?;
        let target = env.new_global_ref(target).ok()?;
        let class = env.get_object_class(&target).ok()?;
        let method = optional_method(env, &class, "onAudioDeviceUpdate", "(I[I)V");
        Some(JniRoutingSink { vm, target, method })
    }

    fn deliver(&self, env: &mut JNIEnv, method: JMethodID, audio_io: i32, ids: &[i32]) {
        let Ok(array) = env.new_int_array(ids.len() as jint) else {
            let _ = env.exception_clear();
            error!("out of memory, dropping device update");
            return;
        };
        let _ = env.set_int_array_region(&array, 0, ids);
        let args = [jvalue { i: audio_io }, jvalue { l: array.as_raw() }];
        unsafe {
            let _ = env.call_method_unchecked(
                &self.target,
                method,
                ReturnType::Primitive(Primitive::Void),
                &args,
            );
        }
        if env.exception_check().unwrap_or(false) {
            let _ = env.exception_describe();
            let _ = env.exception_clear();
        }
    }
}

impl RoutingSink for JniRoutingSink {
    /// Device updates can arrive on short-lived system threads; unlike the
    /// audio callback thread these attach for just the one call.
    fn on_device_update(&self, audio_io: i32, device_ids: &[i32]) {
        let Some(method) = self.method else {
            return;
        };
        match self.vm.get_env() {
            Ok(mut env) => self.deliver(&mut env, method, audio_io, device_ids),
            Err(_) => match self.vm.attach_current_thread() {
                Ok(mut guard) => self.deliver(&mut guard, method, audio_io, device_ids),
                Err(e) => error!("failed to attach for device update: {e}"),
            },
        }
    }
}

// --- session plumbing ------------------------------------------------------

struct JniSession {
    holder: Box<TrackHolder>,
    shared_memory: Option<GlobalRef>,
}

unsafe fn session_mut<'a>(ptr: jlong) -> &'a mut JniSession {
    &mut *(ptr as *mut JniSession)
}

fn holder(ptr: jlong) -> &'static TrackHolder {
    unsafe { &(*(ptr as *mut JniSession)).holder }
}

fn pack_status_value(status: i32, value: u32) -> jlong {
    (((status as u32 as u64) << 32) | value as u64) as jlong
}

// --- companion entry points ------------------------------------------------

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_00024Companion_nativeInit(
    mut env: JNIEnv,
    _companion: JObject,
) -> jboolean {
    if ensure_ready(&mut env).is_some() {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_00024Companion_isOffloadSupported(
    mut env: JNIEnv,
    _companion: JObject,
    sample_rate: jint,
    format: jint,
    channel_mask: jint,
    bit_rate: jint,
    bit_width: jint,
    offload_buffer_size: jint,
) -> jboolean {
    let Some(dispatch) = ensure_ready(&mut env) else {
        return JNI_FALSE;
    };
    let supported = unsafe {
        session::is_offload_supported(
            &dispatch,
            sample_rate as u32,
            format as u32,
            channel_mask as u32,
            bit_rate as u32,
            bit_width as u32,
            offload_buffer_size as u32,
        )
    };
    if supported {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_00024Companion_getMinFrameCount(
    mut env: JNIEnv,
    _companion: JObject,
    stream_type: jint,
    sample_rate: jint,
) -> jlong {
    let Some(dispatch) = ensure_ready(&mut env) else {
        return BAD_PARAMETER as jlong;
    };
    unsafe { session::min_frame_count(&dispatch, stream_type, sample_rate as u32) }
}

// --- lifecycle -------------------------------------------------------------

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_create(
    mut env: JNIEnv,
    thiz: JObject,
    parcel: JObject,
) -> jlong {
    let Some(dispatch) = ensure_ready(&mut env) else {
        return 0;
    };
    let attribution_parcel = if !parcel.as_raw().is_null() {
        let Some(convert) = dispatch.parcel_for_java_object else {
            error!("parcel supplied but this release takes no attribution");
            return 0;
        };
        let native =
            unsafe { convert(env.get_raw() as *mut c_void, parcel.as_raw() as *mut c_void) };
        if native.is_null() {
            // the parcel went away under us; the caller may retry with a
            // fresh one
            error!("parcel conversion returned null");
            return 0;
        }
        Some(native)
    } else {
        None
    };
    let Some(sink) = JniSink::new(&mut env, &thiz) else {
        return 0;
    };
    let Some(routing) = JniRoutingSink::new(&mut env, &thiz) else {
        return 0;
    };
    let holder = unsafe {
        TrackHolder::create(
            dispatch,
            Abi::current(),
            attribution_parcel,
            Box::new(sink),
            Box::new(routing),
        )
    };
    match holder {
        Some(holder) => Box::into_raw(Box::new(JniSession {
            holder,
            shared_memory: None,
        })) as jlong,
        None => 0,
    }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_set(
    mut env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    stream_type: jint,
    sample_rate: jint,
    format: jint,
    channel_mask: jint,
    frame_count: jint,
    track_flags: jint,
    session_id: jint,
    max_required_speed: jfloat,
    selected_device_id: jint,
    bit_rate: jint,
    duration_us: jlong,
    has_video: jboolean,
    small_buf: jboolean,
    is_streaming: jboolean,
    bit_width: jint,
    offload_buffer_size: jint,
    usage: jint,
    content_type: jint,
    attr_flags: jint,
    notification_frames: jint,
    do_not_reconnect: jboolean,
    transfer_mode: jint,
    content_id: jint,
    sync_id: jint,
    encapsulation_mode: jint,
    shared_memory: JObject,
) -> jint {
    let session = unsafe { session_mut(ptr) };
    let shared_ptr = if !shared_memory.as_raw().is_null() {
        let buffer = unsafe { JByteBuffer::from_raw(shared_memory.as_raw()) };
        let Ok(address) = env.get_direct_buffer_address(&buffer) else {
            error!("shared memory is not a direct buffer");
            return BAD_PARAMETER;
        };
        // keep the buffer pinned as long as the track may read it
        session.shared_memory = env.new_global_ref(&shared_memory).ok();
        address as *mut c_void
    } else {
        std::ptr::null_mut()
    };
    let params = SetParams {
        stream_type,
        sample_rate: sample_rate as u32,
        format: format as u32,
        channel_mask: channel_mask as u32,
        frame_count,
        track_flags: track_flags as u32,
        session_id,
        max_required_speed,
        selected_device_id,
        bit_rate: bit_rate as u32,
        duration_us,
        has_video: has_video != 0,
        small_buf: small_buf != 0,
        is_streaming: is_streaming != 0,
        bit_width: bit_width as u32,
        offload_buffer_size: offload_buffer_size as u32,
        usage,
        content_type,
        attr_flags: attr_flags as u32,
        notification_frames,
        do_not_reconnect: do_not_reconnect != 0,
        transfer_mode,
        content_id,
        sync_id,
        encapsulation_mode,
        shared_memory: shared_ptr,
    };
    unsafe { session.holder.set(&params) }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_dtor(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) {
    if ptr == 0 {
        return;
    }
    let session = unsafe { Box::from_raw(ptr as *mut JniSession) };
    unsafe { session.holder.destroy() };
    // the shared-memory global ref drops with the session
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getRealPtr(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jlong {
    holder(ptr).real_ptr() as jlong
}

// --- transport -------------------------------------------------------------

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_startInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jint {
    holder(ptr).start()
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_stopInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) {
    holder(ptr).stop()
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_stoppedInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jboolean {
    holder(ptr).stopped() as jboolean
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_pauseInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) {
    holder(ptr).pause()
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_pauseAndWaitInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    timeout_ms: jlong,
) -> jboolean {
    holder(ptr).pause_and_wait(timeout_ms) as jboolean
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_flushInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) {
    holder(ptr).flush()
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_reloadInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jint {
    holder(ptr).reload()
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_hasStartedInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jboolean {
    holder(ptr).has_started() as jboolean
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getOutputInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jint {
    holder(ptr).output()
}

// --- volume / effects ------------------------------------------------------

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_setVolumeInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    volume: jfloat,
) -> jint {
    holder(ptr).set_volume(volume)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_setAuxEffectSendLevelInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    level: jfloat,
) -> jint {
    holder(ptr).set_aux_effect_send_level(level)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getAuxEffectSendLevelInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jfloat {
    holder(ptr).aux_effect_send_level()
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_attachAuxEffectInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    effect_id: jint,
) -> jint {
    holder(ptr).attach_aux_effect(effect_id)
}

// --- rate / position -------------------------------------------------------

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_setSampleRateInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    rate: jint,
) -> jint {
    holder(ptr).set_sample_rate(rate as u32)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getSampleRateInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jint {
    holder(ptr).sample_rate() as jint
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getOriginalSampleRateInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jint {
    holder(ptr).original_sample_rate() as jint
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_setLoopInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    loop_start: jint,
    loop_end: jint,
    loop_count: jint,
) -> jint {
    holder(ptr).set_loop(loop_start as u32, loop_end as u32, loop_count)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_setMarkerPositionInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    position: jint,
) -> jint {
    holder(ptr).set_marker_position(position as u32)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getMarkerPositionInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jlong {
    let (status, value) = holder(ptr).marker_position();
    pack_status_value(status, value)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_setPositionUpdatePeriodInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    period: jint,
) -> jint {
    holder(ptr).set_position_update_period(period as u32)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getPositionUpdatePeriodInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jlong {
    let (status, value) = holder(ptr).position_update_period();
    pack_status_value(status, value)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_setPositionInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    position: jint,
) -> jint {
    holder(ptr).set_position(position as u32)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getPositionInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jlong {
    let (status, value) = holder(ptr).position();
    pack_status_value(status, value)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getBufferPositionInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jlong {
    let (status, value) = holder(ptr).buffer_position();
    pack_status_value(status, value)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getBufferDurationInUsInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jlong {
    holder(ptr).buffer_duration_us()
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getPlaybackRateInternal(
    mut env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    speed_pitch: JFloatArray,
) -> jint {
    let Some(rate) = holder(ptr).playback_rate() else {
        return BAD_PARAMETER;
    };
    let _ = env.set_float_array_region(&speed_pitch, 0, &[rate.speed, rate.pitch]);
    (((rate.stretch_mode == 1) as i32) << 31) | ((rate.fallback_mode + 1) & 0xff)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_setPlaybackRateInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    speed: jfloat,
    pitch: jfloat,
    stretch_mode: jint,
    fallback_mode: jint,
) -> jint {
    holder(ptr).set_playback_rate(&PlaybackRate {
        speed,
        pitch,
        stretch_mode,
        fallback_mode,
    })
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_pendingDurationInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    location: jint,
) -> jint {
    holder(ptr).pending_duration(location)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getTimestampInternal(
    mut env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    out: JLongArray,
) -> jint {
    match holder(ptr).timestamp() {
        Ok((position, when_ns)) => {
            let _ = env.set_long_array_region(&out, 0, &[position as jlong, when_ns]);
            NO_ERROR
        }
        Err(status) => status,
    }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getTimestamp2Internal(
    mut env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    position: JLongArray,
    time_ns: JLongArray,
    timebase_offset: JLongArray,
    flushed: JLongArray,
) -> jint {
    let (status, ts) = holder(ptr).extended_timestamp();
    let _ = env.set_long_array_region(&position, 0, &ts.position);
    let _ = env.set_long_array_region(&time_ns, 0, &ts.time_ns);
    let _ = env.set_long_array_region(&timebase_offset, 0, &ts.timebase_offset);
    let _ = env.set_long_array_region(&flushed, 0, &[ts.flushed]);
    status
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getUnderrunFramesInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jint {
    holder(ptr).underrun_frames() as jint
}

// --- data transfer ---------------------------------------------------------

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_writeByteBuffer(
    mut env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    buffer: JByteBuffer,
    offset: jint,
    size: jint,
    blocking: jboolean,
) -> jlong {
    let Ok(address) = env.get_direct_buffer_address(&buffer) else {
        return BAD_PARAMETER as jlong;
    };
    let base = unsafe { address.offset(offset as isize) } as *const c_void;
    unsafe { holder(ptr).write(base, size as u32, blocking != 0) as jlong }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_writeByteArray(
    mut env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    buffer: JByteArray,
    offset: jint,
    size: jint,
    blocking: jboolean,
) -> jlong {
    let Ok(elements) = (unsafe { env.get_array_elements(&buffer, ReleaseMode::NoCopyBack) })
    else {
        return BAD_PARAMETER as jlong;
    };
    let base = unsafe { elements.as_ptr().offset(offset as isize) } as *const c_void;
    unsafe { holder(ptr).write(base, size as u32, blocking != 0) as jlong }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_writeFloatArray(
    mut env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    buffer: JFloatArray,
    offset: jint,
    size: jint,
    blocking: jboolean,
) -> jlong {
    let Ok(elements) = (unsafe { env.get_array_elements(&buffer, ReleaseMode::NoCopyBack) })
    else {
        return BAD_PARAMETER as jlong;
    };
    let base = unsafe { elements.as_ptr().offset(offset as isize) } as *const c_void;
    let bytes = size as u32 * std::mem::size_of::<jfloat>() as u32;
    unsafe { holder(ptr).write(base, bytes, blocking != 0) as jlong }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_obtainBufferInternal(
    mut env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    frame_size: jint,
    wait_count: jint,
    non_contig: JLongArray,
    requested_frames: jlong,
) -> jobject {
    let outcome = unsafe {
        holder(ptr).obtain_buffer(frame_size as u32, wait_count, requested_frames as usize)
    };
    match outcome {
        ObtainOutcome::Buffer {
            data,
            size,
            non_contig: frames,
        } => {
            if !non_contig.as_raw().is_null() {
                let _ = env.set_long_array_region(&non_contig, 0, &[frames as jlong]);
            }
            match unsafe { env.new_direct_byte_buffer(data as *mut u8, size) } {
                Ok(buffer) => buffer.as_raw(),
                Err(_) => std::ptr::null_mut(),
            }
        }
        _ => std::ptr::null_mut(),
    }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_releaseBufferInternal(
    mut env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    frame_size: jint,
    buffer: JByteBuffer,
    limit: jint,
) {
    let Ok(address) = env.get_direct_buffer_address(&buffer) else {
        return;
    };
    unsafe {
        holder(ptr).release_buffer(frame_size as u32, address as *mut c_void, limit as usize)
    };
}

// --- key/value parameters --------------------------------------------------

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_setParametersInternal(
    mut env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    params: JString,
) -> jint {
    let Ok(value) = env.get_string(&params) else {
        return BAD_PARAMETER;
    };
    let Ok(pairs) = CString::new(String::from(value)) else {
        return BAD_PARAMETER;
    };
    unsafe { holder(ptr).set_parameters(&pairs) }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getParametersInternal(
    mut env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    keys: JString,
) -> jobject {
    let Ok(value) = env.get_string(&keys) else {
        return std::ptr::null_mut();
    };
    let Ok(keys) = CString::new(String::from(value)) else {
        return std::ptr::null_mut();
    };
    match unsafe { holder(ptr).parameters(&keys) } {
        Some(reply) => match env.new_string(reply.to_string_lossy()) {
            Ok(string) => string.into_raw(),
            Err(_) => std::ptr::null_mut(),
        },
        None => std::ptr::null_mut(),
    }
}

// --- routing ---------------------------------------------------------------

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_setSelectedDeviceInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
    device_id: jint,
) -> jint {
    holder(ptr).set_selected_device(device_id)
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getSelectedDeviceInternal(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jint {
    holder(ptr).selected_device()
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_getRoutedDevicesInternal(
    mut env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jobject {
    let Some(ids) = holder(ptr).routed_devices() else {
        return std::ptr::null_mut();
    };
    let Ok(array) = env.new_int_array(ids.len() as jint) else {
        let _ = env.exception_clear();
        error!("out of memory, dropping routed devices");
        return std::ptr::null_mut();
    };
    let _ = env.set_int_array_region(&array, 0, &ids);
    array.into_raw()
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_NativeTrack_notificationFramesActFromOffset(
    _env: JNIEnv,
    _thiz: JObject,
    ptr: jlong,
) -> jint {
    unsafe { holder(ptr).notification_frames_act(&GlobalSymbols) }
}

// --- queries over arbitrary track pointers ---------------------------------

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_TrackHiddenApi_getHalSampleRateInternal(
    mut env: JNIEnv,
    _clazz: JClass,
    track: jlong,
) -> jint {
    let Some(dispatch) = ensure_ready(&mut env) else {
        return 0;
    };
    unsafe { session::hal_sample_rate(&dispatch, track as *mut c_void) as jint }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_TrackHiddenApi_getHalChannelCountInternal(
    mut env: JNIEnv,
    _clazz: JClass,
    track: jlong,
) -> jint {
    let Some(dispatch) = ensure_ready(&mut env) else {
        return 0;
    };
    unsafe { session::hal_channel_count(&dispatch, track as *mut c_void) as jint }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_TrackHiddenApi_getHalFormatInternal(
    mut env: JNIEnv,
    _clazz: JClass,
    track: jlong,
) -> jint {
    let Some(dispatch) = ensure_ready(&mut env) else {
        return 0;
    };
    unsafe { session::hal_format(&dispatch, track as *mut c_void) as jint }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_TrackHiddenApi_getOutputInternal(
    mut env: JNIEnv,
    _clazz: JClass,
    track: jlong,
) -> jint {
    let Some(dispatch) = ensure_ready(&mut env) else {
        return 0;
    };
    unsafe { session::output_of(&dispatch, track as *mut c_void) }
}

static NATIVE_GET_FLAGS: OnceLock<Option<JMethodID>> = OnceLock::new();

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_TrackHiddenApi_getFlagsInternal(
    mut env: JNIEnv,
    _clazz: JClass,
    audio_track: JObject,
    track_ptr: jlong,
) -> jint {
    let Some(dispatch) = ensure_ready(&mut env) else {
        return BAD_PARAMETER;
    };
    if dispatch.level >= 26 {
        // the managed track object exposes the flags from 8.0 on
        if audio_track.as_raw().is_null() {
            error!("flags query on 8.0+ needs the managed track object");
            return BAD_PARAMETER;
        }
        let method = *NATIVE_GET_FLAGS.get_or_init(|| {
            let class = env.get_object_class(&audio_track).ok()?;
            optional_method(&mut env, &class, "native_get_flags", "()I")
        });
        let Some(method) = method else {
            return BAD_PARAMETER;
        };
        let flags = unsafe {
            env.call_method_unchecked(
                &audio_track,
                method,
                ReturnType::Primitive(Primitive::Int),
                &[],
            )
        };
        return flags.ok().and_then(|v| v.i().ok()).unwrap_or(BAD_PARAMETER);
    }
    unsafe {
        session::flags_from_offset_raw(
            &dispatch,
            Abi::current(),
            track_ptr as *mut c_void,
            &GlobalSymbols,
        )
    }
}

#[no_mangle]
pub extern "system" fn Java_org_nativetrack_core_TrackHiddenApi_findAfTrackFlagsInternal(
    mut env: JNIEnv,
    _clazz: JClass,
    track_ptr: jlong,
    af_latency: jint,
    af_frame_count: jlong,
    af_sample_rate: jint,
    latency: jint,
    format: jint,
) -> jint {
    if ensure_ready(&mut env).is_none() {
        return BAD_PARAMETER;
    }
    if device_api_level() < 34 {
        return BAD_PARAMETER;
    }
    let query = crate::offsets::AfFlagsQuery {
        latency: latency as u32,
        af_latency: af_latency as u32,
        af_frame_count: af_frame_count as usize,
        af_sample_rate: af_sample_rate as u32,
        format: format as u32,
    };
    unsafe { crate::offsets::af_track_flags(track_ptr as *const u8, &query, device_api_level()) }
}
