//! Escape hatch around the classloader-imposed linker namespace. The public
//! `dlopen` in libdl is a tiny trampoline that tail-branches into the
//! loader's internal entry point, passing the caller address along. Decoding
//! that branch hands us `__loader_dlopen`, and calling it with `dlopen`'s own
//! address as the forged caller makes the loader treat us as itself,
//! unrestricted. From there we can pull `__loader_android_create_namespace`
//! out of libdl_android and open libraries in a fresh shared namespace.
//!
//! The branch decode is implemented for aarch64 only. Elsewhere the escape
//! reports unavailable and dependent library loads surface as resolver
//! failure.

use std::ffi::{c_char, c_int, c_void, CString};
use std::sync::OnceLock;

use log::{error, info};

type LoaderDlopenFn =
    unsafe extern "C" fn(filename: *const c_char, flags: c_int, caller: *const c_void) -> *mut c_void;
type CreateNamespaceFn = unsafe extern "C" fn(
    name: *const c_char,
    ld_library_path: *const c_char,
    default_library_path: *const c_char,
    namespace_type: u64,
    permitted_when_isolated_path: *const c_char,
    parent: *mut c_void,
    caller: *const c_void,
) -> *mut c_void;

const ANDROID_DLEXT_USE_NAMESPACE: u64 = 0x200;
const ANDROID_NAMESPACE_TYPE_SHARED: u64 = 0x2;

// <android/dlext.h>
#[repr(C)]
struct AndroidDlextinfo {
    flags: u64,
    reserved_addr: *mut c_void,
    reserved_size: usize,
    relro_fd: c_int,
    library_fd: c_int,
    library_fd_offset: u64,
    library_namespace: *mut c_void,
}

extern "C" {
    fn android_dlopen_ext(
        filename: *const c_char,
        flags: c_int,
        info: *const AndroidDlextinfo,
    ) -> *mut c_void;
}

struct Bypass {
    create_namespace: CreateNamespaceFn,
}

// function pointers into libdl, valid for the process lifetime
unsafe impl Send for Bypass {}
unsafe impl Sync for Bypass {}

static BYPASS: OnceLock<Option<Bypass>> = OnceLock::new();

fn public_dlopen() -> *const c_void {
    unsafe { libc::dlsym(libc::RTLD_DEFAULT, c"dlopen".as_ptr()) as *const c_void }
}

/// Decodes the `b <target>` inside the libdl trampoline. Some devices map
/// the stub execute-only, so the pages are re-protected readable first (and
/// left that way; there is no safe moment to take readability back).
#[cfg(target_arch = "aarch64")]
unsafe fn decode_trampoline(trampoline: *const c_void) -> Option<LoaderDlopenFn> {
    let page_size = libc::sysconf(libc::_SC_PAGESIZE) as usize;
    let start = trampoline as usize & !(page_size - 1);
    let len = (trampoline as usize - start) + 8 * 4 + page_size;
    if libc::mprotect(
        start as *mut c_void,
        len,
        libc::PROT_READ | libc::PROT_EXEC,
    ) != 0
    {
        error!("mprotect on the dlopen trampoline failed");
        return None;
    }
    let code = trampoline as *const u32;
    for i in 0..8 {
        let insn = *code.add(i);
        // unconditional immediate branch
        if insn & 0xFC00_0000 == 0x1400_0000 {
            let imm26 = (insn & 0x03FF_FFFF) as i64;
            let offset = ((imm26 << 38) >> 38) * 4;
            let target = (code.add(i) as i64).wrapping_add(offset);
            return Some(std::mem::transmute::<i64, LoaderDlopenFn>(target));
        }
    }
    error!("no branch found in the dlopen trampoline");
    None
}

#[cfg(not(target_arch = "aarch64"))]
unsafe fn decode_trampoline(_trampoline: *const c_void) -> Option<LoaderDlopenFn> {
    info!("linker namespace escape not implemented for this instruction set");
    None
}

fn init() -> Option<Bypass> {
    if crate::platform::device_api_level() < 26 {
        // namespaces do not exist yet, nothing to escape
        return None;
    }
    let trampoline = public_dlopen();
    if trampoline.is_null() {
        error!("dlsym(dlopen) returned null");
        return None;
    }
    let loader_dlopen = unsafe { decode_trampoline(trampoline) }?;
    let libdl = unsafe {
        let handle = loader_dlopen(c"libdl_android.so".as_ptr(), libc::RTLD_NOW, trampoline);
        if handle.is_null() {
            loader_dlopen(c"libdl.so".as_ptr(), libc::RTLD_NOW, trampoline)
        } else {
            handle
        }
    };
    if libdl.is_null() {
        error!("loader dlopen of libdl_android.so failed: {}", dl_error());
        return None;
    }
    let create_namespace = unsafe {
        let sym = libc::dlsym(libdl, c"__loader_android_create_namespace".as_ptr());
        if sym.is_null() {
            error!(
                "__loader_android_create_namespace not found in libdl_android.so: {}",
                dl_error()
            );
            return None;
        }
        std::mem::transmute::<*mut c_void, CreateNamespaceFn>(sym)
    };
    Some(Bypass { create_namespace })
}

fn dl_error() -> String {
    unsafe {
        let err = libc::dlerror();
        if err.is_null() {
            "unknown".to_string()
        } else {
            std::ffi::CStr::from_ptr(err).to_string_lossy().into_owned()
        }
    }
}

/// Idempotent. Returns whether the escape is usable on this device.
pub fn ensure() -> bool {
    BYPASS.get_or_init(init).is_some()
}

/// Creates a namespace that shares the loader's own search paths, so the
/// otherwise-forbidden platform libraries resolve inside it.
pub fn create_shared_namespace(name: &str) -> Option<*mut c_void> {
    let bypass = BYPASS.get_or_init(init).as_ref()?;
    let cname = CString::new(name).ok()?;
    let ns = unsafe {
        (bypass.create_namespace)(
            cname.as_ptr(),
            std::ptr::null(),
            std::ptr::null(),
            ANDROID_NAMESPACE_TYPE_SHARED,
            std::ptr::null(),
            std::ptr::null_mut(),
            public_dlopen(),
        )
    };
    if ns.is_null() {
        error!("namespace creation failed");
        None
    } else {
        info!("created shared namespace {name}");
        Some(ns)
    }
}

/// `dlopen` scoped to the given namespace.
pub fn namespace_dlopen(soname: &str, namespace: *mut c_void) -> *mut c_void {
    let Ok(cname) = CString::new(soname) else {
        return std::ptr::null_mut();
    };
    let info = AndroidDlextinfo {
        flags: ANDROID_DLEXT_USE_NAMESPACE,
        reserved_addr: std::ptr::null_mut(),
        reserved_size: 0,
        relro_fd: 0,
        library_fd: 0,
        library_fd_offset: 0,
        library_namespace: namespace,
    };
    let handle = unsafe {
        android_dlopen_ext(cname.as_ptr(), libc::RTLD_NOW | libc::RTLD_GLOBAL, &info)
    };
    if handle.is_null() {
        error!("namespace dlopen of {soname} failed: {}", dl_error());
    }
    handle
}
