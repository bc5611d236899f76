pub mod bridge;
pub mod dispatch;
pub mod layout;
pub mod library;
pub mod offsets;
pub mod platform;
pub mod refbase;
pub mod routing;
pub mod session;

#[cfg(all(target_os = "android", feature = "android"))]
pub mod linker;

#[cfg(all(target_os = "android", feature = "android"))]
pub mod android_jni;
