//! Opens the system libraries the running OS release keeps its private audio
//! client in. Which libraries, and how they can be opened at all, depends on
//! the release: plain dlopen before 7.0, a runtime-mediated load on 7.x
//! (the classloader namespace blocks dlopen but the escape below it does not
//! exist yet), and a linker-namespace escape from 8.0 on.
//!
//! Loading happens once per process. A failed load is permanent for the
//! running image; retrying cannot help and callers must treat everything
//! downstream as unavailable.

use log::{error, info};

use crate::dispatch::Lib;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStrategy {
    /// Ordinary dynamic load, pre-7.0.
    Plain,
    /// 7.x: loaded through the managed runtime so the classloader namespace
    /// lets it through.
    RuntimeMediated,
    /// 8.0+: loaded into a fresh shared namespace via the linker escape.
    Namespace,
}

pub fn load_strategy(level: i32) -> LoadStrategy {
    if level < 24 {
        LoadStrategy::Plain
    } else if level < 26 {
        LoadStrategy::RuntimeMediated
    } else {
        LoadStrategy::Namespace
    }
}

/// The libraries a release needs: `(slot, soname, optional)`.
pub fn load_plan(level: i32) -> Vec<(Lib, &'static str, bool)> {
    let mut plan = Vec::new();
    if level < 26 {
        // one combined media library before the 8.0 split
        plan.push((Lib::AudioClient, "libmedia.so", false));
        plan.push((Lib::Utils, "libutils.so", false));
        plan.push((Lib::Binder, "libbinder.so", false));
        if level >= 24 {
            plan.push((Lib::AvEnhancements, "libavenhancements.so", true));
        }
    } else {
        plan.push((Lib::AudioClient, "libaudioclient.so", false));
        plan.push((Lib::Utils, "libutils.so", false));
        plan.push((Lib::Binder, "libbinder.so", false));
        if level >= 31 {
            plan.push((Lib::Permission, "libpermission.so", false));
            plan.push((Lib::AndroidRuntime, "libandroid_runtime.so", false));
        }
        plan.push((Lib::AvEnhancements, "libavenhancements.so", true));
    }
    plan
}

/// One library open. Production opens through the system linker; tests count.
pub trait LibraryOpener {
    type Handle;
    fn open(&mut self, soname: &str) -> Option<Self::Handle>;
}

pub struct LibrarySet<H> {
    handles: Vec<(Lib, H)>,
}

impl<H> LibrarySet<H> {
    pub fn get(&self, lib: Lib) -> Option<&H> {
        self.handles.iter().find(|(l, _)| *l == lib).map(|(_, h)| h)
    }
}

fn load<O: LibraryOpener>(level: i32, opener: &mut O) -> Option<LibrarySet<O::Handle>> {
    let mut handles = Vec::new();
    for (lib, soname, optional) in load_plan(level) {
        match opener.open(soname) {
            Some(handle) => handles.push((lib, handle)),
            None if optional => {
                info!("{soname} not present, continuing without it");
            }
            None => {
                error!("failed to open {soname}");
                return None;
            }
        }
    }
    Some(LibrarySet { handles })
}

/// Idempotent loader state. The first successful load sticks; later calls
/// are no-ops that report success without touching the opener again.
pub struct Loader<H> {
    set: Option<LibrarySet<H>>,
}

impl<H> Loader<H> {
    pub const fn new() -> Self {
        Self { set: None }
    }

    pub fn ensure<O: LibraryOpener<Handle = H>>(&mut self, level: i32, opener: &mut O) -> bool {
        if self.set.is_some() {
            return true;
        }
        match load(level, opener) {
            Some(set) => {
                self.set = Some(set);
                true
            }
            None => false,
        }
    }

    pub fn libraries(&self) -> Option<&LibrarySet<H>> {
        self.set.as_ref()
    }
}

impl<H> Default for Loader<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Symbol lookup over loaded unix handles.
#[cfg(unix)]
impl crate::dispatch::SymbolSource for LibrarySet<libloading::os::unix::Library> {
    fn resolve(&self, lib: Lib, name: &str) -> Option<*mut std::ffi::c_void> {
        let handle = self.get(lib)?;
        let symbol: libloading::os::unix::Symbol<*mut std::ffi::c_void> =
            unsafe { handle.get(name.as_bytes()) }
                .map_err(|e| info!("lookup of {name} failed: {e}"))
                .ok()?;
        Some(unsafe { symbol.into_raw() } as *mut std::ffi::c_void)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingOpener {
        opened: Vec<String>,
        fail: Vec<&'static str>,
    }

    impl CountingOpener {
        fn new() -> Self {
            Self { opened: Vec::new(), fail: Vec::new() }
        }
    }

    impl LibraryOpener for CountingOpener {
        type Handle = ();
        fn open(&mut self, soname: &str) -> Option<()> {
            self.opened.push(soname.to_string());
            if self.fail.contains(&soname) {
                None
            } else {
                Some(())
            }
        }
    }

    #[test]
    fn plan_uses_combined_library_before_26() {
        let plan = load_plan(23);
        assert!(plan.iter().any(|(_, name, _)| *name == "libmedia.so"));
        assert!(!plan.iter().any(|(_, name, _)| *name == "libaudioclient.so"));
        assert!(!plan.iter().any(|(lib, _, _)| *lib == Lib::Permission));
    }

    #[test]
    fn plan_splits_and_adds_attribution_libraries() {
        let plan = load_plan(31);
        assert!(plan.iter().any(|(_, name, _)| *name == "libaudioclient.so"));
        assert!(plan.iter().any(|(lib, _, _)| *lib == Lib::Permission));
        assert!(plan.iter().any(|(lib, _, _)| *lib == Lib::AndroidRuntime));

        let plan = load_plan(28);
        assert!(!plan.iter().any(|(lib, _, _)| *lib == Lib::Permission));
    }

    #[test]
    fn strategy_bands() {
        assert_eq!(load_strategy(21), LoadStrategy::Plain);
        assert_eq!(load_strategy(23), LoadStrategy::Plain);
        assert_eq!(load_strategy(24), LoadStrategy::RuntimeMediated);
        assert_eq!(load_strategy(25), LoadStrategy::RuntimeMediated);
        assert_eq!(load_strategy(26), LoadStrategy::Namespace);
        assert_eq!(load_strategy(36), LoadStrategy::Namespace);
    }

    #[test]
    fn second_ensure_does_not_reopen() {
        let mut opener = CountingOpener::new();
        let mut loader = Loader::new();
        assert!(loader.ensure(28, &mut opener));
        let after_first = opener.opened.len();
        assert_eq!(after_first, load_plan(28).len());
        assert!(loader.ensure(28, &mut opener));
        assert_eq!(opener.opened.len(), after_first);
    }

    #[test]
    fn missing_mandatory_library_fails_load() {
        let mut opener = CountingOpener::new();
        opener.fail.push("libutils.so");
        let mut loader = Loader::new();
        assert!(!loader.ensure(28, &mut opener));
        assert!(loader.libraries().is_none());
        // a retry deterministically fails again
        assert!(!loader.ensure(28, &mut opener));
    }

    #[test]
    fn missing_optional_library_is_tolerated() {
        let mut opener = CountingOpener::new();
        opener.fail.push("libavenhancements.so");
        let mut loader = Loader::new();
        assert!(loader.ensure(25, &mut opener));
        let set = loader.libraries().unwrap();
        assert!(set.get(Lib::AvEnhancements).is_none());
        assert!(set.get(Lib::AudioClient).is_some());
    }
}
