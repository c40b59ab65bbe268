//! Platform detection and the per-platform behavior table.
//!
//! Everything that differs between operating systems (module file name
//! format, architecture subfolder, fallback directory layouts) is looked up
//! here from a single [`Platform`] value instead of being branched on
//! throughout the loader.

use std::path::{Path, PathBuf};

use serde::Serialize;

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Os {
    Windows,
    Linux,
    MacOs,
    Android,
    Ios,
    Unknown,
}

/// CPU architecture of the running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Arch {
    X86,
    X86_64,
    Arm,
    Aarch64,
    Unknown,
}

/// Width of a native pointer in the running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PointerWidth {
    Bits32,
    Bits64,
}

/// Target description used for every platform-dependent decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Platform {
    pub os: Os,
    pub arch: Arch,
    pub pointer_width: PointerWidth,
}

impl Platform {
    pub const fn new(os: Os, arch: Arch, pointer_width: PointerWidth) -> Self {
        Self {
            os,
            arch,
            pointer_width,
        }
    }

    /// The platform this binary was compiled for.
    pub fn current() -> Self {
        let os = if cfg!(target_os = "windows") {
            Os::Windows
        } else if cfg!(target_os = "android") {
            Os::Android
        } else if cfg!(target_os = "linux") {
            Os::Linux
        } else if cfg!(target_os = "macos") {
            Os::MacOs
        } else if cfg!(target_os = "ios") {
            Os::Ios
        } else {
            Os::Unknown
        };

        let arch = if cfg!(target_arch = "x86_64") {
            Arch::X86_64
        } else if cfg!(target_arch = "x86") {
            Arch::X86
        } else if cfg!(target_arch = "aarch64") {
            Arch::Aarch64
        } else if cfg!(target_arch = "arm") {
            Arch::Arm
        } else {
            Arch::Unknown
        };

        let pointer_width = if cfg!(target_pointer_width = "32") {
            PointerWidth::Bits32
        } else {
            PointerWidth::Bits64
        };

        Self::new(os, arch, pointer_width)
    }

    pub fn is_32bit(&self) -> bool {
        self.pointer_width == PointerWidth::Bits32
    }

    /// Behavior table entry for this platform.
    pub fn profile(&self) -> PlatformProfile {
        PlatformProfile::for_platform(self)
    }
}

/// Where a fallback directory sits relative to the executable directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Executable directory after resolving symlinks, plus the subfolder
    ResolvedExeDir,
    /// A fixed relative path, optionally followed by the subfolder
    Relative {
        path: &'static str,
        with_subfolder: bool,
    },
}

impl Layout {
    /// Turn the layout into a concrete directory.
    ///
    /// Returns `None` when the layout does not apply (for example the
    /// executable directory cannot be resolved).
    pub fn apply(&self, exe_dir: &Path, subfolder: Option<&str>) -> Option<PathBuf> {
        match *self {
            Layout::ResolvedExeDir => {
                let resolved = exe_dir.canonicalize().ok()?;
                Some(join_subfolder(resolved, subfolder))
            }
            Layout::Relative {
                path,
                with_subfolder,
            } => {
                let base = exe_dir.join(path);
                if with_subfolder {
                    Some(join_subfolder(base, subfolder))
                } else {
                    Some(base)
                }
            }
        }
    }
}

pub(crate) fn join_subfolder(base: PathBuf, subfolder: Option<&str>) -> PathBuf {
    match subfolder {
        Some(sub) if !sub.is_empty() => base.join(sub),
        _ => base,
    }
}

const COMMON_FALLBACKS: &[Layout] = &[
    Layout::ResolvedExeDir,
    Layout::Relative {
        path: "../lib",
        with_subfolder: true,
    },
    Layout::Relative {
        path: "../Plugins",
        with_subfolder: false,
    },
    Layout::Relative {
        path: "../../Assets/Plugins",
        with_subfolder: true,
    },
];

const MACOS_FALLBACKS: &[Layout] = &[
    Layout::ResolvedExeDir,
    Layout::Relative {
        path: "../lib",
        with_subfolder: true,
    },
    Layout::Relative {
        path: "../Plugins",
        with_subfolder: false,
    },
    Layout::Relative {
        path: "../../Assets/Plugins",
        with_subfolder: true,
    },
    Layout::Relative {
        path: "../../Assets/Plugins/cvextern.bundle/Contents/MacOS",
        with_subfolder: false,
    },
    Layout::Relative {
        path: "../Frameworks",
        with_subfolder: false,
    },
];

/// How native modules reach the process on a platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadStrategy {
    /// Resolve a module directory and load every module from it
    Directory,
    /// Load every module by file name through the system linker path
    SystemLibraries,
    /// Load nothing up front; open the extern module by name when needed
    OnDemand,
    /// Linked into the executable; entry points come from the process image
    Static,
}

/// Platform-specific behavior resolved once from a [`Platform`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlatformProfile {
    /// Prefix added to a logical module name
    pub module_prefix: &'static str,
    /// Suffix added to a logical module name
    pub module_suffix: &'static str,
    /// Architecture subfolder under the executable directory
    pub subfolder: Option<&'static str>,
    /// Ordered alternate directories tried when the default is missing
    pub fallbacks: &'static [Layout],
    pub strategy: LoadStrategy,
}

impl PlatformProfile {
    pub fn for_platform(platform: &Platform) -> Self {
        match platform.os {
            Os::Windows => Self {
                module_prefix: "",
                module_suffix: ".dll",
                subfolder: windows_subfolder(platform),
                fallbacks: COMMON_FALLBACKS,
                strategy: LoadStrategy::Directory,
            },
            Os::Linux => Self {
                module_prefix: "lib",
                module_suffix: ".so",
                subfolder: None,
                fallbacks: COMMON_FALLBACKS,
                strategy: LoadStrategy::Directory,
            },
            Os::MacOs => Self {
                module_prefix: "lib",
                module_suffix: ".dylib",
                subfolder: None,
                fallbacks: MACOS_FALLBACKS,
                strategy: LoadStrategy::OnDemand,
            },
            // Packaged libraries live in the app's native library directory,
            // which only the system linker knows about.
            Os::Android => Self {
                module_prefix: "lib",
                module_suffix: ".so",
                subfolder: None,
                fallbacks: &[],
                strategy: LoadStrategy::SystemLibraries,
            },
            Os::Ios => Self {
                module_prefix: "",
                module_suffix: "",
                subfolder: None,
                fallbacks: &[],
                strategy: LoadStrategy::Static,
            },
            Os::Unknown => Self {
                module_prefix: "",
                module_suffix: "",
                subfolder: None,
                fallbacks: COMMON_FALLBACKS,
                strategy: LoadStrategy::Directory,
            },
        }
    }
}

fn windows_subfolder(platform: &Platform) -> Option<&'static str> {
    match platform.arch {
        Arch::X86_64 => Some("x64"),
        Arch::X86 => Some("x86"),
        Arch::Aarch64 => Some("arm64"),
        Arch::Arm => Some("arm"),
        Arch::Unknown => match platform.pointer_width {
            PointerWidth::Bits64 => Some("x64"),
            PointerWidth::Bits32 => Some("x86"),
        },
    }
}
