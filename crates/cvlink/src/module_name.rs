//! Native module file naming.

use crate::platform::{Arch, Os, Platform, PlatformProfile, PointerWidth};

/// Logical name of the module exporting the `cve*` entry points.
pub const EXTERN_MODULE: &str = "cvextern";

/// Logical name of the video I/O plugin shipped with universal builds.
pub const FFMPEG_MODULE: &str = "opencv_videoio_ffmpeg_64";

/// Suffix carried by universal-build module names.
const LEGACY_64_SUFFIX: &str = "_64";

/// Map a logical module name to its on-disk file name.
///
/// `foo` becomes `foo.dll` on Windows, `libfoo.so` on Linux and Android and
/// `libfoo.dylib` on macOS. Other platforms keep the bare name.
pub fn resolve_module_file_name(name: &str, os: Os) -> String {
    // Naming depends only on the OS family.
    let profile =
        PlatformProfile::for_platform(&Platform::new(os, Arch::Unknown, PointerWidth::Bits64));
    format!("{}{}{}", profile.module_prefix, name, profile.module_suffix)
}

/// Strip the `_64` marker from a module file name in a 32-bit process.
///
/// Universal builds ship one name for both architectures; the 32-bit
/// binary is the one without the marker.
pub fn adjust_for_pointer_width(file_name: &str, platform: &Platform) -> String {
    if platform.is_32bit() && file_name.contains(LEGACY_64_SUFFIX) {
        file_name.replace(LEGACY_64_SUFFIX, "")
    } else {
        file_name.to_string()
    }
}

/// Modules loaded by default on the given platform, as logical names.
pub fn default_modules(os: Os) -> Vec<String> {
    match os {
        Os::Windows => vec![FFMPEG_MODULE.to_string(), EXTERN_MODULE.to_string()],
        _ => vec![EXTERN_MODULE.to_string()],
    }
}

/// Drop empty entries and map logical names to file names.
pub fn module_file_names<S: AsRef<str>>(modules: &[S], os: Os) -> Vec<String> {
    modules
        .iter()
        .map(|m| m.as_ref().trim())
        .filter(|m| !m.is_empty())
        .map(|m| resolve_module_file_name(m, os))
        .collect()
}
