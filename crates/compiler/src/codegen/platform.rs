//! Target selection
//!
//! The triple and datalayout are picked from a fixed table keyed by the
//! platform/architecture/bitsize tuple in `build_settings`, which compile
//! time `#run` blocks may have rewritten.

use crate::build_settings::{Architecture, BuildSettings, Platform};

/// Resolve `(target triple, target datalayout)` for the configured target.
pub fn target_layout(settings: &BuildSettings) -> Result<(&'static str, &'static str), String> {
    match (settings.platform, settings.architecture, settings.bitsize) {
        (Platform::Linux, Architecture::X86 | Architecture::X64, 64) => Ok((
            "x86_64-unknown-linux-gnu",
            "e-m:e-p270:32:32-p271:32:32-p272:64:64-i64:64-f80:128-n8:16:32:64-S128",
        )),
        (Platform::Linux, Architecture::X86, 32) => Ok((
            "i386-unknown-linux-gnu",
            "e-m:e-p:32:32-p270:32:32-p271:32:32-p272:64:64-f64:32:64-f80:32-n8:16:32-S128",
        )),
        (Platform::Darwin, Architecture::X86 | Architecture::X64, 64) => Ok((
            "x86_64-apple-macosx10.15.0",
            "e-m:o-p270:32:32-p271:32:32-p272:64:64-i64:64-f80:128-n8:16:32:64-S128",
        )),
        (Platform::Darwin, Architecture::Arm, 64) => Ok((
            "arm64-apple-macosx11.0.0",
            "e-m:o-i64:64-i128:128-n32:64-S128",
        )),
        (Platform::Windows, Architecture::X86, 32) => Ok((
            "i686-pc-windows-msvc",
            "e-m:x-p:32:32-p270:32:32-p271:32:32-p272:64:64-i64:64-f80:128-n8:16:32-a:0:32-S32",
        )),
        (Platform::Windows, Architecture::X64 | Architecture::X86, 64) => Ok((
            "x86_64-pc-windows-msvc",
            "e-m:w-p270:32:32-p271:32:32-p272:64:64-i64:64-f80:128-n8:16:32:64-S128",
        )),
        (platform, architecture, bitsize) => Err(format!(
            "unsupported target {:?}:{:?}:{}",
            platform, architecture, bitsize
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_settings::OptLevel;

    fn settings(platform: Platform, architecture: Architecture, bitsize: u32) -> BuildSettings {
        BuildSettings {
            targetfile: "demo.sage".into(),
            executable_name: "a.out".into(),
            platform,
            architecture,
            bitsize,
            optimization_level: OptLevel::None,
            program_arguments: String::new(),
            argument_count: 0,
        }
    }

    #[test]
    fn test_linux_x64() {
        let (triple, layout) =
            target_layout(&settings(Platform::Linux, Architecture::X64, 64)).unwrap();
        assert_eq!(triple, "x86_64-unknown-linux-gnu");
        assert!(layout.starts_with("e-m:e"));
    }

    #[test]
    fn test_darwin_arm() {
        let (triple, _) =
            target_layout(&settings(Platform::Darwin, Architecture::Arm, 64)).unwrap();
        assert_eq!(triple, "arm64-apple-macosx11.0.0");
    }

    #[test]
    fn test_windows_x86_32() {
        let (triple, _) =
            target_layout(&settings(Platform::Windows, Architecture::X86, 32)).unwrap();
        assert_eq!(triple, "i686-pc-windows-msvc");
    }

    #[test]
    fn test_unsupported_tuple_is_rejected() {
        assert!(target_layout(&settings(Platform::Darwin, Architecture::Arm, 32)).is_err());
    }
}
