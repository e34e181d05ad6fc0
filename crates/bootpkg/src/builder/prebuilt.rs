//! Prebuilt filesystem drivers downloaded from a fixed URL.
//!
//! Nothing in here is fatal. A missing download only means the package ships
//! without that driver.

use crate::builder::command::{CommandRunner, CommandSpec};
use crate::builder::config::Layout;
use tracing::{info, warn};

/// Name a downloaded file is stored under (`HFSPlus_x64.efi` → `HFSPlus.efi`).
pub fn staged_name(file: &str) -> String {
    file.replace("_x64", "")
}

/// Download each file into the UEFI driver directory.
///
/// Returns the staged names that downloaded successfully.
pub fn fetch(
    runner: &dyn CommandRunner,
    base_url: &str,
    files: &[String],
    layout: &Layout,
    stream: bool,
) -> Vec<String> {
    let dest_dir = layout.uefi_drivers();
    if let Err(e) = std::fs::create_dir_all(&dest_dir) {
        warn!(dir = %dest_dir.display(), error = %e, "cannot create driver directory");
        return Vec::new();
    }

    let base_url = base_url.trim_end_matches('/');
    let mut fetched = Vec::new();
    for file in files {
        let name = staged_name(file);
        let dest = dest_dir.join(&name);
        let result = runner.run(
            &CommandSpec::new(["curl", "-fsSLk", "-o"])
                .arg(dest.to_string_lossy())
                .arg(format!("{base_url}/{file}"))
                .current_dir(&layout.root)
                .stream(stream),
        );
        if result.success() {
            info!(driver = %name, "downloaded");
            fetched.push(name);
        } else {
            warn!("{}", result.describe(&format!("download of {file}")));
        }
    }
    fetched
}

/// Copy downloaded drivers from the UEFI directory into the legacy one.
///
/// Returns how many were copied.
pub fn stage(names: &[String], layout: &Layout) -> usize {
    let from = layout.uefi_drivers();
    let to = layout.legacy_drivers();
    if let Err(e) = std::fs::create_dir_all(&to) {
        warn!(dir = %to.display(), error = %e, "cannot create driver directory");
        return 0;
    }

    names
        .iter()
        .filter(|name| match std::fs::copy(from.join(name), to.join(name)) {
            Ok(_) => true,
            Err(e) => {
                warn!(driver = %name, error = %e, "staging failed");
                false
            }
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staged_name_strips_arch_suffix() {
        assert_eq!(staged_name("HFSPlus_x64.efi"), "HFSPlus.efi");
        assert_eq!(staged_name("apfs.efi"), "apfs.efi");
    }

    #[test]
    fn test_stage_copies_into_legacy_dir() {
        let dir = tempfile::tempdir().unwrap();
        let layout = Layout {
            root: dir.path().to_path_buf(),
            sdk: dir.path().join("UDK2018"),
            bootloader: dir.path().join("UDK2018/Clover"),
        };
        std::fs::create_dir_all(layout.uefi_drivers()).unwrap();
        std::fs::write(layout.uefi_drivers().join("apfs.efi"), b"efi").unwrap();

        let names = vec!["apfs.efi".to_string(), "NTFS.efi".to_string()];
        assert_eq!(stage(&names, &layout), 1);
        assert!(layout.legacy_drivers().join("apfs.efi").exists());
        assert!(!layout.legacy_drivers().join("NTFS.efi").exists());
    }
}
