//! Build configuration and filesystem layout.
//!
//! Every field has a default, so an empty JSON object (or no file at all) is a
//! valid configuration.

use crate::builder::drivers::{default_drivers, DriverEntry};
use crate::builder::error::ConfigError;
use crate::builder::revision::RevisionPin;
use crate::builder::vcs::{RepoSource, VcsKind};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};

pub const DEFAULT_ROOT: &str = "~/src";
pub const SDK_REPO: &str = "https://github.com/tianocore/edk2";
pub const SDK_BRANCH: &str = "UDK2018";
pub const SDK_DIR: &str = "UDK2018";
pub const BOOTLOADER_REPO: &str = "https://svn.code.sf.net/p/cloverefiboot/code";
pub const BOOTLOADER_DIR: &str = "Clover";
pub const PREBUILT_BASE_URL: &str = "https://github.com/Micky1979/Build_Clover/raw/work/Files";
pub const PREBUILT_DRIVERS: &[&str] = &["apfs.efi", "NTFS.efi", "HFSPlus_x64.efi"];

/// Pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Working directory everything is checked out under (`~` is expanded).
    pub root: PathBuf,
    pub sdk_repo: String,
    pub sdk_branch: Option<String>,
    /// SDK checkout, relative to `root`.
    pub sdk_dir: String,
    pub bootloader_repo: String,
    /// Bootloader checkout, relative to the SDK tree.
    pub bootloader_dir: String,
    pub bootloader_revision: RevisionPin,
    pub drivers: Vec<DriverEntry>,
    pub prebuilt_base_url: String,
    pub prebuilt_drivers: Vec<String>,
    /// Stream command output live.
    pub debug: bool,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_ROOT),
            sdk_repo: SDK_REPO.to_string(),
            sdk_branch: Some(SDK_BRANCH.to_string()),
            sdk_dir: SDK_DIR.to_string(),
            bootloader_repo: BOOTLOADER_REPO.to_string(),
            bootloader_dir: BOOTLOADER_DIR.to_string(),
            bootloader_revision: RevisionPin::default(),
            drivers: default_drivers(),
            prebuilt_base_url: PREBUILT_BASE_URL.to_string(),
            prebuilt_drivers: PREBUILT_DRIVERS.iter().map(ToString::to_string).collect(),
            debug: false,
        }
    }
}

impl BuildConfig {
    /// Load from a JSON file; missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::InvalidJson {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the on-disk layout, validating that checkouts stay under the root.
    pub fn layout(&self) -> Result<Layout, ConfigError> {
        for (field, value) in [
            ("sdk_dir", &self.sdk_dir),
            ("bootloader_dir", &self.bootloader_dir),
        ] {
            if !is_inside(Path::new(value)) {
                return Err(ConfigError::EscapesRoot {
                    field,
                    value: value.clone(),
                });
            }
        }
        // Downloaded into a fixed directory, so each name is a single component.
        if let Some(name) = self
            .prebuilt_drivers
            .iter()
            .find(|name| !is_inside(Path::new(name)) || Path::new(name).components().count() != 1)
        {
            return Err(ConfigError::EscapesRoot {
                field: "prebuilt_drivers",
                value: name.clone(),
            });
        }

        let root = expand_root(&self.root)?;
        let sdk = root.join(&self.sdk_dir);
        let bootloader = sdk.join(&self.bootloader_dir);
        Ok(Layout {
            root,
            sdk,
            bootloader,
        })
    }

    pub fn sdk_source(&self, layout: &Layout) -> RepoSource {
        RepoSource {
            name: self.sdk_dir.clone(),
            url: self.sdk_repo.clone(),
            local_path: layout.sdk.clone(),
            kind: VcsKind::Git,
            branch: self.sdk_branch.clone(),
            preserve: Some(self.bootloader_dir.clone()),
        }
    }

    pub fn bootloader_source(&self, layout: &Layout) -> RepoSource {
        RepoSource {
            name: self.bootloader_dir.clone(),
            url: self.bootloader_repo.clone(),
            local_path: layout.bootloader.clone(),
            kind: VcsKind::Svn,
            branch: None,
            preserve: None,
        }
    }
}

/// Absolute paths of everything the pipeline reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub root: PathBuf,
    pub sdk: PathBuf,
    pub bootloader: PathBuf,
}

impl Layout {
    pub fn base_tools(&self) -> PathBuf {
        self.sdk.join("BaseTools/Source/C")
    }

    /// Install prefix of the auxiliary tools; their binaries are the cache markers.
    pub fn tools_bin(&self) -> PathBuf {
        self.root.join("opt/local/bin")
    }

    pub fn patches(&self) -> PathBuf {
        self.bootloader.join("Patches_for_UDK2018")
    }

    pub fn package_dir(&self) -> PathBuf {
        self.bootloader.join("CloverPackage")
    }

    pub fn makepkg(&self) -> PathBuf {
        self.package_dir().join("makepkg")
    }

    /// Where the packaging script leaves the finished package.
    pub fn out_dir(&self) -> PathBuf {
        self.package_dir().join("sym")
    }

    pub fn drivers_off(&self) -> PathBuf {
        self.package_dir().join("CloverV2/drivers-Off")
    }

    pub fn legacy_drivers(&self) -> PathBuf {
        self.drivers_off().join("drivers64")
    }

    pub fn uefi_drivers(&self) -> PathBuf {
        self.drivers_off().join("drivers64UEFI")
    }

    pub fn record_file(&self) -> PathBuf {
        self.root.join(".bootpkg/last-build.json")
    }
}

/// True for a non-empty relative path with no `..`, root, or prefix components.
pub(crate) fn is_inside(path: &Path) -> bool {
    let mut normal = false;
    for component in path.components() {
        match component {
            Component::Normal(_) => normal = true,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    normal
}

fn expand_root(root: &Path) -> Result<PathBuf, ConfigError> {
    let expanded = match root.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .ok_or_else(|| ConfigError::NoHome(root.display().to_string()))?
            .join(rest),
        Err(_) => root.to_path_buf(),
    };

    if expanded.is_absolute() {
        Ok(expanded)
    } else {
        Ok(std::env::current_dir()?.join(expanded))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = BuildConfig::default();
        assert_eq!(config.sdk_dir, "UDK2018");
        assert_eq!(config.bootloader_dir, "Clover");
        assert_eq!(config.drivers.len(), 2);
        assert_eq!(config.prebuilt_drivers.len(), 3);
        assert_eq!(config.bootloader_revision, RevisionPin::Latest);
        assert!(!config.debug);
    }

    #[test]
    fn test_empty_json_is_default() {
        let config: BuildConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, BuildConfig::default());
    }

    #[test]
    fn test_explicit_empty_driver_list_is_kept() {
        let config: BuildConfig = serde_json::from_str(r#"{"drivers": []}"#).unwrap();
        assert!(config.drivers.is_empty());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<BuildConfig, _> = serde_json::from_str(r#"{"sdk_repository": "x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bootpkg.json");
        std::fs::write(
            &path,
            r#"{"root": "/work", "bootloader_revision": "current", "debug": true}"#,
        )
        .unwrap();

        let config = BuildConfig::load(&path).unwrap();
        assert_eq!(config.root, PathBuf::from("/work"));
        assert_eq!(config.bootloader_revision, RevisionPin::Current);
        assert!(config.debug);
        assert_eq!(config.sdk_repo, SDK_REPO);
    }

    #[test]
    fn test_load_missing_file() {
        let err = BuildConfig::load(Path::new("/nonexistent/bootpkg.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_load_invalid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = BuildConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidJson { .. }));
    }

    #[test]
    fn test_layout_paths() {
        let config = BuildConfig {
            root: PathBuf::from("/work"),
            ..BuildConfig::default()
        };
        let layout = config.layout().unwrap();
        assert_eq!(layout.sdk, PathBuf::from("/work/UDK2018"));
        assert_eq!(layout.bootloader, PathBuf::from("/work/UDK2018/Clover"));
        assert_eq!(
            layout.out_dir(),
            PathBuf::from("/work/UDK2018/Clover/CloverPackage/sym")
        );
        assert_eq!(
            layout.uefi_drivers(),
            PathBuf::from("/work/UDK2018/Clover/CloverPackage/CloverV2/drivers-Off/drivers64UEFI")
        );
        assert_eq!(layout.tools_bin(), PathBuf::from("/work/opt/local/bin"));
    }

    #[test]
    fn test_layout_rejects_escaping_dirs() {
        for bad in ["../elsewhere", "/abs", "", "."] {
            let config = BuildConfig {
                root: PathBuf::from("/work"),
                sdk_dir: bad.to_string(),
                ..BuildConfig::default()
            };
            assert!(
                matches!(config.layout(), Err(ConfigError::EscapesRoot { field: "sdk_dir", .. })),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_layout_rejects_escaping_prebuilt_names() {
        for bad in ["../../escaped.efi", "sub/x.efi", "/tmp/x.efi", ".", ""] {
            let config = BuildConfig {
                root: PathBuf::from("/work"),
                prebuilt_drivers: vec!["apfs.efi".to_string(), bad.to_string()],
                ..BuildConfig::default()
            };
            assert!(
                matches!(
                    config.layout(),
                    Err(ConfigError::EscapesRoot { field: "prebuilt_drivers", .. })
                ),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_tilde_root_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            let layout = BuildConfig::default().layout().unwrap();
            assert_eq!(layout.root, home.join("src"));
        }
    }

    #[test]
    fn test_sources() {
        let config = BuildConfig {
            root: PathBuf::from("/work"),
            ..BuildConfig::default()
        };
        let layout = config.layout().unwrap();

        let sdk = config.sdk_source(&layout);
        assert_eq!(sdk.kind, VcsKind::Git);
        assert_eq!(sdk.preserve.as_deref(), Some("Clover"));

        let bootloader = config.bootloader_source(&layout);
        assert_eq!(bootloader.kind, VcsKind::Svn);
        assert!(bootloader.local_path.starts_with(&layout.root));
    }
}
