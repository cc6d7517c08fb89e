use crate::args::UpdaterArgs;
use crate::error::UpdaterError;
use crate::version::ProductVersion;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Everything the updater needs to know about the single tracked application.
#[derive(Debug, Clone)]
pub struct ProductProfile {
    pub name: String,
    pub executable: String,
    pub install_dir_name: String,
    pub registry_key: String,
    pub installer_prefix: String,
    pub arch: String,
}

impl ProductProfile {
    pub fn from_args(args: &UpdaterArgs) -> Self {
        Self {
            name: args.product.clone(),
            executable: args.executable.clone(),
            install_dir_name: args.install_dir_name.clone(),
            registry_key: args.registry_key.clone(),
            installer_prefix: args.installer_prefix.clone(),
            arch: args.arch.clone(),
        }
    }

    /// `<prefix>_<major>.<minor>.<build>_<arch>_setup.exe`
    pub fn installer_file_name(&self, version: &ProductVersion) -> String {
        format!(
            "{}_{}_{}_setup.exe",
            self.installer_prefix, version, self.arch
        )
    }

    pub fn installer_path(&self, directory: &Path, version: &ProductVersion) -> PathBuf {
        directory.join(self.installer_file_name(version))
    }

    /// Pattern matching release file names, capturing the three version groups.
    ///
    /// Feeds may report the file name with its folder on the mirror, so the
    /// prefix may follow a path separator.
    pub fn installer_pattern(&self) -> Result<Regex, UpdaterError> {
        let pattern = format!(
            r"(?:^|[/\\]){}_(\d+)\.(\d+)\.(\d+)_{}_setup\.exe$",
            regex::escape(&self.installer_prefix),
            regex::escape(&self.arch)
        );

        Regex::new(&pattern).map_err(UpdaterError::from)
    }

    /// Relative paths probed below each fixed drive root.
    pub fn default_install_locations(&self) -> [PathBuf; 2] {
        [
            Path::new("Program Files")
                .join(&self.install_dir_name)
                .join(&self.executable),
            Path::new("Program Files (x86)")
                .join(&self.install_dir_name)
                .join(&self.executable),
        ]
    }
}

#[cfg(test)]
pub(crate) fn test_profile() -> ProductProfile {
    ProductProfile {
        name: "qBittorrent".to_owned(),
        executable: "qbittorrent.exe".to_owned(),
        install_dir_name: "qBittorrent".to_owned(),
        registry_key: "qBittorrent".to_owned(),
        installer_prefix: "qbittorrent".to_owned(),
        arch: "x64".to_owned(),
    }
}
