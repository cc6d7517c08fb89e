use crate::locator::resource::file_version_from_bytes;
use crate::version::ProductVersion;
use std::io;
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Filesystem queries used by the probes.
pub trait HostFs: Send + Sync {
    fn is_file(&self, path: &Path) -> bool;

    /// Mount points of fixed (non-removable) drives that are currently available.
    fn fixed_drive_roots(&self) -> io::Result<Vec<PathBuf>>;

    /// Embedded `major.minor.build` file version of an executable.
    fn file_version(&self, path: &Path) -> io::Result<Option<ProductVersion>>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemFs;

impl HostFs for SystemFs {
    fn is_file(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn fixed_drive_roots(&self) -> io::Result<Vec<PathBuf>> {
        let disks = Disks::new_with_refreshed_list();

        let mut roots = Vec::new();
        for disk in disks.list() {
            if disk.is_removable() {
                continue;
            }

            let root = disk.mount_point().to_path_buf();
            if !roots.contains(&root) {
                roots.push(root);
            }
        }

        Ok(roots)
    }

    fn file_version(&self, path: &Path) -> io::Result<Option<ProductVersion>> {
        let data = std::fs::read(path)?;
        Ok(file_version_from_bytes(&data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::resource::fixed_file_info;

    #[test]
    fn reads_version_of_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let exe = dir.path().join("qbittorrent.exe");

        let mut image = b"MZ".to_vec();
        image.extend(fixed_file_info(4, 6, 2, 0));
        std::fs::write(&exe, image).unwrap();

        assert!(SystemFs.is_file(&exe));
        assert!(!SystemFs.is_file(dir.path()));
        assert_eq!(
            SystemFs.file_version(&exe).unwrap(),
            Some(ProductVersion::new(4, 6, 2))
        );
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SystemFs.file_version(&dir.path().join("nope.exe")).is_err());
    }
}
