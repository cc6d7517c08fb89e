mod download;
mod process;

use download::download_to;
use process::{TerminationReport, launch_installer, terminate_running};

#[cfg(test)]
pub(crate) use download::testing;

use crate::error::UpdaterError;
use crate::feed::ReleaseInfo;
use crate::orchestrator::InstallBackend;
use crate::product::ProductProfile;
use crate::ui::UiHandle;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// What a successful install run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallOutcome {
    pub installer_path: PathBuf,
    pub bytes_written: u64,
    pub sha256: String,
    /// Instances of the product that were still running when the installer started.
    pub leftover_processes: usize,
}

/// The user's download folder, or `~/Downloads` where the platform has no
/// notion of one.
pub fn default_download_directory() -> Result<PathBuf, UpdaterError> {
    dirs::download_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join("Downloads")))
        .ok_or(UpdaterError::NoDownloadDirectory)
}

/// Downloads the release installer, closes the running product and starts
/// the installer.
#[derive(Debug, Clone)]
pub struct Installer {
    client: Client,
    profile: ProductProfile,
    download_directory: PathBuf,
    exit_timeout: Duration,
    ui: UiHandle,
}

impl Installer {
    pub fn new(
        client: Client,
        profile: ProductProfile,
        download_directory: PathBuf,
        exit_timeout: Duration,
        ui: UiHandle,
    ) -> Self {
        Self {
            client,
            profile,
            download_directory,
            exit_timeout,
            ui,
        }
    }

    pub fn installer_path(&self, release: &ReleaseInfo) -> PathBuf {
        self.profile
            .installer_path(&self.download_directory, &release.version)
    }

    #[tracing::instrument(skip_all, fields(version = %release.version))]
    pub async fn install(&self, release: &ReleaseInfo) -> Result<InstallOutcome, UpdaterError> {
        let destination = self.installer_path(release);
        tokio::fs::create_dir_all(&self.download_directory).await?;

        tracing::info!(
            "Downloading {} to {}",
            release.download_url,
            destination.display()
        );

        let summary = download_to(&self.client, &release.download_url, &destination, &self.ui).await;
        self.ui.download_finished();
        let summary = summary?;

        tracing::info!(
            "Downloaded {} bytes, sha256 {}",
            summary.bytes_written,
            summary.sha256
        );

        let report = self.close_running_instances().await?;
        self.warn_about_survivors(&report);

        launch_installer(&destination).map_err(UpdaterError::Launch)?;

        Ok(InstallOutcome {
            installer_path: destination,
            bytes_written: summary.bytes_written,
            sha256: summary.sha256,
            leftover_processes: report.survivors,
        })
    }

    async fn close_running_instances(&self) -> Result<TerminationReport, UpdaterError> {
        let executable = self.profile.executable.clone();
        let timeout = self.exit_timeout;

        let report =
            tokio::task::spawn_blocking(move || terminate_running(&executable, timeout)).await?;

        Ok(report)
    }

    /// Instances that outlived the exit timeout do not stop the update; the
    /// user is told and the installer deals with them.
    fn warn_about_survivors(&self, report: &TerminationReport) {
        if report.survivors == 0 {
            return;
        }

        tracing::warn!(
            "{} of {} running instances did not exit",
            report.survivors,
            report.found
        );
        self.ui.show_info(
            "Update",
            format!(
                "{} could not be closed. The installer may ask you to close it.",
                self.profile.name
            ),
        );
    }

    pub fn download_directory(&self) -> &Path {
        &self.download_directory
    }
}

impl InstallBackend for Installer {
    async fn download_and_install(&self, release: &ReleaseInfo) -> bool {
        match self.install(release).await {
            Ok(outcome) => {
                tracing::info!(
                    "Installer {} started ({} instances left running)",
                    outcome.installer_path.display(),
                    outcome.leftover_processes
                );
                true
            }
            Err(err) => {
                tracing::error!("Failed to install {}: {}", release.version, err);
                self.ui
                    .show_error(format!("Error downloading update: {}", err));
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{local_client, serve_file};
    use super::*;
    use crate::product::test_profile;
    use crate::ui::UiEvent;
    use crate::version::ProductVersion;

    fn installer(directory: &Path, ui: UiHandle) -> Installer {
        Installer::new(
            local_client(),
            test_profile(),
            directory.to_path_buf(),
            Duration::from_millis(10),
            ui,
        )
    }

    fn release(url: reqwest::Url) -> ReleaseInfo {
        ReleaseInfo {
            version: ProductVersion::new(4, 6, 5),
            download_url: url,
            filename: "qbittorrent_4.6.5_x64_setup.exe".to_owned(),
        }
    }

    #[test]
    fn destination_is_derived_from_version() {
        let (ui, _events) = UiHandle::channel();
        let installer = installer(Path::new("downloads"), ui);
        let release = release(reqwest::Url::parse("https://x/y").unwrap());

        assert_eq!(
            installer.installer_path(&release),
            Path::new("downloads").join("qbittorrent_4.6.5_x64_setup.exe")
        );
    }

    // Linux has no shell association for .exe files, so the launch step is
    // expected to fail there after a complete download.
    #[cfg(all(unix, not(target_os = "macos")))]
    #[tokio::test]
    async fn failed_launch_keeps_download_and_reports_error() {
        let body = b"MZ fake installer".to_vec();
        let url = serve_file(body.clone(), true).await;
        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("Downloads");

        let (ui, mut events) = UiHandle::channel();
        let installer = installer(&downloads, ui);
        let release = release(url);

        assert!(!installer.download_and_install(&release).await);

        let destination = downloads.join("qbittorrent_4.6.5_x64_setup.exe");
        assert_eq!(std::fs::read(&destination).unwrap(), body);

        let mut saw_finished = false;
        let mut error = None;
        while let Ok(event) = events.try_recv() {
            match event {
                UiEvent::DownloadFinished => saw_finished = true,
                UiEvent::Error { message } => error = Some(message),
                _ => {}
            }
        }

        assert!(saw_finished);
        assert!(error.unwrap().starts_with("Error downloading update"));
    }

    #[test]
    fn surviving_instances_only_produce_a_warning() {
        let (ui, mut events) = UiHandle::channel();
        let installer = installer(Path::new("downloads"), ui);

        installer.warn_about_survivors(&TerminationReport {
            found: 2,
            survivors: 0,
        });
        assert!(events.try_recv().is_err());

        installer.warn_about_survivors(&TerminationReport {
            found: 2,
            survivors: 1,
        });
        match events.try_recv() {
            Ok(UiEvent::Info { title, message }) => {
                assert_eq!(title, "Update");
                assert!(message.starts_with("qBittorrent could not be closed"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unreachable_server_is_reported() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let url = reqwest::Url::parse(&format!(
            "http://{}/setup.exe",
            listener.local_addr().unwrap()
        ))
        .unwrap();
        drop(listener);

        let dir = tempfile::tempdir().unwrap();
        let (ui, mut events) = UiHandle::channel();
        let installer = installer(dir.path(), ui);

        assert!(!installer.download_and_install(&release(url)).await);

        let mut saw_error = false;
        while let Ok(event) = events.try_recv() {
            if let UiEvent::Error { message } = event {
                saw_error = message.starts_with("Error downloading update");
            }
        }
        assert!(saw_error);
    }
}
