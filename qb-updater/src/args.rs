use clap::Parser;
use reqwest::Url;
use std::path::PathBuf;

const MAX_INTERVAL_HOURS: u64 = 24 * 366;

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Keeps a single installed application up to date")]
pub struct UpdaterArgs {
    /// Human readable product name, also matched against uninstall entries.
    #[arg(long, default_value = "qBittorrent", env = "QB_UPDATER_PRODUCT")]
    pub product: String,

    #[arg(long, default_value = "qbittorrent.exe", env = "QB_UPDATER_EXECUTABLE")]
    pub executable: String,

    /// Directory name below "Program Files" the product installs into.
    #[arg(long, default_value = "qBittorrent")]
    pub install_dir_name: String,

    /// Vendor key below HKLM/HKCU\SOFTWARE holding a "Version" value.
    #[arg(long, default_value = "qBittorrent")]
    pub registry_key: String,

    #[arg(long, default_value = "qbittorrent")]
    pub installer_prefix: String,

    #[arg(long, default_value = "x64")]
    pub arch: String,

    #[arg(
        long,
        default_value = "https://sourceforge.net/projects/qbittorrent/best_release.json",
        env = "QB_UPDATER_FEED_URL"
    )]
    pub feed_url: Url,

    #[arg(long, default_value = "windows")]
    pub feed_platform: String,

    /// Where installers are downloaded to. Defaults to the user's Downloads folder.
    #[arg(short, long, env = "QB_UPDATER_DOWNLOAD_DIRECTORY")]
    pub download_directory: Option<PathBuf>,

    /// How long to wait for a running instance to exit after terminating it.
    #[arg(long, default_value = "10")]
    pub exit_timeout_secs: u64,

    /// Answer "yes" to the install confirmation without prompting.
    #[arg(short = 'y', long, default_value_t = false)]
    pub assume_yes: bool,

    /// Run a single check cycle and exit.
    #[arg(long, default_value_t = false)]
    pub once: bool,

    /// Additionally check periodically, every this many hours (at most a year).
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_INTERVAL_HOURS))]
    pub interval_hours: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(extra: &[&str]) -> Result<UpdaterArgs, clap::Error> {
        UpdaterArgs::try_parse_from(std::iter::once("qb-updater").chain(extra.iter().copied()))
    }

    #[test]
    fn defaults_track_qbittorrent() {
        let args = parse(&[]).unwrap();

        assert_eq!(args.product, "qBittorrent");
        assert_eq!(args.executable, "qbittorrent.exe");
        assert_eq!(args.exit_timeout_secs, 10);
        assert_eq!(args.interval_hours, None);
        assert!(!args.once);
    }

    #[test]
    fn interval_must_be_a_sane_number_of_hours() {
        assert_eq!(parse(&["--interval-hours", "24"]).unwrap().interval_hours, Some(24));
        assert_eq!(
            parse(&["--interval-hours", "8784"]).unwrap().interval_hours,
            Some(MAX_INTERVAL_HOURS)
        );

        assert!(parse(&["--interval-hours", "0"]).is_err());
        assert!(parse(&["--interval-hours", "8785"]).is_err());
        assert!(parse(&["--interval-hours", "5124095576030432"]).is_err());
    }
}
