use std::io;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};
use sysinfo::{Pid, ProcessesToUpdate, System};

const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TerminationReport {
    pub found: usize,
    /// Processes still alive when the timeout ran out.
    pub survivors: usize,
}

/// Whether a listed process name refers to `process_name`, ignoring case and
/// an `.exe` suffix on either side.
pub fn matches_process_name(listed: &str, process_name: &str) -> bool {
    fn stem(name: &str) -> &str {
        let split = name.len().saturating_sub(4);
        match name.get(split..) {
            Some(ext) if split > 0 && ext.eq_ignore_ascii_case(".exe") => &name[..split],
            _ => name,
        }
    }

    stem(listed).eq_ignore_ascii_case(stem(process_name))
}

/// Kill every running process named `process_name` and wait up to `timeout`
/// for all of them to exit. Blocking.
pub fn terminate_running(process_name: &str, timeout: Duration) -> TerminationReport {
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::All, true);

    let targets = system
        .processes()
        .iter()
        .filter(|(_, process)| {
            matches_process_name(&process.name().to_string_lossy(), process_name)
        })
        .map(|(pid, _)| *pid)
        .collect::<Vec<Pid>>();

    if targets.is_empty() {
        tracing::debug!("No running '{}' process", process_name);
        return TerminationReport::default();
    }

    for pid in &targets {
        let Some(process) = system.process(*pid) else {
            continue;
        };

        tracing::info!("Terminating running {} (pid {})", process_name, pid);
        if !process.kill() {
            tracing::warn!("Failed to signal pid {}", pid);
        }
    }

    let deadline = Instant::now() + timeout;
    loop {
        system.refresh_processes(ProcessesToUpdate::Some(&targets), true);

        let survivors = targets
            .iter()
            .filter(|pid| system.process(**pid).is_some())
            .count();

        if survivors == 0 || Instant::now() >= deadline {
            return TerminationReport {
                found: targets.len(),
                survivors,
            };
        }

        std::thread::sleep(EXIT_POLL_INTERVAL);
    }
}

/// Start the installer as an independent process through the OS shell.
/// Does not wait for it.
pub fn launch_installer(path: &Path) -> io::Result<()> {
    let mut command = shell_command(path);
    command
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());

    let child = command.spawn()?;
    tracing::info!("Started installer {} (pid {})", path.display(), child.id());

    Ok(())
}

#[cfg(windows)]
fn shell_command(path: &Path) -> Command {
    use std::os::windows::process::CommandExt;

    let mut command = Command::new("cmd");
    command.arg("/C").arg("start").arg("").arg(path);
    command.creation_flags(CREATE_NO_WINDOW);
    command
}

#[cfg(target_os = "macos")]
fn shell_command(path: &Path) -> Command {
    let mut command = Command::new("open");
    command.arg(path);
    command
}

#[cfg(not(any(windows, target_os = "macos")))]
fn shell_command(path: &Path) -> Command {
    Command::new(path)
}
