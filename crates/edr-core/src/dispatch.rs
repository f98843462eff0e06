//! Saving, printing and opening rendered reports.
//!
//! Printing stages the artifact in a temp directory and walks the platform's
//! mechanisms in order until one reports success. The staged copy is removed
//! whatever the outcome.

use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use tokio::{fs, process::Command};

use crate::{
    config::{OutputConfig, PrintConfig},
    error::PrintError,
    render::RenderedArtifact,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Windows,
    MacOs,
    Linux,
    Other,
}

impl Platform {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "windows" => Platform::Windows,
            "macos" => Platform::MacOs,
            "linux" => Platform::Linux,
            _ => Platform::Other,
        }
    }

    /// Print mechanisms to try, most preferred first
    pub fn print_mechanisms(self) -> &'static [PrintMechanism] {
        match self {
            Platform::Windows => &[
                PrintMechanism::StartPrintVerb,
                PrintMechanism::PowerShellPrintVerb,
                PrintMechanism::PrintCommand,
            ],
            Platform::MacOs => &[PrintMechanism::Lp, PrintMechanism::Lpr],
            Platform::Linux => &[
                PrintMechanism::Lp,
                PrintMechanism::Lpr,
                PrintMechanism::XdgOpen,
            ],
            Platform::Other => &[],
        }
    }

    /// Command that opens `path` in the system viewer.
    pub fn viewer_command(self, path: &Path) -> Option<CommandSpec> {
        match self {
            Platform::Windows => Some(CommandSpec::new(
                "cmd",
                [
                    OsString::from("/c"),
                    OsString::from("start"),
                    OsString::from(""),
                    path.as_os_str().to_owned(),
                ],
            )),
            Platform::MacOs => Some(CommandSpec::new("open", [path.as_os_str().to_owned()])),
            Platform::Linux => Some(CommandSpec::new("xdg-open", [path.as_os_str().to_owned()])),
            Platform::Other => None,
        }
    }
}

/// One way of handing a file to the operating system's print subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintMechanism {
    /// `cmd /c start /wait /min "" /print <file>`
    StartPrintVerb,
    /// `Start-Process -Verb Print` through a hidden PowerShell
    PowerShellPrintVerb,
    /// The legacy `print` command
    PrintCommand,
    Lp,
    Lpr,
    /// Hand the file to the desktop's default handler
    XdgOpen,
}

impl PrintMechanism {
    pub fn name(self) -> &'static str {
        match self {
            PrintMechanism::StartPrintVerb => "start /print",
            PrintMechanism::PowerShellPrintVerb => "powershell print verb",
            PrintMechanism::PrintCommand => "print",
            PrintMechanism::Lp => "lp",
            PrintMechanism::Lpr => "lpr",
            PrintMechanism::XdgOpen => "xdg-open",
        }
    }

    pub fn command(self, path: &Path) -> CommandSpec {
        let file = path.as_os_str().to_owned();
        match self {
            PrintMechanism::StartPrintVerb => CommandSpec::new(
                "cmd",
                ["/c", "start", "/wait", "/min", "", "/print"]
                    .map(OsString::from)
                    .into_iter()
                    .chain([file]),
            ),
            PrintMechanism::PowerShellPrintVerb => CommandSpec::new(
                "powershell.exe",
                [
                    OsString::from("-WindowStyle"),
                    OsString::from("Hidden"),
                    OsString::from("-Command"),
                    OsString::from(format!(
                        "Start-Process -FilePath \"{}\" -Verb Print -WindowStyle Hidden -Wait",
                        path.display()
                    )),
                ],
            ),
            PrintMechanism::PrintCommand => CommandSpec::new("print", [file]),
            PrintMechanism::Lp => CommandSpec::new("lp", [file]),
            PrintMechanism::Lpr => CommandSpec::new("lpr", [file]),
            PrintMechanism::XdgOpen => CommandSpec::new("xdg-open", [file]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: &'static str,
    pub args: Vec<OsString>,
}

impl CommandSpec {
    pub fn new(program: &'static str, args: impl IntoIterator<Item = OsString>) -> Self {
        Self {
            program,
            args: args.into_iter().collect(),
        }
    }
}

/// Runs external commands. A non-zero exit, a spawn failure and a timeout are
/// all reported as `Err` with a human-readable reason.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommandRunner;

#[async_trait]
impl CommandRunner for SystemCommandRunner {
    async fn run(&self, command: &CommandSpec, timeout: Duration) -> Result<(), String> {
        let child = Command::new(command.program)
            .args(&command.args)
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(timeout, child).await {
            Err(_) => return Err(format!("timed out after {}s", timeout.as_secs())),
            Ok(Err(e)) => return Err(format!("could not run {}: {e}", command.program)),
            Ok(Ok(output)) => output,
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            Err(format!("{} ({})", output.status, stderr.trim()))
        }
    }
}

/// Where a print job went through a single mechanism.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintAttempt {
    pub mechanism: &'static str,
    pub outcome: Result<(), String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintReceipt {
    pub mechanism: &'static str,
    pub attempts: Vec<PrintAttempt>,
}

pub struct Dispatcher<R> {
    runner: R,
    platform: Platform,
    output_dir: PathBuf,
    print: PrintConfig,
}

impl<R: CommandRunner> Dispatcher<R> {
    pub fn new(runner: R, platform: Platform, output: &OutputConfig, print: &PrintConfig) -> Self {
        Self {
            runner,
            platform,
            output_dir: output.directory.clone(),
            print: print.clone(),
        }
    }

    /// Write `artifact` to `path`, or to a timestamped file in the output
    /// directory when no path is given.
    pub async fn save(
        &self,
        artifact: &RenderedArtifact,
        path: Option<&Path>,
    ) -> std::io::Result<PathBuf> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => self.output_dir.join(artifact.default_file_name()),
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, artifact.bytes()).await?;
        tracing::info!(path = %path.display(), bytes = artifact.bytes().len(), "Report saved");
        Ok(path)
    }

    /// Send `artifact` to the default printer.
    ///
    /// Returns the mechanism that accepted the job. The staged temp file is
    /// gone by the time this returns, on success and on failure.
    pub async fn print(&self, artifact: &RenderedArtifact) -> Result<PrintReceipt, PrintError> {
        let staging_dir = self.print.staging_dir();
        fs::create_dir_all(&staging_dir).await?;
        let staged = staging_dir.join(format!("temp_{}", artifact.default_file_name()));
        fs::write(&staged, artifact.bytes()).await?;
        tracing::debug!(path = %staged.display(), "Staged report for printing");

        let result = self.dispatch(&staged).await;

        if let Ok(receipt) = &result {
            tracing::info!(mechanism = receipt.mechanism, "Print job dispatched");
            tokio::time::sleep(self.print.settle_delay()).await;
        }
        if let Err(e) = fs::remove_file(&staged).await {
            tracing::warn!(path = %staged.display(), error = %e, "Could not remove staged report");
        }

        result.map_err(|attempts| PrintError::AllMechanismsFailed {
            attempted: attempts.iter().map(|a| a.mechanism).collect(),
            staged_at: staged,
        })
    }

    async fn dispatch(&self, staged: &Path) -> Result<PrintReceipt, Vec<PrintAttempt>> {
        let timeout = self.print.command_timeout();
        let mechanisms = self.platform.print_mechanisms();
        let mut attempts = Vec::with_capacity(mechanisms.len());

        for mechanism in mechanisms {
            tracing::debug!(mechanism = mechanism.name(), "Trying print mechanism");
            let outcome = self.runner.run(&mechanism.command(staged), timeout).await;
            let succeeded = outcome.is_ok();
            if let Err(reason) = &outcome {
                tracing::warn!(mechanism = mechanism.name(), %reason, "Print mechanism failed");
            }
            attempts.push(PrintAttempt {
                mechanism: mechanism.name(),
                outcome,
            });
            if succeeded {
                return Ok(PrintReceipt {
                    mechanism: mechanism.name(),
                    attempts,
                });
            }
        }

        if attempts.is_empty() {
            tracing::warn!(platform = ?self.platform, "No print mechanism available");
        }
        Err(attempts)
    }

    /// Open a saved report in the system viewer.
    pub async fn open(&self, path: &Path) -> Result<(), String> {
        let command = self
            .platform
            .viewer_command(path)
            .ok_or_else(|| format!("no viewer available on {:?}", self.platform))?;
        self.runner
            .run(&command, self.print.command_timeout())
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::ArtifactKind;
    use chrono::NaiveDate;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;

    /// Succeeds for the listed programs, fails for everything else.
    #[derive(Clone, Default)]
    struct FakeRunner {
        accept: Vec<&'static str>,
        seen: Arc<Mutex<Vec<(CommandSpec, bool)>>>,
    }

    impl FakeRunner {
        fn accepting(programs: &[&'static str]) -> Self {
            Self {
                accept: programs.to_vec(),
                ..Self::default()
            }
        }

        fn programs(&self) -> Vec<&'static str> {
            self.seen.lock().iter().map(|(c, _)| c.program).collect()
        }
    }

    #[async_trait]
    impl CommandRunner for FakeRunner {
        async fn run(&self, command: &CommandSpec, _timeout: Duration) -> Result<(), String> {
            let file_present = command
                .args
                .last()
                .map(|arg| Path::new(arg).exists())
                .unwrap_or(false);
            self.seen.lock().push((command.clone(), file_present));
            if self.accept.contains(&command.program) {
                Ok(())
            } else {
                Err("exit status: 1".to_string())
            }
        }
    }

    fn artifact() -> RenderedArtifact {
        let at = NaiveDate::from_ymd_opt(2025, 7, 22)
            .unwrap()
            .and_hms_opt(8, 15, 0)
            .unwrap();
        RenderedArtifact::new(
            ArtifactKind::Html,
            b"<html></html>".to_vec(),
            vec!["606034".into()],
            at,
        )
    }

    fn dispatcher(runner: FakeRunner, platform: Platform, dir: &TempDir) -> Dispatcher<FakeRunner> {
        settling_dispatcher(runner, platform, dir, 0)
    }

    fn settling_dispatcher(
        runner: FakeRunner,
        platform: Platform,
        dir: &TempDir,
        settle_delay_secs: u64,
    ) -> Dispatcher<FakeRunner> {
        let output = OutputConfig {
            directory: dir.path().join("out"),
        };
        let print = PrintConfig {
            settle_delay_secs,
            command_timeout_secs: 1,
            temp_dir: Some(dir.path().join("staging")),
        };
        Dispatcher::new(runner, platform, &output, &print)
    }

    fn staging_is_empty(dir: &TempDir) -> bool {
        std::fs::read_dir(dir.path().join("staging"))
            .unwrap()
            .next()
            .is_none()
    }

    #[tokio::test]
    async fn save_uses_timestamped_name_in_output_dir() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(FakeRunner::default(), Platform::Linux, &dir);

        let path = dispatcher.save(&artifact(), None).await.unwrap();
        assert_eq!(
            path,
            dir.path()
                .join("out")
                .join("edr_report_606034_20250722_081500.html")
        );
        assert_eq!(std::fs::read(&path).unwrap(), b"<html></html>");
    }

    #[tokio::test]
    async fn save_honours_explicit_path() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(FakeRunner::default(), Platform::Linux, &dir);
        let target = dir.path().join("nested").join("report.html");

        let path = dispatcher.save(&artifact(), Some(&target)).await.unwrap();
        assert_eq!(path, target);
        assert!(target.exists());
    }

    #[tokio::test]
    async fn first_successful_mechanism_wins() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::accepting(&["lpr"]);
        let dispatcher = dispatcher(runner.clone(), Platform::Linux, &dir);

        let receipt = dispatcher.print(&artifact()).await.unwrap();
        assert_eq!(receipt.mechanism, "lpr");
        assert_eq!(receipt.attempts.len(), 2);
        assert!(receipt.attempts[0].outcome.is_err());
        assert_eq!(runner.programs(), vec!["lp", "lpr"]);

        // The file existed while the mechanisms ran and is gone afterwards
        assert!(runner.seen.lock().iter().all(|(_, present)| *present));
        assert!(staging_is_empty(&dir));
    }

    #[tokio::test(start_paused = true)]
    async fn staged_file_outlives_the_settle_delay() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::accepting(&["lp"]);
        let dispatcher = settling_dispatcher(runner.clone(), Platform::Linux, &dir, 5);
        let staged = dir
            .path()
            .join("staging")
            .join("temp_edr_report_606034_20250722_081500.html");
        let started = tokio::time::Instant::now();

        let watch = async {
            while runner.programs().is_empty() {
                tokio::task::yield_now().await;
            }
            tokio::time::sleep(Duration::from_secs(1)).await;
            // lp accepted the job a second ago; the file must still be there
            assert!(staged.exists());
        };
        let artifact = artifact();
        let (receipt, ()) = tokio::join!(dispatcher.print(&artifact), watch);

        assert_eq!(receipt.unwrap().mechanism, "lp");
        assert!(started.elapsed() >= Duration::from_secs(5));
        assert!(!staged.exists());
        assert!(staging_is_empty(&dir));
    }

    #[tokio::test]
    async fn failed_print_skips_the_settle_delay() {
        let dir = TempDir::new().unwrap();
        let dispatcher = settling_dispatcher(FakeRunner::default(), Platform::Linux, &dir, 3600);

        let result = tokio::time::timeout(Duration::from_secs(5), dispatcher.print(&artifact())).await;
        assert!(matches!(result, Ok(Err(PrintError::AllMechanismsFailed { .. }))));
        assert!(staging_is_empty(&dir));
    }

    #[tokio::test]
    async fn exhausted_mechanisms_leave_no_temp_file() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::default();
        let dispatcher = dispatcher(runner.clone(), Platform::Linux, &dir);

        let err = dispatcher.print(&artifact()).await.unwrap_err();
        match err {
            PrintError::AllMechanismsFailed {
                attempted,
                staged_at,
            } => {
                assert_eq!(attempted, vec!["lp", "lpr", "xdg-open"]);
                assert!(!staged_at.exists());
            }
            other => panic!("unexpected {other:?}"),
        }
        assert!(staging_is_empty(&dir));
    }

    #[tokio::test]
    async fn unsupported_platform_fails_without_running_anything() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::accepting(&["lp"]);
        let dispatcher = dispatcher(runner.clone(), Platform::Other, &dir);

        let err = dispatcher.print(&artifact()).await.unwrap_err();
        assert!(err.to_string().contains("none available"));
        assert!(runner.programs().is_empty());
        assert!(staging_is_empty(&dir));
    }

    #[test]
    fn windows_mechanisms_in_order() {
        let path = Path::new("C:\\tmp\\r.pdf");
        let names: Vec<_> = Platform::Windows
            .print_mechanisms()
            .iter()
            .map(|m| m.name())
            .collect();
        assert_eq!(names, vec!["start /print", "powershell print verb", "print"]);

        let start = PrintMechanism::StartPrintVerb.command(path);
        assert_eq!(start.program, "cmd");
        assert_eq!(start.args.len(), 7);
        assert_eq!(start.args[5], OsString::from("/print"));

        let ps = PrintMechanism::PowerShellPrintVerb.command(path);
        assert!(ps.args[3].to_string_lossy().contains("-Verb Print"));
    }

    #[test]
    fn mac_has_no_desktop_fallback() {
        assert_eq!(
            Platform::MacOs.print_mechanisms(),
            &[PrintMechanism::Lp, PrintMechanism::Lpr]
        );
    }

    #[tokio::test]
    async fn open_uses_platform_viewer() {
        let dir = TempDir::new().unwrap();
        let runner = FakeRunner::accepting(&["xdg-open"]);
        let dispatcher = dispatcher(runner.clone(), Platform::Linux, &dir);

        dispatcher.open(Path::new("report.pdf")).await.unwrap();
        assert_eq!(runner.programs(), vec!["xdg-open"]);
    }
}
