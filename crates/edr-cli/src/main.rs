mod logging;

use std::{io::Write, path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand, ValueEnum};
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};

use edr_core::{
    ArtifactKind, BatchMode, BatchObserver, BatchOptions, BatchRunner, BrowseQuery, Credential,
    Dispatcher, EdrConfig, EventOutcome, HtmlRenderer, LoginObserver, LoginStage, PdfRenderer,
    Platform, ReportFetcher, ReqwestHttpClient, Session, SystemClock, SystemCommandRunner,
    config::AUTH_TOKEN_ENV, format_browse_table, format_status_parts, format_summary,
};

#[derive(Clone, Copy, Default, ValueEnum)]
enum CliMode {
    /// One report per event
    #[default]
    PerEvent,
    /// One PDF covering every event
    Consolidated,
}

impl From<CliMode> for BatchMode {
    fn from(cli: CliMode) -> Self {
        match cli {
            CliMode::PerEvent => BatchMode::PerEvent,
            CliMode::Consolidated => BatchMode::Consolidated,
        }
    }
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum CliFormat {
    #[default]
    Html,
    Pdf,
}

impl From<CliFormat> for ArtifactKind {
    fn from(cli: CliFormat) -> Self {
        match cli {
            CliFormat::Html => ArtifactKind::Html,
            CliFormat::Pdf => ArtifactKind::Pdf,
        }
    }
}

#[derive(Parser)]
#[command(name = "edr-printer")]
#[command(about = "Log in to the event portal, fetch Event Detail Reports and print them")]
#[command(args_conflicts_with_subcommands = true)]
struct Cli {
    /// Event ids to process. Defaults to `default_event_ids` from the config.
    event_ids: Vec<String>,

    /// Use an existing bearer token instead of logging in
    #[arg(long, env = AUTH_TOKEN_ENV, hide_env_values = true, global = true)]
    token: Option<String>,

    /// Config file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Batch mode
    #[arg(short, long, value_enum, default_value = "per-event")]
    mode: CliMode,

    /// Report format in per-event mode. Consolidated reports are always PDF.
    #[arg(short, long, value_enum, default_value = "html")]
    format: CliFormat,

    /// Don't keep a copy of the reports
    #[arg(long)]
    no_save: bool,

    /// Don't send the reports to the printer
    #[arg(long)]
    no_print: bool,

    /// Open the consolidated report once it is saved
    #[arg(long)]
    open: bool,

    /// Directory for saved reports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Show debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// List events in a date window
    Browse {
        /// First day, YYYY-MM-DD (default: first of this month)
        #[arg(long, requires = "end")]
        start: Option<NaiveDate>,

        /// Last day, YYYY-MM-DD (default: today)
        #[arg(long, requires = "start")]
        end: Option<NaiveDate>,

        /// Store number (default: from config)
        #[arg(long)]
        store: Option<String>,

        /// Event type codes, comma separated (default: all known types)
        #[arg(long, value_delimiter = ',')]
        types: Option<Vec<u32>>,
    },
}

fn create_spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// Shows the login steps on a single spinner line.
struct LoginProgress {
    spinner: ProgressBar,
}

impl LoginObserver for LoginProgress {
    fn stage_started(&mut self, stage: LoginStage) {
        self.spinner.set_message(format!(
            "[{}/{}] {}...",
            stage.step(),
            LoginStage::SEQUENCE.len(),
            stage.description()
        ));
    }

    fn stage_skipped(&mut self, stage: LoginStage, reason: &str) {
        self.spinner.println(format!(
            "{} {} skipped: {}",
            style("!").yellow().bold(),
            stage.description(),
            style(reason).dim()
        ));
    }
}

/// One spinner per event, replaced by a result line when the event is done.
#[derive(Default)]
struct BatchProgress {
    spinner: Option<ProgressBar>,
}

impl BatchProgress {
    fn replace_spinner(&mut self, msg: &str) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
        self.spinner = Some(create_spinner(msg));
    }
}

impl BatchObserver for BatchProgress {
    fn event_started(&mut self, index: usize, total: usize, event_id: &str) {
        self.replace_spinner(&format!("[{}/{}] Event {}...", index + 1, total, event_id));
    }

    fn event_finished(&mut self, outcome: &EventOutcome) {
        if let Some(pb) = self.spinner.take() {
            pb.finish_and_clear();
        }
        match &outcome.failure {
            None => println!(
                "{} Event {}: {}",
                style("✓").green().bold(),
                outcome.event_id,
                style(format_status_parts(outcome)).dim()
            ),
            Some(failure) => println!(
                "{} Event {}: {}",
                style("✗").red().bold(),
                outcome.event_id,
                failure
            ),
        }
    }

    fn consolidating(&mut self, events: usize) {
        self.replace_spinner(&format!("Building consolidated report ({events} events)..."));
    }
}

fn read_code(spinner: &ProgressBar) -> std::io::Result<String> {
    spinner.suspend(|| {
        print!("{} ", style("Enter the one-time code:").cyan().bold());
        std::io::stdout().flush()?;
        Term::stdout().read_line()
    })
}

async fn open_session(cli: &Cli, config: &EdrConfig) -> Result<Option<Session<ReqwestHttpClient>>> {
    let client = ReqwestHttpClient::new(&config.portal).context("Could not build HTTP client")?;

    if let Some(token) = cli.token.as_deref().filter(|t| !t.is_empty()) {
        let credential = Credential::new(token);
        println!(
            "{} Using supplied token {}",
            style("✓").green().bold(),
            style(credential.preview()).dim()
        );
        return Ok(Some(Session::with_credential(
            client,
            config.portal.clone(),
            credential,
        )));
    }

    let account = config.account.login_credentials()?;
    let mut session = Session::new(client, config.portal.clone());

    let spinner = create_spinner("Logging in...");
    let prompt = || read_code(&spinner);
    let mut progress = LoginProgress {
        spinner: spinner.clone(),
    };

    let login = session
        .login(&account, &prompt, &mut progress)
        .await
        .map(Credential::preview);
    match login {
        Ok(preview) => {
            spinner.finish_with_message(format!(
                "{} Logged in {}",
                style("✓").green().bold(),
                style(format!("(token {preview})")).dim()
            ));
            Ok(Some(session))
        }
        Err(e) => {
            spinner.finish_and_clear();
            eprintln!("{} {}", style("Login failed:").red().bold(), e);
            Ok(None)
        }
    }
}

async fn browse(
    session: &Session<ReqwestHttpClient>,
    config: &EdrConfig,
    query: BrowseQuery,
) -> Result<ExitCode> {
    let query = query.resolve(chrono::Local::now().date_naive(), &config.browse)?;
    let spinner = create_spinner(&format!(
        "Browsing events {} to {} for store {}...",
        query.start, query.end, query.store_number
    ));

    match ReportFetcher::new(session).browse_events(&query).await {
        Ok(events) => {
            spinner.finish_and_clear();
            println!("{}", format_browse_table(&events));
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            spinner.finish_and_clear();
            eprintln!("{} {}", style("Browse failed:").red().bold(), e);
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn print_reports(
    cli: &Cli,
    session: &Session<ReqwestHttpClient>,
    config: &EdrConfig,
) -> Result<ExitCode> {
    let event_ids = if cli.event_ids.is_empty() {
        config.default_event_ids.clone()
    } else {
        cli.event_ids.clone()
    };
    if event_ids.is_empty() {
        eprintln!(
            "{} no event ids given and none configured",
            style("Error:").red().bold()
        );
        return Ok(ExitCode::FAILURE);
    }

    let options = BatchOptions {
        mode: cli.mode.into(),
        format: cli.format.into(),
        save: !cli.no_save,
        print: !cli.no_print,
        open: cli.open,
    };

    let dispatcher = Dispatcher::new(
        SystemCommandRunner,
        Platform::current(),
        &config.output,
        &config.print,
    );
    let markup = HtmlRenderer::new(SystemClock);
    let paginated = PdfRenderer::new(SystemClock);
    let runner = BatchRunner::new(session, &dispatcher, &markup, &paginated);

    let mut progress = BatchProgress::default();
    let report = runner.run(&event_ids, &options, &mut progress).await;

    println!("\n{}", style("PROCESSING SUMMARY").cyan().bold());
    println!("{}", format_summary(&report));

    Ok(if report.all_succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let mut config = EdrConfig::load(cli.config.as_deref())?;
    if let Some(dir) = &cli.output_dir {
        config.output.directory = dir.clone();
    }
    tracing::debug!(output = %config.output.directory.display(), "Configuration loaded");

    println!(
        "\n{}  {}\n",
        style("edr-printer").cyan().bold(),
        style("Event Detail Reports").dim()
    );

    let Some(session) = open_session(&cli, &config).await? else {
        return Ok(ExitCode::FAILURE);
    };

    match &cli.command {
        Some(Command::Browse {
            start,
            end,
            store,
            types,
        }) => {
            let query = BrowseQuery {
                start: *start,
                end: *end,
                store_number: store.clone(),
                event_types: types.clone(),
            };
            browse(&session, &config, query).await
        }
        None => print_reports(&cli, &session, &config).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        logging::init_test();
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_to_per_event_html_with_save_and_print() {
        let cli = Cli::try_parse_from(["edr-printer", "606034", "606035"]).unwrap();
        assert_eq!(cli.event_ids, vec!["606034", "606035"]);
        assert!(matches!(cli.mode, CliMode::PerEvent));
        assert!(matches!(cli.format, CliFormat::Html));
        assert!(!cli.no_save && !cli.no_print && !cli.open);
        assert!(cli.command.is_none());
    }

    #[test]
    fn consolidated_flags() {
        let cli = Cli::try_parse_from([
            "edr-printer",
            "--mode",
            "consolidated",
            "--no-print",
            "--open",
            "1",
        ])
        .unwrap();
        assert!(matches!(BatchMode::from(cli.mode), BatchMode::Consolidated));
        assert!(cli.no_print);
        assert!(cli.open);
    }

    #[test]
    fn browse_subcommand_parses_dates_and_types() {
        let cli = Cli::try_parse_from([
            "edr-printer",
            "browse",
            "--start",
            "2025-07-01",
            "--end",
            "2025-07-15",
            "--types",
            "1,45",
        ])
        .unwrap();
        match cli.command {
            Some(Command::Browse { start, end, types, .. }) => {
                assert_eq!(start, NaiveDate::from_ymd_opt(2025, 7, 1));
                assert_eq!(end, NaiveDate::from_ymd_opt(2025, 7, 15));
                assert_eq!(types, Some(vec![1, 45]));
            }
            None => panic!("expected browse"),
        }
    }

    #[test]
    fn browse_bounds_come_in_pairs() {
        assert!(Cli::try_parse_from(["edr-printer", "browse", "--start", "2025-12-01"]).is_err());
        assert!(Cli::try_parse_from(["edr-printer", "browse", "--end", "2025-12-01"]).is_err());
    }

    #[test]
    fn event_ids_conflict_with_subcommand() {
        assert!(Cli::try_parse_from(["edr-printer", "browse", "--mode", "consolidated"]).is_err());
    }
}
