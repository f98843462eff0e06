use std::path::PathBuf;

use crate::{
    auth::Session,
    dispatch::{CommandRunner, Dispatcher, PrintReceipt},
    error::{EventFailure, PrintError},
    fetch::ReportFetcher,
    http::HttpClient,
    render::{ArtifactKind, Renderer},
    types::EventRecord,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// One artifact per event, saved and printed as it is produced
    #[default]
    PerEvent,
    /// Fetch everything first, keeping a markup copy of each event, then one
    /// paginated document for the lot
    Consolidated,
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub mode: BatchMode,
    /// Artifact format in per-event mode. Consolidated output is always paginated.
    pub format: ArtifactKind,
    pub save: bool,
    pub print: bool,
    /// Open the consolidated document in the system viewer once saved
    pub open: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            mode: BatchMode::PerEvent,
            format: ArtifactKind::Html,
            save: true,
            print: true,
            open: false,
        }
    }
}

#[derive(Debug)]
pub struct EventOutcome {
    pub event_id: String,
    pub saved_to: Option<PathBuf>,
    pub printed: bool,
    pub failure: Option<EventFailure>,
}

impl EventOutcome {
    fn new(event_id: &str) -> Self {
        Self {
            event_id: event_id.to_string(),
            saved_to: None,
            printed: false,
            failure: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.failure.is_none()
    }
}

#[derive(Debug)]
pub struct ConsolidatedOutcome {
    pub event_ids: Vec<String>,
    pub saved_to: Option<PathBuf>,
    /// `None` when printing was not requested
    pub print: Option<Result<PrintReceipt, PrintError>>,
    pub opened: Option<Result<(), String>>,
}

/// Per-event results in request order, plus the consolidated document if one
/// was produced.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub outcomes: Vec<EventOutcome>,
    pub consolidated: Option<ConsolidatedOutcome>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    pub fn successes(&self) -> impl Iterator<Item = &EventOutcome> {
        self.outcomes.iter().filter(|o| o.succeeded())
    }

    pub fn failures(&self) -> impl Iterator<Item = &EventOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(EventOutcome::succeeded)
    }
}

/// Progress callbacks for long batches. All methods default to no-ops.
pub trait BatchObserver {
    fn event_started(&mut self, _index: usize, _total: usize, _event_id: &str) {}
    fn event_finished(&mut self, _outcome: &EventOutcome) {}
    fn consolidating(&mut self, _events: usize) {}
}

impl BatchObserver for () {}

/// Processes a list of event ids one at a time. A failing event is recorded and
/// the batch moves on.
pub struct BatchRunner<'a, C, R> {
    fetcher: ReportFetcher<'a, C>,
    dispatcher: &'a Dispatcher<R>,
    markup: &'a dyn Renderer,
    paginated: &'a dyn Renderer,
}

impl<'a, C: HttpClient, R: CommandRunner> BatchRunner<'a, C, R> {
    pub fn new(
        session: &'a Session<C>,
        dispatcher: &'a Dispatcher<R>,
        markup: &'a dyn Renderer,
        paginated: &'a dyn Renderer,
    ) -> Self {
        Self {
            fetcher: ReportFetcher::new(session),
            dispatcher,
            markup,
            paginated,
        }
    }

    pub async fn run(
        &self,
        event_ids: &[String],
        options: &BatchOptions,
        observer: &mut dyn BatchObserver,
    ) -> BatchReport {
        tracing::info!(events = event_ids.len(), mode = ?options.mode, "Starting batch");
        let report = match options.mode {
            BatchMode::PerEvent => self.run_per_event(event_ids, options, observer).await,
            BatchMode::Consolidated => self.run_consolidated(event_ids, options, observer).await,
        };
        tracing::info!(
            total = report.total(),
            failed = report.failures().count(),
            "Batch finished"
        );
        report
    }

    async fn run_per_event(
        &self,
        event_ids: &[String],
        options: &BatchOptions,
        observer: &mut dyn BatchObserver,
    ) -> BatchReport {
        let mut report = BatchReport::default();

        for (index, event_id) in event_ids.iter().enumerate() {
            observer.event_started(index, event_ids.len(), event_id);
            let mut outcome = EventOutcome::new(event_id);
            if let Err(failure) = self.deliver(event_id, options, &mut outcome).await {
                tracing::warn!(event_id = %event_id, error = %failure, "Event failed");
                outcome.failure = Some(failure);
            }
            observer.event_finished(&outcome);
            report.outcomes.push(outcome);
        }

        report
    }

    async fn deliver(
        &self,
        event_id: &str,
        options: &BatchOptions,
        outcome: &mut EventOutcome,
    ) -> Result<(), EventFailure> {
        let record = self.fetcher.fetch(event_id).await?;
        let renderer = match options.format {
            ArtifactKind::Html => self.markup,
            ArtifactKind::Pdf => self.paginated,
        };
        let artifact = renderer.render(std::slice::from_ref(&record))?;

        if options.save {
            outcome.saved_to = Some(self.dispatcher.save(&artifact, None).await?);
        }
        if options.print {
            self.dispatcher.print(&artifact).await?;
            outcome.printed = true;
        }
        Ok(())
    }

    async fn run_consolidated(
        &self,
        event_ids: &[String],
        options: &BatchOptions,
        observer: &mut dyn BatchObserver,
    ) -> BatchReport {
        let mut report = BatchReport::default();
        let mut records = Vec::new();

        for (index, event_id) in event_ids.iter().enumerate() {
            observer.event_started(index, event_ids.len(), event_id);
            let mut outcome = EventOutcome::new(event_id);
            match self.collect(event_id, options, &mut outcome).await {
                Ok(record) => records.push(record),
                Err(failure) => {
                    tracing::warn!(event_id = %event_id, error = %failure, "Event failed");
                    outcome.failure = Some(failure);
                    observer.event_finished(&outcome);
                }
            }
            report.outcomes.push(outcome);
        }

        if records.is_empty() {
            return report;
        }

        observer.consolidating(records.len());
        let consolidated = self.consolidate(&records, options).await;

        for outcome in report.outcomes.iter_mut().filter(|o| o.succeeded()) {
            match &consolidated {
                Ok(c) => outcome.printed = matches!(c.print, Some(Ok(_))),
                Err(reason) => outcome.failure = Some(EventFailure::Consolidated(reason.clone())),
            }
            observer.event_finished(outcome);
        }

        report.consolidated = consolidated.ok();
        report
    }

    /// Fetch one event for the combined document, keeping an individual
    /// markup copy of it when saving is on.
    async fn collect(
        &self,
        event_id: &str,
        options: &BatchOptions,
        outcome: &mut EventOutcome,
    ) -> Result<EventRecord, EventFailure> {
        let record = self.fetcher.fetch(event_id).await?;
        if options.save {
            let copy = self.markup.render(std::slice::from_ref(&record))?;
            outcome.saved_to = Some(self.dispatcher.save(&copy, None).await?);
        }
        Ok(record)
    }

    /// Render, save, print and open the combined document. Rendering and saving
    /// failures fail every included event; print and open failures are only
    /// recorded on the consolidated outcome.
    async fn consolidate(
        &self,
        records: &[EventRecord],
        options: &BatchOptions,
    ) -> Result<ConsolidatedOutcome, String> {
        let artifact = self
            .paginated
            .render(records)
            .map_err(|e| e.to_string())?
            .into_consolidated();

        let saved_to = if options.save {
            let path = self
                .dispatcher
                .save(&artifact, None)
                .await
                .map_err(|e| format!("could not save: {e}"))?;
            Some(path)
        } else {
            None
        };

        let print = if options.print {
            let result = self.dispatcher.print(&artifact).await;
            if let Err(e) = &result {
                tracing::warn!(error = %e, "Consolidated print failed");
            }
            Some(result)
        } else {
            None
        };

        let opened = match (&saved_to, options.open) {
            (Some(path), true) => Some(self.dispatcher.open(path).await),
            _ => None,
        };

        Ok(ConsolidatedOutcome {
            event_ids: artifact.event_ids().to_vec(),
            saved_to,
            print,
            opened,
        })
    }
}
