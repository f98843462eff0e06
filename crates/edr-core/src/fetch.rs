use chrono::{Datelike, NaiveDate};
use serde_json::{Value, json};

use crate::{
    auth::Session,
    config::BrowseConfig,
    error::FetchError,
    http::{HttpClient, PortalRequest},
    types::{EventRecord, EventSummary, NOT_AVAILABLE},
};

/// Filters for the event browse listing. Unset fields fall back to config and
/// the caller-supplied current date.
#[derive(Debug, Clone, Default)]
pub struct BrowseQuery {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub store_number: Option<String>,
    pub event_types: Option<Vec<u32>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedBrowse {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub store_number: String,
    pub event_types: Vec<u32>,
}

impl BrowseQuery {
    /// A window needs both bounds; unless both are given it runs from the first
    /// of `today`'s month through `today`.
    pub fn resolve(
        self,
        today: NaiveDate,
        defaults: &BrowseConfig,
    ) -> Result<ResolvedBrowse, FetchError> {
        let (start, end) = match (self.start, self.end) {
            (Some(start), Some(end)) => (start, end),
            _ => (today.with_day(1).unwrap_or(today), today),
        };
        if start > end {
            return Err(FetchError::InvalidWindow { start, end });
        }
        Ok(ResolvedBrowse {
            start,
            end,
            store_number: self
                .store_number
                .unwrap_or_else(|| defaults.store_number.clone()),
            event_types: self
                .event_types
                .filter(|types| !types.is_empty())
                .unwrap_or_else(|| defaults.event_types.clone()),
        })
    }
}

/// Reads event data using an authenticated session.
pub struct ReportFetcher<'a, C> {
    session: &'a Session<C>,
}

impl<'a, C: HttpClient> ReportFetcher<'a, C> {
    pub fn new(session: &'a Session<C>) -> Self {
        Self { session }
    }

    /// Retrieve the Event Detail Report data for one event.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, event_id: &str) -> Result<EventRecord, FetchError> {
        let credential = self
            .session
            .credential()
            .ok_or(FetchError::NotAuthenticated)?;
        let portal = self.session.portal();

        let request = PortalRequest::get(portal.edr_report_endpoint())
            .query("id", event_id)
            .bearer(credential)
            .referer(portal.browse_page());

        let body = self.read(&request, event_id).await?;
        let failed = |reason: String| FetchError::RetrievalFailed {
            target: event_id.to_string(),
            reason,
        };
        let value: Value = serde_json::from_str(&body)
            .map_err(|e| failed(format!("malformed report body: {e}")))?;
        if is_empty_report(&value) {
            return Err(failed("portal returned an empty report".to_string()));
        }
        let mut record: EventRecord = serde_json::from_value(value)
            .map_err(|e| failed(format!("malformed report body: {e}")))?;

        if record.event_id == NOT_AVAILABLE {
            record.event_id = event_id.to_string();
        }

        tracing::info!(items = record.items.len(), "EDR report retrieved");
        Ok(record)
    }

    /// List candidate events over a date window.
    pub async fn browse_events(
        &self,
        query: &ResolvedBrowse,
    ) -> Result<Vec<EventSummary>, FetchError> {
        let credential = self
            .session
            .credential()
            .ok_or(FetchError::NotAuthenticated)?;
        let portal = self.session.portal();

        let payload = json!({
            "itemNbr": null,
            "vendorNbr": null,
            "startDate": query.start.format("%Y-%m-%d").to_string(),
            "endDate": query.end.format("%Y-%m-%d").to_string(),
            "billType": null,
            "eventType": query.event_types,
            "userId": null,
            "primItem": null,
            "storeNbr": query.store_number,
            "deptNbr": null,
        });
        let request = PortalRequest::post_json(portal.browse_endpoint(), payload)
            .bearer(credential)
            .referer(portal.browse_page())
            .origin(portal.portal_url.trim_end_matches('/'));

        tracing::info!(
            start = %query.start,
            end = %query.end,
            store = %query.store_number,
            "Browsing events"
        );

        let target = format!("browse {}..{}", query.start, query.end);
        let body = self.read(&request, &target).await?;
        let events: Vec<EventSummary> =
            serde_json::from_str(&body).map_err(|e| FetchError::RetrievalFailed {
                target,
                reason: format!("malformed browse body: {e}"),
            })?;

        tracing::info!(count = events.len(), "Browse completed");
        Ok(events)
    }

    async fn read(&self, request: &PortalRequest, target: &str) -> Result<String, FetchError> {
        let failed = |reason: String| FetchError::RetrievalFailed {
            target: target.to_string(),
            reason,
        };

        let response = self
            .session
            .client()
            .execute(request)
            .await
            .map_err(|e| failed(e.to_string()))?;

        if !response.is_success() {
            tracing::warn!(status = response.status, "Portal refused request");
            return Err(failed(format!("HTTP {}", response.status)));
        }
        Ok(response.body)
    }
}

fn is_empty_report(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(fields) => fields.is_empty(),
        _ => false,
    }
}
