//! Live recording of mocks.
//!
//! The recorder performs a real call through the [`Transport`], turns the
//! response into a [`MockRecord`] stamped with marker headers, and upserts
//! it into the canonical collection of the target scope. Recorded records
//! are keyed on the escaped, anchored request URL so they replay only the
//! exact call they came from.

use crate::error::{Result, TransportError};
use crate::matcher::Matcher;
use crate::mock::{HttpMethod, MockRecord};
use crate::store::MockStore;
use crate::transport::{LiveResponse, OutgoingRequest, Transport};
use chrono::{SecondsFormat, Utc};
use tracing::{info, warn};

/// Header marking a response as served by hot-mock.
pub const MOCKED_HEADER: &str = "x-hot-mocked";
/// Header carrying the UTC time a record was captured.
pub const RECORDED_AT_HEADER: &str = "x-hot-mock-recorded-at";

/// Why a recording was not made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// A record already matches the call in the current scope.
    AlreadyMocked,
}

/// Outcome of a recording attempt.
#[derive(Debug)]
pub enum RecordOutcome {
    /// A new record was written.
    Recorded(MockRecord),
    /// Nothing was fetched or written.
    Skipped(SkipReason),
    /// The live call failed; nothing was written.
    TransportFailed(TransportError),
}

impl RecordOutcome {
    pub fn is_recorded(&self) -> bool {
        matches!(self, RecordOutcome::Recorded(_))
    }

    pub fn record(&self) -> Option<&MockRecord> {
        match self {
            RecordOutcome::Recorded(record) => Some(record),
            _ => None,
        }
    }
}

/// Records live responses into a [`MockStore`].
pub struct Recorder<'a> {
    store: &'a MockStore,
    transport: &'a dyn Transport,
}

impl<'a> Recorder<'a> {
    pub fn new(store: &'a MockStore, transport: &'a dyn Transport) -> Self {
        Self { store, transport }
    }

    /// Record `request` into `scenario` unless a record already matches it.
    pub async fn record(
        &self,
        request: &OutgoingRequest,
        scenario: Option<&str>,
    ) -> Result<RecordOutcome> {
        let matcher = Matcher::new(self.store.load(scenario));
        if matcher.find(request.method, &request.url)?.is_some() {
            info!(
                method = %request.method,
                url = %request.url,
                scenario = ?scenario,
                "Already mocked, skipping recording"
            );
            return Ok(RecordOutcome::Skipped(SkipReason::AlreadyMocked));
        }

        self.capture(request, scenario, false).await
    }

    /// Record `request` into `scenario`, replacing any record with the same key.
    ///
    /// A record whose pattern is the literal request URL, as written by
    /// hand or through `mock`, is replaced as well.
    pub async fn record_forced(
        &self,
        request: &OutgoingRequest,
        scenario: Option<&str>,
    ) -> Result<RecordOutcome> {
        self.capture(request, scenario, true).await
    }

    async fn capture(
        &self,
        request: &OutgoingRequest,
        scenario: Option<&str>,
        replace_literal: bool,
    ) -> Result<RecordOutcome> {
        let response = match self.transport.send(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    method = %request.method,
                    url = %request.url,
                    error = %e,
                    "Error recording mock"
                );
                return Ok(RecordOutcome::TransportFailed(e));
            }
        };

        let record = record_from_response(request.method, &request.url, &response);
        if replace_literal {
            self.store.delete(scenario, Some(request.method), &request.url)?;
        }
        self.store.upsert(scenario, record.clone())?;

        info!(
            method = %request.method,
            url = %request.url,
            status = record.status,
            scenario = ?scenario,
            "Recorded mock"
        );

        Ok(RecordOutcome::Recorded(record))
    }
}

/// Pattern matching exactly `url` and nothing else.
pub fn recorded_pattern(url: &str) -> String {
    format!("^{}$", regex::escape(url))
}

/// Build a record for exactly `url` from a live response.
pub fn record_from_response(method: HttpMethod, url: &str, response: &LiveResponse) -> MockRecord {
    let recorded_at = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);

    MockRecord::new(method, recorded_pattern(url))
        .with_status(response.status)
        .with_headers(response.headers.clone())
        .with_header(RECORDED_AT_HEADER, recorded_at)
        .with_header(MOCKED_HEADER, "true")
        .with_body(response.body_value())
}
