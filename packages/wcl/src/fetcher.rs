use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use common::EventKind;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde_json::json;
use tracing::{debug, error, instrument, warn};

use crate::client::GraphQlClient;
use crate::code::ReportCode;
use crate::config::WclConfig;
use crate::error::{ClientError, FetchError};
use crate::models::{
    EventPage, EventsField, FightMeta, RawEvent, ReportDataEnvelope, ReportMeta,
};
use crate::queries;

/// Read access to a report on the provider.
///
/// Implemented over HTTP by [`ReportFetcher`]; tests substitute their own sources.
#[async_trait]
pub trait ReportSource: Send + Sync {
    /// Confirms the credentials are usable before any work that would be costly to undo.
    async fn verify_access(&self) -> Result<(), ClientError> {
        Ok(())
    }

    /// Report header, fight summaries and actor roster.
    async fn fetch_report_meta(&self, code: &ReportCode) -> Result<ReportMeta, ClientError>;

    /// Lazily walks the pages of one event kind within one fight.
    ///
    /// Each call starts a fresh walk at the fight start. The first error ends the stream.
    fn event_pages<'a>(
        &'a self,
        code: &'a ReportCode,
        fight: &'a FightMeta,
        kind: EventKind,
    ) -> BoxStream<'a, Result<EventPage, FetchError>>;

    /// The same walk flattened into individual raw events.
    fn fetch_events_for_fight<'a>(
        &'a self,
        code: &'a ReportCode,
        fight: &'a FightMeta,
        kind: EventKind,
    ) -> BoxStream<'a, Result<RawEvent, FetchError>> {
        self.event_pages(code, fight, kind)
            .map_ok(|page| stream::iter(page.events.into_iter().map(Ok)))
            .try_flatten()
            .boxed()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkStep {
    Continue(i64),
    Done,
}

/// Termination guard for a cursor walk.
///
/// A missing cursor ends the walk, as does a first report of the cursor just requested.
/// Any cursor the provider hands back a second time, or one that moves backwards,
/// is a protocol error.
#[derive(Debug, Clone)]
pub struct CursorWalk {
    cursor: i64,
    pages: usize,
    returned: HashSet<i64>,
}

impl CursorWalk {
    pub fn new(start: i64) -> Self {
        Self {
            cursor: start,
            pages: 0,
            returned: HashSet::new(),
        }
    }

    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn pages(&self) -> usize {
        self.pages
    }

    pub fn advance(&mut self, next: Option<i64>) -> Result<WalkStep, ClientError> {
        self.pages += 1;
        let Some(next) = next else {
            return Ok(WalkStep::Done);
        };
        if !self.returned.insert(next) {
            return Err(ClientError::Protocol(format!(
                "provider returned cursor {next} twice after {} pages",
                self.pages
            )));
        }
        if next == self.cursor {
            warn!(
                cursor = next,
                pages = self.pages,
                "Provider repeated the requested cursor, treating walk as complete"
            );
            return Ok(WalkStep::Done);
        }
        if next < self.cursor {
            return Err(ClientError::Protocol(format!(
                "cursor went back from {} to {next} after {} pages",
                self.cursor, self.pages
            )));
        }
        self.cursor = next;
        Ok(WalkStep::Continue(next))
    }
}

/// HTTP implementation of [`ReportSource`] against the WCL v2 GraphQL API.
pub struct ReportFetcher {
    client: GraphQlClient,
    page_limit: u32,
}

impl ReportFetcher {
    pub fn new(client: GraphQlClient, page_limit: u32) -> Self {
        Self { client, page_limit }
    }

    /// Builds the shared HTTP client (with the per-request timeout) and the token cache.
    pub fn from_config(config: &WclConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self::new(
            GraphQlClient::new(http, config),
            config.page_limit,
        ))
    }

    async fn fetch_page(
        &self,
        code: &ReportCode,
        fight: &FightMeta,
        kind: EventKind,
        cursor: i64,
    ) -> Result<EventPage, ClientError> {
        let variables = json!({
            "code": code.as_str(),
            "fightID": fight.id,
            "dataType": kind.data_type(),
            "startTime": cursor,
            "endTime": fight.end_time,
            "limit": self.page_limit,
        });
        let envelope: ReportDataEnvelope<EventsField> =
            self.client.query(queries::FIGHT_EVENTS, variables).await?;
        let report = envelope
            .report_data
            .report
            .ok_or_else(|| ClientError::NotFound(code.to_string()))?;
        Ok(report.events.into())
    }
}

#[async_trait]
impl ReportSource for ReportFetcher {
    async fn verify_access(&self) -> Result<(), ClientError> {
        self.client.tokens().get_token().await.map(|_| ())
    }

    #[instrument(skip(self, code), fields(report_code = %code))]
    async fn fetch_report_meta(&self, code: &ReportCode) -> Result<ReportMeta, ClientError> {
        let envelope: ReportDataEnvelope<ReportMeta> = self
            .client
            .query(queries::REPORT_META, json!({ "code": code.as_str() }))
            .await?;
        let meta = envelope
            .report_data
            .report
            .ok_or_else(|| ClientError::NotFound(code.to_string()))?;
        debug!(
            fights = meta.fights.len(),
            actors = meta.actors().len(),
            "Fetched report metadata"
        );
        Ok(meta)
    }

    fn event_pages<'a>(
        &'a self,
        code: &'a ReportCode,
        fight: &'a FightMeta,
        kind: EventKind,
    ) -> BoxStream<'a, Result<EventPage, FetchError>> {
        let start = Some(CursorWalk::new(fight.start_time));
        stream::try_unfold(start, move |state| async move {
            let Some(mut walk) = state else {
                return Ok(None);
            };
            let page = match self.fetch_page(code, fight, kind, walk.cursor()).await {
                Ok(page) => page,
                Err(cause) => return Err(page_failure(code, fight, kind, &walk, cause)),
            };
            debug!(
                fight_id = fight.id,
                %kind,
                cursor = walk.cursor(),
                events = page.events.len(),
                next = ?page.next_cursor,
                "Fetched event page"
            );
            let next_state = match walk.advance(page.next_cursor) {
                Ok(WalkStep::Continue(_)) => Some(walk),
                Ok(WalkStep::Done) => None,
                Err(cause) => return Err(page_failure(code, fight, kind, &walk, cause)),
            };
            Ok(Some((page, next_state)))
        })
        .boxed()
    }
}

fn page_failure(
    code: &ReportCode,
    fight: &FightMeta,
    kind: EventKind,
    walk: &CursorWalk,
    cause: ClientError,
) -> FetchError {
    error!(
        report_code = %code,
        fight_id = fight.id,
        %kind,
        cursor = walk.cursor(),
        pages = walk.pages(),
        error = %cause,
        "Event page fetch failed"
    );
    FetchError::new(fight.id, kind, cause)
}
