//! Incremental attachment ingestion.
//!
//! For each account: build the search query, list matching messages, and
//! store every message not seen before together with its allow-listed
//! attachments. Messages are keyed by their external id, so re-running a
//! sync over the same range writes nothing new.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{info, info_span, warn, Instrument};

use super::error::IngestError;
use super::gmail::{MailConnector, MailService, MessageRef};
use super::parser::{decode_base64url, decode_text, IncomingMessage, IncomingPart};
use super::query::{build_query, ExtensionFilter};
use crate::config::{CommitMode, Config};
use crate::db::attachment_repo;
use crate::db::email_repo::{self, NewMessage};
use crate::db::Database;
use crate::progress::{NoopProgress, ProgressEvent, ProgressReporter, SkipReason};
use crate::sanitize::attachment_file_name;

type Result<T> = std::result::Result<T, IngestError>;

/// Ingestion knobs taken from the `ingest` config section.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub attachment_dir: PathBuf,
    pub filter: ExtensionFilter,
    pub max_results: u32,
    pub lookback_days: u32,
    pub commit_mode: CommitMode,
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            attachment_dir: config.attachment_dir(),
            filter: ExtensionFilter::new(&config.ingest.allowed_extensions),
            max_results: config.ingest.max_results,
            lookback_days: config.ingest.lookback_days,
            commit_mode: config.ingest.commit_mode,
        }
    }
}

/// What to sync.
#[derive(Debug, Clone, Default)]
pub struct SyncRequest {
    pub accounts: Vec<String>,
    /// Overrides the computed start date.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive end date; defaults to tomorrow.
    pub to: Option<DateTime<Utc>>,
    /// Ignore stored messages when computing the start date.
    pub full_resync: bool,
}

/// Counts for one sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub accounts: usize,
    pub messages_listed: usize,
    pub messages_skipped: usize,
    pub messages_stored: usize,
    pub messages_failed: usize,
    pub attachments_stored: usize,
    pub attachments_skipped: usize,
}

#[derive(Debug, Default)]
struct MessageOutcome {
    stored: bool,
    attachments_stored: usize,
    attachments_skipped: usize,
}

impl SyncReport {
    fn record(&mut self, outcome: &MessageOutcome) {
        if outcome.stored {
            self.messages_stored += 1;
        } else {
            self.messages_skipped += 1;
        }
        self.attachments_stored += outcome.attachments_stored;
        self.attachments_skipped += outcome.attachments_skipped;
    }
}

pub struct AttachmentIngestor {
    db: Database,
    connector: Arc<dyn MailConnector>,
    settings: IngestSettings,
    progress: Arc<dyn ProgressReporter>,
}

impl AttachmentIngestor {
    pub fn new(db: Database, connector: Arc<dyn MailConnector>, settings: IngestSettings) -> Self {
        Self {
            db,
            connector,
            settings,
            progress: Arc::new(NoopProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    /// First day to query: the explicit `from`, else the latest stored
    /// message date, else `now - lookback_days` (also used on full resync).
    pub fn start_date(&self, request: &SyncRequest, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        if let Some(from) = request.from {
            return Ok(from);
        }
        let days = self.settings.lookback_days;
        let lookback = Duration::try_days(i64::from(days))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or(IngestError::LookbackOutOfRange { days })?;
        if request.full_resync {
            return Ok(lookback);
        }
        Ok(email_repo::latest_message_date(&self.db)?.unwrap_or(lookback))
    }

    /// Exclusive end of the query range: the explicit `to`, else tomorrow.
    pub fn end_date(&self, request: &SyncRequest, now: DateTime<Utc>) -> DateTime<Utc> {
        request.to.unwrap_or_else(|| now + Duration::days(1))
    }

    pub async fn sync(&self, request: &SyncRequest) -> Result<SyncReport> {
        let now = Utc::now();
        let from = self.start_date(request, now)?;
        let to = self.end_date(request, now);
        let query = build_query(from, to, &self.settings.filter);

        tokio::fs::create_dir_all(&self.settings.attachment_dir)
            .await
            .map_err(|e| IngestError::WriteAttachment {
                path: self.settings.attachment_dir.clone(),
                source: e,
            })?;

        let mut report = SyncReport::default();
        for account in &request.accounts {
            let span = info_span!("sync", account = %account);
            self.sync_account(account, &query, &mut report)
                .instrument(span)
                .await?;
            report.accounts += 1;
        }

        info!(
            accounts = report.accounts,
            stored = report.messages_stored,
            skipped = report.messages_skipped,
            failed = report.messages_failed,
            attachments = report.attachments_stored,
            "Sync finished"
        );
        Ok(report)
    }

    async fn sync_account(&self, account: &str, query: &str, report: &mut SyncReport) -> Result<()> {
        self.progress.report(ProgressEvent::AccountStarted {
            account: account.to_string(),
            query: query.to_string(),
        });

        let service = self.connector.connect(account).await?;
        let refs = service
            .list_messages(query, self.settings.max_results)
            .await?;
        report.messages_listed += refs.len();

        if refs.is_empty() {
            self.progress.report(ProgressEvent::NoMessages {
                account: account.to_string(),
            });
            return Ok(());
        }

        match self.settings.commit_mode {
            CommitMode::Account => {
                let tx = self.db.begin()?;
                let mut outcomes = Vec::with_capacity(refs.len());
                for message_ref in &refs {
                    outcomes.push(self.ingest_message(service.as_ref(), account, message_ref).await?);
                }
                tx.commit()?;
                for outcome in &outcomes {
                    report.record(outcome);
                }
            }
            CommitMode::Message => {
                for message_ref in &refs {
                    let tx = self.db.begin()?;
                    match self.ingest_message(service.as_ref(), account, message_ref).await {
                        Ok(outcome) => {
                            tx.commit()?;
                            report.record(&outcome);
                        }
                        Err(e @ IngestError::ConsistencyFault { .. }) => {
                            tx.rollback()?;
                            return Err(e);
                        }
                        Err(e) => {
                            tx.rollback()?;
                            warn!(message_id = %message_ref.id, error = %e, "Message rolled back");
                            self.progress.report(ProgressEvent::MessageFailed {
                                external_id: message_ref.id.clone(),
                                error: e.to_string(),
                            });
                            report.messages_failed += 1;
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Stores one message and its attachments unless it is already known.
    async fn ingest_message(
        &self,
        service: &dyn MailService,
        account: &str,
        message_ref: &MessageRef,
    ) -> Result<MessageOutcome> {
        let external_id = message_ref.id.as_str();
        if email_repo::find_id_by_external_id(&self.db, external_id)?.is_some() {
            self.progress.report(ProgressEvent::MessageSkipped {
                external_id: external_id.to_string(),
            });
            return Ok(MessageOutcome::default());
        }

        let message = IncomingMessage::from_gmail(service.get_message(external_id).await?)?;

        email_repo::insert_placeholder(
            &self.db,
            &NewMessage {
                external_id: &message.id,
                subject: &message.subject,
                date: message.date,
                sender: message.sender.as_deref(),
                account,
            },
        )?;
        let row_id = email_repo::find_id_by_external_id(&self.db, &message.id)?.ok_or_else(|| {
            IngestError::ConsistencyFault {
                external_id: message.id.clone(),
            }
        })?;

        let mut outcome = MessageOutcome {
            stored: true,
            ..Default::default()
        };
        let mut body = String::new();

        for part in &message.parts {
            match part {
                IncomingPart::TextBody { data, .. } => {
                    body.push_str(&decode_text(data)?);
                    email_repo::update_body(&self.db, row_id, body.trim())?;
                }
                IncomingPart::Attachment {
                    filename,
                    attachment_id,
                    inline_data,
                    ..
                } => {
                    let saved = self
                        .store_attachment(
                            service,
                            &message.id,
                            row_id,
                            filename,
                            attachment_id.as_deref(),
                            inline_data.as_deref(),
                        )
                        .await?;
                    if saved {
                        outcome.attachments_stored += 1;
                    } else {
                        outcome.attachments_skipped += 1;
                    }
                }
            }
        }

        self.progress.report(ProgressEvent::MessageStored {
            external_id: message.id.clone(),
            attachments: outcome.attachments_stored,
        });
        Ok(outcome)
    }

    /// Writes one attachment to disk and records it. Returns `false` when
    /// the attachment was skipped.
    async fn store_attachment(
        &self,
        service: &dyn MailService,
        message_id: &str,
        row_id: i64,
        filename: &str,
        attachment_id: Option<&str>,
        inline_data: Option<&str>,
    ) -> Result<bool> {
        if !self.settings.filter.accepts(filename) {
            self.skip(message_id, filename, SkipReason::InvalidExtension);
            return Ok(false);
        }

        let fetched = match attachment_id {
            Some(id) => service.get_attachment(message_id, id).await?,
            None => None,
        };
        let Some(data) = fetched.as_deref().or(inline_data) else {
            self.skip(message_id, filename, SkipReason::MissingPayload);
            return Ok(false);
        };

        let bytes = decode_base64url(data, filename)?;
        let stored_name = attachment_file_name(message_id, filename);
        let path = self.settings.attachment_dir.join(&stored_name);
        tokio::fs::write(&path, &bytes)
            .await
            .map_err(|e| IngestError::WriteAttachment {
                path: path.clone(),
                source: e,
            })?;

        attachment_repo::insert_attachment(&self.db, &stored_name, row_id)?;
        self.progress.report(ProgressEvent::AttachmentSaved {
            external_id: message_id.to_string(),
            filename: stored_name,
        });
        Ok(true)
    }

    fn skip(&self, message_id: &str, filename: &str, reason: SkipReason) {
        self.progress.report(ProgressEvent::AttachmentSkipped {
            external_id: message_id.to_string(),
            filename: filename.to_string(),
            reason,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Schema;
    use crate::email::error::MailError;
    use async_trait::async_trait;
    use chrono::TimeZone;

    struct NoMail;

    #[async_trait]
    impl MailConnector for NoMail {
        async fn connect(
            &self,
            _account: &str,
        ) -> std::result::Result<Box<dyn MailService>, MailError> {
            Err(MailError::ConfigError("offline".to_string()))
        }
    }

    fn ingestor(db: Database, lookback_days: u32) -> AttachmentIngestor {
        AttachmentIngestor::new(
            db,
            Arc::new(NoMail),
            IngestSettings {
                attachment_dir: std::env::temp_dir(),
                filter: ExtensionFilter::new(["pdf"]),
                max_results: 10,
                lookback_days,
                commit_mode: CommitMode::Account,
            },
        )
    }

    #[test]
    fn test_start_date_empty_store_uses_lookback() {
        let db = Database::open_in_memory(Schema::Ingest).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let start = ingestor(db, 1000)
            .start_date(&SyncRequest::default(), now)
            .unwrap();
        assert_eq!(start, now - Duration::days(1000));
    }

    #[test]
    fn test_start_date_lookback_out_of_range() {
        let db = Database::open_in_memory(Schema::Ingest).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let err = ingestor(db, u32::MAX)
            .start_date(&SyncRequest::default(), now)
            .unwrap_err();
        assert!(matches!(err, IngestError::LookbackOutOfRange { days } if days == u32::MAX));
    }

    #[test]
    fn test_start_date_uses_latest_stored_message() {
        let db = Database::open_in_memory(Schema::Ingest).unwrap();
        let latest = Utc.with_ymd_and_hms(2026, 9, 30, 8, 0, 0).unwrap();
        email_repo::insert_placeholder(
            &db,
            &NewMessage {
                external_id: "m1",
                subject: "s",
                date: latest,
                sender: None,
                account: "a",
            },
        )
        .unwrap();

        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let ing = ingestor(db, 1000);
        assert_eq!(ing.start_date(&SyncRequest::default(), now).unwrap(), latest);

        let full = SyncRequest {
            full_resync: true,
            ..Default::default()
        };
        assert_eq!(
            ing.start_date(&full, now).unwrap(),
            now - Duration::days(1000)
        );

        let explicit = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
        let request = SyncRequest {
            from: Some(explicit),
            full_resync: true,
            ..Default::default()
        };
        assert_eq!(ing.start_date(&request, now).unwrap(), explicit);
    }

    #[test]
    fn test_end_date_defaults_to_tomorrow() {
        let db = Database::open_in_memory(Schema::Ingest).unwrap();
        let now = Utc.with_ymd_and_hms(2026, 10, 18, 12, 0, 0).unwrap();
        let ing = ingestor(db, 10);
        assert_eq!(
            ing.end_date(&SyncRequest::default(), now),
            now + Duration::days(1)
        );
    }

    #[tokio::test]
    async fn test_connect_failure_propagates() {
        let db = Database::open_in_memory(Schema::Ingest).unwrap();
        let request = SyncRequest {
            accounts: vec!["a@example.com".to_string()],
            ..Default::default()
        };
        let err = ingestor(db, 10).sync(&request).await.unwrap_err();
        assert!(matches!(err, IngestError::Mail(MailError::ConfigError(_))));
    }
}
