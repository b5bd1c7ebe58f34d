//! Isolated ingest/normalize environment backed by a temp directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use docsafe::config::schema::default_allowed_extensions;
use docsafe::email::{ExtensionFilter, IngestSettings};
use docsafe::normalizer::XmlConverter;
use docsafe::{
    AttachmentIngestor, CommitMode, Database, IngestError, PdfNormalizer, Schema, SyncReport,
    SyncRequest,
};

use super::builders::MessageBuilder;
use super::fakes::{FakeMailbox, RecordingProgress};

pub const ACCOUNT: &str = "me@example.com";

pub struct TestHarness {
    temp_dir: TempDir,
    pub attachment_dir: PathBuf,
    pub ingest_db: Database,
    pub mailbox: FakeMailbox,
    pub progress: Arc<RecordingProgress>,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let attachment_dir = temp_dir.path().join("attachments");
        let ingest_db = Database::open(&temp_dir.path().join("mails.db"), Schema::Ingest)
            .expect("Failed to open ingest store");

        Self {
            temp_dir,
            attachment_dir,
            ingest_db,
            mailbox: FakeMailbox::new(),
            progress: Arc::new(RecordingProgress::default()),
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn add_message(&self, builder: MessageBuilder) {
        self.mailbox.add(builder);
    }

    pub fn settings(&self, commit_mode: CommitMode) -> IngestSettings {
        IngestSettings {
            attachment_dir: self.attachment_dir.clone(),
            filter: ExtensionFilter::new(default_allowed_extensions()),
            max_results: 100,
            lookback_days: 1000,
            commit_mode,
        }
    }

    pub fn ingestor(&self, commit_mode: CommitMode) -> AttachmentIngestor {
        AttachmentIngestor::new(
            self.ingest_db.clone(),
            Arc::new(self.mailbox.clone()),
            self.settings(commit_mode),
        )
        .with_progress(self.progress.clone())
    }

    pub async fn sync(&self, commit_mode: CommitMode) -> Result<SyncReport, IngestError> {
        self.sync_request(commit_mode, &Self::request()).await
    }

    pub async fn sync_request(
        &self,
        commit_mode: CommitMode,
        request: &SyncRequest,
    ) -> Result<SyncReport, IngestError> {
        self.ingestor(commit_mode).sync(request).await
    }

    pub fn request() -> SyncRequest {
        SyncRequest {
            accounts: vec![ACCOUNT.to_string()],
            ..Default::default()
        }
    }

    pub fn attachment_path(&self, stored_name: &str) -> PathBuf {
        self.attachment_dir.join(stored_name)
    }

    pub fn open_document_store(&self) -> Database {
        Database::open(&self.temp_dir.path().join("documents.db"), Schema::Normalize)
            .expect("Failed to open normalization store")
    }

    pub fn normalizer(&self, output: Database, converter: Box<dyn XmlConverter>) -> PdfNormalizer {
        PdfNormalizer::new(
            self.ingest_db.clone(),
            output,
            self.attachment_dir.clone(),
            self.temp_dir.path().join("tmp"),
            converter,
        )
        .with_progress(self.progress.clone())
    }

    pub fn src_path(&self) -> String {
        self.attachment_dir.to_string_lossy().into_owned()
    }
}
