//! Shared application state for the HTTP layer.
//!
//! Built once at startup and wrapped in `Arc`. Holds the configuration, the
//! analysis runner, the mailer and the in-memory session store. The
//! database is opened per request from `db_path`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;

use crate::analysis::{AnalysisRunner, RetryPolicy};
use crate::analysis::provider::AnalysisProvider;
use crate::auth::AuthSettings;
use crate::config::AppConfig;
use crate::db::{self, DatabaseError};
use crate::mail::Mailer;
use crate::report::fonts::FontBook;
use crate::report::RenderOptions;
use crate::session::SessionStore;

pub struct AppState {
    pub config: AppConfig,
    pub auth: AuthSettings,
    pub runner: Arc<AnalysisRunner>,
    pub mailer: Arc<dyn Mailer>,
    pub sessions: SessionStore,
    fonts: FontBook,
    db_path: PathBuf,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        provider: Arc<dyn AnalysisProvider>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let runner = Arc::new(AnalysisRunner::new(provider, RetryPolicy::from(&config.llm)));
        let fonts = FontBook::load(config.pdf_font_path.as_deref()).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "PDF font unusable, using bundled fonts only");
            FontBook::default()
        });
        Self {
            auth: AuthSettings::from(&config),
            sessions: SessionStore::new(config.session_idle),
            db_path: config.database_path(),
            fonts,
            runner,
            mailer,
            config,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Open a connection to the application database. Migrations run on open.
    pub fn open_db(&self) -> Result<Connection, DatabaseError> {
        db::open_database(&self.db_path)
    }

    pub fn render_options(&self) -> RenderOptions {
        RenderOptions {
            pdf_qr_code: self.config.pdf_qr_code,
            fonts: self.fonts.clone(),
        }
    }
}
