//! libSQL backend — persistent implementation of every store trait.
//!
//! Supports local file and in-memory databases. Scalar settings (hide tips,
//! privacy protection, app stage, dialog journey, install time) live as JSON
//! values in the `settings` table; the ledger, allowlist and surveys have
//! their own tables.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, info};

use crate::cta::model::{CtaId, DismissedCta};
use crate::cta::survey::{Survey, SurveyStatus};
use crate::error::StoreError;
use crate::onboarding::AppStage;
use crate::store::migrations;
use crate::store::traits::{
    DismissedCtaStore, InstallStore, OnboardingStore, SettingsStore, SurveyStore, UserStageStore,
};

const KEY_HIDE_TIPS: &str = "hide_tips";
const KEY_PRIVACY_PROTECTION: &str = "privacy_protection_enabled";
const KEY_APP_STAGE: &str = "user_app_stage";
const KEY_DIALOG_JOURNEY: &str = "dialog_journey";
const KEY_INSTALLED_AT: &str = "installed_at";

const SURVEY_COLUMNS: &str = "id, url, day_of_installation, status";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
    survey_tx: watch::Sender<Option<Survey>>,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                StoreError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::open(db).await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Pool(format!("Failed to create in-memory database: {e}")))?;
        Self::open(db).await
    }

    async fn open(db: LibSqlDatabase) -> Result<Self, StoreError> {
        let conn = db
            .connect()
            .map_err(|e| StoreError::Pool(format!("Failed to create connection: {e}")))?;
        migrations::init_schema(&conn).await?;

        let (survey_tx, _rx) = watch::channel(None);
        let backend = Self {
            db: Arc::new(db),
            conn,
            survey_tx,
        };
        let current = backend.load_current_survey().await?;
        backend.survey_tx.send_replace(current);
        Ok(backend)
    }

    /// Get the connection.
    fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Record the install timestamp unless one is already stored.
    /// Returns the timestamp in effect.
    pub async fn ensure_installed_at(
        &self,
        at: DateTime<Utc>,
    ) -> Result<DateTime<Utc>, StoreError> {
        if let Some(existing) = self.get_setting::<DateTime<Utc>>(KEY_INSTALLED_AT).await? {
            return Ok(existing);
        }
        self.set_setting(KEY_INSTALLED_AT, &at).await?;
        info!(installed_at = %at.to_rfc3339(), "Install timestamp recorded");
        Ok(at)
    }

    /// All ids in the dismissal ledger, in insertion order.
    pub async fn dismissed_ids(&self) -> Result<Vec<CtaId>, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT cta_id FROM dismissed_ctas ORDER BY rowid", ())
            .await
            .map_err(|e| StoreError::Query(format!("dismissed_ids: {e}")))?;

        let mut ids = Vec::new();
        while let Ok(Some(row)) = rows.next().await {
            let raw: String = row
                .get(0)
                .map_err(|e| StoreError::Query(format!("dismissed_ids row: {e}")))?;
            ids.push(raw.parse::<CtaId>().map_err(StoreError::Serialization)?);
        }
        Ok(ids)
    }

    // ── Settings helpers ────────────────────────────────────────────

    async fn get_setting<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        let mut rows = self
            .conn()
            .query("SELECT value FROM settings WHERE key = ?1", params![key])
            .await
            .map_err(|e| StoreError::Query(format!("get_setting: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let value_str: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("get_setting row: {e}")))?;
                Ok(Some(serde_json::from_str(&value_str)?))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("get_setting: {e}"))),
        }
    }

    async fn set_setting<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let value_str = serde_json::to_string(value)?;

        self.conn()
            .execute(
                "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT (key) DO UPDATE SET value = ?2, updated_at = ?3",
                params![key, value_str, now],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set_setting: {e}")))?;
        Ok(())
    }

    // ── Survey helpers ──────────────────────────────────────────────

    async fn load_current_survey(&self) -> Result<Option<Survey>, StoreError> {
        let mut rows = self
            .conn()
            .query(
                &format!(
                    "SELECT {SURVEY_COLUMNS} FROM surveys ORDER BY updated_at DESC, rowid DESC LIMIT 1"
                ),
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("current_survey: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => row_to_survey(&row).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("current_survey: {e}"))),
        }
    }

    async fn publish_current_survey(&self) -> Result<(), StoreError> {
        let current = self.load_current_survey().await?;
        self.survey_tx.send_replace(current);
        Ok(())
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Map a libsql Row to a Survey.
///
/// Column order matches SURVEY_COLUMNS: 0:id, 1:url, 2:day_of_installation, 3:status
fn row_to_survey(row: &libsql::Row) -> Result<Survey, StoreError> {
    let id: String = row
        .get(0)
        .map_err(|e| StoreError::Query(format!("survey row: {e}")))?;
    let status_str: String = row
        .get(3)
        .map_err(|e| StoreError::Query(format!("survey row: {e}")))?;
    let status = status_str
        .parse::<SurveyStatus>()
        .map_err(StoreError::Serialization)?;

    Ok(Survey {
        id,
        url: row.get::<String>(1).ok(),
        day_of_installation: row
            .get::<i64>(2)
            .ok()
            .and_then(|day| u32::try_from(day).ok()),
        status,
    })
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn opt_int(n: Option<u32>) -> libsql::Value {
    match n {
        Some(n) => libsql::Value::Integer(i64::from(n)),
        None => libsql::Value::Null,
    }
}

// ── Trait implementations ───────────────────────────────────────────

#[async_trait]
impl DismissedCtaStore for LibSqlBackend {
    async fn exists(&self, id: CtaId) -> Result<bool, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM dismissed_ctas WHERE cta_id = ?1",
                params![id.as_str()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("dismissed exists: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0) > 0),
            Ok(None) => Ok(false),
            Err(e) => Err(StoreError::Query(format!("dismissed exists: {e}"))),
        }
    }

    async fn insert(&self, dismissed: DismissedCta) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO dismissed_ctas (cta_id) VALUES (?1)",
                params![dismissed.cta_id.as_str()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("insert dismissed: {e}")))?;

        debug!(cta = %dismissed.cta_id, "Dismissed CTA stored");
        Ok(())
    }
}

#[async_trait]
impl SurveyStore for LibSqlBackend {
    async fn current_survey(&self) -> Result<Option<Survey>, StoreError> {
        self.load_current_survey().await
    }

    fn subscribe(&self) -> watch::Receiver<Option<Survey>> {
        self.survey_tx.subscribe()
    }

    async fn schedule(&self, survey: Survey) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        self.conn()
            .execute(
                "INSERT INTO surveys (id, url, day_of_installation, status, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (id) DO UPDATE SET
                    url = ?2, day_of_installation = ?3, status = ?4, updated_at = ?5",
                params![
                    survey.id.as_str(),
                    opt_text(survey.url.as_deref()),
                    opt_int(survey.day_of_installation),
                    survey.status.to_string(),
                    now
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("schedule survey: {e}")))?;

        debug!(survey_id = %survey.id, status = %survey.status, "Survey stored");
        self.publish_current_survey().await
    }

    async fn cancel_scheduled_surveys(&self) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let count = self
            .conn()
            .execute(
                "UPDATE surveys SET status = ?1, updated_at = ?2 WHERE status = ?3",
                params![
                    SurveyStatus::Cancelled.to_string(),
                    now,
                    SurveyStatus::Scheduled.to_string()
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("cancel surveys: {e}")))?;

        debug!(count, "Scheduled surveys cancelled");
        self.publish_current_survey().await
    }
}

#[async_trait]
impl SettingsStore for LibSqlBackend {
    async fn hide_tips(&self) -> Result<bool, StoreError> {
        Ok(self.get_setting(KEY_HIDE_TIPS).await?.unwrap_or(false))
    }

    async fn set_hide_tips(&self, hide: bool) -> Result<(), StoreError> {
        self.set_setting(KEY_HIDE_TIPS, &hide).await
    }

    async fn privacy_protection_enabled(&self) -> Result<bool, StoreError> {
        Ok(self.get_setting(KEY_PRIVACY_PROTECTION).await?.unwrap_or(true))
    }

    async fn set_privacy_protection_enabled(&self, enabled: bool) -> Result<(), StoreError> {
        self.set_setting(KEY_PRIVACY_PROTECTION, &enabled).await
    }

    async fn is_allowlisted(&self, host: &str) -> Result<bool, StoreError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT COUNT(*) FROM allowlist WHERE host = ?1",
                params![host.to_ascii_lowercase()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("is_allowlisted: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => Ok(row.get::<i64>(0).unwrap_or(0) > 0),
            Ok(None) => Ok(false),
            Err(e) => Err(StoreError::Query(format!("is_allowlisted: {e}"))),
        }
    }

    async fn add_to_allowlist(&self, host: &str) -> Result<(), StoreError> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO allowlist (host) VALUES (?1)",
                params![host.to_ascii_lowercase()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("add_to_allowlist: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl UserStageStore for LibSqlBackend {
    /// Fresh databases start in Dax onboarding.
    async fn user_app_stage(&self) -> Result<AppStage, StoreError> {
        Ok(self
            .get_setting(KEY_APP_STAGE)
            .await?
            .unwrap_or(AppStage::DaxOnboarding))
    }

    async fn stage_completed(&self, stage: AppStage) -> Result<AppStage, StoreError> {
        let current = self.user_app_stage().await?;
        let next = current.after_completing(stage);
        if next != current {
            self.set_setting(KEY_APP_STAGE, &next).await?;
            info!(from = %current, to = %next, "App stage advanced");
        }
        Ok(next)
    }
}

#[async_trait]
impl OnboardingStore for LibSqlBackend {
    async fn dialog_journey(&self) -> Result<Option<String>, StoreError> {
        self.get_setting(KEY_DIALOG_JOURNEY).await
    }

    async fn set_dialog_journey(&self, journey: String) -> Result<(), StoreError> {
        self.set_setting(KEY_DIALOG_JOURNEY, &journey).await
    }
}

#[async_trait]
impl InstallStore for LibSqlBackend {
    /// Read-only; an unrecorded install counts as installed now.
    async fn installed_at(&self) -> Result<DateTime<Utc>, StoreError> {
        Ok(self
            .get_setting::<DateTime<Utc>>(KEY_INSTALLED_AT)
            .await?
            .unwrap_or_else(Utc::now))
    }
}
