use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use shared_types::{
    AgentTaskRecord, NewReport, NewRfp, NewTask, ReportRecord, ReportStatus, ReportUpdate,
    RfpRecord, RfpStatus, RfpUpdate, TaskStatus, TaskUpdate,
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: &'static str, id: String },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("json column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unexpected value '{value}' in column {column}")]
    InvalidColumn { column: &'static str, value: String },
}

/// Persistence boundary used by the stages, the orchestrator and the API.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_rfp(&self, id: &str) -> Result<Option<RfpRecord>, StoreError>;
    async fn insert_rfp(&self, rfp: NewRfp) -> Result<RfpRecord, StoreError>;
    async fn update_rfp(&self, id: &str, update: RfpUpdate) -> Result<(), StoreError>;

    async fn create_task(&self, task: NewTask) -> Result<AgentTaskRecord, StoreError>;
    async fn get_task(&self, id: &str) -> Result<Option<AgentTaskRecord>, StoreError>;
    async fn update_task(
        &self,
        id: &str,
        update: TaskUpdate,
    ) -> Result<AgentTaskRecord, StoreError>;

    async fn insert_report(&self, report: NewReport) -> Result<ReportRecord, StoreError>;
    async fn get_report(&self, id: &str) -> Result<Option<ReportRecord>, StoreError>;
    async fn update_report(&self, id: &str, update: ReportUpdate) -> Result<(), StoreError>;

    /// Cheap connectivity probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}

pub type SharedRecordStore = Arc<dyn RecordStore>;

/// SQLite-backed record store. Lists and objects live in JSON text columns.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns the id of the user with `email`, creating the user if needed.
    pub async fn ensure_user(
        &self,
        email: &str,
        full_name: &str,
        role: &str,
    ) -> Result<String, StoreError> {
        let existing: Option<(String,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        if let Some((id,)) = existing {
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO users (id, email, full_name, role, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(email)
        .bind(full_name)
        .bind(role)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(id)
    }

    pub async fn count_rfps_for_user(&self, user_id: &str) -> Result<i64, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rfps WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

// ── Row mapping ──────────────────────────────────────────────────────────────

#[derive(sqlx::FromRow)]
struct RfpRow {
    id: String,
    user_id: String,
    title: String,
    content: Option<String>,
    source: String,
    source_url: Option<String>,
    status: String,
    specs: String,
    products: String,
    pricing: Option<String>,
    match_score: Option<i64>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<RfpRow> for RfpRecord {
    type Error = StoreError;

    fn try_from(row: RfpRow) -> Result<Self, Self::Error> {
        Ok(RfpRecord {
            status: RfpStatus::parse(&row.status).ok_or(StoreError::InvalidColumn {
                column: "rfps.status",
                value: row.status.clone(),
            })?,
            specs: from_json(&row.specs)?,
            products: from_json(&row.products)?,
            pricing: row.pricing.as_deref().map(from_json).transpose()?,
            match_score: row.match_score.map(score_from_db),
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            content: row.content,
            source: row.source,
            source_url: row.source_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    agent_id: Option<String>,
    rfp_id: String,
    status: String,
    actions: String,
    result: Option<String>,
    delegate_execution_id: Option<String>,
    started_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<TaskRow> for AgentTaskRecord {
    type Error = StoreError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        Ok(AgentTaskRecord {
            status: TaskStatus::parse(&row.status).ok_or(StoreError::InvalidColumn {
                column: "agent_tasks.status",
                value: row.status.clone(),
            })?,
            actions: from_json(&row.actions)?,
            result: row.result.as_deref().map(from_json).transpose()?,
            id: row.id,
            agent_id: row.agent_id,
            rfp_id: row.rfp_id,
            delegate_execution_id: row.delegate_execution_id,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ReportRow {
    id: String,
    rfp_id: String,
    user_id: String,
    rfp_name: String,
    content: String,
    summary: Option<String>,
    match_score: Option<i64>,
    status: String,
    generated_at: DateTime<Utc>,
}

impl TryFrom<ReportRow> for ReportRecord {
    type Error = StoreError;

    fn try_from(row: ReportRow) -> Result<Self, Self::Error> {
        Ok(ReportRecord {
            status: ReportStatus::parse(&row.status).ok_or(StoreError::InvalidColumn {
                column: "reports.status",
                value: row.status.clone(),
            })?,
            summary: row.summary.as_deref().map(from_json).transpose()?,
            match_score: row.match_score.map(score_from_db),
            id: row.id,
            rfp_id: row.rfp_id,
            user_id: row.user_id,
            rfp_name: row.rfp_name,
            content: row.content,
            generated_at: row.generated_at,
        })
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, StoreError> {
    Ok(serde_json::to_string(value)?)
}

fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T, StoreError> {
    Ok(serde_json::from_str(raw)?)
}

fn score_from_db(value: i64) -> u32 {
    value.clamp(0, i64::from(u32::MAX)) as u32
}

// ── RecordStore impl ─────────────────────────────────────────────────────────

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get_rfp(&self, id: &str) -> Result<Option<RfpRecord>, StoreError> {
        let row: Option<RfpRow> = sqlx::query_as("SELECT * FROM rfps WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(RfpRecord::try_from).transpose()
    }

    async fn insert_rfp(&self, rfp: NewRfp) -> Result<RfpRecord, StoreError> {
        let now = Utc::now();
        let record = RfpRecord {
            id: Uuid::new_v4().to_string(),
            user_id: rfp.user_id,
            title: rfp.title,
            content: rfp.content,
            source: rfp.source,
            source_url: rfp.source_url,
            status: RfpStatus::New,
            specs: rfp.specs,
            products: Vec::new(),
            pricing: None,
            match_score: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO rfps (id, user_id, title, content, source, source_url, status,
                               specs, products, pricing, match_score, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.user_id)
        .bind(&record.title)
        .bind(&record.content)
        .bind(&record.source)
        .bind(&record.source_url)
        .bind(record.status.as_str())
        .bind(to_json(&record.specs)?)
        .bind(to_json(&record.products)?)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn update_rfp(&self, id: &str, update: RfpUpdate) -> Result<(), StoreError> {
        let products = update.products.as_ref().map(to_json).transpose()?;
        let pricing = update.pricing.as_ref().map(to_json).transpose()?;

        let rows = sqlx::query(
            "UPDATE rfps SET
                status      = COALESCE(?, status),
                products    = COALESCE(?, products),
                match_score = COALESCE(?, match_score),
                pricing     = COALESCE(?, pricing),
                updated_at  = ?
             WHERE id = ?",
        )
        .bind(update.status.map(|s| s.as_str()))
        .bind(products)
        .bind(update.match_score.map(i64::from))
        .bind(pricing)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(StoreError::NotFound {
                entity: "rfp",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn create_task(&self, task: NewTask) -> Result<AgentTaskRecord, StoreError> {
        let now = Utc::now();
        let record = AgentTaskRecord {
            id: Uuid::new_v4().to_string(),
            agent_id: task.agent_id,
            rfp_id: task.rfp_id,
            status: task.status,
            actions: Vec::new(),
            result: None,
            delegate_execution_id: None,
            started_at: now,
            completed_at: None,
            created_at: now,
        };

        sqlx::query(
            "INSERT INTO agent_tasks (id, agent_id, rfp_id, status, actions, result,
                                      delegate_execution_id, started_at, completed_at, created_at)
             VALUES (?, ?, ?, ?, ?, NULL, NULL, ?, NULL, ?)",
        )
        .bind(&record.id)
        .bind(&record.agent_id)
        .bind(&record.rfp_id)
        .bind(record.status.as_str())
        .bind(to_json(&record.actions)?)
        .bind(record.started_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_task(&self, id: &str) -> Result<Option<AgentTaskRecord>, StoreError> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM agent_tasks WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(AgentTaskRecord::try_from).transpose()
    }

    async fn update_task(
        &self,
        id: &str,
        update: TaskUpdate,
    ) -> Result<AgentTaskRecord, StoreError> {
        let result = update.result.as_ref().map(to_json).transpose()?;
        let actions = update.actions.as_ref().map(to_json).transpose()?;

        let rows = sqlx::query(
            "UPDATE agent_tasks SET
                status                = COALESCE(?, status),
                completed_at          = COALESCE(?, completed_at),
                result                = COALESCE(?, result),
                actions               = COALESCE(?, actions),
                delegate_execution_id = COALESCE(?, delegate_execution_id)
             WHERE id = ?",
        )
        .bind(update.status.map(|s| s.as_str()))
        .bind(update.completed_at)
        .bind(result)
        .bind(actions)
        .bind(update.delegate_execution_id)
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(StoreError::NotFound {
                entity: "agent_task",
                id: id.to_string(),
            });
        }

        self.get_task(id).await?.ok_or_else(|| StoreError::NotFound {
            entity: "agent_task",
            id: id.to_string(),
        })
    }

    async fn insert_report(&self, report: NewReport) -> Result<ReportRecord, StoreError> {
        let record = ReportRecord {
            id: Uuid::new_v4().to_string(),
            rfp_id: report.rfp_id,
            user_id: report.user_id,
            rfp_name: report.rfp_name,
            content: report.content,
            summary: report.summary,
            match_score: report.match_score,
            status: report.status,
            generated_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO reports (id, rfp_id, user_id, rfp_name, content, summary,
                                  match_score, status, generated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.rfp_id)
        .bind(&record.user_id)
        .bind(&record.rfp_name)
        .bind(&record.content)
        .bind(record.summary.as_ref().map(to_json).transpose()?)
        .bind(record.match_score.map(i64::from))
        .bind(record.status.as_str())
        .bind(record.generated_at)
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn get_report(&self, id: &str) -> Result<Option<ReportRecord>, StoreError> {
        let row: Option<ReportRow> = sqlx::query_as("SELECT * FROM reports WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(ReportRecord::try_from).transpose()
    }

    async fn update_report(&self, id: &str, update: ReportUpdate) -> Result<(), StoreError> {
        let summary = update.summary.as_ref().map(to_json).transpose()?;

        let rows = sqlx::query(
            "UPDATE reports SET
                content     = COALESCE(?, content),
                summary     = COALESCE(?, summary),
                match_score = COALESCE(?, match_score),
                status      = COALESCE(?, status)
             WHERE id = ?",
        )
        .bind(update.content)
        .bind(summary)
        .bind(update.match_score.map(i64::from))
        .bind(update.status.map(|s| s.as_str()))
        .bind(id)
        .execute(&self.pool)
        .await?
        .rows_affected();

        if rows == 0 {
            return Err(StoreError::NotFound {
                entity: "report",
                id: id.to_string(),
            });
        }
        Ok(())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
