//! Postgres-backed store.
//!
//! ## Ledger writes
//!
//! Create and Complete each run in one transaction:
//! 1. take a transaction-scoped advisory lock on the (fueler, training) pair
//! 2. lock the referenced fueler and training rows `FOR SHARE` (missing row → `NotFound`)
//! 3. load the current record for the pair `FOR UPDATE`
//! 4. run the pure ledger decision
//! 5. insert or update the current record, insert the history entry, commit
//!
//! Any error before the commit drops the transaction, which rolls it back. Different pairs
//! hash to different advisory keys and do not block each other.
//!
//! Completing an assignment locks the assignment row `FOR UPDATE` first, then follows the
//! same steps and updates the assignment before the same commit.
//!
//! ## Error mapping
//!
//! | PostgreSQL code | StoreError | Scenario |
//! |-----------------|------------|----------|
//! | `23505` | `Domain(Conflict)` | duplicate training name, second profile for an account, pair race, second open assignment |
//! | `23503` | `Domain(Conflict)` | deleting a training/fueler that ledger or assignment rows still reference |
//! | `23514` | `Domain(Validation)` | check constraint (negative validity, expiry before completion) |
//! | `40001`, `40P01` | `TransactionFailure` | serialization failure, deadlock |
//! | other / pool / IO | `TransactionFailure` | connection problems |

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use fuelcert_certification::{
    Assignment, AssignmentCompletion, AssignmentStatus, CalendarRange, CertificationHistoryEntry, CertificationKey,
    CertificationRecord, CompleteAssignment, CompleteCertification, CompletionOutcome, CompletionWrite,
    CreateCertification, CreationWrite, decide_assignment_completion, decide_complete, decide_create,
};
use fuelcert_core::{AssignmentId, CertificationId, DomainError, FuelerId, HistoryEntryId, TrainingId, UserId};
use fuelcert_fuelers::{Fueler, FuelerStatus};
use fuelcert_training::{Training, ValidityPeriod};

use super::{
    AssignmentFilter, AssignmentStore, CatalogStore, CertificationFilter, LedgerStore, RegistryStore, StoreError,
    StoreResult,
};

/// Schema applied at startup. Idempotent.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS trainings (
    id                   UUID PRIMARY KEY,
    name                 TEXT NOT NULL,
    description          TEXT NOT NULL DEFAULT '',
    validity_period_days INTEGER NULL CHECK (validity_period_days IS NULL OR validity_period_days > 0),
    aircraft_type        TEXT NULL,
    created_at           TIMESTAMPTZ NOT NULL,
    updated_at           TIMESTAMPTZ NOT NULL,
    CONSTRAINT trainings_name_key UNIQUE (name)
);

CREATE TABLE IF NOT EXISTS fuelers (
    id            UUID PRIMARY KEY,
    user_id       UUID NOT NULL,
    name          TEXT NOT NULL,
    handheld_name TEXT NULL,
    status        TEXT NOT NULL CHECK (status IN ('active', 'inactive')),
    created_at    TIMESTAMPTZ NOT NULL,
    updated_at    TIMESTAMPTZ NOT NULL,
    CONSTRAINT fuelers_user_id_key UNIQUE (user_id)
);

CREATE TABLE IF NOT EXISTS fueler_certifications (
    id             UUID PRIMARY KEY,
    fueler_id      UUID NOT NULL REFERENCES fuelers (id) ON DELETE RESTRICT,
    training_id    UUID NOT NULL REFERENCES trainings (id) ON DELETE RESTRICT,
    completed_date DATE NOT NULL,
    expiry_date    DATE NULL,
    notes          TEXT NULL,
    certified_by   UUID NULL,
    created_at     TIMESTAMPTZ NOT NULL,
    updated_at     TIMESTAMPTZ NOT NULL,
    CONSTRAINT fueler_certifications_pair_key UNIQUE (fueler_id, training_id),
    CONSTRAINT fueler_certifications_expiry_check CHECK (expiry_date IS NULL OR expiry_date >= completed_date)
);

CREATE INDEX IF NOT EXISTS fueler_certifications_completed_idx ON fueler_certifications (completed_date);
CREATE INDEX IF NOT EXISTS fueler_certifications_expiry_idx ON fueler_certifications (expiry_date);

CREATE TABLE IF NOT EXISTS certification_history (
    id             UUID PRIMARY KEY,
    fueler_id      UUID NOT NULL REFERENCES fuelers (id) ON DELETE RESTRICT,
    training_id    UUID NOT NULL REFERENCES trainings (id) ON DELETE RESTRICT,
    completed_date DATE NOT NULL,
    expiry_date    DATE NULL,
    notes          TEXT NULL,
    certified_by   UUID NULL,
    created_at     TIMESTAMPTZ NOT NULL
);

CREATE INDEX IF NOT EXISTS certification_history_pair_idx
    ON certification_history (fueler_id, training_id, created_at DESC);

CREATE TABLE IF NOT EXISTS training_assignments (
    id               UUID PRIMARY KEY,
    fueler_id        UUID NOT NULL REFERENCES fuelers (id) ON DELETE RESTRICT,
    training_id      UUID NOT NULL REFERENCES trainings (id) ON DELETE RESTRICT,
    due_date         DATE NULL,
    notes            TEXT NULL,
    status           TEXT NOT NULL CHECK (status IN ('assigned', 'completed')),
    assigned_by      UUID NULL,
    assigned_at      TIMESTAMPTZ NOT NULL,
    completed_at     TIMESTAMPTZ NULL,
    certification_id UUID NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS training_assignments_open_pair_key
    ON training_assignments (fueler_id, training_id) WHERE status = 'assigned';
"#;

const RECORD_COLUMNS: &str =
    "id, fueler_id, training_id, completed_date, expiry_date, notes, certified_by, created_at, updated_at";

const HISTORY_COLUMNS: &str =
    "id, fueler_id, training_id, completed_date, expiry_date, notes, certified_by, created_at";

const ASSIGNMENT_COLUMNS: &str =
    "id, fueler_id, training_id, due_date, notes, status, assigned_by, assigned_at, completed_at, certification_id";

/// Postgres-backed store for the catalog, the registry and the ledger.
///
/// `Send + Sync`; clones share the pool.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: Arc<PgPool>,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect and apply the schema.
    #[instrument(skip(database_url), err)]
    pub async fn connect(database_url: &str, max_connections: u32) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("migrate", e))?;
        tracing::info!("database schema applied");
        Ok(())
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))
    }
}

#[async_trait]
impl CatalogStore for PostgresStore {
    #[instrument(skip(self, training), fields(training_id = %training.id), err)]
    async fn insert_training(&self, training: &Training) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO trainings (id, name, description, validity_period_days, aircraft_type, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*training.id.as_uuid())
        .bind(&training.name)
        .bind(&training.description)
        .bind(validity_column(training.validity))
        .bind(&training.aircraft_type)
        .bind(training.created_at)
        .bind(training.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::conflict(format!("training name '{}' is already in use", training.name)).into()
            } else {
                map_sqlx_error("insert_training", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self, training), fields(training_id = %training.id), err)]
    async fn save_training(&self, training: &Training) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE trainings
            SET description = $2, validity_period_days = $3, aircraft_type = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(*training.id.as_uuid())
        .bind(&training.description)
        .bind(validity_column(training.validity))
        .bind(&training.aircraft_type)
        .bind(training.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_training", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("training {}", training.id)).into());
        }
        Ok(())
    }

    #[instrument(skip(self), fields(training_id = %id), err)]
    async fn get_training(&self, id: TrainingId) -> StoreResult<Option<Training>> {
        let row = sqlx::query("SELECT * FROM trainings WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_training", e))?;
        row.as_ref().map(training_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_trainings(&self) -> StoreResult<Vec<Training>> {
        let rows = sqlx::query("SELECT * FROM trainings ORDER BY lower(name), id")
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_trainings", e))?;
        rows.iter().map(training_from_row).collect()
    }

    #[instrument(skip(self), fields(training_id = %id), err)]
    async fn delete_training(&self, id: TrainingId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM trainings WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    DomainError::conflict(format!("training {id} is referenced by certifications or assignments")).into()
                } else {
                    map_sqlx_error("delete_training", e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("training {id}")).into());
        }
        Ok(())
    }
}

#[async_trait]
impl RegistryStore for PostgresStore {
    #[instrument(skip(self, fueler), fields(fueler_id = %fueler.id, user_id = %fueler.user_id), err)]
    async fn insert_fueler(&self, fueler: &Fueler) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO fuelers (id, user_id, name, handheld_name, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(*fueler.id.as_uuid())
        .bind(*fueler.user_id.as_uuid())
        .bind(&fueler.name)
        .bind(&fueler.handheld_name)
        .bind(fueler.status.as_str())
        .bind(fueler.created_at)
        .bind(fueler.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::conflict(format!("user {} already has a fueler profile", fueler.user_id)).into()
            } else {
                map_sqlx_error("insert_fueler", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self, fueler), fields(fueler_id = %fueler.id), err)]
    async fn save_fueler(&self, fueler: &Fueler) -> StoreResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE fuelers
            SET name = $2, handheld_name = $3, status = $4, updated_at = $5
            WHERE id = $1
            "#,
        )
        .bind(*fueler.id.as_uuid())
        .bind(&fueler.name)
        .bind(&fueler.handheld_name)
        .bind(fueler.status.as_str())
        .bind(fueler.updated_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("save_fueler", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("fueler {}", fueler.id)).into());
        }
        Ok(())
    }

    #[instrument(skip(self), fields(fueler_id = %id), err)]
    async fn get_fueler(&self, id: FuelerId) -> StoreResult<Option<Fueler>> {
        let row = sqlx::query("SELECT * FROM fuelers WHERE id = $1")
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_fueler", e))?;
        row.as_ref().map(fueler_from_row).transpose()
    }

    #[instrument(skip(self), fields(user_id = %user_id), err)]
    async fn find_fueler_by_user(&self, user_id: UserId) -> StoreResult<Option<Fueler>> {
        let row = sqlx::query("SELECT * FROM fuelers WHERE user_id = $1")
            .bind(*user_id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_fueler_by_user", e))?;
        row.as_ref().map(fueler_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_fuelers(&self, status: Option<FuelerStatus>) -> StoreResult<Vec<Fueler>> {
        let rows = sqlx::query(
            "SELECT * FROM fuelers WHERE ($1::text IS NULL OR status = $1) ORDER BY lower(name), id",
        )
        .bind(status.map(|s| s.as_str()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_fuelers", e))?;
        rows.iter().map(fueler_from_row).collect()
    }

    #[instrument(skip(self), fields(fueler_id = %id), err)]
    async fn delete_fueler(&self, id: FuelerId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM fuelers WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    DomainError::conflict(format!("fueler {id} is referenced by certifications or assignments")).into()
                } else {
                    map_sqlx_error("delete_fueler", e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("fueler {id}")).into());
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerStore for PostgresStore {
    #[instrument(
        skip(self, cmd, now),
        fields(fueler_id = %cmd.fueler_id, training_id = %cmd.training_id),
        err
    )]
    async fn create_certification(
        &self,
        cmd: &CreateCertification,
        audit_history: bool,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<CreationWrite> {
        let key = cmd.key();
        let mut tx = self.begin().await?;

        lock_pair(&mut tx, key).await?;
        let training = lock_references(&mut tx, key).await?;
        let existing = load_record_for_update(&mut tx, key).await?;

        let write = decide_create(existing.as_ref(), cmd, &training, audit_history, today, now)?;

        insert_record(&mut tx, &write.record).await?;
        if let Some(history) = &write.history {
            insert_history(&mut tx, history).await?;
        }

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::debug!(certification_id = %write.record.id, "certification created");
        Ok(write)
    }

    #[instrument(
        skip(self, cmd, now),
        fields(fueler_id = %cmd.fueler_id, training_id = %cmd.training_id),
        err
    )]
    async fn complete_certification(
        &self,
        cmd: &CompleteCertification,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<CompletionWrite> {
        let key = cmd.key();
        let mut tx = self.begin().await?;

        lock_pair(&mut tx, key).await?;
        let training = lock_references(&mut tx, key).await?;
        let existing = load_record_for_update(&mut tx, key).await?;

        let write = decide_complete(existing, cmd, &training, today, now)?;
        write_completion(&mut tx, &write).await?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::debug!(
            certification_id = %write.record.id,
            outcome = ?write.outcome,
            "certification completed"
        );
        Ok(write)
    }

    #[instrument(skip(self), fields(certification_id = %id), err)]
    async fn get_certification(&self, id: CertificationId) -> StoreResult<Option<CertificationRecord>> {
        let row = sqlx::query(&format!("SELECT {RECORD_COLUMNS} FROM fueler_certifications WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_certification", e))?;
        row.as_ref().map(record_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_certifications(&self, filter: &CertificationFilter) -> StoreResult<Vec<CertificationRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS} FROM fueler_certifications
            WHERE ($1::uuid IS NULL OR fueler_id = $1)
              AND ($2::uuid IS NULL OR training_id = $2)
            ORDER BY completed_date DESC, id
            "#
        ))
        .bind(filter.fueler_id.map(Uuid::from))
        .bind(filter.training_id.map(Uuid::from))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_certifications", e))?;
        rows.iter().map(record_from_row).collect()
    }

    #[instrument(skip(self), fields(start = %range.start(), end = %range.end()), err)]
    async fn certifications_in_range(&self, range: CalendarRange) -> StoreResult<Vec<CertificationRecord>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {RECORD_COLUMNS} FROM fueler_certifications
            WHERE completed_date BETWEEN $1 AND $2
               OR expiry_date BETWEEN $1 AND $2
            "#
        ))
        .bind(range.start())
        .bind(range.end())
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("certifications_in_range", e))?;
        rows.iter().map(record_from_row).collect()
    }

    #[instrument(skip(self), fields(certification_id = %id), err)]
    async fn delete_certification(&self, id: CertificationId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM fueler_certifications WHERE id = $1")
            .bind(*id.as_uuid())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_certification", e))?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found(format!("certification {id}")).into());
        }
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_history(&self, filter: &CertificationFilter) -> StoreResult<Vec<CertificationHistoryEntry>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {HISTORY_COLUMNS} FROM certification_history
            WHERE ($1::uuid IS NULL OR fueler_id = $1)
              AND ($2::uuid IS NULL OR training_id = $2)
            ORDER BY created_at DESC, id DESC
            "#
        ))
        .bind(filter.fueler_id.map(Uuid::from))
        .bind(filter.training_id.map(Uuid::from))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_history", e))?;
        rows.iter().map(history_from_row).collect()
    }

    #[instrument(skip(self), fields(history_id = %id), err)]
    async fn get_history_entry(&self, id: HistoryEntryId) -> StoreResult<Option<CertificationHistoryEntry>> {
        let row = sqlx::query(&format!("SELECT {HISTORY_COLUMNS} FROM certification_history WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_history_entry", e))?;
        row.as_ref().map(history_from_row).transpose()
    }
}

#[async_trait]
impl AssignmentStore for PostgresStore {
    #[instrument(
        skip(self, assignment),
        fields(assignment_id = %assignment.id, fueler_id = %assignment.fueler_id, training_id = %assignment.training_id),
        err
    )]
    async fn insert_assignment(&self, assignment: &Assignment) -> StoreResult<()> {
        let mut tx = self.begin().await?;
        lock_references(&mut tx, assignment.key()).await?;

        sqlx::query(&format!(
            "INSERT INTO training_assignments ({ASSIGNMENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(*assignment.id.as_uuid())
        .bind(*assignment.fueler_id.as_uuid())
        .bind(*assignment.training_id.as_uuid())
        .bind(assignment.due_date)
        .bind(&assignment.notes)
        .bind(assignment.status.as_str())
        .bind(assignment.assigned_by.map(Uuid::from))
        .bind(assignment.assigned_at)
        .bind(assignment.completed_at)
        .bind(assignment.certification_id.map(Uuid::from))
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                DomainError::conflict(format!("{} already has an open assignment", assignment.key())).into()
            } else {
                map_sqlx_error("insert_assignment", e)
            }
        })?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;
        Ok(())
    }

    #[instrument(skip(self), fields(assignment_id = %id), err)]
    async fn get_assignment(&self, id: AssignmentId) -> StoreResult<Option<Assignment>> {
        let row = sqlx::query(&format!("SELECT {ASSIGNMENT_COLUMNS} FROM training_assignments WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get_assignment", e))?;
        row.as_ref().map(assignment_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn list_assignments(&self, filter: &AssignmentFilter) -> StoreResult<Vec<Assignment>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {ASSIGNMENT_COLUMNS} FROM training_assignments
            WHERE ($1::uuid IS NULL OR fueler_id = $1)
              AND ($2::uuid IS NULL OR training_id = $2)
              AND ($3::text IS NULL OR status = $3)
            ORDER BY (status = 'assigned') DESC, due_date ASC NULLS LAST, assigned_at DESC, id
            "#
        ))
        .bind(filter.fueler_id.map(Uuid::from))
        .bind(filter.training_id.map(Uuid::from))
        .bind(filter.status.map(|s| s.as_str()))
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_assignments", e))?;
        rows.iter().map(assignment_from_row).collect()
    }

    #[instrument(skip(self, cmd, now), fields(assignment_id = %cmd.assignment_id), err)]
    async fn complete_assignment(
        &self,
        cmd: &CompleteAssignment,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> StoreResult<AssignmentCompletion> {
        let mut tx = self.begin().await?;

        let row = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM training_assignments WHERE id = $1 FOR UPDATE"
        ))
        .bind(*cmd.assignment_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("load_assignment_for_update", e))?;
        let assignment = match row {
            Some(row) => assignment_from_row(&row)?,
            None => return Err(DomainError::not_found(format!("assignment {}", cmd.assignment_id)).into()),
        };

        let key = assignment.key();
        lock_pair(&mut tx, key).await?;
        let training = lock_references(&mut tx, key).await?;
        let existing = load_record_for_update(&mut tx, key).await?;

        let done = decide_assignment_completion(assignment, existing, cmd, &training, today, now)?;
        write_completion(&mut tx, &done.completion).await?;

        sqlx::query(
            r#"
            UPDATE training_assignments
            SET status = $2, completed_at = $3, certification_id = $4
            WHERE id = $1
            "#,
        )
        .bind(*done.assignment.id.as_uuid())
        .bind(done.assignment.status.as_str())
        .bind(done.assignment.completed_at)
        .bind(done.assignment.certification_id.map(Uuid::from))
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("close_assignment", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        tracing::debug!(
            certification_id = %done.completion.record.id,
            outcome = ?done.completion.outcome,
            "assignment completed"
        );
        Ok(done)
    }
}

/// Insert or update the current record, then append its history entry.
async fn write_completion(tx: &mut Transaction<'_, Postgres>, write: &CompletionWrite) -> StoreResult<()> {
    match write.outcome {
        CompletionOutcome::Created => insert_record(tx, &write.record).await?,
        CompletionOutcome::Updated => update_record(tx, &write.record).await?,
    }
    insert_history(tx, &write.history).await
}

/// Serialize writers on one pair for the rest of the transaction.
async fn lock_pair(tx: &mut Transaction<'_, Postgres>, key: CertificationKey) -> StoreResult<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(format!("fueler_certifications:{}:{}", key.fueler_id, key.training_id))
        .execute(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_pair", e))?;
    Ok(())
}

/// Resolve both references and keep them from being deleted until commit.
async fn lock_references(tx: &mut Transaction<'_, Postgres>, key: CertificationKey) -> StoreResult<Training> {
    let fueler = sqlx::query("SELECT id FROM fuelers WHERE id = $1 FOR SHARE")
        .bind(*key.fueler_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_fueler", e))?;
    if fueler.is_none() {
        return Err(DomainError::not_found(format!("fueler {}", key.fueler_id)).into());
    }

    let training = sqlx::query("SELECT * FROM trainings WHERE id = $1 FOR SHARE")
        .bind(*key.training_id.as_uuid())
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| map_sqlx_error("lock_training", e))?;

    match training {
        Some(row) => training_from_row(&row),
        None => Err(DomainError::not_found(format!("training {}", key.training_id)).into()),
    }
}

async fn load_record_for_update(
    tx: &mut Transaction<'_, Postgres>,
    key: CertificationKey,
) -> StoreResult<Option<CertificationRecord>> {
    let row = sqlx::query(&format!(
        "SELECT {RECORD_COLUMNS} FROM fueler_certifications WHERE fueler_id = $1 AND training_id = $2 FOR UPDATE"
    ))
    .bind(*key.fueler_id.as_uuid())
    .bind(*key.training_id.as_uuid())
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("load_record_for_update", e))?;
    row.as_ref().map(record_from_row).transpose()
}

async fn insert_record(tx: &mut Transaction<'_, Postgres>, record: &CertificationRecord) -> StoreResult<()> {
    sqlx::query(&format!(
        "INSERT INTO fueler_certifications ({RECORD_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
    ))
    .bind(*record.id.as_uuid())
    .bind(*record.fueler_id.as_uuid())
    .bind(*record.training_id.as_uuid())
    .bind(record.completed_date)
    .bind(record.expiry_date)
    .bind(&record.notes)
    .bind(record.certified_by.map(Uuid::from))
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            DomainError::conflict(format!("a certification already exists for {}", record.key())).into()
        } else {
            map_sqlx_error("insert_record", e)
        }
    })?;
    Ok(())
}

async fn update_record(tx: &mut Transaction<'_, Postgres>, record: &CertificationRecord) -> StoreResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE fueler_certifications
        SET completed_date = $2, expiry_date = $3, notes = $4, certified_by = $5, updated_at = $6
        WHERE id = $1
        "#,
    )
    .bind(*record.id.as_uuid())
    .bind(record.completed_date)
    .bind(record.expiry_date)
    .bind(&record.notes)
    .bind(record.certified_by.map(Uuid::from))
    .bind(record.updated_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("update_record", e))?;

    if result.rows_affected() != 1 {
        return Err(StoreError::TransactionFailure(format!(
            "certification {} vanished during update",
            record.id
        )));
    }
    Ok(())
}

async fn insert_history(tx: &mut Transaction<'_, Postgres>, entry: &CertificationHistoryEntry) -> StoreResult<()> {
    sqlx::query(&format!(
        "INSERT INTO certification_history ({HISTORY_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
    ))
    .bind(*entry.id.as_uuid())
    .bind(*entry.fueler_id.as_uuid())
    .bind(*entry.training_id.as_uuid())
    .bind(entry.completed_date)
    .bind(entry.expiry_date)
    .bind(&entry.notes)
    .bind(entry.certified_by.map(Uuid::from))
    .bind(entry.created_at)
    .execute(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("insert_history", e))?;
    Ok(())
}

fn validity_column(validity: ValidityPeriod) -> Option<i32> {
    validity.days().and_then(|d| i32::try_from(d).ok())
}

fn training_from_row(row: &PgRow) -> StoreResult<Training> {
    let decode = |e| map_sqlx_error("decode_training", e);
    let days: Option<i32> = row.try_get("validity_period_days").map_err(decode)?;
    Ok(Training {
        id: TrainingId::from_uuid(row.try_get("id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        description: row.try_get("description").map_err(decode)?,
        validity: ValidityPeriod::from_days(days.map(i64::from))?,
        aircraft_type: row.try_get("aircraft_type").map_err(decode)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn fueler_from_row(row: &PgRow) -> StoreResult<Fueler> {
    let decode = |e| map_sqlx_error("decode_fueler", e);
    let status: String = row.try_get("status").map_err(decode)?;
    Ok(Fueler {
        id: FuelerId::from_uuid(row.try_get("id").map_err(decode)?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(decode)?),
        name: row.try_get("name").map_err(decode)?,
        handheld_name: row.try_get("handheld_name").map_err(decode)?,
        status: FuelerStatus::parse(&status)?,
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn record_from_row(row: &PgRow) -> StoreResult<CertificationRecord> {
    let decode = |e| map_sqlx_error("decode_certification", e);
    let certified_by: Option<Uuid> = row.try_get("certified_by").map_err(decode)?;
    Ok(CertificationRecord {
        id: CertificationId::from_uuid(row.try_get("id").map_err(decode)?),
        fueler_id: FuelerId::from_uuid(row.try_get("fueler_id").map_err(decode)?),
        training_id: TrainingId::from_uuid(row.try_get("training_id").map_err(decode)?),
        completed_date: row.try_get("completed_date").map_err(decode)?,
        expiry_date: row.try_get("expiry_date").map_err(decode)?,
        notes: row.try_get("notes").map_err(decode)?,
        certified_by: certified_by.map(UserId::from_uuid),
        created_at: row.try_get("created_at").map_err(decode)?,
        updated_at: row.try_get("updated_at").map_err(decode)?,
    })
}

fn history_from_row(row: &PgRow) -> StoreResult<CertificationHistoryEntry> {
    let decode = |e| map_sqlx_error("decode_history", e);
    let certified_by: Option<Uuid> = row.try_get("certified_by").map_err(decode)?;
    Ok(CertificationHistoryEntry {
        id: HistoryEntryId::from_uuid(row.try_get("id").map_err(decode)?),
        fueler_id: FuelerId::from_uuid(row.try_get("fueler_id").map_err(decode)?),
        training_id: TrainingId::from_uuid(row.try_get("training_id").map_err(decode)?),
        completed_date: row.try_get("completed_date").map_err(decode)?,
        expiry_date: row.try_get("expiry_date").map_err(decode)?,
        notes: row.try_get("notes").map_err(decode)?,
        certified_by: certified_by.map(UserId::from_uuid),
        created_at: row.try_get("created_at").map_err(decode)?,
    })
}

fn assignment_from_row(row: &PgRow) -> StoreResult<Assignment> {
    let decode = |e| map_sqlx_error("decode_assignment", e);
    let status: String = row.try_get("status").map_err(decode)?;
    let assigned_by: Option<Uuid> = row.try_get("assigned_by").map_err(decode)?;
    let certification_id: Option<Uuid> = row.try_get("certification_id").map_err(decode)?;
    Ok(Assignment {
        id: AssignmentId::from_uuid(row.try_get("id").map_err(decode)?),
        fueler_id: FuelerId::from_uuid(row.try_get("fueler_id").map_err(decode)?),
        training_id: TrainingId::from_uuid(row.try_get("training_id").map_err(decode)?),
        due_date: row.try_get("due_date").map_err(decode)?,
        notes: row.try_get("notes").map_err(decode)?,
        status: AssignmentStatus::parse(&status)?,
        assigned_by: assigned_by.map(UserId::from_uuid),
        assigned_at: row.try_get("assigned_at").map_err(decode)?,
        completed_at: row.try_get("completed_at").map_err(decode)?,
        certification_id: certification_id.map(CertificationId::from_uuid),
    })
}

/// Map sqlx errors to `StoreError`; see the table in the module docs.
fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") | Some("23503") => DomainError::conflict(msg).into(),
                Some("23514") => DomainError::validation(msg).into(),
                _ => StoreError::TransactionFailure(msg),
            }
        }
        sqlx::Error::PoolClosed => StoreError::TransactionFailure(format!("connection pool closed in {operation}")),
        sqlx::Error::RowNotFound => StoreError::TransactionFailure(format!("unexpected row not found in {operation}")),
        _ => StoreError::TransactionFailure(format!("sqlx error in {operation}: {err}")),
    }
}

fn database_code(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().map(|c| c.into_owned()),
        _ => None,
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    database_code(err).as_deref() == Some("23505")
}

fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    database_code(err).as_deref() == Some("23503")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity_maps_to_nullable_integer() {
        assert_eq!(validity_column(ValidityPeriod::NonExpiring), None);
        assert_eq!(
            validity_column(ValidityPeriod::from_days(Some(365)).unwrap()),
            Some(365)
        );
    }

    #[test]
    fn pool_errors_are_transaction_failures() {
        assert!(matches!(
            map_sqlx_error("list_trainings", sqlx::Error::PoolClosed),
            StoreError::TransactionFailure(_)
        ));
        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[test]
    fn schema_declares_pair_uniqueness() {
        assert!(SCHEMA.contains("UNIQUE (fueler_id, training_id)"));
        assert!(SCHEMA.contains("ON DELETE RESTRICT"));
        assert!(SCHEMA.contains("WHERE status = 'assigned'"));
    }

    mod live {
        use chrono::Duration;
        use fuelcert_certification::AssignTraining;
        use fuelcert_fuelers::RegisterFueler;
        use fuelcert_training::RegisterTraining;

        use super::*;

        async fn store() -> Option<PostgresStore> {
            let url = std::env::var("DATABASE_URL").ok()?;
            Some(PostgresStore::connect(&url, 8).await.unwrap())
        }

        async fn seed(store: &PostgresStore, days: i64) -> (Fueler, Training) {
            let tag = Uuid::now_v7();
            let training = Training::register(RegisterTraining {
                training_id: TrainingId::new(),
                name: format!("Wing Walk {tag}"),
                description: None,
                validity_period_days: Some(days),
                aircraft_type: None,
                occurred_at: Utc::now(),
            })
            .unwrap();
            store.insert_training(&training).await.unwrap();

            let fueler = Fueler::register(RegisterFueler {
                fueler_id: FuelerId::new(),
                user_id: UserId::new(),
                name: format!("Fueler {tag}"),
                handheld_name: None,
                occurred_at: Utc::now(),
            })
            .unwrap();
            store.insert_fueler(&fueler).await.unwrap();
            (fueler, training)
        }

        fn complete(fueler: &Fueler, training: &Training, notes: &str) -> CompleteCertification {
            CompleteCertification {
                fueler_id: fueler.id,
                training_id: training.id,
                completed_date: Utc::now().date_naive(),
                notes: Some(notes.to_string()),
                certified_by: None,
            }
        }

        fn pair(fueler: &Fueler, training: &Training) -> CertificationFilter {
            CertificationFilter {
                fueler_id: Some(fueler.id),
                training_id: Some(training.id),
            }
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        #[ignore = "requires DATABASE_URL"]
        async fn wing_walk_upsert_and_concurrent_completes() {
            let Some(store) = store().await else {
                return;
            };
            let today = Utc::now().date_naive();

            let (fueler, wing_walk) = seed(&store, 30).await;
            let first = store
                .complete_certification(&complete(&fueler, &wing_walk, "Initial"), today, Utc::now())
                .await
                .unwrap();
            let second = store
                .complete_certification(&complete(&fueler, &wing_walk, "Recurrent"), today, Utc::now())
                .await
                .unwrap();
            assert_eq!(first.outcome, CompletionOutcome::Created);
            assert_eq!(second.outcome, CompletionOutcome::Updated);
            assert_eq!(second.record.id, first.record.id);
            assert_eq!(second.record.expiry_date, Some(today + Duration::days(30)));
            assert_eq!(store.list_certifications(&pair(&fueler, &wing_walk)).await.unwrap().len(), 1);
            assert_eq!(store.list_history(&pair(&fueler, &wing_walk)).await.unwrap().len(), 2);

            let (fueler, fresh) = seed(&store, 365).await;
            let mut handles = Vec::new();
            for i in 0..10 {
                let store = store.clone();
                let cmd = complete(&fueler, &fresh, &format!("run {i}"));
                handles.push(tokio::spawn(async move {
                    store.complete_certification(&cmd, today, Utc::now()).await
                }));
            }
            let mut created = 0;
            for handle in handles {
                if handle.await.unwrap().unwrap().outcome == CompletionOutcome::Created {
                    created += 1;
                }
            }
            assert_eq!(created, 1);
            assert_eq!(store.list_certifications(&pair(&fueler, &fresh)).await.unwrap().len(), 1);
            assert_eq!(store.list_history(&pair(&fueler, &fresh)).await.unwrap().len(), 10);
        }

        #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
        #[ignore = "requires DATABASE_URL"]
        async fn assignment_completion_commits_with_the_ledger_write() {
            let Some(store) = store().await else {
                return;
            };
            let today = Utc::now().date_naive();
            let (fueler, training) = seed(&store, 90).await;

            let assignment = Assignment::assign(
                AssignTraining {
                    assignment_id: AssignmentId::new(),
                    fueler_id: fueler.id,
                    training_id: training.id,
                    due_date: Some(today + Duration::days(7)),
                    notes: None,
                    assigned_by: None,
                },
                today,
                Utc::now(),
            )
            .unwrap();
            store.insert_assignment(&assignment).await.unwrap();

            let duplicate = Assignment {
                id: AssignmentId::new(),
                ..assignment.clone()
            };
            assert!(matches!(
                store.insert_assignment(&duplicate).await,
                Err(StoreError::Domain(DomainError::Conflict(_)))
            ));

            let cmd = CompleteAssignment {
                assignment_id: assignment.id,
                completed_date: today,
                notes: Some("done".to_string()),
                certified_by: None,
            };
            let done = store.complete_assignment(&cmd, today, Utc::now()).await.unwrap();
            assert_eq!(done.completion.outcome, CompletionOutcome::Created);

            let stored = store.get_assignment(assignment.id).await.unwrap().unwrap();
            assert_eq!(stored.status, AssignmentStatus::Completed);
            assert_eq!(stored.certification_id, Some(done.completion.record.id));
            assert!(matches!(
                store.complete_assignment(&cmd, today, Utc::now()).await,
                Err(StoreError::Domain(DomainError::Conflict(_)))
            ));
            assert_eq!(store.list_history(&pair(&fueler, &training)).await.unwrap().len(), 1);
        }
    }
}
