//! Durable SQLite [`RunStore`] backend (feature `sqlite`).
//!
//! Schema is created inline on connect with `CREATE TABLE IF NOT EXISTS`,
//! so a fresh database file is usable immediately. JSON-shaped columns
//! (controls, persona, metrics, payloads) are stored as TEXT and round-trip
//! through `serde_json`; timestamps are RFC 3339 TEXT.
//!
//! Per-run event ids come from the `run_events` table itself: each insert
//! computes `MAX(seq) + 1` for the run inside the insert statement, so ids
//! stay strictly increasing without a separate counter table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::instrument;

use crate::event_bus::{EventKind, WireEvent};
use crate::model::{BadgeAward, Participant, PersonaSnapshot, Report, Run, Turn, TurnMetrics};
use crate::report::WrappedReport;
use crate::types::{Phase, RunControls, RunStatus};

use super::{Result, RunStore, StoreError};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    topic TEXT NOT NULL,
    status TEXT NOT NULL,
    phase TEXT NOT NULL,
    controls_json TEXT NOT NULL,
    max_turns INTEGER NOT NULL,
    target_min_tokens INTEGER NOT NULL,
    target_max_tokens INTEGER NOT NULL,
    turn_count INTEGER NOT NULL DEFAULT 0,
    started_at TEXT,
    ended_at TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS participants (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id),
    user_handle TEXT NOT NULL,
    seat_order INTEGER NOT NULL,
    ready INTEGER NOT NULL DEFAULT 0,
    persona_json TEXT,
    joined_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS turns (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id),
    turn_index INTEGER NOT NULL,
    speaker_participant_id TEXT NOT NULL,
    phase TEXT NOT NULL,
    content TEXT NOT NULL,
    metrics_json TEXT NOT NULL,
    model_metadata_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (run_id, turn_index)
);

CREATE TABLE IF NOT EXISTS run_events (
    run_id TEXT NOT NULL REFERENCES runs(id),
    seq INTEGER NOT NULL,
    kind TEXT NOT NULL,
    turn_index INTEGER,
    payload_json TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (run_id, seq)
);

CREATE TABLE IF NOT EXISTS badges (
    id TEXT PRIMARY KEY,
    run_id TEXT NOT NULL REFERENCES runs(id),
    turn_id TEXT NOT NULL,
    turn_index INTEGER NOT NULL,
    badge_key TEXT NOT NULL,
    reason TEXT NOT NULL,
    confidence REAL NOT NULL,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS reports (
    run_id TEXT PRIMARY KEY REFERENCES runs(id),
    id TEXT NOT NULL,
    summary TEXT NOT NULL,
    wrapped_json TEXT NOT NULL,
    created_at TEXT NOT NULL
);
"#;

/// SQLite-backed run store sharing one connection pool.
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl std::fmt::Debug for SqliteRunStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRunStore").finish()
    }
}

impl SqliteRunStore {
    /// Connect (or create) a SQLite database at `database_url`.
    /// Example URL: "sqlite://quarrel.db"
    #[instrument(skip(database_url))]
    pub async fn connect(database_url: &str) -> Result<Self> {
        // SQLite will not create a missing database file on its own.
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            if path != ":memory:" && !std::path::Path::new(path).exists() {
                std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .map_err(|e| StoreError::backend(format!("create {path}: {e}")))?;
            }
        }
        let pool = SqlitePool::connect(database_url)
            .await
            .map_err(|e| StoreError::backend(format!("connect error: {e}")))?;
        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| StoreError::backend(format!("schema setup: {e}")))?;
        Ok(Self { pool })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|source| StoreError::Serde { source })
}

fn from_json<T: serde::de::DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw).map_err(|source| StoreError::Serde { source })
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn parse_optional_timestamp(raw: Option<String>) -> Option<DateTime<Utc>> {
    raw.map(|s| parse_timestamp(&s))
}

fn decode_run(row: &SqliteRow) -> Result<Run> {
    let controls_json: String = row.get("controls_json");
    let controls: RunControls = from_json(&controls_json)?;
    let status: String = row.get("status");
    let phase: String = row.get("phase");
    let started_at: Option<String> = row.get("started_at");
    let ended_at: Option<String> = row.get("ended_at");
    let created_at: String = row.get("created_at");
    Ok(Run {
        id: row.get("id"),
        topic: row.get("topic"),
        status: RunStatus::decode(&status),
        phase: Phase::decode(&phase),
        controls,
        max_turns: row.get::<i64, _>("max_turns") as u32,
        target_min_tokens: row.get::<i64, _>("target_min_tokens") as u32,
        target_max_tokens: row.get::<i64, _>("target_max_tokens") as u32,
        turn_count: row.get::<i64, _>("turn_count") as u32,
        started_at: parse_optional_timestamp(started_at),
        ended_at: parse_optional_timestamp(ended_at),
        created_at: parse_timestamp(&created_at),
    })
}

fn decode_participant(row: &SqliteRow) -> Result<Participant> {
    let persona_json: Option<String> = row.get("persona_json");
    let persona: Option<PersonaSnapshot> = match persona_json {
        Some(raw) => Some(from_json(&raw)?),
        None => None,
    };
    let joined_at: String = row.get("joined_at");
    Ok(Participant {
        id: row.get("id"),
        run_id: row.get("run_id"),
        user_handle: row.get("user_handle"),
        seat_order: row.get::<i64, _>("seat_order") as u32,
        ready: row.get::<i64, _>("ready") != 0,
        persona,
        joined_at: parse_timestamp(&joined_at),
    })
}

fn decode_turn(row: &SqliteRow) -> Result<Turn> {
    let metrics_json: String = row.get("metrics_json");
    let metrics: TurnMetrics = from_json(&metrics_json)?;
    let model_metadata_json: String = row.get("model_metadata_json");
    let model_metadata: Value = from_json(&model_metadata_json)?;
    let phase: String = row.get("phase");
    let created_at: String = row.get("created_at");
    Ok(Turn {
        id: row.get("id"),
        run_id: row.get("run_id"),
        turn_index: row.get::<i64, _>("turn_index") as u32,
        speaker_participant_id: row.get("speaker_participant_id"),
        phase: Phase::decode(&phase),
        content: row.get("content"),
        metrics,
        model_metadata,
        created_at: parse_timestamp(&created_at),
    })
}

fn decode_event(row: &SqliteRow) -> Result<WireEvent> {
    let kind: String = row.get("kind");
    let payload_json: String = row.get("payload_json");
    let payload: Value = from_json(&payload_json)?;
    let turn_index: Option<i64> = row.get("turn_index");
    let created_at: String = row.get("created_at");
    Ok(WireEvent {
        id: row.get::<i64, _>("seq"),
        run_id: row.get("run_id"),
        kind: EventKind::decode(&kind),
        turn_index: turn_index.map(|i| i as u32),
        payload,
        created_at: parse_timestamp(&created_at),
    })
}

fn decode_badge(row: &SqliteRow) -> Result<BadgeAward> {
    let created_at: String = row.get("created_at");
    Ok(BadgeAward {
        id: row.get("id"),
        run_id: row.get("run_id"),
        turn_id: row.get("turn_id"),
        turn_index: row.get::<i64, _>("turn_index") as u32,
        badge_key: row.get("badge_key"),
        reason: row.get("reason"),
        confidence: row.get("confidence"),
        created_at: parse_timestamp(&created_at),
    })
}

#[async_trait]
impl RunStore for SqliteRunStore {
    #[instrument(skip(self, run), fields(run_id = %run.id), err)]
    async fn create_run(&self, run: &Run) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO runs (
                id, topic, status, phase, controls_json,
                max_turns, target_min_tokens, target_max_tokens, turn_count,
                started_at, ended_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&run.id)
        .bind(&run.topic)
        .bind(run.status.as_str())
        .bind(run.phase.as_str())
        .bind(to_json(&run.controls)?)
        .bind(i64::from(run.max_turns))
        .bind(i64::from(run.target_min_tokens))
        .bind(i64::from(run.target_max_tokens))
        .bind(i64::from(run.turn_count))
        .bind(run.started_at.map(|t| t.to_rfc3339()))
        .bind(run.ended_at.map(|t| t.to_rfc3339()))
        .bind(run.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                StoreError::conflict(format!("run {} already exists", run.id))
            }
            other => StoreError::backend(format!("insert run: {other}")),
        })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn fetch_run(&self, run_id: &str) -> Result<Option<Run>> {
        let row = sqlx::query("SELECT * FROM runs WHERE id = ?1")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::backend(format!("select run: {e}")))?;
        row.as_ref().map(decode_run).transpose()
    }

    #[instrument(skip(self, run), fields(run_id = %run.id), err)]
    async fn update_run(&self, run: &Run) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE runs SET
                status = ?2, phase = ?3, turn_count = ?4,
                started_at = ?5, ended_at = ?6
            WHERE id = ?1
            "#,
        )
        .bind(&run.id)
        .bind(run.status.as_str())
        .bind(run.phase.as_str())
        .bind(i64::from(run.turn_count))
        .bind(run.started_at.map(|t| t.to_rfc3339()))
        .bind(run.ended_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::backend(format!("update run: {e}")))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                what: "run",
                id: run.id.clone(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self, participant), fields(run_id = %participant.run_id), err)]
    async fn add_participant(&self, participant: &Participant) -> Result<()> {
        let persona_json = participant
            .persona
            .as_ref()
            .map(to_json)
            .transpose()?;
        sqlx::query(
            r#"
            INSERT INTO participants (
                id, run_id, user_handle, seat_order, ready, persona_json, joined_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&participant.id)
        .bind(&participant.run_id)
        .bind(&participant.user_handle)
        .bind(i64::from(participant.seat_order))
        .bind(i64::from(participant.ready))
        .bind(persona_json)
        .bind(participant.joined_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::backend(format!("insert participant: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn ready_participants(&self, run_id: &str) -> Result<Vec<Participant>> {
        let rows = sqlx::query(
            "SELECT * FROM participants WHERE run_id = ?1 AND ready = 1 ORDER BY seat_order",
        )
        .bind(run_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::backend(format!("select participants: {e}")))?;
        rows.iter().map(decode_participant).collect()
    }

    #[instrument(skip(self, turn), fields(run_id = %turn.run_id, turn_index = turn.turn_index), err)]
    async fn insert_turn(&self, turn: &Turn) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO turns (
                id, run_id, turn_index, speaker_participant_id, phase,
                content, metrics_json, model_metadata_json, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&turn.id)
        .bind(&turn.run_id)
        .bind(i64::from(turn.turn_index))
        .bind(&turn.speaker_participant_id)
        .bind(turn.phase.as_str())
        .bind(&turn.content)
        .bind(to_json(&turn.metrics)?)
        .bind(to_json(&turn.model_metadata)?)
        .bind(turn.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::conflict(
                format!("turn {} already recorded for run {}", turn.turn_index, turn.run_id),
            ),
            other => StoreError::backend(format!("insert turn: {other}")),
        })?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_turns(&self, run_id: &str) -> Result<Vec<Turn>> {
        let rows = sqlx::query("SELECT * FROM turns WHERE run_id = ?1 ORDER BY turn_index")
            .bind(run_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::backend(format!("select turns: {e}")))?;
        rows.iter().map(decode_turn).collect()
    }

    #[instrument(skip(self, payload), fields(kind = %kind), err)]
    async fn append_event(
        &self,
        run_id: &str,
        kind: EventKind,
        turn_index: Option<u32>,
        payload: Value,
    ) -> Result<WireEvent> {
        let created_at = Utc::now();
        // The subselect makes seq assignment atomic with the insert.
        let row = sqlx::query(
            r#"
            INSERT INTO run_events (run_id, seq, kind, turn_index, payload_json, created_at)
            VALUES (
                ?1,
                (SELECT COALESCE(MAX(seq), 0) + 1 FROM run_events WHERE run_id = ?1),
                ?2, ?3, ?4, ?5
            )
            RETURNING seq
            "#,
        )
        .bind(run_id)
        .bind(kind.as_str())
        .bind(turn_index.map(i64::from))
        .bind(to_json(&payload)?)
        .bind(created_at.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| StoreError::backend(format!("append event: {e}")))?;
        Ok(WireEvent {
            id: row.get::<i64, _>("seq"),
            run_id: run_id.to_string(),
            kind,
            turn_index,
            payload,
            created_at,
        })
    }

    #[instrument(skip(self), err)]
    async fn list_events(&self, run_id: &str) -> Result<Vec<WireEvent>> {
        let rows = sqlx::query("SELECT * FROM run_events WHERE run_id = ?1 ORDER BY seq")
            .bind(run_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::backend(format!("select events: {e}")))?;
        rows.iter().map(decode_event).collect()
    }

    #[instrument(skip(self, award), fields(run_id = %award.run_id, badge_key = %award.badge_key), err)]
    async fn insert_badge(&self, award: &BadgeAward) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO badges (
                id, run_id, turn_id, turn_index, badge_key, reason, confidence, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&award.id)
        .bind(&award.run_id)
        .bind(&award.turn_id)
        .bind(i64::from(award.turn_index))
        .bind(&award.badge_key)
        .bind(&award.reason)
        .bind(award.confidence)
        .bind(award.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::backend(format!("insert badge: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn list_badges(&self, run_id: &str) -> Result<Vec<BadgeAward>> {
        let rows = sqlx::query("SELECT * FROM badges WHERE run_id = ?1 ORDER BY created_at, turn_index")
            .bind(run_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::backend(format!("select badges: {e}")))?;
        rows.iter().map(decode_badge).collect()
    }

    #[instrument(skip(self, report), fields(run_id = %report.run_id), err)]
    async fn upsert_report(&self, report: &Report) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reports (run_id, id, summary, wrapped_json, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (run_id) DO UPDATE SET
                id = excluded.id,
                summary = excluded.summary,
                wrapped_json = excluded.wrapped_json,
                created_at = excluded.created_at
            "#,
        )
        .bind(&report.run_id)
        .bind(&report.id)
        .bind(&report.summary)
        .bind(to_json(&report.wrapped)?)
        .bind(report.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::backend(format!("upsert report: {e}")))?;
        Ok(())
    }

    #[instrument(skip(self), err)]
    async fn fetch_report(&self, run_id: &str) -> Result<Option<Report>> {
        let row = sqlx::query("SELECT * FROM reports WHERE run_id = ?1")
            .bind(run_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::backend(format!("select report: {e}")))?;
        let Some(row) = row else { return Ok(None) };
        let wrapped_json: String = row.get("wrapped_json");
        let wrapped: WrappedReport = from_json(&wrapped_json)?;
        let created_at: String = row.get("created_at");
        Ok(Some(Report {
            id: row.get("id"),
            run_id: row.get("run_id"),
            summary: row.get("summary"),
            wrapped,
            created_at: parse_timestamp(&created_at),
        }))
    }
}
