// codeatlas-core/src/infrastructure/adapters/sqlite_rel_store.rs
//
// `RelStore` over an embedded sqlite database: a single
// `Arc<Mutex<Connection>>` guarding a blocking `rusqlite::Connection`,
// wrapped behind an async trait. Writes run inside explicit transactions
// wherever the port's doc comments call for batching/atomicity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::evidence::{Pass, RelationshipEvidence};
use crate::domain::file::{File, FileStatus, SpecialType};
use crate::domain::manifest::RunManifest;
use crate::domain::outbox::{EventType, OutboxEvent, OutboxStatus};
use crate::domain::poi::Poi;
use crate::domain::relationship::{Relationship, RelationshipStatus, RelationshipType};
use crate::error::AtlasError;
use crate::infrastructure::error::{InfrastructureError, StoreError};
use crate::ports::rel_store::RelStore;

pub struct SqliteRelStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRelStore {
    pub fn new(db_path: &str) -> Result<Self, InfrastructureError> {
        let conn = if db_path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(db_path)
        }
        .map_err(StoreError::Sqlite)?;

        conn.execute_batch(SCHEMA).map_err(StoreError::Sqlite)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, AtlasError> {
        self.conn
            .lock()
            .map_err(|_| AtlasError::Internal("SqliteRelStore mutex poisoned".to_string()))
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS files (
    id TEXT PRIMARY KEY,
    path TEXT NOT NULL,
    checksum TEXT NOT NULL,
    status TEXT NOT NULL,
    special_type TEXT,
    run_id TEXT NOT NULL,
    failure_reason TEXT
);
CREATE INDEX IF NOT EXISTS idx_files_run_status ON files(run_id, status);

CREATE TABLE IF NOT EXISTS pois (
    id TEXT PRIMARY KEY,
    file_id TEXT NOT NULL,
    run_id TEXT NOT NULL,
    name TEXT NOT NULL,
    poi_type TEXT NOT NULL,
    start_line INTEGER NOT NULL,
    end_line INTEGER NOT NULL,
    snippet TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_pois_file ON pois(file_id);
CREATE INDEX IF NOT EXISTS idx_pois_run ON pois(run_id);

CREATE TABLE IF NOT EXISTS relationship_evidence (
    id TEXT PRIMARY KEY,
    relationship_hash TEXT NOT NULL,
    run_id TEXT NOT NULL,
    source_poi_id TEXT NOT NULL,
    target_poi_id TEXT NOT NULL,
    rel_type TEXT NOT NULL,
    raw_confidence REAL NOT NULL,
    pass TEXT NOT NULL,
    payload TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_evidence_hash ON relationship_evidence(run_id, relationship_hash);
CREATE INDEX IF NOT EXISTS idx_evidence_pair ON relationship_evidence(run_id, source_poi_id, target_poi_id);

CREATE TABLE IF NOT EXISTS evidence_counters (
    run_id TEXT NOT NULL,
    relationship_hash TEXT NOT NULL,
    count INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (run_id, relationship_hash)
);

CREATE TABLE IF NOT EXISTS relationships (
    id TEXT PRIMARY KEY,
    relationship_hash TEXT NOT NULL,
    run_id TEXT NOT NULL,
    source_poi_id TEXT NOT NULL,
    target_poi_id TEXT NOT NULL,
    rel_type TEXT NOT NULL,
    confidence REAL NOT NULL,
    status TEXT NOT NULL,
    evidence_count INTEGER NOT NULL,
    UNIQUE(run_id, relationship_hash)
);

CREATE TABLE IF NOT EXISTS directory_summaries (
    run_id TEXT NOT NULL,
    directory_path TEXT NOT NULL,
    summary_text TEXT NOT NULL,
    PRIMARY KEY (run_id, directory_path)
);

CREATE TABLE IF NOT EXISTS outbox (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    payload_json TEXT NOT NULL,
    status TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    published_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_outbox_status ON outbox(status);

CREATE TABLE IF NOT EXISTS run_manifests (
    run_id TEXT PRIMARY KEY,
    total_files INTEGER NOT NULL,
    files_by_directory_json TEXT NOT NULL,
    expected_evidence_counts_json TEXT NOT NULL
);
"#;

fn special_type_to_str(t: &SpecialType) -> &'static str {
    match t {
        SpecialType::Manifest => "manifest",
        SpecialType::Entrypoint => "entrypoint",
        SpecialType::Config => "config",
        SpecialType::Schema => "schema",
    }
}

fn special_type_from_str(s: &str) -> Option<SpecialType> {
    match s {
        "manifest" => Some(SpecialType::Manifest),
        "entrypoint" => Some(SpecialType::Entrypoint),
        "config" => Some(SpecialType::Config),
        "schema" => Some(SpecialType::Schema),
        _ => None,
    }
}

fn status_to_str(s: FileStatus) -> &'static str {
    match s {
        FileStatus::Pending => "pending",
        FileStatus::Processing => "processing",
        FileStatus::Completed => "completed",
        FileStatus::Failed => "failed",
        FileStatus::PendingDeletion => "pending_deletion",
    }
}

fn status_from_str(s: &str) -> FileStatus {
    match s {
        "processing" => FileStatus::Processing,
        "completed" => FileStatus::Completed,
        "failed" => FileStatus::Failed,
        "pending_deletion" => FileStatus::PendingDeletion,
        _ => FileStatus::Pending,
    }
}

fn pass_to_str(p: Pass) -> &'static str {
    match p {
        Pass::IntraFile => "intra_file",
        Pass::IntraDirectory => "intra_directory",
        Pass::Global => "global",
        Pass::Deterministic => "deterministic",
    }
}

fn pass_from_str(s: &str) -> Pass {
    match s {
        "intra_directory" => Pass::IntraDirectory,
        "global" => Pass::Global,
        "deterministic" => Pass::Deterministic,
        _ => Pass::IntraFile,
    }
}

fn rel_status_to_str(s: RelationshipStatus) -> &'static str {
    match s {
        RelationshipStatus::Validated => "validated",
        RelationshipStatus::Rejected => "rejected",
    }
}

fn rel_status_from_str(s: &str) -> RelationshipStatus {
    match s {
        "rejected" => RelationshipStatus::Rejected,
        _ => RelationshipStatus::Validated,
    }
}

fn outbox_status_to_str(s: OutboxStatus) -> &'static str {
    match s {
        OutboxStatus::Pending => "pending",
        OutboxStatus::Published => "published",
        OutboxStatus::Failed => "failed",
    }
}

fn outbox_status_from_str(s: &str) -> OutboxStatus {
    match s {
        "published" => OutboxStatus::Published,
        "failed" => OutboxStatus::Failed,
        _ => OutboxStatus::Pending,
    }
}

fn row_to_file(row: &rusqlite::Row<'_>) -> rusqlite::Result<File> {
    let special_type: Option<String> = row.get("special_type")?;
    Ok(File {
        id: row.get("id")?,
        path: row.get("path")?,
        checksum: row.get("checksum")?,
        status: status_from_str(&row.get::<_, String>("status")?),
        special_type: special_type.and_then(|s| special_type_from_str(&s)),
        run_id: row.get("run_id")?,
    })
}

fn row_to_poi(row: &rusqlite::Row<'_>) -> rusqlite::Result<Poi> {
    Ok(Poi {
        id: row.get("id")?,
        file_id: row.get("file_id")?,
        run_id: row.get("run_id")?,
        name: row.get("name")?,
        poi_type: row.get("poi_type")?,
        start_line: row.get("start_line")?,
        end_line: row.get("end_line")?,
        snippet: row.get("snippet")?,
    })
}

fn row_to_evidence(row: &rusqlite::Row<'_>) -> rusqlite::Result<RelationshipEvidence> {
    let rel_type: String = row.get("rel_type")?;
    let pass: String = row.get("pass")?;
    let created_at: String = row.get("created_at")?;
    Ok(RelationshipEvidence {
        id: row.get("id")?,
        relationship_hash: row.get("relationship_hash")?,
        run_id: row.get("run_id")?,
        source_poi_id: row.get("source_poi_id")?,
        target_poi_id: row.get("target_poi_id")?,
        rel_type: rel_type.parse().unwrap_or(RelationshipType::Calls),
        raw_confidence: row.get("raw_confidence")?,
        pass: pass_from_str(&pass),
        payload: row.get("payload")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}

fn row_to_relationship(row: &rusqlite::Row<'_>) -> rusqlite::Result<Relationship> {
    let rel_type: String = row.get("rel_type")?;
    let status: String = row.get("status")?;
    Ok(Relationship {
        id: row.get("id")?,
        relationship_hash: row.get("relationship_hash")?,
        run_id: row.get("run_id")?,
        source_poi_id: row.get("source_poi_id")?,
        target_poi_id: row.get("target_poi_id")?,
        rel_type: rel_type.parse().unwrap_or(RelationshipType::Calls),
        confidence: row.get("confidence")?,
        status: rel_status_from_str(&status),
        evidence_count: row.get("evidence_count")?,
    })
}

fn row_to_outbox(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutboxEvent> {
    let event_type: String = row.get("event_type")?;
    let status: String = row.get("status")?;
    let created_at: String = row.get("created_at")?;
    let published_at: Option<String> = row.get("published_at")?;
    Ok(OutboxEvent {
        id: row.get("id")?,
        run_id: row.get("run_id")?,
        event_type: match event_type.as_str() {
            "relationship-finding" => EventType::RelationshipFinding,
            "directory-summary-finding" => EventType::DirectorySummaryFinding,
            _ => EventType::FileAnalysisFinding,
        },
        payload_json: row.get("payload_json")?,
        status: outbox_status_from_str(&status),
        attempts: row.get("attempts")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
        published_at: published_at.and_then(|s| {
            DateTime::parse_from_rfc3339(&s)
                .ok()
                .map(|dt| dt.with_timezone(&Utc))
        }),
    })
}

fn insert_outbox_tx(
    tx: &rusqlite::Transaction<'_>,
    run_id: &str,
    event_type: EventType,
    payload_json: &str,
) -> rusqlite::Result<i64> {
    tx.execute(
        "INSERT INTO outbox (run_id, event_type, payload_json, status, attempts, created_at) \
         VALUES (?1, ?2, ?3, 'pending', 0, ?4)",
        params![run_id, event_type.as_str(), payload_json, Utc::now().to_rfc3339()],
    )?;
    Ok(tx.last_insert_rowid())
}

#[async_trait]
impl RelStore for SqliteRelStore {
    async fn upsert_file(&self, file: &File) -> Result<(), AtlasError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO files (id, path, checksum, status, special_type, run_id) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
             ON CONFLICT(id) DO UPDATE SET path=excluded.path, checksum=excluded.checksum, \
             status=excluded.status, special_type=excluded.special_type, run_id=excluded.run_id",
            params![
                file.id,
                file.path,
                file.checksum,
                status_to_str(file.status),
                file.special_type.as_ref().map(special_type_to_str),
                file.run_id,
            ],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn mark_file_status(&self, file_id: &str, status: FileStatus) -> Result<(), AtlasError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE files SET status = ?1 WHERE id = ?2",
            params![status_to_str(status), file_id],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn mark_file_failed(&self, file_id: &str, reason: &str) -> Result<(), AtlasError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE files SET status = 'failed', failure_reason = ?1 WHERE id = ?2",
            params![reason, file_id],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn list_files_with_status(
        &self,
        run_id: &str,
        status: FileStatus,
    ) -> Result<Vec<File>, AtlasError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM files WHERE run_id = ?1 AND status = ?2")
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map(params![run_id, status_to_str(status)], row_to_file)
            .map_err(StoreError::Sqlite)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(StoreError::Sqlite)?);
        }
        Ok(out)
    }

    async fn list_all_file_paths(&self, run_id: &str) -> Result<Vec<String>, AtlasError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT path FROM files WHERE run_id = ?1")
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map(params![run_id], |row| row.get::<_, String>(0))
            .map_err(StoreError::Sqlite)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(StoreError::Sqlite)?);
        }
        Ok(out)
    }

    async fn mark_files_pending_deletion(&self, paths: &[String]) -> Result<usize, AtlasError> {
        let conn = self.lock()?;
        let mut count = 0;
        for path in paths {
            count += conn
                .execute(
                    "UPDATE files SET status = 'pending_deletion' WHERE path = ?1",
                    params![path],
                )
                .map_err(StoreError::Sqlite)?;
        }
        Ok(count)
    }

    async fn delete_files_by_path(&self, paths: &[String]) -> Result<usize, AtlasError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        let mut count = 0;
        for path in paths {
            // A POI exists only if its File exists (spec.md §3): cascade
            // the delete by hand rather than relying on a foreign key,
            // since evidence rows reference POI ids the LLM produced and
            // a stray FK violation there would abort an otherwise-valid
            // file deletion.
            tx.execute(
                "DELETE FROM relationship_evidence WHERE source_poi_id IN \
                 (SELECT id FROM pois WHERE file_id IN (SELECT id FROM files WHERE path = ?1)) \
                 OR target_poi_id IN \
                 (SELECT id FROM pois WHERE file_id IN (SELECT id FROM files WHERE path = ?1))",
                params![path],
            )
            .map_err(StoreError::Sqlite)?;
            tx.execute(
                "DELETE FROM pois WHERE file_id IN (SELECT id FROM files WHERE path = ?1)",
                params![path],
            )
            .map_err(StoreError::Sqlite)?;
            count += tx
                .execute("DELETE FROM files WHERE path = ?1", params![path])
                .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(count)
    }

    async fn insert_pois(&self, pois: &[Poi]) -> Result<(), AtlasError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        for poi in pois {
            insert_poi_tx(&tx, poi).map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn list_pois_for_file(&self, file_id: &str) -> Result<Vec<Poi>, AtlasError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM pois WHERE file_id = ?1")
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map(params![file_id], row_to_poi)
            .map_err(StoreError::Sqlite)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(StoreError::Sqlite)?);
        }
        Ok(out)
    }

    async fn list_pois_for_run(&self, run_id: &str) -> Result<Vec<Poi>, AtlasError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM pois WHERE run_id = ?1")
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map(params![run_id], row_to_poi)
            .map_err(StoreError::Sqlite)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(StoreError::Sqlite)?);
        }
        Ok(out)
    }

    async fn complete_file_analysis(
        &self,
        file_id: &str,
        pois: &[Poi],
        outbox_payload_json: &str,
        run_id: &str,
    ) -> Result<(), AtlasError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        for poi in pois {
            insert_poi_tx(&tx, poi).map_err(StoreError::Sqlite)?;
        }
        tx.execute(
            "UPDATE files SET status = 'completed' WHERE id = ?1",
            params![file_id],
        )
        .map_err(StoreError::Sqlite)?;
        insert_outbox_tx(&tx, run_id, EventType::FileAnalysisFinding, outbox_payload_json)
            .map_err(StoreError::Sqlite)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn append_evidence_with_outbox(
        &self,
        evidence: &[RelationshipEvidence],
        run_id: &str,
    ) -> Result<(), AtlasError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        for ev in evidence {
            tx.execute(
                "INSERT INTO relationship_evidence \
                 (id, relationship_hash, run_id, source_poi_id, target_poi_id, rel_type, \
                  raw_confidence, pass, payload, created_at) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    ev.id,
                    ev.relationship_hash,
                    ev.run_id,
                    ev.source_poi_id,
                    ev.target_poi_id,
                    ev.rel_type.as_str(),
                    ev.raw_confidence,
                    pass_to_str(ev.pass),
                    ev.payload,
                    ev.created_at.to_rfc3339(),
                ],
            )
            .map_err(StoreError::Sqlite)?;

            tx.execute(
                "INSERT INTO evidence_counters (run_id, relationship_hash, count) VALUES (?1, ?2, 1) \
                 ON CONFLICT(run_id, relationship_hash) DO UPDATE SET count = count + 1",
                params![run_id, ev.relationship_hash],
            )
            .map_err(StoreError::Sqlite)?;

            let payload = serde_json::to_string(&crate::domain::outbox::RelationshipFindingPayload {
                run_id: run_id.to_string(),
                evidence: ev.clone(),
            })
            .map_err(InfrastructureError::Json)?;
            insert_outbox_tx(&tx, run_id, EventType::RelationshipFinding, &payload)
                .map_err(StoreError::Sqlite)?;
        }
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn list_evidence_for_hash(
        &self,
        run_id: &str,
        relationship_hash: &str,
    ) -> Result<Vec<RelationshipEvidence>, AtlasError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT * FROM relationship_evidence WHERE run_id = ?1 AND relationship_hash = ?2",
            )
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map(params![run_id, relationship_hash], row_to_evidence)
            .map_err(StoreError::Sqlite)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(StoreError::Sqlite)?);
        }
        Ok(out)
    }

    async fn increment_evidence_count(
        &self,
        run_id: &str,
        relationship_hash: &str,
    ) -> Result<u32, AtlasError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO evidence_counters (run_id, relationship_hash, count) VALUES (?1, ?2, 1) \
             ON CONFLICT(run_id, relationship_hash) DO UPDATE SET count = count + 1",
            params![run_id, relationship_hash],
        )
        .map_err(StoreError::Sqlite)?;
        let count: u32 = conn
            .query_row(
                "SELECT count FROM evidence_counters WHERE run_id = ?1 AND relationship_hash = ?2",
                params![run_id, relationship_hash],
                |row| row.get(0),
            )
            .map_err(StoreError::Sqlite)?;
        Ok(count)
    }

    async fn evidence_count(&self, run_id: &str, relationship_hash: &str) -> Result<u32, AtlasError> {
        let conn = self.lock()?;
        let count: Option<u32> = conn
            .query_row(
                "SELECT count FROM evidence_counters WHERE run_id = ?1 AND relationship_hash = ?2",
                params![run_id, relationship_hash],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;
        Ok(count.unwrap_or(0))
    }

    async fn contradicting_hashes(
        &self,
        run_id: &str,
        source_poi_id: &str,
        target_poi_id: &str,
        relationship_hash: &str,
    ) -> Result<Vec<String>, AtlasError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT DISTINCT relationship_hash FROM relationship_evidence \
                 WHERE run_id = ?1 AND source_poi_id = ?2 AND target_poi_id = ?3 \
                 AND relationship_hash != ?4",
            )
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map(
                params![run_id, source_poi_id, target_poi_id, relationship_hash],
                |row| row.get::<_, String>(0),
            )
            .map_err(StoreError::Sqlite)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(StoreError::Sqlite)?);
        }
        Ok(out)
    }

    async fn upsert_validated_relationship(&self, relationship: &Relationship) -> Result<(), AtlasError> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO relationships \
             (id, relationship_hash, run_id, source_poi_id, target_poi_id, rel_type, confidence, \
              status, evidence_count) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9) \
             ON CONFLICT(run_id, relationship_hash) DO UPDATE SET \
               confidence=excluded.confidence, status=excluded.status, \
               evidence_count=excluded.evidence_count",
            params![
                relationship.id,
                relationship.relationship_hash,
                relationship.run_id,
                relationship.source_poi_id,
                relationship.target_poi_id,
                relationship.rel_type.as_str(),
                relationship.confidence,
                rel_status_to_str(relationship.status),
                relationship.evidence_count,
            ],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn list_validated_relationships(&self, run_id: &str) -> Result<Vec<Relationship>, AtlasError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM relationships WHERE run_id = ?1 AND status = 'validated'")
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map(params![run_id], row_to_relationship)
            .map_err(StoreError::Sqlite)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(StoreError::Sqlite)?);
        }
        Ok(out)
    }

    async fn insert_directory_summary_with_outbox(
        &self,
        run_id: &str,
        directory_path: &str,
        summary_text: &str,
        outbox_payload_json: &str,
    ) -> Result<(), AtlasError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        tx.execute(
            "INSERT INTO directory_summaries (run_id, directory_path, summary_text) \
             VALUES (?1, ?2, ?3) \
             ON CONFLICT(run_id, directory_path) DO UPDATE SET summary_text=excluded.summary_text",
            params![run_id, directory_path, summary_text],
        )
        .map_err(StoreError::Sqlite)?;
        insert_outbox_tx(&tx, run_id, EventType::DirectorySummaryFinding, outbox_payload_json)
            .map_err(StoreError::Sqlite)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn fetch_pending_outbox(&self, limit: usize) -> Result<Vec<OutboxEvent>, AtlasError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM outbox WHERE status = 'pending' ORDER BY id ASC LIMIT ?1")
            .map_err(StoreError::Sqlite)?;
        let rows = stmt
            .query_map(params![limit as i64], row_to_outbox)
            .map_err(StoreError::Sqlite)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(StoreError::Sqlite)?);
        }
        Ok(out)
    }

    async fn mark_outbox_published(&self, ids: &[i64]) -> Result<(), AtlasError> {
        let conn = self.lock()?;
        for id in ids {
            conn.execute(
                "UPDATE outbox SET status = 'published', published_at = ?1 WHERE id = ?2",
                params![Utc::now().to_rfc3339(), id],
            )
            .map_err(StoreError::Sqlite)?;
        }
        Ok(())
    }

    async fn mark_outbox_failed(&self, id: i64, error: &str) -> Result<(), AtlasError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE outbox SET status = 'failed', attempts = attempts + 1 WHERE id = ?1",
            params![id],
        )
        .map_err(StoreError::Sqlite)?;
        tracing::warn!(outbox_id = id, error, "Outbox event publish failed");
        Ok(())
    }

    async fn insert_outbox(
        &self,
        run_id: &str,
        event_type: EventType,
        payload_json: &str,
    ) -> Result<i64, AtlasError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(StoreError::Sqlite)?;
        let id = insert_outbox_tx(&tx, run_id, event_type, payload_json).map_err(StoreError::Sqlite)?;
        tx.commit().map_err(StoreError::Sqlite)?;
        Ok(id)
    }

    async fn save_manifest(&self, manifest: &RunManifest) -> Result<(), AtlasError> {
        let conn = self.lock()?;
        let dirs_json = serde_json::to_string(&manifest.files_by_directory).map_err(InfrastructureError::Json)?;
        let counts_json =
            serde_json::to_string(&manifest.expected_evidence_counts).map_err(InfrastructureError::Json)?;
        conn.execute(
            "INSERT INTO run_manifests (run_id, total_files, files_by_directory_json, expected_evidence_counts_json) \
             VALUES (?1, ?2, ?3, ?4) \
             ON CONFLICT(run_id) DO UPDATE SET total_files=excluded.total_files, \
               files_by_directory_json=excluded.files_by_directory_json, \
               expected_evidence_counts_json=excluded.expected_evidence_counts_json",
            params![manifest.run_id, manifest.total_files as i64, dirs_json, counts_json],
        )
        .map_err(StoreError::Sqlite)?;
        Ok(())
    }

    async fn load_manifest(&self, run_id: &str) -> Result<Option<RunManifest>, AtlasError> {
        let conn = self.lock()?;
        let row: Option<(i64, String, String)> = conn
            .query_row(
                "SELECT total_files, files_by_directory_json, expected_evidence_counts_json \
                 FROM run_manifests WHERE run_id = ?1",
                params![run_id],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .optional()
            .map_err(StoreError::Sqlite)?;

        match row {
            None => Ok(None),
            Some((total_files, dirs_json, counts_json)) => {
                let files_by_directory = serde_json::from_str(&dirs_json).map_err(InfrastructureError::Json)?;
                let expected_evidence_counts =
                    serde_json::from_str(&counts_json).map_err(InfrastructureError::Json)?;
                Ok(Some(RunManifest {
                    run_id: run_id.to_string(),
                    total_files: total_files as usize,
                    files_by_directory,
                    expected_evidence_counts,
                }))
            }
        }
    }
}

fn insert_poi_tx(tx: &rusqlite::Transaction<'_>, poi: &Poi) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO pois (id, file_id, run_id, name, poi_type, start_line, end_line, snippet) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8) \
         ON CONFLICT(id) DO UPDATE SET file_id=excluded.file_id, run_id=excluded.run_id, \
           name=excluded.name, poi_type=excluded.poi_type, start_line=excluded.start_line, \
           end_line=excluded.end_line, snippet=excluded.snippet",
        params![
            poi.id,
            poi.file_id,
            poi.run_id,
            poi.name,
            poi.poi_type,
            poi.start_line,
            poi.end_line,
            poi.snippet,
        ],
    )?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::domain::relationship::RelationshipType;

    fn new_store() -> SqliteRelStore {
        SqliteRelStore::new(":memory:").unwrap()
    }

    #[tokio::test]
    async fn test_upsert_file_is_idempotent() {
        let store = new_store();
        let file = File::new("src/a.py".into(), "checksum1".into(), "run1".into(), None);
        store.upsert_file(&file).await.unwrap();
        store.upsert_file(&file).await.unwrap();
        let files = store.list_files_with_status("run1", FileStatus::Pending).await.unwrap();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_complete_file_analysis_inserts_pois_and_outbox_atomically() {
        let store = new_store();
        let file = File::new("src/a.py".into(), "c1".into(), "run1".into(), None);
        store.upsert_file(&file).await.unwrap();
        let poi = Poi::new("src/a.py", file.id.clone(), "run1".into(), "foo".into(), "function".into(), 1, 2, "def foo():".into());
        store
            .complete_file_analysis(&file.id, &[poi.clone()], r#"{"ok":true}"#, "run1")
            .await
            .unwrap();

        let pois = store.list_pois_for_file(&file.id).await.unwrap();
        assert_eq!(pois.len(), 1);
        let pending = store.fetch_pending_outbox(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].event_type, EventType::FileAnalysisFinding);
    }

    #[tokio::test]
    async fn test_evidence_counter_increments_and_outbox_is_written() {
        let store = new_store();
        let evidence = RelationshipEvidence::new(
            "hash1".into(),
            "run1".into(),
            "poi_a".into(),
            "poi_b".into(),
            RelationshipType::Calls,
            0.6,
            Pass::IntraFile,
            "saw a call".into(),
            Utc::now(),
        );
        store.append_evidence_with_outbox(&[evidence], "run1").await.unwrap();
        assert_eq!(store.evidence_count("run1", "hash1").await.unwrap(), 1);
        let pending = store.fetch_pending_outbox(10).await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_files_by_path_cascades_pois_and_evidence() {
        let store = new_store();
        let file = File::new("src/gone.py".into(), "c1".into(), "run1".into(), None);
        store.upsert_file(&file).await.unwrap();
        let poi_a = Poi::new("src/gone.py", file.id.clone(), "run1".into(), "a".into(), "function".into(), 1, 2, "def a():".into());
        let poi_b = Poi::new("src/gone.py", file.id.clone(), "run1".into(), "b".into(), "function".into(), 3, 4, "def b():".into());
        store
            .complete_file_analysis(&file.id, &[poi_a.clone(), poi_b.clone()], r#"{"ok":true}"#, "run1")
            .await
            .unwrap();
        let evidence = RelationshipEvidence::new(
            "hash1".into(),
            "run1".into(),
            poi_a.id.clone(),
            poi_b.id.clone(),
            RelationshipType::Calls,
            0.6,
            Pass::IntraFile,
            "a calls b".into(),
            Utc::now(),
        );
        store.append_evidence_with_outbox(&[evidence], "run1").await.unwrap();

        let removed = store.delete_files_by_path(&["src/gone.py".to_string()]).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.list_pois_for_file(&file.id).await.unwrap().is_empty());

        let remaining_evidence: u32 = store
            .conn
            .lock()
            .unwrap()
            .query_row("SELECT COUNT(*) FROM relationship_evidence WHERE relationship_hash = ?1", params!["hash1"], |row| row.get(0))
            .unwrap();
        assert_eq!(remaining_evidence, 0);
    }

    #[tokio::test]
    async fn test_manifest_roundtrip() {
        let store = new_store();
        let mut manifest = RunManifest::new("run1".into());
        manifest.total_files = 3;
        manifest.files_by_directory.insert("src".into(), 3);
        store.save_manifest(&manifest).await.unwrap();
        let loaded = store.load_manifest("run1").await.unwrap().unwrap();
        assert_eq!(loaded.total_files, 3);
        assert_eq!(loaded.files_by_directory.get("src"), Some(&3));
    }
}
