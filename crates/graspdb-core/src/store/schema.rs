//! SQLite schema DDL and migration framework for the objects catalog.

use rusqlite::Connection;

use crate::errors::GraspDbResult;

/// Current schema version. Migrations run from whatever the DB currently
/// reports up to this value.
pub const SCHEMA_VERSION: i32 = 3;

/// Core DDL statements: 8 CREATE TABLE + 5 CREATE INDEX.
///
/// Executed with `CREATE … IF NOT EXISTS` so they are safe to replay on an
/// already-initialised database.
pub const SCHEMA_STATEMENTS: &[&str] = &[
    // ── tables (8) ──────────────────────────────────────────────────────
    "CREATE TABLE IF NOT EXISTS catalog_meta (
        key TEXT PRIMARY KEY,
        value TEXT
    );",
    "CREATE TABLE IF NOT EXISTS original_model (
        original_model_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        maker TEXT NOT NULL DEFAULT '',
        tags_json TEXT NOT NULL DEFAULT '[]'
    );",
    "CREATE TABLE IF NOT EXISTS scaled_model (
        scaled_model_id INTEGER PRIMARY KEY,
        original_model_id INTEGER NOT NULL REFERENCES original_model(original_model_id),
        scale REAL NOT NULL DEFAULT 1.0
    );",
    "CREATE TABLE IF NOT EXISTS model_set (
        model_set_name TEXT NOT NULL,
        original_model_id INTEGER NOT NULL REFERENCES original_model(original_model_id),
        PRIMARY KEY(model_set_name, original_model_id)
    );",
    "CREATE TABLE IF NOT EXISTS mesh (
        original_model_id INTEGER PRIMARY KEY REFERENCES original_model(original_model_id),
        vertices_json TEXT NOT NULL,
        triangles_json TEXT NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS grasp (
        grasp_id INTEGER PRIMARY KEY AUTOINCREMENT,
        scaled_model_id INTEGER NOT NULL REFERENCES scaled_model(scaled_model_id),
        hand_name TEXT NOT NULL,
        pre_grasp_posture_json TEXT NOT NULL,
        final_grasp_posture_json TEXT NOT NULL,
        final_grasp_pose_json TEXT NOT NULL,
        quality REAL NOT NULL,
        scaled_quality REAL NOT NULL DEFAULT 0.0,
        table_clearance REAL NOT NULL DEFAULT 0.0,
        cluster_rep INTEGER NOT NULL DEFAULT 0
    );",
    "CREATE TABLE IF NOT EXISTS scan (
        scan_id INTEGER PRIMARY KEY AUTOINCREMENT,
        scaled_model_id INTEGER NOT NULL REFERENCES scaled_model(scaled_model_id),
        scan_source TEXT NOT NULL,
        cloud_topic TEXT NOT NULL DEFAULT '',
        frame_id TEXT NOT NULL,
        stamp REAL NOT NULL DEFAULT 0.0,
        object_pose_json TEXT NOT NULL,
        bagfile_location TEXT NOT NULL DEFAULT ''
    );",
    "CREATE TABLE IF NOT EXISTS migration_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        from_version INTEGER NOT NULL,
        to_version INTEGER NOT NULL,
        status TEXT NOT NULL,
        error_message TEXT,
        created_at TEXT DEFAULT CURRENT_TIMESTAMP
    );",
    // ── indexes (5) ─────────────────────────────────────────────────────
    "CREATE INDEX IF NOT EXISTS idx_scaled_model_original ON scaled_model(original_model_id);",
    "CREATE INDEX IF NOT EXISTS idx_model_set_name ON model_set(model_set_name);",
    "CREATE INDEX IF NOT EXISTS idx_grasp_model_hand ON grasp(scaled_model_id, hand_name, cluster_rep);",
    "CREATE INDEX IF NOT EXISTS idx_grasp_quality ON grasp(quality);",
    "CREATE INDEX IF NOT EXISTS idx_scan_model_source ON scan(scaled_model_id, scan_source);",
];

// ─── Migration framework ────────────────────────────────────────────────────

/// Run all pending migrations from the current stored version up to
/// [`SCHEMA_VERSION`].  Each step is wrapped in a SAVEPOINT so a failure
/// rolls back only that single step.
pub fn migrate_schema(conn: &Connection) -> GraspDbResult<()> {
    let mut current_version = get_schema_version(conn);

    while current_version < SCHEMA_VERSION {
        let next_version = current_version + 1;
        conn.execute_batch("SAVEPOINT graspdb_migrate_step;")?;

        let step_result = (|| -> GraspDbResult<()> {
            match next_version {
                1 => migrate_to_v1(conn)?,
                2 => migrate_to_v2(conn)?,
                3 => migrate_to_v3(conn)?,
                _ => {}
            }
            set_schema_version(conn, next_version)?;
            record_migration_step(conn, current_version, next_version, "success", None)?;
            conn.execute_batch("RELEASE SAVEPOINT graspdb_migrate_step;")?;
            Ok(())
        })();

        match step_result {
            Ok(()) => {
                current_version = next_version;
            }
            Err(e) => {
                let _ = conn.execute_batch("ROLLBACK TO SAVEPOINT graspdb_migrate_step;");
                let _ = conn.execute_batch("RELEASE SAVEPOINT graspdb_migrate_step;");
                let _ = record_migration_step(
                    conn,
                    current_version,
                    next_version,
                    "failed",
                    Some(&e.to_string()),
                );
                return Err(e);
            }
        }
    }

    Ok(())
}

/// Read the current schema version from `catalog_meta`.
/// Returns 0 when the key is absent or unparseable.
pub fn get_schema_version(conn: &Connection) -> i32 {
    let result: Result<String, _> = conn.query_row(
        "SELECT value FROM catalog_meta WHERE key = 'schema_version';",
        [],
        |row| row.get(0),
    );
    match result {
        Ok(v) => v.parse::<i32>().unwrap_or(0),
        Err(_) => 0,
    }
}

fn set_schema_version(conn: &Connection, version: i32) -> GraspDbResult<()> {
    conn.execute(
        "INSERT INTO catalog_meta(key, value) \
         VALUES('schema_version', ?1) \
         ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
        rusqlite::params![version.to_string()],
    )?;
    Ok(())
}

fn record_migration_step(
    conn: &Connection,
    from_v: i32,
    to_v: i32,
    status: &str,
    error_msg: Option<&str>,
) -> GraspDbResult<()> {
    conn.execute(
        "INSERT INTO migration_history(from_version, to_version, status, error_message) \
         VALUES (?1, ?2, ?3, ?4);",
        rusqlite::params![from_v, to_v, status, error_msg],
    )?;
    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> GraspDbResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let names: Vec<String> = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(names.iter().any(|name| name == column))
}

// ─── Individual migration steps ─────────────────────────────────────────────

/// v0 -> v1: baseline, no-op.
fn migrate_to_v1(_conn: &Connection) -> GraspDbResult<()> {
    Ok(())
}

/// v1 -> v2: catalogs exported before clearance tracking lack
/// `grasp.table_clearance`.
fn migrate_to_v2(conn: &Connection) -> GraspDbResult<()> {
    if !column_exists(conn, "grasp", "table_clearance")? {
        conn.execute_batch(
            "ALTER TABLE grasp ADD COLUMN table_clearance REAL NOT NULL DEFAULT 0.0;",
        )?;
    }
    Ok(())
}

/// v2 -> v3: scans gained an acquisition stamp.
fn migrate_to_v3(conn: &Connection) -> GraspDbResult<()> {
    if !column_exists(conn, "scan", "stamp")? {
        conn.execute_batch("ALTER TABLE scan ADD COLUMN stamp REAL NOT NULL DEFAULT 0.0;")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        for stmt in SCHEMA_STATEMENTS {
            conn.execute_batch(stmt).unwrap();
        }
        conn
    }

    #[test]
    fn test_schema_statement_counts() {
        // 8 tables + 5 indexes
        assert_eq!(SCHEMA_STATEMENTS.len(), 13);
    }

    #[test]
    fn test_migrate_fresh_database() {
        let conn = fresh();
        migrate_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
        let steps: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM migration_history WHERE status = 'success';",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(steps, SCHEMA_VERSION as i64);
    }

    #[test]
    fn test_migrate_idempotent() {
        let conn = fresh();
        migrate_schema(&conn).unwrap();
        migrate_schema(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
    }

    #[test]
    fn test_migrate_adds_missing_clearance_column() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE catalog_meta (key TEXT PRIMARY KEY, value TEXT);
             CREATE TABLE migration_history (
                 id INTEGER PRIMARY KEY AUTOINCREMENT,
                 from_version INTEGER NOT NULL,
                 to_version INTEGER NOT NULL,
                 status TEXT NOT NULL,
                 error_message TEXT,
                 created_at TEXT DEFAULT CURRENT_TIMESTAMP
             );
             CREATE TABLE grasp (grasp_id INTEGER PRIMARY KEY, quality REAL NOT NULL);
             CREATE TABLE scan (scan_id INTEGER PRIMARY KEY);",
        )
        .unwrap();
        migrate_schema(&conn).unwrap();
        assert!(column_exists(&conn, "grasp", "table_clearance").unwrap());
        assert!(column_exists(&conn, "scan", "stamp").unwrap());
    }
}
