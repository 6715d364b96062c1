use crate::config::DatabaseConfig;
use duckdb::{Connection, Result as DbResult};
use std::sync::{Arc, Mutex};
use tracing::info;

pub type DbPool = Arc<Mutex<Connection>>;

pub(crate) const SCHEMA: &str = r#"
CREATE SEQUENCE IF NOT EXISTS seq_messages_id;

CREATE TABLE IF NOT EXISTS sessions (
    id VARCHAR PRIMARY KEY,
    owner VARCHAR NOT NULL,
    label VARCHAR,
    created_ms BIGINT NOT NULL,
    last_active_ms BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS messages (
    id BIGINT PRIMARY KEY DEFAULT nextval('seq_messages_id'),
    session_id VARCHAR NOT NULL,
    role VARCHAR NOT NULL CHECK (role IN ('user', 'assistant')),
    content TEXT NOT NULL,
    language VARCHAR NOT NULL,
    created_ms BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, id);
"#;

pub fn get_connection(config: &DatabaseConfig) -> DbResult<DbPool> {
    info!(path = %config.path, "Connecting to DuckDB");
    let conn = if config.path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(&config.path)?
    };

    init_schema(&conn)?;

    Ok(Arc::new(Mutex::new(conn)))
}

pub(crate) fn init_schema(conn: &Connection) -> DbResult<()> {
    info!("Initializing database schema");
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
