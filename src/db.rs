use crate::models::{AlertLevel, PayloadFormat, Source, Webhook};
use rusqlite::{params, Connection, Result};
use std::sync::Mutex;

pub struct Db {
    pub conn: Mutex<Connection>,
}

impl Db {
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA busy_timeout=5000;")?;
        let db = Db { conn: Mutex::new(conn) };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch("
            CREATE TABLE IF NOT EXISTS sources (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                base_url TEXT NOT NULL,
                alert_level TEXT NOT NULL DEFAULT 'all',
                group_name TEXT,
                sort_order INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            CREATE INDEX IF NOT EXISTS idx_sources_order ON sources(sort_order);

            CREATE TABLE IF NOT EXISTS webhooks (
                id TEXT PRIMARY KEY,
                url TEXT NOT NULL,
                payload_format TEXT NOT NULL DEFAULT 'json',
                is_enabled INTEGER NOT NULL DEFAULT 1,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
        ")?;
        Ok(())
    }

    // ── Sources ──

    pub fn load_sources(&self) -> Result<Vec<Source>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, base_url, alert_level, group_name, sort_order FROM sources ORDER BY sort_order ASC, created_at ASC"
        )?;
        let rows = stmt.query_map([], |row| {
            let level: String = row.get(3)?;
            Ok(Source {
                id: row.get(0)?,
                name: row.get(1)?,
                base_url: row.get(2)?,
                alert_level: AlertLevel::parse(&level).unwrap_or_default(),
                group: row.get(4)?,
                sort_order: row.get(5)?,
            })
        })?;
        rows.collect()
    }

    /// Replace the stored registry with `sources` in one transaction.
    pub fn save_sources(&self, sources: &[Source]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM sources", [])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO sources (id, name, base_url, alert_level, group_name, sort_order) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            )?;
            for s in sources {
                stmt.execute(params![s.id, s.name, s.base_url, s.alert_level.as_str(), s.group, s.sort_order])?;
            }
        }
        tx.commit()
    }

    // ── Webhooks ──

    pub fn list_webhooks(&self) -> Result<Vec<Webhook>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, url, payload_format, is_enabled FROM webhooks ORDER BY created_at ASC"
        )?;
        let rows = stmt.query_map([], |row| {
            let format: String = row.get(2)?;
            Ok(Webhook {
                id: row.get(0)?,
                url: row.get(1)?,
                payload_format: if format == "chat" { PayloadFormat::Chat } else { PayloadFormat::Json },
                is_enabled: row.get::<_, i32>(3)? != 0,
            })
        })?;
        rows.collect()
    }

    pub fn enabled_webhooks(&self) -> Vec<Webhook> {
        match self.list_webhooks() {
            Ok(hooks) => hooks.into_iter().filter(|w| w.is_enabled).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load webhooks");
                vec![]
            }
        }
    }

    pub fn insert_webhook(&self, webhook: &Webhook) -> Result<()> {
        let format = match webhook.payload_format {
            PayloadFormat::Chat => "chat",
            PayloadFormat::Json => "json",
        };
        self.conn().execute(
            "INSERT INTO webhooks (id, url, payload_format, is_enabled) VALUES (?1, ?2, ?3, ?4)",
            params![webhook.id, webhook.url, format, webhook.is_enabled as i32],
        )?;
        Ok(())
    }

    pub fn delete_webhook(&self, id: &str) -> Result<bool> {
        let n = self.conn().execute("DELETE FROM webhooks WHERE id = ?1", params![id])?;
        Ok(n > 0)
    }
}
