use crate::logic::poll::SettingsStore;
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// SQLite-backed key-value settings store.
///
/// Holds the refresh interval, the last-selected device filter, the server
/// model catalog and the cached raw fleet blob. Reads fall back to a
/// caller-supplied default; writes through the [`SettingsStore`] trait are
/// fire-and-forget (logged, never propagated).
pub struct Settings {
    conn: Mutex<Connection>,
}

impl Settings {
    /// Open (or create) the settings database under `db_path` (supports `~`)
    pub fn open(db_path: &str) -> Result<Self> {
        let expanded = shellexpand::tilde(db_path).into_owned();
        let db_file = if expanded.ends_with(".db") {
            expanded
        } else {
            format!("{}/fleetwatch.db", expanded)
        };
        if let Some(parent) = Path::new(&db_file).parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let conn =
            Connection::open(&db_file).with_context(|| format!("opening {}", db_file))?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS settings (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn read(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock().unwrap();
        let value = conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn write(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

impl SettingsStore for Settings {
    fn get_u64(&self, key: &str, default: u64) -> u64 {
        self.read(key)
            .ok()
            .flatten()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn put_u64(&self, key: &str, value: u64) {
        self.put_string(key, &value.to_string());
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        self.read(key)
            .ok()
            .flatten()
            .unwrap_or_else(|| default.to_string())
    }

    fn put_string(&self, key: &str, value: &str) {
        if let Err(err) = self.write(key, value) {
            log::warn!("settings write for {} failed: {:#}", key, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::poll::keys;

    #[test]
    fn test_missing_key_returns_default() {
        let settings = Settings::open_in_memory().unwrap();
        assert_eq!(settings.get_u64(keys::REFRESH_INTERVAL, 180), 180);
        assert_eq!(settings.get_string(keys::SELECTED_FILTER, ""), "");
    }

    #[test]
    fn test_read_after_write() {
        let settings = Settings::open_in_memory().unwrap();
        settings.put_u64(keys::REFRESH_INTERVAL, 60);
        settings.put_string(keys::SELECTED_FILTER, "collar");
        settings.put_string(keys::FLEET_CACHE, r#"[{"imei":"1","name":"a"}]"#);

        assert_eq!(settings.get_u64(keys::REFRESH_INTERVAL, 180), 60);
        assert_eq!(settings.get_string(keys::SELECTED_FILTER, ""), "collar");
        assert!(settings.get_string(keys::FLEET_CACHE, "").contains("imei"));
    }

    #[test]
    fn test_overwrite_keeps_latest() {
        let settings = Settings::open_in_memory().unwrap();
        settings.put_u64(keys::REFRESH_INTERVAL, 60);
        settings.put_u64(keys::REFRESH_INTERVAL, 300);
        assert_eq!(settings.get_u64(keys::REFRESH_INTERVAL, 180), 300);
    }

    #[test]
    fn test_garbled_number_falls_back() {
        let settings = Settings::open_in_memory().unwrap();
        settings.put_string(keys::REFRESH_INTERVAL, "soon");
        assert_eq!(settings.get_u64(keys::REFRESH_INTERVAL, 180), 180);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.db");
        let path = path.to_str().unwrap();
        {
            let settings = Settings::open(path).unwrap();
            settings.put_u64(keys::REFRESH_INTERVAL, 240);
        }
        let settings = Settings::open(path).unwrap();
        assert_eq!(settings.get_u64(keys::REFRESH_INTERVAL, 180), 240);
    }
}
