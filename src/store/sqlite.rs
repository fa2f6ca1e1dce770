use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use super::RecordStore;

/// A named sheet inside a local SQLite file. Several sheets can share one
/// file; each row keeps its cells as a JSON array.
pub struct SqliteSheet {
    conn: Mutex<Connection>,
    sheet: String,
}

impl SqliteSheet {
    pub fn open(path: &Path, sheet: &str) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        Self::with_connection(conn, sheet)
    }

    pub fn in_memory(sheet: &str) -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?, sheet)
    }

    fn with_connection(conn: Connection, sheet: &str) -> Result<Self> {
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            sheet: sheet.to_string(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection for '{}' poisoned", self.sheet))
    }
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS sheet_rows (
            id          INTEGER PRIMARY KEY,
            sheet       TEXT NOT NULL,
            row_num     INTEGER NOT NULL,
            cells       TEXT NOT NULL,
            appended_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(sheet, row_num)
        );
        CREATE INDEX IF NOT EXISTS idx_sheet_rows_sheet ON sheet_rows(sheet, row_num);
        ",
    )?;
    Ok(())
}

fn decode(cells: &str) -> Result<Vec<String>> {
    Ok(serde_json::from_str(cells)?)
}

#[async_trait]
impl RecordStore for SqliteSheet {
    fn name(&self) -> &str {
        &self.sheet
    }

    async fn read_column(&self, index: usize) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT cells FROM sheet_rows WHERE sheet = ?1 ORDER BY row_num")?;
        let rows = stmt
            .query_map([&self.sheet], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let mut column = Vec::with_capacity(rows.len());
        for cells in &rows {
            column.push(decode(cells)?.into_iter().nth(index).unwrap_or_default());
        }
        Ok(column)
    }

    async fn append_row(&self, values: &[String]) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sheet_rows (sheet, row_num, cells)
             VALUES (?1, (SELECT COALESCE(MAX(row_num), 0) + 1 FROM sheet_rows WHERE sheet = ?1), ?2)",
            rusqlite::params![self.sheet, serde_json::to_string(values)?],
        )?;
        Ok(())
    }

    async fn read_header_row(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;
        let cells: Option<String> = conn
            .query_row(
                "SELECT cells FROM sheet_rows WHERE sheet = ?1 ORDER BY row_num LIMIT 1",
                [&self.sheet],
                |r| r.get(0),
            )
            .optional()?;
        match cells {
            Some(c) => decode(&c),
            None => Ok(Vec::new()),
        }
    }

    async fn write_header_row(&self, values: &[String]) -> Result<()> {
        let conn = self.lock()?;
        let first: Option<i64> = conn
            .query_row(
                "SELECT MIN(row_num) FROM sheet_rows WHERE sheet = ?1",
                [&self.sheet],
                |r| r.get(0),
            )?;
        let cells = serde_json::to_string(values)?;
        match first {
            Some(row_num) => conn.execute(
                "UPDATE sheet_rows SET cells = ?1 WHERE sheet = ?2 AND row_num = ?3",
                rusqlite::params![cells, self.sheet, row_num],
            )?,
            None => conn.execute(
                "INSERT INTO sheet_rows (sheet, row_num, cells) VALUES (?1, 1, ?2)",
                rusqlite::params![self.sheet, cells],
            )?,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_sheet() {
        let s = SqliteSheet::in_memory("events").unwrap();
        assert!(s.read_header_row().await.unwrap().is_empty());
        assert!(s.read_column(2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn column_includes_header_and_pads_short_rows() {
        let s = SqliteSheet::in_memory("events").unwrap();
        s.write_header_row(&row(&["Title", "URL", "Event ID"])).await.unwrap();
        s.append_row(&row(&["Yoga", "https://e/1", "1"])).await.unwrap();
        s.append_row(&row(&["Short"])).await.unwrap();

        assert_eq!(s.read_column(2).await.unwrap(), vec!["Event ID", "1", ""]);
        assert_eq!(s.read_header_row().await.unwrap(), row(&["Title", "URL", "Event ID"]));
    }

    #[tokio::test]
    async fn shared_file_keeps_sheets_apart() {
        let dir = std::env::temp_dir().join(format!("event_scout_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("stores.sqlite");
        let _ = std::fs::remove_file(&path);

        let summaries = SqliteSheet::open(&path, "events").unwrap();
        let details = SqliteSheet::open(&path, "event_details").unwrap();
        summaries.append_row(&row(&["A", "u", "1"])).await.unwrap();
        details.append_row(&row(&["title"])).await.unwrap();
        details.append_row(&row(&["A"])).await.unwrap();

        assert_eq!(summaries.read_column(0).await.unwrap(), vec!["A"]);
        assert_eq!(details.read_column(0).await.unwrap(), vec!["title", "A"]);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
