use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::errors::StoreError;

use super::models::*;

/// Async-safe handle to the ticket database.
///
/// Wraps `TicketDb` behind `Arc<Mutex>` and runs all access on tokio's
/// blocking thread pool via `spawn_blocking`, preventing synchronous SQLite
/// I/O from tying up async worker threads.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<TicketDb>>,
}

impl DbHandle {
    pub fn new(db: TicketDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R>
    where
        F: FnOnce(&TicketDb) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db
                .lock()
                .map_err(|_| anyhow::Error::from(StoreError::LockPoisoned))?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }

    /// Acquire the database mutex synchronously. For startup initialization
    /// and tests; must not be called from a hot async path.
    pub fn lock_sync(&self) -> Result<std::sync::MutexGuard<'_, TicketDb>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::Error::from(StoreError::LockPoisoned))
    }
}

pub struct TicketDb {
    conn: Connection,
}

impl TicketDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS production_methods (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS material_types (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    production_method_id INTEGER NOT NULL REFERENCES production_methods(id) ON DELETE CASCADE,
                    name TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS material_colors (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS materials (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    material_type_id INTEGER NOT NULL REFERENCES material_types(id) ON DELETE CASCADE,
                    color_id INTEGER NOT NULL REFERENCES material_colors(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    url TEXT NOT NULL DEFAULT '',
                    optimal_temp REAL NOT NULL,
                    min_temp REAL NOT NULL,
                    max_temp REAL NOT NULL
                );

                CREATE TABLE IF NOT EXISTS material_stock (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    material_id INTEGER NOT NULL REFERENCES materials(id) ON DELETE CASCADE,
                    label INTEGER NOT NULL UNIQUE,
                    consumed INTEGER NOT NULL DEFAULT 0
                );

                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    username TEXT NOT NULL UNIQUE,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS tickets (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    message TEXT NOT NULL,
                    created_at TEXT NOT NULL DEFAULT (datetime('now'))
                );

                CREATE TABLE IF NOT EXISTS print_configs (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    file_path TEXT NOT NULL,
                    count INTEGER NOT NULL,
                    material_type_id INTEGER NOT NULL REFERENCES material_types(id) ON DELETE CASCADE,
                    color_id INTEGER NOT NULL REFERENCES material_colors(id) ON DELETE CASCADE,
                    user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                    ticket_id INTEGER REFERENCES tickets(id) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS idx_material_types_method ON material_types(production_method_id);
                CREATE INDEX IF NOT EXISTS idx_materials_type ON materials(material_type_id);
                CREATE INDEX IF NOT EXISTS idx_stock_material ON material_stock(material_id);
                CREATE INDEX IF NOT EXISTS idx_print_configs_ticket ON print_configs(ticket_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Production methods ────────────────────────────────────────────

    pub fn create_production_method(&self, name: &str) -> Result<ProductionMethod> {
        self.conn
            .execute(
                "INSERT INTO production_methods (name) VALUES (?1)",
                params![name],
            )
            .context("Failed to insert production method")?;
        let id = self.conn.last_insert_rowid();
        self.get_production_method(id)?
            .context("Production method not found after insert")
    }

    pub fn list_production_methods(&self) -> Result<Vec<ProductionMethod>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM production_methods ORDER BY id")
            .context("Failed to prepare list_production_methods")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ProductionMethod {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .context("Failed to query production methods")?;
        let mut methods = Vec::new();
        for row in rows {
            methods.push(row.context("Failed to read production method row")?);
        }
        Ok(methods)
    }

    pub fn get_production_method(&self, id: i64) -> Result<Option<ProductionMethod>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM production_methods WHERE id = ?1")
            .context("Failed to prepare get_production_method")?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(ProductionMethod {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .context("Failed to query production method")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read production method row")?)),
            None => Ok(None),
        }
    }

    // ── Material types ────────────────────────────────────────────────

    pub fn create_material_type(
        &self,
        production_method_id: i64,
        name: &str,
    ) -> Result<MaterialType> {
        match self.conn.execute(
            "INSERT INTO material_types (production_method_id, name) VALUES (?1, ?2)",
            params![production_method_id, name],
        ) {
            Ok(_) => {}
            Err(e) if e.to_string().contains("FOREIGN KEY constraint failed") => {
                return Err(StoreError::InvalidReference(format!(
                    "production method {production_method_id}"
                ))
                .into());
            }
            Err(e) => return Err(e).context("Failed to insert material type"),
        }
        let id = self.conn.last_insert_rowid();
        self.get_material_type(id)?
            .context("Material type not found after insert")
    }

    pub fn list_material_types(&self, production_method_id: i64) -> Result<Vec<MaterialType>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, production_method_id, name FROM material_types
                 WHERE production_method_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare list_material_types")?;
        let rows = stmt
            .query_map(params![production_method_id], |row| {
                Ok(MaterialType {
                    id: row.get(0)?,
                    production_method_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })
            .context("Failed to query material types")?;
        let mut types = Vec::new();
        for row in rows {
            types.push(row.context("Failed to read material type row")?);
        }
        Ok(types)
    }

    pub fn get_material_type(&self, id: i64) -> Result<Option<MaterialType>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, production_method_id, name FROM material_types WHERE id = ?1")
            .context("Failed to prepare get_material_type")?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(MaterialType {
                    id: row.get(0)?,
                    production_method_id: row.get(1)?,
                    name: row.get(2)?,
                })
            })
            .context("Failed to query material type")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read material type row")?)),
            None => Ok(None),
        }
    }

    // ── Material colors ───────────────────────────────────────────────

    pub fn create_material_color(&self, name: &str) -> Result<MaterialColor> {
        self.conn
            .execute(
                "INSERT INTO material_colors (name) VALUES (?1)",
                params![name],
            )
            .context("Failed to insert material color")?;
        let id = self.conn.last_insert_rowid();
        self.get_material_color(id)?
            .context("Material color not found after insert")
    }

    pub fn list_material_colors(&self) -> Result<Vec<MaterialColor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM material_colors ORDER BY id")
            .context("Failed to prepare list_material_colors")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(MaterialColor {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .context("Failed to query material colors")?;
        let mut colors = Vec::new();
        for row in rows {
            colors.push(row.context("Failed to read material color row")?);
        }
        Ok(colors)
    }

    pub fn get_material_color(&self, id: i64) -> Result<Option<MaterialColor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name FROM material_colors WHERE id = ?1")
            .context("Failed to prepare get_material_color")?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(MaterialColor {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })
            .context("Failed to query material color")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read material color row")?)),
            None => Ok(None),
        }
    }

    // ── Materials ─────────────────────────────────────────────────────

    #[allow(clippy::too_many_arguments)]
    pub fn create_material(
        &self,
        material_type_id: i64,
        color_id: i64,
        name: &str,
        url: &str,
        optimal_temp: f64,
        min_temp: f64,
        max_temp: f64,
    ) -> Result<Material> {
        match self.conn.execute(
            "INSERT INTO materials (material_type_id, color_id, name, url, optimal_temp, min_temp, max_temp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![material_type_id, color_id, name, url, optimal_temp, min_temp, max_temp],
        ) {
            Ok(_) => {}
            Err(e) if e.to_string().contains("FOREIGN KEY constraint failed") => {
                return Err(StoreError::InvalidReference(format!(
                    "material type {material_type_id} or color {color_id}"
                ))
                .into());
            }
            Err(e) => return Err(e).context("Failed to insert material"),
        }
        let id = self.conn.last_insert_rowid();
        self.get_material(id)?
            .context("Material not found after insert")
    }

    pub fn list_materials(&self, material_type_id: i64) -> Result<Vec<Material>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, material_type_id, color_id, name, url, optimal_temp, min_temp, max_temp
                 FROM materials WHERE material_type_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare list_materials")?;
        let rows = stmt
            .query_map(params![material_type_id], |row| {
                Ok(Material {
                    id: row.get(0)?,
                    material_type_id: row.get(1)?,
                    color_id: row.get(2)?,
                    name: row.get(3)?,
                    url: row.get(4)?,
                    optimal_temp: row.get(5)?,
                    min_temp: row.get(6)?,
                    max_temp: row.get(7)?,
                })
            })
            .context("Failed to query materials")?;
        let mut materials = Vec::new();
        for row in rows {
            materials.push(row.context("Failed to read material row")?);
        }
        Ok(materials)
    }

    pub fn get_material(&self, id: i64) -> Result<Option<Material>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, material_type_id, color_id, name, url, optimal_temp, min_temp, max_temp
                 FROM materials WHERE id = ?1",
            )
            .context("Failed to prepare get_material")?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(Material {
                    id: row.get(0)?,
                    material_type_id: row.get(1)?,
                    color_id: row.get(2)?,
                    name: row.get(3)?,
                    url: row.get(4)?,
                    optimal_temp: row.get(5)?,
                    min_temp: row.get(6)?,
                    max_temp: row.get(7)?,
                })
            })
            .context("Failed to query material")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read material row")?)),
            None => Ok(None),
        }
    }

    // ── Material stock ────────────────────────────────────────────────

    /// Register a physical spool under its internal label. Labels are
    /// globally unique; a duplicate surfaces as `StoreError::LabelTaken`.
    pub fn add_stock(&self, material_id: i64, label: i64) -> Result<MaterialStock> {
        match self.conn.execute(
            "INSERT INTO material_stock (material_id, label) VALUES (?1, ?2)",
            params![material_id, label],
        ) {
            Ok(_) => {}
            Err(e) if e.to_string().contains("UNIQUE constraint failed: material_stock.label") => {
                return Err(StoreError::LabelTaken { label }.into());
            }
            Err(e) if e.to_string().contains("FOREIGN KEY constraint failed") => {
                return Err(StoreError::InvalidReference(format!("material {material_id}")).into());
            }
            Err(e) => return Err(e).context("Failed to insert material stock"),
        }
        let id = self.conn.last_insert_rowid();
        self.get_stock(id)?.context("Stock not found after insert")
    }

    pub fn get_stock(&self, id: i64) -> Result<Option<MaterialStock>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, material_id, label, consumed FROM material_stock WHERE id = ?1")
            .context("Failed to prepare get_stock")?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(MaterialStock {
                    id: row.get(0)?,
                    material_id: row.get(1)?,
                    label: row.get(2)?,
                    consumed: row.get(3)?,
                })
            })
            .context("Failed to query stock")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read stock row")?)),
            None => Ok(None),
        }
    }

    /// Mark the spool with the given label as consumed.
    pub fn consume_stock(&self, label: i64) -> Result<MaterialStock> {
        let count = self
            .conn
            .execute(
                "UPDATE material_stock SET consumed = 1 WHERE label = ?1",
                params![label],
            )
            .context("Failed to update stock")?;
        if count == 0 {
            return Err(StoreError::StockNotFound { label }.into());
        }
        tracing::info!(label, "stock consumed");
        let mut stmt = self
            .conn
            .prepare("SELECT id, material_id, label, consumed FROM material_stock WHERE label = ?1")
            .context("Failed to prepare consume_stock read-back")?;
        let stock = stmt
            .query_row(params![label], |row| {
                Ok(MaterialStock {
                    id: row.get(0)?,
                    material_id: row.get(1)?,
                    label: row.get(2)?,
                    consumed: row.get(3)?,
                })
            })
            .context("Stock not found after update")?;
        Ok(stock)
    }

    pub fn list_stock(&self, include_consumed: bool) -> Result<Vec<StockItem>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT s.id, s.material_id, s.label, s.consumed, m.name, t.name, c.name
                 FROM material_stock s
                 JOIN materials m ON m.id = s.material_id
                 JOIN material_types t ON t.id = m.material_type_id
                 JOIN material_colors c ON c.id = m.color_id
                 WHERE (?1 OR s.consumed = 0)
                 ORDER BY s.label",
            )
            .context("Failed to prepare list_stock")?;
        let rows = stmt
            .query_map(params![include_consumed], |row| {
                Ok(StockItem {
                    id: row.get(0)?,
                    material_id: row.get(1)?,
                    label: row.get(2)?,
                    consumed: row.get(3)?,
                    material_name: row.get(4)?,
                    material_type_name: row.get(5)?,
                    color_name: row.get(6)?,
                })
            })
            .context("Failed to query stock listing")?;
        let mut items = Vec::new();
        for row in rows {
            items.push(row.context("Failed to read stock listing row")?);
        }
        Ok(items)
    }

    // ── Users ─────────────────────────────────────────────────────────

    pub fn create_user(&self, username: &str) -> Result<User> {
        let created_at = chrono::Utc::now().to_rfc3339();
        match self.conn.execute(
            "INSERT INTO users (username, created_at) VALUES (?1, ?2)",
            params![username, created_at],
        ) {
            Ok(_) => {}
            Err(e) if e.to_string().contains("UNIQUE constraint failed: users.username") => {
                return Err(StoreError::UsernameTaken {
                    username: username.to_string(),
                }
                .into());
            }
            Err(e) => return Err(e).context("Failed to insert user"),
        }
        Ok(User {
            id: self.conn.last_insert_rowid(),
            username: username.to_string(),
            created_at,
        })
    }

    pub fn list_users(&self) -> Result<Vec<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username, created_at FROM users ORDER BY id")
            .context("Failed to prepare list_users")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .context("Failed to query users")?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row.context("Failed to read user row")?);
        }
        Ok(users)
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, username, created_at FROM users WHERE id = ?1")
            .context("Failed to prepare get_user")?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(User {
                    id: row.get(0)?,
                    username: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .context("Failed to query user")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read user row")?)),
            None => Ok(None),
        }
    }

    // ── Tickets ───────────────────────────────────────────────────────

    /// Create a ticket and its print configs atomically.
    pub fn create_ticket(&self, message: &str, configs: &[NewPrintConfig]) -> Result<TicketDetail> {
        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;

        let created_at = chrono::Utc::now().to_rfc3339();
        tx.execute(
            "INSERT INTO tickets (message, created_at) VALUES (?1, ?2)",
            params![message, created_at],
        )
        .context("Failed to insert ticket")?;
        let ticket_id = tx.last_insert_rowid();

        for config in configs {
            match tx.execute(
                "INSERT INTO print_configs (file_path, count, material_type_id, color_id, user_id, ticket_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    config.file_path,
                    config.count,
                    config.material_type_id,
                    config.color_id,
                    config.user_id,
                    ticket_id
                ],
            ) {
                Ok(_) => {}
                Err(e) if e.to_string().contains("FOREIGN KEY constraint failed") => {
                    return Err(StoreError::InvalidReference(format!(
                        "print config for {}",
                        config.file_path
                    ))
                    .into());
                }
                Err(e) => return Err(e).context("Failed to insert print config"),
            }
        }

        tx.commit().context("Failed to commit ticket")?;
        tracing::info!(ticket_id, configs = configs.len(), "ticket created");
        self.get_ticket_detail(ticket_id)?
            .context("Ticket not found after insert")
    }

    pub fn get_ticket(&self, id: i64) -> Result<Option<Ticket>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, message, created_at FROM tickets WHERE id = ?1")
            .context("Failed to prepare get_ticket")?;
        let mut rows = stmt
            .query_map(params![id], |row| {
                Ok(Ticket {
                    id: row.get(0)?,
                    message: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .context("Failed to query ticket")?;
        match rows.next() {
            Some(row) => Ok(Some(row.context("Failed to read ticket row")?)),
            None => Ok(None),
        }
    }

    pub fn list_tickets(&self) -> Result<Vec<Ticket>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, message, created_at FROM tickets ORDER BY id")
            .context("Failed to prepare list_tickets")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Ticket {
                    id: row.get(0)?,
                    message: row.get(1)?,
                    created_at: row.get(2)?,
                })
            })
            .context("Failed to query tickets")?;
        let mut tickets = Vec::new();
        for row in rows {
            tickets.push(row.context("Failed to read ticket row")?);
        }
        Ok(tickets)
    }

    pub fn get_ticket_detail(&self, id: i64) -> Result<Option<TicketDetail>> {
        let ticket = match self.get_ticket(id)? {
            Some(t) => t,
            None => return Ok(None),
        };
        let print_configs = self.list_print_configs(id)?;
        Ok(Some(TicketDetail {
            ticket,
            print_configs,
        }))
    }

    pub fn list_print_configs(&self, ticket_id: i64) -> Result<Vec<PrintConfig>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, file_path, count, material_type_id, color_id, user_id, ticket_id
                 FROM print_configs WHERE ticket_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare list_print_configs")?;
        let rows = stmt
            .query_map(params![ticket_id], |row| {
                Ok(PrintConfig {
                    id: row.get(0)?,
                    file_path: row.get(1)?,
                    count: row.get(2)?,
                    material_type_id: row.get(3)?,
                    color_id: row.get(4)?,
                    user_id: row.get(5)?,
                    ticket_id: row.get(6)?,
                })
            })
            .context("Failed to query print configs")?;
        let mut configs = Vec::new();
        for row in rows {
            configs.push(row.context("Failed to read print config row")?);
        }
        Ok(configs)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::StoreError;

    fn seeded_material(db: &TicketDb) -> Material {
        let method = db.create_production_method("fdm").unwrap();
        let mat_type = db.create_material_type(method.id, "pla").unwrap();
        let color = db.create_material_color("red").unwrap();
        db.create_material(mat_type.id, color.id, "RedLine PLA", "https://example.org", 210.0, 190.0, 230.0)
            .unwrap()
    }

    #[tokio::test]
    async fn db_handle_runs_calls_on_the_blocking_pool() -> Result<()> {
        let handle = DbHandle::new(TicketDb::new_in_memory()?);
        let method = handle.call(|db| db.create_production_method("fdm")).await?;
        assert_eq!(method.name, "fdm");

        let methods = handle.lock_sync()?.list_production_methods()?;
        assert_eq!(methods.len(), 1);
        Ok(())
    }

    #[test]
    fn migrations_create_all_tables() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let table_count: i32 = db.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN
             ('production_methods', 'material_types', 'material_colors', 'materials',
              'material_stock', 'users', 'tickets', 'print_configs')",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(table_count, 8, "Expected 8 tables to exist");
        Ok(())
    }

    #[test]
    fn create_and_list_production_methods_in_order() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        db.create_production_method("fdm")?;
        db.create_production_method("sla")?;
        db.create_production_method("sls")?;

        let methods = db.list_production_methods()?;
        assert_eq!(methods.len(), 3);
        assert_eq!(methods[0].name, "fdm");
        assert_eq!(methods[1].name, "sla");
        assert_eq!(methods[2].name, "sls");
        Ok(())
    }

    #[test]
    fn material_types_are_scoped_to_their_method() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let fdm = db.create_production_method("fdm")?;
        let sla = db.create_production_method("sla")?;
        db.create_material_type(fdm.id, "pla")?;
        db.create_material_type(fdm.id, "petg")?;
        db.create_material_type(sla.id, "resin")?;

        let fdm_types = db.list_material_types(fdm.id)?;
        assert_eq!(fdm_types.len(), 2);
        assert!(fdm_types.iter().all(|t| t.production_method_id == fdm.id));
        assert_eq!(db.list_material_types(sla.id)?.len(), 1);
        Ok(())
    }

    #[test]
    fn material_type_with_unknown_method_is_rejected() {
        let db = TicketDb::new_in_memory().unwrap();
        let err = db.create_material_type(999, "pla").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::InvalidReference(_))
        ));
    }

    #[test]
    fn create_material_and_read_back_temps() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let material = seeded_material(&db);
        let fetched = db.get_material(material.id)?.expect("material should exist");
        assert_eq!(fetched.name, "RedLine PLA");
        assert_eq!(fetched.optimal_temp, 210.0);
        assert_eq!(fetched.min_temp, 190.0);
        assert_eq!(fetched.max_temp, 230.0);
        Ok(())
    }

    #[test]
    fn duplicate_stock_label_is_a_conflict() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let material = seeded_material(&db);

        let stock = db.add_stock(material.id, 17)?;
        assert_eq!(stock.label, 17);
        assert!(!stock.consumed);

        let err = db.add_stock(material.id, 17).unwrap_err();
        match err.downcast_ref::<StoreError>() {
            Some(StoreError::LabelTaken { label }) => assert_eq!(*label, 17),
            other => panic!("Expected LabelTaken, got {:?}", other),
        }
        Ok(())
    }

    #[test]
    fn consume_stock_flips_the_flag() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let material = seeded_material(&db);
        db.add_stock(material.id, 3)?;

        let consumed = db.consume_stock(3)?;
        assert!(consumed.consumed);

        // consuming again is idempotent
        let again = db.consume_stock(3)?;
        assert!(again.consumed);
        Ok(())
    }

    #[test]
    fn consume_unknown_label_is_not_found() {
        let db = TicketDb::new_in_memory().unwrap();
        let err = db.consume_stock(404).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::StockNotFound { label: 404 })
        ));
    }

    #[test]
    fn stock_listing_joins_names_and_filters_consumed() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let material = seeded_material(&db);
        db.add_stock(material.id, 1)?;
        db.add_stock(material.id, 2)?;
        db.consume_stock(1)?;

        let active = db.list_stock(false)?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].label, 2);
        assert_eq!(active[0].material_name, "RedLine PLA");
        assert_eq!(active[0].material_type_name, "pla");
        assert_eq!(active[0].color_name, "red");

        let all = db.list_stock(true)?;
        assert_eq!(all.len(), 2);
        // ordered by label
        assert_eq!(all[0].label, 1);
        assert!(all[0].consumed);
        Ok(())
    }

    #[test]
    fn duplicate_username_is_a_conflict() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        db.create_user("alex")?;
        let err = db.create_user("alex").unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::UsernameTaken { .. })
        ));
        Ok(())
    }

    #[test]
    fn ticket_with_print_configs_is_atomic() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let material = seeded_material(&db);
        let mat_type = db.get_material(material.id)?.unwrap().material_type_id;
        let color = db.get_material(material.id)?.unwrap().color_id;
        let user = db.create_user("alex")?;

        let configs = vec![
            NewPrintConfig {
                file_path: "/files/bracket.stl".to_string(),
                count: 2,
                material_type_id: mat_type,
                color_id: color,
                user_id: user.id,
            },
            NewPrintConfig {
                file_path: "/files/lid.stl".to_string(),
                count: 1,
                material_type_id: mat_type,
                color_id: color,
                user_id: user.id,
            },
        ];
        let detail = db.create_ticket("please print two brackets and a lid", &configs)?;
        assert_eq!(detail.print_configs.len(), 2);
        assert!(detail.print_configs.iter().all(|c| c.ticket_id == Some(detail.ticket.id)));

        let fetched = db.get_ticket_detail(detail.ticket.id)?.expect("ticket should exist");
        assert_eq!(fetched.print_configs.len(), 2);
        assert_eq!(fetched.print_configs[0].file_path, "/files/bracket.stl");
        Ok(())
    }

    #[test]
    fn ticket_rolls_back_when_a_config_is_invalid() -> Result<()> {
        let db = TicketDb::new_in_memory()?;
        let material = seeded_material(&db);
        let mat_type = db.get_material(material.id)?.unwrap().material_type_id;
        let color = db.get_material(material.id)?.unwrap().color_id;

        let configs = vec![NewPrintConfig {
            file_path: "/files/orphan.stl".to_string(),
            count: 1,
            material_type_id: mat_type,
            color_id: color,
            user_id: 999, // no such user
        }];
        let err = db.create_ticket("bad config", &configs).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::InvalidReference(_))
        ));
        assert!(db.list_tickets()?.is_empty(), "ticket insert must roll back");
        Ok(())
    }
}
