//! SQLite implementation of the persistence gate.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params};
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::{InvoiceStore, NewInvoice, Registration};
use crate::error::StoreError;
use crate::models::{DocumentKind, InvoiceRecord, LineItem};

const MIGRATIONS: &[(i64, &str)] = &[(1, include_str!("../../migrations/001_initial.sql"))];

/// Amounts are stored as fixed two-decimal text so equality is exact.
fn amount_text(amount: Decimal) -> String {
    format!("{:.2}", amount.round_dp(2))
}

/// Run all pending migrations, tracked with `PRAGMA user_version`.
pub fn run_migrations(conn: &Connection) -> Result<(), StoreError> {
    let current: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for &(version, sql) in MIGRATIONS {
        if version > current {
            info!("Running migration v{version}");
            conn.execute_batch(sql)
                .and_then(|_| conn.pragma_update(None, "user_version", version))
                .map_err(|e| StoreError::Migration {
                    version,
                    reason: e.to_string(),
                })?;
        }
    }

    Ok(())
}

pub fn upsert_vendor(conn: &Connection, name: &str) -> Result<i64, StoreError> {
    let id = conn.query_row(
        "INSERT INTO vendors (name) VALUES (?1)
         ON CONFLICT (name) DO UPDATE SET name = excluded.name
         RETURNING id",
        params![name],
        |row| row.get(0),
    )?;
    Ok(id)
}

pub fn find_duplicate(
    conn: &Connection,
    vendor_id: i64,
    date: Option<NaiveDate>,
    total: Decimal,
) -> Result<Option<i64>, StoreError> {
    let id = conn
        .query_row(
            "SELECT id FROM invoices WHERE vendor_id = ?1 AND date IS ?2 AND total = ?3",
            params![vendor_id, date, amount_text(total)],
            |row| row.get(0),
        )
        .optional()?;
    Ok(id)
}

pub fn insert_invoice(conn: &Connection, invoice: &NewInvoice<'_>) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO invoices (vendor_id, date, total, category, kind, raw_json)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            invoice.vendor_id,
            invoice.date,
            amount_text(invoice.total),
            invoice.category.label(),
            invoice.kind.as_str(),
            invoice.raw_payload,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn insert_items(conn: &Connection, invoice_id: i64, items: &[LineItem]) -> Result<(), StoreError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO items (invoice_id, description, price) VALUES (?1, ?2, ?3)",
    )?;
    for item in items {
        stmt.execute(params![invoice_id, item.description, amount_text(item.price)])?;
    }
    Ok(())
}

fn is_constraint_violation(err: &StoreError) -> bool {
    matches!(
        err,
        StoreError::Sqlite(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation
    )
}

/// Store handle. Opened explicitly, closed explicitly, shared by reference.
pub struct SqliteInvoiceStore {
    conn: Mutex<Connection>,
}

impl SqliteInvoiceStore {
    /// Open (creating if needed) the database at `path` and migrate it.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init(conn, path.display().to_string())
    }

    /// Fresh in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?, ":memory:".to_string())
    }

    fn init(conn: Connection, label: String) -> Result<Self, StoreError> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        run_migrations(&conn)?;
        info!("Opened invoice store at {}", label);
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    /// Flush and close the underlying connection.
    pub fn close(self) -> Result<(), StoreError> {
        let conn = self.conn.into_inner().map_err(|_| StoreError::Poisoned)?;
        conn.close().map_err(|(_, e)| StoreError::Sqlite(e))?;
        info!("Closed invoice store");
        Ok(())
    }

    pub fn invoice_count(&self) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM invoices", [], |row| row.get(0))?)
    }

    /// Stored record JSON for `invoice_id`, read back into a record.
    pub fn load_record(&self, invoice_id: i64) -> Result<Option<InvoiceRecord>, StoreError> {
        let conn = self.lock()?;
        let raw: Option<String> = conn
            .query_row(
                "SELECT raw_json FROM invoices WHERE id = ?1",
                params![invoice_id],
                |row| row.get(0),
            )
            .optional()?;

        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    /// Item rows of an invoice, in insertion order.
    pub fn items(&self, invoice_id: i64) -> Result<Vec<(String, String)>, StoreError> {
        let conn = self.lock()?;
        let mut stmt =
            conn.prepare("SELECT description, price FROM items WHERE invoice_id = ?1 ORDER BY id")?;
        let rows = stmt
            .query_map(params![invoice_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn register_once(
        conn: &mut Connection,
        record: &InvoiceRecord,
        kind: DocumentKind,
        raw_payload: &str,
    ) -> Result<Registration, StoreError> {
        let tx = conn.transaction()?;

        let vendor_id = upsert_vendor(&tx, &record.vendor)?;
        if let Some(existing_id) = find_duplicate(&tx, vendor_id, record.date, record.total)? {
            return Ok(Registration::AlreadyRegistered { existing_id });
        }

        let invoice_id = insert_invoice(
            &tx,
            &NewInvoice {
                vendor_id,
                date: record.date,
                total: record.total,
                category: record.category,
                kind,
                raw_payload,
            },
        )?;
        insert_items(&tx, invoice_id, &record.items)?;

        tx.commit()?;
        Ok(Registration::Registered { invoice_id })
    }
}

impl InvoiceStore for SqliteInvoiceStore {
    fn upsert_vendor(&self, name: &str) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        upsert_vendor(&conn, name)
    }

    fn find_duplicate(
        &self,
        vendor_id: i64,
        date: Option<NaiveDate>,
        total: Decimal,
    ) -> Result<Option<i64>, StoreError> {
        let conn = self.lock()?;
        find_duplicate(&conn, vendor_id, date, total)
    }

    fn insert_invoice(&self, invoice: &NewInvoice<'_>) -> Result<i64, StoreError> {
        let conn = self.lock()?;
        insert_invoice(&conn, invoice)
    }

    fn insert_items(&self, invoice_id: i64, items: &[LineItem]) -> Result<(), StoreError> {
        let conn = self.lock()?;
        insert_items(&conn, invoice_id, items)
    }

    fn register(&self, record: &InvoiceRecord, kind: DocumentKind) -> Result<Registration, StoreError> {
        let raw_payload = serde_json::to_string(record)?;
        let mut conn = self.lock()?;

        let outcome = match Self::register_once(&mut conn, record, kind, &raw_payload) {
            Err(e) if is_constraint_violation(&e) => {
                // Another writer won the race on the dedup index
                let vendor_id = upsert_vendor(&conn, &record.vendor)?;
                match find_duplicate(&conn, vendor_id, record.date, record.total)? {
                    Some(existing_id) => Registration::AlreadyRegistered { existing_id },
                    None => return Err(e),
                }
            }
            other => other?,
        };

        match outcome {
            Registration::Registered { invoice_id } => {
                info!("Registered invoice {} from {:?}", invoice_id, record.vendor)
            }
            Registration::AlreadyRegistered { existing_id } => {
                debug!("Invoice from {:?} already registered as {}", record.vendor, existing_id)
            }
        }
        Ok(outcome)
    }
}
