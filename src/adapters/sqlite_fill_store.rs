//! SQLite fill ledger.

use crate::domain::config_validation::sqlite_pool_size;
use crate::domain::cost::CostModel;
use crate::domain::error::TraderError;
use crate::domain::execution::{Fill, Side};
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::FillStore;
use chrono::{DateTime, NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use tracing::info;

/// One persisted row of the `trades` table.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub date: NaiveDate,
    pub fill: Fill,
    pub commission: f64,
    pub slippage: f64,
}

pub struct SqliteFillStore {
    pool: Pool<SqliteConnectionManager>,
    costs: CostModel,
}

fn db_err(e: r2d2::Error) -> TraderError {
    TraderError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> TraderError {
    TraderError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn conversion_err<E>(len: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(len, rusqlite::types::Type::Text, Box::new(e))
}

impl SqliteFillStore {
    /// Opens `[sqlite] path` and creates the schema if needed.
    pub fn from_config(config: &dyn ConfigPort, costs: CostModel) -> Result<Self, TraderError> {
        let db_path = config
            .get_string("sqlite", "path")
            .ok_or_else(|| TraderError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;

        let pool_size = sqlite_pool_size(config)?;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(db_err)?;

        let store = Self { pool, costs };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn in_memory(costs: CostModel) -> Result<Self, TraderError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder().max_size(1).build(manager).map_err(db_err)?;

        let store = Self { pool, costs };
        store.initialize_schema()?;
        Ok(store)
    }

    pub fn initialize_schema(&self) -> Result<(), TraderError> {
        let conn = self.pool.get().map_err(db_err)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                date TEXT NOT NULL,
                ticker TEXT NOT NULL,
                action TEXT NOT NULL,
                qty INTEGER NOT NULL,
                avg_fill_price REAL NOT NULL,
                slice_time TEXT,
                commission REAL,
                slippage REAL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_date ON trades(date);",
        )
        .map_err(query_err)?;

        Ok(())
    }

    /// Every trade recorded for `date`, in insertion order.
    pub fn load_fills(&self, date: NaiveDate) -> Result<Vec<TradeRecord>, TraderError> {
        let conn = self.pool.get().map_err(db_err)?;

        let mut stmt = conn
            .prepare(
                "SELECT date, ticker, action, qty, avg_fill_price, slice_time, commission, slippage
                 FROM trades
                 WHERE date = ?1
                 ORDER BY id ASC",
            )
            .map_err(query_err)?;

        let rows = stmt
            .query_map(params![date.format("%Y-%m-%d").to_string()], |row| {
                let date_str: String = row.get(0)?;
                let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
                    .map_err(|e| conversion_err(date_str.len(), e))?;
                let action: String = row.get(2)?;
                let side = action
                    .parse::<Side>()
                    .map_err(|e| conversion_err(action.len(), e))?;
                let slice_time = match row.get::<_, Option<String>>(5)? {
                    Some(raw) => Some(
                        DateTime::parse_from_rfc3339(&raw)
                            .map_err(|e| conversion_err(raw.len(), e))?
                            .with_timezone(&Utc),
                    ),
                    None => None,
                };
                let qty: i64 = row.get(3)?;
                Ok(TradeRecord {
                    date,
                    fill: Fill {
                        ticker: row.get(1)?,
                        side,
                        quantity: qty.unsigned_abs(),
                        avg_fill_price: row.get(4)?,
                        slice_time,
                    },
                    commission: row.get::<_, Option<f64>>(6)?.unwrap_or(0.0),
                    slippage: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
                })
            })
            .map_err(query_err)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(query_err)?);
        }
        Ok(records)
    }
}

impl FillStore for SqliteFillStore {
    /// All fills go in one transaction: either every row lands or none do.
    fn save_fills(&self, date: NaiveDate, fills: &[Fill]) -> Result<(), TraderError> {
        let mut conn = self.pool.get().map_err(db_err)?;
        let tx = conn.transaction().map_err(query_err)?;
        let date_str = date.format("%Y-%m-%d").to_string();

        for fill in fills {
            let notional = fill.notional();
            tx.execute(
                "INSERT INTO trades (date, ticker, action, qty, avg_fill_price, slice_time, commission, slippage)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    date_str,
                    fill.ticker,
                    fill.side.as_str(),
                    fill.quantity as i64,
                    fill.avg_fill_price,
                    fill.slice_time.map(|t| t.to_rfc3339()),
                    notional * self.costs.commission(),
                    notional * self.costs.slippage(),
                ],
            )
            .map_err(query_err)?;
        }

        tx.commit().map_err(query_err)?;
        info!(%date, rows = fills.len(), "fills persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn d(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn fill(ticker: &str, side: Side, quantity: u64, price: f64, minute: Option<u32>) -> Fill {
        Fill {
            ticker: ticker.into(),
            side,
            quantity,
            avg_fill_price: price,
            slice_time: minute.map(|m| Utc.with_ymd_and_hms(2024, 1, 15, 14, 30 + m, 0).unwrap()),
        }
    }

    fn setup() -> SqliteFillStore {
        SqliteFillStore::in_memory(CostModel::new(0.001, 0.002).unwrap()).unwrap()
    }

    #[test]
    fn save_and_load_roundtrip() {
        let store = setup();
        let fills = vec![
            fill("AAPL", Side::Buy, 3, 100.0, Some(0)),
            fill("AAPL", Side::Buy, 2, 101.0, Some(5)),
            fill("MSFT", Side::Sell, 10, 50.0, None),
        ];
        store.save_fills(d(15), &fills).unwrap();

        let records = store.load_fills(d(15)).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].fill, fills[0]);
        assert_eq!(records[2].fill.side, Side::Sell);
        assert_eq!(records[2].fill.slice_time, None);
        assert!((records[0].commission - 0.6).abs() < 1e-12);
        assert!((records[0].slippage - 0.3).abs() < 1e-12);
    }

    #[test]
    fn load_filters_by_date() {
        let store = setup();
        store.save_fills(d(15), &[fill("AAPL", Side::Buy, 1, 10.0, None)]).unwrap();
        store.save_fills(d(16), &[fill("AAPL", Side::Sell, 1, 11.0, None)]).unwrap();

        assert_eq!(store.load_fills(d(15)).unwrap().len(), 1);
        assert_eq!(store.load_fills(d(16)).unwrap()[0].fill.side, Side::Sell);
        assert!(store.load_fills(d(17)).unwrap().is_empty());
    }

    #[test]
    fn initialize_schema_is_idempotent() {
        let store = setup();
        store.initialize_schema().unwrap();
        store.initialize_schema().unwrap();
    }

    #[test]
    fn from_config_requires_path() {
        let config =
            crate::adapters::file_config_adapter::FileConfigAdapter::from_string("[sqlite]\n").unwrap();
        let result = SqliteFillStore::from_config(&config, CostModel::zero());
        assert!(matches!(result, Err(TraderError::ConfigMissing { .. })));
    }

    #[test]
    fn from_config_rejects_zero_pool_size() {
        let dir = tempfile::TempDir::new().unwrap();
        let content = format!("[sqlite]\npath = {}\npool_size = 0\n", dir.path().join("fills.db").display());
        let config = crate::adapters::file_config_adapter::FileConfigAdapter::from_string(&content).unwrap();
        match SqliteFillStore::from_config(&config, CostModel::zero()) {
            Err(TraderError::ConfigInvalid { key, .. }) => assert_eq!(key, "pool_size"),
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("pool_size = 0 was accepted"),
        }
    }
}
