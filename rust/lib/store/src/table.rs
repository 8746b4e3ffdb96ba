use std::marker::PhantomData;
use std::sync::Arc;

use labtrack_core::{ListResult, ServiceError};
use labtrack_sql::{SQLError, SQLStore, Statement, Value};

use crate::feed::{ChangeFeed, ChangeOp};
use crate::query::Query;
use crate::record::Record;

/// Typed access to one record table.
///
/// Rows are `(id, data, <extracted columns>)`. `data` holds the full JSON
/// document and is the source of truth; extracted columns are rewritten
/// from it on every insert and update.
pub struct Table<T: Record> {
    sql: Arc<dyn SQLStore>,
    feed: Arc<ChangeFeed>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> Clone for Table<T> {
    fn clone(&self) -> Self {
        Self {
            sql: Arc::clone(&self.sql),
            feed: Arc::clone(&self.feed),
            _record: PhantomData,
        }
    }
}

fn sql_err(e: SQLError) -> ServiceError {
    match e {
        SQLError::Constraint(msg) => ServiceError::AlreadyExists(msg),
        other => ServiceError::Storage(other.to_string()),
    }
}

impl<T: Record> Table<T> {
    pub fn new(sql: Arc<dyn SQLStore>, feed: Arc<ChangeFeed>) -> Self {
        Self {
            sql,
            feed,
            _record: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        T::TABLE
    }

    /// Create the table and its indexes if they don't exist.
    pub fn ensure_table(&self) -> Result<(), ServiceError> {
        let mut defs = vec![
            "id TEXT PRIMARY KEY".to_string(),
            "data TEXT NOT NULL".to_string(),
        ];
        defs.extend(T::COLUMNS.iter().map(|c| c.ddl()));

        let create = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({})",
            T::TABLE,
            defs.join(", ")
        );
        self.sql.exec(&create, &[]).map_err(sql_err)?;

        for col in T::COLUMNS.iter().filter(|c| !c.unique) {
            let idx = format!(
                "CREATE INDEX IF NOT EXISTS \"idx_{t}_{c}\" ON \"{t}\" (\"{c}\")",
                t = T::TABLE,
                c = col.name
            );
            self.sql.exec(&idx, &[]).map_err(sql_err)?;
        }
        tracing::debug!(table = T::TABLE, "table ready");
        Ok(())
    }

    /// Build the INSERT for a record without executing it.
    pub fn insert_statement(&self, record: &T) -> Result<Statement, ServiceError> {
        let json = serde_json::to_value(record)?;
        let mut names = vec!["id".to_string(), "data".to_string()];
        let mut params: Vec<Value> = vec![record.id().into(), json.to_string().into()];
        for col in T::COLUMNS {
            names.push(format!("\"{}\"", col.name));
            params.push(col.extract(&json));
        }
        let slots: Vec<String> = (1..=params.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            T::TABLE,
            names.join(", "),
            slots.join(", ")
        );
        Ok(Statement::new(sql, params))
    }

    /// Build the UPDATE for a record without executing it.
    pub fn update_statement(&self, record: &T) -> Result<Statement, ServiceError> {
        let json = serde_json::to_value(record)?;
        let mut sets = vec!["data = ?2".to_string()];
        let mut params: Vec<Value> = vec![record.id().into(), json.to_string().into()];
        for col in T::COLUMNS {
            params.push(col.extract(&json));
            sets.push(format!("\"{}\" = ?{}", col.name, params.len()));
        }
        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE id = ?1",
            T::TABLE,
            sets.join(", ")
        );
        Ok(Statement::new(sql, params))
    }

    /// Announce a write that was applied outside of this table's own
    /// methods (e.g. as part of a batch).
    pub fn publish(&self, op: ChangeOp, id: &str) -> u64 {
        self.feed.publish(T::TABLE, op, id)
    }

    /// Insert a new record. A duplicate id or unique column is a conflict.
    pub fn insert(&self, record: &T) -> Result<(), ServiceError> {
        let stmt = self.insert_statement(record)?;
        self.sql.exec(&stmt.sql, &stmt.params).map_err(|e| match e {
            SQLError::Constraint(_) => ServiceError::AlreadyExists(format!(
                "{}/{} conflicts with an existing record",
                T::TABLE,
                record.id()
            )),
            other => sql_err(other),
        })?;
        self.publish(ChangeOp::Insert, record.id());
        Ok(())
    }

    pub fn get(&self, id: &str) -> Result<Option<T>, ServiceError> {
        let sql = format!("SELECT data FROM \"{}\" WHERE id = ?1", T::TABLE);
        let rows = self.sql.query(&sql, &[id.into()]).map_err(sql_err)?;
        match rows.first().and_then(|r| r.get_str("data")) {
            Some(data) => Ok(Some(serde_json::from_str(data)?)),
            None => Ok(None),
        }
    }

    pub fn get_or_err(&self, id: &str) -> Result<T, ServiceError> {
        self.get(id)?
            .ok_or_else(|| ServiceError::not_found(T::TABLE, id))
    }

    /// Replace an existing record.
    pub fn update(&self, record: &T) -> Result<(), ServiceError> {
        let stmt = self.update_statement(record)?;
        let n = self.sql.exec(&stmt.sql, &stmt.params).map_err(|e| match e {
            SQLError::Constraint(_) => ServiceError::AlreadyExists(format!(
                "{}/{} conflicts with an existing record",
                T::TABLE,
                record.id()
            )),
            other => sql_err(other),
        })?;
        if n == 0 {
            return Err(ServiceError::not_found(T::TABLE, record.id()));
        }
        self.publish(ChangeOp::Update, record.id());
        Ok(())
    }

    pub fn delete(&self, id: &str) -> Result<(), ServiceError> {
        let sql = format!("DELETE FROM \"{}\" WHERE id = ?1", T::TABLE);
        let n = self.sql.exec(&sql, &[id.into()]).map_err(sql_err)?;
        if n == 0 {
            return Err(ServiceError::not_found(T::TABLE, id));
        }
        self.publish(ChangeOp::Delete, id);
        Ok(())
    }

    fn check_columns(&self, query: &Query) -> Result<(), ServiceError> {
        match query.columns().into_iter().find(|c| !T::has_column(c)) {
            Some(c) => Err(ServiceError::Validation(format!(
                "{} cannot be filtered or sorted by '{}'",
                T::TABLE,
                c
            ))),
            None => Ok(()),
        }
    }

    /// Count records matching the query's filters.
    pub fn count(&self, query: &Query) -> Result<usize, ServiceError> {
        self.check_columns(query)?;
        let (where_sql, params) = query.where_sql();
        let sql = format!("SELECT COUNT(*) AS cnt FROM \"{}\"{}", T::TABLE, where_sql);
        let rows = self.sql.query(&sql, &params).map_err(sql_err)?;
        Ok(rows.first().and_then(|r| r.get_i64("cnt")).unwrap_or(0) as usize)
    }

    /// One page of matching records plus the total match count.
    pub fn find(&self, query: &Query) -> Result<ListResult<T>, ServiceError> {
        let total = self.count(query)?;
        let items = self.find_all(query)?;
        Ok(ListResult { items, total })
    }

    /// Matching records, honoring the query's limit and offset if set.
    pub fn find_all(&self, query: &Query) -> Result<Vec<T>, ServiceError> {
        self.check_columns(query)?;
        let (where_sql, mut params) = query.where_sql();
        let mut sql = format!(
            "SELECT data FROM \"{}\"{}{}",
            T::TABLE,
            where_sql,
            query.order_sql()
        );
        if query.limit.is_some() || query.offset > 0 {
            let limit = query.limit.map(|l| l as i64).unwrap_or(-1);
            params.push(limit.into());
            params.push((query.offset as i64).into());
            sql.push_str(&format!(" LIMIT ?{} OFFSET ?{}", params.len() - 1, params.len()));
        }

        let rows = self.sql.query(&sql, &params).map_err(sql_err)?;
        let mut items = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(data) = row.get_str("data") {
                items.push(serde_json::from_str(data)?);
            }
        }
        Ok(items)
    }

    /// Apply several prepared statements atomically.
    pub fn exec_batch(&self, statements: &[Statement]) -> Result<Vec<u64>, ServiceError> {
        self.sql.exec_batch(statements).map_err(sql_err)
    }
}
