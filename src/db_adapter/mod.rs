//! [`Session`] implementation over the sqlx `Any` driver

use std::ops::DerefMut;

use futures_core::stream::BoxStream;
use futures_util::TryStreamExt;
use serde_json::{Number, Value};
use sqlx::{
    Any, AnyConnection, Arguments, Column, Executor, Row, Statement as _,
    any::{AnyArguments, AnyRow},
};
use tracing::debug;

use crate::{Cursor, DBType, Error, Scalar, Session};

mod any;

/// Session over any connection-like handle: a pool connection, a plain
/// connection or a transaction
pub struct SqlxSession<C> {
    conn: C,
    dialect: DBType,
    dirty: bool,
}

impl<C> SqlxSession<C>
where
    C: DerefMut<Target = AnyConnection>,
{
    /// # Errors
    /// Fails for backends without a known placeholder dialect
    pub fn new(conn: C) -> Result<Self, Error> {
        let dialect = DBType::new(conn.backend_name())?;
        Ok(SqlxSession {
            conn,
            dialect,
            dirty: false,
        })
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn into_inner(self) -> C {
        self.conn
    }
}

impl<C> Session for SqlxSession<C>
where
    C: DerefMut<Target = AnyConnection>,
{
    type Cursor<'s>
        = SqlxCursor<'s>
    where
        Self: 's;

    fn dialect(&self) -> DBType {
        self.dialect
    }

    fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    async fn execute<'s>(
        &'s mut self,
        sql: &'s str,
        arguments: Vec<Scalar>,
    ) -> Result<SqlxCursor<'s>, Error> {
        let conn: &'s mut AnyConnection = &mut self.conn;
        let columns: Vec<String> = (&mut *conn)
            .prepare(sql)
            .await?
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        let query = sqlx::query_with::<Any, _>(sql, encode_arguments(arguments)?);

        if columns.is_empty() {
            let result = query.execute(conn).await?;
            debug!(rows_affected = result.rows_affected(), "statement executed");
            return Ok(SqlxCursor {
                columns,
                rows: None,
            });
        }
        Ok(SqlxCursor {
            columns,
            rows: Some(query.fetch(conn)),
        })
    }
}

fn encode_arguments<'q>(scalars: Vec<Scalar>) -> Result<AnyArguments<'q>, Error> {
    let mut arguments = AnyArguments::default();
    for scalar in scalars {
        match scalar {
            Scalar::Int(i) => arguments.add(i),
            Scalar::Float(f) => arguments.add(f),
            Scalar::Text(t) => arguments.add(t),
        }
        .map_err(sqlx::Error::Encode)?;
    }
    Ok(arguments)
}

/// Row stream of an executed statement; `None` when the statement returns
/// no rows
pub struct SqlxCursor<'s> {
    columns: Vec<String>,
    rows: Option<BoxStream<'s, Result<AnyRow, sqlx::Error>>>,
}

impl SqlxCursor<'_> {
    async fn next_values(&mut self) -> Result<Option<Vec<Value>>, Error> {
        let Some(rows) = self.rows.as_mut() else {
            return Ok(None);
        };
        match rows.try_next().await? {
            Some(row) => Ok(Some(decode_row(&row)?)),
            None => Ok(None),
        }
    }
}

impl Cursor for SqlxCursor<'_> {
    fn returns_rows(&self) -> bool {
        self.rows.is_some()
    }

    fn columns(&self) -> &[String] {
        &self.columns
    }

    async fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>, Error> {
        let mut rows = Vec::new();
        while let Some(values) = self.next_values().await? {
            rows.push(values);
        }
        Ok(rows)
    }

    async fn fetch_many(&mut self, n: usize) -> Result<Vec<Vec<Value>>, Error> {
        let mut rows = Vec::with_capacity(n);
        while rows.len() < n {
            match self.next_values().await? {
                Some(values) => rows.push(values),
                None => break,
            }
        }
        Ok(rows)
    }

    async fn close(self) -> Result<(), Error> {
        // dropping the stream releases the connection for the next statement
        drop(self.rows);
        Ok(())
    }
}

fn decode_row(row: &AnyRow) -> Result<Vec<Value>, Error> {
    (0..row.columns().len())
        .map(|index| decode_value(row, index))
        .collect()
}

fn decode_value(row: &AnyRow, index: usize) -> Result<Value, Error> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(index) {
        return Ok(v.map(Value::from).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<f64>, _>(index) {
        return Ok(v
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<bool>, _>(index) {
        return Ok(v.map(Value::Bool).unwrap_or(Value::Null));
    }
    if let Ok(v) = row.try_get::<Option<String>, _>(index) {
        return Ok(v.map(Value::String).unwrap_or(Value::Null));
    }
    let bytes = row.try_get::<Option<Vec<u8>>, _>(index)?;
    Ok(bytes.map(Value::from).unwrap_or(Value::Null))
}
