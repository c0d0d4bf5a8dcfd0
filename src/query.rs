use std::{borrow::Borrow, collections::HashMap, sync::Arc};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use crate::{
    ArgType, Bound, Cursor, Error, Record, ResultSet, ScalarType, Session, Statement, TemplateArg,
};

#[derive(Debug, Clone, Copy)]
struct ParamSpec {
    ty: ScalarType,
    multiple: bool,
}

/// A parameterized statement with a declared type per named parameter
///
/// Arguments are coerced to their declared type before anything is sent to
/// the session; a single failing argument aborts the whole call.
#[derive(Debug, Clone)]
pub struct TypedQuery {
    id: String,
    statement: Statement,
    params: HashMap<String, ParamSpec>,
    max_rows: usize,
}

impl TypedQuery {
    /// Builds a query from `:name` placeholder SQL and its declarations
    ///
    /// # Errors
    /// Returns [`Error::Declaration`] when a declaration has no type, a type
    /// other than `string`, `int` or `float`, or repeats a key
    pub fn new<'a>(
        id: impl Into<String>,
        template: impl Into<String>,
        arguments: impl IntoIterator<Item = &'a TemplateArg>,
    ) -> Result<Self, Error> {
        let mut params = HashMap::new();
        for arg in arguments {
            let ty = match arg.ty {
                Some(ArgType::Scalar(ty)) => ty,
                Some(ArgType::List) => {
                    return Err(Error::declaration(&arg.key, "invalid type list"));
                }
                None => return Err(Error::declaration(&arg.key, "missing type")),
            };
            let param = ParamSpec {
                ty,
                multiple: arg.multiple,
            };
            if params.insert(arg.key.clone(), param).is_some() {
                return Err(Error::declaration(&arg.key, "duplicate key"));
            }
        }
        Ok(TypedQuery {
            id: id.into(),
            statement: Statement::parse(template),
            params,
            max_rows: 0,
        })
    }

    /// Caps fetched rows; `0` fetches everything
    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn statement(&self) -> &Statement {
        &self.statement
    }

    /// Type-checks and coerces named arguments against the declarations
    ///
    /// # Errors
    /// - [`Error::UnknownParameter`] for a key without declaration
    /// - [`Error::TypeCoercion`] for a value (or any element of a `multiple`
    ///   value) that does not fit the declared type
    pub fn bind<I, K, V>(&self, arguments: I) -> Result<IndexMap<String, Bound>, Error>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Borrow<Value>,
    {
        let mut params = IndexMap::new();
        for (key, value) in arguments {
            let key = key.as_ref();
            let param = self
                .params
                .get(key)
                .ok_or_else(|| Error::UnknownParameter(key.to_string()))?;
            let coercion_error = || Error::TypeCoercion {
                key: key.to_string(),
                ty: param.ty,
            };
            let bound = if param.multiple {
                let Value::Array(items) = value.borrow() else {
                    return Err(coercion_error());
                };
                let scalars = items
                    .iter()
                    .map(|item| param.ty.coerce(item).ok_or_else(coercion_error))
                    .collect::<Result<Vec<_>, _>>()?;
                Bound::Many(scalars)
            } else {
                Bound::One(param.ty.coerce(value.borrow()).ok_or_else(coercion_error)?)
            };
            params.insert(key.to_string(), bound);
        }
        Ok(params)
    }

    /// Binds `arguments` and runs the statement in `session`
    ///
    /// The session is marked dirty on every execution, read-only statements
    /// included. The cursor is closed before returning, also when fetching
    /// fails.
    ///
    /// # Errors
    /// Binding errors of [`Self::bind`], [`Error::MissingParameter`], session
    /// errors, and [`Error::RowWidth`] for rows not matching the column list
    pub async fn execute<S, I, K, V>(&self, session: &mut S, arguments: I) -> Result<ResultSet, Error>
    where
        S: Session,
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Borrow<Value>,
    {
        let params = self.bind(arguments)?;
        let (sql, arguments) = self.statement.render(session.dialect(), &params)?;

        session.mark_dirty();
        debug!(query = %self.id, %sql, "executing statement");
        let mut cursor = session.execute(&sql, arguments).await?;

        if !cursor.returns_rows() {
            cursor.close().await?;
            return Ok(ResultSet::no_rows());
        }

        let columns: Arc<[String]> = cursor.columns().into();
        let fetched = if self.max_rows > 0 {
            cursor.fetch_many(self.max_rows).await
        } else {
            cursor.fetch_all().await
        };
        // a fetch error outranks a close error
        let closed = cursor.close().await;
        let fetched = fetched?;
        closed?;

        let rows = fetched
            .into_iter()
            .map(|values| {
                if values.len() != columns.len() {
                    return Err(Error::RowWidth {
                        columns: columns.len(),
                        values: values.len(),
                    });
                }
                Ok(Record::new(columns.clone(), values))
            })
            .collect::<Result<Vec<_>, _>>()?;
        debug!(query = %self.id, rows = rows.len(), "fetched rows");
        Ok(ResultSet::new(rows))
    }
}
