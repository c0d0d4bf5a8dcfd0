use thiserror::Error;

use crate::ScalarType;

#[derive(Error, Debug)]
pub enum Error {
    /// Malformed argument declaration: missing or unsupported type.
    #[error("declaration error on `{key}`: {message}")]
    Declaration { key: String, message: String },
    /// Caller supplied an argument the query does not declare.
    #[error("received unexpected argument `{0}`")]
    UnknownParameter(String),
    #[error("invalid value for type {ty} on `{key}`")]
    TypeCoercion { key: String, ty: ScalarType },
    /// The statement references a placeholder that received no value.
    #[error("no value bound for placeholder `:{0}`")]
    MissingParameter(String),
    #[error("condition `{0}` already exists")]
    ConditionExists(String),
    #[error("session provider not configured for `{0}`")]
    NotConfigured(String),
    /// A provider delivered a row whose width differs from its column list.
    #[error("row has {values} values for {columns} columns")]
    RowWidth { columns: usize, values: usize },
    #[error("no connection registered under name `{0}`")]
    ConnectionNotFound(String),
    #[error("data base error: {0}")]
    SqlxError(#[from] sqlx::Error),
    #[error("askama error: {0}")]
    AskamaError(#[from] askama::Error),
    #[error("{0}")]
    Message(String),
}

impl Error {
    pub(crate) fn declaration(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Declaration {
            key: key.into(),
            message: message.into(),
        }
    }
}

impl From<String> for Error {
    fn from(e: String) -> Self {
        Error::Message(e)
    }
}

impl From<&str> for Error {
    fn from(e: &str) -> Self {
        Error::Message(e.to_string())
    }
}
