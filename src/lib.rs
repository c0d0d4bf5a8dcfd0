#![doc = include_str!("../README.md")]

pub use serde_json::Value;
pub use sqlx_askama_connector_macro::*;

mod arg_type;
#[cfg(feature = "any")]
mod connector;
#[cfg(feature = "any")]
pub mod db_adapter;
mod dialect;
mod error;
mod query;
mod record;
mod registry;
mod session;
mod sql_template;
mod statement;
mod template_arg;

pub use arg_type::*;
#[cfg(feature = "any")]
pub use connector::*;
pub use dialect::*;
pub use error::*;
pub use query::*;
pub use record::*;
pub use registry::*;
pub use session::*;
pub use sql_template::*;
pub use statement::*;
pub use template_arg::*;
