use crate::Error;

/// Database type enumeration supporting major database systems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DBType {
    /// PostgreSQL database
    PostgreSQL,
    /// MySQL database
    MySQL,
    /// SQLite database
    SQLite,
}

impl DBType {
    /// Creates a DBType instance from a backend name
    ///
    /// # Arguments
    /// * `db_name` - Database identifier ("PostgreSQL"|"MySQL"|"SQLite")
    ///
    /// # Errors
    /// Returns Error::Message for unsupported database types
    ///
    /// # Example
    /// ```
    /// use sqlx_askama_connector::DBType;
    ///
    /// assert_eq!(DBType::new("SQLite").unwrap(), DBType::SQLite);
    /// ```
    pub fn new(db_name: &str) -> Result<Self, Error> {
        match db_name {
            "PostgreSQL" => Ok(Self::PostgreSQL),
            "MySQL" => Ok(Self::MySQL),
            "SQLite" => Ok(Self::SQLite),
            _ => Err(format!("unsupport db `{}`", db_name).into()),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::PostgreSQL => "PostgreSQL",
            Self::MySQL => "MySQL",
            Self::SQLite => "SQLite",
        }
    }

    /// Gets placeholder generation function for parameter binding
    ///
    /// Database-specific placeholder formats:
    /// - PostgreSQL: $1, $2...
    /// - MySQL/SQLite: ?
    pub fn get_encode_placeholder_fn(&self) -> fn(usize, &mut String) {
        match self {
            Self::PostgreSQL => |i: usize, s: &mut String| s.push_str(&format!("${}", i)),
            Self::MySQL | Self::SQLite => |_: usize, s: &mut String| s.push('?'),
        }
    }
}
