use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::{Error, Session, SessionProvider, TemplateArg, TemplateArgs, TypedQuery};

/// Renders SQL text from a template argument set
///
/// Implemented for closures and generated by `#[derive(SqlRenderer)]` for
/// askama templates.
pub trait SqlRenderer {
    fn render_sql(&self, args: &TemplateArgs) -> Result<String, Error>;
}

impl<F> SqlRenderer for F
where
    F: Fn(&TemplateArgs) -> Result<String, askama::Error>,
{
    fn render_sql(&self, args: &TemplateArgs) -> Result<String, Error> {
        Ok(self(args)?)
    }
}

/// SQL template with a mutable argument set, rendered into a [`TypedQuery`]
///
/// # Generic Parameters
/// - `R`: template renderer
/// - `P`: session provider used by [`SqlTemplate::run_query`]
pub struct SqlTemplate<R, P> {
    id: String,
    renderer: R,
    provider: Option<P>,
    args: TemplateArgs,
    debug: bool,
    max_rows: usize,
}

impl<R, P> SqlTemplate<R, P>
where
    R: SqlRenderer,
{
    pub fn new(id: impl Into<String>, renderer: R, provider: Option<P>) -> Self {
        SqlTemplate {
            id: id.into(),
            renderer,
            provider,
            args: TemplateArgs::new(),
            debug: false,
            max_rows: 0,
        }
    }

    pub fn with_provider(mut self, provider: P) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = TemplateArg>) -> Self {
        self.args.set_args(args);
        self
    }

    /// Exposes `count()`/`not_count()` as true/false to the template
    pub fn with_count(mut self, count: bool) -> Self {
        self.args.set_count(count);
        self
    }

    /// Logs the rendered SQL of every render
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_debug(&self) -> bool {
        self.debug
    }

    pub fn args(&self) -> &TemplateArgs {
        &self.args
    }

    pub fn set_args(&mut self, args: impl IntoIterator<Item = TemplateArg>) {
        self.args.set_args(args);
    }

    pub fn set_condition<F, V>(&mut self, key: impl Into<String>, condition: F) -> Result<(), Error>
    where
        F: Fn() -> V + Send + Sync + 'static,
        V: Into<Value>,
    {
        self.args.set_condition(key, condition)
    }

    pub fn check(&self, key: &str) -> bool {
        self.args.check(key)
    }

    pub fn render(&self, key: &str) -> String {
        self.args.render(key)
    }

    pub fn get_args_as_to_query(&self) -> Vec<TemplateArg> {
        self.args.get_args_as_to_query()
    }

    pub fn get_args_as_to_exec(&self) -> IndexMap<String, Value> {
        self.args.get_args_as_to_exec()
    }

    /// Renders the template against the current arguments, trimmed
    pub fn render_template(&self) -> Result<String, Error> {
        let sql = self.renderer.render_sql(&self.args)?;
        let sql = sql.trim().to_string();
        if self.debug {
            debug!(template = %self.id, %sql, "rendered sql template");
        }
        Ok(sql)
    }

    /// Builds the typed query from the rendered text and bindable arguments
    pub fn to_query(&self) -> Result<TypedQuery, Error> {
        let sql = self.render_template()?;
        let query = TypedQuery::new(&self.id, sql, &self.get_args_as_to_query())?;
        Ok(query.with_max_rows(self.max_rows))
    }

    /// Runs the template inside a caller-owned session, leaving the session
    /// open
    pub async fn run_query_in<S>(&self, session: &mut S) -> Result<Vec<Map<String, Value>>, Error>
    where
        S: Session,
    {
        let query = self.to_query()?;
        let result = query.execute(session, &self.get_args_as_to_exec()).await?;
        Ok(result.dictionaries())
    }
}

impl<R, P> SqlTemplate<R, P>
where
    R: SqlRenderer,
    P: SessionProvider,
{
    /// Runs the template in a fresh session from the provider
    ///
    /// The session is finished (committed) on success and dropped, discarding
    /// its work, when the query fails.
    ///
    /// # Errors
    /// Returns [`Error::NotConfigured`] when no provider was supplied
    pub async fn run_query(&self) -> Result<Vec<Map<String, Value>>, Error> {
        let provider = self
            .provider
            .as_ref()
            .ok_or_else(|| Error::NotConfigured(self.id.clone()))?;
        let query = self.to_query()?;
        let mut session = provider.session().await?;
        match query.execute(&mut session, &self.get_args_as_to_exec()).await {
            Ok(result) => {
                provider.finish(session).await?;
                Ok(result.dictionaries())
            }
            Err(e) => {
                warn!(template = %self.id, error = %e, "query failed, discarding session");
                Err(e)
            }
        }
    }
}
