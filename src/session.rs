use std::sync::Arc;

use serde_json::Value;

use crate::{DBType, Error, Scalar};

/// Open result of one executed statement
///
/// Holds provider-side resources until [`Cursor::close`] is called or the
/// cursor is dropped.
#[allow(async_fn_in_trait)]
pub trait Cursor {
    /// `false` for statements such as `INSERT` or `UPDATE`
    fn returns_rows(&self) -> bool;
    fn columns(&self) -> &[String];
    async fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>, Error>;
    /// Fetches at most `n` rows, in delivery order
    async fn fetch_many(&mut self, n: usize) -> Result<Vec<Vec<Value>>, Error>;
    async fn close(self) -> Result<(), Error>;
}

/// A live connection or transaction statements run against
#[allow(async_fn_in_trait)]
pub trait Session {
    type Cursor<'s>: Cursor
    where
        Self: 's;

    /// Placeholder dialect of the backend
    fn dialect(&self) -> DBType;

    /// Flags the session as changed so that finishing it commits the work
    fn mark_dirty(&mut self);

    async fn execute<'s>(
        &'s mut self,
        sql: &'s str,
        arguments: Vec<Scalar>,
    ) -> Result<Self::Cursor<'s>, Error>;
}

/// Opens and completes sessions
#[allow(async_fn_in_trait)]
pub trait SessionProvider {
    type Session: Session;

    async fn session(&self) -> Result<Self::Session, Error>;

    /// Completes a session: commits when it was marked dirty, discards its
    /// work otherwise.
    async fn finish(&self, session: Self::Session) -> Result<(), Error>;
}

impl<P: SessionProvider> SessionProvider for Arc<P> {
    type Session = P::Session;

    async fn session(&self) -> Result<Self::Session, Error> {
        (**self).session().await
    }

    async fn finish(&self, session: Self::Session) -> Result<(), Error> {
        (**self).finish(session).await
    }
}

impl<P: SessionProvider> SessionProvider for &P {
    type Session = P::Session;

    async fn session(&self) -> Result<Self::Session, Error> {
        (**self).session().await
    }

    async fn finish(&self, session: Self::Session) -> Result<(), Error> {
        (**self).finish(session).await
    }
}
