use sqlx::{Any, AnyPool, Transaction};
use tracing::debug;

use super::SqlxSession;
use crate::{Error, SessionProvider};

impl SqlxSession<Transaction<'static, Any>> {
    /// Commits when the session was marked dirty, rolls back otherwise
    ///
    /// Needs no pool: the transaction owns its connection.
    pub async fn finish(self) -> Result<(), Error> {
        let dirty = self.is_dirty();
        let tx = self.into_inner();
        if dirty {
            tx.commit().await?;
        } else {
            debug!("rolling back unchanged session");
            tx.rollback().await?;
        }
        Ok(())
    }
}

/// Sessions from a pool are transactions: finishing a dirty session commits,
/// finishing a clean one rolls back.
impl SessionProvider for AnyPool {
    type Session = SqlxSession<Transaction<'static, Any>>;

    async fn session(&self) -> Result<Self::Session, Error> {
        let tx = self.begin().await?;
        SqlxSession::new(tx)
    }

    async fn finish(&self, session: Self::Session) -> Result<(), Error> {
        session.finish().await
    }
}
