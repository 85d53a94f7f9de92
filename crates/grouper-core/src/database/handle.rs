use std::ops::{Deref, DerefMut};

use sqlx::pool::PoolConnection;
use sqlx::{PgConnection, PgPool, Postgres, Transaction};

/// Unified execution handle over a bare connection pool and an open
/// transaction.
///
/// Store code takes `&mut Db` and runs identically in either mode; only
/// the services decide where transaction boundaries go. `commit` and
/// `rollback` consume the handle, so a transaction cannot be used after
/// it ends.
///
/// Committing a pool handle or beginning a transaction on one that is
/// already open is a programming bug, not a runtime condition, and
/// aborts the process.
pub struct Db {
    inner: Inner,
}

enum Inner {
    Pool(PgPool),
    Tx(Transaction<'static, Postgres>),
    #[cfg(test)]
    Stub(stub::StubHandle),
}

impl Db {
    pub fn pool(pool: PgPool) -> Self {
        Self {
            inner: Inner::Pool(pool),
        }
    }

    /// Fresh handle over the same pool, for the duration of one service
    /// call.
    pub fn handle(&self) -> Self {
        match &self.inner {
            Inner::Pool(pool) => Self::pool(pool.clone()),
            Inner::Tx(_) => panic!("cannot derive a handle from an open transaction"),
            #[cfg(test)]
            Inner::Stub(stub) => Self {
                inner: Inner::Stub(stub.detached()),
            },
        }
    }

    pub fn in_transaction(&self) -> bool {
        match &self.inner {
            Inner::Pool(_) => false,
            Inner::Tx(_) => true,
            #[cfg(test)]
            Inner::Stub(stub) => stub.in_tx(),
        }
    }

    /// Open a transaction; the returned handle satisfies the same store
    /// contract as this one.
    pub async fn begin(&self) -> sqlx::Result<Db> {
        match &self.inner {
            Inner::Pool(pool) => Ok(Db {
                inner: Inner::Tx(pool.begin().await?),
            }),
            Inner::Tx(_) => panic!("transactions do not nest"),
            #[cfg(test)]
            Inner::Stub(stub) => stub.begin(),
        }
    }

    pub async fn commit(self) -> sqlx::Result<()> {
        match self.inner {
            Inner::Tx(tx) => tx.commit().await,
            Inner::Pool(_) => panic!("commit outside of a transaction"),
            #[cfg(test)]
            Inner::Stub(stub) => stub.commit(),
        }
    }

    pub async fn rollback(self) -> sqlx::Result<()> {
        match self.inner {
            Inner::Tx(tx) => tx.rollback().await,
            Inner::Pool(_) => panic!("rollback outside of a transaction"),
            #[cfg(test)]
            Inner::Stub(stub) => stub.rollback(),
        }
    }

    /// Connection for the next statement. Pool mode checks one out for a
    /// single store call; transaction mode reborrows the transaction's
    /// dedicated connection.
    pub(crate) async fn conn(&mut self) -> sqlx::Result<DbConn<'_>> {
        match &mut self.inner {
            Inner::Pool(pool) => Ok(DbConn::Pooled(pool.acquire().await?)),
            Inner::Tx(tx) => Ok(DbConn::Tx(&mut **tx)),
            #[cfg(test)]
            Inner::Stub(_) => panic!("stub handles cannot execute queries"),
        }
    }
}

pub(crate) enum DbConn<'d> {
    Pooled(PoolConnection<Postgres>),
    Tx(&'d mut PgConnection),
}

impl Deref for DbConn<'_> {
    type Target = PgConnection;

    fn deref(&self) -> &PgConnection {
        match self {
            DbConn::Pooled(conn) => conn,
            DbConn::Tx(conn) => conn,
        }
    }
}

impl DerefMut for DbConn<'_> {
    fn deref_mut(&mut self) -> &mut PgConnection {
        match self {
            DbConn::Pooled(conn) => conn,
            DbConn::Tx(conn) => conn,
        }
    }
}
