mod group_store;
mod handle;
mod member_store;
mod models;
mod pool;

pub use group_store::{GroupStore, PgGroupStore};
pub use handle::Db;
pub use member_store::{MemberStore, PgMemberStore};
pub use models::{Group, Member, MemberCategory, NewMember, ParseCategoryError};
pub use pool::connect;

#[cfg(test)]
pub(crate) use group_store::MockGroupStore;
#[cfg(test)]
pub(crate) use handle::stub::{StubControl, TxEvent};
#[cfg(test)]
pub(crate) use member_store::MockMemberStore;

use thiserror::Error;

/// Store-layer failure vocabulary. `NotFound` is the one value every
/// upstream caller must recognize; everything else is opaque.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No row matched the given key in the caller's tenant scope.
    #[error("identified data not found")]
    NotFound,

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Row-locking mode for fetch queries. `ForUpdate` takes an exclusive
/// lock on the matched row, held until the enclosing transaction ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locking {
    None,
    ForUpdate,
}
