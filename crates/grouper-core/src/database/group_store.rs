use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::debug;

use super::handle::Db;
use super::models::Group;
use super::{Locking, StoreError};
use crate::context::RequestContext;

// Every template joins `tenants` and takes the context tenant as $1;
// that join is the isolation invariant and must never be dropped.
const FETCH_ALL: &str = "\
    select g.id, g.name \
    from groups g \
    join tenants t on g.tenant_id = t.id \
    where t.name = $1 \
    order by g.id";

const FETCH_BY_NAME: &str = "\
    select g.id, g.name \
    from groups g \
    join tenants t on g.tenant_id = t.id \
    where t.name = $1 and g.name = $2";

const FETCH_BY_NAME_FOR_UPDATE: &str = "\
    select g.id, g.name \
    from groups g \
    join tenants t on g.tenant_id = t.id \
    where t.name = $1 and g.name = $2 \
    for update of g";

const CREATE: &str = "\
    insert into groups (tenant_id, name) \
    select t.id, $2 \
    from tenants t \
    where t.name = $1 \
    returning id";

const DELETE_BY_ID: &str = "\
    delete from groups g \
    using tenants t \
    where g.tenant_id = t.id and t.name = $1 and g.id = $2";

/// Tenant-scoped persistence operations for groups.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait GroupStore: Send + Sync {
    /// All of the tenant's groups, ordered by row id.
    async fn fetch_all(&self, db: &mut Db, ctx: &RequestContext)
        -> Result<Vec<Group>, StoreError>;

    /// `Locking::ForUpdate` holds an exclusive lock on the matched row
    /// until the enclosing transaction ends; the cascading delete and
    /// the create-member protocols serialize on it.
    async fn fetch_by_name(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        name: &str,
        locking: Locking,
    ) -> Result<Group, StoreError>;

    /// Returns the newly assigned row id; `group.id` is ignored.
    async fn create(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        group: &Group,
    ) -> Result<i32, StoreError>;

    async fn delete_by_id(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        id: i32,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PgGroupStore;

#[async_trait]
impl GroupStore for PgGroupStore {
    async fn fetch_all(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
    ) -> Result<Vec<Group>, StoreError> {
        let mut conn = db.conn().await?;
        let groups = sqlx::query_as::<_, Group>(FETCH_ALL)
            .bind(ctx.tenant())
            .fetch_all(&mut *conn)
            .await?;

        Ok(groups)
    }

    async fn fetch_by_name(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        name: &str,
        locking: Locking,
    ) -> Result<Group, StoreError> {
        let query = match locking {
            Locking::None => FETCH_BY_NAME,
            Locking::ForUpdate => FETCH_BY_NAME_FOR_UPDATE,
        };

        let mut conn = db.conn().await?;
        sqlx::query_as::<_, Group>(query)
            .bind(ctx.tenant())
            .bind(name)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn create(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        group: &Group,
    ) -> Result<i32, StoreError> {
        let mut conn = db.conn().await?;
        // insert-select keeps even the insert tenant-scoped; zero rows
        // means the tenant itself is unknown.
        let id = sqlx::query_scalar::<_, i32>(CREATE)
            .bind(ctx.tenant())
            .bind(&group.name)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(StoreError::NotFound)?;

        debug!(id, name = %group.name, "created group");
        Ok(id)
    }

    async fn delete_by_id(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        id: i32,
    ) -> Result<(), StoreError> {
        let mut conn = db.conn().await?;
        let result = sqlx::query(DELETE_BY_ID)
            .bind(ctx.tenant())
            .bind(id)
            .execute(&mut *conn)
            .await?;

        match result.rows_affected() {
            0 => Err(StoreError::NotFound),
            1 => Ok(()),
            n => panic!("deleted {n} rows when expecting only one"),
        }
    }
}
