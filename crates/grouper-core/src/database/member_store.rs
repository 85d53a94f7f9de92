use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use tracing::debug;
use uuid::Uuid;

use super::handle::Db;
use super::models::Member;
use super::StoreError;
use crate::context::RequestContext;

// Members reach their tenant through the owning group; every template
// carries the two joins and takes the context tenant as $1.
const FETCH_ALL: &str = "\
    select m.id, m.external_id, m.category_id as category, m.size_mm, m.group_id \
    from members m \
    join groups g on m.group_id = g.id \
    join tenants t on g.tenant_id = t.id \
    where t.name = $1 \
    order by m.id";

const FETCH_ALL_BY_GROUP_NAME: &str = "\
    select m.id, m.external_id, m.category_id as category, m.size_mm, m.group_id \
    from members m \
    join groups g on m.group_id = g.id \
    join tenants t on g.tenant_id = t.id \
    where t.name = $1 and g.name = $2 \
    order by m.id";

const FETCH_BY_EXTERNAL_ID: &str = "\
    select m.id, m.external_id, m.category_id as category, m.size_mm, m.group_id \
    from members m \
    join groups g on m.group_id = g.id \
    join tenants t on g.tenant_id = t.id \
    where t.name = $1 and g.name = $2 and m.external_id = $3";

const CREATE: &str = "\
    insert into members (external_id, category_id, size_mm, group_id) \
    select $2, $3, $4, g.id \
    from groups g \
    join tenants t on g.tenant_id = t.id \
    where t.name = $1 and g.id = $5 \
    returning id";

const DELETE_BY_EXTERNAL_ID: &str = "\
    delete from members m \
    using groups g, tenants t \
    where m.group_id = g.id and g.tenant_id = t.id \
    and t.name = $1 and g.name = $2 and m.external_id = $3";

const DELETE_BY_GROUP_ID: &str = "\
    delete from members m \
    using groups g, tenants t \
    where m.group_id = g.id and g.tenant_id = t.id \
    and t.name = $1 and g.id = $2";

/// Tenant-scoped persistence operations for members.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait MemberStore: Send + Sync {
    /// All of the tenant's members across groups, ordered by row id.
    async fn fetch_all(&self, db: &mut Db, ctx: &RequestContext)
        -> Result<Vec<Member>, StoreError>;

    async fn fetch_all_by_group_name(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        group_name: &str,
    ) -> Result<Vec<Member>, StoreError>;

    async fn fetch_by_external_id(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        group_name: &str,
        external_id: Uuid,
    ) -> Result<Member, StoreError>;

    /// Returns the newly assigned row id; `member.id` is ignored. The
    /// insert re-checks that `member.group_id` belongs to the context
    /// tenant and reports `NotFound` otherwise.
    async fn create(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        member: &Member,
    ) -> Result<i32, StoreError>;

    async fn delete_by_external_id(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        group_name: &str,
        external_id: Uuid,
    ) -> Result<(), StoreError>;

    /// Cascade helper: removes every member of the group and returns how
    /// many went. Zero rows is success.
    async fn delete_by_group_id(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        group_id: i32,
    ) -> Result<u64, StoreError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PgMemberStore;

#[async_trait]
impl MemberStore for PgMemberStore {
    async fn fetch_all(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
    ) -> Result<Vec<Member>, StoreError> {
        let mut conn = db.conn().await?;
        let members = sqlx::query_as::<_, Member>(FETCH_ALL)
            .bind(ctx.tenant())
            .fetch_all(&mut *conn)
            .await?;

        Ok(members)
    }

    async fn fetch_all_by_group_name(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        group_name: &str,
    ) -> Result<Vec<Member>, StoreError> {
        let mut conn = db.conn().await?;
        let members = sqlx::query_as::<_, Member>(FETCH_ALL_BY_GROUP_NAME)
            .bind(ctx.tenant())
            .bind(group_name)
            .fetch_all(&mut *conn)
            .await?;

        Ok(members)
    }

    async fn fetch_by_external_id(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        group_name: &str,
        external_id: Uuid,
    ) -> Result<Member, StoreError> {
        let mut conn = db.conn().await?;
        sqlx::query_as::<_, Member>(FETCH_BY_EXTERNAL_ID)
            .bind(ctx.tenant())
            .bind(group_name)
            .bind(external_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn create(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        member: &Member,
    ) -> Result<i32, StoreError> {
        let mut conn = db.conn().await?;
        let id = sqlx::query_scalar::<_, i32>(CREATE)
            .bind(ctx.tenant())
            .bind(member.external_id)
            .bind(member.category)
            .bind(member.size_mm)
            .bind(member.group_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or(StoreError::NotFound)?;

        debug!(id, external_id = %member.external_id, "created member");
        Ok(id)
    }

    async fn delete_by_external_id(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        group_name: &str,
        external_id: Uuid,
    ) -> Result<(), StoreError> {
        let mut conn = db.conn().await?;
        let result = sqlx::query(DELETE_BY_EXTERNAL_ID)
            .bind(ctx.tenant())
            .bind(group_name)
            .bind(external_id)
            .execute(&mut *conn)
            .await?;

        match result.rows_affected() {
            0 => Err(StoreError::NotFound),
            1 => Ok(()),
            n => panic!("deleted {n} rows when expecting only one"),
        }
    }

    async fn delete_by_group_id(
        &self,
        db: &mut Db,
        ctx: &RequestContext,
        group_id: i32,
    ) -> Result<u64, StoreError> {
        let mut conn = db.conn().await?;
        let result = sqlx::query(DELETE_BY_GROUP_ID)
            .bind(ctx.tenant())
            .bind(group_id)
            .execute(&mut *conn)
            .await?;

        let rows = result.rows_affected();
        debug!(group_id, rows, "deleted members of group");
        Ok(rows)
    }
}
