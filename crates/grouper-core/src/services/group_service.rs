use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use super::{rollback, ServiceError, ValidationError};
use crate::context::RequestContext;
use crate::database::{
    Db, Group, GroupStore, Locking, MemberStore, PgGroupStore, PgMemberStore,
};

static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w-]+$").expect("group name pattern"));

/// Orchestrates group workflows, including the explicit member cascade
/// on delete: the schema carries no `on delete cascade`, so referential
/// integrity is this service's job.
pub struct GroupService<G = PgGroupStore, M = PgMemberStore> {
    group_store: G,
    member_store: M,
    db: Db,
}

impl<G: GroupStore, M: MemberStore> GroupService<G, M> {
    pub fn new(group_store: G, member_store: M, db: Db) -> Self {
        Self {
            group_store,
            member_store,
            db,
        }
    }

    pub async fn fetch_all(&self, ctx: &RequestContext) -> Result<Vec<Group>, ServiceError> {
        let mut db = self.db.handle();
        Ok(self.group_store.fetch_all(&mut db, ctx).await?)
    }

    pub async fn fetch_by_name(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<Group, ServiceError> {
        let mut db = self.db.handle();
        Ok(self
            .group_store
            .fetch_by_name(&mut db, ctx, name, Locking::None)
            .await?)
    }

    /// Creates a validated group; the returned value carries the
    /// assigned id.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        mut group: Group,
    ) -> Result<Group, ServiceError> {
        validate(&group)?;

        let mut db = self.db.handle();
        group.id = self.group_store.create(&mut db, ctx, &group).await?;
        Ok(group)
    }

    /// Deletes the group and every member it owns, atomically.
    ///
    /// The locked fetch serializes this call against any concurrent
    /// member creation under the same group: whichever transaction takes
    /// the row lock first wins, and the other proceeds against the
    /// committed state. A commit failure leaves the outcome unknown; the
    /// caller may retry the whole delete, since a second delete of a
    /// gone group reports `NotFound`.
    pub async fn delete_by_name(
        &self,
        ctx: &RequestContext,
        name: &str,
    ) -> Result<(), ServiceError> {
        let mut tx = self.db.begin().await?;

        let group = match self
            .group_store
            .fetch_by_name(&mut tx, ctx, name, Locking::ForUpdate)
            .await
        {
            Ok(group) => group,
            Err(err) => {
                rollback(tx).await;
                return Err(err.into());
            }
        };

        let members = match self
            .member_store
            .delete_by_group_id(&mut tx, ctx, group.id)
            .await
        {
            Ok(count) => count,
            Err(err) => {
                rollback(tx).await;
                return Err(err.into());
            }
        };

        if let Err(err) = self.group_store.delete_by_id(&mut tx, ctx, group.id).await {
            rollback(tx).await;
            return Err(err.into());
        }

        tx.commit().await?;

        debug!(group = name, members, "deleted group");
        Ok(())
    }
}

fn validate(group: &Group) -> Result<(), ValidationError> {
    let mut errors = ValidationError::new();
    if group.name.is_empty() {
        errors.add("name", "must be present");
    }
    if !NAME_PATTERN.is_match(&group.name) {
        errors.add(
            "name",
            format!(
                "must match regular expression '{}'",
                NAME_PATTERN.as_str()
            ),
        );
    }
    errors.into_result()
}
