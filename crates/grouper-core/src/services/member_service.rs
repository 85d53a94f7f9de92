use tracing::debug;
use uuid::Uuid;

use super::{rollback, ServiceError, ValidationError};
use crate::context::RequestContext;
use crate::database::{
    Db, GroupStore, Locking, Member, MemberCategory, MemberStore, NewMember, PgGroupStore,
    PgMemberStore,
};

/// Orchestrates member workflows. Creation runs under the parent
/// group's row lock so it can never attach a member to a group that a
/// concurrent transaction is deleting.
pub struct MemberService<G = PgGroupStore, M = PgMemberStore> {
    group_store: G,
    member_store: M,
    db: Db,
}

impl<G: GroupStore, M: MemberStore> MemberService<G, M> {
    pub fn new(group_store: G, member_store: M, db: Db) -> Self {
        Self {
            group_store,
            member_store,
            db,
        }
    }

    pub async fn fetch_all(&self, ctx: &RequestContext) -> Result<Vec<Member>, ServiceError> {
        let mut db = self.db.handle();
        Ok(self.member_store.fetch_all(&mut db, ctx).await?)
    }

    pub async fn fetch_all_by_group_name(
        &self,
        ctx: &RequestContext,
        group_name: &str,
    ) -> Result<Vec<Member>, ServiceError> {
        let mut db = self.db.handle();
        Ok(self
            .member_store
            .fetch_all_by_group_name(&mut db, ctx, group_name)
            .await?)
    }

    pub async fn fetch_by_external_id(
        &self,
        ctx: &RequestContext,
        group_name: &str,
        external_id: Uuid,
    ) -> Result<Member, ServiceError> {
        let mut db = self.db.handle();
        Ok(self
            .member_store
            .fetch_by_external_id(&mut db, ctx, group_name, external_id)
            .await?)
    }

    /// Validated create under the parent group's row lock.
    ///
    /// Validation happens before any I/O; a fresh external token is
    /// assigned; the parent is fetched with `Locking::ForUpdate` inside
    /// the transaction that also inserts the member. If the parent was
    /// deleted in the meantime the locked fetch reports `NotFound` and
    /// the whole call rolls back; that is how this call loses the race
    /// against a concurrent cascading delete. No retry happens here.
    pub async fn create(
        &self,
        ctx: &RequestContext,
        group_name: &str,
        new: NewMember,
    ) -> Result<Member, ServiceError> {
        let category = validate(&new)?;

        let mut member = Member {
            id: 0,
            external_id: Uuid::new_v4(),
            category,
            size_mm: new.size_mm,
            group_id: 0,
        };

        let mut tx = self.db.begin().await?;

        let group = match self
            .group_store
            .fetch_by_name(&mut tx, ctx, group_name, Locking::ForUpdate)
            .await
        {
            Ok(group) => group,
            Err(err) => {
                rollback(tx).await;
                return Err(err.into());
            }
        };
        member.group_id = group.id;

        member.id = match self.member_store.create(&mut tx, ctx, &member).await {
            Ok(id) => id,
            Err(err) => {
                rollback(tx).await;
                return Err(err.into());
            }
        };

        tx.commit().await?;

        debug!(group = group_name, member = %member.external_id, "created member");
        Ok(member)
    }

    pub async fn delete_by_external_id(
        &self,
        ctx: &RequestContext,
        group_name: &str,
        external_id: Uuid,
    ) -> Result<(), ServiceError> {
        let mut db = self.db.handle();
        Ok(self
            .member_store
            .delete_by_external_id(&mut db, ctx, group_name, external_id)
            .await?)
    }
}

fn validate(new: &NewMember) -> Result<MemberCategory, ValidationError> {
    let mut errors = ValidationError::new();

    if new.category.is_empty() {
        errors.add("category", "must be present");
    }
    let category = match new.category.parse::<MemberCategory>() {
        Ok(category) => Some(category),
        Err(_) => {
            errors.add("category", "must be either 'STANDARD' or 'OVERSIZE'");
            None
        }
    };

    if new.size_mm == 0.0 {
        errors.add("size_mm", "must be present");
    }
    if new.size_mm <= 0.0 || new.size_mm.is_nan() {
        errors.add("size_mm", "must be a positive decimal value");
    }

    match (category, errors.is_empty()) {
        (Some(category), true) => Ok(category),
        _ => Err(errors),
    }
}

#[cfg(test)]
mod tests {
    use mockall::Sequence;

    use super::*;
    use crate::database::{Group, MockGroupStore, MockMemberStore, StoreError, TxEvent};

    fn ctx() -> RequestContext {
        RequestContext::new("acme")
    }

    fn kraken(id: i32) -> Group {
        Group {
            id,
            name: "kraken".to_string(),
        }
    }

    fn member(id: i32, group_id: i32) -> Member {
        Member {
            id,
            external_id: Uuid::new_v4(),
            category: MemberCategory::Standard,
            size_mm: 4.2,
            group_id,
        }
    }

    #[tokio::test]
    async fn fetch_all_uses_a_plain_handle() {
        let (db, control) = Db::stub();
        let expected = vec![member(1, 7), member(2, 7)];
        let members = expected.clone();

        let mut member_store = MockMemberStore::new();
        member_store
            .expect_fetch_all()
            .withf(|db, ctx| !db.in_transaction() && ctx.tenant() == "acme")
            .returning(move |_, _| Ok(members.clone()));

        let service = MemberService::new(MockGroupStore::new(), member_store, db);
        assert_eq!(service.fetch_all(&ctx()).await.unwrap(), expected);
        assert!(control.events().is_empty());
    }

    #[tokio::test]
    async fn fetch_by_external_id_passes_the_group_scope_through() {
        let (db, _control) = Db::stub();
        let expected = member(1, 7);
        let external_id = expected.external_id;
        let found = expected.clone();

        let mut member_store = MockMemberStore::new();
        member_store
            .expect_fetch_by_external_id()
            .withf(move |db, _, group_name, id| {
                !db.in_transaction() && group_name == "kraken" && *id == external_id
            })
            .returning(move |_, _, _, _| Ok(found.clone()));

        let service = MemberService::new(MockGroupStore::new(), member_store, db);
        let actual = service
            .fetch_by_external_id(&ctx(), "kraken", external_id)
            .await
            .unwrap();
        assert_eq!(actual, expected);
    }

    #[tokio::test]
    async fn delete_by_external_id_is_a_single_statement() {
        let (db, control) = Db::stub();
        let external_id = Uuid::new_v4();

        let mut member_store = MockMemberStore::new();
        member_store
            .expect_delete_by_external_id()
            .withf(move |db, _, group_name, id| {
                !db.in_transaction() && group_name == "kraken" && *id == external_id
            })
            .returning(|_, _, _, _| Err(StoreError::NotFound));

        let service = MemberService::new(MockGroupStore::new(), member_store, db);
        let err = service
            .delete_by_external_id(&ctx(), "kraken", external_id)
            .await
            .unwrap_err();

        assert!(matches!(err, ServiceError::NotFound));
        assert!(control.events().is_empty());
    }

    #[tokio::test]
    async fn create_locks_the_parent_then_inserts_then_commits() {
        let (db, control) = Db::stub();
        let mut seq = Sequence::new();

        let mut group_store = MockGroupStore::new();
        let mut member_store = MockMemberStore::new();

        group_store
            .expect_fetch_by_name()
            .withf(|db, ctx, name, locking| {
                db.in_transaction()
                    && ctx.tenant() == "acme"
                    && name == "kraken"
                    && *locking == Locking::ForUpdate
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(kraken(77)));
        member_store
            .expect_create()
            .withf(|db, _, member| {
                db.in_transaction()
                    && member.group_id == 77
                    && member.category == MemberCategory::Standard
                    && member.size_mm == 4.2
                    && !member.external_id.is_nil()
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _| Ok(42));

        let service = MemberService::new(group_store, member_store, db);
        let new = NewMember {
            category: "STANDARD".to_string(),
            size_mm: 4.2,
        };
        let member = service.create(&ctx(), "kraken", new).await.unwrap();

        assert_eq!(member.id, 42);
        assert_eq!(member.group_id, 77);
        assert_eq!(member.category, MemberCategory::Standard);
        assert!(!member.external_id.is_nil());
        assert_eq!(control.events(), vec![TxEvent::Begin, TxEvent::Commit]);
    }

    #[tokio::test]
    async fn create_fails_without_store_calls_when_begin_fails() {
        let (db, control) = Db::stub();
        control.fail_begin();

        let service = MemberService::new(MockGroupStore::new(), MockMemberStore::new(), db);
        let new = NewMember {
            category: "STANDARD".to_string(),
            size_mm: 4.2,
        };
        let err = service.create(&ctx(), "kraken", new).await.unwrap_err();

        assert!(matches!(err, ServiceError::Database(_)));
        assert!(control.events().is_empty());
    }

    #[tokio::test]
    async fn create_loses_the_race_when_the_parent_is_gone() {
        let (db, control) = Db::stub();
        let mut group_store = MockGroupStore::new();
        group_store
            .expect_fetch_by_name()
            .returning(|_, _, _, _| Err(StoreError::NotFound));

        let service = MemberService::new(group_store, MockMemberStore::new(), db);
        let new = NewMember {
            category: "STANDARD".to_string(),
            size_mm: 4.2,
        };
        let err = service.create(&ctx(), "kraken", new).await.unwrap_err();

        assert!(matches!(err, ServiceError::NotFound));
        assert_eq!(control.events(), vec![TxEvent::Begin, TxEvent::Rollback]);
    }

    #[tokio::test]
    async fn create_rolls_back_when_the_insert_fails() {
        let (db, control) = Db::stub();
        let mut group_store = MockGroupStore::new();
        let mut member_store = MockMemberStore::new();
        group_store
            .expect_fetch_by_name()
            .returning(|_, _, _, _| Ok(kraken(77)));
        member_store
            .expect_create()
            .returning(|_, _, _| Err(StoreError::Sqlx(sqlx::Error::PoolClosed)));

        let service = MemberService::new(group_store, member_store, db);
        let new = NewMember {
            category: "OVERSIZE".to_string(),
            size_mm: 0.1,
        };
        let err = service.create(&ctx(), "kraken", new).await.unwrap_err();

        assert!(matches!(err, ServiceError::Database(_)));
        assert_eq!(control.events(), vec![TxEvent::Begin, TxEvent::Rollback]);
    }

    #[tokio::test]
    async fn create_surfaces_a_commit_failure() {
        let (db, control) = Db::stub();
        control.fail_commit();

        let mut group_store = MockGroupStore::new();
        let mut member_store = MockMemberStore::new();
        group_store
            .expect_fetch_by_name()
            .returning(|_, _, _, _| Ok(kraken(77)));
        member_store.expect_create().returning(|_, _, _| Ok(42));

        let service = MemberService::new(group_store, member_store, db);
        let new = NewMember {
            category: "STANDARD".to_string(),
            size_mm: 4.2,
        };
        let err = service.create(&ctx(), "kraken", new).await.unwrap_err();

        assert!(matches!(err, ServiceError::Database(_)));
        assert_eq!(control.events(), vec![TxEvent::Begin, TxEvent::Commit]);
    }

    #[tokio::test]
    async fn create_rejects_an_empty_request_before_any_io() {
        let (db, control) = Db::stub();
        let service = MemberService::new(MockGroupStore::new(), MockMemberStore::new(), db);

        let new = NewMember {
            category: String::new(),
            size_mm: 0.0,
        };
        let err = service.create(&ctx(), "kraken", new).await.unwrap_err();

        match err {
            ServiceError::Validation(err) => {
                assert_eq!(
                    err.errors()["category"],
                    vec!["must be present", "must be either 'STANDARD' or 'OVERSIZE'"],
                );
                assert_eq!(
                    err.errors()["size_mm"],
                    vec!["must be present", "must be a positive decimal value"],
                );
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
        assert!(control.events().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_invalid_values() {
        let (db, _control) = Db::stub();
        let service = MemberService::new(MockGroupStore::new(), MockMemberStore::new(), db);

        let new = NewMember {
            category: "GIGANTIC".to_string(),
            size_mm: -1.2,
        };
        let err = service.create(&ctx(), "kraken", new).await.unwrap_err();

        match err {
            ServiceError::Validation(err) => {
                assert_eq!(
                    err.errors()["category"],
                    vec!["must be either 'STANDARD' or 'OVERSIZE'"],
                );
                assert_eq!(
                    err.errors()["size_mm"],
                    vec!["must be a positive decimal value"],
                );
            }
            other => panic!("expected a validation error, got {other:?}"),
        }
    }

    #[test]
    fn validation_accepts_every_category_with_a_positive_size() {
        for (category, expected) in [
            ("STANDARD", MemberCategory::Standard),
            ("OVERSIZE", MemberCategory::Oversize),
        ] {
            let new = NewMember {
                category: category.to_string(),
                size_mm: 0.1,
            };
            assert_eq!(validate(&new), Ok(expected));
        }
    }

    #[test]
    fn validation_rejects_nan_sizes() {
        let new = NewMember {
            category: "STANDARD".to_string(),
            size_mm: f32::NAN,
        };
        let err = validate(&new).unwrap_err();
        assert_eq!(
            err.errors()["size_mm"],
            vec!["must be a positive decimal value"],
        );
    }
}
