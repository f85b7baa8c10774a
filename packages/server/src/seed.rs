use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder};
use sea_orm::*;
use tracing::info;

use crate::entity::{
    compo, entry, programme_event, role, role_permission, transaction_item, vote,
};

/// Default roles seeded on startup.
const DEFAULT_ROLES: &[&str] = &["admin", "staff", "user"];

const ALL_PERMISSIONS: &[&str] = &[
    "event:manage",
    "compo:manage",
    "entry:manage",
    "vote:manage",
    "competition:manage",
    "store:manage",
    "upload:manage",
    "programme:manage",
    "screenshow:manage",
    "archive:manage",
    "user:manage",
];

/// Staff run the party floor: content of existing events, not events
/// themselves or user roles.
const STAFF_PERMISSIONS: &[&str] = &[
    "compo:manage",
    "entry:manage",
    "vote:manage",
    "competition:manage",
    "store:manage",
    "upload:manage",
    "programme:manage",
    "screenshow:manage",
];

fn default_mappings() -> impl Iterator<Item = (&'static str, &'static str)> {
    ALL_PERMISSIONS
        .iter()
        .map(|&p| ("admin", p))
        .chain(STAFF_PERMISSIONS.iter().map(|&p| ("staff", p)))
}

/// Seed the `role` and `role_permission` tables with defaults.
pub async fn seed_role_permissions(db: &DatabaseConnection) -> Result<(), DbErr> {
    let mut roles_inserted = 0u32;
    for &name in DEFAULT_ROLES {
        let model = role::ActiveModel {
            name: Set(name.to_string()),
        };

        let result = role::Entity::insert(model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::column(role::Column::Name)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(db)
            .await;

        match result {
            Ok(0) | Err(DbErr::RecordNotInserted) => {}
            Ok(_) => roles_inserted += 1,
            Err(e) => return Err(e),
        }
    }

    if roles_inserted > 0 {
        info!("Seeded {} new roles", roles_inserted);
    }

    let mut perms_inserted = 0u32;
    for (role, permission) in default_mappings() {
        let model = role_permission::ActiveModel {
            role: Set(role.to_string()),
            permission: Set(permission.to_string()),
        };

        let result = role_permission::Entity::insert(model)
            .on_conflict(
                sea_orm::sea_query::OnConflict::columns([
                    role_permission::Column::Role,
                    role_permission::Column::Permission,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(db)
            .await;

        match result {
            Ok(0) | Err(DbErr::RecordNotInserted) => {}
            Ok(_) => perms_inserted += 1,
            Err(e) => return Err(e),
        }
    }

    if perms_inserted > 0 {
        info!("Seeded {} new role-permission mappings", perms_inserted);
    }

    Ok(())
}

async fn ensure_index(db: &DatabaseConnection, name: &str, stmt: &mut IndexCreateStatement) {
    let sql = stmt
        .if_not_exists()
        .name(name)
        .to_string(PostgresQueryBuilder);
    match db.execute_unprepared(&sql).await {
        Ok(_) => info!("Ensured index {} exists", name),
        Err(e) => tracing::warn!("Failed to create index {}: {}", name, e),
    }
}

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite non-unique indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Score aggregation: SUM(1/rank) ... WHERE compo_id = ? GROUP BY entry_id
    ensure_index(
        db,
        "idx_vote_compo_entry",
        Index::create()
            .table(vote::Entity)
            .col(vote::Column::CompoId)
            .col(vote::Column::EntryId),
    )
    .await;

    ensure_index(
        db,
        "idx_entry_compo_user",
        Index::create()
            .table(entry::Entity)
            .col(entry::Column::CompoId)
            .col(entry::Column::UserId),
    )
    .await;

    ensure_index(
        db,
        "idx_compo_event_start",
        Index::create()
            .table(compo::Entity)
            .col(compo::Column::EventId)
            .col(compo::Column::CompoStart),
    )
    .await;

    // Sold counts per item and the items of a transaction.
    ensure_index(
        db,
        "idx_transaction_item_item_tx",
        Index::create()
            .table(transaction_item::Entity)
            .col(transaction_item::Column::ItemId)
            .col(transaction_item::Column::TransactionId),
    )
    .await;

    ensure_index(
        db,
        "idx_programme_event_start",
        Index::create()
            .table(programme_event::Entity)
            .col(programme_event::Column::EventId)
            .col(programme_event::Column::Start),
    )
    .await;

    Ok(())
}
