use sea_orm_migration::prelude::*;

use super::m20250601_000001_create_users_table::Users;
use super::m20250601_000002_create_startups_table::Startups;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(WatchlistItems::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(WatchlistItems::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(WatchlistItems::UserId).integer().not_null())
                    .col(ColumnDef::new(WatchlistItems::StartupId).integer().not_null())
                    .col(
                        ColumnDef::new(WatchlistItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-watchlist_items-user_id")
                            .from(WatchlistItems::Table, WatchlistItems::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-watchlist_items-startup_id")
                            .from(WatchlistItems::Table, WatchlistItems::StartupId)
                            .to(Startups::Table, Startups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One watchlist entry per (user, startup)
        manager
            .create_index(
                Index::create()
                    .name("idx-watchlist_items-user_id-startup_id")
                    .table(WatchlistItems::Table)
                    .col(WatchlistItems::UserId)
                    .col(WatchlistItems::StartupId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(WatchlistItems::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum WatchlistItems {
    Table,
    Id,
    UserId,
    StartupId,
    CreatedAt,
}
