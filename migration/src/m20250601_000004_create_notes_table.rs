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
                    .table(Notes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Notes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Notes::UserId).integer().not_null())
                    .col(ColumnDef::new(Notes::StartupId).integer().not_null())
                    .col(ColumnDef::new(Notes::Content).text().not_null())
                    .col(
                        ColumnDef::new(Notes::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-notes-user_id")
                            .from(Notes::Table, Notes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-notes-startup_id")
                            .from(Notes::Table, Notes::StartupId)
                            .to(Startups::Table, Startups::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // One note per (user, startup)
        manager
            .create_index(
                Index::create()
                    .name("idx-notes-user_id-startup_id")
                    .table(Notes::Table)
                    .col(Notes::UserId)
                    .col(Notes::StartupId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Notes::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Notes {
    Table,
    Id,
    UserId,
    StartupId,
    Content,
    CreatedAt,
}
