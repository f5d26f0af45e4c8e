use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Startups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Startups::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Startups::Name).string_len(200).not_null().unique_key())
                    .col(ColumnDef::new(Startups::Website).string_len(200).null())
                    .col(ColumnDef::new(Startups::Location).string_len(200).not_null())
                    .col(ColumnDef::new(Startups::Industry).string_len(100).not_null())
                    .col(
                        ColumnDef::new(Startups::Stage)
                            .string_len(20)
                            .not_null()
                            .default("idea"),
                    )
                    .col(ColumnDef::new(Startups::Description).text().not_null())
                    .col(ColumnDef::new(Startups::Tags).text().not_null().default(""))
                    .col(
                        ColumnDef::new(Startups::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Startups::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Analytics groups by these columns
        manager
            .create_index(
                Index::create()
                    .name("idx-startups-industry")
                    .table(Startups::Table)
                    .col(Startups::Industry)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx-startups-location")
                    .table(Startups::Table)
                    .col(Startups::Location)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Startups::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Startups {
    Table,
    Id,
    Name,
    Website,
    Location,
    Industry,
    Stage,
    Description,
    Tags,
    CreatedAt,
    UpdatedAt,
}
