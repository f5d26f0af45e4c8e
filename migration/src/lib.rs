pub use sea_orm_migration::prelude::*;

mod m20250601_000001_create_users_table;
mod m20250601_000002_create_startups_table;
mod m20250601_000003_create_watchlist_items_table;
mod m20250601_000004_create_notes_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250601_000001_create_users_table::Migration),
            Box::new(m20250601_000002_create_startups_table::Migration),
            Box::new(m20250601_000003_create_watchlist_items_table::Migration),
            Box::new(m20250601_000004_create_notes_table::Migration),
        ]
    }
}
