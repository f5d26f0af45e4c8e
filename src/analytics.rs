//! Grouped-count analytics over startups and the watchlist CSV export.
//!
//! All counting is pushed down to the database as
//! `GROUP BY <column> ORDER BY COUNT(id) DESC`; only the grouped rows are
//! loaded into memory.

use chrono::{DateTime, Utc};
use sea_orm::{
    sea_query::SelectStatement, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, FromQueryResult,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, QueryTrait,
};
use serde::Serialize;
use utoipa::ToSchema;

use crate::entities::{note, startup, watchlist_item};

/// Global top-N lists are cut at this many entries.
pub const GLOBAL_TOP_N: u64 = 10;

/// Header row of the watchlist export, always written.
pub const EXPORT_HEADER: [&str; 8] = [
    "Startup Name",
    "Industry",
    "Location",
    "Stage",
    "Website",
    "Description",
    "Tags",
    "Added to Watchlist",
];

const EXPORT_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult, ToSchema)]
pub struct IndustryCount {
    pub industry: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult, ToSchema)]
pub struct LocationCount {
    pub location: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromQueryResult, ToSchema)]
pub struct StageCount {
    pub stage: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserStats {
    /// Number of watchlist entries owned by the user
    pub watchlist_count: u64,
    /// Number of distinct startups the user has a note on
    pub notes_count: u64,
    /// Number of startups in the system
    pub total_startups_available: u64,
}

/// Breakdown of the user's watchlisted startups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserAnalytics {
    pub industries: Vec<IndustryCount>,
    pub locations: Vec<LocationCount>,
    pub stages: Vec<StageCount>,
}

/// Most common industries and locations across all startups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct GlobalAnalytics {
    pub industries: Vec<IndustryCount>,
    pub locations: Vec<LocationCount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct AnalyticsDashboard {
    pub user_stats: UserStats,
    pub user_analytics: UserAnalytics,
    pub global_analytics: GlobalAnalytics,
}

fn watchlisted_startup_ids(user_id: i32) -> SelectStatement {
    watchlist_item::Entity::find()
        .select_only()
        .column(watchlist_item::Column::StartupId)
        .filter(watchlist_item::Column::UserId.eq(user_id))
        .into_query()
}

fn noted_startup_ids(user_id: i32) -> SelectStatement {
    note::Entity::find()
        .select_only()
        .column(note::Column::StartupId)
        .filter(note::Column::UserId.eq(user_id))
        .into_query()
}

/// Counts startups per distinct value of `column`, largest groups first.
///
/// `scope` narrows the counted startups to the ids selected by the subquery;
/// `limit` keeps only the first N groups. Ties are ordered by value so the
/// output is deterministic.
async fn count_by<T, C>(
    db: &C,
    column: startup::Column,
    alias: &str,
    scope: Option<SelectStatement>,
    limit: Option<u64>,
) -> Result<Vec<T>, DbErr>
where
    T: FromQueryResult,
    C: ConnectionTrait,
{
    let mut query = startup::Entity::find()
        .select_only()
        .column_as(column, alias)
        .column_as(startup::Column::Id.count(), "count")
        .group_by(column)
        .order_by_desc(startup::Column::Id.count())
        .order_by_asc(column);

    if let Some(ids) = scope {
        query = query.filter(startup::Column::Id.in_subquery(ids));
    }
    if let Some(n) = limit {
        query = query.limit(n);
    }

    query.into_model::<T>().all(db).await
}

/// Computes the analytics dashboard for `user_id`. Read-only.
pub async fn dashboard<C>(db: &C, user_id: i32) -> Result<AnalyticsDashboard, DbErr>
where
    C: ConnectionTrait,
{
    let watchlist_count = watchlist_item::Entity::find()
        .filter(watchlist_item::Column::UserId.eq(user_id))
        .count(db)
        .await?;
    let notes_count = startup::Entity::find()
        .filter(startup::Column::Id.in_subquery(noted_startup_ids(user_id)))
        .count(db)
        .await?;
    let total_startups_available = startup::Entity::find().count(db).await?;

    let user_analytics = UserAnalytics {
        industries: count_by(
            db,
            startup::Column::Industry,
            "industry",
            Some(watchlisted_startup_ids(user_id)),
            None,
        )
        .await?,
        locations: count_by(
            db,
            startup::Column::Location,
            "location",
            Some(watchlisted_startup_ids(user_id)),
            None,
        )
        .await?,
        stages: count_by(
            db,
            startup::Column::Stage,
            "stage",
            Some(watchlisted_startup_ids(user_id)),
            None,
        )
        .await?,
    };

    let global_analytics = GlobalAnalytics {
        industries: count_by(
            db,
            startup::Column::Industry,
            "industry",
            None,
            Some(GLOBAL_TOP_N),
        )
        .await?,
        locations: count_by(
            db,
            startup::Column::Location,
            "location",
            None,
            Some(GLOBAL_TOP_N),
        )
        .await?,
    };

    tracing::debug!(
        user_id,
        watchlist_count,
        notes_count,
        total_startups_available,
        "Computed analytics dashboard"
    );

    Ok(AnalyticsDashboard {
        user_stats: UserStats {
            watchlist_count,
            notes_count,
            total_startups_available,
        },
        user_analytics,
        global_analytics,
    })
}

/// Loads the user's watchlist joined with its startups, most recently added first.
pub async fn watchlist_rows<C>(
    db: &C,
    user_id: i32,
) -> Result<Vec<(watchlist_item::Model, startup::Model)>, DbErr>
where
    C: ConnectionTrait,
{
    let rows = watchlist_item::Entity::find()
        .filter(watchlist_item::Column::UserId.eq(user_id))
        .order_by_desc(watchlist_item::Column::CreatedAt)
        .order_by_desc(watchlist_item::Column::Id)
        .find_also_related(startup::Entity)
        .all(db)
        .await?;

    // The foreign key cascades, so every item has its startup
    Ok(rows
        .into_iter()
        .filter_map(|(item, startup)| startup.map(|startup| (item, startup)))
        .collect())
}

/// The export fields of one watchlist entry, in header order.
pub fn export_record(added_at: DateTime<Utc>, startup: &startup::Model) -> [String; 8] {
    [
        startup.name.clone(),
        startup.industry.clone(),
        startup.location.clone(),
        startup.stage.as_str().to_string(),
        startup.website.clone().unwrap_or_default(),
        startup.description.clone(),
        startup.tag_list().join(", "),
        added_at.format(EXPORT_TIMESTAMP_FORMAT).to_string(),
    ]
}

/// Renders watchlist rows as CSV: the header, then one record per row.
///
/// Fields are quoted only when they contain a comma, quote or line break;
/// records end with `\r\n`.
pub fn render_watchlist_csv(
    rows: &[(watchlist_item::Model, startup::Model)],
) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());

    writer.write_record(EXPORT_HEADER)?;
    for (item, startup) in rows {
        writer.write_record(export_record(item.created_at, startup))?;
    }

    writer.into_inner().map_err(|e| csv::Error::from(e.into_error()))
}

/// File name offered for the download, e.g. `watchlist_alice_7.csv`.
pub fn export_filename(username: &str, user_id: i32) -> String {
    format!("watchlist_{}_{}.csv", username, user_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::Stage;
    use chrono::TimeZone;

    fn startup(
        id: i32,
        name: &str,
        website: Option<&str>,
        description: &str,
        tags: &str,
    ) -> startup::Model {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        startup::Model {
            id,
            name: name.to_string(),
            website: website.map(str::to_string),
            location: "Berlin".to_string(),
            industry: "Fintech".to_string(),
            stage: Stage::SeriesA,
            description: description.to_string(),
            tags: tags.to_string(),
            created_at: ts,
            updated_at: ts,
        }
    }

    fn item(id: i32, startup_id: i32, created_at: DateTime<Utc>) -> watchlist_item::Model {
        watchlist_item::Model {
            id,
            user_id: 1,
            startup_id,
            created_at,
        }
    }

    #[test]
    fn empty_watchlist_renders_header_only() {
        let csv = String::from_utf8(render_watchlist_csv(&[]).unwrap()).unwrap();
        assert_eq!(
            csv,
            "Startup Name,Industry,Location,Stage,Website,Description,Tags,Added to Watchlist\r\n"
        );
    }

    #[test]
    fn renders_record_fields() {
        let added = Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let rows = vec![(
            item(1, 1, added),
            startup(1, "Acme", None, "Payments", "AI, Fintech, AI"),
        )];
        let csv = String::from_utf8(render_watchlist_csv(&rows).unwrap()).unwrap();
        let lines: Vec<&str> = csv.split("\r\n").collect();
        assert_eq!(lines.len(), 3); // header, record, trailing empty
        assert_eq!(
            lines[1],
            "Acme,Fintech,Berlin,series_a,,Payments,\"AI, Fintech, AI\",2024-03-09 14:05:07"
        );
        assert_eq!(lines[2], "");
    }

    #[test]
    fn quotes_only_when_needed() {
        let added = Utc.with_ymd_and_hms(2024, 3, 9, 0, 0, 0).unwrap();
        let rows = vec![(
            item(1, 1, added),
            startup(1, "Say \"Hi\"", Some("https://hi.example"), "line one\nline two", ""),
        )];
        let csv = String::from_utf8(render_watchlist_csv(&rows).unwrap()).unwrap();
        let expected = concat!(
            "\"Say \"\"Hi\"\"\",Fintech,Berlin,series_a,https://hi.example,",
            "\"line one\nline two\",,2024-03-09 00:00:00\r\n"
        );
        assert!(csv.contains(expected));
    }

    #[test]
    fn filename_embeds_user() {
        assert_eq!(export_filename("alice", 7), "watchlist_alice_7.csv");
    }
}
