use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Funding phase of a startup, stored as its snake_case name.
#[derive(
    Clone,
    Copy,
    Debug,
    Default,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    #[sea_orm(string_value = "idea")]
    Idea,
    #[sea_orm(string_value = "mvp")]
    Mvp,
    #[sea_orm(string_value = "seed")]
    Seed,
    #[sea_orm(string_value = "series_a")]
    SeriesA,
    #[sea_orm(string_value = "series_b")]
    SeriesB,
    #[sea_orm(string_value = "series_c")]
    SeriesC,
    #[sea_orm(string_value = "growth")]
    Growth,
    #[sea_orm(string_value = "ipo")]
    Ipo,
}

impl Stage {
    /// Stored and serialized form, e.g. `series_a`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Idea => "idea",
            Stage::Mvp => "mvp",
            Stage::Seed => "seed",
            Stage::SeriesA => "series_a",
            Stage::SeriesB => "series_b",
            Stage::SeriesC => "series_c",
            Stage::Growth => "growth",
            Stage::Ipo => "ipo",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Deserialize, Serialize)]
#[sea_orm(table_name = "startups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub name: String,
    pub website: Option<String>,
    pub location: String,
    pub industry: String,
    pub stage: Stage,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    #[sea_orm(column_type = "Text")]
    pub tags: String, // Comma separated, see `tag_list`
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Tags split on commas, trimmed, with blank entries dropped.
    ///
    /// Duplicates and the original order are preserved.
    pub fn tag_list(&self) -> Vec<String> {
        self.tags
            .split(',')
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::watchlist_item::Entity")]
    WatchlistItem,
    #[sea_orm(has_many = "super::note::Entity")]
    Note,
}

impl Related<super::watchlist_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::WatchlistItem.def()
    }
}

impl Related<super::note::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Note.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sea_orm::Iterable;

    fn startup_with_tags(tags: &str) -> Model {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Model {
            id: 1,
            name: "Acme".to_string(),
            website: None,
            location: "Berlin".to_string(),
            industry: "Fintech".to_string(),
            stage: Stage::Seed,
            description: "Payments".to_string(),
            tags: tags.to_string(),
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn tag_list_trims_and_keeps_duplicates() {
        let startup = startup_with_tags("AI, Fintech, AI");
        assert_eq!(startup.tag_list(), vec!["AI", "Fintech", "AI"]);
    }

    #[test]
    fn tag_list_drops_blank_entries() {
        let startup = startup_with_tags(" ,B2B,,  SaaS , ");
        assert_eq!(startup.tag_list(), vec!["B2B", "SaaS"]);
        assert!(startup_with_tags("").tag_list().is_empty());
    }

    #[test]
    fn stage_serializes_as_snake_case() {
        assert_eq!(serde_json::to_string(&Stage::SeriesA).unwrap(), "\"series_a\"");
        let parsed: Stage = serde_json::from_str("\"ipo\"").unwrap();
        assert_eq!(parsed, Stage::Ipo);
        assert_eq!(Stage::default(), Stage::Idea);
        assert!(serde_json::from_str::<Stage>("\"unicorn\"").is_err());
    }

    #[test]
    fn stage_str_matches_serde_name() {
        for stage in Stage::iter() {
            let json = serde_json::to_string(&stage).unwrap();
            assert_eq!(json.trim_matches('"'), stage.as_str());
        }
    }
}
