use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::records::repo::FeedingRecord;

#[derive(Debug, Serialize)]
pub struct RecordListItem {
    pub id: Uuid,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<FeedingRecord> for RecordListItem {
    fn from(r: FeedingRecord) -> Self {
        Self {
            id: r.id,
            notes: r.notes,
            image_url: r.image_url,
            created_at: r.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_item_serializes_with_rfc3339_timestamp() {
        let item = RecordListItem {
            id: Uuid::new_v4(),
            notes: Some("fed at 9am".into()),
            image_url: None,
            created_at: time::macros::datetime!(2026-08-06 09:00 UTC),
        };

        let json = serde_json::to_string(&item).unwrap();
        assert!(json.contains("fed at 9am"));
        assert!(json.contains("2026-08-06T09:00:00"));
        assert!(json.contains("\"image_url\":null"));
    }
}
