//! Dashboard snapshot types and their wire format.

use serde::{Deserialize, Deserializer, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

pub const PLACEHOLDER_MESSAGE: &str = "Loading dashboard data...";

/// Per-account product statistics. Missing fields decode as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Statistics {
    pub registered_count: u64,
    pub purchased_count: u64,
    pub sold_count: u64,
    pub total_transactions: u64,
    pub total_sales_amount: f64,
    pub total_purchase_amount: f64,
}

/// A product listing as returned by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingSummary {
    #[serde(alias = "id")]
    pub product_id: i64,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,

    /// Creation time as sent by the catalog (ISO-8601).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// One entry of the recent activity feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub product_id: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ActivityRecord {
    pub const PRODUCT_REGISTERED: &'static str = "product_registered";

    /// Builds a registration record for `listing`.
    ///
    /// Uses the listing's own creation time when it parses as RFC 3339,
    /// otherwise `fallback`.
    pub fn registered(listing: &ListingSummary, fallback: OffsetDateTime) -> Self {
        let timestamp = listing
            .created_at
            .as_deref()
            .and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok())
            .unwrap_or(fallback);

        Self {
            kind: Self::PRODUCT_REGISTERED.to_string(),
            message: format!("Registered '{}'", listing.title),
            product_id: listing.product_id,
            timestamp,
        }
    }
}

/// Aggregated dashboard view for one account.
///
/// A cached snapshot is always fully populated. The placeholder is never
/// cached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub stats: Statistics,
    pub recent_listings: Vec<ListingSummary>,
    pub recent_activity: Vec<ActivityRecord>,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
    /// `true` only on the placeholder.
    pub loading: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl DashboardSnapshot {
    /// Zero-valued snapshot returned while a refresh runs.
    pub fn placeholder() -> Self {
        Self {
            stats: Statistics::default(),
            recent_listings: Vec::new(),
            recent_activity: Vec::new(),
            generated_at: OffsetDateTime::now_utc(),
            loading: true,
            message: Some(PLACEHOLDER_MESSAGE.to_string()),
        }
    }

    /// Assembles a complete snapshot.
    pub fn assemble(
        stats: Statistics,
        recent_listings: Vec<ListingSummary>,
        recent_activity: Vec<ActivityRecord>,
        generated_at: OffsetDateTime,
    ) -> Self {
        Self {
            stats,
            recent_listings,
            recent_activity,
            generated_at,
            loading: false,
            message: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.loading
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    fn listing(id: i64, created_at: Option<&str>) -> ListingSummary {
        ListingSummary {
            product_id: id,
            title: format!("Carrot #{id}"),
            price: Some(1000.0),
            status: None,
            seller_id: Some(42),
            user_id: None,
            created_at: created_at.map(str::to_string),
        }
    }

    #[test]
    fn test_statistics_missing_fields_default_to_zero() {
        let stats: Statistics = serde_json::from_str(r#"{"registeredCount":3}"#).unwrap();
        assert_eq!(stats.registered_count, 3);
        assert_eq!(stats.sold_count, 0);
        assert_eq!(stats.total_sales_amount, 0.0);
    }

    #[test]
    fn test_listing_accepts_id_alias() {
        let listing: ListingSummary =
            serde_json::from_str(r#"{"id":9,"title":"Bike","userId":42}"#).unwrap();
        assert_eq!(listing.product_id, 9);
        assert_eq!(listing.user_id, Some(42));
    }

    #[test]
    fn test_listing_null_title_is_empty() {
        let listing: ListingSummary =
            serde_json::from_str(r#"{"productId":3,"title":null,"sellerId":42}"#).unwrap();
        assert_eq!(listing.title, "");
    }

    #[test]
    fn test_activity_timestamp() {
        let fallback = datetime!(2024-05-01 12:00 UTC);

        let record = ActivityRecord::registered(&listing(1, Some("2024-04-30T08:00:00Z")), fallback);
        assert_eq!(record.timestamp, datetime!(2024-04-30 08:00 UTC));
        assert_eq!(record.message, "Registered 'Carrot #1'");

        // Unparseable or absent creation time falls back
        let record = ActivityRecord::registered(&listing(2, Some("yesterday")), fallback);
        assert_eq!(record.timestamp, fallback);
        let record = ActivityRecord::registered(&listing(3, None), fallback);
        assert_eq!(record.timestamp, fallback);
    }

    #[test]
    fn test_placeholder_wire_format() {
        let json = serde_json::to_value(DashboardSnapshot::placeholder()).unwrap();

        assert_eq!(json["loading"], true);
        assert_eq!(json["stats"]["registeredCount"], 0);
        assert_eq!(json["recentListings"].as_array().unwrap().len(), 0);
        assert_eq!(json["message"], PLACEHOLDER_MESSAGE);
    }

    #[test]
    fn test_activity_wire_format() {
        let record = ActivityRecord::registered(&listing(5, None), datetime!(2024-05-01 12:00 UTC));
        let json = serde_json::to_value(record).unwrap();

        assert_eq!(json["type"], "product_registered");
        assert_eq!(json["productId"], 5);
        assert_eq!(json["timestamp"], "2024-05-01T12:00:00Z");
    }
}
