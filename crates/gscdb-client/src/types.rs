//! Search analytics API request and response types.

use serde::{Deserialize, Serialize};

/// Dimensions a query can group by. The order passed to the API is the order
/// of `keys` in each returned row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Query,
    Page,
}

/// Keyword and page, in that order.
pub const DEFAULT_DIMENSIONS: [Dimension; 2] = [Dimension::Query, Dimension::Page];

// ---------------------------------------------------------------------------
// sites.list
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub(crate) struct SiteListResponse {
    #[serde(default, rename = "siteEntry")]
    pub site_entry: Vec<SiteEntry>,
}

/// A source the configured credential can see.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SiteEntry {
    #[serde(rename = "siteUrl")]
    pub site_url: String,
    #[serde(default, rename = "permissionLevel")]
    pub permission_level: String,
}

// ---------------------------------------------------------------------------
// searchAnalytics.query
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct QueryRequest<'a> {
    pub start_date: String,
    pub end_date: String,
    pub dimensions: &'a [Dimension],
    pub row_limit: u32,
    pub start_row: u64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct QueryResponse {
    #[serde(default)]
    pub rows: Vec<ApiRow>,
}

/// A raw row: dimension values in `keys`, metrics alongside.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct ApiRow {
    #[serde(default)]
    pub keys: Vec<String>,
    #[serde(default)]
    pub clicks: f64,
    #[serde(default)]
    pub impressions: f64,
    #[serde(default)]
    pub ctr: f64,
    #[serde(default)]
    pub position: f64,
}

/// One fetched row, with dimension keys resolved to named fields.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRow {
    pub keyword: String,
    pub page: String,
    pub clicks: f64,
    pub impressions: f64,
    pub ctr: f64,
    pub position: f64,
}

impl ApiRow {
    /// Resolves `keys` by the position of each dimension in the request.
    /// Absent dimensions or short `keys` arrays yield empty strings.
    pub(crate) fn into_search_row(self, dimensions: &[Dimension]) -> SearchRow {
        let key_for = |dimension: Dimension| -> String {
            dimensions
                .iter()
                .position(|d| *d == dimension)
                .and_then(|idx| self.keys.get(idx))
                .cloned()
                .unwrap_or_default()
        };

        SearchRow {
            keyword: key_for(Dimension::Query),
            page: key_for(Dimension::Page),
            clicks: self.clicks,
            impressions: self.impressions,
            ctr: self.ctr,
            position: self.position,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_map_to_keyword_and_page_by_dimension_order() {
        let row = ApiRow {
            keys: vec!["rust sqlx".to_string(), "/blog/sqlx".to_string()],
            clicks: 3.0,
            impressions: 40.0,
            ctr: 0.075,
            position: 6.2,
        };
        let mapped = row.into_search_row(&DEFAULT_DIMENSIONS);
        assert_eq!(mapped.keyword, "rust sqlx");
        assert_eq!(mapped.page, "/blog/sqlx");
        assert!((mapped.position - 6.2).abs() < f64::EPSILON);
    }

    #[test]
    fn reversed_dimensions_are_respected() {
        let row = ApiRow {
            keys: vec!["/pricing".to_string(), "plans".to_string()],
            ..ApiRow::default()
        };
        let mapped = row.into_search_row(&[Dimension::Page, Dimension::Query]);
        assert_eq!(mapped.keyword, "plans");
        assert_eq!(mapped.page, "/pricing");
    }

    #[test]
    fn missing_keys_default_to_empty_strings() {
        let row = ApiRow {
            keys: vec!["only keyword".to_string()],
            ..ApiRow::default()
        };
        let mapped = row.into_search_row(&DEFAULT_DIMENSIONS);
        assert_eq!(mapped.keyword, "only keyword");
        assert_eq!(mapped.page, "");
    }

    #[test]
    fn missing_metrics_default_to_zero() {
        let row: ApiRow = serde_json::from_str(r#"{"keys":["a","/b"]}"#).unwrap();
        assert!(row.clicks.abs() < f64::EPSILON);
        assert!(row.impressions.abs() < f64::EPSILON);
        assert!(row.ctr.abs() < f64::EPSILON);
        assert!(row.position.abs() < f64::EPSILON);
    }

    #[test]
    fn response_without_rows_is_empty() {
        let body: QueryResponse = serde_json::from_str(r#"{"responseAggregationType":"byPage"}"#).unwrap();
        assert!(body.rows.is_empty());
    }

    #[test]
    fn query_request_uses_camel_case_fields() {
        let request = QueryRequest {
            start_date: "2026-03-01".to_string(),
            end_date: "2026-03-01".to_string(),
            dimensions: &DEFAULT_DIMENSIONS,
            row_limit: 25_000,
            start_row: 0,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["startDate"], "2026-03-01");
        assert_eq!(json["rowLimit"], 25_000);
        assert_eq!(json["startRow"], 0);
        assert_eq!(json["dimensions"], serde_json::json!(["query", "page"]));
    }

    #[test]
    fn site_entry_permission_defaults_to_empty() {
        let entry: SiteEntry = serde_json::from_str(r#"{"siteUrl":"sc-domain:example.com"}"#).unwrap();
        assert_eq!(entry.site_url, "sc-domain:example.com");
        assert_eq!(entry.permission_level, "");
    }
}
