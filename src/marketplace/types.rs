//! Request bodies and endpoint paths for the marketplace JSON API.

use serde::{Deserialize, Serialize};

/// "Get lot by id" endpoint, relative to the site root.
pub const LOT_INFO_PATH: &str = "api/lots/get";
/// "Get lot description" endpoint.
pub const LOT_DESCRIPTION_PATH: &str = "api/lots/description";
/// "Paginated lot list by filter" endpoint.
pub const LOT_LIST_PATH: &str = "api/lots/list";

pub const DEFAULT_PAGE_SIZE: u32 = 200;
pub const DEFAULT_RENEWAL_INTERVAL: u64 = 30;

#[derive(Debug, Clone, Serialize)]
pub struct LotIdRequest {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LotFilter {
    pub category_id: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SortOrder {
    pub field: &'static str,
    pub direction: &'static str,
}

impl SortOrder {
    pub fn end_date_ascending() -> Self {
        Self {
            field: "endDate",
            direction: "asc",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LotListRequest {
    pub filter: LotFilter,
    pub offset: u64,
    pub count: u32,
    pub sort: SortOrder,
}

impl LotListRequest {
    pub fn page(category_id: i64, offset: u64, count: u32) -> Self {
        Self {
            filter: LotFilter { category_id },
            offset,
            count,
            sort: SortOrder::end_date_ascending(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescriptionResponse {
    #[serde(default)]
    pub description: Option<String>,
}
