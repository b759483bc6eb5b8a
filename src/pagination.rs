use serde::{Deserialize, Serialize};

use crate::error::ApiError;

pub const MAX_LIMIT: i64 = 50;

/// Page/limit pair as accepted from the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageParams {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    24
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PageParams {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.page < 1 {
            return Err(ApiError::validation("page must be at least 1"));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(ApiError::validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        if (self.page - 1).checked_mul(self.limit).is_none() {
            return Err(ApiError::validation("page is out of range"));
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }
}

/// `{ items, total, page, totalPages }`
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, params: PageParams) -> Self {
        Self {
            items,
            total,
            page: params.page,
            total_pages: total_pages(total, params.limit),
        }
    }

    pub fn empty(params: PageParams) -> Self {
        Self::new(Vec::new(), 0, params)
    }
}

pub fn total_pages(total: i64, limit: i64) -> i64 {
    if total <= 0 || limit <= 0 {
        return 0;
    }
    (total + limit - 1) / limit
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_pages_rounds_up() {
        assert_eq!(total_pages(0, 12), 0);
        assert_eq!(total_pages(1, 12), 1);
        assert_eq!(total_pages(12, 12), 1);
        assert_eq!(total_pages(13, 12), 2);
        assert_eq!(total_pages(50, 24), 3);
    }

    #[test]
    fn offset_follows_page() {
        let p = PageParams { page: 3, limit: 12 };
        assert_eq!(p.offset(), 24);
    }

    #[test]
    fn rejects_out_of_range_params() {
        assert!(PageParams { page: 0, limit: 10 }.validate().is_err());
        assert!(PageParams { page: 1, limit: 0 }.validate().is_err());
        assert!(PageParams { page: 1, limit: 51 }.validate().is_err());
        assert!(PageParams { page: 1, limit: 50 }.validate().is_ok());
    }

    #[test]
    fn rejects_page_whose_offset_overflows() {
        let huge = PageParams { page: i64::MAX, limit: 24 };
        assert!(huge.validate().is_err());

        let last_ok = PageParams { page: i64::MAX / 50 + 1, limit: 50 };
        assert!(last_ok.validate().is_ok());
        assert_eq!(last_ok.offset(), (i64::MAX / 50) * 50);
        assert!(PageParams { page: i64::MAX / 50 + 2, limit: 50 }.validate().is_err());
    }

    #[test]
    fn page_serializes_camel_case() {
        let page = Page::new(vec![1, 2], 14, PageParams { page: 2, limit: 12 });
        let v = serde_json::to_value(&page).unwrap();
        assert_eq!(v["totalPages"], 2);
        assert_eq!(v["total"], 14);
        assert_eq!(v["page"], 2);
    }
}
