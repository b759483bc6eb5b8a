//! Listing-query composition shared by the marketplace listing and the
//! category listing.
//!
//! Every optional input becomes one predicate of a conjunction over active
//! services. The average rating only exists after grouping, so the rating
//! floor is a `HAVING` clause, and the count query wraps the grouped query
//! whenever that floor is set so `total` matches what paging can reach.

use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::ApiError;
use crate::pagination::PageParams;

const MAX_SEARCH_LEN: usize = 100;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ListingSort {
    #[default]
    Newest,
    Popular,
    Rating,
    PriceLow,
    PriceHigh,
}

impl ListingSort {
    fn order_by(self) -> &'static str {
        match self {
            ListingSort::Newest => " ORDER BY s.created_at DESC, s.id",
            ListingSort::Popular => " ORDER BY review_count DESC, s.created_at DESC, s.id",
            ListingSort::Rating => " ORDER BY rating DESC, review_count DESC, s.id",
            ListingSort::PriceLow => " ORDER BY s.price ASC, s.created_at DESC, s.id",
            ListingSort::PriceHigh => " ORDER BY s.price DESC, s.created_at DESC, s.id",
        }
    }
}

/// Raw listing parameters from the query string.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    pub category_id: Option<Uuid>,
    pub min_price: Option<i32>,
    pub max_price: Option<i32>,
    pub min_rating: Option<f64>,
    pub search: Option<String>,
    #[serde(default)]
    pub sort: ListingSort,
}

fn default_page() -> i64 {
    1
}
fn default_limit() -> i64 {
    24
}

impl Default for ListingQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
            category_id: None,
            min_price: None,
            max_price: None,
            min_rating: None,
            search: None,
            sort: ListingSort::default(),
        }
    }
}

/// Validated listing filter.
#[derive(Debug, Clone, PartialEq)]
pub struct ListingFilter {
    pub page: PageParams,
    pub category_id: Option<Uuid>,
    pub min_price: Option<i32>,
    pub max_price: Option<i32>,
    pub min_rating: Option<f64>,
    pub search: Option<String>,
    pub sort: ListingSort,
}

impl TryFrom<ListingQuery> for ListingFilter {
    type Error = ApiError;

    fn try_from(q: ListingQuery) -> Result<Self, Self::Error> {
        let page = PageParams {
            page: q.page,
            limit: q.limit,
        };
        page.validate()?;

        if q.min_price.is_some_and(|p| p < 0) || q.max_price.is_some_and(|p| p < 0) {
            return Err(ApiError::validation("prices must not be negative"));
        }
        if let (Some(min), Some(max)) = (q.min_price, q.max_price) {
            if min > max {
                return Err(ApiError::validation("minPrice must not exceed maxPrice"));
            }
        }

        let min_rating = match q.min_rating {
            Some(r) if !r.is_finite() || !(0.0..=5.0).contains(&r) => {
                return Err(ApiError::validation("minRating must be between 0 and 5"));
            }
            // a zero floor matches everything
            Some(r) if r > 0.0 => Some(r),
            _ => None,
        };

        let search = q
            .search
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if search.as_ref().is_some_and(|s| s.chars().count() > MAX_SEARCH_LEN) {
            return Err(ApiError::validation(format!(
                "search must be at most {MAX_SEARCH_LEN} characters"
            )));
        }

        Ok(Self {
            page,
            category_id: q.category_id,
            min_price: q.min_price,
            max_price: q.max_price,
            min_rating,
            search,
            sort: q.sort,
        })
    }
}

/// Escape `LIKE` metacharacters so user text matches literally.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

const LISTING_COLUMNS: &str = r#"SELECT s.id, s.title, s.description, s.price, s.category_id, s.created_at,
       p.display_name AS author_name, p.avatar_url AS author_image,
       COUNT(r.id) AS review_count,
       COALESCE(AVG(r.rating), 0)::float8 AS rating
  FROM services s
  LEFT JOIN profiles p ON p.id = s.seller_id
  LEFT JOIN reviews r ON r.service_id = s.id"#;

impl ListingFilter {
    /// Restrict to one category, replacing any requested category.
    pub fn in_category(mut self, category_id: Uuid) -> Self {
        self.category_id = Some(category_id);
        self
    }

    fn push_where(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        qb.push(" WHERE s.is_active");
        if let Some(category_id) = self.category_id {
            qb.push(" AND s.category_id = ").push_bind(category_id);
        }
        if let Some(min) = self.min_price {
            qb.push(" AND s.price >= ").push_bind(min);
        }
        if let Some(max) = self.max_price {
            qb.push(" AND s.price <= ").push_bind(max);
        }
        if let Some(term) = &self.search {
            let pattern = format!("%{}%", escape_like(term));
            qb.push(" AND (s.title ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR s.description ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
    }

    fn push_having(&self, qb: &mut QueryBuilder<'static, Postgres>) {
        if let Some(rating) = self.min_rating {
            qb.push(" HAVING COALESCE(AVG(r.rating), 0) >= ")
                .push_bind(rating);
        }
    }

    /// Number of services matching every predicate, rating floor included.
    pub fn count_query(&self) -> QueryBuilder<'static, Postgres> {
        if self.min_rating.is_none() {
            let mut qb = QueryBuilder::new("SELECT COUNT(*) FROM services s");
            self.push_where(&mut qb);
            return qb;
        }
        let mut qb = QueryBuilder::new(
            "SELECT COUNT(*) FROM (SELECT s.id FROM services s LEFT JOIN reviews r ON r.service_id = s.id",
        );
        self.push_where(&mut qb);
        qb.push(" GROUP BY s.id");
        self.push_having(&mut qb);
        qb.push(") AS matched");
        qb
    }

    /// One page of listing rows with seller and rating aggregate.
    pub fn page_query(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new(LISTING_COLUMNS);
        self.push_where(&mut qb);
        qb.push(" GROUP BY s.id, p.id");
        self.push_having(&mut qb);
        qb.push(self.sort.order_by());
        qb.push(" LIMIT ")
            .push_bind(self.page.limit)
            .push(" OFFSET ")
            .push_bind(self.page.offset());
        qb
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter(q: ListingQuery) -> ListingFilter {
        ListingFilter::try_from(q).expect("valid query")
    }

    #[test]
    fn huge_page_is_rejected_before_building_sql() {
        let err = ListingFilter::try_from(ListingQuery {
            page: i64::MAX,
            limit: 24,
            ..Default::default()
        })
        .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn unfiltered_listing_only_requires_active() {
        let f = filter(ListingQuery::default());
        let page = f.page_query();
        let sql = page.sql();
        assert!(sql.contains("WHERE s.is_active GROUP BY s.id, p.id ORDER BY s.created_at DESC"));
        assert!(!sql.contains("HAVING"));
        assert!(!sql.contains("ILIKE"));
        assert!(sql.ends_with("LIMIT $1 OFFSET $2"));

        let count = f.count_query();
        assert_eq!(count.sql(), "SELECT COUNT(*) FROM services s WHERE s.is_active");
    }

    #[test]
    fn each_predicate_adds_one_bound_condition() {
        let f = filter(ListingQuery {
            category_id: Some(Uuid::new_v4()),
            min_price: Some(25),
            max_price: Some(50),
            search: Some("  ocr  ".into()),
            ..Default::default()
        });
        let count = f.count_query();
        assert_eq!(
            count.sql(),
            "SELECT COUNT(*) FROM services s WHERE s.is_active AND s.category_id = $1 \
             AND s.price >= $2 AND s.price <= $3 \
             AND (s.title ILIKE $4 OR s.description ILIKE $5)"
        );
        assert_eq!(f.search.as_deref(), Some("ocr"));
    }

    #[test]
    fn rating_floor_goes_to_having_in_both_queries() {
        let f = filter(ListingQuery {
            min_rating: Some(4.5),
            min_price: Some(0),
            ..Default::default()
        });
        let count = f.count_query();
        assert_eq!(
            count.sql(),
            "SELECT COUNT(*) FROM (SELECT s.id FROM services s LEFT JOIN reviews r ON r.service_id = s.id \
             WHERE s.is_active AND s.price >= $1 GROUP BY s.id \
             HAVING COALESCE(AVG(r.rating), 0) >= $2) AS matched"
        );
        let page = f.page_query();
        assert!(page
            .sql()
            .contains("GROUP BY s.id, p.id HAVING COALESCE(AVG(r.rating), 0) >= $2 ORDER BY"));
        assert!(page.sql().ends_with("LIMIT $3 OFFSET $4"));
    }

    #[test]
    fn zero_rating_and_blank_search_are_ignored() {
        let f = filter(ListingQuery {
            min_rating: Some(0.0),
            search: Some("   ".into()),
            ..Default::default()
        });
        assert_eq!(f.min_rating, None);
        assert_eq!(f.search, None);
    }

    #[test]
    fn adding_predicates_never_removes_earlier_ones() {
        let base = filter(ListingQuery {
            max_price: Some(100),
            ..Default::default()
        });
        let narrowed = filter(ListingQuery {
            max_price: Some(100),
            min_rating: Some(4.0),
            search: Some("pdf".into()),
            ..Default::default()
        });
        let base_sql = base.count_query().sql().to_string();
        let narrowed_sql = narrowed.count_query().sql().to_string();
        let base_where = base_sql.split("WHERE ").nth(1).unwrap();
        assert!(narrowed_sql.contains(base_where));
        assert!(narrowed_sql.len() > base_sql.len());
    }

    #[test]
    fn sort_options_change_only_ordering() {
        let q = |sort| {
            filter(ListingQuery {
                sort,
                ..Default::default()
            })
            .page_query()
            .sql()
            .to_string()
        };
        assert!(q(ListingSort::Popular).contains("ORDER BY review_count DESC"));
        assert!(q(ListingSort::Rating).contains("ORDER BY rating DESC"));
        assert!(q(ListingSort::PriceLow).contains("ORDER BY s.price ASC"));
        assert!(q(ListingSort::PriceHigh).contains("ORDER BY s.price DESC"));
    }

    #[test]
    fn category_route_overrides_requested_category() {
        let requested = Uuid::new_v4();
        let forced = Uuid::new_v4();
        let f = filter(ListingQuery {
            category_id: Some(requested),
            ..Default::default()
        })
        .in_category(forced);
        assert_eq!(f.category_id, Some(forced));
    }

    #[test]
    fn rejects_invalid_ranges() {
        let bad = |q: ListingQuery| ListingFilter::try_from(q).is_err();
        assert!(bad(ListingQuery { min_price: Some(60), max_price: Some(50), ..Default::default() }));
        assert!(bad(ListingQuery { min_price: Some(-1), ..Default::default() }));
        assert!(bad(ListingQuery { min_rating: Some(5.5), ..Default::default() }));
        assert!(bad(ListingQuery { min_rating: Some(f64::NAN), ..Default::default() }));
        assert!(bad(ListingQuery { limit: 51, ..Default::default() }));
        assert!(bad(ListingQuery { page: 0, ..Default::default() }));
        assert!(bad(ListingQuery { search: Some("x".repeat(101)), ..Default::default() }));
        assert!(!bad(ListingQuery { min_price: Some(0), max_price: Some(0), ..Default::default() }));
    }

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("100%_off\\"), "100\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }

    #[test]
    fn query_string_uses_camel_case() {
        let q: ListingQuery = serde_json::from_value(serde_json::json!({
            "page": 2,
            "limit": 12,
            "minPrice": 25,
            "maxPrice": 50,
            "minRating": 4.5,
            "sort": "priceLow"
        }))
        .unwrap();
        assert_eq!(q.min_price, Some(25));
        assert_eq!(q.sort, ListingSort::PriceLow);
        let f = ListingFilter::try_from(q).unwrap();
        assert_eq!(f.page.offset(), 12);
    }
}
