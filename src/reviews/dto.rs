use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{Review, ReviewWithAuthor};
use crate::error::ApiError;

const MAX_COMMENT_LEN: usize = 2000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    pub id: Uuid,
    pub service_id: Uuid,
    pub author_id: Uuid,
    pub author_name: Option<String>,
    pub author_avatar: Option<String>,
    pub rating: i32,
    pub comment: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<ReviewWithAuthor> for ReviewResponse {
    fn from(r: ReviewWithAuthor) -> Self {
        Self {
            author_name: r.author_name,
            author_avatar: r.author_avatar,
            ..Self::from(r.review)
        }
    }
}

impl From<Review> for ReviewResponse {
    fn from(r: Review) -> Self {
        Self {
            id: r.id,
            service_id: r.service_id,
            author_id: r.author_id,
            author_name: None,
            author_avatar: None,
            rating: r.rating,
            comment: r.comment,
            created_at: r.created_at,
        }
    }
}

/// Aggregate shown above the review list. `distribution[i]` counts
/// reviews with `i + 1` stars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i64,
    pub distribution: [i64; 5],
}

impl RatingSummary {
    pub fn from_ratings(ratings: impl IntoIterator<Item = i32>) -> Self {
        let mut distribution = [0i64; 5];
        let mut sum = 0i64;
        let mut count = 0i64;
        for r in ratings {
            if let Some(slot) = usize::try_from(r - 1).ok().and_then(|i| distribution.get_mut(i)) {
                *slot += 1;
                sum += i64::from(r);
                count += 1;
            }
        }
        let average = if count == 0 {
            0.0
        } else {
            sum as f64 / count as f64
        };
        Self {
            average,
            count,
            distribution,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReviewList {
    pub items: Vec<ReviewResponse>,
    pub summary: RatingSummary,
}

impl From<Vec<ReviewWithAuthor>> for ReviewList {
    fn from(rows: Vec<ReviewWithAuthor>) -> Self {
        let summary = RatingSummary::from_ratings(rows.iter().map(|r| r.review.rating));
        Self {
            items: rows.into_iter().map(Into::into).collect(),
            summary,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateReviewRequest {
    pub rating: i32,
    #[serde(default)]
    pub comment: Option<String>,
}

impl CreateReviewRequest {
    pub fn validate(&mut self) -> Result<(), ApiError> {
        if !(1..=5).contains(&self.rating) {
            return Err(ApiError::validation("rating must be between 1 and 5"));
        }
        self.comment = self
            .comment
            .take()
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        if self
            .comment
            .as_ref()
            .is_some_and(|c| c.chars().count() > MAX_COMMENT_LEN)
        {
            return Err(ApiError::validation(format!(
                "comment must be at most {MAX_COMMENT_LEN} characters"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_is_mean_of_ratings() {
        let s = RatingSummary::from_ratings([5, 4, 4, 1]);
        assert_eq!(s.count, 4);
        assert!((s.average - 3.5).abs() < f64::EPSILON);
        assert_eq!(s.distribution, [1, 0, 0, 2, 1]);
        assert_eq!(s.distribution.iter().sum::<i64>(), s.count);
    }

    #[test]
    fn empty_summary_is_zero() {
        let s = RatingSummary::from_ratings(Vec::new());
        assert_eq!(s, RatingSummary { average: 0.0, count: 0, distribution: [0; 5] });
    }

    #[test]
    fn rating_must_be_one_to_five() {
        for rating in [0, 6, -1] {
            let mut req = CreateReviewRequest { rating, comment: None };
            assert!(req.validate().is_err());
        }
        let mut ok = CreateReviewRequest { rating: 5, comment: Some("  great  ".into()) };
        ok.validate().unwrap();
        assert_eq!(ok.comment.as_deref(), Some("great"));
    }

    #[test]
    fn blank_comment_becomes_none() {
        let mut req = CreateReviewRequest { rating: 3, comment: Some("   ".into()) };
        req.validate().unwrap();
        assert!(req.comment.is_none());
    }

    #[test]
    fn oversized_comment_is_rejected() {
        let mut req = CreateReviewRequest {
            rating: 3,
            comment: Some("x".repeat(MAX_COMMENT_LEN + 1)),
        };
        assert!(req.validate().is_err());
    }
}
