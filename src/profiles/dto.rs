use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use url::Url;
use uuid::Uuid;

use super::repo::{Profile, SellerStats};
use crate::error::ApiError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileResponse {
    pub id: Uuid,
    pub display_name: String,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<Profile> for ProfileResponse {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            display_name: p.display_name,
            bio: p.bio,
            avatar_url: p.avatar_url,
            created_at: p.created_at,
        }
    }
}

/// Public seller card.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicProfileResponse {
    #[serde(flatten)]
    pub profile: ProfileResponse,
    pub service_count: i64,
    pub review_count: i64,
    pub average_rating: f64,
}

impl PublicProfileResponse {
    pub fn new(profile: Profile, stats: SellerStats) -> Self {
        Self {
            profile: profile.into(),
            service_count: stats.service_count,
            review_count: stats.review_count,
            average_rating: stats.average_rating,
        }
    }
}

/// Absent fields stay unchanged; an empty `bio` or `avatarUrl` clears it.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

impl UpdateProfileRequest {
    pub fn validate(&mut self) -> Result<(), ApiError> {
        if let Some(name) = self.display_name.as_mut() {
            *name = name.trim().to_string();
            if name.is_empty() || name.chars().count() > 80 {
                return Err(ApiError::validation("displayName must be 1 to 80 characters"));
            }
        }
        if let Some(bio) = self.bio.as_mut() {
            *bio = bio.trim().to_string();
            if bio.chars().count() > 1000 {
                return Err(ApiError::validation("bio must be at most 1000 characters"));
            }
        }
        if let Some(avatar) = self.avatar_url.as_mut() {
            *avatar = avatar.trim().to_string();
            if !avatar.is_empty() && !is_http_url(avatar) {
                return Err(ApiError::validation("avatarUrl must be an http(s) url"));
            }
        }
        Ok(())
    }
}

pub(crate) fn is_http_url(s: &str) -> bool {
    Url::parse(s)
        .map(|u| matches!(u.scheme(), "http" | "https") && u.host().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_and_accepts_valid_update() {
        let mut req = UpdateProfileRequest {
            display_name: Some("  Acme APIs ".into()),
            bio: Some("".into()),
            avatar_url: Some("https://cdn.example.com/a.png".into()),
        };
        req.validate().unwrap();
        assert_eq!(req.display_name.as_deref(), Some("Acme APIs"));
    }

    #[test]
    fn rejects_blank_name_and_bad_avatar() {
        let mut blank = UpdateProfileRequest {
            display_name: Some("   ".into()),
            ..Default::default()
        };
        assert!(blank.validate().is_err());

        let mut avatar = UpdateProfileRequest {
            avatar_url: Some("javascript:alert(1)".into()),
            ..Default::default()
        };
        assert!(avatar.validate().is_err());
    }

    #[test]
    fn public_profile_flattens_profile_fields() {
        let profile = Profile {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            display_name: "Seller".into(),
            bio: None,
            avatar_url: None,
            created_at: OffsetDateTime::UNIX_EPOCH,
        };
        let card = PublicProfileResponse::new(
            profile,
            SellerStats {
                service_count: 3,
                review_count: 4,
                average_rating: 4.5,
            },
        );
        let v = serde_json::to_value(&card).unwrap();
        assert_eq!(v["displayName"], "Seller");
        assert_eq!(v["serviceCount"], 3);
        assert_eq!(v["averageRating"], 4.5);
        assert_eq!(v["createdAt"], "1970-01-01T00:00:00Z");
    }
}
