use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{Category, CategoryWithCount};
use crate::error::ApiError;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryResponse {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_count: Option<i64>,
}

impl From<Category> for CategoryResponse {
    fn from(c: Category) -> Self {
        Self {
            id: c.id,
            name: c.name,
            slug: c.slug,
            description: c.description,
            icon: c.icon,
            color: c.color,
            created_at: c.created_at,
            service_count: None,
        }
    }
}

impl From<CategoryWithCount> for CategoryResponse {
    fn from(c: CategoryWithCount) -> Self {
        let count = c.service_count;
        Self {
            service_count: Some(count),
            ..CategoryResponse::from(c.category)
        }
    }
}

/// Body of category create and replace.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

/// Input after normalization; `slug` is always set.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
}

lazy_static! {
    static ref SLUG_RE: Regex = Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap();
    static ref COLOR_RE: Regex = Regex::new(r"^#[0-9a-fA-F]{6}$").unwrap();
}

pub fn is_valid_slug(slug: &str) -> bool {
    slug.len() <= 80 && SLUG_RE.is_match(slug)
}

/// Lowercase ASCII alphanumerics joined by single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl CategoryInput {
    pub fn validate(self) -> Result<ValidCategory, ApiError> {
        let name = self.name.trim().to_string();
        if name.is_empty() || name.chars().count() > 80 {
            return Err(ApiError::validation("name must be 1 to 80 characters"));
        }
        let slug = trimmed(self.slug).unwrap_or_else(|| slugify(&name));
        if !is_valid_slug(&slug) {
            return Err(ApiError::validation(
                "slug must be lowercase letters, digits and single dashes",
            ));
        }
        let color = trimmed(self.color);
        if let Some(c) = &color {
            if !COLOR_RE.is_match(c) {
                return Err(ApiError::validation("color must look like #RRGGBB"));
            }
        }
        let description = trimmed(self.description);
        if description.as_ref().is_some_and(|d| d.chars().count() > 500) {
            return Err(ApiError::validation("description must be at most 500 characters"));
        }
        Ok(ValidCategory {
            name,
            slug,
            description,
            icon: trimmed(self.icon),
            color,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str) -> CategoryInput {
        CategoryInput {
            name: name.into(),
            slug: None,
            description: None,
            icon: None,
            color: None,
        }
    }

    #[test]
    fn slugify_matches_seeded_slugs() {
        assert_eq!(slugify("Resume & CV"), "resume-cv");
        assert_eq!(slugify("Excel & Sheets"), "excel-sheets");
        assert_eq!(slugify("  API Integration  "), "api-integration");
        assert_eq!(slugify("AI Content!"), "ai-content");
        assert_eq!(slugify("***"), "");
    }

    #[test]
    fn slug_validation() {
        assert!(is_valid_slug("bug-fixing"));
        assert!(!is_valid_slug("Bug-Fixing"));
        assert!(!is_valid_slug("bug--fixing"));
        assert!(!is_valid_slug("-bug"));
        assert!(!is_valid_slug(""));
    }

    #[test]
    fn derives_slug_when_missing() {
        let v = input("Voice Over").validate().unwrap();
        assert_eq!(v.slug, "voice-over");
        assert_eq!(v.name, "Voice Over");
    }

    #[test]
    fn rejects_unsluggable_name_and_bad_color() {
        assert!(input("!!!").validate().is_err());
        let mut bad_color = input("Design");
        bad_color.color = Some("pink".into());
        assert!(bad_color.validate().is_err());
        let mut good_color = input("Design");
        good_color.color = Some("#ec4899".into());
        assert_eq!(good_color.validate().unwrap().color.as_deref(), Some("#ec4899"));
    }

    #[test]
    fn explicit_slug_must_be_valid() {
        let mut c = input("Logo Design");
        c.slug = Some("Logo Design".into());
        assert!(c.validate().is_err());
        let mut ok = input("Logo Design");
        ok.slug = Some("logos".into());
        assert_eq!(ok.validate().unwrap().slug, "logos");
    }
}
