use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

use super::repo::{Service, ServiceDetailRow};
use crate::error::ApiError;
use crate::profiles::dto::is_http_url;

const MAX_TAGS: usize = 5;
const MAX_ENDPOINTS: usize = 50;
const MAX_PLANS: usize = 5;
const MAX_PRICE: i32 = 1_000_000;

/// Row of the listing query.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceListItem {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub price: i32,
    pub category_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author_name: Option<String>,
    pub author_image: Option<String>,
    pub review_count: i64,
    pub rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthType {
    ApiKey,
    Bearer,
    Oauth2,
    None,
}

impl AuthType {
    pub fn as_str(self) -> &'static str {
        match self {
            AuthType::ApiKey => "api_key",
            AuthType::Bearer => "bearer",
            AuthType::Oauth2 => "oauth2",
            AuthType::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "api_key" => Some(AuthType::ApiKey),
            "bearer" => Some(AuthType::Bearer),
            "oauth2" => Some(AuthType::Oauth2),
            "none" => Some(AuthType::None),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointSpec {
    pub method: String,
    pub path: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingPlan {
    pub name: String,
    pub price: i32,
    /// Monthly request allowance; `None` is unlimited or custom.
    pub request_limit: Option<i64>,
}

/// Seller onboarding payload. Only the first four fields are required.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateServiceRequest {
    pub title: String,
    pub description: String,
    pub price: i32,
    pub category_id: Uuid,
    #[serde(default)]
    pub short_description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub auth_type: Option<AuthType>,
    #[serde(default)]
    pub endpoints: Vec<EndpointSpec>,
    #[serde(default)]
    pub plans: Vec<PricingPlan>,
    #[serde(default)]
    pub example_code: Option<String>,
    #[serde(default)]
    pub documentation: Option<String>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateServiceRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i32>,
    pub category_id: Option<Uuid>,
    pub short_description: Option<String>,
    pub tags: Option<Vec<String>>,
    pub base_url: Option<String>,
    pub auth_type: Option<AuthType>,
    pub endpoints: Option<Vec<EndpointSpec>>,
    pub plans: Option<Vec<PricingPlan>>,
    pub example_code: Option<String>,
    pub documentation: Option<String>,
    pub is_active: Option<bool>,
}

/// Complete, normalized service content as written to the database.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceDraft {
    pub title: String,
    pub description: String,
    pub price: i32,
    pub category_id: Uuid,
    pub short_description: Option<String>,
    pub tags: Vec<String>,
    pub base_url: Option<String>,
    pub auth_type: Option<AuthType>,
    pub endpoints: Vec<EndpointSpec>,
    pub plans: Vec<PricingPlan>,
    pub example_code: Option<String>,
    pub documentation: Option<String>,
}

fn trimmed(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn check_len(field: &str, value: &str, min: usize, max: usize) -> Result<(), ApiError> {
    let n = value.chars().count();
    if n < min || n > max {
        return Err(ApiError::validation(format!(
            "{field} must be {min} to {max} characters"
        )));
    }
    Ok(())
}

impl ServiceDraft {
    /// Normalize whitespace, tags and endpoint methods, then check limits.
    pub fn validate(mut self) -> Result<Self, ApiError> {
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        check_len("title", &self.title, 1, 120)?;
        check_len("description", &self.description, 1, 5000)?;

        if !(0..=MAX_PRICE).contains(&self.price) {
            return Err(ApiError::validation(format!(
                "price must be between 0 and {MAX_PRICE}"
            )));
        }

        self.short_description = trimmed(self.short_description);
        if let Some(s) = &self.short_description {
            check_len("shortDescription", s, 1, 200)?;
        }

        let mut tags: Vec<String> = Vec::with_capacity(self.tags.len());
        for tag in self.tags.iter().map(|t| t.trim().to_lowercase()) {
            if tag.is_empty() || tags.contains(&tag) {
                continue;
            }
            check_len("tag", &tag, 1, 30)?;
            tags.push(tag);
        }
        if tags.len() > MAX_TAGS {
            return Err(ApiError::validation(format!("at most {MAX_TAGS} tags")));
        }
        self.tags = tags;

        self.base_url = trimmed(self.base_url);
        if let Some(url) = &self.base_url {
            if !is_http_url(url) {
                return Err(ApiError::validation("baseUrl must be an http(s) url"));
            }
        }

        if self.endpoints.len() > MAX_ENDPOINTS {
            return Err(ApiError::validation(format!("at most {MAX_ENDPOINTS} endpoints")));
        }
        for ep in &mut self.endpoints {
            ep.method = ep.method.trim().to_uppercase();
            ep.path = ep.path.trim().to_string();
            ep.description = ep.description.trim().to_string();
            if !matches!(ep.method.as_str(), "GET" | "POST" | "PUT" | "PATCH" | "DELETE") {
                return Err(ApiError::validation(format!(
                    "unsupported endpoint method {}",
                    ep.method
                )));
            }
            if !ep.path.starts_with('/') || ep.path.chars().any(char::is_whitespace) {
                return Err(ApiError::validation(format!(
                    "endpoint path {:?} must start with / and contain no spaces",
                    ep.path
                )));
            }
            check_len("endpoint description", &ep.description, 0, 500)?;
        }

        if self.plans.len() > MAX_PLANS {
            return Err(ApiError::validation(format!("at most {MAX_PLANS} plans")));
        }
        for plan in &mut self.plans {
            plan.name = plan.name.trim().to_string();
            check_len("plan name", &plan.name, 1, 40)?;
            if !(0..=MAX_PRICE).contains(&plan.price) {
                return Err(ApiError::validation("plan price out of range"));
            }
            if plan.request_limit.is_some_and(|l| l <= 0) {
                return Err(ApiError::validation("plan requestLimit must be positive"));
            }
        }

        self.example_code = trimmed(self.example_code);
        if let Some(code) = &self.example_code {
            check_len("exampleCode", code, 1, 10_000)?;
        }
        self.documentation = trimmed(self.documentation);
        if let Some(doc) = &self.documentation {
            check_len("documentation", doc, 1, 50_000)?;
        }

        Ok(self)
    }
}

impl From<CreateServiceRequest> for ServiceDraft {
    fn from(r: CreateServiceRequest) -> Self {
        Self {
            title: r.title,
            description: r.description,
            price: r.price,
            category_id: r.category_id,
            short_description: r.short_description,
            tags: r.tags,
            base_url: r.base_url,
            auth_type: r.auth_type,
            endpoints: r.endpoints,
            plans: r.plans,
            example_code: r.example_code,
            documentation: r.documentation,
        }
    }
}

impl From<Service> for ServiceDraft {
    fn from(s: Service) -> Self {
        Self {
            title: s.title,
            description: s.description,
            price: s.price,
            category_id: s.category_id,
            short_description: s.short_description,
            tags: s.tags,
            base_url: s.base_url,
            auth_type: s.auth_type.as_deref().and_then(AuthType::parse),
            endpoints: s.endpoints.0,
            plans: s.plans.0,
            example_code: s.example_code,
            documentation: s.documentation,
        }
    }
}

impl UpdateServiceRequest {
    /// Overlay the provided fields on the stored draft. An empty string
    /// clears an optional text field.
    pub fn apply(self, mut draft: ServiceDraft) -> ServiceDraft {
        if let Some(v) = self.title {
            draft.title = v;
        }
        if let Some(v) = self.description {
            draft.description = v;
        }
        if let Some(v) = self.price {
            draft.price = v;
        }
        if let Some(v) = self.category_id {
            draft.category_id = v;
        }
        if let Some(v) = self.short_description {
            draft.short_description = Some(v);
        }
        if let Some(v) = self.tags {
            draft.tags = v;
        }
        if let Some(v) = self.base_url {
            draft.base_url = Some(v);
        }
        if let Some(v) = self.auth_type {
            draft.auth_type = Some(v);
        }
        if let Some(v) = self.endpoints {
            draft.endpoints = v;
        }
        if let Some(v) = self.plans {
            draft.plans = v;
        }
        if let Some(v) = self.example_code {
            draft.example_code = Some(v);
        }
        if let Some(v) = self.documentation {
            draft.documentation = Some(v);
        }
        draft
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SellerSummary {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySummary {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
}

/// Full service page.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceDetail {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub short_description: Option<String>,
    pub price: i32,
    pub is_active: bool,
    pub tags: Vec<String>,
    pub base_url: Option<String>,
    pub auth_type: Option<String>,
    pub endpoints: Vec<EndpointSpec>,
    pub plans: Vec<PricingPlan>,
    pub example_code: Option<String>,
    pub documentation: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub seller: SellerSummary,
    pub category: CategorySummary,
    pub rating: f64,
    pub review_count: i64,
}

impl From<ServiceDetailRow> for ServiceDetail {
    fn from(r: ServiceDetailRow) -> Self {
        let s = r.service;
        Self {
            id: s.id,
            title: s.title,
            description: s.description,
            short_description: s.short_description,
            price: s.price,
            is_active: s.is_active,
            tags: s.tags,
            base_url: s.base_url,
            auth_type: s.auth_type,
            endpoints: s.endpoints.0,
            plans: s.plans.0,
            example_code: s.example_code,
            documentation: s.documentation,
            created_at: s.created_at,
            seller: SellerSummary {
                id: s.seller_id,
                display_name: r.seller_name,
                avatar_url: r.seller_avatar,
            },
            category: CategorySummary {
                id: s.category_id,
                name: r.category_name,
                slug: r.category_slug,
            },
            rating: r.rating,
            review_count: r.review_count,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedServiceResponse {
    pub id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> CreateServiceRequest {
        serde_json::from_value(serde_json::json!({
            "title": "  PDF to Text API ",
            "description": "Extract text from PDFs",
            "price": 29,
            "categoryId": Uuid::nil(),
        }))
        .unwrap()
    }

    #[test]
    fn minimal_request_is_valid() {
        let draft = ServiceDraft::from(request()).validate().unwrap();
        assert_eq!(draft.title, "PDF to Text API");
        assert!(draft.tags.is_empty());
        assert!(draft.endpoints.is_empty());
    }

    #[test]
    fn wizard_fields_are_normalized() {
        let mut req = request();
        req.tags = vec![" OCR ".into(), "ocr".into(), "pdf".into(), "".into()];
        req.endpoints = vec![EndpointSpec {
            method: "post".into(),
            path: "/v1/extract".into(),
            description: "Extract".into(),
        }];
        req.auth_type = Some(AuthType::ApiKey);
        req.base_url = Some("https://api.pdftext.dev".into());
        let draft = ServiceDraft::from(req).validate().unwrap();
        assert_eq!(draft.tags, vec!["ocr".to_string(), "pdf".to_string()]);
        assert_eq!(draft.endpoints[0].method, "POST");
    }

    fn rejected(edit: impl FnOnce(&mut CreateServiceRequest)) -> bool {
        let mut r = request();
        edit(&mut r);
        ServiceDraft::from(r).validate().is_err()
    }

    fn endpoint(method: &str, path: &str) -> EndpointSpec {
        EndpointSpec {
            method: method.into(),
            path: path.into(),
            description: String::new(),
        }
    }

    #[test]
    fn rejects_invalid_wizard_input() {
        assert!(rejected(|r| r.title = "   ".into()));
        assert!(rejected(|r| r.price = -1));
        assert!(rejected(|r| r.tags = (0..6).map(|i| format!("t{i}")).collect()));
        assert!(rejected(|r| r.base_url = Some("ftp://files".into())));
        assert!(rejected(|r| r.endpoints = vec![endpoint("TRACE", "/")]));
        assert!(rejected(|r| r.endpoints = vec![endpoint("GET", "v1/items")]));
        assert!(rejected(|r| r.plans = vec![PricingPlan {
            name: "Starter".into(),
            price: 29,
            request_limit: Some(0),
        }]));
        assert!(!rejected(|r| r.endpoints = vec![endpoint("delete", "/v1/items/{id}")]));
    }

    #[test]
    fn update_overlays_only_given_fields() {
        let base = ServiceDraft::from(request()).validate().unwrap();
        let patched = UpdateServiceRequest {
            price: Some(49),
            short_description: Some(String::new()),
            ..Default::default()
        }
        .apply(base.clone())
        .validate()
        .unwrap();
        assert_eq!(patched.price, 49);
        assert_eq!(patched.title, base.title);
        assert_eq!(patched.short_description, None);
    }

    #[test]
    fn auth_type_round_trips_through_storage_text() {
        for t in [AuthType::ApiKey, AuthType::Bearer, AuthType::Oauth2, AuthType::None] {
            assert_eq!(AuthType::parse(t.as_str()), Some(t));
        }
        assert_eq!(AuthType::parse("basic"), None);
    }

    #[test]
    fn deactivated_listing_detail_reports_inactive() {
        let row = ServiceDetailRow {
            service: Service {
                id: Uuid::nil(),
                seller_id: Uuid::nil(),
                category_id: Uuid::nil(),
                title: "PDF to Text API".into(),
                description: "Extract text from PDFs".into(),
                price: 29,
                is_active: false,
                short_description: None,
                tags: vec!["pdf".into()],
                base_url: None,
                auth_type: Some("api_key".into()),
                endpoints: sqlx::types::Json(vec![endpoint("post", "/v1/extract")]),
                plans: sqlx::types::Json(Vec::new()),
                example_code: None,
                documentation: None,
                created_at: OffsetDateTime::UNIX_EPOCH,
            },
            seller_name: Some("Ada".into()),
            seller_avatar: None,
            category_name: "Documents".into(),
            category_slug: "documents".into(),
            review_count: 0,
            rating: 0.0,
        };
        let json = serde_json::to_value(ServiceDetail::from(row)).unwrap();
        assert_eq!(json["isActive"], false);
        assert_eq!(json["category"]["slug"], "documents");
        assert_eq!(json["endpoints"][0]["path"], "/v1/extract");
    }
}
