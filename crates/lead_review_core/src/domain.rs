//! crates/lead_review_core/src/domain.rs
//!
//! Defines the pure, core data structures for the lead review workflow.
//! Wire names follow the upstream recommendation service, so the serde
//! renames here are part of the domain contract, not an adapter detail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The decision state of a lead. Once a lead leaves `Pending` it never
/// returns; no transition back is exposed anywhere in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LeadStatus {
    Pending,
    Accepted,
    Rejected,
}

impl LeadStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, LeadStatus::Pending)
    }
}

/// Status predicate for lead list queries. `All` applies no server-side
/// status filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusFilter {
    #[serde(rename = "all")]
    All,
    Pending,
    Accepted,
    Rejected,
}

impl Default for StatusFilter {
    fn default() -> Self {
        StatusFilter::All
    }
}

/// A recommendation candidate attached to a pending lead.
///
/// Products carry no id of their own: within a review, a product is
/// identified by its position in the lead's `recommended_product`
/// sequence. That constraint comes from the upstream data shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(rename = "Image")]
    pub image: String,
    /// Decimal amount as a string; rendered as currency, never computed on.
    #[serde(rename = "Price")]
    pub price: String,
    #[serde(rename = "Product Name")]
    pub name: String,
    #[serde(rename = "AdditionalInformation")]
    pub additional_information: String,
}

/// One prospective customer's product inquiry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub lead_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile_number: Option<String>,
    pub status: LeadStatus,
    /// Opaque inquiry context, passed through untouched.
    #[serde(default)]
    pub product_query: Option<String>,
    #[serde(default)]
    pub form_data: Option<serde_json::Value>,
    /// Present only while the lead is `Pending`; may be empty or absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommended_product: Option<Vec<Product>>,
    /// Populated only after an `Accepted` decision.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approved_product: Option<Vec<Product>>,
}

impl Lead {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Parameters for a lead list query. `page` is 1-based at the transport
/// boundary; search matching and result ordering are the server's.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadQuery {
    pub page: u32,
    pub limit: u32,
    #[serde(default)]
    pub search: String,
    #[serde(default)]
    pub status: StatusFilter,
}

/// One page of the lead collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadPage {
    pub leads: Vec<Lead>,
    #[serde(rename = "totalLeads")]
    pub total_leads: i64,
}

/// An authenticated principal, as returned by the upstream sign-in. The
/// bearer token authorizes every repository call; the user id scopes
/// change-of-password requests.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: i64,
    pub name: String,
    pub email: String,
    pub token: String,
    pub refresh_token: String,
    pub token_expiry: DateTime<Utc>,
    pub refresh_token_expiry: DateTime<Utc>,
}

/// A change-of-password request, validated before it is forwarded.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

impl PasswordChange {
    /// Mirrors the panel's form rules: minimum length, must differ from
    /// the current password, confirmation must match.
    pub fn validate(&self) -> Result<(), String> {
        if self.new_password.len() < 8 {
            return Err("New password must be at least 8 characters long".to_string());
        }
        if self.new_password == self.current_password {
            return Err("New password cannot be the same as the current password".to_string());
        }
        if self.new_password != self.confirm_password {
            return Err("Passwords must match".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lead_deserializes_upstream_wire_names() {
        let json = serde_json::json!({
            "leadId": 42,
            "firstName": "Ada",
            "lastName": "Lovelace",
            "email": "ada@example.com",
            "status": "Pending",
            "productQuery": null,
            "formData": {"budget": "500"},
            "recommendedProduct": [{
                "Image": "v1/abc.jpg",
                "Price": "19.99",
                "Product Name": "Walking Cane",
                "AdditionalInformation": "Adjustable height"
            }]
        });
        let lead: Lead = serde_json::from_value(json).unwrap();
        assert_eq!(lead.lead_id, 42);
        assert_eq!(lead.full_name(), "Ada Lovelace");
        assert!(lead.status.is_pending());
        let products = lead.recommended_product.unwrap();
        assert_eq!(products[0].name, "Walking Cane");
        assert!(lead.approved_product.is_none());
    }

    #[test]
    fn status_filter_serializes_all_lowercase() {
        assert_eq!(
            serde_json::to_string(&StatusFilter::All).unwrap(),
            "\"all\""
        );
        assert_eq!(
            serde_json::to_string(&StatusFilter::Pending).unwrap(),
            "\"Pending\""
        );
    }

    #[test]
    fn password_change_rules() {
        let ok = PasswordChange {
            current_password: "old-secret".into(),
            new_password: "new-secret".into(),
            confirm_password: "new-secret".into(),
        };
        assert!(ok.validate().is_ok());

        let too_short = PasswordChange {
            new_password: "short".into(),
            confirm_password: "short".into(),
            ..ok.clone()
        };
        assert!(too_short.validate().is_err());

        let same_as_current = PasswordChange {
            new_password: "old-secret".into(),
            confirm_password: "old-secret".into(),
            ..ok.clone()
        };
        assert!(same_as_current.validate().is_err());

        let mismatch = PasswordChange {
            confirm_password: "other".into(),
            ..ok
        };
        assert!(mismatch.validate().is_err());
    }
}
