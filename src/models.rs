use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::roles::RoleSet;

// --- Backend collaborator contract ---
//
// Shapes returned by the backend business API. Only the fields this service
// reads or re-renders are modelled; unknown fields are ignored. Monetary and
// measurement values stay strings, as the backend sends them.

/// Listing
///
/// Backend list endpoints answer either with a flat array or with a
/// `{items, nextCursor}` page envelope. Views show one page, so the cursor is
/// not kept.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Listing<T> {
    Page { items: Vec<T> },
    Flat(Vec<T>),
}

impl<T> Listing<T> {
    pub fn into_items(self) -> Vec<T> {
        match self {
            Listing::Page { items } => items,
            Listing::Flat(items) => items,
        }
    }
}

/// MeUser
///
/// Profile block of the backend `me` response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct MeUser {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub full_name: String,
    #[serde(default)]
    pub username: String,
}

/// MeResponse
///
/// Answer of the backend "who am I" endpoint: the profile plus the role set
/// every gate is evaluated against.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct MeResponse {
    #[serde(default)]
    pub user: MeUser,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    #[ts(type = "Array<string>")]
    pub roles: RoleSet,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Patient {
    pub id: String,
    #[serde(default)]
    pub mrn: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub dob: Option<String>,
    /// "M", "F", "Other" or "Unknown".
    pub sex: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub region: Option<String>,
    pub country: Option<String>,
    pub created_at: Option<String>,
}

/// Pre-clinic vitals and intake notes recorded before a consultation.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Preclinic {
    pub id: String,
    #[serde(default)]
    pub patient_id: String,
    #[serde(default)]
    pub visit_date: String,
    pub blood_pressure_systolic: Option<i32>,
    pub blood_pressure_diastolic: Option<i32>,
    pub heart_rate: Option<i32>,
    pub resp_rate: Option<i32>,
    pub temperature_c: Option<String>,
    pub weight_kg: Option<String>,
    pub height_cm: Option<String>,
    pub bmi: Option<String>,
    pub chief_complaint: Option<String>,
    pub current_medications: Option<String>,
    pub diabetes: Option<bool>,
    pub hypertension: Option<bool>,
    pub other_conditions: Option<String>,
    pub allergies_reported: Option<String>,
    pub recorded_by_id: Option<String>,
    pub request_context_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum InvoiceStatus {
    #[default]
    Draft,
    Posted,
    Void,
}

impl InvoiceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Posted => "posted",
            InvoiceStatus::Void => "void",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InvoiceLine {
    pub id: String,
    pub line_no: i32,
    pub description: String,
    /// "service" or "product".
    pub item_type: String,
    pub qty: String,
    pub unit_price: String,
    pub discount_pct: String,
    pub tax_rate_pct: String,
    pub line_total: String,
    pub service_id: Option<String>,
    pub product_id: Option<String>,
    pub provider_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InvoicePatient {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Invoice {
    pub id: String,
    #[serde(default)]
    pub invoice_no: String,
    #[serde(default)]
    pub status: InvoiceStatus,
    #[serde(default)]
    pub invoice_at: String,
    pub patient_id: Option<String>,
    #[serde(default)]
    pub location_id: String,
    #[serde(default)]
    pub cashier_id: String,
    pub register_id: Option<String>,
    #[serde(default)]
    pub subtotal: String,
    #[serde(default)]
    pub discount_total: String,
    #[serde(default)]
    pub tax_total: String,
    #[serde(default)]
    pub total: String,
    pub patient: Option<InvoicePatient>,
    pub lines: Option<Vec<InvoiceLine>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Location {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashRegister {
    pub id: String,
    pub name: String,
    pub location_id: Option<String>,
    pub location: Option<Location>,
}

/// An open or closed cashier session on one register.
#[derive(Debug, Clone, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashSession {
    pub id: String,
    pub register_id: Option<String>,
    pub status: Option<String>,
    pub opened_at: Option<String>,
}
