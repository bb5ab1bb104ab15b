use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utoipa::ToSchema;

use crate::{
    AppState,
    backend::{InvoiceFilter, segment},
    error::RelayError,
    filter::search,
    gate,
    handlers::PathParams,
    identity::Identity,
    models::{CashRegister, CashSession, Invoice, InvoiceStatus, Patient, Preclinic},
    nav::{NavItem, visible_menu},
    proxy::RELAY_PREFIX,
    roles::{Action, allowed},
};

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

fn limit(requested: Option<u32>) -> u32 {
    requested.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

// --- Query Structs ---

#[derive(Deserialize, utoipa::IntoParams)]
pub struct PatientListParams {
    /// Free-text search over MRN, names, email and phone.
    pub q: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct PreclinicListParams {
    /// Free-text search over complaint, medications, conditions and allergies.
    pub q: Option<String>,
    pub patient_id: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Deserialize, utoipa::IntoParams)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceListParams {
    /// Free-text search over invoice number, status and patient names.
    pub q: Option<String>,
    #[param(value_type = Option<String>)]
    pub status: Option<InvoiceStatus>,
    /// Inclusive start date, `YYYY-MM-DD`.
    pub from: Option<String>,
    /// Inclusive end date, `YYYY-MM-DD`.
    pub to: Option<String>,
    pub patient_id: Option<String>,
    pub limit: Option<u32>,
}

// --- View Models ---

/// Per-control flags for the patient screens.
#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PatientControls {
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct PatientListView {
    pub items: Vec<Patient>,
    pub total: usize,
    pub controls: PatientControls,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct PatientDetailView {
    pub patient: Patient,
    pub controls: PatientControls,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct PreclinicControls {
    pub can_create: bool,
    pub can_edit: bool,
    pub can_delete: bool,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct PreclinicListView {
    pub items: Vec<Preclinic>,
    pub total: usize,
    pub controls: PreclinicControls,
}

/// An invoice row plus the relay link that serves its printable PDF.
#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct InvoiceRow {
    #[serde(flatten)]
    pub invoice: Invoice,
    pub pdf_url: String,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[ts(export)]
pub struct InvoiceListView {
    pub items: Vec<InvoiceRow>,
    pub total: usize,
}

#[derive(Debug, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CashierView {
    pub registers: Vec<CashRegister>,
    pub open_session: Option<CashSession>,
    /// Backend-computed totals for the open session, passed through untouched.
    #[ts(type = "unknown")]
    #[schema(value_type = Option<Object>)]
    pub summary: Option<serde_json::Value>,
}

/// Relay path that serves an invoice's printable PDF.
pub fn invoice_pdf_url(invoice_id: &str) -> String {
    format!("{RELAY_PREFIX}invoices/{}/pdf", segment(invoice_id))
}

fn patient_controls(identity: &Identity) -> PatientControls {
    let roles = &identity.me.roles;
    PatientControls {
        can_create: allowed(roles, Action::PatientCreate),
        can_edit: allowed(roles, Action::PatientEdit),
        can_delete: allowed(roles, Action::PatientDelete),
    }
}

// --- Handlers ---

/// get_nav
///
/// [Authenticated Route] The navigation menu for the current user, with the
/// entry matching `path` marked active.
#[utoipa::path(
    get,
    path = "/views/nav",
    params(PathParams),
    responses((status = 200, description = "Visible menu", body = [NavItem]))
)]
pub async fn get_nav(identity: Identity, Query(params): Query<PathParams>) -> Json<Vec<NavItem>> {
    let path = params.path.as_deref().unwrap_or("/");
    Json(visible_menu(&identity.me.roles, path))
}

/// list_patients
///
/// [Authenticated Route] Patient dashboard. Gated on `PatientView`.
#[utoipa::path(
    get,
    path = "/views/patients",
    params(PatientListParams),
    responses(
        (status = 200, description = "Patients", body = PatientListView),
        (status = 403, description = "Role lacks PatientView")
    )
)]
pub async fn list_patients(
    identity: Identity,
    State(state): State<AppState>,
    Query(params): Query<PatientListParams>,
) -> Result<Json<PatientListView>, RelayError> {
    gate::require(&identity.me.roles, Action::PatientView)?;

    let patients = state
        .backend
        .patients(&identity.session.bearer, limit(params.limit))
        .await?;
    let items = search(patients, params.q.as_deref());

    Ok(Json(PatientListView {
        total: items.len(),
        items,
        controls: patient_controls(&identity),
    }))
}

/// get_patient
///
/// [Authenticated Route] Single patient record. Gated on `PatientView`.
#[utoipa::path(
    get,
    path = "/views/patients/{id}",
    params(("id" = String, Path, description = "Patient ID")),
    responses(
        (status = 200, description = "Patient", body = PatientDetailView),
        (status = 403, description = "Role lacks PatientView")
    )
)]
pub async fn get_patient(
    identity: Identity,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PatientDetailView>, RelayError> {
    gate::require(&identity.me.roles, Action::PatientView)?;

    let patient = state
        .backend
        .patient(&identity.session.bearer, &id)
        .await?;

    Ok(Json(PatientDetailView {
        patient,
        controls: patient_controls(&identity),
    }))
}

/// list_preclinics
///
/// [Authenticated Route] Pre-clinic dashboard. Gated on `PreclinicView`.
#[utoipa::path(
    get,
    path = "/views/preclinics",
    params(PreclinicListParams),
    responses(
        (status = 200, description = "Pre-clinic records", body = PreclinicListView),
        (status = 403, description = "Role lacks PreclinicView")
    )
)]
pub async fn list_preclinics(
    identity: Identity,
    State(state): State<AppState>,
    Query(params): Query<PreclinicListParams>,
) -> Result<Json<PreclinicListView>, RelayError> {
    let roles = &identity.me.roles;
    gate::require(roles, Action::PreclinicView)?;

    let records = state
        .backend
        .preclinics(
            &identity.session.bearer,
            limit(params.limit),
            params.patient_id.as_deref(),
        )
        .await?;
    let items = search(records, params.q.as_deref());

    Ok(Json(PreclinicListView {
        total: items.len(),
        items,
        controls: PreclinicControls {
            can_create: allowed(roles, Action::PreclinicCreate),
            can_edit: allowed(roles, Action::PreclinicEdit),
            can_delete: allowed(roles, Action::PreclinicDelete),
        },
    }))
}

/// list_invoices
///
/// [Authenticated Route] Invoice dashboard. Status and date filters go to the
/// backend; the free-text search runs here. Gated on `InvoicesArea`.
#[utoipa::path(
    get,
    path = "/views/invoices",
    params(InvoiceListParams),
    responses(
        (status = 200, description = "Invoices", body = InvoiceListView),
        (status = 403, description = "Role lacks InvoicesArea")
    )
)]
pub async fn list_invoices(
    identity: Identity,
    State(state): State<AppState>,
    Query(params): Query<InvoiceListParams>,
) -> Result<Json<InvoiceListView>, RelayError> {
    gate::require(&identity.me.roles, Action::InvoicesArea)?;

    let filter = InvoiceFilter {
        limit: limit(params.limit),
        status: params.status,
        from: params.from,
        to: params.to,
        patient_id: params.patient_id,
    };
    let invoices = state
        .backend
        .invoices(&identity.session.bearer, &filter)
        .await?;

    let items: Vec<InvoiceRow> = search(invoices, params.q.as_deref())
        .into_iter()
        .map(|invoice| InvoiceRow {
            pdf_url: invoice_pdf_url(&invoice.id),
            invoice,
        })
        .collect();

    Ok(Json(InvoiceListView {
        total: items.len(),
        items,
    }))
}

/// get_cashier
///
/// [Authenticated Route] Cashier screen: available registers, the first open
/// cash session and, when one is open, its backend summary. Gated on
/// `CashierArea`.
#[utoipa::path(
    get,
    path = "/views/cashier",
    responses(
        (status = 200, description = "Cashier state", body = CashierView),
        (status = 403, description = "Role lacks CashierArea")
    )
)]
pub async fn get_cashier(
    identity: Identity,
    State(state): State<AppState>,
) -> Result<Json<CashierView>, RelayError> {
    gate::require(&identity.me.roles, Action::CashierArea)?;
    let bearer = &identity.session.bearer;

    let (registers, sessions) = tokio::try_join!(
        state.backend.registers(bearer, MAX_LIMIT),
        state.backend.open_cash_sessions(bearer),
    )?;

    let open_session = sessions.into_iter().next();
    let summary = match &open_session {
        Some(session) => Some(state.backend.cash_summary(bearer, &session.id).await?),
        None => None,
    };

    Ok(Json(CashierView {
        registers,
        open_session,
        summary,
    }))
}
