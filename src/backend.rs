use axum::http::header;
use serde::de::DeserializeOwned;
use url::form_urlencoded;

use crate::{
    config::UpstreamConfig,
    error::RelayError,
    models::{
        CashRegister, CashSession, Invoice, InvoiceStatus, Listing, MeResponse, Patient, Preclinic,
    },
    session::BearerToken,
};

/// InvoiceFilter
///
/// Server-side filters the backend invoice listing understands. Dates are
/// `YYYY-MM-DD`.
#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub limit: u32,
    pub status: Option<InvoiceStatus>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub patient_id: Option<String>,
}

/// BackendClient
///
/// Typed calls into the backend business API on behalf of one session. Every
/// call carries the caller's bearer token; nothing is retried or cached here.
#[derive(Clone)]
pub struct BackendClient {
    http: reqwest::Client,
    upstream: UpstreamConfig,
}

impl BackendClient {
    pub fn new(http: reqwest::Client, upstream: UpstreamConfig) -> Self {
        Self { http, upstream }
    }

    /// get_json
    ///
    /// GETs `{API_BASE}/{API_PREFIX}/{path}?{query}` and decodes the JSON body.
    /// A non-success status is returned as `RelayError::Upstream` with the
    /// backend's body intact.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        bearer: &BearerToken,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RelayError> {
        let encoded = form_urlencoded::Serializer::new(String::new())
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())))
            .finish();
        let target = self.upstream.url_for(path, Some(&encoded));

        let response = self
            .http
            .get(&target)
            .header(header::AUTHORIZATION, bearer.header_value())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
            let body = response.bytes().await?;
            tracing::warn!(%path, status = status.as_u16(), "Backend call failed");
            return Err(RelayError::Upstream {
                status,
                content_type,
                body,
            });
        }

        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RelayError::Decode(format!("{path}: {e}")))
    }

    /// The backend "who am I" endpoint.
    pub async fn me(&self, bearer: &BearerToken) -> Result<MeResponse, RelayError> {
        self.get_json(bearer, "me", &[]).await
    }

    pub async fn patients(
        &self,
        bearer: &BearerToken,
        limit: u32,
    ) -> Result<Vec<Patient>, RelayError> {
        let listing: Listing<Patient> = self
            .get_json(bearer, "patients", &[("limit", limit.to_string())])
            .await?;
        Ok(listing.into_items())
    }

    pub async fn patient(&self, bearer: &BearerToken, id: &str) -> Result<Patient, RelayError> {
        self.get_json(bearer, &format!("patients/{}", segment(id)), &[])
            .await
    }

    pub async fn preclinics(
        &self,
        bearer: &BearerToken,
        limit: u32,
        patient_id: Option<&str>,
    ) -> Result<Vec<Preclinic>, RelayError> {
        let mut query = vec![("limit", limit.to_string())];
        if let Some(patient_id) = patient_id {
            query.push(("patientId", patient_id.to_string()));
        }
        let listing: Listing<Preclinic> = self.get_json(bearer, "preclinics", &query).await?;
        Ok(listing.into_items())
    }

    pub async fn invoices(
        &self,
        bearer: &BearerToken,
        filter: &InvoiceFilter,
    ) -> Result<Vec<Invoice>, RelayError> {
        let mut query = vec![("limit", filter.limit.to_string())];
        if let Some(status) = filter.status {
            query.push(("status", status.as_str().to_string()));
        }
        if let Some(from) = &filter.from {
            query.push(("from", from.clone()));
        }
        if let Some(to) = &filter.to {
            query.push(("to", to.clone()));
        }
        if let Some(patient_id) = &filter.patient_id {
            query.push(("patientId", patient_id.clone()));
        }
        let listing: Listing<Invoice> = self.get_json(bearer, "invoices", &query).await?;
        Ok(listing.into_items())
    }

    pub async fn registers(
        &self,
        bearer: &BearerToken,
        limit: u32,
    ) -> Result<Vec<CashRegister>, RelayError> {
        let listing: Listing<CashRegister> = self
            .get_json(bearer, "registers", &[("limit", limit.to_string())])
            .await?;
        Ok(listing.into_items())
    }

    pub async fn open_cash_sessions(
        &self,
        bearer: &BearerToken,
    ) -> Result<Vec<CashSession>, RelayError> {
        let listing: Listing<CashSession> = self
            .get_json(bearer, "cash/sessions", &[("status", "open".to_string())])
            .await?;
        Ok(listing.into_items())
    }

    /// Cash summary for one session. The backend owns the arithmetic; the
    /// payload is passed through as-is.
    pub async fn cash_summary(
        &self,
        bearer: &BearerToken,
        session_id: &str,
    ) -> Result<serde_json::Value, RelayError> {
        self.get_json(bearer, "cash/summary", &[("sessionId", session_id.to_string())])
            .await
    }
}

/// Percent-encodes one path segment (ids come from the browser).
pub fn segment(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}
