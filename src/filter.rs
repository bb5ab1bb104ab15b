use crate::models::{Invoice, Patient, Preclinic};

/// Searchable
///
/// Items that can be narrowed by a free-text search box. Each implementation
/// names the fields the search looks at.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;

    /// True when every whitespace-separated term occurs, case-insensitively,
    /// in at least one search field. An empty query matches everything.
    fn matches(&self, query: &str) -> bool {
        let fields: Vec<String> = self
            .search_fields()
            .into_iter()
            .map(str::to_lowercase)
            .collect();

        query
            .split_whitespace()
            .map(str::to_lowercase)
            .all(|term| fields.iter().any(|field| field.contains(&term)))
    }
}

/// Keeps the items matching `query`, preserving the backend's order.
pub fn search<T: Searchable>(items: Vec<T>, query: Option<&str>) -> Vec<T> {
    match query.map(str::trim) {
        None | Some("") => items,
        Some(query) => items.into_iter().filter(|item| item.matches(query)).collect(),
    }
}

impl Searchable for Patient {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.mrn.as_str(),
            self.first_name.as_str(),
            self.last_name.as_str(),
        ];
        fields.extend(self.email.as_deref());
        fields.extend(self.phone.as_deref());
        fields
    }
}

impl Searchable for Preclinic {
    fn search_fields(&self) -> Vec<&str> {
        [
            &self.chief_complaint,
            &self.current_medications,
            &self.other_conditions,
            &self.allergies_reported,
        ]
        .into_iter()
        .filter_map(|field| field.as_deref())
        .collect()
    }
}

impl Searchable for Invoice {
    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![self.invoice_no.as_str(), self.status.as_str()];
        if let Some(patient) = &self.patient {
            fields.extend(patient.first_name.as_deref());
            fields.extend(patient.last_name.as_deref());
        }
        fields
    }
}
