use std::{collections::BTreeSet, fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ts_rs::TS;
use utoipa::ToSchema;

/// Role
///
/// Role identifiers issued by the backend `me` endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    Cashier,
    Admin,
    SuperAdmin,
    Doctor,
    Nurse,
    Receptionist,
    LabTech,
    Patient,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::Cashier,
        Role::Admin,
        Role::SuperAdmin,
        Role::Doctor,
        Role::Nurse,
        Role::Receptionist,
        Role::LabTech,
        Role::Patient,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Cashier => "cashier",
            Role::Admin => "admin",
            Role::SuperAdmin => "super_admin",
            Role::Doctor => "doctor",
            Role::Nurse => "nurse",
            Role::Receptionist => "receptionist",
            Role::LabTech => "lab_tech",
            Role::Patient => "patient",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == wanted)
            .ok_or_else(|| format!("unknown role: {s}"))
    }
}

/// RoleSet
///
/// Role identifiers attached to one identity, normalised to lowercase so that
/// membership checks are case-insensitive. Strings that are not a known
/// [`Role`] are kept (the backend may issue roles this service does not gate
/// on) but can never satisfy a requirement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    pub fn contains(&self, role: Role) -> bool {
        self.0.contains(role.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        RoleSet(
            iter.into_iter()
                .map(|role| role.as_ref().trim().to_ascii_lowercase())
                .filter(|role| !role.is_empty())
                .collect(),
        )
    }
}

impl Serialize for RoleSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter())
    }
}

impl<'de> Deserialize<'de> for RoleSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let roles = Option::<Vec<String>>::deserialize(deserializer)?;
        Ok(roles.unwrap_or_default().into_iter().collect())
    }
}

/// Action
///
/// Every gated capability in the front-end. Views and menus consult
/// [`allowed`] with one of these instead of listing roles inline.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS, ToSchema,
)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum Action {
    PatientView,
    PatientCreate,
    PatientEdit,
    PatientDelete,
    CashierArea,
    InvoicesArea,
    LabArea,
    AdminArea,
    PreclinicView,
    PreclinicCreate,
    PreclinicEdit,
    PreclinicDelete,
}

impl Action {
    pub const ALL: [Action; 12] = [
        Action::PatientView,
        Action::PatientCreate,
        Action::PatientEdit,
        Action::PatientDelete,
        Action::CashierArea,
        Action::InvoicesArea,
        Action::LabArea,
        Action::AdminArea,
        Action::PreclinicView,
        Action::PreclinicCreate,
        Action::PreclinicEdit,
        Action::PreclinicDelete,
    ];

    /// The capability table.
    pub fn required_roles(self) -> &'static [Role] {
        use Role::{Admin, Cashier, Doctor, LabTech, Nurse, Receptionist, SuperAdmin};

        match self {
            Action::PatientView | Action::PatientCreate => {
                &[Receptionist, Nurse, Doctor, Admin, SuperAdmin]
            }
            Action::PatientEdit => &[Nurse, Doctor, Admin, SuperAdmin],
            Action::PatientDelete => &[Admin, SuperAdmin],
            Action::CashierArea | Action::InvoicesArea => &[Cashier, Admin, SuperAdmin],
            Action::LabArea => &[LabTech, Doctor, Admin, SuperAdmin],
            Action::AdminArea => &[Admin, SuperAdmin],
            Action::PreclinicView | Action::PreclinicCreate => &[Nurse, Doctor, Admin, SuperAdmin],
            Action::PreclinicEdit => &[Doctor, Admin, SuperAdmin],
            Action::PreclinicDelete => &[Admin, SuperAdmin],
        }
    }
}

/// True iff the role set shares at least one role with the action's
/// requirement.
pub fn allowed(roles: &RoleSet, action: Action) -> bool {
    action
        .required_roles()
        .iter()
        .any(|role| roles.contains(*role))
}

/// Capability
///
/// One row of the evaluated capability table, as returned to the front-end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Capability {
    pub action: Action,
    pub allowed: bool,
}

/// Evaluates every action for the given role set.
pub fn capabilities(roles: &RoleSet) -> Vec<Capability> {
    Action::ALL
        .into_iter()
        .map(|action| Capability {
            action,
            allowed: allowed(roles, action),
        })
        .collect()
}
