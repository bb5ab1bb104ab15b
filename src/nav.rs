use serde::Serialize;
use ts_rs::TS;
use utoipa::ToSchema;

use crate::roles::{Action, RoleSet, allowed};

/// Icon
///
/// Menu icons. Serialized names are the lucide component names the front-end
/// renders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, TS, ToSchema)]
#[ts(export)]
pub enum Icon {
    LayoutDashboard,
    Users,
    Stethoscope,
    WalletCards,
    ReceiptText,
    FlaskConical,
    Settings,
}

/// MenuEntry
///
/// Static navigation entry. `action: None` means every authenticated user sees it.
#[derive(Debug, Clone, Copy)]
pub struct MenuEntry {
    pub label: &'static str,
    pub href: &'static str,
    pub icon: Icon,
    pub exact: bool,
    pub action: Option<Action>,
}

pub const MENU: &[MenuEntry] = &[
    MenuEntry {
        label: "Dashboard",
        href: "/",
        icon: Icon::LayoutDashboard,
        exact: true,
        action: None,
    },
    MenuEntry {
        label: "Patients",
        href: "/patients",
        icon: Icon::Users,
        exact: false,
        action: Some(Action::PatientView),
    },
    MenuEntry {
        label: "Preclinic",
        href: "/preclinic",
        icon: Icon::Stethoscope,
        exact: false,
        action: Some(Action::PreclinicView),
    },
    MenuEntry {
        label: "Cashier",
        href: "/cashier",
        icon: Icon::WalletCards,
        exact: false,
        action: Some(Action::CashierArea),
    },
    MenuEntry {
        label: "Invoices",
        href: "/invoice",
        icon: Icon::ReceiptText,
        exact: false,
        action: Some(Action::InvoicesArea),
    },
    MenuEntry {
        label: "Lab",
        href: "/lab",
        icon: Icon::FlaskConical,
        exact: false,
        action: Some(Action::LabArea),
    },
    MenuEntry {
        label: "Admin",
        href: "/admin",
        icon: Icon::Settings,
        exact: false,
        action: Some(Action::AdminArea),
    },
];

impl MenuEntry {
    pub fn visible_to(&self, roles: &RoleSet) -> bool {
        self.action.is_none_or(|action| allowed(roles, action))
    }

    pub fn is_active(&self, path: &str) -> bool {
        if self.exact {
            path == self.href
        } else {
            path.starts_with(self.href)
        }
    }
}

/// NavItem
///
/// A menu entry as rendered for one user on one page.
#[derive(Debug, Clone, PartialEq, Serialize, TS, ToSchema)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct NavItem {
    pub label: String,
    pub href: String,
    pub icon: Icon,
    pub active: bool,
}

/// The menu entries `roles` may see, marked active against the current path.
pub fn visible_menu(roles: &RoleSet, path: &str) -> Vec<NavItem> {
    MENU.iter()
        .filter(|entry| entry.visible_to(roles))
        .map(|entry| NavItem {
            label: entry.label.to_string(),
            href: entry.href.to_string(),
            icon: entry.icon,
            active: entry.is_active(path),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(items: &[NavItem]) -> Vec<&str> {
        items.iter().map(|item| item.label.as_str()).collect()
    }

    #[test]
    fn dashboard_is_visible_without_roles() {
        let items = visible_menu(&RoleSet::default(), "/");
        assert_eq!(labels(&items), vec!["Dashboard"]);
        assert!(items[0].active);
    }

    #[test]
    fn cashier_sees_money_screens_only() {
        let roles: RoleSet = ["cashier"].iter().collect();
        let items = visible_menu(&roles, "/invoice/abc");
        assert_eq!(labels(&items), vec!["Dashboard", "Cashier", "Invoices"]);

        let active: Vec<_> = items.iter().filter(|i| i.active).collect();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].href, "/invoice");
    }

    #[test]
    fn dashboard_match_is_exact() {
        let roles: RoleSet = ["doctor"].iter().collect();
        let items = visible_menu(&roles, "/patients/42");
        let dashboard = items.iter().find(|i| i.href == "/").unwrap();
        assert!(!dashboard.active);
        assert!(items.iter().any(|i| i.href == "/patients" && i.active));
    }

    #[test]
    fn icons_serialize_as_component_names() {
        assert_eq!(
            serde_json::to_string(&Icon::WalletCards).unwrap(),
            r#""WalletCards""#
        );
    }
}
