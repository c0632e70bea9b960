use std::fmt::Display;

use serde::Serialize;
use thiserror::Error;

use crate::domain::value_objects::enums::user_roles::UserRole;

/// Separator between the role and the plan key in provider plan names,
/// e.g. `vendor@vendor pro`.
pub const PLAN_NAME_SEPARATOR: char = '@';

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Monthly,
    Quarterly,
    Annually,
}

impl BillingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Quarterly => "quarterly",
            BillingPeriod::Annually => "annually",
        }
    }
}

impl Display for BillingPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Human-readable metadata for a plan offered to one role.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PlanDetails {
    pub role: UserRole,
    pub key: &'static str,
    pub display_name: &'static str,
    pub period: BillingPeriod,
    pub features: &'static [&'static str],
}

/// A provider plan name split into its role and plan key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanName {
    pub role: UserRole,
    pub key: String,
}

impl PlanName {
    /// Parses `"<role>@<planKey>"`. Whitespace around either part is ignored and
    /// the key is matched case-insensitively.
    pub fn parse(raw: &str) -> Result<Self, PlanCatalogError> {
        let (role, key) = raw
            .split_once(PLAN_NAME_SEPARATOR)
            .ok_or_else(|| PlanCatalogError::Unparseable(raw.to_string()))?;

        let role = UserRole::from_str(role)
            .ok_or_else(|| PlanCatalogError::UnknownRole(role.trim().to_string()))?;

        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(PlanCatalogError::Unparseable(raw.to_string()));
        }

        Ok(Self { role, key })
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanCatalogError {
    #[error("plan name `{0}` is not in `<role>@<plan>` form")]
    Unparseable(String),
    #[error("plan role `{0}` is not a known account type")]
    UnknownRole(String),
    #[error("plan is for {plan_role} accounts, caller is {caller_role}")]
    RoleMismatch {
        plan_role: UserRole,
        caller_role: UserRole,
    },
    #[error("plan `{0}` is not in the catalog")]
    UnknownPlan(String),
}

static CATALOG: &[PlanDetails] = &[
    PlanDetails {
        role: UserRole::Vendor,
        key: "vendor basic",
        display_name: "Vendor Basic",
        period: BillingPeriod::Monthly,
        features: &["Up to 20 product listings", "Standard payouts", "Email support"],
    },
    PlanDetails {
        role: UserRole::Vendor,
        key: "vendor pro",
        display_name: "Vendor Pro",
        period: BillingPeriod::Monthly,
        features: &[
            "Unlimited product listings",
            "Next-day payouts",
            "Featured store placement",
            "Priority support",
        ],
    },
    PlanDetails {
        role: UserRole::Vendor,
        key: "vendor pro annual",
        display_name: "Vendor Pro (Annual)",
        period: BillingPeriod::Annually,
        features: &[
            "Unlimited product listings",
            "Next-day payouts",
            "Featured store placement",
            "Priority support",
            "Two months free",
        ],
    },
    PlanDetails {
        role: UserRole::Customer,
        key: "customer plus",
        display_name: "Customer Plus",
        period: BillingPeriod::Monthly,
        features: &["Free delivery on orders", "Member-only deals"],
    },
    PlanDetails {
        role: UserRole::Customer,
        key: "customer premium",
        display_name: "Customer Premium",
        period: BillingPeriod::Quarterly,
        features: &[
            "Free delivery on orders",
            "Member-only deals",
            "Early access to sales",
        ],
    },
];

/// Looks up catalog metadata for a role and plan key.
pub fn resolve_plan(role: UserRole, plan_key: &str) -> Option<&'static PlanDetails> {
    let plan_key = plan_key.trim().to_ascii_lowercase();
    CATALOG
        .iter()
        .find(|plan| plan.role == role && plan.key == plan_key)
}

/// Resolves a provider plan name for a caller. The role encoded in the name must
/// match the caller's role.
pub fn resolve_provider_plan(
    caller_role: UserRole,
    provider_plan_name: &str,
) -> Result<&'static PlanDetails, PlanCatalogError> {
    let name = PlanName::parse(provider_plan_name)?;

    if name.role != caller_role {
        return Err(PlanCatalogError::RoleMismatch {
            plan_role: name.role,
            caller_role,
        });
    }

    resolve_plan(name.role, &name.key)
        .ok_or_else(|| PlanCatalogError::UnknownPlan(provider_plan_name.to_string()))
}

pub fn plans_for_role(role: UserRole) -> impl Iterator<Item = &'static PlanDetails> {
    CATALOG.iter().filter(move |plan| plan.role == role)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_composite_plan_name() {
        let name = PlanName::parse("vendor@Vendor Pro").unwrap();
        assert_eq!(name.role, UserRole::Vendor);
        assert_eq!(name.key, "vendor pro");
    }

    #[test]
    fn rejects_names_without_separator() {
        assert_eq!(
            PlanName::parse("vendor pro"),
            Err(PlanCatalogError::Unparseable("vendor pro".to_string()))
        );
        assert!(matches!(
            PlanName::parse("vendor@   "),
            Err(PlanCatalogError::Unparseable(_))
        ));
    }

    #[test]
    fn rejects_roles_outside_closed_set() {
        assert_eq!(
            PlanName::parse("admin@everything"),
            Err(PlanCatalogError::UnknownRole("admin".to_string()))
        );
    }

    #[test]
    fn resolves_plan_for_matching_role() {
        let plan = resolve_provider_plan(UserRole::Vendor, "vendor@vendor pro").unwrap();
        assert_eq!(plan.display_name, "Vendor Pro");
        assert_eq!(plan.period, BillingPeriod::Monthly);
    }

    #[test]
    fn role_mismatch_is_a_hard_rejection() {
        assert_eq!(
            resolve_provider_plan(UserRole::Customer, "vendor@vendor pro"),
            Err(PlanCatalogError::RoleMismatch {
                plan_role: UserRole::Vendor,
                caller_role: UserRole::Customer,
            })
        );
    }

    #[test]
    fn unknown_plan_key_is_not_found() {
        assert!(matches!(
            resolve_provider_plan(UserRole::Vendor, "vendor@platinum"),
            Err(PlanCatalogError::UnknownPlan(_))
        ));
        assert!(resolve_plan(UserRole::Customer, "vendor pro").is_none());
    }

    #[test]
    fn every_role_has_at_least_one_plan() {
        for role in UserRole::ALL {
            assert!(plans_for_role(role).next().is_some(), "{role} has no plans");
        }
    }
}
