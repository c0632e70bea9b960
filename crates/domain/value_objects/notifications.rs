use std::fmt::Display;

use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Activated,
    Reactivated,
    PaymentFailed,
    NotRenewing,
    Disabled,
    Enabled,
    Expired,
    Cancelled,
    CancelledAtPeriodEnd,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Activated => "activated",
            NotificationKind::Reactivated => "reactivated",
            NotificationKind::PaymentFailed => "payment_failed",
            NotificationKind::NotRenewing => "not_renewing",
            NotificationKind::Disabled => "disabled",
            NotificationKind::Enabled => "enabled",
            NotificationKind::Expired => "expired",
            NotificationKind::Cancelled => "cancelled",
            NotificationKind::CancelledAtPeriodEnd => "cancelled_at_period_end",
        }
    }
}

impl Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing message about a subscription state change.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SubscriptionNotification {
    pub user_id: Uuid,
    pub subscription_id: Uuid,
    pub kind: NotificationKind,
    pub plan_name: String,
}

impl SubscriptionNotification {
    pub fn new(
        user_id: Uuid,
        subscription_id: Uuid,
        kind: NotificationKind,
        plan_name: impl Into<String>,
    ) -> Self {
        Self {
            user_id,
            subscription_id,
            kind,
            plan_name: plan_name.into(),
        }
    }

    pub fn title(&self) -> &'static str {
        match self.kind {
            NotificationKind::Activated => "Subscription active",
            NotificationKind::Reactivated => "Subscription reactivated",
            NotificationKind::PaymentFailed => "Payment failed",
            NotificationKind::NotRenewing => "Subscription will not renew",
            NotificationKind::Disabled => "Subscription disabled",
            NotificationKind::Enabled => "Subscription enabled",
            NotificationKind::Expired => "Subscription expired",
            NotificationKind::Cancelled => "Subscription cancelled",
            NotificationKind::CancelledAtPeriodEnd => "Subscription ended",
        }
    }

    pub fn body(&self) -> String {
        let plan = &self.plan_name;
        match self.kind {
            NotificationKind::Activated => {
                format!("Your payment was received and your {plan} plan is now active.")
            }
            NotificationKind::Reactivated => format!("Welcome back! Your {plan} plan is active again."),
            NotificationKind::PaymentFailed => format!(
                "We could not charge your card for the {plan} plan. Your subscription has expired; subscribe again to restore access."
            ),
            NotificationKind::NotRenewing => {
                format!("Your {plan} plan has been cancelled and will not renew.")
            }
            NotificationKind::Disabled => format!("Your {plan} plan has been disabled."),
            NotificationKind::Enabled => format!("Your {plan} plan has been enabled."),
            NotificationKind::Expired => format!(
                "Your {plan} plan expired because the renewal payment did not go through."
            ),
            NotificationKind::Cancelled => format!("You cancelled your {plan} plan."),
            NotificationKind::CancelledAtPeriodEnd => format!(
                "Your {plan} plan reached the end of its billing period and has been cancelled as requested."
            ),
        }
    }
}
