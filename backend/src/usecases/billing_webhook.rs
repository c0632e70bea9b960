use std::sync::Arc;

use subscription_core::domain::{
    entities::subscriptions::SubscriptionEntity,
    repositories::{
        app_users::UserRepository,
        notifications::{SubscriptionNotifier, notify_best_effort},
        subscriptions::SubscriptionRepository,
        transactions::TransactionRepository,
    },
    value_objects::{
        billing_events::{BillingEvent, ChargeSuccess, InvoiceCreated, SubscriptionEventRef},
        enums::payment_statuses::PaymentStatus,
        notifications::{NotificationKind, SubscriptionNotification},
        subscriptions::SubscriptionPatch,
    },
};
use tracing::{error, info, warn};

use crate::usecases::{
    billing_gateway::BillingGateway,
    payment_confirmation::{ConfirmedCharge, PaymentConfirmationUseCase},
    subscriptions::{SubscriptionError, UseCaseResult},
};

/// Applies signed provider events to the subscription store.
pub struct BillingWebhookUseCase<S, T, U, B, N>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    transaction_repo: Arc<T>,
    billing: Arc<B>,
    notifier: Arc<N>,
    payments: PaymentConfirmationUseCase<S, T, U, B, N>,
}

impl<S, T, U, B, N> BillingWebhookUseCase<S, T, U, B, N>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    pub fn new(
        subscription_repo: Arc<S>,
        transaction_repo: Arc<T>,
        user_repo: Arc<U>,
        billing: Arc<B>,
        notifier: Arc<N>,
    ) -> Self {
        let payments = PaymentConfirmationUseCase::new(
            Arc::clone(&subscription_repo),
            Arc::clone(&transaction_repo),
            user_repo,
            Arc::clone(&billing),
            Arc::clone(&notifier),
        );
        Self {
            subscription_repo,
            transaction_repo,
            billing,
            notifier,
            payments,
        }
    }

    /// Only a bad signature is reported back to the provider. Everything past
    /// that point is acknowledged so the provider does not keep retrying.
    pub async fn handle(&self, payload: &[u8], signature: Option<&str>) -> UseCaseResult<()> {
        let Some(signature) = signature.map(str::trim).filter(|value| !value.is_empty()) else {
            warn!("billing_webhook: request without signature header");
            return Err(SubscriptionError::InvalidSignature);
        };

        if !self.billing.verify_webhook_signature(payload, signature) {
            warn!(
                payload_len = payload.len(),
                "billing_webhook: signature mismatch; rejecting"
            );
            return Err(SubscriptionError::InvalidSignature);
        }

        let event = match BillingEvent::parse(payload) {
            Ok(event) => event,
            Err(err) => {
                error!(reason = %err, "billing_webhook: malformed event acknowledged without processing");
                return Ok(());
            }
        };

        let event_type = event.event_type().to_string();
        info!(%event_type, "billing_webhook: event received");

        if let Err(err) = self.dispatch(event).await {
            error!(
                %event_type,
                error = %err,
                "billing_webhook: event handling failed; acknowledged for manual follow-up"
            );
        }

        Ok(())
    }

    async fn dispatch(&self, event: BillingEvent) -> UseCaseResult<()> {
        match event {
            BillingEvent::ChargeSuccess(charge) => self.on_charge_success(charge).await,
            BillingEvent::InvoiceCreate(invoice) => self.on_invoice_create(invoice).await,
            BillingEvent::InvoicePaymentFailed(event) => {
                self.transition(&event, "invoice.payment_failed", |sub| {
                    (!sub.expired).then(|| (SubscriptionPatch::expired(), Some(NotificationKind::PaymentFailed)))
                })
                .await
            }
            BillingEvent::SubscriptionNotRenew(event) => {
                self.transition(&event, "subscription.not_renew", |sub| {
                    (!sub.cancelled).then(|| {
                        (
                            SubscriptionPatch {
                                active: Some(false),
                                cancelled: Some(true),
                                ..Default::default()
                            },
                            Some(NotificationKind::NotRenewing),
                        )
                    })
                })
                .await
            }
            BillingEvent::SubscriptionDisable(event) => {
                self.transition(&event, "subscription.disable", |sub| {
                    let already_disabled =
                        !sub.active && sub.payment_status() == PaymentStatus::Failed;
                    (!already_disabled).then(|| {
                        (
                            SubscriptionPatch {
                                active: Some(false),
                                status: Some(PaymentStatus::Failed),
                                ..Default::default()
                            },
                            Some(NotificationKind::Disabled),
                        )
                    })
                })
                .await
            }
            BillingEvent::SubscriptionEnable(event) => self.on_enable(event).await,
            BillingEvent::SubscriptionExpire(event) => {
                self.transition(&event, "subscription.expire", |sub| {
                    (!sub.expired).then(|| (SubscriptionPatch::expired(), Some(NotificationKind::Expired)))
                })
                .await
            }
            BillingEvent::SubscriptionCancel(event) => {
                self.transition(&event, "subscription.cancel", |sub| {
                    let patch = SubscriptionPatch {
                        cancel_at_period_end: (!sub.cancel_at_period_end).then_some(true),
                        next_payment_at: event.next_payment_at,
                        ..Default::default()
                    };
                    (!patch.is_empty()).then_some((patch, None))
                })
                .await
            }
            BillingEvent::Unhandled(event_type) => {
                info!(%event_type, "billing_webhook: event type not handled; acknowledged");
                Ok(())
            }
        }
    }

    async fn on_charge_success(&self, charge: ChargeSuccess) -> UseCaseResult<()> {
        let transaction_id = match charge.transaction_id {
            Some(id) => Some(id),
            None => match charge.reference.as_deref() {
                Some(reference) => self
                    .transaction_repo
                    .find_by_reference(reference)
                    .await
                    .map_err(SubscriptionError::Internal)?
                    .map(|transaction| transaction.id),
                None => None,
            },
        };

        let Some(transaction_id) = transaction_id else {
            info!(
                reference = ?charge.reference,
                "billing_webhook: charge without a local transaction (renewal); nothing to confirm"
            );
            return Ok(());
        };

        let outcome = self
            .payments
            .confirm(ConfirmedCharge {
                transaction_id,
                fee: charge.fee,
                customer: charge.customer_code.or(charge.customer_email),
                paid_at: charge.paid_at,
            })
            .await?;

        info!(%transaction_id, outcome = ?outcome, "billing_webhook: charge.success processed");
        Ok(())
    }

    async fn on_invoice_create(&self, invoice: InvoiceCreated) -> UseCaseResult<()> {
        let next_payment_at = invoice.subscription.next_payment_at;
        self.transition(&invoice.subscription, "invoice.create", |sub| {
            // A new invoice must not pull a closed instance back to pending.
            (!sub.is_terminal()).then(|| {
                (
                    SubscriptionPatch {
                        amount: invoice.amount,
                        status: Some(PaymentStatus::Pending),
                        next_payment_at,
                        ..Default::default()
                    },
                    None,
                )
            })
        })
        .await
    }

    async fn on_enable(&self, event: SubscriptionEventRef) -> UseCaseResult<()> {
        let Some(subscription) = self.find_subscription(&event, "subscription.enable").await?
        else {
            return Ok(());
        };
        let subscription_id = subscription.id;
        let user_id = subscription.user_id;

        if subscription.is_terminal() {
            error!(
                %user_id,
                %subscription_id,
                "billing_webhook: enable received for a closed subscription; ignoring"
            );
            return Ok(());
        }

        let other_live = self
            .subscription_repo
            .list_by_user(user_id)
            .await
            .map_err(SubscriptionError::Internal)?
            .into_iter()
            .any(|other| other.id != subscription_id && other.is_live());
        if other_live {
            error!(
                %user_id,
                %subscription_id,
                "billing_webhook: enable would create a second live subscription; ignoring"
            );
            return Ok(());
        }

        if subscription.is_live() && subscription.payment_status() == PaymentStatus::Success {
            return Ok(());
        }

        self.apply(
            &subscription,
            SubscriptionPatch {
                active: Some(true),
                status: Some(PaymentStatus::Success),
                ..Default::default()
            },
            Some(NotificationKind::Enabled),
            "subscription.enable",
        )
        .await
    }

    /// Looks up the subscription by provider code and applies whatever `decide`
    /// returns. `None` means the event is already reflected in the store.
    async fn transition<F>(
        &self,
        event: &SubscriptionEventRef,
        event_type: &'static str,
        decide: F,
    ) -> UseCaseResult<()>
    where
        F: FnOnce(&SubscriptionEntity) -> Option<(SubscriptionPatch, Option<NotificationKind>)>,
    {
        let Some(subscription) = self.find_subscription(event, event_type).await? else {
            return Ok(());
        };

        match decide(&subscription) {
            Some((patch, notification)) => {
                self.apply(&subscription, patch, notification, event_type)
                    .await
            }
            None => {
                info!(
                    subscription_id = %subscription.id,
                    %event_type,
                    "billing_webhook: event already applied; skipping"
                );
                Ok(())
            }
        }
    }

    async fn find_subscription(
        &self,
        event: &SubscriptionEventRef,
        event_type: &'static str,
    ) -> UseCaseResult<Option<SubscriptionEntity>> {
        let subscription = self
            .subscription_repo
            .find_by_code(&event.subscription_code)
            .await
            .map_err(SubscriptionError::Internal)?;

        if subscription.is_none() {
            warn!(
                subscription_code = %event.subscription_code,
                %event_type,
                "billing_webhook: event for unknown subscription; ignoring"
            );
        }
        Ok(subscription)
    }

    async fn apply(
        &self,
        subscription: &SubscriptionEntity,
        patch: SubscriptionPatch,
        notification: Option<NotificationKind>,
        event_type: &'static str,
    ) -> UseCaseResult<()> {
        let subscription_id = subscription.id;
        let user_id = subscription.user_id;

        self.subscription_repo
            .apply_patch(subscription_id, patch)
            .await
            .map_err(|err| {
                error!(%subscription_id, %event_type, db_error = ?err, "billing_webhook: failed to apply transition");
                SubscriptionError::Internal(err)
            })?;

        info!(%user_id, %subscription_id, %event_type, "billing_webhook: transition applied");

        if let Some(kind) = notification {
            notify_best_effort(
                self.notifier.as_ref(),
                SubscriptionNotification::new(
                    user_id,
                    subscription_id,
                    kind,
                    subscription.plan_name.clone(),
                ),
            )
            .await;
        }
        Ok(())
    }
}
