use std::sync::Arc;

use chrono::{DateTime, Utc};
use subscription_core::domain::{
    repositories::{
        app_users::UserRepository,
        notifications::{SubscriptionNotifier, notify_best_effort},
        subscriptions::SubscriptionRepository,
        transactions::TransactionRepository,
    },
    value_objects::{
        notifications::{NotificationKind, SubscriptionNotification},
        subscriptions::{PaymentConfirmation, SubscriptionPatch},
    },
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    billing_gateway::BillingGateway,
    prior_subscriptions::{cancel_all_prior, disable_at_provider},
    subscriptions::{SubscriptionError, UseCaseResult},
};

/// A successful charge reported by the provider, from a webhook or a callback verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedCharge {
    pub transaction_id: Uuid,
    pub fee: Option<i64>,
    /// Provider customer code, or the email the provider knows the customer by.
    pub customer: Option<String>,
    /// Settlement time reported by the provider; confirmation time when absent.
    pub paid_at: Option<DateTime<Utc>>,
}

/// Turns a confirmed payment into an active subscription, exactly once per transaction.
pub struct PaymentConfirmationUseCase<S, T, U, B, N>
where
    S: SubscriptionRepository + Send + Sync + 'static,
    T: TransactionRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    B: BillingGateway + 'static,
    N: SubscriptionNotifier + Send + Sync + 'static,
{
    subscription_repo: Arc<S>,
    transaction_repo: Arc<T>,
    user_repo: Arc<U>,
    billing: Arc<B>,
    notifier: Arc<N>,
}

impl<S, T, U, B, N> PaymentConfirmationUseCase<S, T, U, B, N>
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
        Self {
            subscription_repo,
            transaction_repo,
            user_repo,
            billing,
            notifier,
        }
    }

    pub async fn confirm(&self, charge: ConfirmedCharge) -> UseCaseResult<PaymentConfirmation> {
        let transaction_id = charge.transaction_id;

        let Some(transaction) = self
            .transaction_repo
            .find_by_id(transaction_id)
            .await
            .map_err(|err| {
                error!(%transaction_id, db_error = ?err, "payments: failed to load transaction");
                SubscriptionError::Internal(err)
            })?
        else {
            warn!(%transaction_id, "payments: charge references unknown transaction; ignoring");
            return Ok(PaymentConfirmation::UnknownTransaction);
        };

        let subscription_id = transaction.subscription_id;
        let Some(subscription) = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "payments: failed to load subscription");
                SubscriptionError::Internal(err)
            })?
        else {
            warn!(
                %transaction_id,
                %subscription_id,
                "payments: transaction links to unknown subscription; ignoring"
            );
            return Ok(PaymentConfirmation::UnknownSubscription);
        };

        if transaction.is_paid() && subscription.code.is_some() {
            info!(
                %transaction_id,
                %subscription_id,
                "payments: duplicate payment confirmation; refreshing fee only"
            );
            self.transaction_repo
                .update_fee(transaction_id, charge.fee)
                .await
                .map_err(SubscriptionError::Internal)?;
            return Ok(PaymentConfirmation::Duplicate);
        }

        let user_id = transaction.user_id;
        let paid_at = charge.paid_at.unwrap_or_else(Utc::now);

        if subscription.is_terminal() {
            // Superseded while the payment was in flight; keep the money trail only.
            self.transaction_repo
                .mark_paid(transaction_id, charge.fee, paid_at)
                .await
                .map_err(SubscriptionError::Internal)?;
            error!(
                %user_id,
                %transaction_id,
                %subscription_id,
                cancelled = subscription.cancelled,
                expired = subscription.expired,
                "payments: payment received for a superseded subscription; not activating, needs manual follow-up"
            );
            return Ok(PaymentConfirmation::Superseded);
        }

        match cancel_all_prior(
            self.subscription_repo.as_ref(),
            self.billing.as_ref(),
            user_id,
            Some(subscription_id),
        )
        .await
        {
            Ok(outcome) if !outcome.errors.is_empty() => warn!(
                %user_id,
                errors = ?outcome.errors,
                "payments: prior subscriptions cancelled with errors"
            ),
            Ok(_) => {}
            Err(err) => warn!(
                %user_id,
                db_error = ?err,
                "payments: could not enumerate prior subscriptions before activation"
            ),
        }

        let customer = match charge.customer.filter(|customer| !customer.is_empty()) {
            Some(customer) => customer,
            None => self.customer_email(user_id).await?,
        };

        let provider_subscription = self
            .billing
            .create_subscription(&customer, &transaction.plan_code)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %transaction_id,
                    %subscription_id,
                    plan_code = %transaction.plan_code,
                    error = %err,
                    "payments: provider subscription creation failed; subscription stays pending"
                );
                SubscriptionError::Provider(err)
            })?;

        let first_confirmation = self
            .transaction_repo
            .mark_paid(transaction_id, charge.fee, paid_at)
            .await
            .map_err(SubscriptionError::Internal)?;
        let code = provider_subscription.subscription_code;
        if !first_confirmation {
            // Another delivery claimed this payment; retire the subscription created here.
            warn!(
                %transaction_id,
                %subscription_id,
                subscription_code = %code,
                "payments: transaction was confirmed concurrently; disabling redundant provider subscription"
            );
            if let Err(err) = disable_at_provider(
                self.billing.as_ref(),
                &code,
                provider_subscription.email_token.as_deref(),
            )
            .await
            {
                error!(
                    %user_id,
                    %subscription_id,
                    subscription_code = %code,
                    error = %err,
                    "payments: failed to disable redundant provider subscription; needs manual follow-up"
                );
            }
            return Ok(PaymentConfirmation::Duplicate);
        }

        self.subscription_repo
            .apply_patch(
                subscription_id,
                SubscriptionPatch::activated(
                    code.clone(),
                    provider_subscription.email_token,
                    provider_subscription.next_payment_date,
                    Some(paid_at),
                ),
            )
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "payments: failed to activate subscription");
                SubscriptionError::Internal(err)
            })?;

        if let Err(err) = self
            .user_repo
            .set_subscription_ref(user_id, subscription_id)
            .await
        {
            warn!(%user_id, %subscription_id, db_error = ?err, "payments: failed to update user subscription reference");
        }

        info!(
            %user_id,
            %transaction_id,
            %subscription_id,
            subscription_code = %code,
            "payments: subscription activated"
        );

        notify_best_effort(
            self.notifier.as_ref(),
            SubscriptionNotification::new(
                user_id,
                subscription_id,
                NotificationKind::Activated,
                subscription.plan_name,
            ),
        )
        .await;

        Ok(PaymentConfirmation::Activated)
    }

    async fn customer_email(&self, user_id: Uuid) -> UseCaseResult<String> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(SubscriptionError::Internal)?
            .ok_or_else(|| {
                SubscriptionError::Internal(anyhow::anyhow!(
                    "user {user_id} for paid transaction does not exist"
                ))
            })?;
        Ok(user.email)
    }
}
