use anyhow::Result;
use subscription_core::{
    domain::{
        entities::subscriptions::SubscriptionEntity,
        repositories::subscriptions::SubscriptionRepository,
        value_objects::subscriptions::{RemoteCancellation, SubscriptionPatch},
    },
    payments::errors::BillingError,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::usecases::billing_gateway::BillingGateway;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CancelAllPriorOutcome {
    pub processed: usize,
    /// Non-fatal problems; the local cancellation was still attempted for every instance.
    pub errors: Vec<String>,
}

/// Disables a provider subscription. A missing or already inactive remote
/// subscription counts as cancelled.
pub async fn disable_at_provider<B>(
    billing: &B,
    code: &str,
    email_token: Option<&str>,
) -> Result<RemoteCancellation, BillingError>
where
    B: BillingGateway + ?Sized,
{
    let token = match email_token.filter(|token| !token.is_empty()) {
        Some(token) => token.to_string(),
        None => match billing.get_subscription_details(code).await {
            Ok(details) => details.email_token.ok_or_else(|| {
                BillingError::InvalidResponse(format!("subscription {code} has no email token"))
            })?,
            Err(err) if err.is_not_found_or_inactive() => {
                return Ok(RemoteCancellation::AlreadyInactive);
            }
            Err(err) => return Err(err),
        },
    };

    match billing.cancel_subscription(code, &token).await {
        Ok(()) => Ok(RemoteCancellation::Confirmed),
        Err(err) if err.is_not_found_or_inactive() => Ok(RemoteCancellation::AlreadyInactive),
        Err(err) => Err(err),
    }
}

/// Moves every earlier instance of the user out of the active set, remotely
/// where possible and locally in every case. `keep` is left untouched.
pub async fn cancel_all_prior<S, B>(
    subscriptions: &S,
    billing: &B,
    user_id: Uuid,
    keep: Option<Uuid>,
) -> Result<CancelAllPriorOutcome>
where
    S: SubscriptionRepository + ?Sized + Sync,
    B: BillingGateway + ?Sized,
{
    let candidates: Vec<SubscriptionEntity> = subscriptions
        .list_by_user(user_id)
        .await?
        .into_iter()
        .filter(|subscription| !subscription.cancelled && Some(subscription.id) != keep)
        .collect();

    let mut outcome = CancelAllPriorOutcome::default();

    for subscription in candidates {
        outcome.processed += 1;

        if let Some(code) = subscription.code.as_deref() {
            if let Err(err) =
                disable_at_provider(billing, code, subscription.email_token.as_deref()).await
            {
                warn!(
                    %user_id,
                    subscription_id = %subscription.id,
                    error = %err,
                    "subscriptions: provider cancellation of prior subscription failed; cancelling locally"
                );
                outcome
                    .errors
                    .push(format!("subscription {}: {err}", subscription.id));
            }
        }

        if let Err(err) = subscriptions
            .apply_patch(subscription.id, SubscriptionPatch::cancelled())
            .await
        {
            warn!(
                %user_id,
                subscription_id = %subscription.id,
                db_error = ?err,
                "subscriptions: failed to cancel prior subscription locally"
            );
            outcome
                .errors
                .push(format!("subscription {}: local cancel failed: {err}", subscription.id));
        }
    }

    if outcome.processed > 0 {
        info!(
            %user_id,
            processed = outcome.processed,
            error_count = outcome.errors.len(),
            "subscriptions: prior subscriptions cancelled"
        );
    }

    Ok(outcome)
}
