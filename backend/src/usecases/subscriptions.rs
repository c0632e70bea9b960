use std::sync::Arc;

use subscription_core::{
    domain::{
        entities::subscriptions::SubscriptionEntity,
        repositories::{
            app_users::UserRepository,
            notifications::{SubscriptionNotifier, notify_best_effort},
            subscriptions::SubscriptionRepository,
            transactions::TransactionRepository,
        },
        value_objects::{
            enums::user_roles::UserRole,
            notifications::{NotificationKind, SubscriptionNotification},
            plans::{PlanCatalogError, PlanDetails, resolve_provider_plan},
            subscriptions::{
                CancellationDto, CheckoutSessionDto, NewPendingCheckout, PaymentCallbackDto,
                PaymentConfirmation, PlanDto, RemoteCancellation, SubscriberContext,
                SubscriptionPatch, SubscriptionStatusDto,
            },
        },
    },
    payments::{
        errors::BillingError,
        models::{InitializeTransaction, ProviderPlan, TransactionMetadata},
    },
};
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;
use uuid::Uuid;

use crate::usecases::{
    billing_gateway::BillingGateway,
    payment_confirmation::{ConfirmedCharge, PaymentConfirmationUseCase},
    prior_subscriptions::{cancel_all_prior, disable_at_provider},
};

#[derive(Debug, Error)]
pub enum SubscriptionError {
    #[error("plan not found")]
    PlanNotFound,
    #[error("plan is not suitable for your account type")]
    PlanNotSuitable,
    #[error("already subscribed to this plan")]
    AlreadySubscribed,
    #[error("plan_id is required")]
    MissingPlanId,
    #[error("no subscription found")]
    NoSubscription,
    #[error("subscription is not cancelled")]
    NotCancelled,
    #[error("no active subscription to upgrade")]
    NoActiveSubscription,
    #[error("invalid webhook signature")]
    InvalidSignature,
    #[error("billing provider error: {0}")]
    Provider(#[from] BillingError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl SubscriptionError {
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;
        match self {
            SubscriptionError::PlanNotFound
            | SubscriptionError::NoSubscription
            | SubscriptionError::NoActiveSubscription => StatusCode::NOT_FOUND,
            SubscriptionError::PlanNotSuitable => StatusCode::FORBIDDEN,
            SubscriptionError::AlreadySubscribed | SubscriptionError::NotCancelled => {
                StatusCode::CONFLICT
            }
            SubscriptionError::MissingPlanId => StatusCode::BAD_REQUEST,
            SubscriptionError::InvalidSignature => StatusCode::UNAUTHORIZED,
            SubscriptionError::Provider(_) => StatusCode::BAD_GATEWAY,
            SubscriptionError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

pub type UseCaseResult<T> = std::result::Result<T, SubscriptionError>;

impl From<PlanCatalogError> for SubscriptionError {
    fn from(value: PlanCatalogError) -> Self {
        match value {
            PlanCatalogError::RoleMismatch { .. } => SubscriptionError::PlanNotSuitable,
            _ => SubscriptionError::PlanNotFound,
        }
    }
}

pub struct SubscriptionUseCase<S, T, U, B, N>
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
    payments: PaymentConfirmationUseCase<S, T, U, B, N>,
    callback_base_url: Url,
}

impl<S, T, U, B, N> SubscriptionUseCase<S, T, U, B, N>
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
        callback_base_url: Url,
    ) -> Self {
        let payments = PaymentConfirmationUseCase::new(
            Arc::clone(&subscription_repo),
            Arc::clone(&transaction_repo),
            Arc::clone(&user_repo),
            Arc::clone(&billing),
            Arc::clone(&notifier),
        );
        Self {
            subscription_repo,
            transaction_repo,
            user_repo,
            billing,
            notifier,
            payments,
            callback_base_url,
        }
    }

    pub async fn list_plans(&self, role: UserRole) -> UseCaseResult<Vec<PlanDto>> {
        let plans = self.billing.list_plans().await.map_err(|err| {
            error!(%role, error = %err, "subscriptions: failed to list provider plans");
            SubscriptionError::Provider(err)
        })?;

        let offered: Vec<PlanDto> = plans
            .into_iter()
            .filter_map(|plan| {
                let details = resolve_provider_plan(role, &plan.name).ok()?;
                Some(PlanDto::new(
                    plan.plan_code,
                    plan.name,
                    plan.amount,
                    plan.interval,
                    details,
                ))
            })
            .collect();

        info!(%role, plan_count = offered.len(), "subscriptions: plans listed");
        Ok(offered)
    }

    /// The user's live subscription, if the stored reference still points at one.
    pub async fn current_subscription(
        &self,
        user_id: Uuid,
    ) -> UseCaseResult<Option<SubscriptionStatusDto>> {
        let Some(subscription) = self.referenced_subscription(user_id).await? else {
            return Ok(None);
        };

        if !subscription.is_live() {
            info!(
                %user_id,
                subscription_id = %subscription.id,
                "subscriptions: user reference points at a non-live subscription"
            );
            return Ok(None);
        }

        Ok(Some(SubscriptionStatusDto::from(&subscription)))
    }

    pub async fn subscribe(
        &self,
        subscriber: &SubscriberContext,
        plan_id: Option<&str>,
    ) -> UseCaseResult<CheckoutSessionDto> {
        let plan_id = required_plan_id(plan_id)?;
        let user_id = subscriber.user_id;
        info!(%user_id, %plan_id, role = %subscriber.role, "subscriptions: subscribe requested");

        let (plan, details) = self.resolve_plan(subscriber.role, plan_id).await?;
        self.start_checkout(subscriber, plan, details).await
    }

    pub async fn upgrade(
        &self,
        subscriber: &SubscriberContext,
        plan_id: Option<&str>,
    ) -> UseCaseResult<CheckoutSessionDto> {
        let plan_id = required_plan_id(plan_id)?;
        let user_id = subscriber.user_id;
        info!(%user_id, %plan_id, "subscriptions: upgrade requested");

        let subscriptions = self.list_user_subscriptions(user_id).await?;
        let Some(current) = subscriptions.iter().find(|sub| !sub.is_terminal()) else {
            warn!(%user_id, "subscriptions: upgrade without a current subscription");
            return Err(SubscriptionError::NoActiveSubscription);
        };

        if current.is_live() && current.plan_code == plan_id {
            return Err(SubscriptionError::AlreadySubscribed);
        }

        let (plan, details) = self.resolve_plan(subscriber.role, plan_id).await?;
        self.start_checkout(subscriber, plan, details).await
    }

    pub async fn cancel(&self, user_id: Uuid) -> UseCaseResult<CancellationDto> {
        let subscriptions = self.list_user_subscriptions(user_id).await?;
        // A repeated cancel lands on the instance the first one closed.
        let Some(subscription) = subscriptions
            .iter()
            .find(|sub| !sub.is_terminal() && sub.code.is_some())
            .or_else(|| {
                subscriptions
                    .iter()
                    .find(|sub| sub.cancelled && sub.code.is_some())
            })
            .cloned()
        else {
            return Err(SubscriptionError::NoSubscription);
        };
        let subscription_id = subscription.id;
        let already_cancelled = subscription.cancelled;

        let remote = match subscription.code.as_deref() {
            Some(code) => {
                match disable_at_provider(
                    self.billing.as_ref(),
                    code,
                    subscription.email_token.as_deref(),
                )
                .await
                {
                    Ok(remote) => remote,
                    Err(err) => {
                        warn!(
                            %user_id,
                            %subscription_id,
                            error = %err,
                            "subscriptions: provider cancellation failed; cancelling locally"
                        );
                        RemoteCancellation::Unconfirmed(err.to_string())
                    }
                }
            }
            None => RemoteCancellation::Unconfirmed("no provider subscription code".to_string()),
        };

        self.subscription_repo
            .apply_patch(subscription_id, SubscriptionPatch::cancelled())
            .await
            .map_err(|err| {
                error!(%subscription_id, db_error = ?err, "subscriptions: failed to cancel locally");
                SubscriptionError::Internal(err)
            })?;

        info!(%user_id, %subscription_id, remote = ?remote, "subscriptions: subscription cancelled");

        if !already_cancelled {
            notify_best_effort(
                self.notifier.as_ref(),
                SubscriptionNotification::new(
                    user_id,
                    subscription_id,
                    NotificationKind::Cancelled,
                    subscription.plan_name.clone(),
                ),
            )
            .await;
        }

        let cancelled = self.reload(subscription_id).await?;
        Ok(CancellationDto {
            subscription: SubscriptionStatusDto::from(&cancelled),
            remote,
        })
    }

    pub async fn reactivate(
        &self,
        subscriber: &SubscriberContext,
    ) -> UseCaseResult<SubscriptionStatusDto> {
        let user_id = subscriber.user_id;
        let Some(target) = self.referenced_subscription(user_id).await? else {
            return Err(SubscriptionError::NoSubscription);
        };
        if !target.cancelled {
            return Err(SubscriptionError::NotCancelled);
        }
        let subscription_id = target.id;
        info!(%user_id, %subscription_id, "subscriptions: reactivation requested");

        self.cancel_prior(user_id, Some(subscription_id)).await;

        let (plan, _details) = self.resolve_plan(subscriber.role, &target.plan_code).await?;

        let customer = self
            .billing
            .create_customer(&subscriber.email)
            .await
            .map_err(|err| {
                error!(%user_id, error = %err, "subscriptions: provider customer lookup failed");
                SubscriptionError::Provider(err)
            })?;

        let remote = self
            .billing
            .create_subscription(&customer.customer_code, &plan.plan_code)
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %subscription_id,
                    error = %err,
                    "subscriptions: provider refused reactivation"
                );
                SubscriptionError::Provider(err)
            })?;

        self.subscription_repo
            .apply_patch(
                subscription_id,
                SubscriptionPatch::reactivated(
                    remote.subscription_code,
                    remote.email_token,
                    remote.next_payment_date,
                ),
            )
            .await
            .map_err(SubscriptionError::Internal)?;

        self.point_user_at(user_id, subscription_id).await;

        notify_best_effort(
            self.notifier.as_ref(),
            SubscriptionNotification::new(
                user_id,
                subscription_id,
                NotificationKind::Reactivated,
                target.plan_name.clone(),
            ),
        )
        .await;

        info!(%user_id, %subscription_id, "subscriptions: subscription reactivated");
        let reactivated = self.reload(subscription_id).await?;
        Ok(SubscriptionStatusDto::from(&reactivated))
    }

    /// Confirms a checkout when the payer returns from the hosted payment page.
    pub async fn verify_callback(
        &self,
        subscription_id: Uuid,
        reference: &str,
    ) -> UseCaseResult<PaymentCallbackDto> {
        let verified = self
            .billing
            .verify_transaction(reference)
            .await
            .map_err(|err| {
                warn!(%subscription_id, %reference, error = %err, "subscriptions: transaction verification failed");
                SubscriptionError::Provider(err)
            })?;

        if !verified.is_success() {
            info!(
                %subscription_id,
                %reference,
                status = %verified.status,
                "subscriptions: callback for an unpaid transaction"
            );
            return Ok(PaymentCallbackDto {
                outcome: PaymentConfirmation::NotPaid(verified.status),
                subscription: None,
            });
        }

        let transaction = self
            .transaction_repo
            .find_by_reference(&verified.reference)
            .await
            .map_err(SubscriptionError::Internal)?
            .filter(|transaction| transaction.subscription_id == subscription_id);

        let Some(transaction) = transaction else {
            warn!(
                %subscription_id,
                %reference,
                "subscriptions: callback reference does not match the subscription"
            );
            return Ok(PaymentCallbackDto {
                outcome: PaymentConfirmation::UnknownTransaction,
                subscription: None,
            });
        };

        let outcome = self
            .payments
            .confirm(ConfirmedCharge {
                transaction_id: transaction.id,
                fee: verified.fees,
                customer: verified.customer.map(|customer| customer.customer_code),
                paid_at: verified.paid_at,
            })
            .await?;

        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(SubscriptionError::Internal)?;

        Ok(PaymentCallbackDto {
            outcome,
            subscription: subscription.as_ref().map(SubscriptionStatusDto::from),
        })
    }

    /// Pulls the provider's view of one subscription. Only ever deactivates.
    pub async fn sync_subscription(
        &self,
        subscription_id: Uuid,
    ) -> UseCaseResult<SubscriptionStatusDto> {
        let subscription = self
            .subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(SubscriptionError::Internal)?
            .ok_or(SubscriptionError::NoSubscription)?;

        let Some(code) = subscription.code.as_deref() else {
            return Ok(SubscriptionStatusDto::from(&subscription));
        };

        let patch = match self.billing.get_subscription_details(code).await {
            Ok(remote) if remote.is_ended() => ended_patch(&subscription),
            Ok(remote) => SubscriptionPatch {
                next_payment_at: remote.next_payment_date,
                cancel_at_period_end: remote
                    .is_non_renewing()
                    .then_some(true)
                    .filter(|_| !subscription.cancel_at_period_end),
                ..Default::default()
            },
            Err(err) if err.is_not_found_or_inactive() => ended_patch(&subscription),
            Err(err) => {
                warn!(%subscription_id, error = %err, "subscriptions: sync could not reach provider");
                return Err(SubscriptionError::Provider(err));
            }
        };

        if patch.is_empty() {
            return Ok(SubscriptionStatusDto::from(&subscription));
        }

        self.subscription_repo
            .apply_patch(subscription_id, patch)
            .await
            .map_err(SubscriptionError::Internal)?;
        info!(%subscription_id, "subscriptions: synced with provider");

        let synced = self.reload(subscription_id).await?;
        Ok(SubscriptionStatusDto::from(&synced))
    }

    async fn resolve_plan(
        &self,
        role: UserRole,
        plan_code: &str,
    ) -> UseCaseResult<(ProviderPlan, &'static PlanDetails)> {
        let plan = match self.billing.get_plan(plan_code).await {
            Ok(plan) => plan,
            Err(err) if err.is_not_found_or_inactive() => {
                return Err(SubscriptionError::PlanNotFound);
            }
            Err(err) => {
                error!(%plan_code, error = %err, "subscriptions: failed to fetch plan");
                return Err(SubscriptionError::Provider(err));
            }
        };

        let details = resolve_provider_plan(role, &plan.name).map_err(|err| {
            warn!(%plan_code, %role, reason = %err, "subscriptions: plan rejected for caller");
            SubscriptionError::from(err)
        })?;

        Ok((plan, details))
    }

    async fn start_checkout(
        &self,
        subscriber: &SubscriberContext,
        plan: ProviderPlan,
        details: &'static PlanDetails,
    ) -> UseCaseResult<CheckoutSessionDto> {
        let user_id = subscriber.user_id;

        self.cancel_prior(user_id, None).await;

        if self
            .subscription_repo
            .find_live_by_user_and_plan(user_id, &plan.plan_code)
            .await
            .map_err(SubscriptionError::Internal)?
            .is_some()
        {
            warn!(%user_id, plan_code = %plan.plan_code, "subscriptions: live subscription survived prior cancellation");
            return Err(SubscriptionError::AlreadySubscribed);
        }

        let pending = self
            .subscription_repo
            .create_pending_with_transaction(NewPendingCheckout {
                user_id,
                plan_code: plan.plan_code.clone(),
                plan_name: details.display_name.to_string(),
                amount: plan.amount,
            })
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to create pending checkout");
                SubscriptionError::Internal(err)
            })?;
        let subscription_id = pending.subscription.id;
        let transaction_id = pending.transaction.id;

        self.point_user_at(user_id, subscription_id).await;

        let initialized = self
            .billing
            .initialize_transaction(InitializeTransaction {
                email: subscriber.email.clone(),
                amount: pending.transaction.amount,
                callback_url: self.callback_url(subscription_id)?,
                metadata: TransactionMetadata {
                    transaction_id,
                    user_id,
                    plan_code: plan.plan_code.clone(),
                },
            })
            .await
            .map_err(|err| {
                error!(
                    %user_id,
                    %subscription_id,
                    error = %err,
                    "subscriptions: payment initialization failed; subscription left pending"
                );
                SubscriptionError::Provider(err)
            })?;

        self.transaction_repo
            .set_reference(transaction_id, &initialized.reference)
            .await
            .map_err(SubscriptionError::Internal)?;

        info!(
            %user_id,
            %subscription_id,
            %transaction_id,
            plan_code = %plan.plan_code,
            "subscriptions: checkout started"
        );

        Ok(CheckoutSessionDto {
            subscription_id,
            transaction_id,
            authorization_url: initialized.authorization_url,
            reference: initialized.reference,
        })
    }

    fn callback_url(&self, subscription_id: Uuid) -> UseCaseResult<String> {
        let mut url = self.callback_base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                SubscriptionError::Internal(anyhow::anyhow!("callback base url cannot be a base"))
            })?
            .pop_if_empty()
            .extend(["api", "v1", "subscriptions", "callback"]);
        url.query_pairs_mut()
            .append_pair("subscription_id", &subscription_id.to_string());
        Ok(url.to_string())
    }

    async fn cancel_prior(&self, user_id: Uuid, keep: Option<Uuid>) {
        match cancel_all_prior(
            self.subscription_repo.as_ref(),
            self.billing.as_ref(),
            user_id,
            keep,
        )
        .await
        {
            Ok(outcome) if !outcome.errors.is_empty() => warn!(
                %user_id,
                errors = ?outcome.errors,
                "subscriptions: prior subscriptions cancelled with errors"
            ),
            Ok(_) => {}
            Err(err) => warn!(
                %user_id,
                db_error = ?err,
                "subscriptions: could not enumerate prior subscriptions"
            ),
        }
    }

    async fn point_user_at(&self, user_id: Uuid, subscription_id: Uuid) {
        if let Err(err) = self
            .user_repo
            .set_subscription_ref(user_id, subscription_id)
            .await
        {
            warn!(%user_id, %subscription_id, db_error = ?err, "subscriptions: failed to update user subscription reference");
        }
    }

    async fn referenced_subscription(
        &self,
        user_id: Uuid,
    ) -> UseCaseResult<Option<SubscriptionEntity>> {
        let user = self
            .user_repo
            .find_by_id(user_id)
            .await
            .map_err(SubscriptionError::Internal)?;
        let Some(subscription_id) = user.and_then(|user| user.subscription_id) else {
            return Ok(None);
        };

        self.subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(SubscriptionError::Internal)
    }

    async fn list_user_subscriptions(
        &self,
        user_id: Uuid,
    ) -> UseCaseResult<Vec<SubscriptionEntity>> {
        self.subscription_repo
            .list_by_user(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "subscriptions: failed to list subscriptions");
                SubscriptionError::Internal(err)
            })
    }

    async fn reload(&self, subscription_id: Uuid) -> UseCaseResult<SubscriptionEntity> {
        self.subscription_repo
            .find_by_id(subscription_id)
            .await
            .map_err(SubscriptionError::Internal)?
            .ok_or_else(|| {
                SubscriptionError::Internal(anyhow::anyhow!(
                    "subscription {subscription_id} disappeared after update"
                ))
            })
    }
}

fn required_plan_id(plan_id: Option<&str>) -> UseCaseResult<&str> {
    plan_id
        .map(str::trim)
        .filter(|plan_id| !plan_id.is_empty())
        .ok_or(SubscriptionError::MissingPlanId)
}

fn ended_patch(subscription: &SubscriptionEntity) -> SubscriptionPatch {
    if subscription.is_terminal() {
        SubscriptionPatch::default()
    } else {
        SubscriptionPatch::cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::billing_gateway::MockBillingGateway;
    use chrono::Utc;
    use mockall::predicate::eq;
    use subscription_core::{
        domain::{
            entities::{
                app_users::AppUserEntity, subscriptions::SubscriptionEntity,
                transactions::TransactionEntity,
            },
            repositories::{
                app_users::MockUserRepository, notifications::MockSubscriptionNotifier,
                subscriptions::MockSubscriptionRepository,
                transactions::MockTransactionRepository,
            },
            value_objects::subscriptions::PendingCheckout,
        },
        payments::models::{InitializedTransaction, ProviderCustomer, ProviderSubscription},
    };

    type TestUseCase = SubscriptionUseCase<
        MockSubscriptionRepository,
        MockTransactionRepository,
        MockUserRepository,
        MockBillingGateway,
        MockSubscriptionNotifier,
    >;

    fn usecase(
        subscriptions: MockSubscriptionRepository,
        transactions: MockTransactionRepository,
        users: MockUserRepository,
        billing: MockBillingGateway,
        notifier: MockSubscriptionNotifier,
    ) -> TestUseCase {
        SubscriptionUseCase::new(
            Arc::new(subscriptions),
            Arc::new(transactions),
            Arc::new(users),
            Arc::new(billing),
            Arc::new(notifier),
            Url::parse("https://shop.example.test").unwrap(),
        )
    }

    fn vendor() -> SubscriberContext {
        SubscriberContext {
            user_id: Uuid::new_v4(),
            email: "vendor@example.test".to_string(),
            role: UserRole::Vendor,
        }
    }

    fn provider_plan(name: &str) -> ProviderPlan {
        ProviderPlan {
            plan_code: "PLN_pro".to_string(),
            name: name.to_string(),
            amount: 500000,
            interval: Some("monthly".to_string()),
            currency: Some("NGN".to_string()),
        }
    }

    fn subscription(user_id: Uuid) -> SubscriptionEntity {
        let now = Utc::now();
        SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id,
            plan_code: "PLN_pro".to_string(),
            plan_name: "Vendor Pro".to_string(),
            amount: 500000,
            active: true,
            cancelled: false,
            expired: false,
            status: "success".to_string(),
            code: Some("SUB_1".to_string()),
            email_token: Some("tok_1".to_string()),
            next_payment_at: None,
            paid_at: Some(now),
            cancel_at_period_end: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn user(user_id: Uuid, subscription_id: Option<Uuid>) -> AppUserEntity {
        let now = Utc::now();
        AppUserEntity {
            id: user_id,
            email: "vendor@example.test".to_string(),
            role: "vendor".to_string(),
            subscription_id,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn list_plans_keeps_only_plans_for_caller_role() {
        let mut billing = MockBillingGateway::new();
        billing.expect_list_plans().returning(|| {
            Ok(vec![
                provider_plan("vendor@vendor pro"),
                provider_plan("customer@customer plus"),
                provider_plan("legacy plan"),
            ])
        });

        let plans = usecase(
            MockSubscriptionRepository::new(),
            MockTransactionRepository::new(),
            MockUserRepository::new(),
            billing,
            MockSubscriptionNotifier::new(),
        )
        .list_plans(UserRole::Vendor)
        .await
        .unwrap();

        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].display_name, "Vendor Pro");
    }

    #[tokio::test]
    async fn subscribe_rejects_plan_for_other_role() {
        let mut billing = MockBillingGateway::new();
        billing
            .expect_get_plan()
            .returning(|_| Ok(provider_plan("customer@customer plus")));
        billing.expect_initialize_transaction().never();

        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions.expect_create_pending_with_transaction().never();

        let err = usecase(
            subscriptions,
            MockTransactionRepository::new(),
            MockUserRepository::new(),
            billing,
            MockSubscriptionNotifier::new(),
        )
        .subscribe(&vendor(), Some("PLN_plus"))
        .await
        .unwrap_err();

        assert!(matches!(err, SubscriptionError::PlanNotSuitable));
        assert_eq!(err.status_code(), axum::http::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn subscribe_without_plan_id_is_bad_request() {
        let err = usecase(
            MockSubscriptionRepository::new(),
            MockTransactionRepository::new(),
            MockUserRepository::new(),
            MockBillingGateway::new(),
            MockSubscriptionNotifier::new(),
        )
        .subscribe(&vendor(), Some("  "))
        .await
        .unwrap_err();

        assert!(matches!(err, SubscriptionError::MissingPlanId));
    }

    #[tokio::test]
    async fn subscribe_creates_pending_pair_and_returns_payment_url() {
        let subscriber = vendor();
        let user_id = subscriber.user_id;
        let pending_subscription = {
            let mut sub = subscription(user_id);
            sub.active = false;
            sub.status = "pending".to_string();
            sub.code = None;
            sub.email_token = None;
            sub
        };
        let subscription_id = pending_subscription.id;
        let transaction = TransactionEntity {
            id: Uuid::new_v4(),
            user_id,
            subscription_id,
            plan_code: "PLN_pro".to_string(),
            amount: 500000,
            fee: None,
            status: "pending".to_string(),
            reference: None,
            paid_at: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let transaction_id = transaction.id;

        let mut billing = MockBillingGateway::new();
        billing
            .expect_get_plan()
            .withf(|code| code.to_string() == "PLN_pro")
            .returning(|_| Ok(provider_plan("vendor@vendor pro")));
        billing
            .expect_initialize_transaction()
            .withf(move |request| {
                request.amount == 500000
                    && request.metadata.transaction_id == transaction_id
                    && request.callback_url
                        == format!(
                            "https://shop.example.test/api/v1/subscriptions/callback?subscription_id={subscription_id}"
                        )
            })
            .times(1)
            .returning(|_| {
                Ok(InitializedTransaction {
                    authorization_url: "https://checkout.example.test/abc".to_string(),
                    access_code: None,
                    reference: "ref_abc".to_string(),
                })
            });

        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_list_by_user()
            .with(eq(user_id))
            .returning(|_| Ok(vec![]));
        subscriptions
            .expect_find_live_by_user_and_plan()
            .returning(|_, _| Ok(None));
        subscriptions
            .expect_create_pending_with_transaction()
            .withf(|checkout| checkout.plan_name == "Vendor Pro" && checkout.amount == 500000)
            .times(1)
            .return_once(move |_| {
                Ok(PendingCheckout {
                    subscription: pending_subscription,
                    transaction,
                })
            });

        let mut users = MockUserRepository::new();
        users
            .expect_set_subscription_ref()
            .with(eq(user_id), eq(subscription_id))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut transactions = MockTransactionRepository::new();
        transactions
            .expect_set_reference()
            .withf(move |id, reference| *id == transaction_id && reference.to_string() == "ref_abc")
            .times(1)
            .returning(|_, _| Ok(()));

        let session = usecase(
            subscriptions,
            transactions,
            users,
            billing,
            MockSubscriptionNotifier::new(),
        )
        .subscribe(&subscriber, Some("PLN_pro"))
        .await
        .unwrap();

        assert_eq!(session.subscription_id, subscription_id);
        assert_eq!(session.authorization_url, "https://checkout.example.test/abc");
    }

    #[tokio::test]
    async fn cancel_writes_locally_when_provider_is_down() {
        let user_id = Uuid::new_v4();
        let active = subscription(user_id);
        let subscription_id = active.id;
        let mut cancelled = active.clone();
        cancelled.active = false;
        cancelled.cancelled = true;
        cancelled.status = "failed".to_string();

        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_list_by_user()
            .return_once(move |_| Ok(vec![active]));
        subscriptions
            .expect_apply_patch()
            .withf(move |id, patch| *id == subscription_id && *patch == SubscriptionPatch::cancelled())
            .times(1)
            .returning(|_, _| Ok(()));
        subscriptions
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(cancelled)));

        let mut billing = MockBillingGateway::new();
        billing
            .expect_cancel_subscription()
            .returning(|_, _| Err(BillingError::Transport("connection refused".to_string())));

        let mut notifier = MockSubscriptionNotifier::new();
        notifier
            .expect_notify()
            .withf(|n| n.kind == NotificationKind::Cancelled)
            .times(1)
            .returning(|_| Ok(()));

        let result = usecase(
            subscriptions,
            MockTransactionRepository::new(),
            MockUserRepository::new(),
            billing,
            notifier,
        )
        .cancel(user_id)
        .await
        .unwrap();

        assert!(result.subscription.cancelled);
        assert!(!result.subscription.active);
        assert!(matches!(result.remote, RemoteCancellation::Unconfirmed(_)));
    }

    #[tokio::test]
    async fn cancel_without_provider_code_is_not_found() {
        let user_id = Uuid::new_v4();
        let mut pending = subscription(user_id);
        pending.code = None;

        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_list_by_user()
            .return_once(move |_| Ok(vec![pending]));
        subscriptions.expect_apply_patch().never();

        let err = usecase(
            subscriptions,
            MockTransactionRepository::new(),
            MockUserRepository::new(),
            MockBillingGateway::new(),
            MockSubscriptionNotifier::new(),
        )
        .cancel(user_id)
        .await
        .unwrap_err();

        assert!(matches!(err, SubscriptionError::NoSubscription));
    }

    #[tokio::test]
    async fn reactivate_requires_cancelled_subscription() {
        let subscriber = vendor();
        let live = subscription(subscriber.user_id);
        let subscription_id = live.id;

        let mut users = MockUserRepository::new();
        let user_id = subscriber.user_id;
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user(user_id, Some(subscription_id)))));

        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(live)));

        let err = usecase(
            subscriptions,
            MockTransactionRepository::new(),
            users,
            MockBillingGateway::new(),
            MockSubscriptionNotifier::new(),
        )
        .reactivate(&subscriber)
        .await
        .unwrap_err();

        assert!(matches!(err, SubscriptionError::NotCancelled));
    }

    #[tokio::test]
    async fn reactivate_restores_cancelled_subscription_with_new_code() {
        let subscriber = vendor();
        let user_id = subscriber.user_id;
        let mut target = subscription(user_id);
        target.active = false;
        target.cancelled = true;
        target.status = "failed".to_string();
        let subscription_id = target.id;
        let mut restored = target.clone();
        restored.active = true;
        restored.cancelled = false;
        restored.status = "success".to_string();
        restored.code = Some("SUB_new".to_string());

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user(user_id, Some(subscription_id)))));
        users
            .expect_set_subscription_ref()
            .returning(|_, _| Ok(()));

        let mut subscriptions = MockSubscriptionRepository::new();
        let listed = target.clone();
        let mut lookups = vec![restored, target];
        subscriptions
            .expect_find_by_id()
            .times(2)
            .returning(move |_| Ok(lookups.pop()));
        subscriptions
            .expect_list_by_user()
            .return_once(move |_| Ok(vec![listed]));
        subscriptions
            .expect_apply_patch()
            .withf(move |id, patch| {
                *id == subscription_id
                    && patch.cancelled == Some(false)
                    && patch.code.as_deref() == Some("SUB_new")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut billing = MockBillingGateway::new();
        billing
            .expect_get_plan()
            .returning(|_| Ok(provider_plan("vendor@vendor pro")));
        billing.expect_create_customer().returning(|email| {
            Ok(ProviderCustomer {
                customer_code: "CUS_1".to_string(),
                email: Some(email.to_string()),
            })
        });
        billing
            .expect_create_subscription()
            .withf(|customer, plan| customer.to_string() == "CUS_1" && plan.to_string() == "PLN_pro")
            .returning(|_, _| {
                Ok(ProviderSubscription {
                    subscription_code: "SUB_new".to_string(),
                    email_token: Some("tok_new".to_string()),
                    status: Some("active".to_string()),
                    next_payment_date: None,
                })
            });

        let mut notifier = MockSubscriptionNotifier::new();
        notifier
            .expect_notify()
            .withf(|n| n.kind == NotificationKind::Reactivated)
            .times(1)
            .returning(|_| Ok(()));

        let status = usecase(
            subscriptions,
            MockTransactionRepository::new(),
            users,
            billing,
            notifier,
        )
        .reactivate(&subscriber)
        .await
        .unwrap();

        assert!(status.active);
        assert!(!status.cancelled);
    }

    #[tokio::test]
    async fn current_subscription_ignores_stale_reference() {
        let user_id = Uuid::new_v4();
        let mut expired = subscription(user_id);
        expired.active = false;
        expired.expired = true;
        let subscription_id = expired.id;

        let mut users = MockUserRepository::new();
        users
            .expect_find_by_id()
            .returning(move |_| Ok(Some(user(user_id, Some(subscription_id)))));

        let mut subscriptions = MockSubscriptionRepository::new();
        subscriptions
            .expect_find_by_id()
            .return_once(move |_| Ok(Some(expired)));

        let current = usecase(
            subscriptions,
            MockTransactionRepository::new(),
            users,
            MockBillingGateway::new(),
            MockSubscriptionNotifier::new(),
        )
        .current_subscription(user_id)
        .await
        .unwrap();

        assert!(current.is_none());
    }

    #[tokio::test]
    async fn sync_cancels_locally_when_provider_reports_completed() {
        let user_id = Uuid::new_v4();
        let live = subscription(user_id);
        let subscription_id = live.id;
        let mut synced = live.clone();
        synced.active = false;
        synced.cancelled = true;

        let mut subscriptions = MockSubscriptionRepository::new();
        let mut lookups = vec![synced, live];
        subscriptions
            .expect_find_by_id()
            .returning(move |_| Ok(lookups.pop()));
        subscriptions
            .expect_apply_patch()
            .with(eq(subscription_id), eq(SubscriptionPatch::cancelled()))
            .times(1)
            .returning(|_, _| Ok(()));

        let mut billing = MockBillingGateway::new();
        billing.expect_get_subscription_details().returning(|code| {
            Ok(ProviderSubscription {
                subscription_code: code.to_string(),
                email_token: None,
                status: Some("complete".to_string()),
                next_payment_date: None,
            })
        });

        let status = usecase(
            subscriptions,
            MockTransactionRepository::new(),
            MockUserRepository::new(),
            billing,
            MockSubscriptionNotifier::new(),
        )
        .sync_subscription(subscription_id)
        .await
        .unwrap();

        assert!(status.cancelled);
        assert!(!status.active);
    }
}
