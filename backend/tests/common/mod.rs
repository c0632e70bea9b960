#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use backend::usecases::{
    billing_gateway::BillingGateway, billing_webhook::BillingWebhookUseCase,
    subscriptions::SubscriptionUseCase,
};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde_json::{Value, json};
use sha2::Sha512;
use subscription_core::{
    domain::{
        entities::{
            app_users::AppUserEntity, subscriptions::SubscriptionEntity,
            transactions::TransactionEntity,
        },
        repositories::{
            app_users::UserRepository, notifications::SubscriptionNotifier,
            subscriptions::SubscriptionRepository, transactions::TransactionRepository,
        },
        value_objects::{
            enums::{payment_statuses::PaymentStatus, user_roles::UserRole},
            notifications::SubscriptionNotification,
            subscriptions::{
                NewPendingCheckout, PendingCheckout, SubscriberContext, SubscriptionPatch,
            },
        },
    },
    payments::{
        errors::BillingError,
        models::{
            InitializeTransaction, InitializedTransaction, ProviderCustomer, ProviderPlan,
            ProviderSubscription, VerifiedTransaction,
        },
        signature::verify_signature,
    },
};
use url::Url;
use uuid::Uuid;

pub const WEBHOOK_SECRET: &str = "sk_test_webhook";

#[derive(Default)]
struct StoreState {
    subscriptions: Vec<SubscriptionEntity>,
    transactions: Vec<TransactionEntity>,
    users: HashMap<Uuid, AppUserEntity>,
}

/// Stateful stand-in for the Postgres repositories.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn add_user(&self, email: &str, role: UserRole) -> SubscriberContext {
        let now = Utc::now();
        let user = AppUserEntity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            role: role.to_string(),
            subscription_id: None,
            created_at: now,
            updated_at: now,
        };
        let context = SubscriberContext {
            user_id: user.id,
            email: user.email.clone(),
            role,
        };
        self.state.lock().unwrap().users.insert(user.id, user);
        context
    }

    pub fn subscription(&self, id: Uuid) -> SubscriptionEntity {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .find(|sub| sub.id == id)
            .cloned()
            .unwrap()
    }

    pub fn transaction(&self, id: Uuid) -> TransactionEntity {
        self.state
            .lock()
            .unwrap()
            .transactions
            .iter()
            .find(|tx| tx.id == id)
            .cloned()
            .unwrap()
    }

    pub fn user(&self, id: Uuid) -> AppUserEntity {
        self.state.lock().unwrap().users.get(&id).cloned().unwrap()
    }

    pub fn subscriptions_of(&self, user_id: Uuid) -> Vec<SubscriptionEntity> {
        self.state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .filter(|sub| sub.user_id == user_id)
            .cloned()
            .collect()
    }

    pub fn live_count(&self, user_id: Uuid) -> usize {
        self.subscriptions_of(user_id)
            .iter()
            .filter(|sub| sub.is_live())
            .count()
    }

    pub fn update_subscription(&self, id: Uuid, edit: impl FnOnce(&mut SubscriptionEntity)) {
        let mut state = self.state.lock().unwrap();
        if let Some(sub) = state.subscriptions.iter_mut().find(|sub| sub.id == id) {
            edit(sub);
        }
    }
}

#[async_trait]
impl SubscriptionRepository for InMemoryStore {
    async fn find_by_id(&self, subscription_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .find(|sub| sub.id == subscription_id && sub.deleted_at.is_none())
            .cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<SubscriptionEntity>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .rev()
            .find(|sub| sub.code.as_deref() == Some(code) && sub.deleted_at.is_none())
            .cloned())
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<SubscriptionEntity>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .rev()
            .filter(|sub| sub.user_id == user_id && sub.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn find_live_by_user_and_plan(
        &self,
        user_id: Uuid,
        plan_code: &str,
    ) -> Result<Option<SubscriptionEntity>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .find(|sub| sub.user_id == user_id && sub.plan_code == plan_code && sub.is_live())
            .cloned())
    }

    async fn apply_patch(&self, subscription_id: Uuid, patch: SubscriptionPatch) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let sub = state
            .subscriptions
            .iter_mut()
            .find(|sub| sub.id == subscription_id)
            .ok_or_else(|| anyhow!("subscription {subscription_id} not found"))?;

        if let Some(amount) = patch.amount {
            sub.amount = amount;
        }
        if let Some(active) = patch.active {
            sub.active = active;
        }
        if let Some(cancelled) = patch.cancelled {
            sub.cancelled = cancelled;
        }
        if let Some(expired) = patch.expired {
            sub.expired = expired;
        }
        if let Some(status) = patch.status {
            sub.status = status.to_string();
        }
        if let Some(code) = patch.code {
            sub.code = Some(code);
        }
        if let Some(token) = patch.email_token {
            sub.email_token = Some(token);
        }
        if let Some(next_payment_at) = patch.next_payment_at {
            sub.next_payment_at = Some(next_payment_at);
        }
        if let Some(paid_at) = patch.paid_at {
            sub.paid_at = Some(paid_at);
        }
        if let Some(marker) = patch.cancel_at_period_end {
            sub.cancel_at_period_end = marker;
        }
        sub.updated_at = Utc::now();
        Ok(())
    }

    async fn create_pending_with_transaction(
        &self,
        checkout: NewPendingCheckout,
    ) -> Result<PendingCheckout> {
        let now = Utc::now();
        let subscription = SubscriptionEntity {
            id: Uuid::new_v4(),
            user_id: checkout.user_id,
            plan_code: checkout.plan_code.clone(),
            plan_name: checkout.plan_name,
            amount: checkout.amount,
            active: false,
            cancelled: false,
            expired: false,
            status: PaymentStatus::Pending.to_string(),
            code: None,
            email_token: None,
            next_payment_at: None,
            paid_at: None,
            cancel_at_period_end: false,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        let transaction = TransactionEntity {
            id: Uuid::new_v4(),
            user_id: checkout.user_id,
            subscription_id: subscription.id,
            plan_code: checkout.plan_code,
            amount: checkout.amount,
            fee: None,
            status: PaymentStatus::Pending.to_string(),
            reference: None,
            paid_at: None,
            created_at: now,
            updated_at: now,
        };

        let mut state = self.state.lock().unwrap();
        state.subscriptions.push(subscription.clone());
        state.transactions.push(transaction.clone());
        Ok(PendingCheckout {
            subscription,
            transaction,
        })
    }

    async fn list_due_for_expiry(&self, now: DateTime<Utc>) -> Result<Vec<SubscriptionEntity>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .subscriptions
            .iter()
            .filter(|sub| {
                sub.next_payment_at.is_some_and(|due| due < now)
                    && (sub.active || sub.cancel_at_period_end)
                    && !sub.is_terminal()
            })
            .cloned()
            .collect())
    }

    async fn close_due_subscription(&self, subscription_id: Uuid, cancelled: bool) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(sub) = state
            .subscriptions
            .iter_mut()
            .find(|sub| sub.id == subscription_id && !sub.is_terminal())
        else {
            return Ok(false);
        };
        sub.active = false;
        sub.cancelled = cancelled;
        sub.expired = !cancelled;
        sub.status = PaymentStatus::Failed.to_string();
        Ok(true)
    }
}

#[async_trait]
impl TransactionRepository for InMemoryStore {
    async fn find_by_id(&self, transaction_id: Uuid) -> Result<Option<TransactionEntity>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .transactions
            .iter()
            .find(|tx| tx.id == transaction_id)
            .cloned())
    }

    async fn find_by_reference(&self, reference: &str) -> Result<Option<TransactionEntity>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .transactions
            .iter()
            .find(|tx| tx.reference.as_deref() == Some(reference))
            .cloned())
    }

    async fn set_reference(&self, transaction_id: Uuid, reference: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let tx = state
            .transactions
            .iter_mut()
            .find(|tx| tx.id == transaction_id)
            .ok_or_else(|| anyhow!("transaction {transaction_id} not found"))?;
        tx.reference = Some(reference.to_string());
        Ok(())
    }

    async fn mark_paid(
        &self,
        transaction_id: Uuid,
        fee: Option<i64>,
        paid_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(tx) = state
            .transactions
            .iter_mut()
            .find(|tx| tx.id == transaction_id && tx.paid_at.is_none())
        else {
            return Ok(false);
        };
        tx.status = PaymentStatus::Success.to_string();
        tx.paid_at = Some(paid_at);
        tx.fee = fee;
        Ok(true)
    }

    async fn update_fee(&self, transaction_id: Uuid, fee: Option<i64>) -> Result<()> {
        let Some(fee) = fee else {
            return Ok(());
        };
        let mut state = self.state.lock().unwrap();
        if let Some(tx) = state.transactions.iter_mut().find(|tx| tx.id == transaction_id) {
            tx.fee = Some(fee);
        }
        Ok(())
    }
}

#[async_trait]
impl UserRepository for InMemoryStore {
    async fn find_by_id(&self, user_id: Uuid) -> Result<Option<AppUserEntity>> {
        Ok(self.state.lock().unwrap().users.get(&user_id).cloned())
    }

    async fn set_subscription_ref(&self, user_id: Uuid, subscription_id: Uuid) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        let user = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| anyhow!("user {user_id} not found"))?;
        user.subscription_id = Some(subscription_id);
        Ok(())
    }
}

#[derive(Default)]
struct BillingState {
    next_id: u32,
    /// Provider subscription code -> status.
    remote: HashMap<String, String>,
    created_subscriptions: u32,
    cancel_calls: u32,
    cancel_outage: bool,
    /// Transaction reference -> fee reported by verify.
    paid_references: HashMap<String, i64>,
}

/// Provider double keeping just enough remote state to check call effects.
pub struct FakeBilling {
    plans: Vec<ProviderPlan>,
    state: Mutex<BillingState>,
}

impl FakeBilling {
    pub fn new() -> Self {
        let plan = |code: &str, name: &str, amount: i64| ProviderPlan {
            plan_code: code.to_string(),
            name: name.to_string(),
            amount,
            interval: Some("monthly".to_string()),
            currency: Some("NGN".to_string()),
        };
        Self {
            plans: vec![
                plan("PLN_vendor_basic", "vendor@vendor basic", 250000),
                plan("PLN_vendor_pro", "vendor@vendor pro", 500000),
                plan("PLN_customer_plus", "customer@customer plus", 150000),
            ],
            state: Mutex::new(BillingState::default()),
        }
    }

    pub fn set_cancel_outage(&self, outage: bool) {
        self.state.lock().unwrap().cancel_outage = outage;
    }

    pub fn mark_reference_paid(&self, reference: &str, fee: i64) {
        self.state
            .lock()
            .unwrap()
            .paid_references
            .insert(reference.to_string(), fee);
    }

    /// Simulates a cancellation done on the provider dashboard.
    pub fn cancel_at_provider(&self, code: &str) {
        self.state
            .lock()
            .unwrap()
            .remote
            .insert(code.to_string(), "cancelled".to_string());
    }

    pub fn created_subscriptions(&self) -> u32 {
        self.state.lock().unwrap().created_subscriptions
    }

    pub fn cancel_calls(&self) -> u32 {
        self.state.lock().unwrap().cancel_calls
    }

    pub fn remote_status(&self, code: &str) -> Option<String> {
        self.state.lock().unwrap().remote.get(code).cloned()
    }
}

#[async_trait]
impl BillingGateway for FakeBilling {
    async fn create_customer(&self, email: &str) -> Result<ProviderCustomer, BillingError> {
        Ok(ProviderCustomer {
            customer_code: format!("CUS_{email}"),
            email: Some(email.to_string()),
        })
    }

    async fn get_plan(&self, plan_code: &str) -> Result<ProviderPlan, BillingError> {
        self.plans
            .iter()
            .find(|plan| plan.plan_code == plan_code)
            .cloned()
            .ok_or_else(|| BillingError::NotFoundOrInactive(format!("plan {plan_code} not found")))
    }

    async fn list_plans(&self) -> Result<Vec<ProviderPlan>, BillingError> {
        Ok(self.plans.clone())
    }

    async fn create_subscription(
        &self,
        _customer: &str,
        _plan_code: &str,
    ) -> Result<ProviderSubscription, BillingError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        state.created_subscriptions += 1;
        let code = format!("SUB_{}", state.next_id);
        state.remote.insert(code.clone(), "active".to_string());
        Ok(ProviderSubscription {
            subscription_code: code,
            email_token: Some(format!("tok_{}", state.next_id)),
            status: Some("active".to_string()),
            next_payment_date: Some(Utc::now() + Duration::days(30)),
        })
    }

    async fn cancel_subscription(
        &self,
        subscription_code: &str,
        _email_token: &str,
    ) -> Result<(), BillingError> {
        let mut state = self.state.lock().unwrap();
        state.cancel_calls += 1;
        if state.cancel_outage {
            return Err(BillingError::Transport("connection refused".to_string()));
        }
        match state.remote.get_mut(subscription_code) {
            Some(status) if status == "active" => {
                *status = "cancelled".to_string();
                Ok(())
            }
            _ => Err(BillingError::NotFoundOrInactive(
                "Subscription not found or already inactive".to_string(),
            )),
        }
    }

    async fn get_subscription_details(
        &self,
        subscription_code: &str,
    ) -> Result<ProviderSubscription, BillingError> {
        let state = self.state.lock().unwrap();
        let status = state.remote.get(subscription_code).cloned().ok_or_else(|| {
            BillingError::NotFoundOrInactive(format!("subscription {subscription_code} not found"))
        })?;
        Ok(ProviderSubscription {
            subscription_code: subscription_code.to_string(),
            email_token: Some("tok_details".to_string()),
            status: Some(status),
            next_payment_date: None,
        })
    }

    async fn initialize_transaction(
        &self,
        request: InitializeTransaction,
    ) -> Result<InitializedTransaction, BillingError> {
        let reference = format!("ref_{}", request.metadata.transaction_id.simple());
        Ok(InitializedTransaction {
            authorization_url: format!("https://checkout.example.test/{reference}"),
            access_code: None,
            reference,
        })
    }

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, BillingError> {
        let fee = self.state.lock().unwrap().paid_references.get(reference).copied();
        Ok(VerifiedTransaction {
            status: if fee.is_some() { "success" } else { "abandoned" }.to_string(),
            reference: reference.to_string(),
            amount: None,
            fees: fee,
            paid_at: None,
            customer: Some(ProviderCustomer {
                customer_code: "CUS_verified".to_string(),
                email: None,
            }),
        })
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        verify_signature(WEBHOOK_SECRET, payload, signature)
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<SubscriptionNotification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<SubscriptionNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriptionNotifier for RecordingNotifier {
    async fn notify(&self, notification: SubscriptionNotification) -> Result<()> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

pub type TestSubscriptions =
    SubscriptionUseCase<InMemoryStore, InMemoryStore, InMemoryStore, FakeBilling, RecordingNotifier>;
pub type TestWebhooks =
    BillingWebhookUseCase<InMemoryStore, InMemoryStore, InMemoryStore, FakeBilling, RecordingNotifier>;

pub struct Harness {
    pub store: Arc<InMemoryStore>,
    pub billing: Arc<FakeBilling>,
    pub notifier: Arc<RecordingNotifier>,
    pub subscriptions: Arc<TestSubscriptions>,
    pub webhooks: Arc<TestWebhooks>,
}

impl Harness {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::default());
        let billing = Arc::new(FakeBilling::new());
        let notifier = Arc::new(RecordingNotifier::default());

        let subscriptions = Arc::new(SubscriptionUseCase::new(
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::clone(&billing),
            Arc::clone(&notifier),
            Url::parse("https://shop.example.test").unwrap(),
        ));
        let webhooks = Arc::new(BillingWebhookUseCase::new(
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::clone(&store),
            Arc::clone(&billing),
            Arc::clone(&notifier),
        ));

        Self {
            store,
            billing,
            notifier,
            subscriptions,
            webhooks,
        }
    }

    /// Delivers a correctly signed webhook event.
    pub async fn deliver(&self, event: &str, data: Value) {
        let body = json!({ "event": event, "data": data }).to_string();
        let signature = sign(body.as_bytes());
        self.webhooks
            .handle(body.as_bytes(), Some(&signature))
            .await
            .unwrap();
    }

    pub async fn deliver_charge_success(&self, transaction_id: Uuid, fee: i64) {
        self.deliver(
            "charge.success",
            json!({
                "reference": format!("ref_{}", transaction_id.simple()),
                "fees": fee,
                "metadata": { "transactionId": transaction_id.to_string() },
                "customer": { "customer_code": "CUS_webhook", "email": "buyer@example.test" }
            }),
        )
        .await;
    }
}

pub fn sign(payload: &[u8]) -> String {
    let mut mac = Hmac::<Sha512>::new_from_slice(WEBHOOK_SECRET.as_bytes()).unwrap();
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}
