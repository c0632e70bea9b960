use async_trait::async_trait;
use subscription_core::payments::{
    errors::BillingError,
    models::{
        InitializeTransaction, InitializedTransaction, ProviderCustomer, ProviderPlan,
        ProviderSubscription, VerifiedTransaction,
    },
    paystack_client::PaystackClient,
};

/// Provider capabilities the reconciler relies on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BillingGateway: Send + Sync {
    async fn create_customer(&self, email: &str) -> Result<ProviderCustomer, BillingError>;

    async fn get_plan(&self, plan_code: &str) -> Result<ProviderPlan, BillingError>;

    async fn list_plans(&self) -> Result<Vec<ProviderPlan>, BillingError>;

    async fn create_subscription(
        &self,
        customer: &str,
        plan_code: &str,
    ) -> Result<ProviderSubscription, BillingError>;

    async fn cancel_subscription(
        &self,
        subscription_code: &str,
        email_token: &str,
    ) -> Result<(), BillingError>;

    async fn get_subscription_details(
        &self,
        subscription_code: &str,
    ) -> Result<ProviderSubscription, BillingError>;

    async fn initialize_transaction(
        &self,
        request: InitializeTransaction,
    ) -> Result<InitializedTransaction, BillingError>;

    async fn verify_transaction(&self, reference: &str)
    -> Result<VerifiedTransaction, BillingError>;

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;
}

#[async_trait]
impl BillingGateway for PaystackClient {
    async fn create_customer(&self, email: &str) -> Result<ProviderCustomer, BillingError> {
        self.create_customer(email).await
    }

    async fn get_plan(&self, plan_code: &str) -> Result<ProviderPlan, BillingError> {
        self.get_plan(plan_code).await
    }

    async fn list_plans(&self) -> Result<Vec<ProviderPlan>, BillingError> {
        self.list_plans().await
    }

    async fn create_subscription(
        &self,
        customer: &str,
        plan_code: &str,
    ) -> Result<ProviderSubscription, BillingError> {
        self.create_subscription(customer, plan_code).await
    }

    async fn cancel_subscription(
        &self,
        subscription_code: &str,
        email_token: &str,
    ) -> Result<(), BillingError> {
        self.cancel_subscription(subscription_code, email_token).await
    }

    async fn get_subscription_details(
        &self,
        subscription_code: &str,
    ) -> Result<ProviderSubscription, BillingError> {
        self.get_subscription_details(subscription_code).await
    }

    async fn initialize_transaction(
        &self,
        request: InitializeTransaction,
    ) -> Result<InitializedTransaction, BillingError> {
        self.initialize_transaction(&request).await
    }

    async fn verify_transaction(
        &self,
        reference: &str,
    ) -> Result<VerifiedTransaction, BillingError> {
        self.verify_transaction(reference).await
    }

    fn verify_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        self.verify_webhook_signature(payload, signature)
    }
}
