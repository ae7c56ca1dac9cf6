//! Customer authentication and profile management.

use chrono::{DateTime, Utc};
use common::CustomerId;
use serde::{Deserialize, Serialize};
use store::{Customer, NewCustomer, Store, StoreError};

use crate::error::AuthError;
use crate::password::{hash_password, verify_password};

/// Minimum password length.
const MIN_PASSWORD_LENGTH: usize = 8;

/// Customer details safe to hand back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub customer_id: CustomerId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Customer> for Profile {
    fn from(customer: Customer) -> Self {
        Self {
            customer_id: customer.id,
            first_name: customer.first_name,
            last_name: customer.last_name,
            email: customer.email,
            phone_number: customer.phone_number,
            address: customer.address,
            created_at: customer.created_at,
            updated_at: customer.updated_at,
        }
    }
}

/// Registration details with a plaintext password.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: Option<String>,
    pub address: Option<String>,
    pub password: String,
}

/// Authentication and profile service.
///
/// Resolves credentials to a customer and manages profile fields. Cart
/// operations consume the resolved [`CustomerId`] and never see credentials.
#[derive(Clone)]
pub struct AccessService<S: Store> {
    store: S,
}

impl<S: Store> AccessService<S> {
    /// Create a new access service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Register a new customer.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Validation` for a malformed email or weak password.
    /// Returns `AuthError::CustomerAlreadyExists` if the email is taken.
    #[tracing::instrument(skip(self, account), fields(email = %account.email))]
    pub async fn register(&self, account: NewAccount) -> Result<Profile, AuthError> {
        validate_email(&account.email)?;
        validate_password(&account.password)?;
        let password_hash = hash_password(&account.password)?;

        let customer = self
            .store
            .insert_customer(NewCustomer {
                first_name: account.first_name,
                last_name: account.last_name,
                email: account.email.trim().to_string(),
                phone_number: account.phone_number,
                address: account.address,
                password_hash,
            })
            .await
            .map_err(|e| match e {
                StoreError::Constraint(_) => AuthError::CustomerAlreadyExists,
                other => AuthError::Store(other),
            })?;

        tracing::info!(customer_id = %customer.id, "customer registered");
        Ok(customer.into())
    }

    /// Log in with email and password.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if the email is unknown or the
    /// password is wrong.
    #[tracing::instrument(skip(self, password))]
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<Profile, AuthError> {
        let customer = self
            .store
            .find_customer_by_email(email.trim())
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        verify_password(password, &customer.password_hash)?;

        Ok(customer.into())
    }

    /// Fetch a customer's profile.
    #[tracing::instrument(skip(self))]
    pub async fn get_profile(&self, customer_id: CustomerId) -> Result<Profile, AuthError> {
        self.customer(customer_id).await.map(Profile::from)
    }

    /// Replace a customer's address. Returns the stored address.
    #[tracing::instrument(skip(self))]
    pub async fn update_address(
        &self,
        customer_id: CustomerId,
        address: &str,
    ) -> Result<String, AuthError> {
        let address = address.trim();
        if address.is_empty() {
            return Err(AuthError::Validation("address must not be empty".to_string()));
        }

        if !self.store.update_address(customer_id, address).await? {
            return Err(AuthError::CustomerNotFound(customer_id));
        }
        Ok(address.to_string())
    }

    /// Change a customer's password after checking the current one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidCredentials` if `old_password` is wrong.
    #[tracing::instrument(skip(self, old_password, new_password))]
    pub async fn change_password(
        &self,
        customer_id: CustomerId,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        validate_password(new_password)?;

        let customer = self.customer(customer_id).await?;
        verify_password(old_password, &customer.password_hash)?;

        let password_hash = hash_password(new_password)?;
        if !self
            .store
            .update_password_hash(customer_id, &password_hash)
            .await?
        {
            return Err(AuthError::CustomerNotFound(customer_id));
        }

        tracing::info!(%customer_id, "password changed");
        Ok(())
    }

    async fn customer(&self, customer_id: CustomerId) -> Result<Customer, AuthError> {
        self.store
            .get_customer(customer_id)
            .await?
            .ok_or(AuthError::CustomerNotFound(customer_id))
    }
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(()),
        _ => Err(AuthError::Validation(format!("invalid email: {email}"))),
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AuthError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LENGTH} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use store::InMemoryStore;

    use super::*;

    fn account(email: &str) -> NewAccount {
        NewAccount {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: email.to_string(),
            phone_number: Some("555-0100".to_string()),
            address: None,
            password: "analytical".to_string(),
        }
    }

    async fn registered() -> (AccessService<InMemoryStore>, Profile) {
        let service = AccessService::new(InMemoryStore::new());
        let profile = service.register(account("ada@example.com")).await.unwrap();
        (service, profile)
    }

    #[tokio::test]
    async fn authenticate_with_correct_password() {
        let (service, profile) = registered().await;

        let logged_in = service
            .authenticate("ada@example.com", "analytical")
            .await
            .unwrap();

        assert_eq!(logged_in.customer_id, profile.customer_id);
        assert_eq!(logged_in.first_name, "Ada");
    }

    #[tokio::test]
    async fn unknown_email_and_wrong_password_look_the_same() {
        let (service, _) = registered().await;

        let unknown = service.authenticate("bob@example.com", "analytical").await;
        let wrong = service.authenticate("ada@example.com", "difference").await;

        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let (service, _) = registered().await;

        let result = service.register(account("ada@example.com")).await;
        assert!(matches!(result, Err(AuthError::CustomerAlreadyExists)));
    }

    #[tokio::test]
    async fn register_validates_input() {
        let service = AccessService::new(InMemoryStore::new());

        let bad_email = service.register(account("not-an-email")).await;
        assert!(matches!(bad_email, Err(AuthError::Validation(_))));

        let mut weak = account("ada@example.com");
        weak.password = "short".to_string();
        let result = service.register(weak).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }

    #[tokio::test]
    async fn profile_serializes_without_password_hash() {
        let (service, profile) = registered().await;

        let fetched = service.get_profile(profile.customer_id).await.unwrap();
        let json = serde_json::to_value(&fetched).unwrap();

        assert_eq!(json["email"], "ada@example.com");
        assert!(json.get("password_hash").is_none());
    }

    #[tokio::test]
    async fn missing_profile_is_not_found() {
        let service = AccessService::new(InMemoryStore::new());

        let result = service.get_profile(CustomerId::new(42)).await;
        assert!(matches!(result, Err(AuthError::CustomerNotFound(_))));
    }

    #[tokio::test]
    async fn update_address_round_trips() {
        let (service, profile) = registered().await;

        let stored = service
            .update_address(profile.customer_id, "  12 Analytical Way ")
            .await
            .unwrap();
        assert_eq!(stored, "12 Analytical Way");

        let fetched = service.get_profile(profile.customer_id).await.unwrap();
        assert_eq!(fetched.address.as_deref(), Some("12 Analytical Way"));
    }

    #[tokio::test]
    async fn update_address_rejects_blank_and_unknown() {
        let (service, profile) = registered().await;

        let blank = service.update_address(profile.customer_id, "   ").await;
        assert!(matches!(blank, Err(AuthError::Validation(_))));

        let unknown = service.update_address(CustomerId::new(999), "x").await;
        assert!(matches!(unknown, Err(AuthError::CustomerNotFound(_))));
    }

    #[tokio::test]
    async fn change_password_requires_old_password() {
        let (service, profile) = registered().await;

        let wrong = service
            .change_password(profile.customer_id, "not-it-at-all", "engine-two")
            .await;
        assert!(matches!(wrong, Err(AuthError::InvalidCredentials)));

        service
            .change_password(profile.customer_id, "analytical", "engine-two")
            .await
            .unwrap();

        assert!(service
            .authenticate("ada@example.com", "analytical")
            .await
            .is_err());
        assert!(service
            .authenticate("ada@example.com", "engine-two")
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn change_password_rejects_empty_new_password() {
        let (service, profile) = registered().await;

        let result = service
            .change_password(profile.customer_id, "analytical", "")
            .await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }
}
