use common::Address;
use serde::Deserialize;
use store::{Store, Transaction};

use super::validation::{normalize_email, validate_address, validate_non_empty, validate_password};
use super::{RoleKind, Session, User, load_user, load_user_for_update};
use crate::error::{DomainError, Result};

/// Input for [`AccountService::register`].
#[derive(Debug, Clone, Deserialize)]
pub struct Registration {
    pub name: String,
    pub email: String,
    pub password: String,
    pub age: u32,
    pub phone_number: String,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default = "default_role")]
    pub role: RoleKind,
}

fn default_role() -> RoleKind {
    RoleKind::Customer
}

/// Fields left as `None` are unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfileUpdate {
    pub name: Option<String>,
    pub age: Option<u32>,
    pub phone_number: Option<String>,
    pub address: Option<Address>,
}

/// Registration, login and profile maintenance.
///
/// Passwords are compared in plain text. This is a known weakness carried
/// over unchanged and must not be relied on outside local use.
pub struct AccountService<S: Store> {
    store: S,
}

impl<S: Store> AccountService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    #[tracing::instrument(skip(self, registration), fields(email = %registration.email))]
    pub async fn register(&self, registration: Registration) -> Result<User> {
        let email = normalize_email(&registration.email)?;
        validate_password(&registration.password)?;
        let name = validate_non_empty("name", &registration.name)?;
        let phone_number = validate_non_empty("phone number", &registration.phone_number)?;
        if let Some(address) = &registration.address {
            validate_address(address)?;
        }

        let mut tx = self.store.begin().await?;
        if tx.user_by_email(&email).await?.is_some() {
            return Err(DomainError::validation(format!(
                "email {email} is already registered"
            )));
        }

        let user = User::new(
            name,
            email,
            registration.password,
            registration.age,
            phone_number,
            registration.address,
            registration.role,
        );
        tx.insert_user(&user.to_record()).await?;
        tx.commit().await?;

        tracing::info!(user_id = %user.id(), role = user.role().kind().as_str(), "user registered");
        Ok(user)
    }

    /// Starts a session. The e-mail comparison ignores case.
    #[tracing::instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<Session> {
        let mut tx = self.store.begin().await?;
        let record = tx.user_by_email(email.trim()).await?;
        tx.commit().await?;

        let user: User = record.ok_or(DomainError::InvalidCredentials)?.try_into()?;
        if !user.password_matches(password) {
            tracing::warn!("login rejected");
            return Err(DomainError::InvalidCredentials);
        }

        tracing::info!(user_id = %user.id(), "user logged in");
        Ok(Session::start(&user))
    }

    /// Ends a session by consuming it.
    pub fn logout(&self, session: Session) {
        tracing::info!(user_id = %session.user_id(), "user logged out");
    }

    pub async fn profile(&self, session: &Session) -> Result<User> {
        let mut tx = self.store.begin().await?;
        let user = load_user(&mut tx, session.user_id()).await?;
        tx.commit().await?;
        Ok(user)
    }

    #[tracing::instrument(skip(self, session, update), fields(user_id = %session.user_id()))]
    pub async fn update_profile(&self, session: &Session, update: ProfileUpdate) -> Result<User> {
        let name = update
            .name
            .as_deref()
            .map(|n| validate_non_empty("name", n))
            .transpose()?;
        let phone_number = update
            .phone_number
            .as_deref()
            .map(|p| validate_non_empty("phone number", p))
            .transpose()?;
        if let Some(address) = &update.address {
            validate_address(address)?;
        }

        let mut tx = self.store.begin().await?;
        let mut user = load_user_for_update(&mut tx, session.user_id()).await?;
        if let Some(name) = name {
            user.set_name(name);
        }
        if let Some(phone_number) = phone_number {
            user.set_phone_number(phone_number);
        }
        if let Some(age) = update.age {
            user.set_age(age);
        }
        if let Some(address) = update.address {
            user.set_address(address);
        }
        tx.update_user(&user.to_record()).await?;
        tx.commit().await?;
        Ok(user)
    }

    pub async fn update_address(&self, session: &Session, address: Address) -> Result<User> {
        self.update_profile(
            session,
            ProfileUpdate {
                address: Some(address),
                ..ProfileUpdate::default()
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use store::InMemoryStore;

    use super::*;

    fn registration(email: &str) -> Registration {
        Registration {
            name: "Ada Lovelace".into(),
            email: email.into(),
            password: "engine1".into(),
            age: 36,
            phone_number: "5550101".into(),
            address: None,
            role: RoleKind::Customer,
        }
    }

    #[tokio::test]
    async fn register_then_login_with_different_case() {
        let accounts = AccountService::new(InMemoryStore::new());
        let user = accounts
            .register(registration("Ada@Example.com"))
            .await
            .unwrap();
        assert_eq!(user.email(), "ada@example.com");

        let session = accounts.login("ADA@example.com", "engine1").await.unwrap();
        assert_eq!(session.user_id(), user.id());
        assert_eq!(session.role(), RoleKind::Customer);
    }

    #[tokio::test]
    async fn duplicate_email_is_rejected() {
        let accounts = AccountService::new(InMemoryStore::new());
        accounts.register(registration("ada@example.com")).await.unwrap();

        let err = accounts
            .register(registration("ADA@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_email_are_indistinguishable() {
        let accounts = AccountService::new(InMemoryStore::new());
        accounts.register(registration("ada@example.com")).await.unwrap();

        assert!(matches!(
            accounts.login("ada@example.com", "wrong12").await,
            Err(DomainError::InvalidCredentials)
        ));
        assert!(matches!(
            accounts.login("nobody@example.com", "engine1").await,
            Err(DomainError::InvalidCredentials)
        ));
    }

    #[tokio::test]
    async fn short_password_is_rejected_before_persisting() {
        let accounts = AccountService::new(InMemoryStore::new());
        let mut reg = registration("ada@example.com");
        reg.password = "abc".into();

        assert!(accounts.register(reg).await.is_err());
        assert!(accounts.login("ada@example.com", "abc").await.is_err());
    }

    #[tokio::test]
    async fn update_address_validates_and_persists() {
        let accounts = AccountService::new(InMemoryStore::new());
        accounts.register(registration("ada@example.com")).await.unwrap();
        let session = accounts.login("ada@example.com", "engine1").await.unwrap();

        let mut address = Address {
            street_number: "10".into(),
            street: "Downing St".into(),
            city: "London".into(),
            state: "London".into(),
            country: "UK".into(),
            zip_code: "ABC".into(),
        };
        assert!(accounts.update_address(&session, address.clone()).await.is_err());

        address.zip_code = "10001".into();
        accounts.update_address(&session, address.clone()).await.unwrap();
        let profile = accounts.profile(&session).await.unwrap();
        assert_eq!(profile.address(), Some(&address));
    }
}
