use common::{Address, UserId};
use serde::{Deserialize, Serialize};
use store::{StoreError, Transaction, UserRecord};

use crate::error::{DomainError, Result};

/// Role discriminant, as stored and as carried by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoleKind {
    Customer,
    Admin,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Customer => "customer",
            RoleKind::Admin => "admin",
        }
    }
}

impl std::str::FromStr for RoleKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "customer" => Ok(RoleKind::Customer),
            "admin" => Ok(RoleKind::Admin),
            other => Err(DomainError::validation(format!("unknown role: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CustomerProfile {
    pub loyalty_points: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AdminProfile;

/// A user is either a customer (with a loyalty balance) or an admin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Role {
    Customer(CustomerProfile),
    Admin(AdminProfile),
}

impl Role {
    pub fn kind(&self) -> RoleKind {
        match self {
            Role::Customer(_) => RoleKind::Customer,
            Role::Admin(_) => RoleKind::Admin,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    name: String,
    email: String,
    password: String,
    age: u32,
    phone_number: String,
    address: Option<Address>,
    role: Role,
}

impl User {
    pub(crate) fn new(
        name: String,
        email: String,
        password: String,
        age: u32,
        phone_number: String,
        address: Option<Address>,
        role: RoleKind,
    ) -> Self {
        let role = match role {
            RoleKind::Customer => Role::Customer(CustomerProfile::default()),
            RoleKind::Admin => Role::Admin(AdminProfile),
        };
        Self {
            id: UserId::new(),
            name,
            email,
            password,
            age,
            phone_number,
            address,
            role,
        }
    }

    pub fn id(&self) -> UserId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn age(&self) -> u32 {
        self.age
    }

    pub fn phone_number(&self) -> &str {
        &self.phone_number
    }

    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Loyalty balance; admins always have zero.
    pub fn loyalty_points(&self) -> u32 {
        match &self.role {
            Role::Customer(profile) => profile.loyalty_points,
            Role::Admin(_) => 0,
        }
    }

    pub(crate) fn password_matches(&self, password: &str) -> bool {
        self.password == password
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub(crate) fn set_age(&mut self, age: u32) {
        self.age = age;
    }

    pub(crate) fn set_phone_number(&mut self, phone_number: String) {
        self.phone_number = phone_number;
    }

    pub(crate) fn set_address(&mut self, address: Address) {
        self.address = Some(address);
    }

    fn customer_profile_mut(&mut self) -> Result<&mut CustomerProfile> {
        match &mut self.role {
            Role::Customer(profile) => Ok(profile),
            Role::Admin(_) => Err(DomainError::Forbidden(format!(
                "user {} has no loyalty balance",
                self.id
            ))),
        }
    }

    /// Adds earned points to the balance.
    pub(crate) fn accrue_points(&mut self, points: u32) -> Result<u32> {
        let profile = self.customer_profile_mut()?;
        profile.loyalty_points = profile.loyalty_points.saturating_add(points);
        Ok(profile.loyalty_points)
    }

    /// Spends points; fails if the balance does not cover them.
    pub(crate) fn redeem_points(&mut self, points: u32) -> Result<u32> {
        let profile = self.customer_profile_mut()?;
        if points > profile.loyalty_points {
            return Err(DomainError::validation(format!(
                "cannot redeem {points} points with a balance of {}",
                profile.loyalty_points
            )));
        }
        profile.loyalty_points -= points;
        Ok(profile.loyalty_points)
    }

    /// Takes back previously earned points when the balance still covers
    /// them. Returns whether the deduction happened.
    pub(crate) fn revoke_points_if_covered(&mut self, points: u32) -> Result<bool> {
        let profile = self.customer_profile_mut()?;
        if profile.loyalty_points < points {
            return Ok(false);
        }
        profile.loyalty_points -= points;
        Ok(true)
    }

    pub(crate) fn to_record(&self) -> UserRecord {
        UserRecord {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            password: self.password.clone(),
            age: self.age,
            phone_number: self.phone_number.clone(),
            address: self.address.clone(),
            role: self.role.kind().as_str().to_string(),
            loyalty_points: self.loyalty_points(),
        }
    }
}

impl TryFrom<UserRecord> for User {
    type Error = DomainError;

    fn try_from(r: UserRecord) -> Result<Self> {
        let role = match r.role.parse::<RoleKind>() {
            Ok(RoleKind::Customer) => Role::Customer(CustomerProfile {
                loyalty_points: r.loyalty_points,
            }),
            Ok(RoleKind::Admin) => Role::Admin(AdminProfile),
            Err(_) => {
                return Err(StoreError::InvalidData(format!(
                    "user {} has unknown role {}",
                    r.id, r.role
                ))
                .into());
            }
        };
        Ok(Self {
            id: r.id,
            name: r.name,
            email: r.email,
            password: r.password,
            age: r.age,
            phone_number: r.phone_number,
            address: r.address,
            role,
        })
    }
}

pub(crate) async fn load_user<T: Transaction>(tx: &mut T, id: UserId) -> Result<User> {
    tx.user(id)
        .await?
        .ok_or_else(|| DomainError::not_found("user", id))?
        .try_into()
}

/// Locks the user row, then loads it. Use before changing the user.
pub(crate) async fn load_user_for_update<T: Transaction>(tx: &mut T, id: UserId) -> Result<User> {
    tx.lock_user(id).await?;
    load_user(tx, id).await
}
