//! User accounts.
//!
//! The stored [`User`] carries the password hash; callers only ever see a
//! [`UserView`], which has no password field at all.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::document::{Document, DocumentStore};
use crate::error::UserError;
use crate::id::DocId;
use crate::password::PasswordHasher;
use crate::query::{FieldKind, FieldTable, Filter, Predicate, Query, SortOrder};
use crate::validation::ValidationErrors;

const NAME_MAX: usize = 50;
const EMAIL_MAX: usize = 50;
const PASSWORD_MAX: usize = 1024;

/// Filterable and sortable fields of user listings.
pub static USER_FIELDS: FieldTable = FieldTable {
    fields: &[
        ("id", FieldKind::Identifier),
        ("role", FieldKind::Exact),
        ("source", FieldKind::Exact),
        ("isActive", FieldKind::Exact),
        ("isConfirmed", FieldKind::Exact),
        ("name", FieldKind::Substring),
        ("email", FieldKind::Substring),
        ("createdAt", FieldKind::Timestamp),
    ],
    sortable: &["name", "email", "role", "createdAt"],
    default_sort: ("name", SortOrder::Ascending),
    min_page_size: 1,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

impl Role {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "admin" => Some(Self::Admin),
            "user" => Some(Self::User),
            _ => None,
        }
    }
}

/// Where the account was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Local,
    Google,
    Outlook,
}

impl Source {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "local" => Some(Self::Local),
            "google" => Some(Self::Google),
            "outlook" => Some(Self::Outlook),
            _ => None,
        }
    }
}

/// One successful sign-in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Login {
    pub date: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

/// A stored account, including its password hash.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: DocId,
    pub name: String,
    pub email: String,
    password: String,
    pub role: Role,
    pub is_active: bool,
    pub is_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub source: Source,
    #[serde(default)]
    pub logins: Vec<Login>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("role", &self.role)
            .field("is_active", &self.is_active)
            .finish_non_exhaustive()
    }
}

impl Document for User {
    const COLLECTION: &'static str = "users";

    fn id(&self) -> DocId {
        self.id
    }
}

impl User {
    /// The caller-facing form of this account.
    #[must_use]
    pub fn view(&self) -> UserView {
        UserView {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            role: self.role,
            is_active: self.is_active,
            is_confirmed: self.is_confirmed,
            created_at: self.created_at,
            source: self.source,
            logins: self.logins.clone(),
        }
    }
}

/// A user as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserView {
    pub id: DocId,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_active: bool,
    pub is_confirmed: bool,
    pub created_at: DateTime<Utc>,
    pub source: Source,
    pub logins: Vec<Login>,
}

/// A new account as submitted by a caller.
#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDraft {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_confirmed: Option<bool>,
}

impl fmt::Debug for UserDraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserDraft")
            .field("name", &self.name)
            .field("email", &self.email)
            .finish_non_exhaustive()
    }
}

fn is_valid_name(name: &str) -> bool {
    name.chars()
        .all(|c| c.is_ascii_alphabetic() || c.is_whitespace() || c == '\'' || c == '-')
}

fn is_valid_email(email: &str) -> bool {
    const LOCAL_SPECIALS: &str = ".!#$%&'*+/=?^_`{|}~-";
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    let local_ok = !local.is_empty()
        && local
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || LOCAL_SPECIALS.contains(c));
    let domain_ok = domain.split('.').all(|label| {
        !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    });
    local_ok && domain_ok
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_name(errors: &mut ValidationErrors, name: &str) {
    errors.require_text("name", name, NAME_MAX);
    if !is_valid_name(name.trim()) {
        errors.add("name", "name may only contain letters, spaces, apostrophes and hyphens");
    }
}

fn check_role(errors: &mut ValidationErrors, role: Option<&str>) {
    if role.is_some_and(|r| Role::parse(r).is_none()) {
        errors.add("role", "role must be one of: admin, user");
    }
}

impl UserDraft {
    /// Check every field of the draft.
    ///
    /// # Errors
    ///
    /// Returns the failing fields keyed by their wire names.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        check_name(&mut errors, &self.name);

        errors.require_text("email", &self.email, EMAIL_MAX);
        let email = normalize_email(&self.email);
        if !email.is_empty() && !is_valid_email(&email) {
            errors.add("email", "email is not a valid address");
        }

        errors.require_text("password", &self.password, PASSWORD_MAX);

        check_role(&mut errors, self.role.as_deref());
        if self.source.as_deref().is_some_and(|s| Source::parse(s).is_none()) {
            errors.add("source", "source must be one of: local, google, outlook");
        }
        errors.into_result()
    }
}

/// Changes to an existing account. Absent fields are left alone; the
/// e-mail address and password are not editable here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub is_confirmed: Option<bool>,
}

impl UserUpdate {
    /// Apply the name and role rules to the fields present.
    ///
    /// # Errors
    ///
    /// Returns the failing fields keyed by their wire names.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(name) = &self.name {
            check_name(&mut errors, name);
        }
        check_role(&mut errors, self.role.as_deref());
        errors.into_result()
    }
}

/// Persistence for user accounts.
#[derive(Clone)]
pub struct UserStore {
    docs: Arc<DocumentStore>,
    hasher: Arc<dyn PasswordHasher>,
}

impl fmt::Debug for UserStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserStore").finish_non_exhaustive()
    }
}

impl UserStore {
    #[must_use]
    pub fn new(docs: Arc<DocumentStore>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self { docs, hasher }
    }

    /// Validate and persist a new account with a hashed password.
    ///
    /// # Errors
    ///
    /// - [`UserError::Invalid`] if the draft fails validation.
    /// - [`UserError::EmailTaken`] if another account uses the address.
    /// - [`UserError::Store`] if storage fails.
    pub async fn create(&self, draft: UserDraft) -> Result<User, UserError> {
        draft.validate().map_err(UserError::Invalid)?;

        let email = normalize_email(&draft.email);
        if self.email_exists(&email).await? {
            return Err(UserError::EmailTaken { email });
        }

        let password = self.hash_password(draft.password).await?;
        let user = User {
            id: DocId::new(),
            name: draft.name.trim().to_lowercase(),
            email,
            password,
            role: draft.role.as_deref().and_then(Role::parse).unwrap_or_default(),
            is_active: draft.is_active.unwrap_or(false),
            is_confirmed: draft.is_confirmed.unwrap_or(false),
            created_at: Utc::now(),
            source: draft.source.as_deref().and_then(Source::parse).unwrap_or_default(),
            logins: Vec::new(),
        };
        self.docs.put(&user).await?;
        info!(id = %user.id, role = ?user.role, "user created");
        Ok(user)
    }

    async fn hash_password(&self, plaintext: String) -> Result<String, UserError> {
        let hasher = Arc::clone(&self.hasher);
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| UserError::Password {
                reason: format!("hashing task failed: {e}"),
            })?
    }

    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn get(&self, id: DocId) -> Result<Option<User>, UserError> {
        Ok(self.docs.get(id).await?)
    }

    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn list(&self, query: &Query) -> Result<Vec<User>, UserError> {
        Ok(self.docs.query(query).await?)
    }

    /// Whether any account uses `email`, compared case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn email_exists(&self, email: &str) -> Result<bool, UserError> {
        let filter = Filter::equals("email", normalize_email(email));
        Ok(!self.docs.find::<User>(&filter).await?.is_empty())
    }

    /// The account for `email`, only if it is both active and confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn find_active_by_email(&self, email: &str) -> Result<Option<User>, UserError> {
        let filter = Filter::equals("email", normalize_email(email))
            .with("isActive", Predicate::Equals(true.into()))
            .with("isConfirmed", Predicate::Equals(true.into()));
        Ok(self.docs.find::<User>(&filter).await?.into_iter().next())
    }

    /// Check a plaintext password against the account's stored hash.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Password`] if the check could not run.
    pub async fn verify_password(&self, user: &User, plaintext: &str) -> Result<bool, UserError> {
        let hasher = Arc::clone(&self.hasher);
        let plaintext = plaintext.to_owned();
        let encoded = user.password.clone();
        tokio::task::spawn_blocking(move || hasher.verify(&plaintext, &encoded))
            .await
            .map_err(|e| UserError::Password {
                reason: format!("verification task failed: {e}"),
            })
    }

    /// Change the name, role or flags of an existing account.
    ///
    /// # Errors
    ///
    /// - [`UserError::Invalid`] if the update fails validation. Nothing is
    ///   read or written.
    /// - [`UserError::Store`] if storage fails.
    pub async fn update(&self, id: DocId, update: UserUpdate) -> Result<Option<User>, UserError> {
        update.validate().map_err(UserError::Invalid)?;

        let Some(mut user) = self.docs.get::<User>(id).await? else {
            return Ok(None);
        };
        if let Some(name) = update.name {
            user.name = name.trim().to_lowercase();
        }
        if let Some(role) = update.role.as_deref().and_then(Role::parse) {
            user.role = role;
        }
        if let Some(active) = update.is_active {
            user.is_active = active;
        }
        if let Some(confirmed) = update.is_confirmed {
            user.is_confirmed = confirmed;
        }
        self.docs.put(&user).await?;
        info!(%id, role = ?user.role, "user updated");
        Ok(Some(user))
    }

    /// Append a sign-in record. Returns the updated account.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn record_login(
        &self,
        id: DocId,
        ip: Option<String>,
    ) -> Result<Option<User>, UserError> {
        let Some(mut user) = self.docs.get::<User>(id).await? else {
            return Ok(None);
        };
        user.logins.push(Login {
            date: Utc::now(),
            ip,
        });
        self.docs.put(&user).await?;
        debug!(%id, logins = user.logins.len(), "login recorded");
        Ok(Some(user))
    }

    /// Activate or deactivate the listed accounts. Returns the accounts
    /// whose state actually changed.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn set_active(&self, ids: &[DocId], active: bool) -> Result<Vec<User>, UserError> {
        let mut changed = Vec::new();
        for &id in ids {
            let Some(mut user) = self.docs.get::<User>(id).await? else {
                continue;
            };
            if user.is_active != active {
                user.is_active = active;
                self.docs.put(&user).await?;
                changed.push(user);
            }
        }
        info!(active, modified = changed.len(), "user activation changed");
        Ok(changed)
    }

    /// Delete an account, returning it if it existed.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn delete_one(&self, id: DocId) -> Result<Option<User>, UserError> {
        let Some(user) = self.docs.get::<User>(id).await? else {
            return Ok(None);
        };
        self.docs.delete::<User>(id).await?;
        info!(%id, "user deleted");
        Ok(Some(user))
    }

    /// Delete every listed account. Returns how many existed.
    ///
    /// # Errors
    ///
    /// Returns [`UserError::Store`] if storage fails.
    pub async fn delete_many(&self, ids: &[DocId]) -> Result<usize, UserError> {
        let mut deleted = 0;
        for &id in ids {
            if self.docs.delete::<User>(id).await? {
                deleted += 1;
            }
        }
        info!(requested = ids.len(), deleted, "users deleted");
        Ok(deleted)
    }
}
