//! Access gateway interface
//!
//! Credential verification and token issuance live outside the core. What
//! the core needs from the gateway is a directory of registered users and a
//! way to turn an authenticated user ID into a [`Principal`].

use crate::{
    types::{Principal, Role, User, UserId},
    Error, Result, Storage,
};
use parking_lot::Mutex;
use std::sync::Arc;

/// Registered users, keyed by ID with a unique username index
pub struct UserDirectory {
    storage: Arc<Storage>,

    /// Serializes the username uniqueness check with the insert
    register_lock: Mutex<()>,
}

impl UserDirectory {
    /// Create directory over shared storage
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            register_lock: Mutex::new(()),
        }
    }

    /// Register a user
    ///
    /// `credential_hash` is stored as given; hashing is the gateway's job.
    pub fn register(&self, username: &str, credential_hash: &str, role: Role) -> Result<User> {
        if username.trim().is_empty() {
            return Err(Error::InvalidRequest("username is required".to_string()));
        }
        if credential_hash.is_empty() {
            return Err(Error::InvalidRequest("credential is required".to_string()));
        }

        let _guard = self.register_lock.lock();

        if self.storage.user_id_by_username(username)?.is_some() {
            return Err(Error::DuplicateName(format!(
                "user {:?} already exists",
                username
            )));
        }

        let user = User {
            id: UserId::new(),
            username: username.to_string(),
            credential_hash: credential_hash.to_string(),
            role,
        };

        let mut txn = self.storage.begin();
        txn.insert_user(&user)?;
        txn.commit()?;

        tracing::info!(user_id = %user.id, role = %user.role, "User registered");

        Ok(user)
    }

    /// Get user by ID
    pub fn get_user(&self, user_id: UserId) -> Result<User> {
        self.storage.get_user(user_id)
    }

    /// Find user by username
    pub fn find_by_username(&self, username: &str) -> Result<Option<User>> {
        match self.storage.user_id_by_username(username)? {
            Some(id) => self.storage.get_user(id).map(Some),
            None => Ok(None),
        }
    }

    /// Resolve an authenticated user ID into the identity + role pair the core trusts
    pub fn resolve(&self, user_id: UserId) -> Result<Principal> {
        match self.storage.get_user(user_id) {
            Ok(user) => Ok(user.principal()),
            Err(Error::NotFound(_)) => Err(Error::InvalidRequest(format!(
                "user {} not found",
                user_id
            ))),
            Err(e) => Err(e),
        }
    }
}
