//! Sign-in sessions.
//!
//! Reservations can only be created by a signed-in user, so the booking
//! routes resolve the caller through an [`IdentityProvider`]. [`LocalIdentity`]
//! keeps accounts and sessions in memory.

use crate::{
    error::BookingError,
    types::{Session, User},
};
use futures::StreamExt;
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tokio::{
    sync::watch::{self, Sender},
    task::JoinHandle,
};
use tokio_stream::wrappers::WatchStream;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityEvent {
    SignedIn(User),
    SignedOut(User),
}

pub trait IdentityProvider: Send + Sync + 'static {
    fn sign_up(&self, email: &str, password: &str) -> Result<User, BookingError>;
    fn sign_in(&self, email: &str, password: &str) -> Result<Session, BookingError>;
    fn sign_out(&self, token: Uuid) -> Result<(), BookingError>;
    fn current_user(&self, token: Uuid) -> Option<User>;
    /// Yields the latest identity change. Bursts may be coalesced.
    fn subscribe(&self) -> WatchStream<Option<IdentityEvent>>;
}

pub const DEFAULT_PASSWORD_ITERATIONS: u32 = 200_000;

struct Account {
    user: User,
    salt: [u8; 16],
    password_key: [u8; 32],
}

#[derive(Default)]
struct IdentityData {
    accounts: HashMap<String, Account>,
    sessions: HashMap<Uuid, User>,
}

#[derive(Clone)]
pub struct LocalIdentity {
    data: Arc<Mutex<IdentityData>>,
    sender: Sender<Option<IdentityEvent>>,
    iterations: u32,
}

impl Default for LocalIdentity {
    fn default() -> Self {
        Self::with_iterations(DEFAULT_PASSWORD_ITERATIONS)
    }
}

impl LocalIdentity {
    /// `iterations` is the PBKDF2 round count used for every stored password.
    pub fn with_iterations(iterations: u32) -> Self {
        let (sender, _) = watch::channel(None);
        Self {
            data: Arc::default(),
            sender,
            iterations: iterations.max(1),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, IdentityData>, BookingError> {
        self.data.lock().map_err(|err| {
            error!(%err, "Identity store lock poisoned");
            BookingError::Store("Identity store is unavailable".into())
        })
    }

    fn publish(&self, event: IdentityEvent) {
        // No receivers is fine, nobody is listening yet.
        let _ = self.sender.send(Some(event));
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, iterations, &mut key);
    key
}

impl IdentityProvider for LocalIdentity {
    fn sign_up(&self, email: &str, password: &str) -> Result<User, BookingError> {
        let email = normalize_email(email);
        let mut data = self.lock()?;
        if data.accounts.contains_key(&email) {
            return Err(BookingError::Validation(format!(
                "An account for {email} already exists"
            )));
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.clone(),
        };
        let mut salt = [0u8; 16];
        OsRng.fill_bytes(&mut salt);
        let account = Account {
            user: user.clone(),
            salt,
            password_key: derive_key(password, &salt, self.iterations),
        };
        data.accounts.insert(email, account);
        info!(user = %user.id, "Account created");
        Ok(user)
    }

    fn sign_in(&self, email: &str, password: &str) -> Result<Session, BookingError> {
        let email = normalize_email(email);
        let session = {
            let mut data = self.lock()?;
            let user = match data.accounts.get(&email) {
                Some(account)
                    if account.password_key
                        == derive_key(password, &account.salt, self.iterations) =>
                {
                    account.user.clone()
                }
                _ => return Err(BookingError::Unauthorized),
            };
            let token = Uuid::new_v4();
            data.sessions.insert(token, user.clone());
            Session { token, user }
        };
        self.publish(IdentityEvent::SignedIn(session.user.clone()));
        Ok(session)
    }

    fn sign_out(&self, token: Uuid) -> Result<(), BookingError> {
        let user = self
            .lock()?
            .sessions
            .remove(&token)
            .ok_or(BookingError::AuthenticationRequired)?;
        self.publish(IdentityEvent::SignedOut(user));
        Ok(())
    }

    fn current_user(&self, token: Uuid) -> Option<User> {
        self.lock().ok()?.sessions.get(&token).cloned()
    }

    fn subscribe(&self) -> WatchStream<Option<IdentityEvent>> {
        WatchStream::new(self.sender.subscribe())
    }
}

/// Logs every identity change until the returned task is aborted.
pub fn spawn_identity_listener(identity: &dyn IdentityProvider) -> JoinHandle<()> {
    let mut events = identity.subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.next().await {
            match event {
                Some(IdentityEvent::SignedIn(user)) => info!(user = %user.id, "Signed in"),
                Some(IdentityEvent::SignedOut(user)) => info!(user = %user.id, "Signed out"),
                None => {}
            }
        }
    })
}
