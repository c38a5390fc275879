//! Authenticated identity boundary

use std::sync::RwLock;

use crate::models::principal::Principal;

/// Source of the currently authenticated principal
pub trait IdentityProvider: Send + Sync {
    /// Current authenticated principal, if logged in
    fn current_principal(&self) -> Option<Principal>;

    /// Whether `principal` is the currently authenticated one
    fn is_current(&self, principal: &Principal) -> bool {
        self.current_principal()
            .is_some_and(|current| &current == principal)
    }
}

/// Identity provider holding a principal set by the embedding application
pub struct StaticIdentity {
    principal: RwLock<Option<Principal>>,
}

impl StaticIdentity {
    pub fn new(principal: Option<Principal>) -> Self {
        Self {
            principal: RwLock::new(principal),
        }
    }

    pub fn logged_in(principal: Principal) -> Self {
        Self::new(Some(principal))
    }

    pub fn set_principal(&self, principal: Option<Principal>) {
        let mut slot = self.principal.write().unwrap_or_else(|e| e.into_inner());
        *slot = principal;
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_principal(&self) -> Option<Principal> {
        let slot = self.principal.read().unwrap_or_else(|e| e.into_inner());
        slot.clone()
    }
}
