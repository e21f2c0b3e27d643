use std::sync::Arc;

use crate::services::{auth::SessionVerifier, billing::StripeClient, enhance::EnhanceService};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub enhance: Arc<EnhanceService>,
    /// Present when billing is configured.
    pub billing: Option<Arc<StripeClient>>,
    /// Present when enhance routes require a signed-in session.
    pub auth: Option<Arc<SessionVerifier>>,
}

impl AppState {
    pub fn new(enhance: EnhanceService) -> Self {
        Self {
            enhance: Arc::new(enhance),
            billing: None,
            auth: None,
        }
    }

    pub fn with_billing(mut self, billing: StripeClient) -> Self {
        self.billing = Some(Arc::new(billing));
        self
    }

    pub fn with_auth(mut self, verifier: SessionVerifier) -> Self {
        self.auth = Some(Arc::new(verifier));
        self
    }
}
