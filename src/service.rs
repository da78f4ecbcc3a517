use std::sync::Arc;

use crate::{k8s::Applier, providers::Provider};

/// Long-lived collaborators shared by every request.
#[derive(Debug, Clone)]
pub struct ServiceHandler {
    provider: Arc<dyn Provider>,
    applier: Applier,
}

impl ServiceHandler {
    pub fn new(provider: Arc<dyn Provider>, applier: Applier) -> Self {
        Self { provider, applier }
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }

    pub fn applier(&self) -> &Applier {
        &self.applier
    }
}
