//! Organizational scope: who a profile or suggestion belongs to.

use serde::{Deserialize, Serialize};

use crate::id::{CustomerId, DealerId, TenantId};

/// The tenant/organizational boundary a weight profile and its suggestions
/// belong to.
///
/// Scope is always at least tenant-wide; a dealer or customer refinement
/// narrows it. Two scopes are the same profile owner only if all three parts
/// match, so dealer- and customer-refined profiles never contend with the
/// tenant-wide one.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub tenant_id: TenantId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dealer_id: Option<DealerId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_id: Option<CustomerId>,
}

impl Scope {
    /// Tenant-wide scope.
    pub fn tenant(tenant_id: TenantId) -> Self {
        Self {
            tenant_id,
            dealer_id: None,
            customer_id: None,
        }
    }

    pub fn with_dealer(mut self, dealer_id: DealerId) -> Self {
        self.dealer_id = Some(dealer_id);
        self
    }

    pub fn with_customer(mut self, customer_id: CustomerId) -> Self {
        self.customer_id = Some(customer_id);
        self
    }
}

impl core::fmt::Display for Scope {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.tenant_id)?;
        if let Some(d) = &self.dealer_id {
            write!(f, "/dealer:{d}")?;
        }
        if let Some(c) = &self.customer_id {
            write!(f, "/customer:{c}")?;
        }
        Ok(())
    }
}
