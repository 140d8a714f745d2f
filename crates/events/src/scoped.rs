use fleetiq_core::TenantId;

use crate::EventEnvelope;

/// Helper trait for tenant-scoped messages.
///
/// Marks types carrying a tenant id so tenant-pinned consumers (the per-scope
/// feedback worker, for one) can filter or reject messages from other tenants
/// in their subscription loops.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

impl<E> TenantScoped for EventEnvelope<E> {
    fn tenant_id(&self) -> TenantId {
        EventEnvelope::tenant_id(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn envelopes_expose_their_tenant() {
        let tenant_id = TenantId::new();
        let envelope = EventEnvelope::new(
            Uuid::now_v7(),
            tenant_id,
            Uuid::now_v7(),
            "suggestion",
            1,
            (),
        );
        assert_eq!(TenantScoped::tenant_id(&envelope), tenant_id);
    }
}
