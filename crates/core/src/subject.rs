//! Subject references: what a suggestion is about.

use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::id::{EquipmentId, SiteId};

/// Equipment type code, e.g. `"excavator-20t"` or `"scissor-lift"`.
///
/// Opaque to the engine; the surrounding application owns the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EquipmentType(String);

impl EquipmentType {
    pub fn new(code: impl Into<String>) -> Result<Self, DomainError> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(DomainError::validation("equipment type cannot be empty"));
        }
        Ok(Self(code))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for EquipmentType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a candidate or suggestion is about: a single unit, a whole site, or
/// an equipment type at a site (fleet-balancing granularity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubjectRef {
    Equipment { equipment_id: EquipmentId },
    Site { site_id: SiteId },
    SiteEquipmentType {
        site_id: SiteId,
        equipment_type: EquipmentType,
    },
}

impl SubjectRef {
    pub fn equipment(equipment_id: EquipmentId) -> Self {
        Self::Equipment { equipment_id }
    }

    pub fn site(site_id: SiteId) -> Self {
        Self::Site { site_id }
    }

    pub fn site_equipment_type(site_id: SiteId, equipment_type: EquipmentType) -> Self {
        Self::SiteEquipmentType {
            site_id,
            equipment_type,
        }
    }
}

impl core::fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            SubjectRef::Equipment { equipment_id } => write!(f, "equipment:{equipment_id}"),
            SubjectRef::Site { site_id } => write!(f, "site:{site_id}"),
            SubjectRef::SiteEquipmentType {
                site_id,
                equipment_type,
            } => write!(f, "site:{site_id}/type:{equipment_type}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equipment_type_rejects_blank() {
        assert!(EquipmentType::new("   ").is_err());
        assert!(EquipmentType::new("boom-lift").is_ok());
    }
}
