use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fuelcert_core::{DomainError, DomainResult, Entity, FuelerId, UserId};

/// Fueler status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuelerStatus {
    Active,
    Inactive,
}

impl FuelerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FuelerStatus::Active => "active",
            FuelerStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(FuelerStatus::Active),
            "inactive" => Ok(FuelerStatus::Inactive),
            other => Err(DomainError::validation(format!(
                "status must be one of: active, inactive (got '{other}')"
            ))),
        }
    }
}

/// A certifiable employee profile, one-to-one with an account identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fueler {
    pub id: FuelerId,
    /// Account behind the profile; unique across the registry.
    pub user_id: UserId,
    pub name: String,
    /// Identifier of the handheld device the fueler carries on the ramp.
    pub handheld_name: Option<String>,
    pub status: FuelerStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Fueler {
    type Id = FuelerId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

/// Command: RegisterFueler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisterFueler {
    pub fueler_id: FuelerId,
    pub user_id: UserId,
    pub name: String,
    pub handheld_name: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Command: UpdateFueler. `None` keeps the existing value; an empty handheld name
/// unassigns the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateFueler {
    pub name: Option<String>,
    pub handheld_name: Option<String>,
}

impl Fueler {
    /// New profiles start active.
    pub fn register(cmd: RegisterFueler) -> DomainResult<Self> {
        let name = cmd.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("fueler name cannot be empty"));
        }

        Ok(Self {
            id: cmd.fueler_id,
            user_id: cmd.user_id,
            name: name.to_string(),
            handheld_name: normalize_handheld(cmd.handheld_name),
            status: FuelerStatus::Active,
            created_at: cmd.occurred_at,
            updated_at: cmd.occurred_at,
        })
    }

    pub fn apply_update(&mut self, update: UpdateFueler, now: DateTime<Utc>) -> DomainResult<()> {
        let name = match update.name {
            Some(name) => {
                let name = name.trim().to_string();
                if name.is_empty() {
                    return Err(DomainError::validation("fueler name cannot be empty"));
                }
                name
            }
            None => self.name.clone(),
        };

        self.name = name;
        if update.handheld_name.is_some() {
            self.handheld_name = normalize_handheld(update.handheld_name);
        }
        self.updated_at = now;
        Ok(())
    }

    /// Toggle the lifecycle status. Setting the status the profile already has is a conflict.
    pub fn set_status(&mut self, status: FuelerStatus, now: DateTime<Utc>) -> DomainResult<()> {
        if self.status == status {
            return Err(DomainError::conflict(format!(
                "fueler is already {}",
                status.as_str()
            )));
        }
        self.status = status;
        self.updated_at = now;
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == FuelerStatus::Active
    }
}

fn normalize_handheld(raw: Option<String>) -> Option<String> {
    raw.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fueler(name: &str) -> DomainResult<Fueler> {
        Fueler::register(RegisterFueler {
            fueler_id: FuelerId::new(),
            user_id: UserId::new(),
            name: name.to_string(),
            handheld_name: Some(" FUELER-1 ".to_string()),
            occurred_at: Utc::now(),
        })
    }

    #[test]
    fn register_starts_active() {
        let f = fueler("Fueler One").unwrap();
        assert!(f.is_active());
        assert_eq!(f.handheld_name.as_deref(), Some("FUELER-1"));
    }

    #[test]
    fn register_rejects_blank_name() {
        assert!(matches!(fueler("  "), Err(DomainError::Validation(_))));
    }

    #[test]
    fn status_toggle_is_explicit() {
        let mut f = fueler("Fueler Two").unwrap();
        f.set_status(FuelerStatus::Inactive, Utc::now()).unwrap();
        assert!(!f.is_active());

        let err = f.set_status(FuelerStatus::Inactive, Utc::now()).unwrap_err();
        assert!(matches!(err, DomainError::Conflict(_)));
    }

    #[test]
    fn update_can_unassign_handheld() {
        let mut f = fueler("Fueler Three").unwrap();
        f.apply_update(
            UpdateFueler {
                name: None,
                handheld_name: Some(String::new()),
            },
            Utc::now(),
        )
        .unwrap();
        assert_eq!(f.handheld_name, None);
        assert_eq!(f.name, "Fueler Three");
    }

    #[test]
    fn parse_status() {
        assert_eq!(FuelerStatus::parse("Inactive").unwrap(), FuelerStatus::Inactive);
        assert!(FuelerStatus::parse("retired").is_err());
    }
}
