use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StaffId(pub String);

/// Every dashboard role the business recognizes. Role strings are stored
/// kebab-case; `parse` is the only way a string becomes a role.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StaffRole {
    Admin,
    Client,
    SalesTeam,
    SalesManager,
    Writer,
    ReferralPartner,
}

/// Roles whose members participate in lead rotation.
pub const ROTATION_ELIGIBLE_ROLES: [StaffRole; 2] =
    [StaffRole::SalesTeam, StaffRole::SalesManager];

impl StaffRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Client => "client",
            Self::SalesTeam => "sales-team",
            Self::SalesManager => "sales-manager",
            Self::Writer => "writer",
            Self::ReferralPartner => "referral-partner",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "client" => Some(Self::Client),
            "sales-team" => Some(Self::SalesTeam),
            "sales-manager" => Some(Self::SalesManager),
            "writer" => Some(Self::Writer),
            "referral-partner" => Some(Self::ReferralPartner),
            _ => None,
        }
    }

    pub fn is_rotation_eligible(&self) -> bool {
        ROTATION_ELIGIBLE_ROLES.contains(self)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalesTeamMember {
    pub id: StaffId,
    pub name: String,
    pub email: String,
    pub role: StaffRole,
}

#[cfg(test)]
mod tests {
    use super::{StaffRole, ROTATION_ELIGIBLE_ROLES};

    #[test]
    fn role_strings_round_trip() {
        for role in [
            StaffRole::Admin,
            StaffRole::Client,
            StaffRole::SalesTeam,
            StaffRole::SalesManager,
            StaffRole::Writer,
            StaffRole::ReferralPartner,
        ] {
            assert_eq!(StaffRole::parse(role.as_str()), Some(role));
        }
    }

    #[test]
    fn unknown_role_string_is_rejected() {
        assert_eq!(StaffRole::parse("sales"), None);
        assert_eq!(StaffRole::parse("SALES-TEAM"), None);
    }

    #[test]
    fn only_sales_roles_are_rotation_eligible() {
        assert!(StaffRole::SalesTeam.is_rotation_eligible());
        assert!(StaffRole::SalesManager.is_rotation_eligible());
        assert!(!StaffRole::Admin.is_rotation_eligible());
        assert!(!StaffRole::Writer.is_rotation_eligible());
        assert!(!StaffRole::ReferralPartner.is_rotation_eligible());
        assert_eq!(ROTATION_ELIGIBLE_ROLES.len(), 2);
    }
}
