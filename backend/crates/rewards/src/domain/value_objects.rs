//! Value Objects

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RewardsError, RewardsResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(i16)]
pub enum UserRole {
    #[default]
    User = 0,
    Admin = 1,
}

impl UserRole {
    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    #[inline]
    pub const fn code(&self) -> &'static str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }

    #[inline]
    pub const fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }

    pub fn from_id(id: i16) -> Option<Self> {
        match id {
            0 => Some(UserRole::User),
            1 => Some(UserRole::Admin),
            _ => None,
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "user" => Some(UserRole::User),
            "admin" => Some(UserRole::Admin),
            _ => None,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PrizeType {
    /// Coins credited to the wallet
    Money,
    /// Physical item, redeemed at the booth via QR token
    Item,
    /// Consolation result, nothing granted
    Trash,
}

impl PrizeType {
    pub const fn code(&self) -> &'static str {
        match self {
            PrizeType::Money => "MONEY",
            PrizeType::Item => "ITEM",
            PrizeType::Trash => "TRASH",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "MONEY" => Some(PrizeType::Money),
            "ITEM" => Some(PrizeType::Item),
            "TRASH" => Some(PrizeType::Trash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Available,
    Redeemed,
}

impl ItemStatus {
    pub const fn code(&self) -> &'static str {
        match self {
            ItemStatus::Available => "AVAILABLE",
            ItemStatus::Redeemed => "REDEEMED",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "AVAILABLE" => Some(ItemStatus::Available),
            "REDEEMED" => Some(ItemStatus::Redeemed),
            _ => None,
        }
    }
}

/// Rarity tier of a prize; each tier owns a fixed share of the wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(i16)]
pub enum RarityTier {
    Common = 0,
    Rare = 1,
    Epic = 2,
    Legendary = 3,
}

impl RarityTier {
    pub const ALL: [RarityTier; 4] = [
        RarityTier::Common,
        RarityTier::Rare,
        RarityTier::Epic,
        RarityTier::Legendary,
    ];

    /// Share of the wheel in percent; the four tiers sum to 100.
    pub const fn percent(&self) -> u64 {
        match self {
            RarityTier::Common => 55,
            RarityTier::Rare => 20,
            RarityTier::Epic => 15,
            RarityTier::Legendary => 10,
        }
    }

    #[inline]
    pub const fn id(&self) -> i16 {
        *self as i16
    }

    pub fn from_id(id: i16) -> Option<Self> {
        RarityTier::ALL.into_iter().find(|tier| tier.id() == id)
    }
}

pub const DISPLAY_NAME_MAX_CHARS: usize = 64;
pub const AVATAR_URL_MAX_CHARS: usize = 512;

/// Fields a user may change on their own profile. Anything else is not
/// representable, so a patch can never touch balances or scores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProfilePatch {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.avatar_url.is_none()
    }

    /// Trims and validates every present field.
    pub fn normalized(self) -> RewardsResult<Self> {
        let display_name = match self.display_name {
            Some(name) => {
                let name = name.trim().to_string();
                let len = name.chars().count();
                if len == 0 || len > DISPLAY_NAME_MAX_CHARS {
                    return Err(RewardsError::InvalidInput(format!(
                        "displayName must be 1..={DISPLAY_NAME_MAX_CHARS} characters"
                    )));
                }
                Some(name)
            }
            None => None,
        };

        let avatar_url = match self.avatar_url {
            Some(url) => {
                let url = url.trim().to_string();
                if url.chars().count() > AVATAR_URL_MAX_CHARS {
                    return Err(RewardsError::InvalidInput(format!(
                        "avatarUrl must be at most {AVATAR_URL_MAX_CHARS} characters"
                    )));
                }
                Some(url)
            }
            None => None,
        };

        Ok(Self {
            display_name,
            avatar_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_role_codes() {
        assert_eq!(UserRole::from_code("admin"), Some(UserRole::Admin));
        assert_eq!(UserRole::from_code("root"), None);
        assert_eq!(UserRole::from_id(UserRole::Admin.id()), Some(UserRole::Admin));
        assert_eq!(UserRole::User.to_string(), "user");
        assert!(UserRole::Admin.is_admin());
        assert!(!UserRole::User.is_admin());
    }

    #[test]
    fn test_tier_percentages_sum_to_hundred() {
        let total: u64 = RarityTier::ALL.iter().map(RarityTier::percent).sum();
        assert_eq!(total, 100);
        assert_eq!(RarityTier::from_id(3), Some(RarityTier::Legendary));
        assert_eq!(RarityTier::from_id(9), None);
    }

    #[test]
    fn test_prize_and_item_codes() {
        assert_eq!(PrizeType::from_code("MONEY"), Some(PrizeType::Money));
        assert_eq!(PrizeType::from_code("money"), None);
        assert_eq!(ItemStatus::from_code(ItemStatus::Redeemed.code()), Some(ItemStatus::Redeemed));
    }

    #[test]
    fn test_profile_patch_validation() {
        let patch = ProfilePatch {
            display_name: Some("  Neo  ".to_string()),
            avatar_url: None,
        }
        .normalized()
        .unwrap();
        assert_eq!(patch.display_name.as_deref(), Some("Neo"));

        let blank = ProfilePatch {
            display_name: Some("   ".to_string()),
            avatar_url: None,
        };
        assert!(matches!(blank.normalized(), Err(RewardsError::InvalidInput(_))));

        let long_url = ProfilePatch {
            display_name: None,
            avatar_url: Some("x".repeat(AVATAR_URL_MAX_CHARS + 1)),
        };
        assert!(long_url.normalized().is_err());
    }

    #[test]
    fn test_profile_patch_rejects_unknown_fields() {
        let parsed = serde_json::from_str::<ProfilePatch>(r#"{"amount": 1000000}"#);
        assert!(parsed.is_err());

        let parsed: ProfilePatch = serde_json::from_str(r#"{"avatarUrl": "https://a/b.png"}"#).unwrap();
        assert!(!parsed.is_empty());
    }
}
