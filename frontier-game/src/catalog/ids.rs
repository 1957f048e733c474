//! Typed identifiers shared by the catalog, state, and actions.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Key into the resource ledger. Equipment items are resources too.
    ResourceId
);
string_id!(
    /// Key into the recipe table.
    RecipeId
);

/// Every trainable skill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkillId {
    Woodcutting,
    Mining,
    Fishing,
    Scavenging,
    Farming,
    Smithing,
    Cooking,
    Alchemy,
    Combat,
}

impl SkillId {
    pub const ALL: [Self; 9] = [
        Self::Woodcutting,
        Self::Mining,
        Self::Fishing,
        Self::Scavenging,
        Self::Farming,
        Self::Smithing,
        Self::Cooking,
        Self::Alchemy,
        Self::Combat,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Woodcutting => "woodcutting",
            Self::Mining => "mining",
            Self::Fishing => "fishing",
            Self::Scavenging => "scavenging",
            Self::Farming => "farming",
            Self::Smithing => "smithing",
            Self::Cooking => "cooking",
            Self::Alchemy => "alchemy",
            Self::Combat => "combat",
        }
    }

    /// Skills that can run as a gather activity.
    #[must_use]
    pub const fn is_gathering(self) -> bool {
        matches!(
            self,
            Self::Woodcutting | Self::Mining | Self::Fishing | Self::Scavenging
        )
    }
}

impl fmt::Display for SkillId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SkillId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|skill| skill.as_str() == s)
            .ok_or(())
    }
}

/// Every upgradable building.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum BuildingId {
    Campfire,
    Workshop,
    Forge,
    AlchemistHut,
    Barracks,
    Storehouse,
    ScoutLodge,
    TownHall,
}

impl BuildingId {
    pub const ALL: [Self; 8] = [
        Self::Campfire,
        Self::Workshop,
        Self::Forge,
        Self::AlchemistHut,
        Self::Barracks,
        Self::Storehouse,
        Self::ScoutLodge,
        Self::TownHall,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Campfire => "campfire",
            Self::Workshop => "workshop",
            Self::Forge => "forge",
            Self::AlchemistHut => "alchemistHut",
            Self::Barracks => "barracks",
            Self::Storehouse => "storehouse",
            Self::ScoutLodge => "scoutLodge",
            Self::TownHall => "townHall",
        }
    }
}

impl fmt::Display for BuildingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildingId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|building| building.as_str() == s)
            .ok_or(())
    }
}

/// Equipment slots. Armor slots feed toughness, tool slots feed gather perks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EquipmentSlot {
    Weapon,
    Head,
    Chest,
    Legs,
    Boots,
    Shield,
    Pickaxe,
    Axe,
}

impl EquipmentSlot {
    pub const ALL: [Self; 8] = [
        Self::Weapon,
        Self::Head,
        Self::Chest,
        Self::Legs,
        Self::Boots,
        Self::Shield,
        Self::Pickaxe,
        Self::Axe,
    ];

    pub const ARMOR: [Self; 5] = [Self::Head, Self::Chest, Self::Legs, Self::Boots, Self::Shield];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Weapon => "weapon",
            Self::Head => "head",
            Self::Chest => "chest",
            Self::Legs => "legs",
            Self::Boots => "boots",
            Self::Shield => "shield",
            Self::Pickaxe => "pickaxe",
            Self::Axe => "axe",
        }
    }

    #[must_use]
    pub const fn is_armor(self) -> bool {
        matches!(
            self,
            Self::Head | Self::Chest | Self::Legs | Self::Boots | Self::Shield
        )
    }

    /// Skill whose level gates equipping items in this slot.
    #[must_use]
    pub const fn governing_skill(self) -> SkillId {
        match self {
            Self::Pickaxe => SkillId::Mining,
            Self::Axe => SkillId::Woodcutting,
            _ => SkillId::Combat,
        }
    }
}

impl fmt::Display for EquipmentSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EquipmentSlot {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or(())
    }
}

/// Potion behaviour families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PotionKind {
    /// Instant heal inside an encounter.
    Heal,
    /// Heals a fixed amount every interval while active.
    Regen,
    /// Adds to the player's hit chance while active.
    Accuracy,
}

impl PotionKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Heal => "heal",
            Self::Regen => "regen",
            Self::Accuracy => "accuracy",
        }
    }

    #[must_use]
    pub const fn is_buff(self) -> bool {
        !matches!(self, Self::Heal)
    }
}

impl fmt::Display for PotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
