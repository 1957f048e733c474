use serde::{Deserialize, Serialize};

use super::{
    Catalog, CatalogError, Cost, EquipmentSlot, FishNode, ItemSpec, RecipeDef, RecipeId,
    RecipeSpecial, ResourceId, SkillId, TierDef, upper_first,
};
use crate::catalog::BuildingId;

const SMELT_DURATION_SEC: f64 = 2.5;
const FORGE_BASE_DURATION_SEC: f64 = 2.0;
const FORGE_DURATION_PER_BAR_SEC: f64 = 1.0;
const COOK_DURATION_SEC: f64 = 2.0;
const BAR_XP_PER_TIER_XP: f64 = 7.0;
const ITEM_XP_PER_TIER_XP_BAR: f64 = 12.0;

/// Sale price bracket for forged equipment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemSize {
    Small,
    Medium,
    Large,
}

/// A forged piece of equipment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemDef {
    pub id: ResourceId,
    pub name: String,
    pub slot: EquipmentSlot,
    /// Spec key such as `dagger` or `chestplate`.
    pub kind: String,
    pub size: ItemSize,
    pub tier: u32,
    pub bar_cost: u32,
    /// Smithing level to forge; also the level needed to wear it.
    pub level: u32,
    pub bar_id: ResourceId,
    pub xp: f64,
    pub max_durability: f64,
}

/// An ore vein available to the mining skill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MiningNode {
    pub id: ResourceId,
    pub name: String,
    pub level: u32,
    pub xp: f64,
    pub tier: u32,
}

/// Gathering bonuses granted by an equipped axe or pickaxe.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ToolPerks {
    pub speed_bonus: f64,
    pub no_durability_chance: f64,
    pub double_yield_chance: f64,
}

impl ToolPerks {
    #[must_use]
    pub fn for_tier(tier: u32) -> Self {
        if tier == 0 {
            return Self::default();
        }
        let speed_bonus = if tier >= 5 {
            0.1
        } else if tier >= 3 {
            0.05
        } else {
            0.0
        };
        let no_durability_chance = if tier >= 7 { 0.05 } else { 0.0 };
        let double_yield_chance = if tier >= 10 {
            0.1
        } else if tier >= 9 {
            0.05
        } else {
            0.0
        };
        Self {
            speed_bonus,
            no_durability_chance,
            double_yield_chance,
        }
    }

    /// Broken tools keep half their perks.
    #[must_use]
    pub fn halved(self) -> Self {
        Self {
            speed_bonus: self.speed_bonus * 0.5,
            no_durability_chance: self.no_durability_chance * 0.5,
            double_yield_chance: self.double_yield_chance * 0.5,
        }
    }
}

pub(super) fn expand_tiers(
    catalog: &mut Catalog,
    specs: &[ItemSpec],
    mut tiers: Vec<TierDef>,
) -> Result<(), CatalogError> {
    tiers.sort_by_key(|tier| tier.tier);
    for tier in &tiers {
        for ore in &tier.ores {
            catalog.insert_resource(ore.id.clone(), ore.name.clone())?;
            catalog.mining_nodes.push(MiningNode {
                id: ore.id.clone(),
                name: ore.name.clone(),
                level: ore.level,
                xp: ore.xp,
                tier: tier.tier,
            });
        }

        let bar = &tier.bar;
        catalog.insert_resource(bar.id.clone(), bar.name.clone())?;
        catalog.insert_recipe(RecipeDef {
            id: RecipeId::new(format!("smelt{}", upper_first(bar.id.as_str()))),
            name: format!("Smelt {}", bar.name),
            skill: SkillId::Smithing,
            duration_sec: SMELT_DURATION_SEC,
            inputs: bar.ore_cost.clone(),
            outputs: Cost::from([(bar.id.clone(), 1.0)]),
            xp: BAR_XP_PER_TIER_XP * tier.tier_xp,
            building: BuildingId::Forge,
            level: bar.level,
            special: None,
        })?;

        for spec in specs {
            let Some(&level) = tier.item_levels.get(&spec.key) else {
                continue;
            };
            let label = tier
                .label_overrides
                .get(&spec.key)
                .unwrap_or(&spec.label);
            let segment: String = label.chars().filter(char::is_ascii_alphanumeric).collect();
            let id = ResourceId::new(format!("{}{segment}", tier.key));
            let name = format!("{} {label}", tier.name);
            let bars = f64::from(spec.bars);
            catalog.insert_resource(id.clone(), name.clone())?;
            catalog.insert_recipe(RecipeDef {
                id: RecipeId::new(format!("forge{}", upper_first(id.as_str()))),
                name: format!("Forge {name}"),
                skill: SkillId::Smithing,
                duration_sec: bars.mul_add(FORGE_DURATION_PER_BAR_SEC, FORGE_BASE_DURATION_SEC),
                inputs: Cost::from([(bar.id.clone(), bars)]),
                outputs: Cost::from([(id.clone(), 1.0)]),
                xp: ITEM_XP_PER_TIER_XP_BAR * tier.tier_xp * bars,
                building: BuildingId::Forge,
                level,
                special: None,
            })?;
            catalog.items.insert(
                id.clone(),
                ItemDef {
                    id,
                    name,
                    slot: spec.slot,
                    kind: spec.key.clone(),
                    size: spec.size,
                    tier: tier.tier,
                    bar_cost: spec.bars,
                    level,
                    bar_id: bar.id.clone(),
                    xp: ITEM_XP_PER_TIER_XP_BAR * tier.tier_xp * bars,
                    max_durability: tier.durability,
                },
            );
        }
    }
    catalog.tiers = tiers;
    Ok(())
}

pub(super) fn expand_fish(catalog: &mut Catalog, fish: Vec<FishNode>) -> Result<(), CatalogError> {
    for mut node in fish {
        let suffix = upper_first(node.id.as_str());
        node.cooked = ResourceId::new(format!("cooked{suffix}"));
        node.burnt = ResourceId::new(format!("burnt{suffix}"));
        catalog.insert_resource(node.id.clone(), node.name.clone())?;
        catalog.insert_resource(node.cooked.clone(), format!("Cooked {}", node.name))?;
        catalog.insert_resource(node.burnt.clone(), format!("Burnt {}", node.name))?;
        catalog.insert_recipe(RecipeDef {
            id: RecipeId::new(format!("cook{suffix}")),
            name: format!("Cook {}", node.name),
            skill: SkillId::Cooking,
            duration_sec: COOK_DURATION_SEC,
            inputs: Cost::from([(node.id.clone(), 1.0)]),
            outputs: Cost::from([(node.cooked.clone(), 1.0)]),
            xp: node.cooking_xp,
            building: BuildingId::Campfire,
            level: node.cooking_level,
            special: Some(RecipeSpecial::CookFish {
                fish_level: node.level,
                burnt: node.burnt.clone(),
            }),
        })?;
        catalog.foods.insert(node.cooked.clone(), node.heal);
        catalog.fish.push(node);
    }
    Ok(())
}
