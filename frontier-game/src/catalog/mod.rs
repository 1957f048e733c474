//! Static content tables consumed read-only by the simulation.
//!
//! The catalog is plain data injected into every tick and action. Tier
//! tables and the fish table are expanded into concrete ores, bars,
//! equipment, and recipes at load time, then every cross-reference is
//! validated so that an unknown id fails fast here instead of surfacing as
//! a silent no-op deep inside the simulation.

mod ids;
mod items;

pub use ids::{BuildingId, EquipmentSlot, PotionKind, RecipeId, ResourceId, SkillId};
pub use items::{ItemDef, ItemSize, MiningNode, ToolPerks};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

const DEFAULT_CATALOG_DATA: &str = include_str!("default_catalog.json");

/// Resource amounts keyed by id, used for costs, outputs, and trickles.
pub type Cost = BTreeMap<ResourceId, f64>;

/// Errors raised while loading or validating content.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog JSON is malformed: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("duplicate {kind} id `{id}`")]
    DuplicateId { kind: &'static str, id: String },
    #[error("{context} references unknown resource `{id}`")]
    UnknownResource { context: String, id: String },
    #[error("{context}: {field} must be positive (got {value})")]
    NonPositive {
        context: String,
        field: &'static str,
        value: f64,
    },
    #[error("building `{0}` is missing from the catalog")]
    MissingBuilding(BuildingId),
    #[error("gathering skill `{0}` has no gather rates")]
    MissingGatherRates(SkillId),
    #[error("{context} is empty")]
    Empty { context: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDef {
    pub id: ResourceId,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatherRates {
    pub base_xp_per_second: f64,
    pub base_yield_per_second: f64,
    #[serde(default = "GatherRates::default_interval")]
    pub interval_sec: f64,
}

impl GatherRates {
    const fn default_interval() -> f64 {
        1.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillDef {
    pub id: SkillId,
    pub name: String,
    #[serde(default)]
    pub gather: Option<GatherRates>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingDef {
    pub id: BuildingId,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    pub base_cost: Cost,
    pub cost_scale: f64,
    /// Per-level resources credited each idle second.
    #[serde(default)]
    pub idle_trickle: Cost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSpec {
    pub key: String,
    pub slot: EquipmentSlot,
    pub label: String,
    pub bars: u32,
    pub size: ItemSize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OreDef {
    pub id: ResourceId,
    pub name: String,
    pub level: u32,
    pub xp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BarDef {
    pub id: ResourceId,
    pub name: String,
    pub level: u32,
    pub ore_cost: Cost,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierDef {
    pub tier: u32,
    pub key: String,
    pub name: String,
    pub tier_xp: f64,
    pub durability: f64,
    pub ores: Vec<OreDef>,
    pub bar: BarDef,
    pub item_levels: BTreeMap<String, u32>,
    #[serde(default)]
    pub label_overrides: BTreeMap<String, String>,
}

/// A fishing spot together with the cooked and burnt products of its catch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FishNode {
    pub id: ResourceId,
    pub name: String,
    pub level: u32,
    pub fishing_xp: f64,
    pub cooking_level: u32,
    pub cooking_xp: f64,
    pub heal: f64,
    #[serde(skip_deserializing)]
    pub cooked: ResourceId,
    #[serde(skip_deserializing)]
    pub burnt: ResourceId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScavengingZone {
    pub id: String,
    pub name: String,
    pub level: u32,
    pub xp: f64,
    pub rolls: f64,
    pub reagents: Vec<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CropDef {
    pub id: ResourceId,
    pub name: String,
    pub tier: u32,
    pub level: u32,
    pub grow_sec: f64,
    pub yield_min: u32,
    pub yield_max: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PotionDef {
    pub id: ResourceId,
    pub kind: PotionKind,
    pub level: u32,
    pub amount: f64,
    #[serde(default)]
    pub duration_sec: f64,
    #[serde(default)]
    pub interval_sec: f64,
    pub cooldown_sec: f64,
}

/// Post-processing applied when a craft cycle completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum RecipeSpecial {
    #[serde(rename_all = "camelCase")]
    CookFish { fish_level: u32, burnt: ResourceId },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDef {
    pub id: RecipeId,
    pub name: String,
    pub skill: SkillId,
    pub duration_sec: f64,
    pub inputs: Cost,
    pub outputs: Cost,
    pub xp: f64,
    pub building: BuildingId,
    #[serde(default = "RecipeDef::default_level")]
    pub level: u32,
    #[serde(default)]
    pub special: Option<RecipeSpecial>,
}

impl RecipeDef {
    const fn default_level() -> u32 {
        1
    }
}

/// Sell price tables indexed by `tier - 1`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EconomyTables {
    pub ore_prices: Vec<f64>,
    pub bar_prices: Vec<f64>,
    pub small_item_prices: Vec<f64>,
    pub medium_item_prices: Vec<f64>,
    pub large_item_prices: Vec<f64>,
    pub flat_prices: Cost,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCatalog {
    resources: Vec<ResourceDef>,
    skills: Vec<SkillDef>,
    buildings: Vec<BuildingDef>,
    #[serde(default)]
    item_specs: Vec<ItemSpec>,
    #[serde(default)]
    tiers: Vec<TierDef>,
    #[serde(default)]
    fish: Vec<FishNode>,
    #[serde(default)]
    scavenging_zones: Vec<ScavengingZone>,
    #[serde(default)]
    crops: Vec<CropDef>,
    #[serde(default = "RawCatalog::default_patches")]
    farming_patches: usize,
    #[serde(default)]
    potions: Vec<PotionDef>,
    #[serde(default)]
    foods: Cost,
    #[serde(default)]
    recipes: Vec<RecipeDef>,
    #[serde(default)]
    economy: EconomyTables,
    #[serde(default)]
    starting_resources: Cost,
}

impl RawCatalog {
    const fn default_patches() -> usize {
        3
    }
}

/// Validated, expanded content.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub resources: BTreeMap<ResourceId, ResourceDef>,
    pub skills: BTreeMap<SkillId, SkillDef>,
    pub buildings: BTreeMap<BuildingId, BuildingDef>,
    pub tiers: Vec<TierDef>,
    pub items: BTreeMap<ResourceId, ItemDef>,
    pub mining_nodes: Vec<MiningNode>,
    pub fish: Vec<FishNode>,
    pub scavenging_zones: Vec<ScavengingZone>,
    pub crops: Vec<CropDef>,
    pub farming_patches: usize,
    pub potions: BTreeMap<ResourceId, PotionDef>,
    /// Heal amount per edible resource.
    pub foods: BTreeMap<ResourceId, f64>,
    pub recipes: BTreeMap<RecipeId, RecipeDef>,
    pub economy: EconomyTables,
    pub starting_resources: Cost,
}

impl Catalog {
    /// Load the content bundled with the crate.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded JSON fails to parse or validate.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(DEFAULT_CATALOG_DATA)
    }

    /// Parse, expand, and validate a catalog.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed JSON, duplicate ids, or references to
    /// resources that do not exist.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(json)?;
        let mut catalog = Self {
            resources: BTreeMap::new(),
            skills: BTreeMap::new(),
            buildings: BTreeMap::new(),
            tiers: Vec::new(),
            items: BTreeMap::new(),
            mining_nodes: Vec::new(),
            fish: Vec::new(),
            scavenging_zones: raw.scavenging_zones,
            crops: Vec::new(),
            farming_patches: raw.farming_patches,
            potions: BTreeMap::new(),
            foods: BTreeMap::new(),
            recipes: BTreeMap::new(),
            economy: raw.economy,
            starting_resources: raw.starting_resources,
        };

        for resource in raw.resources {
            catalog.insert_resource(resource.id, resource.name)?;
        }
        for skill in raw.skills {
            if catalog.skills.contains_key(&skill.id) {
                return Err(duplicate("skill", skill.id.as_str()));
            }
            catalog.skills.insert(skill.id, skill);
        }
        for building in raw.buildings {
            if catalog.buildings.contains_key(&building.id) {
                return Err(duplicate("building", building.id.as_str()));
            }
            catalog.buildings.insert(building.id, building);
        }
        for recipe in raw.recipes {
            catalog.insert_recipe(recipe)?;
        }

        items::expand_tiers(&mut catalog, &raw.item_specs, raw.tiers)?;
        items::expand_fish(&mut catalog, raw.fish)?;

        for crop in raw.crops {
            catalog.insert_resource(crop.id.clone(), crop.name.clone())?;
            catalog.crops.push(crop);
        }
        for potion in raw.potions {
            if catalog.potions.contains_key(&potion.id) {
                return Err(duplicate("potion", potion.id.as_str()));
            }
            catalog.potions.insert(potion.id.clone(), potion);
        }
        for (food, heal) in raw.foods {
            catalog.foods.insert(food, heal);
        }

        catalog.validate()?;
        Ok(catalog)
    }

    /// Check every cross-reference and numeric invariant.
    ///
    /// # Errors
    ///
    /// Returns the first violation found.
    pub fn validate(&self) -> Result<(), CatalogError> {
        for id in BuildingId::ALL {
            let Some(building) = self.buildings.get(&id) else {
                return Err(CatalogError::MissingBuilding(id));
            };
            let context = format!("building `{id}`");
            self.check_cost(&context, &building.base_cost)?;
            self.check_cost(&context, &building.idle_trickle)?;
            check_positive(&context, "costScale", building.cost_scale)?;
        }
        for skill in SkillId::ALL.into_iter().filter(|s| s.is_gathering()) {
            let rates = self
                .skills
                .get(&skill)
                .and_then(|def| def.gather)
                .ok_or(CatalogError::MissingGatherRates(skill))?;
            check_positive(&format!("skill `{skill}`"), "intervalSec", rates.interval_sec)?;
        }
        for recipe in self.recipes.values() {
            let context = format!("recipe `{}`", recipe.id);
            self.check_cost(&context, &recipe.inputs)?;
            self.check_cost(&context, &recipe.outputs)?;
            check_positive(&context, "durationSec", recipe.duration_sec)?;
            if let Some(RecipeSpecial::CookFish { burnt, .. }) = &recipe.special {
                self.check_resource(&context, burnt)?;
            }
        }
        for zone in &self.scavenging_zones {
            let context = format!("scavenging zone `{}`", zone.id);
            if zone.reagents.is_empty() {
                return Err(CatalogError::Empty { context });
            }
            for reagent in &zone.reagents {
                self.check_resource(&context, reagent)?;
            }
        }
        for potion in self.potions.values() {
            let context = format!("potion `{}`", potion.id);
            self.check_resource(&context, &potion.id)?;
            check_positive(&context, "amount", potion.amount)?;
            if potion.kind.is_buff() {
                check_positive(&context, "durationSec", potion.duration_sec)?;
            }
        }
        for food in self.foods.keys() {
            self.check_resource("foods", food)?;
        }
        for crop in &self.crops {
            check_positive(&format!("crop `{}`", crop.id), "growSec", crop.grow_sec)?;
        }
        self.check_cost("startingResources", &self.starting_resources)?;
        self.check_cost("economy.flatPrices", &self.economy.flat_prices)?;
        if self.mining_nodes.is_empty() {
            return Err(CatalogError::Empty {
                context: "mining nodes".to_string(),
            });
        }
        Ok(())
    }

    #[must_use]
    pub fn resource_name<'a>(&'a self, id: &'a str) -> &'a str {
        self.resources.get(id).map_or(id, |def| def.name.as_str())
    }

    #[must_use]
    pub fn gather_rates(&self, skill: SkillId) -> Option<GatherRates> {
        self.skills.get(&skill).and_then(|def| def.gather)
    }

    #[must_use]
    pub fn building(&self, id: BuildingId) -> Option<&BuildingDef> {
        self.buildings.get(&id)
    }

    #[must_use]
    pub fn item(&self, id: &str) -> Option<&ItemDef> {
        self.items.get(id)
    }

    /// Maximum durability for an equipment item, zero when unknown.
    #[must_use]
    pub fn max_durability(&self, id: &str) -> f64 {
        self.item(id).map_or(0.0, |item| item.max_durability)
    }

    #[must_use]
    pub fn recipe(&self, id: &str) -> Option<&RecipeDef> {
        self.recipes.get(id)
    }

    #[must_use]
    pub fn mining_node(&self, id: &str) -> Option<&MiningNode> {
        self.mining_nodes.iter().find(|node| node.id.as_str() == id)
    }

    #[must_use]
    pub fn fish_node(&self, id: &str) -> Option<&FishNode> {
        self.fish.iter().find(|fish| fish.id.as_str() == id)
    }

    #[must_use]
    pub fn scavenging_zone(&self, id: &str) -> Option<&ScavengingZone> {
        self.scavenging_zones.iter().find(|zone| zone.id == id)
    }

    #[must_use]
    pub fn crop(&self, id: &str) -> Option<&CropDef> {
        self.crops.iter().find(|crop| crop.id.as_str() == id)
    }

    #[must_use]
    pub fn potion(&self, id: &str) -> Option<&PotionDef> {
        self.potions.get(id)
    }

    #[must_use]
    pub fn food_heal(&self, id: &str) -> Option<f64> {
        self.foods.get(id).copied()
    }

    /// Gold received for selling one unit, zero when the resource has no price.
    #[must_use]
    pub fn sell_price(&self, id: &str) -> f64 {
        let by_tier = |table: &[f64], tier: u32| -> f64 {
            usize::try_from(tier.saturating_sub(1))
                .ok()
                .and_then(|idx| table.get(idx).copied())
                .unwrap_or(0.0)
        };
        if let Some(node) = self.mining_node(id) {
            return by_tier(&self.economy.ore_prices, node.tier);
        }
        if let Some(tier) = self.tiers.iter().find(|tier| tier.bar.id.as_str() == id) {
            return by_tier(&self.economy.bar_prices, tier.tier);
        }
        if let Some(item) = self.item(id) {
            let table = match item.size {
                ItemSize::Small => &self.economy.small_item_prices,
                ItemSize::Medium => &self.economy.medium_item_prices,
                ItemSize::Large => &self.economy.large_item_prices,
            };
            return by_tier(table, item.tier);
        }
        self.economy.flat_prices.get(id).copied().unwrap_or(0.0)
    }

    fn insert_resource(&mut self, id: ResourceId, name: String) -> Result<(), CatalogError> {
        if self.resources.contains_key(&id) {
            return Err(duplicate("resource", id.as_str()));
        }
        self.resources.insert(id.clone(), ResourceDef { id, name });
        Ok(())
    }

    fn insert_recipe(&mut self, recipe: RecipeDef) -> Result<(), CatalogError> {
        if self.recipes.contains_key(&recipe.id) {
            return Err(duplicate("recipe", recipe.id.as_str()));
        }
        self.recipes.insert(recipe.id.clone(), recipe);
        Ok(())
    }

    fn check_resource(&self, context: &str, id: &ResourceId) -> Result<(), CatalogError> {
        if self.resources.contains_key(id) {
            Ok(())
        } else {
            Err(CatalogError::UnknownResource {
                context: context.to_string(),
                id: id.to_string(),
            })
        }
    }

    fn check_cost(&self, context: &str, cost: &Cost) -> Result<(), CatalogError> {
        for id in cost.keys() {
            self.check_resource(context, id)?;
        }
        Ok(())
    }
}

fn duplicate(kind: &'static str, id: &str) -> CatalogError {
    CatalogError::DuplicateId {
        kind,
        id: id.to_string(),
    }
}

fn check_positive(context: &str, field: &'static str, value: f64) -> Result<(), CatalogError> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(CatalogError::NonPositive {
            context: context.to_string(),
            field,
            value,
        })
    }
}

/// Capitalise the first character, used to derive ids like `cookedPebblefin`.
pub(crate) fn upper_first(value: &str) -> String {
    let mut chars = value.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
