//! Static game data: resources, craftable items, building costs and the
//! starting maps.
//!
//! Loaded from `data/catalog.json`, embedded at compile time via
//! `include_str!()`. Entries refer to each other by string key; [`seed`]
//! inserts everything with store-assigned ids and returns the key → id
//! mapping.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;

use crate::error::{EngineError, EngineResult};
use crate::model::{BuildingCost, GameMap, Item, MapObject, RecipeLine, Resource, ResourceZone};
use crate::placement::{check_bounds, first_collision, Rect};
use crate::store::Store;

const CATALOG_JSON: &str = include_str!("../../../data/catalog.json");

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceSpec {
    pub key: String,
    pub name: String,
    pub icon: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ItemSpec {
    pub key: String,
    pub name: String,
    pub icon: String,
    pub kind: String,
    pub max_count: u32,
    /// Resource key → quantity.
    pub recipe: BTreeMap<String, u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ObjectSpec {
    pub key: String,
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub farmable: bool,
    pub rect: Option<Rect>,
    /// Resource key gathered here, for farmable objects.
    #[serde(default)]
    pub yields: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MapSpec {
    pub key: String,
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub objects: Vec<ObjectSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    pub resources: Vec<ResourceSpec>,
    pub items: Vec<ItemSpec>,
    /// Building type → resource key → quantity.
    pub building_costs: BTreeMap<String, BTreeMap<String, u32>>,
    pub maps: Vec<MapSpec>,
}

/// Store ids assigned while seeding, by catalog key.
#[derive(Debug, Clone, Default)]
pub struct SeedIds {
    pub resources: HashMap<String, u64>,
    pub items: HashMap<String, u64>,
    pub maps: HashMap<String, u64>,
    pub objects: HashMap<String, u64>,
}

impl SeedIds {
    fn lookup(table: &HashMap<String, u64>, what: &str, key: &str) -> EngineResult<u64> {
        table
            .get(key)
            .copied()
            .ok_or_else(|| EngineError::not_found(format!("{} '{}'", what, key)))
    }

    pub fn resource(&self, key: &str) -> EngineResult<u64> {
        Self::lookup(&self.resources, "resource", key)
    }

    pub fn item(&self, key: &str) -> EngineResult<u64> {
        Self::lookup(&self.items, "item", key)
    }

    pub fn map(&self, key: &str) -> EngineResult<u64> {
        Self::lookup(&self.maps, "map", key)
    }

    pub fn object(&self, key: &str) -> EngineResult<u64> {
        Self::lookup(&self.objects, "map object", key)
    }
}

impl Catalog {
    pub fn from_json(json: &str) -> EngineResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// The catalog shipped with the game.
    pub fn bundled() -> EngineResult<Self> {
        Self::from_json(CATALOG_JSON)
    }
}

/// Insert the whole catalog in one unit of work.
///
/// Object boxes are validated like any other placement, so a catalog with
/// overlapping or off-map objects is rejected as a whole.
pub fn seed<S: Store>(store: &mut S, catalog: &Catalog) -> EngineResult<SeedIds> {
    store.unit_of_work(|s| {
        let mut ids = SeedIds::default();

        for spec in &catalog.resources {
            let id = s.insert_resource(Resource {
                id: 0,
                name: spec.name.clone(),
                icon: spec.icon.clone(),
            })?;
            ids.resources.insert(spec.key.clone(), id);
        }

        for spec in &catalog.items {
            let recipe = spec
                .recipe
                .iter()
                .map(|(key, &quantity)| {
                    Ok(RecipeLine {
                        resource_id: ids.resource(key)?,
                        quantity,
                    })
                })
                .collect::<EngineResult<Vec<_>>>()?;
            let id = s.insert_item(Item {
                id: 0,
                name: spec.name.clone(),
                icon: spec.icon.clone(),
                kind: spec.kind.clone(),
                max_count: spec.max_count.max(1),
                recipe,
            })?;
            ids.items.insert(spec.key.clone(), id);
        }

        for (building_type, lines) in &catalog.building_costs {
            for (key, &quantity) in lines {
                s.insert_building_cost(BuildingCost {
                    building_type: building_type.clone(),
                    resource_id: ids.resource(key)?,
                    quantity,
                })?;
            }
        }

        for spec in &catalog.maps {
            let mut map = GameMap {
                id: 0,
                name: spec.name.clone(),
                width: spec.width,
                height: spec.height,
            };
            map.id = s.insert_map(map.clone())?;
            ids.maps.insert(spec.key.clone(), map.id);

            for object in &spec.objects {
                if let Some(rect) = &object.rect {
                    check_bounds(&map, rect)?;
                    if first_collision(&s.placements_on(map.id)?, rect).is_some() {
                        return Err(EngineError::conflict(format!(
                            "catalog object '{}' overlaps another object",
                            object.key
                        )));
                    }
                }
                let object_id = s.insert_map_object(
                    MapObject {
                        id: 0,
                        map_id: map.id,
                        name: object.name.clone(),
                        kind: object.kind.clone(),
                        is_farmable: object.farmable,
                    },
                    object.rect,
                )?;
                ids.objects.insert(object.key.clone(), object_id);
                if let Some(key) = &object.yields {
                    s.insert_resource_zone(ResourceZone {
                        map_object_id: object_id,
                        map_id: map.id,
                        resource_id: ids.resource(key)?,
                    })?;
                }
            }
        }

        log::info!(
            "catalog seeded: {} resources, {} items, {} maps, {} objects",
            ids.resources.len(),
            ids.items.len(),
            ids.maps.len(),
            ids.objects.len()
        );
        Ok(ids)
    })
}
