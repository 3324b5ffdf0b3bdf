//! Static unit and ability definitions for the sandbox rule set.
//!
//! Ids follow the classic Terran numbering so scenario files and host
//! command cards can share them with other tooling.

use crate::types::{AbilityId, TargetKind, UnitTypeId};

/// Weapon stats for units that can attack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weapon {
    pub damage: f32,
    /// Reach from edge to edge of the two bounding circles, in world pixels.
    pub range: f32,
    /// Frames between shots.
    pub cooldown: u32,
}

/// One entry of the unit catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitType {
    pub id: UnitTypeId,
    pub name: &'static str,
    pub max_health: i32,
    pub max_shields: i32,
    pub max_energy: i32,
    /// Movement speed in world pixels per frame (0 for immobile units).
    pub speed: f32,
    pub radius: f32,
    pub sight: f32,
    pub mineral_cost: i32,
    pub gas_cost: i32,
    pub supply_cost: i32,
    pub supply_provided: i32,
    pub build_frames: u32,
    pub is_building: bool,
    pub is_worker: bool,
    pub invincible: bool,
    pub weapon: Option<Weapon>,
    /// Structures this unit can construct.
    pub builds: &'static [UnitTypeId],
    /// Units this structure can train.
    pub trains: &'static [UnitTypeId],
    pub abilities: &'static [AbilityId],
}

/// One entry of the ability catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct AbilityType {
    pub id: AbilityId,
    pub name: &'static str,
    pub energy_cost: i32,
    pub target: TargetKind,
}

pub const MARINE: UnitTypeId = UnitTypeId(0);
pub const GHOST: UnitTypeId = UnitTypeId(1);
pub const SCV: UnitTypeId = UnitTypeId(7);
pub const MEDIC: UnitTypeId = UnitTypeId(34);
pub const COMMAND_CENTER: UnitTypeId = UnitTypeId(106);
pub const SUPPLY_DEPOT: UnitTypeId = UnitTypeId(109);
pub const BARRACKS: UnitTypeId = UnitTypeId(111);
pub const MINERAL_FIELD: UnitTypeId = UnitTypeId(176);

pub const STIM_PACKS: AbilityId = AbilityId(0);
pub const LOCKDOWN: AbilityId = AbilityId(1);
pub const SCANNER_SWEEP: AbilityId = AbilityId(4);
pub const PERSONNEL_CLOAKING: AbilityId = AbilityId(10);
pub const RESTORATION: AbilityId = AbilityId(22);
pub const OPTICAL_FLARE: AbilityId = AbilityId(23);

/// Production queue length of every producing structure.
pub const PRODUCTION_SLOTS: usize = 5;

/// Hard supply cap per player.
pub const SUPPLY_CAP: i32 = 200;

static UNIT_TYPES: &[UnitType] = &[
    UnitType {
        id: MARINE,
        name: "Marine",
        max_health: 40,
        max_shields: 0,
        max_energy: 0,
        speed: 4.0,
        radius: 8.0,
        sight: 224.0,
        mineral_cost: 50,
        gas_cost: 0,
        supply_cost: 1,
        supply_provided: 0,
        build_frames: 360,
        is_building: false,
        is_worker: false,
        invincible: false,
        weapon: Some(Weapon {
            damage: 6.0,
            range: 128.0,
            cooldown: 15,
        }),
        builds: &[],
        trains: &[],
        abilities: &[STIM_PACKS],
    },
    UnitType {
        id: GHOST,
        name: "Ghost",
        max_health: 45,
        max_shields: 0,
        max_energy: 200,
        speed: 4.0,
        radius: 7.0,
        sight: 288.0,
        mineral_cost: 25,
        gas_cost: 75,
        supply_cost: 1,
        supply_provided: 0,
        build_frames: 750,
        is_building: false,
        is_worker: false,
        invincible: false,
        weapon: Some(Weapon {
            damage: 10.0,
            range: 224.0,
            cooldown: 22,
        }),
        builds: &[],
        trains: &[],
        abilities: &[LOCKDOWN, PERSONNEL_CLOAKING],
    },
    UnitType {
        id: SCV,
        name: "SCV",
        max_health: 60,
        max_shields: 0,
        max_energy: 0,
        speed: 4.9,
        radius: 11.0,
        sight: 224.0,
        mineral_cost: 50,
        gas_cost: 0,
        supply_cost: 1,
        supply_provided: 0,
        build_frames: 300,
        is_building: false,
        is_worker: true,
        invincible: false,
        weapon: Some(Weapon {
            damage: 5.0,
            range: 10.0,
            cooldown: 15,
        }),
        builds: &[COMMAND_CENTER, SUPPLY_DEPOT, BARRACKS],
        trains: &[],
        abilities: &[],
    },
    UnitType {
        id: MEDIC,
        name: "Medic",
        max_health: 60,
        max_shields: 0,
        max_energy: 200,
        speed: 4.0,
        radius: 8.0,
        sight: 288.0,
        mineral_cost: 50,
        gas_cost: 25,
        supply_cost: 1,
        supply_provided: 0,
        build_frames: 450,
        is_building: false,
        is_worker: false,
        invincible: false,
        weapon: None,
        builds: &[],
        trains: &[],
        abilities: &[RESTORATION, OPTICAL_FLARE],
    },
    UnitType {
        id: COMMAND_CENTER,
        name: "Command Center",
        max_health: 1500,
        max_shields: 0,
        max_energy: 200,
        speed: 0.0,
        radius: 48.0,
        sight: 320.0,
        mineral_cost: 400,
        gas_cost: 0,
        supply_cost: 0,
        supply_provided: 10,
        build_frames: 1800,
        is_building: true,
        is_worker: false,
        invincible: false,
        weapon: None,
        builds: &[],
        trains: &[SCV],
        abilities: &[SCANNER_SWEEP],
    },
    UnitType {
        id: SUPPLY_DEPOT,
        name: "Supply Depot",
        max_health: 500,
        max_shields: 0,
        max_energy: 0,
        speed: 0.0,
        radius: 32.0,
        sight: 256.0,
        mineral_cost: 100,
        gas_cost: 0,
        supply_cost: 0,
        supply_provided: 8,
        build_frames: 600,
        is_building: true,
        is_worker: false,
        invincible: false,
        weapon: None,
        builds: &[],
        trains: &[],
        abilities: &[],
    },
    UnitType {
        id: BARRACKS,
        name: "Barracks",
        max_health: 1000,
        max_shields: 0,
        max_energy: 0,
        speed: 0.0,
        radius: 48.0,
        sight: 256.0,
        mineral_cost: 150,
        gas_cost: 0,
        supply_cost: 0,
        supply_provided: 0,
        build_frames: 1200,
        is_building: true,
        is_worker: false,
        invincible: false,
        weapon: None,
        builds: &[],
        trains: &[MARINE, MEDIC, GHOST],
        abilities: &[],
    },
    UnitType {
        id: MINERAL_FIELD,
        name: "Mineral Field",
        max_health: 0,
        max_shields: 0,
        max_energy: 0,
        speed: 0.0,
        radius: 24.0,
        sight: 0.0,
        mineral_cost: 0,
        gas_cost: 0,
        supply_cost: 0,
        supply_provided: 0,
        build_frames: 0,
        is_building: false,
        is_worker: false,
        invincible: true,
        weapon: None,
        builds: &[],
        trains: &[],
        abilities: &[],
    },
];

static ABILITY_TYPES: &[AbilityType] = &[
    AbilityType {
        id: STIM_PACKS,
        name: "Stim Packs",
        energy_cost: 0,
        target: TargetKind::None,
    },
    AbilityType {
        id: LOCKDOWN,
        name: "Lockdown",
        energy_cost: 100,
        target: TargetKind::Unit,
    },
    AbilityType {
        id: SCANNER_SWEEP,
        name: "Scanner Sweep",
        energy_cost: 50,
        target: TargetKind::Ground,
    },
    AbilityType {
        id: PERSONNEL_CLOAKING,
        name: "Personnel Cloaking",
        energy_cost: 25,
        target: TargetKind::None,
    },
    AbilityType {
        id: RESTORATION,
        name: "Restoration",
        energy_cost: 50,
        target: TargetKind::Unit,
    },
    AbilityType {
        id: OPTICAL_FLARE,
        name: "Optical Flare",
        energy_cost: 75,
        target: TargetKind::Unit,
    },
];

/// Look up a unit type by id.
pub fn unit_type(id: UnitTypeId) -> Option<&'static UnitType> {
    UNIT_TYPES.iter().find(|t| t.id == id)
}

/// Look up a unit type by its display name (case-insensitive).
pub fn unit_type_by_name(name: &str) -> Option<&'static UnitType> {
    UNIT_TYPES.iter().find(|t| t.name.eq_ignore_ascii_case(name))
}

/// Look up an ability by id.
pub fn ability(id: AbilityId) -> Option<&'static AbilityType> {
    ABILITY_TYPES.iter().find(|a| a.id == id)
}

/// Every unit type in the catalog.
pub fn unit_types() -> &'static [UnitType] {
    UNIT_TYPES
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_id_and_name_agree() {
        let by_id = unit_type(BARRACKS).unwrap();
        let by_name = unit_type_by_name("barracks").unwrap();
        assert_eq!(by_id, by_name);
    }

    #[test]
    fn every_referenced_id_resolves() {
        for t in unit_types() {
            for built in t.builds.iter().chain(t.trains) {
                assert!(unit_type(*built).is_some(), "{} references {built:?}", t.name);
            }
            for a in t.abilities {
                assert!(ability(*a).is_some(), "{} references {a:?}", t.name);
            }
        }
    }

    #[test]
    fn only_structures_train_units() {
        for t in unit_types() {
            if !t.trains.is_empty() {
                assert!(t.is_building, "{} trains but is not a building", t.name);
            }
        }
    }
}
