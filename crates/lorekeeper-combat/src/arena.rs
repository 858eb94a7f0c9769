//! Combatant roster and spatial queries.
//!
//! This module provides:
//! - [`SpatialQuery`]: the range query and position lookup combat relies on
//! - [`CombatantStore`]: access to combat stats and attack profiles by id
//! - [`Arena`]: an in-memory implementation of both for one encounter
//!
//! The arena's broad phase tests an axis-aligned square around the query
//! centre, so it returns candidates in the corners outside the circle.
//! Callers re-validate distance.

use ahash::AHashMap;
use glam::Vec2;
use tracing::{debug, warn};

use lorekeeper_common::{EntityId, Faction, FactionMask};

use crate::attack::{AttackKind, AttackProfile, AttackReport, CombatError, CombatResult};
use crate::stats::CombatEntity;

/// Positional queries over damageable entities.
pub trait SpatialQuery {
    /// Returns candidate entities with combat stats within `radius` of `center`
    /// whose faction is in `targets`. May over-report.
    fn find_entities_with_combat_stats(
        &self,
        center: Vec2,
        radius: f32,
        targets: FactionMask,
    ) -> Vec<EntityId>;

    /// Returns an entity's position.
    fn position_of(&self, entity: EntityId) -> Option<Vec2>;
}

/// Access to combat components by entity id.
pub trait CombatantStore {
    /// Returns an entity's combat stats.
    fn combatant(&self, entity: EntityId) -> Option<&CombatEntity>;

    /// Returns an entity's combat stats mutably.
    fn combatant_mut(&mut self, entity: EntityId) -> Option<&mut CombatEntity>;

    /// Returns an entity's attack profile, if it has one in this store.
    fn attack_profile(&self, _entity: EntityId) -> Option<&AttackProfile> {
        None
    }
}

/// One actor in the arena.
#[derive(Debug)]
pub struct Combatant {
    /// Combat stats
    pub entity: CombatEntity,
    /// World position
    pub position: Vec2,
    /// Allegiance
    pub faction: Faction,
    /// Attack profile for actors driven through [`Arena::perform_attack`]
    pub attack: Option<AttackProfile>,
}

/// In-memory roster of combatants for one encounter.
#[derive(Debug, Default)]
pub struct Arena {
    combatants: AHashMap<EntityId, Combatant>,
}

impl Arena {
    /// Creates an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a combatant and returns its id.
    pub fn spawn(&mut self, entity: CombatEntity, position: Vec2, faction: Faction) -> EntityId {
        let id = entity.id();
        debug!("Spawned {} {id} at ({:.1}, {:.1})", faction.display_name(), position.x, position.y);
        self.combatants.insert(
            id,
            Combatant {
                entity,
                position,
                faction,
                attack: None,
            },
        );
        id
    }

    /// Adds a combatant with an attack profile and returns its id.
    pub fn spawn_with_attack(
        &mut self,
        entity: CombatEntity,
        position: Vec2,
        faction: Faction,
        attack: AttackProfile,
    ) -> EntityId {
        let id = self.spawn(entity, position, faction);
        self.set_attack_profile(id, attack);
        id
    }

    /// Removes a combatant.
    pub fn despawn(&mut self, entity: EntityId) -> Option<Combatant> {
        self.combatants.remove(&entity)
    }

    /// Replaces a combatant's attack profile. Returns false if the entity is absent.
    pub fn set_attack_profile(&mut self, entity: EntityId, attack: AttackProfile) -> bool {
        match self.combatants.get_mut(&entity) {
            Some(combatant) => {
                combatant.attack = Some(attack);
                true
            },
            None => false,
        }
    }

    /// Returns a combatant's attack profile mutably.
    pub fn attack_profile_mut(&mut self, entity: EntityId) -> Option<&mut AttackProfile> {
        self.combatants
            .get_mut(&entity)
            .and_then(|c| c.attack.as_mut())
    }

    /// Returns a combatant.
    #[must_use]
    pub fn get(&self, entity: EntityId) -> Option<&Combatant> {
        self.combatants.get(&entity)
    }

    /// Moves a combatant to `position`.
    pub fn set_position(&mut self, entity: EntityId, position: Vec2) -> bool {
        match self.combatants.get_mut(&entity) {
            Some(combatant) => {
                combatant.position = position;
                true
            },
            None => false,
        }
    }

    /// Moves a combatant by `delta`.
    pub fn translate(&mut self, entity: EntityId, delta: Vec2) -> bool {
        match self.combatants.get_mut(&entity) {
            Some(combatant) => {
                combatant.position += delta;
                true
            },
            None => false,
        }
    }

    /// Returns the distance between two combatants.
    #[must_use]
    pub fn distance_between(&self, a: EntityId, b: EntityId) -> Option<f32> {
        Some(self.position_of(a)?.distance(self.position_of(b)?))
    }

    /// Advances every combatant's buffs, regeneration and cooldowns.
    pub fn tick(&mut self, dt: f32) {
        for combatant in self.combatants.values_mut() {
            combatant.entity.tick(dt);
            if let Some(attack) = combatant.attack.as_mut() {
                attack.tick(dt);
            }
        }
    }

    /// Performs an attack with the profile stored on `attacker`, anchored at its position.
    pub fn perform_attack(
        &mut self,
        attacker: EntityId,
        kind: AttackKind,
    ) -> CombatResult<AttackReport> {
        let combatant = self
            .combatants
            .get_mut(&attacker)
            .ok_or(CombatError::MissingEntity(attacker))?;
        if combatant.entity.is_dead() {
            return Err(CombatError::Dead(attacker));
        }
        let anchor = combatant.position;
        let mut profile = combatant
            .attack
            .take()
            .ok_or(CombatError::MissingEntity(attacker))?;

        let check = match kind {
            AttackKind::Basic => profile.check_attack(),
            AttackKind::Special => profile.check_special_attack(),
        };
        let outcome = check.map(|()| profile.execute(kind, anchor, self));

        if let Some(combatant) = self.combatants.get_mut(&attacker) {
            combatant.attack = Some(profile);
        } else {
            warn!("Attacker {attacker} removed during its own attack");
        }
        outcome
    }

    /// Iterates combatant ids.
    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.combatants.keys().copied()
    }

    /// Returns the number of combatants.
    #[must_use]
    pub fn len(&self) -> usize {
        self.combatants.len()
    }

    /// Checks if the arena is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.combatants.is_empty()
    }
}

impl SpatialQuery for Arena {
    fn find_entities_with_combat_stats(
        &self,
        center: Vec2,
        radius: f32,
        targets: FactionMask,
    ) -> Vec<EntityId> {
        let mut found: Vec<EntityId> = self
            .combatants
            .iter()
            .filter(|(_, c)| targets.contains(c.faction))
            .filter(|(_, c)| {
                let offset = (c.position - center).abs();
                offset.x <= radius && offset.y <= radius
            })
            .map(|(id, _)| *id)
            .collect();
        found.sort_unstable();
        found
    }

    fn position_of(&self, entity: EntityId) -> Option<Vec2> {
        self.combatants.get(&entity).map(|c| c.position)
    }
}

impl CombatantStore for Arena {
    fn combatant(&self, entity: EntityId) -> Option<&CombatEntity> {
        self.combatants.get(&entity).map(|c| &c.entity)
    }

    fn combatant_mut(&mut self, entity: EntityId) -> Option<&mut CombatEntity> {
        self.combatants.get_mut(&entity).map(|c| &mut c.entity)
    }

    fn attack_profile(&self, entity: EntityId) -> Option<&AttackProfile> {
        self.combatants.get(&entity).and_then(|c| c.attack.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy(health: f32) -> CombatEntity {
        CombatEntity::new(health).with_crit_chance(0.0)
    }

    #[test]
    fn test_broad_phase_over_reports_corners() {
        let mut arena = Arena::new();
        let inside = arena.spawn(dummy(10.0), Vec2::new(1.0, 0.0), Faction::Enemy);
        let corner = arena.spawn(dummy(10.0), Vec2::new(1.4, 1.4), Faction::Enemy);
        let outside = arena.spawn(dummy(10.0), Vec2::new(3.0, 0.0), Faction::Enemy);

        let found = arena.find_entities_with_combat_stats(Vec2::ZERO, 1.5, FactionMask::ALL);

        assert!(found.contains(&inside));
        assert!(found.contains(&corner));
        assert!(!found.contains(&outside));
    }

    #[test]
    fn test_query_filters_factions() {
        let mut arena = Arena::new();
        let player = arena.spawn(dummy(10.0), Vec2::ZERO, Faction::Player);
        let boss = arena.spawn(dummy(10.0), Vec2::ZERO, Faction::Boss);

        let found =
            arena.find_entities_with_combat_stats(Vec2::ZERO, 1.0, FactionMask::of(Faction::Boss));
        assert_eq!(found, vec![boss]);
        assert!(!found.contains(&player));
    }

    #[test]
    fn test_perform_attack_uses_stored_profile() {
        let mut arena = Arena::new();
        let player = arena.spawn_with_attack(
            dummy(100.0),
            Vec2::ZERO,
            Faction::Player,
            AttackProfile::default().with_targets(FactionMask::of(Faction::Boss)),
        );
        let boss = arena.spawn(dummy(100.0), Vec2::new(1.0, 0.0), Faction::Boss);

        let report = arena.perform_attack(player, AttackKind::Basic);
        let report = report.unwrap_or_else(|e| panic!("attack failed: {e}"));
        assert_eq!(report.hits.len(), 1);
        assert_eq!(report.hits[0].target, boss);

        // Profile is restored and now cooling down.
        assert!(matches!(
            arena.perform_attack(player, AttackKind::Basic),
            Err(CombatError::OnCooldown { .. })
        ));
        assert!(matches!(
            arena.perform_attack(player, AttackKind::Special),
            Err(CombatError::SpecialDisabled)
        ));
        assert!(arena.attack_profile(player).is_some());
    }

    #[test]
    fn test_perform_attack_missing_or_dead() {
        let mut arena = Arena::new();
        let ghost = EntityId::new();
        assert_eq!(
            arena.perform_attack(ghost, AttackKind::Basic),
            Err(CombatError::MissingEntity(ghost))
        );

        let unarmed = arena.spawn(dummy(10.0), Vec2::ZERO, Faction::Enemy);
        assert_eq!(
            arena.perform_attack(unarmed, AttackKind::Basic),
            Err(CombatError::MissingEntity(unarmed))
        );

        let fallen = arena.spawn_with_attack(
            dummy(10.0),
            Vec2::ZERO,
            Faction::Player,
            AttackProfile::default(),
        );
        if let Some(entity) = arena.combatant_mut(fallen) {
            entity.take_damage(100.0, true, false);
        }
        assert_eq!(
            arena.perform_attack(fallen, AttackKind::Basic),
            Err(CombatError::Dead(fallen))
        );
    }

    #[test]
    fn test_tick_advances_cooldowns_and_buffs() {
        let mut arena = Arena::new();
        let player = arena.spawn_with_attack(
            dummy(100.0),
            Vec2::ZERO,
            Faction::Player,
            AttackProfile::default(),
        );
        if let Some(entity) = arena.combatant_mut(player) {
            entity.apply_defense_buff(5.0, 1.0);
        }
        let _ = arena.perform_attack(player, AttackKind::Basic);

        arena.tick(1.5);

        assert!(arena.attack_profile(player).is_some_and(AttackProfile::can_attack));
        assert!(arena.combatant(player).is_some_and(|e| e.defense().abs() < f32::EPSILON));
    }

    #[test]
    fn test_translate_and_distance() {
        let mut arena = Arena::new();
        let a = arena.spawn(dummy(1.0), Vec2::ZERO, Faction::Player);
        let b = arena.spawn(dummy(1.0), Vec2::new(3.0, 4.0), Faction::Boss);
        assert_eq!(arena.distance_between(a, b), Some(5.0));

        assert!(arena.translate(a, Vec2::new(3.0, 0.0)));
        assert_eq!(arena.distance_between(a, b), Some(4.0));
        assert!(arena.despawn(b).is_some());
        assert_eq!(arena.distance_between(a, b), None);
    }
}
