use engine_core::Fired;
use instance::InstanceId;

use super::World;

/// Everything the world schedules on its timer queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    CombatAttack(InstanceId),
    CombatFollow(InstanceId),
    CombatCheck(InstanceId),
    Roam(InstanceId),
    Heal(InstanceId),
    Respawn(InstanceId),
    ClearStun(InstanceId),
    ClearFreeze(InstanceId),
    ClearPoison(InstanceId),
    ItemBlink(InstanceId),
    ItemDespawn(InstanceId),
    ProjectileLand(InstanceId),
    AreaAttack {
        mob: InstanceId,
        radius: u32,
        terror: bool,
    },
    MinigameTick,
}

/// Things that happened during a tick, handled once the tick's work is done.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldEvent {
    Killed {
        victim: InstanceId,
        key: String,
        killer: Option<InstanceId>,
        /// Owner of the instance the victim lived in.
        owner: Option<InstanceId>,
    },
    PlayerDied {
        player: InstanceId,
        killer: Option<InstanceId>,
    },
}

impl World {
    /// Every handler re-checks that its entity still exists; a missing one
    /// makes the task a no-op.
    pub(crate) fn run_task(&mut self, fired: Fired<Task>) {
        match fired.task {
            Task::CombatAttack(id) => self.combat(id).parse_attack(),
            Task::CombatFollow(id) => self.combat(id).parse_follow(),
            Task::CombatCheck(id) => self.combat(id).parse_check(),
            Task::Roam(id) => self.roam(id),
            Task::Heal(id) => self.heal_tick(id),
            Task::Respawn(id) => self.respawn_mob(id),
            Task::ClearStun(id) => self.clear_stun(id),
            Task::ClearFreeze(id) => self.clear_freeze(id),
            Task::ClearPoison(id) => self.clear_poison(id),
            Task::ItemBlink(id) => self.blink_item(id),
            Task::ItemDespawn(id) => {
                if self.entities.items.contains_key(&id) {
                    self.remove_entity(id, true);
                }
            }
            Task::ProjectileLand(id) => {
                if self.entities.projectiles.contains_key(&id) {
                    self.remove_entity(id, false);
                }
            }
            Task::AreaAttack { mob, radius, terror } => {
                if self.entities.is_alive_character(mob) {
                    self.combat(mob).deal_aoe(radius, terror);
                }
            }
            Task::MinigameTick => self.team_war_tick(),
        }
    }
}
