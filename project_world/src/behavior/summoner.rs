use instance::InstanceId;

use super::MobBehavior;
use crate::combat::CombatCtl;
use crate::content::SummonerData;

/// Boss that calls minions once it is worn down and winds up an area
/// attack every few hits it takes.
#[derive(Debug, Clone)]
pub struct Summoner {
    data: SummonerData,
}

impl Summoner {
    pub fn new(data: SummonerData) -> Self {
        Self { data }
    }

    fn below_threshold(&self, ctl: &CombatCtl<'_>) -> bool {
        ctl.hit_points()
            .is_some_and(|(hp, max)| (hp as f32) < max as f32 * self.data.threshold)
    }
}

impl MobBehavior for Summoner {
    fn on_damage(&self, ctl: &mut CombatCtl<'_>, attacker: InstanceId, _damage: u32) {
        let below = self.below_threshold(ctl);
        let Some(state) = ctl.behavior_state() else {
            return;
        };
        state.hits_taken += 1;
        let hits = state.hits_taken;
        let summon = state.phase == 0 && below;
        if summon {
            state.phase = 1;
        }

        if summon {
            tracing::debug!(boss = %ctl.id(), count = self.data.count, "summoning minions");
            for _ in 0..self.data.count {
                if let Some(minion) = ctl.spawn_minion(&self.data.minion) {
                    ctl.other(minion).begin(attacker);
                }
            }
        }
        if self.data.aoe_every > 0 && hits % self.data.aoe_every == 0 {
            ctl.schedule_aoe(self.data.aoe_radius, self.data.terror);
        }
    }

    fn on_forget(&self, ctl: &mut CombatCtl<'_>) {
        if let Some(state) = ctl.behavior_state() {
            *state = Default::default();
        }
    }

    /// Idle minions join in on whoever the boss is fighting.
    fn on_sub_aoe(&self, ctl: &mut CombatCtl<'_>, _radius: u32, _terror: bool) {
        let Some(target) = ctl.target() else {
            return;
        };
        for minion in ctl.minions() {
            let mut m = ctl.other(minion);
            if m.target().is_none() {
                m.begin(target);
            }
        }
    }
}
