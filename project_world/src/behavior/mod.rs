//! Scripted mob behaviors.
//!
//! A behavior is looked up by the mob's key and called back from combat.
//! Hooks receive the mob's `CombatCtl`, so they act through the same
//! operations a plain fight uses.

mod summoner;

pub use summoner::Summoner;

use std::collections::BTreeMap;
use std::sync::Arc;

use instance::InstanceId;

use crate::combat::CombatCtl;
use crate::content::Content;

pub trait MobBehavior: Send + Sync {
    /// The mob took `damage` from `attacker` and survived.
    fn on_damage(&self, _ctl: &mut CombatCtl<'_>, _attacker: InstanceId, _damage: u32) {}

    fn on_death(&self, _ctl: &mut CombatCtl<'_>) {}

    /// The mob dropped out of combat and cleared its roster.
    fn on_forget(&self, _ctl: &mut CombatCtl<'_>) {}

    /// An area attack of the mob just landed.
    fn on_sub_aoe(&self, _ctl: &mut CombatCtl<'_>, _radius: u32, _terror: bool) {}
}

/// Behaviors by mob key.
#[derive(Default)]
pub struct BehaviorRegistry {
    by_key: BTreeMap<String, Arc<dyn MobBehavior>>,
}

impl BehaviorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the `behavior` field of each mob kind.
    pub fn from_content(content: &Content) -> Self {
        let mut registry = Self::new();
        for (key, data) in &content.mobs {
            match (data.behavior.as_deref(), &data.summoner) {
                (None, _) => {}
                (Some("summoner"), Some(summoner)) => {
                    registry.register(key, Arc::new(Summoner::new(summoner.clone())));
                }
                (Some(name), _) => {
                    tracing::error!(mob = %key, behavior = name, "unknown or incomplete behavior, mob runs without it");
                }
            }
        }
        registry
    }

    pub fn register(&mut self, key: &str, behavior: Arc<dyn MobBehavior>) {
        self.by_key.insert(key.to_string(), behavior);
    }

    pub fn get(&self, key: &str) -> Option<Arc<dyn MobBehavior>> {
        self.by_key.get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl std::fmt::Debug for BehaviorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BehaviorRegistry")
            .field("keys", &self.by_key.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::{MobData, SummonerData};

    #[test]
    fn registers_summoners_and_skips_unknown() {
        let mut content = Content::default();
        content.mobs.insert(
            "ogre".into(),
            MobData {
                behavior: Some("summoner".into()),
                summoner: Some(SummonerData {
                    minion: "rat".into(),
                    ..SummonerData::default()
                }),
                ..MobData::default()
            },
        );
        content.mobs.insert(
            "imp".into(),
            MobData {
                behavior: Some("trickster".into()),
                ..MobData::default()
            },
        );
        content.mobs.insert("rat".into(), MobData::default());

        let registry = BehaviorRegistry::from_content(&content);
        assert_eq!(registry.len(), 1);
        assert!(registry.get("ogre").is_some());
        assert!(registry.get("imp").is_none());
        assert!(registry.get("rat").is_none());
    }
}
