use net::HitWire;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HitKind {
    Damage,
    Critical,
    Stun,
    Freeze,
    Poison,
}

impl HitKind {
    pub fn as_str(self) -> &'static str {
        match self {
            HitKind::Damage => "damage",
            HitKind::Critical => "critical",
            HitKind::Stun => "stun",
            HitKind::Freeze => "freeze",
            HitKind::Poison => "poison",
        }
    }
}

/// One computed attack, queued until the next attack tick applies it.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    pub kind: HitKind,
    pub damage: u32,
    pub ranged: bool,
    pub aoe: bool,
    pub radius: u32,
    pub terror: bool,
    /// Skills credited with `damage * 4` experience when a player lands it.
    pub skills: Vec<String>,
}

impl Hit {
    pub fn new(kind: HitKind, damage: u32) -> Self {
        Self {
            kind,
            damage,
            ranged: false,
            aoe: false,
            radius: 0,
            terror: false,
            skills: Vec::new(),
        }
    }

    pub fn area(damage: u32, radius: u32, terror: bool) -> Self {
        Self {
            aoe: true,
            radius,
            terror,
            ..Self::new(HitKind::Damage, damage)
        }
    }

    pub fn ranged(mut self, ranged: bool) -> Self {
        self.ranged = ranged;
        self
    }

    pub fn with_skills<I, S>(mut self, skills: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.skills = skills.into_iter().map(Into::into).collect();
        self
    }

    pub fn to_wire(&self) -> HitWire {
        HitWire {
            kind: self.kind.as_str().to_string(),
            damage: self.damage,
            ranged: self.ranged,
            aoe: self.aoe,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn area_hits_carry_radius_and_flag() {
        let hit = Hit::area(9, 3, true);
        assert!(hit.aoe);
        assert!(hit.terror);
        assert_eq!(hit.radius, 3);
        assert_eq!(hit.kind, HitKind::Damage);
    }

    #[test]
    fn wire_form_uses_kind_name() {
        let wire = Hit::new(HitKind::Poison, 4).ranged(true).to_wire();
        assert_eq!(wire.kind, "poison");
        assert_eq!(wire.damage, 4);
        assert!(wire.ranged);
        assert!(!wire.aoe);
    }

    #[test]
    fn kind_parses_from_content_names() {
        let kind: HitKind = serde_json::from_str(r#""freeze""#).unwrap();
        assert_eq!(kind, HitKind::Freeze);
    }
}
