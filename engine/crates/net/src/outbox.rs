use instance::InstanceId;
use space::RegionKey;

use crate::protocol::ServerMessage;

/// Who a queued packet is addressed to. Resolved to sessions on flush.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PacketScope {
    /// Every playing session.
    Broadcast,
    /// Players whose neighbourhood includes the region, i.e. everyone who
    /// can see an entity standing there. Works for instanced keys too.
    Region(RegionKey),
    /// Players currently standing in any of the listed regions.
    Regions(Vec<RegionKey>),
    Player(InstanceId),
    Players(Vec<InstanceId>),
}

/// Fire-and-forget packet sink filled during a tick and drained by the
/// world when it resolves scopes to sessions.
#[derive(Debug, Default)]
pub struct Outbox {
    queue: Vec<(PacketScope, ServerMessage)>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, scope: PacketScope, message: ServerMessage) {
        self.queue.push((scope, message));
    }

    pub fn drain(&mut self) -> Vec<(PacketScope, ServerMessage)> {
        std::mem::take(&mut self.queue)
    }

    pub fn pending(&self) -> &[(PacketScope, ServerMessage)] {
        &self.queue
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use instance::EntityKind;

    #[test]
    fn push_and_drain_keep_order() {
        let mut outbox = Outbox::new();
        let p = InstanceId::new(EntityKind::Player, 1);
        outbox.push(PacketScope::Player(p), ServerMessage::Pong);
        outbox.push(
            PacketScope::Region(RegionKey::Base(3)),
            ServerMessage::Despawn { instance: p },
        );
        assert_eq!(outbox.len(), 2);

        let drained = outbox.drain();
        assert_eq!(drained[0].0, PacketScope::Player(p));
        assert_eq!(drained[1].1, ServerMessage::Despawn { instance: p });
        assert!(outbox.is_empty());
    }
}
