pub mod channels;
pub mod outbox;
pub mod output_router;
pub mod protocol;
pub mod rate_limiter;
pub mod server;

pub use outbox::{Outbox, PacketScope};
pub use protocol::{
    ClientMessage, CoursingAction, EntityWire, HitWire, MinigameWire, PositionWire, ServerMessage,
};
pub use rate_limiter::CommandThrottle;
