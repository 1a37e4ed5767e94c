use instance::InstanceId;
use persistence::PersistenceError;
use space::SpaceError;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config io: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Failures inside the simulation. Packet handling turns every one of
/// these into a log line.
#[derive(Debug, thiserror::Error)]
pub enum WorldError {
    #[error(transparent)]
    Space(#[from] SpaceError),
    #[error("unknown mob key {0:?}")]
    UnknownMob(String),
    #[error("unknown entity {0}")]
    UnknownEntity(InstanceId),
    #[error("malformed packet: {0}")]
    Protocol(#[from] serde_json::Error),
    #[error("not permitted: {0}")]
    NotPermitted(&'static str),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error(transparent)]
    Content(#[from] ConfigError),
}
