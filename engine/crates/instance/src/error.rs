use crate::types::InstanceId;

#[derive(Debug, thiserror::Error)]
pub enum InstanceError {
    #[error("malformed instance id: {0:?}")]
    Malformed(String),

    #[error("unknown entity tag {0}")]
    UnknownTag(u8),

    #[error("instance {0} is not alive")]
    NotAlive(InstanceId),
}
