pub mod allocator;
pub mod error;
pub mod types;

pub use allocator::InstanceAllocator;
pub use error::InstanceError;
pub use types::{EntityKind, InstanceId};
