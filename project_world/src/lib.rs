pub mod behavior;
pub mod combat;
pub mod config;
pub mod content;
pub mod entity;
pub mod error;
pub mod formulas;
pub mod minigame;
pub mod world;

pub use config::ServerConfig;
pub use content::Content;
pub use error::{ConfigError, WorldError};
pub use world::World;
