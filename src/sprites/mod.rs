//! # Actor sprites
//!
//! Frame geometry comes from the actor info table, pixels from the masked
//! tiles of the sprite data file. [`SpriteCompositor`] ties the two together
//! and builds per-actor metaframes from [`SpriteDefinitions`].

pub mod actor_info;
pub mod compositor;
pub mod definition;

pub use actor_info::{ActorInfoTable, SpriteFrame};
pub use compositor::{compose_layers, SpriteCompositor};
pub use definition::{MetaframeLayer, SpriteDefinition, SpriteDefinitions};
