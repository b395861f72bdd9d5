//! scenelink core types
//!
//! Host-independent building blocks shared by the OSC and HTTP bridges:
//! - Property values as read from a scene
//! - Owner-keyed registries replacing per-owner singletons
//! - Ordered multicast events
//! - Time-based progress animations

pub mod anim;
pub mod error;
pub mod event;
pub mod registry;
pub mod value;

pub use anim::{lerp, Anim, AnimId, AnimManager};
pub use error::{Error, Result};
pub use event::{Event, SubscriptionId};
pub use registry::Registry;
pub use value::PropertyValue;
