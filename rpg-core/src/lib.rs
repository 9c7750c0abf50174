//! Chat RPG engine.
//!
//! This crate provides:
//! - The character aggregate (attributes, inventory, equipment)
//! - An item catalog with weapons and armor
//! - The inventory/equipment rules (stacking, slots, two-handed weapons)
//! - The interactive registration wizard, run over any chat transport
//! - Versioned character persistence (in-memory and JSON documents)
//!
//! # Quick Start
//!
//! ```ignore
//! use rpg_core::{GameConfig, GameService, MemoryStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let service = GameService::new(GameConfig::default(), store.clone(), store).await?;
//!
//!     // `conversation` is the transport's handle for one user in one channel.
//!     service.handle_line(conversation, "char new").await?;
//!     Ok(())
//! }
//! ```

/// Declares a closed, string-keyed enum.
///
/// Every variant carries a stable storage key (also its serde name) and a
/// human-readable label. `FromStr` accepts either, case-insensitively.
macro_rules! keyed_enum {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident => ($key:literal, $label:literal) ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $key)] $variant ),+
        }

        impl $name {
            pub fn all() -> &'static [$name] {
                &[ $( $name::$variant ),+ ]
            }

            /// Stable storage key.
            pub fn key(&self) -> &'static str {
                match self {
                    $( $name::$variant => $key ),+
                }
            }

            /// Default display label.
            pub fn label(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.label())
            }
        }

        impl std::str::FromStr for $name {
            type Err = $crate::error::ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim().to_lowercase();
                $name::all()
                    .iter()
                    .copied()
                    .find(|v| v.key() == needle || v.label().to_lowercase() == needle)
                    .ok_or_else(|| $crate::error::ParseEnumError {
                        kind: stringify!($name),
                        value: s.to_string(),
                    })
            }
        }
    };
}

pub mod character_builder;
pub mod chat;
pub mod commands;
pub mod config;
pub mod display;
pub mod equipment;
pub mod error;
pub mod items;
pub mod persist;
pub mod races;
pub mod regen;
pub mod registration;
pub mod service;
pub mod session;
pub mod testing;
pub mod world;

// Primary public API
pub use character_builder::CharacterBuilder;
pub use chat::{ChatError, Conversation, Form, MessageId, Reply};
pub use commands::Command;
pub use config::GameConfig;
pub use error::GameError;
pub use items::{Item, ItemCatalog, ItemCategory, ItemId, ItemKind};
pub use persist::{CharacterStore, ItemStore, JsonStore, MemoryStore, StoreError};
pub use registration::{RegistrationStep, RegistrationWizard};
pub use service::GameService;
pub use session::{RegisterSession, SessionRegistry};
pub use world::{Attributes, Character, Equipment, EquipmentSlot, Inventory, ItemRef, Race, Sex, UserId};
