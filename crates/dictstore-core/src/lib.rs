//! DictStore Core: Compact Read-Mostly Dictionary for Localized Text
//!
//! Holds tens of thousands of translation key → value pairs, built once per
//! locale bundle and read for the rest of the process lifetime.
//!
//! # Architecture
//!
//! - **Codec**: values held as boxed UTF-8 byte forms, decoded per read
//! - **Compressed keys**: dotted keys split into parent-linked segment nodes
//! - **Interner**: weak hash-consing table so shared prefixes share nodes
//! - **Stores**: one frozen-map template, three key/value layouts
//! - **Factory**: picks a layout from the deployment profile and overrides
//!
//! # Strategy trade-off
//!
//! | Strategy        | Memory  | CPU per read |
//! |-----------------|---------|--------------|
//! | `Plain`         | highest | lowest       |
//! | `ValueCompact`  | medium  | medium       |
//! | `Compressed`    | lowest  | highest      |
//!
//! Loading bundles, formatting and choosing a locale live outside this crate.

pub mod codec;
pub mod config;
pub mod error;
pub mod factory;
pub mod intern;
pub mod key;
pub mod store;

// Re-export key types for convenience
pub use codec::ByteForm;
pub use config::{Config, EnvSource, InternerConfig, Profile, PropertiesFile, PropertySource};
pub use error::{DictError, DictResult};
pub use factory::{select_strategy, Strategy, StoreFactory};
pub use intern::{Interner, InternerStats};
pub use key::CompressedKey;
pub use store::{
    CompressedLayout, CompressedStore, FrozenStore, Layout, PlainLayout, PlainStore, TextStore,
    ValueCompactLayout, ValueCompactStore,
};
