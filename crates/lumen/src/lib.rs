//! Lumen - DXBC shader containers and the ShCd/ShPk files that wrap them.
//!
//! This crate provides a unified interface to the Lumen library ecosystem.
//!
//! # Crates
//!
//! - [`lumen_common`] - Common utilities (binary reading, multi-region writing, keyed lists)
//! - [`lumen_dxbc`] - DXBC containers and their reflection parts
//! - [`lumen_xiv`] - ShCd shaders and ShPk shader packages
//!
//! # Example
//!
//! ```no_run
//! use lumen::prelude::*;
//!
//! let bytes = std::fs::read("character.shpk")?;
//! let package = ShaderPackage::from_shpk_bytes(&bytes)?;
//!
//! for shader in &package.pixel_shaders {
//!     let container = Container::from_bytes(&shader.blob, true, false)?;
//!     println!("{} parts", container.parts.len());
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

// Re-export all sub-crates
pub use lumen_common as common;
pub use lumen_dxbc as dxbc;
pub use lumen_xiv as xiv;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use lumen_common::{BinaryReader, IndexedList};
    pub use lumen_dxbc::{Container, FourCC, Part};
    pub use lumen_xiv::crc::{crc32, crc32_with_seed, name_hash};
    pub use lumen_xiv::{
        GraphicsPlatform, Name, ProgramType, ResourceCategory, Shader, ShaderKey, ShaderPackage,
        ShaderResource,
    };
}

/// Version information.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
