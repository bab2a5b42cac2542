//! ShCd shaders and ShPk shader packages.
//!
//! Both formats wrap DXBC (or DXBC-like) bytecode with the resource tables the
//! engine binds by name hash. A package adds the material parameter layout and
//! the shader keys whose values select a render node, and through it one
//! vertex and pixel shader per pass.
//!
//! Reading then writing an unmodified file reproduces it byte for byte, with
//! one exception: ShCd files are always written with the v6 shader header.
//!
//! # Example
//!
//! ```no_run
//! use lumen_xiv::ShaderPackage;
//!
//! let bytes = std::fs::read("character.shpk")?;
//! let package = ShaderPackage::from_shpk_bytes(&bytes)?;
//! for key in &package.material_keys {
//!     println!("{} = {}", key.key, key.default_value);
//! }
//! assert_eq!(package.to_shpk_bytes()?, bytes);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod crc;
mod error;
mod io;
mod name;
pub mod names;
pub mod package;
mod program_type;
pub mod resource;
mod shader;
mod vertex_input;

pub use error::{Error, Result};
pub use name::Name;
pub use package::{
    DefaultValues, KeyAlternate, MaterialParameter, NodeSelector, RenderNode, RenderPass,
    ShaderKey, ShaderPackage,
};
pub use program_type::{GraphicsPlatform, ProgramType};
pub use resource::{ResourceCategory, ShaderResource, ShaderResourceType};
pub use shader::Shader;
pub use vertex_input::VertexInput;
