//! DXBC shader containers.
//!
//! A DXBC file is a small header, a proprietary MD5-style digest and a table
//! of tagged parts. This crate reads and writes containers byte-exactly and
//! decodes the parts that carry reflection data:
//!
//! - `RDEF` - constant buffers, variable types and resource bindings
//! - `ISGN`/`OSGN`/`PCSG` - input, output and patch-constant signatures
//! - `IFCE` - dynamic-linkage class instances and interface slots
//! - `SHDR`/`SHEX` - the bytecode, walkable with [`sm5::Instructions`]
//! - `STAT` - compiler statistics
//!
//! Anything else is carried as opaque bytes.
//!
//! # Example
//!
//! ```no_run
//! use lumen_dxbc::Container;
//!
//! let bytes = std::fs::read("shader.dxbc")?;
//! let container = Container::from_bytes(&bytes, true, false)?;
//! if let Some(rdef) = container.resource_definition()? {
//!     for binding in &rdef.bindings {
//!         println!("{} at {}", binding.name, binding.bind_point);
//!     }
//! }
//! assert_eq!(container.to_bytes()?, bytes);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod container;
pub mod digest;
mod error;
mod fourcc;
mod part;
pub mod parts;
pub mod sm5;

pub use container::{Container, ContainerPart};
pub use error::{Error, Result};
pub use fourcc::FourCC;
pub use part::{Part, TypedPart};
