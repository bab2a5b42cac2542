//! Shader packages: a set of shaders plus the keys and render nodes that
//! decide which of them draw.

mod key;
mod material;
mod mutation;
mod node;
pub mod selector;

use std::io::Write;

use lumen_common::IndexedList;
use tracing::debug;

pub use key::ShaderKey;
pub use material::{DefaultValues, MaterialParameter};
pub use mutation::KeyAlternate;
pub use node::{NodeSelector, RenderNode, RenderPass};

use crate::io;
use crate::resource::{ResourceCategory, ShaderResource};
use crate::{Error, GraphicsPlatform, Name, ProgramType, Result, Shader};

/// Name of the constant buffer that holds material parameters.
pub const MATERIAL_PARAMETERS_CONSTANT: &str = "g_MaterialParameter";

/// A ShPk file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ShaderPackage {
    /// Header version, [`ShaderPackage::VERSION_11`] or [`ShaderPackage::VERSION_13`].
    pub version: u32,
    pub platform: GraphicsPlatform,
    pub vertex_shaders: Vec<Shader>,
    pub pixel_shaders: Vec<Shader>,

    /// Size in bytes of the material parameter buffer.
    pub material_parameters_size: u32,
    pub material_parameters: IndexedList<MaterialParameter>,
    /// Initial contents of the material parameter buffer, if the package has them.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub material_parameters_defaults: Option<Vec<u8>>,

    pub constant_buffers: IndexedList<ShaderResource>,
    pub samplers: IndexedList<ShaderResource>,
    pub textures: IndexedList<ShaderResource>,
    pub uavs: IndexedList<ShaderResource>,

    pub system_keys: IndexedList<ShaderKey>,
    pub scene_keys: IndexedList<ShaderKey>,
    pub material_keys: IndexedList<ShaderKey>,
    pub subview_key_0: ShaderKey,
    pub subview_key_1: ShaderKey,

    pub render_nodes: IndexedList<RenderNode>,
    /// Every selector that resolves to a node, primary selectors first.
    pub selectors: IndexedList<NodeSelector>,
}

impl ShaderPackage {
    pub const VERSION_11: u32 = 0x0B01;
    pub const VERSION_13: u32 = 0x0D01;

    pub fn new(platform: GraphicsPlatform) -> Self {
        Self {
            version: Self::VERSION_13,
            platform,
            vertex_shaders: Vec::new(),
            pixel_shaders: Vec::new(),
            material_parameters_size: 0,
            material_parameters: IndexedList::new(),
            material_parameters_defaults: None,
            constant_buffers: IndexedList::new(),
            samplers: IndexedList::new(),
            textures: IndexedList::new(),
            uavs: IndexedList::new(),
            system_keys: IndexedList::new(),
            scene_keys: IndexedList::new(),
            material_keys: IndexedList::new(),
            subview_key_0: ShaderKey::new(Name::empty(), Name::empty()),
            subview_key_1: ShaderKey::new(Name::empty(), Name::empty()),
            render_nodes: IndexedList::new(),
            selectors: IndexedList::new(),
        }
    }

    pub fn from_shpk_bytes(bytes: &[u8]) -> Result<Self> {
        io::package::read(bytes)
    }

    pub fn to_shpk_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_shpk_to(&mut bytes)?;
        Ok(bytes)
    }

    pub fn write_shpk_to<W: Write>(&self, destination: &mut W) -> Result<()> {
        io::package::write(self, destination)
    }

    /// Vertex then pixel shaders, with their program type.
    pub fn shaders(&self) -> [(ProgramType, &[Shader]); 2] {
        [
            (ProgramType::Vertex, self.vertex_shaders.as_slice()),
            (ProgramType::Pixel, self.pixel_shaders.as_slice()),
        ]
    }

    pub fn shaders_by_program_type(&self, program_type: ProgramType) -> Result<&Vec<Shader>> {
        match program_type {
            ProgramType::Vertex => Ok(&self.vertex_shaders),
            ProgramType::Pixel => Ok(&self.pixel_shaders),
            other => Err(Error::Unsupported(format!("{} in a shader package", other))),
        }
    }

    pub fn shaders_by_program_type_mut(&mut self, program_type: ProgramType) -> Result<&mut Vec<Shader>> {
        match program_type {
            ProgramType::Vertex => Ok(&mut self.vertex_shaders),
            ProgramType::Pixel => Ok(&mut self.pixel_shaders),
            other => Err(Error::Unsupported(format!("{} in a shader package", other))),
        }
    }

    pub fn resources(&self, category: ResourceCategory) -> &IndexedList<ShaderResource> {
        match category {
            ResourceCategory::ConstantBuffer => &self.constant_buffers,
            ResourceCategory::Sampler => &self.samplers,
            ResourceCategory::Texture => &self.textures,
            ResourceCategory::Uav => &self.uavs,
        }
    }

    pub fn resources_mut(&mut self, category: ResourceCategory) -> &mut IndexedList<ShaderResource> {
        match category {
            ResourceCategory::ConstantBuffer => &mut self.constant_buffers,
            ResourceCategory::Sampler => &mut self.samplers,
            ResourceCategory::Texture => &mut self.textures,
            ResourceCategory::Uav => &mut self.uavs,
        }
    }

    /// Find the node for a selector, by primary selector first and then
    /// through the selector table.
    pub fn render_node(&self, selector: u32) -> Option<&RenderNode> {
        self.render_nodes.get_by_key(&selector).or_else(|| {
            self.selectors
                .get_by_key(&selector)
                .and_then(|entry| self.render_nodes.get(entry.node as usize))
        })
    }

    /// Rebuild the package resource tables from the resources of its shaders,
    /// and resize the material parameter buffer to match.
    ///
    /// Slots already configured in the package are kept. New resources get
    /// slot 65535 for constant buffers and 2 otherwise. Constant buffers take
    /// the largest size any shader declares; the other kinds keep their
    /// package size, or 0.
    pub fn update_resources(&mut self) -> Result<()> {
        for category in [
            ResourceCategory::ConstantBuffer,
            ResourceCategory::Sampler,
            ResourceCategory::Texture,
            ResourceCategory::Uav,
        ] {
            let is_constant_buffer = category == ResourceCategory::ConstantBuffer;
            let existing = self.resources(category);
            let mut collected: IndexedList<ShaderResource> = IndexedList::new();

            for shader in self.vertex_shaders.iter().chain(&self.pixel_shaders) {
                for resource in shader.resources(category) {
                    let carry = collected.get_by_key(&resource.name);
                    if carry.is_some() && !is_constant_buffer {
                        continue;
                    }

                    let (slot, existing_size) = match existing.get_by_key(&resource.name) {
                        Some(existing) => (existing.slot, existing.size),
                        None if is_constant_buffer => (65535, 0),
                        None => (2, 0),
                    };
                    let size = if is_constant_buffer {
                        carry.map_or(0, |carry| carry.size).max(resource.size)
                    } else {
                        existing_size
                    };

                    collected.insert_or_replace(ShaderResource {
                        name: resource.name.clone(),
                        kind: resource.kind,
                        slot,
                        size,
                    });
                }
            }

            *self.resources_mut(category) = collected;
        }

        let material_constant = Name::new(MATERIAL_PARAMETERS_CONSTANT);
        let mut size = self
            .constant_buffers
            .get_by_key(&material_constant)
            .map_or(0, |buffer| u32::from(buffer.size) << 4);
        for parameter in &self.material_parameters {
            size = size.max(parameter.end());
        }
        self.material_parameters_size = (size + 0xF) & !0xF;

        if let Some(defaults) = &mut self.material_parameters_defaults {
            let size = self.material_parameters_size as usize;
            if defaults.len() < size {
                defaults.resize(size, 0);
            }
        }

        debug!(
            constant_buffers = self.constant_buffers.len(),
            samplers = self.samplers.len(),
            textures = self.textures.len(),
            uavs = self.uavs.len(),
            material_parameters_size = self.material_parameters_size,
            "updated package resources"
        );
        Ok(())
    }
}
