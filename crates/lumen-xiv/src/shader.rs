//! Single compiled shaders, as stored in ShCd files and inside packages.

use std::io::Write;

use lumen_common::{FxHashMap, FxHashSet, IndexedList};
use lumen_dxbc::parts::{ResourceDefinition, ShaderInputType, ShaderPart, Signature};
use lumen_dxbc::sm5::OperandType;
use lumen_dxbc::Container;
use tracing::debug;

use crate::io;
use crate::resource::{ResourceCategory, ShaderResource, ShaderResourceType};
use crate::{Error, GraphicsPlatform, Name, ProgramType, Result, VertexInput};

/// `g_SamplerGBuffer`, which is always given a pair number.
const GBUFFER_SAMPLER: u32 = 0xEBBB_29BD;
/// `g_SamplerNormal`, which gives a pair number to itself and to every
/// texture it samples.
const NORMAL_SAMPLER: u32 = 0x0C5E_C1F1;

/// Sentinel `size` of samplers and textures that are not paired.
pub const UNPAIRED: u16 = 0xFFFF;

/// One compiled program with the resources it binds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Shader {
    pub platform: GraphicsPlatform,
    pub program_type: ProgramType,
    /// Platform and stage specific data stored in front of the blob.
    pub additional_header: Vec<u8>,
    /// Compiled bytecode, a DXBC container on DirectX 11.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub blob: Vec<u8>,
    pub constant_buffers: IndexedList<ShaderResource>,
    pub samplers: IndexedList<ShaderResource>,
    pub textures: IndexedList<ShaderResource>,
    pub uavs: IndexedList<ShaderResource>,
}

impl Shader {
    /// Empty shader with a zeroed additional header.
    pub fn new(platform: GraphicsPlatform, program_type: ProgramType) -> Self {
        Self {
            platform,
            program_type,
            additional_header: vec![0; Self::additional_header_size(platform, program_type)],
            blob: Vec::new(),
            constant_buffers: IndexedList::new(),
            samplers: IndexedList::new(),
            textures: IndexedList::new(),
            uavs: IndexedList::new(),
        }
    }

    /// Bytes of additional header in front of the blob. Only vertex shaders
    /// have one: the declared inputs, and on DirectX 11 the used inputs.
    pub fn additional_header_size(platform: GraphicsPlatform, program_type: ProgramType) -> usize {
        match (program_type, platform) {
            (ProgramType::Vertex, GraphicsPlatform::DirectX9) => 4,
            (ProgramType::Vertex, GraphicsPlatform::DirectX11) => 8,
            _ => 0,
        }
    }

    /// Parse a ShCd file.
    pub fn from_shcd_bytes(bytes: &[u8]) -> Result<Self> {
        io::code::read(bytes)
    }

    pub fn to_shcd_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.write_shcd_to(&mut bytes)?;
        Ok(bytes)
    }

    pub fn write_shcd_to<W: Write>(&self, destination: &mut W) -> Result<()> {
        io::code::write(self, destination)
    }

    /// Build a shader from a DirectX 11 blob, deriving its resources and
    /// vertex inputs from the reflection data.
    pub fn from_dxbc_blob(blob: Vec<u8>) -> Result<Self> {
        let container = Container::from_bytes(&blob, true, true)?;
        let rdef = container
            .resource_definition()?
            .ok_or(Error::MissingPart("RDEF"))?;
        let program_type = ProgramType::from_rdef(rdef.program_type)
            .ok_or(Error::UnknownProgramType(u32::from(rdef.program_type.0)))?;

        let mut shader = Self::new(GraphicsPlatform::DirectX11, program_type);
        shader.populate_resources(&rdef)?;

        if program_type == ProgramType::Vertex {
            let isgn = container
                .input_signature()?
                .ok_or(Error::MissingPart("ISGN"))?;
            shader.populate_vertex_inputs(&isgn);
        }

        let shdr = container.shader()?.ok_or(Error::MissingPart("SHDR/SHEX"))?;
        shader.associate_resources(&shdr)?;

        debug!(
            %program_type,
            constant_buffers = shader.constant_buffers.len(),
            samplers = shader.samplers.len(),
            textures = shader.textures.len(),
            uavs = shader.uavs.len(),
            "built shader from DXBC"
        );
        shader.blob = blob;
        Ok(shader)
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

    /// Vertex attributes the shader declares, for vertex shaders.
    pub fn declared_inputs(&self) -> Option<VertexInput> {
        self.header_word(0).map(VertexInput)
    }

    /// Vertex attributes the shader actually reads, for DirectX 11 vertex
    /// shaders.
    pub fn used_inputs(&self) -> Option<VertexInput> {
        self.header_word(1).map(VertexInput)
    }

    fn header_word(&self, index: usize) -> Option<u32> {
        let bytes = self.additional_header.get(index * 4..index * 4 + 4)?;
        Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn set_header_word(&mut self, index: usize, value: u32) {
        if let Some(bytes) = self.additional_header.get_mut(index * 4..index * 4 + 4) {
            bytes.copy_from_slice(&value.to_le_bytes());
        }
    }

    fn populate_resources(&mut self, rdef: &ResourceDefinition) -> Result<()> {
        for binding in &rdef.bindings {
            let name = Name::new(binding.base_name());
            let slot = binding.bind_point as u16;
            let kind = if binding.view_dimension.is_buffer() {
                ShaderResourceType::BUFFER
            } else {
                ShaderResourceType::TEXTURE
            };

            match binding.input_type {
                ShaderInputType::CBUFFER => {
                    let buffer = rdef.constant_buffer(&binding.name).ok_or_else(|| {
                        Error::malformed(
                            "RDEF",
                            format!("binding {} has no constant buffer", binding.name),
                        )
                    })?;
                    let registers = ((buffer.size + 0xF) >> 4) as u16;
                    self.constant_buffers.push(ShaderResource::new(
                        name,
                        ShaderResourceType::UNDEFINED,
                        slot,
                        registers,
                    ))?;
                }
                ShaderInputType::TBUFFER
                | ShaderInputType::TEXTURE
                | ShaderInputType::STRUCTURED
                | ShaderInputType::BYTE_ADDRESS => {
                    self.textures
                        .push(ShaderResource::new(name, kind, slot, UNPAIRED))?;
                }
                ShaderInputType::SAMPLER => {
                    self.samplers.push(ShaderResource::new(
                        name,
                        ShaderResourceType::UNDEFINED,
                        slot,
                        UNPAIRED,
                    ))?;
                }
                ShaderInputType::UAV_RW_TYPED
                | ShaderInputType::UAV_RW_STRUCTURED
                | ShaderInputType::UAV_RW_BYTE_ADDRESS
                | ShaderInputType::UAV_APPEND_STRUCTURED
                | ShaderInputType::UAV_CONSUME_STRUCTURED
                | ShaderInputType::UAV_RW_STRUCTURED_WITH_COUNTER => {
                    self.uavs.push(ShaderResource::new(
                        name,
                        kind,
                        slot,
                        binding.bind_count as u16,
                    ))?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn populate_vertex_inputs(&mut self, isgn: &Signature) {
        let mut declared = VertexInput::NONE;
        let mut used = VertexInput::NONE;
        for element in &isgn.elements {
            let input = VertexInput::from_element(element);
            declared |= input;
            if element.read_write_mask != 0 {
                used |= input;
            }
        }
        self.set_header_word(0, declared.0);
        self.set_header_word(1, used.0);
    }

    /// Number the samplers and textures that are used together.
    ///
    /// Every instruction that names both a texture and a sampler links them.
    /// A resource linked to one of the same name, or to the normal sampler,
    /// gets the next number in its list; everything else stays unpaired.
    fn associate_resources(&mut self, shdr: &ShaderPart) -> Result<()> {
        let mut texture_samplers: FxHashMap<u32, FxHashSet<u32>> = FxHashMap::default();
        let mut sampler_textures: FxHashMap<u32, FxHashSet<u32>> = FxHashMap::default();

        for instruction in shdr.instructions() {
            let instruction = instruction?;
            if !instruction.has_generic_operands() {
                continue;
            }

            let mut textures = FxHashSet::default();
            let mut samplers = FxHashSet::default();
            for operand in instruction.operands() {
                let operand = operand?;
                let Some(register) = operand.immediate_index() else {
                    continue;
                };
                let (resources, found) = match operand.token.operand_type() {
                    OperandType::RESOURCE => (&self.textures, &mut textures),
                    OperandType::SAMPLER => (&self.samplers, &mut samplers),
                    _ => continue,
                };
                if let Some(resource) = resources.get(register as usize) {
                    found.insert(resource.name.hash());
                }
            }

            if !textures.is_empty() && !samplers.is_empty() {
                for &sampler in &samplers {
                    sampler_textures
                        .entry(sampler)
                        .or_default()
                        .extend(textures.iter().copied());
                }
                for &texture in &textures {
                    texture_samplers
                        .entry(texture)
                        .or_default()
                        .extend(samplers.iter().copied());
                }
            }
        }

        number_resources(&mut self.samplers, &sampler_textures);
        number_resources(&mut self.textures, &texture_samplers);
        Ok(())
    }
}

fn number_resources(
    resources: &mut IndexedList<ShaderResource>,
    links: &FxHashMap<u32, FxHashSet<u32>>,
) {
    let mut next = 0u16;
    for resource in resources.iter_mut() {
        let id = resource.name.hash();
        let linked = links.get(&id);
        let numbered = id == GBUFFER_SAMPLER
            || id == NORMAL_SAMPLER
            || linked.is_some_and(|others| others.contains(&id) || others.contains(&NORMAL_SAMPLER));
        if numbered {
            resource.size = next;
            next = next.wrapping_add(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::name_hash;

    fn resource(name: &str) -> ShaderResource {
        ShaderResource::new(name, ShaderResourceType::TEXTURE, 0, UNPAIRED)
    }

    fn sample(texture: u32, sampler: u32) -> [u32; 9] {
        // sample r0.xyzw, v1.xyxx, t<texture>.xyzw, s<sampler>
        [
            0x0900_0045,
            0x0010_00F2,
            0,
            0x0010_1046,
            1,
            0x0010_7E46,
            texture,
            0x0010_6000,
            sampler,
        ]
    }

    fn shader_part(tokens: Vec<u32>) -> ShaderPart {
        ShaderPart {
            version: 0x50,
            program_type: lumen_dxbc::parts::ProgramType::PIXEL,
            tokens,
        }
    }

    #[test]
    fn test_special_sampler_hashes() {
        assert_eq!(name_hash("g_SamplerGBuffer"), GBUFFER_SAMPLER);
        assert_eq!(name_hash("g_SamplerNormal"), NORMAL_SAMPLER);
    }

    #[test]
    fn test_additional_header_size() {
        use GraphicsPlatform::*;
        assert_eq!(Shader::additional_header_size(DirectX11, ProgramType::Vertex), 8);
        assert_eq!(Shader::additional_header_size(DirectX9, ProgramType::Vertex), 4);
        assert_eq!(Shader::additional_header_size(DirectX11, ProgramType::Pixel), 0);
        assert_eq!(Shader::new(DirectX9, ProgramType::Vertex).additional_header, [0; 4]);
    }

    #[test]
    fn test_vertex_inputs() {
        let mut isgn = Signature::default();
        for (name, index, rw) in [("POSITION", 0, 0x7), ("COLOR", 0, 0), ("TEXCOORD", 2, 0x3)] {
            isgn.elements
                .push(lumen_dxbc::parts::SignatureElement {
                    name: name.to_owned(),
                    semantic_index: index,
                    read_write_mask: rw,
                    ..Default::default()
                })
                .unwrap();
        }

        let mut shader = Shader::new(GraphicsPlatform::DirectX11, ProgramType::Vertex);
        shader.populate_vertex_inputs(&isgn);
        assert_eq!(
            shader.declared_inputs(),
            Some(VertexInput::POSITION | VertexInput::COLOR0 | VertexInput::TEXCOORD2)
        );
        assert_eq!(
            shader.used_inputs(),
            Some(VertexInput::POSITION | VertexInput::TEXCOORD2)
        );

        let pixel = Shader::new(GraphicsPlatform::DirectX11, ProgramType::Pixel);
        assert_eq!(pixel.declared_inputs(), None);
    }

    #[test]
    fn test_same_name_pairs_are_numbered() {
        let mut shader = Shader::new(GraphicsPlatform::DirectX11, ProgramType::Pixel);
        for name in ["g_SamplerDiffuse", "g_SamplerMask", "g_SamplerGBuffer"] {
            shader.samplers.push(resource(name)).unwrap();
        }
        for name in ["g_SamplerDiffuse", "g_Other", "g_SamplerMask"] {
            shader.textures.push(resource(name)).unwrap();
        }

        // Diffuse with itself, mask texture with diffuse sampler.
        let tokens = [sample(0, 0), sample(2, 0)].concat();
        shader.associate_resources(&shader_part(tokens)).unwrap();

        let sizes = |list: &IndexedList<ShaderResource>| list.iter().map(|r| r.size).collect::<Vec<_>>();
        assert_eq!(sizes(&shader.samplers), [0, UNPAIRED, 1]);
        assert_eq!(sizes(&shader.textures), [0, UNPAIRED, UNPAIRED]);
    }

    #[test]
    fn test_normal_sampler_is_transitive() {
        let mut shader = Shader::new(GraphicsPlatform::DirectX11, ProgramType::Pixel);
        shader.samplers.push(resource("g_SamplerNormal")).unwrap();
        for name in ["g_SamplerSpecular", "g_SamplerNormal", "g_Unused"] {
            shader.textures.push(resource(name)).unwrap();
        }

        let tokens = [sample(0, 0), sample(1, 0)].concat();
        shader.associate_resources(&shader_part(tokens)).unwrap();

        assert_eq!(shader.samplers[0].size, 0);
        assert_eq!(shader.textures[0].size, 0);
        assert_eq!(shader.textures[1].size, 1);
        assert_eq!(shader.textures[2].size, UNPAIRED);
    }

    #[test]
    fn test_out_of_range_register_is_ignored() {
        let mut shader = Shader::new(GraphicsPlatform::DirectX11, ProgramType::Pixel);
        shader.samplers.push(resource("g_SamplerDiffuse")).unwrap();
        shader.textures.push(resource("g_SamplerDiffuse")).unwrap();

        shader.associate_resources(&shader_part(sample(5, 0).to_vec())).unwrap();
        assert_eq!(shader.samplers[0].size, UNPAIRED);
    }
}
