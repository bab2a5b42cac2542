//! ShPk: shaders plus the keys and render nodes that select them.
//!
//! Two header versions exist. Version 13 extends version 11 with three
//! reserved header words, v6 shader headers, a copy of the sub-view values
//! at the start of every node and three reserved words per pass.

use std::io::Write;

use lumen_common::{FxHashMap, IndexedList};
use tracing::debug;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use super::{FileReader, FileWriter, ShaderLayout};
use crate::names::{resolve_in, try_resolve, with_known_suffixes};
use crate::package::{MaterialParameter, NodeSelector, RenderNode, RenderPass, ShaderKey, ShaderPackage};
use crate::{Error, Name, ProgramType, Result};

const MAGIC: &[u8; 4] = b"ShPk";

/// Reserved word in v13 shader headers, by program type.
const VERTEX_SHADER_RESERVED: u32 = 1;
const PIXEL_SHADER_RESERVED: u32 = 4;

#[derive(Debug, Clone, Copy, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawPackageHeader {
    vertex_shader_count: u32,
    pixel_shader_count: u32,
    material_parameters_size: u32,
    material_parameter_count: u16,
    has_material_parameter_defaults: u16,
    constant_buffer_count: u32,
    sampler_count: u16,
    texture_count: u16,
    uav_count: u32,
    system_key_count: u32,
    scene_key_count: u32,
    material_key_count: u32,
    node_count: u32,
    alias_count: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawMaterialParameter {
    name_hash: u32,
    offset: u16,
    size: u16,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawShaderKey {
    key_hash: u32,
    default_hash: u32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawPass {
    name_hash: u32,
    vertex_shader_index: i32,
    pixel_shader_index: i32,
}

#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
struct RawAlias {
    selector: u32,
    node: u32,
}

/// Whether a version uses the v13 layout.
fn is_version_13(version: u32) -> Result<bool> {
    match version & 0xFFFF_FF00 {
        0x0B00 => Ok(false),
        0x0D00 => Ok(true),
        _ => Err(Error::UnsupportedVersion {
            format: "ShPk",
            version,
        }),
    }
}

fn reserved_mismatch(what: &str, actual: impl std::fmt::LowerHex, expected: impl std::fmt::LowerHex) -> Error {
    Error::malformed(
        "ShPk",
        format!("{} is {:#x}, expected {:#x}", what, actual, expected),
    )
}

pub(crate) fn read(bytes: &[u8]) -> Result<ShaderPackage> {
    let mut reader = FileReader::new(bytes, MAGIC, "ShPk")?;
    let v13 = is_version_13(reader.version)?;

    let header = reader.header.read_struct::<RawPackageHeader>()?;
    if v13 {
        for what in ["reserved header word A", "reserved header word B", "reserved header word C"] {
            let value = reader.header.read_u32()?;
            if value != 0 {
                return Err(reserved_mismatch(what, value, 0u32));
            }
        }
    }

    let mut package = ShaderPackage::new(reader.platform);
    package.version = reader.version;

    let (vertex_layout, pixel_layout) = if v13 {
        (
            ShaderLayout::V6 {
                expected: VERTEX_SHADER_RESERVED,
            },
            ShaderLayout::V6 {
                expected: PIXEL_SHADER_RESERVED,
            },
        )
    } else {
        (ShaderLayout::V5, ShaderLayout::V5)
    };
    for _ in 0..header.vertex_shader_count {
        let shader = reader.read_shader(ProgramType::Vertex, vertex_layout)?;
        package.vertex_shaders.push(shader);
    }
    for _ in 0..header.pixel_shader_count {
        let shader = reader.read_shader(ProgramType::Pixel, pixel_layout)?;
        package.pixel_shaders.push(shader);
    }

    package.material_parameters_size = header.material_parameters_size;
    for _ in 0..header.material_parameter_count {
        let raw = reader.header.read_struct::<RawMaterialParameter>()?;
        package.material_parameters.push(MaterialParameter {
            name: try_resolve(raw.name_hash),
            offset: raw.offset,
            size: raw.size,
        })?;
    }
    if header.has_material_parameter_defaults != 0 {
        let defaults = reader
            .header
            .read_bytes(header.material_parameters_size as usize)?;
        package.material_parameters_defaults = Some(defaults.to_vec());
    }

    reader.read_resources(&mut package.constant_buffers, header.constant_buffer_count as usize)?;
    reader.read_resources(&mut package.samplers, header.sampler_count as usize)?;
    reader.read_resources(&mut package.textures, header.texture_count as usize)?;
    reader.read_resources(&mut package.uavs, header.uav_count as usize)?;

    let system_resolvers = read_keys(&mut reader, &mut package.system_keys, header.system_key_count)?;
    let scene_resolvers = read_keys(&mut reader, &mut package.scene_keys, header.scene_key_count)?;
    let material_resolvers =
        read_keys(&mut reader, &mut package.material_keys, header.material_key_count)?;

    package.subview_key_0 = ShaderKey::new(Name::empty(), try_resolve(reader.header.read_u32()?));
    package.subview_key_1 = ShaderKey::new(Name::empty(), try_resolve(reader.header.read_u32()?));

    for index in 0..header.node_count {
        let mut node = RenderNode::new(reader.header.read_u32()?);
        let pass_count = reader.header.read_u32()?;
        node.pass_indices = reader.header.read_array::<16>()?;
        let subview_copy = if v13 {
            Some((reader.header.read_u32()?, reader.header.read_u32()?))
        } else {
            None
        };

        read_values(&mut reader, &mut package.system_keys, &system_resolvers, &mut node.system_values)?;
        read_values(&mut reader, &mut package.scene_keys, &scene_resolvers, &mut node.scene_values)?;
        read_values(
            &mut reader,
            &mut package.material_keys,
            &material_resolvers,
            &mut node.material_values,
        )?;
        node.subview_value_0 = try_resolve(reader.header.read_u32()?);
        package.subview_key_0.add_value(node.subview_value_0.clone());
        node.subview_value_1 = try_resolve(reader.header.read_u32()?);
        package.subview_key_1.add_value(node.subview_value_1.clone());

        if let Some((copy_0, copy_1)) = subview_copy {
            if copy_0 != node.subview_value_0.hash() {
                return Err(reserved_mismatch("node sub-view copy 0", copy_0, node.subview_value_0.hash()));
            }
            if copy_1 != node.subview_value_1.hash() {
                return Err(reserved_mismatch("node sub-view copy 1", copy_1, node.subview_value_1.hash()));
            }
        }

        for _ in 0..pass_count {
            let raw = reader.header.read_struct::<RawPass>()?;
            if v13 {
                for _ in 0..3 {
                    let value = reader.header.read_i32()?;
                    if value != -1 {
                        return Err(reserved_mismatch("reserved pass word", value, -1i32));
                    }
                }
            }
            node.passes.push(RenderPass::new(
                try_resolve(raw.name_hash),
                raw.vertex_shader_index,
                raw.pixel_shader_index,
            ))?;
        }

        package.selectors.push(NodeSelector {
            selector: node.primary_selector,
            node: index,
        })?;
        package.render_nodes.push(node)?;
    }

    for _ in 0..header.alias_count {
        let raw = reader.header.read_struct::<RawAlias>()?;
        package.selectors.push(NodeSelector {
            selector: raw.selector,
            node: raw.node,
        })?;
    }

    reader.expect_consumed()?;

    debug!(
        version = format_args!("{:#06X}", package.version),
        vertex_shaders = package.vertex_shaders.len(),
        pixel_shaders = package.pixel_shaders.len(),
        nodes = package.render_nodes.len(),
        selectors = package.selectors.len(),
        "read ShPk"
    );
    Ok(package)
}

/// Read a key scope, returning the value resolver of each key.
fn read_keys(
    reader: &mut FileReader<'_>,
    keys: &mut IndexedList<ShaderKey>,
    count: u32,
) -> Result<Vec<FxHashMap<u32, Name>>> {
    let mut resolvers = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let raw = reader.header.read_struct::<RawShaderKey>()?;
        let key = try_resolve(raw.key_hash);
        let resolver = with_known_suffixes(&key);
        let default_value = resolve_in(Some(&resolver), raw.default_hash);
        keys.push(ShaderKey::new(key, default_value))?;
        resolvers.push(resolver);
    }
    Ok(resolvers)
}

/// Read one value per key of a scope into a node, recording each on its key.
fn read_values(
    reader: &mut FileReader<'_>,
    keys: &mut IndexedList<ShaderKey>,
    resolvers: &[FxHashMap<u32, Name>],
    values: &mut FxHashMap<Name, Name>,
) -> Result<()> {
    for (key, resolver) in keys.iter_mut().zip(resolvers) {
        let value = resolve_in(Some(resolver), reader.header.read_u32()?);
        key.add_value(value.clone());
        values.insert(key.key.clone(), value);
    }
    Ok(())
}

pub(crate) fn write<W: Write>(package: &ShaderPackage, destination: &mut W) -> Result<()> {
    let v13 = is_version_13(package.version)?;
    let aliases: Vec<&NodeSelector> = package
        .selectors
        .iter()
        .filter(|entry| !package.render_nodes.contains_key(&entry.selector))
        .collect();

    let mut writer = FileWriter::new(MAGIC, package.version, package.platform)?;

    let header = RawPackageHeader {
        vertex_shader_count: package.vertex_shaders.len() as u32,
        pixel_shader_count: package.pixel_shaders.len() as u32,
        material_parameters_size: package.material_parameters_size,
        material_parameter_count: package.material_parameters.len() as u16,
        has_material_parameter_defaults: u16::from(package.material_parameters_defaults.is_some()),
        constant_buffer_count: package.constant_buffers.len() as u32,
        sampler_count: package.samplers.len() as u16,
        texture_count: package.textures.len() as u16,
        uav_count: package.uavs.len() as u32,
        system_key_count: package.system_keys.len() as u32,
        scene_key_count: package.scene_keys.len() as u32,
        material_key_count: package.material_keys.len() as u32,
        node_count: package.render_nodes.len() as u32,
        alias_count: aliases.len() as u32,
    };
    let stream = writer.header()?;
    stream.write_all(header.as_bytes())?;
    if v13 {
        stream.write_repeat(12, 0)?;
    }

    for shader in &package.vertex_shaders {
        writer.write_shader(shader, v13.then_some(VERTEX_SHADER_RESERVED))?;
    }
    for shader in &package.pixel_shaders {
        writer.write_shader(shader, v13.then_some(PIXEL_SHADER_RESERVED))?;
    }

    let stream = writer.header()?;
    for parameter in &package.material_parameters {
        let raw = RawMaterialParameter {
            name_hash: parameter.name.hash(),
            offset: parameter.offset,
            size: parameter.size,
        };
        stream.write_all(raw.as_bytes())?;
    }
    if let Some(defaults) = &package.material_parameters_defaults {
        let size = package.material_parameters_size as usize;
        let stored = defaults.len().min(size);
        stream.write_all(&defaults[..stored])?;
        stream.write_repeat(size - stored, 0)?;
    }

    writer.write_resources(&package.constant_buffers)?;
    writer.write_resources(&package.samplers)?;
    writer.write_resources(&package.textures)?;
    writer.write_resources(&package.uavs)?;

    let stream = writer.header()?;
    for key in package
        .system_keys
        .iter()
        .chain(&package.scene_keys)
        .chain(&package.material_keys)
    {
        let raw = RawShaderKey {
            key_hash: key.key.hash(),
            default_hash: key.default_value.hash(),
        };
        stream.write_all(raw.as_bytes())?;
    }
    stream.write_u32_le(package.subview_key_0.default_value.hash())?;
    stream.write_u32_le(package.subview_key_1.default_value.hash())?;

    for node in &package.render_nodes {
        stream.write_u32_le(node.primary_selector)?;
        stream.write_u32_le(node.passes.len() as u32)?;
        stream.write_all(&node.pass_indices)?;
        if v13 {
            stream.write_u32_le(node.subview_value_0.hash())?;
            stream.write_u32_le(node.subview_value_1.hash())?;
        }

        for (keys, values) in [
            (&package.system_keys, &node.system_values),
            (&package.scene_keys, &node.scene_values),
            (&package.material_keys, &node.material_values),
        ] {
            for key in keys {
                let value = values.get(&key.key).ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "render node {:#010X} has no value for key {}",
                        node.primary_selector, key.key
                    ))
                })?;
                stream.write_u32_le(value.hash())?;
            }
        }
        stream.write_u32_le(node.subview_value_0.hash())?;
        stream.write_u32_le(node.subview_value_1.hash())?;

        for pass in &node.passes {
            let raw = RawPass {
                name_hash: pass.name.hash(),
                vertex_shader_index: pass.vertex_shader_index,
                pixel_shader_index: pass.pixel_shader_index,
            };
            stream.write_all(raw.as_bytes())?;
            if v13 {
                stream.write_repeat(12, 0xFF)?;
            }
        }
    }

    for alias in aliases {
        let raw = RawAlias {
            selector: alias.selector,
            node: alias.node,
        };
        stream.write_all(raw.as_bytes())?;
    }

    writer.finish(destination)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::name_hash;
    use crate::package::KeyAlternate;
    use crate::resource::{ShaderResource, ShaderResourceType};
    use crate::{GraphicsPlatform, Shader};

    fn shader(program_type: ProgramType, blob: &[u8]) -> Shader {
        let mut shader = Shader::new(GraphicsPlatform::DirectX11, program_type);
        shader.blob = blob.to_vec();
        shader
            .constant_buffers
            .push(ShaderResource::new("g_MaterialParameter", ShaderResourceType::UNDEFINED, 0, 2))
            .unwrap();
        shader
    }

    fn sample_package(version: u32) -> ShaderPackage {
        let mut package = ShaderPackage::new(GraphicsPlatform::DirectX11);
        package.version = version;
        package.vertex_shaders.push(shader(ProgramType::Vertex, b"vs0"));
        package.pixel_shaders.push(shader(ProgramType::Pixel, b"ps0"));
        package.pixel_shaders.push(shader(ProgramType::Pixel, b"ps1"));

        package.material_parameters_size = 32;
        package
            .material_parameters
            .push(MaterialParameter::new("g_DiffuseColor", 0, 12))
            .unwrap();
        let mut defaults = vec![0; 32];
        defaults[..12].fill(0x3F);
        package.material_parameters_defaults = Some(defaults);
        package
            .constant_buffers
            .push(ShaderResource::new("g_MaterialParameter", ShaderResourceType::UNDEFINED, 5, 2))
            .unwrap();
        package
            .samplers
            .push(ShaderResource::new("g_SamplerNormal", ShaderResourceType::UNDEFINED, 1, 0))
            .unwrap();

        let system_key = Name::new("ApplyFog_Table");
        let fog_off = &Name::new("ApplyFog") + "_None";
        package
            .system_keys
            .push(ShaderKey::new(system_key.clone(), fog_off.clone()))
            .unwrap();
        let material_key = Name::from_hash(0x1111_2222);
        let material_default = Name::from_hash(0x3333_4444);
        package
            .material_keys
            .push(ShaderKey::new(material_key.clone(), material_default.clone()))
            .unwrap();

        for (selector, pixel) in [(100u32, 0), (200, 1)] {
            let mut node = RenderNode::new(selector);
            node.system_values.insert(system_key.clone(), fog_off.clone());
            node.material_values
                .insert(material_key.clone(), material_default.clone());
            node.pass_indices[0] = 0;
            node.passes
                .push(RenderPass::new(Name::from_hash(0xABCD), 0, pixel))
                .unwrap();
            package.selectors.push(NodeSelector { selector, node: selector / 100 - 1 }).unwrap();
            package.render_nodes.push(node).unwrap();
        }
        package.selectors.push(NodeSelector { selector: 300, node: 1 }).unwrap();
        package
    }

    #[test]
    fn test_round_trip_v13() {
        let package = sample_package(ShaderPackage::VERSION_13);
        let bytes = package.to_shpk_bytes().unwrap();
        assert_eq!(&bytes[..4], b"ShPk");
        assert_eq!(&bytes[4..8], &0x0D01u32.to_le_bytes());

        let decoded = ShaderPackage::from_shpk_bytes(&bytes).unwrap();
        assert_eq!(decoded, package);
        assert_eq!(decoded.to_shpk_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_round_trip_v11() {
        let package = sample_package(ShaderPackage::VERSION_11);
        let bytes = package.to_shpk_bytes().unwrap();
        let decoded = ShaderPackage::from_shpk_bytes(&bytes).unwrap();
        assert_eq!(decoded.version, ShaderPackage::VERSION_11);
        assert_eq!(decoded, package);
        assert_eq!(decoded.to_shpk_bytes().unwrap(), bytes);

        let v13 = sample_package(ShaderPackage::VERSION_13).to_shpk_bytes().unwrap();
        // 3 header words, 3 shader words, 2 node words and 3 pass words per node
        assert_eq!(v13.len() - bytes.len(), 4 * (3 + 3 + 2 * (2 + 3)));
    }

    #[test]
    fn test_names_are_resolved() {
        let bytes = sample_package(ShaderPackage::VERSION_13).to_shpk_bytes().unwrap();
        let package = ShaderPackage::from_shpk_bytes(&bytes).unwrap();

        let key = &package.system_keys[0];
        assert_eq!(key.key.text(), Some("ApplyFog_Table"));
        assert_eq!(key.default_value.text(), Some("ApplyFog_None"));
        assert_eq!(package.material_parameters[0].name.text(), Some("g_DiffuseColor"));
        assert_eq!(package.material_keys[0].key.text(), None);
        assert_eq!(package.subview_key_0.default_value, Name::empty());
        assert_eq!(package.samplers[0].name.text(), Some("g_SamplerNormal"));
    }

    #[test]
    fn test_aliases_and_lookup() {
        let bytes = sample_package(ShaderPackage::VERSION_13).to_shpk_bytes().unwrap();
        let package = ShaderPackage::from_shpk_bytes(&bytes).unwrap();
        assert_eq!(
            package
                .selectors
                .iter()
                .map(|s| (s.selector, s.node))
                .collect::<Vec<_>>(),
            [(100, 0), (200, 1), (300, 1)]
        );
        let node = package.render_node(300).unwrap();
        assert_eq!(node.primary_selector, 200);
        assert_eq!(node.passes[0].pixel_shader_index, 1);
    }

    #[test]
    fn test_defaults_are_padded() {
        let mut package = sample_package(ShaderPackage::VERSION_13);
        package.material_parameters_defaults = Some(vec![0x3F; 12]);
        let decoded = ShaderPackage::from_shpk_bytes(&package.to_shpk_bytes().unwrap()).unwrap();
        let defaults = decoded.material_parameters_defaults.unwrap();
        assert_eq!(defaults.len(), 32);
        assert_eq!(&defaults[..12], &[0x3F; 12]);
        assert!(defaults[12..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_round_trip_after_material_key() {
        let mut package = sample_package(ShaderPackage::VERSION_13);
        let alternate = KeyAlternate::new("_B").with_replacement(ProgramType::Pixel, 1, 0);
        package.add_material_key("Foo", "_A", &[alternate]).unwrap();
        assert_eq!(package.render_nodes.len(), 3);
        assert_eq!(package.selectors.len(), 6);

        let bytes = package.to_shpk_bytes().unwrap();
        let decoded = ShaderPackage::from_shpk_bytes(&bytes).unwrap();
        assert_eq!(decoded.render_nodes.len(), 3);
        assert_eq!(decoded.selectors.len(), 6);
        assert_eq!(decoded.material_keys[1].values.len(), 2);
        for entry in &package.selectors {
            let expected = &package.render_nodes[entry.node as usize];
            let actual = decoded.render_node(entry.selector).unwrap();
            assert_eq!(actual.primary_selector, expected.primary_selector);
        }
        assert_eq!(decoded.to_shpk_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_missing_node_value() {
        let mut package = sample_package(ShaderPackage::VERSION_13);
        package.render_nodes.get_mut(0).unwrap().material_values.clear();
        assert!(matches!(package.to_shpk_bytes(), Err(Error::InvalidArgument(_))));
    }

    /// One node with one pass and nothing else.
    fn minimal_v13() -> Vec<u8> {
        let mut package = ShaderPackage::new(GraphicsPlatform::DirectX11);
        let mut node = RenderNode::new(7);
        node.passes.push(RenderPass::new(Name::from_hash(1), 0, 0)).unwrap();
        package.render_nodes.push(node).unwrap();
        package.selectors.push(NodeSelector { selector: 7, node: 0 }).unwrap();
        package.to_shpk_bytes().unwrap()
    }

    #[test]
    fn test_minimal_layout() {
        let bytes = minimal_v13();
        // common header, package header, reserved words, sub-view defaults
        let node = 24 + 48 + 12 + 8;
        assert_eq!(&bytes[node..node + 4], &7u32.to_le_bytes());
        assert_eq!(&bytes[node + 4..node + 8], &1u32.to_le_bytes());
        let pass = node + 8 + 16 + 8 + 8;
        assert_eq!(&bytes[pass..pass + 4], &1u32.to_le_bytes());
        assert_eq!(&bytes[pass + 12..pass + 24], &[0xFF; 12]);
        assert_eq!(bytes.len(), pass + 24);
        assert!(ShaderPackage::from_shpk_bytes(&bytes).is_ok());
    }

    #[test]
    fn test_v13_reserved_fields() {
        let node = 24 + 48 + 12 + 8;
        let pass = node + 8 + 16 + 8 + 8;
        for offset in [24 + 48, 24 + 48 + 8, node + 8 + 16, node + 8 + 16 + 4, pass + 12, pass + 20] {
            let mut bytes = minimal_v13();
            bytes[offset] ^= 0x01;
            let err = ShaderPackage::from_shpk_bytes(&bytes).unwrap_err();
            assert!(matches!(err, Error::Malformed { .. }), "offset {}: {}", offset, err);
        }
    }

    #[test]
    fn test_unknown_version() {
        let mut package = ShaderPackage::new(GraphicsPlatform::DirectX11);
        package.version = 0x0C01;
        assert!(matches!(package.to_shpk_bytes(), Err(Error::UnsupportedVersion { .. })));

        let mut bytes = minimal_v13();
        bytes[5] = 0x0C;
        assert!(matches!(
            ShaderPackage::from_shpk_bytes(&bytes),
            Err(Error::UnsupportedVersion { .. })
        ));
    }

    #[test]
    fn test_key_value_resolution() {
        let key = Name::new("ApplyFog_Table");
        assert_eq!(
            resolve_in(Some(&with_known_suffixes(&key)), name_hash("ApplyFog_None")).text(),
            Some("ApplyFog_None")
        );
    }
}
