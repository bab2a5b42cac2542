//! Editing operations on shader packages.

use lumen_common::{FxHashMap, IndexedList};
use tracing::{debug, warn};

use super::selector;
use super::{DefaultValues, MaterialParameter, NodeSelector, RenderNode, RenderPass, ShaderKey, ShaderPackage};
use crate::resource::ResourceCategory;
use crate::{Error, Name, ProgramType, Result, Shader};

/// An alternate value of a new material key, with the shaders its render
/// nodes should use instead of the default ones.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyAlternate {
    /// Appended to the key name to form the value name.
    pub suffix: String,
    /// `(program type, original index)` to replacement index.
    pub replacements: FxHashMap<(ProgramType, i32), i32>,
}

impl KeyAlternate {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            replacements: FxHashMap::default(),
        }
    }

    pub fn with_replacement(mut self, program_type: ProgramType, original: i32, replacement: i32) -> Self {
        self.replacements.insert((program_type, original), replacement);
        self
    }

    /// Parse `suffix[,vsN/M...]`, where each `vsN/M` (or `psN/M`) draws with
    /// shader N wherever shader M was used.
    pub fn parse(token: &str) -> Result<Self> {
        let mut parts = token.split(',');
        let mut alternate = Self::new(parts.next().unwrap_or_default());

        for part in parts {
            let invalid = || Error::InvalidArgument(format!("invalid shader replacement {:?}", part));
            let (replacement, original) = part.split_once('/').ok_or_else(invalid)?;
            let (program_type, replacement) = ProgramType::parse_shader_id(replacement).ok_or_else(invalid)?;
            let original: u32 = original.parse().map_err(|_| invalid())?;

            let previous = alternate
                .replacements
                .insert((program_type, original as i32), replacement as i32);
            if previous.is_some() {
                return Err(Error::InvalidArgument(format!(
                    "{}{} is replaced twice",
                    program_type.abbreviation(),
                    original
                )));
            }
        }
        Ok(alternate)
    }

    fn replace(&self, program_type: ProgramType, index: i32) -> i32 {
        self.replacements
            .get(&(program_type, index))
            .copied()
            .unwrap_or(index)
    }
}

impl ShaderPackage {
    /// Put `shader` at `index` among the shaders of its type, appending when
    /// `index` is one past the end.
    pub fn replace_or_add_shader(&mut self, program_type: ProgramType, index: usize, shader: Shader) -> Result<()> {
        if shader.program_type != program_type {
            return Err(Error::InvalidArgument(format!(
                "cannot use a {} as a {}",
                shader.program_type, program_type
            )));
        }

        let shaders = self.shaders_by_program_type_mut(program_type)?;
        let count = shaders.len();
        if index == count {
            shaders.push(shader);
            debug!(%program_type, index, "added shader");
        } else if let Some(slot) = shaders.get_mut(index) {
            *slot = shader;
            debug!(%program_type, index, "replaced shader");
        } else {
            return Err(Error::InvalidArgument(format!(
                "invalid {} index {} (valid range: 0..={})",
                program_type, index, count
            )));
        }
        Ok(())
    }

    /// Add a material parameter, optionally setting its default value.
    ///
    /// The defaults buffer grows to cover the parameter. Packages without a
    /// defaults buffer take the parameter but ignore `defaults`.
    pub fn add_material_parameter(
        &mut self,
        parameter: MaterialParameter,
        defaults: Option<&DefaultValues>,
    ) -> Result<()> {
        let start = parameter.offset as usize;
        let end = parameter.end() as usize;
        let name = parameter.name.clone();
        if let Some(defaults) = defaults {
            if defaults.len() * 4 > end - start {
                return Err(Error::InvalidArgument(format!(
                    "{} default values do not fit in {}, which is {} bytes",
                    defaults.len(),
                    name,
                    end - start
                )));
            }
        }
        self.material_parameters.push(parameter)?;

        let Some(buffer) = &mut self.material_parameters_defaults else {
            if defaults.is_some() {
                warn!(parameter = %name, "package has no default values, ignoring the given ones");
            }
            return Ok(());
        };
        if buffer.len() < end {
            buffer.resize(end, 0);
        }
        if let Some(defaults) = defaults {
            defaults.write_into(&mut buffer[start..end])?;
        }

        debug!(parameter = %name, start, end, "added material parameter");
        Ok(())
    }

    /// Assign a resource to a slot. Negative slots wrap, so `-1` is `0xFFFF`.
    pub fn configure_resource_slot(&mut self, category: ResourceCategory, name: &str, slot: i16) -> Result<()> {
        let resource = self
            .resources_mut(category)
            .get_by_key_mut(&Name::new(name))
            .ok_or_else(|| Error::InvalidArgument(format!("no {:?} resource named {}", category, name)))?;
        resource.slot = slot as u16;
        Ok(())
    }

    /// Add a material key with a default value and alternates.
    ///
    /// Every render node takes the default value, which moves it to a new
    /// selector. For every alternate, each node is duplicated with the
    /// alternate's shader replacements applied; duplicates whose passes are
    /// unchanged are dropped, and the alternate's selectors point back at the
    /// original node instead.
    pub fn add_material_key(&mut self, key: &str, default_suffix: &str, alternates: &[KeyAlternate]) -> Result<()> {
        let key = Name::new(key);
        let default_value = &key + default_suffix;
        let values: Vec<Name> = alternates
            .iter()
            .map(|alternate| &key + alternate.suffix.as_str())
            .collect();

        if self.material_keys.contains_key(&key) {
            return Err(Error::InvalidArgument(format!("material key {} already exists", key)));
        }
        for (i, value) in values.iter().enumerate() {
            if *value == default_value || values[..i].contains(value) {
                return Err(Error::InvalidArgument(format!(
                    "value {} of material key {} is given twice",
                    value, key
                )));
            }
        }

        let weight = selector::weight(self.material_keys.len() + 2);
        let shift = |selector: u32, value: &Name| selector.wrapping_add(value.hash().wrapping_mul(weight));

        let node_count = self.render_nodes.len();
        let mut render_nodes = IndexedList::with_capacity(node_count);
        let mut duplicates = Vec::new();
        let mut duplicate_of: FxHashMap<(usize, u32), u32> = FxHashMap::default();

        for (index, node) in self.render_nodes.iter().enumerate() {
            for (which, (alternate, value)) in alternates.iter().zip(&values).enumerate() {
                let mut duplicate = RenderNode {
                    primary_selector: shift(node.primary_selector, value),
                    passes: IndexedList::with_capacity(node.passes.len()),
                    ..node.clone()
                };
                duplicate.material_values.insert(key.clone(), value.clone());

                let mut changed = false;
                for pass in &node.passes {
                    let vertex = alternate.replace(ProgramType::Vertex, pass.vertex_shader_index);
                    let pixel = alternate.replace(ProgramType::Pixel, pass.pixel_shader_index);
                    changed |= vertex != pass.vertex_shader_index || pixel != pass.pixel_shader_index;
                    duplicate
                        .passes
                        .push(RenderPass::new(pass.name.clone(), vertex, pixel))?;
                }

                if changed {
                    duplicate_of.insert((which, index as u32), (node_count + duplicates.len()) as u32);
                    duplicates.push(duplicate);
                }
            }

            let mut node = node.clone();
            node.material_values.insert(key.clone(), default_value.clone());
            node.primary_selector = shift(node.primary_selector, &default_value);
            render_nodes.push(node)?;
        }
        let duplicate_count = duplicates.len();
        for duplicate in duplicates {
            render_nodes.push(duplicate)?;
        }

        let mut selectors = IndexedList::with_capacity(self.selectors.len() * (values.len() + 1));
        for entry in &self.selectors {
            selectors.push(NodeSelector {
                selector: shift(entry.selector, &default_value),
                node: entry.node,
            })?;
        }
        for (which, value) in values.iter().enumerate() {
            for entry in &self.selectors {
                selectors.push(NodeSelector {
                    selector: shift(entry.selector, value),
                    node: duplicate_of.get(&(which, entry.node)).copied().unwrap_or(entry.node),
                })?;
            }
        }

        let mut shader_key = ShaderKey::new(key.clone(), default_value);
        for value in values {
            shader_key.add_value(value);
        }
        self.material_keys.push(shader_key)?;
        self.render_nodes = render_nodes;
        self.selectors = selectors;

        debug!(
            key = %key,
            alternates = alternates.len(),
            duplicates = duplicate_count,
            "added material key"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::name_hash;
    use crate::GraphicsPlatform;

    fn package_with_nodes(nodes: &[(u32, &[(i32, i32)])]) -> ShaderPackage {
        let mut package = ShaderPackage::new(GraphicsPlatform::DirectX11);
        for (index, &(selector, passes)) in nodes.iter().enumerate() {
            let mut node = RenderNode::new(selector);
            for (pass, &(vertex, pixel)) in passes.iter().enumerate() {
                node.passes
                    .push(RenderPass::new(Name::from_hash(pass as u32 + 1), vertex, pixel))
                    .unwrap();
            }
            package.render_nodes.push(node).unwrap();
            package
                .selectors
                .push(NodeSelector {
                    selector,
                    node: index as u32,
                })
                .unwrap();
        }
        package
    }

    fn selectors(package: &ShaderPackage) -> Vec<(u32, u32)> {
        package.selectors.iter().map(|s| (s.selector, s.node)).collect()
    }

    #[test]
    fn test_key_without_replacements() {
        const S: u32 = 0x1234_5678;
        let mut package = package_with_nodes(&[(S, &[(0, 0)])]);

        package
            .add_material_key("K", "A", &[KeyAlternate::new("B")])
            .unwrap();

        let a = name_hash("KA");
        let b = name_hash("KB");
        let with_a = S.wrapping_add(a.wrapping_mul(961));
        let with_b = S.wrapping_add(b.wrapping_mul(961));

        assert_eq!(package.render_nodes.len(), 1);
        assert_eq!(package.render_nodes[0].primary_selector, with_a);
        assert_eq!(selectors(&package), [(with_a, 0), (with_b, 0)]);

        assert!(package.render_node(S).is_none());
        assert_eq!(package.render_node(with_b).map(|n| n.primary_selector), Some(with_a));

        let key = &package.material_keys[0];
        assert_eq!(key.key, Name::new("K"));
        assert_eq!(key.default_value.hash(), a);
        assert_eq!(key.values.iter().map(|v| v.hash()).collect::<Vec<_>>(), [a, b]);
        assert_eq!(
            package.render_nodes[0].material_values.get(&Name::new("K")),
            Some(&Name::new("KA"))
        );
    }

    #[test]
    fn test_key_duplicates_changed_nodes_only() {
        let mut package = package_with_nodes(&[(10, &[(0, 0), (1, 1)]), (20, &[(2, 2)])]);
        package.material_keys.push(ShaderKey::new(Name::new("Existing"), Name::new("ExistingOn"))).unwrap();
        package.selectors.push(NodeSelector { selector: 30, node: 0 }).unwrap();

        let alternate = KeyAlternate::parse("Alt,vs5/1,ps6/0").unwrap();
        package.add_material_key("Key", "Def", &[alternate]).unwrap();

        let weight = 31u32.pow(3);
        let default = name_hash("KeyDef");
        let alt = name_hash("KeyAlt");
        let shift = |s: u32, v: u32| s.wrapping_add(v.wrapping_mul(weight));

        // only the first node uses a replaced shader
        assert_eq!(package.render_nodes.len(), 3);
        let duplicate = &package.render_nodes[2];
        assert_eq!(duplicate.primary_selector, shift(10, alt));
        let passes: Vec<_> = duplicate
            .passes
            .iter()
            .map(|p| (p.vertex_shader_index, p.pixel_shader_index))
            .collect();
        assert_eq!(passes, [(0, 6), (5, 1)]);
        assert_eq!(duplicate.material_values.get(&Name::new("Key")), Some(&Name::new("KeyAlt")));
        assert_eq!(
            package.render_nodes[0].material_values.get(&Name::new("Key")),
            Some(&Name::new("KeyDef"))
        );

        assert_eq!(
            selectors(&package),
            [
                (shift(10, default), 0),
                (shift(20, default), 1),
                (shift(30, default), 0),
                (shift(10, alt), 2),
                (shift(20, alt), 1),
                (shift(30, alt), 2),
            ]
        );
    }

    #[test]
    fn test_key_rejects_repeated_values() {
        let mut package = package_with_nodes(&[(1, &[(0, 0)])]);
        let before = package.clone();

        let err = package.add_material_key("K", "A", &[KeyAlternate::new("A")]);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
        let err = package.add_material_key("K", "A", &[KeyAlternate::new("B"), KeyAlternate::new("B")]);
        assert!(matches!(err, Err(Error::InvalidArgument(_))));
        assert_eq!(package, before);
    }

    #[test]
    fn test_parse_alternate() {
        let alternate = KeyAlternate::parse("Foo,vs3/1,PS4/2").unwrap();
        assert_eq!(alternate.suffix, "Foo");
        assert_eq!(alternate.replace(ProgramType::Vertex, 1), 3);
        assert_eq!(alternate.replace(ProgramType::Pixel, 2), 4);
        assert_eq!(alternate.replace(ProgramType::Pixel, 1), 1);

        assert!(KeyAlternate::parse("Foo,vs3").is_err());
        assert!(KeyAlternate::parse("Foo,xs3/1").is_err());
        assert!(KeyAlternate::parse("Foo,vs3/1,vs4/1").is_err());
    }

    #[test]
    fn test_replace_or_add_shader() {
        let mut package = ShaderPackage::new(GraphicsPlatform::DirectX11);
        let pixel = |blob: &[u8]| {
            let mut shader = Shader::new(GraphicsPlatform::DirectX11, ProgramType::Pixel);
            shader.blob = blob.to_vec();
            shader
        };

        package.replace_or_add_shader(ProgramType::Pixel, 0, pixel(b"a")).unwrap();
        package.replace_or_add_shader(ProgramType::Pixel, 1, pixel(b"b")).unwrap();
        package.replace_or_add_shader(ProgramType::Pixel, 0, pixel(b"c")).unwrap();
        assert_eq!(package.pixel_shaders.len(), 2);
        assert_eq!(package.pixel_shaders[0].blob, b"c");

        assert!(package.replace_or_add_shader(ProgramType::Pixel, 3, pixel(b"d")).is_err());
        assert!(package.replace_or_add_shader(ProgramType::Vertex, 0, pixel(b"d")).is_err());
    }

    #[test]
    fn test_add_material_parameter() {
        let mut package = ShaderPackage::new(GraphicsPlatform::DirectX11);
        package.material_parameters_defaults = Some(vec![0xFF; 4]);

        let defaults = DefaultValues::parse("f", "1,2").unwrap();
        package
            .add_material_parameter(MaterialParameter::new("g_Scale", 8, 8), Some(&defaults))
            .unwrap();

        let buffer = package.material_parameters_defaults.as_ref().unwrap();
        assert_eq!(buffer.len(), 16);
        assert_eq!(&buffer[..4], &[0xFF; 4]);
        assert_eq!(&buffer[4..8], &[0; 4]);
        assert_eq!(&buffer[8..12], &1.0f32.to_le_bytes());
        assert_eq!(&buffer[12..], &2.0f32.to_le_bytes());

        let too_many = DefaultValues::parse("u", "1,2,3").unwrap();
        let err = package.add_material_parameter(MaterialParameter::new("g_Other", 0, 8), Some(&too_many));
        assert!(matches!(err, Err(Error::InvalidArgument(_))));

        let mut bare = ShaderPackage::new(GraphicsPlatform::DirectX11);
        bare.add_material_parameter(MaterialParameter::new("g_Scale", 8, 8), Some(&defaults))
            .unwrap();
        assert_eq!(bare.material_parameters.len(), 1);
        assert!(bare.material_parameters_defaults.is_none());
    }

    #[test]
    fn test_configure_resource_slot() {
        let mut package = ShaderPackage::new(GraphicsPlatform::DirectX11);
        package
            .samplers
            .push(crate::resource::ShaderResource::new(
                "g_SamplerNormal",
                crate::resource::ShaderResourceType::UNDEFINED,
                2,
                0,
            ))
            .unwrap();

        package
            .configure_resource_slot(ResourceCategory::Sampler, "g_SamplerNormal", -1)
            .unwrap();
        assert_eq!(package.samplers[0].slot, 0xFFFF);
        assert!(package
            .configure_resource_slot(ResourceCategory::Texture, "g_SamplerNormal", 1)
            .is_err());
    }
}
