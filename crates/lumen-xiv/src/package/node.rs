use lumen_common::{FxHashMap, IndexedList, Keyed};

use crate::Name;

/// One pass of a render node: which vertex and pixel shader to draw with.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RenderPass {
    pub name: Name,
    pub vertex_shader_index: i32,
    pub pixel_shader_index: i32,
}

impl RenderPass {
    pub fn new(name: Name, vertex_shader_index: i32, pixel_shader_index: i32) -> Self {
        Self {
            name,
            vertex_shader_index,
            pixel_shader_index,
        }
    }
}

impl Keyed for RenderPass {
    type Key = Name;

    fn key(&self) -> Name {
        self.name.clone()
    }
}

/// The passes to run for one combination of key values.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RenderNode {
    pub primary_selector: u32,
    pub system_values: FxHashMap<Name, Name>,
    pub scene_values: FxHashMap<Name, Name>,
    pub material_values: FxHashMap<Name, Name>,
    pub subview_value_0: Name,
    pub subview_value_1: Name,
    /// Pass number of each of the 16 pass slots, `0xFF` if unused.
    pub pass_indices: [u8; 16],
    pub passes: IndexedList<RenderPass>,
}

impl RenderNode {
    pub fn new(primary_selector: u32) -> Self {
        Self {
            primary_selector,
            system_values: FxHashMap::default(),
            scene_values: FxHashMap::default(),
            material_values: FxHashMap::default(),
            subview_value_0: Name::empty(),
            subview_value_1: Name::empty(),
            pass_indices: [0xFF; 16],
            passes: IndexedList::new(),
        }
    }
}

impl Keyed for RenderNode {
    type Key = u32;

    fn key(&self) -> u32 {
        self.primary_selector
    }
}

/// Maps a selector to a render node by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NodeSelector {
    pub selector: u32,
    pub node: u32,
}

impl Keyed for NodeSelector {
    type Key = u32;

    fn key(&self) -> u32 {
        self.selector
    }
}
