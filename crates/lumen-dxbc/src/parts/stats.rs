//! STAT compiler statistics part.

use std::io::Write;

use lumen_common::BinaryReader;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::Result;

/// The counters present in every STAT part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct StatsCounters {
    pub instruction_count: u32,
    pub temp_register_count: u32,
    pub define_count: u32,
    pub declaration_count: u32,
    pub float_instruction_count: u32,
    pub int_instruction_count: u32,
    pub uint_instruction_count: u32,
    pub static_flow_control_count: u32,
    pub dynamic_flow_control_count: u32,
    pub macro_instruction_count: u32,
    pub temp_array_count: u32,
    pub array_instruction_count: u32,
    pub cut_instruction_count: u32,
    pub emit_instruction_count: u32,
    pub texture_normal_instructions: u32,
    pub texture_load_instructions: u32,
    pub texture_comparison_instructions: u32,
    pub texture_bias_instructions: u32,
    pub texture_gradient_instructions: u32,
    pub mov_instruction_count: u32,
    pub movc_instruction_count: u32,
    pub conversion_instruction_count: u32,
    pub unknown1: u32,
    pub gs_input_primitive: u32,
    pub gs_output_topology: u32,
    pub gs_max_output_vertex_count: u32,
    pub unknown2: u32,
    pub unknown3: u32,
    pub is_sample_frequency_shader: u32,
}

/// Counters appended by newer compilers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, FromBytes, IntoBytes, Immutable, KnownLayout)]
#[repr(C, packed)]
pub struct StatsExtension {
    pub unknown4: u32,
    pub control_points: u32,
    pub hs_output_primitive: u32,
    pub hs_partitioning: u32,
    pub tessellator_domain: u32,
    pub barrier_instructions: u32,
    pub interlocked_instructions: u32,
    pub texture_store_instructions: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Stats {
    pub counters: StatsCounters,
    pub extension: Option<StatsExtension>,
}

impl Stats {
    pub fn read(data: &[u8]) -> Result<Self> {
        let mut reader = BinaryReader::new(data);
        let counters = reader.read_struct::<StatsCounters>()?;
        let extension = if reader.is_empty() {
            None
        } else {
            Some(reader.read_struct::<StatsExtension>()?)
        };
        Ok(Self {
            counters,
            extension,
        })
    }

    pub fn write_to<W: Write>(&self, destination: &mut W) -> Result<()> {
        destination.write_all(self.counters.as_bytes())?;
        if let Some(extension) = &self.extension {
            destination.write_all(extension.as_bytes())?;
        }
        Ok(())
    }

    pub fn is_extended(&self) -> bool {
        self.extension.is_some()
    }
}
