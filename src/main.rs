//! Lumen CLI - Command-line tool for DXBC containers and ShCd/ShPk shader files.
//!
//! This is the main entry point for the Lumen command-line application.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use memmap2::Mmap;
use rayon::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use lumen::prelude::*;
use lumen::xiv::{DefaultValues, KeyAlternate, MaterialParameter};

/// Lumen - DXBC container and ShCd/ShPk shader tool
#[derive(Parser)]
#[command(name = "lumen")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log library events down to debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that files survive decoding and re-encoding unchanged
    Roundtrip {
        /// Files or directories to check
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Print a summary of a DXBC, ShCd or ShPk file
    Dump {
        /// Input file
        #[arg(env = "INPUT_FILE")]
        input: PathBuf,

        /// Print the model as JSON
        #[arg(long)]
        json: bool,
    },

    /// Wrap a DXBC blob into a ShCd file, inferring its resources
    ShcdMake {
        /// Input DXBC (or ShCd) file
        input: PathBuf,

        /// Output ShCd file
        output: PathBuf,
    },

    /// Write the shader blob of a ShCd file
    ShcdExtract {
        /// Input ShCd (or DXBC) file
        input: PathBuf,

        /// Output blob file
        output: PathBuf,
    },

    /// Write every shader of a ShPk file to a directory
    ShpkExtract {
        /// Input ShPk file
        input: PathBuf,

        /// Output directory
        #[arg(env = "OUTPUT_FOLDER")]
        output: PathBuf,

        /// Write raw blobs as `.dxbc` instead of `.shcd` files
        #[arg(long)]
        dxbc: bool,

        /// Shader ids to extract, such as `vs0` or `ps12`; all by default
        #[arg(short, long = "shader")]
        shaders: Vec<String>,
    },

    /// Apply edits to a ShPk file
    ///
    /// Instructions come in pairs:
    ///   mp+ name:offset:size[:type:values]   add a material parameter
    ///   mk+ key:default[:value,vsN/M,...]... add a material key
    ///   ct= / st= / tt= / ut= name:slot      move a resource to a slot
    ///   vsN / psN <file>                     replace or add a shader
    #[command(verbatim_doc_comment)]
    ShpkUpdate {
        /// Input ShPk file
        input: PathBuf,

        /// Output ShPk file
        output: PathBuf,

        /// Instructions and their arguments
        #[arg(required = true, allow_hyphen_values = true)]
        instructions: Vec<String>,
    },

    /// Print the name hash of strings
    Crc {
        /// Strings to hash
        #[arg(required = true)]
        inputs: Vec<String>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Roundtrip { paths } => {
            cmd_roundtrip(&paths)?;
        }
        Commands::Dump { input, json } => {
            cmd_dump(&input, json)?;
        }
        Commands::ShcdMake { input, output } => {
            cmd_shcd_make(&input, &output)?;
        }
        Commands::ShcdExtract { input, output } => {
            cmd_shcd_extract(&input, &output)?;
        }
        Commands::ShpkExtract {
            input,
            output,
            dxbc,
            shaders,
        } => {
            cmd_shpk_extract(&input, &output, dxbc, &shaders)?;
        }
        Commands::ShpkUpdate {
            input,
            output,
            instructions,
        } => {
            cmd_shpk_update(&input, &output, &instructions)?;
        }
        Commands::Crc { inputs } => {
            cmd_crc(&inputs);
        }
    }

    Ok(())
}

/// File formats the tool understands, told apart by magic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Dxbc,
    ShaderCode,
    ShaderPackage,
}

impl FileKind {
    fn detect(data: &[u8]) -> Option<Self> {
        match data.get(..4)? {
            b"DXBC" => Some(Self::Dxbc),
            b"ShCd" => Some(Self::ShaderCode),
            b"ShPk" => Some(Self::ShaderPackage),
            _ => None,
        }
    }
}

fn map_file(path: &Path) -> Result<Mmap> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(mmap)
}

fn detect(path: &Path, data: &[u8]) -> Result<FileKind> {
    FileKind::detect(data)
        .with_context(|| format!("{} is not a DXBC, ShCd or ShPk file", path.display()))
}

/// Read a shader from either a ShCd file or a bare DXBC blob.
fn read_shader(path: &Path) -> Result<Shader> {
    let data = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    match detect(path, &data)? {
        FileKind::Dxbc => Shader::from_dxbc_blob(data).context("Failed to build shader from DXBC"),
        FileKind::ShaderCode => Shader::from_shcd_bytes(&data).context("Failed to parse ShCd"),
        FileKind::ShaderPackage => bail!("{} is a shader package, not a shader", path.display()),
    }
}

// ---------------------------------------------------------------------------
// roundtrip
// ---------------------------------------------------------------------------

/// Result of checking one file; each entry names a stage that did not
/// reproduce its input.
struct Outcome {
    path: PathBuf,
    failures: Vec<String>,
}

fn cmd_roundtrip(paths: &[PathBuf]) -> Result<()> {
    let files: Vec<PathBuf> = paths
        .iter()
        .flat_map(|path| {
            WalkDir::new(path)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
        })
        .collect();

    println!("Checking {} files...", files.len());

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let start = Instant::now();
    let outcomes: Vec<Outcome> = files
        .par_iter()
        .filter_map(|path| {
            let outcome = match roundtrip_file(path) {
                Ok(Some(failures)) => Some(Outcome {
                    path: path.clone(),
                    failures,
                }),
                Ok(None) => None,
                Err(e) => Some(Outcome {
                    path: path.clone(),
                    failures: vec![format!("error: {:#}", e)],
                }),
            };
            pb.inc(1);
            outcome
        })
        .collect();
    pb.finish_with_message("Done");

    let checked = outcomes.len();
    let failed: Vec<&Outcome> = outcomes.iter().filter(|o| !o.failures.is_empty()).collect();
    for outcome in &failed {
        eprintln!("{}:", outcome.path.display());
        for failure in &outcome.failures {
            eprintln!("    {}", failure);
        }
    }

    println!(
        "Checked {} files in {:?} ({} skipped, {} failed)",
        checked,
        start.elapsed(),
        files.len() - checked,
        failed.len()
    );

    if !failed.is_empty() {
        bail!("{} of {} files failed the round trip", failed.len(), checked);
    }
    Ok(())
}

/// Returns `None` for files of an unknown kind.
fn roundtrip_file(path: &Path) -> Result<Option<Vec<String>>> {
    let data = map_file(path)?;
    let Some(kind) = FileKind::detect(&data) else {
        debug!(path = %path.display(), "skipping unrecognized file");
        return Ok(None);
    };

    let mut failures = Vec::new();
    match kind {
        FileKind::Dxbc => {
            roundtrip_container(&data, &mut failures)?;
        }
        FileKind::ShaderCode => {
            let shader = Shader::from_shcd_bytes(&data)?;
            check(&mut failures, "ShCd", &shader.to_shcd_bytes()?, &data);

            let rebuilt = Shader::from_dxbc_blob(shader.blob.clone())?;
            check(&mut failures, "ShCd reconstruction", &rebuilt.to_shcd_bytes()?, &data);

            roundtrip_container(&shader.blob, &mut failures)?;
        }
        FileKind::ShaderPackage => {
            let mut package = ShaderPackage::from_shpk_bytes(&data)?;
            check(&mut failures, "ShPk", &package.to_shpk_bytes()?, &data);

            package.update_resources()?;
            check(&mut failures, "ShPk resource update", &package.to_shpk_bytes()?, &data);

            for program_type in [ProgramType::Vertex, ProgramType::Pixel] {
                let shaders = package.shaders_by_program_type_mut(program_type)?;
                for (index, shader) in shaders.iter_mut().enumerate() {
                    let rebuilt = Shader::from_dxbc_blob(shader.blob.clone())?;
                    let stage = format!("{}{} reconstruction", program_type.abbreviation(), index);
                    check(&mut failures, &stage, &rebuilt.to_shcd_bytes()?, &shader.to_shcd_bytes()?);
                    *shader = rebuilt;
                }
            }
            package.update_resources()?;
            check(&mut failures, "ShPk inner reconstruction", &package.to_shpk_bytes()?, &data);
        }
    }
    Ok(Some(failures))
}

/// Shallow then deep container round trip.
fn roundtrip_container(data: &[u8], failures: &mut Vec<String>) -> Result<()> {
    let mut container = Container::from_bytes(data, true, true)?;
    check(failures, "DXBC", &container.to_bytes()?, data);

    container.upgrade_all()?;
    check(failures, "DXBC deep", &container.to_bytes()?, data);
    Ok(())
}

fn check(failures: &mut Vec<String>, stage: &str, actual: &[u8], expected: &[u8]) {
    if actual == expected {
        debug!(stage, "round trip passed");
        return;
    }
    let first_difference = actual
        .iter()
        .zip(expected)
        .position(|(a, b)| a != b)
        .unwrap_or(actual.len().min(expected.len()));
    failures.push(format!(
        "{} differs at {:#x} (actual: {} bytes, expected: {} bytes)",
        stage,
        first_difference,
        actual.len(),
        expected.len()
    ));
}

// ---------------------------------------------------------------------------
// dump
// ---------------------------------------------------------------------------

fn cmd_dump(input: &Path, json: bool) -> Result<()> {
    let data = map_file(input)?;
    match detect(input, &data)? {
        FileKind::Dxbc => {
            let container = Container::from_bytes(&data, false, false).context("Failed to parse DXBC")?;
            if json {
                let parts: Vec<_> = container
                    .parts
                    .iter()
                    .map(|entry| {
                        serde_json::json!({
                            "tag": entry.tag.to_string(),
                            "kind": entry.part.kind(),
                        })
                    })
                    .collect();
                let summary = serde_json::json!({
                    "minor_version": container.minor_version,
                    "parts": parts,
                });
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                dump_container(&container)?;
            }
        }
        FileKind::ShaderCode => {
            let shader = Shader::from_shcd_bytes(&data).context("Failed to parse ShCd")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&shader)?);
            } else {
                dump_shader(&shader);
            }
        }
        FileKind::ShaderPackage => {
            let package = ShaderPackage::from_shpk_bytes(&data).context("Failed to parse ShPk")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&package)?);
            } else {
                dump_package(&package);
            }
        }
    }
    Ok(())
}

fn dump_container(container: &Container) -> Result<()> {
    println!("DXBC container, version 1.{}", container.minor_version);
    for entry in &container.parts {
        println!("    {} {:>8} bytes  {}", entry.tag, entry.part.to_bytes()?.len(), entry.part.kind());
    }

    if let Some(rdef) = container.resource_definition()? {
        println!("\nResource bindings:");
        for binding in &rdef.bindings {
            println!("    {:<30} {:?} at {}", binding.name, binding.input_type, binding.bind_point);
        }
    }
    Ok(())
}

fn dump_resources(title: &str, resources: &IndexedList<ShaderResource>) {
    if resources.is_empty() {
        return;
    }
    println!("\n{}:", title);
    println!("    CRC32    Name                           Type Slot Size");
    println!("    -------- ------------------------------ ---- ---- ----");
    for resource in resources {
        println!(
            "    {:08X} {:<30} {:>4} {:>4} {:>4}",
            resource.name.hash(),
            resource.name.to_string(),
            resource.kind.0 as i16,
            resource.slot as i16,
            resource.size as i16
        );
    }
}

fn dump_shader(shader: &Shader) {
    println!("ShCd for a {} {}", shader.platform, shader.program_type);

    dump_resources("Constant buffers", &shader.constant_buffers);
    dump_resources("Samplers", &shader.samplers);
    dump_resources("Textures", &shader.textures);
    dump_resources("Unordered access views", &shader.uavs);

    if let Some(declared) = shader.declared_inputs() {
        println!("\nVertex inputs declared: {}", declared);
    }
    if let Some(used) = shader.used_inputs() {
        println!("Vertex inputs used:     {}", used);
    }
}

fn dump_keys(title: &str, keys: &IndexedList<ShaderKey>) {
    if keys.is_empty() {
        return;
    }
    println!("\n{}:", title);
    for key in keys {
        println!("    {:08X} {} (default {})", key.key.hash(), key.key, key.default_value);
        for value in &key.values {
            println!("        {:08X} {}", value.hash(), value);
        }
    }
}

fn dump_package(package: &ShaderPackage) {
    println!(
        "ShPk version {:#06X} for {}",
        package.version, package.platform
    );

    println!("\nShaders:");
    for (program_type, shaders) in package.shaders() {
        if shaders.is_empty() {
            println!("    no {} shaders", program_type);
        } else {
            let prefix = program_type.abbreviation();
            println!("    {}0 .. {}{} (inclusive)", prefix, prefix, shaders.len() - 1);
        }
    }

    if !package.material_parameters.is_empty() || package.material_parameters_size > 0 {
        println!(
            "\nMaterial parameters: {} registers ({} bytes)",
            package.material_parameters_size >> 4,
            package.material_parameters_size
        );
        println!("    CRC32    Name                           Start  Size Default");
        println!("    -------- ------------------------------ ----- ----- ------------------------");
        for parameter in &package.material_parameters {
            let start = parameter.offset as usize;
            let end = parameter.end() as usize;
            let defaults = package
                .material_parameters_defaults
                .as_deref()
                .and_then(|defaults| defaults.get(start..end))
                .map(|bytes| {
                    bytes
                        .chunks_exact(4)
                        .map(|word| {
                            let value = f32::from_le_bytes([word[0], word[1], word[2], word[3]]);
                            value.to_string()
                        })
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            println!(
                "    {:08X} {:<30} {:>5} {:>5} {}",
                parameter.name.hash(),
                parameter.name.to_string(),
                start,
                end - start,
                defaults
            );
        }
    }

    dump_resources("Constant buffers", &package.constant_buffers);
    dump_resources("Samplers", &package.samplers);
    dump_resources("Textures", &package.textures);
    dump_resources("Unordered access views", &package.uavs);

    dump_keys("System keys", &package.system_keys);
    dump_keys("Scene keys", &package.scene_keys);
    dump_keys("Material keys", &package.material_keys);

    println!("\nSub-view values:");
    for (index, key) in [&package.subview_key_0, &package.subview_key_1].into_iter().enumerate() {
        let values: Vec<String> = key.values.iter().map(ToString::to_string).collect();
        println!("    {}: {}", index, values.join(", "));
    }

    println!(
        "\nRender nodes: {} ({} selectors)",
        package.render_nodes.len(),
        package.selectors.len()
    );
    for node in &package.render_nodes {
        let passes: Vec<String> = node
            .passes
            .iter()
            .map(|pass| format!("{}: vs{} ps{}", pass.name, pass.vertex_shader_index, pass.pixel_shader_index))
            .collect();
        println!("    {:08X} [{}]", node.primary_selector, passes.join(", "));
    }
}

// ---------------------------------------------------------------------------
// shcd-make / shcd-extract / shpk-extract
// ---------------------------------------------------------------------------

fn cmd_shcd_make(input: &Path, output: &Path) -> Result<()> {
    let shader = read_shader(input)?;
    fs::write(output, shader.to_shcd_bytes()?).context("Failed to write output file")?;
    println!(
        "Wrote {} {} with {} constant buffers, {} samplers, {} textures and {} UAVs",
        shader.platform,
        shader.program_type,
        shader.constant_buffers.len(),
        shader.samplers.len(),
        shader.textures.len(),
        shader.uavs.len()
    );
    Ok(())
}

fn cmd_shcd_extract(input: &Path, output: &Path) -> Result<()> {
    let data = map_file(input)?;
    let blob = match detect(input, &data)? {
        FileKind::Dxbc => data.to_vec(),
        FileKind::ShaderCode => Shader::from_shcd_bytes(&data).context("Failed to parse ShCd")?.blob,
        FileKind::ShaderPackage => bail!("{} is a shader package, use shpk-extract", input.display()),
    };
    fs::write(output, &blob).context("Failed to write output file")?;
    println!("Extracted {} bytes", blob.len());
    Ok(())
}

fn cmd_shpk_extract(input: &Path, output: &Path, dxbc: bool, ids: &[String]) -> Result<()> {
    let package = {
        let data = map_file(input)?;
        ShaderPackage::from_shpk_bytes(&data).context("Failed to parse ShPk")?
    };

    let mut selected = Vec::new();
    if ids.is_empty() {
        for (program_type, shaders) in package.shaders() {
            for (index, shader) in shaders.iter().enumerate() {
                selected.push((format!("{}{}", program_type.abbreviation(), index), shader));
            }
        }
    } else {
        for id in ids {
            let (program_type, index) = ProgramType::parse_shader_id(id)
                .with_context(|| format!("Invalid shader id {}", id))?;
            let shader = package
                .shaders_by_program_type(program_type)?
                .get(index as usize)
                .with_context(|| format!("No shader {} in this package", id))?;
            selected.push((id.to_ascii_lowercase(), shader));
        }
    }

    fs::create_dir_all(output)?;
    for (name, shader) in &selected {
        let (file_name, bytes) = if dxbc {
            (format!("{}.dxbc", name), shader.blob.clone())
        } else {
            (format!("{}.shcd", name), shader.to_shcd_bytes()?)
        };
        fs::write(output.join(&file_name), bytes)
            .with_context(|| format!("Failed to write {}", file_name))?;
    }

    println!("Extracted {} shaders to {}", selected.len(), output.display());
    Ok(())
}

// ---------------------------------------------------------------------------
// shpk-update
// ---------------------------------------------------------------------------

fn cmd_shpk_update(input: &Path, output: &Path, instructions: &[String]) -> Result<()> {
    let mut package = {
        let data = map_file(input)?;
        ShaderPackage::from_shpk_bytes(&data).context("Failed to parse ShPk")?
    };

    if instructions.len() % 2 != 0 {
        bail!("Instructions come in pairs, got {} arguments", instructions.len());
    }
    for pair in instructions.chunks_exact(2) {
        let (operation, argument) = (pair[0].as_str(), pair[1].as_str());
        apply_instruction(&mut package, operation, argument)
            .with_context(|| format!("Failed to apply {} {}", operation, argument))?;
    }

    fs::write(output, package.to_shpk_bytes()?).context("Failed to write output file")?;
    println!("Wrote {}", output.display());
    Ok(())
}

fn apply_instruction(package: &mut ShaderPackage, operation: &str, argument: &str) -> Result<()> {
    let operation = operation.to_ascii_lowercase();
    match operation.as_str() {
        "mp+" => add_material_parameter(package, argument)?,
        "mk+" => {
            add_material_key(package, argument)?;
            return Ok(());
        }
        "ct=" | "st=" | "tt=" | "ut=" => {
            let category = ResourceCategory::from_table_prefix(&operation[..2])
                .with_context(|| format!("Unknown resource table {}", operation))?;
            let (name, slot) = argument
                .split_once(':')
                .with_context(|| format!("Expected name:slot, got {}", argument))?;
            let slot: i16 = slot.parse().with_context(|| format!("Invalid slot {}", slot))?;
            package.configure_resource_slot(category, name, slot)?;
            eprintln!("Configured resource {}", name);
        }
        id => {
            let (program_type, index) = ProgramType::parse_shader_id(id)
                .with_context(|| format!("Unknown instruction {}", id))?;
            let shader = read_shader(Path::new(argument))?;
            let count = package.shaders_by_program_type(program_type)?.len();
            package.replace_or_add_shader(program_type, index as usize, shader)?;
            if index as usize == count {
                eprintln!("Added shader {}", id);
            } else {
                eprintln!("Replaced shader {}", id);
            }
        }
    }

    package.update_resources()?;
    Ok(())
}

/// `name:offset:size[:values]` or `name:offset:size:type:values`.
fn add_material_parameter(package: &mut ShaderPackage, argument: &str) -> Result<()> {
    let tokens: Vec<&str> = argument.split(':').collect();
    if tokens.len() < 3 || tokens.len() > 5 {
        bail!("Expected name:offset:size[:type:values], got {}", argument);
    }
    let (offset, size) = MaterialParameter::parse_layout(tokens[1], tokens[2])?;
    let defaults = match tokens.len() {
        4 => Some(DefaultValues::parse("f", tokens[3])?),
        5 => Some(DefaultValues::parse(tokens[3], tokens[4])?),
        _ => None,
    };

    package.add_material_parameter(MaterialParameter::new(tokens[0], offset, size), defaults.as_ref())?;
    eprintln!("Added material parameter {}", tokens[0]);
    Ok(())
}

/// `key:default[:value,vsN/M,...]...`
fn add_material_key(package: &mut ShaderPackage, argument: &str) -> Result<()> {
    let mut tokens = argument.split(':');
    let (Some(key), Some(default)) = (tokens.next(), tokens.next()) else {
        bail!("Expected key:default[:alternates], got {}", argument);
    };
    let alternates = tokens.map(KeyAlternate::parse).collect::<lumen::xiv::Result<Vec<_>>>()?;

    package.add_material_key(key, default, &alternates)?;
    eprintln!("Added material key {}", key);
    Ok(())
}

// ---------------------------------------------------------------------------
// crc
// ---------------------------------------------------------------------------

fn cmd_crc(inputs: &[String]) {
    println!("CRC32    Input");
    println!("-------- --------------------------------------------------");
    for input in inputs {
        println!("{:08X} {}", name_hash(input), input);
    }
}
