//! Dictionary of known names.
//!
//! Packages mostly store bare hashes. Resolving them against this list gives
//! back readable names for the common resources, keys and values.

use std::sync::LazyLock;

use lumen_common::FxHashMap;

use crate::Name;

/// Name strings known to appear in shader packages.
static KNOWN_NAMES: &[&str] = &[
    "g_MaterialParameter", "g_SamplerTable", "g_SamplerNormal", "g_SamplerIndex",
    "g_SphereMapIndex", "g_TileIndex", "g_AlphaAperture", "g_AlphaMultiParam", "g_AlphaOffset",
    "g_AlphaThreshold", "g_AmbientOcclusionMask", "g_AngleClip", "g_BackScatterPower", "g_Color",
    "g_ColorUVScale", "g_DetailColor", "g_DetailColorUvScale", "g_DetailID", "g_DetailNormalScale",
    "g_DiffuseColor", "g_EmissiveColor", "g_EnvMapPower", "g_FarClip", "g_Fresnel",
    "g_FresnelValue0", "g_FurLength", "g_GlassIOR", "g_Gradation",
    "g_HairBackScatterRoughnessOffsetRate", "g_HairScatterColorShift",
    "g_HairSecondaryRoughnessOffsetRate", "g_HairSpecularBackScatterShift",
    "g_HairSpecularPrimaryShift", "g_HairSpecularSecondaryShift", "g_HeightMapScale",
    "g_HeightScale", "g_InclusionAperture", "g_Intensity", "g_IrisOptionColorRate",
    "g_IrisRingColor", "g_IrisRingEmissiveIntensity", "g_IrisRingForceColor", "g_IrisThickness",
    "g_LayerColor", "g_LayerDepth", "g_LayerIrregularity", "g_LayerScale", "g_LayerVelocity",
    "g_LightingType", "g_LipFresnelValue0", "g_LipRoughnessScale", "g_LipShininess",
    "g_MultiDetailColor", "g_MultiDiffuseColor", "g_MultiEmissiveColor", "g_MultiHeightScale",
    "g_MultiNormalScale", "g_MultiSpecularColor", "g_MultiSSAOMask", "g_MultiWaveScale",
    "g_MultiWhitecapDistortion", "g_MultiWhitecapScale", "g_NearClip", "g_NormalScale",
    "g_NormalScale1", "g_NormalUVScale", "g_OutlineColor", "g_OutlineWidth", "g_PrefersFailure",
    "g_Ray", "g_ReflectionPower", "g_RefractionColor", "g_ScatteringLevel", "g_ShaderID",
    "g_ShadowAlphaThreshold", "g_ShadowOffset", "g_ShadowPosOffset", "g_SheenAperture",
    "g_SheenRate", "g_SheenTintRate", "g_Shininess", "g_SpecularColor", "g_SpecularColorMask",
    "g_SpecularMask", "g_SpecularPower", "g_SpecularUVScale", "g_SSAOMask", "g_SubSurfacePower",
    "g_SubSurfaceProfileID", "g_SubSurfaceWidth", "g_TexAnim", "g_TextureMipBias", "g_TexU",
    "g_TexV", "g_TileAlpha", "g_TileScale", "g_ToonIndex", "g_ToonLightScale",
    "g_ToonReflectionScale", "g_ToonSpecIndex", "g_Transparency", "g_TransparencyDistance",
    "g_UseSubSurfaceRate", "g_WaveletDistortion", "g_WaveletNoiseParam", "g_WaveletOffset",
    "g_WaveletScale", "g_WaveSpeed", "g_WaveTime", "g_WaveTime1", "g_WhitecapColor",
    "g_WhitecapDistance", "g_WhitecapDistortion", "g_WhitecapNoiseScale", "g_WhitecapScale",
    "g_WhitecapSpeed", "g_WhiteEyeColor", "AddLayer", "ApplyAlphaClip", "ApplyAttenuation",
    "ApplyConeAttenuation", "ApplyDissolveColor", "ApplyDitherClip", "ApplyMaskTexture",
    "ApplyOmniShadow", "ApplyUnderWater", "ApplyVertexMovement", "ApplyWavelet", "ApplyWavingAnim",
    "ApplyWavingAnimation", "CalculateInstancingPosition", "ComputeSoftParticleAlpha",
    "DecodeDepthBuffer", "DrawOffscreen", "GeometryInstancing", "GetAmbientLight",
    "GetAmbientOcclusion", "GetColor", "GetCustumizeColorAura", "GetDecalColor",
    "GetDirectionalLight", "GetFakeSpecular", "GetHairFlow", "GetInstanceData", "GetLocalPosition",
    "GetMaterialValue", "GetNormalMap", "GetReflectColor", "GetRLR", "GetShadow", "GetSubColor",
    "GetUnderWaterLighting", "GetValues", "LightClip", "SelectOutput", "ShadowDistanceFadeType",
    "ShadowSoftShadowType", "SpecularLighting", "TransformProj", "TransformType", "TransformView",
    "Type", "ApplyFog_Table", "ApplyLightBufferType_Table", "ComputeFinalColorType_Table",
    "ComputeSoftParticleType_Table", "DepthOffsetType_Table", "DirectionalLight_Table",
    "DirectionalLightType_Table", "ForceFarZ_Table", "OutputType_Table", "PointLightCount_Table",
    "PointLightPositionType_Table", "PointLightType_Table", "TextureColor1_CalculateAlpha_Table",
    "TextureColor1_CalculateColor_Table", "TextureColor1_ColorToAlpha_Table",
    "TextureColor1_Decode_Table", "TextureColor1_Table", "TextureColor1_UvNo_Table",
    "TextureColor2_CalculateAlpha_Table", "TextureColor2_CalculateColor_Table",
    "TextureColor2_ColorToAlpha_Table", "TextureColor2_Decode_Table", "TextureColor2_Table",
    "TextureColor2_UvNo_Table", "TextureColor3_CalculateAlpha_Table",
    "TextureColor3_CalculateColor_Table", "TextureColor3_ColorToAlpha_Table",
    "TextureColor3_Decode_Table", "TextureColor3_Table", "TextureColor3_UvNo_Table",
    "TextureColor4_CalculateAlpha_Table", "TextureColor4_CalculateColor_Table",
    "TextureColor4_ColorToAlpha_Table", "TextureColor4_Decode_Table", "TextureColor4_Table",
    "TextureColor4_UvNo_Table", "TextureDistortion", "TextureDistortion_UvNo_Table",
    "TextureDistortion_UvSet0_Table", "TextureDistortion_UvSet1_Table",
    "TextureDistortion_UvSet2_Table", "TextureDistortion_UvSet3_Table", "TextureNormal_Table",
    "TextureNormal_UvNo_Table", "TexturePalette_Table", "TextureReflection_CalculateColor_Table",
    "TextureReflection_Table", "UvCompute0_Table", "UvCompute1_Table", "UvCompute2_Table",
    "UvCompute3_Table", "UvPrecisionType_Table", "UvSetCount_Table", "Color", "Default",
    "DefaultTechnique", "Depth", "GeometryInstancingOff", "GeometryInstancingOn",
    "GetInstancingData_Bush", "GetNoInstancingData_Bush", "Outline", "SUB_VIEW_CUBE_0",
    "SUB_VIEW_MAIN", "SUB_VIEW_ROOF", "SUB_VIEW_SHADOW_0", "SUB_VIEW_SHADOW_1", "PASS_0", "PASS_7",
    "PASS_10", "PASS_12", "PASS_14", "PASS_COMPOSITE_OPAQUE", "PASS_COMPOSITE_SEMITRANSPARENCY",
    "PASS_COMPOSITE_SEMITRANSPARENCY_UNDER_WATER", "PASS_G_OPAQUE", "PASS_G_SEMITRANSPARENCY",
    "PASS_ID", "PASS_LIGHTING_OPAQUE", "PASS_LIGHTING_SEMITRANSPARENCY", "PASS_SEMITRANSPARENCY",
    "PASS_WATER", "PASS_WATER_Z", "PASS_WIREFRAME", "PASS_Z_OPAQUE",
];

/// Suffixes appended to a key name to form its values.
static KNOWN_SUFFIXES: &[&str] = &[
    "_On", "_Off", "0", "1", "2", "Add", "Alpha", "Body", "BodyJJM", "Box", "Cascade",
    "CascadeWith", "CloudOnly", "Color", "Compatibility", "Depth", "Distance", "Face", "Face2",
    "FaceEmissive", "Hair", "Low", "Mask", "Mul", "None", "Normal", "Off", "On",
    "ParallaxOcclusion", "Plane", "PlaneFar", "PlaneNear", "ReflectivityRGB", "RGBA", "Rigid",
    "Simple", "Skin", "TerrainEadg", "WaterDepth", "_0", "_0_0", "_1", "_1_0", "_1_1", "_1x1", "_2",
    "_3", "_3x3", "_4", "_Add", "_Alpha", "_Apply", "_AutoPlacement", "_ByParameter",
    "_ByPixelPosition", "_Chara", "_Color", "_Cubic", "_Debug", "_Disable", "_Enable", "_Ex",
    "_FixedIntervalNDC", "_HalfLambert", "_High", "_INTZ_FETCH4", "_Lambert", "_Legacy",
    "_LerpWhite", "_Linear", "_Low", "_Map", "_MapChara", "_Max", "_Medium", "_Min",
    "_ModulateAlpha", "_Mul", "_None", "_NoneControl", "_Nothing", "_PerModel", "_PerPixel",
    "_Quadratic", "_RAWZ", "_Release", "_RGB", "_SH", "_Shadow", "_Shigemi", "_Sub", "_Table",
    "_Texture",
];

static KNOWN_NAMES_BY_HASH: LazyLock<FxHashMap<u32, Name>> =
    LazyLock::new(|| index(KNOWN_NAMES.iter().map(|&name| Name::new(name))));

/// Map each name by hash, keeping the first on collision.
fn index(names: impl IntoIterator<Item = Name>) -> FxHashMap<u32, Name> {
    let mut map = FxHashMap::default();
    for name in names {
        map.entry(name.hash()).or_insert(name);
    }
    map
}

/// Every known name, by hash.
pub fn known_names() -> &'static FxHashMap<u32, Name> {
    &KNOWN_NAMES_BY_HASH
}

/// The known name with this hash, or a bare hash.
pub fn try_resolve(hash: u32) -> Name {
    resolve_in(None, hash)
}

/// Look `hash` up in `table` first, then in the known names.
pub fn resolve_in(table: Option<&FxHashMap<u32, Name>>, hash: u32) -> Name {
    table
        .and_then(|table| table.get(&hash))
        .or_else(|| KNOWN_NAMES_BY_HASH.get(&hash))
        .cloned()
        .unwrap_or_else(|| Name::from_hash(hash))
}

/// Candidate values of a key: its stem crossed with every known suffix.
///
/// Table keys share a stem with their values minus the `_Table` part, e.g.
/// `CategoryFlowMapType_Table` has values `CategoryFlowMapType_Standard`
/// and so on.
pub fn with_known_suffixes(key: &Name) -> FxHashMap<u32, Name> {
    let stem = match key.text() {
        Some(text) if key.is_value_authoritative() && text.ends_with("_Table") => {
            if text.starts_with("UvCompute") {
                Name::new("UvCompute")
            } else if text.starts_with("TextureDistortion_UvSet") {
                Name::new("TextureDistortion_UvSet")
            } else if text.ends_with("_UvNo_Table") {
                Name::new(&text[..text.len() - 8])
            } else {
                Name::new(&text[..text.len() - 6])
            }
        }
        _ => key.clone(),
    };
    index(KNOWN_SUFFIXES.iter().map(|&suffix| &stem + suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::name_hash;

    #[test]
    fn test_resolve_known() {
        let name = try_resolve(name_hash("g_MaterialParameter"));
        assert_eq!(name.text(), Some("g_MaterialParameter"));
        assert!(name.is_value_authoritative());
    }

    #[test]
    fn test_resolve_unknown() {
        let name = try_resolve(0xDEAD_BEEF);
        assert_eq!(name.text(), None);
        assert_eq!(name.to_string(), "0xDEADBEEF");
    }

    #[test]
    fn test_dictionary_is_consistent() {
        assert!(known_names().len() <= KNOWN_NAMES.len());
        for (&hash, name) in known_names() {
            assert_eq!(name.hash(), hash);
            assert!(name.is_value_authoritative());
        }
    }

    #[test]
    fn test_table_key_suffixes() {
        let values = with_known_suffixes(&Name::new("Foo_Table"));
        let expected = Name::new("Foo_None");
        assert_eq!(values.get(&expected.hash()).and_then(Name::text), Some("Foo_None"));

        let values = with_known_suffixes(&Name::new("Bar_UvNo_Table"));
        assert!(values.contains_key(&name_hash("Bar_Texture")));
    }

    #[test]
    fn test_plain_key_suffixes() {
        let values = with_known_suffixes(&Name::new("Plain"));
        assert!(values.contains_key(&name_hash("Plain_Max")));

        let bare = Name::from_hash(name_hash("Plain"));
        let values = with_known_suffixes(&bare);
        let value = values.get(&name_hash("Plain_Max")).cloned();
        assert_eq!(value.as_ref().and_then(Name::text), Some("\u{FFFD}_Max"));
    }

    #[test]
    fn test_resolve_prefers_table() {
        let table = with_known_suffixes(&Name::new("Foo_Table"));
        let hash = name_hash("Foo_Min");
        assert_eq!(resolve_in(Some(&table), hash).text(), Some("Foo_Min"));
        assert_eq!(resolve_in(None, hash).text(), None);
    }
}
