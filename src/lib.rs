use wasm_bindgen::prelude::*;
use js_sys::{Object, Reflect};

pub mod batch;
pub mod config;
pub mod decode;
pub mod error;
pub mod grid;
pub mod sampler;

pub use batch::{BatchOptions, BatchReport, ColorJob, ColorRecord, parse_hex, run_batch};
pub use decode::{decode_bytes, open_image};
pub use error::{ExtractError, Result};
pub use grid::{DEFAULT_BACKGROUND, PixelGrid};
pub use config::{ParamOverrides, resolve_params};
pub use sampler::{
    DominantColor, Profile, SamplerParams, brightness, extract_dominant_color, to_hex,
};

/// Sample the dominant product color of an encoded image.
///
/// Steps performed:
/// 1. Decode the bytes and flatten any alpha onto white.
/// 2. Pick parameters from `profile` (`"general"` or `"swatch"`, default general).
/// 3. Crop, drop background pixels and cluster (see [`extract_dominant_color`]).
///
/// `seed` is a JS `BigInt` covering the full `u64` range; omit it for the
/// profile's seed.
///
/// Returns `{ hex: "#rrggbb", filteredToEmpty: bool }`.
#[wasm_bindgen]
pub fn dominant_color(
    input: Vec<u8>,
    profile: Option<String>,
    seed: Option<u64>,
) -> std::result::Result<Object, JsValue> {
    let profile: Profile = match profile {
        Some(name) => name.parse().map_err(to_js_error)?,
        None => Profile::default(),
    };
    let mut params = profile.params();
    if let Some(seed) = seed {
        params.seed = seed;
    }

    let color = dominant_color_bytes(&input, &params).map_err(to_js_error)?;

    let result = Object::new();
    Reflect::set(&result, &JsValue::from_str("hex"), &JsValue::from_str(&color.hex))?;
    Reflect::set(
        &result,
        &JsValue::from_str("filteredToEmpty"),
        &JsValue::from_bool(color.filtered_to_empty),
    )?;

    Ok(result)
}

fn to_js_error(err: ExtractError) -> JsValue {
    JsValue::from_str(&err.to_string())
}

/// Decode `input` and extract its dominant color.
pub fn dominant_color_bytes(input: &[u8], params: &SamplerParams) -> Result<DominantColor> {
    let grid = decode_bytes(input)?;
    extract_dominant_color(&grid, params)
}
