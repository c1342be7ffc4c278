use std::collections::{BTreeMap, BTreeSet};

use eframe::egui::Color32;
use palette::{Hsl, IntoColor, Srgb};

use crate::data::model::CellValue;

/// Hue step between consecutive categories. The golden angle keeps
/// neighbouring categories far apart however many there are.
const HUE_STEP: f32 = 137.508;

/// Chart colour for the `i`-th category. Every other category is a little
/// darker so adjacent pie wedges and stacked bars stay distinguishable.
fn category_color(i: usize) -> Color32 {
    let hue = (i as f32 * HUE_STEP) % 360.0;
    let lightness = if i % 2 == 0 { 0.58 } else { 0.46 };
    let rgb: Srgb = Hsl::new(hue, 0.65, lightness).into_color();
    let rgb: Srgb<u8> = rgb.into_format();
    Color32::from_rgb(rgb.red, rgb.green, rgb.blue)
}

// ---------------------------------------------------------------------------
// Category colours: cell value → Color32
// ---------------------------------------------------------------------------

/// Stable colours for the categories of one chart series. Values are
/// coloured in sorted order, so a category keeps its colour across
/// re-filtering as long as the set of categories is unchanged.
#[derive(Debug, Clone)]
pub struct ColorMap {
    mapping: BTreeMap<CellValue, Color32>,
}

impl ColorMap {
    /// Null (missing) values are drawn grey.
    pub const MISSING: Color32 = Color32::GRAY;

    /// Build a colour map from a series' values; duplicates share a colour.
    pub fn new<'a, I>(values: I) -> Self
    where
        I: IntoIterator<Item = &'a CellValue>,
    {
        let distinct: BTreeSet<&CellValue> = values.into_iter().filter(|v| !v.is_null()).collect();
        let mapping = distinct
            .into_iter()
            .enumerate()
            .map(|(i, v)| (v.clone(), category_color(i)))
            .collect();
        ColorMap { mapping }
    }

    pub fn color_for(&self, value: &CellValue) -> Color32 {
        self.mapping.get(value).copied().unwrap_or(Self::MISSING)
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neighbouring_categories_differ() {
        let colors: Vec<Color32> = (0..12).map(category_color).collect();
        assert!(colors.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn duplicates_share_a_colour_and_unknowns_are_grey() {
        let vals = [CellValue::text("Female"), CellValue::text("Male"), CellValue::text("Female")];
        let cm = ColorMap::new(vals.iter());
        assert_eq!(cm.len(), 2);
        assert_ne!(cm.color_for(&vals[0]), cm.color_for(&vals[1]));
        assert_eq!(cm.color_for(&CellValue::text("Unknown")), ColorMap::MISSING);
        assert_eq!(cm.color_for(&CellValue::Null), ColorMap::MISSING);
    }

    #[test]
    fn colour_depends_on_sorted_position_not_input_order() {
        let a = ColorMap::new([CellValue::text("x"), CellValue::text("y")].iter());
        let b = ColorMap::new([CellValue::text("y"), CellValue::text("x")].iter());
        assert_eq!(a.color_for(&CellValue::text("x")), b.color_for(&CellValue::text("x")));
    }
}
