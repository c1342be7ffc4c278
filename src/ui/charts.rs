use std::f64::consts::TAU;

use eframe::egui::{Color32, Ui};
use egui_plot::{Bar, BarChart, Legend, Plot, PlotPoints, Polygon};

use crate::color::ColorMap;
use crate::data::model::{CellValue, Table};
use crate::data::summary::{age_histogram, cross_counts, value_counts};

const CHART_HEIGHT: f32 = 280.0;
const AGE_BINS: usize = 30;

// ---------------------------------------------------------------------------
// Chart section (central panel, below the table)
// ---------------------------------------------------------------------------

/// Render every summary chart for the filtered table.
pub fn charts(ui: &mut Ui, filtered: &Table) {
    ui.heading("Data Visualizations");

    category_bars(ui, "diagnosis_chart", "Distribution of Primary Diagnoses", filtered, "Primary Diagnosis");
    category_bars(ui, "site_chart", "Distribution of Primary Sites", filtered, "Primary Site");
    pie(ui, "sex_chart", "Distribution of Sex at Birth", filtered, "Sex at Birth");
    stacked_bars(ui, "race_ethnicity_chart", "Distribution of Race and Ethnicity", filtered, "Race", "Ethnicity");
    age_chart(ui, filtered);
}

/// x-axis labels for categorical bars at integer positions.
fn category_formatter(labels: Vec<String>) -> impl Fn(egui_plot::GridMark, &std::ops::RangeInclusive<f64>) -> String {
    move |mark, _range| {
        let v = mark.value;
        if (v - v.round()).abs() > f64::EPSILON || v < 0.0 {
            return String::new();
        }
        labels.get(v as usize).cloned().unwrap_or_default()
    }
}

fn category_bars(ui: &mut Ui, id: &str, title: &str, table: &Table, column: &str) {
    ui.strong(title);
    let counts = value_counts(table, column);
    let labels: Vec<String> = counts.iter().map(|(v, _)| v.to_string()).collect();
    let bars: Vec<Bar> = counts
        .iter()
        .enumerate()
        .map(|(i, (v, n))| Bar::new(i as f64, *n as f64).name(v.to_string()).width(0.7))
        .collect();

    Plot::new(id)
        .height(CHART_HEIGHT)
        .x_axis_label(column)
        .y_axis_label("Count")
        .x_axis_formatter(category_formatter(labels))
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).color(Color32::LIGHT_BLUE));
        });
}

fn pie(ui: &mut Ui, id: &str, title: &str, table: &Table, column: &str) {
    ui.strong(title);
    let counts = value_counts(table, column);
    let total: usize = counts.iter().map(|(_, n)| n).sum();
    let colors = ColorMap::new(counts.iter().map(|(v, _)| v));

    Plot::new(id)
        .height(CHART_HEIGHT)
        .data_aspect(1.0)
        .show_axes(false)
        .show_grid(false)
        .allow_drag(false)
        .allow_scroll(false)
        .allow_zoom(false)
        .legend(Legend::default())
        .show(ui, |plot_ui| {
            if total == 0 {
                return;
            }
            let mut start = 0.0;
            for (value, n) in &counts {
                let sweep = TAU * *n as f64 / total as f64;
                let pct = 100.0 * *n as f64 / total as f64;
                plot_ui.polygon(
                    Polygon::new(PlotPoints::new(wedge(start, sweep)))
                        .fill_color(colors.color_for(value))
                        .name(format!("{value} ({pct:.1}%)")),
                );
                start += sweep;
            }
        });
}

/// Unit-circle wedge from `start` spanning `sweep` radians.
fn wedge(start: f64, sweep: f64) -> Vec<[f64; 2]> {
    let steps = ((sweep / TAU) * 128.0).ceil().max(2.0) as usize;
    let mut pts = vec![[0.0, 0.0]];
    pts.extend((0..=steps).map(|i| {
        let a = start + sweep * i as f64 / steps as f64;
        [a.cos(), a.sin()]
    }));
    pts
}

fn stacked_bars(ui: &mut Ui, id: &str, title: &str, table: &Table, outer: &str, inner: &str) {
    ui.strong(title);
    let counts = cross_counts(table, outer, inner);
    let mut categories: Vec<&CellValue> = counts.keys().map(|(o, _)| o).collect();
    categories.dedup();
    let groups: Vec<&CellValue> = {
        let mut g: Vec<&CellValue> = counts.keys().map(|(_, i)| i).collect();
        g.sort();
        g.dedup();
        g
    };
    let colors = ColorMap::new(groups.iter().copied());
    let labels: Vec<String> = categories.iter().map(|c| c.to_string()).collect();

    let mut charts: Vec<BarChart> = Vec::new();
    for group in &groups {
        let bars: Vec<Bar> = categories
            .iter()
            .enumerate()
            .map(|(x, cat)| {
                let n = counts.get(&((*cat).clone(), (*group).clone())).copied().unwrap_or(0);
                Bar::new(x as f64, n as f64).width(0.7)
            })
            .collect();
        let below: Vec<&BarChart> = charts.iter().collect();
        let chart = BarChart::new(bars)
            .name(group.to_string())
            .color(colors.color_for(group))
            .stack_on(&below);
        charts.push(chart);
    }

    Plot::new(id)
        .height(CHART_HEIGHT)
        .x_axis_label(outer)
        .y_axis_label("Count")
        .x_axis_formatter(category_formatter(labels))
        .legend(Legend::default())
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for chart in charts {
                plot_ui.bar_chart(chart);
            }
        });
}

fn age_chart(ui: &mut Ui, table: &Table) {
    let hist = age_histogram(table, AGE_BINS);
    ui.strong(format!(
        "Distribution of Age at Baseline (excluding {} records with no age data)",
        hist.missing
    ));
    let bars: Vec<Bar> = hist
        .bins
        .iter()
        .map(|(start, width, n)| {
            Bar::new(start + width / 2.0, *n as f64)
                .width(*width)
                .name(format!("{start:.1}–{:.1}", start + width))
        })
        .collect();

    Plot::new("age_chart")
        .height(CHART_HEIGHT)
        .x_axis_label("Age (years)")
        .y_axis_label("Count")
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars).color(Color32::LIGHT_BLUE));
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wedge_starts_at_centre_and_ends_on_circle() {
        let pts = wedge(0.0, TAU / 4.0);
        assert_eq!(pts[0], [0.0, 0.0]);
        let [x, y] = pts[pts.len() - 1];
        assert!(x.abs() < 1e-9 && (y - 1.0).abs() < 1e-9);
    }
}
