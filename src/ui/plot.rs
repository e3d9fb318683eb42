use std::collections::HashMap;
use std::f64::consts::{FRAC_PI_2, PI};

use eframe::egui::{self, Color32, ScrollArea, Ui};
use egui_plot::{Bar, BarChart, Line, Plot, PlotPoints, PlotUi, Points};

use astroglue::config::{PlotKind, PlotSpec};
use astroglue::data::filter::{Highlight, SelectionState};
use astroglue::data::model::Table;
use astroglue::pipeline::{ClusterBand, Session, ViewRequest};
use astroglue::projection::{self, Bins};

use crate::color::BandColours;
use crate::state::AppState;

const VIEW_HEIGHT: f32 = 320.0;
const POINT_RADIUS: f32 = 1.5;
/// Radians of rotation per dragged pixel in 3D views.
const DRAG_SPEED: f64 = 0.01;

/// What every view needs to read while drawing one frame.
struct ViewContext<'a> {
    session: &'a Session,
    selection: &'a SelectionState,
    colours: &'a BandColours,
    /// Per master-table row, the colour of its highlighted band.
    row_colours: &'a [Option<Color32>],
}

// ---------------------------------------------------------------------------
// Views grid (central panel)
// ---------------------------------------------------------------------------

/// Render every view of the session, two per row.
pub fn views_grid(ui: &mut Ui, state: &mut AppState) {
    let AppState {
        session,
        selection,
        highlights,
        colours,
        view_angles,
        ..
    } = state;

    let Some(session) = session.as_ref() else {
        ui.centered_and_justified(|ui: &mut Ui| {
            ui.heading("No session running");
        });
        return;
    };
    if session.views.is_empty() {
        ui.label("Nothing to show: add a feature space or a plot in the setup form.");
        return;
    }

    let row_colours = row_colours(session, highlights.as_slice(), colours);
    let ctx = ViewContext {
        session,
        selection: &*selection,
        colours: &*colours,
        row_colours: &row_colours,
    };

    ScrollArea::vertical()
        .auto_shrink([false, false])
        .show(ui, |ui: &mut Ui| {
            for (pair_idx, pair) in session.views.chunks(2).enumerate() {
                ui.columns(2, |cols| {
                    for (j, view) in pair.iter().enumerate() {
                        let idx = pair_idx * 2 + j;
                        let ui = &mut cols[j];
                        ui.strong(view.title());
                        match view {
                            ViewRequest::OrderedDensity { .. } => ordered_density(ui, idx, view, &ctx),
                            ViewRequest::Plot(spec) => {
                                plot_view(ui, idx, spec, &ctx, view_angles.get_mut(idx))
                            }
                        }
                    }
                });
                ui.add_space(8.0);
            }
        });
}

fn band_of(session: &Session, highlight: Highlight) -> Option<&ClusterBand> {
    match session.views.get(highlight.view)? {
        ViewRequest::OrderedDensity { bands, .. } => bands.get(highlight.band),
        ViewRequest::Plot(_) => None,
    }
}

fn row_colours(
    session: &Session,
    highlights: &[Option<Highlight>],
    colours: &BandColours,
) -> Vec<Option<Color32>> {
    highlights
        .iter()
        .map(|h| {
            h.and_then(|h| band_of(session, h))
                .map(|band| colours.colour_for(band))
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Ordered-density overlay
// ---------------------------------------------------------------------------

/// `(rank, log_rho)` points in rank order, read back from the master table.
fn density_curve(master: &Table, x_column: &str, y_column: &str) -> Option<Vec<[f64; 2]>> {
    let ranks = master.column(x_column)?.as_index()?;
    let log_rho = master.column(y_column)?;
    let mut curve = vec![[f64::NAN; 2]; ranks.len()];
    for (row, &rank) in ranks.iter().enumerate() {
        *curve.get_mut(rank)? = [rank as f64, log_rho.value(row)];
    }
    Some(curve)
}

fn ordered_density(ui: &mut Ui, idx: usize, view: &ViewRequest, ctx: &ViewContext) {
    let ViewRequest::OrderedDensity {
        space,
        x_column,
        y_column,
        bands,
    } = view
    else {
        return;
    };
    let Some(curve) = density_curve(&ctx.session.master, x_column, y_column) else {
        ui.label(format!("No ordered-density columns for '{space}'"));
        return;
    };
    let selected = ctx.selection.get(space);
    let root = bands.first().map_or(Color32::BLACK, |b| ctx.colours.colour_for(b));

    Plot::new(("view", idx))
        .height(VIEW_HEIGHT)
        .x_axis_label("Ordered index")
        .y_axis_label("log ρ")
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            plot_ui.line(
                Line::new(PlotPoints::new(curve.clone()))
                    .color(root)
                    .fill(0.0)
                    .width(1.0),
            );
            for (b, band) in bands.iter().enumerate() {
                // The root spans everything and is already drawn.
                if band.colour_slot.is_none() {
                    continue;
                }
                let Some(segment) = curve.get(band.start..band.end) else {
                    continue;
                };
                let floor = segment.iter().map(|p| p[1]).fold(f64::INFINITY, f64::min);
                let width = if selected.is_some_and(|s| s.contains(&b)) { 3.0 } else { 1.5 };
                plot_ui.line(
                    Line::new(PlotPoints::new(segment.to_vec()))
                        .name(&band.id)
                        .color(ctx.colours.colour_for(band))
                        .fill(floor as f32)
                        .width(width),
                );
            }
        });
}

// ---------------------------------------------------------------------------
// Requested plots
// ---------------------------------------------------------------------------

fn plot_view(
    ui: &mut Ui,
    idx: usize,
    spec: &PlotSpec,
    ctx: &ViewContext,
    angles: Option<&mut (f64, f64)>,
) {
    let columns: Option<Vec<Vec<f64>>> = spec
        .axes
        .iter()
        .map(|axis| ctx.session.master.column(axis).map(|c| c.to_f64()))
        .collect();
    let Some(columns) = columns else {
        ui.label("A column of this plot is missing from the master table");
        return;
    };

    match spec.kind {
        PlotKind::Histogram1D => histogram_view(ui, idx, &spec.axes[0], &columns[0], ctx),
        PlotKind::Scatter2D => {
            let points: Vec<[f64; 2]> = columns[0]
                .iter()
                .zip(&columns[1])
                .map(|(&x, &y)| [x, y])
                .collect();
            Plot::new(("view", idx))
                .height(VIEW_HEIGHT)
                .x_axis_label(spec.axes[0].clone())
                .y_axis_label(spec.axes[1].clone())
                .show(ui, |plot_ui| draw_scatter(plot_ui, &points, ctx));
        }
        PlotKind::ScatterAitoff => {
            let points: Vec<[f64; 2]> = columns[0]
                .iter()
                .zip(&columns[1])
                .map(|(&lon, &lat)| {
                    let (x, y) = projection::aitoff(lon, lat);
                    [x, y]
                })
                .collect();
            Plot::new(("view", idx))
                .height(VIEW_HEIGHT)
                .data_aspect(1.0)
                .show_axes(false)
                .show(ui, |plot_ui| {
                    plot_ui.line(Line::new(PlotPoints::new(aitoff_outline())).color(Color32::GRAY));
                    draw_scatter(plot_ui, &points, ctx);
                });
        }
        PlotKind::Scatter3D => {
            let mut fallback = (0.6, 0.4);
            let angles = angles.unwrap_or(&mut fallback);
            scatter_3d(ui, idx, &columns, angles, ctx);
        }
    }
}

/// Grey points for unselected rows, coloured points for highlighted ones.
fn draw_scatter(plot_ui: &mut PlotUi, points: &[[f64; 2]], ctx: &ViewContext) {
    let mut base = Vec::new();
    let mut lit: HashMap<Color32, Vec<[f64; 2]>> = HashMap::new();
    for (row, p) in points.iter().enumerate() {
        if !(p[0].is_finite() && p[1].is_finite()) {
            continue;
        }
        match ctx.row_colours.get(row).copied().flatten() {
            Some(colour) => lit.entry(colour).or_default().push(*p),
            None => base.push(*p),
        }
    }
    plot_ui.points(
        Points::new(PlotPoints::new(base))
            .color(ctx.colours.unselected())
            .radius(POINT_RADIUS),
    );
    for (colour, pts) in lit {
        plot_ui.points(
            Points::new(PlotPoints::new(pts))
                .color(colour)
                .radius(POINT_RADIUS + 1.0),
        );
    }
}

/// Boundary ellipse of the Aitoff plane.
fn aitoff_outline() -> Vec<[f64; 2]> {
    let right: Vec<[f64; 2]> = (-90..=90)
        .map(|lat| {
            let (x, y) = projection::aitoff(180.0, f64::from(lat));
            [x, y]
        })
        .collect();
    let left = right.iter().rev().map(|&[x, y]| [-x, y]);
    right.iter().copied().chain(left).collect()
}

fn scatter_3d(ui: &mut Ui, idx: usize, columns: &[Vec<f64>], angles: &mut (f64, f64), ctx: &ViewContext) {
    ui.horizontal(|ui: &mut Ui| {
        ui.add(egui::Slider::new(&mut angles.0, -PI..=PI).text("yaw"));
        ui.add(egui::Slider::new(&mut angles.1, -FRAC_PI_2..=FRAC_PI_2).text("pitch"));
    });

    let centre: Vec<f64> = columns.iter().map(|c| finite_mean(c)).collect();
    let (yaw, pitch) = *angles;
    let points: Vec<[f64; 2]> = (0..columns[0].len())
        .map(|r| {
            let p = [
                columns[0][r] - centre[0],
                columns[1][r] - centre[1],
                columns[2][r] - centre[2],
            ];
            projection::orthographic(p, yaw, pitch)
        })
        .collect();

    let response = Plot::new(("view", idx))
        .height(VIEW_HEIGHT)
        .data_aspect(1.0)
        .allow_drag(false)
        .show_axes(false)
        .show(ui, |plot_ui| draw_scatter(plot_ui, &points, ctx))
        .response;

    // Dragging rotates instead of panning.
    if response.dragged() {
        let delta = response.drag_delta();
        angles.0 = wrap_angle(angles.0 + f64::from(delta.x) * DRAG_SPEED);
        angles.1 = (angles.1 + f64::from(delta.y) * DRAG_SPEED).clamp(-FRAC_PI_2, FRAC_PI_2);
    }
}

fn finite_mean(values: &[f64]) -> f64 {
    let (sum, n) = values
        .iter()
        .filter(|v| v.is_finite())
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 { 0.0 } else { sum / n as f64 }
}

fn wrap_angle(a: f64) -> f64 {
    (a + PI).rem_euclid(2.0 * PI) - PI
}

fn histogram_view(ui: &mut Ui, idx: usize, axis: &str, values: &[f64], ctx: &ViewContext) {
    let Some(bins) = Bins::covering(values, projection::default_bin_count(values.len())) else {
        ui.label(format!("'{axis}' has no finite values"));
        return;
    };
    let all = bins.counts(values.iter().copied());

    let mut lit: HashMap<Color32, Vec<f64>> = HashMap::new();
    for (row, &v) in values.iter().enumerate() {
        if let Some(colour) = ctx.row_colours.get(row).copied().flatten() {
            lit.entry(colour).or_default().push(v);
        }
    }

    Plot::new(("view", idx))
        .height(VIEW_HEIGHT)
        .x_axis_label(axis.to_string())
        .y_axis_label("count")
        .show(ui, |plot_ui| {
            plot_ui.bar_chart(BarChart::new(bars(&bins, &all)).color(ctx.colours.unselected()));
            for (colour, subset) in &lit {
                let counts = bins.counts(subset.iter().copied());
                plot_ui.bar_chart(BarChart::new(bars(&bins, &counts)).color(*colour));
            }
        });
}

fn bars(bins: &Bins, counts: &[usize]) -> Vec<Bar> {
    counts
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::new(bins.centre(i), c as f64).width(bins.width))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use astroglue::data::model::Column;

    #[test]
    fn density_curve_is_in_rank_order() {
        let master = Table::new(
            vec!["oi".into(), "lr".into()],
            vec![
                Column::Index(vec![2, 0, 1]),
                Column::Float(vec![0.2, 1.0, 0.5]),
            ],
        )
        .unwrap();
        let curve = density_curve(&master, "oi", "lr").unwrap();
        assert_eq!(curve, vec![[0.0, 1.0], [1.0, 0.5], [2.0, 0.2]]);
    }

    #[test]
    fn density_curve_needs_index_column() {
        let master = Table::from_float_columns(vec!["a".into(), "b".into()], vec![vec![0.0], vec![1.0]]).unwrap();
        assert!(density_curve(&master, "a", "b").is_none());
    }

    #[test]
    fn outline_is_closed_ellipse() {
        let outline = aitoff_outline();
        assert_eq!(outline.len(), 2 * 181);
        assert!(outline.iter().all(|p| p[0].abs() <= 180.0 + 1e-6 && p[1].abs() <= 90.0 + 1e-6));
    }

    #[test]
    fn angle_wraps() {
        assert!((wrap_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(0.5) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn mean_skips_nan() {
        assert_eq!(finite_mean(&[1.0, f64::NAN, 3.0]), 2.0);
        assert_eq!(finite_mean(&[]), 0.0);
    }
}
