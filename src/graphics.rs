use macroquad::prelude::*;
use tracing::{info, warn};

// Function to configure the macroquad window
pub fn window_conf() -> Conf {
    Conf {
        window_title: "Bicycle Sim: lateral position".to_string(),
        window_width: 900,
        window_height: 600,
        high_dpi: true,
        ..Default::default()
    }
}

const MARGIN_LEFT: f32 = 70.0;
const MARGIN_RIGHT: f32 = 20.0;
const MARGIN_TOP: f32 = 40.0;
const MARGIN_BOTTOM: f32 = 50.0;
const GRID_DIVISIONS: usize = 10;

/// Data-space extent of the plotted series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotBounds {
    pub t_min: f64,
    pub t_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl PlotBounds {
    /// Bounds of the finite points in `series` (and `reference`), padded so that
    /// a flat or single-point series still has a non-zero extent.
    pub fn fit(series: &[(f64, f64)], reference: f64) -> Option<Self> {
        let mut finite = series.iter().filter(|(t, y)| t.is_finite() && y.is_finite());
        let &(t0, y0) = finite.next()?;
        let mut bounds = PlotBounds {
            t_min: t0,
            t_max: t0,
            y_min: y0.min(reference),
            y_max: y0.max(reference),
        };
        for &(t, y) in finite {
            bounds.t_min = bounds.t_min.min(t);
            bounds.t_max = bounds.t_max.max(t);
            bounds.y_min = bounds.y_min.min(y);
            bounds.y_max = bounds.y_max.max(y);
        }

        if bounds.t_max - bounds.t_min <= f64::EPSILON {
            bounds.t_max = bounds.t_min + 1.0;
        }
        let pad = ((bounds.y_max - bounds.y_min) * 0.05).max(1e-3);
        bounds.y_min -= pad;
        bounds.y_max += pad;
        Some(bounds)
    }

    /// Maps a data point into the plot rectangle `(left, top, width, height)`.
    pub fn to_screen(&self, t: f64, y: f64, rect: (f32, f32, f32, f32)) -> Vec2 {
        let (left, top, width, height) = rect;
        let u = (t - self.t_min) / (self.t_max - self.t_min);
        let v = (y - self.y_min) / (self.y_max - self.y_min);
        vec2(left + u as f32 * width, top + (1.0 - v as f32) * height)
    }
}

/// Shows `series` as y(t) until the window is closed or Escape is pressed.
pub async fn run_plot_loop(series: Vec<(f64, f64)>, setpoint: f64) {
    let Some(bounds) = PlotBounds::fit(&series, setpoint) else {
        warn!("Nothing finite to plot.");
        return;
    };
    info!(points = series.len(), ?bounds, "Plot window opened, press Escape to close");

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }

        clear_background(WHITE);
        let rect = (
            MARGIN_LEFT,
            MARGIN_TOP,
            screen_width() - MARGIN_LEFT - MARGIN_RIGHT,
            screen_height() - MARGIN_TOP - MARGIN_BOTTOM,
        );
        let (left, top, width, height) = rect;

        for i in 0..=GRID_DIVISIONS {
            let frac = i as f32 / GRID_DIVISIONS as f32;
            let x = left + frac * width;
            let y = top + frac * height;
            draw_line(x, top, x, top + height, 1.0, LIGHTGRAY);
            draw_line(left, y, left + width, y, 1.0, LIGHTGRAY);

            let t_label = bounds.t_min + (bounds.t_max - bounds.t_min) * frac as f64;
            let y_label = bounds.y_max - (bounds.y_max - bounds.y_min) * frac as f64;
            draw_text(&format!("{:.1}", t_label), x - 10.0, top + height + 18.0, 16.0, DARKGRAY);
            draw_text(&format!("{:.3}", y_label), 5.0, y + 4.0, 16.0, DARKGRAY);
        }
        draw_rectangle_lines(left, top, width, height, 2.0, BLACK);

        let a = bounds.to_screen(bounds.t_min, setpoint, rect);
        let b = bounds.to_screen(bounds.t_max, setpoint, rect);
        draw_line(a.x, a.y, b.x, b.y, 1.5, RED);

        for pair in series.windows(2) {
            let ((t0, y0), (t1, y1)) = (pair[0], pair[1]);
            if !(y0.is_finite() && y1.is_finite()) {
                continue;
            }
            let p0 = bounds.to_screen(t0, y0, rect);
            let p1 = bounds.to_screen(t1, y1, rect);
            draw_line(p0.x, p0.y, p1.x, p1.y, 2.0, BLUE);
        }

        draw_text("y (m)", 10.0, 25.0, 20.0, BLACK);
        draw_text("Time (s)", left + width / 2.0 - 30.0, top + height + 40.0, 20.0, BLACK);

        next_frame().await
    }
    info!("Plot window closed.");
}
