//! Feature-importance bar chart

use std::error::Error;
use std::path::Path;

use plotters::prelude::*;
use tracing::info;

use crate::errors::{Result, TrainerError};

const WIDTH: u32 = 900;
const ROW_HEIGHT: u32 = 28;

/// Render a horizontal bar chart of `(column, importance)` pairs as SVG
///
/// Bars are drawn in the order given, first entry at the top.
pub fn plot_importance(path: &Path, ranked: &[(String, f64)], title: &str) -> Result<()> {
    if ranked.is_empty() {
        return Err(TrainerError::Plot("nothing to plot".to_string()));
    }

    draw(path, ranked, title).map_err(|e| TrainerError::Plot(e.to_string()))?;
    info!("Wrote importance chart to {}", path.display());
    Ok(())
}

fn draw(path: &Path, ranked: &[(String, f64)], title: &str) -> std::result::Result<(), Box<dyn Error>> {
    let n = ranked.len();
    let height = 120 + ROW_HEIGHT * n as u32;
    let x_max = ranked
        .iter()
        .map(|(_, v)| *v)
        .fold(0.0, f64::max)
        .max(f64::EPSILON)
        * 1.1;
    let label_width = ranked.iter().map(|(name, _)| name.len()).max().unwrap_or(0) as u32 * 8 + 20;

    let root = SVGBackend::new(path, (WIDTH, height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(title, ("sans-serif", 20).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(label_width)
        .build_cartesian_2d(0f64..x_max, -0.5f64..(n as f64 - 0.5))?;

    // Row i sits at y = n - 1 - i so the first entry is drawn on top
    let name_at = |y: &f64| -> String {
        let r = y.round();
        if (y - r).abs() > 1e-6 || r < 0.0 || r as usize >= n {
            return String::new();
        }
        ranked[n - 1 - r as usize].0.clone()
    };

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(n)
        .y_label_formatter(&name_at)
        .x_desc("Importance")
        .draw()?;

    chart.draw_series(ranked.iter().enumerate().map(|(i, (_, value))| {
        let y = (n - 1 - i) as f64;
        Rectangle::new([(0.0, y - 0.35), (*value, y + 0.35)], BLUE.mix(0.7).filled())
    }))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_plot_writes_svg() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("importance.svg");
        let ranked = vec![
            ("ejection_fraction".to_string(), 0.6),
            ("age".to_string(), 0.3),
            ("sex".to_string(), 0.1),
        ];

        plot_importance(&path, &ranked, "Feature importance").unwrap();

        let svg = std::fs::read_to_string(&path).unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("<rect"));
    }

    #[test]
    fn test_plot_rejects_empty() {
        let dir = TempDir::new().unwrap();
        assert!(plot_importance(&dir.path().join("x.svg"), &[], "empty").is_err());
    }
}
