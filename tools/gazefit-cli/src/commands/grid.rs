//! Print the calibration targets.

use gazefit_common::config::AppConfig;
use gazefit_session::calibration::grid_points;

pub fn run(config: &AppConfig, width: u32, height: u32) -> anyhow::Result<()> {
    let c = &config.calibration;
    let grid = grid_points(c.grid_cols, c.grid_rows, c.margin);

    println!(
        "Calibration grid {}x{} (margin {}), {width}x{height} screen",
        c.grid_cols, c.grid_rows, c.margin
    );
    for (i, point) in grid.iter().enumerate() {
        let (px, py) = point.to_pixels(width, height);
        println!(
            "  {:>2}: ({:.3}, {:.3})  ->  {px:>5}, {py:>5}",
            i + 1,
            point.x,
            point.y
        );
    }

    Ok(())
}
