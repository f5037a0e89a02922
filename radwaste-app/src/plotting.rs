//! Decay forecast charts for stored calculations.

use anyhow::Result;
use plotters::prelude::*;
use radwaste_core::decayed_activity;
use radwaste_schemas::history::HistoryRecord;
use std::path::Path;

const CURVE_SAMPLES: usize = 200;

fn sample_activity(record: &HistoryRecord, span_hours: f64) -> Result<Vec<(f64, f64)>> {
    let half_life = record.isotope.half_life_hours;
    let initial_activity = record.result.activity_mbq_at_measurement;
    (0..=CURVE_SAMPLES)
        .map(|k| {
            let t = span_hours * k as f64 / CURVE_SAMPLES as f64;
            Ok((t, decayed_activity(initial_activity, half_life, t)?))
        })
        .collect()
}

/// `100 * a(t) / a0` for each point of an activity curve.
fn remaining_percent_curve(activity_curve: &[(f64, f64)], initial_activity: f64) -> Vec<(f64, f64)> {
    activity_curve
        .iter()
        .map(|&(t, a)| (t, 100.0 * a / initial_activity))
        .collect()
}

/// Renders activity and the remaining percentage over the ten forecast half-lives to a PNG file.
pub fn plot_decay_forecast(path: &Path, record: &HistoryRecord) -> Result<()> {
    let half_life = record.isotope.half_life_hours;
    let initial_activity = record.result.activity_mbq_at_measurement;
    let span_hours = record
        .forecast
        .last()
        .map_or(half_life * 10.0, |p| half_life * f64::from(p.half_life_index));

    let activity_curve = sample_activity(record, span_hours)?;
    let percent_curve = remaining_percent_curve(&activity_curve, initial_activity);

    let root = BitMapBackend::new(path, (1024, 1024)).into_drawing_area();
    root.fill(&WHITE)?;
    let (upper, lower) = root.split_vertically(512);

    let mut chart = ChartBuilder::on(&upper)
        .caption(
            format!("{} decay: {}", record.isotope.display_name, record.sample_label),
            ("sans-serif", 36).into_font(),
        )
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..span_hours, 0f64..initial_activity * 1.1)?;

    chart
        .configure_mesh()
        .x_desc("Time since measurement (hours)")
        .y_desc("Activity (MBq)")
        .y_label_formatter(&|y| format!("{:.2e}", y))
        .draw()?;

    chart
        .draw_series(LineSeries::new(activity_curve, BLUE.stroke_width(2)))?
        .label("Activity")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE.filled()));

    chart
        .draw_series(record.forecast.iter().map(|p| {
            Circle::new((half_life * f64::from(p.half_life_index), p.activity_mbq), 4, RED.filled())
        }))?
        .label("Half-life points")
        .legend(|(x, y)| Circle::new((x + 10, y), 4, RED.filled()));

    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    let mut percent_chart = ChartBuilder::on(&lower)
        .caption("Remaining activity", ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(30)
        .y_label_area_size(70)
        .build_cartesian_2d(0f64..span_hours, 0f64..100f64)?;

    percent_chart
        .configure_mesh()
        .x_desc("Time since measurement (hours)")
        .y_desc("Remaining (%)")
        .draw()?;

    percent_chart.draw_series(LineSeries::new(percent_curve, GREEN.stroke_width(2)))?;
    percent_chart.draw_series(record.forecast.iter().map(|p| {
        Circle::new((half_life * f64::from(p.half_life_index), p.percent_remaining), 4, RED.filled())
    }))?;

    root.present()?;
    log::info!("Wrote decay chart for record {} to {:?}", record.id, path);
    Ok(())
}
