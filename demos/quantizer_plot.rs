//! Plot out the quantizer converting a smooth ramp into stairsteps, for a few different scales
//!
//! Look in /images/ for the resulting plot.
//!
//! Requires plotters lib: https://docs.rs/plotters/latest/plotters/. Tested on an Ubuntu machine.

use cv_quantizer::{
    config::DUAL_CHANNEL_KEYS,
    quantizer::quantize_floor,
    scale::{self, Mode, Note, ScaleMask},
    tables::{generate_voltage_table, VOLTS_PER_SEMITONE},
};
use plotters::prelude::*;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    const NUM_POINTS: usize = 10_000;

    let voltages = generate_voltage_table::<DUAL_CHANNEL_KEYS>(VOLTS_PER_SEMITONE, 0);

    // two octaves + 1/2 step
    let max_vin = 25. / 12.;

    let mut roots_and_fifths = ScaleMask::EMPTY;
    roots_and_fifths.allow(&[Note::C, Note::G]);

    // the name and scale for each plot
    let details = [
        ("Chromatic", Mode::Chromatic.mask(Note::C)),
        ("C major", Mode::Major.mask(Note::C)),
        ("A dorian", Mode::Dorian.mask(Note::A)),
        ("Roots and fifths", roots_and_fifths),
    ];

    std::fs::create_dir_all("images")?;
    let root = BitMapBackend::new("images/quantizer_plot.png", (640, 480)).into_drawing_area();
    root.fill(&WHITE)?;
    let root = root.titled("Quantizer", ("sans-serif", 40))?;

    for ((name, mask), area) in details.iter().zip(root.split_evenly((2, 2)).iter()) {
        let mut chart = ChartBuilder::on(area)
            .caption(*name, ("Arial", 15).into_font())
            .x_label_area_size(40)
            .y_label_area_size(40)
            .build_cartesian_2d(0f32..1f32, 0f32..max_vin + 0.1)?;

        chart
            .configure_mesh()
            .x_desc("Time")
            .y_desc("Amplitude (volts)")
            .draw()?;

        // plot the input
        chart
            .draw_series(LineSeries::new(
                (1..NUM_POINTS).map(|x| {
                    let x = x as f32 / NUM_POINTS as f32;
                    (x, x * max_vin)
                }),
                BLUE,
            ))?
            .label("Raw input")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

        // plot the quantized output, a held output stays at the previous voltage
        let mut held = 0.0_f32;
        chart
            .draw_series(LineSeries::new(
                (1..NUM_POINTS).map(|x| {
                    let x = x as f32 / NUM_POINTS as f32;
                    let idx = quantize_floor(x * max_vin, &voltages);
                    if let Some(idx) = scale::correct(idx, *mask, voltages.len()) {
                        held = voltages[idx];
                    }
                    (x, held)
                }),
                RED,
            ))?
            .label("Quantized output")
            .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::LowerRight)
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    root.present()?;

    Ok(())
}
