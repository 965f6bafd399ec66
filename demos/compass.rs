use compass_mcmc::{
    CategoryDefinition, CellTable, CompassFitOptions, CompassSamplerConfig, CountInput,
    McmcConfig, ProbabilityScope, all_categories, category_diagnostics, count_cells,
    fit_compass_with_config,
};
use compass_mcmc::utils::usize_to_f64;
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

const MARKERS: [&str; 3] = ["IFNg", "IL2", "TNFa"];

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let markers: Vec<String> = MARKERS.iter().map(ToString::to_string).collect();
    let mut rng = StdRng::seed_from_u64(2_026);
    let subjects = 12;
    let mut stimulated = Vec::with_capacity(subjects);
    let mut unstimulated = Vec::with_capacity(subjects);
    for subject in 0..subjects {
        let responder = subject % 2 == 0;
        stimulated.push(CellTable::from_logical(
            markers.clone(),
            &synthetic_cells(&mut rng, 2_000, responder),
        )?);
        unstimulated.push(CellTable::from_logical(
            markers.clone(),
            &synthetic_cells(&mut rng, 2_000, false),
        )?);
    }

    let mut categories = all_categories(MARKERS.len());
    categories.push(CategoryDefinition::from_pattern(vec![false; MARKERS.len()]));
    let input = CountInput::new(
        count_cells(&stimulated, &categories)?,
        count_cells(&unstimulated, &categories)?,
    );
    let diagnostics = category_diagnostics(&input);
    println!(
        "Counted {} subjects over {} categories ({} with stimulated cells)",
        diagnostics.n_subjects, diagnostics.n_categories, diagnostics.n_eligible
    );

    let config = CompassSamplerConfig {
        fit_options: CompassFitOptions {
            schedule: McmcConfig {
                iterations: 2_000,
                burn_in: 500,
                thin: 5,
                seed: 7,
                adapt_during_burn_in: true,
            },
            scope: ProbabilityScope::Full,
            ..CompassFitOptions::default()
        },
        ..CompassSamplerConfig::default()
    };
    let (report, trajectory) = fit_compass_with_config(&input, config)?;

    let rates = report.diagnostics.acceptance_rates;
    println!(
        "Sampler: iterations={}, retained draws={}",
        report.diagnostics.iterations_completed, report.diagnostics.retained_draws
    );
    println!(
        "Acceptance rates: alpha_s={:.2}, alpha_u={:.2}, activation={:.2}",
        rates.alpha_s, rates.alpha_u, rates.activation
    );

    let Some(responses) = trajectory.response_probabilities() else {
        return Ok(());
    };
    for (category, definition) in categories.iter().enumerate() {
        let mean = (0..subjects)
            .map(|subject| responses[(subject, category)])
            .sum::<f64>()
            / usize_to_f64(subjects);
        println!(
            "{:<24} mean response probability {mean:.3}",
            definition.to_expression(&markers)
        );
    }

    Ok(())
}

/// Cells with independent markers; responders carry extra triple-positive cells.
fn synthetic_cells(rng: &mut StdRng, cells: usize, responder: bool) -> Vec<Vec<bool>> {
    (0..cells)
        .map(|_| {
            if responder && rng.random::<f64>() < 0.02 {
                vec![true; MARKERS.len()]
            } else {
                (0..MARKERS.len()).map(|_| rng.random::<f64>() < 0.05).collect()
            }
        })
        .collect()
}
