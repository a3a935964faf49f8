//! `kiln build`: one full build from a cold cache.

use std::time::Instant;

use kiln_bundler::Pipeline;

use crate::cli::BuildArgs;
use crate::commands::utils;
use crate::error::Result;
use crate::ui;

/// Load the config, build every entry and write the output directory.
///
/// Cycles are reported as warnings; any stage failure aborts the build and
/// leaves the previous output directory contents in place.
pub async fn execute(args: BuildArgs) -> Result<()> {
    let started = Instant::now();
    let (config, cwd) = utils::load_config(&args.project)?;
    ui::info(&format!(
        "Building {} {} in {} mode",
        config.entry.len(),
        if config.entry.len() == 1 { "entry" } else { "entries" },
        config.mode.as_str()
    ));

    let pipeline = Pipeline::new(&config, &cwd)?;
    let output = pipeline.build().await?;

    for cycle in &output.report.cycles {
        let modules: Vec<String> = cycle
            .modules
            .iter()
            .map(|id| id.relative_to(pipeline.root()))
            .collect();
        ui::warning(&format!("Circular dependency: {}", modules.join(" -> ")));
    }

    if args.print_manifest {
        println!("{}", output.manifest.to_json()?);
    }
    ui::print_build_summary(&output.manifest, pipeline.out_dir(), started.elapsed());
    ui::success(&format!(
        "Built {} modules into {} chunks ({} written, {} unchanged)",
        output.report.graph.len(),
        output.chunks.len(),
        output.summary.written.len(),
        output.summary.skipped.len()
    ));
    Ok(())
}
