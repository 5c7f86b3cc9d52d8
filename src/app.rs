//! Command dispatch for the `mipcache` binary.

use std::io::{self, Write};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::cache::mipmap_level;
use crate::cli::{Cli, Commands, LevelsArgs, SweepArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::logging::init_logging;
use crate::output::{self, SweepOutput};
use crate::project::ProjectManifest;
use crate::signal::{install_handler, ShutdownHandler};
use crate::stale::{Reconciler, SweepOptions, SweepReport};

/// Run the command selected on the command line.
///
/// # Errors
///
/// Returns an error when the configuration or manifest can't be loaded,
/// or when output can't be written. Failed removals are not errors; they
/// are reported through [`ExitCode::PartialSuccess`], and a Ctrl+C during a
/// sweep through [`ExitCode::Interrupted`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    init_logging(cli.verbose, cli.quiet);

    let config = Config::load(cli.config.as_deref())?;
    log::debug!("Effective config: {:?}", config);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    match cli.command {
        Commands::Sweep(args) => run_sweep(&args, &config, &install_handler(), &mut out),
        Commands::Levels(args) => run_levels(&args, &config, &mut out),
        Commands::Config => {
            out.write_all(config.to_toml()?.as_bytes())?;
            Ok(ExitCode::Success)
        }
    }
}

/// Sweep the kinds selected in `args` and write the reports.
///
/// # Errors
///
/// Returns an error if the manifest can't be loaded, a sweep can't start,
/// or writing fails.
pub fn run_sweep<W: Write>(
    args: &SweepArgs,
    config: &Config,
    shutdown: &ShutdownHandler,
    out: &mut W,
) -> Result<ExitCode> {
    let project = ProjectManifest::load(&args.manifest)?;
    log::info!(
        "Loaded {} patches from {}",
        project.patch_count(),
        args.manifest.display()
    );

    let mut options = SweepOptions::from(&config.sweep);
    if let Some(workers) = args.workers {
        options.workers = Some(workers);
    }
    if let Some(secs) = args.drain_timeout {
        options.drain_timeout = Duration::from_secs(secs);
    }
    let reconciler = Reconciler::new(options).with_shutdown_flag(shutdown.flag());

    let reports = args
        .kind
        .selectors()
        .iter()
        .map(|selector| {
            let kind = selector.kind();
            reconciler
                .sweep_kind(&project, kind)
                .with_context(|| format!("{} sweep failed to start", kind.name()))
        })
        .collect::<Result<Vec<SweepReport>>>()?;

    if shutdown.is_shutdown_requested() {
        log::warn!("Sweep interrupted, reporting what finished");
    }
    if args.json {
        SweepOutput::new(&reports).write_to(out)?;
    } else {
        output::write_sweep_text(&reports, out)?;
    }
    Ok(output::exit_code_for(&reports))
}

/// Print the pyramid of the image described by `args`.
///
/// # Errors
///
/// Returns an error if writing fails.
pub fn run_levels<W: Write>(args: &LevelsArgs, config: &Config, out: &mut W) -> Result<ExitCode> {
    let plan = output::pyramid_plan(args.width, args.height);
    let largest = f64::from(args.width.max(args.height));
    let selected = mipmap_level(args.magnification, largest);
    if selected.is_none() {
        log::warn!(
            "Magnification {} is not positive, no level selected",
            args.magnification
        );
    }
    let budget = args.max_bytes.unwrap_or_else(|| config.cache.budget());

    output::write_levels_text(&plan, selected, budget, out)?;
    Ok(ExitCode::Success)
}
