use std::{error::Error, process};

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use rc_core::{
    cli::{Cli, Commands, parse_args},
    depend::{order, Direction, OrderOptions},
    metadata::MetadataStore,
    runlevel::RunlevelRegistry,
    settings::load_settings,
    state::StateStore,
    transition::TransitionDriver,
};

fn main() -> Result<(), Box<dyn Error>> {
    let args = parse_args();
    init_logging(&args);

    let settings = load_settings(args.settings.as_deref())?;
    let paths = settings.to_paths();
    paths.ensure_dirs()?;

    ctrlc::set_handler(|| {
        info!("received interrupt, exiting (in-flight scripts are not killed)");
        process::exit(130);
    })?;

    match run(args.command, &paths) {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("{e}");
            process::exit(1);
        }
    }
}

fn run(command: Commands, paths: &rc_core::paths::Paths) -> Result<(), Box<dyn Error>> {
    match command {
        Commands::Order { runlevel, stop, force_cache } => {
            let parser = rc_core::depend::DependencyParser::new(paths);
            parser.update(force_cache)?;
            let tree = parser.load()?;

            let registry = RunlevelRegistry::new(paths);
            if !registry.exists(&runlevel) {
                return Err(format!("unknown runlevel '{runlevel}'").into());
            }
            let seeds = registry.services_in_runlevel(&runlevel)?;
            let direction = if stop { Direction::Stop } else { Direction::Start };
            let ordered = order(&tree, &seeds, direction, OrderOptions::default());
            for service in ordered {
                println!("{service}");
            }
        }

        Commands::State { service } => {
            let state = StateStore::new(paths.clone()).get_state(&service)?;
            println!("{}: {}", service, state.primary.as_ref());
            if state.flags.failed {
                println!("  failed");
            }
            if state.flags.scheduled {
                println!("  scheduled");
            }
            if state.flags.was_inactive {
                println!("  was-inactive");
            }
            if state.flags.coldplugged {
                println!("  coldplugged");
            }
            let crashed = MetadataStore::new(paths.clone()).crashed(&service)?;
            if crashed {
                println!("  crashed (recorded daemon has no live process)");
            }
        }

        Commands::Services { state } => {
            let parsed = state
                .parse::<rc_core::state::ServiceState>()
                .map_err(|_| format!("unknown state or flag '{state}'"))?;
            for service in StateStore::new(paths.clone()).services_in_state(parsed)? {
                println!("{service}");
            }
        }

        Commands::Runlevels => {
            for runlevel in RunlevelRegistry::new(paths).runlevels()? {
                println!("{runlevel}");
            }
        }

        Commands::UpdateCache { force } => {
            let parser = rc_core::depend::DependencyParser::new(paths);
            let rebuilt = parser.update(force)?;
            println!("{}", if rebuilt { "rebuilt" } else { "already fresh" });
        }

        Commands::Transition { runlevel } => {
            let parser = rc_core::depend::DependencyParser::new(paths);
            let tree = parser.load()?;
            let driver = TransitionDriver::new(paths.clone());
            let report = driver.transition_to(&runlevel, &tree)?;
            for (service, outcome) in &report.stopped {
                println!("stopped {service}: {outcome:?}");
            }
            for (service, outcome) in &report.started {
                println!("started {service}: {outcome:?}");
            }
        }
    }

    Ok(())
}

fn init_logging(args: &Cli) {
    let filter = if let Some(level) = args.log_level {
        EnvFilter::new(level.as_str())
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
