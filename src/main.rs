// SPDX-License-Identifier: MPL-2.0
//! Demo: scrolls a page of deferred regions backed by flaky factories.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use lazy_mount::config::{self, Config};
use lazy_mount::diagnostics::DiagnosticsCollector;
use lazy_mount::domain::visibility::Bounds;
use lazy_mount::error::{Error, ModuleError, Result};
use lazy_mount::loader::{LoaderCache, ModuleFactory};
use lazy_mount::mount::{DeferredMount, MountOptions, Placement};
use lazy_mount::visibility::VisibilityTrigger;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const HELP: &str = "\
lazy_mount - deferred module loading demo

USAGE:
  lazy_mount [OPTIONS]

OPTIONS:
  --config <path>     Settings file (default: platform config dir)
  --retries <n>       Retries after the first failed attempt
  --delay-ms <ms>     Backoff base delay in milliseconds
  --fail-first <n>    Fail the first n invocations of every factory [default: 1]
  --regions <n>       Number of deferred regions on the page [default: 6]
  --export <path>     Write the diagnostics report as JSON
  -h, --help          Print help
";

/// Distinct modules shared by the regions.
const MODULES: usize = 3;
const VIEWPORT_WIDTH: f32 = 800.0;
const VIEWPORT_HEIGHT: f32 = 600.0;
const REGION_HEIGHT: f32 = 400.0;
const REGION_SPACING: f32 = 700.0;
const SCROLL_STEP: f32 = 300.0;
const SCROLL_PAUSE: Duration = Duration::from_millis(100);
const LOAD_LATENCY: Duration = Duration::from_millis(150);

struct Args {
    config: Option<PathBuf>,
    retries: Option<u32>,
    delay_ms: Option<u64>,
    fail_first: u32,
    regions: usize,
    export: Option<PathBuf>,
}

fn parse_args() -> std::result::Result<Option<Args>, pico_args::Error> {
    let mut args = pico_args::Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        return Ok(None);
    }

    Ok(Some(Args {
        config: args.opt_value_from_str("--config")?,
        retries: args.opt_value_from_str("--retries")?,
        delay_ms: args.opt_value_from_str("--delay-ms")?,
        fail_first: args.opt_value_from_str("--fail-first")?.unwrap_or(1),
        regions: args.opt_value_from_str("--regions")?.unwrap_or(6),
        export: args.opt_value_from_str("--export")?,
    }))
}

fn load_config(args: &Args) -> Config {
    let mut config = match &args.config {
        Some(path) => config::load_from_path(path).unwrap_or_else(|err| {
            warn!(path = %path.display(), %err, "config unusable, using defaults");
            Config::default()
        }),
        None => {
            let (config, warning) = config::load();
            if let Some(warning) = warning {
                warn!(%warning, "using default config");
            }
            config
        }
    };

    if args.retries.is_some() {
        config.loader.retries = args.retries;
    }
    if args.delay_ms.is_some() {
        config.loader.delay_ms = args.delay_ms;
    }
    config
}

/// Factory that fails its first `fail_first` invocations.
fn flaky_factory(name: String, fail_first: u32) -> ModuleFactory<String> {
    let calls = Arc::new(AtomicU32::new(0));
    ModuleFactory::keyed(name.clone(), move || {
        let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
        let name = name.clone();
        async move {
            tokio::time::sleep(LOAD_LATENCY).await;
            if call <= fail_first {
                Err(ModuleError::new(format!(
                    "{name}: simulated network error (call {call})"
                )))
            } else {
                Ok(format!("{name} ready after {call} call(s)"))
            }
        }
    })
}

#[allow(clippy::cast_precision_loss)]
async fn run(args: Args) -> Result<()> {
    let config = load_config(&args);
    let mut collector = DiagnosticsCollector::new(config.event_capacity());

    let cache = Arc::new(
        LoaderCache::new(config.cache_config()).with_diagnostics(collector.handle()),
    );
    let trigger = VisibilityTrigger::with_viewport(Bounds::new(
        0.0,
        0.0,
        VIEWPORT_WIDTH,
        VIEWPORT_HEIGHT,
    ))
    .with_diagnostics(collector.handle());

    let factories: Vec<_> = (0..MODULES)
        .map(|i| flaky_factory(format!("module-{i}"), args.fail_first))
        .collect();

    let options = MountOptions::from_config(&config);
    let mut mounts: Vec<DeferredMount<String>> = (0..args.regions)
        .map(|i| {
            let region = Bounds::new(
                0.0,
                REGION_SPACING * i as f32,
                VIEWPORT_WIDTH,
                REGION_HEIGHT,
            );
            DeferredMount::mount(
                Arc::clone(&cache),
                &trigger,
                region,
                factories[i % MODULES].clone(),
                options.clone(),
            )
        })
        .collect();

    info!(
        regions = args.regions,
        retries = options.retry.retries.value(),
        delay_ms = options.retry.base_delay.as_millis(),
        "scrolling"
    );

    let page_height = REGION_SPACING * args.regions as f32;
    let mut y = 0.0;
    while y < page_height {
        let fired = trigger.update_viewport(Bounds::new(0.0, y, VIEWPORT_WIDTH, VIEWPORT_HEIGHT));
        if fired > 0 {
            info!(y, fired, "regions triggered");
        }
        for mount in &mut mounts {
            mount.tick();
        }
        tokio::time::sleep(SCROLL_PAUSE).await;
        y += SCROLL_STEP;
    }

    for mount in &mut mounts {
        let phase = mount.settled().await;
        let shown = match mount.placement() {
            Placement::Module(view) => view.to_string(),
            Placement::Error(error) => format!("error: {error}"),
            Placement::Fallback(fallback) => format!("fallback {:?}", fallback.kind()),
        };
        println!(
            "{:>10}  {:<9}  {}",
            mount.region().to_string(),
            phase.as_str(),
            shown
        );
    }

    let stats = cache.stats();
    println!(
        "cache: {} entries, {} hits, {} misses, {:.1}% hit rate",
        stats.entries,
        stats.hits,
        stats.misses,
        stats.hit_rate()
    );

    collector.process_pending();
    if let Some(path) = &args.export {
        let written = collector.export_to_file(path)?;
        info!(path = %written.display(), events = collector.len(), "diagnostics exported");
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let Some(args) = parse_args().map_err(|err| Error::Config(err.to_string()))? else {
        print!("{HELP}");
        return Ok(());
    };
    run(args).await
}
