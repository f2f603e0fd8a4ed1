//! drmprime-wayland probe
//!
//! Acts as a minimal host: connects to a compositor, creates a main
//! surface, brings up the DRM-PRIME overlay below it and reports what
//! the compositor supports. Useful to check a session before pointing a
//! player at it.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::EnvFilter;
use wayland_client::{
    delegate_noop,
    protocol::{wl_compositor, wl_registry, wl_surface},
    Connection, Dispatch, QueueHandle,
};

use drmprime_wayland::formats::FourccName;
use drmprime_wayland::{
    DrmPrimeWayland, HwdecDriver, ModifierPolicy, OverlayConfig, Rect, WaylandHost,
    WaylandInteropParams,
};

#[derive(Parser, Debug)]
#[command(name = "drmprime-wayland-probe")]
#[command(about = "Check whether a compositor can present DRM-PRIME frames on a subsurface")]
struct Args {
    /// Wayland display to connect to (defaults to $WAYLAND_DISPLAY)
    #[arg(short, long)]
    display: Option<String>,

    /// Modifier sent with each plane
    #[arg(long, value_enum, default_value_t = ModifierPolicy::Linear)]
    modifiers: ModifierPolicy,

    /// Don't warn about formats the compositor did not advertise
    #[arg(long)]
    no_format_check: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Globals the host side of the probe needs
#[derive(Default)]
struct HostState {
    compositor: Option<wl_compositor::WlCompositor>,
}

impl Dispatch<wl_registry::WlRegistry, ()> for HostState {
    fn event(
        state: &mut Self,
        registry: &wl_registry::WlRegistry,
        event: wl_registry::Event,
        _: &(),
        _: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        if let wl_registry::Event::Global { name, interface, version } = event {
            if interface == "wl_compositor" {
                state.compositor = Some(registry.bind(name, version.min(4), qh, ()));
            }
        }
    }
}

delegate_noop!(HostState: ignore wl_compositor::WlCompositor);
delegate_noop!(HostState: ignore wl_surface::WlSurface);

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase())),
        )
        .with_target(false)
        .init();

    if let Some(display) = &args.display {
        std::env::set_var("WAYLAND_DISPLAY", display);
    }

    let conn = Connection::connect_to_env().context("Failed to connect to Wayland display")?;
    let mut queue = conn.new_event_queue();
    let qh = queue.handle();
    let mut host_state = HostState::default();

    let _registry = conn.display().get_registry(&qh, ());
    queue.roundtrip(&mut host_state)?;

    let compositor = host_state
        .compositor
        .clone()
        .context("No wl_compositor found")?;
    let main_surface = compositor.create_surface(&qh, ());
    main_surface.commit();
    queue.roundtrip(&mut host_state)?;

    let host = WaylandHost::new(Some(WaylandInteropParams::new(
        conn.clone(),
        compositor,
        main_surface.clone(),
    )));

    let mut driver = DrmPrimeWayland::new(OverlayConfig {
        modifier_policy: args.modifiers,
        check_formats: !args.no_format_check,
    });
    driver
        .init(&host)
        .context("DRM-PRIME overlay is not available on this compositor")?;

    if let Some(bridge) = driver.bridge() {
        let formats = bridge.formats();
        if formats.is_empty() {
            warn!("Compositor advertised no dmabuf formats");
        }
        for format in formats.iter() {
            let modifiers = formats.modifiers(format);
            if modifiers.is_empty() {
                info!("  {}", FourccName(format));
            } else {
                info!("  {} ({} modifiers)", FourccName(format), modifiers.len());
            }
        }
    }

    // Exercise the detach path the player uses on flush
    let rect = Rect::default();
    HwdecDriver::<WaylandHost>::overlay_frame(&mut driver, None, &rect, &rect, false)
        .context("Failed to clear the overlay")?;

    HwdecDriver::<WaylandHost>::uninit(&mut driver);
    main_surface.destroy();
    queue.roundtrip(&mut host_state)?;

    info!("Overlay probe finished");
    Ok(())
}
