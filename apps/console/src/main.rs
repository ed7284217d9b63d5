use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    gesture, CoexGateway, GatewayConfig, PanelError, PanelEvent, PanelSession, ScreenGateway,
};
use shared::domain::{
    canvas_extent, DisplayMode, InputId, InputSource, LayerDraft, LayerId, Position, PresetId,
    ScreenId, Size,
};
use tokio::sync::broadcast;

mod config;
mod status;

#[derive(Parser, Debug)]
#[command(
    name = "coex-console",
    about = "Operator console for Novastar COEX LED-display controllers"
)]
struct Args {
    /// Controller host; overrides console.toml and COEX_HOST.
    #[arg(long)]
    host: Option<String>,
    /// Controller port; overrides console.toml and COEX_PORT.
    #[arg(long)]
    port: Option<u16>,
    /// Screen id hint, e.g. "{7e9cd858-...}". Usually discovered from the
    /// controller itself.
    #[arg(long)]
    screen: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Connection check plus a snapshot summary.
    Status,
    /// Keep refreshing and print layout changes as they happen.
    Watch,
    /// List controller input sources.
    Inputs,
    /// List presets.
    Presets,
    /// Apply a preset.
    Preset { id: i64 },
    /// Device health: temperature, voltage, fans.
    Monitor,
    /// Set screen brightness (0-100).
    Brightness {
        #[arg(value_parser = clap::value_parser!(u8).range(0..=100))]
        value: u8,
    },
    /// Set screen gamma (1.0-4.0).
    Gamma { value: f32 },
    /// Set display mode: normal, freeze or blackout.
    Mode { mode: String },
    /// Set screen color temperature in Kelvin.
    ColorTemp { kelvin: u32 },
    /// Layer operations.
    #[command(subcommand)]
    Layer(LayerCommand),
}

#[derive(Subcommand, Debug)]
enum LayerCommand {
    /// Create a layer.
    Add {
        #[arg(long, default_value_t = 100)]
        x: i32,
        #[arg(long, default_value_t = 100)]
        y: i32,
        #[arg(long, default_value_t = 400)]
        width: u32,
        #[arg(long, default_value_t = 300)]
        height: u32,
        #[arg(long)]
        input: Option<i64>,
        #[arg(long)]
        name: Option<String>,
    },
    /// Move a layer to an absolute position.
    Move { id: i64, x: i32, y: i32 },
    /// Resize a layer.
    Resize { id: i64, width: u32, height: u32 },
    /// Nudge a layer by a pixel offset.
    Nudge { id: i64, dx: i32, dy: i32 },
    /// Bring a layer to the front.
    Front { id: i64 },
    /// Send a layer to the back.
    Back { id: i64 },
    /// Bind a layer to an input source.
    Input { id: i64, input: i64 },
    /// Delete a layer.
    Delete { id: i64 },
    /// Auto-arrange layers in rows across the canvas.
    Arrange,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut settings = config::load_settings();
    if let Some(host) = args.host {
        settings.host = host;
    }
    if let Some(port) = args.port {
        settings.port = port;
    }
    if let Some(screen) = args.screen {
        settings.screen_id = Some(screen);
    }

    let gateway_config = GatewayConfig::for_host(&settings.host, settings.port)
        .context("invalid controller address")?
        .with_timeout(Duration::from_secs(settings.request_timeout_secs));
    let gateway: Arc<dyn ScreenGateway> = Arc::new(CoexGateway::new(gateway_config)?);
    let hint = settings.screen_id.clone().map(ScreenId::new);

    let session = match PanelSession::connect(gateway, hint).await {
        Ok(session) => session,
        Err(failure) => {
            eprintln!(
                "{}",
                status::status_line(&format!(
                    "Connection to {}:{} failed: {}",
                    settings.host,
                    settings.port,
                    status::describe_failure(&failure)
                ))
            );
            std::process::exit(1);
        }
    };
    println!(
        "{}",
        status::status_line(&format!(
            "Connected to {}:{} (screen {})",
            settings.host,
            settings.port,
            session.screen()
        ))
    );

    run(args.command, &session, &settings).await
}

async fn run(command: Command, session: &Arc<PanelSession>, settings: &config::Settings) -> Result<()> {
    let mut events = session.subscribe_events();
    match command {
        Command::Status => print_status(session).await?,
        Command::Watch => watch(session, settings).await,
        Command::Inputs => print_inputs(session).await?,
        Command::Presets => {
            for preset in session.list_presets().await.map_err(describe)? {
                println!("  [{}] {}", preset.id.0, preset.name);
            }
        }
        Command::Preset { id } => {
            session
                .apply_preset(PresetId(id))
                .await
                .map_err(describe)?;
        }
        Command::Monitor => print_monitoring(session).await?,
        Command::Brightness { value } => {
            session.set_brightness(value).await.map_err(describe)?;
        }
        Command::Gamma { value } => {
            if !(1.0..=4.0).contains(&value) {
                bail!("gamma must be between 1.0 and 4.0");
            }
            session.set_gamma(value).await.map_err(describe)?;
        }
        Command::Mode { mode } => {
            let mode: DisplayMode = mode.parse().map_err(anyhow::Error::msg)?;
            session.set_display_mode(mode).await.map_err(describe)?;
        }
        Command::ColorTemp { kelvin } => {
            session
                .set_color_temperature(kelvin)
                .await
                .map_err(describe)?;
        }
        Command::Layer(layer_command) => run_layer(layer_command, session, settings).await?,
    }

    drain_events(&mut events);
    Ok(())
}

async fn run_layer(
    command: LayerCommand,
    session: &Arc<PanelSession>,
    settings: &config::Settings,
) -> Result<()> {
    match command {
        LayerCommand::Add {
            x,
            y,
            width,
            height,
            input,
            name,
        } => {
            let draft = LayerDraft {
                name,
                position: gesture::clamp_position(Position::new(x, y)),
                size: gesture::clamp_size(Size::new(width, height), settings.min_layer_size),
                z_order: session.next_z_order().await,
                input: input.map(InputId),
            };
            session.create_layer(draft).await.map_err(describe_panel)?;
        }
        LayerCommand::Move { id, x, y } => {
            session
                .move_layer(LayerId(id), gesture::clamp_position(Position::new(x, y)))
                .await
                .map_err(describe_panel)?;
        }
        LayerCommand::Resize { id, width, height } => {
            session
                .resize_layer(
                    LayerId(id),
                    gesture::clamp_size(Size::new(width, height), settings.min_layer_size),
                )
                .await
                .map_err(describe_panel)?;
        }
        LayerCommand::Nudge { id, dx, dy } => {
            session
                .apply_intent(gesture::GestureTranslator::nudge(LayerId(id), dx, dy))
                .await
                .map_err(describe_panel)?;
        }
        LayerCommand::Front { id } => {
            session
                .bring_to_front(LayerId(id))
                .await
                .map_err(describe_panel)?;
        }
        LayerCommand::Back { id } => {
            session
                .send_to_back(LayerId(id))
                .await
                .map_err(describe_panel)?;
        }
        LayerCommand::Input { id, input } => {
            session
                .switch_input(LayerId(id), InputId(input))
                .await
                .map_err(describe_panel)?;
        }
        LayerCommand::Delete { id } => {
            session
                .delete_layer(LayerId(id))
                .await
                .map_err(describe_panel)?;
        }
        LayerCommand::Arrange => {
            let snapshot = session.refresh().await.map_err(describe)?;
            let extent = canvas_extent(&snapshot.cabinets);
            let canvas_width = if extent.width > 0 { extent.width } else { 1920 };
            session
                .arrange_layers(canvas_width, 20)
                .await
                .map_err(describe_panel)?;
        }
    }
    Ok(())
}

async fn print_status(session: &Arc<PanelSession>) -> Result<()> {
    let screen = session.refresh().await.map_err(describe)?;
    let sources = session.list_input_sources().await.unwrap_or_default();
    let extent = canvas_extent(&screen.cabinets);

    println!(
        "Screen {} - mode {}, brightness {}%, gamma {:.1}",
        screen.id, screen.display_mode, screen.brightness, screen.gamma
    );
    if extent.width > 0 {
        println!(
            "Canvas: {}x{} ({} cabinets)",
            extent.width,
            extent.height,
            screen.cabinets.len()
        );
    } else {
        println!("Canvas: N/A");
    }

    let layers = session.layers().await;
    if layers.is_empty() {
        println!("No active layers");
        return Ok(());
    }
    println!("Layers ({}):", layers.len());
    for layer in layers {
        let input = layer
            .input
            .and_then(|id| sources.iter().find(|source| source.id == id))
            .map(InputSource::label)
            .unwrap_or_else(|| "No Input".to_string());
        let name = layer.name.as_deref().unwrap_or("");
        let lock = if layer.locked { " (locked)" } else { "" };
        println!(
            "  [{}] {} {}x{} @ ({}, {}) z={} - {}{}",
            layer.id.0,
            name,
            layer.size.width,
            layer.size.height,
            layer.position.x,
            layer.position.y,
            layer.z_order,
            input,
            lock
        );
    }
    Ok(())
}

async fn print_inputs(session: &Arc<PanelSession>) -> Result<()> {
    let sources = session.list_input_sources().await.map_err(describe)?;
    if sources.is_empty() {
        println!("No input sources");
        return Ok(());
    }
    for source in sources {
        println!(
            "  [{}] {} - {} {} ({:?})",
            source.id.0,
            source.label(),
            source.kind.as_deref().unwrap_or("Unknown"),
            source.resolution.as_deref().unwrap_or("N/A"),
            source.status
        );
    }
    Ok(())
}

async fn print_monitoring(session: &Arc<PanelSession>) -> Result<()> {
    let monitoring = session.fetch_monitoring().await.map_err(describe)?;
    let fmt_f32 = |v: Option<f32>, unit: &str| match v {
        Some(v) => format!("{v:.1}{unit}"),
        None => "N/A".to_string(),
    };
    println!(
        "Temperature: {}  Voltage: {}  Fan: {}",
        fmt_f32(monitoring.temperature_celsius, " °C"),
        fmt_f32(monitoring.voltage, " V"),
        monitoring
            .fan_rpm
            .map(|rpm| format!("{rpm} rpm"))
            .unwrap_or_else(|| "N/A".to_string())
    );
    Ok(())
}

async fn watch(session: &Arc<PanelSession>, settings: &config::Settings) {
    session
        .spawn_auto_refresh(Duration::from_millis(settings.refresh_interval_ms))
        .await;
    let mut events = session.subscribe_events();
    loop {
        match events.recv().await {
            Ok(event) => print_event(&event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                eprintln!(
                    "{}",
                    status::status_line(&format!("{skipped} events dropped"))
                );
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn drain_events(events: &mut broadcast::Receiver<PanelEvent>) {
    while let Ok(event) = events.try_recv() {
        print_event(&event);
    }
}

fn print_event(event: &PanelEvent) {
    match event {
        PanelEvent::Status(message) => println!("{}", status::status_line(message)),
        PanelEvent::ActionFailed { action, failure } => eprintln!(
            "{}",
            status::status_line(&format!("{action}: {}", status::describe_failure(failure)))
        ),
        PanelEvent::SnapshotApplied {
            screen,
            layer_count,
        } => println!(
            "{}",
            status::status_line(&format!("Screen {screen}: {layer_count} layers"))
        ),
        PanelEvent::LayerChanged(layer) => println!(
            "{}",
            status::status_line(&format!(
                "Layer {}: {}x{} @ ({}, {}) z={}",
                layer.id.0,
                layer.size.width,
                layer.size.height,
                layer.position.x,
                layer.position.y,
                layer.z_order
            ))
        ),
        PanelEvent::LayerRemoved(id) => println!(
            "{}",
            status::status_line(&format!("Layer {} removed", id.0))
        ),
    }
}

fn describe(failure: shared::error::Failure) -> anyhow::Error {
    anyhow::Error::msg(status::describe_failure(&failure))
}

fn describe_panel(err: PanelError) -> anyhow::Error {
    match err {
        PanelError::Gateway(failure) => describe(failure),
        other => anyhow::Error::msg(other.to_string()),
    }
}
