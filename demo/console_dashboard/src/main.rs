mod config;
use config::DashboardConfig;
use iopanel_core::{ClickAction, Dashboard, DisplayState, Widget};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, Interval};
use tracing::{debug, error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Logging / tracing
    let filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,iopanel_core=info,console_dashboard=info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    // Defaults + env + optional TOML overlay
    let cfg = DashboardConfig::load();
    info!(
        target: "console_dashboard",
        base_url = %cfg.client.base_url,
        api = ?cfg.client.api,
        widgets = cfg.widgets.len(),
        "Starting console dashboard"
    );

    let mut dashboard = Dashboard::connect(&cfg.client)?;
    for spec in &cfg.widgets {
        // A misconfigured widget is skipped; the rest of the page still loads
        if let Err(e) = dashboard.add(spec.kind, &spec.attributes) {
            error!(target: "console_dashboard", kind = %spec.kind, error = %e, "Widget not created");
        }
    }

    let watchers = spawn_watchers(&dashboard);
    dashboard.attach_all().await;
    print_help();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut ticker = (cfg.snapshot_interval_ms > 0)
        .then(|| interval(Duration::from_millis(cfg.snapshot_interval_ms)));

    loop {
        tokio::select! {
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => {
                    if !handle_command(&dashboard, line.trim()).await {
                        break;
                    }
                }
                Ok(None) => {
                    // Detached from a terminal: keep running until ctrl-c
                    stdin_open = false;
                }
                Err(e) => {
                    warn!(target: "console_dashboard", error = %e, "stdin read failed");
                    stdin_open = false;
                }
            },
            _ = next_tick(&mut ticker) => print_snapshot(&dashboard),
            _ = signal::ctrl_c() => {
                info!(target: "console_dashboard", "Shutting down...");
                break;
            }
        }
    }

    for watcher in watchers {
        watcher.abort();
    }
    dashboard.dispose_all();
    Ok(())
}

/// Returns false when the user asked to quit
async fn handle_command(dashboard: &Dashboard, line: &str) -> bool {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (None, _) => {}
        (Some("quit" | "exit" | "q"), _) => return false,
        (Some("help" | "?"), _) => print_help(),
        (Some("snapshot" | "s"), _) => print_snapshot(dashboard),
        (Some("toggle" | "t"), Some(num)) => match num.parse() {
            Ok(num) => match dashboard.click_output(num).await {
                Ok(ClickAction::Ignore) => {
                    println!("output {} busy, click ignored", num)
                }
                Ok(action) => debug!(target: "console_dashboard", num, ?action, "Clicked"),
                Err(e) => println!("{}", e),
            },
            Err(_) => println!("not a channel number: {}", num),
        },
        _ => println!("unknown command: {}", line),
    }
    true
}

/// One task per widget printing its changes
fn spawn_watchers(dashboard: &Dashboard) -> Vec<JoinHandle<()>> {
    dashboard
        .widgets()
        .iter()
        .map(|widget| {
            let label = label(widget);
            match widget {
                Widget::DigitalInput(w) => spawn_state_watcher(label, w.watch()),
                Widget::DigitalOutput(w) => spawn_state_watcher(label, w.watch()),
                Widget::AnalogInput(w) => {
                    let mut rx = w.watch();
                    tokio::spawn(async move {
                        while rx.changed().await.is_ok() {
                            let path = rx.borrow_and_update().clone();
                            debug!(target: "console_dashboard", widget = %label, trend = %path, "Trend");
                        }
                    })
                }
            }
        })
        .collect()
}

fn spawn_state_watcher(
    label: String,
    mut rx: tokio::sync::watch::Receiver<DisplayState>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while rx.changed().await.is_ok() {
            let state = *rx.borrow_and_update();
            println!("{:<24} {}", label, state.class());
        }
    })
}

fn label(widget: &Widget) -> String {
    match widget.name() {
        Some(name) => format!("{} ({} #{})", name, widget.kind(), widget.num()),
        None => format!("{} #{}", widget.kind(), widget.num()),
    }
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(t) => {
            t.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

fn print_snapshot(dashboard: &Dashboard) {
    let snapshot = dashboard.snapshot();
    println!("--- {} ---", snapshot.taken_at.format("%H:%M:%S"));
    for (widget, view) in dashboard.widgets().iter().zip(&snapshot.widgets) {
        match (view.state, view.latest) {
            (Some(state), _) => println!("{:<24} {}", label(widget), state.class()),
            (None, Some(latest)) => println!("{:<24} {:.1}", label(widget), latest),
            (None, None) => println!("{:<24} (no samples)", label(widget)),
        }
    }
    let stats = dashboard.events().stats();
    println!(
        "events: {} frames, {} delivered, {} malformed",
        stats.frames_received, stats.events_delivered, stats.malformed_dropped
    );
}

fn print_help() {
    println!("commands: toggle <n> | snapshot | help | quit");
}
