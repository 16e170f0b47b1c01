//! Live observation server.
//!
//! Exposes the two narrow interfaces the core hands to external
//! collaborators - the per-step report stream and the per-agent snapshot
//! list - plus the control surface, over HTTP. A driver task ticks the
//! simulator at render rate; the simulator's own clock gates simulated
//! steps, so the page refresh rate never changes epidemic timing.

mod assets;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse,
    },
    routing::{get, post},
    Json, Router,
};
use log::{error, info};
use serde::Serialize;
use tokio::{net::TcpListener, sync::broadcast};
use tokio_stream::{wrappers::BroadcastStream, Stream, StreamExt};

use crate::{
    config::{Scenario, SimConfig, CELL_SIZE},
    grid::{Occupant, Point},
    person::AgentSnapshot,
    simulator::{ReportData, RunState, Simulator},
};

/// How often the driver task offers the simulator a render tick.
const RENDER_TICK: Duration = Duration::from_millis(50);

#[derive(Clone)]
struct AppState {
    simulator: Arc<Mutex<Simulator>>,
    broadcaster: broadcast::Sender<String>,
    frames: Arc<Mutex<Vec<ReportData>>>,
}

#[derive(Serialize)]
struct StateEnvelope {
    scenario: Scenario,
    state: RunState,
    day: u32,
    grid_width: i32,
    grid_height: i32,
    cell_size: u32,
    report: ReportData,
}

#[derive(Serialize)]
struct AgentsEnvelope {
    agents: Vec<AgentSnapshot>,
    obstacles: Vec<Point>,
}

#[derive(Serialize)]
struct FramesEnvelope {
    frames: Vec<ReportData>,
}

pub struct WebServerConfig {
    pub config: SimConfig,
    pub host: String,
    pub port: u16,
}

pub async fn run(server: WebServerConfig) -> Result<()> {
    let WebServerConfig { config, host, port } = server;

    let mut simulator = Simulator::new(config)?;
    let (tx, _) = broadcast::channel::<String>(512);
    let frames: Arc<Mutex<Vec<ReportData>>> =
        Arc::new(Mutex::new(vec![simulator.latest_report()]));
    {
        let tx = tx.clone();
        let frames = frames.clone();
        simulator.set_report_hook(move |report| {
            frames.lock().expect("frames lock poisoned").push(*report);
            if let Ok(payload) = serde_json::to_string(report) {
                let _ = tx.send(payload);
            }
        });
    }
    let simulator = Arc::new(Mutex::new(simulator));

    let driver = simulator.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(RENDER_TICK);
        loop {
            ticker.tick().await;
            {
                let mut simulator = driver.lock().expect("simulator lock poisoned");
                simulator.tick();
            }
        }
    });

    let state = Arc::new(AppState {
        simulator,
        broadcaster: tx,
        frames,
    });

    let router = Router::new()
        .route("/", get(index))
        .route("/styles.css", get(styles))
        .route("/app.js", get(script))
        .route("/api/state", get(latest_state))
        .route("/api/agents", get(agent_snapshots))
        .route("/api/frames", get(all_frames))
        .route("/api/events", get(stream_events))
        .route("/api/control/start", post(control_start))
        .route("/api/control/pause", post(control_pause))
        .route("/api/control/restart", post(control_restart))
        .with_state(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", host, port))?;

    info!("epigrid live at http://{}:{} (Ctrl+C to stop)", host, port);

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("failed to listen for shutdown signal: {err}");
    }
    info!("shutting down observation server");
}

async fn index() -> Html<&'static str> {
    Html(assets::INDEX_HTML)
}

async fn styles() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/css; charset=utf-8")],
        assets::STYLES_CSS,
    )
}

async fn script() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/javascript; charset=utf-8")],
        assets::APP_JS,
    )
}

async fn latest_state(State(state): State<Arc<AppState>>) -> Json<StateEnvelope> {
    let simulator = state.simulator.lock().expect("simulator lock poisoned");
    Json(StateEnvelope {
        scenario: simulator.config().scenario,
        state: simulator.state(),
        day: simulator.day(),
        grid_width: simulator.grid().size_x(),
        grid_height: simulator.grid().size_y(),
        cell_size: CELL_SIZE,
        report: simulator.latest_report(),
    })
}

async fn agent_snapshots(State(state): State<Arc<AppState>>) -> Json<AgentsEnvelope> {
    let simulator = state.simulator.lock().expect("simulator lock poisoned");
    let obstacles = simulator
        .grid()
        .occupants()
        .filter_map(|(point, occupant)| matches!(occupant, Occupant::Obstacle).then_some(point))
        .collect();
    Json(AgentsEnvelope {
        agents: simulator.agents(),
        obstacles,
    })
}

async fn all_frames(State(state): State<Arc<AppState>>) -> Json<FramesEnvelope> {
    let frames = state.frames.lock().expect("frames lock poisoned").clone();
    Json(FramesEnvelope { frames })
}

async fn stream_events(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.broadcaster.subscribe();
    let stream = BroadcastStream::new(rx).filter_map(|msg| match msg {
        Ok(payload) => Some(Ok(Event::default().data(payload))),
        Err(_) => None,
    });
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(2))
            .text("keep-alive"),
    )
}

async fn control_start(State(state): State<Arc<AppState>>) -> StatusCode {
    state
        .simulator
        .lock()
        .expect("simulator lock poisoned")
        .start();
    StatusCode::NO_CONTENT
}

async fn control_pause(State(state): State<Arc<AppState>>) -> StatusCode {
    state
        .simulator
        .lock()
        .expect("simulator lock poisoned")
        .pause();
    StatusCode::NO_CONTENT
}

async fn control_restart(State(state): State<Arc<AppState>>) -> StatusCode {
    state.frames.lock().expect("frames lock poisoned").clear();
    state
        .simulator
        .lock()
        .expect("simulator lock poisoned")
        .restart();
    StatusCode::NO_CONTENT
}
