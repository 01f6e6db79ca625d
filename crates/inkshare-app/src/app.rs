//! Client session: wires pointer input, the transport and the renderer
//! around a single reconciler.

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use inkshare_core::{
    CanvasSocket, ConnectionState, HistoryError, InputState, PointerAction, PointerEvent, Reconciler,
    StrokeColor, SyncError, SyncEvent, Transport, decode_history,
};
use inkshare_render::{RasterRenderer, RenderContext, Renderer, RendererError};
use kurbo::{Point, Size};
use rand::SeedableRng;
use rand::rngs::StdRng;
use thiserror::Error;

use crate::config::AppConfig;
use crate::history::{self, HistorySource};
use crate::script::PointerScript;

/// Delay between iterations of the session loop.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

#[derive(Debug, Error)]
pub enum AppError {
    #[error("history request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("history endpoint returned {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("unsupported history source: {0}")]
    InvalidHistorySource(String),
    #[error("history decode failed: {0}")]
    History(#[from] HistoryError),
    #[error("pointer script line {line}: {source}")]
    Script {
        line: usize,
        source: serde_json::Error,
    },
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("transport error: {0}")]
    Sync(#[from] SyncError),
    #[error("render error: {0}")]
    Render(#[from] RendererError),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// A running client.
pub struct App<T: Transport> {
    config: AppConfig,
    reconciler: Reconciler,
    input: InputState,
    renderer: RasterRenderer,
    transport: Option<T>,
    rng: StdRng,
    frames: usize,
}

impl<T: Transport> App<T> {
    /// Create a client; without a transport it runs offline.
    pub fn new(config: AppConfig, transport: Option<T>) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            reconciler: Reconciler::new(config.user.clone()),
            input: InputState::new(Point::ZERO, config.throttle),
            renderer: RasterRenderer::new(config.width, config.height),
            transport,
            rng,
            frames: 0,
            config,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub fn renderer(&self) -> &RasterRenderer {
        &self.renderer
    }

    pub fn transport(&self) -> Option<&T> {
        self.transport.as_ref()
    }

    /// Number of frames rendered so far.
    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.transport
            .as_ref()
            .map_or(ConnectionState::Disconnected, Transport::state)
    }

    /// Replace the table with a decoded history body and redraw.
    pub fn load_history(&mut self, body: &str) -> Result<usize, AppError> {
        let strokes = decode_history(body)?;
        let count = strokes.len();
        self.reconciler.replace_all(strokes);
        self.redraw_if_dirty()?;
        Ok(count)
    }

    /// Feed one local pointer event through the local drawing path.
    ///
    /// Returns the number of points added to the table.
    pub fn handle_pointer(&mut self, event: &PointerEvent, now: Instant) -> Result<usize, AppError> {
        let actions = self.input.process(event, now);
        self.apply_actions(actions)
    }

    /// Emit a move the throttle held back once its interval has passed.
    pub fn tick_input(&mut self, now: Instant) -> Result<usize, AppError> {
        let actions = self.input.poll(now);
        self.apply_actions(actions)
    }

    fn apply_actions(
        &mut self,
        actions: impl IntoIterator<Item = PointerAction>,
    ) -> Result<usize, AppError> {
        let mut applied = 0;
        for action in actions {
            let rng = &mut self.rng;
            if self
                .reconciler
                .handle_pointer(action, || StrokeColor::random(rng))
                .is_some()
            {
                applied += 1;
            }
        }
        if applied > 0 {
            self.redraw_if_dirty()?;
            self.flush();
        }
        Ok(applied)
    }

    /// Drain transport events, applying each inbound delta as it arrives.
    ///
    /// Returns the number of deltas applied.
    pub fn poll(&mut self) -> Result<usize, AppError> {
        let Some(transport) = self.transport.as_mut() else {
            return Ok(0);
        };
        let events = transport.poll_events();

        let mut applied = 0;
        for event in events {
            match event {
                SyncEvent::Connected => log::info!("Canvas channel connected"),
                SyncEvent::Disconnected => log::info!("Canvas channel disconnected"),
                SyncEvent::Error { message } => log::error!("Canvas channel error: {}", message),
                SyncEvent::Message(text) => {
                    if self.reconciler.handle_message(&text).is_some() {
                        applied += 1;
                        self.redraw_if_dirty()?;
                    }
                }
            }
        }
        self.flush();
        Ok(applied)
    }

    /// Hand queued local deltas to the transport.
    ///
    /// Deltas wait while the connection is opening and are discarded when
    /// there is no live connection to send them on.
    pub fn flush(&mut self) {
        if !self.reconciler.has_outgoing() {
            return;
        }
        match &self.transport {
            Some(t) if t.state() == ConnectionState::Connecting => {}
            Some(t) if t.is_connected() => {
                for msg in self.reconciler.take_outgoing() {
                    if let Err(e) = t.send(&msg) {
                        log::warn!("Failed to send delta: {}", e);
                    }
                }
            }
            _ => {
                let dropped = self.reconciler.take_outgoing().len();
                log::debug!("Not connected, discarding {} outbound deltas", dropped);
            }
        }
    }

    /// Render the current table.
    pub fn redraw(&mut self) -> Result<(), AppError> {
        let ctx = RenderContext::new(
            self.reconciler.table(),
            Size::new(f64::from(self.config.width), f64::from(self.config.height)),
        )
        .with_background(self.config.background.into())
        .with_line_width(self.config.line_width);
        self.renderer.render(&ctx)?;
        self.frames += 1;
        Ok(())
    }

    fn redraw_if_dirty(&mut self) -> Result<(), AppError> {
        if self.reconciler.take_dirty() {
            self.redraw()?;
        }
        Ok(())
    }

    /// Run the session loop.
    ///
    /// Stops when the configured run time elapses, when the connection is
    /// lost, or, for an offline client, once the script has played out.
    pub fn run(&mut self, mut script: Option<PointerScript>) -> Result<(), AppError> {
        let start = Instant::now();
        loop {
            let elapsed = start.elapsed();
            if let Some(script) = script.as_mut() {
                for step in script.take_due(elapsed) {
                    self.handle_pointer(&step.event, start + step.offset())?;
                }
            }
            self.tick_input(Instant::now())?;
            self.poll()?;

            if self.should_stop(elapsed, script.as_ref()) {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
        self.flush();
        log::info!(
            "Session finished: {} strokes, {} points, {} frames",
            self.reconciler.table().len(),
            self.reconciler.table().point_count(),
            self.frames
        );
        Ok(())
    }

    fn should_stop(&self, elapsed: Duration, script: Option<&PointerScript>) -> bool {
        if self.config.run_for.is_some_and(|limit| elapsed >= limit) {
            return true;
        }
        match self.transport {
            Some(_) => matches!(
                self.connection_state(),
                ConnectionState::Disconnected | ConnectionState::Error
            ),
            None => script.is_none_or(PointerScript::is_finished),
        }
    }

    /// Write the final frame and, if configured, a history snapshot.
    pub fn export(&mut self) -> Result<(), AppError> {
        self.redraw()?;
        self.renderer.save_png(&self.config.output)?;
        log::info!("Wrote frame to {}", self.config.output.display());
        if let Some(path) = &self.config.snapshot {
            history::write_snapshot(path, self.reconciler.table())?;
        }
        Ok(())
    }
}

/// Run a full client session from `config`.
pub fn run(config: AppConfig) -> Result<(), AppError> {
    let script = config
        .script
        .as_deref()
        .map(PointerScript::load)
        .transpose()?;

    let history = match config.history.as_deref() {
        Some(source) => Some(HistorySource::parse(source)?),
        None => None,
    };
    let body = match history.map(|h| h.load()).transpose() {
        Ok(body) => body,
        Err(e) => {
            log::warn!("Starting without history: {}", e);
            None
        }
    };

    let transport = match config.server_url.as_deref() {
        Some(url) => {
            let mut ws = CanvasSocket::new();
            ws.connect(url)?;
            Some(ws)
        }
        None => None,
    };

    let mut app = App::new(config, transport);
    if let Some(body) = body {
        let count = app.load_history(&body)?;
        log::info!("Loaded {} strokes from history", count);
    }
    app.run(script)?;
    app.export()
}
