//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use inkshare_core::{DEFAULT_THROTTLE, StrokeColor};
use inkshare_render::MAX_LINE_WIDTH;
use rand::Rng;

/// WebSocket route of the canvas channel.
pub const CANVAS_ROUTE: &str = "ws/canvas";
/// REST route returning recorded strokes.
pub const HISTORY_ROUTE: &str = "canvas/messages";

#[derive(Parser, Debug)]
#[command(name = "inkshare", version, about = "Headless shared-canvas drawing client")]
pub struct Args {
    /// Username; a random guest name is picked when absent.
    #[arg(long, env = "INKSHARE_USER")]
    pub user: Option<String>,

    /// Server host (`host:port`) to derive the canvas and history endpoints from.
    #[arg(long, env = "INKSHARE_HOST")]
    pub host: Option<String>,

    /// Use `wss`/`https` for endpoints derived from `--host`.
    #[arg(long, env = "INKSHARE_SECURE")]
    pub secure: bool,

    /// Canvas WebSocket URL; overrides the one derived from `--host`.
    #[arg(long, env = "INKSHARE_SERVER")]
    pub server: Option<String>,

    /// History source: an http(s) URL or a snapshot file.
    #[arg(long, env = "INKSHARE_HISTORY")]
    pub history: Option<String>,

    /// Pointer script to replay (JSON lines).
    #[arg(long, env = "INKSHARE_SCRIPT")]
    pub script: Option<PathBuf>,

    #[arg(long, env = "INKSHARE_WIDTH", default_value_t = 800)]
    pub width: u32,

    #[arg(long, env = "INKSHARE_HEIGHT", default_value_t = 600)]
    pub height: u32,

    #[arg(long, env = "INKSHARE_BACKGROUND", default_value = "#ffffff")]
    pub background: StrokeColor,

    /// Stroke width in pixels.
    #[arg(long, env = "INKSHARE_LINE_WIDTH", default_value_t = 1.0, value_parser = parse_line_width)]
    pub line_width: f64,

    /// Minimum spacing between local move deltas, in milliseconds.
    #[arg(long, env = "INKSHARE_THROTTLE_MS", default_value_t = DEFAULT_THROTTLE.as_millis() as u64)]
    pub throttle_ms: u64,

    /// Stop after this many milliseconds.
    #[arg(long, env = "INKSHARE_DURATION_MS")]
    pub duration_ms: Option<u64>,

    /// Where the final frame is written.
    #[arg(long, env = "INKSHARE_OUTPUT", default_value = "canvas.png")]
    pub output: PathBuf,

    /// Where to write a JSON history snapshot of the final table.
    #[arg(long, env = "INKSHARE_SNAPSHOT")]
    pub snapshot: Option<PathBuf>,

    /// Seed for local stroke colors.
    #[arg(long, env = "INKSHARE_SEED")]
    pub seed: Option<u64>,
}

/// Resolved client configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub user: String,
    pub server_url: Option<String>,
    pub history: Option<String>,
    pub script: Option<PathBuf>,
    pub width: u32,
    pub height: u32,
    pub background: StrokeColor,
    pub line_width: f64,
    pub throttle: Duration,
    pub run_for: Option<Duration>,
    pub output: PathBuf,
    pub snapshot: Option<PathBuf>,
    pub seed: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user: guest_name(&mut rand::rng()),
            server_url: None,
            history: None,
            script: None,
            width: 800,
            height: 600,
            background: StrokeColor::new(255, 255, 255),
            line_width: 1.0,
            throttle: DEFAULT_THROTTLE,
            run_for: None,
            output: PathBuf::from("canvas.png"),
            snapshot: None,
            seed: None,
        }
    }
}

impl From<Args> for AppConfig {
    fn from(args: Args) -> Self {
        let scheme = |plain: &str| {
            if args.secure {
                format!("{plain}s")
            } else {
                plain.to_string()
            }
        };
        let derived = |protocol: &str, route: &str| {
            args.host
                .as_ref()
                .map(|host| endpoint_url(&scheme(protocol), host, route))
        };

        let server_url = args.server.clone().or_else(|| derived("ws", CANVAS_ROUTE));
        let history = args.history.clone().or_else(|| derived("http", HISTORY_ROUTE));

        Self {
            user: args
                .user
                .filter(|u| !u.trim().is_empty())
                .unwrap_or_else(|| guest_name(&mut rand::rng())),
            server_url,
            history,
            script: args.script,
            width: args.width,
            height: args.height,
            background: args.background,
            line_width: args.line_width,
            throttle: Duration::from_millis(args.throttle_ms),
            run_for: args.duration_ms.map(Duration::from_millis),
            output: args.output,
            snapshot: args.snapshot,
            seed: args.seed,
        }
    }
}

fn parse_line_width(value: &str) -> Result<f64, String> {
    let width: f64 = value.parse().map_err(|e| format!("{e}"))?;
    if width.is_finite() && width > 0.0 && width <= MAX_LINE_WIDTH {
        Ok(width)
    } else {
        Err(format!("line width must be in (0, {MAX_LINE_WIDTH}]"))
    }
}

/// Random `guest<n>` name with `n` in `0..1000`.
pub fn guest_name<R: Rng + ?Sized>(rng: &mut R) -> String {
    format!("guest{}", rng.random_range(0..1000))
}

fn endpoint_url(scheme: &str, host: &str, route: &str) -> String {
    format!("{}://{}/{}", scheme, host.trim_end_matches('/'), route)
}
