//! Browser session factory.
//!
//! Every rendering operation owns exactly one `Session`: one isolated Chrome
//! process launched with a fixed set of hardening flags, torn down when the
//! operation finishes regardless of its outcome. Sessions are never shared or
//! reused, so a crashed or wedged page can only ever take down its own
//! operation.

use std::ffi::OsStr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info};

use crate::error::{RenderError, Result};

/// Default viewport applied to every session unless the caller overrides it.
pub const DEFAULT_VIEWPORT: (u32, u32) = (1920, 1080);

/// Kills the browser if an operation wedges without closing its session.
const IDLE_BROWSER_TIMEOUT: Duration = Duration::from_secs(90);

/// Launch flags for containerized execution against arbitrary origins:
/// sandboxing, GPU and /dev/shm off, same-origin restrictions lifted, plus
/// the automation-controlled blink feature disabled.
const HARDENING_ARGS: &[&str] = &[
    "--disable-blink-features=AutomationControlled",
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--disable-infobars",
    "--window-position=0,0",
    "--ignore-certificate-errors",
    "--ignore-certificate-errors-spki-list",
    "--disable-accelerated-2d-canvas",
    "--disable-gpu",
    "--disable-dev-shm-usage",
    "--disable-extensions",
    "--disable-web-security",
    "--no-first-run",
    "--no-zygote",
    "--headless=new",
];

/// Browser executable override, if configured.
pub fn chrome_executable() -> Option<PathBuf> {
    std::env::var("CHROME_BIN").ok().map(PathBuf::from)
}

/// Resolve the browser executable once at startup. A missing binary is a
/// boot-time failure, not something to discover on the first request.
pub fn verify_executable() -> Result<PathBuf> {
    match chrome_executable() {
        Some(path) if path.is_file() => Ok(path),
        Some(path) => Err(RenderError::Launch(format!(
            "CHROME_BIN points at a missing executable: {}",
            path.display()
        ))),
        None => headless_chrome::browser::default_executable().map_err(RenderError::Launch),
    }
}

/// An owned handle to one running browser process.
pub struct Session {
    browser: Browser,
    created_at: DateTime<Utc>,
}

impl Session {
    /// Launch an isolated browser at the default viewport.
    pub fn open() -> Result<Session> {
        Self::open_with_viewport(DEFAULT_VIEWPORT)
    }

    /// Launch an isolated browser sized for one operation.
    pub fn open_with_viewport((width, height): (u32, u32)) -> Result<Session> {
        let args: Vec<&OsStr> = HARDENING_ARGS.iter().map(OsStr::new).collect();

        // headless stays false here: `--headless=new` goes through args, the
        // builder flag would select the legacy headless mode instead.
        let launch = LaunchOptions::default_builder()
            .headless(false)
            .sandbox(false)
            .window_size(Some((width, height)))
            .idle_browser_timeout(IDLE_BROWSER_TIMEOUT)
            .path(chrome_executable())
            .args(args)
            .build()
            .map_err(|e| RenderError::Launch(format!("launch configuration error: {e}")))?;

        let browser =
            Browser::new(launch).map_err(|e| RenderError::Launch(format!("{e:#}")))?;

        info!(
            pid = ?browser.get_process_id(),
            width,
            height,
            "browser session opened"
        );

        Ok(Session {
            browser,
            created_at: Utc::now(),
        })
    }

    /// Create a fresh browsing context in this session.
    pub fn new_tab(&self) -> Result<Arc<Tab>> {
        self.browser.new_tab().map_err(RenderError::from)
    }

    /// Tear the browser process down. Consuming `self` makes double-close
    /// unrepresentable; the process is killed when the handle drops, so this
    /// can never fail after the fact.
    pub fn close(self) {
        let lifetime_ms = Utc::now()
            .signed_duration_since(self.created_at)
            .num_milliseconds();
        debug!(lifetime_ms, "session closed");
    }
}
