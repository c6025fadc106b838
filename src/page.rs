//! Page configuration, navigation and readiness.
//!
//! A `Page` is one browsing context inside a `Session`, fully disguised
//! before the first navigation: identity, headers and evasion hooks are all
//! in place before any page script can observe the environment.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use headless_chrome::protocol::cdp::Page::AddScriptToEvaluateOnNewDocument;
use headless_chrome::Tab;
use rand::Rng;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::error::{RenderError, Result};
use crate::identity::{self, BrowserIdentity};
use crate::session::Session;
use crate::stealth;

/// Hard bound on one navigation, matching a patient human's give-up point.
pub const NAVIGATION_TIMEOUT: Duration = Duration::from_secs(30);

/// Post-load dwell range; real users do not act the instant `load` fires.
const SETTLE_JITTER_MS: std::ops::Range<u64> = 1000..2000;

/// In-page poll interval for the dynamic-content heuristic.
const DYNAMIC_SETTLE_POLL_MS: u64 = 100;

/// Soft deadline for the dynamic-content heuristic. Pages that never
/// quiesce (carousels, tickers) resolve as pending instead of blocking the
/// extraction forever.
const DYNAMIC_SETTLE_LIMIT_MS: u64 = 10_000;

pub struct Page {
    tab: Arc<Tab>,
    identity: &'static BrowserIdentity,
}

impl Page {
    /// Attach a new page to `session` and apply the full anti-detection
    /// setup. All steps must succeed before the page may navigate anywhere.
    pub fn configure(session: &Session) -> Result<Page> {
        let tab = session.new_tab()?;
        tab.set_default_timeout(NAVIGATION_TIMEOUT);

        let identity = identity::pick();
        tab.set_user_agent(
            identity.user_agent,
            Some("en-US,en;q=0.9"),
            Some(identity.platform),
        )?;

        let headers: HashMap<&str, &str> = stealth::NAVIGATION_HEADERS.iter().copied().collect();
        tab.set_extra_http_headers(headers)?;

        // Registered before navigation so it runs ahead of every page script.
        tab.call_method(AddScriptToEvaluateOnNewDocument {
            source: stealth::evasion_script(identity.platform),
            world_name: None,
            include_command_line_api: None,
            run_immediately: None,
        })?;

        debug!(user_agent = identity.user_agent, "page configured");
        Ok(Page { tab, identity })
    }

    pub fn tab(&self) -> &Arc<Tab> {
        &self.tab
    }

    /// Navigate to `url` and wait for the browser's loaded signal, bounded
    /// at [`NAVIGATION_TIMEOUT`]. On success, sleeps a randomized 1–2 s to
    /// let late scripts run before anything is extracted. Never retries.
    pub async fn navigate(&self, url: &str) -> Result<()> {
        let tab = Arc::clone(&self.tab);
        let target = url.to_string();
        let navigation = tokio::task::spawn_blocking(move || -> anyhow::Result<()> {
            tab.navigate_to(&target)?;
            tab.wait_until_navigated()?;
            Ok(())
        });

        match timeout(NAVIGATION_TIMEOUT, navigation).await {
            Ok(Ok(Ok(()))) => {}
            Ok(Ok(Err(e))) => return Err(classify_navigation_error(url, e)),
            Ok(Err(join)) => {
                return Err(RenderError::Browser(anyhow::anyhow!(
                    "navigation task failed: {join}"
                )))
            }
            Err(_) => {
                return Err(RenderError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_ms: NAVIGATION_TIMEOUT.as_millis() as u64,
                })
            }
        }

        let dwell = rand::thread_rng().gen_range(SETTLE_JITTER_MS);
        tokio::time::sleep(Duration::from_millis(dwell)).await;
        Ok(())
    }

    /// Wait for dynamically loaded content to settle: no in-flight XHR or
    /// fetch resource entries and no running animations, polled inside the
    /// page every 100 ms. Best-effort by design — a page that will not
    /// settle is logged and extraction proceeds anyway.
    pub async fn await_dynamic_settle(&self) {
        let tab = Arc::clone(&self.tab);
        let script = settle_script();
        let outcome =
            tokio::task::spawn_blocking(move || tab.evaluate(&script, true)).await;

        match outcome {
            Ok(Ok(result)) => {
                let settled = result.value.as_ref().and_then(|v| v.as_str()) == Some("settled");
                if !settled {
                    warn!("dynamic content did not settle in time, extracting anyway");
                }
            }
            Ok(Err(e)) => warn!(error = %e, "dynamic-settle probe failed, extracting anyway"),
            Err(e) => warn!(error = %e, "dynamic-settle task failed, extracting anyway"),
        }
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        // The page must go before its session; failures here must never mask
        // the operation's real outcome.
        if let Err(e) = self.tab.close(true) {
            warn!(
                error = %e,
                platform = self.identity.platform,
                "failed to close page cleanly"
            );
        }
    }
}

fn classify_navigation_error(url: &str, source: anyhow::Error) -> RenderError {
    let message = format!("{source:#}").to_ascii_lowercase();
    if message.contains("timeout") || message.contains("timed out") || message.contains("never came")
    {
        RenderError::NavigationTimeout {
            url: url.to_string(),
            timeout_ms: NAVIGATION_TIMEOUT.as_millis() as u64,
        }
    } else {
        RenderError::Browser(source)
    }
}

fn settle_script() -> String {
    format!(
        r#"
        new Promise((resolve) => {{
            const startedAt = Date.now();
            const checkReady = () => {{
                const entries = window.performance.getEntriesByType('resource');
                const anyPendingXhr = entries
                    .some((r) => r.initiatorType === 'xmlhttprequest' && !r.responseEnd);
                const anyPendingFetch = window.fetch && entries
                    .some((r) => r.initiatorType === 'fetch' && !r.responseEnd);
                const anyRunningAnimations = document.getAnimations()
                    .some((a) => a.playState === 'running');

                if (!anyPendingXhr && !anyPendingFetch && !anyRunningAnimations) {{
                    resolve('settled');
                }} else if (Date.now() - startedAt > {limit}) {{
                    resolve('pending');
                }} else {{
                    setTimeout(checkReady, {poll});
                }}
            }};
            checkReady();
        }})
    "#,
        limit = DYNAMIC_SETTLE_LIMIT_MS,
        poll = DYNAMIC_SETTLE_POLL_MS,
    )
}
