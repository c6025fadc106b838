//! Browser identity pool.
//!
//! A static header fingerprint is one of the cheapest bot-detection signals,
//! so every session draws a fresh identity from a small pool of realistic
//! desktop browsers instead of advertising a single fixed user agent.

use once_cell::sync::Lazy;
use rand::seq::SliceRandom;

/// A user-agent string paired with the `navigator.platform` value a real
/// browser with that agent would report. The two must stay consistent or the
/// mismatch itself becomes a fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserIdentity {
    pub user_agent: &'static str,
    pub platform: &'static str,
}

static IDENTITIES: Lazy<Vec<BrowserIdentity>> = Lazy::new(|| {
    vec![
        BrowserIdentity {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
            platform: "Win32",
        },
        BrowserIdentity {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
            platform: "MacIntel",
        },
        BrowserIdentity {
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36",
            platform: "Linux x86_64",
        },
        BrowserIdentity {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Edge/123.0.0.0 Safari/537.36",
            platform: "Win32",
        },
        BrowserIdentity {
            user_agent: "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
            platform: "MacIntel",
        },
    ]
});

/// Pick one identity uniformly at random.
pub fn pick() -> &'static BrowserIdentity {
    IDENTITIES
        .choose(&mut rand::thread_rng())
        .unwrap_or(&IDENTITIES[0])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn pick_only_returns_pool_members() {
        for _ in 0..100 {
            let identity = pick();
            assert!(IDENTITIES.iter().any(|i| i == identity));
        }
    }

    #[test]
    fn every_identity_is_eventually_picked() {
        let mut seen = HashSet::new();
        for _ in 0..2000 {
            seen.insert(pick().user_agent);
            if seen.len() == IDENTITIES.len() {
                return;
            }
        }
        panic!(
            "only {} of {} identities picked after 2000 draws",
            seen.len(),
            IDENTITIES.len()
        );
    }

    #[test]
    fn pool_holds_at_least_three_desktop_identities() {
        assert!(IDENTITIES.len() >= 3);
        for identity in IDENTITIES.iter() {
            assert!(identity.user_agent.starts_with("Mozilla/5.0"));
            assert!(!identity.user_agent.contains("Mobile"));
        }
    }
}
