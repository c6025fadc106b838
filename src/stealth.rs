//! Stealth & fingerprint-evasion module.
//!
//! Builds the injection script that runs before any page script (via
//! `Page.addScriptToEvaluateOnNewDocument`) and owns the fixed header set a
//! real interactive Chrome sends on a top-level navigation.

/// Generate the evasion script for one page.
///
/// The script is built per session so the platform override always matches
/// the user agent the session advertises.
pub fn evasion_script(platform: &str) -> String {
    format!(
        r#"
        // 1. Unmasking: remove `navigator.webdriver`
        Object.defineProperty(navigator, 'webdriver', {{
            get: () => undefined,
        }});

        // 2. Chrome runtime namespace (present on every real Chrome, absent
        //    under plain automation)
        window.chrome = {{
            runtime: {{}},
            loadTimes: function() {{}},
            csi: function() {{}},
            app: {{}},
        }};

        // 3. Permission mocking: notifications report the page's real state
        //    instead of the automation default
        const originalQuery = window.navigator.permissions.query;
        window.navigator.permissions.query = (parameters) => (
            parameters.name === 'notifications' ?
                Promise.resolve({{ state: Notification.permission }}) :
                originalQuery(parameters)
        );

        // 4. Languages & platform, consistent with the session identity
        Object.defineProperty(navigator, 'languages', {{
            get: () => ['en-US', 'en'],
        }});
        Object.defineProperty(navigator, 'platform', {{
            get: () => '{platform}',
        }});
    "#
    )
}

/// Header set mimicking a real top-level browser navigation.
pub const NAVIGATION_HEADERS: &[(&str, &str)] = &[
    ("Accept-Language", "en-US,en;q=0.9"),
    (
        "Accept",
        "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8",
    ),
    ("Accept-Encoding", "gzip, deflate, br"),
    ("Connection", "keep-alive"),
    ("Upgrade-Insecure-Requests", "1"),
    ("Sec-Fetch-Dest", "document"),
    ("Sec-Fetch-Mode", "navigate"),
    ("Sec-Fetch-Site", "none"),
    ("Sec-Fetch-User", "?1"),
    ("DNT", "1"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_evasion_script_generation() {
        let script = evasion_script("Win32");
        assert!(script.contains("Object.defineProperty(navigator, 'webdriver'"));
        assert!(script.contains("window.chrome = {"));
        assert!(script.contains("parameters.name === 'notifications'"));
        assert!(script.contains("=> 'Win32'"));
    }

    #[test]
    fn test_platform_is_injected_verbatim() {
        let script = evasion_script("MacIntel");
        assert!(script.contains("=> 'MacIntel'"));
        assert!(!script.contains("Win32"));
    }

    #[test]
    fn test_header_set_covers_sec_fetch_triplet_and_dnt() {
        let names: Vec<&str> = NAVIGATION_HEADERS.iter().map(|(n, _)| *n).collect();
        for required in [
            "Accept-Language",
            "Accept",
            "Accept-Encoding",
            "Upgrade-Insecure-Requests",
            "Sec-Fetch-Dest",
            "Sec-Fetch-Mode",
            "Sec-Fetch-Site",
            "DNT",
        ] {
            assert!(names.contains(&required), "missing header {required}");
        }
    }
}
