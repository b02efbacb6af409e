//! Link classification for the host's link handler.
//!
//! Some deep links (sticker and emoji pack installs, chat folders, TON
//! sites) bypass policy resolution entirely, and links to the messenger's
//! own domains are always safe to open.

use url::Url;

const IGNORED_SCHEMES: &[&str] = &["tonsite"];

const IGNORED_PREFIXES: &[&str] = &[
    "tg://addemoji",
    "tg://addlist",
    "tg://addstickers",
    "tg://folder",
];

const IGNORED_PATHS: &[&str] = &["addemoji", "addlist", "addstickers", "folder"];

const IGNORED_HOST_SUFFIXES: &[&str] = &[".ton"];

const WHITELISTED_HOSTS: &[&str] = &["telegram.org", "cloudveil.org"];

/// Stateless link classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct LinkFilter;

impl LinkFilter {
    /// True if `raw` should not be resolved against the policy.
    ///
    /// Unparseable links are never ignored.
    pub fn should_ignore(raw: &str) -> bool {
        match Url::parse(raw) {
            Ok(url) => Self::should_ignore_url(&url),
            Err(_) => false,
        }
    }

    /// Parsed form of [`should_ignore`](Self::should_ignore).
    pub fn should_ignore_url(url: &Url) -> bool {
        let scheme = url.scheme().to_ascii_lowercase();
        if IGNORED_SCHEMES.contains(&scheme.as_str()) {
            return true;
        }

        if IGNORED_PREFIXES
            .iter()
            .any(|prefix| url.as_str().starts_with(prefix))
        {
            return true;
        }

        if let Some(host) = url.host_str() {
            let host = host.to_ascii_lowercase();
            if IGNORED_HOST_SUFFIXES
                .iter()
                .any(|suffix| host.ends_with(suffix))
            {
                return true;
            }
        }

        let path = url.path().to_ascii_lowercase().replace('/', "");
        IGNORED_PATHS.iter().any(|p| path.starts_with(p))
    }

    /// True if `raw` points at one of the messenger's own domains.
    pub fn is_whitelisted(raw: &str) -> bool {
        Url::parse(raw)
            .ok()
            .and_then(|url| url.host_str().map(str::to_ascii_lowercase))
            .is_some_and(|host| WHITELISTED_HOSTS.iter().any(|h| host.contains(h)))
    }
}
