//! Code-repository link extraction.
//!
//! Three tiers, first hit wins:
//!
//! 1. `\url{…}` then `\href{…}` arguments that point at a known code platform.
//! 2. Bare `http(s)://` URLs on the same platforms.
//! 3. A URL within 100 characters after a phrase such as "code is available"
//!    or "project page".
//!
//! Platforms are tried in priority order (GitHub repository, GitHub Pages,
//! Hugging Face) so a GitHub link beats a Hugging Face link wherever they
//! appear in the text.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

struct Platform {
    name: &'static str,
    /// Matches anywhere inside a structured URL argument.
    host: Regex,
    /// Matches a bare URL in running text.
    bare: Regex,
}

static PLATFORMS: Lazy<Vec<Platform>> = Lazy::new(|| {
    [
        (
            "GitHub repo",
            r"(?i)github\.com/[\w\-.]+/[\w\-.]+",
            r"(?i)https?://github\.com/[\w\-.]+/[\w\-.]+",
        ),
        (
            "GitHub Pages",
            r"(?i)[\w\-.]+\.github\.io(?:/[\w\-.]+)?",
            r"(?i)https?://[\w\-.]+\.github\.io(?:/[\w\-.]+)?",
        ),
        (
            "Hugging Face",
            r"(?i)huggingface\.co/[\w\-.]+/[\w\-.]+",
            r"(?i)https?://huggingface\.co/[\w\-.]+/[\w\-.]+",
        ),
    ]
    .into_iter()
    .map(|(name, host, bare)| Platform {
        name,
        host: Regex::new(host).unwrap(),
        bare: Regex::new(bare).unwrap(),
    })
    .collect()
});

static RE_URL_ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\\url\{([^}]+)\}").unwrap());
static RE_HREF_ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\\href\{([^}]+)\}").unwrap());

static PROXIMITY: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"open-source\s+(?:code|implementation)",
        r"(?:code|implementation)\s+(?:is\s+)?available",
        r"project\s+page",
        r"(?:code|implementation)\s+at",
    ]
    .into_iter()
    .map(|phrase| Regex::new(&format!(r"(?is){phrase}.{{0,100}}?(https?://[^\s)}}\]]+)")).unwrap())
    .collect()
});

static RE_TRAILING_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.,;:)\]}]+$").unwrap());

/// Extract the most likely code link from `text`.
pub fn extract_code_url(text: &str) -> Option<String> {
    if let Some(url) = from_structured(text) {
        return Some(url);
    }
    if let Some(url) = from_bare(text) {
        return Some(url);
    }
    from_proximity(text)
}

fn from_structured(text: &str) -> Option<String> {
    let args: Vec<&str> = RE_URL_ARG
        .captures_iter(text)
        .chain(RE_HREF_ARG.captures_iter(text))
        .filter_map(|c| c.get(1).map(|m| m.as_str().trim()))
        .collect();
    if args.is_empty() {
        return None;
    }
    for platform in PLATFORMS.iter() {
        if let Some(arg) = args.iter().find(|a| platform.host.is_match(a)) {
            debug!("Code link from markup command ({}): {arg}", platform.name);
            return Some(normalize(arg));
        }
    }
    None
}

fn from_bare(text: &str) -> Option<String> {
    PLATFORMS.iter().find_map(|platform| {
        platform.bare.find(text).map(|m| {
            debug!("Code link from bare URL ({}): {}", platform.name, m.as_str());
            normalize(m.as_str())
        })
    })
}

fn from_proximity(text: &str) -> Option<String> {
    PROXIMITY.iter().find_map(|re| {
        re.captures(text).and_then(|c| c.get(1)).map(|m| {
            debug!("Code link near keyword phrase: {}", m.as_str());
            normalize(m.as_str())
        })
    })
}

fn normalize(url: &str) -> String {
    let trimmed = RE_TRAILING_PUNCT.replace(url, "");
    if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
        trimmed.into_owned()
    } else {
        format!("https://{trimmed}")
    }
}
