//! Package identifier → display name, via an ordered chain of strategies.
//!
//! Strategies run strictly in order and the first usable name wins:
//! 1. scrape label fields out of `dumpsys package <id>`
//! 2. locate the installed APK and scrape label-like strings from it
//! 3. look the identifier up in the known-alias table
//! 4. synthesize a name from the identifier itself (always succeeds)
//!
//! Every channel round-trip is expensive, so later strategies never run once
//! an earlier one has produced a name. A channel error inside a strategy just
//! means that strategy yielded nothing.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::debug;

use super::{aliases, ResolvedName};
use crate::channel::{stdout_of, DeviceChannel};

/// Label forms found in package dumps, most specific first.
static DUMP_LABEL_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // application-label:'Foo' / application-label-en:'Foo'
        r"application-label(?:-[A-Za-z_-]+)?:'([^'\r\n]+)'",
        // android:label(0x01010001)="Foo"
        r#"android:label\(0x[0-9a-fA-F]+\)="([^"\r\n]+)""#,
        // label="Foo"
        r#"\blabel="([^"\r\n]+)""#,
        // label=Foo / nonLocalizedLabel=Foo, up to the next key=value token
        r"(?m)\b(?:nonLocalizedLabel|label)=([^\s\x22][^\r\n]*?)(?:\s+\w+=|\s*$)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("label pattern must compile"))
    .collect()
});

/// A label-like line among strings scraped from an APK.
static APK_LABEL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)^\s*(?:app_name|application_name|app_label|label)\s*[:=]\s*"?([^"\r\n]+?)"?\s*$"#)
        .expect("apk label pattern must compile")
});

/// Values dumps print when a label is absent.
const NULL_MARKERS: &[&str] = &["null", "(null)", "none", "unknown", "n/a"];

/// Identifier segments that say nothing about the product.
const GENERIC_SEGMENTS: &[&str] = &[
    "android",
    "app",
    "apps",
    "application",
    "mobile",
    "client",
    "main",
    "free",
    "debug",
    "release",
    "beta",
];

/// Extensions that mark a scraped string as a file reference, not a name.
const PATH_SUFFIXES: &[&str] = &[".apk", ".dex", ".so", ".xml", ".png", ".webp", ".arsc"];

/// Resolution strategy, in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    #[serde(rename = "dumpsys")]
    DumpsysLabel,
    #[serde(rename = "apk_strings")]
    ApkStrings,
    #[serde(rename = "alias")]
    KnownAlias,
    #[serde(rename = "synthesized")]
    Synthesized,
}

/// Strategies that may yield nothing, tried in order before synthesis.
#[derive(Debug, Clone, Copy)]
enum Lookup {
    DumpsysLabel,
    ApkStrings,
    KnownAlias,
}

impl Lookup {
    const CHAIN: [Lookup; 3] = [Lookup::DumpsysLabel, Lookup::ApkStrings, Lookup::KnownAlias];

    fn strategy(self) -> Strategy {
        match self {
            Lookup::DumpsysLabel => Strategy::DumpsysLabel,
            Lookup::ApkStrings => Strategy::ApkStrings,
            Lookup::KnownAlias => Strategy::KnownAlias,
        }
    }
}

/// Resolves one package identifier at a time against a device channel.
#[derive(Clone)]
pub struct NameResolver {
    channel: Arc<dyn DeviceChannel>,
}

impl NameResolver {
    pub fn new(channel: Arc<dyn DeviceChannel>) -> Self {
        Self { channel }
    }

    /// Best-effort display name for `package_id`. Never fails.
    pub async fn resolve(&self, package_id: &str) -> ResolvedName {
        for lookup in Lookup::CHAIN {
            if let Some(name) = self.attempt(lookup, package_id).await {
                let strategy = lookup.strategy();
                debug!(package_id, ?strategy, name = %name, "Resolved package name");
                return ResolvedName::new(package_id, name, strategy);
            }
        }
        debug!(package_id, "No lookup matched, synthesizing name");
        fallback_name(package_id)
    }

    async fn attempt(&self, lookup: Lookup, package_id: &str) -> Option<String> {
        match lookup {
            Lookup::DumpsysLabel => self.dumpsys_label(package_id).await,
            Lookup::ApkStrings => self.apk_strings_label(package_id).await,
            Lookup::KnownAlias => aliases::lookup(package_id).map(str::to_string),
        }
    }

    async fn dumpsys_label(&self, package_id: &str) -> Option<String> {
        let text = stdout_of(
            self.channel.as_ref(),
            &["shell", "dumpsys", "package", package_id],
        )
        .await?;
        scrape_dump_label(&text, package_id)
    }

    async fn apk_strings_label(&self, package_id: &str) -> Option<String> {
        let listing = stdout_of(
            self.channel.as_ref(),
            &["shell", "pm", "list", "packages", "-f", package_id],
        )
        .await?;
        let apk_path = apk_path_for(&listing, package_id)?;
        let strings = stdout_of(self.channel.as_ref(), &["shell", "strings", apk_path.as_str()]).await?;
        scrape_apk_label(&strings, package_id)
    }
}

/// Name produced when nothing on the device helped.
pub fn fallback_name(package_id: &str) -> ResolvedName {
    ResolvedName::new(
        package_id,
        synthesize_name(package_id),
        Strategy::Synthesized,
    )
}

/// First usable label in a package dump.
pub fn scrape_dump_label(text: &str, package_id: &str) -> Option<String> {
    DUMP_LABEL_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures_iter(text)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
            .find(|candidate| is_usable(candidate, package_id))
            .map(str::to_string)
    })
}

/// First usable label among strings scraped from an APK.
pub fn scrape_apk_label(text: &str, package_id: &str) -> Option<String> {
    text.lines()
        .filter_map(|line| APK_LABEL_PATTERN.captures(line))
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .find(|candidate| is_usable(candidate, package_id) && !looks_like_path(candidate))
        .map(str::to_string)
}

/// APK path from `pm list packages -f` output (`package:<path>=<id>`).
///
/// The listing matches by substring, so only the line naming exactly
/// `package_id` counts.
pub fn apk_path_for(listing: &str, package_id: &str) -> Option<String> {
    let suffix = format!("={package_id}");
    listing
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .filter_map(|rest| rest.strip_suffix(suffix.as_str()))
        .find(|path| !path.is_empty())
        .map(str::to_string)
}

fn is_usable(candidate: &str, package_id: &str) -> bool {
    !candidate.is_empty()
        && !candidate.eq_ignore_ascii_case(package_id)
        && !NULL_MARKERS
            .iter()
            .any(|marker| candidate.eq_ignore_ascii_case(marker))
        && !candidate.starts_with('@')
        && !candidate.starts_with("0x")
}

fn looks_like_path(candidate: &str) -> bool {
    let lower = candidate.to_lowercase();
    lower.contains('/')
        || lower.contains('\\')
        || PATH_SUFFIXES.iter().any(|ext| lower.ends_with(ext))
}

/// Derive a readable name from the identifier alone.
///
/// Takes the last segment that isn't a generic word, then splits it on
/// separators, case changes and digit runs: `com.example.foo.MusicPlayer`
/// becomes `Music Player`.
pub fn synthesize_name(package_id: &str) -> String {
    let segments: Vec<&str> = package_id
        .split(['.', '/', ':'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let token = segments
        .iter()
        .rev()
        .find(|s| !GENERIC_SEGMENTS.contains(&s.to_lowercase().as_str()))
        .or(segments.last())
        .copied()
        .unwrap_or_default();

    let name = split_words(token)
        .iter()
        .map(|word| capitalize(word))
        .collect::<Vec<_>>()
        .join(" ");

    if name.is_empty() {
        "Unknown Package".to_string()
    } else {
        name
    }
}

fn split_words(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    let mut words = Vec::new();
    let mut current = String::new();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if let Some(prev) = current.chars().last() {
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = (prev.is_lowercase() && c.is_uppercase())
                || (prev.is_alphabetic() && c.is_ascii_digit())
                || (prev.is_ascii_digit() && c.is_alphabetic())
                || (prev.is_uppercase() && c.is_uppercase() && next_is_lower);
            if boundary {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
