//! Installed-package identity: listing, name resolution, batch scheduling.

pub mod aliases;
pub mod resolver;
pub mod scheduler;

use serde::{Deserialize, Serialize};

use crate::channel::{ChannelError, DeviceChannel};

pub use resolver::{NameResolver, Strategy};
pub use scheduler::BatchScheduler;

/// Identifier prefixes of platform and vendor components.
const SYSTEM_PREFIXES: &[&str] = &[
    "android.",
    "com.android.",
    "com.google.android.gms",
    "com.google.android.gsf",
    "com.google.android.ext.",
    "com.qualcomm.",
    "com.qti.",
    "com.mediatek.",
    "com.samsung.android.",
    "com.sec.android.",
    "org.codeaurora.",
    "vendor.",
];

/// A package identifier paired with the best display name we could find.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedName {
    pub package_id: String,
    pub display_name: String,
    pub is_system_component: bool,
    /// Strategy that produced `display_name`.
    pub source: Strategy,
}

impl ResolvedName {
    pub fn new(package_id: &str, display_name: String, source: Strategy) -> Self {
        Self {
            package_id: package_id.to_string(),
            display_name,
            is_system_component: is_system_component(package_id),
            source,
        }
    }
}

/// Whether the identifier names a platform/vendor component rather than a
/// user-installed app. Derived from the prefix alone.
pub fn is_system_component(package_id: &str) -> bool {
    package_id == "android" || SYSTEM_PREFIXES.iter().any(|p| package_id.starts_with(p))
}

/// Which packages to list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackageFilter {
    #[default]
    All,
    System,
    ThirdParty,
}

impl PackageFilter {
    fn flag(self) -> Option<&'static str> {
        match self {
            PackageFilter::All => None,
            PackageFilter::System => Some("-s"),
            PackageFilter::ThirdParty => Some("-3"),
        }
    }
}

/// List installed package identifiers, sorted and de-duplicated.
///
/// Unlike name resolution, a failing channel is reported to the caller: an
/// empty list would be indistinguishable from a device with nothing on it.
pub async fn list_packages(
    channel: &dyn DeviceChannel,
    filter: PackageFilter,
) -> Result<Vec<String>, ChannelError> {
    let mut args = vec!["shell", "pm", "list", "packages"];
    if let Some(flag) = filter.flag() {
        args.push(flag);
    }

    let out = channel.execute(&args).await?;
    if !out.succeeded {
        return Err(ChannelError::Unavailable(format!(
            "package listing failed: {}",
            out.stderr.trim()
        )));
    }

    Ok(parse_package_list(&out.stdout))
}

/// Parse `pm list packages` output (`package:<id>` per line).
pub fn parse_package_list(text: &str) -> Vec<String> {
    let mut ids: Vec<String> = text
        .lines()
        .filter_map(|line| line.trim().strip_prefix("package:"))
        .map(|id| id.trim().to_string())
        .filter(|id| !id.is_empty())
        .collect();
    ids.sort();
    ids.dedup();
    ids
}
