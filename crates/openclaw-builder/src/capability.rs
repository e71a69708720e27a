//! Capability normalization for agent image builds.
//!
//! Capabilities arrive from a capability request as a loose `(kind, name,
//! version?)` triple. Before they can be materialised into a Dockerfile they
//! are split into package-manager buckets.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    AptPackage,
    PipPackage,
    NpmPackage,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    pub kind: CapabilityKind,
    pub name: String,
    pub version: Option<String>,
}

/// Known system packages that must land in the apt bucket even when the
/// caller tagged them `pip`.
const KNOWN_APT_PACKAGES: &[&str] = &[
    "redis-server",
    "postgresql",
    "nginx",
    "ffmpeg",
    "graphviz",
    "libffi-dev",
];

#[derive(Debug, Clone, Default)]
pub struct NormalizedCapabilities {
    pub apt: Vec<Capability>,
    pub pip: Vec<Capability>,
    pub npm: Vec<Capability>,
    pub tool: Vec<Capability>,
}

/// Split comma-separated names, reclassify known system packages, and
/// partition into apt/pip/npm/tool buckets.
pub fn normalize_capabilities(requested: &[Capability]) -> NormalizedCapabilities {
    let mut out = NormalizedCapabilities::default();

    for capability in requested {
        for raw_name in capability.name.split(',') {
            let name = raw_name.trim();
            if name.is_empty() {
                continue;
            }

            let mut kind = capability.kind;
            if KNOWN_APT_PACKAGES.contains(&name) {
                kind = CapabilityKind::AptPackage;
            } else if kind == CapabilityKind::PipPackage && name.starts_with("lib") {
                kind = CapabilityKind::AptPackage;
            }

            let normalized = Capability {
                kind,
                name: name.to_string(),
                version: capability.version.clone(),
            };

            match kind {
                CapabilityKind::AptPackage => out.apt.push(normalized),
                CapabilityKind::PipPackage => out.pip.push(normalized),
                CapabilityKind::NpmPackage => out.npm.push(normalized),
                CapabilityKind::Tool => out.tool.push(normalized),
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_comma_separated_names() {
        let requested = vec![Capability {
            kind: CapabilityKind::PipPackage,
            name: "requests, beautifulsoup4".to_string(),
            version: None,
        }];
        let normalized = normalize_capabilities(&requested);
        assert_eq!(normalized.pip.len(), 2);
        assert_eq!(normalized.pip[0].name, "requests");
        assert_eq!(normalized.pip[1].name, "beautifulsoup4");
    }

    #[test]
    fn reclassifies_known_system_packages_to_apt() {
        let requested = vec![Capability {
            kind: CapabilityKind::Tool,
            name: "ffmpeg".to_string(),
            version: None,
        }];
        let normalized = normalize_capabilities(&requested);
        assert_eq!(normalized.apt.len(), 1);
        assert!(normalized.tool.is_empty());
    }

    #[test]
    fn reclassifies_lib_prefixed_pip_packages_to_apt() {
        let requested = vec![Capability {
            kind: CapabilityKind::PipPackage,
            name: "libffi-dev".to_string(),
            version: None,
        }];
        let normalized = normalize_capabilities(&requested);
        assert_eq!(normalized.apt.len(), 1);
        assert!(normalized.pip.is_empty());
    }
}
