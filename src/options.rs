use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// Binary name shown at the start of every command preview.
pub const SCANNER_BIN: &str = "nmap";

/// Port-range flag used when `top_ports` is not selected.
pub const DEFAULT_PORT_FLAG: &str = "--top-ports 20";

/// One selectable scan behaviour.
///
/// Variant order is the declaration order used when building commands, and
/// `Ord` follows it, so an ordered set iterates flags in command order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScanOption {
    TopPorts,
    ServiceDetection,
    OsDetection,
    SkipPing,
    FastScan,
    Verbose,
    ScriptDefault,
}

impl ScanOption {
    pub const ALL: [ScanOption; 7] = [
        ScanOption::TopPorts,
        ScanOption::ServiceDetection,
        ScanOption::OsDetection,
        ScanOption::SkipPing,
        ScanOption::FastScan,
        ScanOption::Verbose,
        ScanOption::ScriptDefault,
    ];

    pub fn id(self) -> &'static str {
        match self {
            ScanOption::TopPorts => "top_ports",
            ScanOption::ServiceDetection => "service_detection",
            ScanOption::OsDetection => "os_detection",
            ScanOption::SkipPing => "skip_ping",
            ScanOption::FastScan => "fast_scan",
            ScanOption::Verbose => "verbose",
            ScanOption::ScriptDefault => "script_default",
        }
    }

    /// The nmap flag (possibly with an argument) this option adds.
    pub fn flag(self) -> &'static str {
        match self {
            ScanOption::TopPorts => "--top-ports 100",
            ScanOption::ServiceDetection => "-sV",
            ScanOption::OsDetection => "-O",
            ScanOption::SkipPing => "-Pn",
            ScanOption::FastScan => "-T4",
            ScanOption::Verbose => "-v",
            ScanOption::ScriptDefault => "-sC",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ScanOption::TopPorts => "Top 100 Ports",
            ScanOption::ServiceDetection => "Service Detection",
            ScanOption::OsDetection => "OS Detection",
            ScanOption::SkipPing => "Skip Host Discovery",
            ScanOption::FastScan => "Fast Timing",
            ScanOption::Verbose => "Verbose Output",
            ScanOption::ScriptDefault => "Default Scripts",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ScanOption::TopPorts => "Scan the 100 most common ports",
            ScanOption::ServiceDetection => "Detect service versions on open ports",
            ScanOption::OsDetection => "Attempt to identify the operating system",
            ScanOption::SkipPing => "Treat host as online (skip ping)",
            ScanOption::FastScan => "Faster scan timing (T4)",
            ScanOption::Verbose => "Show more detailed output",
            ScanOption::ScriptDefault => "Run default NSE scripts",
        }
    }

    /// Whether the option starts out selected in the UI.
    pub fn default_selected(self) -> bool {
        matches!(
            self,
            ScanOption::TopPorts | ScanOption::ServiceDetection | ScanOption::FastScan
        )
    }

    /// True for options that choose the port range themselves.
    pub fn is_port_range(self) -> bool {
        matches!(self, ScanOption::TopPorts)
    }
}

impl fmt::Display for ScanOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown scan option: {0}")]
pub struct UnknownOption(pub String);

impl FromStr for ScanOption {
    type Err = UnknownOption;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ScanOption::ALL
            .into_iter()
            .find(|o| o.id() == s)
            .ok_or_else(|| UnknownOption(s.to_string()))
    }
}

impl Serialize for ScanOption {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.id())
    }
}

/// A set of recognised options, always iterated in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OptionSet(BTreeSet<ScanOption>);

impl OptionSet {
    /// Build a set from raw identifiers. Unknown identifiers are dropped.
    pub fn from_identifiers<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = BTreeSet::new();
        for id in ids {
            match id.as_ref().parse::<ScanOption>() {
                Ok(opt) => {
                    set.insert(opt);
                }
                Err(e) => tracing::debug!("ignoring {e}"),
            }
        }
        Self(set)
    }

    /// The options that are pre-selected in the UI.
    pub fn defaults() -> Self {
        ScanOption::ALL
            .into_iter()
            .filter(|o| o.default_selected())
            .collect()
    }

    pub fn contains(&self, opt: ScanOption) -> bool {
        self.0.contains(&opt)
    }

    pub fn iter(&self) -> impl Iterator<Item = ScanOption> + '_ {
        self.0.iter().copied()
    }

    pub fn identifiers(&self) -> Vec<String> {
        self.iter().map(|o| o.id().to_string()).collect()
    }

    fn has_port_range(&self) -> bool {
        self.iter().any(ScanOption::is_port_range)
    }
}

impl FromIterator<ScanOption> for OptionSet {
    fn from_iter<T: IntoIterator<Item = ScanOption>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Arguments passed to the scanner binary (binary name excluded).
///
/// Selected flags come first in declaration order, then the default port
/// range when no port-range option was selected, then the target.
pub fn command_args(options: &OptionSet, target: &str) -> Vec<String> {
    let mut args: Vec<String> = options
        .iter()
        .flat_map(|o| o.flag().split_whitespace())
        .map(str::to_string)
        .collect();
    if !options.has_port_range() {
        args.extend(DEFAULT_PORT_FLAG.split_whitespace().map(str::to_string));
    }
    args.push(target.to_string());
    args
}

/// Display-only command line for a set of raw option identifiers.
pub fn command_preview<I, S>(selected: I, target: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    preview_for(&OptionSet::from_identifiers(selected), target)
}

pub fn preview_for(options: &OptionSet, target: &str) -> String {
    let mut parts = vec![SCANNER_BIN.to_string()];
    parts.extend(command_args(options, target));
    parts.join(" ")
}

/// Catalog entry as served by `/api/options`.
#[derive(Debug, Clone, Serialize)]
pub struct OptionInfo {
    pub flag: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub default: bool,
}

impl From<ScanOption> for OptionInfo {
    fn from(o: ScanOption) -> Self {
        Self {
            flag: o.flag(),
            label: o.label(),
            description: o.description(),
            default: o.default_selected(),
        }
    }
}

/// The full option catalog, serialised as an ordered JSON object keyed by identifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct Catalog;

impl Serialize for Catalog {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(ScanOption::ALL.len()))?;
        for opt in ScanOption::ALL {
            map.serialize_entry(opt.id(), &OptionInfo::from(opt))?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_selection_uses_default_ports() {
        let empty: [&str; 0] = [];
        assert_eq!(
            command_preview(empty, "scanme.example.com"),
            "nmap --top-ports 20 scanme.example.com"
        );
    }

    #[test]
    fn flags_follow_declaration_order() {
        assert_eq!(
            command_preview(["fast_scan", "service_detection"], "10.0.0.5"),
            "nmap -sV -T4 --top-ports 20 10.0.0.5"
        );
    }

    #[test]
    fn explicit_top_ports_replaces_default() {
        let cmd = command_preview(["verbose", "top_ports"], "host");
        assert_eq!(cmd, "nmap --top-ports 100 -v host");
        assert_eq!(cmd.matches("--top-ports").count(), 1);
    }

    #[test]
    fn unknown_identifiers_are_ignored() {
        let with_junk = command_preview(["-oN /tmp/x", "os_detection", "bogus"], "h");
        assert_eq!(with_junk, command_preview(["os_detection"], "h"));
        assert!(!with_junk.contains("bogus"));
    }

    #[test]
    fn duplicates_collapse() {
        assert_eq!(
            command_preview(["skip_ping", "skip_ping"], "h"),
            "nmap -Pn --top-ports 20 h"
        );
    }

    #[test]
    fn every_subset_has_exactly_one_port_range_flag() {
        for mask in 0u32..(1 << ScanOption::ALL.len()) {
            let set: OptionSet = ScanOption::ALL
                .into_iter()
                .enumerate()
                .filter(|(i, _)| mask & (1u32 << *i) != 0)
                .map(|(_, o)| o)
                .collect();
            let cmd = preview_for(&set, "t");
            assert_eq!(cmd.matches("--top-ports").count(), 1, "{cmd}");
            assert_eq!(cmd, preview_for(&set, "t"));
            assert!(cmd.starts_with("nmap ") && cmd.ends_with(" t"));
        }
    }

    #[test]
    fn args_split_flag_arguments() {
        let set = OptionSet::from_identifiers(["top_ports", "service_detection"]);
        assert_eq!(
            command_args(&set, "scanme.nmap.org"),
            vec!["--top-ports", "100", "-sV", "scanme.nmap.org"]
        );
    }

    #[test]
    fn defaults_match_catalog() {
        let d = OptionSet::defaults();
        assert_eq!(
            d.identifiers(),
            vec!["top_ports", "service_detection", "fast_scan"]
        );
    }

    #[test]
    fn catalog_serialises_in_declaration_order() {
        let json = serde_json::to_string(&Catalog).unwrap();
        let first = json.find("\"top_ports\"").unwrap();
        let last = json.find("\"script_default\"").unwrap();
        assert!(first < last);
        let v: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(v["os_detection"]["flag"], "-O");
        assert_eq!(v["fast_scan"]["default"], true);
    }
}
