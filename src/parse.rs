//! Extract structured data from nmap's normal (human-readable) output.

use std::sync::LazyLock;

use regex::Regex;

use crate::types::{Port, PortState, Protocol, ScanResult};

// Rows of the port table start at column 0; verbose lines such as
// "Discovered open port 22/tcp on ..." must not match.
static PORT_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\d+)/(tcp|udp)\s+(\w+)\s+(.+)$").expect("valid regex")
});
static OS_DETAILS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"OS details?:\s*(.+)").expect("valid regex"));
static OS_GUESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Aggressive OS guesses?:\s*(.+)").expect("valid regex"));
static TIMING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Nmap done:.+in (.+)").expect("valid regex"));

/// Parse nmap output into a `ScanResult`. `command` is left empty for the caller.
pub fn parse_nmap_output(output: &str, host: &str) -> ScanResult {
    let ports = PORT_LINE
        .captures_iter(output)
        .filter_map(|c| {
            let port = c[1].parse::<u16>().ok()?;
            let protocol = match &c[2] {
                "udp" => Protocol::Udp,
                _ => Protocol::Tcp,
            };
            Some(Port {
                port,
                state: PortState::from(&c[3]),
                protocol,
                service: c[4].trim().to_string(),
            })
        })
        .collect();

    let os_info = first_capture(&OS_DETAILS, output).or_else(|| first_capture(&OS_GUESS, output));
    let scan_info = first_capture(&TIMING, output);

    ScanResult {
        ports,
        os_info,
        scan_info,
        command: String::new(),
        raw: Some(output.to_string()),
        host: Some(host.to_string()),
        started_at: None,
    }
}

fn first_capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .map(|c| c[1].trim().to_string())
        .filter(|s| !s.is_empty())
}
