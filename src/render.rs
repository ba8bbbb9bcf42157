//! Turn a `ScanResult` into something a person can read.
//!
//! [`ResultsView`] is the pure view-model; the HTML and text writers below only
//! format it. Every string that came from the scanner or the network passes
//! through [`escape_html`] before it lands in markup.

use std::fmt::Write as _;
use std::io::{self, Write};

use crate::options::{preview_for, OptionSet, ScanOption};
use crate::types::{PortState, ScanResult};

pub const NO_PORTS_PLACEHOLDER: &str = "No open ports detected";
pub const OS_NOT_DETECTED: &str = "Not detected";
pub const NO_RAW_OUTPUT: &str = "No raw output available";
pub const SCANNING_PLACEHOLDER: &str = "Scanning in progress...";

/// One row of the ports table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortRow {
    pub port: u16,
    pub state: PortState,
    pub protocol: String,
    pub service: String,
}

impl PortRow {
    pub fn state_label(&self) -> String {
        self.state.as_str().to_uppercase()
    }
}

/// Everything the results panel shows, derived from one `ScanResult`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultsView {
    pub ports_found: usize,
    pub services_found: usize,
    pub os_label: String,
    /// `Completed in ...`, only when the scanner reported timing.
    pub scan_time: Option<String>,
    pub rows: Vec<PortRow>,
    pub raw_text: String,
}

impl ResultsView {
    pub fn from_result(result: &ScanResult) -> Self {
        let rows = result
            .ports
            .iter()
            .map(|p| PortRow {
                port: p.port,
                state: p.state,
                protocol: p.protocol.as_str().to_uppercase(),
                service: p.service.clone(),
            })
            .collect();

        let raw_text = format!(
            "Command: {}\n\n{}",
            result.command,
            result
                .raw
                .as_deref()
                .filter(|r| !r.is_empty())
                .unwrap_or(NO_RAW_OUTPUT)
        );

        Self {
            ports_found: result.ports.len(),
            services_found: result.ports.iter().filter(|p| p.has_known_service()).count(),
            os_label: result
                .os_info
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| OS_NOT_DETECTED.to_string()),
            scan_time: result
                .scan_info
                .as_deref()
                .filter(|t| !t.is_empty())
                .map(|t| format!("Completed in {t}")),
            rows,
            raw_text,
        }
    }
}

/// Escape text for safe inclusion in HTML element content or attribute values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// `<tr>` rows for the ports table body.
pub fn ports_table_html(view: &ResultsView) -> String {
    if view.rows.is_empty() {
        return format!(
            "<tr class=\"placeholder-row\"><td colspan=\"4\">{NO_PORTS_PLACEHOLDER}</td></tr>\n"
        );
    }
    let mut out = String::new();
    for row in &view.rows {
        let _ = writeln!(
            out,
            "<tr class=\"port-row\"><td><span class=\"port-number\">{}</span></td>\
             <td><span class=\"state-{}\">{}</span></td>\
             <td>{}</td>\
             <td>{}</td></tr>",
            row.port,
            row.state.as_str(),
            row.state_label(),
            escape_html(&row.protocol),
            escape_html(&row.service),
        );
    }
    out
}

/// Single error row replacing the ports table body.
pub fn error_html(message: &str) -> String {
    format!(
        "<tr><td colspan=\"4\"><div class=\"error-message\">ERROR: {}</div></td></tr>\n",
        escape_html(message)
    )
}

/// Summary cards: ports, services, OS and timing.
pub fn summary_html(view: &ResultsView) -> String {
    let mut out = String::from("<dl class=\"summary\">\n");
    let _ = writeln!(out, "<dt>Ports found</dt><dd id=\"ports-found\">{}</dd>", view.ports_found);
    let _ = writeln!(
        out,
        "<dt>Services</dt><dd id=\"services-found\">{}</dd>",
        view.services_found
    );
    let _ = writeln!(
        out,
        "<dt>OS</dt><dd id=\"os-detected\">{}</dd>",
        escape_html(&view.os_label)
    );
    if let Some(t) = &view.scan_time {
        let _ = writeln!(out, "<dd id=\"scan-time\">{}</dd>", escape_html(t));
    }
    out.push_str("</dl>\n");
    out
}

fn page(title: &str, body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{}</title>\n</head>\n\
         <body>\n{}</body>\n</html>\n",
        escape_html(title),
        body
    )
}

fn options_form(target: &str, selected: &OptionSet) -> String {
    let mut out = String::from("<form method=\"get\" action=\"/\" id=\"scan-form\">\n");
    out.push_str("<input type=\"hidden\" name=\"submitted\" value=\"1\">\n");
    for opt in ScanOption::ALL {
        let _ = writeln!(
            out,
            "<label title=\"{}\"><input type=\"checkbox\" name=\"{}\"{}> {} <code>{}</code></label>",
            escape_html(opt.description()),
            opt.id(),
            if selected.contains(opt) { " checked" } else { "" },
            escape_html(opt.label()),
            escape_html(opt.flag()),
        );
    }
    let _ = writeln!(
        out,
        "<pre id=\"command-preview\">{}</pre>",
        escape_html(&preview_for(selected, target))
    );
    out.push_str("<button type=\"submit\">Update preview</button>\n");
    out.push_str(
        "<button type=\"submit\" id=\"scan-btn\" formmethod=\"post\" formaction=\"/scan\">Run scan</button>\n",
    );
    out.push_str("</form>\n");
    out
}

/// The landing page: target, option checkboxes and the command preview.
pub fn index_page(target: &str, selected: &OptionSet, nmap_available: bool) -> String {
    let mut body = String::new();
    let _ = writeln!(
        body,
        "<h1>Lab Nmap Scanner</h1>\n<p>Target: <span id=\"target-host\">{}</span></p>",
        escape_html(target)
    );
    if !nmap_available {
        body.push_str(
            "<p class=\"warning\">nmap was not found on the server; scans will fail.</p>\n",
        );
    }
    body.push_str(&options_form(target, selected));
    page("Lab Nmap Scanner", &body)
}

/// Full page for a finished scan.
pub fn results_page(target: &str, selected: &OptionSet, view: &ResultsView) -> String {
    let mut body = String::new();
    body.push_str(&options_form(target, selected));
    body.push_str("<section id=\"results-section\" class=\"scan-complete\">\n");
    body.push_str(&summary_html(view));
    body.push_str("<table><thead><tr>");
    body.push_str("<th>Port</th><th>State</th><th>Protocol</th><th>Service</th>");
    body.push_str("</tr></thead>\n<tbody id=\"ports-tbody\">\n");
    body.push_str(&ports_table_html(view));
    body.push_str("</tbody></table>\n");
    let _ = writeln!(
        body,
        "<pre id=\"raw-content\">{}</pre>",
        escape_html(&view.raw_text)
    );
    body.push_str("</section>\n");
    page("Scan results", &body)
}

/// Full page for a failed scan.
pub fn error_page(target: &str, selected: &OptionSet, message: &str) -> String {
    let mut body = String::new();
    body.push_str(&options_form(target, selected));
    body.push_str("<section id=\"results-section\">\n<table><tbody id=\"ports-tbody\">\n");
    body.push_str(&error_html(message));
    body.push_str("</tbody></table>\n");
    let _ = writeln!(
        body,
        "<pre id=\"raw-content\">Error: {}</pre>",
        escape_html(message)
    );
    body.push_str("</section>\n");
    page("Scan failed", &body)
}

/// Fixed-width table for terminals.
pub fn write_text_report<W: Write>(w: &mut W, view: &ResultsView) -> io::Result<()> {
    writeln!(w, "Ports found : {}", view.ports_found)?;
    writeln!(w, "Services    : {}", view.services_found)?;
    writeln!(w, "OS          : {}", view.os_label)?;
    if let Some(t) = &view.scan_time {
        writeln!(w, "{t}")?;
    }
    writeln!(w)?;

    if view.rows.is_empty() {
        writeln!(w, "{NO_PORTS_PLACEHOLDER}")?;
        return Ok(());
    }

    let port_w = view
        .rows
        .iter()
        .map(|r| r.port.to_string().len())
        .max()
        .unwrap_or(0)
        .max("port".len());
    let state_w = view
        .rows
        .iter()
        .map(|r| r.state_label().len())
        .max()
        .unwrap_or(0)
        .max("state".len());
    let proto_w = "protocol".len();
    let svc_w = view
        .rows
        .iter()
        .map(|r| r.service.len().min(60))
        .max()
        .unwrap_or(0)
        .max("service".len());

    writeln!(
        w,
        "{:>port_w$}  {:<state_w$}  {:<proto_w$}  {:<svc_w$}",
        "port", "state", "protocol", "service"
    )?;
    writeln!(
        w,
        "{:-<port_w$}  {:-<state_w$}  {:-<proto_w$}  {:-<svc_w$}",
        "", "", "", ""
    )?;
    for r in &view.rows {
        let mut svc = r.service.clone();
        if svc.len() > 60 {
            let cut = (0..=60).rev().find(|&i| svc.is_char_boundary(i)).unwrap_or(0);
            svc.truncate(cut);
        }
        writeln!(
            w,
            "{:>port_w$}  {:<state_w$}  {:<proto_w$}  {:<svc_w$}",
            r.port,
            r.state_label(),
            r.protocol,
            svc
        )?;
    }
    Ok(())
}
