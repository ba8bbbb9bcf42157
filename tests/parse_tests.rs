use lab_scan_rs::parse::parse_nmap_output;
use lab_scan_rs::render::ResultsView;
use lab_scan_rs::types::{PortState, Protocol};

#[test]
fn parse_service_scan_with_os_details() {
    let output = r#"
Starting Nmap 7.94SVN ( https://nmap.org ) at 2025-02-11 09:12 UTC
Nmap scan report for 10.0.0.5
Host is up (0.00042s latency).
Not shown: 17 closed tcp ports (reset)
PORT     STATE  SERVICE VERSION
22/tcp   open   ssh     OpenSSH 9.6p1 Ubuntu 3ubuntu13 (Ubuntu Linux; protocol 2.0)
53/udp   open   domain  dnsmasq 2.90
3389/tcp closed ms-wbt-server
8081/tcp open   unknown
Device type: general purpose
Running: Linux 5.X
OS details: Linux 5.0 - 5.14
Service Info: OS: Linux; CPE: cpe:/o:linux:linux_kernel

Nmap done: 1 IP address (1 host up) scanned in 9.87 seconds
"#;

    let result = parse_nmap_output(output, "10.0.0.5");
    let ports: Vec<(u16, Protocol, PortState)> = result
        .ports
        .iter()
        .map(|p| (p.port, p.protocol, p.state))
        .collect();
    assert_eq!(
        ports,
        vec![
            (22, Protocol::Tcp, PortState::Open),
            (53, Protocol::Udp, PortState::Open),
            (3389, Protocol::Tcp, PortState::Closed),
            (8081, Protocol::Tcp, PortState::Open),
        ]
    );
    assert_eq!(result.os_info.as_deref(), Some("Linux 5.0 - 5.14"));
    assert_eq!(result.scan_info.as_deref(), Some("9.87 seconds"));

    let view = ResultsView::from_result(&result);
    assert_eq!(view.ports_found, 4);
    // "unknown" does not count as an identified service
    assert_eq!(view.services_found, 3);
}
