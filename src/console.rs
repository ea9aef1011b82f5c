//! Terminal view of a running capture.

use crossterm::cursor::MoveTo;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use std::io::{self, Write};
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::capture::TrafficMonitor;
use crate::models::packet::PacketSummary;
use crate::models::session::CaptureSession;
use crate::models::stats::AggregateStats;

/// Packets shown in the recent-packets table
pub const RECENT_PACKETS: usize = 10;

/// Rows shown in the protocol and talker tables
const TOP_ROWS: usize = 10;

fn protocol_color(label: &str) -> Color {
    match label {
        "HTTP" | "HTTPS" => Color::Green,
        "DNS" => Color::Cyan,
        "TCP" => Color::Blue,
        "UDP" => Color::Magenta,
        "ICMP" | "ICMPv6" => Color::Yellow,
        "ARP" => Color::White,
        "OTHER" => Color::Red,
        _ => Color::Cyan,
    }
}

fn heading<W: WriteColor>(out: &mut W, text: &str) -> io::Result<()> {
    out.set_color(ColorSpec::new().set_fg(Some(Color::Cyan)).set_bold(true))?;
    writeln!(out, "{}", text)?;
    out.reset()
}

fn human_bytes(bytes: f64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.1} {}", value, UNITS[unit])
}

/// Write one frame of the console view
pub fn render<W: WriteColor>(out: &mut W, monitor: &dyn TrafficMonitor) -> io::Result<()> {
    let state = monitor.session_state();
    let stats = monitor.stats();
    let packets: Vec<PacketSummary> = monitor
        .recent_packets(Some(RECENT_PACKETS))
        .iter()
        .map(|p| p.summary())
        .collect();

    render_status(out, &state, monitor)?;
    render_stats(out, &stats)?;
    render_packets(out, &packets)?;
    out.flush()
}

fn render_status<W: WriteColor>(
    out: &mut W,
    state: &CaptureSession,
    monitor: &dyn TrafficMonitor,
) -> io::Result<()> {
    let (label, color) = match state {
        CaptureSession::Running => ("RUNNING", Color::Green),
        CaptureSession::Failed(_) => ("FAILED", Color::Red),
        CaptureSession::Idle | CaptureSession::Stopped => ("STOPPED", Color::Yellow),
        CaptureSession::Starting | CaptureSession::Stopping => ("...", Color::Yellow),
    };

    write!(out, "Capture: ")?;
    out.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(out, "{}", label)?;
    out.reset()?;

    if let Some(info) = monitor.session_info() {
        write!(out, "  interface: {}", info.interface)?;
        if !info.filter.is_empty() {
            write!(out, "  filter: {}", info.filter)?;
        }
    }
    writeln!(out)?;

    if let Some(reason) = state.failure() {
        out.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
        writeln!(out, "  {}", reason)?;
        out.reset()?;
    }
    writeln!(out)
}

fn render_stats<W: WriteColor>(out: &mut W, stats: &AggregateStats) -> io::Result<()> {
    heading(out, "Capture Statistics")?;
    writeln!(out, "  {:<18} {}", "Total Packets", stats.total_packets)?;
    writeln!(out, "  {:<18} {}", "Total Bytes", human_bytes(stats.total_bytes as f64))?;
    writeln!(out, "  {:<18} {:.1}", "Packets/s", stats.packets_per_second)?;
    writeln!(out, "  {:<18} {}/s", "Throughput", human_bytes(stats.bytes_per_second))?;
    writeln!(out, "  {:<18} {}", "Unique IPs", stats.top_talkers.len())?;
    if stats.malformed_frames > 0 {
        writeln!(out, "  {:<18} {}", "Malformed", stats.malformed_frames)?;
    }
    writeln!(out)?;

    heading(out, "Protocols")?;
    for (label, count) in stats.ranked_protocols().into_iter().take(TOP_ROWS) {
        let share = if stats.total_packets > 0 {
            count as f64 * 100.0 / stats.total_packets as f64
        } else {
            0.0
        };
        out.set_color(ColorSpec::new().set_fg(Some(protocol_color(&label))))?;
        write!(out, "  {:<10}", label)?;
        out.reset()?;
        writeln!(out, " {:>8} {:>6.1}%", count, share)?;
    }
    writeln!(out)?;

    heading(out, "Top Talkers")?;
    for (addr, count) in stats.ranked_talkers().into_iter().take(TOP_ROWS) {
        writeln!(out, "  {:<40} {:>8}", addr, count)?;
    }
    writeln!(out)?;

    heading(out, "Top Source Ports")?;
    for (port, count) in stats.ranked_ports().into_iter().take(TOP_ROWS) {
        writeln!(out, "  {:<10} {:>8}", port, count)?;
    }
    writeln!(out)
}

fn render_packets<W: WriteColor>(out: &mut W, packets: &[PacketSummary]) -> io::Result<()> {
    heading(out, &format!("Recent Packets (Last {})", RECENT_PACKETS))?;
    writeln!(
        out,
        "  {:<12} {:<8} {:<24} {:<24} {:>6}",
        "Time", "Protocol", "Source", "Destination", "Length"
    )?;

    for packet in packets {
        write!(out, "  {:<12} ", packet.timestamp.format("%H:%M:%S%.3f"))?;
        out.set_color(ColorSpec::new().set_fg(Some(protocol_color(&packet.protocol))))?;
        write!(out, "{:<8}", packet.protocol)?;
        out.reset()?;
        writeln!(
            out,
            " {:<24} {:<24} {:>6}",
            packet.source, packet.destination, packet.length
        )?;
    }
    Ok(())
}

fn clear_screen<W: Write>(out: &mut W) -> io::Result<()> {
    execute!(out, Clear(ClearType::All), MoveTo(0, 0))
}

/// Clear the terminal and draw the current view on stdout
pub fn draw(monitor: &dyn TrafficMonitor) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    clear_screen(&mut stdout)?;
    render(&mut stdout, monitor)
}
