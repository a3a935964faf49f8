//! Sizes, durations and the post-build table.

use std::path::Path;
use std::time::Duration;

use kiln_bundler::Manifest;
use owo_colors::OwoColorize;

use super::colors_enabled;

/// ```
/// use kiln_cli::ui::format_size;
///
/// assert_eq!(format_size(0), "0 B");
/// assert_eq!(format_size(500), "500 B");
/// assert_eq!(format_size(1536), "1.50 KB");
/// ```
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB"];

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{:.2} {}", size, UNITS[unit])
    }
}

/// ```
/// use std::time::Duration;
/// use kiln_cli::ui::format_duration;
///
/// assert_eq!(format_duration(Duration::from_millis(50)), "50ms");
/// assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ms = duration.as_millis();
    if total_ms < 1000 {
        format!("{total_ms}ms")
    } else if total_ms < 60_000 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        let secs = duration.as_secs();
        format!("{}m {}s", secs / 60, secs % 60)
    }
}

/// One line per chunk with its kind and on-disk size.
pub fn print_build_summary(manifest: &Manifest, out_dir: &Path, elapsed: Duration) {
    let width = console::Term::stderr().size().1 as usize;
    let rule = "─".repeat(width.clamp(20, 80));

    eprintln!();
    eprintln!("{rule}");
    let mut total = 0;
    for (name, chunk) in &manifest.chunks {
        let size = std::fs::metadata(out_dir.join(&chunk.file))
            .map(|m| m.len())
            .unwrap_or(0);
        total += size;
        let kind = format!("[{}]", chunk.kind.as_str());
        if colors_enabled() {
            eprintln!(
                "  {} {:<24} {:<10} {}",
                "▸".blue(),
                chunk.file.bold(),
                kind.dimmed(),
                format_size(size).dimmed()
            );
        } else {
            eprintln!("  ▸ {:<24} {:<10} {}", chunk.file, kind, format_size(size));
        }
        tracing::debug!(chunk = %name, modules = chunk.modules.len(), "chunk");
    }
    eprintln!("{rule}");
    eprintln!(
        "  {} chunks, {} in {}",
        manifest.chunks.len(),
        format_size(total),
        format_duration(elapsed)
    );
}
