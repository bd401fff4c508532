//! CLI text summary of a [`Report`].
//!
//! The JSON report is the primary output. `--summary` prints this instead:
//!
//! ```text
//! photo.jpg
//!     jpg 285x427, 20.0 KB (image/jpeg)
//!     Display density: 2.85 (ratio 2.85)
//!
//! Transforms
//!     optimized: 20.0 KB → 15.0 KB (-25%)
//!     resized: 15.0 KB → 3.0 KB, 285x427 → 200x100
//!     webpEncoded: 20.0 KB → 9.0 KB (-55%)
//!
//! Offenders
//!     imageOldFormat: jpg, 20.0 KB → 7.0 KB as a modern format
//!     imageWithIncorrectSizesParam: sizes="5vw" selects 60px, displayed at 200px
//! ```
//!
//! # Architecture
//!
//! [`format_report`] returns `Vec<String>` for testability and
//! [`print_report`] writes it to stdout. The format function is pure.

use crate::analyze::Report;
use crate::envelope::TransformResult;

// ============================================================================
// Helpers
// ============================================================================

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Human-readable byte count.
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1000.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

/// Signed percentage change from `from` to `to`.
fn format_change(from: u64, to: u64) -> String {
    if from == 0 {
        return String::from("n/a");
    }
    let pct = (to as f64 - from as f64) / from as f64 * 100.0;
    format!("{pct:+.0}%")
}

fn transform_line(name: &str, result: &TransformResult) -> String {
    let mut line = format!(
        "{}{}: {} → {}",
        indent(1),
        name,
        format_bytes(result.file_size),
        format_bytes(result.new_file_size())
    );
    match (
        result.natural_width,
        result.natural_height,
        result.new_width,
        result.new_height,
    ) {
        (Some(nw), Some(nh), Some(w), Some(h)) => {
            line.push_str(&format!(", {nw}x{nh} → {w}x{h}"));
        }
        _ => line.push_str(&format!(
            " ({})",
            format_change(result.file_size, result.new_file_size())
        )),
    }
    line
}

// ============================================================================
// Report
// ============================================================================

/// Format the summary of one analysed image.
pub fn format_report(report: &Report, source: &str) -> Vec<String> {
    let mut lines = vec![source.to_string()];
    let stats = &report.stats;

    if let (Some(format), Some(width), Some(height)) = (stats.format, stats.width, stats.height) {
        let animated = if stats.animated == Some(true) {
            ", animated"
        } else {
            ""
        };
        lines.push(format!(
            "{}{} {}x{}, {} ({}){}",
            indent(1),
            format,
            width,
            height,
            format_bytes(stats.file_size.unwrap_or_default()),
            stats.mime_type.as_deref().unwrap_or("unknown"),
            animated
        ));
    }
    if let (Some(density), Some(ratio)) = (stats.display_density, stats.display_ratio) {
        lines.push(format!(
            "{}Display density: {density:.2} (ratio {ratio:.2})",
            indent(1)
        ));
    }

    let transforms = &report.transforms;
    let entries = [
        ("optimized", &transforms.optimized),
        ("resized", &transforms.resized),
        ("webpEncoded", &transforms.webp_encoded),
        ("avifEncoded", &transforms.avif_encoded),
    ];
    if entries.iter().any(|(_, result)| result.is_some()) {
        lines.push(String::new());
        lines.push("Transforms".to_string());
        for (name, result) in entries {
            if let Some(result) = result {
                lines.push(transform_line(name, result));
            }
        }
    }

    lines.push(String::new());
    lines.push("Offenders".to_string());
    let before = lines.len();
    let offenders = &report.offenders;
    if let Some(o) = &offenders.not_optimized {
        lines.push(format!(
            "{}imageNotOptimized: {} → {} ({})",
            indent(1),
            format_bytes(o.file_size),
            format_bytes(o.new_file_size),
            format_change(o.file_size, o.new_file_size)
        ));
    }
    if let Some(o) = &offenders.scaled_down {
        lines.push(format!(
            "{}imageScaledDown: {}x{} shown at {}x{}",
            indent(1),
            o.natural_width,
            o.natural_height,
            o.new_width,
            o.new_height
        ));
    }
    if let Some(o) = &offenders.old_format {
        lines.push(format!(
            "{}imageOldFormat: {}, {} → {} as a modern format",
            indent(1),
            o.current_format,
            format_bytes(o.file_size),
            format_bytes(o.new_file_size)
        ));
    }
    if let Some(o) = &offenders.incorrect_sizes {
        lines.push(format!(
            "{}imageWithIncorrectSizesParam: sizes=\"{}\" selects {}px, displayed at {}px",
            indent(1),
            o.sizes_attribute,
            o.converted_in_px,
            o.display_width
        ));
    }
    if let Some(o) = &offenders.excessive_density {
        lines.push(format!(
            "{}imageExcessiveDensity: {:.2} (max {:.2})",
            indent(1),
            o.display_density,
            o.max_density
        ));
    }
    if lines.len() == before {
        lines.push(format!("{}none", indent(1)));
    }

    if !report.failures.is_empty() {
        lines.push(String::new());
        lines.push("Failed modules".to_string());
        for failure in &report.failures {
            lines.push(format!("{}{}: {}", indent(1), failure.module, failure.reason));
        }
    }

    lines
}

/// Print the summary to stdout.
pub fn print_report(report: &Report, source: &str) {
    for line in format_report(report, source) {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{IncorrectSizes, OldFormat, Offenders, Stats, Transforms};
    use crate::imaging::{BackendError, ImageFormat};
    use crate::pipeline::{ModuleError, ModuleFailure, ModuleId};

    fn report() -> Report {
        Report {
            generator: "analyze-image v0".to_string(),
            stats: Stats {
                format: Some(ImageFormat::Jpg),
                mime_type: Some("image/jpeg".to_string()),
                file_size: Some(20_000),
                width: Some(285),
                height: Some(427),
                animated: Some(false),
                display_density: Some(2.8475),
                display_ratio: Some(2.8475),
                ..Stats::default()
            },
            transforms: Transforms::default(),
            offenders: Offenders::default(),
            failures: Vec::new(),
        }
    }

    #[test]
    fn format_bytes_units() {
        assert_eq!(format_bytes(999), "999 B");
        assert_eq!(format_bytes(20_000), "20.0 KB");
        assert_eq!(format_bytes(2_500_000), "2.5 MB");
    }

    #[test]
    fn format_change_sign() {
        assert_eq!(format_change(1000, 750), "-25%");
        assert_eq!(format_change(1000, 1100), "+10%");
        assert_eq!(format_change(0, 10), "n/a");
    }

    #[test]
    fn clean_image_summary() {
        let lines = format_report(&report(), "photo.jpg");
        assert_eq!(
            lines,
            vec![
                "photo.jpg",
                "    jpg 285x427, 20.0 KB (image/jpeg)",
                "    Display density: 2.85 (ratio 2.85)",
                "",
                "Offenders",
                "    none",
            ]
        );
    }

    #[test]
    fn transforms_and_offenders() {
        let mut report = report();
        report.transforms.optimized = Some(TransformResult::new(20_000, vec![0; 15_000]));
        report.transforms.resized = Some(
            TransformResult::new(15_000, vec![0; 3_000]).with_dimensions((285, 427), (200, 100)),
        );
        report.offenders.old_format = Some(OldFormat {
            current_format: ImageFormat::Jpg,
            file_size: 20_000,
            new_file_size: 7_000,
            webp_size: Some(9_000),
            avif_size: Some(7_000),
        });
        report.offenders.incorrect_sizes = Some(IncorrectSizes {
            sizes_attribute: "5vw".to_string(),
            converted_in_px: 60,
            display_width: 200,
        });

        let lines = format_report(&report, "photo.jpg");

        assert!(lines.contains(&"Transforms".to_string()));
        assert!(lines.contains(&"    optimized: 20.0 KB → 15.0 KB (-25%)".to_string()));
        assert!(lines.contains(&"    resized: 15.0 KB → 3.0 KB, 285x427 → 200x100".to_string()));
        assert!(lines.contains(
            &"    imageOldFormat: jpg, 20.0 KB → 7.0 KB as a modern format".to_string()
        ));
        assert!(lines.contains(
            &"    imageWithIncorrectSizesParam: sizes=\"5vw\" selects 60px, displayed at 200px"
                .to_string()
        ));
        assert!(!lines.contains(&"    none".to_string()));
    }

    #[test]
    fn failures_are_listed() {
        let mut report = report();
        report.failures.push(ModuleFailure {
            module: ModuleId::Reformat,
            reason: ModuleError::Backend(BackendError::Transform("no encoder".into())),
        });

        let lines = format_report(&report, "photo.jpg");

        assert_eq!(lines[lines.len() - 2], "Failed modules");
        assert_eq!(
            lines[lines.len() - 1],
            "    reformat: Transform failed: no encoder"
        );
    }
}
