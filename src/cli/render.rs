//! Human-readable rendering of command results

use colored::Colorize;

use crate::analysis::{
    Capabilities, ComprehensiveReport, HealthReport, InferenceOutcome, VisualAnalysis,
    VisualReport, VisualSection,
};
use crate::core::{ParseFailure, ParseResult};
use crate::display::{
    format_bytes, print_header, print_info, print_kind_gauge, print_kv, print_subheader,
    print_success, print_warning, StatusIcons,
};
use crate::extract::{ExtractionReport, ExtractionSummary, PersistReport};
use crate::normalize::Normalized;

pub fn metadata(result: &ParseResult) {
    print_header("DWF Metadata");
    print_kv("File", &result.file_info.path);
    print_kv(
        "Size",
        &format!(
            "{} ({} MB)",
            format_bytes(result.file_info.size_bytes),
            result.file_info.size_mb
        ),
    );
    print_kv("Version", &result.header.version);
    print_kv(
        "Application",
        result.header.application.as_deref().unwrap_or("-"),
    );

    print_subheader(&format!("Layers ({})", result.layers.len()));
    for layer in &result.layers {
        match &layer.color {
            Some(color) => println!(
                "  {} {}",
                layer.name.bright_white(),
                format!("[{}]", color).bright_black()
            ),
            None => println!("  {}", layer.name.bright_white()),
        }
    }

    print_subheader(&format!(
        "Object hints ({})",
        result.objects_summary.total_objects
    ));
    for (kind, count) in &result.objects_summary.types {
        print_kv(kind, &count.to_string());
    }

    if !result.ascii_sections.is_empty() {
        print_subheader("Text samples");
        for section in &result.ascii_sections {
            println!("  {}", section.bright_black());
        }
    }
}

pub fn parse_failure(failure: &ParseFailure) {
    crate::display::print_error(&failure.message);
    if let Some(info) = &failure.file_info {
        print_kv("Size", &format_bytes(info.size_bytes));
    }
}

fn summary(summary: &ExtractionSummary) {
    print_kv("Images", &summary.total_images.to_string());
    print_kv("Total size", &format_bytes(summary.total_size));

    if let Some(largest) = &summary.largest_image {
        print_kv(
            "Largest",
            &format!(
                "#{} {} at offset {} ({})",
                largest.index,
                largest.kind,
                largest.position,
                format_bytes(largest.size)
            ),
        );
    }
}

pub fn extraction(report: &ExtractionReport, show_skipped: bool) {
    print_header(&format!("{} Stream Extraction", StatusIcons::SCAN));
    print_kv("File", &report.file_path);
    summary(&report.summary);

    if report.images.is_empty() {
        print_info("No embedded image streams found");
    } else {
        let gauge: Vec<(String, usize, u64)> = report
            .summary
            .image_types
            .iter()
            .map(|(kind, count)| {
                let bytes: u64 = report
                    .images
                    .iter()
                    .filter(|img| &img.kind == kind)
                    .map(|img| img.size)
                    .sum();
                (kind.clone(), *count, bytes)
            })
            .collect();
        println!();
        print_kind_gauge(&gauge);

        print_subheader("Streams");
        for img in &report.images {
            println!(
                "  {:>3}  {:<13} {:>10}  @{:<10} {}",
                img.index,
                img.kind.cyan(),
                format_bytes(img.size),
                img.position,
                img.blake3[..16].bright_black()
            );
        }
    }

    if !report.skipped.is_empty() {
        if show_skipped {
            print_subheader(&format!("Skipped ({})", report.skipped.len()));
            for skip in &report.skipped {
                println!("  {:<13} @{:<10} {}", skip.kind.tag(), skip.offset, skip.reason);
            }
        } else {
            print_info(&format!(
                "{} occurrences skipped (use --show-skipped)",
                report.skipped.len()
            ));
        }
    }

    if let Some(persisted) = &report.persisted {
        persist(persisted);
    }
}

fn persist(report: &PersistReport) {
    println!();
    print_success(&format!(
        "Saved {} streams to {}",
        report.written.len(),
        report.output_dir.display()
    ));
    for failure in &report.failures {
        print_warning(&format!(
            "#{} not written to {}: {}",
            failure.index,
            failure.path.display(),
            failure.error
        ));
    }
}

pub fn normalized(result: &Normalized, out: &std::path::Path) {
    match result.fallback_reason() {
        None => print_success(&format!(
            "{} ({}) -> {}",
            result.status().as_str(),
            format_bytes(result.bytes().len() as u64),
            out.display()
        )),
        Some(reason) => print_warning(&format!(
            "{}: {} -> {}",
            result.status().as_str(),
            reason,
            out.display()
        )),
    }
}

fn visual_analysis(analysis: &VisualAnalysis) {
    print_kv(
        "Image",
        &format!(
            "#{} {} ({})",
            analysis.stream.index,
            analysis.stream.kind,
            format_bytes(analysis.stream.size)
        ),
    );
    print_kv("Focus", analysis.focus.as_str());
    print_kv("Normalized", analysis.normalize_status.as_str());
    if let Some(reason) = &analysis.normalize_fallback {
        print_kv("Placeholder reason", &reason.to_string());
    }
    print_kv("Method", &analysis.analysis_method);

    match &analysis.result {
        InferenceOutcome::Real { text } => {
            print_subheader(&format!("{} Analysis", StatusIcons::IMAGE));
            println!("{}", text);
        }
        InferenceOutcome::Fallback { reason, payload } => {
            print_warning(&format!("Inference unavailable: {}", reason));
            if let Some(rec) = payload["recommendation"].as_str() {
                print_info(rec);
            }
        }
    }
}

fn visual_section(section: &VisualSection) {
    match section {
        VisualSection::Analysis(analysis) => visual_analysis(analysis),
        VisualSection::Note { note } => print_info(note),
    }
}

pub fn visual(report: &VisualReport) {
    print_header("Visual Analysis");
    print_kv("File", &report.file_path);
    visual_section(&report.visual_analysis);
    if let Some(meta) = &report.metadata {
        print_subheader("Metadata");
        print_kv("Version", &meta.header.version);
        print_kv("Layers", &meta.layers.len().to_string());
        print_kv("Object hints", &meta.objects_summary.total_objects.to_string());
    }
}

pub fn comprehensive(report: &ComprehensiveReport) {
    print_header("Comprehensive Analysis");
    print_kv("File", &report.file_path);
    print_kv("Timestamp", &report.timestamp);

    print_subheader("Metadata");
    print_kv("Version", &report.metadata.header.version);
    print_kv(
        "Application",
        report.metadata.header.application.as_deref().unwrap_or("-"),
    );
    let names: Vec<&str> = report.metadata.layers.iter().map(|l| l.name.as_str()).collect();
    print_kv("Layers", &names.join(", "));

    print_subheader("Image extraction");
    summary(&report.image_extraction.summary);

    print_subheader("Visual analysis");
    visual_section(&report.visual_analysis);
}

pub fn capabilities(caps: &Capabilities) {
    print_header("Capabilities");
    print_kv("DWF versions", &caps.supported_dwf_versions.join(", "));
    print_kv("Image formats", &caps.supported_image_formats.join(", "));
    let focus: Vec<&str> = caps.analysis_focus_areas.iter().map(|f| f.as_str()).collect();
    print_kv("Focus areas", &focus.join(", "));
    print_kv("Max file size", &format!("{} MB", caps.max_file_size_mb));
}

pub fn health(report: &HealthReport) {
    print_header("Health Check");
    let status = if report.is_healthy() {
        report.status.green().bold()
    } else {
        report.status.yellow().bold()
    };
    println!("  {}: {}", "Status".bright_black(), status);
    print_kv("Version", &format!("{} {}", report.service, report.version));
    print_kv("Image processing", &report.image_processing);
    print_kv("Endpoint", &report.inference.endpoint);
    print_kv("Model", &report.inference.model);
    print_kv(
        "Credential",
        if report.inference.credential_present { "present" } else { "not set" },
    );
    if let Some(reachable) = report.inference.reachable {
        print_kv("Reachable", if reachable { "yes" } else { "no" });
    }
}
