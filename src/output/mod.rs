//! Output assembly: section merging, file writing, and run summaries

use crate::extract::ExtractionResult;
use crate::pipeline::RunReport;
use chrono::Utc;
use std::path::{Path, PathBuf};

/// Subdirectory of the output root holding per-source markdown files
const MARKDOWN_SUBDIR: &str = "llms";

/// Merges a source's succeeded sections into one document
///
/// Multi-section sources get machine-parseable separators; a lone section
/// passes through untouched. Failed and skipped units contribute nothing.
pub fn merge_sections(source_id: &str, results: &[ExtractionResult]) -> String {
    let sections: Vec<&ExtractionResult> = results.iter().filter(|r| r.succeeded()).collect();

    match sections.as_slice() {
        [] => String::new(),
        [only] => only.text.clone(),
        many => {
            let mut merged = String::new();
            for (i, section) in many.iter().enumerate() {
                if i > 0 {
                    merged.push_str("\n\n");
                }
                merged.push_str(&format!("<|llms-section-{}-{}|>\n", source_id, i));
                merged.push_str(section.text.trim_end());
            }
            merged
        }
    }
}

/// Writes one markdown artifact with a generation-timestamp header
pub fn save_markdown(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let document = format!(
        "<!-- Generated: {} -->\n\n{}\n",
        Utc::now().to_rfc3339(),
        content.trim_end()
    );
    std::fs::write(path, document)
}

/// Renders the top-level llms.txt index as markdown, one bullet link per
/// generated file
pub fn render_index(written: &[(String, PathBuf)]) -> String {
    let mut index = String::from("# llms.txt\n\n");
    index.push_str(&format!("Generated: {}\n\n", Utc::now().to_rfc3339()));
    for (source_id, path) in written {
        index.push_str(&format!("- [{}]({})\n", source_id, path.display()));
    }
    index
}

/// Writes every source's merged document plus the llms.txt index
///
/// Sources with no succeeded sections produce no file. Returns the paths
/// written, index last.
pub fn write_outputs(report: &RunReport, output_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for source in &report.sources {
        let merged = merge_sections(&source.source_id, &source.results);
        if merged.trim().is_empty() {
            tracing::warn!("Source '{}': nothing to write", source.source_id);
            continue;
        }

        let path = output_dir.join(MARKDOWN_SUBDIR).join(&source.output);
        save_markdown(&path, &merged)?;
        tracing::info!("Wrote {}", path.display());
        written.push((source.source_id.clone(), path));
    }

    let index_entries: Vec<(String, PathBuf)> = written
        .iter()
        .map(|(id, path)| {
            let relative = path
                .strip_prefix(output_dir)
                .map(Path::to_path_buf)
                .unwrap_or_else(|_| path.clone());
            (id.clone(), relative)
        })
        .collect();

    let mut paths: Vec<PathBuf> = written.into_iter().map(|(_, p)| p).collect();

    if !paths.is_empty() {
        let index_path = output_dir.join("llms.txt");
        std::fs::create_dir_all(output_dir)?;
        std::fs::write(&index_path, render_index(&index_entries))?;
        paths.push(index_path);
    }

    Ok(paths)
}

/// Prints the per-source outcome and usage tables
pub fn print_summary(report: &RunReport) {
    println!("\nRun summary");
    for source in &report.sources {
        match &source.error {
            Some(error) => println!("  {:<20} error: {}", source.source_id, error),
            None => println!(
                "  {:<20} {} succeeded, {} failed, {} skipped",
                source.source_id,
                source.succeeded(),
                source.failed(),
                source.skipped()
            ),
        }
    }

    let cost = &report.cost;
    println!("\nExtraction usage ({})", cost.model);
    println!(
        "  {:<20} {:>6} {:>10} {:>10}  {}",
        "source", "calls", "input", "output", "truncated"
    );
    for (source_id, usage) in &cost.per_source {
        println!(
            "  {:<20} {:>6} {:>10} {:>10}  {}",
            source_id,
            usage.calls,
            usage.input_tokens,
            usage.output_tokens,
            if usage.truncated { "yes" } else { "no" }
        );
    }
    println!(
        "  total: {} calls, {} input / {} output tokens, estimated ${:.4}",
        cost.calls, cost.input_tokens, cost.output_tokens, cost.estimated_cost_usd
    );

    if let Some(reason) = &report.aborted {
        println!("\nRun aborted: {}", reason);
    }
}
