//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Color, ContentArrangement, Table};
use console::Style;
use e14z_cache::{CacheEntry, CacheStats, CleanupReport};
use e14z_types::{HealthTier, InstallOutcome, PackageDescriptor, ValidationResult};
use serde::Serialize;
use std::io;

/// One cache entry's integrity verdict
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityRow {
    pub name: String,
    pub version: String,
    pub intact: bool,
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    /// Use JSON output format
    json_output: bool,
}

impl OutputRenderer {
    pub fn new(json_output: bool) -> Self {
        Self { json_output }
    }

    fn render_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        println!("{json}");
        Ok(())
    }

    fn table(headers: &[&str]) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(
                headers
                    .iter()
                    .map(|h| Cell::new(h).add_attribute(Attribute::Bold))
                    .collect::<Vec<_>>(),
            );
        table
    }

    pub fn render_outcome(&self, outcome: &InstallOutcome) -> io::Result<()> {
        if self.json_output {
            return Self::render_json(outcome);
        }

        let (label, style) = match (outcome.success, outcome.health) {
            (true, HealthTier::Healthy) => ("[OK]", Style::new().green()),
            (_, HealthTier::Degraded) => ("[DEGRADED]", Style::new().yellow()),
            _ => ("[FAILED]", Style::new().red()),
        };
        println!("{} phase: {}", style.apply_to(label), outcome.phase);
        if let Some(error) = &outcome.error {
            let category = outcome.category.map(|c| c.to_string()).unwrap_or_default();
            println!("  error ({category}): {error}");
        }
        for suggestion in &outcome.suggestions {
            println!("  hint: {suggestion}");
        }
        if let Some(dir) = &outcome.cache_dir {
            println!("  cache: {}", dir.display());
        }
        if let Some(details) = &outcome.execution_details {
            println!(
                "  command: {} {}{}",
                details.command,
                details.args.join(" "),
                if details.cache_hit { " (cached)" } else { "" }
            );
            if let Some(server) = &details.server_name {
                println!(
                    "  server: {server} (protocol {})",
                    details.protocol_version.as_deref().unwrap_or("?")
                );
            }
        }

        if let Some(tools) = &outcome.tools {
            if tools.is_empty() {
                println!("No tools advertised.");
            } else {
                let mut table = Self::table(&["Tool", "Parameters", "Description"]);
                for tool in tools {
                    table.add_row(vec![
                        Cell::new(&tool.name),
                        Cell::new(tool.parameters.join(", ")),
                        Cell::new(&tool.description),
                    ]);
                }
                println!("{table}");
            }
        }
        Ok(())
    }

    pub fn render_descriptor(&self, descriptor: &PackageDescriptor) -> io::Result<()> {
        if self.json_output {
            return Self::render_json(descriptor);
        }
        let mut table = Self::table(&["Field", "Value"]);
        table.add_row(vec!["registry", descriptor.registry.as_str()]);
        table.add_row(vec!["name".to_string(), descriptor.full_name()]);
        table.add_row(vec!["version", descriptor.version.as_str()]);
        if let Some(url) = &descriptor.repository_url {
            table.add_row(vec!["repository", url.as_str()]);
        }
        if let Some(branch) = &descriptor.branch {
            table.add_row(vec!["branch", branch.as_str()]);
        }
        if !descriptor.extra_args.is_empty() {
            table.add_row(vec!["args".to_string(), descriptor.extra_args.join(" ")]);
        }
        println!("{table}");
        Ok(())
    }

    pub fn render_validation(
        &self,
        descriptor: &PackageDescriptor,
        result: &ValidationResult,
        min_score: u8,
    ) -> io::Result<()> {
        if self.json_output {
            return Self::render_json(result);
        }
        let blocked = result.is_blocking(min_score);
        let verdict = if blocked {
            Style::new().red().apply_to("BLOCKED")
        } else {
            Style::new().green().apply_to("ALLOWED")
        };
        println!(
            "{verdict} {} (score {}/100, threshold {min_score})",
            descriptor.full_name(),
            result.score()
        );
        if !result.threats().is_empty() {
            let mut table = Self::table(&["Severity", "Kind", "Finding"]);
            for threat in result.threats() {
                table.add_row(vec![
                    Cell::new(format!("{:?}", threat.severity)).fg(Color::Red),
                    Cell::new(format!("{:?}", threat.kind)),
                    Cell::new(&threat.message),
                ]);
            }
            println!("{table}");
        }
        for warning in result.warnings() {
            println!("  warning: {warning}");
        }
        Ok(())
    }

    pub fn render_stats(&self, stats: &CacheStats) -> io::Result<()> {
        if self.json_output {
            return Self::render_json(stats);
        }
        println!(
            "{} packages, {} bytes",
            stats.package_count, stats.total_size
        );
        Ok(())
    }

    pub fn render_entries(&self, entries: &[CacheEntry]) -> io::Result<()> {
        if self.json_output {
            return Self::render_json(entries);
        }
        if entries.is_empty() {
            println!("Cache is empty.");
            return Ok(());
        }
        let mut table = Self::table(&["Package", "Version", "Size", "Last used"]);
        for entry in entries {
            table.add_row(vec![
                Cell::new(&entry.name),
                Cell::new(&entry.version),
                Cell::new(entry.size),
                Cell::new(entry.last_accessed.format("%Y-%m-%d %H:%M")),
            ]);
        }
        println!("{table}");
        Ok(())
    }

    pub fn render_cleanup(&self, report: &CleanupReport) -> io::Result<()> {
        if self.json_output {
            return Self::render_json(report);
        }
        println!(
            "Removed {} entries, freed {} bytes",
            report.cleaned.len(),
            report.freed_bytes
        );
        for key in &report.skipped {
            println!("  skipped (in use): {key}");
        }
        Ok(())
    }

    pub fn render_integrity(&self, rows: &[IntegrityRow]) -> io::Result<()> {
        if self.json_output {
            return Self::render_json(rows);
        }
        let mut table = Self::table(&["Package", "Version", "Status"]);
        for row in rows {
            let status = if row.intact {
                Cell::new("ok").fg(Color::Green)
            } else {
                Cell::new("corrupted").fg(Color::Red)
            };
            table.add_row(vec![Cell::new(&row.name), Cell::new(&row.version), status]);
        }
        println!("{table}");
        Ok(())
    }

    pub fn render_recovered(&self, count: usize) -> io::Result<()> {
        if self.json_output {
            return Self::render_json(&serde_json::json!({ "recovered": count }));
        }
        println!("Recovered {count} interrupted install(s).");
        Ok(())
    }
}
