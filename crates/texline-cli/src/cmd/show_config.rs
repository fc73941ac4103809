//! Config subcommand - print the effective configuration

use comfy_table::{Cell, Color, Table, modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL};

use crate::config::Config;

pub fn run(config: &Config) {
    eprintln!("\n{}", format_table(config));
}

fn format_table(config: &Config) -> Table {
    let crawl = config.crawl_config();
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

    table.add_row(vec![
        "Output directory",
        &crawl.output_dir.display().to_string(),
    ]);
    table.add_row(vec!["Stats directory", &crawl.stats_dir.display().to_string()]);
    table.add_row(vec![
        "Log file",
        &config
            .log_file()
            .map_or_else(|| "disabled".to_string(), |p| p.display().to_string()),
    ]);
    table.add_row(vec!["Workers", &crawl.workers.max(1).to_string()]);
    table.add_row(vec![
        "Retries",
        &format!(
            "{} attempts, {:.1}s apart",
            crawl.retry.max_attempts,
            crawl.retry.delay.as_secs_f64()
        ),
    ]);
    table.add_row(vec![
        "Delays",
        &format!(
            "version {:.1}s, probe {:.1}s, reference {:.1}s, paper {:.1}s",
            crawl.version_delay.as_secs_f64(),
            crawl.probe_delay.as_secs_f64(),
            crawl.reference_delay.as_secs_f64(),
            crawl.paper_delay.as_secs_f64()
        ),
    ]);
    table.add_row(vec![
        "Retained extensions",
        &crawl.retention.extensions().collect::<Vec<_>>().join(", "),
    ]);
    table.add_row(vec!["BibTeX", if crawl.fetch_bibtex { "yes" } else { "no" }]);
    table.add_row(vec![
        "References",
        if crawl.crawl_references { "yes" } else { "no" },
    ]);
    table.add_row(vec!["arXiv API URL", &config.arxiv.api_url]);
    table.add_row(vec!["arXiv source URL", &config.arxiv.source_url]);
    table.add_row(vec!["S2 API URL", &config.s2.api_url]);
    table.add_row(vec![
        "S2 API key",
        if config.s2.api_key.is_some() {
            "configured"
        } else {
            "not set"
        },
    ]);
    table.add_row(vec![
        "Read timeout",
        &format!("{}s", config.http.read_timeout),
    ]);
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_lists_settings_without_secrets() {
        let mut config = Config::default();
        config.s2.api_key = Some("secret-key".into());
        let rendered = format_table(&config).to_string();
        assert!(rendered.contains("configured"));
        assert!(!rendered.contains("secret-key"));
        assert!(rendered.contains("bib, json, tex"));
    }
}
