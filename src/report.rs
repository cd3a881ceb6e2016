use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use clap::ValueEnum;
use tracing::info;

use crate::aggregate::{FlowCounts, Tally};
use crate::error::{FlowTagError, Result};
use crate::models::dto::{FlowReportDTO, PortProtocolCountDTO, TagCountDTO};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportOptions {
    pub format: ReportFormat,
    /// Order rows by descending count; ties keep first-seen order.
    pub sort_by_count: bool,
}

fn ordered<K>(tally: &Tally<K>, sort_by_count: bool) -> Vec<(&K, u64)>
where
    K: Eq + std::hash::Hash + Clone,
{
    let mut rows: Vec<_> = tally.iter().collect();
    if sort_by_count {
        // stable
        rows.sort_by(|a, b| b.1.cmp(&a.1));
    }
    rows
}

pub fn to_dto(counts: &FlowCounts, sort_by_count: bool) -> FlowReportDTO {
    FlowReportDTO {
        tag_counts: ordered(&counts.tags, sort_by_count)
            .into_iter()
            .map(|(tag, count)| TagCountDTO {
                tag: tag.clone(),
                count,
            })
            .collect(),
        port_protocol_counts: ordered(&counts.port_protocols, sort_by_count)
            .into_iter()
            .map(|(key, count)| PortProtocolCountDTO {
                port: key.port.clone(),
                protocol: key.protocol.clone(),
                count,
            })
            .collect(),
        lines_read: counts.lines_read,
        skipped_lines: counts.skipped_lines,
    }
}

pub fn render_text(counts: &FlowCounts, sort_by_count: bool) -> String {
    let mut out = String::new();

    out.push_str("Tag Counts:\n");
    out.push_str("Tag,Count\n");
    for (tag, count) in ordered(&counts.tags, sort_by_count) {
        let _ = writeln!(out, "{},{}", tag, count);
    }

    out.push_str("\nPort/Protocol Combination Counts:\n");
    out.push_str("Port,Protocol,Count\n");
    for (key, count) in ordered(&counts.port_protocols, sort_by_count) {
        let _ = writeln!(out, "{},{},{}", key.port, key.protocol, count);
    }

    out
}

pub fn render_json(counts: &FlowCounts, sort_by_count: bool) -> Result<String> {
    let mut json = serde_json::to_string_pretty(&to_dto(counts, sort_by_count))?;
    json.push('\n');
    Ok(json)
}

pub fn render(counts: &FlowCounts, options: ReportOptions) -> Result<String> {
    match options.format {
        ReportFormat::Text => Ok(render_text(counts, options.sort_by_count)),
        ReportFormat::Json => render_json(counts, options.sort_by_count),
    }
}

/// Renders the whole report before touching `path`, so a failed render never
/// leaves a partial file behind.
pub fn write_report(path: impl AsRef<Path>, counts: &FlowCounts, options: ReportOptions) -> Result<()> {
    let path = path.as_ref();
    let contents = render(counts, options)?;
    fs::write(path, contents).map_err(|source| FlowTagError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Report written to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::classify;
    use crate::lookup::LookupTable;
    use crate::models::LookupKey;

    fn sample_counts() -> FlowCounts {
        let table: LookupTable = vec![
            (LookupKey::new("25", "tcp"), "sv_P1".to_string()),
            (LookupKey::new("68", "udp"), "sv_P2".to_string()),
        ]
        .into_iter()
        .collect();
        classify(
            [
                "2 a b c d 25 f 6 h i j k l",
                "2 a b c d 99 f 47 h i j k l",
                "2 a b c d 68 f 17 h i j k l",
                "2 a b c d 68 f 17 h i j k l",
            ],
            &table,
        )
    }

    #[test]
    fn text_layout_in_first_seen_order() {
        let expected = "\
Tag Counts:
Tag,Count
sv_P1,1
Untagged,1
sv_P2,2

Port/Protocol Combination Counts:
Port,Protocol,Count
25,tcp,1
99,unknown,1
68,udp,2
";
        assert_eq!(render_text(&sample_counts(), false), expected);
    }

    #[test]
    fn sorted_text_is_stable() {
        let text = render_text(&sample_counts(), true);
        let tag_rows: Vec<_> = text.lines().skip(2).take(3).collect();
        assert_eq!(tag_rows, vec!["sv_P2,2", "sv_P1,1", "Untagged,1"]);
    }

    #[test]
    fn empty_counts_render_headers_only() {
        let text = render_text(&FlowCounts::new(), false);
        assert_eq!(
            text,
            "Tag Counts:\nTag,Count\n\nPort/Protocol Combination Counts:\nPort,Protocol,Count\n"
        );
    }

    #[test]
    fn json_report_shape() {
        let json = render_json(&sample_counts(), false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tag_counts"][0]["tag"], "sv_P1");
        assert_eq!(value["tag_counts"][2]["count"], 2);
        assert_eq!(value["port_protocol_counts"][1]["protocol"], "unknown");
        assert_eq!(value["lines_read"], 4);
        assert_eq!(value["skipped_lines"], 0);
    }
}
