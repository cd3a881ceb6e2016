use std::path::PathBuf;

use clap::Parser;

use crate::report::{ReportFormat, ReportOptions};

/// Tag flow log records by destination port and protocol.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Args {
    /// Lookup table CSV with dstport, protocol and tag columns
    #[arg(long, env = "FLOWTAG_LOOKUP", default_value = "Logs/lookup_table.csv")]
    pub lookup: PathBuf,

    /// Flow log to classify
    #[arg(long, env = "FLOWTAG_FLOW_LOG", default_value = "Logs/flow_logs.txt")]
    pub flow_log: PathBuf,

    /// Where to write the report
    #[arg(short, long, env = "FLOWTAG_OUTPUT", default_value = "output_results.csv")]
    pub output: PathBuf,

    /// Report format: the two-section text report or JSON
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,

    /// Order report rows by descending count instead of first-seen order
    #[arg(long, default_value_t = false)]
    pub sort: bool,

    /// Worker threads for classification (1 streams on the calling thread)
    #[arg(short, long, env = "FLOWTAG_WORKERS", default_value_t = 1)]
    pub workers: usize,

    /// Enable debug logging
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Args {
    pub fn report_options(&self) -> ReportOptions {
        ReportOptions {
            format: self.format,
            sort_by_count: self.sort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::try_parse_from(["flowtag"]).unwrap();
        assert_eq!(args.lookup, PathBuf::from("Logs/lookup_table.csv"));
        assert_eq!(args.flow_log, PathBuf::from("Logs/flow_logs.txt"));
        assert_eq!(args.output, PathBuf::from("output_results.csv"));
        assert_eq!(args.format, ReportFormat::Text);
        assert_eq!(args.workers, 1);
        assert!(!args.sort);
    }

    #[test]
    fn overrides() {
        let args = Args::try_parse_from([
            "flowtag", "--lookup", "t.csv", "--flow-log", "f.txt", "-o", "out.json",
            "--format", "json", "--sort", "-w", "4",
        ])
        .unwrap();
        assert_eq!(args.lookup, PathBuf::from("t.csv"));
        assert_eq!(args.workers, 4);
        let options = args.report_options();
        assert_eq!(options.format, ReportFormat::Json);
        assert!(options.sort_by_count);
    }

    #[test]
    fn every_option_has_help_text() {
        use clap::CommandFactory;
        let cmd = Args::command();
        for arg in cmd.get_arguments() {
            let id = arg.get_id().as_str();
            if id == "help" || id == "version" {
                continue;
            }
            assert!(arg.get_help().is_some(), "--{} has no help text", id);
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }
}
