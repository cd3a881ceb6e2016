/// Tag assigned to records whose (port, protocol) has no lookup entry.
pub const UNTAGGED: &str = "Untagged";

/// Exact-match key into the lookup table.
///
/// `port` is kept as the literal token from the source, so `"080"` and `"80"`
/// are different keys. `protocol` is always lowercase.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookupKey {
    pub port: String,
    pub protocol: String,
}

impl LookupKey {
    pub fn new(port: impl Into<String>, protocol: &str) -> Self {
        LookupKey {
            port: port.into(),
            protocol: protocol.to_lowercase(),
        }
    }
}

/// One well-formed flow log line, borrowed from the line it was parsed from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRecord<'a> {
    pub dst_port: &'a str,
    pub protocol_number: &'a str,
    pub protocol: &'static str,
}

pub mod dto {
    use serde::Serialize;

    #[derive(Debug, Serialize, Clone, PartialEq, Eq)]
    pub struct TagCountDTO {
        pub tag: String,
        pub count: u64,
    }

    #[derive(Debug, Serialize, Clone, PartialEq, Eq)]
    pub struct PortProtocolCountDTO {
        pub port: String,
        pub protocol: String,
        pub count: u64,
    }

    #[derive(Debug, Serialize, Clone)]
    pub struct FlowReportDTO {
        pub tag_counts: Vec<TagCountDTO>,
        pub port_protocol_counts: Vec<PortProtocolCountDTO>,
        pub lines_read: u64,
        pub skipped_lines: u64,
    }
}
