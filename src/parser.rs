// Flow log line decoding. Positions are fixed by the record layout, not
// inferred from content.

use crate::models::FlowRecord;
use crate::protocol::protocol_name;

/// Field positions of a flow log record (0-indexed, whitespace-separated).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlowRecordLayout {
    pub min_fields: usize,
    pub dst_port: usize,
    pub protocol: usize,
}

pub const FLOW_RECORD_LAYOUT: FlowRecordLayout = FlowRecordLayout {
    min_fields: 13,
    dst_port: 5,
    protocol: 7,
};

/// Returns `None` for malformed lines (fewer fields than the layout needs).
pub fn parse_line(line: &str) -> Option<FlowRecord<'_>> {
    parse_line_with(line, &FLOW_RECORD_LAYOUT)
}

pub fn parse_line_with<'a>(line: &'a str, layout: &FlowRecordLayout) -> Option<FlowRecord<'a>> {
    let mut dst_port = None;
    let mut protocol_number = None;
    let mut fields = 0;

    for (idx, token) in line.split_whitespace().enumerate() {
        if idx == layout.dst_port {
            dst_port = Some(token);
        }
        if idx == layout.protocol {
            protocol_number = Some(token);
        }
        fields += 1;
        if fields >= layout.min_fields && dst_port.is_some() && protocol_number.is_some() {
            break;
        }
    }

    if fields < layout.min_fields {
        return None;
    }

    let dst_port = dst_port?;
    let protocol_number = protocol_number?;
    Some(FlowRecord {
        dst_port,
        protocol_number,
        protocol: protocol_name(protocol_number),
    })
}
