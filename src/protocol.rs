/// Name used for any protocol number missing from [`PROTOCOL_NAMES`].
pub const UNKNOWN_PROTOCOL: &str = "unknown";

/// IANA protocol numbers recognised in flow logs.
///
/// Closed table: a number not listed here is reported as `unknown`, never
/// passed through. Add a row to recognise another protocol.
pub const PROTOCOL_NAMES: &[(&str, &str)] = &[
    ("6", "tcp"),
    ("17", "udp"),
];

pub fn protocol_name(number: &str) -> &'static str {
    PROTOCOL_NAMES
        .iter()
        .find(|(n, _)| *n == number)
        .map(|(_, name)| *name)
        .unwrap_or(UNKNOWN_PROTOCOL)
}
