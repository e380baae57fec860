use regex::Regex;

/// Structured field set extracted from one card-format file.
///
/// Every field is optional except `name`, which falls back to the
/// `UNKNOWN` sentinel so downstream rendering never sees an empty name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub name: String,
    pub phones: Vec<String>,
    pub emails: Vec<String>,
    pub organization: Option<String>,
    pub title: Option<String>,
    pub note: Option<String>,
    pub birthday: Option<String>,
    pub addresses: Vec<String>,
    pub call_type: Option<String>,
    pub call_date: Option<String>,
}

pub const UNKNOWN_NAME: &str = "UNKNOWN";

/// Tolerant vCard field extractor.
///
/// Field tags are matched case-insensitively and independently of one
/// another; malformed or missing fields are simply not matched. Parsing
/// never fails.
pub struct VcardParser {
    formatted_name: Regex,
    structured_name: Regex,
    telephone: Regex,
    email: Regex,
    organization: Regex,
    title: Regex,
    note: Regex,
    birthday: Regex,
    address: Regex,
    call_type: Regex,
    call_date: Regex,
}

impl VcardParser {
    pub fn new() -> Self {
        // Parameter suffixes (";TYPE=CELL" etc.) before the colon are
        // ignored for multi-valued tags.
        Self {
            formatted_name: compile(r"(?i)FN:([^\r\n]+)"),
            structured_name: compile(r"(?i)N:([^;\r\n]*);([^;\r\n]*);"),
            telephone: compile(r"(?i)TEL(?:;[^:\r\n]*)*:([^\r\n]+)"),
            email: compile(r"(?i)EMAIL(?:;[^:\r\n]*)*:([^\r\n]+)"),
            organization: compile(r"(?i)ORG:([^\r\n]+)"),
            title: compile(r"(?i)TITLE:([^\r\n]+)"),
            note: compile(r"(?i)NOTE:([^\r\n]+)"),
            birthday: compile(r"(?i)BDAY:([^\r\n]+)"),
            address: compile(r"(?i)ADR(?:;[^:\r\n]*)*:([^ \r\n]+)"),
            call_type: compile(r"(?i)X-BT-CALL-TYPE:([^\r\n]+)"),
            call_date: compile(r"(?i)X-BT-CALL-DATE:([^\r\n]+)"),
        }
    }

    pub fn parse(&self, content: &str) -> Record {
        Record {
            name: self.extract_name(content),
            phones: self
                .telephone
                .captures_iter(content)
                .map(|c| c[1].trim().replace(['-', ' '], ""))
                .collect(),
            emails: self
                .email
                .captures_iter(content)
                .map(|c| c[1].trim().to_string())
                .collect(),
            organization: self.first_match(&self.organization, content),
            title: self.first_match(&self.title, content),
            note: self.first_match(&self.note, content),
            birthday: self.first_match(&self.birthday, content),
            addresses: self
                .address
                .captures_iter(content)
                .map(|c| c[1].trim().to_string())
                .collect(),
            call_type: self.first_match(&self.call_type, content),
            call_date: self.first_match(&self.call_date, content),
        }
    }

    /// Prefers the formatted full-name tag; falls back to joining the
    /// structured name's first/last components; never resolves empty.
    fn extract_name(&self, content: &str) -> String {
        if let Some(caps) = self.formatted_name.captures(content) {
            let name = caps[1].trim();
            if !name.is_empty() {
                return name.to_string();
            }
        }

        if let Some(caps) = self.structured_name.captures(content) {
            let last = caps[1].trim();
            let first = caps[2].trim();
            let joined = format!("{} {}", first, last).trim().to_string();
            if !joined.is_empty() {
                return joined;
            }
        }

        UNKNOWN_NAME.to_string()
    }

    fn first_match(&self, pattern: &Regex, content: &str) -> Option<String> {
        pattern
            .captures(content)
            .map(|caps| caps[1].trim().to_string())
    }
}

impl Default for VcardParser {
    fn default() -> Self {
        Self::new()
    }
}

fn compile(pattern: &str) -> Regex {
    // Patterns are compile-time literals; a failure here is a programming
    // error, not an input condition.
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid field pattern {pattern}: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(content: &str) -> Record {
        VcardParser::new().parse(content)
    }

    #[test]
    fn test_formatted_name_preferred() {
        let record = parse("BEGIN:VCARD\r\nN:Doe;Jane;;;\r\nFN:Jane A. Doe\r\nEND:VCARD\r\n");
        assert_eq!(record.name, "Jane A. Doe");
    }

    #[test]
    fn test_structured_name_fallback() {
        let record = parse("BEGIN:VCARD\r\nN:Doe;Jane;;;\r\nEND:VCARD\r\n");
        assert_eq!(record.name, "Jane Doe");
    }

    #[test]
    fn test_partial_structured_name() {
        let record = parse("N:Doe;;\r\n");
        assert_eq!(record.name, "Doe");

        let record = parse("N:;Jane;\r\n");
        assert_eq!(record.name, "Jane");
    }

    #[test]
    fn test_missing_name_yields_unknown() {
        let record = parse("BEGIN:VCARD\r\nTEL:555-1234\r\nEND:VCARD\r\n");
        assert_eq!(record.name, UNKNOWN_NAME);

        let record = parse("");
        assert_eq!(record.name, UNKNOWN_NAME);
        assert!(!record.name.is_empty());
    }

    #[test]
    fn test_phone_order_and_stripping() {
        let content = "TEL;TYPE=CELL:555-123 4567\r\nTEL:01 23 45 67\r\nTEL;HOME:999-0000\r\n";
        let record = parse(content);
        assert_eq!(record.phones, vec!["5551234567", "01234567", "9990000"]);
    }

    #[test]
    fn test_emails_preserve_value() {
        let content = "EMAIL;TYPE=WORK:jane@work.example\r\nEMAIL: jane@home.example \r\n";
        let record = parse(content);
        assert_eq!(
            record.emails,
            vec!["jane@work.example", "jane@home.example"]
        );
    }

    #[test]
    fn test_case_insensitive_tags() {
        let record = parse("fn:Jane Doe\r\ntel:555-1234\r\nemail:jane@x.com\r\n");
        assert_eq!(record.name, "Jane Doe");
        assert_eq!(record.phones, vec!["5551234"]);
        assert_eq!(record.emails, vec!["jane@x.com"]);
    }

    #[test]
    fn test_optional_scalar_fields() {
        let content = "FN:Jane Doe\r\nORG:Acme Corp\r\nTITLE:Engineer\r\nBDAY:1990-05-01\r\nNOTE:Met at the conference\r\n";
        let record = parse(content);
        assert_eq!(record.organization.as_deref(), Some("Acme Corp"));
        assert_eq!(record.title.as_deref(), Some("Engineer"));
        assert_eq!(record.birthday.as_deref(), Some("1990-05-01"));
        assert_eq!(record.note.as_deref(), Some("Met at the conference"));
    }

    #[test]
    fn test_first_scalar_match_wins() {
        let record = parse("ORG:First Org\r\nORG:Second Org\r\n");
        assert_eq!(record.organization.as_deref(), Some("First Org"));
    }

    #[test]
    fn test_addresses_exclude_spaced_tail() {
        let content = "ADR;TYPE=HOME:;;12-Main-St;Springfield extra ignored\r\nADR:;;Box-42\r\n";
        let record = parse(content);
        assert_eq!(record.addresses, vec![";;12-Main-St;Springfield", ";;Box-42"]);
    }

    #[test]
    fn test_call_history_fields() {
        let content =
            "FN:Jane Doe\r\nX-BT-CALL-TYPE:MISSED\r\nX-BT-CALL-DATE:20240110T093000\r\n";
        let record = parse(content);
        assert_eq!(record.call_type.as_deref(), Some("MISSED"));
        assert_eq!(record.call_date.as_deref(), Some("20240110T093000"));
    }

    #[test]
    fn test_absent_fields_are_empty() {
        let record = parse("FN:Jane Doe\r\n");
        assert!(record.phones.is_empty());
        assert!(record.emails.is_empty());
        assert!(record.addresses.is_empty());
        assert!(record.organization.is_none());
        assert!(record.call_type.is_none());
    }
}
