//! NMEA sentence framing for outgoing records.
//!
//! Checksum is the XOR of every byte between the leading `$`/`!` and the
//! first `*`, written as two uppercase hex digits.

/// Line terminator appended to raw positioning sentences
pub const CRLF: &str = "\r\n";

/// XOR checksum of a sentence body.
///
/// Accepts either a full sentence (`$...*HH`) or a bare body; a leading
/// `$` or `!` is skipped and accumulation stops at the first `*`.
pub fn checksum(sentence: &str) -> u8 {
    let body = sentence
        .strip_prefix('$')
        .or_else(|| sentence.strip_prefix('!'))
        .unwrap_or(sentence);
    body.bytes()
        .take_while(|&b| b != b'*')
        .fold(0u8, |acc, b| acc ^ b)
}

/// Wrap a body as `$<body>*HH`
pub fn sentence_with_checksum(body: &str) -> String {
    format!("${}*{:02X}", body, checksum(body))
}

/// Check the embedded `*HH` against the recomputed checksum
pub fn verify_checksum(sentence: &str) -> bool {
    let sentence = sentence.trim_end_matches(['\r', '\n']);
    let Some(star) = sentence.find('*') else {
        return false;
    };
    let embedded = &sentence[star + 1..];
    if embedded.len() != 2 {
        return false;
    }
    match u8::from_str_radix(embedded, 16) {
        Ok(value) => value == checksum(sentence),
        Err(_) => false,
    }
}

/// Heading sentence `$HDM,<deg>,M*HH\n`
pub fn format_heading(heading_deg: f64) -> String {
    let mut rounded = (heading_deg * 10.0).round() / 10.0;
    if rounded >= 360.0 {
        rounded = 0.0;
    }
    let mut sentence = sentence_with_checksum(&format!("HDM,{:.1},M", rounded));
    sentence.push('\n');
    sentence
}

/// Datagram payload for one raw positioning sentence.
///
/// The sentence keeps its content untouched; trailing line breaks are
/// normalised to a single CRLF. With a heading the `$HDM` line follows.
pub fn compose_record(raw_sentence: &str, heading_deg: Option<f64>) -> String {
    let mut record = String::with_capacity(raw_sentence.len() + 24);
    record.push_str(raw_sentence.trim_end_matches(['\r', '\n']));
    record.push_str(CRLF);
    if let Some(heading) = heading_deg {
        record.push_str(&format_heading(heading));
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_zero_reference() {
        // 'H'^'D'^'M'^','^'0'^'.'^'0'^','^'M' == 0x22
        assert_eq!(checksum("HDM,0.0,M"), 0x22);
        assert_eq!(format_heading(0.0), "$HDM,0.0,M*22\n");
    }

    #[test]
    fn test_heading_formatting() {
        assert_eq!(format_heading(90.0), "$HDM,90.0,M*1B\n");
        assert_eq!(format_heading(359.94), "$HDM,359.9,M*24\n");
        assert_eq!(format_heading(359.96), "$HDM,0.0,M*22\n");
        assert!(format_heading(123.456).starts_with("$HDM,123.5,M*"));
    }

    #[test]
    fn test_heading_checksum_roundtrip() {
        for heading in [0.0, 12.3, 45.0, 180.05, 271.9, 359.9] {
            let sentence = format_heading(heading);
            let star = sentence.find('*').unwrap();
            let embedded = u8::from_str_radix(&sentence[star + 1..star + 3], 16).unwrap();
            assert_eq!(checksum(&sentence[..star]), embedded);
            assert!(verify_checksum(&sentence));
        }
    }

    #[test]
    fn test_checksum_ignores_delimiters() {
        assert_eq!(checksum("$HDM,0.0,M*22"), 0x22);
        assert_eq!(checksum("!HDM,0.0,M"), 0x22);
        assert_eq!(checksum("HDM,0.0,M*FF*00"), 0x22);
        assert_eq!(checksum(""), 0);
    }

    #[test]
    fn test_known_gga_sentence() {
        let gga = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
        assert!(verify_checksum(gga));
        assert!(verify_checksum(&format!("{}\r\n", gga)));
        assert!(!verify_checksum("$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*48"));
        assert!(!verify_checksum("$GPGGA,123519"));
        assert!(!verify_checksum("$GPGGA,123519*ZZ"));
    }

    #[test]
    fn test_sentence_with_checksum() {
        assert_eq!(
            sentence_with_checksum("GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,"),
            "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47"
        );
    }

    #[test]
    fn test_compose_record() {
        let raw = "$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47";
        assert_eq!(compose_record(raw, None), format!("{}\r\n", raw));
        assert_eq!(
            compose_record(&format!("{}\r\n", raw), Some(0.0)),
            format!("{}\r\n$HDM,0.0,M*22\n", raw)
        );
    }

    #[test]
    fn test_compose_record_passes_bad_sentences_through() {
        assert_eq!(compose_record("garbage*ZZ", None), "garbage*ZZ\r\n");
    }
}
