// CSV input scanning and result export

use gridbatch_core::OutputRecord;

/// Prepended to CSV artifacts so spreadsheet applications detect UTF-8.
pub const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Decode input bytes to text (handles Windows-1252, Latin-1, etc.)
///
/// A leading UTF-8 byte-order mark is dropped.
pub fn decode(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    // Try UTF-8 first; on failure, recover the buffer from the error
    match String::from_utf8(bytes.to_vec()) {
        Ok(s) => s,
        Err(e) => {
            let bytes = e.into_bytes();
            // Fall back to Windows-1252 (common for Excel-exported CSVs)
            log::debug!("input is not UTF-8, decoding as Windows-1252");
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            decoded.into_owned()
        }
    }
}

/// Split CSV text into rows of cells in a single pass.
///
/// - `"` toggles quoting; `""` inside a quoted field is one literal quote
/// - `,` outside quotes ends the field
/// - `\r\n`, `\n` or `\r` outside quotes ends the row
/// - line breaks inside quotes are kept, normalized to `\n`
///
/// A line with no characters at all yields a row with zero cells. A final
/// line terminator does not open a new row.
pub fn parse_rows(text: &str) -> Vec<Vec<String>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    // Anything consumed since the last row terminator
    let mut pending = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                chars.next();
                field.push('"');
            }
            '"' => {
                in_quotes = !in_quotes;
                pending = true;
            }
            ',' if !in_quotes => {
                row.push(std::mem::take(&mut field));
                pending = true;
            }
            '\r' | '\n' => {
                if c == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                if in_quotes {
                    field.push('\n');
                    continue;
                }
                if pending {
                    row.push(std::mem::take(&mut field));
                }
                rows.push(std::mem::take(&mut row));
                pending = false;
            }
            _ => {
                field.push(c);
                pending = true;
            }
        }
    }

    if pending {
        row.push(field);
        rows.push(row);
    }

    rows
}

/// Lossy field normalization for export: quotes doubled, `\n` becomes a
/// space, `\r` is dropped. The caller wraps the result in quotes.
pub fn escape_field(field: &str) -> String {
    field.replace('"', "\"\"").replace('\n', " ").replace('\r', "")
}

/// Render result records as CSV text (no BOM, no trailing newline).
///
/// The header row is bare; every data field is quoted.
pub fn to_csv_string(records: &[OutputRecord]) -> String {
    let mut lines = Vec::with_capacity(records.len() + 1);
    lines.push(OutputRecord::HEADERS.join(","));

    for record in records {
        let line = record
            .fields()
            .iter()
            .map(|f| format!("\"{}\"", escape_field(f)))
            .collect::<Vec<_>>()
            .join(",");
        lines.push(line);
    }

    lines.join("\n")
}

/// CSV artifact bytes: BOM followed by [`to_csv_string`].
pub fn export_bytes(records: &[OutputRecord]) -> Vec<u8> {
    let body = to_csv_string(records);
    let mut bytes = Vec::with_capacity(UTF8_BOM.len() + body.len());
    bytes.extend_from_slice(UTF8_BOM);
    bytes.extend_from_slice(body.as_bytes());
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    fn out(id: &str, user: &str, assistant: &str) -> OutputRecord {
        OutputRecord { id: id.into(), user: user.into(), assistant: assistant.into() }
    }

    #[test]
    fn test_embedded_comma_and_newline() {
        let rows = parse_rows("\"a,b\",\"c\nd\",e");
        assert_eq!(rows, vec![vec!["a,b".to_string(), "c\nd".to_string(), "e".to_string()]]);
    }

    #[test]
    fn test_doubled_quote_escape() {
        let rows = parse_rows("\"he said \"\"hi\"\"\"");
        assert_eq!(rows, vec![vec!["he said \"hi\"".to_string()]]);
    }

    #[test]
    fn test_crlf_and_lf_equivalent() {
        let lf = parse_rows("id,user\n1,hello\n2,world\n");
        let crlf = parse_rows("id,user\r\n1,hello\r\n2,world\r\n");
        let cr = parse_rows("id,user\r1,hello\r2,world\r");
        assert_eq!(lf, crlf);
        assert_eq!(lf, cr);
        assert_eq!(lf.len(), 3);
    }

    #[test]
    fn test_trailing_terminator_no_spurious_row() {
        let rows = parse_rows("id,user\r\n1,x\r\n");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["1", "x"]);
    }

    #[test]
    fn test_final_row_without_terminator_flushed() {
        let rows = parse_rows("id,user\n1,x");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["1", "x"]);
    }

    #[test]
    fn test_trailing_comma_yields_empty_field() {
        let rows = parse_rows("a,\n");
        assert_eq!(rows, vec![vec!["a".to_string(), String::new()]]);
    }

    #[test]
    fn test_blank_line_has_zero_cells() {
        let rows = parse_rows("id,user\n\n1,x\n");
        assert_eq!(rows.len(), 3);
        assert!(rows[1].is_empty());
    }

    #[test]
    fn test_empty_quoted_field_is_a_cell() {
        let rows = parse_rows("\"\"\n");
        assert_eq!(rows, vec![vec![String::new()]]);
    }

    #[test]
    fn test_crlf_inside_quotes_normalized() {
        let rows = parse_rows("1,\"line one\r\nline two\"\r\n");
        assert_eq!(rows, vec![vec!["1".to_string(), "line one\nline two".to_string()]]);
    }

    #[test]
    fn test_unterminated_quote_flushes_remaining_text() {
        let rows = parse_rows("1,\"open field\nstill open");
        assert_eq!(rows, vec![vec!["1".to_string(), "open field\nstill open".to_string()]]);
    }

    #[test]
    fn test_matches_csv_crate_on_quoted_input() {
        let text = "id,user,note\n1,\"Doe, Jane\",\"multi\nline\"\n2,\"say \"\"cheese\"\"\",plain\n";
        let ours = parse_rows(text);

        let mut reader = ::csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(text.as_bytes());
        let theirs: Vec<Vec<String>> = reader
            .records()
            .map(|r| r.unwrap().iter().map(String::from).collect())
            .collect();

        assert_eq!(ours, theirs);
    }

    #[test]
    fn test_decode_strips_bom() {
        let bytes = b"\xEF\xBB\xBFid,user\n";
        assert_eq!(decode(bytes), "id,user\n");
    }

    #[test]
    fn test_decode_windows_1252_fallback() {
        // 0xE9 = 'é' in Windows-1252, invalid as a lone UTF-8 byte
        let bytes = b"id,user\n1,caf\xE9\n";
        assert_eq!(decode(bytes), "id,user\n1,café\n");
    }

    #[test]
    fn test_escape_field_lossy() {
        assert_eq!(escape_field("He said \"hi\"\nbye"), "He said \"\"hi\"\" bye");
        assert_eq!(escape_field("a\r\nb"), "a b");
        assert_eq!(escape_field("plain"), "plain");
    }

    #[test]
    fn test_csv_export_layout() {
        let records = vec![out("1", "He said \"hi\"\nbye", "ok"), out("2", "q", "")];
        let text = to_csv_string(&records);
        let lines: Vec<&str> = text.split('\n').collect();

        assert_eq!(lines[0], "id,user,assistant");
        assert_eq!(lines[1], "\"1\",\"He said \"\"hi\"\" bye\",\"ok\"");
        assert_eq!(lines[2], "\"2\",\"q\",\"\"");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn test_export_bytes_prefixed_with_bom() {
        let bytes = export_bytes(&[out("1", "u", "a")]);
        assert!(bytes.starts_with(UTF8_BOM));
        let body = std::str::from_utf8(&bytes[UTF8_BOM.len()..]).unwrap();
        assert!(body.starts_with("id,user,assistant\n"));
    }

    #[test]
    fn test_export_reads_back_with_csv_crate() {
        let records = vec![out("7", "Doe, Jane", "Sure, \"done\"")];
        let text = to_csv_string(&records);

        let mut reader = ::csv::Reader::from_reader(text.as_bytes());
        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, vec!["id", "user", "assistant"]);
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(row.get(1), Some("Doe, Jane"));
        assert_eq!(row.get(2), Some("Sure, \"done\""));
    }
}
