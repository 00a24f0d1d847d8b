// Parsed rows -> id/user input records

use gridbatch_core::InputRecord;

use crate::error::InputError;

pub const ID_COLUMN: &str = "id";
pub const USER_COLUMN: &str = "user";

/// Locate a header cell case-insensitively (surrounding whitespace ignored).
fn find_column(header: &[String], name: &str) -> Option<usize> {
    header.iter().position(|h| h.trim().eq_ignore_ascii_case(name))
}

/// Map parsed rows to input records.
///
/// Rows with zero cells (empty lines) are skipped everywhere, so the header
/// is the first row that has any cells. It must name `id` and `user` in any
/// order; other columns are ignored. A row whose cells are all empty is
/// still a record. Cells are trimmed; missing cells become `""`.
pub fn normalize(rows: &[Vec<String>]) -> Result<Vec<InputRecord>, InputError> {
    let mut rows = rows.iter().filter(|row| !row.is_empty());

    let header = rows.next().ok_or(InputError::EmptyInput)?;
    let id_idx = find_column(header, ID_COLUMN);
    let user_idx = find_column(header, USER_COLUMN);

    let (id_idx, user_idx) = match (id_idx, user_idx) {
        (Some(id), Some(user)) => (id, user),
        (id, user) => {
            let mut missing = Vec::new();
            if id.is_none() {
                missing.push(ID_COLUMN);
            }
            if user.is_none() {
                missing.push(USER_COLUMN);
            }
            return Err(InputError::MissingColumn { missing });
        }
    };

    let cell = |row: &[String], idx: usize| row.get(idx).map(|v| v.trim().to_string()).unwrap_or_default();

    let records: Vec<InputRecord> = rows
        .map(|row| InputRecord {
            id: cell(row, id_idx),
            user: cell(row, user_idx),
        })
        .collect();

    if records.is_empty() {
        return Err(InputError::EmptyInput);
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter().map(|r| r.iter().map(|c| c.to_string()).collect()).collect()
    }

    #[test]
    fn test_basic_mapping() {
        let records = normalize(&rows(&[&["id", "user"], &["1", "hello"], &["2", "world"]])).unwrap();
        assert_eq!(records, vec![InputRecord::new("1", "hello"), InputRecord::new("2", "world")]);
    }

    #[test]
    fn test_header_case_insensitive_any_order() {
        let records = normalize(&rows(&[&["User", "notes", " ID "], &["hi", "ignored", "7"]])).unwrap();
        assert_eq!(records, vec![InputRecord::new("7", "hi")]);
    }

    #[test]
    fn test_cells_trimmed_and_missing_cells_empty() {
        let records = normalize(&rows(&[&["id", "extra", "user"], &["  3  ", "x"]])).unwrap();
        assert_eq!(records, vec![InputRecord::new("3", "")]);
    }

    #[test]
    fn test_zero_cell_rows_skipped() {
        let mut data = rows(&[&["id", "user"], &["1", "a"]]);
        data.insert(0, Vec::new());
        data.insert(2, Vec::new());
        data.push(vec!["2".to_string(), "b".to_string()]);
        data.push(Vec::new());

        let records = normalize(&data).unwrap();
        assert_eq!(records, vec![InputRecord::new("1", "a"), InputRecord::new("2", "b")]);
    }

    #[test]
    fn test_empty_cell_rows_are_records() {
        let data = rows(&[&["id", "user"], &["1", "a"], &["", ""], &["  "], &["3", "c"]]);

        let records = normalize(&data).unwrap();
        assert_eq!(
            records,
            vec![
                InputRecord::new("1", "a"),
                InputRecord::new("", ""),
                InputRecord::new("", ""),
                InputRecord::new("3", "c"),
            ]
        );
    }

    #[test]
    fn test_missing_user_column() {
        let err = normalize(&rows(&[&["id", "prompt"], &["1", "x"]])).unwrap_err();
        match err {
            InputError::MissingColumn { missing } => assert_eq!(missing, vec!["user"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_column_message_names_both() {
        let err = normalize(&rows(&[&["name", "prompt"], &["1", "x"]])).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("\"id\""), "{msg}");
        assert!(msg.contains("\"user\""), "{msg}");
    }

    #[test]
    fn test_header_only_is_empty_input() {
        let err = normalize(&rows(&[&["id", "user"]])).unwrap_err();
        assert!(matches!(err, InputError::EmptyInput));
    }

    #[test]
    fn test_no_rows_is_empty_input() {
        let err = normalize(&[]).unwrap_err();
        assert!(matches!(err, InputError::EmptyInput));
    }
}
