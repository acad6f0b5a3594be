use activity_core::model::Export;
use activity_core::ParseError;
use std::fs;
use std::path::Path;

/// Parse one export file (spec §6 "Input files"; spec §7 error detail).
pub fn parse_export(path: &Path) -> Result<Export, ParseError> {
    let raw = fs::read_to_string(path).map_err(|source| ParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ParseError::Json {
        path: path.to_path_buf(),
        line: source.line(),
        column: source.column(),
        message: source.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_a_well_formed_export() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(
            f,
            r#"{{"guild":{{"id":"1","name":"G"}},"channel":{{"id":"2"}},
               "messages":[{{"id":"m1","content":"hi","timestamp":"2024-01-01T00:00:00Z","author":{{"id":"u1","name":"a","isBot":false}}}}]}}"#
        )
        .unwrap();
        let export = parse_export(f.path()).unwrap();
        assert_eq!(export.guild.id, "1");
        assert_eq!(export.messages.len(), 1);
    }

    #[test]
    fn reports_line_and_column_on_malformed_json() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{{ not json").unwrap();
        let err = parse_export(f.path()).unwrap_err();
        match err {
            ParseError::Json { line, .. } => assert!(line >= 1),
            other => panic!("expected Json error, got {other:?}"),
        }
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = parse_export(Path::new("/no/such/file.json")).unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }
}
