use std::path::Path;

use crate::error::LoopError;

use super::SplitOption;

/// Read a text file as one item per line. Empty lines are kept.
pub fn read_lines(path: &Path) -> Result<Vec<String>, LoopError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        LoopError::configuration(format!("failed to read '{}': {e}", path.display()))
    })?;

    Ok(content.lines().map(str::to_string).collect())
}

/// Split `text` on the whole `delimiter` string.
pub fn split_tokens(text: &str, delimiter: &str, split: SplitOption) -> Vec<String> {
    text.split(delimiter)
        .filter(|token| split == SplitOption::None || !token.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_split_keeps_empty_tokens_by_default() {
        assert_eq!(
            split_tokens("a;;b;", ";", SplitOption::None),
            vec!["a", "", "b", ""]
        );
    }

    #[test]
    fn test_split_removes_empty_tokens() {
        assert_eq!(
            split_tokens("a;;b;", ";", SplitOption::RemoveEmptyEntries),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_split_on_multi_char_delimiter() {
        assert_eq!(
            split_tokens("one::two:three", "::", SplitOption::None),
            vec!["one", "two:three"]
        );
    }

    #[test]
    fn test_read_lines() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("items.txt");
        fs::write(&path, "first\r\nsecond\n\nfourth\n").unwrap();

        assert_eq!(
            read_lines(&path).unwrap(),
            vec!["first", "second", "", "fourth"]
        );
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_lines(Path::new("/no/such/items.txt"));
        assert!(matches!(result, Err(LoopError::Configuration(_))));
    }
}
