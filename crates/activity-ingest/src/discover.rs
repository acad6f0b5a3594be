use std::path::{Path, PathBuf};

/// Resolve the set of export files named by `--file` or `--dir` + `--pattern`
/// (spec §6 "exactly one of: a single file, or a directory (non-recursive)
/// with a glob").
pub fn discover_files(
    file: Option<&Path>,
    dir: Option<&Path>,
    pattern: &str,
) -> anyhow::Result<Vec<PathBuf>> {
    if let Some(file) = file {
        return Ok(vec![file.to_path_buf()]);
    }
    let dir = dir.expect("Args::validate already enforced --file xor --dir");
    let glob_pattern = dir.join(pattern);
    let glob_pattern = glob_pattern.to_string_lossy();

    let mut paths: Vec<PathBuf> = glob::glob(&glob_pattern)?
        .filter_map(Result::ok)
        .filter(|p| p.is_file())
        .collect();
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_bypasses_globbing() {
        let path = Path::new("/tmp/does-not-need-to-exist.json");
        let found = discover_files(Some(path), None, "*.json").unwrap();
        assert_eq!(found, vec![path.to_path_buf()]);
    }
}
