use std::path::Path;

use anyhow::{Context, Result};

/// Builds the host list from the single-host flag and the host file, in that
/// order. The file holds one host per line; blank lines and `#` comments are
/// skipped.
pub fn load(ip: Option<&str>, file: Option<&Path>) -> Result<Vec<String>> {
    let mut hosts = Vec::new();

    if let Some(ip) = ip {
        hosts.push(ip.to_string());
    }

    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("could not read host list '{}'", path.display()))?;
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            hosts.push(line.to_string());
        }
    }

    Ok(hosts)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn combines_flag_and_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "sw1.example").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "# core routers").unwrap();
        writeln!(file, "  core1.example  ").unwrap();

        let hosts = load(Some("10.0.0.1"), Some(file.path())).unwrap();
        assert_eq!(hosts, vec!["10.0.0.1", "sw1.example", "core1.example"]);
    }

    #[test]
    fn empty_without_inputs() {
        assert!(load(None, None).unwrap().is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load(None, Some(Path::new("/nonexistent/hosts.txt"))).is_err());
    }
}
