//! Small console helpers shared by the binary and printers.

use owo_colors::OwoColorize;

fn colors_enabled() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

fn prefix(label: &str, paint: fn(&str) -> String) -> String {
    if colors_enabled() {
        paint(label)
    } else {
        label.to_string()
    }
}

pub fn error_prefix() -> String {
    prefix("error:", |s| s.red().bold().to_string())
}

pub fn note_prefix() -> String {
    prefix("note:", |s| s.yellow().bold().to_string())
}

pub fn info_prefix() -> String {
    prefix("info:", |s| s.blue().bold().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_contain_labels() {
        assert!(error_prefix().contains("error:"));
        assert!(note_prefix().contains("note:"));
        assert!(info_prefix().contains("info:"));
    }
}
