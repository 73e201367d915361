//! Best-effort vendor attribution from module and executable paths.

/// Substring hints checked against the lowercased path, first match wins.
const VENDOR_HINTS: &[(&str, &str)] = &[
    (r"\windowsapps\", "Microsoft Store"),
    (r"\scoop\", "Scoop"),
    (r"\chocolatey\", "Chocolatey"),
    (r"\winget\", "WinGet"),
    (r"\microsoft vs code\", "Microsoft"),
    (r"\microsoft office\", "Microsoft"),
    (r"\microsoft\", "Microsoft"),
    (r"\windows defender\", "Microsoft"),
    (r"\nvidia corporation\", "NVIDIA"),
    (r"\intel\", "Intel"),
    (r"\7-zip\", "7-Zip"),
    (r"\winrar\", "WinRAR"),
    (r"\git\", "Git for Windows"),
    (r"\dropbox\", "Dropbox"),
    (r"\google\", "Google"),
];

/// Directory segments that never name a vendor.
const GENERIC_SEGMENTS: &[&str] = &[
    "program files",
    "program files (x86)",
    "programdata",
    "common files",
    "windows",
    "system32",
    "syswow64",
    "users",
    "appdata",
    "local",
    "roaming",
    "programs",
    "bin",
    "x64",
    "x86",
    "amd64",
    "lib",
    "shell",
];

/// Attributes a module or executable path to a vendor.
///
/// Returns an empty string when nothing useful can be derived.
#[must_use]
pub fn source_from_path(path: &str) -> String {
    let path = unquote(path.trim());
    if path.is_empty() {
        return String::new();
    }

    let lowered = path.to_lowercase().replace('/', "\\");
    if is_system_path(&lowered) {
        return "Microsoft".to_string();
    }
    if let Some((_, vendor)) = VENDOR_HINTS.iter().find(|(hint, _)| lowered.contains(hint)) {
        return (*vendor).to_string();
    }

    // First non-generic directory below the drive, e.g. `C:\Program Files\Foo\x.dll` -> `Foo`.
    let normalized = path.replace('/', "\\");
    let mut segments: Vec<&str> = normalized.split('\\').filter(|s| !s.is_empty()).collect();
    segments.pop();
    segments
        .into_iter()
        .filter(|segment| !segment.ends_with(':') && !segment.starts_with('%'))
        .find(|segment| !GENERIC_SEGMENTS.contains(&segment.to_lowercase().as_str()))
        .map(str::to_string)
        .unwrap_or_default()
}

/// Attributes a command line by its executable.
#[must_use]
pub fn source_from_command(command: &str) -> String {
    source_from_path(&executable_of(command))
}

/// Whether a lowercased path points into the operating system directory.
#[must_use]
pub fn is_system_path(lowered: &str) -> bool {
    lowered.contains(r"\windows\system32\")
        || lowered.contains(r"\windows\syswow64\")
        || lowered.starts_with(r"%systemroot%\")
        || lowered.starts_with(r"%windir%\")
}

/// Extracts the executable from a command line.
fn executable_of(command: &str) -> String {
    let command = command.trim();
    if let Some(rest) = command.strip_prefix('"') {
        return rest.split('"').next().unwrap_or_default().to_string();
    }

    // Unquoted paths may contain spaces; cut after the first `.exe`.
    let lowered = command.to_ascii_lowercase();
    match lowered.find(".exe") {
        Some(end) => command[..end + 4].to_string(),
        None => command.split_whitespace().next().unwrap_or_default().to_string(),
    }
}

fn unquote(path: &str) -> &str {
    path.trim_matches('"')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_files_segment() {
        assert_eq!(
            source_from_path(r"C:\Program Files\Acme Tools\shellext64.dll"),
            "Acme Tools"
        );
    }

    #[test]
    fn test_vendor_hint_wins_over_segments() {
        assert_eq!(source_from_path(r"C:\Program Files\7-Zip\7-zip.dll"), "7-Zip");
        assert_eq!(
            source_from_path(r"C:\Users\me\scoop\apps\foo\current\foo.dll"),
            "Scoop"
        );
    }

    #[test]
    fn test_system_directory() {
        assert_eq!(source_from_path(r"C:\Windows\System32\shell32.dll"), "Microsoft");
        assert_eq!(source_from_path(r"%SystemRoot%\system32\ntshrui.dll"), "Microsoft");
    }

    #[test]
    fn test_generic_only_path_is_empty() {
        assert_eq!(source_from_path(r"C:\Program Files\x64\a.dll"), "");
        assert_eq!(source_from_path(""), "");
    }

    #[test]
    fn test_command_line_executable() {
        assert_eq!(
            source_from_command(r#""C:\Program Files\Foo Corp\foo.exe" "%1""#),
            "Foo Corp"
        );
        assert_eq!(
            source_from_command(r"C:\Program Files\Foo Corp\foo.exe --open %V"),
            "Foo Corp"
        );
    }
}
