//! Line parsers for the package tools' text output.
//!
//! Every parser is pure and tolerant: empty output yields no records, header
//! lines are skipped, and malformed lines are logged and dropped.

use std::collections::HashMap;

use crate::model::{Ecosystem, PackageRecord};

pub trait OutputParser: Send + Sync {
    fn parse(&self, output: &str) -> Vec<PackageRecord>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DnfListMode {
    /// `dnf list`: installed and available packages mixed. The section
    /// header decides, with an `@repo` column as the dnf4 fallback.
    Listing,
    /// `dnf list --installed`: every line is installed, whatever the repo
    /// column says (dnf5 prints a bare repo id there).
    Installed,
    /// `dnf check-update`: every line is an installed package with a newer version.
    Updates,
}

/// Which `dnf list` section the current line belongs to.
fn section_of(line: &str) -> Option<bool> {
    let lower = line.to_ascii_lowercase();
    if lower.starts_with("installed packages") {
        Some(true)
    } else if lower.starts_with("available packages") {
        Some(false)
    } else {
        None
    }
}

/// Parses `name.arch  version  repo` columns printed by `dnf list` and
/// `dnf check-update`.
#[derive(Debug, Clone)]
pub struct DnfListParser {
    header_prefixes: Vec<String>,
    mode: DnfListMode,
}

impl DnfListParser {
    pub fn new(header_prefixes: Vec<String>, mode: DnfListMode) -> Self {
        Self { header_prefixes, mode }
    }

    fn is_header(&self, line: &str) -> bool {
        self.header_prefixes.iter().any(|prefix| line.starts_with(prefix.as_str()))
    }

    fn record(&self, full_name: &str, version: &str, repo: &str, section: Option<bool>) -> PackageRecord {
        let name = strip_arch(full_name);
        let installed = match self.mode {
            DnfListMode::Listing => section.unwrap_or_else(|| repo.starts_with('@')),
            DnfListMode::Installed | DnfListMode::Updates => true,
        };
        PackageRecord::new(Ecosystem::System, name, installed)
            .with_version(version)
            .with_origin(repo.trim_start_matches('@'))
    }
}

impl OutputParser for DnfListParser {
    fn parse(&self, output: &str) -> Vec<PackageRecord> {
        let mut records = Vec::new();
        // dnf wraps long package names onto their own line, pushing version
        // and repository to the next one.
        let mut wrapped: Option<&str> = None;
        let mut section = None;

        for (index, raw) in output.lines().enumerate() {
            let line = raw.trim();
            if let Some(installed) = section_of(line) {
                section = Some(installed);
                continue;
            }
            if line.is_empty() || self.is_header(line) {
                continue;
            }

            let parts: Vec<&str> = line.split_whitespace().collect();
            match (parts.len(), wrapped.take()) {
                (n, None) if n >= 3 => records.push(self.record(parts[0], parts[1], parts[2], section)),
                (1, None) => wrapped = Some(parts[0]),
                (2, Some(name)) => records.push(self.record(name, parts[0], parts[1], section)),
                (_, pending) => {
                    if let Some(name) = pending {
                        tracing::warn!(line = index, name, "dnf: wrapped package name without version line");
                    }
                    if parts.len() >= 3 {
                        records.push(self.record(parts[0], parts[1], parts[2], section));
                    } else if parts.len() == 1 {
                        wrapped = Some(parts[0]);
                    } else {
                        tracing::warn!(line = index, content = line, "dnf: skipping line with too few columns");
                    }
                }
            }
        }

        if let Some(name) = wrapped {
            tracing::warn!(name, "dnf: trailing package name without version line");
        }

        records
    }
}

/// `vim-enhanced.x86_64` → `vim-enhanced`
fn strip_arch(full_name: &str) -> &str {
    match full_name.rsplit_once('.') {
        Some((name, _arch)) if !name.is_empty() => name,
        _ => full_name,
    }
}

/// Parses tab-separated `flatpak ... --columns=...` output. The column order
/// comes from configuration so it can follow the installed flatpak version.
#[derive(Debug, Clone)]
pub struct FlatpakColumnsParser {
    columns: Vec<String>,
    installed: bool,
}

const FLATPAK_HEADERS: &[&str] = &["application id", "application", "name", "ref"];

impl FlatpakColumnsParser {
    pub fn new(columns: Vec<String>, installed: bool) -> Self {
        Self { columns, installed }
    }

    /// The `--columns=` argument matching this parser's layout.
    pub fn columns_arg(&self) -> String {
        format!("--columns={}", self.columns.join(","))
    }

    fn index_of(&self, column: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == column)
    }
}

impl OutputParser for FlatpakColumnsParser {
    fn parse(&self, output: &str) -> Vec<PackageRecord> {
        let Some(app_index) = self.index_of("application") else {
            tracing::warn!(columns = ?self.columns, "flatpak: column layout has no application column");
            return Vec::new();
        };
        let name_index = self.index_of("name");
        let required = name_index.map_or(app_index, |n| n.max(app_index)) + 1;

        let mut records = Vec::new();
        for (index, line) in output.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let parts: Vec<&str> = line.split('\t').map(str::trim).collect();
            if FLATPAK_HEADERS.contains(&parts[0].to_lowercase().as_str()) {
                continue;
            }
            if parts.len() < required {
                tracing::warn!(line = index, content = line, "flatpak: skipping line with too few columns");
                continue;
            }

            let field = |column: &str| {
                self.index_of(column)
                    .and_then(|i| parts.get(i))
                    .map(|s| s.to_string())
                    .unwrap_or_default()
            };

            records.push(
                PackageRecord::new(Ecosystem::Sandboxed, parts[app_index], self.installed)
                    .with_display_name(field("name"))
                    .with_version(field("version"))
                    .with_description(field("description"))
                    .with_origin(field("branch")),
            );
        }
        records
    }
}

/// Extracts `Name` → `Summary` pairs from `dnf info` output.
pub fn parse_dnf_info_summaries(output: &str) -> HashMap<String, String> {
    let mut summaries = HashMap::new();
    let mut current: Option<String> = None;

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key.trim() {
            "Name" => current = Some(value.trim().to_string()),
            "Summary" => {
                if let Some(name) = current.take() {
                    summaries.insert(name, value.trim().to_string());
                }
            }
            _ => {}
        }
    }
    summaries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParserConfig;

    fn dnf(mode: DnfListMode) -> DnfListParser {
        DnfListParser::new(ParserConfig::default().dnf_header_prefixes, mode)
    }

    fn flatpak(installed: bool) -> FlatpakColumnsParser {
        FlatpakColumnsParser::new(ParserConfig::default().flatpak_columns, installed)
    }

    const DNF_LIST: &str = "\
Last metadata expiration check: 0:12:01 ago on Mon 19 Oct 2026.
Installed Packages
bash.x86_64                5.2.26-3.fc40          @anaconda
vim-enhanced.x86_64        2:9.1.393-1.fc40       @updates
Available Packages
htop.x86_64                3.3.0-3.fc40           fedora
";

    #[test]
    fn dnf_list_keeps_order_and_reads_installed_flag() {
        let records = dnf(DnfListMode::Listing).parse(DNF_LIST);
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["bash", "vim-enhanced", "htop"]);
        assert!(records[0].installed);
        assert_eq!(records[1].version.as_deref(), Some("2:9.1.393-1.fc40"));
        assert_eq!(records[1].origin.as_deref(), Some("updates"));
        assert!(!records[2].installed);
    }

    const DNF5_LIST: &str = "\
Updating and loading repositories:
Repositories loaded.
Installed packages
bash.x86_64                5.2.26-3.fc40          anaconda
vim-enhanced.x86_64        2:9.1.393-1.fc40       updates
Available packages
htop.x86_64                3.3.0-3.fc40           fedora
";

    #[test]
    fn dnf5_sections_decide_installed_flag() {
        let records = dnf(DnfListMode::Listing).parse(DNF5_LIST);
        let flags: Vec<_> = records.iter().map(|r| (r.name.as_str(), r.installed)).collect();
        assert_eq!(flags, [("bash", true), ("vim-enhanced", true), ("htop", false)]);
        assert_eq!(records[0].origin.as_deref(), Some("anaconda"));
    }

    #[test]
    fn installed_mode_ignores_bare_repo_ids() {
        let output = "bash.x86_64 5.2.26-3.fc40 anaconda
mystery.noarch 1.0 <unknown>
";
        let records = dnf(DnfListMode::Installed).parse(output);
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.installed));
        assert!(dnf(DnfListMode::Listing).parse(output).iter().all(|r| !r.installed));
    }

    #[test]
    fn dnf_empty_output_is_zero_records() {
        assert!(dnf(DnfListMode::Listing).parse("").is_empty());
        assert!(dnf(DnfListMode::Listing).parse("\n\n").is_empty());
    }

    #[test]
    fn dnf_malformed_lines_are_skipped() {
        let output = "bash.x86_64 5.2 @anaconda\nbroken 1.0\nzsh.x86_64 5.9 @fedora\n";
        let records = dnf(DnfListMode::Listing).parse(output);
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["bash", "zsh"]);
    }

    #[test]
    fn dnf_joins_wrapped_long_names() {
        let output = "\
texlive-collection-latexrecommended.noarch
                           11:svn65512-71.fc40    @fedora
bash.x86_64                5.2.26-3.fc40          @anaconda
";
        let records = dnf(DnfListMode::Listing).parse(output);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "texlive-collection-latexrecommended");
        assert_eq!(records[0].version.as_deref(), Some("11:svn65512-71.fc40"));
    }

    #[test]
    fn dnf_dangling_wrapped_name_is_dropped() {
        let output = "orphan.noarch\nbash.x86_64 5.2 @anaconda\nlonely.x86_64\n";
        let records = dnf(DnfListMode::Listing).parse(output);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "bash");
    }

    #[test]
    fn dnf_updates_mark_everything_installed() {
        let output = "\nfirefox.x86_64   131.0-1.fc40   updates\nObsoleting Packages\n";
        let records = dnf(DnfListMode::Updates).parse(output);
        assert_eq!(records.len(), 1);
        assert!(records[0].installed);
        assert_eq!(records[0].version.as_deref(), Some("131.0-1.fc40"));
    }

    #[test]
    fn strip_arch_only_drops_last_segment() {
        assert_eq!(strip_arch("python3.12.x86_64"), "python3.12");
        assert_eq!(strip_arch("noarch"), "noarch");
        assert_eq!(strip_arch(".hidden"), ".hidden");
    }

    #[test]
    fn flatpak_list_parses_all_columns() {
        let output = "Application ID\tName\tVersion\tBranch\tDescription\n\
org.gimp.GIMP\tGNU Image Manipulation Program\t2.10.38\tstable\tCreate images and edit photographs\n\
org.mozilla.firefox\tFirefox\t131.0\tstable\tFast, private web browser\n";
        let records = flatpak(true).parse(output);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "org.gimp.GIMP");
        assert_eq!(records[0].title(), "GNU Image Manipulation Program");
        assert_eq!(records[0].version.as_deref(), Some("2.10.38"));
        assert_eq!(records[0].origin.as_deref(), Some("stable"));
        assert!(records.iter().all(|r| r.installed && r.ecosystem == Ecosystem::Sandboxed));
    }

    #[test]
    fn flatpak_tolerates_missing_trailing_columns_and_skips_short_lines() {
        let output = "com.example.App\tExample\t1.0\tstable\njunk-without-tabs\norg.example.Other\tOther\n";
        let records = flatpak(false).parse(output);
        let names: Vec<_> = records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, ["com.example.App", "org.example.Other"]);
        assert_eq!(records[0].description, None);
        assert_eq!(records[1].version, None);
    }

    #[test]
    fn flatpak_custom_column_order() {
        let parser = FlatpakColumnsParser::new(vec!["application".into(), "version".into()], true);
        assert_eq!(parser.columns_arg(), "--columns=application,version");
        let records = parser.parse("org.gimp.GIMP\t2.10.38\norg.kde.krita\t5.2.6\n");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].version.as_deref(), Some("5.2.6"));
        assert_eq!(records[1].display_name, None);
    }

    #[test]
    fn flatpak_without_application_column_yields_nothing() {
        let parser = FlatpakColumnsParser::new(vec!["name".into()], true);
        assert!(parser.parse("GIMP\n").is_empty());
    }

    #[test]
    fn dnf_info_summaries_pairs_names_with_summaries() {
        let output = "\
Installed Packages
Name         : bash
Version      : 5.2.26
Summary      : The GNU Bourne Again shell
Description  : The GNU Bourne Again shell (Bash) is a shell.

Name         : htop
Summary      : Interactive process viewer
";
        let summaries = parse_dnf_info_summaries(output);
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries["bash"], "The GNU Bourne Again shell");
        assert_eq!(summaries["htop"], "Interactive process viewer");
    }
}
