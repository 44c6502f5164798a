// urraca is a configuration history tool for the Claude toolchain
// Copyright (C) 2025  Javier Lancha Vázquez <javier.lancha@gmail.com>
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! The location catalog and its resolver.
//!
//! A *logical location* is a named, platform-abstract configuration point
//! ("user settings", "project memory"). The catalog is a YAML document; a
//! builtin copy covering the well-known Claude configuration paths is
//! compiled into the binary and can be replaced with `--locations <file>`.
//!
//! The resolver expands placeholder templates against an environment
//! snapshot taken once per snapshot operation. It never touches the
//! filesystem.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::global::Platform;

/// The builtin catalog of well-known Claude configuration locations.
///
/// Project-scoped templates are relative and resolve against the working
/// directory of the snapshot. Subagents follow the `agents/` directory
/// convention; the legacy `subagents/` layout is not scanned.
const BUILTIN_CATALOG: &str = r#"
locations:
  - id: user_claude_json
    category: mcp_config
    template: "$HOME/.claude.json"
    platforms: [linux, macos]
  - id: user_claude_json
    category: mcp_config
    template: '%USERPROFILE%\.claude.json'
    platforms: [windows]

  - id: user_settings
    category: settings
    template: "$HOME/.claude/settings.json"
    platforms: [linux, macos]
  - id: user_settings
    category: settings
    template: '%USERPROFILE%\.claude\settings.json'
    platforms: [windows]

  - id: user_memory
    category: memory
    template: "$HOME/.claude/CLAUDE.md"
    platforms: [linux, macos]
  - id: user_memory
    category: memory
    template: '%USERPROFILE%\.claude\CLAUDE.md'
    platforms: [windows]

  - id: user_agents
    category: agents
    template: "$HOME/.claude/agents"
    platforms: [linux, macos]
  - id: user_agents
    category: agents
    template: '%USERPROFILE%\.claude\agents'
    platforms: [windows]

  - id: user_commands
    category: commands
    template: "$HOME/.claude/commands"
    platforms: [linux, macos]
  - id: user_commands
    category: commands
    template: '%USERPROFILE%\.claude\commands'
    platforms: [windows]

  - id: project_memory
    category: memory
    template: "CLAUDE.md"
  - id: project_settings
    category: settings
    template: ".claude/settings.json"
  - id: project_agents
    category: agents
    template: ".claude/agents"
  - id: project_commands
    category: commands
    template: ".claude/commands"

  - id: enterprise_memory
    category: memory
    template: "/etc/claude-code/CLAUDE.md"
    platforms: [linux]
  - id: enterprise_memory
    category: memory
    template: "/Library/Application Support/ClaudeCode/CLAUDE.md"
    platforms: [macos]
  - id: enterprise_memory
    category: memory
    template: '%ProgramData%\ClaudeCode\CLAUDE.md'
    platforms: [windows]

  - id: enterprise_settings
    category: settings
    template: "/etc/claude-code/managed-settings.json"
    platforms: [linux]
  - id: enterprise_settings
    category: settings
    template: "/Library/Application Support/ClaudeCode/managed-settings.json"
    platforms: [macos]
  - id: enterprise_settings
    category: settings
    template: '%ProgramData%\ClaudeCode\managed-settings.json'
    platforms: [windows]

  - id: claude_logs
    category: logs
    template: "$HOME/.config/Claude/logs"
    platforms: [linux]
    options:
      enumerate_logs: true
      log_pattern: "mcp*.log"
  - id: claude_logs
    category: logs
    template: "$HOME/Library/Logs/Claude"
    platforms: [macos]
    options:
      enumerate_logs: true
      log_pattern: "mcp*.log"
  - id: claude_logs
    category: logs
    template: '%APPDATA%\Claude\logs'
    platforms: [windows]
    options:
      enumerate_logs: true
      log_pattern: "mcp*.log"
"#;

/// Placeholders the resolver understands. Anything else in a template is a
/// fatal configuration error, never passed through silently.
const KNOWN_PLACEHOLDERS: [&str; 5] = [
    "USERPROFILE",
    "APPDATA",
    "ProgramData",
    "HOME",
    "XDG_CONFIG_HOME",
];

/// What a location contains, which drives entity parsing downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Settings,
    McpConfig,
    Agents,
    Commands,
    Memory,
    Logs,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Settings => "settings",
            Category::McpConfig => "mcp_config",
            Category::Agents => "agents",
            Category::Commands => "commands",
            Category::Memory => "memory",
            Category::Logs => "logs",
        }
    }
}

/// Per-location scan options. Unknown keys in the document are ignored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LocationOptions {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,

    /// When set, the location is a log directory and only direct children
    /// matching `log_pattern` are captured.
    #[serde(default)]
    pub enumerate_logs: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_pattern: Option<String>,
}

/// One record of the location catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationSpec {
    pub id: String,
    pub category: Category,
    pub template: String,

    /// Platforms this record applies to. Empty means all platforms.
    #[serde(default)]
    pub platforms: Vec<Platform>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    #[serde(default)]
    pub options: LocationOptions,
}

fn default_enabled() -> bool {
    true
}

impl LocationSpec {
    fn applies_to(&self, platform: Platform) -> bool {
        self.enabled && (self.platforms.is_empty() || self.platforms.contains(&platform))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationConfig {
    pub locations: Vec<LocationSpec>,
}

impl LocationConfig {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Self {
        serde_yaml::from_str(BUILTIN_CATALOG).expect("builtin location catalog must parse")
    }

    /// Loads a catalog from a YAML file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read location catalog {}", path.display()))?;
        let config: LocationConfig = serde_yaml::from_str(&text)
            .with_context(|| format!("Malformed location catalog {}", path.display()))?;

        if config.locations.is_empty() {
            bail!("Location catalog {} lists no locations", path.display());
        }
        Ok(config)
    }
}

/// Immutable snapshot of the process environment, captured once at the start
/// of path resolution. Locations are resolved against this copy, never
/// against live environment variables.
#[derive(Debug, Clone)]
pub struct Environment {
    vars: HashMap<String, String>,
    pub platform: Platform,
    pub working_dir: PathBuf,
}

impl Environment {
    /// Captures the live environment of the process.
    pub fn capture(working_dir: PathBuf) -> Self {
        Self {
            vars: std::env::vars().collect(),
            platform: Platform::current(),
            working_dir,
        }
    }

    /// Builds a synthetic environment. Used by tests and by callers that
    /// resolve for a platform other than the current one.
    pub fn with_vars(
        vars: HashMap<String, String>,
        platform: Platform,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            vars,
            platform,
            working_dir,
        }
    }

    fn var(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }
}

/// A logical location bound to an absolute path on this host.
#[derive(Debug, Clone)]
pub struct ResolvedLocation {
    pub id: String,
    pub category: Category,
    pub path: PathBuf,
    pub options: LocationOptions,
}

/// Expands the location catalog into absolute paths. Pure function of
/// (catalog, environment, platform, working directory); does not stat
/// anything.
pub struct PathResolver {
    config: LocationConfig,
    env: Environment,
}

impl PathResolver {
    pub fn new(config: LocationConfig, env: Environment) -> Self {
        Self { config, env }
    }

    /// Resolves every location enabled for the current platform, sorted by
    /// location id. Unknown placeholders anywhere in the catalog and
    /// undefined environment variables for enabled locations are fatal.
    pub fn resolve(&self) -> Result<Vec<ResolvedLocation>> {
        // Validate placeholder names across the whole catalog first, so a
        // typo in a record for another platform still fails fast.
        for spec in &self.config.locations {
            validate_placeholders(&spec.template)
                .with_context(|| format!("Invalid template for location '{}'", spec.id))?;
        }

        let mut resolved = Vec::new();
        let mut seen_ids = BTreeSet::new();

        for spec in &self.config.locations {
            if !spec.applies_to(self.env.platform) {
                continue;
            }

            if !seen_ids.insert(spec.id.clone()) {
                bail!(
                    "Location id '{}' appears more than once for platform {}",
                    spec.id,
                    self.env.platform
                );
            }

            let path = expand_template(&spec.template, &self.env)
                .with_context(|| format!("Could not resolve location '{}'", spec.id))?;

            resolved.push(ResolvedLocation {
                id: spec.id.clone(),
                category: spec.category,
                path,
                options: spec.options.clone(),
            });
        }

        resolved.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(resolved)
    }
}

/// Checks that every `%NAME%` and `$NAME` token names a known placeholder.
fn validate_placeholders(template: &str) -> Result<()> {
    for name in placeholder_names(template)? {
        if !KNOWN_PLACEHOLDERS.contains(&name.as_str()) {
            bail!("Unknown placeholder '{name}'");
        }
    }
    Ok(())
}

/// Extracts placeholder names from a template, in order of appearance.
fn placeholder_names(template: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();
    let chars: Vec<char> = template.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '%' => {
                let end = chars[i + 1..]
                    .iter()
                    .position(|&c| c == '%')
                    .map(|p| i + 1 + p);
                match end {
                    Some(end) if end > i + 1 => {
                        names.push(chars[i + 1..end].iter().collect());
                        i = end + 1;
                    }
                    _ => bail!("Unterminated '%' placeholder in template '{template}'"),
                }
            }
            '$' => {
                let start = i + 1;
                let mut end = start;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
                if end == start {
                    bail!("Dangling '$' in template '{template}'");
                }
                names.push(chars[start..end].iter().collect());
                i = end;
            }
            _ => i += 1,
        }
    }

    Ok(names)
}

/// Expands placeholders and normalizes separators to the host's native form.
/// Relative results are joined onto the environment's working directory.
fn expand_template(template: &str, env: &Environment) -> Result<PathBuf> {
    let mut expanded = template.to_string();

    for name in placeholder_names(template)? {
        if !KNOWN_PLACEHOLDERS.contains(&name.as_str()) {
            bail!("Unknown placeholder '{name}'");
        }
        let value = env
            .var(&name)
            .ok_or_else(|| anyhow::anyhow!("Environment variable '{name}' is not defined"))?;

        // Both sigil forms are replaced with the same variable value.
        expanded = expanded.replace(&format!("%{name}%"), value);
        expanded = expanded.replace(&format!("${name}"), value);
    }

    Ok(normalize_separators(&expanded, &env.working_dir))
}

/// Rebuilds a path string with native separators. Templates (and expanded
/// variable values) may mix `/` and `\`.
fn normalize_separators(path_str: &str, working_dir: &Path) -> PathBuf {
    let unified = path_str.replace('\\', "/");
    let absolute = unified.starts_with('/')
        || unified
            .chars()
            .nth(1)
            .is_some_and(|c| c == ':' && unified.chars().next().is_some_and(|d| d.is_ascii_alphabetic()));

    let mut path = if absolute {
        if unified.starts_with('/') {
            PathBuf::from(std::path::MAIN_SEPARATOR.to_string())
        } else {
            PathBuf::new()
        }
    } else {
        working_dir.to_path_buf()
    };

    for component in unified.split('/').filter(|c| !c.is_empty()) {
        path.push(component);
    }

    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn posix_env(vars: &[(&str, &str)]) -> Environment {
        Environment::with_vars(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            Platform::Linux,
            PathBuf::from("/work/project"),
        )
    }

    #[test]
    fn test_builtin_catalog_parses() {
        let config = LocationConfig::builtin();
        assert!(!config.locations.is_empty());

        // Every location resolves with a complete POSIX environment.
        let env = posix_env(&[("HOME", "/home/ana"), ("XDG_CONFIG_HOME", "/home/ana/.config")]);
        let resolver = PathResolver::new(config, env);
        let resolved = resolver.resolve().unwrap();

        let ids: Vec<&str> = resolved.iter().map(|l| l.id.as_str()).collect();
        assert!(ids.contains(&"user_claude_json"));
        assert!(ids.contains(&"project_memory"));
        assert!(ids.contains(&"claude_logs"));

        // Sorted by id, no duplicates once platform-filtered.
        let mut sorted = ids.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_expand_home_placeholder() {
        let env = posix_env(&[("HOME", "/home/ana")]);
        let path = expand_template("$HOME/.claude.json", &env).unwrap();
        assert_eq!(path, PathBuf::from("/home/ana/.claude.json"));
    }

    #[test]
    fn test_expand_xdg_placeholder() {
        let env = posix_env(&[("XDG_CONFIG_HOME", "/home/ana/.config")]);
        let path = expand_template("$XDG_CONFIG_HOME/Claude/logs", &env).unwrap();
        assert_eq!(path, PathBuf::from("/home/ana/.config/Claude/logs"));
    }

    #[test]
    fn test_expand_windows_placeholders() {
        let env = posix_env(&[
            ("USERPROFILE", "/Users/ana"),
            ("APPDATA", "/Users/ana/AppData/Roaming"),
            ("ProgramData", "/ProgramData"),
        ]);

        let path = expand_template(r"%USERPROFILE%\.claude\settings.json", &env).unwrap();
        assert_eq!(path, PathBuf::from("/Users/ana/.claude/settings.json"));

        let path = expand_template(r"%APPDATA%\Claude\logs", &env).unwrap();
        assert_eq!(path, PathBuf::from("/Users/ana/AppData/Roaming/Claude/logs"));

        let path = expand_template(r"%ProgramData%\ClaudeCode\CLAUDE.md", &env).unwrap();
        assert_eq!(path, PathBuf::from("/ProgramData/ClaudeCode/CLAUDE.md"));
    }

    #[test]
    fn test_mixed_separators_normalize() {
        let env = posix_env(&[("HOME", "/home/ana")]);
        let path = expand_template(r"$HOME\.claude/agents", &env).unwrap();
        assert_eq!(path, PathBuf::from("/home/ana/.claude/agents"));
    }

    #[test]
    fn test_relative_template_joins_working_dir() {
        let env = posix_env(&[]);
        let path = expand_template(".claude/settings.json", &env).unwrap();
        assert_eq!(path, PathBuf::from("/work/project/.claude/settings.json"));
    }

    #[test]
    fn test_unknown_placeholder_is_fatal() {
        let env = posix_env(&[("HOME", "/home/ana")]);
        assert!(expand_template("$BOGUS/file", &env).is_err());
        assert!(expand_template("%BOGUS%/file", &env).is_err());
        assert!(validate_placeholders("%BOGUS%/file").is_err());
    }

    #[test]
    fn test_undefined_env_var_is_fatal() {
        let env = posix_env(&[]);
        let err = expand_template("$HOME/.claude.json", &env).unwrap_err();
        assert!(err.to_string().contains("HOME"));
    }

    #[test]
    fn test_unterminated_percent_is_fatal() {
        assert!(placeholder_names("%USERPROFILE/file").is_err());
    }

    #[test]
    fn test_platform_filter() {
        let yaml = r#"
locations:
  - id: only_windows
    category: settings
    template: '%USERPROFILE%\x'
    platforms: [windows]
  - id: everywhere
    category: settings
    template: "$HOME/x"
"#;
        let config: LocationConfig = serde_yaml::from_str(yaml).unwrap();
        let env = posix_env(&[("HOME", "/home/ana")]);
        let resolved = PathResolver::new(config, env).resolve().unwrap();

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].id, "everywhere");
    }

    #[test]
    fn test_disabled_location_is_skipped() {
        let yaml = r#"
locations:
  - id: off
    category: settings
    template: "$HOME/x"
    enabled: false
"#;
        let config: LocationConfig = serde_yaml::from_str(yaml).unwrap();
        let env = posix_env(&[("HOME", "/home/ana")]);
        let resolved = PathResolver::new(config, env).resolve().unwrap();
        assert!(resolved.is_empty());
    }

    #[test]
    fn test_duplicate_id_on_same_platform_is_fatal() {
        let yaml = r#"
locations:
  - id: dup
    category: settings
    template: "$HOME/a"
  - id: dup
    category: settings
    template: "$HOME/b"
"#;
        let config: LocationConfig = serde_yaml::from_str(yaml).unwrap();
        let env = posix_env(&[("HOME", "/home/ana")]);
        assert!(PathResolver::new(config, env).resolve().is_err());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let yaml = r#"
locations:
  - id: loc
    category: memory
    template: "$HOME/CLAUDE.md"
    options:
      enumerate_logs: false
      future_option: 42
"#;
        let config: LocationConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.locations.len(), 1);
    }

    #[test]
    fn test_unknown_placeholder_in_other_platform_record_is_fatal() {
        let yaml = r#"
locations:
  - id: broken
    category: settings
    template: '%TYPO%\x'
    platforms: [windows]
  - id: fine
    category: settings
    template: "$HOME/x"
"#;
        let config: LocationConfig = serde_yaml::from_str(yaml).unwrap();
        let env = posix_env(&[("HOME", "/home/ana")]);
        assert!(PathResolver::new(config, env).resolve().is_err());
    }
}
