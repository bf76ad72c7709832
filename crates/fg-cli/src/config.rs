//! Config file support for the CLI.
//!
//! A config file may set layout spacing, TikZ options and particle overrides:
//!
//! ```toml
//! [layout]
//! bend_step = 0.3
//!
//! [layout.spacing]
//! column_spacing = 120.0
//!
//! [tikz]
//! max_bend = 40.0
//! layered_layout = true
//!
//! [particles.Zp]
//! style = "boson"
//! label = "Z'"
//! ```
//!
//! The format is picked from the file extension: `.toml`, `.yaml`/`.yml` or
//! `.json`.

use std::path::Path;

use anyhow::{Context, Result, bail};
use fg_core::ParticleRegistry;
use fg_layout::LayoutConfig;
use fg_render_tikz::TikzConfig;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeyngraphConfig {
    pub layout: LayoutConfig,
    pub tikz: TikzConfig,
    /// Particle drawing overrides, consulted before the built-in table.
    pub particles: ParticleRegistry,
}

impl FeyngraphConfig {
    /// Load a config file, choosing the format from its extension.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();

        let config: Self = match extension.as_str() {
            "toml" => toml::from_str(&text)
                .with_context(|| format!("Invalid TOML config: {}", path.display()))?,
            "yaml" | "yml" => serde_yaml::from_str(&text)
                .with_context(|| format!("Invalid YAML config: {}", path.display()))?,
            "json" => serde_json::from_str(&text)
                .with_context(|| format!("Invalid JSON config: {}", path.display()))?,
            other => bail!(
                "Unsupported config format '{other}' for {} (expected toml, yaml, yml or json)",
                path.display()
            ),
        };

        debug!(
            path = %path.display(),
            overrides = config.particles.overrides().len(),
            "loaded config"
        );
        Ok(config)
    }

    /// Load `path` when given, otherwise fall back to defaults.
    pub fn load_optional(path: Option<&str>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), |path| Self::load(Path::new(path)))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::FeyngraphConfig;
    use fg_core::{LineStyle, ParticleLookup};
    use tempfile::Builder;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new()
            .suffix(suffix)
            .tempfile()
            .expect("create temp config");
        file.write_all(content.as_bytes()).expect("write temp config");
        file
    }

    #[test]
    fn loads_toml_sections() {
        let file = write_temp(
            ".toml",
            r#"
[layout]
bend_step = 0.3

[layout.spacing]
column_spacing = 120.0

[tikz]
max_bend = 40.0
layered_layout = true

[particles.Zp]
style = "boson"
label = "Z'"
"#,
        );
        let config = FeyngraphConfig::load(file.path()).expect("load toml");
        assert_eq!(config.layout.bend_step, 0.3);
        assert_eq!(config.layout.spacing.column_spacing, 120.0);
        assert_eq!(config.layout.spacing.row_spacing, 100.0);
        assert_eq!(config.tikz.max_bend, 40.0);
        assert!(config.tikz.layered_layout);

        let zp = config.particles.lookup("Zp");
        assert_eq!(zp.style, LineStyle::Boson);
        assert_eq!(zp.label, "Z'");
        assert!(!zp.is_anti);
    }

    #[test]
    fn loads_yaml_and_json() {
        let yaml = write_temp(
            ".yml",
            "tikz:\n  standalone: true\nparticles:\n  chi+:\n    style: charged boson\n    label: \\chi^{+}\n    is_anti: true\n",
        );
        let config = FeyngraphConfig::load(yaml.path()).expect("load yaml");
        assert!(config.tikz.standalone);
        assert_eq!(
            config.particles.lookup("chi+").style,
            LineStyle::ChargedBoson
        );

        let json = write_temp(".json", r#"{"layout": {"spacing": {"row_spacing": 60.0}}}"#);
        let config = FeyngraphConfig::load(json.path()).expect("load json");
        assert_eq!(config.layout.spacing.row_spacing, 60.0);
        assert_eq!(config.tikz, fg_render_tikz::TikzConfig::default());
    }

    #[test]
    fn rejects_unknown_extension_and_bad_content() {
        let ini = write_temp(".ini", "[layout]");
        let error = FeyngraphConfig::load(ini.path()).expect_err("ini is unsupported");
        assert!(error.to_string().contains("Unsupported config format 'ini'"));

        let broken = write_temp(".toml", "[tikz]\nmax_bend = \"wide\"\n");
        let error = FeyngraphConfig::load(broken.path()).expect_err("bad value");
        assert!(error.to_string().contains("Invalid TOML config"));
    }

    #[test]
    fn missing_path_means_defaults() {
        let config = FeyngraphConfig::load_optional(None).expect("defaults");
        assert_eq!(config, FeyngraphConfig::default());
    }
}
