//! Particle line styles and TeX labels.
//!
//! Known particles come from a fixed table. Any other name is decomposed as
//! `base[modifier][_index]` so that unknown particles still get a sensible
//! line and label instead of failing the render.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Line style of a propagator, named the way tikz-feynman spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    /// Solid line with an arrow
    #[default]
    Fermion,
    /// Wavy line
    Boson,
    /// Wavy line with an arrow
    #[serde(rename = "charged boson", alias = "charged_boson", alias = "charged-boson")]
    ChargedBoson,
    Photon,
    /// Curly line
    Gluon,
    /// Dashed line
    Scalar,
}

impl LineStyle {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fermion => "fermion",
            Self::Boson => "boson",
            Self::ChargedBoson => "charged boson",
            Self::Photon => "photon",
            Self::Gluon => "gluon",
            Self::Scalar => "scalar",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fermion" => Some(Self::Fermion),
            "boson" => Some(Self::Boson),
            "charged boson" | "charged_boson" | "charged-boson" => Some(Self::ChargedBoson),
            "photon" => Some(Self::Photon),
            "gluon" => Some(Self::Gluon),
            "scalar" => Some(Self::Scalar),
            _ => None,
        }
    }
}

/// How one particle is drawn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticleInfo {
    pub style: LineStyle,
    /// TeX label, without math delimiters.
    pub label: String,
    #[serde(default)]
    pub is_anti: bool,
}

impl ParticleInfo {
    #[must_use]
    pub fn new(style: LineStyle, label: impl Into<String>, is_anti: bool) -> Self {
        Self {
            style,
            label: label.into(),
            is_anti,
        }
    }

    /// Antifermions are drawn against the construction direction of their edge.
    #[must_use]
    pub fn renders_reversed(&self) -> bool {
        self.is_anti && self.style == LineStyle::Fermion
    }
}

/// Source of particle drawing information.
pub trait ParticleLookup {
    fn lookup(&self, name: &str) -> ParticleInfo;
}

pub const GREEK_LETTERS: &[&str] = &[
    "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta", "iota", "kappa",
    "lambda", "mu", "nu", "xi", "pi", "rho", "sigma", "tau", "phi", "chi", "psi", "omega",
];

const BUILTIN_PARTICLES: &[(&str, LineStyle, &str, bool)] = &[
    // Quarks
    ("u", LineStyle::Fermion, "u", false),
    ("ubar", LineStyle::Fermion, "\\bar{u}", true),
    ("d", LineStyle::Fermion, "d", false),
    ("dbar", LineStyle::Fermion, "\\bar{d}", true),
    ("t", LineStyle::Fermion, "t", false),
    ("tbar", LineStyle::Fermion, "\\bar{t}", true),
    // Leptons
    ("e-", LineStyle::Fermion, "e^{-}", false),
    ("e+", LineStyle::Fermion, "e^{+}", true),
    ("mu-", LineStyle::Fermion, "\\mu^{-}", false),
    ("mu+", LineStyle::Fermion, "\\mu^{+}", true),
    ("tau-", LineStyle::Fermion, "\\tau^{-}", false),
    ("tau+", LineStyle::Fermion, "\\tau^{+}", true),
    ("nu_e", LineStyle::Fermion, "\\nu_{e}", false),
    // Bosons
    ("Z0", LineStyle::Boson, "Z^{0}", false),
    ("W+", LineStyle::ChargedBoson, "W^{+}", false),
    ("W-", LineStyle::ChargedBoson, "W^{-}", true),
    ("gamma", LineStyle::Photon, "\\gamma", false),
    ("g", LineStyle::Gluon, "g", false),
    ("H", LineStyle::Scalar, "H^{0}", false),
];

const MODIFIERS: [&str; 4] = ["bar", "+", "-", "0"];
const SCALAR_BASES: [&str; 4] = ["phi", "h", "H", "S"];
const BOSON_BASES: [&str; 4] = ["W", "Z", "gamma", "g"];
const CHARGED_LEPTON_BASES: [&str; 3] = ["e", "mu", "tau"];

/// Look a name up in the built-in table only.
#[must_use]
pub fn builtin_particle(name: &str) -> Option<ParticleInfo> {
    BUILTIN_PARTICLES
        .iter()
        .find(|(known, ..)| *known == name)
        .map(|(_, style, label, is_anti)| ParticleInfo::new(*style, *label, *is_anti))
}

/// Derive drawing information from the shape of a name.
///
/// The name must read as an alphabetic base, an optional modifier (`bar`,
/// `+`, `-`, `0`) and an optional `_index` of ASCII alphanumerics. The
/// shortest base that makes the rest parse wins. Returns `None` when the
/// name does not have that shape.
#[must_use]
pub fn decompose_name(name: &str) -> Option<ParticleInfo> {
    let letters = name
        .bytes()
        .take_while(u8::is_ascii_alphabetic)
        .count();
    (1..=letters).find_map(|base_len| {
        let (base, rest) = name.split_at(base_len);
        let (modifier, index) = split_suffix(rest)?;
        Some(assemble(base, modifier, index))
    })
}

fn split_suffix(rest: &str) -> Option<(Option<&str>, Option<&str>)> {
    for modifier in MODIFIERS {
        if let Some(index) = rest.strip_prefix(modifier).and_then(parse_index) {
            return Some((Some(modifier), index));
        }
    }
    parse_index(rest).map(|index| (None, index))
}

// `Some(None)` for an empty tail, `Some(Some(index))` for `_index`.
fn parse_index(tail: &str) -> Option<Option<&str>> {
    if tail.is_empty() {
        return Some(None);
    }
    let index = tail.strip_prefix('_')?;
    (!index.is_empty() && index.bytes().all(|byte| byte.is_ascii_alphanumeric()))
        .then_some(Some(index))
}

fn assemble(base: &str, modifier: Option<&str>, index: Option<&str>) -> ParticleInfo {
    let tex_base = if GREEK_LETTERS.contains(&base) {
        format!("\\{base}")
    } else {
        base.to_string()
    };
    let tex_index = index.map(|index| format!("_{{{index}}}")).unwrap_or_default();

    let (label, is_anti) = match modifier {
        Some("bar") => (format!("\\bar{{{tex_base}}}{tex_index}"), true),
        Some(charge) => (
            format!("{tex_base}^{{{charge}}}{tex_index}"),
            charge == "+" && CHARGED_LEPTON_BASES.contains(&base),
        ),
        None => (format!("{tex_base}{tex_index}"), false),
    };

    let style = if SCALAR_BASES.contains(&base) {
        LineStyle::Scalar
    } else if BOSON_BASES.contains(&base) {
        LineStyle::Boson
    } else {
        LineStyle::Fermion
    };

    ParticleInfo::new(style, label, is_anti)
}

/// Built-in particle table with user overrides layered on top.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticleRegistry {
    overrides: BTreeMap<String, ParticleInfo>,
}

impl ParticleRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_override(mut self, name: impl Into<String>, info: ParticleInfo) -> Self {
        self.insert(name, info);
        self
    }

    /// Register an override, returning the one it replaces.
    pub fn insert(&mut self, name: impl Into<String>, info: ParticleInfo) -> Option<ParticleInfo> {
        self.overrides.insert(name.into(), info)
    }

    #[must_use]
    pub fn overrides(&self) -> &BTreeMap<String, ParticleInfo> {
        &self.overrides
    }
}

impl ParticleLookup for ParticleRegistry {
    fn lookup(&self, name: &str) -> ParticleInfo {
        if let Some(info) = self.overrides.get(name) {
            return info.clone();
        }
        if let Some(info) = builtin_particle(name) {
            return info;
        }

        debug!(particle = name, "particle not in table; decomposing name");
        decompose_name(name).unwrap_or_else(|| {
            warn!(particle = name, "unreadable particle name; drawing as fermion");
            ParticleInfo::new(LineStyle::Fermion, name, false)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{
        LineStyle, ParticleInfo, ParticleLookup, ParticleRegistry, builtin_particle,
        decompose_name,
    };

    #[test]
    fn builtin_table_marks_antifermions() {
        let positron = builtin_particle("e+").expect("e+ is built in");
        assert_eq!(positron.style, LineStyle::Fermion);
        assert_eq!(positron.label, "e^{+}");
        assert!(positron.is_anti);
        assert!(positron.renders_reversed());

        let w_minus = builtin_particle("W-").expect("W- is built in");
        assert_eq!(w_minus.style, LineStyle::ChargedBoson);
        assert!(w_minus.is_anti);
        assert!(!w_minus.renders_reversed());

        assert_eq!(
            builtin_particle("H"),
            Some(ParticleInfo::new(LineStyle::Scalar, "H^{0}", false))
        );
    }

    #[test]
    fn overrides_take_precedence_over_table() {
        let registry = ParticleRegistry::new()
            .with_override("H", ParticleInfo::new(LineStyle::Scalar, "h", false));
        assert_eq!(registry.lookup("H").label, "h");
        assert_eq!(registry.lookup("Z0").label, "Z^{0}");
    }

    #[test]
    fn decomposes_greek_bar_and_index() {
        let info = decompose_name("alphabar_e").expect("decomposable");
        assert_eq!(info.label, "\\bar{\\alpha}_{e}");
        assert!(info.is_anti);
        assert_eq!(info.style, LineStyle::Fermion);
    }

    #[test]
    fn decomposes_charge_modifiers() {
        let antimuon = decompose_name("mu+_2").expect("decomposable");
        assert_eq!(antimuon.label, "\\mu^{+}_{2}");
        assert!(antimuon.is_anti);

        let neutral = decompose_name("phi0").expect("decomposable");
        assert_eq!(neutral.label, "\\phi^{0}");
        assert_eq!(neutral.style, LineStyle::Scalar);
        assert!(!neutral.is_anti);

        let pion = decompose_name("pi+").expect("decomposable");
        assert!(!pion.is_anti);
    }

    #[test]
    fn shortest_base_that_parses_wins() {
        let info = decompose_name("Zprime").expect("decomposable");
        assert_eq!(info.label, "Zprime");
        assert_eq!(info.style, LineStyle::Fermion);

        let boson = decompose_name("W_R").expect("decomposable");
        assert_eq!(boson.label, "W_{R}");
        assert_eq!(boson.style, LineStyle::Boson);
    }

    #[test]
    fn unreadable_names_fall_back_to_plain_fermion() {
        assert!(decompose_name("X'").is_none());
        assert!(decompose_name("42").is_none());

        let info = ParticleRegistry::new().lookup("X'");
        assert_eq!(info, ParticleInfo::new(LineStyle::Fermion, "X'", false));
    }

    #[test]
    fn line_style_strings_round_trip() {
        for style in [
            LineStyle::Fermion,
            LineStyle::Boson,
            LineStyle::ChargedBoson,
            LineStyle::Photon,
            LineStyle::Gluon,
            LineStyle::Scalar,
        ] {
            assert_eq!(LineStyle::parse(style.as_str()), Some(style));
            let encoded = serde_json::to_string(&style).expect("serialize style");
            assert_eq!(encoded, format!("\"{}\"", style.as_str()));
        }
        assert_eq!(LineStyle::parse("wiggly"), None);
    }
}
