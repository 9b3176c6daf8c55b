//! Template expansion for render documents and commands.
//!
//! Templates use `#name` placeholders. Only names supplied by the caller
//! are substituted; any other `#` text is copied through untouched, so
//! LaTeX macro parameters and shell comments survive expansion.

use std::path::Path;
use std::str::FromStr;

use crate::config::RenderConfig;
use crate::error::{RenderError, Result};

/// An RGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    /// Black.
    pub const BLACK: Rgb = Rgb {
        r: 0.0,
        g: 0.0,
        b: 0.0,
    };

    /// Formats the colour as `r,g,b` for a LaTeX `rgb` colour model.
    pub fn to_components(&self) -> String {
        format!("{:.6},{:.6},{:.6}", self.r, self.g, self.b)
    }
}

impl FromStr for Rgb {
    type Err = RenderError;

    /// Parses `#rgb` or `#rrggbb`.
    fn from_str(s: &str) -> Result<Self> {
        let invalid = || RenderError::InvalidColor(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(invalid)?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }

        let channel = |digits: &str| -> Result<f32> {
            let value = u8::from_str_radix(digits, 16).map_err(|_| invalid())?;
            Ok(value as f32 / 255.0)
        };

        match hex.len() {
            3 => {
                // Short form: each digit is doubled (#abc == #aabbcc)
                let double = |i: usize| hex[i..i + 1].repeat(2);
                Ok(Rgb {
                    r: channel(&double(0))?,
                    g: channel(&double(1))?,
                    b: channel(&double(2))?,
                })
            }
            6 => Ok(Rgb {
                r: channel(&hex[0..2])?,
                g: channel(&hex[2..4])?,
                b: channel(&hex[4..6])?,
            }),
            _ => Err(invalid()),
        }
    }
}

/// Expands `#name` placeholders in a single pass.
///
/// Substituted values are never rescanned, so a value containing `#dpi`
/// stays literal. When names share a prefix the longest one wins.
pub fn expand(template: &str, vars: &[(&str, &str)]) -> String {
    let mut names: Vec<&(&str, &str)> = vars.iter().collect();
    names.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(hash) = rest.find('#') {
        out.push_str(&rest[..hash]);
        let after = &rest[hash + 1..];

        match names.iter().find(|(name, _)| after.starts_with(*name)) {
            Some((name, value)) => {
                out.push_str(value);
                rest = &after[name.len()..];
            }
            None => {
                out.push('#');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// Quotes a string for use as a single POSIX shell word.
pub fn shell_quote(s: &str) -> String {
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('\'');
    for ch in s.chars() {
        if ch == '\'' {
            quoted.push_str("'\\''");
        } else {
            quoted.push(ch);
        }
    }
    quoted.push('\'');
    quoted
}

/// Everything needed to render one expression.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    /// The expression between the math delimiters.
    pub expression: String,
    /// Foreground colour of the rendered glyphs.
    pub color: Rgb,
    /// Output resolution.
    pub dpi: f32,
}

impl RenderRequest {
    /// Creates a request using the colour and dpi from `config`.
    ///
    /// `color_override` takes precedence over the configured foreground,
    /// mirroring a host that knows its own text colour.
    pub fn new(
        expression: impl Into<String>,
        config: &RenderConfig,
        color_override: Option<&str>,
    ) -> Result<Self> {
        let color = color_override.unwrap_or(config.foreground.as_str()).parse()?;
        Ok(Self {
            expression: expression.into(),
            color,
            dpi: config.dpi(),
        })
    }

    /// Builds the source document written to the job's input file.
    ///
    /// Placeholders: `#color`, `#expression`.
    pub fn document(&self, config: &RenderConfig) -> String {
        let color = self.color.to_components();
        expand(
            &config.document,
            &[("color", &color), ("expression", &self.expression)],
        )
    }

    /// Builds the shell command for a job working in `dir`.
    ///
    /// Placeholders: `#dir`, `#input`, `#output`, `#stem`, `#dpi`,
    /// `#color`, `#expression`. Every value is shell-quoted except `#stem`
    /// and `#dpi`, which are generated and safe.
    pub fn command(&self, config: &RenderConfig, dir: &Path, stem: &str) -> String {
        let dir_str = shell_quote(&dir.to_string_lossy());
        let input = shell_quote(&format!("{stem}.tex"));
        let output = shell_quote(&format!("{stem}.png"));
        let dpi = format!("{:.3}", self.dpi);
        let color = shell_quote(&self.color.to_components());
        let expression = shell_quote(&self.expression);

        expand(
            &config.command,
            &[
                ("dir", &dir_str),
                ("input", &input),
                ("output", &output),
                ("stem", stem),
                ("dpi", &dpi),
                ("color", &color),
                ("expression", &expression),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_long_color() {
        let rgb: Rgb = "#ff0080".parse().unwrap();
        assert_eq!(rgb.r, 1.0);
        assert_eq!(rgb.g, 0.0);
        assert!((rgb.b - 128.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_parse_short_color() {
        let short: Rgb = "#fff".parse().unwrap();
        let long: Rgb = "#ffffff".parse().unwrap();
        assert_eq!(short, long);
    }

    #[test]
    fn test_parse_invalid_color() {
        assert!("ffffff".parse::<Rgb>().is_err());
        assert!("#ffff".parse::<Rgb>().is_err());
        assert!("#gggggg".parse::<Rgb>().is_err());
    }

    #[test]
    fn test_components_format() {
        assert_eq!(Rgb::BLACK.to_components(), "0.000000,0.000000,0.000000");
    }

    #[test]
    fn test_expand_known_placeholders() {
        let out = expand("a #x b #y", &[("x", "1"), ("y", "2")]);
        assert_eq!(out, "a 1 b 2");
    }

    #[test]
    fn test_expand_leaves_unknown_hashes() {
        let out = expand(r"\def\f#1{#1} #name", &[("name", "v")]);
        assert_eq!(out, r"\def\f#1{#1} v");
    }

    #[test]
    fn test_expand_does_not_rescan_values() {
        let out = expand("#a", &[("a", "#b"), ("b", "nope")]);
        assert_eq!(out, "#b");
    }

    #[test]
    fn test_expand_prefers_longest_name() {
        let out = expand("#stem.dvi #st", &[("st", "S"), ("stem", "expression")]);
        assert_eq!(out, "expression.dvi S");
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!(shell_quote("plain"), "'plain'");
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
    }

    #[test]
    fn test_document_substitution() {
        let config = RenderConfig {
            document: "{#color} $#expression$".to_string(),
            ..RenderConfig::default()
        };
        let request = RenderRequest::new("x^2", &config, Some("#fff")).unwrap();
        assert_eq!(
            request.document(&config),
            "{1.000000,1.000000,1.000000} $x^2$"
        );
    }

    #[test]
    fn test_command_quotes_values() {
        let config = RenderConfig {
            command: "render #input #output #expression".to_string(),
            ..RenderConfig::default()
        };
        let request = RenderRequest::new("a'b", &config, None).unwrap();
        let command = request.command(&config, Path::new("/tmp/x"), "expression");
        assert_eq!(
            command,
            "render 'expression.tex' 'expression.png' 'a'\\''b'"
        );
    }

    #[test]
    fn test_request_rejects_bad_color() {
        let config = RenderConfig {
            foreground: "black".to_string(),
            ..RenderConfig::default()
        };
        assert!(RenderRequest::new("x", &config, None).is_err());
    }
}
