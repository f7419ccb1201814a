// SPDX-FileCopyrightText: 2026 Parley Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Figment-to-miette error bridge.
//!
//! Converts Figment extraction errors into miette diagnostics that point
//! at the offending key in `config.yml` when the source file is known.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use parley_core::ParleyError;

/// A configuration error with diagnostic information.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A configuration value has the wrong type.
    #[error("invalid type for key `{key}`: {detail}")]
    #[diagnostic(code(parley::config::invalid_type), help("expected {expected}"))]
    InvalidType {
        key: String,
        detail: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A chat mode or model catalog could not be loaded.
    #[error("cannot load catalog {path}: {message}")]
    #[diagnostic(
        code(parley::config::catalog),
        help("catalog files are required and must contain a YAML mapping")
    )]
    Catalog { path: String, message: String },

    /// The dotenv secrets file exists but could not be parsed.
    #[error("cannot read secrets file {path}: {message}")]
    #[diagnostic(code(parley::config::secrets))]
    Secrets { path: String, message: String },

    /// A validation error for a config value.
    #[error("validation error: {message}")]
    #[diagnostic(code(parley::config::validation))]
    Validation { message: String },

    /// Catch-all for other configuration errors.
    #[error("configuration error: {0}")]
    #[diagnostic(code(parley::config::other))]
    Other(String),
}

impl From<ConfigError> for ParleyError {
    fn from(err: ConfigError) -> Self {
        ParleyError::Config(err.to_string())
    }
}

/// Convert a `figment::Error` into a list of `ConfigError` diagnostics.
///
/// `yaml_sources` holds `(path, content)` pairs used to attach source spans.
pub fn figment_to_config_errors(
    err: figment::Error,
    yaml_sources: &[(String, String)],
) -> Vec<ConfigError> {
    use figment::error::Kind;

    let mut errors = Vec::new();

    for error in err {
        let config_error = match &error.kind {
            Kind::InvalidType(actual, expected) | Kind::InvalidValue(actual, expected) => {
                let key = error
                    .path
                    .iter()
                    .map(|s| s.to_string())
                    .collect::<Vec<_>>()
                    .join(".");
                let (span, src) = find_source_span(&error, yaml_sources);
                ConfigError::InvalidType {
                    key,
                    detail: format!("found {actual}, expected {expected}"),
                    expected: expected.to_string(),
                    span,
                    src,
                }
            }
            _ => ConfigError::Other(format!("{error}")),
        };

        errors.push(config_error);
    }

    errors
}

fn find_source_span(
    error: &figment::error::Error,
    yaml_sources: &[(String, String)],
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let source_path = error
        .metadata
        .as_ref()
        .and_then(|m| m.source.as_ref())
        .and_then(|s| match s {
            figment::Source::File(path) => Some(path.display().to_string()),
            _ => None,
        });

    let source = source_path.as_ref().and_then(|path| {
        yaml_sources
            .iter()
            .find(|(p, _)| p == path)
            .map(|(p, content)| (p.as_str(), content.as_str()))
    });

    if let Some((path, content)) = source {
        let keys: Vec<String> = error.path.iter().map(|s| s.to_string()).collect();
        if let Some(offset) = find_key_offset(content, &keys) {
            let len = keys.last().map(String::len).unwrap_or(0);
            let span = SourceSpan::new(offset.into(), len);
            return (Some(span), Some(NamedSource::new(path, content.to_string())));
        }
    }

    (None, None)
}

/// Find the byte offset of a (possibly nested) key in block-style YAML.
///
/// For `["storage", "backend"]`, finds the `storage:` line and then the
/// first `backend:` line after it. Flow-style mappings are not searched.
pub fn find_key_offset(content: &str, path: &[String]) -> Option<usize> {
    let mut search_start = 0;
    let mut found = None;

    for key in path {
        let remaining = &content[search_start..];
        let mut byte_offset = 0;
        found = None;
        for line in remaining.split_inclusive('\n') {
            let trimmed = line.trim_start();
            if let Some(after) = trimmed.strip_prefix(key.as_str())
                && after.starts_with(':')
            {
                let start = search_start + byte_offset + (line.len() - trimmed.len());
                found = Some(start);
                search_start = search_start + byte_offset + line.len();
                break;
            }
            byte_offset += line.len();
        }
        found?;
    }

    found
}

/// Render a list of `ConfigError`s to stderr using miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    use miette::GraphicalReportHandler;

    let handler = GraphicalReportHandler::new();
    for error in errors {
        let mut buf = String::new();
        let diagnostic: &dyn Diagnostic = error;
        if handler.render_report(&mut buf, diagnostic).is_ok() {
            eprint!("{buf}");
        } else {
            eprintln!("Error: {error}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_top_level_key() {
        let content = "telegram_token: abc\nnew_dialog_timeout: soon\n";
        let offset = find_key_offset(content, &["new_dialog_timeout".to_string()]).unwrap();
        assert_eq!(&content[offset..offset + 18], "new_dialog_timeout");
    }

    #[test]
    fn find_nested_key_after_its_section() {
        let content = "backend: top\nstorage:\n  backend: sqlite\n";
        let path = vec!["storage".to_string(), "backend".to_string()];
        let offset = find_key_offset(content, &path).unwrap();
        assert_eq!(offset, content.rfind("backend").unwrap());
    }

    #[test]
    fn missing_key_has_no_offset() {
        let content = "telegram_token: abc\n";
        assert!(find_key_offset(content, &["openai_api_key".to_string()]).is_none());
    }

    #[test]
    fn config_error_converts_to_parley_error() {
        let err: ParleyError = ConfigError::Validation {
            message: "bad".into(),
        }
        .into();
        assert!(matches!(err, ParleyError::Config(msg) if msg.contains("bad")));
    }
}
