//! Config template rendering.
//!
//! Templates are plain text with `{name}` placeholders; `{{` and `}}` stand for
//! literal braces. Rendering is pure apart from reading the template and
//! writing the result, so rendering twice with the same inputs produces
//! byte-identical files.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::error::{PgdbError, PgdbResult};

/// Placeholder name to substituted value
pub type TemplateValues = BTreeMap<String, String>;

/// Bundled Neo4j config template
pub const NEO4J_TEMPLATE: &str = include_str!("../templates/neo4j.conf");

/// Bundled InfluxDB config template
pub const INFLUXDB_TEMPLATE: &str = include_str!("../templates/influxdb.conf");

/// How values are cleaned up before substitution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sanitize {
    /// Values are inserted verbatim
    #[default]
    None,
    /// Backslashes become forward slashes (InfluxDB's TOML rejects `\` in paths)
    ForwardSlashes,
}

impl Sanitize {
    pub fn apply(&self, value: &str) -> String {
        match self {
            Sanitize::None => value.to_string(),
            Sanitize::ForwardSlashes => value.replace('\\', "/"),
        }
    }
}

/// Substitute every placeholder in `template`.
///
/// `name` only labels errors.
pub fn render_str(
    name: &str,
    template: &str,
    values: &TemplateValues,
    sanitize: Sanitize,
) -> PgdbResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.char_indices().peekable();

    while let Some((start, c)) = chars.next() {
        match c {
            '{' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                out.push('{');
            }
            '}' if matches!(chars.peek(), Some((_, '}'))) => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let key_start = start + 1;
                let key_end = loop {
                    match chars.next() {
                        Some((i, '}')) => break i,
                        Some((_, '{')) | None => {
                            return Err(PgdbError::TemplateRender {
                                template: name.to_string(),
                                message: format!("unterminated placeholder at byte {start}"),
                            })
                        }
                        Some(_) => {}
                    }
                };
                let key = template[key_start..key_end].trim();
                let value = values
                    .get(key)
                    .ok_or_else(|| PgdbError::MissingPlaceholderValue {
                        template: name.to_string(),
                        key: key.to_string(),
                    })?;
                out.push_str(&sanitize.apply(value));
            }
            '}' => {
                return Err(PgdbError::TemplateRender {
                    template: name.to_string(),
                    message: format!("unmatched '}}' at byte {start}"),
                })
            }
            _ => out.push(c),
        }
    }

    Ok(out)
}

/// Render `template` text into `output_path`, creating parent directories
pub fn render_to(
    name: &str,
    template: &str,
    output_path: &Path,
    values: &TemplateValues,
    sanitize: Sanitize,
) -> PgdbResult<()> {
    let rendered = render_str(name, template, values, sanitize)?;
    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| PgdbError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(output_path, rendered).map_err(|source| PgdbError::Write {
        path: output_path.to_path_buf(),
        source,
    })?;
    debug!(template = name, path = %output_path.display(), "rendered config");
    Ok(())
}

/// Read the template at `template_path` and render it into `output_path`
pub fn render(
    template_path: &Path,
    output_path: &Path,
    values: &TemplateValues,
    sanitize: Sanitize,
) -> PgdbResult<()> {
    let template =
        std::fs::read_to_string(template_path).map_err(|source| PgdbError::TemplateNotFound {
            path: template_path.to_path_buf(),
            source,
        })?;
    let name = template_path.display().to_string();
    render_to(&name, &template, output_path, values, sanitize)
}
