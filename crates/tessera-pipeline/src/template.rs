//! Placeholder substitution for run workspaces.
//!
//! Two syntaxes are involved:
//!
//! - Entry files carry `{{name}}` placeholders that are replaced with run
//!   values when the workspace is materialized. Unknown names are left alone,
//!   since pipeline sources have their own uses for braces.
//! - Input-mapping templates in `metadata.json` use `{param}` fields over the
//!   run parameters, with `{{` / `}}` as literal braces. Unknown fields are an
//!   error because the definition itself is wrong.

use std::collections::BTreeMap;

use crate::error::{PipelineError, Result};

/// Replace every `{{ name }}` whose `name` is in `values`.
pub fn render_placeholders(text: &str, values: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut remaining = text;

    while let Some(start) = remaining.find("{{") {
        let Some(end) = remaining[start..].find("}}") else {
            break; // Unclosed `{{`
        };
        let inner = remaining[start + 2..start + end].trim();
        out.push_str(&remaining[..start]);
        match values.get(inner) {
            Some(value) => out.push_str(value),
            None => out.push_str(&remaining[start..start + end + 2]),
        }
        remaining = &remaining[start + end + 2..];
    }

    out.push_str(remaining);
    out
}

/// Format a single `{param}` template.
pub fn format_template(template: &str, vars: &BTreeMap<&str, &str>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                out.push('{');
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                out.push('}');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some(ch) => name.push(ch),
                        None => {
                            return Err(PipelineError::InvalidDefinition(format!(
                                "unclosed field in input mapping '{template}'"
                            )));
                        }
                    }
                }
                let value = vars.get(name.trim()).ok_or_else(|| {
                    PipelineError::InvalidDefinition(format!(
                        "input mapping '{template}' references unknown parameter '{name}'"
                    ))
                })?;
                out.push_str(value);
            }
            '}' => {
                return Err(PipelineError::InvalidDefinition(format!(
                    "single '}}' in input mapping '{template}'"
                )));
            }
            other => out.push(other),
        }
    }

    Ok(out)
}

/// Resolve every entry of a definition's input mapping.
pub fn resolve_input_mapping(
    mapping: &BTreeMap<String, String>,
    vars: &BTreeMap<&str, &str>,
) -> Result<BTreeMap<String, String>> {
    mapping
        .iter()
        .map(|(key, template)| Ok((key.clone(), format_template(template, vars)?)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_known_placeholders() {
        let vals = values(&[("input_dir", "s3://in"), ("output_dir", "s3://out")]);
        let text = "IN = '{{input_dir}}'\nOUT = '{{ output_dir }}'\n";
        assert_eq!(
            render_placeholders(text, &vals),
            "IN = 's3://in'\nOUT = 's3://out'\n"
        );
    }

    #[test]
    fn test_render_leaves_unknown_and_unclosed() {
        let vals = values(&[("a", "1")]);
        assert_eq!(render_placeholders("{{b}} {{a}}", &vals), "{{b}} 1");
        assert_eq!(render_placeholders("x {{a", &vals), "x {{a");
        assert_eq!(render_placeholders("{sample}", &vals), "{sample}");
    }

    #[test]
    fn test_format_template() {
        let vars = BTreeMap::from([("dataset", "cohort-1"), ("output_dir", "res")]);
        assert_eq!(
            format_template("s3://{dataset}/raw/{{literal}}", &vars).unwrap(),
            "s3://cohort-1/raw/{literal}"
        );
        assert!(matches!(
            format_template("{missing}", &vars),
            Err(PipelineError::InvalidDefinition(_))
        ));
        assert!(format_template("{dataset", &vars).is_err());
        assert!(format_template("a}b", &vars).is_err());
    }

    #[test]
    fn test_resolve_input_mapping() {
        let mapping = values(&[("reads", "{dataset}/reads"), ("ref", "static/ref.fa")]);
        let vars = BTreeMap::from([("dataset", "ds")]);
        let resolved = resolve_input_mapping(&mapping, &vars).unwrap();
        assert_eq!(resolved["reads"], "ds/reads");
        assert_eq!(resolved["ref"], "static/ref.fa");
    }
}
