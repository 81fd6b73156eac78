//! Tera template engine wrapper.
//!
//! Built-in templates are compiled into the binary. An optional override
//! directory can replace any of them by file name.

use std::path::Path;
use std::sync::Arc;

use tera::{Context, Tera};
use tracing::{debug, info};

use crate::error::{OperatorError, OperatorResult, TemplateErrorKind};

/// Identifier of the exporter configuration YAML template.
pub const EXPORTER_CONFIG: &str = "exporter-config";
/// Identifier of the service unit definition template.
pub const SERVICE_UNIT: &str = "service-unit";
/// Identifier of the sysconfig environment file template.
pub const SYSCONFIG: &str = "sysconfig";
/// Identifier of the privilege grant rule template.
pub const SUDOERS: &str = "sudoers";

/// A renderable template: its identifier, file name and required variables.
#[derive(Debug, Clone, Copy)]
pub struct TemplateSpec {
    pub id: &'static str,
    pub file: &'static str,
    pub required: &'static [&'static str],
    source: &'static str,
}

static TEMPLATES: &[TemplateSpec] = &[
    TemplateSpec {
        id: EXPORTER_CONFIG,
        file: "ipmi_exporter.yaml.tera",
        required: &["collectors"],
        source: include_str!("builtin/ipmi_exporter.yaml.tera"),
    },
    TemplateSpec {
        id: SERVICE_UNIT,
        file: "ipmi_exporter.service.tera",
        required: &["user", "group", "sysconfig", "binary", "config_file"],
        source: include_str!("builtin/ipmi_exporter.service.tera"),
    },
    TemplateSpec {
        id: SYSCONFIG,
        file: "ipmi_exporter.env.tera",
        required: &["listen_address"],
        source: include_str!("builtin/ipmi_exporter.env.tera"),
    },
    TemplateSpec {
        id: SUDOERS,
        file: "ipmi_exporter.sudoers.tera",
        required: &["account", "commands"],
        source: include_str!("builtin/ipmi_exporter.sudoers.tera"),
    },
];

/// Look up a template by identifier.
pub fn template_spec(id: &str) -> Option<&'static TemplateSpec> {
    TEMPLATES.iter().find(|spec| spec.id == id)
}

/// Template engine for rendering managed files.
///
/// Rendering is pure: it only produces text and never touches the filesystem.
#[derive(Clone)]
pub struct TemplateEngine {
    tera: Arc<Tera>,
}

impl TemplateEngine {
    /// Create an engine holding only the built-in templates.
    pub fn builtin() -> OperatorResult<Self> {
        let tera = Self::builtin_tera()?;
        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    /// Create an engine, letting `.tera` files in `override_dir` replace
    /// built-in templates with the same file name.
    pub fn new(override_dir: Option<&Path>) -> OperatorResult<Self> {
        let builtin = Self::builtin_tera()?;

        let Some(dir) = override_dir else {
            return Ok(Self {
                tera: Arc::new(builtin),
            });
        };

        let pattern = dir.join("**/*.tera");
        let pattern_str = pattern.to_string_lossy();
        debug!(pattern = %pattern_str, "Loading template overrides");

        let mut tera = Tera::new(&pattern_str).map_err(|e| OperatorError::Config {
            message: format!("Failed to load templates from '{}': {}", dir.display(), e),
        })?;
        let overrides = tera.get_template_names().count();

        // Templates already present in `tera` win over the built-in ones
        tera.extend(&builtin).map_err(|e| OperatorError::Config {
            message: format!("Failed to merge built-in templates: {}", e),
        })?;

        info!(
            directory = %dir.display(),
            overrides,
            "Template engine initialized"
        );

        Ok(Self {
            tera: Arc::new(tera),
        })
    }

    fn builtin_tera() -> OperatorResult<Tera> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().map(|spec| (spec.file, spec.source)))
            .map_err(|e| OperatorError::Render {
                kind: TemplateErrorKind::RenderFailed {
                    template: "builtin".to_string(),
                    message: e.to_string(),
                },
            })?;
        Ok(tera)
    }

    /// Render the template `template_id` with `variables`.
    ///
    /// Every required variable must be present and non-null in `variables`.
    pub fn render(&self, template_id: &str, variables: &serde_json::Value) -> OperatorResult<String> {
        let spec = template_spec(template_id).ok_or_else(|| OperatorError::Render {
            kind: TemplateErrorKind::NotFound {
                name: template_id.to_string(),
            },
        })?;

        for variable in spec.required {
            let present = variables
                .get(variable)
                .map(|value| !value.is_null())
                .unwrap_or(false);
            if !present {
                return Err(OperatorError::Render {
                    kind: TemplateErrorKind::MissingVariable {
                        template: template_id.to_string(),
                        variable: variable.to_string(),
                    },
                });
            }
        }

        let context = Context::from_serialize(variables).map_err(|e| OperatorError::Render {
            kind: TemplateErrorKind::RenderFailed {
                template: template_id.to_string(),
                message: format!("Invalid template context: {}", e),
            },
        })?;

        self.tera
            .render(spec.file, &context)
            .map_err(|e| OperatorError::Render {
                kind: TemplateErrorKind::RenderFailed {
                    template: template_id.to_string(),
                    message: error_chain(&e),
                },
            })
    }

    /// Check if a template file is loaded.
    pub fn has_template(&self, file: &str) -> bool {
        self.tera.get_template_names().any(|n| n == file)
    }
}

/// Tera nests the useful message in the error source chain.
fn error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    message
}
