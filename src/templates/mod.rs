//! Configuration renderer.
//!
//! Produces the text of every managed file from a template identifier and a
//! variable bag.

mod engine;

pub use engine::{
    template_spec, TemplateEngine, TemplateSpec, EXPORTER_CONFIG, SERVICE_UNIT, SUDOERS,
    SYSCONFIG,
};
