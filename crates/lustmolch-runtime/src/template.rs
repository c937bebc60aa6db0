//! Config template rendering.
//!
//! Templates use `{{ placeholder }}` substitution. Rendering fails when a
//! template references a placeholder the context does not provide, so a
//! half-filled config file is never written.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use lustmolch_common::error::{LustmolchError, Result};
use lustmolch_common::types::ContainerRecord;
use tera::{Context, Tera};

use crate::layout::ContainerLayout;
use crate::templates;

/// Values available to every container template.
///
/// Exposes the record's fields plus a few derived paths and names, all as
/// plain strings.
#[derive(Debug)]
pub struct TemplateContext<'a> {
    /// The container's registry entry.
    pub record: &'a ContainerRecord,
    /// Host side veth interface name.
    pub veth_name: String,
    /// Shared web directory on the host.
    pub www_dir: String,
}

impl<'a> TemplateContext<'a> {
    /// Builds the context for `record` laid out at `layout`.
    #[must_use]
    pub fn new(record: &'a ContainerRecord, layout: &ContainerLayout) -> Self {
        Self {
            record,
            veth_name: record.name.veth_name(),
            www_dir: layout.www_dir().display().to_string(),
        }
    }

    /// Placeholder names mapped to their values.
    #[must_use]
    pub fn vars(&self) -> HashMap<String, String> {
        let r = self.record;
        [
            ("name", r.name.to_string()),
            ("ssh_port", r.ssh_port.to_string()),
            ("ip_address_host", r.ip_address_host.to_string()),
            ("ip_address_container", r.ip_address_container.to_string()),
            ("ip_subnet_length", r.ip_subnet_length.to_string()),
            ("url", r.url.clone()),
            ("veth_name", self.veth_name.clone()),
            ("www_dir", self.www_dir.clone()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

/// Named template set backed by Tera.
pub struct TemplateRenderer {
    tera: Tera,
}

impl TemplateRenderer {
    /// Creates a renderer holding the templates compiled into the binary.
    ///
    /// # Errors
    ///
    /// Returns an error if an embedded template fails to parse.
    pub fn from_embedded() -> Result<Self> {
        let mut tera = Tera::default();
        tera.autoescape_on(Vec::new());
        for (name, content) in templates::ALL_TEMPLATES {
            tera.add_raw_template(name, content)
                .map_err(|e| template_error(name, &e))?;
        }
        tracing::debug!(count = templates::ALL_TEMPLATES.len(), "loaded embedded templates");
        Ok(Self { tera })
    }

    /// Creates a renderer from the embedded set with files under `dir`
    /// replacing (or adding to) templates of the same relative name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be walked or a template
    /// fails to parse.
    pub fn with_overrides(dir: &Path) -> Result<Self> {
        let mut renderer = Self::from_embedded()?;
        let mut files = Vec::new();
        collect_files(dir, &mut files)?;

        for path in files {
            let Ok(relative) = path.strip_prefix(dir) else {
                continue;
            };
            let name = relative.to_string_lossy().replace('\\', "/");
            let content =
                std::fs::read_to_string(&path).map_err(|e| LustmolchError::io(&path, e))?;
            renderer
                .tera
                .add_raw_template(&name, &content)
                .map_err(|e| template_error(&name, &e))?;
            tracing::debug!(template = %name, path = %path.display(), "template override loaded");
        }
        Ok(renderer)
    }

    /// Renders a named template for a container.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is unknown or references a
    /// placeholder missing from the context.
    pub fn render(&self, name: &str, context: &TemplateContext<'_>) -> Result<String> {
        self.render_vars(name, &context.vars())
    }

    /// Renders a named template from a plain placeholder mapping.
    ///
    /// # Errors
    ///
    /// Returns an error if the template is unknown or references a
    /// placeholder missing from `vars`.
    pub fn render_vars(&self, name: &str, vars: &HashMap<String, String>) -> Result<String> {
        let mut ctx = Context::new();
        for (key, value) in vars {
            ctx.insert(key, value);
        }
        let rendered = self
            .tera
            .render(name, &ctx)
            .map_err(|e| template_error(name, &e))?;
        tracing::trace!(template = name, bytes = rendered.len(), "rendered template");
        Ok(rendered)
    }

    /// Names of all loaded templates.
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tera.get_template_names().map(String::from).collect();
        names.sort();
        names
    }
}

/// Tera nests the useful message (e.g. the missing variable) in the
/// source chain, so flatten it into one line.
fn template_error(name: &str, err: &tera::Error) -> LustmolchError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        message.push_str(": ");
        message.push_str(&inner.to_string());
        source = inner.source();
    }
    LustmolchError::Template {
        name: name.to_string(),
        message,
    }
}

fn collect_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let entries = std::fs::read_dir(dir).map_err(|e| LustmolchError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| LustmolchError::io(dir, e))?.path();
        if path.is_dir() {
            collect_files(&path, out)?;
        } else {
            out.push(path);
        }
    }
    Ok(())
}
