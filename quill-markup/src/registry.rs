use std::collections::BTreeMap;
use std::sync::Arc;

use crate::ast::Template;
use crate::builder::{self, Using};
use crate::config::MarkupConfig;
use crate::error::{MarkupError, Result};

/// Compiled templates by name. Owned by the embedding application; there is no global one.
#[derive(Debug, Default)]
pub struct Registry {
    config: MarkupConfig,
    templates: BTreeMap<String, Arc<Template>>,
}

impl Registry {
    pub fn new(config: MarkupConfig) -> Self {
        Registry {
            config: config.normalized(),
            templates: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &MarkupConfig {
        &self.config
    }

    /// Compiles `markup` and stores it under `name`.
    ///
    /// Component tags must refer to templates registered earlier, either by their own
    /// name or through `using`.
    pub fn register(&mut self, name: &str, markup: &str, using: &Using) -> Result<Arc<Template>> {
        if self.templates.contains_key(name) {
            return Err(MarkupError::DuplicateTemplate { name: name.to_string() });
        }
        let template = Arc::new(self.build(name, markup, using)?);
        tracing::debug!(name, nodes = template.len(), modules = template.modules().len(), "template registered");
        self.templates.insert(name.to_string(), Arc::clone(&template));
        Ok(template)
    }

    /// Compiles `markup` without storing it. Component tags still resolve against
    /// this registry.
    pub fn compile(&self, markup: &str) -> Result<Arc<Template>> {
        self.build("", markup, &Using::new()).map(Arc::new)
    }

    pub fn get(&self, name: &str) -> Option<Arc<Template>> {
        self.templates.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.templates.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.templates.keys().map(String::as_str)
    }

    fn build(&self, name: &str, markup: &str, using: &Using) -> Result<Template> {
        let known = |component: &str| self.templates.contains_key(component);
        builder::build(name, markup, &self.config, using, &known)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registries_are_independent() {
        let mut a = Registry::default();
        let b = Registry::default();
        a.register("comp-a", "<div>a</div>", &Using::new()).unwrap();
        assert!(a.contains("comp-a"));
        assert!(!b.contains("comp-a"));
        assert!(a.compile("<comp-a></comp-a>").is_ok());
        assert_eq!(
            b.compile("<comp-a></comp-a>").unwrap_err(),
            MarkupError::ComponentNotFound { tag: "comp-a".into() }
        );
    }

    #[test]
    fn names_are_unique() {
        let mut reg = Registry::default();
        reg.register("x", "<div/>", &Using::new()).unwrap();
        let err = reg.register("x", "<span/>", &Using::new()).unwrap_err();
        assert_eq!(err, MarkupError::DuplicateTemplate { name: "x".into() });
        assert_eq!(reg.names().collect::<Vec<_>>(), ["x"]);
    }
}
