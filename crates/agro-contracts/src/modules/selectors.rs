use super::registry::{AdvisoryModule, ModuleCatalog};

/// What the dashboard shows for the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorView {
    Welcome,
    Module(AdvisoryModule),
}

/// Holds which module is active. Nothing selected means the welcome view.
#[derive(Debug, Clone, Default)]
pub struct ModuleSelector {
    catalog: ModuleCatalog,
    selected: Option<AdvisoryModule>,
}

impl ModuleSelector {
    pub fn new(catalog: ModuleCatalog) -> Self {
        Self {
            catalog,
            selected: None,
        }
    }

    pub fn catalog(&self) -> &ModuleCatalog {
        &self.catalog
    }

    pub fn selected(&self) -> Option<AdvisoryModule> {
        self.selected
    }

    pub fn select(&mut self, module: AdvisoryModule) {
        self.selected = Some(module);
    }

    /// Selects by slug or display name.
    pub fn select_named(&mut self, raw: &str) -> Result<AdvisoryModule, String> {
        let Some(spec) = self.catalog.resolve(raw) else {
            return Err(format!(
                "Unknown module '{}'. Available: {}.",
                raw.trim(),
                self.catalog.slugs().join(", ")
            ));
        };
        self.selected = Some(spec.module);
        Ok(spec.module)
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    pub fn view(&self) -> SelectorView {
        match self.selected {
            Some(module) => SelectorView::Module(module),
            None => SelectorView::Welcome,
        }
    }
}
