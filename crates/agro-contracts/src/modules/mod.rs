mod registry;
mod selectors;

pub use registry::{AdvisoryModule, DisplaySection, ModuleCatalog, ModuleSpec, SectionIcon};
pub use selectors::{ModuleSelector, SelectorView};
