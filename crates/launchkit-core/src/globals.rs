//! Module global-variable lookup

use std::fmt;

use crate::error::{LaunchError, Result};

/// Handle of a loaded code-object module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleHandle(pub u64);

impl fmt::Display for ModuleHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "module{:#x}", self.0)
    }
}

/// Device address and size of a module-scope variable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalSymbol {
    pub device_ptr: u64,
    pub size: usize,
}

/// Symbol table of loaded modules, owned by the module loader
pub trait GlobalResolver: Send + Sync {
    fn lookup(&self, module: ModuleHandle, name: &str) -> Option<GlobalSymbol>;
}

/// Look up the global `name` in `module`.
///
/// Address and size are always returned together.
pub fn lookup_global(resolver: &dyn GlobalResolver, module: Option<ModuleHandle>, name: &str) -> Result<GlobalSymbol> {
    if name.is_empty() {
        return Err(LaunchError::invalid_value("global name is empty"));
    }
    let module = module.ok_or_else(|| LaunchError::invalid_handle("module is null"))?;
    resolver
        .lookup(module, name)
        .ok_or_else(|| LaunchError::NotFound(format!("global {name} in {module}")))
}
