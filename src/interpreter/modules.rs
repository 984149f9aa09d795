use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::debug;

use super::error::InterpreterError;
use super::{Function, Interpreter};
use crate::config::LibraryConfig;
use crate::parser::{Import, Locatable, Span};

pub const DEFAULT_LIB_PATH: &str = "./lib/bcc";

/// The exported function table of an evaluated module file.
#[derive(Debug)]
pub struct Module {
    pub(crate) path: PathBuf,
    pub(crate) functions: HashMap<Rc<str>, Function>,
}

/// Loaded modules keyed by canonical path. Shared between a root
/// interpreter and the child interpreters evaluating its imports.
#[derive(Debug)]
pub struct ModuleRegistry {
    lib_path: PathBuf,
    loaded: HashMap<PathBuf, Rc<Module>>,
    loading: HashSet<PathBuf>,
}

impl ModuleRegistry {
    pub fn new(lib_path: impl Into<PathBuf>) -> Self {
        Self {
            lib_path: lib_path.into(),
            loaded: HashMap::new(),
            loading: HashSet::new(),
        }
    }

    pub fn lib_path(&self) -> &Path {
        &self.lib_path
    }

    pub fn set_lib_path(&mut self, lib_path: PathBuf) {
        self.lib_path = lib_path;
    }

    /// A bare `*.bcm` file name is looked up in the library directory,
    /// anything else relative to the working directory.
    pub fn resolve(&self, name: &str) -> Option<PathBuf> {
        let path = Path::new(name);
        let is_bare = path.extension().is_some_and(|ext| ext == "bcm")
            && path.parent().map_or(true, |parent| parent.as_os_str().is_empty());
        let candidate = if is_bare {
            self.lib_path.join(path)
        } else {
            path.to_path_buf()
        };
        let resolved = candidate.canonicalize().ok();
        debug!(module = name, candidate = %candidate.display(), found = resolved.is_some(), "resolving module");
        resolved
    }

    pub fn get(&self, path: &Path) -> Option<Rc<Module>> {
        self.loaded.get(path).cloned()
    }

    /// Marks `path` as being evaluated. Returns false when it already is,
    /// i.e. the import is circular.
    fn begin_loading(&mut self, path: &Path) -> bool {
        self.loading.insert(path.to_path_buf())
    }

    fn finish_loading(&mut self, path: &Path) {
        self.loading.remove(path);
    }

    fn insert(&mut self, module: Rc<Module>) {
        self.loaded.insert(module.path.clone(), module);
    }
}

/// `function` as seen from outside `module`: it keeps resolving its
/// helpers against the module that defined it.
pub(crate) fn exported(module: &Rc<Module>, function: &Function) -> Function {
    Function {
        definition: Rc::clone(&function.definition),
        module: Some(function.module.clone().unwrap_or_else(|| Rc::clone(module))),
    }
}

impl Interpreter {
    pub(crate) fn import(&mut self, import: &Import, span: Span) -> Result<(), InterpreterError> {
        let module = self.load_module(&import.path, span)?;
        if let Some(alias) = &import.alias {
            self.aliases.insert(Rc::clone(&alias.name), module);
            return Ok(());
        }
        match &import.items {
            Some(items) => {
                for item in items {
                    let Some(function) = module.functions.get(item.as_str()) else {
                        return Err(InterpreterError::MissingExport {
                            module: module.path.clone(),
                            name: item.to_string(),
                            span: item.span(),
                        });
                    };
                    self.functions
                        .insert(Rc::clone(&item.name), exported(&module, function));
                }
            }
            None => {
                for (name, function) in &module.functions {
                    self.functions
                        .insert(Rc::clone(name), exported(&module, function));
                }
            }
        }
        Ok(())
    }

    /// Evaluates the module at most once per registry and returns its
    /// function table.
    fn load_module(&mut self, name: &str, span: Span) -> Result<Rc<Module>, InterpreterError> {
        let resolved = self.modules.borrow().resolve(name);
        let Some(path) = resolved else {
            return Err(InterpreterError::ModuleNotFound {
                module: name.to_string(),
                span,
            });
        };
        let cached = self.modules.borrow().get(&path);
        if let Some(module) = cached {
            debug!(module = %path.display(), "module already loaded");
            return Ok(module);
        }
        if !self.modules.borrow_mut().begin_loading(&path) {
            return Err(InterpreterError::CircularImport { module: path, span });
        }

        debug!(module = %path.display(), "loading module");
        let result = self.evaluate_module(&path);
        self.modules.borrow_mut().finish_loading(&path);
        let functions = result.map_err(|source| InterpreterError::ModuleFailed {
            module: path.clone(),
            source: Box::new(source),
            span,
        })?;

        let module = Rc::new(Module { path, functions });
        self.modules.borrow_mut().insert(Rc::clone(&module));
        Ok(module)
    }

    fn evaluate_module(&self, path: &Path) -> Result<HashMap<Rc<str>, Function>, crate::Error> {
        let source = std::fs::read_to_string(path).map_err(|source| crate::Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut child = self.child();
        child.run(&source)?;
        Ok(child.functions)
    }

    /// Imports each named module before any user code runs, merging all of
    /// its functions.
    pub fn autoload<S: AsRef<str>>(&mut self, modules: &[S]) -> Result<(), crate::Error> {
        for name in modules {
            let name = name.as_ref();
            debug!(module = name, "autoloading");
            let import = Import {
                path: name.into(),
                items: None,
                alias: None,
            };
            self.import(&import, Span::Indetermined)?;
        }
        Ok(())
    }

    /// Applies a library configuration: its library path for subsequent
    /// imports, then its autoload list.
    pub fn configure(&mut self, config: &LibraryConfig) -> Result<(), crate::Error> {
        self.modules
            .borrow_mut()
            .set_lib_path(config.lib_path.clone());
        self.autoload(&config.autoload)
    }
}
