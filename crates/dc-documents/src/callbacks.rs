//! Lifecycle callbacks
//!
//! Handlers are registered per type and per phase. The base dispatch
//! (`CallbackRegistry::run`) knows nothing about embedded documents; see
//! `propagation` for the layer that threads children into the chain.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::document::DocumentData;
pub use crate::error::CallbackResult;

/// Named lifecycle points
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallbackPhase {
    BeforeValidation,
    AfterValidation,
    BeforeSave,
    AfterSave,
    BeforeCreate,
    AfterCreate,
    BeforeUpdate,
    AfterUpdate,
    BeforeDestroy,
    AfterDestroy,
}

impl CallbackPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BeforeValidation => "before_validation",
            Self::AfterValidation => "after_validation",
            Self::BeforeSave => "before_save",
            Self::AfterSave => "after_save",
            Self::BeforeCreate => "before_create",
            Self::AfterCreate => "after_create",
            Self::BeforeUpdate => "before_update",
            Self::AfterUpdate => "after_update",
            Self::BeforeDestroy => "before_destroy",
            Self::AfterDestroy => "after_destroy",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "before_validation" => Some(Self::BeforeValidation),
            "after_validation" => Some(Self::AfterValidation),
            "before_save" => Some(Self::BeforeSave),
            "after_save" => Some(Self::AfterSave),
            "before_create" => Some(Self::BeforeCreate),
            "after_create" => Some(Self::AfterCreate),
            "before_update" => Some(Self::BeforeUpdate),
            "after_update" => Some(Self::AfterUpdate),
            "before_destroy" => Some(Self::BeforeDestroy),
            "after_destroy" => Some(Self::AfterDestroy),
            _ => None,
        }
    }
}

impl fmt::Display for CallbackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Handler body. Receives the document's own data, not its embedded children.
pub type Handler = Arc<dyn Fn(&mut DocumentData) -> CallbackResult<()> + Send + Sync>;

/// The rest of a callback chain, run before the current document's handlers
pub type Continuation<'a> = Box<dyn FnOnce() -> CallbackResult<()> + 'a>;

/// A continuation that does nothing
pub fn noop<'a>() -> Continuation<'a> {
    Box::new(|| Ok(()))
}

/// A registered handler
#[derive(Clone)]
pub struct CallbackHandler {
    pub name: String,
    pub run: Handler,
}

impl fmt::Debug for CallbackHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHandler").field("name", &self.name).finish()
    }
}

/// Per-type handler table
#[derive(Default)]
pub struct CallbackRegistry {
    handlers: RwLock<HashMap<CallbackPhase, Vec<CallbackHandler>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler. Handlers run in registration order.
    pub fn register<F>(&self, phase: CallbackPhase, name: impl Into<String>, handler: F)
    where
        F: Fn(&mut DocumentData) -> CallbackResult<()> + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(phase)
            .or_default()
            .push(CallbackHandler {
                name: name.into(),
                run: Arc::new(handler),
            });
    }

    /// Remove every handler registered under `name` for a phase
    pub fn remove(&self, phase: CallbackPhase, name: &str) -> usize {
        let mut handlers = self.handlers.write();
        let Some(list) = handlers.get_mut(&phase) else {
            return 0;
        };
        let before = list.len();
        list.retain(|h| h.name != name);
        let removed = before - list.len();
        if list.is_empty() {
            handlers.remove(&phase);
        }
        removed
    }

    /// Whether any handler is declared for the phase
    pub fn declares(&self, phase: CallbackPhase) -> bool {
        self.handlers
            .read()
            .get(&phase)
            .map_or(false, |list| !list.is_empty())
    }

    /// Snapshot of the handlers for a phase
    pub fn handlers(&self, phase: CallbackPhase) -> Vec<CallbackHandler> {
        self.handlers.read().get(&phase).cloned().unwrap_or_default()
    }

    /// Base dispatch: run `continuation`, then this type's handlers.
    ///
    /// Stops at the first error and returns it unchanged.
    pub fn run(
        &self,
        phase: CallbackPhase,
        data: &mut DocumentData,
        continuation: Continuation<'_>,
    ) -> CallbackResult<()> {
        continuation()?;

        // Snapshot so handlers may register further callbacks without deadlocking.
        for handler in self.handlers(phase) {
            trace!(%phase, handler = %handler.name, doc_type = %data.type_name(), "Running callback");
            (handler.run)(data)?;
        }
        Ok(())
    }
}

impl fmt::Debug for CallbackRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handlers = self.handlers.read();
        let mut map = f.debug_map();
        for (phase, list) in handlers.iter() {
            let names: Vec<&str> = list.iter().map(|h| h.name.as_str()).collect();
            map.entry(phase, &names);
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallbackError;
    use crate::schema::DocumentType;
    use parking_lot::Mutex;

    fn data() -> DocumentData {
        DocumentData::new(DocumentType::new("Note"))
    }

    #[test]
    fn test_phase_names_round_trip() {
        for phase in [
            CallbackPhase::BeforeSave,
            CallbackPhase::AfterSave,
            CallbackPhase::AfterDestroy,
        ] {
            assert_eq!(CallbackPhase::from_str(phase.as_str()), Some(phase));
        }
        assert_eq!(CallbackPhase::from_str("around_save"), None);
    }

    #[test]
    fn test_declares() {
        let registry = CallbackRegistry::new();
        assert!(!registry.declares(CallbackPhase::AfterSave));

        registry.register(CallbackPhase::AfterSave, "touch", |_| Ok(()));
        assert!(registry.declares(CallbackPhase::AfterSave));
        assert!(!registry.declares(CallbackPhase::BeforeSave));
    }

    #[test]
    fn test_run_continuation_then_handlers_in_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = CallbackRegistry::new();
        for name in ["first", "second"] {
            let log = Arc::clone(&log);
            registry.register(CallbackPhase::AfterSave, name, move |_| {
                log.lock().push(name);
                Ok(())
            });
        }

        let continuation_log = Arc::clone(&log);
        registry
            .run(
                CallbackPhase::AfterSave,
                &mut data(),
                Box::new(move || {
                    continuation_log.lock().push("continuation");
                    Ok(())
                }),
            )
            .unwrap();

        assert_eq!(*log.lock(), vec!["continuation", "first", "second"]);
    }

    #[test]
    fn test_run_stops_on_first_error() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let registry = CallbackRegistry::new();
        registry.register(CallbackPhase::BeforeSave, "reject", |_| {
            Err(CallbackError::abort("rejected"))
        });
        let after = Arc::clone(&log);
        registry.register(CallbackPhase::BeforeSave, "never", move |_| {
            after.lock().push("never");
            Ok(())
        });

        let result = registry.run(CallbackPhase::BeforeSave, &mut data(), noop());

        assert_eq!(result, Err(CallbackError::Aborted("rejected".to_string())));
        assert!(log.lock().is_empty());
    }

    #[test]
    fn test_failed_continuation_skips_handlers() {
        let registry = CallbackRegistry::new();
        let ran = Arc::new(Mutex::new(false));
        let flag = Arc::clone(&ran);
        registry.register(CallbackPhase::AfterSave, "mark", move |_| {
            *flag.lock() = true;
            Ok(())
        });

        let result = registry.run(
            CallbackPhase::AfterSave,
            &mut data(),
            Box::new(|| Err(CallbackError::abort("child failed"))),
        );

        assert!(result.is_err());
        assert!(!*ran.lock());
    }

    #[test]
    fn test_remove_handler() {
        let registry = CallbackRegistry::new();
        registry.register(CallbackPhase::AfterDestroy, "avatar", |_| Ok(()));
        registry.register(CallbackPhase::AfterDestroy, "resume", |_| Ok(()));

        assert_eq!(registry.remove(CallbackPhase::AfterDestroy, "avatar"), 1);
        assert_eq!(registry.handlers(CallbackPhase::AfterDestroy).len(), 1);
        assert_eq!(registry.remove(CallbackPhase::AfterDestroy, "resume"), 1);
        assert!(!registry.declares(CallbackPhase::AfterDestroy));
    }
}
