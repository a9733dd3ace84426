//! Action registry: routes requests to core or extended handlers.

use crate::action::request::{Action, Request};
use crate::action::response::ResponseWriter;
use crate::action::retcode;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Something that answers action requests.
pub trait Handler: Send + Sync {
    fn handle_action(&self, w: &mut ResponseWriter, r: &Request);
}

/// Adapts a closure into a [`Handler`].
pub struct HandlerFn<F>(pub F);

impl<F> Handler for HandlerFn<F>
where
    F: Fn(&mut ResponseWriter, &Request) + Send + Sync,
{
    fn handle_action(&self, w: &mut ResponseWriter, r: &Request) {
        (self.0)(w, r)
    }
}

impl<H: Handler + ?Sized> Handler for Arc<H> {
    fn handle_action(&self, w: &mut ResponseWriter, r: &Request) {
        (**self).handle_action(w, r)
    }
}

impl<H: Handler + ?Sized> Handler for Box<H> {
    fn handle_action(&self, w: &mut ResponseWriter, r: &Request) {
        (**self).handle_action(w, r)
    }
}

/// Two disjoint name→handler tables, one for core actions and one for
/// vendor-extended actions, both keyed by the unprefixed name.
///
/// Tables are filled during startup and only read afterwards.
#[derive(Default)]
pub struct ActionMux {
    handlers: HashMap<String, Box<dyn Handler>>,
    extended_handlers: HashMap<String, Box<dyn Handler>>,
}

impl ActionMux {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a core action.
    ///
    /// # Panics
    ///
    /// Panics if `action` is empty or already registered. Both are startup
    /// misconfigurations that would otherwise leave requests unroutable.
    pub fn register(&mut self, action: impl Into<String>, handler: impl Handler + 'static) {
        let action = action.into();
        if action.is_empty() {
            panic!("core action name must not be empty");
        }
        if self.handlers.contains_key(&action) {
            panic!("core action `{action}` is already registered");
        }
        self.handlers.insert(action, Box::new(handler));
    }

    pub fn register_fn<F>(&mut self, action: impl Into<String>, f: F)
    where
        F: Fn(&mut ResponseWriter, &Request) + Send + Sync + 'static,
    {
        self.register(action, HandlerFn(f));
    }

    /// Register a handler for an extended action, by its unprefixed name.
    ///
    /// A request for `<prefix>_<action>` reaches this handler.
    ///
    /// # Panics
    ///
    /// Panics if `action` is empty or already registered.
    pub fn register_extended(&mut self, action: impl Into<String>, handler: impl Handler + 'static) {
        let action = action.into();
        if action.is_empty() {
            panic!("extended action name must not be empty");
        }
        if self.extended_handlers.contains_key(&action) {
            panic!("extended action `{action}` is already registered");
        }
        self.extended_handlers.insert(action, Box::new(handler));
    }

    pub fn register_extended_fn<F>(&mut self, action: impl Into<String>, f: F)
    where
        F: Fn(&mut ResponseWriter, &Request) + Send + Sync + 'static,
    {
        self.register_extended(action, HandlerFn(f));
    }

    /// Wire names of every registered action, sorted.
    pub fn supported_actions(&self, prefix: &str) -> Vec<String> {
        let mut names: Vec<String> = self
            .handlers
            .keys()
            .cloned()
            .chain(
                self.extended_handlers
                    .keys()
                    .map(|name| format!("{prefix}_{name}")),
            )
            .collect();
        names.sort();
        names
    }

    fn lookup(&self, action: &Action) -> Option<&dyn Handler> {
        let table = match action {
            Action::Core(_) => &self.handlers,
            Action::Extended { .. } => &self.extended_handlers,
        };
        table.get(action.name()).map(|h| &**h)
    }
}

impl Handler for ActionMux {
    fn handle_action(&self, w: &mut ResponseWriter, r: &Request) {
        // "ok" unless the handler says otherwise
        w.write_ok();

        match self.lookup(&r.action) {
            Some(handler) => handler.handle_action(w, r),
            None => {
                debug!(action = %r.action, "action not found");
                w.write_failed(
                    retcode::UNSUPPORTED_ACTION,
                    format!("action `{}` not found", r.action),
                );
            }
        }
    }
}
