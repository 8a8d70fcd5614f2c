//! Mock implementations for testing.
//!
//! Provides a path-keyed controller resolver, a listener recorder and canned
//! controllers.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::errors::{FrameworkError, FrameworkResult};
use crate::kernel::events::KernelEvents;
use crate::kernel::http::{Request, Response};
use crate::kernel::resolver::{Controller, ControllerResolver};

/// Resolves controllers by request path.
#[derive(Debug, Default)]
pub struct StaticControllerResolver {
    routes: HashMap<String, Controller>,
    lookups: Arc<Mutex<Vec<String>>>,
}

impl StaticControllerResolver {
    /// Creates a resolver with no routes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps a path to a controller.
    pub fn route(mut self, path: impl Into<String>, controller: Controller) -> Self {
        self.routes.insert(path.into(), controller);
        self
    }

    /// Returns the looked-up paths, in order.
    pub fn lookups(&self) -> Vec<String> {
        self.lookups.lock().unwrap().clone()
    }
}

impl ControllerResolver for StaticControllerResolver {
    fn get_controller(&self, request: &Request) -> FrameworkResult<Option<Controller>> {
        self.lookups.lock().unwrap().push(request.path().to_string());
        Ok(self.routes.get(request.path()).cloned())
    }
}

/// Records which lifecycle stages ran.
#[derive(Debug, Clone, Default)]
pub struct EventRecorder {
    events: Arc<Mutex<Vec<String>>>,
}

impl EventRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an entry.
    pub fn record(&self, entry: impl Into<String>) {
        self.events.lock().unwrap().push(entry.into());
    }

    /// Returns the recorded entries.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Clears the recorded entries.
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Registers a recording listener on every stage.
    ///
    /// Entries are the stage name, plus the response status for the
    /// response and terminate stages.
    pub fn attach(&self, events: &mut KernelEvents) {
        let r = self.clone();
        events.on_request(move |_, _| {
            r.record("request");
            Ok(())
        });
        let r = self.clone();
        events.on_controller(move |_, _| {
            r.record("controller");
            Ok(())
        });
        let r = self.clone();
        events.on_controller_arguments(move |_, _| {
            r.record("controller_arguments");
            Ok(())
        });
        let r = self.clone();
        events.on_view(move |_, _| {
            r.record("view");
            Ok(())
        });
        let r = self.clone();
        events.on_response(move |event, _| {
            r.record(format!("response {}", event.response().status().as_u16()));
            Ok(())
        });
        let r = self.clone();
        events.on_finish_request(move |_, _| {
            r.record("finish_request");
            Ok(())
        });
        let r = self.clone();
        events.on_exception(move |_, _| {
            r.record("exception");
            Ok(())
        });
        let r = self.clone();
        events.on_terminate(move |event, _| {
            r.record(format!("terminate {}", event.response().status().as_u16()));
            Ok(())
        });
    }
}

/// A controller answering with fixed content.
pub fn ok_controller(name: &str, content: &str) -> Controller {
    let content = content.to_string();
    Controller::new(name, move |_, _| Ok(Response::new(content.clone()).into()))
}

/// A controller failing with a runtime error.
pub fn failing_controller(name: &str, message: &str) -> Controller {
    let message = message.to_string();
    Controller::new(name, move |_, _| Err(FrameworkError::runtime(message.clone())))
}

/// A controller returning no response at all.
pub fn null_controller(name: &str) -> Controller {
    Controller::new(name, |_, _| Ok(serde_json::Value::Null.into()))
}
