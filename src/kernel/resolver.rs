//! Controller and argument resolution.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use serde_json::Value;

use super::http::{Request, Response};
use crate::errors::{FrameworkError, FrameworkResult};

/// What a controller returns: a response, or a value for view listeners to
/// render.
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerResult {
    /// A finished response.
    Response(Response),
    /// Anything else.
    Value(Value),
}

impl From<Response> for ControllerResult {
    fn from(response: Response) -> Self {
        ControllerResult::Response(response)
    }
}

impl From<Value> for ControllerResult {
    fn from(value: Value) -> Self {
        ControllerResult::Value(value)
    }
}

type ControllerFn = dyn Fn(&Request, Vec<Value>) -> FrameworkResult<ControllerResult> + Send + Sync;

/// A named callable plus the parameter names it expects.
#[derive(Clone)]
pub struct Controller {
    name: String,
    parameters: Vec<String>,
    callable: Arc<ControllerFn>,
}

impl Controller {
    /// Creates a controller taking no arguments.
    pub fn new<F>(name: impl Into<String>, callable: F) -> Self
    where
        F: Fn(&Request, Vec<Value>) -> FrameworkResult<ControllerResult> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            callable: Arc::new(callable),
        }
    }

    /// Declares the parameters, in call order.
    pub fn with_parameters<I, S>(mut self, parameters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.parameters = parameters.into_iter().map(Into::into).collect();
        self
    }

    /// Returns the name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared parameters.
    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    /// Invokes the controller.
    pub fn call(&self, request: &Request, arguments: Vec<Value>) -> FrameworkResult<ControllerResult> {
        (self.callable)(request, arguments)
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("name", &self.name)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

/// Finds the controller for a request.
pub trait ControllerResolver: Send + Sync {
    /// Returns the controller, or `None` when the request maps to nothing.
    fn get_controller(&self, request: &Request) -> FrameworkResult<Option<Controller>>;
}

/// Computes the arguments a controller is called with.
pub trait ArgumentResolver: Send + Sync {
    /// Returns the arguments in declaration order.
    fn get_arguments(&self, request: &Request, controller: &Controller) -> FrameworkResult<Vec<Value>>;
}

/// Looks up the `_controller` request attribute in a registry.
#[derive(Debug, Default)]
pub struct AttributeControllerResolver {
    controllers: HashMap<String, Controller>,
}

impl AttributeControllerResolver {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a controller under its name.
    pub fn register(mut self, controller: Controller) -> Self {
        self.controllers.insert(controller.name.clone(), controller);
        self
    }
}

impl ControllerResolver for AttributeControllerResolver {
    fn get_controller(&self, request: &Request) -> FrameworkResult<Option<Controller>> {
        let Some(attribute) = request.attribute("_controller") else {
            #[cfg(feature = "tracing")]
            tracing::warn!(path = request.path(), "Unable to look for the controller as the \"_controller\" parameter is missing.");
            return Ok(None);
        };

        let Some(name) = attribute.as_str() else {
            return Err(FrameworkError::invalid_argument(format!(
                "The controller for URI \"{}\" is not callable: the \"_controller\" attribute must be a string.",
                request.path()
            )));
        };

        match self.controllers.get(name) {
            Some(controller) => Ok(Some(controller.clone())),
            None => Err(FrameworkError::invalid_argument(format!(
                "The controller for URI \"{}\" is not callable: controller \"{}\" is not registered.",
                request.path(),
                name
            ))),
        }
    }
}

/// Fills parameters from request attributes, then from the query string.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestAttributeArgumentResolver;

impl ArgumentResolver for RequestAttributeArgumentResolver {
    fn get_arguments(&self, request: &Request, controller: &Controller) -> FrameworkResult<Vec<Value>> {
        controller
            .parameters()
            .iter()
            .map(|parameter| {
                request
                    .attribute(parameter)
                    .or_else(|| request.query(parameter).map(Value::from))
                    .ok_or_else(|| {
                        FrameworkError::runtime(format!(
                            "Controller \"{}\" requires that you provide a value for the \"${}\" argument.",
                            controller.name(),
                            parameter
                        ))
                    })
            })
            .collect()
    }
}
