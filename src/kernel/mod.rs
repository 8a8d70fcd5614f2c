//! Event-driven HTTP kernel.
//!
//! [`HttpKernel::handle`] drives one request through a fixed sequence of
//! stages:
//!
//! ```text
//! request -> controller -> controller_arguments -> (call) -> [view] -> response -> finish_request
//!     \____________\_________________\_________________\_______\
//!                                                               exception
//! ```
//!
//! Any failure before the response stage enters the exception stage once.
//! A controller that returns a value no view listener converts is a fatal
//! contract breach and never reaches exception listeners.

pub mod events;
pub mod http;
pub mod request_stack;
pub mod resolver;

use std::sync::Arc;

use self::events::{
    ControllerArgumentsEvent, ControllerEvent, ExceptionEvent, FinishRequestEvent, KernelEvents,
    RequestEvent, ResponseEvent, TerminateEvent, ViewEvent,
};
use self::http::{Request, RequestType, Response};
use self::request_stack::{RequestStack, StackGuard};
use self::resolver::{ArgumentResolver, ControllerResolver, ControllerResult, RequestAttributeArgumentResolver};
use crate::config::KernelConfig;
use crate::errors::{FrameworkError, FrameworkResult};
use crate::observability::{KernelMetrics, Timer};

/// The HTTP kernel.
pub struct HttpKernel {
    events: KernelEvents,
    controller_resolver: Box<dyn ControllerResolver>,
    argument_resolver: Box<dyn ArgumentResolver>,
    request_stack: Arc<RequestStack>,
    config: KernelConfig,
    metrics: Arc<KernelMetrics>,
}

impl std::fmt::Debug for HttpKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpKernel")
            .field("events", &self.events)
            .field("request_stack", &self.request_stack)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl HttpKernel {
    /// Creates a new kernel builder.
    pub fn builder() -> HttpKernelBuilder {
        HttpKernelBuilder::default()
    }

    /// Returns the request stack.
    pub fn request_stack(&self) -> &Arc<RequestStack> {
        &self.request_stack
    }

    /// Returns the metrics collector.
    pub fn metrics(&self) -> &Arc<KernelMetrics> {
        &self.metrics
    }

    /// Returns the configuration.
    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    /// Handles a main request, catching failures per configuration.
    pub fn handle_main(&self, request: Arc<Request>) -> FrameworkResult<Response> {
        self.handle(request, RequestType::Main, self.config.catch_exceptions)
    }

    /// Handles a request.
    ///
    /// With `catch` set, failures go through the exception listeners and the
    /// error is returned only when none of them produced a response. Without
    /// it, failures are returned directly. The request stack is restored on
    /// every path.
    pub fn handle(&self, request: Arc<Request>, request_type: RequestType, catch: bool) -> FrameworkResult<Response> {
        let timer = Timer::start("kernel.handle");
        let _guard = StackGuard::push(&self.request_stack, Arc::clone(&request));

        #[cfg(feature = "tracing")]
        tracing::debug!(
            method = %request.method(),
            path = request.path(),
            request_type = ?request_type,
            "Handling request"
        );

        let result = match self.handle_raw(&request, request_type) {
            Ok(response) => Ok(response),
            Err(error) if !error.kind().is_recoverable() => {
                self.metrics.record_contract_violation();
                self.finish_request(&request, request_type)?;
                Err(error)
            }
            Err(error) if !catch => {
                self.finish_request(&request, request_type)?;
                Err(error)
            }
            Err(error) => self.handle_error(error, &request, request_type),
        };

        if result.is_err() {
            self.metrics.record_propagated();
        }
        self.metrics.record_handled(request_type == RequestType::Main, timer.stop());
        result
    }

    fn handle_raw(&self, request: &Arc<Request>, request_type: RequestType) -> FrameworkResult<Response> {
        let mut event = RequestEvent::new(Arc::clone(request), request_type);
        self.events.request.dispatch(&mut event, self)?;
        if let Some(response) = event.into_response() {
            return self.filter_response(response, request, request_type);
        }

        let controller = self.controller_resolver.get_controller(request)?.ok_or_else(|| {
            FrameworkError::not_found(format!(
                "Unable to find the controller for path \"{}\". The route is wrongly configured.",
                request.path()
            ))
        })?;

        let mut event = ControllerEvent::new(Arc::clone(request), request_type, controller);
        self.events.controller.dispatch(&mut event, self)?;
        let controller = event.into_controller();

        let arguments = self.argument_resolver.get_arguments(request, &controller)?;
        let mut event = ControllerArgumentsEvent::new(Arc::clone(request), request_type, controller, arguments);
        self.events.controller_arguments.dispatch(&mut event, self)?;
        let (controller, arguments) = event.into_parts();

        let response = match controller.call(request, arguments)? {
            ControllerResult::Response(response) => response,
            ControllerResult::Value(value) => {
                let mut event = ViewEvent::new(Arc::clone(request), request_type, value);
                self.events.view.dispatch(&mut event, self)?;
                match event.into_parts() {
                    (_, Some(response)) => response,
                    (value, None) => {
                        let mut message = format!(
                            "The controller \"{}\" must return a response but it returned {}.",
                            controller.name(),
                            describe_value(&value)
                        );
                        if value.is_null() {
                            message.push_str(" Did you forget to add a return statement somewhere in your controller?");
                        }
                        return Err(FrameworkError::controller_contract(message));
                    }
                }
            }
        };

        self.filter_response(response, request, request_type)
    }

    /// Runs the response listeners, then the finish-request listeners.
    fn filter_response(&self, response: Response, request: &Arc<Request>, request_type: RequestType) -> FrameworkResult<Response> {
        let mut event = ResponseEvent::new(Arc::clone(request), request_type, response);
        self.events.response.dispatch(&mut event, self)?;
        self.finish_request(request, request_type)?;
        Ok(event.into_response())
    }

    fn finish_request(&self, request: &Arc<Request>, request_type: RequestType) -> FrameworkResult<()> {
        let mut event = FinishRequestEvent::new(Arc::clone(request), request_type);
        self.events.finish_request.dispatch(&mut event, self)
    }

    /// Routes a failure through the exception listeners.
    fn handle_error(&self, error: FrameworkError, request: &Arc<Request>, request_type: RequestType) -> FrameworkResult<Response> {
        let mut event = ExceptionEvent::new(Arc::clone(request), request_type, error);
        self.events.exception.dispatch(&mut event, self)?;
        let (error, response, allow_custom_response_code) = event.into_parts();

        let Some(mut response) = response else {
            log_error(&error, false);
            self.finish_request(request, request_type)?;
            return Err(error);
        };

        log_error(&error, true);
        self.metrics.record_recovered();

        if !allow_custom_response_code
            && !response.is_client_error()
            && !response.is_server_error()
            && !response.is_redirection()
        {
            match error.status_code() {
                Some(code) => {
                    response.set_status_code(code)?;
                    for (name, value) in error.headers() {
                        response.insert_header(name, value)?;
                    }
                }
                None => response.set_status_code(500)?,
            }
        }

        match self.filter_response(response.clone(), request, request_type) {
            Ok(filtered) => Ok(filtered),
            Err(_filter_error) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(error = %_filter_error, "Response listeners failed on a recovered response");
                Ok(response)
            }
        }
    }

    /// Runs the terminate listeners once the response was sent.
    pub fn terminate(&self, request: Arc<Request>, response: &Response) -> FrameworkResult<()> {
        let mut event = TerminateEvent::new(request, response.clone());
        self.events.terminate.dispatch(&mut event, self)?;
        self.metrics.record_termination();
        Ok(())
    }

    /// Turns a failure raised outside of `handle` into a response and runs
    /// the terminate listeners with it.
    ///
    /// Falls back to the main request when `request` is `None`; the error is
    /// returned as-is when there is no request at all.
    pub fn terminate_with_exception(&self, error: FrameworkError, request: Option<Arc<Request>>) -> FrameworkResult<()> {
        let main = self.request_stack.main_request();
        let Some(request) = request.or_else(|| main.clone()) else {
            return Err(error);
        };

        let is_main = main.as_ref().is_some_and(|m| Arc::ptr_eq(m, &request));
        let response = if is_main {
            self.handle_error(error, &request, RequestType::Main)?
        } else {
            let _guard = StackGuard::push(&self.request_stack, Arc::clone(&request));
            self.handle_error(error, &request, RequestType::Main)?
        };

        self.terminate(request, &response)
    }
}

fn describe_value(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => format!("\"{}\"", s),
        serde_json::Value::Array(a) => format!("an array of {} items", a.len()),
        serde_json::Value::Object(_) => "an object".to_string(),
    }
}

#[cfg(feature = "tracing")]
fn log_error(error: &FrameworkError, recovered: bool) {
    use crate::errors::ErrorSeverity;

    match error.severity() {
        ErrorSeverity::Critical => tracing::error!(error = %error, recovered, "Uncaught failure"),
        ErrorSeverity::Error => tracing::warn!(error = %error, recovered, "Uncaught failure"),
        ErrorSeverity::Warning | ErrorSeverity::Info => {
            tracing::info!(error = %error, recovered, "Uncaught failure")
        }
    }
}

#[cfg(not(feature = "tracing"))]
fn log_error(_error: &FrameworkError, _recovered: bool) {}

/// Builder for [`HttpKernel`].
#[derive(Default)]
pub struct HttpKernelBuilder {
    events: KernelEvents,
    controller_resolver: Option<Box<dyn ControllerResolver>>,
    argument_resolver: Option<Box<dyn ArgumentResolver>>,
    request_stack: Option<Arc<RequestStack>>,
    config: KernelConfig,
    metrics: Option<Arc<KernelMetrics>>,
}

impl HttpKernelBuilder {
    /// Sets the listener lists.
    pub fn events(mut self, events: KernelEvents) -> Self {
        self.events = events;
        self
    }

    /// Sets the controller resolver.
    pub fn controller_resolver(mut self, resolver: impl ControllerResolver + 'static) -> Self {
        self.controller_resolver = Some(Box::new(resolver));
        self
    }

    /// Sets the argument resolver.
    pub fn argument_resolver(mut self, resolver: impl ArgumentResolver + 'static) -> Self {
        self.argument_resolver = Some(Box::new(resolver));
        self
    }

    /// Shares an existing request stack.
    pub fn request_stack(mut self, stack: Arc<RequestStack>) -> Self {
        self.request_stack = Some(stack);
        self
    }

    /// Sets the configuration.
    pub fn config(mut self, config: KernelConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares an existing metrics collector.
    pub fn metrics(mut self, metrics: Arc<KernelMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Builds the kernel.
    pub fn build(self) -> FrameworkResult<HttpKernel> {
        let controller_resolver = self
            .controller_resolver
            .ok_or_else(|| FrameworkError::configuration("A controller resolver is required"))?;

        Ok(HttpKernel {
            events: self.events,
            controller_resolver,
            argument_resolver: self
                .argument_resolver
                .unwrap_or_else(|| Box::new(RequestAttributeArgumentResolver)),
            request_stack: self.request_stack.unwrap_or_default(),
            config: self.config,
            metrics: self.metrics.unwrap_or_default(),
        })
    }
}
