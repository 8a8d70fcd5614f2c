//! Typed lifecycle events and their listener lists.
//!
//! Every stage has its own event type and its own ordered listener list.
//! Listeners run synchronously in registration order and receive the kernel
//! so they can issue sub-requests. Setting a response on a request, view or
//! exception event stops the remaining listeners of that stage.

use std::sync::Arc;
use serde_json::Value;

use super::http::{Request, RequestType, Response};
use super::resolver::Controller;
use super::HttpKernel;
use crate::errors::{FrameworkError, FrameworkResult};

/// A listener for events of type `E`.
pub type Listener<E> = Box<dyn Fn(&mut E, &HttpKernel) -> FrameworkResult<()> + Send + Sync>;

/// Events that can stop propagation.
pub trait KernelEvent {
    /// Returns true once no further listener should run.
    fn is_propagation_stopped(&self) -> bool {
        false
    }
}

/// Ordered listeners for one stage.
pub struct Listeners<E> {
    listeners: Vec<Listener<E>>,
}

impl<E> Default for Listeners<E> {
    fn default() -> Self {
        Self { listeners: Vec::new() }
    }
}

impl<E> std::fmt::Debug for Listeners<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listeners")
            .field("count", &self.listeners.len())
            .finish()
    }
}

impl<E: KernelEvent> Listeners<E> {
    /// Appends a listener.
    pub fn push(&mut self, listener: Listener<E>) {
        self.listeners.push(listener);
    }

    /// Returns the number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    /// Returns true when no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Runs the listeners until one stops propagation or fails.
    pub fn dispatch(&self, event: &mut E, kernel: &HttpKernel) -> FrameworkResult<()> {
        for listener in &self.listeners {
            if event.is_propagation_stopped() {
                break;
            }
            listener(event, kernel)?;
        }
        Ok(())
    }
}

/// Listener lists for every stage.
#[derive(Debug, Default)]
pub struct KernelEvents {
    pub(crate) request: Listeners<RequestEvent>,
    pub(crate) controller: Listeners<ControllerEvent>,
    pub(crate) controller_arguments: Listeners<ControllerArgumentsEvent>,
    pub(crate) view: Listeners<ViewEvent>,
    pub(crate) response: Listeners<ResponseEvent>,
    pub(crate) finish_request: Listeners<FinishRequestEvent>,
    pub(crate) exception: Listeners<ExceptionEvent>,
    pub(crate) terminate: Listeners<TerminateEvent>,
}

macro_rules! listener_registration {
    ($($method:ident => $field:ident : $event:ty),* $(,)?) => {
        impl KernelEvents {
            /// Creates empty listener lists.
            pub fn new() -> Self {
                Self::default()
            }

            $(
                #[doc = concat!("Registers a listener for [`", stringify!($event), "`].")]
                pub fn $method<F>(&mut self, listener: F) -> &mut Self
                where
                    F: Fn(&mut $event, &HttpKernel) -> FrameworkResult<()> + Send + Sync + 'static,
                {
                    self.$field.push(Box::new(listener));
                    self
                }
            )*
        }
    };
}

listener_registration! {
    on_request => request: RequestEvent,
    on_controller => controller: ControllerEvent,
    on_controller_arguments => controller_arguments: ControllerArgumentsEvent,
    on_view => view: ViewEvent,
    on_response => response: ResponseEvent,
    on_finish_request => finish_request: FinishRequestEvent,
    on_exception => exception: ExceptionEvent,
    on_terminate => terminate: TerminateEvent,
}

/// Dispatched first; a listener may answer the request directly.
#[derive(Debug)]
pub struct RequestEvent {
    request: Arc<Request>,
    request_type: RequestType,
    response: Option<Response>,
}

impl RequestEvent {
    pub(crate) fn new(request: Arc<Request>, request_type: RequestType) -> Self {
        Self { request, request_type, response: None }
    }

    /// Returns the request.
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// Returns the request type.
    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Returns true for the main request.
    pub fn is_main_request(&self) -> bool {
        self.request_type == RequestType::Main
    }

    /// Answers the request and stops propagation.
    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// Returns the response set by a listener.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub(crate) fn into_response(self) -> Option<Response> {
        self.response
    }
}

impl KernelEvent for RequestEvent {
    fn is_propagation_stopped(&self) -> bool {
        self.response.is_some()
    }
}

/// Dispatched once a controller is resolved; a listener may swap it.
#[derive(Debug)]
pub struct ControllerEvent {
    request: Arc<Request>,
    request_type: RequestType,
    controller: Controller,
}

impl ControllerEvent {
    pub(crate) fn new(request: Arc<Request>, request_type: RequestType, controller: Controller) -> Self {
        Self { request, request_type, controller }
    }

    /// Returns the request.
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// Returns the request type.
    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Returns the controller.
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Replaces the controller.
    pub fn set_controller(&mut self, controller: Controller) {
        self.controller = controller;
    }

    pub(crate) fn into_controller(self) -> Controller {
        self.controller
    }
}

impl KernelEvent for ControllerEvent {}

/// Dispatched once arguments are resolved; a listener may swap either.
#[derive(Debug)]
pub struct ControllerArgumentsEvent {
    request: Arc<Request>,
    request_type: RequestType,
    controller: Controller,
    arguments: Vec<Value>,
}

impl ControllerArgumentsEvent {
    pub(crate) fn new(
        request: Arc<Request>,
        request_type: RequestType,
        controller: Controller,
        arguments: Vec<Value>,
    ) -> Self {
        Self { request, request_type, controller, arguments }
    }

    /// Returns the request.
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// Returns the request type.
    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Returns the controller.
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Replaces the controller.
    pub fn set_controller(&mut self, controller: Controller) {
        self.controller = controller;
    }

    /// Returns the arguments.
    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    /// Replaces the arguments.
    pub fn set_arguments(&mut self, arguments: Vec<Value>) {
        self.arguments = arguments;
    }

    pub(crate) fn into_parts(self) -> (Controller, Vec<Value>) {
        (self.controller, self.arguments)
    }
}

impl KernelEvent for ControllerArgumentsEvent {}

/// Dispatched when a controller returned a value instead of a response.
#[derive(Debug)]
pub struct ViewEvent {
    request: Arc<Request>,
    request_type: RequestType,
    controller_result: Value,
    response: Option<Response>,
}

impl ViewEvent {
    pub(crate) fn new(request: Arc<Request>, request_type: RequestType, controller_result: Value) -> Self {
        Self { request, request_type, controller_result, response: None }
    }

    /// Returns the request.
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// Returns the request type.
    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Returns the controller's value.
    pub fn controller_result(&self) -> &Value {
        &self.controller_result
    }

    /// Replaces the controller's value for later listeners.
    pub fn set_controller_result(&mut self, value: Value) {
        self.controller_result = value;
    }

    /// Converts the value to a response and stops propagation.
    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// Returns the response set by a listener.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Value, Option<Response>) {
        (self.controller_result, self.response)
    }
}

impl KernelEvent for ViewEvent {
    fn is_propagation_stopped(&self) -> bool {
        self.response.is_some()
    }
}

/// Dispatched with the response about to be returned.
#[derive(Debug)]
pub struct ResponseEvent {
    request: Arc<Request>,
    request_type: RequestType,
    response: Response,
}

impl ResponseEvent {
    pub(crate) fn new(request: Arc<Request>, request_type: RequestType, response: Response) -> Self {
        Self { request, request_type, response }
    }

    /// Returns the request.
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// Returns the request type.
    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Returns the response.
    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Returns the response for modification.
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    /// Replaces the response.
    pub fn set_response(&mut self, response: Response) {
        self.response = response;
    }

    pub(crate) fn into_response(self) -> Response {
        self.response
    }
}

impl KernelEvent for ResponseEvent {}

/// Dispatched when handling of a request ends, successfully or not.
#[derive(Debug)]
pub struct FinishRequestEvent {
    request: Arc<Request>,
    request_type: RequestType,
}

impl FinishRequestEvent {
    pub(crate) fn new(request: Arc<Request>, request_type: RequestType) -> Self {
        Self { request, request_type }
    }

    /// Returns the request.
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// Returns the request type.
    pub fn request_type(&self) -> RequestType {
        self.request_type
    }
}

impl KernelEvent for FinishRequestEvent {}

/// Dispatched when handling fails; a listener may produce a response.
#[derive(Debug)]
pub struct ExceptionEvent {
    request: Arc<Request>,
    request_type: RequestType,
    error: FrameworkError,
    response: Option<Response>,
    allow_custom_response_code: bool,
}

impl ExceptionEvent {
    pub(crate) fn new(request: Arc<Request>, request_type: RequestType, error: FrameworkError) -> Self {
        Self {
            request,
            request_type,
            error,
            response: None,
            allow_custom_response_code: false,
        }
    }

    /// Returns the request.
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// Returns the request type.
    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    /// Returns the failure.
    pub fn error(&self) -> &FrameworkError {
        &self.error
    }

    /// Replaces the failure.
    pub fn set_error(&mut self, error: FrameworkError) {
        self.error = error;
    }

    /// Recovers with a response and stops propagation.
    pub fn set_response(&mut self, response: Response) {
        self.response = Some(response);
    }

    /// Returns the response set by a listener.
    pub fn response(&self) -> Option<&Response> {
        self.response.as_ref()
    }

    /// Keeps the status of the listener's response even when it is not an
    /// error status.
    pub fn allow_custom_response_code(&mut self) {
        self.allow_custom_response_code = true;
    }

    /// Returns true if the listener's status must be kept.
    pub fn is_allowing_custom_response_code(&self) -> bool {
        self.allow_custom_response_code
    }

    pub(crate) fn into_parts(self) -> (FrameworkError, Option<Response>, bool) {
        (self.error, self.response, self.allow_custom_response_code)
    }
}

impl KernelEvent for ExceptionEvent {
    fn is_propagation_stopped(&self) -> bool {
        self.response.is_some()
    }
}

/// Dispatched after the response was handed to the client.
#[derive(Debug)]
pub struct TerminateEvent {
    request: Arc<Request>,
    response: Response,
}

impl TerminateEvent {
    pub(crate) fn new(request: Arc<Request>, response: Response) -> Self {
        Self { request, response }
    }

    /// Returns the request.
    pub fn request(&self) -> &Arc<Request> {
        &self.request
    }

    /// Returns the response that was sent.
    pub fn response(&self) -> &Response {
        &self.response
    }
}

impl KernelEvent for TerminateEvent {}
