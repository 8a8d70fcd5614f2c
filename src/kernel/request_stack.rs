//! Stack of requests currently being handled.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::http::Request;

/// Requests in flight, outermost first.
#[derive(Debug, Default)]
pub struct RequestStack {
    requests: Mutex<Vec<Arc<Request>>>,
}

impl RequestStack {
    /// Creates an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    fn requests(&self) -> MutexGuard<'_, Vec<Arc<Request>>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pushes a request.
    pub fn push(&self, request: Arc<Request>) {
        self.requests().push(request);
    }

    /// Pops the current request.
    pub fn pop(&self) -> Option<Arc<Request>> {
        self.requests().pop()
    }

    /// Returns the request being handled.
    pub fn current_request(&self) -> Option<Arc<Request>> {
        self.requests().last().cloned()
    }

    /// Returns the outermost request.
    pub fn main_request(&self) -> Option<Arc<Request>> {
        self.requests().first().cloned()
    }

    /// Returns the request below the current one.
    pub fn parent_request(&self) -> Option<Arc<Request>> {
        let requests = self.requests();
        let len = requests.len();
        if len < 2 {
            None
        } else {
            requests.get(len - 2).cloned()
        }
    }

    /// Returns the stack depth.
    pub fn len(&self) -> usize {
        self.requests().len()
    }

    /// Returns true when no request is in flight.
    pub fn is_empty(&self) -> bool {
        self.requests().is_empty()
    }
}

/// Pops the stack when dropped.
pub(crate) struct StackGuard<'a> {
    stack: &'a RequestStack,
}

impl<'a> StackGuard<'a> {
    pub(crate) fn push(stack: &'a RequestStack, request: Arc<Request>) -> Self {
        stack.push(request);
        Self { stack }
    }
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        self.stack.pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(path: &str) -> Arc<Request> {
        Arc::new(Request::get(path).unwrap())
    }

    #[test]
    fn test_main_current_parent() {
        let stack = RequestStack::new();
        assert!(stack.current_request().is_none());

        stack.push(request("/main"));
        stack.push(request("/sub"));

        assert_eq!(stack.main_request().unwrap().path(), "/main");
        assert_eq!(stack.current_request().unwrap().path(), "/sub");
        assert_eq!(stack.parent_request().unwrap().path(), "/main");

        stack.pop();
        assert!(stack.parent_request().is_none());
    }

    #[test]
    fn test_guard_pops_on_drop() {
        let stack = RequestStack::new();
        {
            let _guard = StackGuard::push(&stack, request("/"));
            assert_eq!(stack.len(), 1);
        }
        assert!(stack.is_empty());
    }
}
