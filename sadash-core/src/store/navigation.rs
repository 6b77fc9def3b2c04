//! Navigation requests emitted by the store.

use std::sync::Mutex;

/// Views a front-end can be asked to show
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The task listing, shown after a channel switch
    Tasks,
}

impl Route {
    pub fn name(&self) -> &'static str {
        match self {
            Route::Tasks => "tasks",
        }
    }
}

/// Front-end hook invoked when the store wants a different view
pub trait Navigator: Send + Sync {
    fn navigate(&self, route: Route);
}

/// Navigator for front-ends without views; only logs the request
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNavigator;

impl Navigator for LogNavigator {
    fn navigate(&self, route: Route) {
        tracing::debug!(route = route.name(), "Navigation requested");
    }
}

/// Records every requested route
#[derive(Debug, Default)]
pub struct RecordingNavigator {
    routes: Mutex<Vec<Route>>,
}

impl RecordingNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn routes(&self) -> Vec<Route> {
        self.routes.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route) {
        if let Ok(mut routes) = self.routes.lock() {
            routes.push(route);
        }
    }
}
