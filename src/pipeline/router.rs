use axum::{
    extract::{Request, State},
    routing::{on, MethodFilter},
    Router,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;

use crate::state::AppState;

use super::response::ApiResult;
use super::route::{RouteConfig, RouteConfigError};
use super::validation::Input;
use super::{execute, Call};

/// Collects pipeline routes and checks every [`RouteConfig`] before the
/// router is built, so misconfigured routes fail at startup.
pub struct Routes {
    state: AppState,
    router: Router<AppState>,
    problems: Vec<String>,
}

macro_rules! method {
    ($name:ident, $filter:expr, $label:literal) => {
        pub fn $name<B, Q, P, R, F, Fut>(self, path: &str, config: RouteConfig, callback: F) -> Self
        where
            B: Input,
            Q: Input,
            P: DeserializeOwned + Send + 'static,
            R: Serialize + Send + 'static,
            F: Fn(Call<B, Q, P>) -> Fut + Clone + Send + Sync + 'static,
            Fut: Future<Output = ApiResult<R>> + Send + 'static,
        {
            self.route($filter, $label, path, config, callback)
        }
    };
}

impl Routes {
    pub fn new(state: AppState) -> Self {
        Self {
            state,
            router: Router::new(),
            problems: Vec::new(),
        }
    }

    method!(get, MethodFilter::GET, "GET");
    method!(post, MethodFilter::POST, "POST");
    method!(put, MethodFilter::PUT, "PUT");
    method!(patch, MethodFilter::PATCH, "PATCH");
    method!(delete, MethodFilter::DELETE, "DELETE");

    fn route<B, Q, P, R, F, Fut>(
        mut self,
        filter: MethodFilter,
        method: &str,
        path: &str,
        config: RouteConfig,
        callback: F,
    ) -> Self
    where
        B: Input,
        Q: Input,
        P: DeserializeOwned + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(Call<B, Q, P>) -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<R>> + Send + 'static,
    {
        let name = format!("{} {}", method, path);
        let config = config.bind::<B, Q>(name.clone());

        self.problems
            .extend(config.problems(&self.state.rate_limiter).into_iter().map(|p| format!("{}: {}", name, p)));

        let config = Arc::new(config);
        let handler = move |State(state): State<AppState>, request: Request| {
            let config = Arc::clone(&config);
            let callback = callback.clone();
            async move { execute(state, config, callback, request).await }
        };

        self.router = self.router.route(path, on(filter, handler));
        self
    }

    /// Builds the router, or reports every misconfigured route at once.
    pub fn build(self) -> Result<Router, RouteConfigError> {
        if !self.problems.is_empty() {
            return Err(RouteConfigError { problems: self.problems });
        }
        Ok(self.router.with_state(self.state))
    }
}
