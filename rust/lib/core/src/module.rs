use axum::Router;

/// A service module that contributes HTTP routes.
///
/// The server binary collects every module and nests its router under
/// `/{name}`. Module routers carry their own state (they call
/// `.with_state()` before returning), so they merge as `Router<()>`.
pub trait Module: Send + Sync {
    /// Module name, used for logging and as the route prefix.
    fn name(&self) -> &str;

    /// Return the module's routes, to be nested under `/{name}`.
    fn routes(&self) -> Router;
}
