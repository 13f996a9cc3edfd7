/// Middleware modules for the API server
///
/// - `rate_limit`: Per-address request ceilings for the users and todo routes
///
/// Authentication lives in [`crate::app::auth_gate_layer`].

pub mod rate_limit;
