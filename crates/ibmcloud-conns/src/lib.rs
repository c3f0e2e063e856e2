// # IBM Cloud connection session
//
// Everything a resource adapter needs to reach a service:
//
// - `Session`: provider configuration, resolved endpoints, IAM token cache
// - `ApiClient`: one service's REST surface, with status mapping and retries
// - `Endpoints` / `Service`: where each service lives for a visibility and region
//
// ## Error mapping
//
// | HTTP status      | Error                    |
// |------------------|--------------------------|
// | 401, 403         | `Error::Authentication`  |
// | 404              | `Error::NotFound`        |
// | 429              | `Error::RateLimited`     |
// | other non-2xx    | `Error::Api`             |
// | transport        | `Error::Http`            |
//
// 429, 502, 503, 504 and transport failures are retried with exponential
// backoff, up to `max_retries` times. Everything else is returned to the
// adapter at once.
//
// ## Security Requirements
//
// - API keys and tokens never appear in logs or `Debug` output
// - Error bodies are truncated before they are logged

pub mod client;
pub mod endpoints;
pub mod session;

pub use client::ApiClient;
pub use endpoints::{Endpoints, Service};
pub use session::Session;
