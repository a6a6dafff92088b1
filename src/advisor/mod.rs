//! External pincode advisor.
//!
//! The advisor is an unreliable oracle: given the route endpoints and a
//! bounded list of candidate pincodes it returns free text that hopefully
//! contains a JSON array of pincodes lying along the route. Nothing about the
//! reply is trusted; parsing, validation and fallback belong to
//! [`crate::processors::pincodes`].

pub mod client;

use std::time::Duration;

use thiserror::Error;

use crate::core::geo::RouteSpec;
use crate::processors::pincodes::PincodeAggregate;

pub use client::ChatCompletionsAdvisor;

/// Errors an advisor backend can raise.
#[derive(Debug, Error)]
pub enum AdvisorError {
    #[error("HTTP request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Server returned error status {status}: {body}")]
    ServerError { status: u16, body: String },

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Advisor returned no content")]
    EmptyResponse,

    #[error("Advisor API key not set (expected in ${0})")]
    MissingApiKey(String),
}

/// Result type for advisor calls.
pub type Result<T> = std::result::Result<T, AdvisorError>;

/// Capability consulted by the pincode selector.
///
/// Implementations must not keep references to the candidates past the call.
pub trait PincodeAdvisor: Send + Sync {
    /// Answer a free-text prompt.
    fn complete(&self, prompt: &str) -> Result<String>;

    /// Ask which of `candidates` plausibly lie along `route`.
    fn advise(&self, route: &RouteSpec, candidates: &[PincodeAggregate]) -> Result<String> {
        self.complete(&build_prompt(route, candidates))
    }
}

/// Render the advisory prompt: endpoints, one `pincode: lat,lon` line per candidate.
pub fn build_prompt(route: &RouteSpec, candidates: &[PincodeAggregate]) -> String {
    let listing = candidates
        .iter()
        .map(|c| format!("{}: {},{}", c.pincode, c.mean_lat, c.mean_lon))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Start: {},{}\nEnd: {},{}\nPincodes list:\n{}\n\n\
         Return JSON array of pincodes plausibly along the route.",
        route.start_lat, route.start_lon, route.end_lat, route.end_lon, listing
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_layout() {
        let route = RouteSpec::new(28.7041, 77.1025, 28.4595, 77.0266);
        let candidates = vec![
            PincodeAggregate {
                pincode: "110001".to_string(),
                mean_lat: 28.575,
                mean_lon: 77.055,
                count: 2,
            },
            PincodeAggregate {
                pincode: "122001".to_string(),
                mean_lat: 28.46,
                mean_lon: 77.03,
                count: 1,
            },
        ];

        let prompt = build_prompt(&route, &candidates);
        let lines: Vec<&str> = prompt.lines().collect();

        assert_eq!(lines[0], "Start: 28.7041,77.1025");
        assert_eq!(lines[1], "End: 28.4595,77.0266");
        assert_eq!(lines[2], "Pincodes list:");
        assert_eq!(lines[3], "110001: 28.575,77.055");
        assert_eq!(lines[4], "122001: 28.46,77.03");
        assert!(prompt.ends_with("plausibly along the route."));
    }

    struct EchoAdvisor;

    impl PincodeAdvisor for EchoAdvisor {
        fn complete(&self, prompt: &str) -> Result<String> {
            Ok(prompt.to_string())
        }
    }

    #[test]
    fn test_default_advise_uses_prompt() {
        let route = RouteSpec::new(0.0, 0.0, 1.0, 1.0);
        let reply = EchoAdvisor.advise(&route, &[]).unwrap();
        assert!(reply.starts_with("Start: 0,0\nEnd: 1,1"));
    }
}
