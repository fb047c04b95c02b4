//! Standalone TLS-SNI authenticator.
//!
//! # Data Flow
//! ```text
//! perform(challenges)
//!     → issue + register one certificate per TLS-SNI challenge
//!     → start one listener for the whole batch, replacing any running one
//!       (blocks until it reports)
//!     → one outcome per input challenge, same order
//!
//! cleanup(challenges)
//!     → every TLS-SNI hostname must be registered
//!     → one teardown request → grace period → reap
//! ```
//!
//! # Design Decisions
//! - Operational failures (busy port, no permission, timeout) are outcomes,
//!   never errors, so the caller can fall back to another challenge type
//! - Cleaning up a challenge that was never performed is a caller bug and
//!   fails before anything is sent to the listener

use std::thread;

use crate::challenge::{
    CertificateIssuer, Challenge, ChallengeOutcome, ChallengeResponse, Registry, SelfSignedIssuer,
    SigningKey, CHALLENGE_TYPE,
};
use crate::config::ResponderConfig;
use crate::error::{Error, Result};
use crate::lifecycle::launcher::{ForkLauncher, ListenerLauncher};

/// Answers TLS-SNI challenges from a dedicated listener process.
pub struct StandaloneAuthenticator<L = ForkLauncher, I = SelfSignedIssuer> {
    config: ResponderConfig,
    launcher: L,
    issuer: I,
    registry: Registry,
}

impl StandaloneAuthenticator {
    pub fn new(config: ResponderConfig) -> Self {
        let launcher = ForkLauncher::new(&config);
        Self::with_parts(config, launcher, SelfSignedIssuer)
    }
}

impl<L: ListenerLauncher, I: CertificateIssuer> StandaloneAuthenticator<L, I> {
    pub fn with_parts(config: ResponderConfig, launcher: L, issuer: I) -> Self {
        Self {
            config,
            launcher,
            issuer,
            registry: Registry::new(),
        }
    }

    /// Challenge types this authenticator can answer for `domain`.
    pub fn preferred_challenges(&self, _domain: &str) -> Vec<&'static str> {
        vec![CHALLENGE_TYPE]
    }

    /// Certificates registered so far.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Register every TLS-SNI challenge and start the listener.
    ///
    /// Returns one outcome per input challenge, in input order.
    pub fn perform(&mut self, challenges: &[Challenge]) -> Vec<ChallengeOutcome> {
        let mut outcomes = Vec::with_capacity(challenges.len());
        let mut key: Option<SigningKey> = None;

        for challenge in challenges {
            let Some(sni) = challenge.as_tls_sni() else {
                outcomes.push(ChallengeOutcome::NotHandled);
                continue;
            };

            let hostname = sni.validation_hostname();
            match self.issuer.issue(sni) {
                Ok(record) => {
                    self.registry.insert(&hostname, record);
                    key = Some(sni.key.clone());
                    outcomes.push(ChallengeOutcome::Responded(ChallengeResponse::new(
                        sni.secret.clone(),
                    )));
                    tracing::debug!(domain = %sni.domain, hostname = %hostname, "Challenge registered");
                }
                Err(e) => {
                    tracing::error!(
                        domain = %sni.domain,
                        hostname = %hostname,
                        error = %e,
                        "Could not issue validation certificate"
                    );
                    outcomes.push(ChallengeOutcome::ListenerFailed);
                }
            }
        }

        let Some(key) = key else {
            tracing::debug!("No TLS-SNI challenges to serve; listener not started");
            return outcomes;
        };

        let port = self.config.listener.port;
        let ready = self.launcher.start_listener(port, &key, &self.registry);

        if !ready {
            tracing::warn!(port, "Validation listener unavailable; challenges not answered");
            for outcome in outcomes.iter_mut() {
                if outcome.is_responded() {
                    *outcome = ChallengeOutcome::ListenerFailed;
                }
            }
        }

        outcomes
    }

    /// Tear the listener down after validation.
    ///
    /// Fails without contacting the listener if any TLS-SNI challenge was
    /// never performed.
    pub fn cleanup(&mut self, challenges: &[Challenge]) -> Result<()> {
        let mut supported = 0usize;
        for sni in challenges.iter().filter_map(Challenge::as_tls_sni) {
            let hostname = sni.validation_hostname();
            if !self.registry.contains(&hostname) {
                return Err(Error::Validation { hostname });
            }
            supported += 1;
        }

        if supported == 0 {
            return Ok(());
        }

        self.launcher.request_teardown();
        thread::sleep(self.config.timeouts.teardown_grace());
        self.launcher.finish_teardown();

        tracing::info!(challenges = supported, "Validation listener cleaned up");
        Ok(())
    }
}
