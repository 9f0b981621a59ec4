use std::future::Future;

use crate::config::PortalConfig;
use crate::record::{ApplicationNumber, CaptchaToken};
use crate::session::{self, Session};
use crate::{request, Result};

/// The remote register as seen by a worker.
///
/// A worker bootstraps exactly one session, then fetches every number of its chunk through it.
pub trait Portal: Send + Sync + Clone + 'static {
    type Session: Send + Sync;

    /// Opens a fresh session and obtains the captcha token bound to it.
    fn bootstrap(&self) -> impl Future<Output = Result<(Self::Session, CaptchaToken)>> + Send;

    /// Returns the raw full-detail page of one application.
    fn fetch(
        &self,
        session: &Self::Session,
        number: &ApplicationNumber,
        captcha: &CaptchaToken,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// The live e-register portal.
#[derive(Clone, Debug)]
pub struct IpIndiaPortal {
    config: PortalConfig,
}

impl IpIndiaPortal {
    pub fn new(config: PortalConfig) -> Self {
        Self { config }
    }
}

impl Portal for IpIndiaPortal {
    type Session = Session;

    async fn bootstrap(&self) -> Result<(Session, CaptchaToken)> {
        session::bootstrap(&self.config).await
    }

    async fn fetch(
        &self,
        session: &Session,
        number: &ApplicationNumber,
        captcha: &CaptchaToken,
    ) -> Result<String> {
        request::fetch_record(session, &self.config.detail_url, number, captcha).await
    }
}
