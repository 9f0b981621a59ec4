//! In-memory portal for driving workers and the orchestrator without network access.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tmscrap::portal::Portal;
use tmscrap::record::{ApplicationNumber, CaptchaToken};
use tmscrap::{Error, Result};

#[derive(Clone, Debug)]
#[allow(dead_code)]
pub enum Outcome {
    /// Non-200 response from the portal.
    Status(u16),
    /// A page without the status structure.
    Garbage,
    /// Transport level failure that is not a per-number miss.
    Fatal,
    /// The worker task panics mid-chunk.
    Panic,
}

#[derive(Clone, Default)]
pub struct FakePortal {
    outcomes: Arc<HashMap<String, Outcome>>,
    /// 1-based index of the bootstrap call that fails, if any.
    failing_bootstrap: Option<usize>,
    bootstraps: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl FakePortal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_outcome(mut self, number: &str, outcome: Outcome) -> Self {
        Arc::make_mut(&mut self.outcomes).insert(number.to_string(), outcome);
        self
    }

    pub fn failing_bootstrap(mut self, nth: usize) -> Self {
        self.failing_bootstrap = Some(nth);
        self
    }

    pub fn bootstraps(&self) -> usize {
        self.bootstraps.load(Ordering::SeqCst)
    }
}

/// Session handed out by the fake; remembers which bootstrap created it.
pub struct FakeSession {
    pub id: usize,
}

impl Portal for FakePortal {
    type Session = FakeSession;

    async fn bootstrap(&self) -> Result<(FakeSession, CaptchaToken)> {
        let id = self.bootstraps.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_bootstrap == Some(id) {
            return Err(Error::CaptchaUnavailable {
                reason: "status 503".into(),
            });
        }
        Ok((FakeSession { id }, CaptchaToken::new(format!("captcha-{id}"))))
    }

    async fn fetch(
        &self,
        session: &FakeSession,
        number: &ApplicationNumber,
        captcha: &CaptchaToken,
    ) -> Result<String> {
        assert_eq!(captcha.as_str(), format!("captcha-{}", session.id));
        match self.outcomes.get(number.as_str()) {
            None => Ok(detail_page(number.as_str(), "Registered")),
            Some(Outcome::Status(status)) => Err(Error::FetchFailed {
                status: *status,
                body: "Service Unavailable".into(),
            }),
            Some(Outcome::Garbage) => Ok("<html><body>Invalid Captcha</body></html>".into()),
            Some(Outcome::Fatal) => Err(Error::Io(std::io::Error::other("connection reset"))),
            Some(Outcome::Panic) => panic!("portal fetch blew up on {number}"),
        }
    }
}

/// A detail page in the portal's layout with the number in the main table.
pub fn detail_page(number: &str, status: &str) -> String {
    let rows: String = [
        ("TM Application No.", number),
        ("Class", "9"),
        ("Date of Application", "01/02/2020"),
        ("TM Applied For", "ACME"),
        ("Trade Mark Type", "WORD"),
        ("State", "DELHI"),
    ]
    .iter()
    .map(|(k, v)| format!("<tr><td>{k}</td><td>{v}</td></tr>"))
    .collect();

    format!(
        r#"<html><body><div id="panelgetdetail">
             <table><tr><td>e-Register</td></tr></table>
             <table>
               <tr><td>As on Date : 01/01/2024</td></tr>
               <tr><td>Status : <font color="red">{status}</font></td></tr>
             </table>
             <table border="1">{rows}</table>
           </div></body></html>"#
    )
}

pub fn write_numbers(path: &std::path::Path, numbers: &[&str]) {
    std::fs::write(path, numbers.join("\n")).unwrap();
}
