use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use tracing::{debug, error, info};

use crate::config::PortalConfig;
use crate::record::CaptchaToken;
use crate::{Error, Result};

/// A worker-owned HTTP session. Cookies set by the portal stay in this session's jar only.
#[derive(Debug)]
pub struct Session {
    client: Client,
}

impl Session {
    /// Opens a fresh client with its own cookie store.
    pub fn open(config: &PortalConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .cookie_store(true)
            .user_agent(config.user_agent.as_str())
            .danger_accept_invalid_certs(config.accept_invalid_certs);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    pub async fn get(&self, url: &str) -> Result<Response> {
        Ok(self.client.get(url).send().await?)
    }

    pub async fn post_form(&self, url: &str, form: &[(&str, &str)]) -> Result<Response> {
        Ok(self.client.post(url).form(form).send().await?)
    }

    pub async fn post_json<T: serde::Serialize + ?Sized>(
        &self,
        url: &str,
        body: &T,
    ) -> Result<Response> {
        Ok(self.client.post(url).json(body).send().await?)
    }
}

/// ASP.NET page-method envelope: the payload sits under `d`.
#[derive(Debug, Deserialize)]
struct CaptchaEnvelope {
    d: Option<String>,
}

/// Opens a session, primes the cookies the portal expects and asks it for one captcha token.
pub async fn bootstrap(config: &PortalConfig) -> Result<(Session, CaptchaToken)> {
    let session = Session::open(config)?;

    for url in [&config.captcha_image_url, &config.detail_url] {
        let res = session.get(url).await?;
        debug!(url = %url, status = res.status().as_u16(), "Primed session cookies");
    }

    let token = request_captcha(&session, config).await?;
    Ok((session, token))
}

async fn request_captcha(session: &Session, config: &PortalConfig) -> Result<CaptchaToken> {
    let res = session
        .post_json(&config.captcha_api_url, &serde_json::json!({}))
        .await?;
    let status = res.status();
    let body = res.text().await?;

    if status != StatusCode::OK {
        error!(status = status.as_u16(), body = %body, "Captcha request failed");
        return Err(Error::CaptchaUnavailable {
            reason: format!("status {}", status.as_u16()),
        });
    }

    let token = captcha_from_body(&body)?;
    info!("Captcha request was successful");
    Ok(token)
}

fn captcha_from_body(body: &str) -> Result<CaptchaToken> {
    let envelope: CaptchaEnvelope =
        serde_json::from_str(body).map_err(|e| Error::CaptchaUnavailable {
            reason: format!("unreadable envelope: {e}"),
        })?;

    match envelope.d {
        Some(token) if !token.trim().is_empty() => Ok(CaptchaToken::new(token)),
        _ => Err(Error::CaptchaUnavailable {
            reason: "envelope has no token".into(),
        }),
    }
}
