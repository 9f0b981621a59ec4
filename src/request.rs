use reqwest::StatusCode;
use scraper::{Html, Selector};
use tracing::{debug, error};

use crate::parse::create_selector;
use crate::record::{ApplicationNumber, CaptchaToken};
use crate::session::Session;
use crate::{Error, Result};

// Anti-forgery constants the view form is accepted with on the first post.
const SCRIPT_MANAGER_FIELD: &str = concat!(
    ";;AjaxControlToolkit, Version=3.5.11119.20050, Culture=neutral, PublicKeyToken=28f01b0e8",
    "4b6d53e:en-US:8e147239-dd05-47b0-8fb3-f743a139f982:865923e8:91bd373d:8e72a662:411fea1c:a",
    "cd642d2:596d588c:77c58d20:14b56adc:269a19ae",
);
const INITIAL_VIEWSTATE: &str = concat!(
    "k7HwUpD+/u6oJ2DqKOrJ39STGAFzFG9W96QkaPkm2/moFhhnROgF2+90jxZD5rWZsQpTL+yjza+bNQw1qu/GIYDZ",
    "qyhrcztNQRcLxUjMXUHPBbI4biBkya7uO/piLcgCWsC69FLoKZazerao85AH/Pri67tMqBL9hGEAWtEZJGwxfONV",
    "G8t89Iy4f/GeDpDtn/S9qHISBtU7+xuJt2zfyifZZyX7ohaecruBvDMroPfu7qScmZNSI5ZUInQMhKMt4q75MHJX",
    "AVawfA2CyIdwR7nwI8YGmrBB0mXosYdYnUzUhVXBCG0Glhxgzz5NSio7gBt30OiyCAgZkfmWjV4Z4b2v9hHllbb2",
    "axtMi9eUCXmAL9jOTfRDBlzJfxHuxm9nxx8uiPVqA3v221RzQz7e2J+MiPuaholKDWhHIwf7v091wgqG+hPJ/UG9",
    "MvwTZQ9O8BBPlE0KNZ/TKkeMFF6lOurdcVTliATNslQpwZMnhKCQj2oKyepW1rqwHq9dgReBc4tqJzS3M0tt0Jel",
    "N40DSBNgjnPjWOZIao9I7JEoKgqo0JmSsBH4gXO9sqjnnO/skFGi3Ag4yakqCAhCicb45iraRIgHi10TV57TPzb3",
    "CFrUf7LmaUx3IR8NaQrrvknMmbz/U3l926+Wdeyo5hGFW/rtiQorxavgpoCLwYxP48NiFhJsy8LWGUjPzl+lOr2A",
    "9tt7fLf97ouvCxC0yVLhQXorDLWvxebGXsv/BkRsA9/cjTRDEOOCq+mCagsuxHu/oJ3z7akxivDYhv0An/L28Qq6",
    "jluO2TWAY0OW0ArCUPch9Unf1/E5zxsW+Ka3XCIB9uvbPvInZH3bBjBvGP6pE1bxdL/p9KXdENhREeFDyW4uTo2J",
    "nWqFx7ocVFZCShgnEQ1mzTedMSQwnh3OI4NEoHpW05cuf2kEiVxLbLotlnac14BW0BZpGpx+kvJDvwE+UaJeoFQc",
    "VwvS+Wew2NzCqWmAgyEmChyjRF3pNkSJhgSNPw7e51G5OWgE4nLcJZ8+jbHju+6Gk4WUbe3oFe/JwEoE02SSXk9P",
    "k/7EUe8Hg0U=",
);
const INITIAL_VIEWSTATE_GENERATOR: &str = "B8CF52B9";
const INITIAL_EVENT_VALIDATION: &str = concat!(
    "nicoYHccqo6DQtPebbyJ/n338HXj1XAZNl88RioD15bdqA7IbTP8R4JZ7oYKChTQiAizU+UsLF0qsrIJgAZKRrWr",
    "Fc7zXtvzrLI+6OHOSZeJJQewEV4RUr5oTQpEJ7Jfowe1g0IPHuPD8G6rWuaaBfWv4Jn3B1h99J6QsNuzcof529ec",
    "caNHjFsxya/aFs6nqT9WWFKvZPGCz7iKZa60UwYBO613aFsCLFEHW2L4/i6lofXd1CVAt7RrG+ZhzjlsVsGei+T6",
    "pcznVyJm8l6ZNg==",
);

/// Postback target of the "full application number" link in the summary grid.
pub const FULL_DETAIL_EVENT_TARGET: &str = "SearchWMDatagrid$ctl03$lnkbtnappNumber1";

const SCRIPT_MANAGER_ID: &str = "ToolkitScriptManager1_HiddenField";
const EVENT_TARGET: &str = "__EVENTTARGET";
const EVENT_ARGUMENT: &str = "__EVENTARGUMENT";
const VIEWSTATE: &str = "__VIEWSTATE";
const VIEWSTATE_GENERATOR: &str = "__VIEWSTATEGENERATOR";
const VIEWSTATE_ENCRYPTED: &str = "__VIEWSTATEENCRYPTED";
const EVENT_VALIDATION: &str = "__EVENTVALIDATION";

/// Hidden form fields scraped from the summary page. Needed to post back for the full detail view.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FormState {
    pub script_manager: String,
    pub event_argument: String,
    pub viewstate: String,
    pub viewstate_generator: String,
    pub viewstate_encrypted: String,
    pub event_validation: String,
}

impl FormState {
    /// Reads the hidden fields by id. Any missing field is left empty.
    pub fn extract(html: &str) -> Result<Self> {
        let doc = Html::parse_document(html);
        let value_of = |id: &str| -> Result<String> {
            let selector: Selector = create_selector(&format!("#{id}"))?;
            Ok(doc
                .select(&selector)
                .next()
                .and_then(|el| el.value().attr("value"))
                .unwrap_or_default()
                .to_string())
        };

        Ok(Self {
            script_manager: value_of(SCRIPT_MANAGER_ID)?,
            event_argument: value_of(EVENT_ARGUMENT)?,
            viewstate: value_of(VIEWSTATE)?,
            viewstate_generator: value_of(VIEWSTATE_GENERATOR)?,
            viewstate_encrypted: value_of(VIEWSTATE_ENCRYPTED)?,
            event_validation: value_of(EVENT_VALIDATION)?,
        })
    }

    /// Form body of the second post.
    pub fn to_form(&self) -> [(&str, &str); 7] {
        [
            (SCRIPT_MANAGER_ID, self.script_manager.as_str()),
            (EVENT_TARGET, FULL_DETAIL_EVENT_TARGET),
            (EVENT_ARGUMENT, self.event_argument.as_str()),
            (VIEWSTATE, self.viewstate.as_str()),
            (VIEWSTATE_GENERATOR, self.viewstate_generator.as_str()),
            (VIEWSTATE_ENCRYPTED, self.viewstate_encrypted.as_str()),
            (EVENT_VALIDATION, self.event_validation.as_str()),
        ]
    }
}

/// Form body of the first post: fixed anti-forgery fields plus the number and captcha.
pub fn initial_form<'a>(
    number: &'a ApplicationNumber,
    captcha: &'a CaptchaToken,
) -> [(&'static str, &'a str); 10] {
    [
        (SCRIPT_MANAGER_ID, SCRIPT_MANAGER_FIELD),
        (EVENT_TARGET, ""),
        (EVENT_ARGUMENT, ""),
        (VIEWSTATE, INITIAL_VIEWSTATE),
        (VIEWSTATE_GENERATOR, INITIAL_VIEWSTATE_GENERATOR),
        (VIEWSTATE_ENCRYPTED, ""),
        (EVENT_VALIDATION, INITIAL_EVENT_VALIDATION),
        ("applNumber", number.as_str()),
        ("captcha1", captcha.as_str()),
        ("btnView", "View"),
    ]
}

/// Runs the two-phase lookup for one number and returns the full detail page.
pub async fn fetch_record(
    session: &Session,
    detail_url: &str,
    number: &ApplicationNumber,
    captcha: &CaptchaToken,
) -> Result<String> {
    let summary = expect_ok(
        session
            .post_form(detail_url, &initial_form(number, captcha))
            .await?,
    )
    .await?;
    debug!(application_number = %number, "Fetched summary page");

    let state = FormState::extract(&summary)?;
    expect_ok(session.post_form(detail_url, &state.to_form()).await?).await
}

async fn expect_ok(res: reqwest::Response) -> Result<String> {
    let status = res.status();
    let body = res.text().await?;
    if status != StatusCode::OK {
        error!(status = status.as_u16(), "Detail request failed");
        return Err(Error::FetchFailed {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}
