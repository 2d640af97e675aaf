//! Page parsing helpers shared by plugins.
//!
//! Every lookup walks a small ordered list of candidates and returns the first
//! match. Absence is an ordinary `None`: a page without a token or a CAPTCHA
//! simply does not need one.
//!
//! Parsed documents are not `Send`, so helpers take the raw body and return
//! owned values; callers can hold the results across `.await` points.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static INPUT_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("input[name]").unwrap());
static META_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("meta[name]").unwrap());
static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static FORM_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("form").unwrap());
static SUBMIT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("button, input[type=submit]").unwrap());

/// Anti-forgery token names tried when a plugin does not supply its own list.
pub const DEFAULT_TOKEN_FIELDS: &[&str] = &["csrf_token", "_token", "token", "csrf-token"];

/// Submit target and fields of an HTML form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormBlueprint {
    pub action: Option<String>,
    pub fields: Vec<(String, String)>,
}

impl FormBlueprint {
    /// Resolve the action against the page URL; a form without an action
    /// posts back to the page itself.
    pub fn submit_url(&self, page_url: &Url) -> Result<Url, url::ParseError> {
        match self.action.as_deref().map(str::trim) {
            Some(action) if !action.is_empty() => resolve_url(page_url, action),
            _ => Ok(page_url.clone()),
        }
    }
}

/// First anti-forgery token found, as `(field name, value)`.
///
/// Names are tried in order, first as `<input name=..>` and then as
/// `<meta name=.. content=..>`.
pub fn find_token(html: &str, names: &[&str]) -> Option<(String, String)> {
    let document = Html::parse_document(html);

    for name in names {
        let input_value = document
            .select(&INPUT_SELECTOR)
            .filter(|input| input.value().attr("name") == Some(*name))
            .find_map(|input| input.value().attr("value"));
        if let Some(value) = input_value {
            return Some((name.to_string(), value.to_string()));
        }

        let meta_value = document
            .select(&META_SELECTOR)
            .filter(|meta| meta.value().attr("name") == Some(*name))
            .find_map(|meta| meta.value().attr("content"));
        if let Some(value) = meta_value {
            return Some((name.to_string(), value.to_string()));
        }
    }

    None
}

/// Attribute of the first element matching one of `selectors`, tried in
/// order. Selectors that do not parse are skipped.
pub fn find_attr<S: AsRef<str>>(html: &str, selectors: &[S], attr: &str) -> Option<String> {
    let document = Html::parse_document(html);

    selectors.iter().find_map(|raw| {
        let selector = match Selector::parse(raw.as_ref()) {
            Ok(selector) => selector,
            Err(err) => {
                log::debug!("ignoring invalid selector '{}': {err}", raw.as_ref());
                return None;
            }
        };
        document
            .select(&selector)
            .find_map(|element| element.value().attr(attr))
            .map(str::to_string)
    })
}

/// `href` of the first link accepted by `predicate`.
pub fn find_link(html: &str, predicate: impl Fn(&str) -> bool) -> Option<String> {
    let document = Html::parse_document(html);
    document
        .select(&LINK_SELECTOR)
        .filter_map(|link| link.value().attr("href"))
        .find(|href| predicate(href))
        .map(str::to_string)
}

/// First form holding a submit control whose label contains `keyword`.
pub fn find_form_with_button(html: &str, keyword: &str) -> Option<FormBlueprint> {
    let document = Html::parse_document(html);
    document
        .select(&FORM_SELECTOR)
        .find(|form| {
            form.select(&SUBMIT_SELECTOR)
                .any(|control| control_label(&control).contains(keyword))
        })
        .map(|form| FormBlueprint {
            action: form.value().attr("action").map(str::to_string),
            fields: form_fields(&form),
        })
}

fn control_label(control: &ElementRef<'_>) -> String {
    let text: String = control.text().collect();
    match control.value().attr("value") {
        Some(value) => format!("{text}{value}"),
        None => text,
    }
}

fn form_fields(form: &ElementRef<'_>) -> Vec<(String, String)> {
    form.select(&INPUT_SELECTOR)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect()
}

/// Join a possibly relative link onto the page it was found on.
pub fn resolve_url(base: &Url, target: &str) -> Result<Url, url::ParseError> {
    base.join(target.trim())
}

/// Whether `text` contains any of `markers`.
pub fn contains_any(text: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| text.contains(marker))
}
