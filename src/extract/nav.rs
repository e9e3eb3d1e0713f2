// src/extract/nav.rs

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde::Serialize;

use super::{cell_text, squash_ws, PageParser};

static ONCLICK_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[onclick]").expect("onclick link selector"));
static HIDDEN_INPUT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"input[type="hidden"]"#).expect("hidden input selector"));
static BOLD: Lazy<Selector> = Lazy::new(|| Selector::parse("b").expect("b selector"));

/// Hidden form fields the server expects echoed back, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FormParams(Vec<(String, String)>);

impl FormParams {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the first field called `name`, or append it.
    pub fn set(&mut self, name: &str, value: &str) {
        match self.0.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => self.0.push((name.to_string(), value.to_string())),
        }
    }

    pub fn pairs(&self) -> &[(String, String)] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, String)> for FormParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What the page says about older periods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// No "previous periods" control.
    None,
    /// Control present but no form to echo back.
    Unavailable,
    Form(FormParams),
}

impl PageParser {
    pub(crate) fn next_page(&self, doc: &Html) -> NextPage {
        let has_control = doc.select(&ONCLICK_LINK).any(|a| {
            a.value()
                .attr("onclick")
                .map_or(false, |js| js.contains(self.rules.prev_nav_marker.as_str()))
        });
        if !has_control {
            return NextPage::None;
        }
        match self.form_params(doc) {
            Some(params) => NextPage::Form(params),
            None => NextPage::Unavailable,
        }
    }

    /// Hidden inputs of the pagination form plus the navigation field.
    /// `None` when the form is missing or has no hidden inputs.
    pub(crate) fn form_params(&self, doc: &Html) -> Option<FormParams> {
        let form = doc.select(&self.form_sel).next()?;
        let mut params: FormParams = form
            .select(&HIDDEN_INPUT)
            .filter_map(|input| {
                let el = input.value();
                let name = el.attr("name")?;
                Some((name.to_string(), el.attr("value").unwrap_or("").to_string()))
            })
            .collect();
        if params.is_empty() {
            return None;
        }
        params.set(&self.rules.nav_field, &self.rules.nav_value);
        Some(params)
    }

    /// Company name as printed on the page, preferring the bold part.
    pub(crate) fn company_name(&self, doc: &Html) -> Option<String> {
        let cell = doc.select(&self.company_sel).next()?;
        let text = match cell.select(&BOLD).next() {
            Some(b) => cell_text(b),
            None => cell_text(cell),
        };
        let name = squash_ws(&text);
        (!name.is_empty()).then_some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ParserRules;

    fn parser() -> PageParser {
        PageParser::new(&ParserRules::default()).unwrap()
    }

    #[test]
    fn no_control_means_last_page() {
        let doc = Html::parse_document(
            r#"<a onclick="post_prevnext('1');">Next</a>
               <form name="finyear_frm"><input type="hidden" name="a" value="1"></form>"#,
        );
        assert_eq!(parser().next_page(&doc), NextPage::None);
    }

    #[test]
    fn control_without_form_is_unavailable() {
        let doc = Html::parse_document(r#"<a onclick="post_prevnext('2');">Previous Years</a>"#);
        assert_eq!(parser().next_page(&doc), NextPage::Unavailable);

        let doc = Html::parse_document(
            r#"<a onclick="post_prevnext('2');">Previous Years</a>
               <form name="finyear_frm"><input type="text" name="q" value="x"></form>"#,
        );
        assert_eq!(parser().next_page(&doc), NextPage::Unavailable);
    }

    #[test]
    fn nav_field_overrides_echoed_value() {
        let doc = Html::parse_document(
            r#"<a onclick="return post_prevnext('2')">Previous Years</a>
               <form name="finyear_frm">
                 <input type="hidden" name="nav" value="prev">
                 <input type="hidden" name="sc_did" value="TCS">
                 <input type="hidden" name="noval">
                 <input type="hidden" value="orphan">
               </form>"#,
        );
        let NextPage::Form(params) = parser().next_page(&doc) else {
            panic!("expected form params");
        };
        assert_eq!(
            params.pairs(),
            &[
                ("nav".to_string(), "next".to_string()),
                ("sc_did".to_string(), "TCS".to_string()),
                ("noval".to_string(), String::new()),
            ]
        );
    }

    #[test]
    fn company_name_falls_back_to_cell_text() {
        let doc = Html::parse_document(r#"<table><tr><td class="det">  Tata   Motors </td></tr></table>"#);
        assert_eq!(parser().company_name(&doc).as_deref(), Some("Tata Motors"));
        let doc = Html::parse_document("<p>none</p>");
        assert_eq!(parser().company_name(&doc), None);
    }
}
