//! Declarative fields of a bill XML document.

use serde::{Deserialize, Serialize};
use time::Date;
use time::macros::format_description;

use super::MarkupError;
use super::extract::TextExtractor;
use super::node::{Node, parse_xml};

const ROOT_ELEMENTS: &[&str] = &["bill", "resolution", "amendment-doc"];
const BODY_ELEMENTS: &[&str] = &["legis-body", "resolution-body", "engrossed-amendment-body"];

/// Sponsoring member named in the document's action block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sponsor {
    /// External natural key (`name-id`, a bioguide-style identifier).
    pub external_id: Option<String>,
    /// Display name as printed, e.g. `Mr. Smith of Nebraska`.
    pub name: String,
}

/// Committee referenced by the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Committee {
    /// Committee code (`committee-id`), when present.
    pub committee_id: Option<String>,
    /// Committee name as printed.
    pub name: String,
}

/// Declarative metadata plus the body subtree of one bill document.
#[derive(Debug, Clone)]
pub struct BillDocument {
    /// Name of the root element (`bill`, `resolution`, ...).
    pub root: String,
    /// Legislative number, e.g. `H. R. 1`.
    pub legislative_number: String,
    /// Congress field, e.g. `119th CONGRESS`.
    pub congress: String,
    /// Session field, e.g. `1st Session`.
    pub session: Option<String>,
    /// Chamber currently holding the document.
    pub current_chamber: Option<String>,
    /// Official title of the measure.
    pub official_title: Option<String>,
    /// Dublin Core title from the metadata block.
    pub dc_title: Option<String>,
    /// First short title declared in the text.
    pub short_title: Option<String>,
    /// Date of the most recent action, `YYYY-MM-DD` when it could be normalized.
    pub action_date: Option<String>,
    /// Description of the most recent action.
    pub action_description: Option<String>,
    /// Sponsoring member.
    pub sponsor: Option<Sponsor>,
    /// Committees named in the action block, deduplicated.
    pub committees: Vec<Committee>,
    body: Node,
}

impl BillDocument {
    /// Parse XML bytes and pull out the declarative fields.
    pub fn from_xml(bytes: &[u8]) -> Result<Self, MarkupError> {
        let tree = parse_xml(bytes)?;
        let (root, node) = ROOT_ELEMENTS
            .iter()
            .find_map(|name| tree.get(name).map(|node| (*name, node)))
            .ok_or(MarkupError::MissingRoot)?;
        Self::from_root(root, node)
    }

    fn from_root(root: &str, node: &Node) -> Result<Self, MarkupError> {
        let form = node.get("form").unwrap_or(node);
        let required = |key: &'static str| {
            text_of(form, key)
                .or_else(|| text_of(node, key))
                .ok_or(MarkupError::MissingField(key))
        };
        let legislative_number = required("legis-num")?;
        let congress = required("congress")?;

        let action = form.find_first("action");
        let action_date = action
            .and_then(|action| action.find_first("action-date"))
            .and_then(normalize_action_date);
        let action_description = action.and_then(|action| text_of(action, "action-desc"));

        let sponsor = form.find_first("sponsor").and_then(|sponsor| {
            let name = sponsor.text_content();
            (!name.is_empty()).then(|| Sponsor {
                external_id: sponsor.attribute("name-id").map(str::to_string),
                name,
            })
        });

        let mut committees: Vec<Committee> = Vec::new();
        for committee in form.find_all("committee-name") {
            let name = committee.text_content();
            if name.is_empty() {
                continue;
            }
            let committee_id = committee.attribute("committee-id").map(str::to_string);
            let duplicate = committees.iter().any(|existing| {
                existing.name == name
                    || (committee_id.is_some() && existing.committee_id == committee_id)
            });
            if !duplicate {
                committees.push(Committee { committee_id, name });
            }
        }

        let body = BODY_ELEMENTS
            .iter()
            .find_map(|name| node.find_first(name))
            .unwrap_or(node)
            .clone();

        Ok(Self {
            root: root.to_string(),
            legislative_number,
            congress,
            session: text_of(form, "session"),
            current_chamber: text_of(form, "current-chamber"),
            official_title: text_of(form, "official-title"),
            dc_title: text_of(node, "dc:title"),
            short_title: text_of(node, "short-title"),
            action_date,
            action_description,
            sponsor,
            committees,
            body,
        })
    }

    /// Best available title: official, then Dublin Core, then the legislative number.
    pub fn title(&self) -> String {
        self.official_title
            .clone()
            .or_else(|| self.dc_title.clone())
            .unwrap_or_else(|| self.legislative_number.clone())
    }

    /// Body subtree holding the legislative text.
    pub fn body(&self) -> &Node {
        &self.body
    }

    /// Full prose of the body using `extractor`.
    pub fn full_text(&self, extractor: &TextExtractor) -> String {
        extractor.extract(&self.body)
    }
}

fn text_of(node: &Node, key: &str) -> Option<String> {
    node.find_first(key)
        .map(Node::text_content)
        .filter(|text| !text.is_empty())
}

fn normalize_action_date(node: &Node) -> Option<String> {
    let compact = format_description!("[year][month][day]");
    let long = format_description!("[month repr:long] [day padding:none], [year]");
    let iso = format_description!("[year]-[month]-[day]");

    if let Some(date) = node
        .attribute("date")
        .and_then(|raw| Date::parse(raw.trim(), compact).ok())
    {
        return date.format(iso).ok();
    }

    let text = node.text_content();
    if text.is_empty() {
        return None;
    }
    match Date::parse(&text, long) {
        Ok(date) => date.format(iso).ok(),
        Err(_) => Some(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &[u8] = br#"<?xml version="1.0" encoding="UTF-8"?>
<bill bill-stage="Introduced-in-House" dms-id="H1" public-private="public">
  <metadata><dublinCore><dc:title>119 HR 1 IH: Example Act</dc:title></dublinCore></metadata>
  <form>
    <distribution-code display="yes">I</distribution-code>
    <congress>119th CONGRESS</congress>
    <session>1st Session</session>
    <legis-num>H. R. 1</legis-num>
    <current-chamber>IN THE HOUSE OF REPRESENTATIVES</current-chamber>
    <action>
      <action-date date="20250103">January 3, 2025</action-date>
      <action-desc><sponsor name-id="S000001">Mr. Smith</sponsor> introduced the following bill; which was referred to the <committee-name committee-id="HWM00">Committee on Ways and Means</committee-name>, and in addition to the <committee-name committee-id="HBU00">Committee on the Budget</committee-name></action-desc>
    </action>
    <legis-type>A BILL</legis-type>
    <official-title>To provide for reconciliation.</official-title>
  </form>
  <legis-body>
    <section id="S1" section-type="section-one"><enum>1.</enum><header>Short title</header>
      <text display-inline="no-display-inline">This Act may be cited as the <short-title>Example Act</short-title>.</text>
    </section>
  </legis-body>
</bill>"#;

    #[test]
    fn reads_declarative_fields() {
        let document = BillDocument::from_xml(SAMPLE).expect("document");
        assert_eq!(document.root, "bill");
        assert_eq!(document.legislative_number, "H. R. 1");
        assert_eq!(document.congress, "119th CONGRESS");
        assert_eq!(document.session.as_deref(), Some("1st Session"));
        assert_eq!(
            document.official_title.as_deref(),
            Some("To provide for reconciliation.")
        );
        assert_eq!(document.short_title.as_deref(), Some("Example Act"));
        assert_eq!(document.action_date.as_deref(), Some("2025-01-03"));
        let sponsor = document.sponsor.as_ref().expect("sponsor");
        assert_eq!(sponsor.external_id.as_deref(), Some("S000001"));
        assert_eq!(sponsor.name, "Mr. Smith");
        assert_eq!(document.committees.len(), 2);
        assert_eq!(
            document.committees[0].committee_id.as_deref(),
            Some("HWM00")
        );
        assert_eq!(document.title(), "To provide for reconciliation.");
    }

    #[test]
    fn full_text_comes_from_body_only() {
        let document = BillDocument::from_xml(SAMPLE).expect("document");
        let text = document.full_text(&TextExtractor::default());
        assert!(text.starts_with("This Act may be cited as the Example Act"));
        assert!(!text.contains("Short title"));
        assert!(!text.contains("reconciliation"));
    }

    #[test]
    fn missing_root_is_reported() {
        let error = BillDocument::from_xml(b"<plaw><form/></plaw>").unwrap_err();
        assert!(matches!(error, MarkupError::MissingRoot));
    }

    #[test]
    fn missing_legislative_number_is_reported() {
        let error =
            BillDocument::from_xml(b"<bill><form><congress>119th</congress></form></bill>")
                .unwrap_err();
        assert!(matches!(error, MarkupError::MissingField("legis-num")));
    }

    #[test]
    fn long_form_action_dates_are_normalized() {
        let node = Node::scalar("March 14, 2025");
        assert_eq!(normalize_action_date(&node).as_deref(), Some("2025-03-14"));
        let node = Node::scalar("sometime");
        assert_eq!(normalize_action_date(&node).as_deref(), Some("sometime"));
    }
}
