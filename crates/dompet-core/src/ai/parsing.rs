//! JSON parsing helpers for model responses
//!
//! These functions extract JSON from model responses, which often include
//! extra text or code fences before/after the JSON payload.

use serde::Deserialize;

use crate::config::{CategorySet, FALLBACK_CATEGORY};
use crate::error::Result;
use crate::models::ReceiptItem;

/// Find the first-to-last brace span in a response
///
/// Absence of a span is not an error here; callers decide whether a
/// missing payload is recoverable.
pub fn extract_json_object(response: &str) -> Option<&str> {
    let response = response.trim();
    let start = response.find('{');
    let end = response.rfind('}');

    match (start, end) {
        (Some(s), Some(e)) if s < e => Some(&response[s..=e]),
        _ => None,
    }
}

/// Find the first-to-last bracket span in a response
pub fn extract_json_array(response: &str) -> Option<&str> {
    let response = response.trim();
    let start = response.find('[');
    let end = response.rfind(']');

    match (start, end) {
        (Some(s), Some(e)) if s < e => Some(&response[s..=e]),
        _ => None,
    }
}

/// Raw transaction fields as the model emits them, everything optional
///
/// Field names follow the wire contract the extraction prompt dictates
/// (camelCase, `type` for the direction). Validation of what is present
/// happens downstream, not here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedTransaction {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub amount: Option<f64>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub account_id: Option<String>,
    pub to_account_id: Option<String>,
    pub merchant: Option<String>,
    pub items: Option<Vec<ExtractedItem>>,
    pub requires_clarification: Option<bool>,
    pub error: Option<bool>,
    pub error_message: Option<String>,
}

impl ExtractedTransaction {
    /// The model flagged the input as unprocessable
    pub fn is_error(&self) -> bool {
        self.error.unwrap_or(false)
    }

    pub fn needs_clarification(&self) -> bool {
        self.requires_clarification.unwrap_or(false)
    }
}

/// One receipt line item as the model emits it
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ExtractedItem {
    pub name: String,
    pub qty: Option<f64>,
    pub price: Option<f64>,
}

impl ExtractedItem {
    /// Convert to a ledger receipt item, clamping odd model output
    pub fn into_receipt_item(self) -> ReceiptItem {
        ReceiptItem {
            name: self.name,
            qty: self.qty.map(|q| q.round().max(1.0) as u32).unwrap_or(1),
            price: self.price.map(|p| p.round() as i64).unwrap_or(0),
        }
    }
}

/// Parse an extraction reply into raw transaction fields
///
/// `Ok(None)` means no JSON payload was present at all (a recoverable
/// situation); a present but malformed payload is an error.
pub fn parse_transaction(response: &str) -> Result<Option<ExtractedTransaction>> {
    let Some(json_str) = extract_json_object(response) else {
        return Ok(None);
    };
    let parsed: ExtractedTransaction = serde_json::from_str(json_str)?;
    Ok(Some(parsed))
}

/// Parse a reply expected to hold a JSON array of suggestion strings
///
/// Falls back to treating each plain line as one suggestion when no array
/// is present. A present but malformed array is an error, so callers can
/// substitute their static fallbacks.
pub fn parse_suggestion_list(response: &str, max: usize) -> Result<Vec<String>> {
    if let Some(json_str) = extract_json_array(response) {
        let items: Vec<String> = serde_json::from_str(json_str)?;
        return Ok(items.into_iter().take(max).collect());
    }

    Ok(response
        .lines()
        .map(|line| line.trim())
        .filter(|line| {
            !line.is_empty()
                && !line.contains("```")
                && !line.starts_with('[')
                && !line.starts_with(']')
        })
        .take(max)
        .map(|line| line.to_string())
        .collect())
}

/// Normalize a single-category reply to a canonical category name
///
/// Strips quoting and a trailing period, then resolves case-insensitively
/// against the configured set. Anything unrecognized becomes the fallback
/// category.
pub fn parse_category_reply(response: &str, categories: &CategorySet) -> String {
    let cleaned = response
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim_end_matches('.')
        .trim();

    categories
        .resolve(cleaned)
        .unwrap_or(FALLBACK_CATEGORY)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_with_noise() {
        let response = "Tentu, ini hasilnya:\n```json\n{\"amount\": 50000}\n```\nSemoga membantu!";
        assert_eq!(extract_json_object(response), Some("{\"amount\": 50000}"));
    }

    #[test]
    fn test_extract_json_object_spans_first_to_last_brace() {
        let response = "x {\"a\": {\"b\": 1}} y";
        assert_eq!(extract_json_object(response), Some("{\"a\": {\"b\": 1}}"));
    }

    #[test]
    fn test_extract_json_object_absent() {
        assert_eq!(extract_json_object("tidak ada json di sini"), None);
        assert_eq!(extract_json_object("}{"), None);
        assert_eq!(extract_json_object(""), None);
    }

    #[test]
    fn test_parse_transaction_full() {
        let response = r#"{
            "type": "expense",
            "amount": 45000,
            "category": "Makan & Minum",
            "description": "Kopi Starbucks",
            "date": "2024-05-01",
            "accountId": "acc-gopay",
            "merchant": "Starbucks"
        }"#;

        let parsed = parse_transaction(response).unwrap().unwrap();
        assert_eq!(parsed.kind.as_deref(), Some("expense"));
        assert_eq!(parsed.amount, Some(45000.0));
        assert_eq!(parsed.account_id.as_deref(), Some("acc-gopay"));
        assert_eq!(parsed.to_account_id, None);
        assert!(!parsed.needs_clarification());
        assert!(!parsed.is_error());
    }

    #[test]
    fn test_parse_transaction_transfer_fields() {
        let response = r#"{"type": "transfer", "amount": 500000, "accountId": "acc-bca",
            "toAccountId": "acc-gopay", "category": "Transfer",
            "description": "Transfer ke GoPay", "date": "2024-05-01"}"#;

        let parsed = parse_transaction(response).unwrap().unwrap();
        assert_eq!(parsed.kind.as_deref(), Some("transfer"));
        assert_eq!(parsed.to_account_id.as_deref(), Some("acc-gopay"));
    }

    #[test]
    fn test_parse_transaction_clarification_flag() {
        let response =
            r#"{"type": "expense", "amount": 20000, "accountId": "", "requiresClarification": true}"#;
        let parsed = parse_transaction(response).unwrap().unwrap();
        assert!(parsed.needs_clarification());
        assert_eq!(parsed.account_id.as_deref(), Some(""));
    }

    #[test]
    fn test_parse_transaction_error_flag() {
        let response = r#"{"error": true, "errorMessage": "Input tidak jelas"}"#;
        let parsed = parse_transaction(response).unwrap().unwrap();
        assert!(parsed.is_error());
        assert_eq!(parsed.error_message.as_deref(), Some("Input tidak jelas"));
    }

    #[test]
    fn test_parse_transaction_no_json_is_none() {
        assert!(parse_transaction("maaf, saya tidak mengerti")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_parse_transaction_malformed_json_is_error() {
        assert!(parse_transaction("{\"amount\": }").is_err());
    }

    #[test]
    fn test_parse_suggestion_list_array() {
        let response = r#"Berikut sarannya:
["Masak di rumah 3x seminggu", "Bawa bekal ke kantor", "Batasi kopi", "Ekstra"]"#;
        let suggestions = parse_suggestion_list(response, 3).unwrap();
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0], "Masak di rumah 3x seminggu");
    }

    #[test]
    fn test_parse_suggestion_list_line_fallback() {
        let response = "```\nKurangi jajan kopi\nNaik transportasi umum\n```";
        let suggestions = parse_suggestion_list(response, 3).unwrap();
        assert_eq!(
            suggestions,
            vec!["Kurangi jajan kopi", "Naik transportasi umum"]
        );
    }

    #[test]
    fn test_parse_suggestion_list_malformed_array_is_error() {
        assert!(parse_suggestion_list("[\"tanpa penutup\",", 3).is_err());
    }

    #[test]
    fn test_parse_category_reply() {
        let cats = CategorySet::default();
        assert_eq!(parse_category_reply("Makan & Minum", &cats), "Makan & Minum");
        assert_eq!(parse_category_reply("\"transportasi\".", &cats), "Transportasi");
        assert_eq!(parse_category_reply("  'Hiburan'  ", &cats), "Hiburan");
        assert_eq!(parse_category_reply("Kuliner Malam", &cats), "Lainnya");
        assert_eq!(parse_category_reply("", &cats), "Lainnya");
    }

    #[test]
    fn test_extracted_item_conversion() {
        let item = ExtractedItem {
            name: "Indomie".to_string(),
            qty: Some(2.0),
            price: Some(3500.0),
        };
        let receipt = item.into_receipt_item();
        assert_eq!(receipt.qty, 2);
        assert_eq!(receipt.price, 3500);

        let bare = ExtractedItem {
            name: "Teh".to_string(),
            qty: None,
            price: None,
        };
        let receipt = bare.into_receipt_item();
        assert_eq!(receipt.qty, 1);
        assert_eq!(receipt.price, 0);
    }
}
