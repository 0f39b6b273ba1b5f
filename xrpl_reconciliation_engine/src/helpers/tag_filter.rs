use log::debug;

use crate::ledger_types::TxEnvelope;

/// Checks whether a transaction carries the given tag, either as a source/destination tag or
/// inside any of its (hex-encoded) memo fields.
///
/// This is how a storefront's transactions are picked out of the firehose: payments it submits
/// carry the tag as `SourceTag`, payments sent to it carry it as `DestinationTag`, and wallets
/// that support neither can embed it in a memo.
pub fn has_target_tag(tx: &TxEnvelope, tag: &str) -> bool {
    if tx.source_tag.map(|t| t.to_string() == tag).unwrap_or(false) {
        debug!("Found target tag in SourceTag of {}", tx.hash);
        return true;
    }
    if tx.destination_tag.map(|t| t.to_string() == tag).unwrap_or(false) {
        debug!("Found target tag in DestinationTag of {}", tx.hash);
        return true;
    }
    for wrapper in &tx.memos {
        let memo = &wrapper.memo;
        for field in [&memo.data, &memo.memo_type, &memo.format].into_iter().flatten() {
            if decoded_contains(field, tag) {
                debug!("Found target tag in a memo field of {}", tx.hash);
                return true;
            }
        }
    }
    false
}

fn decoded_contains(hex_field: &str, tag: &str) -> bool {
    let bytes = match hex::decode(hex_field) {
        Ok(b) => b,
        Err(e) => {
            debug!("Failed to hex-decode memo field: {e}");
            return false;
        },
    };
    match String::from_utf8(bytes) {
        Ok(s) => s.contains(tag),
        Err(e) => {
            debug!("Memo field is not valid UTF-8: {e}");
            false
        },
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    fn payment_with(extra: serde_json::Value) -> TxEnvelope {
        let mut tx = json!({
            "hash": "CAFE01",
            "ledger_index": 100,
            "TransactionType": "Payment",
            "Account": "rSender",
        });
        tx.as_object_mut().unwrap().extend(extra.as_object().unwrap().clone());
        serde_json::from_value(tx).unwrap()
    }

    #[test]
    fn matches_source_tag() {
        let tx = payment_with(json!({ "SourceTag": 77_001 }));
        assert!(has_target_tag(&tx, "77001"));
        assert!(!has_target_tag(&tx, "77002"));
    }

    #[test]
    fn matches_destination_tag() {
        let tx = payment_with(json!({ "DestinationTag": 8 }));
        assert!(has_target_tag(&tx, "8"));
    }

    #[test]
    fn matches_hex_memo_data() {
        // "order:77001" hex-encoded
        let tx = payment_with(json!({ "Memos": [ { "Memo": { "MemoData": "6f726465723a3737303031" } } ] }));
        assert!(has_target_tag(&tx, "77001"));
    }

    #[test]
    fn undecodable_memo_is_not_a_match() {
        let tx = payment_with(json!({ "Memos": [ { "Memo": { "MemoData": "zzzz" } } ] }));
        assert!(!has_target_tag(&tx, "77001"));
    }

    #[test]
    fn untagged_transaction_does_not_match() {
        let tx = payment_with(json!({}));
        assert!(!has_target_tag(&tx, "77001"));
    }
}
