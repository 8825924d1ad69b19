use crate::classifier::METHOD_CREATE_TOKEN;
use crate::ledger::Transaction;
use crate::model::Token;

use super::{transactions_by_receiver, with_args};

/// Enrich token snapshots with the provenance of their `create_token`
/// transaction, matched by symbol. Tokens are immutable after creation so
/// there is no update side; the first symbol match wins.
pub fn enrich_tokens(
    tokens: Vec<Token>,
    transactions: &[Transaction],
    token_factory: &str,
) -> Vec<Token> {
    let by_receiver = transactions_by_receiver(transactions);
    let Some(factory_txs) = by_receiver.get(token_factory) else {
        return tokens;
    };
    let candidates = with_args(factory_txs);

    tokens
        .into_iter()
        .map(|mut token| {
            let matched = candidates.iter().find(|tx| {
                tx.method_name() == Some(METHOD_CREATE_TOKEN)
                    && tx
                        .args()
                        .and_then(|a| a.pointer("/args/metadata/symbol"))
                        .and_then(|v| v.as_str())
                        == Some(token.metadata.symbol.as_str())
            });

            if let Some(tx) = matched {
                token.transaction_hash = Some(tx.transaction_hash.clone());
                token.create_timestamp = Some(tx.block_timestamp);
            }
            token
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::fixtures::tx;
    use crate::model::TokenMetadata;
    use serde_json::json;

    const FACTORY: &str = "tokenfactory.near";

    fn token(symbol: &str) -> Token {
        Token {
            id: symbol.to_lowercase(),
            owner_id: Some("alice.near".to_string()),
            total_supply: Some("1000000".to_string()),
            metadata: TokenMetadata {
                symbol: symbol.to_string(),
                name: Some(symbol.to_string()),
                decimals: Some(18),
                icon: None,
            },
            transaction_hash: None,
            create_timestamp: None,
        }
    }

    fn create_token_tx(hash: &str, timestamp: u64, symbol: &str) -> Transaction {
        tx(
            hash,
            "alice.near",
            FACTORY,
            timestamp,
            METHOD_CREATE_TOKEN,
            Some(json!({
                "args": {
                    "owner_id": "alice.near",
                    "total_supply": "1000000",
                    "metadata": { "symbol": symbol, "decimals": 18 }
                }
            })),
        )
    }

    #[test]
    fn tokens_match_creation_transactions_by_symbol() {
        let enriched = enrich_tokens(
            vec![token("GOV"), token("PAY")],
            &[
                create_token_tx("t1", 150, "GOV"),
                create_token_tx("t2", 160, "OTHER"),
            ],
            FACTORY,
        );

        assert_eq!(enriched[0].transaction_hash.as_deref(), Some("t1"));
        assert_eq!(enriched[0].create_timestamp, Some(150));
        // No symbol match: passed through with null provenance.
        assert_eq!(enriched[1].transaction_hash, None);
    }

    #[test]
    fn factory_without_batch_activity_passes_tokens_through() {
        let original = token("GOV");
        let enriched = enrich_tokens(
            vec![original.clone()],
            &[create_token_tx("t1", 150, "GOV")],
            "other-factory.near",
        );

        assert_eq!(enriched[0], original);
    }
}
