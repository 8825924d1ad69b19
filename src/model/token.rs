use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub symbol: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub decimals: Option<u8>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// A fungible token created through the token factory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// Token symbol, which doubles as the factory sub-account name.
    pub id: String,
    pub owner_id: Option<String>,
    pub total_supply: Option<String>,
    pub metadata: TokenMetadata,
    /// Provenance of the `create_token` transaction. Tokens are immutable
    /// after creation, so there is no update side.
    pub transaction_hash: Option<String>,
    pub create_timestamp: Option<u64>,
}
