//! Payout currencies and addresses
//!
//! Accounts keep one payout address per currency, keyed by the canonical JSON
//! form of the currency: object keys sorted, no whitespace. Two runs over the
//! same events therefore produce byte-identical keys.

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Ethereum address, `0x` followed by 40 hex digits, stored lower-case
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct EthAddress(String);

/// Address grain is paid out to
pub type PayoutAddress = EthAddress;

impl EthAddress {
    /// Parse and normalize
    pub fn parse(s: &str) -> Result<Self> {
        let hex = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .ok_or_else(|| Error::Validation(format!("invalid Ethereum address: {s:?}")))?;
        if hex.len() != 40 || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Validation(format!("invalid Ethereum address: {s:?}")));
        }
        Ok(Self(format!("0x{}", hex.to_ascii_lowercase())))
    }

    /// Borrow as str
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EthAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EthAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EthAddress::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// EVM chain id, a canonical decimal integer string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct EvmChainId(String);

impl EvmChainId {
    /// Parse; the string must survive an integer round trip unchanged
    pub fn parse(s: &str) -> Result<Self> {
        match s.parse::<u64>() {
            Ok(n) if n.to_string() == s => Ok(Self(s.to_string())),
            _ => Err(Error::Validation(format!("invalid EVM chain id: {s:?}"))),
        }
    }

    /// Borrow as str
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for EvmChainId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        EvmChainId::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Non-EVM chains with a native currency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolChain {
    /// Bitcoin
    BTC,
    /// Filecoin
    FIL,
}

/// Currency a payout address applies to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Currency {
    /// Token on an EVM chain
    #[serde(rename = "EVM")]
    Evm {
        /// Chain id
        #[serde(rename = "chainId")]
        chain_id: EvmChainId,
        /// Token contract
        #[serde(rename = "tokenAddress")]
        token_address: EthAddress,
    },
    /// A chain's native currency
    #[serde(rename = "PROTOCOL")]
    Protocol {
        /// Chain
        #[serde(rename = "chainId")]
        chain_id: ProtocolChain,
    },
}

/// Canonical JSON key of a [`Currency`]
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CurrencyKey(String);

impl CurrencyKey {
    /// Borrow as str
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Currency {
    /// Canonical key with sorted object keys
    ///
    /// Goes through a [`serde_json::Value`], whose maps are ordered by key.
    pub fn key(&self) -> Result<CurrencyKey> {
        let value = serde_json::to_value(self)?;
        Ok(CurrencyKey(serde_json::to_string(&value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOKEN: &str = "0x6B175474E89094C44Da98b954EedeAC495271d0F";

    #[test]
    fn test_eth_address() {
        let addr = EthAddress::parse(TOKEN).unwrap();
        assert_eq!(addr.as_str(), TOKEN.to_ascii_lowercase());
        assert!(EthAddress::parse("0x123").is_err());
        assert!(EthAddress::parse("6B175474E89094C44Da98b954EedeAC495271d0F").is_err());
        assert!(EthAddress::parse("0xZZ175474E89094C44Da98b954EedeAC495271d0F").is_err());
    }

    #[test]
    fn test_evm_chain_id_round_trip() {
        assert!(EvmChainId::parse("1").is_ok());
        assert!(EvmChainId::parse("137").is_ok());
        assert!(EvmChainId::parse("01").is_err());
        assert!(EvmChainId::parse("-1").is_err());
        assert!(EvmChainId::parse("1.0").is_err());
    }

    #[test]
    fn test_currency_key_is_sorted() {
        let currency = Currency::Evm {
            chain_id: EvmChainId::parse("1").unwrap(),
            token_address: EthAddress::parse(TOKEN).unwrap(),
        };
        let key = currency.key().unwrap();
        assert_eq!(
            key.as_str(),
            format!(
                r#"{{"chainId":"1","tokenAddress":"{}","type":"EVM"}}"#,
                TOKEN.to_ascii_lowercase()
            )
        );

        let reordered = format!(r#"{{"tokenAddress":"{TOKEN}","chainId":"1","type":"EVM"}}"#);
        let parsed: Currency = serde_json::from_str(&reordered).unwrap();
        assert_eq!(parsed.key().unwrap(), key);

        let btc = Currency::Protocol { chain_id: ProtocolChain::BTC };
        assert_eq!(btc.key().unwrap().as_str(), r#"{"chainId":"BTC","type":"PROTOCOL"}"#);
    }

    #[test]
    fn test_currency_rejects_unknown_chain() {
        let json = r#"{"type":"PROTOCOL","chainId":"DOGE"}"#;
        assert!(serde_json::from_str::<Currency>(json).is_err());
        let json = r#"{"type":"EVM","chainId":"x","tokenAddress":"0x6b175474e89094c44da98b954eedeac495271d0f"}"#;
        assert!(serde_json::from_str::<Currency>(json).is_err());
    }
}
