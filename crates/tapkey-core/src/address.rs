//! Address classification by network-specific pattern.
//!
//! Classification is purely lexical: it looks at the prefix, alphabet and
//! length of the string and never decodes a checksum. The four patterns per
//! network have disjoint prefixes, so at most one can match; anything else is
//! [`AddressType::Invalid`]. Callers still parse the address with
//! [`bitcoin::Address`] before paying to it.

use std::sync::LazyLock;

use bitcoin::Network;
use regex::Regex;

use crate::constants::NETWORK;
use crate::types::AddressType;

/// Base58 alphabet (no `0`, `O`, `I`, `l`).
const BASE58: &str = "[a-km-zA-HJ-NP-Z1-9]";

struct Patterns {
    legacy: Regex,
    nested_segwit: Regex,
    native_segwit: Regex,
    taproot: Regex,
}

impl Patterns {
    fn new(legacy_prefix: &str, nested_prefix: &str, hrp: &str) -> Self {
        let compile = |pattern: String| {
            Regex::new(&pattern).unwrap_or_else(|e| panic!("bad address pattern {pattern}: {e}"))
        };
        Self {
            legacy: compile(format!("^{legacy_prefix}{BASE58}{{25,34}}$")),
            nested_segwit: compile(format!("^{nested_prefix}{BASE58}{{25,34}}$")),
            native_segwit: compile(format!("^{hrp}1q[0-9a-z]{{35,59}}$")),
            taproot: compile(format!("^{hrp}1p[0-9a-z]{{39,59}}$")),
        }
    }

    fn classify(&self, address: &str) -> AddressType {
        if self.legacy.is_match(address) {
            AddressType::Legacy
        } else if self.nested_segwit.is_match(address) {
            AddressType::NestedSegwit
        } else if self.native_segwit.is_match(address) {
            AddressType::NativeSegwit
        } else if self.taproot.is_match(address) {
            AddressType::Taproot
        } else {
            AddressType::Invalid
        }
    }
}

static MAINNET: LazyLock<Patterns> = LazyLock::new(|| Patterns::new("1", "3", "bc"));
static TESTNET: LazyLock<Patterns> = LazyLock::new(|| Patterns::new("[mn]", "2", "tb"));

/// Classify an address for the network the crate was built for.
///
/// # Examples
///
/// ```
/// use tapkey_core::constants::NETWORK;
/// use tapkey_core::{classify, AddressType};
/// let addr = match NETWORK {
///     bitcoin::Network::Bitcoin => "bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4",
///     _ => "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
/// };
/// assert_eq!(classify(addr), AddressType::NativeSegwit);
/// assert_eq!(classify("hello"), AddressType::Invalid);
/// ```
pub fn classify(address: &str) -> AddressType {
    classify_for(address, NETWORK)
}

/// Classify an address against an explicit network's patterns.
///
/// Every network other than mainnet uses the testnet patterns.
///
/// ```
/// use tapkey_core::{classify_for, AddressType};
/// use bitcoin::Network;
/// let ty = classify_for("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", Network::Bitcoin);
/// assert_eq!(ty, AddressType::NativeSegwit);
/// assert_eq!(classify_for("bc1qw508d6qejxtdg4y5r3zarvary0c5xw7kv8f3t4", Network::Testnet), AddressType::Invalid);
/// ```
pub fn classify_for(address: &str, network: Network) -> AddressType {
    match network {
        Network::Bitcoin => MAINNET.classify(address),
        _ => TESTNET.classify(address),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_legacy() {
        assert_eq!(
            classify_for("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", Network::Bitcoin),
            AddressType::Legacy
        );
    }

    #[test]
    fn mainnet_nested_segwit() {
        assert_eq!(
            classify_for("3J98t1WpEZ73CNmQviecrnyiWrnqRhWNLy", Network::Bitcoin),
            AddressType::NestedSegwit
        );
    }

    #[test]
    fn mainnet_native_segwit() {
        assert_eq!(
            classify_for("bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq", Network::Bitcoin),
            AddressType::NativeSegwit
        );
    }

    #[test]
    fn mainnet_taproot() {
        assert_eq!(
            classify_for(
                "bc1p5cyxnuxmeuwuvkwfem96lqzszd02n6xdcjrs20cac6yqjjwudpxqkedrcr",
                Network::Bitcoin
            ),
            AddressType::Taproot
        );
    }

    #[test]
    fn testnet_types() {
        assert_eq!(
            classify_for("mipcBbFg9gMiCh81Kj8tqqdgoZub1ZJRfn", Network::Testnet),
            AddressType::Legacy
        );
        assert_eq!(
            classify_for("n3GNqMveyvaPvUbH469vDRadqpJMPc84JA", Network::Testnet),
            AddressType::Legacy
        );
        assert_eq!(
            classify_for("2MzQwSSnBHWHqSAqtTVQ6v47XtaisrJa1Vc", Network::Testnet),
            AddressType::NestedSegwit
        );
        assert_eq!(
            classify_for("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx", Network::Testnet),
            AddressType::NativeSegwit
        );
        assert_eq!(
            classify_for(
                "tb1pqqqqp399et2xygdj5xreqhjjvcmzhxw4aywxecjdzew6hylgvsesf3hn0c",
                Network::Testnet
            ),
            AddressType::Taproot
        );
    }

    #[test]
    fn networks_do_not_cross_match() {
        assert_eq!(
            classify_for("1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", Network::Testnet),
            AddressType::Invalid
        );
        assert_eq!(
            classify_for("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx", Network::Bitcoin),
            AddressType::Invalid
        );
    }

    #[test]
    fn non_bitcoin_networks_use_testnet_patterns() {
        assert_eq!(
            classify_for("tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx", Network::Signet),
            AddressType::NativeSegwit
        );
    }

    #[test]
    fn rejects_bad_alphabet_and_length() {
        // `0` is not base58
        assert_eq!(
            classify_for("10zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", Network::Bitcoin),
            AddressType::Invalid
        );
        // too short
        assert_eq!(classify_for("1A1zP1eP5QG", Network::Bitcoin), AddressType::Invalid);
        // uppercase bech32 is not accepted
        assert_eq!(
            classify_for("BC1QAR0SRRR7XFKVY5L643LYDNW9RE59GTZZWF5MDQ", Network::Bitcoin),
            AddressType::Invalid
        );
        // taproot needs at least 39 data characters
        assert_eq!(
            classify_for("bc1pqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqqq", Network::Bitcoin),
            AddressType::Invalid
        );
        assert_eq!(classify_for("", Network::Bitcoin), AddressType::Invalid);
    }

    #[test]
    fn surrounding_whitespace_is_invalid() {
        assert_eq!(
            classify_for(" 1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa", Network::Bitcoin),
            AddressType::Invalid
        );
    }

    #[test]
    fn default_network_classifier_agrees() {
        let addr = match NETWORK {
            Network::Bitcoin => "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq",
            _ => "tb1qw508d6qejxtdg4y5r3zarvary0c5xw7kxpjzsx",
        };
        assert_eq!(classify(addr), AddressType::NativeSegwit);
    }
}
