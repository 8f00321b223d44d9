use std::fmt;

use serde::{
    de::{MapAccess, Visitor},
    ser::SerializeMap,
    Deserialize, Deserializer, Serialize, Serializer,
};

/// Issuers accepted per credential type, in configured order.
///
/// A credential type without an entry trusts nobody, and neither does an
/// empty list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrustedIssuers(Vec<(String, Vec<String>)>);

impl TrustedIssuers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Trust `issuers` for credentials of type `credential_type`, replacing any
    /// previous entry in place.
    pub fn with(mut self, credential_type: impl Into<String>, issuers: Vec<String>) -> Self {
        self.insert(credential_type.into(), issuers);
        self
    }

    fn insert(&mut self, credential_type: String, issuers: Vec<String>) {
        match self.0.iter_mut().find(|(t, _)| *t == credential_type) {
            Some((_, existing)) => *existing = issuers,
            None => self.0.push((credential_type, issuers)),
        }
    }

    /// Whether `issuer` is on the allow-list for `credential_type`.
    /// Matching is exact.
    pub fn is_trusted(&self, credential_type: &str, issuer: &str) -> bool {
        self.0
            .iter()
            .find(|(t, _)| t == credential_type)
            .is_some_and(|(_, issuers)| issuers.iter().any(|trusted| trusted == issuer))
    }

    /// The credential types that have an entry.
    pub fn credential_types(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(t, _)| t.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Compact JSON rendering used in diagnostics. Keys keep their configured
    /// order.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

impl<K: Into<String>> FromIterator<(K, Vec<String>)> for TrustedIssuers {
    fn from_iter<T: IntoIterator<Item = (K, Vec<String>)>>(iter: T) -> Self {
        let mut trust = Self::new();
        for (credential_type, issuers) in iter {
            trust.insert(credential_type.into(), issuers);
        }
        trust
    }
}

impl Serialize for TrustedIssuers {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (credential_type, issuers) in &self.0 {
            map.serialize_entry(credential_type, issuers)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TrustedIssuers {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TrustVisitor;

        impl<'de> Visitor<'de> for TrustVisitor {
            type Value = TrustedIssuers;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map from credential type to a list of issuer DIDs")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
                let mut trust = TrustedIssuers::new();
                while let Some((credential_type, issuers)) = access.next_entry()? {
                    trust.insert(credential_type, issuers);
                }
                Ok(trust)
            }
        }

        deserializer.deserialize_map(TrustVisitor)
    }
}
