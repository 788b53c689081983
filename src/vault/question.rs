//! Recovery-question records and the sets that bundle them.

use serde::{Deserialize, Serialize};

/// One recipient-chosen security question and the share it protects.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    /// Question text shown to the recipient
    pub question: String,

    /// Salt for deriving the answer key
    #[serde(with = "b64")]
    pub salt: Vec<u8>,

    /// Share encrypted under the answer key
    #[serde(with = "b64")]
    pub encrypted_share: Vec<u8>,
}

impl std::fmt::Debug for QuestionRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QuestionRecord")
            .field("question", &self.question)
            .field("encrypted_share_len", &self.encrypted_share.len())
            .finish()
    }
}

/// Contents of a time-gated blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionData {
    pub questions: Vec<QuestionRecord>,
    pub threshold: usize,
}

impl QuestionData {
    /// Question texts in record order.
    pub fn prompts(&self) -> Vec<String> {
        self.questions.iter().map(|q| q.question.clone()).collect()
    }
}

/// A locked question set as persisted on a secret assignment.
///
/// `blob` is opaque until the current round reaches `target_round`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub threshold: usize,
    pub total: usize,
    pub target_round: u64,
    #[serde(with = "b64")]
    pub blob: Vec<u8>,
}

/// Base64 (standard alphabet) for byte fields in JSON.
pub(crate) mod b64 {
    use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_json_shape() {
        let record = QuestionRecord {
            question: "First pet?".into(),
            salt: vec![0u8; 16],
            encrypted_share: vec![1, 2, 3],
        };
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["question"], "First pet?");
        assert_eq!(json["salt"], "AAAAAAAAAAAAAAAAAAAAAA==");
        assert_eq!(json["encrypted_share"], "AQID");
    }

    #[test]
    fn test_debug_hides_share() {
        let record = QuestionRecord {
            question: "q".into(),
            salt: vec![7; 16],
            encrypted_share: vec![0xAB; 4],
        };
        let debug = format!("{:?}", record);
        assert!(debug.contains("encrypted_share_len: 4"));
        assert!(!debug.contains("171"));
    }
}
