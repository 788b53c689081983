//! Assignment-level seal/open pipeline.
//!
//! ```text
//! seal:  secret -> split(k, n) -> encrypt share i with answer i -> lock until release_at
//! open:  unlock -> decrypt answered shares -> combine (k good shares needed)
//! ```

use chrono::{DateTime, Utc};
use tracing::debug;
use zeroize::Zeroizing;

use crate::threshold::{combine, split};
use crate::types::{Result, VigilError};
use crate::vault::{decrypt_share, encrypt_share, QuestionData, QuestionRecord, QuestionSet, TimeGate};

/// A question and the answer that protects its share.
#[derive(Clone)]
pub struct Prompt {
    pub question: String,
    pub answer: Zeroizing<String>,
}

impl Prompt {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: Zeroizing::new(answer.into()),
        }
    }
}

impl std::fmt::Debug for Prompt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prompt")
            .field("question", &self.question)
            .field("answer", &"[redacted]")
            .finish()
    }
}

/// Split `secret` across one share per prompt and lock the result until `release_at`.
///
/// # Errors
///
/// `Validation` for blank questions or answers and for threshold/count
/// combinations `split` rejects.
pub fn seal(
    secret: &[u8],
    prompts: &[Prompt],
    threshold: usize,
    release_at: DateTime<Utc>,
    gate: &dyn TimeGate,
) -> Result<QuestionSet> {
    if let Some(i) = prompts
        .iter()
        .position(|p| p.question.trim().is_empty() || p.answer.trim().is_empty())
    {
        return Err(VigilError::Validation(format!(
            "question {} needs both text and an answer",
            i + 1
        )));
    }

    let shares: Vec<Zeroizing<Vec<u8>>> = split(secret, threshold, prompts.len())?
        .into_iter()
        .map(Zeroizing::new)
        .collect();

    let questions = prompts
        .iter()
        .zip(shares.iter())
        .map(|(prompt, share)| {
            let (encrypted_share, salt) = encrypt_share(share, &prompt.answer)?;
            Ok(QuestionRecord {
                question: prompt.question.clone(),
                salt: salt.to_vec(),
                encrypted_share,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    gate.lock(
        &QuestionData {
            questions,
            threshold,
        },
        release_at,
    )
}

/// Question texts of an unlocked set, in order. Never includes shares.
pub fn questions(set: &QuestionSet, gate: &dyn TimeGate, now: DateTime<Utc>) -> Result<Vec<String>> {
    Ok(gate.unlock_at(set, now)?.prompts())
}

/// Reconstruct the secret from answers given in question order.
///
/// `None` skips a question. Wrong answers are skipped too; only when fewer
/// than `threshold` shares decrypt does the call fail, with `Crypto`.
pub fn open(
    set: &QuestionSet,
    answers: &[Option<&str>],
    gate: &dyn TimeGate,
    now: DateTime<Utc>,
) -> Result<Zeroizing<Vec<u8>>> {
    let data = gate.unlock_at(set, now)?;
    if answers.len() != data.questions.len() {
        return Err(VigilError::Validation(format!(
            "expected {} answers, got {}",
            data.questions.len(),
            answers.len()
        )));
    }

    let mut shares = Vec::with_capacity(data.threshold);
    let mut wrong = 0usize;
    for (record, answer) in data.questions.iter().zip(answers) {
        let Some(answer) = answer else { continue };
        match decrypt_share(&record.encrypted_share, answer, &record.salt) {
            Ok(share) => shares.push(share),
            Err(VigilError::Crypto) => wrong += 1,
            Err(e) => return Err(e),
        }
    }

    debug!(
        correct = shares.len(),
        wrong,
        threshold = data.threshold,
        "Recovery answers checked"
    );

    if shares.len() < data.threshold {
        return Err(VigilError::Crypto);
    }
    combine(&shares)
}
