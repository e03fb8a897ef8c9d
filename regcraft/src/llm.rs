//! Language-model boundary
//!
//! The crate never performs HTTP itself. A [`CompletionClient`] turns a
//! prompt into text; [`LlmProposer`] builds the prompt, drives the client
//! through the retry state machine, and interprets the reply. Credentials
//! arrive already resolved as an [`ApiKey`]; nothing here reads the
//! environment.
//!
//! The model is asked to answer with one JSON object:
//!
//! ```json
//! {"pattern": {"type": "literal", "text": "abc"}, "reasoning": "...", "confidence": 0.8}
//! ```
//!
//! optionally wrapped in a fenced code block.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{LlmError, ProposeError};
use crate::propose::{PatternProposal, ProposalRequest, Proposer};
use crate::retry::{Retrier, RetryPolicy, Sleeper, ThreadSleeper};
use crate::schema::Node;

/// Supported completion providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Anthropic messages API
    Anthropic,
    /// OpenAI chat completions API
    OpenAi,
}

impl Provider {
    /// Lowercase provider name
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::Anthropic => "anthropic",
            Provider::OpenAi => "openai",
        }
    }

    /// Model used when the config does not name one
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::Anthropic => "claude-3-5-sonnet-latest",
            Provider::OpenAi => "gpt-4o",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "anthropic" => Ok(Provider::Anthropic),
            "openai" => Ok(Provider::OpenAi),
            other => Err(LlmError::Config(format!("unknown provider '{}'", other))),
        }
    }
}

/// Completion settings; never carries a credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Which provider to call
    pub provider: Provider,
    /// Provider model identifier
    pub model: String,
    /// Completion length cap
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        LlmConfig::for_provider(Provider::Anthropic)
    }
}

impl LlmConfig {
    /// Defaults for `provider`
    pub fn for_provider(provider: Provider) -> Self {
        LlmConfig {
            provider,
            model: provider.default_model().to_string(),
            max_tokens: 1024,
            temperature: 0.2,
        }
    }
}

/// A resolved credential; its `Debug` output is redacted
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a credential
    pub fn new(key: impl Into<String>) -> Self {
        ApiKey(key.into())
    }

    /// The credential text, for the client to send
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the key is blank
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(<redacted>)")
    }
}

/// The opaque text-completion call
pub trait CompletionClient {
    /// Complete `prompt` with the given settings and credential
    fn complete(&self, prompt: &str, config: &LlmConfig, key: &ApiKey) -> Result<String, LlmError>;
}

#[derive(Debug, Deserialize)]
struct ModelReply {
    pattern: Node,
    #[serde(default)]
    reasoning: String,
    #[serde(default = "default_confidence")]
    confidence: f64,
}

fn default_confidence() -> f64 {
    0.5
}

/// Proposer backed by a language model
pub struct LlmProposer<C> {
    client: C,
    config: LlmConfig,
    key: Option<ApiKey>,
    policy: RetryPolicy,
    sleeper: Box<dyn Sleeper>,
}

impl<C: CompletionClient> LlmProposer<C> {
    /// A proposer for `client`; without a key it reports itself unavailable
    pub fn new(client: C, config: LlmConfig, key: Option<ApiKey>) -> Self {
        LlmProposer {
            client,
            config,
            key,
            policy: RetryPolicy::default(),
            sleeper: Box::new(ThreadSleeper),
        }
    }

    /// Replace the retry policy
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replace how backoff delays are waited out
    pub fn with_sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Box::new(sleeper);
        self
    }

    fn usable_key(&self) -> Option<&ApiKey> {
        self.key.as_ref().filter(|key| !key.is_empty())
    }
}

impl<C: CompletionClient> Proposer for LlmProposer<C> {
    fn name(&self) -> &str {
        "llm"
    }

    fn is_available(&self) -> bool {
        self.usable_key().is_some()
    }

    fn propose(&self, request: &ProposalRequest) -> Result<PatternProposal, ProposeError> {
        let key = self
            .usable_key()
            .ok_or_else(|| LlmError::Config(format!("no API key for {}", self.config.provider)))?;
        let prompt = build_prompt(request);
        debug!(provider = %self.config.provider, model = %self.config.model, "requesting proposal");

        let mut retrier = Retrier::new(self.policy.clone(), self.sleeper.as_ref());
        let response = retrier.run(|_| self.client.complete(&prompt, &self.config, key))?;
        interpret(&response)
    }
}

/// The prompt sent for `request`
pub fn build_prompt(request: &ProposalRequest) -> String {
    let mut prompt = String::from(
        "Write a regular expression as a JSON pattern tree.\n\
         Answer with one JSON object: {\"pattern\": <node>, \"reasoning\": <string>, \"confidence\": <0..1>}.\n\
         Node types: literal{text}, raw{pattern}, sequence{children}, alternation{children}, \
         char_class{items, negated}, group{child, name?}, non_capturing_group{child}, \
         backreference{target}, assertion{kind, child}, quantifier{child, min, max?, lazy}, \
         anchor{position: start|end|word_boundary}.\n",
    );
    prompt.push_str(&format!("Target dialect: {}.\n", request.dialect));
    if request.anchored {
        prompt.push_str("The pattern is anchored at both ends for you.\n");
    } else {
        prompt.push_str("The pattern is not anchored; it may match anywhere inside an input.\n");
    }

    prompt.push_str("\nMust match:\n");
    for positive in &request.positives {
        prompt.push_str(&format!("- {:?}\n", positive));
    }
    if !request.negatives.is_empty() {
        prompt.push_str("\nMust not match:\n");
        for negative in &request.negatives {
            prompt.push_str(&format!("- {:?}\n", negative));
        }
    }

    if let Some(refinement) = &request.refinement {
        prompt.push_str(&format!(
            "\nAttempt {} produced {} and failed:\n",
            refinement.iteration, refinement.previous_pattern
        ));
        for failure in &refinement.failures {
            let expected = if failure.should_match { "match" } else { "no match" };
            prompt.push_str(&format!("- {:?}: expected {}, got {:?}\n", failure.input, expected, failure.status));
        }
        if !refinement.tried.is_empty() {
            prompt.push_str(&format!("Do not repeat: {}\n", refinement.tried.join(", ")));
        }
    }
    prompt
}

/// Turn a model reply into a proposal
pub fn interpret(response: &str) -> Result<PatternProposal, ProposeError> {
    let interpretation = |reason: String| ProposeError::Interpretation {
        reason,
        response: response.to_string(),
    };
    let json = extract_json(response).ok_or_else(|| interpretation("no JSON object in response".to_string()))?;
    let reply: ModelReply =
        serde_json::from_str(json).map_err(|e| interpretation(format!("malformed proposal: {}", e)))?;
    let pattern = reply
        .pattern
        .to_pattern()
        .map_err(|e| interpretation(format!("invalid pattern tree: {}", e)))?;
    Ok(PatternProposal::new(pattern, reply.reasoning, reply.confidence))
}

/// The JSON object in `response`, preferring the first fenced code block
fn extract_json(response: &str) -> Option<&str> {
    let body = match response.find("```") {
        Some(open) => {
            let after = &response[open + 3..];
            let start = after.find('\n').map(|i| i + 1).unwrap_or(0);
            let after = &after[start..];
            let close = after.find("```").unwrap_or(after.len());
            &after[..close]
        }
        None => response,
    };
    let first = body.find('{')?;
    let last = body.rfind('}')?;
    (first < last).then(|| &body[first..=last])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::emit::emit;
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    struct Scripted {
        replies: RefCell<Vec<Result<String, LlmError>>>,
        calls: Cell<usize>,
    }

    impl Scripted {
        fn new(mut replies: Vec<Result<String, LlmError>>) -> Self {
            replies.reverse();
            Scripted {
                replies: RefCell::new(replies),
                calls: Cell::new(0),
            }
        }
    }

    impl CompletionClient for &Scripted {
        fn complete(&self, _: &str, _: &LlmConfig, _: &ApiKey) -> Result<String, LlmError> {
            self.calls.set(self.calls.get() + 1);
            self.replies
                .borrow_mut()
                .pop()
                .unwrap_or_else(|| Err(LlmError::Call("script exhausted".to_string())))
        }
    }

    struct NoSleep;

    impl Sleeper for NoSleep {
        fn sleep(&self, _: Duration) {}
    }

    const DIGITS: &str = r#"{"pattern": {"type": "quantifier", "min": 1, "child": {"type": "char_class", "items": ["\\d"]}}, "reasoning": "digits", "confidence": 0.9}"#;

    fn request() -> ProposalRequest {
        ProposalRequest::new(vec!["123".to_string()], vec!["abc".to_string()])
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("Anthropic".parse::<Provider>(), Ok(Provider::Anthropic));
        assert_eq!("openai".parse::<Provider>(), Ok(Provider::OpenAi));
        assert!(matches!("mystery".parse::<Provider>(), Err(LlmError::Config(_))));
    }

    #[test]
    fn test_api_key_is_redacted() {
        let key = ApiKey::new("sk-secret");
        assert_eq!(format!("{:?}", key), "ApiKey(<redacted>)");
        assert_eq!(key.expose(), "sk-secret");
    }

    #[test]
    fn test_interpret_fenced_reply() {
        let reply = format!("Here you go:\n```json\n{}\n```\nGood luck.", DIGITS);
        let proposal = interpret(&reply).unwrap();
        assert_eq!(emit(&proposal.pattern, Dialect::Js, true).pattern, r"^\d+$");
        assert_eq!(proposal.reasoning, "digits");
        assert_eq!(proposal.confidence, 0.9);
    }

    #[test]
    fn test_interpret_rejects_garbage() {
        assert!(matches!(
            interpret("I cannot help with that"),
            Err(ProposeError::Interpretation { .. })
        ));
        let bad_tree = r#"{"pattern": {"type": "alternation", "children": []}}"#;
        let Err(ProposeError::Interpretation { reason, response }) = interpret(bad_tree) else {
            panic!("expected an interpretation error");
        };
        assert!(reason.contains("invalid pattern tree"));
        assert_eq!(response, bad_tree);
    }

    #[test]
    fn test_unavailable_without_key() {
        let client = Scripted::new(vec![]);
        let proposer = LlmProposer::new(&client, LlmConfig::default(), None);
        assert!(!proposer.is_available());
        assert!(matches!(
            proposer.propose(&request()),
            Err(ProposeError::Llm(LlmError::Config(_)))
        ));
        let blank = LlmProposer::new(&client, LlmConfig::default(), Some(ApiKey::new("  ")));
        assert!(!blank.is_available());
        assert_eq!(client.calls.get(), 0);
    }

    #[test]
    fn test_retries_then_succeeds() {
        let client = Scripted::new(vec![
            Err(LlmError::RateLimited {
                retry_after: Some(Duration::from_secs(1)),
            }),
            Ok(DIGITS.to_string()),
        ]);
        let proposer = LlmProposer::new(&client, LlmConfig::default(), Some(ApiKey::new("k"))).with_sleeper(NoSleep);
        let proposal = proposer.propose(&request()).unwrap();
        assert_eq!(proposal.confidence, 0.9);
        assert_eq!(client.calls.get(), 2);
    }

    #[test]
    fn test_gives_up_after_budget() {
        let client = Scripted::new(vec![
            Err(LlmError::Call("503".to_string())),
            Err(LlmError::Call("503".to_string())),
            Err(LlmError::Call("503".to_string())),
        ]);
        let proposer = LlmProposer::new(&client, LlmConfig::default(), Some(ApiKey::new("k"))).with_sleeper(NoSleep);
        assert!(matches!(
            proposer.propose(&request()),
            Err(ProposeError::Llm(LlmError::Call(_)))
        ));
        assert_eq!(client.calls.get(), 3);
    }

    #[test]
    fn test_prompt_mentions_failures() {
        use crate::propose::Refinement;
        use crate::tester::{CaseReport, CaseStatus};
        let mut req = request();
        req.refinement = Some(Refinement {
            iteration: 1,
            previous_pattern: "^.*$".to_string(),
            failures: vec![CaseReport {
                index: 1,
                input: "abc".to_string(),
                should_match: false,
                status: CaseStatus::Mismatch {
                    expected: false,
                    actual: true,
                },
                captures: None,
                elapsed: Duration::ZERO,
            }],
            tried: vec!["^.*$".to_string()],
        });
        let prompt = build_prompt(&req);
        assert!(prompt.contains("\"123\""));
        assert!(prompt.contains("Attempt 1 produced ^.*$"));
        assert!(prompt.contains("\"abc\": expected no match"));
        assert!(prompt.contains("Do not repeat: ^.*$"));
    }

    #[test]
    fn test_prompt_states_target() {
        let anchored = build_prompt(&request());
        assert!(anchored.contains(&format!("Target dialect: {}.", Dialect::Js)));
        assert!(anchored.contains("anchored at both ends for you"));

        let loose = build_prompt(&request().with_target(Dialect::Re2, false));
        assert!(loose.contains(&format!("Target dialect: {}.", Dialect::Re2)));
        assert!(loose.contains("is not anchored"));
        assert!(!loose.contains("anchored at both ends"));
    }
}
