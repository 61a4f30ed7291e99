use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

pub const GOAL_BANK_SCHEMA: &str = "planflow.goal_bank.v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalCategory {
    Articulation,
    Attention,
    Executive,
    Expressive,
    Fluency,
    Pragmatic,
    Receptive,
}

impl GoalCategory {
    pub const ALL: [GoalCategory; 7] = [
        GoalCategory::Articulation,
        GoalCategory::Attention,
        GoalCategory::Executive,
        GoalCategory::Expressive,
        GoalCategory::Fluency,
        GoalCategory::Pragmatic,
        GoalCategory::Receptive,
    ];

    pub fn tag(self) -> &'static str {
        match self {
            GoalCategory::Articulation => "articulation",
            GoalCategory::Attention => "attention",
            GoalCategory::Executive => "executive",
            GoalCategory::Expressive => "expressive",
            GoalCategory::Fluency => "fluency",
            GoalCategory::Pragmatic => "pragmatic",
            GoalCategory::Receptive => "receptive",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            GoalCategory::Articulation => "Articulation",
            GoalCategory::Attention => "Attention",
            GoalCategory::Executive => "Executive",
            GoalCategory::Expressive => "Expressive",
            GoalCategory::Fluency => "Fluency",
            GoalCategory::Pragmatic => "Pragmatic",
            GoalCategory::Receptive => "Receptive",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GoalCategory::Articulation => {
                "Articulation involves the precise movements of the lips, tongue, teeth, and palate to produce individual speech sounds. Difficulties may arise from motor coordination, structural differences, or learned patterns. Therapy often focuses on sound placement, production practice, and consistent feedback to improve speech clarity and intelligibility."
            }
            GoalCategory::Attention => {
                "Attention refers to the ability to focus on a task, filter out distractions, and shift concentration when needed. This includes sustained, selective, and alternating attention skills. Intervention strategies may involve structured tasks, visual supports, short breaks, and reinforcement techniques to improve engagement and reduce off-task behaviors."
            }
            GoalCategory::Executive => {
                "Executive function includes planning, organization, time management, working memory, and self-regulation. Students with challenges in this area may struggle to initiate tasks, maintain focus, or break down assignments. Intervention often emphasizes goal-setting, structured routines, strategy instruction, and self-monitoring tools to build independence and adaptability."
            }
            GoalCategory::Expressive => {
                "Expressive language encompasses the ability to convey thoughts, needs, and ideas using words, sentences, gestures, and other communication forms. Areas of need might include vocabulary, grammar, sentence structure, and narrative skills. Therapy strategies often involve modeling, guided practice, and opportunities for real-life communication to strengthen overall expression."
            }
            GoalCategory::Fluency => {
                "Fluency pertains to the flow and rhythm of speech, most commonly in relation to stuttering or cluttering. Stuttering can involve sound repetitions, prolongations, or speech blocks, while cluttering may present as rapid or disorganized speech. Therapy aims to increase smoothness through techniques such as slow, controlled breathing, pacing, relaxation exercises, and desensitization to speaking situations."
            }
            GoalCategory::Pragmatic => {
                "Pragmatic language refers to the social use of communication, including conversational turn-taking, topic maintenance, interpreting nonverbal cues, and adapting language to context. Difficulty in this area can impact relationships and academic participation. Intervention often employs role-play, visual supports, video modeling, and direct social skills instruction to enhance interactive competence."
            }
            GoalCategory::Receptive => {
                "Receptive language is the understanding of spoken or written language, including vocabulary, sentence structure, and comprehension of concepts. Challenges might manifest as difficulty following directions or processing information. Therapy typically involves activities to boost listening comprehension, context clues, and the ability to interpret and respond to questions accurately."
            }
        }
    }

    /// Long-term objective added when a category is selected.
    pub fn long_term_goal(self) -> Goal {
        Goal {
            category: self,
            text: format!("To improve overall {}.", self.tag()),
        }
    }
}

impl fmt::Display for GoalCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for GoalCategory {
    type Err = GoalBankError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let key = raw.trim().to_ascii_lowercase();
        GoalCategory::ALL
            .into_iter()
            .find(|category| category.tag() == key)
            .ok_or_else(|| GoalBankError::UnknownCategory(raw.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Goal {
    pub category: GoalCategory,
    pub text: String,
}

impl Goal {
    pub fn new(category: GoalCategory, text: impl Into<String>) -> Self {
        Self {
            category,
            text: text.into(),
        }
    }

    /// Short-term objective added when this bank goal is selected for a
    /// client: `To improve overall <tag> <first name> <goal text>.` The goal
    /// text is lowercased and its own trailing period dropped.
    pub fn short_term_for(&self, client_name: &str) -> Goal {
        let first_name = client_name.split_whitespace().next().unwrap_or("");
        let body = self.text.trim().trim_end_matches('.').to_lowercase();
        let text = if first_name.is_empty() {
            format!("To improve overall {} {}.", self.category.tag(), body)
        } else {
            format!("To improve overall {} {} {}.", self.category.tag(), first_name, body)
        };
        Goal::new(self.category, text)
    }

    // Category headers in the source documents ("Articulation goals") end up
    // in the bank as entries; they must never be displayed as goals.
    pub fn is_displayable(&self) -> bool {
        let text = self.text.trim();
        !text.is_empty() && !text.to_lowercase().contains("goals")
    }
}

#[derive(Debug)]
pub enum GoalBankError {
    Json(serde_json::Error),
    UnknownCategory(String),
}

impl fmt::Display for GoalBankError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GoalBankError::Json(err) => write!(f, "goal bank json error: {}", err),
            GoalBankError::UnknownCategory(tag) => write!(f, "unknown goal category: {}", tag),
        }
    }
}

impl std::error::Error for GoalBankError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GoalBankError::Json(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for GoalBankError {
    fn from(value: serde_json::Error) -> Self {
        GoalBankError::Json(value)
    }
}

#[derive(Deserialize)]
struct RawGoal {
    category: String,
    text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GoalBank {
    goals: Vec<Goal>,
}

impl GoalBank {
    pub fn new(goals: Vec<Goal>) -> Self {
        Self {
            goals: goals.into_iter().filter(Goal::is_displayable).collect(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, GoalBankError> {
        let raw: Vec<RawGoal> = serde_json::from_str(json)?;
        let mut goals = Vec::with_capacity(raw.len());
        for entry in raw {
            let category = entry.category.parse::<GoalCategory>()?;
            let goal = Goal::new(category, entry.text.trim());
            if goal.is_displayable() {
                goals.push(goal);
            }
        }
        Ok(Self { goals })
    }

    pub fn goals(&self) -> &[Goal] {
        &self.goals
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    pub fn categories(&self) -> Vec<GoalCategory> {
        let mut out: Vec<GoalCategory> = self.goals.iter().map(|goal| goal.category).collect();
        out.sort();
        out.dedup();
        out
    }

    pub fn by_category(&self, category: GoalCategory) -> Vec<&Goal> {
        self.goals
            .iter()
            .filter(|goal| goal.category == category)
            .collect()
    }

    /// Case-insensitive substring search. An empty category slice searches
    /// every category.
    pub fn search(&self, query: &str, categories: &[GoalCategory]) -> Vec<&Goal> {
        let needle = query.trim().to_lowercase();
        self.goals
            .iter()
            .filter(|goal| categories.is_empty() || categories.contains(&goal.category))
            .filter(|goal| needle.is_empty() || goal.text.to_lowercase().contains(&needle))
            .collect()
    }

    pub fn to_canonical_json(&self) -> String {
        // Vec<Goal> serializes in bank order with fixed field order.
        serde_json::to_string(&self.goals).unwrap_or_else(|_| "[]".to_string())
    }

    pub fn fingerprint_sha256(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(GOAL_BANK_SCHEMA.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.to_canonical_json().as_bytes());
        hex_digest(&hasher.finalize())
    }
}

fn hex_digest(digest: &[u8]) -> String {
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        use std::fmt::Write;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

/// Orders candidate goals by relevance to a free-text query.
///
/// Embedding-based similarity lives outside this workspace; it plugs in by
/// implementing this trait.
pub trait Ranker {
    fn rank<'a>(&self, query: &str, candidates: &'a [Goal]) -> Vec<&'a Goal>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalRanker;

impl LexicalRanker {
    fn score(query_tokens: &[String], text: &str) -> usize {
        let tokens = tokenize(text);
        query_tokens
            .iter()
            .filter(|token| tokens.iter().any(|candidate| candidate == *token))
            .count()
    }
}

impl Ranker for LexicalRanker {
    fn rank<'a>(&self, query: &str, candidates: &'a [Goal]) -> Vec<&'a Goal> {
        let query_tokens = tokenize(query);
        let needle = query.trim().to_lowercase();
        if query_tokens.is_empty() {
            return candidates.iter().collect();
        }
        let mut scored: Vec<(usize, usize, &'a Goal)> = candidates
            .iter()
            .enumerate()
            .filter_map(|(idx, goal)| {
                let score = Self::score(&query_tokens, &goal.text);
                if score > 0 || goal.text.to_lowercase().contains(&needle) {
                    Some((score, idx, goal))
                } else {
                    None
                }
            })
            .collect();
        // Stable: equal scores keep input order.
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        scored.into_iter().map(|(_, _, goal)| goal).collect()
    }
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|ch: char| !ch.is_alphanumeric())
        .filter(|token| token.len() > 1)
        .map(|token| token.to_lowercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_BANK: &str = r#"[
        {"category": "articulation", "text": "Articulation goals"},
        {"category": "articulation", "text": "  Client will produce /s/ in the initial position of words with 80% accuracy.  "},
        {"category": "fluency", "text": "Client will use easy onset in structured conversation."},
        {"category": "receptive", "text": "Client will follow two-step directions with 80% accuracy."},
        {"category": "receptive", "text": ""}
    ]"#;

    #[test]
    fn from_json_drops_placeholders_and_trims() {
        let bank = GoalBank::from_json(SAMPLE_BANK).expect("bank");
        assert_eq!(bank.len(), 3);
        assert!(bank.goals()[0].text.starts_with("Client will produce /s/"));
        assert!(bank.goals()[0].text.ends_with("accuracy."));
        assert_eq!(
            bank.categories(),
            vec![
                GoalCategory::Articulation,
                GoalCategory::Fluency,
                GoalCategory::Receptive
            ]
        );
    }

    #[test]
    fn unknown_category_is_rejected() {
        let err = GoalBank::from_json(r#"[{"category": "phonology", "text": "x"}]"#)
            .expect_err("unknown category");
        assert!(matches!(err, GoalBankError::UnknownCategory(_)));
        assert!(err.to_string().contains("phonology"));
    }

    #[test]
    fn displayable_guard_matches_any_case() {
        assert!(!Goal::new(GoalCategory::Attention, "Attention GOALS").is_displayable());
        assert!(!Goal::new(GoalCategory::Attention, "   ").is_displayable());
        assert!(Goal::new(GoalCategory::Attention, "Client will attend.").is_displayable());
    }

    #[test]
    fn search_filters_by_category_and_substring() {
        let bank = GoalBank::from_json(SAMPLE_BANK).expect("bank");
        let hits = bank.search("80%", &[]);
        assert_eq!(hits.len(), 2);
        let hits = bank.search("80%", &[GoalCategory::Receptive]);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].category, GoalCategory::Receptive);
        assert_eq!(bank.search("", &[GoalCategory::Fluency]).len(), 1);
    }

    #[test]
    fn fingerprint_is_stable_and_content_sensitive() {
        let a = GoalBank::from_json(SAMPLE_BANK).expect("bank");
        let b = GoalBank::from_json(SAMPLE_BANK).expect("bank");
        assert_eq!(a.fingerprint_sha256(), b.fingerprint_sha256());
        assert_eq!(a.fingerprint_sha256().len(), 64);
        let c = GoalBank::new(a.goals()[..2].to_vec());
        assert_ne!(a.fingerprint_sha256(), c.fingerprint_sha256());
    }

    #[test]
    fn lexical_ranker_orders_by_overlap_then_input_order() {
        let bank = GoalBank::from_json(SAMPLE_BANK).expect("bank");
        let ranked = LexicalRanker.rank("follow directions accuracy", bank.goals());
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].category, GoalCategory::Receptive);
        assert_eq!(ranked[1].category, GoalCategory::Articulation);
    }

    #[test]
    fn long_term_goal_uses_lowercase_tag() {
        let goal = GoalCategory::Pragmatic.long_term_goal();
        assert_eq!(goal.text, "To improve overall pragmatic.");
        assert_eq!("Pragmatic".parse::<GoalCategory>().unwrap(), GoalCategory::Pragmatic);
        assert_eq!(
            serde_json::to_string(&GoalCategory::Expressive).unwrap(),
            "\"expressive\""
        );
    }

    #[test]
    fn short_term_goal_names_the_client() {
        let goal = Goal::new(
            GoalCategory::Fluency,
            "Will use easy onset in Structured conversation.",
        );
        let short = goal.short_term_for("Avery Quinn");
        assert_eq!(short.category, GoalCategory::Fluency);
        assert_eq!(
            short.text,
            "To improve overall fluency Avery will use easy onset in structured conversation."
        );
        assert!(short.is_displayable());
        assert_eq!(
            goal.short_term_for("  ").text,
            "To improve overall fluency will use easy onset in structured conversation."
        );
    }
}
