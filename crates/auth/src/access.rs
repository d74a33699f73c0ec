//! Access control: path rules + voter aggregation.
//!
//! The first rule whose pattern matches the request path supplies the
//! requested role set. An empty set grants immediately; otherwise every
//! supporting voter is consulted and the votes are folded by the configured
//! [`DecisionStrategy`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;

use crate::config::RuleConfig;
use crate::error::SecurityError;
use crate::roles::{RoleSet, role_set};
use crate::user::User;
use crate::voter::{AuthenticationVoter, RoleVoter, Vote, Voter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionStrategy {
    /// Every non-abstaining voter must grant.
    #[default]
    Unanimous,
    /// A single grant is enough.
    Affirmative,
    /// Grants must strictly outnumber non-grants.
    Consensus,
}

impl DecisionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionStrategy::Unanimous => "unanimous",
            DecisionStrategy::Affirmative => "affirmative",
            DecisionStrategy::Consensus => "consensus",
        }
    }
}

impl fmt::Display for DecisionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DecisionStrategy {
    type Err = SecurityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "unanimous" => Ok(Self::Unanimous),
            "affirmative" => Ok(Self::Affirmative),
            "consensus" => Ok(Self::Consensus),
            _ => Err(SecurityError::InvalidDecisionStrategy(s.to_string())),
        }
    }
}

/// Accumulated scores for one decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Tally {
    pub vote_score: i32,
    pub max_score: i32,
    pub granted: bool,
}

/// Fold counted votes with `strategy`.
///
/// Zero counted votes grant under `unanimous` (`0 == 0`) and deny under the
/// other two strategies.
pub fn tally<I>(strategy: DecisionStrategy, votes: I) -> Tally
where
    I: IntoIterator<Item = Vote>,
{
    let mut vote_score = 0;
    let mut max_score = 0;

    for vote in votes {
        let score = vote.score();
        match strategy {
            DecisionStrategy::Unanimous => {
                if score != 0 {
                    max_score += 1;
                    vote_score += score;
                }
            }
            DecisionStrategy::Affirmative => {
                if score > 0 {
                    max_score += 1;
                    vote_score += score;
                }
            }
            DecisionStrategy::Consensus => {
                max_score += 1;
                if score > 0 {
                    vote_score += score;
                }
            }
        }
    }

    let granted = match strategy {
        DecisionStrategy::Unanimous => vote_score == max_score,
        DecisionStrategy::Affirmative => vote_score > 0,
        DecisionStrategy::Consensus => vote_score > max_score - vote_score,
    };

    Tally {
        vote_score,
        max_score,
        granted,
    }
}

/// Request path pattern.
///
/// Patterns starting with `^` are regular expressions used as written.
/// Anything else is a glob matched as a path prefix: `*` matches within one
/// segment, `**` across segments, `?` one character. A glob not ending in `/`
/// or `*` only matches on a segment boundary, so `/admin` matches `/admin`
/// and `/admin/users` but not `/administrator`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    raw: String,
    regex: Regex,
}

impl PathPattern {
    pub fn new(pattern: &str) -> Result<Self, SecurityError> {
        let source = if pattern.starts_with('^') {
            pattern.to_string()
        } else {
            glob_to_regex(pattern)
        };
        let regex = Regex::new(&source).map_err(|e| SecurityError::InvalidPathPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            raw: pattern.to_string(),
            regex,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn matches(&self, path: &str) -> bool {
        self.regex.is_match(path)
    }
}

fn glob_to_regex(glob: &str) -> String {
    let mut out = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                out.push_str(".*");
            }
            '*' => out.push_str("[^/]*"),
            '?' => out.push_str("[^/]"),
            other => out.push_str(&regex::escape(other.encode_utf8(&mut [0u8; 4]))),
        }
    }
    if !(glob.ends_with('/') || glob.ends_with('*')) {
        out.push_str("(?:/|$)");
    }
    out
}

#[derive(Debug, Clone)]
pub struct AccessRule {
    pub pattern: PathPattern,
    pub roles: RoleSet,
}

impl AccessRule {
    pub fn new<I, S>(pattern: &str, roles: I) -> Result<Self, SecurityError>
    where
        I: IntoIterator<Item = S>,
        S: Into<crate::roles::Role>,
    {
        Ok(Self {
            pattern: PathPattern::new(pattern)?,
            roles: role_set(roles),
        })
    }

    pub fn from_config(config: &RuleConfig) -> Result<Self, SecurityError> {
        Self::new(&config.path, config.roles.iter().cloned())
    }
}

/// One voter's contribution to a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoteRecord {
    pub voter: String,
    pub vote: i32,
}

/// Auditable account of an access decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    pub path: String,
    pub username: String,
    pub matched_rule: Option<String>,
    pub requested_roles: Vec<String>,
    pub strategy: DecisionStrategy,
    /// Votes of supporting voters, in consultation order.
    pub votes: Vec<VoteRecord>,
    pub tally: Tally,
    pub granted: bool,
}

/// Rules plus an ordered voter list.
#[derive(Debug, Clone)]
pub struct AccessControl {
    strategy: DecisionStrategy,
    rules: Vec<AccessRule>,
    voters: Vec<Arc<dyn Voter>>,
}

impl AccessControl {
    /// `custom_voters` are consulted before the built-in authentication and
    /// role voters.
    pub fn new(
        strategy: DecisionStrategy,
        rules: Vec<AccessRule>,
        custom_voters: Vec<Arc<dyn Voter>>,
    ) -> Self {
        let mut voters = custom_voters;
        voters.push(Arc::new(AuthenticationVoter));
        voters.push(Arc::new(RoleVoter));
        Self {
            strategy,
            rules,
            voters,
        }
    }

    /// Use exactly these voters, without the built-ins.
    pub fn with_voters(
        strategy: DecisionStrategy,
        rules: Vec<AccessRule>,
        voters: Vec<Arc<dyn Voter>>,
    ) -> Self {
        Self {
            strategy,
            rules,
            voters,
        }
    }

    pub fn strategy(&self) -> DecisionStrategy {
        self.strategy
    }

    pub fn rules(&self) -> &[AccessRule] {
        &self.rules
    }

    pub fn voters(&self) -> &[Arc<dyn Voter>] {
        &self.voters
    }

    /// First rule matching `path`.
    pub fn matching_rule(&self, path: &str) -> Option<&AccessRule> {
        self.rules.iter().find(|rule| rule.pattern.matches(path))
    }

    /// Roles requested for `path`; empty when no rule matches.
    pub fn requested_roles(&self, path: &str) -> RoleSet {
        self.matching_rule(path)
            .map(|rule| rule.roles.clone())
            .unwrap_or_default()
    }

    pub fn is_user_allowed_access(&self, user: &dyn User, path: &str) -> bool {
        self.explain(user, path).granted
    }

    /// Decide for an explicit requested role set.
    pub fn decide(&self, user: &dyn User, requested: &RoleSet) -> bool {
        if requested.is_empty() {
            return true;
        }
        tally(self.strategy, self.collect_votes(user, requested).map(|(_, v)| v)).granted
    }

    /// Full decision record for `user` on `path`.
    pub fn explain(&self, user: &dyn User, path: &str) -> AccessDecision {
        let rule = self.matching_rule(path);
        let requested = rule.map(|r| r.roles.clone()).unwrap_or_default();

        let mut decision = AccessDecision {
            path: path.to_string(),
            username: user.username().to_string(),
            matched_rule: rule.map(|r| r.pattern.as_str().to_string()),
            requested_roles: requested.iter().map(|r| r.as_str().to_string()).collect(),
            strategy: self.strategy,
            votes: Vec::new(),
            tally: Tally::default(),
            granted: true,
        };

        if requested.is_empty() {
            tracing::trace!(path, "no roles requested; access granted");
            return decision;
        }

        let votes: Vec<(&str, Vote)> = self.collect_votes(user, &requested).collect();
        decision.tally = tally(self.strategy, votes.iter().map(|(_, v)| *v));
        decision.granted = decision.tally.granted;
        decision.votes = votes
            .into_iter()
            .map(|(voter, vote)| VoteRecord {
                voter: voter.to_string(),
                vote: vote.score(),
            })
            .collect();

        tracing::debug!(
            path,
            username = %decision.username,
            strategy = %self.strategy,
            vote_score = decision.tally.vote_score,
            max_score = decision.tally.max_score,
            granted = decision.granted,
            "access decision"
        );

        decision
    }

    fn collect_votes<'a>(
        &'a self,
        user: &'a dyn User,
        requested: &'a RoleSet,
    ) -> impl Iterator<Item = (&'a str, Vote)> + 'a {
        self.voters
            .iter()
            .filter(move |voter| voter.supports_user_class(user))
            .map(move |voter| (voter.name(), voter.vote(user, requested)))
    }
}
