pub mod compatibility;
pub mod config;
pub mod error;
pub mod logging;
pub mod matching;
pub mod normalize;
pub mod run_id;
pub mod telemetry;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, EnumIter, EnumString};

use error::RankError;
use normalize::non_blank;

/// Lowest and highest accepted self-assessed skill rating.
pub const RATING_MIN: u8 = 1;
pub const RATING_MAX: u8 = 3;

/// The canonical hackathon goals a participant can tag themselves with.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    AsRefStr,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum HackathonGoal {
    WinPrizes,
    LearnNewSkills,
    Networking,
    BuildPortfolio,
    HaveFun,
    ShipProduct,
    MeetSponsors,
    TryNewTech,
    FindCofounder,
    SocialImpact,
}

/// Self-assessed ratings, each absent or within `RATING_MIN..=RATING_MAX`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkillRatings {
    pub uiux: Option<u8>,
    pub frontend: Option<u8>,
    pub backend: Option<u8>,
    pub hardware: Option<u8>,
    pub cyber: Option<u8>,
    pub pitching: Option<u8>,
    pub management: Option<u8>,
}

impl SkillRatings {
    pub fn entries(&self) -> [(&'static str, Option<u8>); 7] {
        [
            ("uiux", self.uiux),
            ("frontend", self.frontend),
            ("backend", self.backend),
            ("hardware", self.hardware),
            ("cyber", self.cyber),
            ("pitching", self.pitching),
            ("management", self.management),
        ]
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SocialLinks {
    pub github: Option<String>,
    pub linkedin: Option<String>,
    pub portfolio: Option<String>,
    pub devpost: Option<String>,
}

impl SocialLinks {
    pub fn is_empty(&self) -> bool {
        [&self.github, &self.linkedin, &self.portfolio, &self.devpost]
            .into_iter()
            .all(|link| non_blank(link.as_deref()).is_none())
    }
}

// The unit being matched. Every attribute except `id` may be absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub id: String,
    pub name: Option<String>,
    pub school: Option<String>,
    pub year: Option<String>,
    pub major: Option<String>,
    pub ratings: SkillRatings,
    pub skills: Vec<String>,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub social_links: SocialLinks,
    pub project_idea: Option<String>,
    pub goals: Vec<HackathonGoal>,
    pub preferred_team_size: Option<u32>,
    pub availability_hours: Option<u32>,
}

impl Profile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// A profile with neither a name nor any bio, interests or social links
    /// is not a candidate at all.
    pub fn is_complete(&self) -> bool {
        let has_name = non_blank(self.name.as_deref()).is_some();
        let has_bio = non_blank(self.bio.as_deref()).is_some();
        let has_interests = self
            .interests
            .iter()
            .any(|interest| non_blank(Some(interest.as_str())).is_some());

        has_name || has_bio || has_interests || !self.social_links.is_empty()
    }

    pub fn goal_tags(&self) -> Vec<String> {
        self.goals.iter().map(|g| g.as_ref().to_string()).collect()
    }

    /// Structural checks the ranking call refuses to work around.
    pub fn validate(&self) -> Result<(), RankError> {
        if self.id.trim().is_empty() {
            return Err(RankError::InvalidProfile {
                id: self.id.clone(),
                reason: "profile id is empty".into(),
            });
        }

        for (field, rating) in self.ratings.entries() {
            if let Some(value) = rating {
                if !(RATING_MIN..=RATING_MAX).contains(&value) {
                    return Err(RankError::InvalidProfile {
                        id: self.id.clone(),
                        reason: format!(
                            "{field} rating {value} outside {RATING_MIN}..={RATING_MAX}"
                        ),
                    });
                }
            }
        }

        Ok(())
    }
}
