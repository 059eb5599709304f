/// Basic重み（スキル + 属性のみ）
pub const BASIC_WEIGHTS: Weights = Weights {
    skills: 0.5,
    fields: 0.5,
    project: 0.0,
    goals: 0.0,
    team_vibe: 0.0,
};

/// Enhanced重み（AI由来の相性スコアを含む）
pub const ENHANCED_WEIGHTS: Weights = Weights {
    skills: 0.25,
    fields: 0.20,
    project: 0.25,
    goals: 0.20,
    team_vibe: 0.10,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Weights {
    pub skills: f64,
    pub fields: f64,
    pub project: f64,
    pub goals: f64,
    pub team_vibe: f64,
}

impl Weights {
    pub fn sum(&self) -> f64 {
        self.skills + self.fields + self.project + self.goals + self.team_vibe
    }
}
