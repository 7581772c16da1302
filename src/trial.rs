//! Trial conditions and trial outcomes.

use serde::{Deserialize, Serialize};

/// Item values and fractal-draw probability presented on one trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrialCondition {
    pub qv_left: f64,
    pub qv_right: f64,
    pub ev_left: f64,
    pub ev_right: f64,
    /// Probability in `[0, 1]` that the fractal, not the lottery, is drawn.
    pub prob_fractal_draw: f64,
}

impl TrialCondition {
    pub fn new(
        qv_left: f64,
        qv_right: f64,
        ev_left: f64,
        ev_right: f64,
        prob_fractal_draw: f64,
    ) -> Self {
        Self {
            qv_left,
            qv_right,
            ev_left,
            ev_right,
            prob_fractal_draw,
        }
    }
}

impl From<(f64, f64, f64, f64, f64)> for TrialCondition {
    fn from((qv_left, qv_right, ev_left, ev_right, p): (f64, f64, f64, f64, f64)) -> Self {
        Self::new(qv_left, qv_right, ev_left, ev_right, p)
    }
}

/// Binary choice, coded `-1` for left and `+1` for right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Choice {
    Left,
    Right,
}

impl Choice {
    pub fn as_i8(self) -> i8 {
        match self {
            Choice::Left => -1,
            Choice::Right => 1,
        }
    }

    pub fn from_i8(code: i8) -> Option<Self> {
        match code {
            -1 => Some(Choice::Left),
            1 => Some(Choice::Right),
            _ => None,
        }
    }
}

/// One observed or simulated trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Response time in milliseconds
    pub rt_ms: u32,
    pub choice: Choice,
    pub condition: TrialCondition,
}

impl Trial {
    pub fn new(rt_ms: u32, choice: Choice, condition: TrialCondition) -> Self {
        Self {
            rt_ms,
            choice,
            condition,
        }
    }
}

/// Response times of one condition, split by choice.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChoiceRts {
    pub left: Vec<u32>,
    pub right: Vec<u32>,
}

impl ChoiceRts {
    pub fn push(&mut self, trial: &Trial) {
        match trial.choice {
            Choice::Left => self.left.push(trial.rt_ms),
            Choice::Right => self.right.push(trial.rt_ms),
        }
    }

    pub fn len(&self) -> usize {
        self.left.len() + self.right.len()
    }

    pub fn is_empty(&self) -> bool {
        self.left.is_empty() && self.right.is_empty()
    }

    /// Fraction of left choices, `None` when no trial was recorded.
    pub fn left_fraction(&self) -> Option<f64> {
        if self.is_empty() {
            None
        } else {
            Some(self.left.len() as f64 / self.len() as f64)
        }
    }
}

impl<'a> FromIterator<&'a Trial> for ChoiceRts {
    fn from_iter<I: IntoIterator<Item = &'a Trial>>(iter: I) -> Self {
        let mut rts = ChoiceRts::default();
        for trial in iter {
            rts.push(trial);
        }
        rts
    }
}
