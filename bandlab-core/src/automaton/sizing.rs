//! Position sizing: how much of a balance each fill converts.

use serde::{Deserialize, Serialize};

use crate::domain::ParameterSet;

/// Portions used on the 1st, 2nd and 3rd+ consecutive same-direction fill.
pub const GRADUATED_LADDER: [f64; 3] = [1.0 / 3.0, 1.0 / 2.0, 0.99];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sizing {
    /// Every fill converts `ParameterSet::portion`.
    #[default]
    Fixed,
    /// Signal fills walk up `GRADUATED_LADDER` with the direction's level;
    /// stop-loss fills use the top rung.
    Graduated,
}

impl Sizing {
    pub fn signal_portion(self, params: &ParameterSet, level: u32) -> f64 {
        match self {
            Sizing::Fixed => params.portion,
            Sizing::Graduated => {
                let rung = (level.max(1) as usize).min(GRADUATED_LADDER.len()) - 1;
                GRADUATED_LADDER[rung]
            }
        }
    }

    pub fn stop_loss_portion(self, params: &ParameterSet) -> f64 {
        match self {
            Sizing::Fixed => params.portion,
            Sizing::Graduated => GRADUATED_LADDER[GRADUATED_LADDER.len() - 1],
        }
    }
}
